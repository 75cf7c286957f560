//! graphview - a streaming graph viewer for the terminal.
//!
//! Samples flow from a source (recorded file, live stream or synthetic
//! function generator) into a bounded per-channel ring buffer. A render
//! scheduler ticks at a fixed rate, reduces every visible channel to one
//! min/max column per horizontal pixel and hands the result to a plot surface.
//!
//! # Features
//!
//! - Bounded memory per channel, oldest samples evicted first
//! - Spike-preserving min/max downsampling
//! - Tick back-pressure: an overrunning tick skips the next one
//! - Paced or batch file replay, TCP and stdin streams
//! - Sine, power and sawtooth generators
//! - Terminal chart with Gruvbox themes, or a headless summary
//!
//! # Example
//!
//! ```ignore
//! use graphview::config::ViewerConfig;
//! use graphview::scheduler::{RenderScheduler, TickTiming};
//! use graphview::surface::SeriesStore;
//! use std::sync::Arc;
//!
//! let config = ViewerConfig::default();
//! let mut scheduler = RenderScheduler::new(
//!     config.build_source()?,
//!     SeriesStore::new(200),
//!     Arc::new(config.build_buffer()),
//!     TickTiming::default(),
//! );
//! scheduler.start()?;
//! scheduler.tick()?;
//! for line in scheduler.surface().summary_lines() {
//!     println!("{}", line);
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]

pub mod app;
pub mod buffer;
pub mod clipboard;
pub mod config;
pub mod downsample;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod surface;
pub mod ui;

pub use error::{GraphViewError, Result};
