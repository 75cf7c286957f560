//! Sample sources - everything that produces samples for the buffer.
//!
//! Each source implements the `SampleSource` capability set. `Source` is the
//! tagged variant the application selects at runtime; tests and embedders can
//! drive the scheduler with any other implementation.

pub mod file;
pub mod function;
pub mod live;
pub mod record;
pub mod synthetic;

use std::time::Instant;

use crate::buffer::{ChannelId, Sample};
use crate::error::Result;

pub use file::{FileReplay, ReplayMode};
pub use function::{Function, Waveform};
pub use live::{LiveEndpoint, LiveStream};
pub use record::RecordFormat;
pub use synthetic::{SyntheticConfig, SyntheticGenerator};

/// Capability set of a sample producer.
pub trait SampleSource {
    /// Acquire the underlying resource. Reopening restarts the source.
    fn open(&mut self) -> Result<()>;

    /// Return the samples available before `deadline`.
    ///
    /// Fails with `SourceTimeout` when nothing arrived in time,
    /// `SourceExhausted` at the end of finite data and `SourceDisconnected`
    /// when the source is gone. Never blocks past `deadline`.
    fn read_next_batch(&mut self, deadline: Instant) -> Result<Vec<Sample>>;

    /// Release the underlying resource. Safe to call repeatedly.
    fn close(&mut self);

    /// Human readable description for logs and the status bar.
    fn describe(&self) -> String;

    /// Display names the source knows for its channels.
    fn channel_names(&self) -> Vec<(ChannelId, String)> {
        Vec::new()
    }
}

/// Source kinds selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    /// Replay a recorded file.
    File,
    /// Read a live TCP or stdin stream.
    Live,
    /// Generate samples from formulas.
    Synthetic,
}

impl SourceKind {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Live => "live",
            SourceKind::Synthetic => "synthetic",
        }
    }
}

/// Runtime-selected source.
#[derive(Debug)]
pub enum Source {
    /// File replay.
    File(FileReplay),
    /// Live stream.
    Live(LiveStream),
    /// Synthetic generator.
    Synthetic(SyntheticGenerator),
}

impl Source {
    /// Kind of the wrapped source.
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::File(_) => SourceKind::File,
            Source::Live(_) => SourceKind::Live,
            Source::Synthetic(_) => SourceKind::Synthetic,
        }
    }

    fn inner(&self) -> &dyn SampleSource {
        match self {
            Source::File(s) => s,
            Source::Live(s) => s,
            Source::Synthetic(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SampleSource {
        match self {
            Source::File(s) => s,
            Source::Live(s) => s,
            Source::Synthetic(s) => s,
        }
    }
}

impl SampleSource for Source {
    fn open(&mut self) -> Result<()> {
        self.inner_mut().open()
    }

    fn read_next_batch(&mut self, deadline: Instant) -> Result<Vec<Sample>> {
        self.inner_mut().read_next_batch(deadline)
    }

    fn close(&mut self) {
        self.inner_mut().close()
    }

    fn describe(&self) -> String {
        self.inner().describe()
    }

    fn channel_names(&self) -> Vec<(ChannelId, String)> {
        self.inner().channel_names()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn read_next_batch(&mut self, deadline: Instant) -> Result<Vec<Sample>> {
        (**self).read_next_batch(deadline)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn channel_names(&self) -> Vec<(ChannelId, String)> {
        (**self).channel_names()
    }
}
