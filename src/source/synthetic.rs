//! Deterministic formula-driven source.
//!
//! Every read advances a virtual x by `samples_per_batch` steps and emits one
//! sample per channel and step, so runs are reproducible regardless of wall
//! clock timing.

use std::time::Instant;

use super::function::Waveform;
use super::SampleSource;
use crate::buffer::{ChannelId, Sample};
use crate::error::{GraphViewError, Result};

/// Settings for the synthetic generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    /// One waveform per channel; channel ids follow the order.
    pub waves: Vec<Waveform>,
    /// Steps emitted per read.
    pub samples_per_batch: usize,
    /// Sampling step override; defaults to the first waveform's natural step.
    pub step: Option<f64>,
    /// First x value.
    pub x_start: f64,
    /// Last x value; the generator is exhausted past it.
    pub x_end: Option<f64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            waves: vec![Waveform::default()],
            samples_per_batch: 4,
            step: None,
            x_start: 0.0,
            x_end: None,
        }
    }
}

impl SyntheticConfig {
    /// Step actually used.
    pub fn effective_step(&self) -> f64 {
        self.step
            .or_else(|| self.waves.first().map(Waveform::step))
            .unwrap_or(super::function::DEFAULT_STEP)
    }
}

/// Formula-driven sample source.
#[derive(Debug)]
pub struct SyntheticGenerator {
    config: SyntheticConfig,
    step: f64,
    index: u64,
    open: bool,
}

impl SyntheticGenerator {
    /// Create a generator.
    pub fn new(config: SyntheticConfig) -> Self {
        let step = config.effective_step();
        Self {
            config,
            step,
            index: 0,
            open: false,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// x of the next sample to emit.
    pub fn next_x(&self) -> f64 {
        self.x_at(self.index)
    }

    // Multiplying instead of accumulating keeps x exact enough to be reproduced.
    fn x_at(&self, index: u64) -> f64 {
        self.config.x_start + index as f64 * self.step
    }

    fn past_end(&self, x: f64) -> bool {
        self.config.x_end.is_some_and(|end| x > end + self.step * 1e-9)
    }
}

impl SampleSource for SyntheticGenerator {
    fn open(&mut self) -> Result<()> {
        if self.config.waves.is_empty() {
            return Err(GraphViewError::source_open(self.describe(), "no waveforms configured"));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(GraphViewError::source_open(
                self.describe(),
                format!("invalid step {}", self.step),
            ));
        }
        for wave in &self.config.waves {
            if let Some(note) = wave.function.domain_note(wave.b) {
                tracing::info!("{}: {}", wave.label(), note);
            }
        }
        self.index = 0;
        self.open = true;
        tracing::info!(
            "Synthetic generator opened: {} channel(s), step {}",
            self.config.waves.len(),
            self.step
        );
        Ok(())
    }

    fn read_next_batch(&mut self, _deadline: Instant) -> Result<Vec<Sample>> {
        if !self.open {
            return Err(GraphViewError::disconnected("synthetic generator is closed"));
        }
        if self.past_end(self.next_x()) {
            return Err(GraphViewError::SourceExhausted);
        }

        let mut batch = Vec::with_capacity(self.config.samples_per_batch * self.config.waves.len());
        for _ in 0..self.config.samples_per_batch {
            let x = self.next_x();
            if self.past_end(x) {
                break;
            }
            for (channel, wave) in self.config.waves.iter().enumerate() {
                if let Some(y) = wave.evaluate(x) {
                    batch.push(Sample::new(x, channel as ChannelId, y));
                }
            }
            self.index += 1;
        }
        Ok(batch)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn describe(&self) -> String {
        match self.config.waves.as_slice() {
            [single] => format!("synthetic {}", single.label()),
            waves => format!("synthetic ({} waveforms)", waves.len()),
        }
    }

    fn channel_names(&self) -> Vec<(ChannelId, String)> {
        self.config
            .waves
            .iter()
            .enumerate()
            .map(|(i, w)| (i as ChannelId, w.label()))
            .collect()
    }
}
