//! Viewer configuration.
//!
//! Built from command line arguments by the binary; validated once before the
//! scheduler starts ticking.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::buffer::{ChannelPolicy, OrderPolicy, SampleBuffer, SnapshotWindow};
use crate::error::{GraphViewError, Result};
use crate::source::{
    FileReplay, LiveEndpoint, LiveStream, RecordFormat, ReplayMode, Source, SourceKind,
    SyntheticConfig, SyntheticGenerator,
};

/// Default ring size per channel.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Default tick interval (about 30 Hz).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 33;
/// Default source read deadline.
pub const DEFAULT_READ_DEADLINE_MS: u64 = 20;
/// Default per-read sample cap for file and live sources.
pub const DEFAULT_MAX_BATCH: usize = 4096;

/// Everything needed to build a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Ring size per channel.
    pub buffer_capacity_per_channel: usize,
    /// Interval between ticks.
    pub tick_interval_ms: u64,
    /// Deadline for each source read; must be below the tick interval.
    pub read_deadline_ms: u64,
    /// Which source to build.
    pub adapter_kind: SourceKind,
    /// File path or `host:port` / `-` address.
    pub source_path_or_address: Option<String>,
    /// Record framing for file replay; `None` guesses from the extension.
    pub record_format: Option<RecordFormat>,
    /// File replay pacing.
    pub replay: ReplayMode,
    /// Per-read sample cap for file and live sources.
    pub max_batch: usize,
    /// Only render samples this many seconds behind the newest one.
    pub window_secs: Option<f64>,
    /// Handling of backwards timestamps.
    pub order_policy: OrderPolicy,
    /// Handling of samples for unknown channels.
    pub channel_policy: ChannelPolicy,
    /// Synthetic generator settings.
    pub synthetic: SyntheticConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity_per_channel: DEFAULT_CAPACITY,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            read_deadline_ms: DEFAULT_READ_DEADLINE_MS,
            adapter_kind: SourceKind::Synthetic,
            source_path_or_address: None,
            record_format: None,
            replay: ReplayMode::default(),
            max_batch: DEFAULT_MAX_BATCH,
            window_secs: None,
            order_policy: OrderPolicy::default(),
            channel_policy: ChannelPolicy::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Pick a source kind for a positional argument when none was given.
    ///
    /// No argument means synthetic, `-` or an address that is not an existing
    /// path means live, anything else is a file.
    pub fn infer_kind(source: Option<&str>) -> SourceKind {
        match source {
            None => SourceKind::Synthetic,
            Some("-") => SourceKind::Live,
            Some(s) if Path::new(s).exists() => SourceKind::File,
            Some(s) if s.contains(':') => SourceKind::Live,
            Some(_) => SourceKind::File,
        }
    }

    /// Tick interval as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Read deadline as a duration.
    pub fn read_deadline(&self) -> Duration {
        Duration::from_millis(self.read_deadline_ms)
    }

    /// Portion of each channel that is rendered.
    pub fn snapshot_window(&self) -> SnapshotWindow {
        self.window_secs.map_or(SnapshotWindow::All, SnapshotWindow::MaxAge)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity_per_channel == 0 {
            return Err(GraphViewError::invalid_config(
                "buffer_capacity_per_channel must be at least 1",
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(GraphViewError::invalid_config("tick_interval_ms must be at least 1"));
        }
        if self.read_deadline_ms >= self.tick_interval_ms {
            return Err(GraphViewError::invalid_config(format!(
                "read_deadline_ms ({}) must be less than tick_interval_ms ({})",
                self.read_deadline_ms, self.tick_interval_ms
            )));
        }
        if self.max_batch == 0 {
            return Err(GraphViewError::invalid_config("max_batch must be at least 1"));
        }
        if let Some(window) = self.window_secs {
            if !(window.is_finite() && window > 0.0) {
                return Err(GraphViewError::invalid_config(format!(
                    "window must be a positive number of seconds, got {}",
                    window
                )));
            }
        }

        match self.adapter_kind {
            SourceKind::File => {
                let path = self.require_source()?;
                if !Path::new(path).is_file() {
                    return Err(GraphViewError::invalid_config(format!(
                        "source file not found: {}",
                        path
                    )));
                }
                if let ReplayMode::Paced { speed } = self.replay {
                    if !(speed.is_finite() && speed > 0.0) {
                        return Err(GraphViewError::invalid_config(format!(
                            "replay speed must be positive, got {}",
                            speed
                        )));
                    }
                }
            },
            SourceKind::Live => {
                self.require_source()?;
            },
            SourceKind::Synthetic => self.validate_synthetic()?,
        }
        Ok(())
    }

    fn require_source(&self) -> Result<&str> {
        match self.source_path_or_address.as_deref() {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(GraphViewError::invalid_config(format!(
                "a source path or address is required for the {} adapter",
                self.adapter_kind.name()
            ))),
        }
    }

    fn validate_synthetic(&self) -> Result<()> {
        let synthetic = &self.synthetic;
        if synthetic.waves.is_empty() {
            return Err(GraphViewError::invalid_config("at least one waveform is required"));
        }
        if synthetic.samples_per_batch == 0 {
            return Err(GraphViewError::invalid_config("samples per tick must be at least 1"));
        }
        let step = synthetic.effective_step();
        if !(step.is_finite() && step > 0.0) {
            return Err(GraphViewError::invalid_config(format!(
                "step must be positive, got {}",
                step
            )));
        }
        if let Some(end) = synthetic.x_end {
            if end < synthetic.x_start {
                return Err(GraphViewError::invalid_config(format!(
                    "x_end ({}) is before x_start ({})",
                    end, synthetic.x_start
                )));
            }
        }
        Ok(())
    }

    /// Build the buffer described by this configuration.
    pub fn build_buffer(&self) -> SampleBuffer {
        SampleBuffer::with_policies(
            self.buffer_capacity_per_channel,
            self.order_policy,
            self.channel_policy,
        )
    }

    /// Build the source described by this configuration.
    pub fn build_source(&self) -> Result<Source> {
        Ok(match self.adapter_kind {
            SourceKind::File => {
                let path = PathBuf::from(self.require_source()?);
                let format = self
                    .record_format
                    .unwrap_or_else(|| FileReplay::format_for(&path));
                Source::File(FileReplay::new(path, format, self.replay).with_max_batch(self.max_batch))
            },
            SourceKind::Live => {
                let endpoint = LiveEndpoint::parse(self.require_source()?);
                Source::Live(LiveStream::new(endpoint).with_max_batch(self.max_batch))
            },
            SourceKind::Synthetic => {
                Source::Synthetic(SyntheticGenerator::new(self.synthetic.clone()))
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = ViewerConfig::default();
        assert_eq!(config.buffer_capacity_per_channel, 10_000);
        assert_eq!(config.tick_interval(), Duration::from_millis(33));
        config.validate().unwrap();
    }

    #[test]
    fn deadline_must_be_below_interval() {
        let config = ViewerConfig {
            read_deadline_ms: 33,
            ..ViewerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GraphViewError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("read_deadline_ms"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = ViewerConfig {
            buffer_capacity_per_channel: 0,
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_adapter_needs_existing_file() {
        let mut config = ViewerConfig {
            adapter_kind: SourceKind::File,
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());

        config.source_path_or_address = Some("/nonexistent/data.csv".into());
        assert!(config.validate().is_err());

        let file = NamedTempFile::new().unwrap();
        config.source_path_or_address = Some(file.path().display().to_string());
        config.validate().unwrap();
        assert_eq!(config.build_source().unwrap().kind(), SourceKind::File);
    }

    #[test]
    fn paced_replay_needs_positive_speed() {
        let file = NamedTempFile::new().unwrap();
        let config = ViewerConfig {
            adapter_kind: SourceKind::File,
            source_path_or_address: Some(file.path().display().to_string()),
            replay: ReplayMode::Paced { speed: 0.0 },
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn live_adapter_needs_address() {
        let mut config = ViewerConfig {
            adapter_kind: SourceKind::Live,
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());
        config.source_path_or_address = Some("127.0.0.1:9000".into());
        config.validate().unwrap();
    }

    #[test]
    fn synthetic_range_must_be_ordered() {
        let mut config = ViewerConfig::default();
        config.synthetic.x_start = 5.0;
        config.synthetic.x_end = Some(1.0);
        assert!(config.validate().is_err());

        config.synthetic.x_end = Some(10.0);
        config.synthetic.step = Some(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn window_maps_to_max_age() {
        let mut config = ViewerConfig::default();
        assert_eq!(config.snapshot_window(), SnapshotWindow::All);
        config.window_secs = Some(2.5);
        assert_eq!(config.snapshot_window(), SnapshotWindow::MaxAge(2.5));
    }

    #[test]
    fn kind_inference() {
        assert_eq!(ViewerConfig::infer_kind(None), SourceKind::Synthetic);
        assert_eq!(ViewerConfig::infer_kind(Some("-")), SourceKind::Live);
        assert_eq!(ViewerConfig::infer_kind(Some("localhost:7000")), SourceKind::Live);
        assert_eq!(ViewerConfig::infer_kind(Some("missing.csv")), SourceKind::File);

        let file = NamedTempFile::new().unwrap();
        let path = file.path().display().to_string();
        assert_eq!(ViewerConfig::infer_kind(Some(&path)), SourceKind::File);
    }
}
