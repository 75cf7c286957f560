//! File replay source.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::record::{self, RecordFormat};
use super::SampleSource;
use crate::buffer::Sample;
use crate::error::{GraphViewError, Result};

/// How recorded samples are released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplayMode {
    /// Release samples when their recorded time offset has elapsed, scaled by `speed`.
    Paced {
        /// Playback speed factor (2.0 plays twice as fast).
        speed: f64,
    },
    /// Release samples as fast as reads allow.
    Batch,
}

impl Default for ReplayMode {
    fn default() -> Self {
        Self::Paced { speed: 1.0 }
    }
}

enum RecordReader {
    Text {
        reader: BufReader<File>,
        line: Vec<u8>,
        line_no: usize,
    },
    Binary(BufReader<File>),
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { line_no, .. } => write!(f, "Text(line {})", line_no),
            Self::Binary(_) => f.write_str("Binary"),
        }
    }
}

impl RecordReader {
    /// Next well-formed record; malformed text lines are logged and counted.
    fn next_record(&mut self, malformed: &mut u64) -> std::io::Result<Option<Sample>> {
        match self {
            Self::Text {
                reader,
                line,
                line_no,
            } => loop {
                line.clear();
                if reader.read_until(b'\n', line)? == 0 {
                    return Ok(None);
                }
                *line_no += 1;
                match record::parse_bytes(line) {
                    Ok(Some(sample)) => return Ok(Some(sample)),
                    Ok(None) => {},
                    Err(e) => {
                        *malformed += 1;
                        tracing::warn!("Skipping line {}: {}", line_no, e);
                    },
                }
            },
            Self::Binary(reader) => record::read_record(reader),
        }
    }
}

/// Plays back a recorded dataset.
#[derive(Debug)]
pub struct FileReplay {
    path: PathBuf,
    format: RecordFormat,
    mode: ReplayMode,
    max_batch: usize,
    reader: Option<RecordReader>,
    pending: Option<Sample>,
    started: Option<(Instant, f64)>,
    emitted: u64,
    malformed: u64,
    failure: Option<GraphViewError>,
}

impl FileReplay {
    /// Create a replay of `path`.
    pub fn new(path: impl Into<PathBuf>, format: RecordFormat, mode: ReplayMode) -> Self {
        Self {
            path: path.into(),
            format,
            mode,
            max_batch: 4096,
            reader: None,
            pending: None,
            started: None,
            emitted: 0,
            malformed: 0,
            failure: None,
        }
    }

    /// Cap the number of samples returned per read.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Guess the record format from the file extension.
    pub fn format_for(path: &Path) -> RecordFormat {
        match path.extension().and_then(|s| s.to_str()) {
            Some("bin") => RecordFormat::Binary,
            _ => RecordFormat::Text,
        }
    }

    /// Samples released so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Text lines skipped because they could not be parsed.
    pub fn malformed_records(&self) -> u64 {
        self.malformed
    }

    fn next_sample(&mut self) -> Result<Option<Sample>> {
        if let Some(sample) = self.pending.take() {
            return Ok(Some(sample));
        }
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };
        match reader.next_record(&mut self.malformed) {
            Ok(sample) => Ok(sample),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::warn!("{}: {}", self.path.display(), e);
                self.reader = None;
                Ok(None)
            },
            Err(e) => Err(GraphViewError::disconnected(format!(
                "read from {} failed: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Whether `sample` is due at `now` under paced replay.
    fn is_due(&mut self, sample: &Sample, now: Instant) -> bool {
        let speed = match self.mode {
            ReplayMode::Batch => return true,
            ReplayMode::Paced { speed } => speed,
        };
        let (start, t0) = *self.started.get_or_insert((now, sample.timestamp));
        let offset = (sample.timestamp - t0) / speed;
        offset <= now.duration_since(start).as_secs_f64()
    }
}

impl SampleSource for FileReplay {
    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .map_err(|e| GraphViewError::source_open(self.path.display().to_string(), e))?;
        let reader = BufReader::new(file);
        self.reader = Some(match self.format {
            RecordFormat::Text => RecordReader::Text {
                reader,
                line: Vec::new(),
                line_no: 0,
            },
            RecordFormat::Binary => RecordReader::Binary(reader),
        });
        self.pending = None;
        self.started = None;
        self.emitted = 0;
        self.malformed = 0;
        self.failure = None;
        tracing::info!("Replaying {} ({:?}, {:?})", self.path.display(), self.format, self.mode);
        Ok(())
    }

    fn read_next_batch(&mut self, deadline: Instant) -> Result<Vec<Sample>> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        if self.reader.is_none() && self.pending.is_none() {
            return Err(GraphViewError::SourceExhausted);
        }

        let mut batch = Vec::new();
        while batch.len() < self.max_batch {
            let sample = match self.next_sample() {
                Ok(Some(sample)) => sample,
                Ok(None) => {
                    self.reader = None;
                    break;
                },
                Err(e) if batch.is_empty() => return Err(e),
                // Hand out what was read; the error ends the next read.
                Err(e) => {
                    self.reader = None;
                    self.failure = Some(e);
                    break;
                },
            };

            let now = Instant::now();
            if !self.is_due(&sample, now) {
                self.pending = Some(sample);
                break;
            }
            batch.push(sample);
            if now >= deadline {
                break;
            }
        }

        if batch.is_empty() && self.reader.is_none() && self.pending.is_none() {
            tracing::info!(
                "Replay of {} finished after {} samples",
                self.path.display(),
                self.emitted
            );
            return Err(GraphViewError::SourceExhausted);
        }
        self.emitted += batch.len() as u64;
        Ok(batch)
    }

    fn close(&mut self) {
        self.reader = None;
        self.pending = None;
        self.failure = None;
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
