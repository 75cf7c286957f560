//! Application state and logic.

use std::sync::Arc;
use std::time::Duration;

use crate::clipboard;
use crate::config::ViewerConfig;
use crate::error::Result;
use crate::scheduler::{EndReason, RenderScheduler, SessionState, TickOutcome, TickTiming};
use crate::source::{SampleSource, Source, SourceKind};
use crate::surface::SeriesStore;
use crate::ui::ChartLayout;

/// Application theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    /// Gruvbox dark theme.
    GruvboxDark,
    /// Gruvbox light theme.
    GruvboxLight,
}

impl Theme {
    /// Get the next theme in the cycle.
    pub fn next(self) -> Self {
        match self {
            Theme::GruvboxDark => Theme::GruvboxLight,
            Theme::GruvboxLight => Theme::GruvboxDark,
        }
    }

    /// Get the theme name.
    pub fn name(self) -> &'static str {
        match self {
            Theme::GruvboxDark => "Gruvbox Dark",
            Theme::GruvboxLight => "Gruvbox Light",
        }
    }
}

/// Application state.
#[derive(Debug)]
pub struct App {
    /// The pipeline.
    pub scheduler: RenderScheduler<Source, SeriesStore>,
    /// Chart title.
    pub title: String,
    /// X and y axis titles.
    pub axis_titles: (&'static str, &'static str),
    /// Source description for the status bar.
    pub source_name: String,
    /// Status message.
    pub status: String,
    /// Current theme.
    pub theme: Theme,
    /// Error message.
    pub error_message: Option<String>,
    /// Whether a fatal source error ended the session.
    pub failed: bool,
    /// Chart layout.
    pub layout: ChartLayout,
}

impl App {
    /// Build the pipeline described by `config`; the session is not started.
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let source = config.build_source()?;
        let source_name = source.describe();

        let (title, axis_titles) = match source.kind() {
            SourceKind::Synthetic => {
                let title = match config.synthetic.waves.as_slice() {
                    [wave] => wave.label(),
                    _ => source_name.clone(),
                };
                (title, ("x", "f(x)"))
            },
            SourceKind::File | SourceKind::Live => (source_name.clone(), ("time", "value")),
        };

        let layout = ChartLayout::default();
        let timing = TickTiming {
            interval: config.tick_interval(),
            read_deadline: config.read_deadline(),
        };
        let scheduler = RenderScheduler::new(
            source,
            SeriesStore::new(layout.pixel_width(80)),
            Arc::new(config.build_buffer()),
            timing,
        )
        .with_window(config.snapshot_window());

        Ok(Self {
            scheduler,
            title,
            axis_titles,
            source_name,
            status: "Ready".to_string(),
            theme: Theme::GruvboxDark,
            error_message: None,
            failed: false,
            layout,
        })
    }

    /// Start the session, recording a failure for the status bar.
    pub fn start(&mut self) -> Result<()> {
        match self.scheduler.start() {
            Ok(()) => {
                self.error_message = None;
                self.failed = false;
                self.status = "Started".to_string();
                Ok(())
            },
            Err(e) => {
                self.error_message = Some(e.to_string());
                self.failed = true;
                self.status = "Start failed".to_string();
                Err(e)
            },
        }
    }

    /// Run one scheduler tick.
    ///
    /// A fatal error stops the session and is kept for the status bar; the
    /// last frame stays on screen.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        match self.scheduler.tick() {
            Ok(TickOutcome::Ended(reason)) => {
                self.status = match reason {
                    EndReason::Exhausted => "Source exhausted".to_string(),
                    EndReason::StopRequested => "Stopped".to_string(),
                };
                Ok(TickOutcome::Ended(reason))
            },
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.error_message = Some(e.to_string());
                self.failed = true;
                self.status = "Source failed".to_string();
                Err(e)
            },
        }
    }

    /// Report how long painting the last rendered frame took.
    pub fn note_render(&mut self, elapsed: Duration) {
        self.scheduler.note_render(elapsed);
    }

    /// Pause a running session or resume a paused one.
    pub fn toggle_pause(&mut self) {
        if self.scheduler.pause() {
            self.status = "Paused".to_string();
        } else if self.scheduler.resume() {
            self.status = "Resumed".to_string();
        } else {
            self.status = "Not running".to_string();
        }
    }

    /// Stop a live session or start a stopped one.
    pub fn toggle_session(&mut self) {
        if self.scheduler.state() == SessionState::Stopped {
            // Failure is reported through the status bar.
            let _ = self.start();
        } else {
            self.scheduler.stop();
            self.status = "Stopped".to_string();
        }
    }

    /// Toggle visibility of the `position`-th channel (1-based, id order).
    pub fn toggle_channel(&mut self, position: usize) {
        let channels = self.scheduler.buffer().channels();
        let info = match position.checked_sub(1).and_then(|i| channels.get(i)) {
            Some(info) => info,
            None => {
                self.status = format!("No channel #{}", position);
                return;
            },
        };
        self.scheduler.buffer().set_enabled(info.id, !info.enabled);
        self.status = format!(
            "{}: {}",
            info.name,
            if info.enabled { "hidden" } else { "shown" }
        );
    }

    /// Drop all buffered samples and the drawn series.
    pub fn clear_buffers(&mut self) {
        self.scheduler.buffer().clear_all();
        self.scheduler.surface_mut().clear();
        self.status = "Buffers cleared".to_string();
    }

    /// Cycle to the next theme.
    pub fn cycle_theme(&mut self) {
        self.theme = self.theme.next();
        self.status = format!("Theme: {}", self.theme.name());
    }

    /// Plain text description of what is on screen.
    pub fn summary_text(&self) -> String {
        clipboard::format_report(&self.title, &self.scheduler.surface().summary_lines())
    }

    /// Copy the channel summary to the clipboard.
    pub fn copy_summary(&mut self) {
        let lines = self.scheduler.surface().summary_lines();
        match clipboard::copy_report(&self.title, &lines) {
            Ok(_) => self.status = format!("Copied {} channel(s)!", lines.len()),
            Err(e) => self.status = format!("Copy failed: {}", e),
        }
    }

    /// Match the surface to a chart `area_width` cells wide.
    pub fn resize_chart(&mut self, area_width: u16) {
        let width = self.layout.pixel_width(area_width);
        self.scheduler.surface_mut().set_width(width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SyntheticConfig, Waveform};

    fn synthetic_app() -> App {
        let config = ViewerConfig {
            synthetic: SyntheticConfig {
                waves: vec![Waveform::default(), "power".parse().unwrap()],
                ..SyntheticConfig::default()
            },
            ..ViewerConfig::default()
        };
        App::new(&config).unwrap()
    }

    #[test]
    fn theme_cycles() {
        assert_eq!(Theme::GruvboxDark.next(), Theme::GruvboxLight);
        assert_eq!(Theme::GruvboxLight.next(), Theme::GruvboxDark);
    }

    #[test]
    fn synthetic_title_and_axes() {
        let app = App::new(&ViewerConfig::default()).unwrap();
        assert!(app.title.contains("A = 1, B = 1"));
        assert_eq!(app.axis_titles, ("x", "f(x)"));
        assert_eq!(app.scheduler.state(), SessionState::Stopped);
    }

    #[test]
    fn session_controls() {
        let mut app = synthetic_app();
        app.toggle_pause();
        assert_eq!(app.status, "Not running");

        app.toggle_session();
        assert_eq!(app.scheduler.state(), SessionState::Running);
        app.toggle_pause();
        assert_eq!(app.scheduler.state(), SessionState::Paused);
        app.toggle_pause();
        assert_eq!(app.scheduler.state(), SessionState::Running);
        app.toggle_session();
        assert_eq!(app.scheduler.state(), SessionState::Stopped);
    }

    #[test]
    fn channels_toggle_and_clear() {
        let mut app = synthetic_app();
        app.start().unwrap();
        assert!(matches!(app.tick().unwrap(), TickOutcome::Rendered(_)));
        assert_eq!(app.scheduler.surface().series().count(), 2);

        app.toggle_channel(2);
        assert!(!app.scheduler.buffer().channel_info(1).unwrap().enabled);
        app.tick().unwrap();
        assert_eq!(app.scheduler.surface().series().count(), 1);

        app.toggle_channel(9);
        assert_eq!(app.status, "No channel #9");

        app.clear_buffers();
        assert_eq!(app.scheduler.buffer().total_len(), 0);
        assert_eq!(app.scheduler.surface().series().count(), 0);
    }

    #[test]
    fn summary_lists_drawn_channels() {
        let mut app = synthetic_app();
        app.start().unwrap();
        app.tick().unwrap();
        let summary = app.summary_text();
        assert!(summary.contains("channel 0"));
        assert!(summary.contains("channel 1"));
    }

    #[test]
    fn restart_clears_previous_failure() {
        let mut app = synthetic_app();
        app.failed = true;
        app.error_message = Some("source went away".to_string());

        app.start().unwrap();
        assert!(!app.failed);
        assert_eq!(app.error_message, None);
        assert_eq!(app.status, "Started");
    }

    #[test]
    fn resize_sets_surface_width() {
        let mut app = synthetic_app();
        app.resize_chart(60);
        assert_eq!(
            crate::surface::PlotSurface::pixel_width(app.scheduler.surface()),
            100
        );
    }
}
