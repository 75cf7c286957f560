//! Render scheduler - the tick state machine driving the pipeline.
//!
//! The scheduler owns no timer. Whatever runs the event loop (the terminal UI
//! or the headless runner) asks a `TickClock` when the next tick is due and
//! calls `tick()`; one tick reads one batch, stores it, reduces every visible
//! channel and hands a complete frame to the surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::{BatchStats, SampleBuffer, SnapshotWindow};
use crate::downsample::{ChannelSeries, RenderFrame};
use crate::error::{GraphViewError, Result};
use crate::source::SampleSource;
use crate::surface::{present, PlotSurface};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Source closed, no ticking.
    #[default]
    Stopped,
    /// Source open, ticking.
    Running,
    /// Source open, ticking suspended.
    Paused,
}

impl SessionState {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Stopped => "Stopped",
            SessionState::Running => "Running",
            SessionState::Paused => "Paused",
        }
    }
}

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The source ran out of data.
    Exhausted,
    /// A stop was requested through a `StopHandle`.
    StopRequested,
}

/// Work done by a rendered tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Samples read from the source this tick.
    pub samples_in: usize,
    /// Outcome of storing them.
    pub pushed: BatchStats,
    /// Channels drawn.
    pub channels: usize,
    /// Columns drawn across channels.
    pub columns: usize,
    /// Whether the read timed out.
    pub timed_out: bool,
    /// Wall time the tick took.
    pub elapsed: Duration,
}

/// Result of one `tick()` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not running; nothing happened.
    Idle,
    /// Dropped because the previous tick overran its interval.
    Skipped,
    /// A frame was rendered.
    Rendered(FrameStats),
    /// The session stopped cleanly.
    Ended(EndReason),
}

/// Counters over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    /// Frames handed to the surface.
    pub rendered: u64,
    /// Ticks dropped for back-pressure.
    pub skipped: u64,
    /// Reads that hit their deadline empty-handed.
    pub timeouts: u64,
    /// Samples read from the source.
    pub samples: u64,
}

/// Timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTiming {
    /// Interval between ticks.
    pub interval: Duration,
    /// Deadline for each source read; shorter than `interval`.
    pub read_deadline: Duration,
}

impl Default for TickTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(33),
            read_deadline: Duration::from_millis(20),
        }
    }
}

/// Cloneable request to stop a scheduler from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the scheduler to stop at its next check point.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop is pending.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Fixed-rate tick timer without catch-up.
///
/// If the driver falls behind, the next tick is scheduled one interval after
/// the late one instead of firing a burst of overdue ticks.
#[derive(Debug, Clone, Copy)]
pub struct TickClock {
    interval: Duration,
    next_due: Instant,
}

impl TickClock {
    /// Clock whose first tick is due at `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now,
        }
    }

    /// Time left until the next tick.
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Whether a tick is due; if so, schedule the following one.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        let after = self.next_due + self.interval;
        self.next_due = if after > now { after } else { now + self.interval };
        true
    }
}

/// Drives source → buffer → downsampler → surface.
#[derive(Debug)]
pub struct RenderScheduler<S, P> {
    source: S,
    surface: P,
    buffer: Arc<SampleBuffer>,
    timing: TickTiming,
    window: SnapshotWindow,
    state: SessionState,
    source_open: bool,
    skip_next: bool,
    last_elapsed: Option<Duration>,
    stop: StopHandle,
    last_frame: Option<RenderFrame>,
    stats: SchedulerStats,
}

impl<S: SampleSource, P: PlotSurface> RenderScheduler<S, P> {
    /// Create a stopped scheduler.
    pub fn new(source: S, surface: P, buffer: Arc<SampleBuffer>, timing: TickTiming) -> Self {
        Self {
            source,
            surface,
            buffer,
            timing,
            window: SnapshotWindow::All,
            state: SessionState::Stopped,
            source_open: false,
            skip_next: false,
            last_elapsed: None,
            stop: StopHandle::default(),
            last_frame: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Restrict rendered data to a snapshot window.
    pub fn with_window(mut self, window: SnapshotWindow) -> Self {
        self.window = window;
        self
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Timing parameters.
    pub fn timing(&self) -> TickTiming {
        self.timing
    }

    /// Shared buffer.
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// The surface frames are drawn on.
    pub fn surface(&self) -> &P {
        &self.surface
    }

    /// Mutable access to the surface (e.g. to resize it).
    pub fn surface_mut(&mut self) -> &mut P {
        &mut self.surface
    }

    /// The source being read.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Last frame handed to the surface.
    pub fn last_frame(&self) -> Option<&RenderFrame> {
        self.last_frame.as_ref()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Handle for stopping from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stopped → Running: open the source and begin ticking.
    ///
    /// A no-op in any other state. On failure the scheduler stays stopped.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Stopped {
            tracing::debug!("start ignored in state {}", self.state.name());
            return Ok(());
        }

        self.stop.reset();
        if let Err(e) = self.source.open() {
            tracing::error!("Failed to open {}: {}", self.source.describe(), e);
            return Err(e);
        }
        self.source_open = true;

        for (id, name) in self.source.channel_names() {
            self.buffer.create_channel(id, name);
        }

        self.skip_next = false;
        self.state = SessionState::Running;
        tracing::info!("Session started: {}", self.source.describe());
        Ok(())
    }

    /// Running → Paused. Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        self.state = SessionState::Paused;
        tracing::info!("Session paused");
        true
    }

    /// Paused → Running. Returns whether the state changed.
    pub fn resume(&mut self) -> bool {
        if self.state != SessionState::Paused {
            return false;
        }
        self.skip_next = false;
        self.state = SessionState::Running;
        tracing::info!("Session resumed");
        true
    }

    /// Any → Stopped: close the source. Buffered samples are kept.
    pub fn stop(&mut self) {
        if self.source_open {
            self.source.close();
            self.source_open = false;
        }
        if self.state != SessionState::Stopped {
            tracing::info!("Session stopped");
        }
        self.state = SessionState::Stopped;
        self.skip_next = false;
    }

    /// Run one tick.
    ///
    /// Only fatal source failures are returned as errors; the scheduler is
    /// already stopped when that happens and the previous frame stays on the
    /// surface.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.stop.is_requested() {
            return Ok(self.end(EndReason::StopRequested));
        }
        if self.state != SessionState::Running {
            return Ok(TickOutcome::Idle);
        }
        self.last_elapsed = None;
        if self.skip_next {
            self.skip_next = false;
            self.stats.skipped += 1;
            tracing::debug!("Tick skipped after overrun");
            return Ok(TickOutcome::Skipped);
        }

        let started = Instant::now();
        let deadline = started + self.timing.read_deadline;

        let (batch, timed_out) = match self.source.read_next_batch(deadline) {
            Ok(batch) => (batch, false),
            Err(GraphViewError::SourceTimeout) => {
                self.stats.timeouts += 1;
                tracing::debug!("Source read timed out");
                (Vec::new(), true)
            },
            Err(GraphViewError::SourceExhausted) => {
                tracing::info!("Source exhausted");
                return Ok(self.end(EndReason::Exhausted));
            },
            Err(e) => {
                tracing::error!("Source failed: {}", e);
                self.stop();
                return Err(e);
            },
        };

        // A stop requested during the read abandons the batch untouched.
        if self.stop.is_requested() {
            return Ok(self.end(EndReason::StopRequested));
        }

        let pushed = self.buffer.push_batch(&batch);
        self.stats.samples += batch.len() as u64;
        if pushed.out_of_order > 0 || pushed.rejected > 0 {
            tracing::debug!(
                "{} out-of-order, {} rejected samples this tick",
                pushed.out_of_order,
                pushed.rejected
            );
        }

        let frame = self.build_frame()?;
        present(&mut self.surface, &frame);
        self.stats.rendered += 1;

        let stats = FrameStats {
            samples_in: batch.len(),
            pushed,
            channels: frame.series.len(),
            columns: frame.column_count(),
            timed_out,
            elapsed: started.elapsed(),
        };
        self.last_frame = Some(frame);

        if stats.elapsed > self.timing.interval {
            tracing::warn!(
                "Tick took {:?} (interval {:?}); skipping the next one",
                stats.elapsed,
                self.timing.interval
            );
            self.skip_next = true;
        }
        self.last_elapsed = Some(stats.elapsed);
        Ok(TickOutcome::Rendered(stats))
    }

    /// Account for drawing the last rendered frame outside the surface.
    ///
    /// A driver that paints after `tick()` reports the paint time here; when
    /// tick plus paint overrun the interval the next tick is skipped. Calls
    /// without a preceding rendered tick are ignored.
    pub fn note_render(&mut self, elapsed: Duration) {
        let tick_elapsed = match self.last_elapsed.take() {
            Some(tick_elapsed) => tick_elapsed,
            None => return,
        };
        let total = tick_elapsed + elapsed;
        if total > self.timing.interval && !self.skip_next {
            tracing::warn!(
                "Frame took {:?} (interval {:?}); skipping the next tick",
                total,
                self.timing.interval
            );
            self.skip_next = true;
        }
    }

    /// Reduce every visible channel to the surface's current width.
    pub fn build_frame(&self) -> Result<RenderFrame> {
        let width = self.surface.pixel_width();
        let mut series = Vec::new();
        for (channel, name) in self.buffer.visible_channels() {
            let samples = match self.buffer.snapshot(channel, self.window) {
                Some(samples) => samples,
                None => continue,
            };
            series.push(ChannelSeries::reduce(channel, name, &samples, width)?);
        }
        Ok(RenderFrame { width, series })
    }

    fn end(&mut self, reason: EndReason) -> TickOutcome {
        self.stop();
        self.stop.reset();
        TickOutcome::Ended(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Sample;
    use crate::surface::SeriesStore;
    use std::collections::VecDeque;
    use std::thread;

    /// Source replaying a script of read results.
    #[derive(Debug, Default)]
    struct ScriptedSource {
        script: VecDeque<Result<Vec<Sample>>>,
        opened: usize,
        closed: usize,
        fail_open: bool,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<Sample>>>) -> Self {
            Self {
                script: script.into(),
                ..Self::default()
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(GraphViewError::source_open("script", "refused"));
            }
            self.opened += 1;
            Ok(())
        }

        fn read_next_batch(&mut self, _deadline: Instant) -> Result<Vec<Sample>> {
            self.script.pop_front().unwrap_or(Err(GraphViewError::SourceExhausted))
        }

        fn close(&mut self) {
            self.closed += 1;
        }

        fn describe(&self) -> String {
            "script".to_string()
        }
    }

    /// Surface that sleeps on its first frame.
    #[derive(Debug)]
    struct SlowSurface {
        inner: SeriesStore,
        delay_first: Duration,
    }

    impl PlotSurface for SlowSurface {
        fn pixel_width(&self) -> usize {
            self.inner.pixel_width()
        }

        fn set_series(
            &mut self,
            channel: u32,
            name: &str,
            x: &[f64],
            lo: &[f64],
            hi: &[f64],
            bucket_width: Option<f64>,
        ) {
            self.inner.set_series(channel, name, x, lo, hi, bucket_width);
        }

        fn finish_frame(&mut self, visible: &[u32]) {
            if self.inner.frames() == 0 {
                thread::sleep(self.delay_first);
            }
            self.inner.finish_frame(visible);
        }
    }

    fn samples(channel: u32, range: std::ops::Range<u32>) -> Vec<Sample> {
        range
            .map(|i| Sample::new(i as f64, channel, i as f64))
            .collect()
    }

    fn scheduler(
        script: Vec<Result<Vec<Sample>>>,
    ) -> RenderScheduler<ScriptedSource, SeriesStore> {
        RenderScheduler::new(
            ScriptedSource::new(script),
            SeriesStore::new(100),
            Arc::new(SampleBuffer::new(10)),
            TickTiming::default(),
        )
    }

    #[test]
    fn lifecycle_transitions() {
        let mut sched = scheduler(vec![]);
        assert_eq!(sched.state(), SessionState::Stopped);
        assert!(!sched.pause());
        assert!(!sched.resume());

        sched.start().unwrap();
        assert_eq!(sched.state(), SessionState::Running);
        sched.start().unwrap();
        assert_eq!(sched.source().opened, 1);

        assert!(sched.pause());
        assert_eq!(sched.state(), SessionState::Paused);
        assert_eq!(sched.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(sched.source().closed, 0);

        assert!(sched.resume());
        sched.stop();
        assert_eq!(sched.state(), SessionState::Stopped);
        assert_eq!(sched.source().closed, 1);

        sched.stop();
        assert_eq!(sched.source().closed, 1);
        assert_eq!(sched.tick().unwrap(), TickOutcome::Idle);
    }

    #[test]
    fn failed_open_stays_stopped() {
        let mut sched = scheduler(vec![]);
        sched.source.fail_open = true;
        assert!(sched.start().is_err());
        assert_eq!(sched.state(), SessionState::Stopped);
    }

    #[test]
    fn tick_renders_buffered_data() {
        let mut sched = scheduler(vec![Ok(samples(0, 0..3)), Ok(samples(1, 0..2))]);
        sched.start().unwrap();

        let outcome = sched.tick().unwrap();
        let TickOutcome::Rendered(stats) = outcome else {
            panic!("expected a rendered frame, got {outcome:?}");
        };
        assert_eq!(stats.samples_in, 3);
        assert_eq!(stats.channels, 1);
        assert_eq!(sched.surface().get(0).unwrap().x, vec![0.0, 1.0, 2.0]);

        sched.tick().unwrap();
        assert_eq!(sched.surface().series().count(), 2);
        assert_eq!(sched.stats().rendered, 2);
    }

    #[test]
    fn timeout_still_renders() {
        let mut sched = scheduler(vec![Ok(samples(0, 0..3)), Err(GraphViewError::SourceTimeout)]);
        sched.start().unwrap();
        sched.tick().unwrap();

        let TickOutcome::Rendered(stats) = sched.tick().unwrap() else {
            panic!("timeout must not stop rendering");
        };
        assert!(stats.timed_out);
        assert_eq!(stats.columns, 3);
        assert_eq!(sched.state(), SessionState::Running);
        assert_eq!(sched.stats().timeouts, 1);
    }

    #[test]
    fn exhaustion_stops_cleanly() {
        let mut sched = scheduler(vec![Ok(samples(0, 0..4))]);
        sched.start().unwrap();
        sched.tick().unwrap();

        assert_eq!(sched.tick().unwrap(), TickOutcome::Ended(EndReason::Exhausted));
        assert_eq!(sched.state(), SessionState::Stopped);
        assert_eq!(sched.source().closed, 1);
        assert_eq!(sched.buffer().total_len(), 4);
    }

    #[test]
    fn disconnect_is_fatal_and_keeps_buffer_and_frame() {
        let mut sched = scheduler(vec![
            Ok(samples(0, 0..5)),
            Err(GraphViewError::disconnected("peer reset")),
        ]);
        sched.start().unwrap();
        sched.tick().unwrap();
        let before = sched.buffer().snapshot(0, SnapshotWindow::All).unwrap();
        let frame_before = sched.last_frame().cloned();

        let err = sched.tick().unwrap_err();
        assert!(matches!(err, GraphViewError::SourceDisconnected(_)));
        assert_eq!(sched.state(), SessionState::Stopped);
        assert_eq!(sched.source().closed, 1);
        assert_eq!(sched.buffer().snapshot(0, SnapshotWindow::All).unwrap(), before);
        assert_eq!(sched.last_frame().cloned(), frame_before);
        assert_eq!(sched.surface().frames(), 1);
    }

    #[test]
    fn overrun_skips_exactly_one_tick() {
        let mut sched = RenderScheduler::new(
            ScriptedSource::new(vec![Ok(samples(0, 0..2)), Ok(vec![]), Ok(vec![]), Ok(vec![])]),
            SlowSurface {
                inner: SeriesStore::new(50),
                delay_first: Duration::from_millis(50),
            },
            Arc::new(SampleBuffer::new(10)),
            TickTiming {
                interval: Duration::from_millis(33),
                read_deadline: Duration::from_millis(20),
            },
        );
        sched.start().unwrap();

        assert!(matches!(sched.tick().unwrap(), TickOutcome::Rendered(_)));
        assert_eq!(sched.tick().unwrap(), TickOutcome::Skipped);
        assert!(matches!(sched.tick().unwrap(), TickOutcome::Rendered(_)));
        assert!(matches!(sched.tick().unwrap(), TickOutcome::Rendered(_)));
        assert_eq!(sched.stats().skipped, 1);
    }

    #[test]
    fn slow_paint_after_tick_skips_next_tick() {
        let mut sched = RenderScheduler::new(
            ScriptedSource::new(vec![Ok(samples(0, 0..2)), Ok(vec![]), Ok(vec![]), Ok(vec![])]),
            SeriesStore::new(50),
            Arc::new(SampleBuffer::new(10)),
            TickTiming {
                interval: Duration::from_millis(33),
                read_deadline: Duration::from_millis(20),
            },
        );
        sched.start().unwrap();

        assert!(matches!(sched.tick().unwrap(), TickOutcome::Rendered(_)));
        sched.note_render(Duration::from_millis(50));
        assert_eq!(sched.tick().unwrap(), TickOutcome::Skipped);
        // Nothing was rendered by the skipped tick.
        sched.note_render(Duration::from_millis(50));
        assert!(matches!(sched.tick().unwrap(), TickOutcome::Rendered(_)));
        sched.note_render(Duration::from_millis(1));
        assert!(matches!(sched.tick().unwrap(), TickOutcome::Rendered(_)));
        assert_eq!(sched.stats().skipped, 1);
    }

    #[test]
    fn stop_handle_ends_session_from_another_thread() {
        let mut sched = scheduler(vec![Ok(samples(0, 0..2)), Ok(samples(0, 2..4))]);
        sched.start().unwrap();
        sched.tick().unwrap();

        let handle = sched.stop_handle();
        thread::spawn(move || handle.request_stop()).join().unwrap();

        assert_eq!(sched.tick().unwrap(), TickOutcome::Ended(EndReason::StopRequested));
        assert_eq!(sched.state(), SessionState::Stopped);
        assert_eq!(sched.source().closed, 1);
        assert_eq!(sched.buffer().total_len(), 2);

        // The request is consumed; a new session can start.
        sched.start().unwrap();
        assert_eq!(sched.state(), SessionState::Running);
    }

    #[test]
    fn disabled_channels_are_not_rendered() {
        let mut sched = scheduler(vec![Ok([samples(0, 0..2), samples(1, 0..2)].concat())]);
        sched.start().unwrap();
        sched.buffer().create_channel(1, "hidden");
        sched.buffer().set_enabled(1, false);
        sched.tick().unwrap();

        assert_eq!(sched.surface().series().map(|(id, _)| id).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn clock_does_not_catch_up() {
        let start = Instant::now();
        let interval = Duration::from_millis(10);
        let mut clock = TickClock::new(interval, start);

        assert!(clock.poll(start));
        assert!(!clock.poll(start + Duration::from_millis(5)));
        assert_eq!(clock.until_next(start + Duration::from_millis(5)), Duration::from_millis(5));

        // Far behind: one tick fires, then the schedule restarts from now.
        let late = start + Duration::from_millis(100);
        assert!(clock.poll(late));
        assert!(!clock.poll(late + Duration::from_millis(1)));
        assert_eq!(clock.until_next(late), interval);
    }
}
