//! graphview - a streaming graph viewer for the terminal.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use graphview::app::App;
use graphview::buffer::OrderPolicy;
use graphview::config::{self, ViewerConfig};
use graphview::scheduler::{SessionState, TickClock, TickOutcome};
use graphview::source::{RecordFormat, ReplayMode, SourceKind, SyntheticConfig, Waveform};
use graphview::GraphViewError;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit status for a fatal source failure.
const EXIT_SOURCE_FAILURE: u8 = 1;
/// Exit status for an unusable configuration.
const EXIT_INVALID_CONFIG: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReplayArg {
    /// Honour recorded timestamps.
    Paced,
    /// Release samples as fast as possible.
    Batch,
}

#[derive(Parser, Debug)]
#[command(name = "graphview")]
#[command(about = "A streaming graph viewer for the terminal", long_about = None)]
struct Args {
    /// Data file, `host:port`, or `-` for stdin; omit for the synthetic generator
    source: Option<String>,

    /// Source kind (inferred from SOURCE when omitted)
    #[arg(long, value_enum)]
    kind: Option<SourceKind>,

    /// Samples kept per channel
    #[arg(long, default_value_t = config::DEFAULT_CAPACITY)]
    capacity: usize,

    /// Tick interval in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_TICK_INTERVAL_MS)]
    tick_ms: u64,

    /// Source read deadline in milliseconds (below the tick interval)
    #[arg(long, default_value_t = config::DEFAULT_READ_DEADLINE_MS)]
    deadline_ms: u64,

    /// Record format of a data file (guessed from the extension when omitted)
    #[arg(long, value_enum)]
    format: Option<RecordFormat>,

    /// File replay pacing
    #[arg(long, value_enum, default_value_t = ReplayArg::Paced)]
    replay: ReplayArg,

    /// Paced replay speed factor
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Maximum samples taken per read
    #[arg(long, default_value_t = config::DEFAULT_MAX_BATCH)]
    max_batch: usize,

    /// Only show the last SECS seconds of each channel
    #[arg(long, value_name = "SECS")]
    window: Option<f64>,

    /// Drop samples whose timestamp goes backwards
    #[arg(long)]
    strict_order: bool,

    /// Synthetic waveform as kind[:A[:B]] (sine, power, sawtooth); repeatable
    #[arg(long = "wave", value_name = "SPEC")]
    waves: Vec<Waveform>,

    /// Synthetic x steps generated per tick
    #[arg(long, default_value_t = 4)]
    samples_per_tick: usize,

    /// Synthetic sampling step (derived from the function when omitted)
    #[arg(long)]
    step: Option<f64>,

    /// First synthetic x value
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    x_start: f64,

    /// Last synthetic x value; the generator ends there
    #[arg(long, allow_negative_numbers = true)]
    x_end: Option<f64>,

    /// Run without the terminal UI and print a summary on exit
    #[arg(long)]
    headless: bool,

    /// Headless surface width in pixels
    #[arg(long, default_value_t = 120)]
    width: usize,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Enable logging to specified file
    #[arg(long)]
    log: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> ViewerConfig {
        let adapter_kind = self
            .kind
            .unwrap_or_else(|| ViewerConfig::infer_kind(self.source.as_deref()));
        let replay = match self.replay {
            ReplayArg::Paced => ReplayMode::Paced { speed: self.speed },
            ReplayArg::Batch => ReplayMode::Batch,
        };
        let waves = if self.waves.is_empty() {
            vec![Waveform::default()]
        } else {
            self.waves.clone()
        };

        ViewerConfig {
            buffer_capacity_per_channel: self.capacity,
            tick_interval_ms: self.tick_ms,
            read_deadline_ms: self.deadline_ms,
            adapter_kind,
            source_path_or_address: self.source.clone(),
            record_format: self.format,
            replay,
            max_batch: self.max_batch,
            window_secs: self.window,
            order_policy: if self.strict_order {
                OrderPolicy::Reject
            } else {
                OrderPolicy::Accept
            },
            synthetic: SyntheticConfig {
                waves,
                samples_per_batch: self.samples_per_tick,
                step: self.step,
                x_start: self.x_start,
                x_end: self.x_end,
            },
            ..ViewerConfig::default()
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    if let Some(log_path) = &args.log {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("failed to create log file {}", log_path.display()))?;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else if args.headless {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_INVALID_CONFIG);
    }
    tracing::info!("Starting graphview");

    let config = args.to_config();
    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_INVALID_CONFIG);
    }

    let result = if args.headless {
        run_headless(&config, &args)
    } else {
        run_terminal(&config)
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<GraphViewError>() {
                Some(GraphViewError::InvalidConfiguration(_)) => {
                    ExitCode::from(EXIT_INVALID_CONFIG)
                },
                _ => ExitCode::from(EXIT_SOURCE_FAILURE),
            }
        },
    };
    tracing::info!("graphview exited");
    code
}

/// Tick until the source ends, fails or `--max-ticks` is reached, then print
/// what the surface holds.
fn run_headless(config: &ViewerConfig, args: &Args) -> Result<ExitCode> {
    let mut app = App::new(config)?;
    app.scheduler.surface_mut().set_width(args.width.max(1));
    app.start()?;

    let mut clock = TickClock::new(config.tick_interval(), Instant::now());
    let mut ticks = 0u64;
    let mut failure = None;
    loop {
        if args.max_ticks.is_some_and(|max| ticks >= max) {
            app.scheduler.stop();
            break;
        }
        let now = Instant::now();
        if !clock.poll(now) {
            std::thread::sleep(clock.until_next(now));
            continue;
        }
        ticks += 1;
        match app.tick() {
            Ok(TickOutcome::Ended(_)) => break,
            Ok(_) => {},
            Err(e) => {
                failure = Some(e);
                break;
            },
        }
    }

    println!("{}", app.title);
    for line in app.scheduler.surface().summary_lines() {
        println!("{}", line);
    }
    let stats = app.scheduler.stats();
    println!(
        "{} samples, {} frames, {} skipped ticks",
        stats.samples, stats.rendered, stats.skipped
    );

    match failure {
        Some(e) => {
            eprintln!("Error: {}", e);
            Ok(ExitCode::from(EXIT_SOURCE_FAILURE))
        },
        None => Ok(ExitCode::SUCCESS),
    }
}

fn run_terminal(config: &ViewerConfig) -> Result<ExitCode> {
    let mut app = App::new(config)?;
    app.start()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    if app.failed {
        if let Some(error) = &app.error_message {
            eprintln!("Error: {}", error);
        }
        return Ok(ExitCode::from(EXIT_SOURCE_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    config: &ViewerConfig,
) -> Result<()> {
    let mut clock = TickClock::new(config.tick_interval(), Instant::now());

    loop {
        let now = Instant::now();
        if clock.poll(now) {
            // Fatal errors are shown in the status bar; the user quits.
            let outcome = app.tick();
            let painted = Instant::now();
            terminal.draw(|f| graphview::ui::draw(f, app))?;
            if let Ok(TickOutcome::Rendered(_)) = outcome {
                app.note_render(painted.elapsed());
            }
        }

        if event::poll(clock.until_next(Instant::now()))? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match (key.modifiers, key.code) {
                (KeyModifiers::NONE, KeyCode::Char('q'))
                | (KeyModifiers::NONE, KeyCode::Esc)
                | (KeyModifiers::CONTROL, KeyCode::Char('c')) => return Ok(()),

                (KeyModifiers::NONE, KeyCode::Char(' ')) => app.toggle_pause(),
                (KeyModifiers::NONE, KeyCode::Char('s')) => app.toggle_session(),
                (KeyModifiers::NONE, KeyCode::Char(c @ '1'..='9')) => {
                    app.toggle_channel(c as usize - '0' as usize);
                },
                (KeyModifiers::NONE, KeyCode::Char('c')) => app.clear_buffers(),
                (KeyModifiers::NONE, KeyCode::Char('y')) => app.copy_summary(),
                (KeyModifiers::SHIFT, KeyCode::Char('T')) => app.cycle_theme(),
                _ => {},
            }

            // Reflect key presses immediately when not ticking.
            if app.scheduler.state() != SessionState::Running {
                terminal.draw(|f| graphview::ui::draw(f, app))?;
            }
        }
    }
}
