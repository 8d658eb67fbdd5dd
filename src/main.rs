mod app;
mod config;
mod countdown;
mod theme;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use config::AppConfig;
use countdown::ticker::{Scheduler, Tick, TokioScheduler};
use countdown::{Countdown, Phase};
use theme::Theme;

#[derive(Parser, Debug)]
#[command(name = "countdown")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "A terminal countdown timer with start, pause, resume and reset")]
struct Args {
    /// Set the countdown to this many seconds at startup
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    duration: Option<u64>,

    /// Count down this many seconds on stdout, without the TUI
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    run: Option<u64>,

    /// Print one JSON object per tick (with --run)
    #[arg(long, requires = "run")]
    json: bool,

    /// Don't send a desktop notification when time is up
    #[arg(long)]
    no_notify: bool,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.run.is_none());

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if args.no_notify {
        config.notifications = false;
    }

    if let Some(secs) = args.run {
        return run_headless(&config, secs, args.json).await;
    }

    ui::init_theme(Theme::from_config(&config.theme));
    run_tui(&config, args.duration).await
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    File,
    Off,
}

/// Headless mode logs to stderr. The TUI owns the terminal, so there logs go
/// to a file, and only when RUST_LOG asks for them.
fn log_target(tui: bool, rust_log_set: bool) -> LogTarget {
    match (tui, rust_log_set) {
        (false, _) => LogTarget::Stderr,
        (true, true) => LogTarget::File,
        (true, false) => LogTarget::Off,
    }
}

fn init_logging(tui: bool) {
    let writer = match log_target(tui, std::env::var_os("RUST_LOG").is_some()) {
        LogTarget::Stderr => Some(BoxMakeWriter::new(io::stderr)),
        LogTarget::File => open_log_file().map(BoxMakeWriter::new),
        LogTarget::Off => None,
    };

    let fmt_layer = writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(!tui)
    });

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn open_log_file() -> Option<Mutex<File>> {
    let dir = dirs::cache_dir()?.join("countdown");
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("countdown.log"))
        .ok()
        .map(Mutex::new)
}

/// One line of headless output
#[derive(Debug, Serialize)]
struct Snapshot {
    text: String,
    remaining: u64,
    phase: Phase,
    label: &'static str,
}

impl Snapshot {
    fn of<S: Scheduler>(countdown: &Countdown<S>) -> Self {
        Self {
            text: countdown.display(),
            remaining: countdown.time_left(),
            phase: countdown.phase(),
            label: countdown.start_label(),
        }
    }
}

fn write_snapshot<S: Scheduler>(out: &mut impl Write, countdown: &Countdown<S>, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(&Snapshot::of(countdown))?)?;
    } else {
        writeln!(out, "{}", countdown.display())?;
    }
    Ok(())
}

/// Print the countdown after every tick until it finishes or `shutdown`
/// completes. Returns whether it ran to zero.
async fn drive_headless<S: Scheduler>(
    countdown: &mut Countdown<S>,
    ticks: &mut UnboundedReceiver<Tick>,
    out: &mut impl Write,
    json: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<bool> {
    tokio::pin!(shutdown);
    write_snapshot(out, countdown, json)?;

    while countdown.is_ticking() {
        tokio::select! {
            Some(tick) = ticks.recv() => {
                countdown.tick(tick);
                write_snapshot(out, countdown, json)?;
            }
            _ = &mut shutdown => return Ok(false),
        }
    }
    Ok(true)
}

async fn run_headless(config: &AppConfig, secs: u64, json: bool) -> Result<()> {
    let (scheduler, mut ticks) = TokioScheduler::new();
    let mut countdown = Countdown::with_period(scheduler, config.tick_period());
    countdown.set_input(Some(secs));
    countdown.set_duration();
    countdown.start();
    tracing::info!(secs, "headless countdown started");

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let finished = drive_headless(&mut countdown, &mut ticks, &mut io::stdout(), json, interrupted).await?;
    if !finished {
        tracing::info!("interrupted");
    } else if config.notifications {
        app::notify_finished();
    }
    Ok(())
}

async fn run_tui(config: &AppConfig, duration: Option<u64>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (scheduler, ticks) = TokioScheduler::new();
    let mut app = App::new(config, scheduler, duration);

    // Main loop
    let result = run_app(&mut terminal, &mut app, ticks).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut ticks: UnboundedReceiver<Tick>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app.is_quit_key(&key) {
                        return Ok(());
                    }
                    app.handle_key(key);
                }
            }
        }

        // Ticks delivered since the last pass
        while let Ok(tick) = ticks.try_recv() {
            app.on_tick(tick);
        }

        app.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::ticker::manual::ManualScheduler;
    use std::time::Duration;

    fn json_of<S: Scheduler>(countdown: &Countdown<S>) -> String {
        serde_json::to_string(&Snapshot::of(countdown)).unwrap()
    }

    fn lines(out: &[u8]) -> Vec<&str> {
        std::str::from_utf8(out).unwrap().lines().collect()
    }

    #[test]
    fn test_snapshot_json() {
        let mut countdown = Countdown::with_period(ManualScheduler::default(), Duration::from_secs(1));
        countdown.set_input(Some(65));
        countdown.set_duration();
        countdown.start();
        assert_eq!(
            json_of(&countdown),
            r#"{"text":"01:05","remaining":65,"phase":"running","label":"Start"}"#
        );

        countdown.pause();
        assert_eq!(
            json_of(&countdown),
            r#"{"text":"01:05","remaining":65,"phase":"paused","label":"Resume"}"#
        );

        countdown.set_input(Some(1));
        countdown.set_duration();
        countdown.start();
        let tick = countdown.live_tick();
        countdown.tick(tick);
        assert_eq!(
            json_of(&countdown),
            r#"{"text":"00:00","remaining":0,"phase":"finished","label":"Start"}"#
        );
    }

    #[test]
    fn test_args_validation() {
        assert!(Args::try_parse_from(["countdown", "--run", "0"]).is_err());
        assert!(Args::try_parse_from(["countdown", "--duration", "0"]).is_err());
        assert!(Args::try_parse_from(["countdown", "--json"]).is_err());

        let args = Args::try_parse_from(["countdown", "--run", "65", "--json", "--no-notify"]).unwrap();
        assert_eq!(args.run, Some(65));
        assert!(args.json);
        assert!(args.no_notify);

        let args = Args::try_parse_from(["countdown", "-d", "90"]).unwrap();
        assert_eq!(args.duration, Some(90));
        assert_eq!(args.run, None);
    }

    #[test]
    fn test_tui_never_logs_to_terminal() {
        assert_eq!(log_target(true, false), LogTarget::Off);
        assert_eq!(log_target(true, true), LogTarget::File);
        assert_eq!(log_target(false, false), LogTarget::Stderr);
        assert_eq!(log_target(false, true), LogTarget::Stderr);
    }

    #[tokio::test(start_paused = true)]
    async fn test_headless_runs_to_zero() {
        let (scheduler, mut ticks) = TokioScheduler::new();
        let mut countdown = Countdown::with_period(scheduler, Duration::from_secs(1));
        countdown.set_input(Some(3));
        countdown.set_duration();
        countdown.start();

        let start = tokio::time::Instant::now();
        let mut out = Vec::new();
        let finished = drive_headless(&mut countdown, &mut ticks, &mut out, false, std::future::pending())
            .await
            .unwrap();

        assert!(finished);
        assert_eq!(lines(&out), ["00:03", "00:02", "00:01", "00:00"]);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(countdown.phase(), Phase::Finished);
        assert!(!countdown.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_headless_stops_on_shutdown() {
        let (scheduler, mut ticks) = TokioScheduler::new();
        let mut countdown = Countdown::with_period(scheduler, Duration::from_secs(1));
        countdown.set_input(Some(10));
        countdown.set_duration();
        countdown.start();

        let mut out = Vec::new();
        let shutdown = tokio::time::sleep(Duration::from_millis(2500));
        let finished = drive_headless(&mut countdown, &mut ticks, &mut out, true, shutdown)
            .await
            .unwrap();

        assert!(!finished);
        let out = lines(&out);
        assert_eq!(out.len(), 3);
        assert!(out[2].contains(r#""remaining":8"#));
    }
}
