//! Command-line interface for stream-cube
//!
//! Replays a recorded e-commerce event file into the cube and shows the
//! aggregated table while it runs, or ingests a whole file and prints one
//! snapshot.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stream_cube::event::parse_event_time;
use stream_cube::ingest::{
    source, ArchiveSink, CubeProcessor, ReplayStats, Replayer, ShutdownState, SourceFormat,
};
use stream_cube::render::{write_snapshot, OutputFormat, RefreshMode};
use stream_cube::{init_tracing, init_tracing_with_level, CubeConfig, SharedCube};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

/// Incremental OLAP cube over e-commerce events
#[derive(Parser, Debug)]
#[command(name = "stream-cube")]
#[command(version = stream_cube::VERSION)]
#[command(about = "Incremental OLAP cube with all-time and trailing-window measures", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Grouping dimensions, outermost first (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    dimensions: Option<Vec<String>>,

    /// Measure columns (comma-separated), e.g. `user_count,price lm`
    #[arg(short, long, value_delimiter = ',')]
    measures: Option<Vec<String>>,

    /// Trailing window length in seconds
    #[arg(short, long, value_name = "SECONDS")]
    window: Option<u64>,

    /// Accept events this many seconds behind the clock
    #[arg(long, value_name = "SECONDS")]
    late_tolerance: Option<u64>,

    /// Output format for snapshots
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Enable JSON structured logging
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recording with its original pacing and a live table
    Replay {
        /// Path to the events file (CSV or JSON Lines)
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Source format, guessed from the extension by default
        #[arg(long, value_enum)]
        format: Option<SourceFormat>,
        /// Replay speed multiplier
        #[arg(long)]
        speed: Option<f64>,
        /// Replay as fast as possible
        #[arg(long)]
        no_pacing: bool,
        /// Redraw trigger
        #[arg(long, value_enum)]
        refresh: Option<RefreshMode>,
        /// Seconds between redraws with `--refresh interval`
        #[arg(long, value_name = "SECONDS")]
        interval: Option<u64>,
        /// Archive applied events to this JSON Lines file
        #[arg(long, value_name = "FILE")]
        archive: Option<PathBuf>,
    },
    /// Ingest a whole file without pacing and print one snapshot
    Snapshot {
        /// Path to the events file (CSV or JSON Lines)
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Source format, guessed from the extension by default
        #[arg(long, value_enum)]
        format: Option<SourceFormat>,
        /// Anchor the window here instead of at the last event
        #[arg(long, value_name = "EVENT_TIME")]
        at: Option<String>,
    },
}

impl Cli {
    fn load_config(&self) -> Result<CubeConfig> {
        let mut config = match &self.config {
            Some(path) => CubeConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => CubeConfig::default(),
        };

        if let Some(dimensions) = &self.dimensions {
            config.engine.dimensions = dimensions.clone();
        }
        if let Some(measures) = &self.measures {
            config.engine.measures = measures.clone();
        }
        if let Some(window) = self.window {
            config.engine.window_seconds = window;
        }
        if let Some(tolerance) = self.late_tolerance {
            config.engine.late_tolerance_seconds = tolerance;
        }
        if let Some(output) = self.output {
            config.render.format = output;
        }

        match &self.command {
            Command::Replay {
                format,
                speed,
                no_pacing,
                refresh,
                interval,
                archive,
                ..
            } => {
                if format.is_some() {
                    config.replay.format = *format;
                }
                if let Some(speed) = speed {
                    config.replay.speed = *speed;
                }
                if *no_pacing {
                    config.replay.pacing = false;
                }
                if let Some(refresh) = refresh {
                    config.render.refresh = *refresh;
                }
                if let Some(interval) = interval {
                    config.render.interval_seconds = *interval;
                }
                if archive.is_some() {
                    config.replay.archive_path = archive.clone();
                }
            }
            Command::Snapshot { format, .. } => {
                if format.is_some() {
                    config.replay.format = *format;
                }
                config.replay.pacing = false;
            }
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.json_logs {
        init_tracing();
    } else {
        init_tracing_with_level(&cli.log_level);
    }

    let config = cli.load_config()?;
    let cube = SharedCube::configure(&config.engine).context("Failed to configure cube")?;

    // Set up graceful shutdown
    let shutdown = Arc::new(ShutdownState::new());
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                shutdown_clone.begin_shutdown();
            }
            Err(err) => {
                error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    });

    match &cli.command {
        Command::Replay { path, .. } => {
            let stats = replay(path, &config, cube.clone(), shutdown).await?;
            print_snapshot(&cube, None, config.render.format, false)?;
            info!("{}", summary(&stats, &cube));
        }
        Command::Snapshot { path, at, .. } => {
            let anchor = at
                .as_deref()
                .map(parse_event_time)
                .transpose()
                .context("Invalid --at time")?;
            let stats = ingest_all(path, &config, cube.clone(), shutdown).await?;
            print_snapshot(&cube, anchor, config.render.format, false)?;
            info!("{}", summary(&stats, &cube));
        }
    }

    Ok(())
}

fn build_replayer(
    config: &CubeConfig,
    cube: SharedCube,
    shutdown: Arc<ShutdownState>,
) -> Result<Replayer<CubeProcessor>> {
    let mut processor = CubeProcessor::new(cube);
    if let Some(path) = &config.replay.archive_path {
        let sink = ArchiveSink::open(path)
            .with_context(|| format!("Failed to open archive {}", path.display()))?;
        processor = processor.with_archive(sink);
    }
    let replayer = Replayer::new(config.replay.clone(), Arc::new(processor))
        .context("Failed to create replayer")?
        .with_shutdown(shutdown);
    Ok(replayer)
}

fn open_source(path: &Path, config: &CubeConfig) -> Result<source::EventReader> {
    let format = config.replay.format_for(path)?;
    info!(path = %path.display(), ?format, "Opening event source");
    source::open(path, format).with_context(|| format!("Failed to open {}", path.display()))
}

/// Ingest a whole file and wait for it
async fn ingest_all(
    path: &Path,
    config: &CubeConfig,
    cube: SharedCube,
    shutdown: Arc<ShutdownState>,
) -> Result<ReplayStats> {
    let events = open_source(path, config)?;
    let replayer = build_replayer(config, cube, shutdown)?;
    replayer.run(events).await.context("Replay failed")
}

/// Replay a file while redrawing the table
async fn replay(
    path: &Path,
    config: &CubeConfig,
    cube: SharedCube,
    shutdown: Arc<ShutdownState>,
) -> Result<ReplayStats> {
    let events = open_source(path, config)?;
    let replayer = build_replayer(config, cube.clone(), shutdown.clone())?;
    let clock = replayer.clock();
    let mut handle: JoinHandle<stream_cube::Result<ReplayStats>> =
        tokio::spawn(async move { replayer.run(events).await });

    let format = config.render.format;
    let result = match config.render.refresh {
        RefreshMode::Interval => {
            let mut ticker = tokio::time::interval(config.render.interval());
            loop {
                tokio::select! {
                    result = &mut handle => break result,
                    _ = ticker.tick() => {
                        if let Err(err) = print_snapshot(&cube, clock.now(), format, false) {
                            return Err(stop_replay(&shutdown, handle, err).await);
                        }
                    }
                }
            }
        }
        RefreshMode::Prompt => {
            let mut enter = spawn_stdin_lines();
            prompt();
            loop {
                tokio::select! {
                    result = &mut handle => break result,
                    line = enter.recv() => match line {
                        Some(()) => {
                            if let Err(err) = print_snapshot(&cube, clock.now(), format, true) {
                                return Err(stop_replay(&shutdown, handle, err).await);
                            }
                            prompt();
                        }
                        None => {
                            warn!("Stdin closed, waiting for replay to finish");
                            break (&mut handle).await;
                        }
                    },
                }
            }
        }
    };

    let stats = result
        .context("Replay task failed")?
        .context("Replay failed")?;
    Ok(stats)
}

/// Stop a running replay after the display failed, and hand back the
/// display error once the replay task has exited
async fn stop_replay(
    shutdown: &ShutdownState,
    handle: JoinHandle<stream_cube::Result<ReplayStats>>,
    err: anyhow::Error,
) -> anyhow::Error {
    error!("Display failed, stopping replay: {:#}", err);
    shutdown.begin_shutdown();
    if let Err(join_err) = handle.await {
        warn!("Replay task ended abnormally: {}", join_err);
    }
    err
}

/// Forward each line typed on stdin. A plain thread is used so a pending
/// read never holds up runtime shutdown.
fn spawn_stdin_lines() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.blocking_send(()).is_err() {
                break;
            }
        }
    });
    rx
}

fn prompt() {
    eprintln!("Press Enter to refresh, Ctrl-C to stop");
}

/// Print the cube as of `anchor`, or as of the latest instant seen
fn print_snapshot(
    cube: &SharedCube,
    anchor: Option<DateTime<Utc>>,
    format: OutputFormat,
    clear: bool,
) -> Result<()> {
    let snapshot = match anchor {
        Some(now) => cube.snapshot(now),
        None => cube.current_snapshot(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if clear {
        write!(out, "{}", CLEAR_SCREEN)?;
    }
    write_snapshot(&mut out, &snapshot, format).context("Failed to render snapshot")?;
    out.flush()?;
    Ok(())
}

fn summary(stats: &ReplayStats, cube: &SharedCube) -> String {
    let engine = cube.stats();
    format!(
        "Read {} rows: {} ingested ({} late), {} malformed, {} out of order; {} cells",
        stats.read,
        stats.ingested,
        engine.late_accepted,
        stats.malformed,
        stats.dropped,
        engine.cells
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_replay_waits_for_task() {
        let shutdown = Arc::new(ShutdownState::new());
        let task_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            task_shutdown.wait().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            task_shutdown.complete_shutdown();
            Ok::<_, stream_cube::CubeError>(ReplayStats::default())
        });

        let err = stop_replay(&shutdown, handle, anyhow::anyhow!("broken pipe")).await;
        assert_eq!(err.to_string(), "broken pipe");
        assert!(shutdown.is_shutting_down());
        assert!(shutdown.is_shutdown_complete());
    }
}
