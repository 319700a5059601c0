//! Paced replay of a recorded source into an [`EventProcessor`]
//!
//! A reader task walks the source, sleeps to reproduce the recorded spacing
//! and pushes events into a bounded channel. A single worker owns ingestion
//! and drains the channel in order. Malformed rows and out-of-order drops
//! are counted and skipped; anything else stops the replay.

use super::config::ReplayConfig;
use super::processor::EventProcessor;
use super::shutdown::ShutdownState;
use crate::error::{CubeError, Result};
use crate::event::Event;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Replay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Rows read from the source
    pub read: u64,
    /// Events applied
    pub ingested: u64,
    /// Rows rejected during normalization
    pub malformed: u64,
    /// Events dropped for arriving out of order
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct ReplayCounters {
    read: AtomicU64,
    ingested: AtomicU64,
    malformed: AtomicU64,
    dropped: AtomicU64,
}

impl ReplayCounters {
    fn snapshot(&self) -> ReplayStats {
        ReplayStats {
            read: self.read.load(Ordering::Relaxed),
            ingested: self.ingested.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Maps wall time onto event time during a replay.
///
/// After an event stamped `ts` is applied, the replay clock reads
/// `ts + elapsed * speed`, so a snapshot taken during a quiet stretch of the
/// recording still sees the window move. A frozen clock always reads the
/// latest event time.
#[derive(Debug)]
pub struct ReplayClock {
    speed: f64,
    last: Mutex<Option<(DateTime<Utc>, Instant)>>,
}

impl ReplayClock {
    /// Clock advancing at `speed` times wall-clock rate between events
    pub fn paced(speed: f64) -> Self {
        Self {
            speed,
            last: Mutex::new(None),
        }
    }

    /// Clock that only moves with events
    pub fn frozen() -> Self {
        Self::paced(0.0)
    }

    /// Record an applied event. Older timestamps are ignored.
    pub fn observe(&self, timestamp: DateTime<Utc>) {
        self.observe_at(timestamp, Instant::now());
    }

    /// Record an applied event seen at `at`
    pub fn observe_at(&self, timestamp: DateTime<Utc>, at: Instant) {
        let mut last = self.last.lock();
        match *last {
            Some((seen, _)) if seen >= timestamp => {}
            _ => *last = Some((timestamp, at)),
        }
    }

    /// Event time now, `None` before the first event
    pub fn now(&self) -> Option<DateTime<Utc>> {
        self.now_at(Instant::now())
    }

    /// Event time at wall-clock instant `at`
    pub fn now_at(&self, at: Instant) -> Option<DateTime<Utc>> {
        let (timestamp, seen) = (*self.last.lock())?;
        if self.speed <= 0.0 {
            return Some(timestamp);
        }
        let elapsed = at.saturating_duration_since(seen).as_secs_f64() * self.speed;
        // Past the representable range the replay has run off the calendar
        let advanced = Duration::try_from_secs_f64(elapsed)
            .ok()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .and_then(|d| timestamp.checked_add_signed(d));
        Some(advanced.unwrap_or(DateTime::<Utc>::MAX_UTC))
    }
}

/// Drives one replay
pub struct Replayer<P: EventProcessor> {
    config: ReplayConfig,
    processor: Arc<P>,
    shutdown: Arc<ShutdownState>,
    clock: Arc<ReplayClock>,
    counters: Arc<ReplayCounters>,
}

impl<P: EventProcessor> Replayer<P> {
    /// Create a replayer; fails on an invalid configuration
    pub fn new(config: ReplayConfig, processor: Arc<P>) -> Result<Self> {
        config.validate()?;
        let clock = if config.pacing {
            ReplayClock::paced(config.speed)
        } else {
            ReplayClock::frozen()
        };
        Ok(Self {
            config,
            processor,
            shutdown: Arc::new(ShutdownState::new()),
            clock: Arc::new(clock),
            counters: Arc::new(ReplayCounters::default()),
        })
    }

    /// Share an existing shutdown state, e.g. one wired to Ctrl-C
    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownState>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Shutdown state observed by the reader
    pub fn shutdown_state(&self) -> Arc<ShutdownState> {
        self.shutdown.clone()
    }

    /// Event-time clock for snapshots taken during the replay
    pub fn clock(&self) -> Arc<ReplayClock> {
        self.clock.clone()
    }

    /// Counters so far
    pub fn stats(&self) -> ReplayStats {
        self.counters.snapshot()
    }

    /// Replay `events` until the source is exhausted or shutdown begins.
    ///
    /// Returns the final counters. Recoverable per-event errors are counted;
    /// the first fatal error from the source or the processor is returned
    /// after the channel has been drained.
    pub async fn run<I>(&self, events: I) -> Result<ReplayStats>
    where
        I: Iterator<Item = Result<Event>> + Send + 'static,
    {
        info!(
            pacing = self.config.pacing,
            speed = self.config.speed,
            buffer = self.config.channel_buffer_size,
            "Starting replay"
        );
        let started = Instant::now();
        let (tx, rx) = mpsc::channel::<Event>(self.config.channel_buffer_size);

        let reader = tokio::spawn(read_loop(
            events,
            tx,
            self.config.clone(),
            self.shutdown.clone(),
            self.counters.clone(),
        ));

        let worked = self.work_loop(rx).await;
        let finished = self.processor.finish().await;
        let read = match reader.await {
            Ok(result) => result,
            Err(e) => Err(CubeError::Replay(e.to_string())),
        };

        self.shutdown.complete_shutdown();
        let stats = self.stats();
        info!(
            read = stats.read,
            ingested = stats.ingested,
            malformed = stats.malformed,
            dropped = stats.dropped,
            elapsed = ?started.elapsed(),
            "Replay finished"
        );

        worked.and(read).and(finished).map(|()| stats)
    }

    async fn work_loop(&self, mut rx: mpsc::Receiver<Event>) -> Result<()> {
        while let Some(event) = rx.recv().await {
            let outcome = self.processor.process(&event).await;
            self.shutdown.remove_inflight_event();
            match outcome {
                Ok(()) => {
                    self.counters.ingested.fetch_add(1, Ordering::Relaxed);
                    self.clock.observe(event.timestamp());
                    self.processor.on_success(&event).await;
                }
                Err(e) if e.is_recoverable() => {
                    let counter = match e {
                        CubeError::OutOfOrderEvent { .. } => &self.counters.dropped,
                        _ => &self.counters.malformed,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                    self.processor.on_failure(&e, &event).await;
                }
                Err(e) => {
                    error!(processor = self.processor.name(), error = %e, "Processing failed");
                    self.shutdown.begin_shutdown();
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

async fn read_loop<I>(
    events: I,
    tx: mpsc::Sender<Event>,
    config: ReplayConfig,
    shutdown: Arc<ShutdownState>,
    counters: Arc<ReplayCounters>,
) -> Result<()>
where
    I: Iterator<Item = Result<Event>> + Send + 'static,
{
    let mut prev: Option<DateTime<Utc>> = None;

    for item in events {
        if shutdown.is_shutting_down() {
            info!("Reader stopping on shutdown");
            break;
        }
        counters.read.fetch_add(1, Ordering::Relaxed);

        let event = match item {
            Ok(event) => event,
            Err(e) if e.is_recoverable() => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Skipping malformed row");
                continue;
            }
            Err(e) => {
                error!(error = %e, "Source failed");
                return Err(e);
            }
        };

        if let Some(delay) = prev.and_then(|p| config.pacing_delay(p, event.timestamp())) {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait() => {
                    info!("Reader stopping on shutdown");
                    break;
                }
            }
        }
        prev = Some(event.timestamp());

        shutdown.add_inflight_event();
        if tx.send(event).await.is_err() {
            shutdown.remove_inflight_event();
            debug!("Worker gone, reader stopping");
            break;
        }
    }
    Ok(())
}
