//! Aggregation engine: the single entry point adapters use
//!
//! [`CubeEngine`] owns the cube store and an event clock. Ingestion advances
//! the clock and updates one cell; snapshots expire every window at the
//! requested instant and read the rows back in key order. Because expiry
//! happens on read, a snapshot mutates state, so concurrent callers share the
//! engine through [`SharedCube`], which serializes both paths behind one
//! lock.

use crate::aggregation::{EngineConfig, Measure};
use crate::cube::{CubeRow, CubeStore, Dimension, DimensionHierarchy};
use crate::error::{CubeError, Result};
use crate::event::Event;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Counters describing what the engine has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Events applied to the cube
    pub ingested: u64,
    /// Events accepted behind the clock, within the late tolerance
    pub late_accepted: u64,
    /// Events dropped for arriving too far behind the clock
    pub dropped_out_of_order: u64,
    /// Cells in the cube
    pub cells: usize,
}

/// The cube as of one instant, with the columns to display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CubeSnapshot {
    /// Instant the windowed measures are anchored at
    pub taken_at: Option<DateTime<Utc>>,
    /// Key columns, outermost first
    pub dimensions: Vec<Dimension>,
    /// Configured measure columns
    pub measures: Vec<Measure>,
    /// One row per cell, ordered by key
    pub rows: Vec<CubeRow>,
}

impl CubeSnapshot {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the cube had no cells
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The incremental windowed aggregation engine
#[derive(Debug, Clone)]
pub struct CubeEngine {
    measures: Vec<Measure>,
    late_tolerance: Duration,
    store: CubeStore,
    /// Latest event timestamp accepted
    clock: Option<DateTime<Utc>>,
    /// Latest instant windows were expired at
    watermark: Option<DateTime<Utc>>,
    stats: EngineStats,
}

impl CubeEngine {
    /// Validate a configuration and build an empty engine.
    ///
    /// Fails with [`CubeError::Configuration`] on unknown or duplicated
    /// dimensions or measures, empty lists, or a zero window.
    pub fn configure(config: &EngineConfig) -> Result<Self> {
        let hierarchy = DimensionHierarchy::new(config.dimensions.as_slice())?;

        let mut measures: Vec<Measure> = Vec::with_capacity(config.measures.len());
        for name in &config.measures {
            let measure: Measure = name.parse()?;
            if measures.contains(&measure) {
                return Err(CubeError::Configuration(format!(
                    "measure '{}' listed twice",
                    measure
                )));
            }
            measures.push(measure);
        }
        if measures.is_empty() {
            return Err(CubeError::Configuration(
                "at least one measure is required".to_string(),
            ));
        }

        if config.window_seconds == 0 {
            return Err(CubeError::Configuration(
                "window must be at least one second".to_string(),
            ));
        }
        let window = to_chrono(config.window(), "window")?;
        let late_tolerance = to_chrono(config.late_tolerance(), "late tolerance")?;

        info!(
            dimensions = ?hierarchy.dimensions(),
            measures = ?measures.iter().map(ToString::to_string).collect::<Vec<_>>(),
            window_secs = config.window_seconds,
            late_tolerance_secs = config.late_tolerance_seconds,
            "Configured cube engine"
        );

        Ok(Self {
            measures,
            late_tolerance,
            store: CubeStore::new(hierarchy, window),
            clock: None,
            watermark: None,
            stats: EngineStats::default(),
        })
    }

    /// Apply one event.
    ///
    /// Events older than `clock - late_tolerance` are dropped with
    /// [`CubeError::OutOfOrderEvent`] and leave the cube untouched; the drop
    /// is counted in [`EngineStats::dropped_out_of_order`].
    pub fn ingest(&mut self, event: &Event) -> Result<()> {
        let timestamp = event.timestamp();
        let now = match self.clock {
            Some(clock) if timestamp < self.oldest_accepted(clock) => {
                self.stats.dropped_out_of_order += 1;
                warn!(
                    event_time = %timestamp,
                    clock = %clock,
                    dropped = self.stats.dropped_out_of_order,
                    "Dropping out-of-order event"
                );
                return Err(CubeError::OutOfOrderEvent {
                    timestamp,
                    clock,
                    tolerance_secs: self.late_tolerance.num_seconds(),
                });
            }
            Some(clock) if timestamp < clock => {
                self.stats.late_accepted += 1;
                clock
            }
            _ => timestamp,
        };
        self.clock = Some(now);

        let anchor = self.anchor(now);
        self.store.update(event, anchor);
        self.stats.ingested += 1;
        Ok(())
    }

    fn oldest_accepted(&self, clock: DateTime<Utc>) -> DateTime<Utc> {
        clock
            .checked_sub_signed(self.late_tolerance)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Expire every window at `now` (or at the latest instant already seen,
    /// if that is later). Returns the number of entries removed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let anchor = self.anchor(now);
        self.watermark = Some(anchor);
        self.store.expire(anchor)
    }

    /// Read the cube as of `now`.
    ///
    /// `now` may run ahead of the last event so that quiet periods still
    /// shrink the window. An instant earlier than what the engine has
    /// already seen is clamped forward, since expired entries cannot come
    /// back.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> CubeSnapshot {
        self.expire(now);
        self.collect()
    }

    /// Read the cube as of the latest instant seen, without advancing time
    pub fn current_snapshot(&mut self) -> CubeSnapshot {
        match self.watermark.max(self.clock) {
            Some(now) => self.snapshot(now),
            None => self.collect(),
        }
    }

    /// Latest event timestamp accepted
    pub fn clock(&self) -> Option<DateTime<Utc>> {
        self.clock
    }

    /// Configured measure columns
    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Grouping hierarchy
    pub fn hierarchy(&self) -> &DimensionHierarchy {
        self.store.hierarchy()
    }

    /// Underlying store
    pub fn store(&self) -> &CubeStore {
        &self.store
    }

    /// Counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cells: self.store.len(),
            ..self.stats
        }
    }

    fn anchor(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        [Some(now), self.clock, self.watermark]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(now)
    }

    fn collect(&self) -> CubeSnapshot {
        CubeSnapshot {
            taken_at: self.watermark,
            dimensions: self.store.hierarchy().dimensions().to_vec(),
            measures: self.measures.clone(),
            rows: self.store.snapshot().collect(),
        }
    }
}

fn to_chrono(duration: std::time::Duration, what: &str) -> Result<Duration> {
    Duration::from_std(duration)
        .map_err(|_| CubeError::Configuration(format!("{} out of range", what)))
}

/// Cloneable handle sharing one engine between the ingestion path and any
/// number of query paths
#[derive(Debug, Clone)]
pub struct SharedCube {
    inner: Arc<Mutex<CubeEngine>>,
}

impl SharedCube {
    /// Wrap an engine
    pub fn new(engine: CubeEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Validate a configuration and wrap the resulting engine
    pub fn configure(config: &EngineConfig) -> Result<Self> {
        CubeEngine::configure(config).map(Self::new)
    }

    /// See [`CubeEngine::ingest`]
    pub fn ingest(&self, event: &Event) -> Result<()> {
        self.inner.lock().ingest(event)
    }

    /// See [`CubeEngine::expire`]
    pub fn expire(&self, now: DateTime<Utc>) -> usize {
        self.inner.lock().expire(now)
    }

    /// See [`CubeEngine::snapshot`]
    pub fn snapshot(&self, now: DateTime<Utc>) -> CubeSnapshot {
        self.inner.lock().snapshot(now)
    }

    /// See [`CubeEngine::current_snapshot`]
    pub fn current_snapshot(&self) -> CubeSnapshot {
        self.inner.lock().current_snapshot()
    }

    /// Latest event timestamp accepted
    pub fn clock(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().clock()
    }

    /// Counters
    pub fn stats(&self) -> EngineStats {
        self.inner.lock().stats()
    }
}
