use super::{Cell, DimensionHierarchy, DimensionKey};
use crate::aggregation::{Measure, MeasureValue, Measures, Scope};
use crate::event::Event;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::btree_map::{BTreeMap, Entry};
use tracing::debug;

/// Mapping from dimension key to cell
///
/// Cells are created on the first event for their key and never removed.
/// Keys are kept sorted so snapshots list rows in the same order on every
/// call while the key set is unchanged.
#[derive(Debug, Clone)]
pub struct CubeStore {
    hierarchy: DimensionHierarchy,
    window: Duration,
    cells: BTreeMap<DimensionKey, Cell>,
}

/// A snapshot row: a cell's key with its all-time and windowed measures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CubeRow {
    /// Cell identity
    pub key: DimensionKey,
    /// Measures over the whole history
    pub all_time: Measures,
    /// Measures over the trailing window
    pub windowed: Measures,
}

impl CubeRow {
    /// Value of one measure column
    pub fn value(&self, measure: Measure) -> MeasureValue {
        match measure.scope {
            Scope::AllTime => self.all_time.get(measure.kind),
            Scope::Windowed => self.windowed.get(measure.kind),
        }
    }
}

impl CubeStore {
    /// Create an empty store
    pub fn new(hierarchy: DimensionHierarchy, window: Duration) -> Self {
        Self {
            hierarchy,
            window,
            cells: BTreeMap::new(),
        }
    }

    /// Grouping hierarchy
    pub fn hierarchy(&self) -> &DimensionHierarchy {
        &self.hierarchy
    }

    /// Build the cell key for an event
    pub fn key_for(&self, event: &Event) -> DimensionKey {
        self.hierarchy.key_for(event)
    }

    /// Route an event to its cell, creating the cell on first sight, then
    /// expire that cell's window at `now`.
    ///
    /// Returns false when the event was too old for the window and only
    /// counted all-time.
    pub fn update(&mut self, event: &Event, now: DateTime<Utc>) -> bool {
        let key = self.key_for(event);
        let cell = match self.cells.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(key = %entry.key(), "Creating cube cell");
                entry.insert(Cell::new(self.window))
            }
        };
        let windowed = cell.add(event);
        cell.expire(now);
        windowed
    }

    /// Expire every cell's window at `now`, returning the entries removed
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        self.cells.values_mut().map(|cell| cell.expire(now)).sum()
    }

    /// Rows in key order
    pub fn snapshot(&self) -> impl Iterator<Item = CubeRow> + '_ {
        self.cells.iter().map(|(key, cell)| CubeRow {
            key: key.clone(),
            all_time: cell.all_time(),
            windowed: cell.windowed(),
        })
    }

    /// Look up a cell
    pub fn get(&self, key: &DimensionKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no event has been stored yet
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Entries held across all windows
    pub fn window_entries(&self) -> usize {
        self.cells.values().map(Cell::window_len).sum()
    }
}
