use crate::aggregation::{CumulativeAccumulator, Measures, WindowAccumulator};
use crate::event::Event;
use chrono::{DateTime, Duration, Utc};

/// One row of the cube: the all-time and trailing-window accumulators for a
/// single dimension key
#[derive(Debug, Clone)]
pub struct Cell {
    all_time: CumulativeAccumulator,
    window: WindowAccumulator,
}

impl Cell {
    /// Create an empty cell with the given window length
    pub fn new(window: Duration) -> Self {
        Self {
            all_time: CumulativeAccumulator::new(),
            window: WindowAccumulator::new(window),
        }
    }

    /// Feed an event to both accumulators.
    ///
    /// Returns false when the event is too old for the window and only
    /// counted all-time.
    pub fn add(&mut self, event: &Event) -> bool {
        self.all_time.add(event);
        self.window.add(event)
    }

    /// Expire window entries at `now`
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        self.window.expire(now)
    }

    /// All-time measures
    pub fn all_time(&self) -> Measures {
        self.all_time.snapshot()
    }

    /// Windowed measures as of the last expiry
    pub fn windowed(&self) -> Measures {
        self.window.snapshot()
    }

    /// Entries currently held by the window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
