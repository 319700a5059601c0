use super::{CountedSet, Measures};
use crate::event::Event;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Trailing-window accumulator for one cube cell
///
/// Holds the contributions of every event with `timestamp > now - duration`
/// in time order, together with running totals, so that both adding and
/// expiring an event are O(1) amortized. Distinct users and products are
/// kept exact through reference-counted sets.
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    /// Length of the trailing window
    duration: Duration,
    /// Time-ordered entries in the window
    entries: VecDeque<WindowEntry>,
    users: CountedSet<i64>,
    products: CountedSet<i64>,
    price_sum: f64,
    /// Latest expiry boundary; entries at or before it are gone for good
    horizon: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct WindowEntry {
    timestamp: DateTime<Utc>,
    user_id: i64,
    product_id: i64,
    price: f64,
}

impl WindowAccumulator {
    /// Create an empty window of the given length
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            entries: VecDeque::new(),
            users: CountedSet::new(),
            products: CountedSet::new(),
            price_sum: 0.0,
            horizon: None,
        }
    }

    /// Add an event's contribution.
    ///
    /// Events normally arrive in timestamp order and are appended. A late
    /// event is inserted at its ordered position. Returns false, leaving the
    /// window untouched, when the event is at or behind the last expiry
    /// boundary.
    pub fn add(&mut self, event: &Event) -> bool {
        let timestamp = event.timestamp();
        if self.horizon.is_some_and(|h| timestamp <= h) {
            return false;
        }

        let entry = WindowEntry {
            timestamp,
            user_id: event.user_id(),
            product_id: event.product_id(),
            price: event.price(),
        };
        match self.entries.back() {
            Some(last) if last.timestamp > timestamp => {
                let idx = self.entries.partition_point(|e| e.timestamp <= timestamp);
                self.entries.insert(idx, entry);
            }
            _ => self.entries.push_back(entry),
        }

        self.users.insert(event.user_id());
        self.products.insert(event.product_id());
        self.price_sum += event.price();
        true
    }

    /// Remove every entry with `timestamp <= now - duration`.
    ///
    /// The boundary never moves backwards: expiring at an earlier `now` than
    /// a previous call is a no-op. Returns the number of entries removed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        // Windows longer than the representable past reach back to MIN_UTC
        let cutoff = now
            .checked_sub_signed(self.duration)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let boundary = match self.horizon {
            Some(h) => h.max(cutoff),
            None => cutoff,
        };
        self.horizon = Some(boundary);

        let mut removed = 0;
        while let Some(front) = self.entries.front() {
            if front.timestamp > boundary {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                self.users.remove(&entry.user_id);
                self.products.remove(&entry.product_id);
                self.price_sum -= entry.price;
                removed += 1;
            }
        }

        // Subtraction leaves float residue; an empty window sums to exactly 0
        if self.entries.is_empty() {
            self.price_sum = 0.0;
        }
        removed
    }

    /// Current windowed measures
    pub fn snapshot(&self) -> Measures {
        Measures::from_parts(
            self.users.len(),
            self.products.len(),
            self.price_sum,
            self.entries.len() as u64,
        )
    }

    /// Get the number of entries currently in the window
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the window holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get window duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get the time range currently covered by the window
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.entries.front(), self.entries.back()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}
