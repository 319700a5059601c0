use std::collections::HashMap;
use std::hash::Hash;

/// Multiset that tracks how many live window entries reference each value.
///
/// `len` is the number of distinct values with a non-zero count, so a
/// distinct count survives expiry without rescanning the window.
#[derive(Debug, Clone)]
pub struct CountedSet<T> {
    counts: HashMap<T, u32>,
}

impl<T: Eq + Hash + Copy> CountedSet<T> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    /// Add one reference to `value`. Returns true if the value is new.
    pub fn insert(&mut self, value: T) -> bool {
        let count = self.counts.entry(value).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop one reference to `value`. Returns true if this was the last one.
    ///
    /// Removing a value that is not present is a no-op and returns false.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.counts.get_mut(value) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(value);
                true
            }
            None => false,
        }
    }

    /// Whether `value` has at least one reference
    pub fn contains(&self, value: &T) -> bool {
        self.counts.contains_key(value)
    }

    /// References held for `value`
    pub fn count(&self, value: &T) -> u32 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

impl<T: Eq + Hash + Copy> Default for CountedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
