use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the aggregation engine
///
/// Names are kept as strings here so a config file can be loaded before it
/// is checked; [`crate::CubeEngine::configure`] validates everything at
/// once and refuses partial configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grouping keys, outermost first
    pub dimensions: Vec<String>,
    /// Measure columns to report
    pub measures: Vec<String>,
    /// Length of the trailing window in seconds
    pub window_seconds: u64,
    /// How far behind the clock an event may arrive and still be accepted
    pub late_tolerance_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimensions: vec!["category_code".to_string()],
            measures: vec![
                "price_sum".to_string(),
                "price_sum_windowed".to_string(),
                "price_mean".to_string(),
                "price_mean_windowed".to_string(),
            ],
            window_seconds: 60,
            late_tolerance_seconds: 0,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with no late tolerance
    pub fn new<D, M>(dimensions: D, measures: M, window: Duration) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            dimensions: dimensions.into_iter().map(Into::into).collect(),
            measures: measures.into_iter().map(Into::into).collect(),
            window_seconds: window.as_secs(),
            late_tolerance_seconds: 0,
        }
    }

    /// Accept events up to `tolerance` behind the clock
    pub fn with_late_tolerance(mut self, tolerance: Duration) -> Self {
        self.late_tolerance_seconds = tolerance.as_secs();
        self
    }

    /// Length of the trailing window
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Late tolerance
    pub fn late_tolerance(&self) -> Duration {
        Duration::from_secs(self.late_tolerance_seconds)
    }
}
