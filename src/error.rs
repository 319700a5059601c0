/// Error types for the cube engine and its adapters
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for cube operations
#[derive(Error, Debug)]
pub enum CubeError {
    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Event arrived behind the engine clock by more than the late tolerance
    #[error("Out-of-order event at {timestamp} (clock {clock}, tolerance {tolerance_secs}s)")]
    OutOfOrderEvent {
        /// Timestamp carried by the rejected event
        timestamp: DateTime<Utc>,
        /// Engine clock when the event arrived
        clock: DateTime<Utc>,
        /// Configured late tolerance in seconds
        tolerance_secs: i64,
    },

    /// Event could not be normalized
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// CSV decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// YAML parsing failed
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A replay task panicked or was cancelled
    #[error("Replay task failed: {0}")]
    Replay(String),
}

impl CubeError {
    /// Whether ingestion may continue after this error.
    ///
    /// Per-event failures drop a single event; everything else stops the
    /// pipeline.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CubeError::OutOfOrderEvent { .. } | CubeError::MalformedEvent(_)
        )
    }
}

/// Result type alias for cube operations
pub type Result<T> = std::result::Result<T, CubeError>;
