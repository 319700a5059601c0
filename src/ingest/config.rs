//! Replay configuration structures

use crate::error::{CubeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk layout of an event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Comma-separated values with a header row
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl SourceFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "jsonl" | "ndjson" | "json" => Some(SourceFormat::Jsonl),
            _ => None,
        }
    }
}

/// Settings for replaying a recorded event file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Source format; guessed from the file extension when unset
    pub format: Option<SourceFormat>,

    /// Sleep between events to reproduce their original spacing
    pub pacing: bool,

    /// Replay speed multiplier (2.0 replays twice as fast)
    pub speed: f64,

    /// Longest single sleep, so gaps in the recording do not stall replay
    pub max_gap_seconds: u64,

    /// Capacity of the reader-to-worker channel
    pub channel_buffer_size: usize,

    /// Write every applied event to this JSON Lines file
    pub archive_path: Option<PathBuf>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            format: None,
            pacing: true,
            speed: 1.0,
            max_gap_seconds: 10,
            channel_buffer_size: 1000,
            archive_path: None,
        }
    }
}

/// Builder for ReplayConfig
pub struct ReplayConfigBuilder {
    config: ReplayConfig,
}

impl ReplayConfigBuilder {
    /// Create a new replay config builder
    pub fn new() -> Self {
        Self {
            config: ReplayConfig::default(),
        }
    }

    /// Set the source format
    pub fn format(mut self, format: SourceFormat) -> Self {
        self.config.format = Some(format);
        self
    }

    /// Enable or disable pacing
    pub fn pacing(mut self, pacing: bool) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// Set the speed multiplier
    pub fn speed(mut self, speed: f64) -> Self {
        self.config.speed = speed;
        self
    }

    /// Cap a single sleep
    pub fn max_gap(mut self, gap: Duration) -> Self {
        self.config.max_gap_seconds = gap.as_secs();
        self
    }

    /// Set the channel buffer size
    pub fn channel_buffer_size(mut self, size: usize) -> Self {
        self.config.channel_buffer_size = size;
        self
    }

    /// Archive applied events
    pub fn archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.archive_path = Some(path.into());
        self
    }

    /// Build the replay configuration
    pub fn build(self) -> ReplayConfig {
        self.config
    }
}

impl Default for ReplayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayConfig {
    /// Create a new replay config builder
    pub fn builder() -> ReplayConfigBuilder {
        ReplayConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(CubeError::Configuration(format!(
                "replay speed must be positive, got {}",
                self.speed
            )));
        }

        if self.channel_buffer_size == 0 {
            return Err(CubeError::Configuration(
                "channel buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Format of `path`, preferring the configured one
    pub fn format_for(&self, path: &Path) -> Result<SourceFormat> {
        self.format
            .or_else(|| SourceFormat::from_path(path))
            .ok_or_else(|| {
                CubeError::Configuration(format!(
                    "cannot tell the format of '{}'; set replay.format",
                    path.display()
                ))
            })
    }

    /// Longest single sleep
    pub fn max_gap(&self) -> Duration {
        Duration::from_secs(self.max_gap_seconds)
    }

    /// How long to wait before releasing an event stamped `next` after one
    /// stamped `prev`. `None` when pacing is off or no time passed.
    pub fn pacing_delay(&self, prev: DateTime<Utc>, next: DateTime<Utc>) -> Option<Duration> {
        if !self.pacing {
            return None;
        }
        let gap = (next - prev).to_std().ok()?;
        if gap.is_zero() {
            return None;
        }
        let scaled = Duration::try_from_secs_f64(gap.as_secs_f64() / self.speed)
            .map_or(self.max_gap(), |delay| delay.min(self.max_gap()));
        Some(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 11, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_builder() {
        let config = ReplayConfig::builder()
            .format(SourceFormat::Jsonl)
            .speed(4.0)
            .max_gap(Duration::from_secs(2))
            .channel_buffer_size(16)
            .archive_path("/tmp/archive.jsonl")
            .build();

        assert_eq!(config.format, Some(SourceFormat::Jsonl));
        assert_eq!(config.speed, 4.0);
        assert_eq!(config.max_gap(), Duration::from_secs(2));
        assert_eq!(config.channel_buffer_size, 16);
        assert!(config.pacing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(ReplayConfig::builder().speed(0.0).build().validate().is_err());
        assert!(ReplayConfig::builder().speed(-1.0).build().validate().is_err());
        assert!(ReplayConfig::builder().speed(f64::NAN).build().validate().is_err());
        assert!(ReplayConfig::builder()
            .channel_buffer_size(0)
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn test_pacing_delay() {
        let config = ReplayConfig::builder()
            .speed(2.0)
            .max_gap(Duration::from_secs(5))
            .build();

        assert_eq!(config.pacing_delay(t(0), t(4)), Some(Duration::from_secs(2)));
        // capped
        assert_eq!(config.pacing_delay(t(0), t(60)), Some(Duration::from_secs(5)));
        // same second or going backwards
        assert_eq!(config.pacing_delay(t(4), t(4)), None);
        assert_eq!(config.pacing_delay(t(4), t(1)), None);

        let unpaced = ReplayConfig::builder().pacing(false).build();
        assert_eq!(unpaced.pacing_delay(t(0), t(4)), None);
    }

    #[test]
    fn test_pacing_delay_at_extreme_speeds() {
        let crawl = ReplayConfig::builder()
            .speed(1e-20)
            .max_gap(Duration::from_secs(3))
            .build();
        assert!(crawl.validate().is_ok());
        assert_eq!(crawl.pacing_delay(t(0), t(1)), Some(Duration::from_secs(3)));

        let sprint = ReplayConfig::builder().speed(1e300).build();
        assert!(sprint.validate().is_ok());
        assert_eq!(sprint.pacing_delay(t(0), t(86_400)), Some(Duration::ZERO));
    }

    #[test]
    fn test_format_detection() {
        let config = ReplayConfig::default();
        assert_eq!(
            config.format_for(Path::new("2019-Nov.csv")).unwrap(),
            SourceFormat::Csv
        );
        assert_eq!(
            config.format_for(Path::new("events.JSONL")).unwrap(),
            SourceFormat::Jsonl
        );
        assert!(config.format_for(Path::new("events.parquet")).is_err());

        let forced = ReplayConfig::builder().format(SourceFormat::Jsonl).build();
        assert_eq!(
            forced.format_for(Path::new("events.txt")).unwrap(),
            SourceFormat::Jsonl
        );
    }
}
