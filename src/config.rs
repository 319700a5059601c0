//! YAML configuration file
//!
//! ```yaml
//! engine:
//!   dimensions: [event_type, category_code]
//!   measures: [user_count, "price lm", "average price lm"]
//!   window_seconds: 60
//!   late_tolerance_seconds: 2
//! replay:
//!   format: csv
//!   speed: 10.0
//!   archive_path: applied.jsonl
//! render:
//!   format: table
//!   refresh: interval
//!   interval_seconds: 5
//! ```
//!
//! Every section and key is optional; missing ones take their defaults.

use crate::aggregation::EngineConfig;
use crate::engine::CubeEngine;
use crate::error::Result;
use crate::ingest::ReplayConfig;
use crate::render::RenderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Complete configuration for the cube and its adapters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeConfig {
    /// Aggregation settings
    pub engine: EngineConfig,
    /// Replay settings
    pub replay: ReplayConfig,
    /// Rendering settings
    pub render: RenderConfig,
}

impl CubeConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section, including that the engine section describes a
    /// buildable engine
    pub fn validate(&self) -> Result<()> {
        CubeEngine::configure(&self.engine)?;
        self.replay.validate()?;
        self.render.validate()
    }
}
