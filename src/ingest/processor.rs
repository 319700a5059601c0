//! Event processor trait and the cube-backed implementation

use super::archive::ArchiveSink;
use crate::engine::SharedCube;
use crate::error::{CubeError, Result};
use crate::event::Event;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Trait for applying replayed events
#[async_trait]
pub trait EventProcessor: Send + Sync + 'static {
    /// Apply a single event
    async fn process(&self, event: &Event) -> Result<()>;

    /// Called when an event was applied
    async fn on_success(&self, _event: &Event) {}

    /// Called when an event was rejected with a recoverable error
    async fn on_failure(&self, error: &CubeError, event: &Event) {
        debug!(
            processor = self.name(),
            event_time = %event.timestamp(),
            error = %error,
            "Event not applied"
        );
    }

    /// Called once after the last event
    async fn finish(&self) -> Result<()> {
        Ok(())
    }

    /// Get processor name for logs
    fn name(&self) -> &str {
        "EventProcessor"
    }
}

/// Feeds events into a shared cube and optionally archives them
pub struct CubeProcessor {
    cube: SharedCube,
    archive: Option<ArchiveSink>,
}

impl CubeProcessor {
    /// Create a processor for `cube`
    pub fn new(cube: SharedCube) -> Self {
        Self {
            cube,
            archive: None,
        }
    }

    /// Also write every applied event to `archive`
    pub fn with_archive(mut self, archive: ArchiveSink) -> Self {
        self.archive = Some(archive);
        self
    }

    /// The cube events are applied to
    pub fn cube(&self) -> &SharedCube {
        &self.cube
    }
}

#[async_trait]
impl EventProcessor for CubeProcessor {
    async fn process(&self, event: &Event) -> Result<()> {
        self.cube.ingest(event)
    }

    async fn on_success(&self, event: &Event) {
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.append(event) {
                warn!(path = %archive.path().display(), error = %e, "Failed to archive event");
            }
        }
    }

    async fn finish(&self) -> Result<()> {
        if let Some(archive) = &self.archive {
            archive.flush()?;
            debug!(written = archive.written(), "Archive flushed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "CubeProcessor"
    }
}
