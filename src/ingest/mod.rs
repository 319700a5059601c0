//! Replay adapter feeding recorded events into the cube
//!
//! This module provides the ingestion side of the pipeline:
//! - CSV and JSON Lines sources normalizing rows into [`Event`]s
//! - Paced replay through a bounded channel to a single worker
//! - A wall-clock to event-time mapping for live snapshots
//! - An optional JSON Lines archive of applied events
//! - Graceful shutdown
//!
//! # Example
//!
//! ```no_run
//! use stream_cube::ingest::{source, CubeProcessor, ReplayConfig, Replayer, SourceFormat};
//! use stream_cube::{EngineConfig, SharedCube};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cube = SharedCube::configure(&EngineConfig::default())?;
//! let processor = Arc::new(CubeProcessor::new(cube.clone()));
//!
//! let config = ReplayConfig::builder().pacing(false).build();
//! let replayer = Replayer::new(config, processor)?;
//! let events = source::open("2019-Nov.csv", SourceFormat::Csv)?;
//! let stats = replayer.run(events).await?;
//!
//! println!("{} events applied, {} cells", stats.ingested, cube.stats().cells);
//! # Ok(())
//! # }
//! ```
//!
//! [`Event`]: crate::event::Event

pub mod archive;
pub mod config;
pub mod processor;
pub mod replay;
pub mod shutdown;
pub mod source;

pub use archive::ArchiveSink;
pub use config::{ReplayConfig, ReplayConfigBuilder, SourceFormat};
pub use processor::{CubeProcessor, EventProcessor};
pub use replay::{ReplayClock, ReplayStats, Replayer};
pub use shutdown::ShutdownState;
pub use source::EventReader;
