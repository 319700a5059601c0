//! Incremental OLAP cube over a live e-commerce event stream
//!
//! Events are grouped by a configurable dimension hierarchy. Every cell keeps
//! distinct-user and distinct-product counts, a price sum and a mean price,
//! both over all time and over a trailing window. The cube is updated per
//! event; reading it only expires what slid out of the window.
//!
//! # Example
//!
//! ```
//! use stream_cube::{CubeEngine, EngineConfig, EventBuilder};
//! use chrono::{Duration, TimeZone, Utc};
//!
//! # fn example() -> stream_cube::Result<()> {
//! let mut engine = CubeEngine::configure(&EngineConfig::default())?;
//!
//! let start = Utc.with_ymd_and_hms(2019, 11, 1, 0, 0, 0).unwrap();
//! for (secs, price) in [(0, 5.0), (10, 7.0), (70, 3.0)] {
//!     let event = EventBuilder::new()
//!         .timestamp(start + Duration::seconds(secs))
//!         .category("electronics.smartphone")
//!         .brand("apple")
//!         .price(price)
//!         .build()?;
//!     engine.ingest(&event)?;
//! }
//!
//! let snapshot = engine.snapshot(start + Duration::seconds(70));
//! assert_eq!(snapshot.rows[0].all_time.price_sum, 15.0);
//! assert_eq!(snapshot.rows[0].windowed.price_sum, 3.0);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Replaying a recording
//!
//! ```no_run
//! use stream_cube::ingest::{source, CubeProcessor, Replayer};
//! use stream_cube::{CubeConfig, SharedCube};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CubeConfig::from_file("cube.yaml")?;
//! let cube = SharedCube::configure(&config.engine)?;
//!
//! let path = "2019-Nov.csv";
//! let events = source::open(path, config.replay.format_for(path.as_ref())?)?;
//! let replayer = Replayer::new(config.replay.clone(), Arc::new(CubeProcessor::new(cube.clone())))?;
//! replayer.run(events).await?;
//!
//! let snapshot = cube.current_snapshot();
//! stream_cube::render::write_snapshot(&mut std::io::stdout(), &snapshot, config.render.format)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

// Re-export commonly used items
pub use aggregation::{EngineConfig, Measure, MeasureKind, MeasureValue, Measures, Scope};
pub use config::CubeConfig;
pub use cube::{CubeRow, Dimension, DimensionHierarchy, DimensionKey};
pub use engine::{CubeEngine, CubeSnapshot, EngineStats, SharedCube};
pub use error::{CubeError, Result};
pub use event::{Event, EventBuilder, EventType, RawEvent};

/// Per-cell accumulators and measure definitions
pub mod aggregation;

/// Configuration file
pub mod config;

/// Dimension hierarchy, cells and the cube store
pub mod cube;

/// Aggregation engine
pub mod engine;

/// Error types
pub mod error;

/// Event model and normalization
pub mod event;

/// Replay adapter
pub mod ingest;

/// Snapshot rendering
pub mod render;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber with JSON output on stderr
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

/// Initialize human-readable logging on stderr at `level`
///
/// `level` is an `EnvFilter` directive such as `info` or
/// `stream_cube=debug`; an invalid directive falls back to `info`.
pub fn init_tracing_with_level(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
