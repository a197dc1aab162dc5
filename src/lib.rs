//! Graphite-compatible multi-resolution metrics store
//!
//! Each sample is routed by its dotted path to a retention rule (a list of
//! tiers such as `10s:1d,1m:7d,1h:1y`) and an aggregation rule (min, max,
//! sum, avg or last). The sample is written to every tier concurrently;
//! reads pick the finest tier whose ttl covers the requested window and
//! return a slot per rollup interval.
//!
//! # Features
//!
//! - Regex-routed retention and aggregation rules with a default fallback
//! - Fixed-point accumulators for SUM and AVG, ordering keys for MIN and MAX
//! - Pluggable drivers: in-memory and PostgreSQL
//! - Name index with Graphite glob queries (`servers.*.cpu`, `{a,b}`, `[1-3]`)
//! - Pooled samples and series for the hot path
//!
//! # Example
//!
//! ```no_run
//! use rollup_store::{Sample, StorageConfig, StorageEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StorageEngine::connect(&StorageConfig::default()).await?;
//!
//!     engine.set(&Sample::new("servers.web1.cpu", 42.0, 1_700_000_000)).await?;
//!
//!     let (range, series) = engine.get("servers.web1.cpu", 1_700_000_000, 1_700_000_060).await?;
//!     println!("{} slots of {}s", series.len(), range.rollup);
//!     engine.release_series(series);
//!
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod index;
pub mod pool;
pub mod rules;
pub mod types;

// Retention tiers and query alignment live next to src/
#[path = "../retention/mod.rs"]
pub mod retention;

// PostgreSQL driver and index
#[path = "../postgres/mod.rs"]
pub mod postgres;

pub use aggregation::AggregationRules;
pub use config::{BackendKind, DatabaseConfig, PoolConfig, StorageConfig};
pub use driver::{MemoryDriver, StorageDriver};
pub use engine::{HealthStatus, SetReport, StorageEngine, MAX_QUERY_SLOTS};
pub use error::{Result, StorageError};
pub use index::{GlobPattern, IndexPath, MemoryIndex, NameIndex};
pub use pool::{ObjectPool, Recycle};
pub use postgres::{ConnectionPool, PostgresDriver, PostgresIndex, PurgeScheduler};
pub use retention::{Bucket, QueryRange, RetentionSchema};
pub use types::{AggregationMethod, Sample, SeriesResponse, SparseSeries};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing subscriber (for demos and tests)
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rollup_store=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();
}
