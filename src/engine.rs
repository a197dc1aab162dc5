use crate::aggregation::AggregationRules;
use crate::config::{BackendKind, PoolConfig, StorageConfig};
use crate::driver::{MemoryDriver, StorageDriver};
use crate::error::{Result, StorageError};
use crate::index::{MemoryIndex, NameIndex};
use crate::pool::ObjectPool;
use crate::postgres::{ConnectionPool, PostgresDriver, PostgresIndex};
use crate::retention::{Bucket, QueryRange, RetentionSchema};
use crate::types::{Sample, SparseSeries};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Largest series a single `get` will allocate
pub const MAX_QUERY_SLOTS: usize = 1 << 20;

/// Outcome of fanning one sample out to its tiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetReport {
    /// Tiers the sample was routed to
    pub buckets: usize,
    /// Tier writes that succeeded
    pub written: usize,
    /// Tier writes that returned an error
    pub failed: usize,
    /// Tasks that panicked
    pub panicked: usize,
    /// Whether the name index accepted the path
    pub indexed: bool,
}

impl SetReport {
    pub fn is_complete(&self) -> bool {
        self.written == self.buckets && self.indexed
    }
}

/// Driver and index reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub driver: bool,
    pub index: bool,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.driver && self.index
    }
}

enum TaskOutcome {
    Write(Bucket, Result<()>),
    Index(Result<()>),
}

/// Routes samples to every retention tier and serves aligned reads
pub struct StorageEngine {
    driver: Arc<dyn StorageDriver>,
    index: Arc<dyn NameIndex>,
    schema: Arc<RetentionSchema>,
    aggregation: Arc<AggregationRules>,
    samples: ObjectPool<Sample>,
    series: ObjectPool<SparseSeries>,
}

impl StorageEngine {
    /// Create an engine over an already initialized driver and index
    pub fn new(
        driver: Arc<dyn StorageDriver>,
        index: Arc<dyn NameIndex>,
        schema: Arc<RetentionSchema>,
        aggregation: Arc<AggregationRules>,
    ) -> Self {
        Self::with_pools(driver, index, schema, aggregation, &PoolConfig::default())
    }

    pub fn with_pools(
        driver: Arc<dyn StorageDriver>,
        index: Arc<dyn NameIndex>,
        schema: Arc<RetentionSchema>,
        aggregation: Arc<AggregationRules>,
        pools: &PoolConfig,
    ) -> Self {
        Self {
            driver,
            index,
            schema,
            aggregation,
            samples: ObjectPool::new(pools.max_idle_samples),
            series: ObjectPool::new(pools.max_idle_series),
        }
    }

    /// Build rules, backends and the engine from configuration
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        info!("Initializing StorageEngine");

        let schema = Arc::new(config.build_schema()?);
        let aggregation = Arc::new(config.build_aggregation()?);
        info!(
            "Loaded {} retention rules and {} aggregation rules",
            schema.rule_count(),
            aggregation.rule_count()
        );

        let pg_pool = if config.backend == BackendKind::Postgres
            || config.index == BackendKind::Postgres
        {
            let pool = Arc::new(ConnectionPool::new(&config.database).await?);
            pool.init_schema().await?;
            Some(pool)
        } else {
            None
        };

        let driver: Arc<dyn StorageDriver> = match (config.backend, &pg_pool) {
            (BackendKind::Postgres, Some(pool)) => Arc::new(PostgresDriver::new(Arc::clone(pool))),
            _ => Arc::new(MemoryDriver::new()),
        };
        let index: Arc<dyn NameIndex> = match (config.index, &pg_pool) {
            (BackendKind::Postgres, Some(pool)) => Arc::new(PostgresIndex::new(Arc::clone(pool))),
            _ => Arc::new(MemoryIndex::new()),
        };

        Ok(Self::with_pools(
            driver,
            index,
            schema,
            aggregation,
            &config.pools,
        ))
    }

    /// Write one sample into every tier of its retention rule
    ///
    /// Waits for all tier writes and the index update. Individual failures
    /// are logged and counted in the report; only rule resolution errors
    /// are returned.
    pub async fn set(&self, sample: &Sample) -> Result<SetReport> {
        let start = Instant::now();

        let buckets = self.schema.buckets(&sample.path)?;
        let method = self.aggregation.match_method(&sample.path)?;

        // Tasks get their own copies; the pooled sample stays with the caller
        let path: Arc<str> = Arc::from(sample.path.as_str());
        let value = sample.value;
        let timestamp = sample.timestamp;

        let mut tasks = JoinSet::new();
        for bucket in buckets.iter().copied() {
            let driver = Arc::clone(&self.driver);
            let path = Arc::clone(&path);
            tasks.spawn(async move {
                let result = driver
                    .write_sample(&path, value, timestamp, &bucket, method)
                    .await;
                TaskOutcome::Write(bucket, result)
            });
        }
        {
            let index = Arc::clone(&self.index);
            let path = Arc::clone(&path);
            tasks.spawn(async move { TaskOutcome::Index(index.update(&path).await) });
        }

        let mut report = SetReport {
            buckets: buckets.len(),
            ..SetReport::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Write(_, Ok(()))) => report.written += 1,
                Ok(TaskOutcome::Write(bucket, Err(e @ StorageError::ValidationError(_)))) => {
                    warn!("Skipped {} [{}]: {}", path, bucket, e);
                    report.failed += 1;
                }
                Ok(TaskOutcome::Write(bucket, Err(e))) => {
                    error!("Write failed for {} [{}]: {}", path, bucket, e);
                    report.failed += 1;
                }
                Ok(TaskOutcome::Index(Ok(()))) => report.indexed = true,
                Ok(TaskOutcome::Index(Err(e))) => {
                    error!("Index update failed for {}: {}", path, e);
                }
                Err(e) => {
                    error!("Task for {} did not complete: {}", path, e);
                    report.panicked += 1;
                }
            }
        }

        debug!(
            "set {} {} ({}) -> {}/{} tiers in {:?}",
            path,
            value,
            method,
            report.written,
            report.buckets,
            start.elapsed()
        );
        Ok(report)
    }

    /// Read `path` over `[from, to]` from the tier chosen by the schema
    ///
    /// A backend failure yields an all-empty series. A window wider than
    /// [`MAX_QUERY_SLOTS`] slots of the chosen tier is a `ValidationError`.
    /// Hand the series back with [`release_series`](Self::release_series)
    /// once serialized.
    pub async fn get(&self, path: &str, from: u32, to: u32) -> Result<(QueryRange, SparseSeries)> {
        let range = self.schema.resolve_range(path, from, to)?;
        let method = self.aggregation.match_method(path)?;

        if range.slot_count() > MAX_QUERY_SLOTS {
            return Err(StorageError::ValidationError(format!(
                "{} slots of {}s requested for {}, limit is {}",
                range.slot_count(),
                range.rollup,
                path,
                MAX_QUERY_SLOTS
            )));
        }

        let mut series = self.series.acquire();
        series.reset_to(range.slot_count());

        match self.driver.read_series(path, &range, method, &mut series).await {
            Ok(()) => debug!(
                "get {} [{}..{}) step {}: {} of {} slots filled",
                path,
                range.aligned_lower,
                range.aligned_upper,
                range.rollup,
                series.filled(),
                series.len()
            ),
            Err(e) => {
                error!("Read failed for {}: {}", path, e);
                series.reset_to(range.slot_count());
            }
        }

        Ok((range, series))
    }

    /// Take a sample from the pool
    pub fn acquire_sample(&self) -> Sample {
        self.samples.acquire()
    }

    /// Return a sample once no task still needs it
    pub fn release_sample(&self, sample: Sample) {
        self.samples.release(sample);
    }

    /// Return a series obtained from [`get`](Self::get)
    pub fn release_series(&self, series: SparseSeries) {
        self.series.release(series);
    }

    pub fn index(&self) -> &Arc<dyn NameIndex> {
        &self.index
    }

    pub fn schema(&self) -> &RetentionSchema {
        &self.schema
    }

    pub fn aggregation(&self) -> &AggregationRules {
        &self.aggregation
    }

    pub async fn health(&self) -> HealthStatus {
        let (driver, index) = tokio::join!(self.driver.health_check(), self.index.ping());
        HealthStatus { driver, index }
    }

    pub async fn close(&self) {
        info!("Closing StorageEngine");
        self.driver.close().await;
        self.index.close().await;
    }
}
