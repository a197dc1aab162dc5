//! Process-local storage driver
//!
//! Applies the same cell semantics a database backend provides: SUM and
//! AVG accumulate fixed-point deltas, MIN and MAX keep the write with the
//! greatest ordering key, LAST keeps the latest write, and every cell
//! expires after its bucket ttl.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::encoding::{self, CellValue};
use super::{fill_series, StorageDriver};
use crate::error::{Result, StorageError};
use crate::retention::{Bucket, QueryRange};
use crate::types::{AggregationMethod, SparseSeries};

/// Source of "now" for cell expiry
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    table: &'static str,
    rollup: u64,
    period: u64,
    path: String,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    value: CellValue,
    write_key: i64,
    expires_at: DateTime<Utc>,
}

/// In-memory driver keyed like the persisted tables
pub struct MemoryDriver {
    series: RwLock<HashMap<SeriesKey, BTreeMap<u64, Cell>>>,
    clock: Clock,
    closed: AtomicBool,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Use a custom clock for ttl handling
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            clock,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live cells across all series
    pub async fn cell_count(&self) -> usize {
        let now = (self.clock)();
        let series = self.series.read().await;
        series
            .values()
            .map(|cells| cells.values().filter(|c| c.expires_at > now).count())
            .sum()
    }

    /// Drop expired cells, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = (self.clock)();
        let mut series = self.series.write().await;
        let mut removed = 0;
        for cells in series.values_mut() {
            let before = cells.len();
            cells.retain(|_, c| c.expires_at > now);
            removed += before - cells.len();
        }
        series.retain(|_, cells| !cells.is_empty());
        removed
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::ConnectionError(
                "memory driver is closed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merge a new write into the existing cell, if any
fn merge(existing: Option<&Cell>, incoming: Cell) -> Option<Cell> {
    let Some(current) = existing else {
        return Some(incoming);
    };

    match (current.value, incoming.value) {
        (CellValue::Sum(acc), CellValue::Sum(delta)) => Some(Cell {
            value: CellValue::Sum(acc.saturating_add(delta)),
            ..incoming
        }),
        (CellValue::Avg { acc, count }, CellValue::Avg { acc: delta, .. }) => Some(Cell {
            value: CellValue::Avg {
                acc: acc.saturating_add(delta),
                count: count + 1,
            },
            ..incoming
        }),
        // Ordering-key cells: the greater key survives, losers change nothing
        _ if incoming.write_key > 0 => {
            (incoming.write_key > current.write_key).then_some(incoming)
        }
        _ => Some(incoming),
    }
}

#[async_trait]
impl StorageDriver for MemoryDriver {
    async fn write_sample(
        &self,
        path: &str,
        value: f64,
        timestamp: u32,
        bucket: &Bucket,
        method: AggregationMethod,
    ) -> Result<()> {
        self.check_open()?;

        let (cell_value, write_key) = match method {
            AggregationMethod::Sum => (CellValue::Sum(encoding::to_fixed(value)?), 0),
            AggregationMethod::Avg => (
                CellValue::Avg {
                    acc: encoding::to_fixed(value)?,
                    count: 1,
                },
                0,
            ),
            AggregationMethod::Last => (CellValue::Raw(value), 0),
            AggregationMethod::Min => (CellValue::Raw(value), encoding::min_key(value)?),
            AggregationMethod::Max => (CellValue::Raw(value), encoding::max_key(value)?),
        };

        let now = (self.clock)();
        let incoming = Cell {
            value: cell_value,
            write_key,
            expires_at: bucket.expires_at(now)?,
        };

        let key = SeriesKey {
            table: method.table(),
            rollup: bucket.rollup_secs(),
            period: bucket.period(),
            path: path.to_string(),
        };
        let time = bucket.round_down(timestamp as u64);

        let mut series = self.series.write().await;
        let cells = series.entry(key).or_default();
        let existing = cells.get(&time).filter(|c| c.expires_at > now);
        if let Some(merged) = merge(existing, incoming) {
            cells.insert(time, merged);
        }

        debug!("memory write {} {} @{} [{}]", path, method, time, bucket);
        Ok(())
    }

    async fn read_series(
        &self,
        path: &str,
        range: &QueryRange,
        method: AggregationMethod,
        out: &mut SparseSeries,
    ) -> Result<()> {
        self.check_open()?;

        let key = SeriesKey {
            table: method.table(),
            rollup: range.rollup,
            period: range.period,
            path: path.to_string(),
        };

        let now = (self.clock)();
        let series = self.series.read().await;
        if let Some(cells) = series.get(&key) {
            let rows = cells
                .range(range.aligned_lower..range.aligned_upper)
                .filter(|(_, c)| c.expires_at > now)
                .map(|(time, c)| (*time, c.value));
            fill_series(path, range, rows, out);
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        info!("Closing memory driver");
        self.closed.store(true, Ordering::Release);
    }
}
