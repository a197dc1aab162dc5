//! Storage driver contract
//!
//! A driver encodes one sample into one retention tier and reads a
//! time-aligned series back. Drivers are not tied to a particular
//! database; see [`encoding`] for the cell encodings every driver uses.

pub mod encoding;
pub mod memory;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::retention::{Bucket, QueryRange};
use crate::types::{AggregationMethod, SparseSeries};

pub use encoding::{CellValue, PRECISION};
pub use memory::MemoryDriver;

/// Backend that persists aggregated cells
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Write one sample into one tier
    ///
    /// The cell is keyed by `(rollup, period, path, bucket.round_down(timestamp))`
    /// and expires after the bucket ttl.
    async fn write_sample(
        &self,
        path: &str,
        value: f64,
        timestamp: u32,
        bucket: &Bucket,
        method: AggregationMethod,
    ) -> Result<()>;

    /// Fill `out` with the cells of `path` inside `range`
    ///
    /// `out` must already hold `range.slot_count()` empty slots.
    async fn read_series(
        &self,
        path: &str,
        range: &QueryRange,
        method: AggregationMethod,
        out: &mut SparseSeries,
    ) -> Result<()>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Release backend resources
    async fn close(&self);
}

/// Place decoded rows into their slots, dropping rows outside `range`
///
/// Returns the number of rows placed.
pub fn fill_series<I>(path: &str, range: &QueryRange, rows: I, out: &mut SparseSeries) -> usize
where
    I: IntoIterator<Item = (u64, CellValue)>,
{
    let mut placed = 0;
    for (time, cell) in rows {
        let Some(index) = range.slot_index(time) else {
            warn!(
                "Dropping out-of-range row for {} at {} (window {}..{})",
                path, time, range.aligned_lower, range.aligned_upper
            );
            continue;
        };

        if let Some(value) = cell.decode() {
            if out.set(index, value) {
                placed += 1;
            }
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_series_drops_out_of_range_rows() {
        let bucket: Bucket = "10s:1d".parse().unwrap();
        let range = QueryRange::new(&bucket, 1_000, 1_030);
        let mut out = SparseSeries::with_len(range.slot_count());

        let rows = vec![
            (990, CellValue::Raw(9.0)),
            (1_000, CellValue::Sum(200_000)),
            (1_020, CellValue::Avg { acc: 300_000, count: 3 }),
            (1_030, CellValue::Raw(7.0)),
        ];

        let placed = fill_series("a.b", &range, rows, &mut out);
        assert_eq!(placed, 2);
        assert_eq!(out.slots(), &[Some(2.0), None, Some(1.0)]);
    }
}
