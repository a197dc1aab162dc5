use super::bucket::Bucket;
use serde::Serialize;

/// Query window aligned to one bucket's rollup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryRange {
    pub requested_start: u32,
    pub requested_end: u32,
    /// Inclusive, multiple of `rollup`
    pub aligned_lower: u64,
    /// Exclusive, multiple of `rollup`
    pub aligned_upper: u64,
    pub period: u64,
    pub rollup: u64,
}

impl QueryRange {
    /// Align `[from, to]` to `bucket`. An inverted range collapses to `from`.
    pub fn new(bucket: &Bucket, from: u32, to: u32) -> Self {
        let to = to.max(from);
        let rollup = bucket.rollup_secs();

        let aligned_lower = bucket.round_down(from as u64);
        let mut aligned_upper = bucket.round_down(to as u64);
        if aligned_upper < to as u64 {
            aligned_upper += rollup;
        }

        Self {
            requested_start: from,
            requested_end: to,
            aligned_lower,
            aligned_upper,
            period: bucket.period(),
            rollup,
        }
    }

    /// Number of rollup-wide slots in the window
    pub fn slot_count(&self) -> usize {
        ((self.aligned_upper - self.aligned_lower) / self.rollup) as usize
    }

    /// Slot holding `timestamp`, `None` when it floors outside the window
    pub fn slot_index(&self, timestamp: u64) -> Option<usize> {
        let floored = (timestamp / self.rollup) * self.rollup;
        if floored < self.aligned_lower || floored >= self.aligned_upper {
            return None;
        }
        Some(((floored - self.aligned_lower) / self.rollup) as usize)
    }

    /// Start time of slot `index`
    pub fn slot_time(&self, index: usize) -> u64 {
        self.aligned_lower + index as u64 * self.rollup
    }
}
