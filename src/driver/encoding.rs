//! Cell encodings shared by every backend
//!
//! SUM and AVG cells hold integer accumulators scaled by [`PRECISION`] so
//! concurrent writers can add deltas without reading first. MIN and MAX
//! cells are written with an ordering key derived from the value; a
//! backend that keeps the write with the greatest key then keeps the
//! smallest (MIN) or largest (MAX) value.

use crate::error::{Result, StorageError};
use crate::types::AggregationMethod;

/// Fixed-point scale for accumulator cells
pub const PRECISION: f64 = 100_000.0;

// 2^63, the first f64 outside the i64 range
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Scale `value` to a fixed-point integer
pub fn to_fixed(value: f64) -> Result<i64> {
    let scaled = (value * PRECISION).round();
    if !scaled.is_finite() || scaled >= I64_BOUND || scaled < -I64_BOUND {
        return Err(StorageError::ValidationError(format!(
            "value {} cannot be encoded as fixed point",
            value
        )));
    }
    Ok(scaled as i64)
}

pub fn from_fixed(scaled: i64) -> f64 {
    scaled as f64 / PRECISION
}

/// Ordering key for a MAX cell: the scaled value itself
pub fn max_key(value: f64) -> Result<i64> {
    let key = to_fixed(value)?;
    if key <= 0 {
        return Err(StorageError::ValidationError(format!(
            "value {} too small for max ordering key",
            value
        )));
    }
    Ok(key)
}

/// Ordering key for a MIN cell: `i64::MAX` minus the scaled value
pub fn min_key(value: f64) -> Result<i64> {
    let scaled = to_fixed(value)?;
    i64::MAX
        .checked_sub(scaled)
        .filter(|key| *key > 0)
        .ok_or_else(|| {
            StorageError::ValidationError(format!(
                "value {} out of range for min ordering key",
                value
            ))
        })
}

/// Ordering key for methods that resolve by key, `None` for the rest
pub fn ordering_key(method: AggregationMethod, value: f64) -> Result<Option<i64>> {
    match method {
        AggregationMethod::Min => min_key(value).map(Some),
        AggregationMethod::Max => max_key(value).map(Some),
        AggregationMethod::Sum | AggregationMethod::Avg | AggregationMethod::Last => Ok(None),
    }
}

/// Stored contents of one cell, as read back from a backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    /// MIN, MAX and LAST cells
    Raw(f64),
    /// SUM accumulator
    Sum(i64),
    /// AVG accumulator and sample count
    Avg { acc: i64, count: i64 },
}

impl CellValue {
    /// Decode to the aggregated value; an AVG cell with no count has none
    pub fn decode(&self) -> Option<f64> {
        match *self {
            CellValue::Raw(v) => Some(v),
            CellValue::Sum(acc) => Some(from_fixed(acc)),
            CellValue::Avg { acc, count } if count > 0 => Some(from_fixed(acc) / count as f64),
            CellValue::Avg { .. } => None,
        }
    }
}
