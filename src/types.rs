use crate::error::StorageError;
use crate::pool::Recycle;
use crate::retention::QueryRange;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single decoded metric sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub path: String,
    pub value: f64,
    /// Unix seconds
    pub timestamp: u32,
}

impl Sample {
    /// Create a new sample
    pub fn new(path: impl Into<String>, value: f64, timestamp: u32) -> Self {
        Self {
            path: path.into(),
            value,
            timestamp,
        }
    }

    /// Overwrite all fields in place, reusing the path allocation
    pub fn fill(&mut self, path: &str, value: f64, timestamp: u32) {
        self.path.clear();
        self.path.push_str(path);
        self.value = value;
        self.timestamp = timestamp;
    }
}

impl Recycle for Sample {
    fn reset(&mut self) {
        self.path.clear();
        self.value = 0.0;
        self.timestamp = 0;
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.value, self.timestamp)
    }
}

/// Aggregation method applied when several samples land in one cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    Min,
    Max,
    Sum,
    Avg,
    Last,
}

impl AggregationMethod {
    /// Name of the table family that stores cells for this method
    pub fn table(&self) -> &'static str {
        match self {
            AggregationMethod::Min | AggregationMethod::Max | AggregationMethod::Last => {
                "minmaxlast"
            }
            AggregationMethod::Sum => "sum",
            AggregationMethod::Avg => "avg",
        }
    }

    /// Whether cells for this method hold fixed-point accumulators
    pub fn is_accumulator(&self) -> bool {
        matches!(self, AggregationMethod::Sum | AggregationMethod::Avg)
    }
}

impl FromStr for AggregationMethod {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(AggregationMethod::Min),
            "max" => Ok(AggregationMethod::Max),
            "sum" => Ok(AggregationMethod::Sum),
            "avg" => Ok(AggregationMethod::Avg),
            "average" => Ok(AggregationMethod::Avg),
            "last" => Ok(AggregationMethod::Last),
            other => Err(StorageError::ConfigError(format!(
                "invalid aggregation method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMethod::Min => write!(f, "min"),
            AggregationMethod::Max => write!(f, "max"),
            AggregationMethod::Sum => write!(f, "sum"),
            AggregationMethod::Avg => write!(f, "avg"),
            AggregationMethod::Last => write!(f, "last"),
        }
    }
}

/// Fixed-length run of nullable values, one slot per rollup interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseSeries {
    slots: Vec<Option<f64>>,
}

impl SparseSeries {
    /// Create an all-empty series with `len` slots
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Clear and resize to `len` empty slots, keeping the allocation
    pub fn reset_to(&mut self, len: usize) {
        self.slots.clear();
        self.slots.resize(len, None);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.slots.get(index).copied().flatten()
    }

    /// Store a value; returns false if `index` is past the end
    pub fn set(&mut self, index: usize, value: f64) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn slots(&self) -> &[Option<f64>] {
        &self.slots
    }

    /// Number of slots that hold data
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.slots.iter().copied()
    }
}

impl Recycle for SparseSeries {
    fn reset(&mut self) {
        self.slots.clear();
    }
}

impl From<Vec<Option<f64>>> for SparseSeries {
    fn from(slots: Vec<Option<f64>>) -> Self {
        Self { slots }
    }
}

/// Render-style response body for one or more series over the same window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub from: u64,
    pub to: u64,
    pub step: u64,
    pub series: IndexMap<String, SparseSeries>,
}

impl SeriesResponse {
    /// Build a response for a single path
    pub fn single(path: &str, range: &QueryRange, series: &SparseSeries) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert(path.to_string(), series.clone());
        Self {
            from: range.aligned_lower,
            to: range.aligned_upper,
            step: range.rollup,
            series: map,
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_map_independently() {
        assert_eq!("min".parse::<AggregationMethod>().unwrap(), AggregationMethod::Min);
        assert_eq!("max".parse::<AggregationMethod>().unwrap(), AggregationMethod::Max);
        assert_eq!("sum".parse::<AggregationMethod>().unwrap(), AggregationMethod::Sum);
        assert_eq!("avg".parse::<AggregationMethod>().unwrap(), AggregationMethod::Avg);
        assert_eq!("average".parse::<AggregationMethod>().unwrap(), AggregationMethod::Avg);
        assert_eq!("last".parse::<AggregationMethod>().unwrap(), AggregationMethod::Last);
        assert_eq!("LAST".parse::<AggregationMethod>().unwrap(), AggregationMethod::Last);
    }

    #[test]
    fn test_invalid_method_is_config_error() {
        let err = "median".parse::<AggregationMethod>().unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
        assert!("".parse::<AggregationMethod>().is_err());
    }

    #[test]
    fn test_method_tables() {
        assert_eq!(AggregationMethod::Min.table(), "minmaxlast");
        assert_eq!(AggregationMethod::Last.table(), "minmaxlast");
        assert_eq!(AggregationMethod::Sum.table(), "sum");
        assert_eq!(AggregationMethod::Avg.table(), "avg");
        assert!(AggregationMethod::Avg.is_accumulator());
        assert!(!AggregationMethod::Max.is_accumulator());
    }

    #[test]
    fn test_sample_reset_keeps_nothing() {
        let mut sample = Sample::new("servers.web1.cpu", 12.5, 1_700_000_000);
        sample.reset();
        assert_eq!(sample, Sample::default());

        sample.fill("servers.web2.cpu", 3.0, 10);
        assert_eq!(sample.path, "servers.web2.cpu");
        assert_eq!(sample.timestamp, 10);
    }

    #[test]
    fn test_sparse_series_slots() {
        let mut series = SparseSeries::with_len(3);
        assert!(series.set(1, 4.5));
        assert!(!series.set(3, 1.0));
        assert_eq!(series.get(0), None);
        assert_eq!(series.get(1), Some(4.5));
        assert_eq!(series.filled(), 1);

        series.reset_to(2);
        assert_eq!(series.len(), 2);
        assert_eq!(series.filled(), 0);
    }

    #[test]
    fn test_series_serializes_as_nullable_array() {
        let series = SparseSeries::from(vec![Some(2.0), None, Some(1.0)]);
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, "[2.0,null,1.0]");
    }
}
