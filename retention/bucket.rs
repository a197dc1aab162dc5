use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

/// Longest accepted ttl; cell expiry must stay a representable timestamp
pub const MAX_TTL_SECS: u64 = 1000 * YEAR;

/// One retention tier: `rollup`-wide slots kept for `ttl`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bucket {
    rollup: Duration,
    ttl: Duration,
    period: u64,
}

impl Bucket {
    /// Create a bucket, checking `rollup > 0`, `ttl >= rollup` and
    /// `ttl <= MAX_TTL_SECS`
    pub fn new(rollup: Duration, ttl: Duration) -> Result<Self> {
        let rollup_secs = rollup.as_secs();
        if rollup_secs == 0 {
            return Err(StorageError::ConfigError(
                "rollup must be at least one second".to_string(),
            ));
        }
        if ttl < rollup {
            return Err(StorageError::ConfigError(format!(
                "ttl {}s is shorter than rollup {}s",
                ttl.as_secs(),
                rollup_secs
            )));
        }
        if ttl.as_secs() > MAX_TTL_SECS {
            return Err(StorageError::ConfigError(format!(
                "ttl {}s exceeds the maximum of {}s",
                ttl.as_secs(),
                MAX_TTL_SECS
            )));
        }

        Ok(Self {
            rollup,
            ttl,
            period: ttl.as_secs() / rollup_secs,
        })
    }

    pub fn rollup(&self) -> Duration {
        self.rollup
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of rollup-wide slots the retention window spans
    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn rollup_secs(&self) -> u64 {
        self.rollup.as_secs()
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Expiry of a cell written at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                StorageError::ValidationError(format!("expiry overflows for ttl {}s", self.ttl_secs()))
            })
    }

    /// Floor a timestamp to this bucket's rollup boundary
    pub fn round_down(&self, timestamp: u64) -> u64 {
        let rollup = self.rollup_secs();
        (timestamp / rollup) * rollup
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s:{}s", self.rollup_secs(), self.ttl_secs())
    }
}

impl FromStr for Bucket {
    type Err = StorageError;

    /// Parse a single `rollup:ttl` entry such as `10s:1d`
    fn from_str(s: &str) -> Result<Self> {
        let (rollup, ttl) = s.trim().split_once(':').ok_or_else(|| {
            StorageError::ConfigError(format!("retention entry '{}' is not rollup:ttl", s))
        })?;
        Bucket::new(parse_duration(rollup)?, parse_duration(ttl)?)
    }
}

/// Parse a comma-separated retention list such as `10s:1d,1m:7d,1h:1y`
pub fn parse_buckets(retentions: &str) -> Result<Vec<Bucket>> {
    let buckets = retentions
        .split(',')
        .map(str::parse::<Bucket>)
        .collect::<Result<Vec<_>>>()?;

    if buckets.is_empty() {
        return Err(StorageError::ConfigError(
            "retention list is empty".to_string(),
        ));
    }
    Ok(buckets)
}

/// Parse `<quantity><unit>` where unit is one of s, m, min, h, d, w, y
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| StorageError::ConfigError(format!("duration '{}' has no unit", s)))?;
    let (quantity, unit) = s.split_at(split);

    let quantity: u64 = quantity
        .parse()
        .map_err(|_| StorageError::ConfigError(format!("duration '{}' has no quantity", s)))?;

    let unit_secs = match unit {
        "s" => 1,
        "m" => MINUTE,
        "min" => MINUTE,
        "h" => HOUR,
        "d" => DAY,
        "w" => WEEK,
        "y" => YEAR,
        other => {
            return Err(StorageError::ConfigError(format!(
                "unknown time unit '{}' in '{}'",
                other, s
            )))
        }
    };

    quantity
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| StorageError::ConfigError(format!("duration '{}' overflows", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_unit_maps_independently() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("5min").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("1w").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("1y").unwrap(), Duration::from_secs(31_536_000));
    }

    #[test]
    fn test_ttl_beyond_representable_expiry_rejected() {
        let err = "10s:300000y".parse::<Bucket>().unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
        assert!(parse_buckets("10s:1d,1h:300000y").is_err());

        let bucket: Bucket = "1d:1000y".parse().unwrap();
        assert!(bucket.expires_at(Utc::now()).is_ok());
    }

    #[test]
    fn test_expires_at_adds_ttl() {
        let bucket: Bucket = "10s:1d".parse().unwrap();
        let now = Utc::now();
        assert_eq!(
            bucket.expires_at(now).unwrap(),
            now + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_expires_at_overflow_is_validation_error() {
        let bucket: Bucket = "10s:1000y".parse().unwrap();
        let err = bucket.expires_at(DateTime::<Utc>::MAX_UTC).unwrap_err();
        assert!(matches!(err, StorageError::ValidationError(_)));
    }

    #[test]
    fn test_bad_durations() {
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10q").is_err());
        assert!(parse_duration("10 s").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_parse_bucket_list() {
        let buckets = parse_buckets("10s:1d,1m:7d,1h:1y").unwrap();
        assert_eq!(buckets.len(), 3);

        assert_eq!(buckets[0].rollup_secs(), 10);
        assert_eq!(buckets[0].ttl_secs(), 86_400);
        assert_eq!(buckets[0].period(), 8_640);

        assert_eq!(buckets[1].rollup_secs(), 60);
        assert_eq!(buckets[1].period(), 10_080);

        assert_eq!(buckets[2].rollup_secs(), 3_600);
        assert_eq!(buckets[2].period(), 8_760);
    }

    #[test]
    fn test_period_uses_integer_division() {
        let bucket: Bucket = "7s:1m".parse().unwrap();
        assert_eq!(bucket.period(), 8);
    }

    #[test]
    fn test_ttl_shorter_than_rollup_fails() {
        assert!("1h:10m".parse::<Bucket>().is_err());
        assert!("0s:1d".parse::<Bucket>().is_err());
    }

    #[test]
    fn test_malformed_entries_fail() {
        assert!(parse_buckets("10s").is_err());
        assert!(parse_buckets("10s:1d,").is_err());
        assert!(parse_buckets("").is_err());
        assert!(parse_buckets("10s:1d:1y").is_err());
    }

    #[test]
    fn test_round_down() {
        let bucket: Bucket = "10s:1d".parse().unwrap();
        assert_eq!(bucket.round_down(1_000), 1_000);
        assert_eq!(bucket.round_down(1_009), 1_000);
        assert_eq!(bucket.round_down(1_010), 1_010);
    }
}
