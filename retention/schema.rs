use super::bucket::{parse_buckets, Bucket};
use super::range::QueryRange;
use crate::error::{Result, StorageError};
use crate::rules::{Rule, RuleSet};
use tracing::debug;

/// Maps metric paths to their ordered retention tiers
#[derive(Debug, Clone)]
pub struct RetentionSchema {
    rules: RuleSet<Vec<Bucket>>,
}

impl Default for RetentionSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl RetentionSchema {
    pub fn new() -> Self {
        Self {
            rules: RuleSet::new("retention"),
        }
    }

    /// Add a rule from a pattern and a retention list like `10s:1d,1m:7d`
    pub fn add_rule(&mut self, name: &str, pattern: &str, retentions: &str) -> Result<()> {
        let buckets = parse_buckets(retentions)?;
        debug!("Retention rule {} ({}) -> {}", name, pattern, retentions);
        self.rules.push(name, pattern, buckets)
    }

    /// Set the fallback retention list
    pub fn set_default(&mut self, retentions: &str) -> Result<()> {
        let buckets = parse_buckets(retentions)?;
        debug!("Default retention -> {}", retentions);
        self.rules.set_default(buckets);
        Ok(())
    }

    /// Builder form of [`add_rule`](Self::add_rule)
    pub fn with_rule(mut self, name: &str, pattern: &str, retentions: &str) -> Result<Self> {
        self.add_rule(name, pattern, retentions)?;
        Ok(self)
    }

    /// Builder form of [`set_default`](Self::set_default)
    pub fn with_default(mut self, retentions: &str) -> Result<Self> {
        self.set_default(retentions)?;
        Ok(self)
    }

    /// Rule governing `path`
    pub fn match_rule(&self, path: &str) -> Result<&Rule<Vec<Bucket>>> {
        self.rules.find(path)
    }

    /// All tiers for `path`, finest first
    pub fn buckets(&self, path: &str) -> Result<&[Bucket]> {
        Ok(self.match_rule(path)?.payload())
    }

    /// Pick the tier serving `[from, to]` for `path` and align the window to it
    pub fn resolve_range(&self, path: &str, from: u32, to: u32) -> Result<QueryRange> {
        let buckets = self.buckets(path)?;
        let bucket = select_bucket(buckets, to.saturating_sub(from) as u64).ok_or_else(|| {
            StorageError::ConfigError(format!("no retention tiers for {}", path))
        })?;
        Ok(QueryRange::new(bucket, from, to))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// First bucket whose ttl exceeds `duration`, else the coarsest one
fn select_bucket(buckets: &[Bucket], duration: u64) -> Option<&Bucket> {
    buckets
        .iter()
        .find(|b| b.ttl_secs() > duration)
        .or_else(|| buckets.last())
}
