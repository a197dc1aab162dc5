//! Path to aggregation method resolution

use crate::error::Result;
use crate::rules::{Rule, RuleSet};
use crate::types::AggregationMethod;
use tracing::debug;

/// Maps metric paths to the method used to combine samples in one cell
#[derive(Debug, Clone)]
pub struct AggregationRules {
    rules: RuleSet<AggregationMethod>,
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationRules {
    pub fn new() -> Self {
        Self {
            rules: RuleSet::new("aggregation"),
        }
    }

    /// Add a rule; `method` must name a known aggregation
    pub fn add_rule(&mut self, name: &str, pattern: &str, method: &str) -> Result<()> {
        let method: AggregationMethod = method.parse()?;
        debug!("Aggregation rule {} ({}) -> {}", name, pattern, method);
        self.rules.push(name, pattern, method)
    }

    pub fn set_default(&mut self, method: &str) -> Result<()> {
        let method: AggregationMethod = method.parse()?;
        self.rules.set_default(method);
        Ok(())
    }

    pub fn with_rule(mut self, name: &str, pattern: &str, method: &str) -> Result<Self> {
        self.add_rule(name, pattern, method)?;
        Ok(self)
    }

    pub fn with_default(mut self, method: &str) -> Result<Self> {
        self.set_default(method)?;
        Ok(self)
    }

    pub fn match_rule(&self, path: &str) -> Result<&Rule<AggregationMethod>> {
        self.rules.find(path)
    }

    /// Method governing `path`
    pub fn match_method(&self, path: &str) -> Result<AggregationMethod> {
        Ok(*self.match_rule(path)?.payload())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_match_method() {
        let rules = AggregationRules::new()
            .with_rule("counters", r"\.count$", "sum")
            .unwrap()
            .with_rule("peaks", r"\.peak$", "max")
            .unwrap()
            .with_default("average")
            .unwrap();

        assert_eq!(rules.match_method("api.requests.count").unwrap(), AggregationMethod::Sum);
        assert_eq!(rules.match_method("api.latency.peak").unwrap(), AggregationMethod::Max);
        assert_eq!(rules.match_method("api.latency").unwrap(), AggregationMethod::Avg);
    }

    #[test]
    fn test_rule_order_decides_overlaps() {
        let first = AggregationRules::new()
            .with_rule("min", r"^db\.", "min")
            .unwrap()
            .with_rule("last", r"\.gauge$", "last")
            .unwrap();
        let second = AggregationRules::new()
            .with_rule("last", r"\.gauge$", "last")
            .unwrap()
            .with_rule("min", r"^db\.", "min")
            .unwrap();

        assert_eq!(first.match_method("db.pool.gauge").unwrap(), AggregationMethod::Min);
        assert_eq!(second.match_method("db.pool.gauge").unwrap(), AggregationMethod::Last);
    }

    #[test]
    fn test_invalid_method_rejected_at_load() {
        let mut rules = AggregationRules::new();
        let err = rules.add_rule("bad", "^x", "median").unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
        assert!(rules.set_default("mean").is_err());
        assert_eq!(rules.rule_count(), 0);
    }

    #[test]
    fn test_no_match_no_default() {
        let rules = AggregationRules::new().with_rule("x", "^x", "sum").unwrap();
        assert!(rules.match_method("y").is_err());
    }
}
