//! Ordered pattern rules with an optional fallback
//!
//! Both the retention schema and the aggregation rule set resolve a metric
//! path the same way: rules are tested in configured order, the first
//! regex match wins, and the default applies when nothing matches.

use crate::error::{Result, StorageError};
use regex::Regex;

/// One named rule carrying a payload
#[derive(Debug, Clone)]
pub struct Rule<T> {
    name: String,
    pattern: Option<Regex>,
    payload: T,
}

impl<T> Rule<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source regex, `None` for the default rule
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|p| p.as_str())
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn is_default(&self) -> bool {
        self.pattern.is_none()
    }

    fn matches(&self, path: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(path))
    }
}

/// Ordered list of rules plus an optional default
#[derive(Debug, Clone)]
pub struct RuleSet<T> {
    kind: &'static str,
    rules: Vec<Rule<T>>,
    default: Option<Rule<T>>,
}

impl<T> RuleSet<T> {
    /// Create an empty rule set; `kind` names it in error messages
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            rules: Vec::new(),
            default: None,
        }
    }

    /// Append a rule; later rules only win when earlier ones do not match
    pub fn push(&mut self, name: impl Into<String>, pattern: &str, payload: T) -> Result<()> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            StorageError::ConfigError(format!("{} rule '{}': {}", self.kind, name, e))
        })?;
        self.rules.push(Rule {
            name,
            pattern: Some(pattern),
            payload,
        });
        Ok(())
    }

    /// Replace the fallback rule
    pub fn set_default(&mut self, payload: T) {
        self.default = Some(Rule {
            name: "default".to_string(),
            pattern: None,
            payload,
        });
    }

    /// First matching rule in order, else the default
    pub fn find(&self, path: &str) -> Result<&Rule<T>> {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .or(self.default.as_ref())
            .ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "no {} rule matches '{}' and no default is configured",
                    self.kind, path
                ))
            })
    }

    pub fn rules(&self) -> &[Rule<T>] {
        &self.rules
    }

    pub fn default_rule(&self) -> Option<&Rule<T>> {
        self.default.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.default.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let mut rules = RuleSet::new("test");
        rules.push("servers", r"^servers\.", 1).unwrap();
        rules.push("cpu", r"\.cpu$", 2).unwrap();

        assert_eq!(*rules.find("servers.web1.cpu").unwrap().payload(), 1);
        assert_eq!(*rules.find("apps.api.cpu").unwrap().payload(), 2);
    }

    #[test]
    fn test_order_changes_winner() {
        let mut rules = RuleSet::new("test");
        rules.push("cpu", r"\.cpu$", 2).unwrap();
        rules.push("servers", r"^servers\.", 1).unwrap();

        let rule = rules.find("servers.web1.cpu").unwrap();
        assert_eq!(rule.name(), "cpu");
        assert_eq!(*rule.payload(), 2);
    }

    #[test]
    fn test_default_fallback() {
        let mut rules = RuleSet::new("test");
        rules.push("servers", r"^servers\.", 1).unwrap();
        assert!(rules.find("apps.api.cpu").is_err());

        rules.set_default(9);
        let rule = rules.find("apps.api.cpu").unwrap();
        assert!(rule.is_default());
        assert_eq!(*rule.payload(), 9);
    }

    #[test]
    fn test_bad_pattern() {
        let mut rules: RuleSet<u8> = RuleSet::new("test");
        let err = rules.push("broken", "servers.(", 1).unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
        assert!(rules.is_empty());
    }
}
