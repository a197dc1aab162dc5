use crate::aggregation::AggregationRules;
use crate::error::{Result, StorageError};
use crate::retention::RetentionSchema;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage driver backend
    #[serde(default)]
    pub backend: BackendKind,

    /// Name index backend
    #[serde(default)]
    pub index: BackendKind,

    /// Database connection configuration (postgres backends)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Retention rules
    pub schema: SchemaConfig,

    /// Aggregation rules
    pub aggregation: AggregationConfig,

    /// Object pool sizing
    #[serde(default)]
    pub pools: PoolConfig,
}

/// Which implementation backs a driver or index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Postgres,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host
    pub host: String,

    /// Database port
    pub port: u16,

    /// Database name
    pub database: String,

    /// Database user
    pub user: String,

    /// Database password
    pub password: String,

    /// Maximum number of connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout_sec")]
    pub connection_timeout_sec: u64,

    /// Enable TLS/SSL
    #[serde(default)]
    pub use_tls: bool,
}

/// Retention schema configuration; rules are matched in the order written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub rules: IndexMap<String, RetentionRuleConfig>,

    /// Retention list for paths no rule matches
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRuleConfig {
    /// Regex tested against the metric path
    pub pattern: String,

    /// Tiers, finest first, e.g. `10s:1d,1m:7d,1h:1y`
    pub retentions: String,
}

/// Aggregation configuration; rules are matched in the order written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub rules: IndexMap<String, AggregationRuleConfig>,

    /// Method for paths no rule matches
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationRuleConfig {
    pub pattern: String,

    /// One of min, max, sum, avg, average, last
    pub method: String,
}

/// Object pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Idle samples kept for reuse
    #[serde(default = "default_max_idle")]
    pub max_idle_samples: usize,

    /// Idle series buffers kept for reuse
    #[serde(default = "default_max_idle")]
    pub max_idle_series: usize,
}

// Default value functions
fn default_max_connections() -> usize {
    10
}

fn default_connection_timeout_sec() -> u64 {
    5
}

fn default_max_idle() -> usize {
    1024
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "metrics".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            max_connections: default_max_connections(),
            connection_timeout_sec: default_connection_timeout_sec(),
            use_tls: false,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_samples: default_max_idle(),
            max_idle_series: default_max_idle(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            index: BackendKind::Memory,
            database: DatabaseConfig::default(),
            schema: SchemaConfig {
                rules: IndexMap::new(),
                default: Some("10s:1d,1m:7d,1h:1y".to_string()),
            },
            aggregation: AggregationConfig {
                rules: IndexMap::new(),
                default: Some("avg".to_string()),
            },
            pools: PoolConfig::default(),
        }
    }
}

impl SchemaConfig {
    /// Validate and build the runtime schema
    pub fn build(&self) -> Result<RetentionSchema> {
        if self.rules.is_empty() && self.default.is_none() {
            return Err(StorageError::ConfigError(
                "no retention rules configured".to_string(),
            ));
        }

        let mut schema = RetentionSchema::new();
        for (name, rule) in &self.rules {
            schema.add_rule(name, &rule.pattern, &rule.retentions)?;
        }
        if let Some(default) = &self.default {
            schema.set_default(default)?;
        }
        Ok(schema)
    }
}

impl AggregationConfig {
    /// Validate and build the runtime rule set
    pub fn build(&self) -> Result<AggregationRules> {
        if self.rules.is_empty() && self.default.is_none() {
            return Err(StorageError::ConfigError(
                "no aggregation rules configured".to_string(),
            ));
        }

        let mut rules = AggregationRules::new();
        for (name, rule) in &self.rules {
            rules.add_rule(name, &rule.pattern, &rule.method)?;
        }
        if let Some(default) = &self.default {
            rules.set_default(default)?;
        }
        Ok(rules)
    }
}

impl StorageConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        info!("Loading configuration from {}", path);
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StorageError::ConfigError(format!("{}: {}", path, e)))?;

        Self::from_yaml(&contents)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: StorageConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)
            .map_err(|e| StorageError::ConfigError(format!("{}: {}", path, e)))?;
        Ok(())
    }

    pub fn build_schema(&self) -> Result<RetentionSchema> {
        self.schema.build()
    }

    pub fn build_aggregation(&self) -> Result<AggregationRules> {
        self.aggregation.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregationMethod;

    const YAML: &str = r#"
backend: postgres
index: memory
database:
  host: db.example.com
  port: 5433
  database: graphite
  user: writer
  password: secret
schema:
  rules:
    servers:
      pattern: "^servers\\."
      retentions: "10s:1d,1m:7d"
    catchall_servers:
      pattern: "servers"
      retentions: "1m:30d"
  default: "1m:7d,1h:1y"
aggregation:
  rules:
    counters:
      pattern: "\\.count$"
      method: sum
    peaks:
      pattern: "\\.max$"
      method: max
  default: average
"#;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.pools.max_idle_samples, 1024);

        let schema = config.build_schema().unwrap();
        assert_eq!(schema.buckets("any.path").unwrap().len(), 3);
        let rules = config.build_aggregation().unwrap();
        assert_eq!(rules.match_method("any.path").unwrap(), AggregationMethod::Avg);
    }

    #[test]
    fn test_yaml_rules_keep_order() {
        let config = StorageConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.backend, BackendKind::Postgres);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.port, 5433);

        let names: Vec<_> = config.schema.rules.keys().cloned().collect();
        assert_eq!(names, vec!["servers", "catchall_servers"]);

        let schema = config.build_schema().unwrap();
        assert_eq!(schema.match_rule("servers.web1.cpu").unwrap().name(), "servers");
        assert_eq!(schema.match_rule("old.servers.x").unwrap().name(), "catchall_servers");
        assert!(schema.match_rule("apps.x").unwrap().is_default());

        let rules = config.build_aggregation().unwrap();
        assert_eq!(rules.match_method("api.hits.count").unwrap(), AggregationMethod::Sum);
        assert_eq!(rules.match_method("api.latency.max").unwrap(), AggregationMethod::Max);
        assert_eq!(rules.match_method("api.latency").unwrap(), AggregationMethod::Avg);
    }

    #[test]
    fn test_invalid_method_fails_build() {
        let yaml = r#"
schema:
  default: "1m:1d"
aggregation:
  default: median
"#;
        let config = StorageConfig::from_yaml(yaml).unwrap();
        assert!(config.build_schema().is_ok());
        assert!(matches!(
            config.build_aggregation(),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_bad_retention_fails_build() {
        let yaml = r#"
schema:
  rules:
    broken:
      pattern: "^x"
      retentions: "10s:1fortnight"
aggregation:
  default: sum
"#;
        let config = StorageConfig::from_yaml(yaml).unwrap();
        assert!(config.build_schema().is_err());
    }

    #[test]
    fn test_oversized_ttl_fails_build() {
        let yaml = r#"
schema:
  default: "10s:1d,1h:300000y"
aggregation:
  default: sum
"#;
        let config = StorageConfig::from_yaml(yaml).unwrap();
        let err = config.build_schema().unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }

    #[test]
    fn test_empty_rules_rejected() {
        let yaml = "schema: {}\naggregation: {}\n";
        let config = StorageConfig::from_yaml(yaml).unwrap();
        assert!(config.build_schema().is_err());
        assert!(config.build_aggregation().is_err());
    }

    #[test]
    fn test_yaml_serialization() {
        let config = StorageConfig::from_yaml(YAML).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("database:"));
        assert!(yaml.contains("aggregation:"));

        // Deserialize back
        let parsed = StorageConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.database.host, config.database.host);
        assert_eq!(parsed.schema.rules.len(), 2);
    }
}
