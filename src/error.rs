use thiserror::Error;

/// Storage layer errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Backend query error
    #[error("Query error: {0}")]
    QueryError(String),

    /// Connection pool error
    #[error("Pool error: {0}")]
    PoolError(String),

    /// Configuration error (bad pattern, unknown method, malformed retention)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A single write could not be encoded
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema error (DDL)
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Name index error
    #[error("Index error: {0}")]
    IndexError(String),
}

impl StorageError {
    /// Whether this error came from the backend rather than the caller's input
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionError(_)
                | StorageError::QueryError(_)
                | StorageError::PoolError(_)
                | StorageError::SchemaError(_)
        )
    }
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        StorageError::QueryError(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StorageError::PoolError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for StorageError {
    fn from(err: serde_yaml::Error) -> Self {
        StorageError::ConfigError(err.to_string())
    }
}

impl From<regex::Error> for StorageError {
    fn from(err: regex::Error) -> Self {
        StorageError::ConfigError(err.to_string())
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_classification() {
        assert!(StorageError::QueryError("timeout".into()).is_backend());
        assert!(StorageError::PoolError("exhausted".into()).is_backend());
        assert!(!StorageError::ValidationError("value too small".into()).is_backend());
        assert!(!StorageError::ConfigError("bad pattern".into()).is_backend());
    }

    #[test]
    fn test_regex_error_is_config_error() {
        let err: StorageError = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }
}
