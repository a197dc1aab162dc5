use crate::config::DatabaseConfig;
use crate::error::{Result, StorageError};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// DDL for the cell tables and the name index
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// deadpool-backed clients shared by [`PostgresDriver`](super::PostgresDriver)
/// and [`PostgresIndex`](super::PostgresIndex)
pub struct ConnectionPool {
    pool: Pool,
}

fn pool_config(db: &DatabaseConfig) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(db.host.clone());
    cfg.port = Some(db.port);
    cfg.dbname = Some(db.database.clone());
    cfg.user = Some(db.user.clone());
    cfg.password = Some(db.password.clone());
    cfg.connect_timeout = Some(Duration::from_secs(db.connection_timeout_sec));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(db.max_connections));
    cfg
}

impl ConnectionPool {
    /// Build the pool and check the server answers
    pub async fn new(db: &DatabaseConfig) -> Result<Self> {
        if db.use_tls {
            return Err(StorageError::ConfigError(
                "TLS connections are not supported".to_string(),
            ));
        }

        info!(
            "Opening postgres pool {}@{}:{}/{} (max {})",
            db.user, db.host, db.port, db.database, db.max_connections
        );

        let pool = pool_config(db)
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        let server: String = pool.get().await?.query_one("SHOW server_version", &[]).await?.get(0);
        info!("postgres server {}", server);

        Ok(Self { pool })
    }

    pub async fn get(&self) -> Result<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            size: status.size,
            available: status.available,
            waiting: status.waiting,
            max_size: status.max_size,
        }
    }

    /// Run a DDL script atomically
    pub async fn execute_schema(&self, sql: &str) -> Result<()> {
        let schema_err = |e: tokio_postgres::Error| StorageError::SchemaError(e.to_string());

        let mut client = self.get().await?;
        let tx = client.transaction().await.map_err(schema_err)?;
        tx.batch_execute(sql).await.map_err(schema_err)?;
        tx.commit().await.map_err(schema_err)
    }

    /// Create `minmaxlast`, `sum`, `avg` and `paths` when missing
    pub async fn init_schema(&self) -> Result<()> {
        self.execute_schema(SCHEMA_SQL).await?;
        debug!("cell and path tables ready");
        Ok(())
    }

    /// `SELECT 1` round trip
    pub async fn test_connection(&self) -> Result<bool> {
        let one: i32 = self.get().await?.query_one("SELECT 1", &[]).await?.get(0);
        Ok(one == 1)
    }

    pub fn close(&self) {
        self.pool.close();
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
    pub max_size: usize,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool[size={}, available={}, waiting={}, max={}]",
            self.size, self.available, self.waiting, self.max_size
        )
    }
}
