use super::connection::ConnectionPool;
use crate::error::{Result, StorageError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

const CELL_TABLES: [&str; 3] = ["minmaxlast", "sum", "avg"];

/// Rows removed by one purge pass
#[derive(Debug, Clone)]
pub struct PurgeReport {
    pub minmaxlast_deleted: u64,
    pub sum_deleted: u64,
    pub avg_deleted: u64,
    pub executed_at: DateTime<Utc>,
    pub duration: ChronoDuration,
}

impl PurgeReport {
    pub fn total(&self) -> u64 {
        self.minmaxlast_deleted + self.sum_deleted + self.avg_deleted
    }
}

/// Delete cells whose ttl has passed
pub async fn purge_expired(pool: &ConnectionPool) -> Result<PurgeReport> {
    let start_time = Utc::now();
    let client = pool.get().await?;

    let mut deleted = [0u64; 3];
    for (count, table) in deleted.iter_mut().zip(CELL_TABLES) {
        *count = client
            .execute(
                format!("DELETE FROM {} WHERE expires_at <= now()", table).as_str(),
                &[],
            )
            .await
            .map_err(|e| StorageError::QueryError(format!("purge {}: {}", table, e)))?;
    }

    let end_time = Utc::now();
    let report = PurgeReport {
        minmaxlast_deleted: deleted[0],
        sum_deleted: deleted[1],
        avg_deleted: deleted[2],
        executed_at: end_time,
        duration: end_time - start_time,
    };

    info!(
        "Purged {} expired cells in {}ms",
        report.total(),
        report.duration.num_milliseconds()
    );
    Ok(report)
}

/// Periodically removes expired cells
///
/// Reads already ignore expired rows; purging only reclaims space.
pub struct PurgeScheduler {
    pool: Arc<ConnectionPool>,
    interval_secs: u64,
}

impl PurgeScheduler {
    pub fn new(pool: Arc<ConnectionPool>, interval_secs: u64) -> Self {
        Self {
            pool,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Run forever; spawn this on the runtime
    pub async fn start(self) {
        info!("Starting purge scheduler (interval: {}s)", self.interval_secs);

        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        loop {
            ticker.tick().await;

            if let Err(e) = purge_expired(&self.pool).await {
                error!("Purge failed: {}", e);
            }
        }
    }

    /// Run one purge pass
    pub async fn run_once(&self) -> Result<PurgeReport> {
        purge_expired(&self.pool).await
    }
}
