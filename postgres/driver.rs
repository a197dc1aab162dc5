//! PostgreSQL storage driver
//!
//! Every write is a single upsert. Accumulator cells add the incoming
//! delta on conflict; MIN/MAX cells only take the incoming row when its
//! write_key is greater. Rows past `expires_at` are treated as absent and
//! reset by the next write.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tracing::{debug, error};

use super::connection::ConnectionPool;
use crate::driver::encoding::{self, CellValue};
use crate::driver::{fill_series, StorageDriver};
use crate::error::{Result, StorageError};
use crate::retention::{Bucket, QueryRange};
use crate::types::{AggregationMethod, SparseSeries};

const SUM_UPSERT: &str = r#"
INSERT INTO sum (rollup, period, path, time, data, expires_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (rollup, period, path, time) DO UPDATE
SET data = CASE WHEN sum.expires_at <= now() THEN EXCLUDED.data
                ELSE sum.data + EXCLUDED.data END,
    expires_at = EXCLUDED.expires_at
"#;

const AVG_UPSERT: &str = r#"
INSERT INTO avg (rollup, period, path, time, data, count, expires_at)
VALUES ($1, $2, $3, $4, $5, 1, $6)
ON CONFLICT (rollup, period, path, time) DO UPDATE
SET data = CASE WHEN avg.expires_at <= now() THEN EXCLUDED.data
                ELSE avg.data + EXCLUDED.data END,
    count = CASE WHEN avg.expires_at <= now() THEN 1
                 ELSE avg.count + 1 END,
    expires_at = EXCLUDED.expires_at
"#;

const LAST_UPSERT: &str = r#"
INSERT INTO minmaxlast (rollup, period, path, time, data, write_key, expires_at)
VALUES ($1, $2, $3, $4, $5, 0, $6)
ON CONFLICT (rollup, period, path, time) DO UPDATE
SET data = EXCLUDED.data,
    write_key = EXCLUDED.write_key,
    expires_at = EXCLUDED.expires_at
"#;

const MINMAX_UPSERT: &str = r#"
INSERT INTO minmaxlast (rollup, period, path, time, data, write_key, expires_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (rollup, period, path, time) DO UPDATE
SET data = EXCLUDED.data,
    write_key = EXCLUDED.write_key,
    expires_at = EXCLUDED.expires_at
WHERE minmaxlast.write_key < EXCLUDED.write_key
   OR minmaxlast.expires_at <= now()
"#;

/// Storage driver backed by the `minmaxlast`, `sum` and `avg` tables
pub struct PostgresDriver {
    pool: Arc<ConnectionPool>,
}

impl PostgresDriver {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::ValidationError(format!("{} {} out of range", what, value)))
}

fn select_sql(method: AggregationMethod) -> String {
    let columns = match method {
        AggregationMethod::Avg => "time, data, count",
        _ => "time, data",
    };
    format!(
        "SELECT {} FROM {} \
         WHERE rollup = $1 AND period = $2 AND path = $3 \
         AND time >= $4 AND time < $5 AND expires_at > now() \
         ORDER BY time ASC",
        columns,
        method.table()
    )
}

#[async_trait]
impl StorageDriver for PostgresDriver {
    async fn write_sample(
        &self,
        path: &str,
        value: f64,
        timestamp: u32,
        bucket: &Bucket,
        method: AggregationMethod,
    ) -> Result<()> {
        let rollup = to_i64(bucket.rollup_secs(), "rollup")?;
        let period = to_i64(bucket.period(), "period")?;
        let time = to_i64(bucket.round_down(timestamp as u64), "time")?;
        let expires_at = bucket.expires_at(Utc::now())?;

        let scaled: i64;
        let write_key: i64;
        let params: Vec<&(dyn ToSql + Sync)>;
        let sql = match method {
            AggregationMethod::Sum | AggregationMethod::Avg => {
                scaled = encoding::to_fixed(value)?;
                params = vec![&rollup, &period, &path, &time, &scaled, &expires_at];
                if method == AggregationMethod::Sum {
                    SUM_UPSERT
                } else {
                    AVG_UPSERT
                }
            }
            AggregationMethod::Last => {
                params = vec![&rollup, &period, &path, &time, &value, &expires_at];
                LAST_UPSERT
            }
            AggregationMethod::Min | AggregationMethod::Max => {
                write_key = if method == AggregationMethod::Min {
                    encoding::min_key(value)?
                } else {
                    encoding::max_key(value)?
                };
                params = vec![
                    &rollup,
                    &period,
                    &path,
                    &time,
                    &value,
                    &write_key,
                    &expires_at,
                ];
                MINMAX_UPSERT
            }
        };

        let client = self.pool.get().await?;
        client.execute(sql, &params).await?;

        debug!("postgres write {} {} @{} [{}]", path, method, time, bucket);
        Ok(())
    }

    async fn read_series(
        &self,
        path: &str,
        range: &QueryRange,
        method: AggregationMethod,
        out: &mut SparseSeries,
    ) -> Result<()> {
        let rollup = to_i64(range.rollup, "rollup")?;
        let period = to_i64(range.period, "period")?;
        let lower = to_i64(range.aligned_lower, "time")?;
        let upper = to_i64(range.aligned_upper, "time")?;

        let client = self.pool.get().await?;
        let rows = client
            .query(
                select_sql(method).as_str(),
                &[&rollup, &period, &path, &lower, &upper],
            )
            .await?;

        let cells = rows.iter().filter_map(|row| {
            let time: i64 = row.get(0);
            let value = match method {
                AggregationMethod::Sum => CellValue::Sum(row.get(1)),
                AggregationMethod::Avg => CellValue::Avg {
                    acc: row.get(1),
                    count: row.get(2),
                },
                _ => CellValue::Raw(row.get(1)),
            };
            // Negative times cannot come from a valid write
            u64::try_from(time).ok().map(|t| (t, value))
        });

        let placed = fill_series(path, range, cells, out);
        debug!("postgres read {} {}: {} of {} rows placed", path, method, placed, rows.len());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.pool.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                error!("Postgres health check failed: {}", e);
                false
            }
        }
    }

    async fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sql_targets_method_table() {
        let sql = select_sql(AggregationMethod::Avg);
        assert!(sql.starts_with("SELECT time, data, count FROM avg"));

        let sql = select_sql(AggregationMethod::Max);
        assert!(sql.contains("FROM minmaxlast"));
        assert!(sql.contains("expires_at > now()"));
    }

    #[test]
    fn test_upserts_use_the_cell_key() {
        for sql in [SUM_UPSERT, AVG_UPSERT, LAST_UPSERT, MINMAX_UPSERT] {
            assert!(sql.contains("ON CONFLICT (rollup, period, path, time)"));
        }
        assert!(MINMAX_UPSERT.contains("minmaxlast.write_key < EXCLUDED.write_key"));
    }

    #[test]
    fn test_to_i64_bounds() {
        assert_eq!(to_i64(60, "rollup").unwrap(), 60);
        assert!(to_i64(u64::MAX, "time").is_err());
    }
}
