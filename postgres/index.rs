use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use super::connection::ConnectionPool;
use crate::error::{Result, StorageError};
use crate::index::{children_of, matching_nodes, GlobPattern, IndexPath, NameIndex};

/// Name index stored in the `paths` table
pub struct PostgresIndex {
    pool: Arc<ConnectionPool>,
}

impl PostgresIndex {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

/// Escape LIKE wildcards; `_` is common in metric names
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Regex matching any path that has a node matching `glob`
fn node_prefix_regex(glob: &GlobPattern) -> String {
    let full = glob.regex_str();
    let body = full.strip_suffix('$').unwrap_or(full);
    format!(r"{}(\.|$)", body)
}

fn index_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::IndexError(e.to_string())
}

#[async_trait]
impl NameIndex for PostgresIndex {
    async fn update(&self, path: &str) -> Result<()> {
        let depth = path.matches('.').count() as i32;
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                "INSERT INTO paths (path, depth) VALUES ($1, $2) ON CONFLICT (path) DO NOTHING",
                &[&path, &depth],
            )
            .await
            .map_err(index_error)?;

        if inserted > 0 {
            debug!("Indexed new path {}", path);
        }
        Ok(())
    }

    async fn get_children(&self, prefix: &str) -> Result<Vec<IndexPath>> {
        let client = self.pool.get().await?;
        let rows = if prefix.is_empty() {
            client
                .query("SELECT path FROM paths", &[])
                .await
                .map_err(index_error)?
        } else {
            let pattern = format!("{}.%", escape_like(prefix));
            client
                .query("SELECT path FROM paths WHERE path LIKE $1", &[&pattern])
                .await
                .map_err(index_error)?
        };

        let paths: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
        Ok(children_of(prefix, paths.iter().map(String::as_str)))
    }

    async fn query(&self, glob: &str) -> Result<Vec<IndexPath>> {
        let glob = GlobPattern::new(glob)?;
        let depth = glob.depth() as i32;
        let regex = node_prefix_regex(&glob);

        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT path FROM paths WHERE depth >= $1 AND path ~ $2",
                &[&depth, &regex],
            )
            .await
            .map_err(index_error)?;

        let paths: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
        Ok(matching_nodes(&glob, paths.iter().map(String::as_str)))
    }

    async fn ping(&self) -> bool {
        match self.pool.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                error!("Index ping failed: {}", e);
                false
            }
        }
    }

    async fn close(&self) {
        self.pool.close();
    }
}
