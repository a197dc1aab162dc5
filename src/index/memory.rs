use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::debug;

use super::{children_of, matching_nodes, GlobPattern, IndexPath, NameIndex};
use crate::error::Result;

/// Process-local name index, intended for tests and single-node use
#[derive(Default)]
pub struct MemoryIndex {
    paths: RwLock<BTreeSet<String>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct paths recorded
    pub async fn len(&self) -> usize {
        self.paths.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.paths.read().await.is_empty()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.paths.read().await.contains(path)
    }
}

#[async_trait]
impl NameIndex for MemoryIndex {
    async fn update(&self, path: &str) -> Result<()> {
        if self.paths.read().await.contains(path) {
            return Ok(());
        }
        if self.paths.write().await.insert(path.to_string()) {
            debug!("Indexed new path {}", path);
        }
        Ok(())
    }

    async fn get_children(&self, prefix: &str) -> Result<Vec<IndexPath>> {
        let paths = self.paths.read().await;
        Ok(children_of(prefix, paths.iter().map(String::as_str)))
    }

    async fn query(&self, glob: &str) -> Result<Vec<IndexPath>> {
        let glob = GlobPattern::new(glob)?;
        let paths = self.paths.read().await;

        if glob.is_exact() {
            let key = glob.as_str();
            let mut found = Vec::new();
            if paths.contains(key) {
                found.push(IndexPath::leaf(key));
            }
            let branch = format!("{}.", key);
            if paths.range(branch.clone()..).next().is_some_and(|p| p.starts_with(&branch)) {
                found.push(IndexPath::branch(key));
            }
            return Ok(found);
        }

        Ok(matching_nodes(&glob, paths.iter().map(String::as_str)))
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn close(&self) {}
}
