//! Metric name index contract
//!
//! The store notifies the index of every path it writes; query-facing
//! callers browse it with `get_children` and `query`.

pub mod glob;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use glob::GlobPattern;
pub use memory::MemoryIndex;

/// A node in the dotted path tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexPath {
    pub key: String,
    /// Number of dots in `key`
    pub depth: usize,
    /// True for a full metric path, false for an intermediate node
    pub leaf: bool,
}

impl IndexPath {
    pub fn leaf(key: impl Into<String>) -> Self {
        Self::new(key, true)
    }

    pub fn branch(key: impl Into<String>) -> Self {
        Self::new(key, false)
    }

    fn new(key: impl Into<String>, leaf: bool) -> Self {
        let key = key.into();
        Self {
            depth: key.matches('.').count(),
            key,
            leaf,
        }
    }
}

/// Searchable set of known metric paths
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NameIndex: Send + Sync {
    /// Record that `path` exists
    async fn update(&self, path: &str) -> Result<()>;

    /// Direct children of `prefix` (top-level nodes for an empty prefix)
    async fn get_children(&self, prefix: &str) -> Result<Vec<IndexPath>>;

    /// Nodes matching a Graphite glob
    async fn query(&self, glob: &str) -> Result<Vec<IndexPath>>;

    async fn ping(&self) -> bool;

    async fn close(&self);
}

/// Children of `prefix` among `paths`, sorted and deduplicated
pub(crate) fn children_of<'a, I>(prefix: &str, paths: I) -> Vec<IndexPath>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut nodes = std::collections::BTreeSet::new();

    for path in paths {
        let rest = if prefix.is_empty() {
            path
        } else {
            match path.strip_prefix(prefix).and_then(|r| r.strip_prefix('.')) {
                Some(rest) => rest,
                None => continue,
            }
        };

        let (segment, leaf) = match rest.find('.') {
            Some(end) => (&rest[..end], false),
            None => (rest, true),
        };
        if segment.is_empty() {
            continue;
        }

        let key = if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", prefix, segment)
        };
        nodes.insert(if leaf {
            IndexPath::leaf(key)
        } else {
            IndexPath::branch(key)
        });
    }

    nodes.into_iter().collect()
}

/// Nodes at the glob's depth whose key matches it
pub(crate) fn matching_nodes<'a, I>(glob: &GlobPattern, paths: I) -> Vec<IndexPath>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut nodes = std::collections::BTreeSet::new();

    for path in paths {
        let node = match path.match_indices('.').nth(glob.depth()) {
            Some((end, _)) => &path[..end],
            None => path,
        };
        if node.matches('.').count() != glob.depth() || !glob.is_match(node) {
            continue;
        }

        nodes.insert(if node.len() == path.len() {
            IndexPath::leaf(node)
        } else {
            IndexPath::branch(node)
        });
    }

    nodes.into_iter().collect()
}
