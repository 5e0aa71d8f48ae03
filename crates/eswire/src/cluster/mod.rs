//! Cluster administrative collaborator.
//!
//! [`ClusterAdmin`] is the handful of admin verbs the pipeline needs; the
//! REST implementation lives in [`elasticsearch`].

pub mod common;
pub mod elasticsearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

pub use elasticsearch::ElasticsearchAdmin;

/// Lifecycle state of a shard copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardState {
    /// Active and serving on its node.
    Started,
    /// Moving to another node.
    Relocating,
    /// Being built on its node.
    Initializing,
    /// Not allocated to any node.
    Unassigned,
    /// A state this tool does not know.
    #[serde(other)]
    Unknown,
}

/// One segment of a shard copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Segment name.
    pub name: String,
    /// Live documents in the segment.
    pub doc_count: u64,
}

/// Segment report of one shard copy (primary or replica).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCopySegments {
    /// Shard id.
    pub shard: u32,
    /// Whether this copy is the primary.
    pub primary: bool,
    /// Node currently holding the copy.
    pub node: Option<String>,
    /// Lifecycle state of the copy.
    pub state: ShardState,
    /// Segments of the copy.
    pub segments: Vec<SegmentInfo>,
}

/// One ongoing shard recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecovery {
    /// Shard id.
    pub shard: u32,
    /// Recovery stage (`INIT`, `INDEX`, `TRANSLOG`, ...).
    pub stage: String,
    /// Node the data comes from.
    pub source_node: Option<String>,
    /// Node the data goes to.
    pub target_node: Option<String>,
}

/// Active recoveries keyed by index name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRecoveries {
    /// Recoveries per index; an index may map to an empty list.
    pub indices: BTreeMap<String, Vec<ShardRecovery>>,
}

impl ActiveRecoveries {
    /// Settled when nothing is reported at all, or the index's list is empty.
    #[must_use]
    pub fn is_settled(&self, index: &str) -> bool {
        self.indices.is_empty() || self.active_for(index) == 0
    }

    /// Number of active recoveries of an index.
    #[must_use]
    pub fn active_for(&self, index: &str) -> usize {
        self.indices.get(index).map_or(0, Vec::len)
    }
}

/// Administrative verbs of the cluster, one request each.
///
/// Calls are awaited one at a time; the pipeline never overlaps them.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Opens the index and waits until all shard copies are active.
    async fn open_index(&self, index: &str) -> Result<()>;

    /// Force-merges every shard down to `max_segments`.
    async fn force_merge(&self, index: &str, max_segments: u32) -> Result<()>;

    /// Writes index settings.
    async fn update_settings(&self, index: &str, settings: &BTreeMap<String, String>)
        -> Result<()>;

    /// Asks the cluster to run its shard balancer now.
    async fn reroute(&self) -> Result<()>;

    /// Lists ongoing recoveries of the index.
    async fn active_recoveries(&self, index: &str) -> Result<ActiveRecoveries>;

    /// Reads the `index.uuid` setting.
    async fn index_uuid(&self, index: &str) -> Result<String>;

    /// Reads the index-level stored document count (primaries).
    async fn doc_count(&self, index: &str) -> Result<u64>;

    /// Lists segments of every shard copy.
    async fn shard_segments(&self, index: &str) -> Result<Vec<ShardCopySegments>>;

    /// Closes the index.
    async fn close_index(&self, index: &str) -> Result<()>;

    /// Deletes the index.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<()>;
}
