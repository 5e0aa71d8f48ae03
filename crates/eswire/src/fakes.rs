//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::cluster::{
    ActiveRecoveries, ClusterAdmin, SegmentInfo, ShardCopySegments, ShardRecovery, ShardState,
};
use crate::error::{Error, Result};
use crate::store::{SegmentStore, StoreOpener};

/// Primary copy with the given segments.
pub fn primary(shard: u32, node: &str, state: ShardState, segments: &[(&str, u64)]) -> ShardCopySegments {
    ShardCopySegments {
        shard,
        primary: true,
        node: Some(node.to_string()),
        state,
        segments: segments
            .iter()
            .map(|(name, docs)| SegmentInfo {
                name: (*name).to_string(),
                doc_count: *docs,
            })
            .collect(),
    }
}

/// Replica copy with the given segments.
pub fn replica(shard: u32, node: &str, segments: &[(&str, u64)]) -> ShardCopySegments {
    ShardCopySegments {
        primary: false,
        ..primary(shard, node, ShardState::Started, segments)
    }
}

/// Recoveries of `index` for the given shards.
pub fn recovering(index: &str, shards: &[u32]) -> ActiveRecoveries {
    ActiveRecoveries {
        indices: BTreeMap::from([(
            index.to_string(),
            shards
                .iter()
                .map(|s| ShardRecovery {
                    shard: *s,
                    stage: "INDEX".to_string(),
                    source_node: Some("n1".to_string()),
                    target_node: Some("target".to_string()),
                })
                .collect(),
        )]),
    }
}

#[derive(Debug, Default)]
struct AdminState {
    calls: Vec<String>,
    recoveries: VecDeque<ActiveRecoveries>,
    segments: VecDeque<Vec<ShardCopySegments>>,
    uuid: String,
    doc_count: u64,
    fail_on: Option<&'static str>,
}

/// Scripted [`ClusterAdmin`] that records every call. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct FakeAdmin {
    state: Arc<Mutex<AdminState>>,
}

impl FakeAdmin {
    pub fn new(uuid: &str, doc_count: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(AdminState {
                uuid: uuid.to_string(),
                doc_count,
                ..Default::default()
            })),
        }
    }

    /// Queues recovery responses; once drained the index is settled.
    pub fn with_recoveries(self, responses: Vec<ActiveRecoveries>) -> Self {
        self.state.lock().unwrap().recoveries = responses.into();
        self
    }

    /// Queues segment responses; the last one repeats.
    pub fn with_segments(self, responses: Vec<Vec<ShardCopySegments>>) -> Self {
        self.state.lock().unwrap().segments = responses.into();
        self
    }

    /// Makes the named call fail with a cluster error.
    pub fn failing_on(self, call: &'static str) -> Self {
        self.state.lock().unwrap().fail_on = Some(call);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: &'static str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        if state.fail_on == Some(call) {
            return Err(Error::Cluster(format!("{} failed: 503 unavailable", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterAdmin for FakeAdmin {
    async fn open_index(&self, _index: &str) -> Result<()> {
        self.record("open_index")
    }

    async fn force_merge(&self, _index: &str, max_segments: u32) -> Result<()> {
        assert_eq!(max_segments, 1);
        self.record("force_merge")
    }

    async fn update_settings(
        &self,
        _index: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<()> {
        assert!(settings
            .keys()
            .all(|k| k.starts_with("index.routing.allocation.require.")));
        self.record("update_settings")
    }

    async fn reroute(&self) -> Result<()> {
        self.record("reroute")
    }

    async fn active_recoveries(&self, _index: &str) -> Result<ActiveRecoveries> {
        self.record("active_recoveries")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .recoveries
            .pop_front()
            .unwrap_or_default())
    }

    async fn index_uuid(&self, _index: &str) -> Result<String> {
        self.record("index_uuid")?;
        Ok(self.state.lock().unwrap().uuid.clone())
    }

    async fn doc_count(&self, _index: &str) -> Result<u64> {
        self.record("doc_count")?;
        Ok(self.state.lock().unwrap().doc_count)
    }

    async fn shard_segments(&self, _index: &str) -> Result<Vec<ShardCopySegments>> {
        self.record("shard_segments")?;
        let mut state = self.state.lock().unwrap();
        if state.segments.len() > 1 {
            Ok(state.segments.pop_front().unwrap_or_default())
        } else {
            Ok(state.segments.front().cloned().unwrap_or_default())
        }
    }

    async fn close_index(&self, _index: &str) -> Result<()> {
        self.record("close_index")
    }

    async fn delete_index(&self, _index: &str) -> Result<()> {
        self.record("delete_index")
    }

    async fn close(&mut self) -> Result<()> {
        self.record("close")
    }
}

/// Opens and releases observed by a [`FakeOpener`].
#[derive(Debug, Default)]
pub struct StoreLog {
    pub opened: Vec<PathBuf>,
    pub released: Vec<PathBuf>,
}

/// Store whose documents live in memory.
pub struct FakeStore {
    path: PathBuf,
    docs: Vec<Option<Vec<u8>>>,
    fail_at: Option<u64>,
    log: Arc<Mutex<StoreLog>>,
}

impl SegmentStore for FakeStore {
    fn doc_count(&self) -> u64 {
        self.docs.len() as u64
    }

    fn stored_payload(&self, ordinal: u64) -> Result<Option<Vec<u8>>> {
        if self.fail_at == Some(ordinal) {
            return Err(Error::Store(format!("read error at {}", ordinal)));
        }
        Ok(self.docs[ordinal as usize].clone())
    }
}

impl Drop for FakeStore {
    fn drop(&mut self) {
        self.log.lock().unwrap().released.push(self.path.clone());
    }
}

/// Serves [`FakeStore`]s for registered directories.
#[derive(Default)]
pub struct FakeOpener {
    shards: HashMap<PathBuf, Vec<Option<Vec<u8>>>>,
    fail_at: HashMap<PathBuf, u64>,
    log: Arc<Mutex<StoreLog>>,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `count` documents; payload `i` is `doc-<i>`, every
    /// `missing_every`-th one has none.
    pub fn with_shard(mut self, path: &Path, count: usize, missing_every: Option<usize>) -> Self {
        let docs = (0..count)
            .map(|i| match missing_every {
                Some(n) if n > 0 && i % n == n - 1 => None,
                _ => Some(format!("doc-{}", i).into_bytes()),
            })
            .collect();
        self.shards.insert(path.to_path_buf(), docs);
        self
    }

    /// Makes reading `ordinal` of the store at `path` fail.
    pub fn failing_at(mut self, path: &Path, ordinal: u64) -> Self {
        self.fail_at.insert(path.to_path_buf(), ordinal);
        self
    }

    pub fn log(&self) -> Arc<Mutex<StoreLog>> {
        Arc::clone(&self.log)
    }
}

impl StoreOpener for FakeOpener {
    type Store = FakeStore;

    fn open(&self, path: &Path) -> Result<FakeStore> {
        let docs = self
            .shards
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Store(format!("cannot open {}", path.display())))?;
        self.log.lock().unwrap().opened.push(path.to_path_buf());
        Ok(FakeStore {
            path: path.to_path_buf(),
            docs,
            fail_at: self.fail_at.get(path).copied(),
            log: Arc::clone(&self.log),
        })
    }
}
