//! Benchmark: document delivery rate of a full export over in-memory shards.
//!
//! The cluster admin answers instantly, so the run is dominated by the
//! shard scan and the sink.
//!
//! Run with: `cargo bench --bench scan_benchmark`

#![allow(clippy::cast_possible_truncation)]

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use eswire::cluster::{
    ActiveRecoveries, ClusterAdmin, SegmentInfo, ShardCopySegments, ShardState,
};
use eswire::config::PollConfig;
use eswire::scanner::shard_path;
use eswire::{
    DocumentRecord, Error, Pipeline, RecordingEvents, Result, SegmentStore, StoreOpener,
    WireConfig,
};

const UUID: &str = "bench-uuid";

/// Cluster that is already settled on this node.
struct SettledCluster {
    shard_docs: Vec<u64>,
}

#[async_trait]
impl ClusterAdmin for SettledCluster {
    async fn open_index(&self, _index: &str) -> Result<()> {
        Ok(())
    }

    async fn force_merge(&self, _index: &str, _max_segments: u32) -> Result<()> {
        Ok(())
    }

    async fn update_settings(
        &self,
        _index: &str,
        _settings: &BTreeMap<String, String>,
    ) -> Result<()> {
        Ok(())
    }

    async fn reroute(&self) -> Result<()> {
        Ok(())
    }

    async fn active_recoveries(&self, _index: &str) -> Result<ActiveRecoveries> {
        Ok(ActiveRecoveries::default())
    }

    async fn index_uuid(&self, _index: &str) -> Result<String> {
        Ok(UUID.to_string())
    }

    async fn doc_count(&self, _index: &str) -> Result<u64> {
        Ok(self.shard_docs.iter().sum())
    }

    async fn shard_segments(&self, _index: &str) -> Result<Vec<ShardCopySegments>> {
        Ok(self
            .shard_docs
            .iter()
            .enumerate()
            .map(|(shard, docs)| ShardCopySegments {
                shard: shard as u32,
                primary: true,
                node: Some("local".to_string()),
                state: ShardState::Started,
                segments: vec![SegmentInfo {
                    name: format!("_{}", shard),
                    doc_count: *docs,
                }],
            })
            .collect())
    }

    async fn close_index(&self, _index: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_index(&self, _index: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MemoryStore {
    docs: Arc<Vec<Vec<u8>>>,
}

impl SegmentStore for MemoryStore {
    fn doc_count(&self) -> u64 {
        self.docs.len() as u64
    }

    fn stored_payload(&self, ordinal: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.docs.get(ordinal as usize).cloned())
    }
}

struct MemoryOpener {
    shards: HashMap<PathBuf, Arc<Vec<Vec<u8>>>>,
}

impl StoreOpener for MemoryOpener {
    type Store = MemoryStore;

    fn open(&self, path: &Path) -> Result<MemoryStore> {
        self.shards
            .get(path)
            .map(|docs| MemoryStore {
                docs: Arc::clone(docs),
            })
            .ok_or_else(|| Error::Store(format!("no shard at {}", path.display())))
    }
}

fn generate_payload(shard: usize, n: usize) -> Vec<u8> {
    format!(
        r#"{{"@timestamp":"2019-03-0{}T12:00:00Z","host":"web-{:02}","bytes":{},"path":"/api/v1/items/{}"}}"#,
        shard % 9 + 1,
        n % 50,
        n * 17 % 65_536,
        n
    )
    .into_bytes()
}

fn bench_export_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_scan");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    for &(num_shards, docs_per_shard) in &[(1usize, 100_000usize), (5, 20_000), (20, 5_000)] {
        let root = TempDir::new().unwrap();
        let mut shards = HashMap::new();
        for shard in 0..num_shards {
            let path = shard_path(root.path(), UUID, shard as u32);
            std::fs::create_dir_all(&path).unwrap();
            let docs = (0..docs_per_shard)
                .map(|n| generate_payload(shard, n))
                .collect();
            shards.insert(path, Arc::new(docs));
        }
        let total = (num_shards * docs_per_shard) as u64;
        let config = WireConfig {
            data_dirs: vec![root.path().to_path_buf()],
            poll: PollConfig {
                interval_secs: 0,
                max_attempts: 1,
            },
            ..WireConfig::default()
        };

        group.throughput(Throughput::Elements(total));
        group.bench_with_input(
            BenchmarkId::new("shards", format!("{num_shards}x{docs_per_shard}")),
            &(),
            |b, ()| {
                b.iter(|| {
                    let admin = SettledCluster {
                        shard_docs: vec![docs_per_shard as u64; num_shards],
                    };
                    let opener = MemoryOpener {
                        shards: shards.clone(),
                    };
                    let mut bytes = 0usize;
                    let mut sink = |record: DocumentRecord<'_>| {
                        bytes += record.payload.map_or(0, <[u8]>::len);
                        true
                    };
                    let mut events = RecordingEvents::new();
                    let report = runtime
                        .block_on(
                            Pipeline::new(config.clone(), admin, opener).run(
                                "bench",
                                &mut sink,
                                &mut events,
                            ),
                        )
                        .unwrap();
                    black_box((report, bytes))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_export_scan);
criterion_main!(benches);
