//! Local segment scanner.
//!
//! Resolves every shard of the segment map to exactly one directory under
//! the configured data roots, then streams stored payloads shard by shard to
//! a [`DocumentSink`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{InvariantViolation, Result};
use crate::events::{EventSink, PipelineEvent};
use crate::model::{ClosedIndex, DocumentRecord, DocumentSink, ScanOutcome, ShardLocation, ShardSegmentMap};
use crate::store::{SegmentStore, StoreOpener};

/// Node slot under a data root; one node per data path.
pub const NODE_SLOT: &str = "0";

/// Directory of a shard's Lucene files.
pub const SEGMENT_FOLDER: &str = "index";

/// `<data root>/nodes/0/indices/<uuid>/<shard>/index`
#[must_use]
pub fn shard_path(data_root: &Path, uuid: &str, shard: u32) -> PathBuf {
    data_root
        .join("nodes")
        .join(NODE_SLOT)
        .join("indices")
        .join(uuid)
        .join(shard.to_string())
        .join(SEGMENT_FOLDER)
}

/// Resolves each shard of `map` to the single data root holding it.
///
/// # Errors
///
/// [`InvariantViolation::AmbiguousShardDirectory`] if a shard exists under
/// two roots, [`InvariantViolation::MissingShardDirectories`] if any shard
/// exists under none.
pub fn resolve_shard_locations(
    data_roots: &[PathBuf],
    uuid: &str,
    map: &ShardSegmentMap,
) -> std::result::Result<Vec<ShardLocation>, InvariantViolation> {
    let mut found: BTreeMap<u32, PathBuf> = BTreeMap::new();

    for root in data_roots {
        for shard in map.shard_ids() {
            let path = shard_path(root, uuid, shard);
            if !path.exists() {
                continue;
            }
            if let Some(first) = found.get(&shard) {
                return Err(InvariantViolation::AmbiguousShardDirectory {
                    shard,
                    first: first.clone(),
                    second: path,
                });
            }
            found.insert(shard, path);
        }
    }

    let missing: Vec<u32> = map.shard_ids().filter(|s| !found.contains_key(s)).collect();
    if !missing.is_empty() {
        return Err(InvariantViolation::MissingShardDirectories { shards: missing });
    }

    Ok(found
        .into_iter()
        .map(|(shard, path)| ShardLocation { shard, path })
        .collect())
}

/// Reads resolved shard directories through a [`StoreOpener`].
pub struct LocalSegmentScanner<'a, O: StoreOpener> {
    opener: &'a O,
    data_roots: &'a [PathBuf],
}

impl<'a, O: StoreOpener> LocalSegmentScanner<'a, O> {
    /// Creates a scanner over the given data roots.
    pub fn new(opener: &'a O, data_roots: &'a [PathBuf]) -> Self {
        Self { opener, data_roots }
    }

    /// Resolves every shard before any store is opened.
    ///
    /// # Errors
    ///
    /// See [`resolve_shard_locations`].
    pub fn resolve(
        &self,
        index: &ClosedIndex<'_>,
        map: &ShardSegmentMap,
        events: &mut dyn EventSink,
    ) -> Result<Vec<ShardLocation>> {
        let locations = resolve_shard_locations(self.data_roots, index.handle().uuid(), map)?;
        for location in &locations {
            events.emit(PipelineEvent::ShardResolved {
                shard: location.shard,
                path: location.path.clone(),
            });
        }
        Ok(locations)
    }

    /// Streams every document of `locations`, in order, to `sink`.
    ///
    /// Ordinals continue across shards. When the sink returns `false` the
    /// current store is released and no further shard is opened.
    ///
    /// # Errors
    ///
    /// Store open or read failures.
    pub fn scan<S: DocumentSink + ?Sized>(
        &self,
        _index: &ClosedIndex<'_>,
        map: &ShardSegmentMap,
        locations: &[ShardLocation],
        total: u64,
        sink: &mut S,
        events: &mut dyn EventSink,
    ) -> Result<ScanOutcome> {
        let mut ordinal = 0u64;

        for location in locations {
            let store = self.opener.open(&location.path)?;
            let local_docs = store.doc_count();
            events.emit(PipelineEvent::ShardOpened {
                shard: location.shard,
                local_docs,
                expected_docs: map.get(location.shard).map_or(0, |s| s.doc_count),
            });

            let stopped = drain_store(&store, &mut ordinal, total, sink)?;
            drop(store);
            events.emit(PipelineEvent::ShardReleased {
                shard: location.shard,
                delivered: ordinal,
            });

            if stopped {
                events.emit(PipelineEvent::ScanStopped {
                    ordinal: ordinal - 1,
                });
                return Ok(ScanOutcome::Stopped { delivered: ordinal });
            }
        }

        Ok(ScanOutcome::Completed { delivered: ordinal })
    }
}

/// Feeds one store to the sink; returns whether the sink asked to stop.
fn drain_store<T: SegmentStore, S: DocumentSink + ?Sized>(
    store: &T,
    ordinal: &mut u64,
    total: u64,
    sink: &mut S,
) -> Result<bool> {
    for local in 0..store.doc_count() {
        let payload = store.stored_payload(local)?;
        let keep_going = sink.accept(DocumentRecord {
            payload: payload.as_deref(),
            ordinal: *ordinal,
            total,
        });
        *ordinal += 1;
        if !keep_going {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
