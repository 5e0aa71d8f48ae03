//! Shared data model: index handle, shard/segment map, shard locations and
//! the per-document record handed to sinks.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::InvariantViolation;

/// An index whose UUID has been resolved for this run.
///
/// Only the migration step builds one, so the UUID is captured exactly once
/// per run, before the index is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexHandle {
    name: String,
    uuid: String,
}

impl IndexHandle {
    pub(crate) fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
        }
    }

    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cluster-assigned index UUID.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}

/// Proof that the index was administratively closed; required to scan.
#[derive(Debug)]
pub struct ClosedIndex<'a> {
    handle: &'a IndexHandle,
}

impl<'a> ClosedIndex<'a> {
    pub(crate) fn new(handle: &'a IndexHandle) -> Self {
        Self { handle }
    }

    /// The closed index.
    #[must_use]
    pub fn handle(&self) -> &IndexHandle {
        self.handle
    }
}

/// The single merged segment of one primary shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardSegment {
    /// Segment name as reported by the cluster.
    pub segment: String,
    /// Documents in the segment.
    pub doc_count: u64,
}

/// Primary shard id -> its one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShardSegmentMap {
    shards: BTreeMap<u32, ShardSegment>,
}

impl ShardSegmentMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the segment of a shard.
    ///
    /// # Errors
    ///
    /// Fails if the shard already has a segment.
    pub fn insert(
        &mut self,
        shard: u32,
        segment: impl Into<String>,
        doc_count: u64,
    ) -> std::result::Result<(), InvariantViolation> {
        let segment = segment.into();
        if let Some(existing) = self.shards.get(&shard) {
            return Err(InvariantViolation::MultipleSegments {
                shard,
                existing: existing.segment.clone(),
                extra: segment,
            });
        }
        self.shards.insert(shard, ShardSegment { segment, doc_count });
        Ok(())
    }

    /// Sum of the per-shard document counts.
    #[must_use]
    pub fn total_docs(&self) -> u64 {
        self.shards.values().map(|s| s.doc_count).sum()
    }

    /// Segment of a shard, if recorded.
    #[must_use]
    pub fn get(&self, shard: u32) -> Option<&ShardSegment> {
        self.shards.get(&shard)
    }

    /// Shard ids in ascending order.
    pub fn shard_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.shards.keys().copied()
    }

    /// Entries in ascending shard order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ShardSegment)> {
        self.shards.iter().map(|(id, seg)| (*id, seg))
    }

    /// Number of shards recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Whether no shard was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// A shard resolved to its directory on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardLocation {
    /// Shard id.
    pub shard: u32,
    /// `<data root>/nodes/0/indices/<uuid>/<shard>/index`
    pub path: PathBuf,
}

/// One document handed to a [`DocumentSink`]. Borrowed for the duration of a
/// single sink call only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRecord<'a> {
    /// Raw stored payload, `None` when the document has none.
    pub payload: Option<&'a [u8]>,
    /// Zero-based ordinal, contiguous across shards.
    pub ordinal: u64,
    /// Total documents of the run.
    pub total: u64,
}

/// Receives extracted documents in ordinal order.
///
/// Returning `false` stops the scan after the current document.
pub trait DocumentSink {
    /// Handles one document; returns whether to continue.
    fn accept(&mut self, record: DocumentRecord<'_>) -> bool;
}

impl<F> DocumentSink for F
where
    F: FnMut(DocumentRecord<'_>) -> bool,
{
    fn accept(&mut self, record: DocumentRecord<'_>) -> bool {
        self(record)
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Every document was delivered.
    Completed {
        /// Documents delivered.
        delivered: u64,
    },
    /// The sink asked to stop.
    Stopped {
        /// Documents delivered, including the one that returned `false`.
        delivered: u64,
    },
}

impl ScanOutcome {
    /// Documents delivered to the sink.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        match self {
            Self::Completed { delivered } | Self::Stopped { delivered } => *delivered,
        }
    }

    /// Whether the sink requested the stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }
}
