//! Segment store backed by a Tantivy index directory.

use std::path::Path;

use tantivy::directory::MmapDirectory;
use tantivy::schema::{Field, Value};
use tantivy::{DocAddress, Index, IndexReader, ReloadPolicy, Searcher, TantivyDocument};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{SegmentStore, StoreOpener};

/// Opens shard directories as Tantivy indexes.
#[derive(Debug, Clone)]
pub struct TantivyStoreOpener {
    payload_field: String,
}

impl TantivyStoreOpener {
    /// Creates an opener reading the given stored field.
    pub fn new(payload_field: impl Into<String>) -> Self {
        Self {
            payload_field: payload_field.into(),
        }
    }
}

impl StoreOpener for TantivyStoreOpener {
    type Store = TantivySegmentStore;

    fn open(&self, path: &Path) -> Result<Self::Store> {
        if !path.is_dir() {
            return Err(Error::Store(format!(
                "shard directory {} does not exist",
                path.display()
            )));
        }
        let directory = MmapDirectory::open(path)?;
        let index = Index::open(directory)?;
        let payload = index.schema().get_field(&self.payload_field)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        TantivySegmentStore::from_searcher(reader.searcher(), payload, path)
    }
}

/// Segment within the store's ordinal space.
#[derive(Debug, Clone, Copy)]
struct SegmentSpan {
    segment_ord: u32,
    first_ordinal: u64,
}

/// A read-only Tantivy index; ordinals run over its segments in searcher order.
pub struct TantivySegmentStore {
    searcher: Searcher,
    payload: Field,
    spans: Vec<SegmentSpan>,
    doc_count: u64,
}

impl TantivySegmentStore {
    fn from_searcher(searcher: Searcher, payload: Field, path: &Path) -> Result<Self> {
        let mut spans = Vec::with_capacity(searcher.segment_readers().len());
        let mut doc_count = 0u64;

        for (segment_ord, reader) in searcher.segment_readers().iter().enumerate() {
            // Deletions survive only in segments a force-merge has not rewritten.
            if reader.has_deletes() {
                return Err(Error::Store(format!(
                    "segment {} in {} still carries {} deleted documents",
                    reader.segment_id().short_uuid_string(),
                    path.display(),
                    reader.num_deleted_docs()
                )));
            }
            spans.push(SegmentSpan {
                segment_ord: segment_ord as u32,
                first_ordinal: doc_count,
            });
            doc_count += u64::from(reader.max_doc());
        }

        debug!(
            "opened {} with {} segments, {} docs",
            path.display(),
            spans.len(),
            doc_count
        );

        Ok(Self {
            searcher,
            payload,
            spans,
            doc_count,
        })
    }

    fn address(&self, ordinal: u64) -> Result<DocAddress> {
        if ordinal >= self.doc_count {
            return Err(Error::Store(format!(
                "ordinal {} out of range (doc count {})",
                ordinal, self.doc_count
            )));
        }
        let idx = self
            .spans
            .partition_point(|span| span.first_ordinal <= ordinal)
            .saturating_sub(1);
        let span = self.spans[idx];
        Ok(DocAddress::new(
            span.segment_ord,
            (ordinal - span.first_ordinal) as u32,
        ))
    }
}

impl SegmentStore for TantivySegmentStore {
    fn doc_count(&self) -> u64 {
        self.doc_count
    }

    fn stored_payload(&self, ordinal: u64) -> Result<Option<Vec<u8>>> {
        let doc: TantivyDocument = self.searcher.doc(self.address(ordinal)?)?;

        Ok(doc.get_first(self.payload).and_then(|v| {
            v.as_bytes()
                .map(<[u8]>::to_vec)
                .or_else(|| v.as_str().map(|s| s.as_bytes().to_vec()))
        }))
    }
}
