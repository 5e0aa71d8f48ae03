//! Local segment-store collaborator.
//!
//! A store is one shard directory opened read-only. It is released when
//! dropped, so a scan holds at most one store at a time.

pub mod tantivy_store;

use std::path::Path;

use crate::error::Result;

pub use tantivy_store::{TantivySegmentStore, TantivyStoreOpener};

/// Read access to the documents of one shard directory.
pub trait SegmentStore {
    /// Documents in the store; valid ordinals are `0..doc_count()`.
    fn doc_count(&self) -> u64;

    /// Raw stored payload of the document at `ordinal`, `None` when the
    /// document has no payload field.
    fn stored_payload(&self, ordinal: u64) -> Result<Option<Vec<u8>>>;
}

/// Opens shard directories as [`SegmentStore`]s.
pub trait StoreOpener {
    /// Store type produced by this opener.
    type Store: SegmentStore;

    /// Opens the directory read-only.
    fn open(&self, path: &Path) -> Result<Self::Store>;
}
