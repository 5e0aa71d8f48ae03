// Export tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # eswire
//!
//! `eswire` is a CLI tool and library for exporting the stored documents of
//! an Elasticsearch index by reading its shard files directly from disk.
//!
//! ## How it works
//!
//! 1. **Migrate**: open the index, force-merge every shard to one segment,
//!    require a node attribute so all shards relocate to the local node, and
//!    wait until no recovery is active.
//! 2. **Verify**: the primaries' segment report must show one segment per
//!    shard and add up to the index document count.
//! 3. **Close**: the index is closed so its files stop changing.
//! 4. **Scan**: each shard directory is resolved under the data roots and
//!    read in shard order; every document goes to a [`DocumentSink`] with a
//!    global ordinal.
//!
//! The run closes the cluster connection on every path, including a
//! cancellation through [`Pipeline::run_until`].
//!
//! ## Limitations
//!
//! Shards are opened through the [`StoreOpener`] seam. The shipped
//! [`TantivyStoreOpener`] reads tantivy segment directories laid out the way
//! Elasticsearch lays out its shards; it cannot decode the Lucene files an
//! Elasticsearch node actually writes. Reading a live cluster's shards needs
//! a Lucene-format opener behind the same trait.
//!
//! ## Quick Start
//!
//! ```bash
//! eswire init --output eswire.yaml
//! eswire export --config eswire.yaml --index logs-2019 --output logs-2019.ndjson
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! cluster:
//!   url: http://127.0.0.1:9200
//!
//! data_dirs:
//!   - /var/lib/elasticsearch
//!
//! relocation:
//!   node_attr_key: eswire
//!   node_attr_value: yup
//!   node_id: 3x8kU2f1RbGm0c5oTqY7Nw
//!
//! poll:
//!   interval_secs: 5
//! ```

#![warn(missing_docs)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod migration;
pub mod model;
pub mod pipeline;
pub mod poll;
pub mod scanner;
pub mod store;
pub mod verify;

#[cfg(test)]
mod fakes;

pub use cluster::{ClusterAdmin, ElasticsearchAdmin};
pub use config::WireConfig;
pub use error::{Error, InvariantViolation, Result};
pub use events::{EventSink, PipelineEvent, RecordingEvents, TracingEvents};
pub use model::{DocumentRecord, DocumentSink, IndexHandle, ScanOutcome, ShardSegmentMap};
pub use pipeline::{ExportReport, Pipeline};
pub use store::{SegmentStore, StoreOpener, TantivyStoreOpener};
