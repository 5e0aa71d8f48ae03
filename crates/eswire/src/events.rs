//! Structured pipeline events.
//!
//! Components never log through global state; each step reports a
//! [`PipelineEvent`] to the [`EventSink`] passed in by the caller.
//! [`TracingEvents`] forwards them to `tracing`.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

/// A milestone of a migration/extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[allow(missing_docs)] // Reason: variant fields are named after the values they carry
pub enum PipelineEvent {
    /// All shard copies of the index are active.
    IndexOpened { index: String },
    /// Every shard was merged down to the given segment count.
    ForceMerged { index: String, max_segments: u32 },
    /// The allocation requirement was written.
    RoutingUpdated {
        index: String,
        key: String,
        value: String,
    },
    /// An explicit reroute was issued.
    RerouteIssued,
    /// A recovery poll still saw shards moving.
    RecoveryPending {
        index: String,
        attempt: u32,
        active: usize,
    },
    /// No active recovery remains for the index.
    RecoverySettled { index: String, attempts: u32 },
    /// The index UUID was captured.
    UuidResolved { index: String, uuid: String },
    /// Index-level document count was captured.
    DocCountCaptured { index: String, count: u64 },
    /// Some primaries are not yet started on the target node.
    PlacementPending {
        index: String,
        attempt: u32,
        misplaced: Vec<u32>,
    },
    /// Primary placement on the target node was confirmed.
    PlacementConfirmed { index: String, node_id: String },
    /// Placement was not checked against a node id.
    PlacementUnconfirmed { index: String },
    /// The shard/segment map passed all consistency checks.
    SegmentsVerified {
        index: String,
        shards: usize,
        total_docs: u64,
    },
    /// The index was closed for the disk read.
    IndexClosed { index: String },
    /// A shard was resolved to a local directory.
    ShardResolved { shard: u32, path: PathBuf },
    /// A shard store was opened.
    ShardOpened {
        shard: u32,
        local_docs: u64,
        expected_docs: u64,
    },
    /// A shard store was released.
    ShardReleased { shard: u32, delivered: u64 },
    /// The sink asked to stop.
    ScanStopped { ordinal: u64 },
    /// The index was deleted after export.
    IndexDeleted { index: String },
}

/// Receives pipeline events.
pub trait EventSink {
    /// Handles one event.
    fn emit(&mut self, event: PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn emit(&mut self, event: PipelineEvent) {
        match &event {
            PipelineEvent::IndexOpened { index } => info!("open index: {}", index),
            PipelineEvent::ForceMerged {
                index,
                max_segments,
            } => info!("force merge index: {} (max {} segments)", index, max_segments),
            PipelineEvent::RoutingUpdated { index, key, value } => {
                info!("update index settings: {} {}={}", index, key, value)
            }
            PipelineEvent::RerouteIssued => info!("cluster reroute issued"),
            PipelineEvent::RecoveryPending {
                index,
                attempt,
                active,
            } => debug!(
                "index {} still recovering ({} active, attempt {})",
                index, active, attempt
            ),
            PipelineEvent::RecoverySettled { index, attempts } => {
                info!("index recovered: {} after {} polls", index, attempts)
            }
            PipelineEvent::UuidResolved { index, uuid } => info!("index uuid: {} = {}", index, uuid),
            PipelineEvent::DocCountCaptured { index, count } => {
                info!("index docs count: {} = {}", index, count)
            }
            PipelineEvent::PlacementPending {
                index,
                attempt,
                misplaced,
            } => debug!(
                "index {} shards {:?} not started on target node (attempt {})",
                index, misplaced, attempt
            ),
            PipelineEvent::PlacementConfirmed { index, node_id } => {
                info!("index {} primaries started on node {}", index, node_id)
            }
            PipelineEvent::PlacementUnconfirmed { index } => warn!(
                "index {}: no node_id configured, trusting recovery settlement only",
                index
            ),
            PipelineEvent::SegmentsVerified {
                index,
                shards,
                total_docs,
            } => info!(
                "index segments verified: {} ({} shards, {} docs)",
                index, shards, total_docs
            ),
            PipelineEvent::IndexClosed { index } => info!("index closed: {}", index),
            PipelineEvent::ShardResolved { shard, path } => {
                info!("shard {} directory: {}", shard, path.display())
            }
            PipelineEvent::ShardOpened {
                shard,
                local_docs,
                expected_docs,
            } => {
                if local_docs == expected_docs {
                    info!("shard {} docs count {}", shard, local_docs);
                } else {
                    warn!(
                        "shard {} docs count {} differs from segment report {}",
                        shard, local_docs, expected_docs
                    );
                }
            }
            PipelineEvent::ShardReleased { shard, delivered } => {
                debug!("shard {} released after {} docs", shard, delivered)
            }
            PipelineEvent::ScanStopped { ordinal } => info!("scan stopped by sink at {}", ordinal),
            PipelineEvent::IndexDeleted { index } => info!("index deleted: {}", index),
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingEvents {
    events: Vec<PipelineEvent>,
}

impl RecordingEvents {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in order.
    #[must_use]
    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    /// Consumes the recorder.
    #[must_use]
    pub fn into_events(self) -> Vec<PipelineEvent> {
        self.events
    }
}

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_keeps_order() {
        let mut events = RecordingEvents::new();
        events.emit(PipelineEvent::RerouteIssued);
        events.emit(PipelineEvent::ScanStopped { ordinal: 4 });

        assert_eq!(
            events.events(),
            &[
                PipelineEvent::RerouteIssued,
                PipelineEvent::ScanStopped { ordinal: 4 }
            ]
        );
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_value(PipelineEvent::IndexClosed {
            index: "logs".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "index_closed");
        assert_eq!(json["index"], "logs");
    }
}
