//! Consistency verifier.
//!
//! Builds the shard/segment map from the primaries' segment report and
//! checks it against the captured index document count. With a target node
//! id, the report is re-polled until every primary is started on that node.

use crate::cluster::{ClusterAdmin, ShardCopySegments, ShardState};
use crate::config::PollConfig;
use crate::error::{InvariantViolation, Result};
use crate::events::{EventSink, PipelineEvent};
use crate::model::{IndexHandle, ShardSegmentMap};
use crate::poll::Poller;

/// Builds the segment map of the primary copies and checks the doc-count sum.
///
/// # Errors
///
/// [`InvariantViolation::MultipleSegments`] when a primary has more than one
/// segment, [`InvariantViolation::DocCountMismatch`] when the sum differs
/// from `expected_docs`.
pub fn build_segment_map(
    copies: &[ShardCopySegments],
    expected_docs: u64,
) -> std::result::Result<ShardSegmentMap, InvariantViolation> {
    let mut map = ShardSegmentMap::new();
    for copy in copies.iter().filter(|c| c.primary) {
        for segment in &copy.segments {
            map.insert(copy.shard, segment.name.clone(), segment.doc_count)?;
        }
    }

    let segments = map.total_docs();
    if segments != expected_docs {
        return Err(InvariantViolation::DocCountMismatch {
            segments,
            index: expected_docs,
        });
    }
    Ok(map)
}

/// Primary shards not yet started on `node_id`, ascending.
#[must_use]
pub fn misplaced_primaries(copies: &[ShardCopySegments], node_id: &str) -> Vec<u32> {
    let mut shards: Vec<u32> = copies
        .iter()
        .filter(|c| c.primary)
        .filter(|c| c.state != ShardState::Started || c.node.as_deref() != Some(node_id))
        .map(|c| c.shard)
        .collect();
    shards.sort_unstable();
    shards.dedup();
    shards
}

/// Cross-checks the cluster's shard/segment picture before any disk read.
pub struct ConsistencyVerifier<'a, A: ClusterAdmin + ?Sized> {
    admin: &'a A,
    poll: &'a PollConfig,
    target_node: Option<&'a str>,
}

impl<'a, A: ClusterAdmin + ?Sized> ConsistencyVerifier<'a, A> {
    /// Creates a verifier; `target_node` enables placement confirmation.
    pub fn new(admin: &'a A, poll: &'a PollConfig, target_node: Option<&'a str>) -> Self {
        Self {
            admin,
            poll,
            target_node,
        }
    }

    /// Returns the verified shard/segment map.
    ///
    /// Every enumeration pass is checked for consistency; a violation aborts
    /// at once, misplaced primaries only trigger another pass.
    ///
    /// # Errors
    ///
    /// Invariant violations, admin errors, or a timeout while waiting for
    /// placement.
    pub async fn verify(
        &self,
        handle: &IndexHandle,
        expected_docs: u64,
        events: &mut dyn EventSink,
    ) -> Result<ShardSegmentMap> {
        let index = handle.name();
        let mut poller = Poller::new("primary placement", self.poll);

        let map = loop {
            let copies = self.admin.shard_segments(index).await?;
            let map = build_segment_map(&copies, expected_docs)?;

            let Some(node_id) = self.target_node else {
                events.emit(PipelineEvent::PlacementUnconfirmed {
                    index: index.to_string(),
                });
                break map;
            };

            let misplaced = misplaced_primaries(&copies, node_id);
            if misplaced.is_empty() {
                events.emit(PipelineEvent::PlacementConfirmed {
                    index: index.to_string(),
                    node_id: node_id.to_string(),
                });
                break map;
            }

            let attempt = poller.wait().await?;
            events.emit(PipelineEvent::PlacementPending {
                index: index.to_string(),
                attempt,
                misplaced,
            });
        };

        events.emit(PipelineEvent::SegmentsVerified {
            index: index.to_string(),
            shards: map.len(),
            total_docs: map.total_docs(),
        });
        Ok(map)
    }
}
