//! Migration controller: open, force-merge, relocate onto the target node,
//! wait for recoveries to settle, then capture the UUID and document count.

use std::collections::BTreeMap;

use crate::cluster::ClusterAdmin;
use crate::config::{PollConfig, RelocationConfig};
use crate::error::Result;
use crate::events::{EventSink, PipelineEvent};
use crate::model::{ClosedIndex, IndexHandle};
use crate::poll::Poller;

/// Segments per shard requested from the force-merge.
pub const TARGET_SEGMENTS: u32 = 1;

/// State of the index once migration completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedIndex {
    /// Name and UUID.
    pub handle: IndexHandle,
    /// Index-level document count, captured after settlement.
    pub doc_count: u64,
}

/// Drives an index onto the target node as one merged segment per shard.
pub struct MigrationController<'a, A: ClusterAdmin + ?Sized> {
    admin: &'a A,
    relocation: &'a RelocationConfig,
    poll: &'a PollConfig,
}

impl<'a, A: ClusterAdmin + ?Sized> MigrationController<'a, A> {
    /// Creates a controller over an admin connection.
    pub fn new(admin: &'a A, relocation: &'a RelocationConfig, poll: &'a PollConfig) -> Self {
        Self {
            admin,
            relocation,
            poll,
        }
    }

    /// Runs every migration step in order. Any admin failure aborts the run.
    ///
    /// # Errors
    ///
    /// Propagates admin errors; returns [`crate::Error::Timeout`] when
    /// recoveries do not settle within the poll budget.
    pub async fn migrate(&self, index: &str, events: &mut dyn EventSink) -> Result<MigratedIndex> {
        self.admin.open_index(index).await?;
        events.emit(PipelineEvent::IndexOpened {
            index: index.to_string(),
        });

        self.admin.force_merge(index, TARGET_SEGMENTS).await?;
        events.emit(PipelineEvent::ForceMerged {
            index: index.to_string(),
            max_segments: TARGET_SEGMENTS,
        });

        self.require_target_node(index, events).await?;
        self.wait_for_recoveries(index, events).await?;

        let uuid = self.admin.index_uuid(index).await?;
        events.emit(PipelineEvent::UuidResolved {
            index: index.to_string(),
            uuid: uuid.clone(),
        });

        let doc_count = self.admin.doc_count(index).await?;
        events.emit(PipelineEvent::DocCountCaptured {
            index: index.to_string(),
            count: doc_count,
        });

        Ok(MigratedIndex {
            handle: IndexHandle::new(index, uuid),
            doc_count,
        })
    }

    async fn require_target_node(&self, index: &str, events: &mut dyn EventSink) -> Result<()> {
        let key = self.relocation.setting_key();
        let value = self.relocation.node_attr_value.clone();
        let settings = BTreeMap::from([(key.clone(), value.clone())]);

        self.admin.update_settings(index, &settings).await?;
        events.emit(PipelineEvent::RoutingUpdated {
            index: index.to_string(),
            key,
            value,
        });

        if self.relocation.explicit_reroute {
            self.admin.reroute().await?;
            events.emit(PipelineEvent::RerouteIssued);
        }
        Ok(())
    }

    /// Sleeps before every probe: right after the settings update the
    /// relocations may not be registered yet.
    async fn wait_for_recoveries(&self, index: &str, events: &mut dyn EventSink) -> Result<()> {
        let mut poller = Poller::new("recovery settlement", self.poll);
        loop {
            let attempt = poller.wait().await?;
            let recoveries = self.admin.active_recoveries(index).await?;
            if recoveries.is_settled(index) {
                events.emit(PipelineEvent::RecoverySettled {
                    index: index.to_string(),
                    attempts: attempt,
                });
                return Ok(());
            }
            events.emit(PipelineEvent::RecoveryPending {
                index: index.to_string(),
                attempt,
                active: recoveries.active_for(index),
            });
        }
    }
}

/// Closes the index ahead of the disk read.
///
/// # Errors
///
/// Propagates the admin error.
pub async fn close_for_read<'h, A: ClusterAdmin + ?Sized>(
    admin: &A,
    handle: &'h IndexHandle,
    events: &mut dyn EventSink,
) -> Result<ClosedIndex<'h>> {
    admin.close_index(handle.name()).await?;
    events.emit(PipelineEvent::IndexClosed {
        index: handle.name().to_string(),
    });
    Ok(ClosedIndex::new(handle))
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
