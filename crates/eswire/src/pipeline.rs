//! Export pipeline orchestration.

use serde::Serialize;
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{info, warn};

use crate::cluster::common::validate_index_name;
use crate::cluster::{ClusterAdmin, ElasticsearchAdmin};
use crate::config::WireConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, PipelineEvent};
use crate::migration::{close_for_read, MigrationController};
use crate::model::{DocumentSink, ScanOutcome};
use crate::scanner::LocalSegmentScanner;
use crate::store::{StoreOpener, TantivyStoreOpener};
use crate::verify::ConsistencyVerifier;

/// Export report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    /// Index name.
    pub index: String,
    /// Index UUID on disk.
    pub uuid: String,
    /// Shards read.
    pub shards: usize,
    /// Documents in the verified segment map.
    pub total_docs: u64,
    /// How the scan ended.
    pub outcome: ScanOutcome,
    /// Whether the index was deleted afterwards.
    pub deleted: bool,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl ExportReport {
    /// Documents handed to the sink.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.outcome.delivered()
    }

    /// Calculate throughput (documents per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.delivered() as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Migrate-then-extract pipeline.
pub struct Pipeline<A: ClusterAdmin, O: StoreOpener> {
    config: WireConfig,
    admin: A,
    opener: O,
}

impl Pipeline<ElasticsearchAdmin, TantivyStoreOpener> {
    /// Create a pipeline talking to the configured cluster and reading
    /// shards with tantivy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: WireConfig) -> Result<Self> {
        config.validate()?;
        let admin = ElasticsearchAdmin::new(config.cluster.clone());
        let opener = TantivyStoreOpener::new(config.store.payload_field.clone());
        Ok(Self::new(config, admin, opener))
    }
}

impl<A: ClusterAdmin, O: StoreOpener> Pipeline<A, O> {
    /// Create a pipeline from its collaborators.
    pub fn new(config: WireConfig, admin: A, opener: O) -> Self {
        Self {
            config,
            admin,
            opener,
        }
    }

    /// Run the pipeline for `index`, streaming documents to `sink`.
    ///
    /// The admin connection is closed exactly once, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first failure of any step; consistency failures are
    /// reported as [`crate::Error::Invariant`].
    pub async fn run<S: DocumentSink + ?Sized>(
        self,
        index: &str,
        sink: &mut S,
        events: &mut dyn EventSink,
    ) -> Result<ExportReport> {
        self.run_until(index, sink, events, std::future::pending())
            .await
    }

    /// Like [`Pipeline::run`], but gives up with [`Error::Cancelled`] once
    /// `cancel` completes. The admin connection is still closed once.
    ///
    /// `cancel` is observed while the run awaits the cluster; during the
    /// shard scan only the sink can stop the run.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`]; [`Error::Cancelled`] on cancellation.
    pub async fn run_until<S, C>(
        mut self,
        index: &str,
        sink: &mut S,
        events: &mut dyn EventSink,
        cancel: C,
    ) -> Result<ExportReport>
    where
        S: DocumentSink + ?Sized,
        C: Future<Output = ()>,
    {
        let start = std::time::Instant::now();

        info!("Starting export of index {}", index);

        let result = match validate_index_name(index) {
            Ok(()) => {
                tokio::select! {
                    result = self.export(index, sink, events) => result,
                    () = cancel => {
                        warn!("Export of index {} cancelled", index);
                        Err(Error::Cancelled)
                    }
                }
            }
            Err(e) => Err(e),
        };
        let closed = self.admin.close().await;

        let mut report = match (result, closed) {
            (Ok(report), Ok(())) => report,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("Closing cluster connection failed: {}", close_err);
                }
                return Err(e);
            }
        };

        report.duration_secs = start.elapsed().as_secs_f64();

        info!(
            "Export complete: {} of {} docs from {} shards in {:.2}s ({:.0} docs/sec)",
            report.delivered(),
            report.total_docs,
            report.shards,
            report.duration_secs,
            report.throughput()
        );

        Ok(report)
    }

    async fn export<S: DocumentSink + ?Sized>(
        &self,
        index: &str,
        sink: &mut S,
        events: &mut dyn EventSink,
    ) -> Result<ExportReport> {
        let config = &self.config;

        let migrated = MigrationController::new(&self.admin, &config.relocation, &config.poll)
            .migrate(index, events)
            .await?;

        let map = ConsistencyVerifier::new(
            &self.admin,
            &config.poll,
            config.relocation.node_id.as_deref(),
        )
        .verify(&migrated.handle, migrated.doc_count, events)
        .await?;

        let closed = close_for_read(&self.admin, &migrated.handle, events).await?;

        let scanner = LocalSegmentScanner::new(&self.opener, &config.data_dirs);
        let locations = scanner.resolve(&closed, &map, events)?;
        let total_docs = map.total_docs();
        let outcome = scan_in_place(|| {
            scanner.scan(&closed, &map, &locations, total_docs, sink, events)
        })?;

        let deleted = config.options.delete_after_export && !outcome.is_stopped();
        if deleted {
            self.admin.delete_index(index).await?;
            events.emit(PipelineEvent::IndexDeleted {
                index: index.to_string(),
            });
        }

        Ok(ExportReport {
            index: index.to_string(),
            uuid: migrated.handle.uuid().to_string(),
            shards: locations.len(),
            total_docs,
            outcome,
            deleted,
            duration_secs: 0.0,
        })
    }
}

/// Runs the blocking shard scan, off the async scheduler where the runtime
/// allows it.
fn scan_in_place<T>(scan: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(scan)
        }
        _ => scan(),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
