//! Recovery sweep for transactions interrupted by a crash or redeploy.
//!
//! A process shutdown abandons its in-flight polling tasks; the records
//! they owned stay `PendingCode` or `InProgress` with no task attached. The
//! sweeper walks those records in id order and re-submits each to the
//! orchestrator's poll path. Because polling claims and resolves records
//! through conditional updates only, re-submitting a record that a live
//! runner still owns, or that is already terminal, does nothing.

use std::sync::Arc;
use std::time::Duration;

use numlease_core::RecordId;
use numlease_store::RecordStore;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::orchestrator::AcquisitionOrchestrator;

/// Startup/periodic scan that resumes interrupted acquisitions.
pub struct RecoverySweeper {
    records: Arc<dyn RecordStore>,
    orchestrator: Arc<AcquisitionOrchestrator>,
    batch_size: usize,
    batch_delay: Duration,
}

impl RecoverySweeper {
    /// Create a sweeper with the engine's batch tunables.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        orchestrator: Arc<AcquisitionOrchestrator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            records,
            orchestrator,
            batch_size: config.recovery_batch_size,
            batch_delay: config.recovery_batch_delay,
        }
    }

    /// Run one full sweep. Returns the number of records re-submitted.
    ///
    /// Scans forward from the lowest record id in bounded batches, sleeping
    /// between batches to bound the load, and stops at the first empty
    /// batch. Every record that was non-terminal when the sweep started is
    /// visited at least once.
    ///
    /// # Errors
    ///
    /// Returns `AcquireError::System` if a scan fails; records already
    /// re-submitted keep running.
    pub async fn run_once(&self) -> Result<usize> {
        let mut cursor: Option<RecordId> = None;
        let mut resubmitted = 0;

        loop {
            let batch = self.records.scan_pending(cursor, self.batch_size)?;
            let Some(last) = batch.last() else {
                break;
            };
            cursor = Some(last.id);

            for record in &batch {
                tracing::info!(
                    record_id = %record.id,
                    user_id = %record.user_id,
                    status = ?record.status,
                    "Resuming interrupted acquisition"
                );
                self.orchestrator.spawn_poll(record.id);
            }
            resubmitted += batch.len();

            tokio::time::sleep(self.batch_delay).await;
        }

        if resubmitted > 0 {
            tracing::info!(resubmitted = %resubmitted, "Recovery sweep complete");
        } else {
            tracing::debug!("Recovery sweep found nothing to resume");
        }

        Ok(resubmitted)
    }

    /// Run `run_once` now and then again every `every`, as a safety net for
    /// polling tasks lost without a process restart.
    ///
    /// The loop runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn run_periodic(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(err) = self.run_once().await {
                    tracing::error!(error = %err, "Recovery sweep failed; will retry");
                }
                tokio::time::sleep(every).await;
            }
        })
    }
}
