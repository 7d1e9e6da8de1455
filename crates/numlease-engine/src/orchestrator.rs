//! The acquisition state machine.
//!
//! `reserve` runs synchronously up through persisting the record, then
//! detaches the polling phase as its own task. Polling owns the record from
//! claim to terminal status; every status mutation goes through the record
//! store's compare-and-swap, which is what lets a recovery-triggered poller
//! and the original one race safely: exactly one transitions the record,
//! the other observes the advanced status and stops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};

use numlease_core::{
    AcquisitionRecord, AcquisitionStatus, LineId, ProjectId, RecordId, UserId,
};
use numlease_store::{RecordPatch, RecordStore};

use crate::config::EngineConfig;
use crate::error::{AcquireError, Result};
use crate::gateway::{CodeOutcome, ProviderGateway, Rejection};
use crate::ledger::AccountLedger;
use crate::pricing::PricingResolver;
use crate::project::{ProjectCatalog, ProjectProfile};
use crate::stats::StatsSink;

const DEBIT_REMARK: &str = "acquisition debit";
const RESERVE_FAILED_REMARK: &str = "reservation failed, auto-refund";
const TIMEOUT_REMARK: &str = "timeout refund";
const INVALID_REMARK: &str = "invalid number refund";

/// What `reserve` hands back to the caller while polling continues in the
/// background.
#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    /// The record tracking this acquisition.
    pub record_id: RecordId,

    /// The reserved phone number.
    pub phone_number: String,

    /// Price charged, in cents.
    pub price_cents: i64,

    /// Balance after the charge, in cents.
    pub balance_after_cents: i64,
}

/// Drives acquisitions from paid request to terminal outcome.
pub struct AcquisitionOrchestrator {
    ledger: AccountLedger,
    gateway: ProviderGateway,
    records: Arc<dyn RecordStore>,
    pricing: Arc<dyn PricingResolver>,
    projects: Arc<dyn ProjectCatalog>,
    stats: Arc<dyn StatsSink>,
    config: EngineConfig,
    poll_permits: Arc<Semaphore>,
}

impl AcquisitionOrchestrator {
    /// Wire up the orchestrator.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: AccountLedger,
        gateway: ProviderGateway,
        records: Arc<dyn RecordStore>,
        pricing: Arc<dyn PricingResolver>,
        projects: Arc<dyn ProjectCatalog>,
        stats: Arc<dyn StatsSink>,
        config: EngineConfig,
    ) -> Self {
        let poll_permits = Arc::new(Semaphore::new(config.max_concurrent_polls));
        Self {
            ledger,
            gateway,
            records,
            pricing,
            projects,
            stats,
            config,
            poll_permits,
        }
    }

    /// Charge the user, reserve a number, persist the record, and detach
    /// the polling task. Returns the phone number synchronously.
    ///
    /// A failure after the charge refunds it before returning: no error
    /// path leaves a standing charge without a number.
    ///
    /// # Errors
    ///
    /// - `AcquireError::InsufficientBalance` / `AccountDisabled` from the
    ///   charge.
    /// - `AcquireError::NoAvailableNumber` / `ProviderRejected` /
    ///   `Provider` from the reservation.
    /// - `AcquireError::System` for storage failures or an unknown project.
    pub async fn reserve(
        self: &Arc<Self>,
        user_id: UserId,
        project_id: ProjectId,
        line_id: LineId,
    ) -> Result<ReserveOutcome> {
        let project = self.lookup_project(&project_id)?;
        let price_cents = self.pricing.price_cents(&user_id, &project_id, &line_id)?;

        let record_id = RecordId::generate();
        let debit = self
            .ledger
            .charge(&user_id, price_cents, DEBIT_REMARK, Some(record_id))?;

        let reservation = match self.gateway.reserve_number(&project, &line_id).await {
            Ok(reservation) => reservation,
            Err(err) => {
                self.refund_dangling_charge(&user_id, price_cents, record_id);
                return Err(err);
            }
        };

        let record = AcquisitionRecord::pending(
            record_id,
            user_id,
            project_id,
            line_id,
            reservation.phone_number.clone(),
            reservation.provider_ref,
            price_cents,
            debit.balance_before_cents,
        );

        if let Err(err) = self.records.create_record(&record) {
            self.refund_dangling_charge(&user_id, price_cents, record_id);
            return Err(err.into());
        }

        tracing::info!(
            record_id = %record_id,
            user_id = %user_id,
            project = %project.name,
            phone_number = %record.phone_number,
            price_cents = %price_cents,
            "Number acquired, awaiting code"
        );

        self.spawn_poll(record_id);

        Ok(ReserveOutcome {
            record_id,
            phone_number: record.phone_number,
            price_cents,
            balance_after_cents: debit.balance_after_cents,
        })
    }

    /// Detach a polling task for the record.
    ///
    /// Safe to call for records another runner already owns or has
    /// resolved: `poll` no-ops in both cases. The recovery sweeper relies
    /// on this.
    pub fn spawn_poll(self: &Arc<Self>, record_id: RecordId) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let Ok(_permit) = orchestrator.poll_permits.clone().acquire_owned().await else {
                return;
            };
            orchestrator.poll(record_id).await;
        });
    }

    /// Run the polling phase for a record to its terminal status.
    ///
    /// Surfaces no error to any caller; the outcome is observed by reading
    /// the record. Unexpected failures are logged and abandon the task,
    /// leaving the record for the recovery sweeper.
    pub async fn poll(&self, record_id: RecordId) {
        if let Err(err) = self.poll_inner(record_id).await {
            tracing::error!(
                record_id = %record_id,
                error = %err,
                "Polling task aborted; record left for recovery"
            );
        }
    }

    async fn poll_inner(&self, record_id: RecordId) -> Result<()> {
        let Some(record) = self.records.get_record(&record_id)? else {
            return Err(AcquireError::System(format!("record not found: {record_id}")));
        };

        if record.status.is_terminal() {
            return Ok(());
        }

        let project = self.lookup_project(&record.project_id)?;

        // A re-poll keeps the original polling start, so the deadline a
        // crashed runner computed still stands for its successor.
        let started = record.polling_started_at.unwrap_or_else(Utc::now);
        let claimed = self.records.update_status(
            &record_id,
            &[AcquisitionStatus::PendingCode, AcquisitionStatus::InProgress],
            AcquisitionStatus::InProgress,
            RecordPatch {
                polling_started_at: Some(started),
                ..RecordPatch::default()
            },
        )?;
        if !claimed {
            tracing::debug!(record_id = %record_id, "Record already resolved; nothing to do");
            return Ok(());
        }

        let deadline = project_deadline(started, &project);
        let interval = project.poll_interval.unwrap_or(self.config.poll_interval);

        loop {
            if Instant::now() >= deadline {
                tracing::info!(record_id = %record_id, "Code delivery deadline exceeded");
                return self
                    .resolve_failure(&record, AcquisitionStatus::Timeout, TIMEOUT_REMARK)
                    .await;
            }

            match self.gateway.poll_for_code(&project, &record.provider_ref).await {
                Ok(CodeOutcome::Delivered(code)) => {
                    return self.resolve_success(&record, code).await;
                }
                Ok(CodeOutcome::Rejected(Rejection::InvalidNumber)) => {
                    tracing::info!(record_id = %record_id, "Provider flagged the number invalid");
                    return self
                        .resolve_failure(&record, AcquisitionStatus::Invalid, INVALID_REMARK)
                        .await;
                }
                Ok(CodeOutcome::Rejected(Rejection::Refused))
                | Err(AcquireError::ProviderRejected) => {
                    tracing::info!(record_id = %record_id, "Provider refused to keep serving");
                    return self
                        .resolve_failure(&record, AcquisitionStatus::Timeout, TIMEOUT_REMARK)
                        .await;
                }
                Ok(CodeOutcome::NotYet) => {}
                Err(err) => {
                    // Transient until the deadline says otherwise.
                    tracing::warn!(
                        record_id = %record_id,
                        error = %err,
                        "Provider poll failed; retrying"
                    );
                }
            }

            sleep(interval).await;
        }
    }

    async fn resolve_success(&self, record: &AcquisitionRecord, code: String) -> Result<()> {
        let resolved = self.records.update_status(
            &record.id,
            &[AcquisitionStatus::InProgress],
            AcquisitionStatus::Success,
            RecordPatch {
                code: Some(code),
                resolved_at: Some(Utc::now()),
                ..RecordPatch::default()
            },
        )?;
        if !resolved {
            tracing::debug!(record_id = %record.id, "Lost resolution race");
            return Ok(());
        }

        self.stats.record_outcome(&record.user_id, AcquisitionStatus::Success);
        tracing::info!(
            record_id = %record.id,
            user_id = %record.user_id,
            "Verification code delivered"
        );
        Ok(())
    }

    async fn resolve_failure(
        &self,
        record: &AcquisitionRecord,
        status: AcquisitionStatus,
        remark: &str,
    ) -> Result<()> {
        let resolved = self.records.update_status(
            &record.id,
            &[AcquisitionStatus::InProgress],
            status,
            RecordPatch {
                resolved_at: Some(Utc::now()),
                ..RecordPatch::default()
            },
        )?;
        if !resolved {
            tracing::debug!(record_id = %record.id, "Lost resolution race");
            return Ok(());
        }

        // clear_charged lets exactly one resolver through, so even a
        // recovery poller racing the original cannot refund twice.
        if self.records.clear_charged(&record.id)? {
            self.ledger
                .credit(&record.user_id, record.price_cents, remark, Some(record.id))?;
        }

        self.stats.record_outcome(&record.user_id, status);
        tracing::info!(
            record_id = %record.id,
            user_id = %record.user_id,
            status = ?status,
            "Acquisition resolved without a code"
        );
        Ok(())
    }

    fn lookup_project(&self, project_id: &ProjectId) -> Result<ProjectProfile> {
        self.projects
            .project(project_id)
            .ok_or_else(|| AcquireError::System(format!("unknown project: {project_id}")))
    }

    /// Best-effort reversal of a charge whose acquisition never took hold.
    fn refund_dangling_charge(&self, user_id: &UserId, price_cents: i64, record_id: RecordId) {
        if let Err(err) = self
            .ledger
            .credit(user_id, price_cents, RESERVE_FAILED_REMARK, Some(record_id))
        {
            tracing::error!(
                user_id = %user_id,
                record_id = %record_id,
                price_cents = %price_cents,
                error = %err,
                "Auto-refund failed; ledger audit will flag the account"
            );
        }
    }
}

/// Project the record's wall-clock deadline onto the monotonic clock.
///
/// A record resumed long after its polling started (the restart case) gets
/// a deadline in the past and times out before the first provider call.
fn project_deadline(started: DateTime<Utc>, project: &ProjectProfile) -> Instant {
    let elapsed = Utc::now()
        .signed_duration_since(started)
        .to_std()
        .unwrap_or_default();
    let remaining = project.code_timeout.saturating_sub(elapsed);
    Instant::now() + remaining
}
