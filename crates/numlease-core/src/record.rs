//! Acquisition record types for numlease.
//!
//! One record per charge attempt. Records are created by the orchestrator's
//! reserve step, advanced only through conditional status updates, and never
//! deleted (kept for audit and statistics).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LineId, ProjectId, RecordId, UserId};

/// One charge-and-retrieve transaction for a rented phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    /// Unique record ID (ULID, the recovery-scan ordering key).
    pub id: RecordId,

    /// The buyer.
    pub user_id: UserId,

    /// The target service the number was rented for.
    pub project_id: ProjectId,

    /// The provider line the number was drawn from.
    pub line_id: LineId,

    /// The reserved phone number.
    pub phone_number: String,

    /// Opaque handle the provider uses to correlate code delivery.
    pub provider_ref: String,

    /// The delivered verification code, once it arrives.
    pub code: Option<String>,

    /// Where the record is in its lifecycle.
    pub status: AcquisitionStatus,

    /// True while a debit ledger entry for this record stands unreversed.
    pub charged: bool,

    /// Price charged, in cents.
    pub price_cents: i64,

    /// Balance before the charge (in cents).
    pub balance_before_cents: i64,

    /// Balance after the charge (in cents).
    pub balance_after_cents: i64,

    /// When the number was reserved and the charge taken.
    pub reserved_at: DateTime<Utc>,

    /// When the first polling attempt claimed the record. The code-delivery
    /// deadline is computed from this, so it is never reset by a re-poll.
    pub polling_started_at: Option<DateTime<Utc>>,

    /// When the record reached a terminal status.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AcquisitionRecord {
    /// Create a freshly charged record awaiting its first polling attempt.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: RecordId,
        user_id: UserId,
        project_id: ProjectId,
        line_id: LineId,
        phone_number: String,
        provider_ref: String,
        price_cents: i64,
        balance_before_cents: i64,
    ) -> Self {
        Self {
            id,
            user_id,
            project_id,
            line_id,
            phone_number,
            provider_ref,
            code: None,
            status: AcquisitionStatus::PendingCode,
            charged: true,
            price_cents,
            balance_before_cents,
            balance_after_cents: balance_before_cents - price_cents,
            reserved_at: Utc::now(),
            polling_started_at: None,
            resolved_at: None,
        }
    }
}

/// Lifecycle status of an acquisition record.
///
/// Statuses only move forward:
///
/// ```text
/// PendingCode -> InProgress -> Success | Timeout | Invalid
/// ```
///
/// `PendingCode` exists only in the window between reservation and the first
/// polling attempt; recovery treats it the same as `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStatus {
    /// Charged and reserved; polling has not claimed the record yet.
    PendingCode,

    /// A polling task owns the record and is waiting for the code.
    InProgress,

    /// The code was delivered. The charge stands.
    Success,

    /// The deadline passed, or the provider refused to serve the number.
    /// The charge was refunded.
    Timeout,

    /// The provider flagged the number itself as invalid (e.g. blacklisted).
    /// The charge was refunded.
    Invalid,
}

impl AcquisitionStatus {
    /// Whether no further transition can occur from this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Timeout | Self::Invalid)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(&self, next: Self) -> bool {
        match self {
            Self::PendingCode => matches!(next, Self::InProgress),
            Self::InProgress => next.is_terminal(),
            Self::Success | Self::Timeout | Self::Invalid => false,
        }
    }
}
