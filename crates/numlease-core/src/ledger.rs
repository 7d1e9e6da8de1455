//! Ledger entry types for numlease.
//!
//! Every balance change writes exactly one entry. Entries are append-only
//! and never mutated; replaying a user's entries in id order reproduces
//! every intermediate balance and the current one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, RecordId, UserId};

/// One balance-affecting event in the audit trail.
///
/// Amounts are signed: debits negative, credits positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Amount in cents. Negative = debit, positive = credit.
    pub amount_cents: i64,

    /// Balance before this entry (in cents).
    pub balance_before_cents: i64,

    /// Balance after this entry (in cents).
    pub balance_after_cents: i64,

    /// Human-readable description of the event.
    pub remark: String,

    /// The acquisition record this entry settles, if any.
    pub record_id: Option<RecordId>,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a debit entry. The amount is stored negative regardless of
    /// the sign passed in.
    #[must_use]
    pub fn debit(
        user_id: UserId,
        amount_cents: i64,
        balance_before_cents: i64,
        remark: String,
        record_id: Option<RecordId>,
    ) -> Self {
        let amount = -amount_cents.abs();
        Self {
            id: EntryId::generate(),
            user_id,
            amount_cents: amount,
            balance_before_cents,
            balance_after_cents: balance_before_cents + amount,
            remark,
            record_id,
            created_at: Utc::now(),
        }
    }

    /// Create a credit entry. The amount is stored positive regardless of
    /// the sign passed in.
    #[must_use]
    pub fn credit(
        user_id: UserId,
        amount_cents: i64,
        balance_before_cents: i64,
        remark: String,
        record_id: Option<RecordId>,
    ) -> Self {
        let amount = amount_cents.abs();
        Self {
            id: EntryId::generate(),
            user_id,
            amount_cents: amount,
            balance_before_cents,
            balance_after_cents: balance_before_cents + amount,
            remark,
            record_id,
            created_at: Utc::now(),
        }
    }

    /// Whether this entry is a debit.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        self.amount_cents < 0
    }
}
