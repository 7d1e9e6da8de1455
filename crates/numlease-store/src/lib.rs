//! `RocksDB` storage layer for numlease.
//!
//! This crate provides persistent storage for accounts, ledger entries, and
//! acquisition records using `RocksDB` with column families for efficient
//! indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: account rows, keyed by `user_id`
//! - `ledger_entries`: append-only ledger entries, keyed by `entry_id` (ULID)
//! - `ledger_by_user`: index for listing entries by user
//! - `records`: acquisition records, keyed by `record_id` (ULID)
//! - `records_by_user`: index for listing records by user
//! - `records_pending`: membership index of non-terminal records, the
//!   recovery scan's cursor space
//!
//! # Locking
//!
//! `RocksDB` write batches make each mutation atomic, but read-modify-write
//! sequences still need exclusive sections. The store keeps a registry of
//! per-row mutexes created on first use: one per account for balance
//! mutations, one per record for conditional status updates. No operation
//! takes more than one row lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use numlease_core::{
    Account, AcquisitionRecord, AcquisitionStatus, LedgerEntry, RecordId, UserId,
};

/// Optional fields applied together with a status transition.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    /// Delivered verification code.
    pub code: Option<String>,

    /// When polling claimed the record. Applied only if the record does not
    /// already carry a polling start, so a re-poll never moves the deadline.
    pub polling_started_at: Option<DateTime<Utc>>,

    /// When the record reached a terminal status.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Durable storage for accounts and their balance audit trail.
///
/// Implementations must make `apply_entry` a single exclusive critical
/// section per account: lock, check, mutate, log, with no interleaving
/// mutation on the same account.
pub trait AccountStore: Send + Sync {
    /// Insert or update an account row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Apply one signed balance change and append its ledger entry, under
    /// the account's row lock. Negative amounts are debits and are refused
    /// (`InsufficientFunds`) if they would take the balance negative, or
    /// (`AccountDisabled`) if the account is frozen. Positive amounts are
    /// credits and always apply.
    ///
    /// Returns the written entry, which carries the before/after balances.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientFunds` if a debit would go negative.
    /// - `StoreError::AccountDisabled` if a debit hits a frozen account.
    fn apply_entry(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        remark: &str,
        record_id: Option<RecordId>,
    ) -> Result<LedgerEntry>;

    /// List a user's ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries(&self, user_id: &UserId, limit: usize, offset: usize)
        -> Result<Vec<LedgerEntry>>;
}

/// Durable storage for acquisition records.
pub trait RecordStore: Send + Sync {
    /// Insert a new record and register it in the pending index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_record(&self, record: &AcquisitionRecord) -> Result<()>;

    /// Get a record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_record(&self, id: &RecordId) -> Result<Option<AcquisitionRecord>>;

    /// Conditionally advance a record's status.
    ///
    /// The transition applies only if the record's current status is one of
    /// `expected`; otherwise nothing is written and `false` is returned.
    /// This compare-and-swap is the sole status-mutation primitive, and is
    /// what serializes concurrent resolvers without a lock spanning the
    /// polling loop. A transition to a terminal status also removes the
    /// record from the pending index, in the same write batch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    fn update_status(
        &self,
        id: &RecordId,
        expected: &[AcquisitionStatus],
        new: AcquisitionStatus,
        patch: RecordPatch,
    ) -> Result<bool>;

    /// Conditionally clear the record's `charged` flag.
    ///
    /// Returns `true` for exactly one caller when the flag was set; `false`
    /// once it is already cleared. The winner is the one resolver allowed to
    /// issue the refund.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    fn clear_charged(&self, id: &RecordId) -> Result<bool>;

    /// Scan non-terminal records with `id` strictly greater than `after`,
    /// ascending by id, at most `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn scan_pending(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<AcquisitionRecord>>;

    /// List a user's records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_records_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AcquisitionRecord>>;
}
