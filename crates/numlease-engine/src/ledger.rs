//! The account ledger: locked balance mutation plus the audit trail.
//!
//! Every mutation runs as one exclusive critical section on the account's
//! row: lock, check, mutate, log. The lock is acquired fresh per call and
//! never held across a provider call or any other await point.

use std::sync::Arc;

use numlease_core::{LedgerEntry, RecordId, UserId};
use numlease_store::AccountStore;

use crate::error::{AcquireError, Result};

/// Entries fetched per page while replaying a ledger for audit.
const AUDIT_PAGE_SIZE: usize = 500;

/// Balance mutations with an append-only audit trail.
#[derive(Clone)]
pub struct AccountLedger {
    accounts: Arc<dyn AccountStore>,
}

impl AccountLedger {
    /// Create a ledger over an account store.
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Debit `amount_cents` from the user, writing one ledger entry.
    ///
    /// # Errors
    ///
    /// - `AcquireError::InsufficientBalance` if the balance cannot cover it.
    /// - `AcquireError::AccountDisabled` if the account is frozen.
    /// - `AcquireError::System` for storage failures or a non-positive
    ///   amount.
    pub fn charge(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        remark: &str,
        record_id: Option<RecordId>,
    ) -> Result<LedgerEntry> {
        if amount_cents <= 0 {
            return Err(AcquireError::System(format!(
                "charge amount must be positive, got {amount_cents}"
            )));
        }

        let entry = self
            .accounts
            .apply_entry(user_id, -amount_cents, remark, record_id)?;

        tracing::info!(
            user_id = %user_id,
            amount_cents = %amount_cents,
            balance_after = %entry.balance_after_cents,
            remark = %remark,
            "Account charged"
        );

        Ok(entry)
    }

    /// Credit `amount_cents` to the user, writing one ledger entry.
    /// Credits never fail on funds or on a frozen account.
    ///
    /// # Errors
    ///
    /// Returns `AcquireError::System` for storage failures or a
    /// non-positive amount.
    pub fn credit(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        remark: &str,
        record_id: Option<RecordId>,
    ) -> Result<LedgerEntry> {
        if amount_cents <= 0 {
            return Err(AcquireError::System(format!(
                "credit amount must be positive, got {amount_cents}"
            )));
        }

        let entry = self
            .accounts
            .apply_entry(user_id, amount_cents, remark, record_id)?;

        tracing::info!(
            user_id = %user_id,
            amount_cents = %amount_cents,
            balance_after = %entry.balance_after_cents,
            remark = %remark,
            "Account credited"
        );

        Ok(entry)
    }

    /// Current balance in cents.
    ///
    /// # Errors
    ///
    /// Returns `AcquireError::System` if the account doesn't exist or the
    /// store fails.
    pub fn balance(&self, user_id: &UserId) -> Result<i64> {
        let account = self
            .accounts
            .get_account(user_id)?
            .ok_or_else(|| AcquireError::System(format!("account not found: {user_id}")))?;
        Ok(account.balance_cents)
    }

    /// All ledger entries of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AcquireError::System` for storage failures.
    pub fn entries(&self, user_id: &UserId, limit: usize, offset: usize) -> Result<Vec<LedgerEntry>> {
        Ok(self.accounts.list_entries(user_id, limit, offset)?)
    }

    /// Replay the user's ledger and check it reproduces the stored balance.
    ///
    /// Accounts are created with a zero balance and only ever mutated
    /// through entries, so the entry amounts must sum to the current
    /// balance, and every entry's own balances must differ by exactly its
    /// amount.
    ///
    /// # Errors
    ///
    /// Returns `AcquireError::System` if the account doesn't exist or the
    /// store fails.
    pub fn audit(&self, user_id: &UserId) -> Result<bool> {
        let account = self
            .accounts
            .get_account(user_id)?
            .ok_or_else(|| AcquireError::System(format!("account not found: {user_id}")))?;

        let mut running_sum: i64 = 0;
        let mut offset = 0;
        loop {
            let page = self.accounts.list_entries(user_id, AUDIT_PAGE_SIZE, offset)?;
            let done = page.len() < AUDIT_PAGE_SIZE;
            offset += page.len();

            for entry in &page {
                if entry.balance_after_cents != entry.balance_before_cents + entry.amount_cents {
                    tracing::warn!(
                        user_id = %user_id,
                        entry_id = %entry.id,
                        "Ledger entry does not balance"
                    );
                    return Ok(false);
                }
                running_sum += entry.amount_cents;
            }

            if done {
                break;
            }
        }

        Ok(running_sum == account.balance_cents)
    }
}
