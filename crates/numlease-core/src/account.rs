//! Account types for numlease.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user account holding the prepaid balance numbers are bought from.
///
/// The balance is only ever mutated through the account ledger, which holds
/// the account's row lock for the whole check-mutate-log sequence. The
/// balance must never go negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The user this account belongs to.
    pub user_id: UserId,

    /// Current balance in cents.
    pub balance_cents: i64,

    /// Whether the account may be charged.
    pub status: AccountStatus,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account with zero balance.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance_cents: 0,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the account can cover a debit of `amount_cents`.
    #[must_use]
    pub fn has_sufficient_balance(&self, amount_cents: i64) -> bool {
        self.balance_cents >= amount_cents
    }

    /// Check whether the account accepts debits.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Status of an account.
///
/// Disabled accounts refuse debits but still accept credits, so a refund is
/// never blocked by an account freeze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Account may be charged.
    Active,

    /// Account is frozen; debits are refused.
    Disabled,
}
