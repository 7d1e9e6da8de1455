//! Error taxonomy of the acquisition lifecycle.

use numlease_store::StoreError;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, AcquireError>;

/// Errors surfaced by the acquisition lifecycle.
///
/// Only `reserve` returns these to a caller; polling resolves every failure
/// into the record's terminal status instead of propagating it.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The charge would take the balance negative.
    #[error("insufficient balance: balance={balance_cents}, required={required_cents}")]
    InsufficientBalance {
        /// Current balance in cents.
        balance_cents: i64,
        /// Required amount in cents.
        required_cents: i64,
    },

    /// The account is frozen and refuses debits.
    #[error("account disabled: {user_id}")]
    AccountDisabled {
        /// The disabled account's user id.
        user_id: String,
    },

    /// The provider has no numbers left on the requested line.
    #[error("no available number")]
    NoAvailableNumber,

    /// Transient provider failure (network or protocol). Retried inside the
    /// polling loop; terminal only for `reserve`.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider explicitly refused the request. Never retried.
    #[error("provider rejected the request")]
    ProviderRejected,

    /// Unexpected/unclassified failure.
    #[error("system error: {0}")]
    System(String),
}

impl From<StoreError> for AcquireError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientFunds {
                balance_cents,
                required_cents,
            } => Self::InsufficientBalance {
                balance_cents,
                required_cents,
            },
            StoreError::AccountDisabled { user_id } => Self::AccountDisabled { user_id },
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::System(msg),
            StoreError::NotFound { entity, id } => Self::System(format!("{entity} not found: {id}")),
        }
    }
}
