//! Error types for numlease storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Row not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of row that was missing.
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A debit would take the balance negative.
    #[error("insufficient funds: balance={balance_cents}, required={required_cents}")]
    InsufficientFunds {
        /// Current balance in cents.
        balance_cents: i64,
        /// Required amount in cents.
        required_cents: i64,
    },

    /// A debit was attempted against a disabled account.
    #[error("account disabled: {user_id}")]
    AccountDisabled {
        /// The disabled account's user id.
        user_id: String,
    },
}
