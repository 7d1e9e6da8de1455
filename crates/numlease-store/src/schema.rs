//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account rows, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const LEDGER_ENTRIES: &str = "ledger_entries";

    /// Index: ledger entries by user, keyed by `user_id || entry_id`.
    /// Value is empty (index only).
    pub const LEDGER_BY_USER: &str = "ledger_by_user";

    /// Acquisition records, keyed by `record_id` (ULID).
    pub const RECORDS: &str = "records";

    /// Index: records by user, keyed by `user_id || record_id`.
    /// Value is empty (index only).
    pub const RECORDS_BY_USER: &str = "records_by_user";

    /// Membership index of non-terminal records, keyed by `record_id`.
    /// A record's key is inserted on create and removed in the same write
    /// batch as its terminal transition; the recovery scan iterates this
    /// family instead of the full record table.
    pub const RECORDS_PENDING: &str = "records_pending";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::LEDGER_ENTRIES,
        cf::LEDGER_BY_USER,
        cf::RECORDS,
        cf::RECORDS_BY_USER,
        cf::RECORDS_PENDING,
    ]
}
