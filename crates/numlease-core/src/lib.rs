//! Core types for the numlease platform.
//!
//! This crate provides the foundational types used throughout numlease:
//!
//! - **Identifiers**: `UserId`, `ProjectId`, `LineId`, `RecordId`, `EntryId`
//! - **Accounts**: `Account`, `AccountStatus`
//! - **Ledger**: `LedgerEntry`
//! - **Records**: `AcquisitionRecord`, `AcquisitionStatus`
//!
//! # Money
//!
//! All monetary amounts are integer cents stored as `i64` to avoid floating
//! point precision issues. Ledger amounts are signed: debits are negative,
//! credits are positive, consistently across the platform.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod ids;
pub mod ledger;
pub mod record;

pub use account::{Account, AccountStatus};
pub use ids::{EntryId, IdError, LineId, ProjectId, RecordId, UserId};
pub use ledger::LedgerEntry;
pub use record::{AcquisitionRecord, AcquisitionStatus};
