//! Rolling usage-statistics seam.

use numlease_core::{AcquisitionStatus, UserId};

/// Receives terminal outcomes for rolling success statistics.
///
/// The sink is called after a record reaches its terminal status, once per
/// record (resolution itself is idempotent). Implementations must not
/// block; aggregation and storage live outside this crate.
pub trait StatsSink: Send + Sync {
    /// Record one terminal outcome for the user.
    fn record_outcome(&self, user_id: &UserId, status: AcquisitionStatus);
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn record_outcome(&self, _user_id: &UserId, _status: AcquisitionStatus) {}
}
