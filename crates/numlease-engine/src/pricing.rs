//! Pricing seam.
//!
//! Price inheritance and template management live outside this crate; the
//! engine only asks what one acquisition costs.

use numlease_core::{LineId, ProjectId, UserId};

use crate::error::Result;

/// Resolves the price of one acquisition.
pub trait PricingResolver: Send + Sync {
    /// Price in cents for `user` renting a number from `line` for
    /// `project`.
    ///
    /// # Errors
    ///
    /// Implementations return `AcquireError::System` when no price is
    /// configured for the combination.
    fn price_cents(&self, user: &UserId, project: &ProjectId, line: &LineId) -> Result<i64>;
}

/// A single flat price, for tests and single-price deployments.
#[derive(Debug, Clone, Copy)]
pub struct FixedPricing {
    /// The flat price in cents.
    pub price_cents: i64,
}

impl PricingResolver for FixedPricing {
    fn price_cents(&self, _user: &UserId, _project: &ProjectId, _line: &LineId) -> Result<i64> {
        Ok(self.price_cents)
    }
}
