//! Provider gateway: the seam to the upstream number provider.
//!
//! `ProviderClient` is the external collaborator; its wire protocol,
//! authentication, and response parsing live elsewhere. The gateway wraps a
//! client and translates its errors into the engine taxonomy, so the
//! orchestrator never sees provider-specific failure shapes.

use std::sync::Arc;

use async_trait::async_trait;
use numlease_core::LineId;

use crate::error::AcquireError;
use crate::project::ProjectProfile;

/// A reserved phone number and the provider's correlation handle for it.
#[derive(Debug, Clone)]
pub struct PhoneReservation {
    /// The phone number, as the provider renders it.
    pub phone_number: String,

    /// Opaque handle the provider uses to correlate code delivery.
    pub provider_ref: String,
}

/// Result of a single code-delivery poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    /// The verification code arrived.
    Delivered(String),

    /// No code yet; ask again later.
    NotYet,

    /// The provider gave up on this number. Short-circuits the polling
    /// loop instead of waiting out the deadline.
    Rejected(Rejection),
}

/// Why the provider gave up on a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The number itself is bad (e.g. blacklisted by the target service).
    InvalidNumber,

    /// The provider refused to keep serving the request.
    Refused,
}

/// Errors a provider client can report.
#[derive(Debug, thiserror::Error)]
pub enum ProviderClientError {
    /// The line has no numbers left.
    #[error("no numbers available on this line")]
    Exhausted,

    /// The provider explicitly refused the request.
    #[error("provider rejected the request")]
    Rejected,

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with something unparseable.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// The external provider collaborator.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Reserve a phone number on the given line.
    async fn reserve_number(
        &self,
        project: &ProjectProfile,
        line: &LineId,
    ) -> Result<PhoneReservation, ProviderClientError>;

    /// Ask once whether a code has been delivered for `provider_ref`.
    async fn poll_code(
        &self,
        project: &ProjectProfile,
        provider_ref: &str,
    ) -> Result<CodeOutcome, ProviderClientError>;
}

/// Facade over a [`ProviderClient`] speaking the engine's error taxonomy.
#[derive(Clone)]
pub struct ProviderGateway {
    client: Arc<dyn ProviderClient>,
}

impl ProviderGateway {
    /// Wrap a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }

    /// Reserve a phone number.
    ///
    /// # Errors
    ///
    /// - `AcquireError::NoAvailableNumber` on provider exhaustion.
    /// - `AcquireError::ProviderRejected` on explicit refusal.
    /// - `AcquireError::Provider` on network/protocol failure.
    pub async fn reserve_number(
        &self,
        project: &ProjectProfile,
        line: &LineId,
    ) -> Result<PhoneReservation, AcquireError> {
        let reservation = self
            .client
            .reserve_number(project, line)
            .await
            .map_err(map_client_error)?;

        tracing::debug!(
            project = %project.id,
            line = %line,
            phone_number = %reservation.phone_number,
            "Number reserved"
        );

        Ok(reservation)
    }

    /// Poll once for a delivered code.
    ///
    /// # Errors
    ///
    /// Same mapping as [`Self::reserve_number`]; the caller decides whether
    /// an error is transient.
    pub async fn poll_for_code(
        &self,
        project: &ProjectProfile,
        provider_ref: &str,
    ) -> Result<CodeOutcome, AcquireError> {
        self.client
            .poll_code(project, provider_ref)
            .await
            .map_err(map_client_error)
    }
}

fn map_client_error(err: ProviderClientError) -> AcquireError {
    match err {
        ProviderClientError::Exhausted => AcquireError::NoAvailableNumber,
        ProviderClientError::Rejected => AcquireError::ProviderRejected,
        ProviderClientError::Transport(msg) | ProviderClientError::Protocol(msg) => {
            AcquireError::Provider(msg)
        }
    }
}
