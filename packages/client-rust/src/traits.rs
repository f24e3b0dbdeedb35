use async_trait::async_trait;
use setdata_core::{CorrelationId, Element};

use crate::error::SubmissionError;

/// Capability handle representing the caller.
///
/// Created by the transport before authorization and required, once
/// authorized, to submit the business request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    handle: u64,
}

impl Identity {
    #[must_use]
    pub fn new(handle: u64) -> Self {
        Self { handle }
    }

    #[must_use]
    pub fn handle(&self) -> u64 {
        self.handle
    }
}

/// The session capability the client drives.
///
/// Every call only submits work: outcomes arrive later as events on the
/// channel the transport was built with. A returned `SubmissionError` means
/// the call never left the client.
/// Implementations: loopback (demo, tests), recording (tests), real session (external).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin connecting. Produces `SessionStatus` events.
    async fn start_session(&self) -> Result<(), SubmissionError>;

    /// Open a named service. Produces `ServiceStatus` events tagged with the name.
    async fn open_service(&self, name: &str) -> Result<(), SubmissionError>;

    /// Request an authentication token. Produces a `TokenStatus` event.
    async fn generate_token(&self) -> Result<(), SubmissionError>;

    /// Allocate a fresh identity handle.
    fn create_identity(&self) -> Identity;

    /// Submit an authorization request for `identity` using `token`.
    async fn send_authorization_request(
        &self,
        token: &str,
        identity: &Identity,
        correlation_id: CorrelationId,
    ) -> Result<(), SubmissionError>;

    /// Submit a business request on behalf of an authorized identity.
    async fn send_request(
        &self,
        request: &Element,
        identity: &Identity,
        correlation_id: CorrelationId,
    ) -> Result<(), SubmissionError>;

    /// Tear the session down. Default is a no-op.
    async fn stop_session(&self) -> Result<(), SubmissionError> {
        Ok(())
    }
}
