//! Error taxonomy for the session flow.

use setdata_core::{CorrelationId, FieldError};

use crate::flow::request::BuildError;
use crate::flow::state::SessionState;

/// Synchronous failure to hand an outbound call to the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// The session has not been started.
    #[error("session not started")]
    NotReady,
    /// The event channel has no receiver.
    #[error("session closed")]
    Closed,
    /// The event channel is full.
    #[error("event channel full")]
    Backpressure,
    /// The request targets a service that is not open.
    #[error("service not open: {name}")]
    ServiceNotOpen { name: String },
    /// The transport refused the call for another reason.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Every failure that moves a session to `Failed`.
///
/// Cloned into both the session report and the error channel, so variants
/// carry rendered messages rather than source error values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    #[error("server reported error {code}: {message}")]
    BusinessError { code: i32, message: String },
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("failed to submit {call}: {source}")]
    SubmissionFailure {
        call: &'static str,
        #[source]
        source: SubmissionError,
    },
    #[error("invalid business request: {0}")]
    InvalidRequest(#[from] BuildError),
    #[error("no event received for {waited_ms}ms while {state}")]
    Stalled { state: SessionState, waited_ms: u64 },
}

impl FlowError {
    /// Stable label for logs and reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransportFailure(_) => "transport_failure",
            Self::AuthFailure(_) => "auth_failure",
            Self::BusinessError { .. } => "business_error",
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::SubmissionFailure { .. } => "submission_failure",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Stalled { .. } => "stalled",
        }
    }

    pub(crate) fn submission(call: &'static str) -> impl FnOnce(SubmissionError) -> Self {
        move |source| Self::SubmissionFailure { call, source }
    }
}

impl From<FieldError> for FlowError {
    fn from(err: FieldError) -> Self {
        Self::ProtocolViolation(err.to_string())
    }
}

/// A correlation id was registered while still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("correlation id {0} is already outstanding")]
pub struct DuplicateCorrelation(pub CorrelationId);

impl From<DuplicateCorrelation> for FlowError {
    fn from(err: DuplicateCorrelation) -> Self {
        Self::ProtocolViolation(err.to_string())
    }
}
