//! Transport that records calls and emits nothing.
//!
//! Tests inject events by hand and inspect what the flow asked for.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use setdata_core::{CorrelationId, Element};

use crate::error::SubmissionError;
use crate::traits::{Identity, Transport};

/// One call made on a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    /// `start_session`.
    StartSession,
    /// `open_service` with the requested name.
    OpenService {
        name: String,
    },
    /// `generate_token`.
    GenerateToken,
    /// `create_identity`, with the handle it returned.
    CreateIdentity {
        handle: u64,
    },
    /// `send_authorization_request` with its arguments.
    SendAuthorizationRequest {
        token: String,
        identity: Identity,
        correlation_id: CorrelationId,
    },
    /// `send_request` with its arguments.
    SendRequest {
        request: Element,
        identity: Identity,
        correlation_id: CorrelationId,
    },
    /// `stop_session`.
    StopSession,
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_next: Mutex<Option<&'static str>>,
    next_identity: AtomicU64,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call named `call` (e.g. `"open_service"`) fail with
    /// `SubmissionError::NotReady`. The attempt is still recorded.
    pub fn fail_next(&self, call: &'static str) {
        *self.fail_next.lock() = Some(call);
    }

    /// Snapshot of every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Names passed to `open_service`, in order.
    #[must_use]
    pub fn opened_services(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                TransportCall::OpenService { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// The correlation id of the last business request submitted.
    #[must_use]
    pub fn last_request_id(&self) -> Option<CorrelationId> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            TransportCall::SendRequest { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        })
    }

    /// The correlation id of the last authorization request submitted.
    #[must_use]
    pub fn last_authorization_id(&self) -> Option<CorrelationId> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            TransportCall::SendAuthorizationRequest { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        })
    }

    fn record(&self, name: &'static str, call: TransportCall) -> Result<(), SubmissionError> {
        self.calls.lock().push(call);
        let mut fail_next = self.fail_next.lock();
        if *fail_next == Some(name) {
            *fail_next = None;
            return Err(SubmissionError::NotReady);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn start_session(&self) -> Result<(), SubmissionError> {
        self.record("start_session", TransportCall::StartSession)
    }

    async fn open_service(&self, name: &str) -> Result<(), SubmissionError> {
        self.record(
            "open_service",
            TransportCall::OpenService {
                name: name.to_string(),
            },
        )
    }

    async fn generate_token(&self) -> Result<(), SubmissionError> {
        self.record("generate_token", TransportCall::GenerateToken)
    }

    fn create_identity(&self) -> Identity {
        let handle = self.next_identity.fetch_add(1, Ordering::Relaxed) + 1;
        self.calls.lock().push(TransportCall::CreateIdentity { handle });
        Identity::new(handle)
    }

    async fn send_authorization_request(
        &self,
        token: &str,
        identity: &Identity,
        correlation_id: CorrelationId,
    ) -> Result<(), SubmissionError> {
        self.record(
            "send_authorization_request",
            TransportCall::SendAuthorizationRequest {
                token: token.to_string(),
                identity: identity.clone(),
                correlation_id,
            },
        )
    }

    async fn send_request(
        &self,
        request: &Element,
        identity: &Identity,
        correlation_id: CorrelationId,
    ) -> Result<(), SubmissionError> {
        self.record(
            "send_request",
            TransportCall::SendRequest {
                request: request.clone(),
                identity: identity.clone(),
                correlation_id,
            },
        )
    }

    async fn stop_session(&self) -> Result<(), SubmissionError> {
        self.record("stop_session", TransportCall::StopSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_in_order() {
        let transport = RecordingTransport::new();
        transport.start_session().await.unwrap();
        transport.open_service("//svc/a").await.unwrap();
        let identity = transport.create_identity();

        assert_eq!(identity.handle(), 1);
        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::StartSession,
                TransportCall::OpenService {
                    name: "//svc/a".to_string()
                },
                TransportCall::CreateIdentity { handle: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn fail_next_applies_once_to_named_call() {
        let transport = RecordingTransport::new();
        transport.fail_next("generate_token");

        transport.start_session().await.unwrap();
        assert_eq!(
            transport.generate_token().await,
            Err(SubmissionError::NotReady)
        );
        assert!(transport.generate_token().await.is_ok());
    }
}
