//! In-process simulated endpoint.
//!
//! Answers every call by pushing the events a remote endpoint would send,
//! according to a [`LoopbackScript`]. Replies pass through the `MsgPack`
//! codec before delivery, so the flow only ever sees decoded wire messages.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use setdata_core::names::{fields, message_types};
use setdata_core::{
    decode_event, encode_event, CorrelationId, Element, Event, EventCategory, Message,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::ClientConfig;
use crate::error::SubmissionError;
use crate::traits::{Identity, Transport};

/// Outcome of token generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenScript {
    /// Issue this token.
    Issue(String),
    /// Fail with this reason.
    Reject(String),
}

/// Outcome of the authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationScript {
    /// Grant when the presented token matches the issued one.
    Grant,
    Deny(String),
}

/// Reply to the business request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseScript {
    /// `dataOperationResponse` echoing the request header.
    Acknowledge { status_code: String },
    /// `ErrorInfo` with the given code and message.
    Reject { code: i32, message: String },
    /// Never answer.
    Silent,
}

/// How the simulated endpoint behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackScript {
    pub session_starts: bool,
    pub token: TokenScript,
    pub authorization: AuthorizationScript,
    pub response: ResponseScript,
    /// Services whose open fails.
    pub unavailable_services: Vec<String>,
}

impl Default for LoopbackScript {
    fn default() -> Self {
        Self {
            session_starts: true,
            token: TokenScript::Issue("loopback-token".to_string()),
            authorization: AuthorizationScript::Grant,
            response: ResponseScript::Acknowledge {
                status_code: "SUCCESS".to_string(),
            },
            unavailable_services: Vec::new(),
        }
    }
}

/// Scripted endpoint that answers each call with events on its channel.
pub struct LoopbackTransport {
    script: LoopbackScript,
    auth_service: String,
    business_service: String,
    events: mpsc::Sender<Event>,
    started: AtomicBool,
    open_services: Mutex<HashSet<String>>,
    issued_token: Mutex<Option<String>>,
    next_identity: AtomicU64,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new(script: LoopbackScript, events: mpsc::Sender<Event>) -> Self {
        let defaults = ClientConfig::default();
        Self {
            script,
            auth_service: defaults.auth_service,
            business_service: defaults.business_service,
            events,
            started: AtomicBool::new(false),
            open_services: Mutex::new(HashSet::new()),
            issued_token: Mutex::new(None),
            next_identity: AtomicU64::new(1),
        }
    }

    /// Names of the services that authorization and business requests are
    /// addressed to.
    #[must_use]
    pub fn with_services(mut self, auth: impl Into<String>, business: impl Into<String>) -> Self {
        self.auth_service = auth.into();
        self.business_service = business.into();
        self
    }

    /// Creates a transport together with the receiving end of its event channel.
    #[must_use]
    pub fn channel(script: LoopbackScript, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self::new(script, tx)), rx)
    }

    /// Like [`channel`](Self::channel), using the service names and channel
    /// capacity from `config`.
    #[must_use]
    pub fn for_config(
        config: &ClientConfig,
        script: LoopbackScript,
    ) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let transport = Self::new(script, tx)
            .with_services(config.auth_service.clone(), config.business_service.clone());
        (Arc::new(transport), rx)
    }

    fn emit(&self, event: Event) -> Result<(), SubmissionError> {
        let wire = encode_event(&event).map_err(|e| SubmissionError::Rejected(e.to_string()))?;
        let decoded = decode_event(&wire).map_err(|e| SubmissionError::Rejected(e.to_string()))?;
        tracing::debug!(category = %decoded.category, bytes = wire.len(), "loopback emitting event");
        self.events.try_send(decoded).map_err(|e| match e {
            TrySendError::Full(_) => SubmissionError::Backpressure,
            TrySendError::Closed(_) => SubmissionError::Closed,
        })
    }

    fn require_started(&self) -> Result<(), SubmissionError> {
        if self.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SubmissionError::NotReady)
        }
    }

    fn require_open(&self, name: &str) -> Result<(), SubmissionError> {
        self.require_started()?;
        if self.open_services.lock().contains(name) {
            Ok(())
        } else {
            Err(SubmissionError::ServiceNotOpen {
                name: name.to_string(),
            })
        }
    }

    fn reason(message: &str) -> Element {
        Element::new(fields::REASON).with(fields::MESSAGE, message)
    }

    fn reply_to_request(request: &Element, script: &ResponseScript) -> Option<Message> {
        match script {
            ResponseScript::Silent => None,
            ResponseScript::Reject { code, message } => Some(error_info(*code, message)),
            ResponseScript::Acknowledge { status_code } => {
                let header = request.get_element(fields::HEADER).ok();
                let channel = header.and_then(|h| h.get_str(fields::CHANNEL_ID).ok());
                let sequence = header.and_then(|h| h.get_i64(fields::SEQUENCE_NUMBER).ok());
                let (Some(channel), Some(sequence)) = (channel, sequence) else {
                    return Some(error_info(-1, "malformed request header"));
                };
                Some(
                    Message::new(message_types::DATA_OPERATION_RESPONSE).with_body(
                        Element::new(message_types::DATA_OPERATION_RESPONSE)
                            .with(fields::CHANNEL_ID, channel)
                            .with(fields::SEQUENCE_NUMBER, sequence)
                            .with(
                                fields::STATUS,
                                Element::new(fields::STATUS)
                                    .with(fields::STATUS_CODE, status_code.as_str()),
                            ),
                    ),
                )
            }
        }
    }
}

fn error_info(code: i32, message: &str) -> Message {
    Message::new(message_types::ERROR_INFO).with_body(
        Element::new(message_types::ERROR_INFO)
            .with(fields::ERROR_CODE, code)
            .with(fields::ERROR_MESSAGE, message),
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn start_session(&self) -> Result<(), SubmissionError> {
        if !self.script.session_starts {
            let failure = Message::new(message_types::SESSION_STARTUP_FAILURE).with_body(
                Element::new(message_types::SESSION_STARTUP_FAILURE)
                    .with(fields::REASON, Self::reason("connection refused")),
            );
            return self.emit(Event::single(EventCategory::SessionStatus, failure));
        }
        self.started.store(true, Ordering::Release);
        self.emit(Event::new(
            EventCategory::SessionStatus,
            vec![
                Message::new(message_types::SESSION_CONNECTION_UP),
                Message::new(message_types::SESSION_STARTED),
            ],
        ))
    }

    async fn open_service(&self, name: &str) -> Result<(), SubmissionError> {
        self.require_started()?;
        let status = if self.script.unavailable_services.iter().any(|s| s == name) {
            message_types::SERVICE_OPEN_FAILURE
        } else {
            self.open_services.lock().insert(name.to_string());
            message_types::SERVICE_OPENED
        };
        let msg = Message::new(status)
            .with_body(Element::new(status).with(fields::SERVICE_NAME, name));
        self.emit(Event::single(EventCategory::ServiceStatus, msg))
    }

    async fn generate_token(&self) -> Result<(), SubmissionError> {
        self.require_started()?;
        let msg = match &self.script.token {
            TokenScript::Issue(token) => {
                *self.issued_token.lock() = Some(token.clone());
                Message::new(message_types::TOKEN_SUCCESS).with_body(
                    Element::new(message_types::TOKEN_SUCCESS).with(fields::TOKEN, token.as_str()),
                )
            }
            TokenScript::Reject(reason) => Message::new(message_types::TOKEN_FAILURE).with_body(
                Element::new(message_types::TOKEN_FAILURE)
                    .with(fields::REASON, Self::reason(reason)),
            ),
        };
        self.emit(Event::single(EventCategory::TokenStatus, msg))
    }

    fn create_identity(&self) -> Identity {
        Identity::new(self.next_identity.fetch_add(1, Ordering::Relaxed))
    }

    async fn send_authorization_request(
        &self,
        token: &str,
        _identity: &Identity,
        correlation_id: CorrelationId,
    ) -> Result<(), SubmissionError> {
        self.require_open(&self.auth_service)?;
        let token_matches = self.issued_token.lock().as_deref() == Some(token);
        let msg = match (&self.script.authorization, token_matches) {
            (AuthorizationScript::Grant, true) => Message::new(message_types::AUTHORIZATION_SUCCESS),
            (AuthorizationScript::Grant, false) => Message::new(message_types::AUTHORIZATION_FAILURE)
                .with_body(
                    Element::new(message_types::AUTHORIZATION_FAILURE)
                        .with(fields::REASON, Self::reason("token not recognised")),
                ),
            (AuthorizationScript::Deny(reason), _) => {
                Message::new(message_types::AUTHORIZATION_FAILURE).with_body(
                    Element::new(message_types::AUTHORIZATION_FAILURE)
                        .with(fields::REASON, Self::reason(reason)),
                )
            }
        };
        self.emit(Event::single(
            EventCategory::Response,
            msg.with_correlation(correlation_id),
        ))
    }

    async fn send_request(
        &self,
        request: &Element,
        _identity: &Identity,
        correlation_id: CorrelationId,
    ) -> Result<(), SubmissionError> {
        self.require_open(&self.business_service)?;
        match Self::reply_to_request(request, &self.script.response) {
            Some(reply) => self.emit(Event::single(
                EventCategory::Response,
                reply.with_correlation(correlation_id),
            )),
            None => Ok(()),
        }
    }

    async fn stop_session(&self) -> Result<(), SubmissionError> {
        self.started.store(false, Ordering::Release);
        self.open_services.lock().clear();
        Ok(())
    }
}
