//! Inbound events and the messages they batch.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::element::Element;

// ---------------------------------------------------------------------------
// CorrelationId
// ---------------------------------------------------------------------------

/// Client-assigned identifier echoed on the response to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cid:{}", self.0)
    }
}

/// Hands out process-unique correlation ids.
///
/// Ids start at 1 and are never reused by the same generator.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    next: AtomicU64,
}

impl CorrelationIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> CorrelationId {
        CorrelationId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// EventCategory
// ---------------------------------------------------------------------------

/// Category tag on every inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Session started, failed to start, or terminated.
    SessionStatus,
    /// A service opened or failed to open.
    ServiceStatus,
    /// Outcome of token generation.
    TokenStatus,
    /// Entitlement changes for an identity.
    AuthorizationStatus,
    /// Final response to a correlated request.
    Response,
    /// Intermediate response; more follow for the same correlation id.
    PartialResponse,
    /// Status of an outstanding request.
    RequestStatus,
    /// Administrative notices such as slow-consumer warnings.
    Admin,
    /// A transport-level timer fired.
    Timeout,
}

impl EventCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStatus => "SESSION_STATUS",
            Self::ServiceStatus => "SERVICE_STATUS",
            Self::TokenStatus => "TOKEN_STATUS",
            Self::AuthorizationStatus => "AUTHORIZATION_STATUS",
            Self::Response => "RESPONSE",
            Self::PartialResponse => "PARTIAL_RESPONSE",
            Self::RequestStatus => "REQUEST_STATUS",
            Self::Admin => "ADMIN",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One message inside an event.
///
/// `correlation_id` is present on request/response traffic and on any status
/// message the transport ties to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<CorrelationId>,
    pub body: Element,
}

impl Message {
    /// Creates a message whose body element is named after its type.
    #[must_use]
    pub fn new(message_type: impl Into<String>) -> Self {
        let message_type = message_type.into();
        Self {
            body: Element::new(message_type.clone()),
            message_type,
            correlation_id: None,
        }
    }

    #[must_use]
    pub fn with_correlation(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Element) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn is(&self, message_type: &str) -> bool {
        self.message_type == message_type
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.correlation_id {
            Some(id) => write!(f, "{} [{}] {}", self.message_type, id, self.body),
            None => write!(f, "{} {}", self.message_type, self.body),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A categorized batch of messages delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub category: EventCategory,
    pub messages: Vec<Message>,
}

impl Event {
    #[must_use]
    pub fn new(category: EventCategory, messages: Vec<Message>) -> Self {
        Self { category, messages }
    }

    /// Convenience for the common single-message event.
    #[must_use]
    pub fn single(category: EventCategory, message: Message) -> Self {
        Self {
            category,
            messages: vec![message],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_monotonic_and_unique() {
        let gen = CorrelationIdGenerator::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_eq!(a, CorrelationId(1));
        assert!(b > a);
    }

    #[test]
    fn message_type_compares_by_value() {
        let owned = String::from("ServiceOpened");
        let msg = Message::new(owned);
        assert!(msg.is("ServiceOpened"));
        assert!(!msg.is("ServiceOpenFailure"));
    }

    #[test]
    fn display_includes_correlation() {
        let msg = Message::new("AuthorizationSuccess").with_correlation(CorrelationId(4));
        assert_eq!(msg.to_string(), "AuthorizationSuccess [cid:4] AuthorizationSuccess { }");
    }
}
