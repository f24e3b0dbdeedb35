//! Token generation and authorization handshake.

use setdata_core::names::{fields, message_types};
use setdata_core::Message;

use super::context::FlowContext;
use super::correlation::PendingOperation;
use super::state::SessionState;
use crate::error::FlowError;
use crate::traits::Identity;

/// Drives `AuthServiceOpen -> TokenReceived -> Authorized`.
///
/// A rejected token or authorization fails the session outright; there is
/// no retry.
#[derive(Debug, Default)]
pub struct AuthenticationFlow {
    token: Option<String>,
    identity: Option<Identity>,
    authorized: bool,
}

impl AuthenticationFlow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity, once authorization has succeeded.
    #[must_use]
    pub fn authorized_identity(&self) -> Option<&Identity> {
        if self.authorized {
            self.identity.as_ref()
        } else {
            None
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Called once the auth service is open: asks the transport for a token.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::SubmissionFailure` if the call cannot be submitted.
    pub async fn request_token(&mut self, ctx: &FlowContext) -> Result<(), FlowError> {
        tracing::info!(service = %ctx.config.auth_service, "authorization service opened, generating token");
        ctx.transport
            .generate_token()
            .await
            .map_err(FlowError::submission("generate_token"))
    }

    /// Handles one `TOKEN_STATUS` message.
    ///
    /// Acts only while the auth service is open and no token has been
    /// received; anything else is out of sequence and ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` for a rejected or empty token and
    /// `ProtocolViolation` for an unknown message type.
    pub async fn on_token_status(
        &mut self,
        ctx: &FlowContext,
        msg: &Message,
    ) -> Result<(), FlowError> {
        let state = ctx.state.current();
        if state != SessionState::AuthServiceOpen {
            tracing::warn!(message = %msg, %state, "token status out of sequence, ignoring");
            return Ok(());
        }

        if msg.is(message_types::TOKEN_SUCCESS) {
            let token = match msg.body.get_str(fields::TOKEN) {
                Ok(token) if !token.trim().is_empty() => token.to_string(),
                Ok(_) => return Err(FlowError::AuthFailure("token generation returned an empty token".into())),
                Err(err) => return Err(FlowError::AuthFailure(format!("token missing: {err}"))),
            };
            ctx.state.advance(SessionState::TokenReceived);
            self.send_authorization(ctx, token).await
        } else if msg.is(message_types::TOKEN_FAILURE) {
            Err(FlowError::AuthFailure(format!("token generation failed: {}", describe_reason(msg))))
        } else {
            Err(FlowError::ProtocolViolation(format!("unknown token status message: {msg}")))
        }
    }

    async fn send_authorization(
        &mut self,
        ctx: &FlowContext,
        token: String,
    ) -> Result<(), FlowError> {
        let identity = ctx.transport.create_identity();
        let id = ctx.track(PendingOperation::AuthRequest)?;
        tracing::info!(correlation_id = %id, identity = identity.handle(), "sending authorization request");

        let submitted = ctx
            .transport
            .send_authorization_request(&token, &identity, id)
            .await;
        self.token = Some(token);
        self.identity = Some(identity);

        if let Err(err) = submitted {
            ctx.registry.resolve(id);
            return Err(FlowError::submission("send_authorization_request")(err));
        }
        Ok(())
    }

    /// Handles a response matched to the outstanding authorization request.
    ///
    /// On success, requests the business service open. The business open is
    /// issued from here and nowhere else, at most once. Responses that arrive
    /// outside `TokenReceived` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` on rejection, `ProtocolViolation` on any other
    /// message type, `SubmissionFailure` if the service open cannot be submitted.
    pub async fn on_authorization_response(
        &mut self,
        ctx: &FlowContext,
        msg: &Message,
    ) -> Result<(), FlowError> {
        let state = ctx.state.current();
        if state != SessionState::TokenReceived {
            tracing::warn!(message = %msg, %state, "authorization response out of sequence, ignoring");
            return Ok(());
        }

        if msg.is(message_types::AUTHORIZATION_SUCCESS) {
            if !ctx.state.advance(SessionState::Authorized) {
                return Ok(());
            }
            self.authorized = true;
            tracing::info!(service = %ctx.config.business_service, "authorized, opening business service");
            ctx.transport
                .open_service(&ctx.config.business_service)
                .await
                .map_err(FlowError::submission("open_service"))
        } else if msg.is(message_types::AUTHORIZATION_FAILURE) {
            Err(FlowError::AuthFailure(format!("authorization rejected: {}", describe_reason(msg))))
        } else {
            Err(FlowError::ProtocolViolation(format!("unexpected authorization message: {msg}")))
        }
    }
}

/// Best-effort human reason from a failure message: `reason.message`,
/// `reason.description`, or the whole rendered message.
fn describe_reason(msg: &Message) -> String {
    let reason = msg.body.get_element(fields::REASON).ok();
    reason
        .and_then(|r| {
            r.get_str(fields::MESSAGE)
                .or_else(|_| r.get_str(fields::DESCRIPTION))
                .ok()
        })
        .map_or_else(|| msg.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use setdata_core::{CorrelationId, Element};

    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::recording::{RecordingTransport, TransportCall};

    fn ctx() -> (FlowContext, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let ctx = FlowContext::new(Arc::new(ClientConfig::default()), transport.clone());
        ctx.state.advance(SessionState::AuthServiceOpen);
        (ctx, transport)
    }

    fn token_success(token: &str) -> Message {
        Message::new(message_types::TOKEN_SUCCESS)
            .with_body(Element::new(message_types::TOKEN_SUCCESS).with(fields::TOKEN, token))
    }

    #[tokio::test]
    async fn token_success_registers_auth_request() {
        let (ctx, transport) = ctx();
        let mut flow = AuthenticationFlow::new();

        flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap();

        assert_eq!(ctx.state.current(), SessionState::TokenReceived);
        assert_eq!(flow.token(), Some("tok1"));
        assert!(ctx.registry.has_pending(PendingOperation::AuthRequest));
        assert!(matches!(
            transport.calls().last(),
            Some(TransportCall::SendAuthorizationRequest { token, .. }) if token == "tok1"
        ));
    }

    #[tokio::test]
    async fn empty_token_is_auth_failure() {
        let (ctx, _transport) = ctx();
        let mut flow = AuthenticationFlow::new();

        let err = flow.on_token_status(&ctx, &token_success("  ")).await.unwrap_err();
        assert!(matches!(err, FlowError::AuthFailure(_)));
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn missing_token_field_is_auth_failure() {
        let (ctx, _transport) = ctx();
        let mut flow = AuthenticationFlow::new();

        let msg = Message::new(message_types::TOKEN_SUCCESS);
        let err = flow.on_token_status(&ctx, &msg).await.unwrap_err();
        assert!(matches!(err, FlowError::AuthFailure(ref m) if m.contains("token missing")));
    }

    #[tokio::test]
    async fn token_failure_registers_nothing() {
        let (ctx, transport) = ctx();
        let mut flow = AuthenticationFlow::new();

        let msg = Message::new(message_types::TOKEN_FAILURE).with_body(
            Element::new(message_types::TOKEN_FAILURE).with(
                fields::REASON,
                Element::new(fields::REASON).with(fields::MESSAGE, "bad app key"),
            ),
        );
        let err = flow.on_token_status(&ctx, &msg).await.unwrap_err();

        assert_eq!(err, FlowError::AuthFailure("token generation failed: bad app key".into()));
        assert!(ctx.registry.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_token_status_is_protocol_violation() {
        let (ctx, _transport) = ctx();
        let mut flow = AuthenticationFlow::new();

        let err = flow
            .on_token_status(&ctx, &Message::new("TokenPending"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn submission_error_unregisters_auth_request() {
        let (ctx, transport) = ctx();
        transport.fail_next("send_authorization_request");
        let mut flow = AuthenticationFlow::new();

        let err = flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap_err();
        assert_eq!(err.kind(), "submission_failure");
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn authorization_success_opens_business_service() {
        let (ctx, transport) = ctx();
        let mut flow = AuthenticationFlow::new();
        flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap();
        assert!(flow.authorized_identity().is_none());

        let msg = Message::new(message_types::AUTHORIZATION_SUCCESS).with_correlation(CorrelationId(1));
        flow.on_authorization_response(&ctx, &msg).await.unwrap();

        assert_eq!(ctx.state.current(), SessionState::Authorized);
        assert!(flow.authorized_identity().is_some());
        assert_eq!(transport.opened_services(), vec!["//blp-test/orderanalytics".to_string()]);
    }

    #[tokio::test]
    async fn authorization_failure_does_not_open_business_service() {
        let (ctx, transport) = ctx();
        let mut flow = AuthenticationFlow::new();
        flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap();

        let msg = Message::new(message_types::AUTHORIZATION_FAILURE);
        let err = flow.on_authorization_response(&ctx, &msg).await.unwrap_err();

        assert!(matches!(err, FlowError::AuthFailure(_)));
        assert!(flow.authorized_identity().is_none());
        assert!(transport.opened_services().is_empty());
    }

    #[tokio::test]
    async fn unexpected_authorization_message_is_protocol_violation() {
        let (ctx, _transport) = ctx();
        let mut flow = AuthenticationFlow::new();
        flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap();

        let err = flow
            .on_authorization_response(&ctx, &Message::new("EntitlementChanged"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn token_before_auth_service_open_is_ignored() {
        let transport = Arc::new(RecordingTransport::new());
        let ctx = FlowContext::new(Arc::new(ClientConfig::default()), transport.clone());
        ctx.state.advance(SessionState::SessionStarted);
        let mut flow = AuthenticationFlow::new();

        flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap();

        assert_eq!(ctx.state.current(), SessionState::SessionStarted);
        assert!(ctx.registry.is_empty());
        assert!(transport.calls().is_empty());
        assert!(flow.token().is_none());
    }

    #[tokio::test]
    async fn duplicate_token_sends_one_authorization_request() {
        let (ctx, transport) = ctx();
        let mut flow = AuthenticationFlow::new();

        flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap();
        flow.on_token_status(&ctx, &token_success("tok2")).await.unwrap();

        let sent = transport
            .calls()
            .iter()
            .filter(|c| matches!(c, TransportCall::SendAuthorizationRequest { .. }))
            .count();
        assert_eq!(sent, 1);
        assert_eq!(ctx.registry.len(), 1);
        assert_eq!(flow.token(), Some("tok1"));
    }

    #[tokio::test]
    async fn repeated_authorization_success_opens_business_once() {
        let (ctx, transport) = ctx();
        let mut flow = AuthenticationFlow::new();
        flow.on_token_status(&ctx, &token_success("tok1")).await.unwrap();

        let msg = Message::new(message_types::AUTHORIZATION_SUCCESS).with_correlation(CorrelationId(1));
        flow.on_authorization_response(&ctx, &msg).await.unwrap();
        flow.on_authorization_response(&ctx, &msg).await.unwrap();

        assert_eq!(transport.opened_services(), vec!["//blp-test/orderanalytics".to_string()]);
    }

    #[tokio::test]
    async fn authorization_before_token_is_ignored() {
        let (ctx, transport) = ctx();
        let mut flow = AuthenticationFlow::new();

        let msg = Message::new(message_types::AUTHORIZATION_SUCCESS).with_correlation(CorrelationId(1));
        flow.on_authorization_response(&ctx, &msg).await.unwrap();

        assert_eq!(ctx.state.current(), SessionState::AuthServiceOpen);
        assert!(flow.authorized_identity().is_none());
        assert!(transport.opened_services().is_empty());
    }
}
