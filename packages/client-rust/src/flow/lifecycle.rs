//! Session start and the two service-open sequences.

use setdata_core::names::{fields, message_types};
use setdata_core::{BusinessRequestPayload, Message};

use super::auth::AuthenticationFlow;
use super::context::FlowContext;
use super::request::send_business_request;
use super::state::SessionState;
use crate::error::FlowError;

/// Which configured service a `ServiceOpened` message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenedService {
    Auth,
    Business,
    Unknown,
}

/// Starts the session and reacts to session/service status messages.
///
/// The auth and business services are opened asynchronously and are told
/// apart by the `serviceName` field, compared by value. The business service
/// is only acted on once authorized.
#[derive(Debug)]
pub struct SessionLifecycleManager {
    payload: BusinessRequestPayload,
}

impl SessionLifecycleManager {
    #[must_use]
    pub fn new(payload: BusinessRequestPayload) -> Self {
        Self { payload }
    }

    /// Submits the session start.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::SubmissionFailure` if the transport refuses.
    pub async fn start(&self, ctx: &FlowContext) -> Result<(), FlowError> {
        tracing::info!(
            endpoint = %ctx.config.endpoint(),
            app = %ctx.config.app_name,
            connect_timeout_ms = u64::try_from(ctx.config.connect_timeout.as_millis()).unwrap_or(u64::MAX),
            auth_options = %ctx.config.authentication_options(),
            "starting session"
        );
        ctx.transport
            .start_session()
            .await
            .map_err(FlowError::submission("start_session"))
    }

    /// Handles one `SESSION_STATUS` message.
    ///
    /// # Errors
    ///
    /// Returns `TransportFailure` on startup failure or premature termination.
    pub async fn on_session_status(
        &self,
        ctx: &FlowContext,
        msg: &Message,
    ) -> Result<(), FlowError> {
        if msg.is(message_types::SESSION_STARTED) {
            if !ctx.state.advance(SessionState::SessionStarted) {
                tracing::warn!("duplicate session start ignored");
                return Ok(());
            }
            tracing::info!(service = %ctx.config.auth_service, "session started, opening authorization service");
            ctx.transport
                .open_service(&ctx.config.auth_service)
                .await
                .map_err(FlowError::submission("open_service"))
        } else if msg.is(message_types::SESSION_STARTUP_FAILURE) {
            Err(FlowError::TransportFailure(format!("session startup failed: {msg}")))
        } else if msg.is(message_types::SESSION_TERMINATED) {
            Err(FlowError::TransportFailure(format!("session terminated: {msg}")))
        } else {
            tracing::info!(message = %msg, "unprocessed session status message");
            Ok(())
        }
    }

    /// Maps a service name onto the configured services.
    #[must_use]
    pub fn identify(ctx: &FlowContext, service_name: &str) -> OpenedService {
        if service_name == ctx.config.auth_service {
            OpenedService::Auth
        } else if service_name == ctx.config.business_service {
            OpenedService::Business
        } else {
            OpenedService::Unknown
        }
    }

    /// Handles one `SERVICE_STATUS` message, handing off to the auth flow or
    /// sending the business request.
    ///
    /// # Errors
    ///
    /// Returns `TransportFailure` on open failure, `ProtocolViolation` if the
    /// message lacks a service name, or any error from the handed-off step.
    pub async fn on_service_status(
        &self,
        ctx: &FlowContext,
        auth: &mut AuthenticationFlow,
        msg: &Message,
    ) -> Result<(), FlowError> {
        if msg.is(message_types::SERVICE_OPEN_FAILURE) {
            return Err(FlowError::TransportFailure(format!("service failed to open: {msg}")));
        }
        if !msg.is(message_types::SERVICE_OPENED) {
            tracing::info!(message = %msg, "unprocessed service status message");
            return Ok(());
        }

        let service_name = msg.body.get_str(fields::SERVICE_NAME)?;
        let state = ctx.state.current();
        match (Self::identify(ctx, service_name), state) {
            (OpenedService::Auth, SessionState::SessionStarted) => {
                ctx.state.advance(SessionState::AuthServiceOpen);
                auth.request_token(ctx).await
            }
            (OpenedService::Business, SessionState::Authorized) => {
                ctx.state.advance(SessionState::BusinessServiceOpen);
                self.send_request(ctx, auth).await
            }
            (OpenedService::Unknown, _) => {
                tracing::warn!(service = service_name, "unknown service opened");
                Ok(())
            }
            (service, state) => {
                tracing::warn!(service = service_name, ?service, %state, "service opened out of sequence, ignoring");
                Ok(())
            }
        }
    }

    async fn send_request(
        &self,
        ctx: &FlowContext,
        auth: &AuthenticationFlow,
    ) -> Result<(), FlowError> {
        let identity = auth.authorized_identity().ok_or_else(|| {
            FlowError::ProtocolViolation("business service opened without an authorized identity".into())
        })?;
        let id = send_business_request(ctx, &self.payload, identity).await?;
        ctx.state.advance(SessionState::RequestSent);
        tracing::info!(correlation_id = %id, "request sent");
        Ok(())
    }
}
