//! Event routing: dispatches each inbound message to the component that owns it.

use std::sync::Arc;

use setdata_core::{Event, Message};
use tokio::sync::{mpsc, watch};
use tracing::{info_span, Instrument};

use super::auth::AuthenticationFlow;
use super::classify::{classify, Route};
use super::context::FlowContext;
use super::correlation::{CorrelationRegistry, PendingOperation};
use super::lifecycle::SessionLifecycleManager;
use super::request::{interpret, RequestBuilder, ResponseOutcome};
use super::state::SessionState;
use crate::config::ClientConfig;
use crate::error::FlowError;
use crate::traits::Transport;

/// Single entry point for inbound events.
///
/// Owns every piece of mutable session state, so calls to [`on_event`] must
/// be serialized; the driver does this by consuming one channel.
///
/// [`on_event`]: EventRouter::on_event
pub struct EventRouter {
    ctx: FlowContext,
    lifecycle: SessionLifecycleManager,
    auth: AuthenticationFlow,
    outcome: Option<ResponseOutcome>,
    failure: Option<FlowError>,
    errors: Option<mpsc::UnboundedSender<FlowError>>,
}

impl EventRouter {
    /// Creates a router and validates the configured business request.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidRequest` if the request template is invalid;
    /// nothing is sent in that case.
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>) -> Result<Self, FlowError> {
        let payload = RequestBuilder::from_template(&config.request).build()?;
        Ok(Self {
            ctx: FlowContext::new(config, transport),
            lifecycle: SessionLifecycleManager::new(payload),
            auth: AuthenticationFlow::new(),
            outcome: None,
            failure: None,
            errors: None,
        })
    }

    /// Every failure is also sent on `errors`.
    #[must_use]
    pub fn with_error_sink(mut self, errors: mpsc::UnboundedSender<FlowError>) -> Self {
        self.errors = Some(errors);
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.ctx.state.current()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.ctx.state.subscribe()
    }

    #[must_use]
    pub fn registry(&self) -> Arc<CorrelationRegistry> {
        Arc::clone(&self.ctx.registry)
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&ResponseOutcome> {
        self.outcome.as_ref()
    }

    /// The error that moved the session to `Failed`, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&FlowError> {
        self.failure.as_ref()
    }

    /// Submits the session start.
    pub async fn start(&mut self) {
        if let Err(err) = self.lifecycle.start(&self.ctx).await {
            self.fail(err);
        }
    }

    /// Routes every message of `event` in delivery order.
    ///
    /// Never panics and never returns an error: handler failures move the
    /// session to `Failed` and are reported through [`failure`] and the error
    /// sink.
    ///
    /// [`failure`]: EventRouter::failure
    pub async fn on_event(&mut self, event: Event) {
        let route = classify(event.category);
        let span = info_span!(
            "event",
            category = %event.category,
            route = route.name(),
            messages = event.messages.len(),
        );

        async {
            for msg in &event.messages {
                if self.ctx.state.is_terminal() {
                    tracing::debug!(message = %msg, state = %self.state(), "session finished, dropping message");
                    continue;
                }
                if let Err(err) = self.dispatch(route, msg).await {
                    self.fail(err);
                }
            }
        }
        .instrument(span)
        .await;
    }

    async fn dispatch(&mut self, route: Route, msg: &Message) -> Result<(), FlowError> {
        match route {
            Route::SessionStatus => self.lifecycle.on_session_status(&self.ctx, msg).await,
            Route::ServiceStatus => {
                self.lifecycle
                    .on_service_status(&self.ctx, &mut self.auth, msg)
                    .await
            }
            Route::TokenStatus => self.auth.on_token_status(&self.ctx, msg).await,
            Route::Response { partial } => self.on_response(msg, partial).await,
            Route::AuthorizationStatus => self.on_authorization_status(msg).await,
            Route::Other => {
                tracing::info!(message = %msg, "unhandled event message");
                Ok(())
            }
        }
    }

    async fn on_response(&mut self, msg: &Message, partial: bool) -> Result<(), FlowError> {
        let Some(id) = msg.correlation_id else {
            tracing::info!(message = %msg, "response without correlation id ignored");
            return Ok(());
        };
        let pending = if partial {
            self.ctx.registry.peek(id)
        } else {
            self.ctx.registry.resolve(id)
        };

        match pending {
            Some(PendingOperation::AuthRequest) => {
                self.auth.on_authorization_response(&self.ctx, msg).await
            }
            Some(PendingOperation::BusinessRequest) => self.on_business_response(msg, partial),
            None => {
                tracing::info!(correlation_id = %id, message = %msg, "response matches no outstanding request");
                Ok(())
            }
        }
    }

    /// Authorization status messages tied to the outstanding authorization
    /// request are treated as its response; the rest are informational.
    async fn on_authorization_status(&mut self, msg: &Message) -> Result<(), FlowError> {
        let matched = msg
            .correlation_id
            .filter(|id| self.ctx.registry.peek(*id) == Some(PendingOperation::AuthRequest));
        match matched {
            Some(id) => {
                self.ctx.registry.resolve(id);
                self.auth.on_authorization_response(&self.ctx, msg).await
            }
            None => {
                tracing::info!(message = %msg, "authorization status");
                Ok(())
            }
        }
    }

    fn on_business_response(&mut self, msg: &Message, partial: bool) -> Result<(), FlowError> {
        let outcome = interpret(msg);
        tracing::info!(?outcome, partial, "business response");
        self.outcome = Some(outcome.clone());

        match outcome {
            ResponseOutcome::Success { .. } if partial => Ok(()),
            ResponseOutcome::Success {
                channel_id,
                sequence_number,
                status_code,
            } => {
                tracing::info!(%channel_id, sequence_number, %status_code, "set data request completed");
                self.ctx.state.advance(SessionState::Completed);
                Ok(())
            }
            ResponseOutcome::Error { code, message } => {
                Err(FlowError::BusinessError { code, message })
            }
            ResponseOutcome::Unexpected { raw } => Err(FlowError::ProtocolViolation(format!(
                "unexpected business response: {raw}"
            ))),
        }
    }

    /// Moves the session to `Failed`, recording the cause.
    ///
    /// Errors raised after the session already finished are logged only:
    /// they reach neither the report nor the error sink.
    pub fn fail(&mut self, err: FlowError) {
        let from = self.state();
        if !self.ctx.state.fail() {
            tracing::debug!(kind = err.kind(), error = %err, state = %from, "session already finished");
            return;
        }
        tracing::error!(kind = err.kind(), error = %err, state = %from, "session failed");
        if let Some(errors) = &self.errors {
            let _ = errors.send(err.clone());
        }
        self.failure = Some(err);
    }

    /// Abandons outstanding correlations and stops the transport session.
    pub async fn teardown(&mut self) {
        let abandoned = self.ctx.registry.abandon_all();
        if abandoned > 0 {
            tracing::warn!(abandoned, "abandoned outstanding requests at teardown");
        }
        if let Err(err) = self.ctx.transport.stop_session().await {
            tracing::warn!(error = %err, "failed to stop session");
        }
    }
}

#[cfg(test)]
mod tests {
    use setdata_core::names::{fields, message_types};
    use setdata_core::{CorrelationId, Element, EventCategory};

    use super::*;
    use crate::transport::recording::RecordingTransport;

    fn router() -> (EventRouter, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let router = EventRouter::new(Arc::new(ClientConfig::default()), transport.clone()).unwrap();
        (router, transport)
    }

    fn response(id: CorrelationId, message_type: &str, body: Element) -> Event {
        Event::single(
            EventCategory::Response,
            Message::new(message_type).with_correlation(id).with_body(body),
        )
    }

    #[test]
    fn invalid_template_is_rejected_up_front() {
        let mut config = ClientConfig::default();
        config.request.data_points.clear();
        let result = EventRouter::new(Arc::new(config), Arc::new(RecordingTransport::new()));
        assert!(matches!(result, Err(FlowError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn start_submission_error_fails_session() {
        let (mut router, transport) = router();
        transport.fail_next("start_session");
        router.start().await;
        assert_eq!(router.state(), SessionState::Failed);
        assert_eq!(router.failure().map(FlowError::kind), Some("submission_failure"));
    }

    #[tokio::test]
    async fn unknown_correlation_changes_nothing() {
        let (mut router, _transport) = router();
        router
            .on_event(Event::single(
                EventCategory::SessionStatus,
                Message::new(message_types::SESSION_STARTED),
            ))
            .await;

        router
            .on_event(response(
                CorrelationId(424_242),
                message_types::DATA_OPERATION_RESPONSE,
                Element::new("x"),
            ))
            .await;

        assert_eq!(router.state(), SessionState::SessionStarted);
        assert!(router.failure().is_none());
        assert!(router.outcome().is_none());
    }

    #[tokio::test]
    async fn batched_messages_are_processed_in_order() {
        let (mut router, transport) = router();
        let opened = Message::new(message_types::SERVICE_OPENED).with_body(
            Element::new(message_types::SERVICE_OPENED).with(fields::SERVICE_NAME, "//blp/apiauth"),
        );
        router
            .on_event(Event::single(
                EventCategory::SessionStatus,
                Message::new(message_types::SESSION_STARTED),
            ))
            .await;
        router
            .on_event(Event::new(
                EventCategory::ServiceStatus,
                vec![opened.clone(), opened],
            ))
            .await;

        // The second notification arrives out of sequence and is ignored.
        assert_eq!(router.state(), SessionState::AuthServiceOpen);
        assert_eq!(
            transport
                .calls()
                .iter()
                .filter(|c| matches!(c, crate::transport::recording::TransportCall::GenerateToken))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn messages_after_failure_are_dropped() {
        let (mut router, transport) = router();
        router
            .on_event(Event::new(
                EventCategory::SessionStatus,
                vec![
                    Message::new(message_types::SESSION_STARTUP_FAILURE),
                    Message::new(message_types::SESSION_STARTED),
                ],
            ))
            .await;

        assert_eq!(router.state(), SessionState::Failed);
        assert!(transport.calls().is_empty());
        assert_eq!(router.failure().map(FlowError::kind), Some("transport_failure"));
    }

    #[tokio::test]
    async fn failures_reach_the_error_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (router, _transport) = router();
        let mut router = router.with_error_sink(tx);

        router
            .on_event(Event::single(
                EventCategory::SessionStatus,
                Message::new(message_types::SESSION_STARTUP_FAILURE),
            ))
            .await;

        let err = rx.recv().await.unwrap();
        assert_eq!(err.kind(), "transport_failure");
        assert_eq!(router.failure(), Some(&err));
    }

    #[tokio::test]
    async fn errors_after_failure_stay_off_the_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (router, transport) = router();
        let mut router = router.with_error_sink(tx);

        router
            .on_event(Event::single(
                EventCategory::SessionStatus,
                Message::new(message_types::SESSION_STARTUP_FAILURE),
            ))
            .await;
        transport.fail_next("start_session");
        router.start().await;

        assert_eq!(rx.recv().await.map(|e| e.kind()), Some("transport_failure"));
        assert!(rx.try_recv().is_err());
        assert_eq!(router.failure().map(FlowError::kind), Some("transport_failure"));
    }

    #[tokio::test]
    async fn token_before_auth_service_open_sends_nothing() {
        let (mut router, transport) = router();
        router
            .on_event(Event::single(
                EventCategory::SessionStatus,
                Message::new(message_types::SESSION_STARTED),
            ))
            .await;
        router
            .on_event(Event::single(
                EventCategory::TokenStatus,
                Message::new(message_types::TOKEN_SUCCESS).with_body(
                    Element::new(message_types::TOKEN_SUCCESS).with(fields::TOKEN, "tok"),
                ),
            ))
            .await;

        assert_eq!(router.state(), SessionState::SessionStarted);
        assert!(!router.registry().has_pending(PendingOperation::AuthRequest));
        assert_eq!(transport.last_authorization_id(), None);
    }

    #[tokio::test]
    async fn other_category_is_informational() {
        let (mut router, _transport) = router();
        router
            .on_event(Event::single(EventCategory::Admin, Message::new("SlowConsumerWarning")))
            .await;
        assert_eq!(router.state(), SessionState::Init);
    }

    #[tokio::test]
    async fn uncorrelated_authorization_status_is_informational() {
        let (mut router, _transport) = router();
        router
            .on_event(Event::single(
                EventCategory::AuthorizationStatus,
                Message::new("EntitlementChanged").with_correlation(CorrelationId(77)),
            ))
            .await;
        assert_eq!(router.state(), SessionState::Init);
        assert!(router.failure().is_none());
    }
}
