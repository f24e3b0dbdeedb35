//! Consumer loop over the inbound event channel.
//!
//! The driver owns the `EventRouter` and the receiving end of the transport's
//! event channel. It:
//! 1. Submits the session start
//! 2. Feeds each received event to the router, one at a time
//! 3. Fails the session as `Stalled` if no event arrives within the response timeout
//! 4. Tears down and returns a `SessionReport` once a terminal state is reached

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use setdata_core::Event;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::correlation::CorrelationRegistry;
use super::request::ResponseOutcome;
use super::router::EventRouter;
use super::state::SessionState;
use crate::config::ClientConfig;
use crate::error::FlowError;
use crate::traits::Transport;

/// Final account of a session run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub final_state: SessionState,
    pub outcome: Option<ResponseOutcome>,
    #[serde(skip)]
    pub failure: Option<FlowError>,
    pub failure_kind: Option<&'static str>,
    pub failure_message: Option<String>,
    pub events_processed: u64,
}

impl SessionReport {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.final_state == SessionState::Completed
    }
}

/// Runs one session to completion over an event channel.
pub struct SessionDriver {
    router: EventRouter,
    events: mpsc::Receiver<Event>,
    errors: Option<mpsc::UnboundedReceiver<FlowError>>,
    response_timeout: Duration,
}

impl SessionDriver {
    /// Creates a driver. `events` must be the receiving end of the channel the
    /// transport emits on.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidRequest` if the configured request is invalid.
    pub fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<Event>,
    ) -> Result<Self, FlowError> {
        let response_timeout = config.response_timeout;
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let router = EventRouter::new(config, transport)?.with_error_sink(errors_tx);
        Ok(Self {
            router,
            events,
            errors: Some(errors_rx),
            response_timeout,
        })
    }

    /// Live view of the session state.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.router.subscribe_state()
    }

    /// Takes the structured error channel. Returns `None` after the first call.
    pub fn take_error_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<FlowError>> {
        self.errors.take()
    }

    #[must_use]
    pub fn registry(&self) -> Arc<CorrelationRegistry> {
        self.router.registry()
    }

    /// Drives the session until `Completed` or `Failed`.
    ///
    /// The stall deadline restarts only when the session state changes, so
    /// unrelated traffic cannot keep a waiting session alive.
    pub async fn run(mut self) -> SessionReport {
        let mut events_processed = 0_u64;
        self.router.start().await;

        let mut watched = self.router.state();
        let mut deadline = Instant::now() + self.response_timeout;

        while !self.router.state().is_terminal() {
            match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(Some(event)) => {
                    events_processed += 1;
                    self.router.on_event(event).await;
                    let state = self.router.state();
                    if state != watched {
                        watched = state;
                        deadline = Instant::now() + self.response_timeout;
                    }
                }
                Ok(None) => {
                    self.router.fail(FlowError::TransportFailure(
                        "event channel closed before the session finished".into(),
                    ));
                }
                Err(_elapsed) => {
                    let waited_ms =
                        u64::try_from(self.response_timeout.as_millis()).unwrap_or(u64::MAX);
                    let state = self.router.state();
                    self.router.fail(FlowError::Stalled { state, waited_ms });
                }
            }
        }

        self.router.teardown().await;

        let failure = self.router.failure().cloned();
        let report = SessionReport {
            final_state: self.router.state(),
            outcome: self.router.outcome().cloned(),
            failure_kind: failure.as_ref().map(FlowError::kind),
            failure_message: failure.as_ref().map(ToString::to_string),
            failure,
            events_processed,
        };
        tracing::info!(
            state = %report.final_state,
            events = report.events_processed,
            failure = report.failure_kind,
            "session finished"
        );
        report
    }
}
