use std::sync::Arc;

use setdata_core::{CorrelationId, CorrelationIdGenerator};

use super::correlation::{CorrelationRegistry, PendingOperation};
use super::state::SessionStateMachine;
use crate::config::ClientConfig;
use crate::error::FlowError;
use crate::traits::Transport;

/// Shared resources every handler reads or mutates.
///
/// Owned by the `EventRouter` and lent to handlers one message at a time.
pub struct FlowContext {
    pub config: Arc<ClientConfig>,
    pub transport: Arc<dyn Transport>,
    pub registry: Arc<CorrelationRegistry>,
    pub state: SessionStateMachine,
    ids: CorrelationIdGenerator,
}

impl FlowContext {
    #[must_use]
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            registry: Arc::new(CorrelationRegistry::new()),
            state: SessionStateMachine::new(),
            ids: CorrelationIdGenerator::new(),
        }
    }

    /// Allocates a fresh correlation id and registers it as `op`.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::ProtocolViolation` if the id is somehow outstanding.
    pub fn track(&self, op: PendingOperation) -> Result<CorrelationId, FlowError> {
        let id = self.ids.next_id();
        self.registry.register(id, op)?;
        Ok(id)
    }
}
