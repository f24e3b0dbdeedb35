//! Session state machine published over a watch channel.
//!
//! State machine: Init -> SessionStarted -> AuthServiceOpen -> TokenReceived
//! -> Authorized -> BusinessServiceOpen -> RequestSent -> Completed, with
//! Failed reachable from any non-terminal state.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Position of the session in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SessionState {
    /// Nothing started yet.
    Init,
    /// Session is up; the auth service open is pending.
    SessionStarted,
    /// Auth service is open; waiting for a token.
    AuthServiceOpen,
    /// Token received; the authorization request is outstanding.
    TokenReceived,
    /// Identity is authorized; the business service open is pending.
    Authorized,
    /// Business service is open; the request is being submitted.
    BusinessServiceOpen,
    /// Business request submitted; waiting for its response.
    RequestSent,
    /// Final response was a success.
    Completed,
    /// Any failure; terminal.
    Failed,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Forward moves may skip states; nothing leaves a terminal state.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Failed || next > self
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Owns the current `SessionState` and notifies subscribers on every change.
///
/// Replaces a polled termination flag: a supervisor awaits
/// [`wait_for_terminal`] instead.
#[derive(Debug)]
pub struct SessionStateMachine {
    tx: watch::Sender<SessionState>,
}

impl SessionStateMachine {
    /// Creates a machine in the `Init` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Init);
        Self { tx }
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current().is_terminal()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Moves to `next` if the transition is legal. Returns whether it moved.
    pub fn advance(&self, next: SessionState) -> bool {
        let mut from = SessionState::Init;
        let moved = self.tx.send_if_modified(|state| {
            from = *state;
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::debug!(%from, to = %next, "session state transition");
        } else {
            tracing::warn!(%from, to = %next, "rejected session state transition");
        }
        moved
    }

    /// Moves to `Failed`. Returns `false` if already terminal.
    pub fn fail(&self) -> bool {
        self.advance(SessionState::Failed)
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits until the observed state is terminal and returns it.
///
/// If the machine is dropped first, returns the last state seen.
pub async fn wait_for_terminal(rx: &mut watch::Receiver<SessionState>) -> SessionState {
    if let Ok(state) = rx.wait_for(|state| state.is_terminal()).await {
        return *state;
    }
    *rx.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_init() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.current(), SessionState::Init);
        assert!(!machine.is_terminal());
    }

    #[test]
    fn forward_transitions_succeed() {
        let machine = SessionStateMachine::new();
        assert!(machine.advance(SessionState::SessionStarted));
        assert!(machine.advance(SessionState::AuthServiceOpen));
        assert_eq!(machine.current(), SessionState::AuthServiceOpen);
    }

    #[test]
    fn backward_transition_is_rejected() {
        let machine = SessionStateMachine::new();
        machine.advance(SessionState::Authorized);
        assert!(!machine.advance(SessionState::SessionStarted));
        assert!(!machine.advance(SessionState::Authorized));
        assert_eq!(machine.current(), SessionState::Authorized);
    }

    #[test]
    fn failed_is_absorbing() {
        let machine = SessionStateMachine::new();
        assert!(machine.fail());
        assert!(!machine.advance(SessionState::Completed));
        assert!(!machine.fail());
        assert_eq!(machine.current(), SessionState::Failed);
    }

    #[test]
    fn completed_is_terminal() {
        let machine = SessionStateMachine::new();
        machine.advance(SessionState::Completed);
        assert!(!machine.fail());
        assert_eq!(machine.current(), SessionState::Completed);
    }

    #[test]
    fn every_non_terminal_state_can_fail() {
        use SessionState::*;
        for state in [
            Init,
            SessionStarted,
            AuthServiceOpen,
            TokenReceived,
            Authorized,
            BusinessServiceOpen,
            RequestSent,
        ] {
            assert!(state.can_transition_to(Failed), "{state} should fail");
        }
    }

    #[tokio::test]
    async fn subscriber_sees_terminal_state() {
        let machine = SessionStateMachine::new();
        let mut rx = machine.subscribe();

        let waiter = tokio::spawn(async move { wait_for_terminal(&mut rx).await });
        machine.advance(SessionState::SessionStarted);
        machine.advance(SessionState::Completed);

        assert_eq!(waiter.await.unwrap(), SessionState::Completed);
    }

    #[tokio::test]
    async fn dropped_machine_returns_last_state() {
        let machine = SessionStateMachine::new();
        let mut rx = machine.subscribe();
        machine.advance(SessionState::RequestSent);
        drop(machine);
        assert_eq!(wait_for_terminal(&mut rx).await, SessionState::RequestSent);
    }
}
