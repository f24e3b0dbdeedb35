//! Session handshake and correlation pipeline.
//!
//! 1. **Classification** (`classify`): `EventCategory` -> `Route`
//! 2. **Routing** (`router`): per-message dispatch to the owning component
//! 3. **Lifecycle** (`lifecycle`): session start, auth and business service opens
//! 4. **Authentication** (`auth`): token generation and authorization
//! 5. **Request** (`request`): business payload build, send, and response interpretation
//! 6. **Driver** (`driver`): consumer loop with stall detection

pub mod auth;
pub mod classify;
pub mod context;
pub mod correlation;
pub mod driver;
pub mod lifecycle;
pub mod request;
pub mod router;
pub mod state;

pub use auth::AuthenticationFlow;
pub use classify::{classify, Route};
pub use context::FlowContext;
pub use correlation::{CorrelationRegistry, PendingOperation};
pub use driver::{SessionDriver, SessionReport};
pub use lifecycle::{OpenedService, SessionLifecycleManager};
pub use request::{interpret, send_business_request, BuildError, RequestBuilder, ResponseOutcome};
pub use router::EventRouter;
pub use state::{wait_for_terminal, SessionState, SessionStateMachine};
