//! `SetData` Client: drives the session, authorization, and correlated update request.

pub mod config;
pub mod error;
pub mod flow;
pub mod logging;
pub mod traits;
pub mod transport;

pub use config::{ClientConfig, RequestTemplate};
pub use error::{FlowError, SubmissionError};
pub use flow::{EventRouter, ResponseOutcome, SessionDriver, SessionReport, SessionState};
pub use traits::{Identity, Transport};
