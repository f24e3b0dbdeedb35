//! `Transport` implementations.
//!
//! - `loopback`: simulated endpoint that answers over an event channel
//! - `recording`: records calls and emits nothing, for driving the flow by hand

pub mod loopback;
pub mod recording;

pub use loopback::{
    AuthorizationScript, LoopbackScript, LoopbackTransport, ResponseScript, TokenScript,
};
pub use recording::{RecordingTransport, TransportCall};
