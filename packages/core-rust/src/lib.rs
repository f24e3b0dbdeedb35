//! `SetData` Core: element trees, session events, business payload schemas, and codec.

pub mod codec;
pub mod element;
pub mod message;
pub mod names;
pub mod payload;

pub use codec::{decode_event, decode_message, encode_event, encode_message, CodecError};
pub use element::{Element, FieldError, Value};
pub use message::{CorrelationId, CorrelationIdGenerator, Event, EventCategory, Message};
pub use payload::{BusinessRequestPayload, DataPoint, Polarity, RequestHeader};
