//! `MsgPack` encoding of events and messages.
//!
//! Uses `rmp_serde::to_vec_named()` so field names travel with the data and
//! decoding tolerates field reordering.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::message::{Event, Message};

/// Errors from encoding or decoding wire bytes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encodes a single message.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, CodecError> {
    encode(msg)
}

/// Decodes a single message.
///
/// # Errors
///
/// Returns `CodecError::Decode` on malformed input.
pub fn decode_message(bytes: &[u8]) -> Result<Message, CodecError> {
    decode(bytes)
}

/// Encodes a whole event batch.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode_event(event: &Event) -> Result<Vec<u8>, CodecError> {
    encode(event)
}

/// Decodes a whole event batch.
///
/// # Errors
///
/// Returns `CodecError::Decode` on malformed input.
pub fn decode_event(bytes: &[u8]) -> Result<Event, CodecError> {
    decode(bytes)
}
