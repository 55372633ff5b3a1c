//! Codec for raw channel payloads.
//!
//! Channels that receive bytes (socket bridges, platform push SDKs) hand them
//! to this codec to obtain a `PushMessage`. The payload is a JSON object.

use bytes::Bytes;
use thiserror::Error;

use crate::message::PushMessage;

/// Maximum payload size (256 KiB).
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024;

/// Errors that can occur while decoding or encoding a payload.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload exceeds maximum size.
    #[error("Payload size {0} exceeds maximum {MAX_PAYLOAD_SIZE}")]
    PayloadTooLarge(usize),

    /// Payload is empty.
    #[error("Empty payload")]
    Empty,

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload decoded but is not a usable message.
    #[error("Invalid message: {0}")]
    Invalid(String),
}

/// Decode a message from a JSON payload.
///
/// # Errors
///
/// Returns an error if the payload is empty, too large, malformed, or
/// carries an empty `sendId`.
pub fn decode(data: &[u8]) -> Result<PushMessage, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if data.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }

    let message: PushMessage = serde_json::from_slice(data)?;
    if message.send_id.is_empty() {
        return Err(ProtocolError::Invalid("sendId cannot be empty".into()));
    }

    Ok(message)
}

/// Encode a message to a JSON payload.
///
/// # Errors
///
/// Returns an error if the encoded payload is too large.
pub fn encode(message: &PushMessage) -> Result<Bytes, ProtocolError> {
    let payload = serde_json::to_vec(message)?;

    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(payload.len()));
    }

    Ok(Bytes::from(payload))
}
