//! Fixtures shared by the Courier benchmarks.

use courier_protocol::PushMessage;
use std::sync::Arc;
use tenvis_courier_core::{Client, LocalChannel};
use tenvis_courier_service::{HttpActionService, ServiceError};

/// A message with a `body` field of `size` bytes.
#[must_use]
pub fn message(send_id: impl Into<String>, size: usize) -> PushMessage {
    PushMessage::new(send_id)
        .with_field("title", "Benchmark")
        .with_field("body", "x".repeat(size))
}

/// Raw JSON payload of a message with a `size`-byte body.
#[must_use]
pub fn raw_message(send_id: &str, size: usize) -> Vec<u8> {
    serde_json::to_vec(&message(send_id, size)).unwrap_or_default()
}

/// A client with `count` registered local channels named `ch-0`, `ch-1`, ...
///
/// # Errors
///
/// Returns an error if the HTTP service cannot be constructed.
pub fn client_with_channels(count: usize) -> Result<(Client, Vec<Arc<LocalChannel>>), ServiceError> {
    let client = Client::new(Arc::new(HttpActionService::new()?));
    let channels = (0..count)
        .map(|i| {
            let channel = Arc::new(LocalChannel::new(format!("ch-{i}")));
            // Ids are distinct, registration cannot collide
            let _ = client.use_channel(channel.clone());
            channel
        })
        .collect();
    Ok((client, channels))
}
