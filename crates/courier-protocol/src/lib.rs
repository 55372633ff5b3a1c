//! # courier-protocol
//!
//! Data definitions shared between Courier channels, the client core and the
//! backing message service.
//!
//! ## Contents
//!
//! - `PushMessage` - A delivered message, keyed by its `sendId`
//! - Action payloads - Request and response bodies for the service endpoints
//! - `codec` - Decoding of raw channel payloads into messages
//! - `ClientConfig` - Service addressing handed to the client and every channel
//!
//! ## Example
//!
//! ```rust
//! use courier_protocol::{codec, PushMessage};
//!
//! let message = PushMessage::new("send-1").with_field("title", "Hello");
//!
//! let encoded = codec::encode(&message).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(decoded.send_id, "send-1");
//! ```

pub mod actions;
pub mod codec;
pub mod config;
pub mod message;

pub use actions::{
    ActionOutcome, DelayRequest, DeliveredRequest, DeviceRegistration, Endpoint, MessageFilter,
    MessageListResponse, MessagePage, MessageQuery, ReadRequest, UnreadCountResponse,
};
pub use codec::{decode, encode, ProtocolError};
pub use config::ClientConfig;
pub use message::{PushMessage, SendId};
