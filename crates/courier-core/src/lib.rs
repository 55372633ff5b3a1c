//! # courier-core
//!
//! Channel multiplexing for Courier: several redundant push channels behind
//! one logical message stream.
//!
//! This crate provides:
//!
//! - **Client** - The handle applications create, subscribe to and act through
//! - **Channel** - The contract every transport implements, plus `LocalChannel`
//! - **Registry** - Channel membership and start/stop lifecycle
//! - **ConnectionSet** - Which channels are currently connected
//! - **Deduplicator** - Suppresses copies of a message seen on another channel
//! - **UnreadCounter** - Unread count kept in step with the backing service
//! - **EventBus** - Per-event subscriber lists
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  signals  ┌─────────────┐     ┌──────────────┐
//! │  Channel A  │──────────▶│             │────▶│ Connections  │
//! └─────────────┘           │   Client    │     └──────────────┘
//! ┌─────────────┐  signals  │             │     ┌──────────────┐
//! │  Channel B  │──────────▶│             │────▶│ Deduplicator │
//! └─────────────┘           └─────────────┘     └──────────────┘
//!                              │       ▲               │
//!                      actions │       │ counts        ▼
//!                              ▼       │        ┌──────────────┐
//!                        ┌─────────────────┐    │   EventBus   │
//!                        │  ActionService  │    └──────────────┘
//!                        └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tenvis_courier_core::{Client, EventKind, LocalChannel};
//!
//! let client = Client::new(service);
//! let push = Arc::new(LocalChannel::new("push"));
//! client.use_channel(push.clone())?;
//! client.on(EventKind::Message, |event| println!("{event:?}"));
//! client.start(&config);
//! ```

pub mod channel;
pub mod client;
pub mod connections;
pub mod dedup;
pub mod events;
pub mod local;
pub mod metrics;
pub mod registry;
pub mod unread;

pub use channel::{validate_channel_id, Channel, ChannelId, ChannelSignal, SignalSink};
pub use client::{Client, ClientError, ClientOptions, ClientStats};
pub use connections::{ConnectionSet, ConnectionState};
pub use dedup::{Deduplicator, DEFAULT_DEDUP_CAPACITY};
pub use events::{Callback, Event, EventBus, EventKind, SubscriptionId};
pub use local::LocalChannel;
pub use registry::Registry;
pub use unread::UnreadCounter;
