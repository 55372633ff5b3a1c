//! Event bus for Courier.
//!
//! Applications subscribe callbacks per event kind. Callbacks of one kind
//! run in registration order; registering the same closure twice yields two
//! subscriptions and two invocations per event.

use crate::channel::ChannelId;
use courier_protocol::PushMessage;
use dashmap::DashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Event kinds applications can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A channel connected.
    Connect,
    /// A channel disconnected.
    Disconnect,
    /// A new message was forwarded.
    Message,
    /// The unread count changed.
    UnreadChange,
    /// The user opened a message through a channel.
    OpenMessage,
}

impl EventKind {
    /// All event kinds.
    pub const ALL: [EventKind; 5] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::Message,
        EventKind::UnreadChange,
        EventKind::OpenMessage,
    ];

    /// Event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::Message => "message",
            EventKind::UnreadChange => "unreadChange",
            EventKind::OpenMessage => "openMessage",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EventKind {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "connect" => Ok(EventKind::Connect),
            "disconnect" => Ok(EventKind::Disconnect),
            "message" => Ok(EventKind::Message),
            "unreadChange" => Ok(EventKind::UnreadChange),
            "openMessage" => Ok(EventKind::OpenMessage),
            _ => Err("Invalid event name"),
        }
    }
}

/// An event published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A channel connected; `count` is the connected channel count after it.
    Connect {
        /// Connected channel count.
        count: usize,
        /// Channel that connected.
        channel_id: ChannelId,
    },
    /// A channel disconnected; `count` is the connected channel count after it.
    Disconnect {
        /// Connected channel count.
        count: usize,
        /// Channel that disconnected.
        channel_id: ChannelId,
    },
    /// First delivery of a message.
    Message {
        /// The message.
        message: Arc<PushMessage>,
        /// Channel that delivered it first.
        channel_id: ChannelId,
    },
    /// The unread count changed.
    UnreadChange {
        /// New unread count.
        count: u64,
    },
    /// The user opened a message through a channel.
    OpenMessage {
        /// The message.
        message: Arc<PushMessage>,
        /// Channel the message was opened through.
        channel_id: ChannelId,
    },
}

impl Event {
    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connect { .. } => EventKind::Connect,
            Event::Disconnect { .. } => EventKind::Disconnect,
            Event::Message { .. } => EventKind::Message,
            Event::UnreadChange { .. } => EventKind::UnreadChange,
            Event::OpenMessage { .. } => EventKind::OpenMessage,
        }
    }
}

/// A subscriber callback.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
}

/// Multi-consumer publish/subscribe registry keyed by event kind.
pub struct EventBus {
    subscribers: DashMap<EventKind, Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a subscriber for `kind`.
    pub fn subscribe(&self, kind: EventKind, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .entry(kind)
            .or_default()
            .push(Subscriber { id, callback });
        trace!(event = %kind, subscription = id.0, "Subscribed");
        id
    }

    /// Remove a subscription.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let Some(mut list) = self.subscribers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        before != list.len()
    }

    /// Number of subscribers for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map(|l| l.len()).unwrap_or(0)
    }

    /// Publish an event to every subscriber of its kind.
    ///
    /// Returns the number of callbacks that completed without panicking.
    pub fn emit(&self, event: &Event) -> usize {
        let kind = event.kind();
        // Snapshot so callbacks may subscribe or unsubscribe re-entrantly
        let callbacks: Vec<Callback> = match self.subscribers.get(&kind) {
            Some(list) => list.iter().map(|s| Arc::clone(&s.callback)).collect(),
            None => return 0,
        };

        trace!(event = %kind, subscribers = callbacks.len(), "Emitting");
        callbacks
            .iter()
            .filter(|callback| Self::invoke(callback, event))
            .count()
    }

    /// Invoke a single callback, containing any panic.
    ///
    /// Returns `false` if the callback panicked.
    pub fn invoke(callback: &Callback, event: &Event) -> bool {
        match catch_unwind(AssertUnwindSafe(|| callback(event))) {
            Ok(()) => true,
            Err(_) => {
                warn!(event = %event.kind(), "Subscriber panicked");
                false
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
