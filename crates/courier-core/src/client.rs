//! The Courier client.
//!
//! A `Client` ties the pieces together: channels registered through
//! `use_channel` raise signals that the client turns into connection
//! tracking, deduplicated message events and unread-count updates, while the
//! action methods talk to the backing service and reconcile the counter with
//! what it reports.
//!
//! State changes happen synchronously inside signal handling and before any
//! action is awaited; events are emitted afterwards with no lock held, so
//! subscribers may call back into the client.

use crate::channel::{Channel, ChannelId, ChannelSignal, SignalSink, SignalTarget};
use crate::connections::ConnectionSet;
use crate::dedup::{Deduplicator, DEFAULT_DEDUP_CAPACITY};
use crate::events::{Callback, Event, EventBus, EventKind, SubscriptionId};
use crate::metrics;
use crate::registry::Registry;
use crate::unread::UnreadCounter;
use courier_protocol::{
    ActionOutcome, ClientConfig, DelayRequest, DeliveredRequest, DeviceRegistration, Endpoint,
    MessagePage, MessageQuery, PushMessage, ReadRequest, SendId,
};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tenvis_courier_service::{ActionService, ServiceError};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A channel with the same id is already registered.
    #[error("Channel already registered: {0}")]
    DuplicateChannel(ChannelId),

    /// The channel id is not acceptable.
    #[error("Invalid channel id: {0}")]
    InvalidChannel(&'static str),

    /// An action was called before the client was ever started.
    #[error("Client not started")]
    NotStarted,

    /// The backing service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Client tuning options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Maximum number of remembered delivery ids (0 = unbounded).
    pub dedup_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

/// Point-in-time client statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    /// Registered channels.
    pub channel_count: usize,
    /// Connected channels.
    pub connected_count: usize,
    /// Remembered delivery ids.
    pub delivered_count: usize,
    /// Last known unread count.
    pub unread_count: Option<u64>,
}

struct Inner {
    bus: EventBus,
    registry: Registry,
    connections: ConnectionSet,
    dedup: Deduplicator,
    unread: Mutex<UnreadCounter>,
    service: Arc<dyn ActionService>,
}

impl Inner {
    fn update_unread(&self, update: impl FnOnce(&mut UnreadCounter) -> Option<u64>) {
        let changed = {
            let mut counter = self.unread.lock().unwrap_or_else(PoisonError::into_inner);
            update(&mut counter)
        };

        if let Some(count) = changed {
            trace!(count, "Unread count changed");
            metrics::set_unread(count);
            self.bus.emit(&Event::UnreadChange { count });
        }
    }

    fn unread_count(&self) -> Option<u64> {
        self.unread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get()
    }

    fn on_connect(&self, channel_id: &str) {
        let count = self.connections.connect(channel_id);
        metrics::set_connected_channels(count);
        info!(channel = %channel_id, connected = count, "Channel connected");

        self.bus.emit(&Event::Connect {
            count,
            channel_id: channel_id.to_string(),
        });
    }

    fn on_disconnect(&self, channel_id: &str, registration: u64) {
        self.connections.disconnect(channel_id);
        // A disconnected channel is gone; it comes back only through a new registration
        self.registry.remove(channel_id, registration);

        let count = self.connections.count();
        metrics::set_connected_channels(count);
        info!(channel = %channel_id, connected = count, "Channel disconnected");

        self.bus.emit(&Event::Disconnect {
            count,
            channel_id: channel_id.to_string(),
        });
    }

    fn on_message(&self, channel_id: &str, message: PushMessage) {
        if !self.dedup.insert(&message.send_id) {
            trace!(channel = %channel_id, send_id = %message.send_id, "Duplicate delivery suppressed");
            metrics::record_suppressed(channel_id);
            return;
        }

        trace!(channel = %channel_id, send_id = %message.send_id, "Forwarding message");
        metrics::record_forwarded(channel_id);

        let changed = self
            .unread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .increment();

        self.bus.emit(&Event::Message {
            message: Arc::new(message),
            channel_id: channel_id.to_string(),
        });

        if let Some(count) = changed {
            metrics::set_unread(count);
            self.bus.emit(&Event::UnreadChange { count });
        }
    }

    fn on_open_message(&self, channel_id: &str, message: PushMessage) {
        trace!(channel = %channel_id, send_id = %message.send_id, "Message opened");
        metrics::record_open(channel_id);

        self.bus.emit(&Event::OpenMessage {
            message: Arc::new(message),
            channel_id: channel_id.to_string(),
        });
    }
}

impl SignalTarget for Inner {
    fn handle_signal(&self, channel_id: &str, registration: u64, signal: ChannelSignal) {
        if !self.registry.is_current(channel_id, registration) {
            debug!(
                channel = %channel_id,
                registration,
                signal = signal.name(),
                "Ignoring signal from stale registration"
            );
            return;
        }

        match signal {
            ChannelSignal::Connect => self.on_connect(channel_id),
            ChannelSignal::Disconnect => self.on_disconnect(channel_id, registration),
            ChannelSignal::Message(message) => self.on_message(channel_id, message),
            ChannelSignal::OpenMessage(message) => self.on_open_message(channel_id, message),
        }
    }
}

/// Handle to one logical Courier client.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create a client backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn ActionService>) -> Self {
        Self::with_options(service, ClientOptions::default())
    }

    /// Create a client with custom options.
    #[must_use]
    pub fn with_options(service: Arc<dyn ActionService>, options: ClientOptions) -> Self {
        debug!(
            service = service.name(),
            dedup_capacity = options.dedup_capacity,
            "Creating client"
        );
        Self {
            inner: Arc::new(Inner {
                bus: EventBus::new(),
                registry: Registry::new(),
                connections: ConnectionSet::new(),
                dedup: Deduplicator::with_capacity(options.dedup_capacity),
                unread: Mutex::new(UnreadCounter::new()),
                service,
            }),
        }
    }

    /// Subscribe to an event kind.
    ///
    /// A `connect` subscriber added while channels are connected immediately
    /// receives one `connect` per connected channel, each carrying the
    /// current connected count.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let id = self.inner.bus.subscribe(kind, Arc::clone(&callback));

        if kind == EventKind::Connect {
            let connected = self.inner.connections.channel_ids();
            let count = connected.len();
            for channel_id in connected {
                EventBus::invoke(&callback, &Event::Connect { count, channel_id });
            }
        }

        id
    }

    /// Remove a subscription.
    ///
    /// Returns `true` if the subscription existed.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(kind, id)
    }

    /// Register a channel.
    ///
    /// If the client is started, the channel is started right away with the
    /// stored configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a channel with the same id is registered or the id
    /// is invalid. Existing registrations are not affected.
    pub fn use_channel(&self, channel: Arc<dyn Channel>) -> Result<(), ClientError> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let target: Weak<dyn SignalTarget> = weak;
        let channel_id = channel.id().to_string();

        self.inner
            .registry
            .register(channel, |token| {
                SignalSink::new(channel_id.as_str(), token, target)
            })
            .map_err(|e| {
                warn!(channel = %channel_id, error = %e, "Channel registration rejected");
                e
            })?;
        Ok(())
    }

    /// Start every channel with `config` and keep it for later registrations
    /// and actions.
    pub fn start(&self, config: &ClientConfig) {
        self.inner.registry.start(config);
    }

    /// Stop every channel.
    ///
    /// Registrations, delivered ids and the unread count are kept.
    pub fn stop(&self, config: &ClientConfig) {
        self.inner.registry.stop(config);
    }

    fn config(&self) -> Result<ClientConfig, ClientError> {
        self.inner.registry.config().ok_or(ClientError::NotStarted)
    }

    fn action_failed(&self, endpoint: Endpoint, error: ServiceError) -> ClientError {
        warn!(action = %endpoint, error = %error, "Action failed");
        metrics::record_action(&endpoint.to_string(), false);
        metrics::record_error("service");
        ClientError::Service(error)
    }

    /// Fetch a page of messages and reconcile the unread count.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was never started or the service call
    /// fails; the unread count is left unchanged in that case.
    pub async fn fetch_messages(&self, query: MessageQuery) -> Result<MessagePage, ClientError> {
        let config = self.config()?;
        let response = self
            .inner
            .service
            .list_messages(&config, &query)
            .await
            .map_err(|e| self.action_failed(Endpoint::Messages, e))?;

        metrics::record_action(&Endpoint::Messages.to_string(), true);
        let page = MessagePage::from_response(response, query.filter);
        debug!(
            messages = page.messages.len(),
            unread = page.unread_count,
            "Fetched messages"
        );

        let count = page.unread_count;
        self.inner.update_unread(|c| c.reconcile(count));
        Ok(page)
    }

    /// Fetch the authoritative unread count and reconcile with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was never started or the service call
    /// fails.
    pub async fn fetch_unread_count(&self) -> Result<u64, ClientError> {
        let config = self.config()?;
        let response = self
            .inner
            .service
            .unread_count(&config)
            .await
            .map_err(|e| self.action_failed(Endpoint::UnreadCount, e))?;

        metrics::record_action(&Endpoint::UnreadCount.to_string(), true);
        self.inner.update_unread(|c| c.reconcile(response.count));
        Ok(response.count)
    }

    /// Acknowledge delivery of a push.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was never started or the service call
    /// fails.
    pub async fn mark_delivered(
        &self,
        push_id: impl Into<String>,
    ) -> Result<ActionOutcome, ClientError> {
        let config = self.config()?;
        let request = DeliveredRequest {
            push_id: push_id.into(),
        };
        let outcome = self
            .inner
            .service
            .delivered(&config, &request)
            .await
            .map_err(|e| self.action_failed(Endpoint::Delivered, e))?;

        metrics::record_action(&Endpoint::Delivered.to_string(), outcome.success);
        Ok(outcome)
    }

    /// Mark a message read.
    ///
    /// The unread count drops by one when the service reports success.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was never started or the service call
    /// fails; the unread count is left unchanged in that case.
    pub async fn mark_read(&self, send_id: impl Into<SendId>) -> Result<ActionOutcome, ClientError> {
        let config = self.config()?;
        let request = ReadRequest {
            send_id: send_id.into(),
        };
        let outcome = self
            .inner
            .service
            .read(&config, &request)
            .await
            .map_err(|e| self.action_failed(Endpoint::Read, e))?;

        self.settle_write(Endpoint::Read, &outcome);
        Ok(outcome)
    }

    /// Postpone a message until `schedule`.
    ///
    /// A rejection by the service is returned as a failed outcome rather than
    /// an error. The unread count drops by one when the service reports
    /// success.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was never started or the request never
    /// got a usable response.
    pub async fn delay(
        &self,
        send_id: impl Into<SendId>,
        schedule: impl Into<String>,
    ) -> Result<ActionOutcome, ClientError> {
        let config = self.config()?;
        let request = DelayRequest {
            send_id: send_id.into(),
            schedule: schedule.into(),
        };

        let outcome = match self.inner.service.delay(&config, &request).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_status() => {
                warn!(send_id = %request.send_id, error = %e, "Delay rejected");
                metrics::record_error("service");
                ActionOutcome::failed(e.to_string())
            }
            Err(e) => return Err(self.action_failed(Endpoint::Delay, e)),
        };

        self.settle_write(Endpoint::Delay, &outcome);
        Ok(outcome)
    }

    fn settle_write(&self, endpoint: Endpoint, outcome: &ActionOutcome) {
        metrics::record_action(&endpoint.to_string(), outcome.success);
        if outcome.success {
            self.inner.update_unread(UnreadCounter::decrement);
        } else {
            debug!(action = %endpoint, error = ?outcome.error, "Action not applied");
        }
    }

    /// Register a device/channel pairing with the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was never started or the service call
    /// fails.
    pub async fn register_device(
        &self,
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Result<ActionOutcome, ClientError> {
        let config = self.config()?;
        let registration = DeviceRegistration {
            user_id: user_id.into(),
            device_id: device_id.into(),
            channel: channel.into(),
        };
        let outcome = self
            .inner
            .service
            .register(&config, &registration)
            .await
            .map_err(|e| self.action_failed(Endpoint::Register, e))?;

        metrics::record_action(&Endpoint::Register.to_string(), outcome.success);
        Ok(outcome)
    }

    /// Remove a device/channel pairing from the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was never started or the service call
    /// fails.
    pub async fn unregister_device(
        &self,
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Result<ActionOutcome, ClientError> {
        let config = self.config()?;
        let registration = DeviceRegistration {
            user_id: user_id.into(),
            device_id: device_id.into(),
            channel: channel.into(),
        };
        let outcome = self
            .inner
            .service
            .unregister(&config, &registration)
            .await
            .map_err(|e| self.action_failed(Endpoint::Unregister, e))?;

        metrics::record_action(&Endpoint::Unregister.to_string(), outcome.success);
        Ok(outcome)
    }

    /// Whether the client is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.registry.is_started()
    }

    /// Last known unread count.
    #[must_use]
    pub fn unread_count(&self) -> Option<u64> {
        self.inner.unread_count()
    }

    /// Ids of connected channels, oldest connection first.
    #[must_use]
    pub fn connected_channels(&self) -> Vec<ChannelId> {
        self.inner.connections.channel_ids()
    }

    /// Ids of registered channels.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.inner.registry.channel_ids()
    }

    /// Check if a channel id is registered.
    #[must_use]
    pub fn has_channel(&self, channel_id: &str) -> bool {
        self.inner.registry.contains(channel_id)
    }

    /// Get client statistics.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            channel_count: self.inner.registry.len(),
            connected_count: self.inner.connections.count(),
            delivered_count: self.inner.dedup.len(),
            unread_count: self.inner.unread_count(),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("service", &self.inner.service.name())
            .field("started", &self.is_started())
            .field("stats", &self.stats())
            .finish()
    }
}
