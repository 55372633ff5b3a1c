//! Channel registry for Courier.
//!
//! The registry owns the set of attached channels, keyed by id, and the
//! started/stopped lifecycle every channel follows.

use crate::channel::{validate_channel_id, Channel, ChannelId, SignalSink};
use crate::client::ClientError;
use courier_protocol::ClientConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// A registered channel and the token of its registration.
struct Registration {
    channel: Arc<dyn Channel>,
    token: u64,
}

#[derive(Debug, Default)]
struct Lifecycle {
    started: bool,
    config: Option<ClientConfig>,
}

/// The set of registered channels.
pub struct Registry {
    /// Channels indexed by id.
    channels: DashMap<ChannelId, Registration>,
    /// Source of registration tokens.
    next_token: AtomicU64,
    /// Start/stop state and the last start configuration.
    lifecycle: Mutex<Lifecycle>,
}

impl Registry {
    /// Create an empty, stopped registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_token: AtomicU64::new(1),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a channel.
    ///
    /// `sink` builds the signal sink for the new registration token. The sink
    /// is attached before the channel is started, which happens immediately
    /// when the registry is already started.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or already registered; the
    /// registry is left unchanged.
    pub(crate) fn register(
        &self,
        channel: Arc<dyn Channel>,
        sink: impl FnOnce(u64) -> SignalSink,
    ) -> Result<u64, ClientError> {
        let channel_id = channel.id().to_string();
        validate_channel_id(&channel_id).map_err(ClientError::InvalidChannel)?;

        let token = match self.channels.entry(channel_id.clone()) {
            Entry::Occupied(_) => return Err(ClientError::DuplicateChannel(channel_id)),
            Entry::Vacant(entry) => {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                entry.insert(Registration {
                    channel: Arc::clone(&channel),
                    token,
                });
                token
            }
        };

        channel.attach(sink(token));
        debug!(channel = %channel_id, registration = token, "Channel registered");

        if let Some(config) = self.started_config() {
            debug!(channel = %channel_id, "Starting late-registered channel");
            channel.start(&config);
        }

        Ok(token)
    }

    /// Remove a registration.
    ///
    /// Returns `true` if the channel was registered under `token`.
    pub(crate) fn remove(&self, channel_id: &str, token: u64) -> bool {
        let removed = self
            .channels
            .remove_if(channel_id, |_, r| r.token == token)
            .is_some();
        if removed {
            debug!(channel = %channel_id, registration = token, "Channel removed");
        }
        removed
    }

    /// Check if `token` is the live registration of `channel_id`.
    #[must_use]
    pub(crate) fn is_current(&self, channel_id: &str, token: u64) -> bool {
        self.channels
            .get(channel_id)
            .map(|r| r.token == token)
            .unwrap_or(false)
    }

    /// Start every registered channel and remember `config` for channels
    /// registered later.
    ///
    /// Returns the number of channels started.
    pub fn start(&self, config: &ClientConfig) -> usize {
        {
            let mut lifecycle = self.lifecycle();
            lifecycle.started = true;
            lifecycle.config = Some(config.clone());
        }

        let channels = self.channels();
        for channel in &channels {
            channel.start(config);
        }

        info!(
            service = %config.service_address,
            user = %config.user_id,
            channels = channels.len(),
            "Started"
        );
        channels.len()
    }

    /// Stop every registered channel.
    ///
    /// Membership and the stored configuration are kept. Returns the number
    /// of channels stopped.
    pub fn stop(&self, config: &ClientConfig) -> usize {
        let channels = self.channels();
        for channel in &channels {
            channel.stop(config);
        }

        self.lifecycle().started = false;

        info!(channels = channels.len(), "Stopped");
        channels.len()
    }

    /// Check if the registry is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.lifecycle().started
    }

    /// The last configuration passed to `start`.
    #[must_use]
    pub fn config(&self) -> Option<ClientConfig> {
        self.lifecycle().config.clone()
    }

    /// The stored configuration, only while started.
    #[must_use]
    pub fn started_config(&self) -> Option<ClientConfig> {
        let lifecycle = self.lifecycle();
        if lifecycle.started {
            lifecycle.config.clone()
        } else {
            None
        }
    }

    /// Get a registered channel.
    #[must_use]
    pub fn get(&self, channel_id: &str) -> Option<Arc<dyn Channel>> {
        self.channels
            .get(channel_id)
            .map(|r| Arc::clone(&r.channel))
    }

    /// Check if a channel id is registered.
    #[must_use]
    pub fn contains(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }

    /// Number of registered channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if no channel is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Ids of all registered channels.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of all registered channels.
    #[must_use]
    pub fn channels(&self) -> Vec<Arc<dyn Channel>> {
        self.channels
            .iter()
            .map(|e| Arc::clone(&e.value().channel))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelSignal, SignalTarget};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;

    struct NoTarget;

    impl SignalTarget for NoTarget {
        fn handle_signal(&self, _: &str, _: u64, _: ChannelSignal) {}
    }

    #[derive(Default)]
    struct CountingChannel {
        id: String,
        attached: AtomicUsize,
        started: AtomicUsize,
        stopped: AtomicUsize,
    }

    impl CountingChannel {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                ..Default::default()
            })
        }
    }

    impl Channel for CountingChannel {
        fn id(&self) -> &str {
            &self.id
        }

        fn attach(&self, _sink: SignalSink) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }

        fn start(&self, _config: &ClientConfig) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn stop(&self, _config: &ClientConfig) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sink(id: &str) -> impl FnOnce(u64) -> SignalSink + '_ {
        move |token| {
            let target: Weak<dyn SignalTarget> = Weak::<NoTarget>::new();
            SignalSink::new(id, token, target)
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("http://localhost:3000", "/messages", "u1")
    }

    #[test]
    fn test_register_distinct_ids() {
        let registry = Registry::new();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            let channel = CountingChannel::new(id);
            registry.register(channel.clone(), sink(id)).unwrap();
            assert_eq!(registry.len(), i + 1);
            assert_eq!(channel.attached.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_register_duplicate_id() {
        let registry = Registry::new();
        let first = CountingChannel::new("a");
        registry.register(first.clone(), sink("a")).unwrap();

        let second = CountingChannel::new("a");
        assert!(matches!(
            registry.register(second.clone(), sink("a")),
            Err(ClientError::DuplicateChannel(id)) if id == "a"
        ));

        // Prior registration intact, duplicate never attached
        assert_eq!(registry.len(), 1);
        assert_eq!(second.attached.load(Ordering::SeqCst), 0);
        let kept = registry.get("a").unwrap();
        assert!(std::ptr::eq(
            Arc::as_ptr(&kept) as *const u8,
            Arc::as_ptr(&first) as *const u8
        ));
    }

    #[test]
    fn test_register_invalid_id() {
        let registry = Registry::new();
        assert!(matches!(
            registry.register(CountingChannel::new(""), sink("")),
            Err(ClientError::InvalidChannel(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_start_stop_propagation() {
        let registry = Registry::new();
        let a = CountingChannel::new("a");
        let b = CountingChannel::new("b");
        registry.register(a.clone(), sink("a")).unwrap();
        registry.register(b.clone(), sink("b")).unwrap();

        assert_eq!(registry.start(&config()), 2);
        assert!(registry.is_started());
        assert_eq!(a.started.load(Ordering::SeqCst), 1);

        // Starting again re-issues start
        registry.start(&config());
        assert_eq!(b.started.load(Ordering::SeqCst), 2);

        assert_eq!(registry.stop(&config()), 2);
        assert!(!registry.is_started());
        assert_eq!(a.stopped.load(Ordering::SeqCst), 1);
        // Membership and config survive stop
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.config(), Some(config()));
        assert_eq!(registry.started_config(), None);
    }

    #[test]
    fn test_late_registration_is_started() {
        let registry = Registry::new();
        let early = CountingChannel::new("early");
        registry.register(early.clone(), sink("early")).unwrap();
        assert_eq!(early.started.load(Ordering::SeqCst), 0);

        registry.start(&config());

        let late = CountingChannel::new("late");
        registry.register(late.clone(), sink("late")).unwrap();
        assert_eq!(late.started.load(Ordering::SeqCst), 1);

        registry.stop(&config());
        let after_stop = CountingChannel::new("after");
        registry.register(after_stop.clone(), sink("after")).unwrap();
        assert_eq!(after_stop.started.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_requires_current_token() {
        let registry = Registry::new();
        let token = registry
            .register(CountingChannel::new("a"), sink("a"))
            .unwrap();

        assert!(registry.is_current("a", token));
        assert!(!registry.remove("a", token + 100));
        assert!(registry.remove("a", token));
        assert!(!registry.contains("a"));

        // The id can be registered again, under a new token
        let again = registry
            .register(CountingChannel::new("a"), sink("a"))
            .unwrap();
        assert_ne!(again, token);
        assert!(!registry.is_current("a", token));
    }
}
