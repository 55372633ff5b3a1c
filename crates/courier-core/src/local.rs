//! In-process channel.
//!
//! `LocalChannel` is driven directly by the embedding code: whatever receives
//! pushes (a socket task, a platform callback) calls `deliver` and friends,
//! and the channel relays them to the client it is attached to.

use crate::channel::{Channel, ChannelId, SignalSink};
use courier_protocol::{codec, ClientConfig, ProtocolError, PushMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// A channel fed by application code.
#[derive(Debug)]
pub struct LocalChannel {
    id: ChannelId,
    sink: Mutex<Option<SignalSink>>,
    started: AtomicBool,
    config: Mutex<Option<ClientConfig>>,
}

impl LocalChannel {
    /// Create a detached channel.
    #[must_use]
    pub fn new(id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            sink: Mutex::new(None),
            started: AtomicBool::new(false),
            config: Mutex::new(None),
        }
    }

    fn sink(&self) -> Option<SignalSink> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_sink(&self, raise: impl FnOnce(&SignalSink)) -> bool {
        // Raise with the lock released; handlers may re-enter this channel
        match self.sink() {
            Some(sink) => {
                raise(&sink);
                true
            }
            None => {
                debug!(channel = %self.id, "Channel not attached, signal dropped");
                false
            }
        }
    }

    /// Report that the channel reached its server.
    pub fn connect(&self) -> bool {
        self.with_sink(SignalSink::connected)
    }

    /// Deliver a message.
    pub fn deliver(&self, message: PushMessage) -> bool {
        self.with_sink(|sink| sink.message(message))
    }

    /// Report that the user opened a message through this channel.
    pub fn open(&self, message: PushMessage) -> bool {
        self.with_sink(|sink| sink.open_message(message))
    }

    /// Report that the channel lost its server.
    pub fn disconnect(&self) -> bool {
        self.with_sink(SignalSink::disconnected)
    }

    /// Decode a raw JSON payload and deliver it.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid message; nothing is
    /// delivered in that case.
    pub fn deliver_raw(&self, data: &[u8]) -> Result<bool, ProtocolError> {
        let message = codec::decode(data).map_err(|e| {
            warn!(channel = %self.id, error = %e, "Rejected raw payload");
            e
        })?;
        Ok(self.deliver(message))
    }

    /// Whether the channel has been started and not stopped since.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Configuration of the last `start`.
    #[must_use]
    pub fn config(&self) -> Option<ClientConfig> {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Channel for LocalChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn attach(&self, sink: SignalSink) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    fn start(&self, config: &ClientConfig) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        self.started.store(true, Ordering::SeqCst);
        debug!(channel = %self.id, "Local channel started");
    }

    fn stop(&self, _config: &ClientConfig) {
        self.started.store(false, Ordering::SeqCst);
        debug!(channel = %self.id, "Local channel stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelSignal, SignalTarget};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ChannelSignal>>,
    }

    impl SignalTarget for Recorder {
        fn handle_signal(&self, _: &str, _: u64, signal: ChannelSignal) {
            self.seen.lock().unwrap().push(signal);
        }
    }

    fn attached(id: &str) -> (LocalChannel, Arc<Recorder>, Arc<dyn SignalTarget>) {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn SignalTarget> = recorder.clone();
        let channel = LocalChannel::new(id);
        channel.attach(SignalSink::new(id, 1, Arc::downgrade(&target)));
        (channel, recorder, target)
    }

    #[test]
    fn test_detached_channel_drops_signals() {
        let channel = LocalChannel::new("a");
        assert!(!channel.connect());
        assert!(!channel.deliver(PushMessage::new("m1")));
        assert!(!channel.disconnect());
    }

    #[test]
    fn test_signals_reach_target() {
        let (channel, recorder, _target) = attached("a");

        assert!(channel.connect());
        assert!(channel.deliver(PushMessage::new("m1")));
        assert!(channel.open(PushMessage::new("m1")));
        assert!(channel.disconnect());

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(
            *seen,
            [
                ChannelSignal::Connect,
                ChannelSignal::Message(PushMessage::new("m1")),
                ChannelSignal::OpenMessage(PushMessage::new("m1")),
                ChannelSignal::Disconnect,
            ]
        );
    }

    #[test]
    fn test_deliver_raw() {
        let (channel, recorder, _target) = attached("a");

        assert!(channel
            .deliver_raw(br#"{"sendId":"m1","isRead":false,"title":"hi"}"#)
            .unwrap());
        assert!(channel.deliver_raw(b"not json").is_err());
        assert!(channel.deliver_raw(b"").is_err());

        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_start_stop_state() {
        let channel = LocalChannel::new("a");
        let config = ClientConfig::new("http://localhost:3000", "/messages", "u1");

        assert!(!channel.is_started());
        channel.start(&config);
        assert!(channel.is_started());
        assert_eq!(channel.config(), Some(config.clone()));

        channel.stop(&config);
        assert!(!channel.is_started());
    }
}
