//! Channel abstraction for Courier.
//!
//! A channel is any transport that delivers messages for the current user:
//! a platform push service, a socket bridge, a long-poll loop. Channels are
//! owned by the application and handed to the client, which attaches a
//! `SignalSink` the channel raises its lifecycle signals on.

use courier_protocol::{ClientConfig, PushMessage};
use std::fmt;
use std::sync::Weak;
use tracing::trace;

/// Maximum channel id length.
pub const MAX_CHANNEL_ID_LENGTH: usize = 256;

/// A channel identifier.
pub type ChannelId = String;

/// Validate a channel id.
///
/// # Errors
///
/// Returns an error message if the channel id is invalid.
pub fn validate_channel_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Channel id cannot be empty");
    }
    if id.len() > MAX_CHANNEL_ID_LENGTH {
        return Err("Channel id too long");
    }
    if !id.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Channel id contains invalid characters");
    }
    Ok(())
}

/// The capability contract every channel implements.
///
/// `start` and `stop` are commands, not awaited operations: a channel that
/// needs to do I/O spawns its own work and reports progress through the
/// attached sink.
pub trait Channel: Send + Sync {
    /// Unique channel id.
    fn id(&self) -> &str;

    /// Receive the sink this channel must raise its signals on.
    ///
    /// Called once per registration, before any `start`.
    fn attach(&self, sink: SignalSink);

    /// Start delivering with the given configuration.
    fn start(&self, config: &ClientConfig);

    /// Stop delivering.
    fn stop(&self, config: &ClientConfig);
}

/// A lifecycle signal raised by a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// The channel reached its server.
    Connect,
    /// A message arrived.
    Message(PushMessage),
    /// The user activated a message through the channel's own affordance.
    OpenMessage(PushMessage),
    /// The channel lost its server and is gone.
    Disconnect,
}

impl ChannelSignal {
    /// Signal name, as used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ChannelSignal::Connect => "connect",
            ChannelSignal::Message(_) => "message",
            ChannelSignal::OpenMessage(_) => "openMessage",
            ChannelSignal::Disconnect => "disconnect",
        }
    }
}

/// Receiver of channel signals.
pub(crate) trait SignalTarget: Send + Sync {
    fn handle_signal(&self, channel_id: &str, registration: u64, signal: ChannelSignal);
}

/// Handle a channel raises its signals on.
///
/// A sink is bound to one registration of one channel. It does not keep the
/// client alive; once the client is dropped, or the registration has ended,
/// raised signals are discarded.
#[derive(Clone)]
pub struct SignalSink {
    channel_id: ChannelId,
    registration: u64,
    target: Weak<dyn SignalTarget>,
}

impl SignalSink {
    pub(crate) fn new(
        channel_id: impl Into<ChannelId>,
        registration: u64,
        target: Weak<dyn SignalTarget>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            registration,
            target,
        }
    }

    /// Id of the channel this sink belongs to.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Whether the client behind this sink still exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Raise a connect signal.
    pub fn connected(&self) {
        self.raise(ChannelSignal::Connect);
    }

    /// Raise a message signal.
    pub fn message(&self, message: PushMessage) {
        self.raise(ChannelSignal::Message(message));
    }

    /// Raise an open-message signal.
    pub fn open_message(&self, message: PushMessage) {
        self.raise(ChannelSignal::OpenMessage(message));
    }

    /// Raise a disconnect signal.
    pub fn disconnected(&self) {
        self.raise(ChannelSignal::Disconnect);
    }

    /// Raise an arbitrary signal.
    pub fn raise(&self, signal: ChannelSignal) {
        match self.target.upgrade() {
            Some(target) => target.handle_signal(&self.channel_id, self.registration, signal),
            None => {
                trace!(channel = %self.channel_id, signal = signal.name(), "Client dropped, signal discarded");
            }
        }
    }
}

impl fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink")
            .field("channel_id", &self.channel_id)
            .field("registration", &self.registration)
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, u64, &'static str)>>,
    }

    impl SignalTarget for Recorder {
        fn handle_signal(&self, channel_id: &str, registration: u64, signal: ChannelSignal) {
            self.seen
                .lock()
                .unwrap()
                .push((channel_id.to_string(), registration, signal.name()));
        }
    }

    #[test]
    fn test_channel_id_validation() {
        assert!(validate_channel_id("jpush").is_ok());
        assert!(validate_channel_id("socket:primary").is_ok());
        assert!(validate_channel_id("").is_err());
        assert!(validate_channel_id("tab\tid").is_err());

        let long_id = "a".repeat(MAX_CHANNEL_ID_LENGTH + 1);
        assert!(validate_channel_id(&long_id).is_err());
    }

    #[test]
    fn test_sink_forwards_signals() {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn SignalTarget> = recorder.clone();
        let sink = SignalSink::new("a", 7, Arc::downgrade(&target));

        sink.connected();
        sink.message(PushMessage::new("m1"));
        sink.open_message(PushMessage::new("m1"));
        sink.disconnected();

        let seen = recorder.seen.lock().unwrap();
        let names: Vec<_> = seen.iter().map(|(_, _, name)| *name).collect();
        assert_eq!(names, ["connect", "message", "openMessage", "disconnect"]);
        assert!(seen.iter().all(|(id, reg, _)| id == "a" && *reg == 7));
    }

    #[test]
    fn test_sink_after_target_dropped() {
        let target: Arc<dyn SignalTarget> = Arc::new(Recorder::default());
        let sink = SignalSink::new("a", 1, Arc::downgrade(&target));
        assert!(sink.is_attached());

        drop(target);
        assert!(!sink.is_attached());
        // Must not panic
        sink.connected();
    }
}
