//! Connection tracking for Courier.
//!
//! The connection set is the subset of registered channels currently
//! connected to their server. Its size is the connected channel count
//! reported with every connect and disconnect event.

use crate::channel::ChannelId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Connection state for a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    /// Channel id.
    pub channel_id: ChannelId,
    /// When the channel connected (milliseconds since the epoch).
    pub connected_at: u64,
    /// Connection order within the set; later connections have larger values.
    pub sequence: u64,
}

impl ConnectionState {
    /// Create a connection state stamped with the current time.
    #[must_use]
    pub fn new(channel_id: impl Into<ChannelId>, sequence: u64) -> Self {
        Self {
            channel_id: channel_id.into(),
            connected_at: now_millis(),
            sequence,
        }
    }

    /// How long the channel has been connected.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        Duration::from_millis(now_millis().saturating_sub(self.connected_at))
    }
}

/// The set of connected channels.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    members: DashMap<ChannelId, ConnectionState>,
    next_sequence: AtomicU64,
}

impl ConnectionSet {
    /// Create an empty connection set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connected channels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Check if a channel is connected.
    #[must_use]
    pub fn is_connected(&self, channel_id: &str) -> bool {
        self.members.contains_key(channel_id)
    }

    /// Get the connection state of a channel.
    #[must_use]
    pub fn get(&self, channel_id: &str) -> Option<ConnectionState> {
        self.members.get(channel_id).map(|s| s.value().clone())
    }

    /// Mark a channel connected.
    ///
    /// Returns the connected count afterwards. A repeated connect keeps the
    /// original timestamp.
    pub fn connect(&self, channel_id: &str) -> usize {
        self.members
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                debug!(channel = %channel_id, "Channel connected");
                let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                ConnectionState::new(channel_id, sequence)
            });
        self.members.len()
    }

    /// Mark a channel disconnected.
    ///
    /// Returns the removed state, if the channel was connected.
    pub fn disconnect(&self, channel_id: &str) -> Option<ConnectionState> {
        let state = self.members.remove(channel_id).map(|(_, s)| s);
        if state.is_some() {
            debug!(channel = %channel_id, "Channel disconnected");
        }
        state
    }

    /// Ids of all connected channels, oldest connection first.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut states = self.snapshot();
        states.sort_by_key(|s| s.sequence);
        states.into_iter().map(|s| s.channel_id).collect()
    }

    /// Full connection state as a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConnectionState> {
        self.members.iter().map(|e| e.value().clone()).collect()
    }

    /// Check if no channel is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
