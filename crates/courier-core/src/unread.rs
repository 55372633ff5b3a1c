//! Unread-count synchronization.
//!
//! The counter starts unknown. Server responses replace it; local actions and
//! new messages adjust it optimistically. Every operation returns the new
//! value only when the value actually changed, which is exactly when an
//! `unreadChange` event must fire.
//!
//! Optimistic adjustments on an unknown counter start from zero, so the
//! first forwarded message yields 1. Decrements stop at zero.

/// The local unread counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadCounter {
    value: Option<u64>,
}

impl UnreadCounter {
    /// Create an unknown counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, if known.
    #[must_use]
    pub fn get(&self) -> Option<u64> {
        self.value
    }

    /// Replace the counter with an authoritative server value.
    pub fn reconcile(&mut self, authoritative: u64) -> Option<u64> {
        self.set(Some(authoritative))
    }

    /// Account for a newly forwarded message.
    pub fn increment(&mut self) -> Option<u64> {
        let next = self.value.unwrap_or(0).saturating_add(1);
        self.set(Some(next))
    }

    /// Account for a message read or delayed.
    pub fn decrement(&mut self) -> Option<u64> {
        let next = self.value.unwrap_or(0).saturating_sub(1);
        self.set(Some(next))
    }

    fn set(&mut self, next: Option<u64>) -> Option<u64> {
        if next == self.value {
            return None;
        }
        self.value = next;
        next
    }
}
