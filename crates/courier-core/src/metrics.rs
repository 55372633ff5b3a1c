//! Metrics instrumentation for Courier.
//!
//! Uses the `metrics` facade. Nothing is exported unless the embedding
//! application installs a recorder.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const MESSAGES_FORWARDED: &str = "courier_messages_forwarded_total";
    pub const MESSAGES_SUPPRESSED: &str = "courier_messages_suppressed_total";
    pub const OPEN_MESSAGES: &str = "courier_open_messages_total";
    pub const CHANNELS_CONNECTED: &str = "courier_channels_connected";
    pub const UNREAD_COUNT: &str = "courier_unread_count";
    pub const ACTIONS_TOTAL: &str = "courier_actions_total";
    pub const ERRORS_TOTAL: &str = "courier_errors_total";
}

/// Describe every Courier metric to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::MESSAGES_FORWARDED,
        "Messages forwarded to subscribers on first delivery"
    );
    metrics::describe_counter!(
        names::MESSAGES_SUPPRESSED,
        "Redundant message deliveries suppressed"
    );
    metrics::describe_counter!(names::OPEN_MESSAGES, "Messages opened through a channel");
    metrics::describe_gauge!(
        names::CHANNELS_CONNECTED,
        "Current number of connected channels"
    );
    metrics::describe_gauge!(names::UNREAD_COUNT, "Last known unread message count");
    metrics::describe_counter!(names::ACTIONS_TOTAL, "Backing-service actions performed");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");
}

/// Record a forwarded message.
pub fn record_forwarded(channel_id: &str) {
    counter!(names::MESSAGES_FORWARDED, "channel" => channel_id.to_string()).increment(1);
}

/// Record a suppressed duplicate.
pub fn record_suppressed(channel_id: &str) {
    counter!(names::MESSAGES_SUPPRESSED, "channel" => channel_id.to_string()).increment(1);
}

/// Record an opened message.
pub fn record_open(channel_id: &str) {
    counter!(names::OPEN_MESSAGES, "channel" => channel_id.to_string()).increment(1);
}

/// Update the connected channel count.
pub fn set_connected_channels(count: usize) {
    gauge!(names::CHANNELS_CONNECTED).set(count as f64);
}

/// Update the unread count.
pub fn set_unread(count: u64) {
    gauge!(names::UNREAD_COUNT).set(count as f64);
}

/// Record an action and its outcome.
pub fn record_action(action: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::ACTIONS_TOTAL, "action" => action.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: every call is a no-op
        describe_metrics();
        record_forwarded("a");
        record_suppressed("b");
        record_open("a");
        set_connected_channels(2);
        set_unread(5);
        record_action("read", true);
        record_error("subscriber_panic");
    }
}
