//! Backing-service action payloads.
//!
//! Every action is a JSON request/response exchange against an endpoint
//! under the configured service path. Field names follow the service's
//! camelCase convention.

use crate::message::{PushMessage, SendId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Service endpoints, relative to the configured path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// List messages.
    Messages,
    /// Authoritative unread count.
    UnreadCount,
    /// Acknowledge delivery of a push.
    Delivered,
    /// Mark a message read.
    Read,
    /// Postpone a message.
    Delay,
    /// Register a device/channel pairing.
    Register,
    /// Remove a device/channel pairing.
    Unregister,
}

impl Endpoint {
    /// Path suffix appended to the configured service path.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Endpoint::Messages => "",
            Endpoint::UnreadCount => "/unread-count",
            Endpoint::Delivered => "/delivered",
            Endpoint::Read => "/read",
            Endpoint::Delay => "/delay",
            Endpoint::Register => "/register",
            Endpoint::Unregister => "/unregister",
        }
    }

    /// Whether the endpoint is a read-path query (GET) rather than a write.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Endpoint::Messages | Endpoint::UnreadCount)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Endpoint::Messages => "messages",
            Endpoint::UnreadCount => "unread-count",
            Endpoint::Delivered => "delivered",
            Endpoint::Read => "read",
            Endpoint::Delay => "delay",
            Endpoint::Register => "register",
            Endpoint::Unregister => "unregister",
        };
        f.write_str(name)
    }
}

/// Filter selector for message listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFilter {
    /// Only unread messages are displayed.
    Unread,
}

impl MessageFilter {
    /// Query-string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFilter::Unread => "unread",
        }
    }
}

impl TryFrom<&str> for MessageFilter {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "unread" => Ok(MessageFilter::Unread),
            _ => Err("Invalid message filter"),
        }
    }
}

/// Options for listing messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    /// Page cursor.
    pub page: Option<u32>,
    /// Page size, only sent together with `page`.
    pub page_size: Option<u32>,
    /// Display filter.
    pub filter: Option<MessageFilter>,
}

impl MessageQuery {
    /// Query for the first page with no filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a specific page.
    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Request a specific page size.
    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Restrict the display subset to unread messages.
    #[must_use]
    pub fn unread_only(mut self) -> Self {
        self.filter = Some(MessageFilter::Unread);
        self
    }

    /// Query-string pairs for this query, including the caller identity.
    #[must_use]
    pub fn to_pairs(&self, user_id: &str) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("userId", user_id.to_string())];
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
            if let Some(size) = self.page_size {
                pairs.push(("pageSize", size.to_string()));
            }
        }
        if let Some(filter) = self.filter {
            pairs.push(("filter", filter.as_str().to_string()));
        }
        pairs
    }
}

/// Response body of the message listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageListResponse {
    /// Messages on the requested page.
    pub messages: Vec<PushMessage>,
    /// Authoritative unread count.
    pub count: u64,
}

/// Response body of the unread-count endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    /// Authoritative unread count.
    pub count: u64,
}

/// A message listing as presented to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePage {
    /// Every message returned by the service.
    pub messages: Vec<PushMessage>,
    /// The subset selected by the query filter.
    pub display_messages: Vec<PushMessage>,
    /// Authoritative unread count.
    pub unread_count: u64,
}

impl MessagePage {
    /// Build the application view of a listing response.
    #[must_use]
    pub fn from_response(response: MessageListResponse, filter: Option<MessageFilter>) -> Self {
        let display_messages = match filter {
            Some(MessageFilter::Unread) => response
                .messages
                .iter()
                .filter(|m| !m.is_read)
                .cloned()
                .collect(),
            None => response.messages.clone(),
        };

        Self {
            messages: response.messages,
            display_messages,
            unread_count: response.count,
        }
    }
}

/// Body of a delivery acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredRequest {
    /// Push identifier reported by the channel.
    pub push_id: String,
}

/// Body of a mark-read request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRequest {
    /// Message to mark.
    pub send_id: SendId,
}

/// Body of a delay request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayRequest {
    /// Message to postpone.
    pub send_id: SendId,
    /// When the message should resurface, in the service's schedule format.
    pub schedule: String,
}

/// Body of register and unregister requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    /// Owning user.
    pub user_id: String,
    /// Device identifier.
    pub device_id: String,
    /// Channel descriptor the device is reachable through.
    pub channel: String,
}

/// Result body of a write action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Whether the service applied the action.
    #[serde(default)]
    pub success: bool,
    /// Failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Any other fields returned by the service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionOutcome {
    /// A successful outcome with no extra fields.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            extra: Map::new(),
        }
    }

    /// A structured failure.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_suffix() {
        assert_eq!(Endpoint::Messages.suffix(), "");
        assert_eq!(Endpoint::UnreadCount.suffix(), "/unread-count");
        assert_eq!(Endpoint::Delay.suffix(), "/delay");
        assert!(Endpoint::UnreadCount.is_query());
        assert!(!Endpoint::Read.is_query());
    }

    #[test]
    fn test_filter_conversion() {
        assert_eq!(MessageFilter::try_from("unread"), Ok(MessageFilter::Unread));
        assert!(MessageFilter::try_from("all").is_err());
    }

    #[test]
    fn test_query_pairs() {
        assert_eq!(
            MessageQuery::new().to_pairs("u1"),
            vec![("userId", "u1".to_string())]
        );

        let pairs = MessageQuery::new()
            .page(2)
            .page_size(20)
            .unread_only()
            .to_pairs("u1");
        assert_eq!(
            pairs,
            vec![
                ("userId", "u1".to_string()),
                ("page", "2".to_string()),
                ("pageSize", "20".to_string()),
                ("filter", "unread".to_string()),
            ]
        );

        // Page size without a page is not sent
        let pairs = MessageQuery::new().page_size(20).to_pairs("u1");
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_message_page_unread_filter() {
        let response = MessageListResponse {
            messages: vec![
                PushMessage::new("a"),
                PushMessage::new("b").read(),
                PushMessage::new("c"),
            ],
            count: 2,
        };

        let page = MessagePage::from_response(response.clone(), Some(MessageFilter::Unread));
        assert_eq!(page.messages.len(), 3);
        assert_eq!(page.display_messages.len(), 2);
        assert_eq!(page.unread_count, 2);

        let page = MessagePage::from_response(response, None);
        assert_eq!(page.display_messages.len(), 3);
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(DelayRequest {
            send_id: "s1".into(),
            schedule: "tomorrow".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"sendId": "s1", "schedule": "tomorrow"}));

        let body = serde_json::to_value(DeviceRegistration {
            user_id: "u".into(),
            device_id: "d".into(),
            channel: "jpush".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"userId": "u", "deviceId": "d", "channel": "jpush"}));
    }

    #[test]
    fn test_action_outcome_parsing() {
        let outcome: ActionOutcome =
            serde_json::from_value(json!({"success": true, "updated": 1})).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.extra.get("updated"), Some(&json!(1)));

        let outcome: ActionOutcome = serde_json::from_value(json!({})).unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.is_none());
    }
}
