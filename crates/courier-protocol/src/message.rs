//! Message model.
//!
//! A `PushMessage` is opaque to Courier apart from two fields: the `sendId`
//! used for deduplication and the `isRead` flag. Everything else is carried
//! through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// Delivery identifier shared by every copy of one logical message.
pub type SendId = String;

/// Accept a `sendId` sent either as a string or as a JSON number.
fn deserialize_send_id<'de, D>(deserializer: D) -> Result<SendId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSendId {
        Text(String),
        Number(Number),
    }

    Ok(match RawSendId::deserialize(deserializer)? {
        RawSendId::Text(id) => id,
        RawSendId::Number(id) => id.to_string(),
    })
}

/// A message delivered by a channel or listed by the backing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Delivery identifier. Numeric ids are kept in their decimal form.
    #[serde(deserialize_with = "deserialize_send_id")]
    pub send_id: SendId,
    /// Whether the message has been read.
    #[serde(default)]
    pub is_read: bool,
    /// Application payload.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl PushMessage {
    /// Create an unread message with an empty payload.
    #[must_use]
    pub fn new(send_id: impl Into<SendId>) -> Self {
        Self {
            send_id: send_id.into(),
            is_read: false,
            payload: Map::new(),
        }
    }

    /// Mark the message as read.
    #[must_use]
    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }

    /// Attach an application payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Look up an application payload field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
