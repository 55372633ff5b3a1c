//! Client configuration.
//!
//! The configuration handed to `start` is both the addressing information for
//! the backing service and the configuration every channel receives.

use serde::{Deserialize, Serialize};

use crate::actions::Endpoint;

/// Configuration recognized by `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base address of the backing service, e.g. `https://push.example.com`.
    pub service_address: String,
    /// Path of the message resource, e.g. `/api/messages`.
    #[serde(default = "default_path")]
    pub path: String,
    /// Identity of the caller.
    pub user_id: String,
}

fn default_path() -> String {
    "/messages".to_string()
}

impl ClientConfig {
    /// Create a configuration.
    #[must_use]
    pub fn new(
        service_address: impl Into<String>,
        path: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            service_address: service_address.into(),
            path: path.into(),
            user_id: user_id.into(),
        }
    }

    /// Full URL of an endpoint, without query string.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!(
            "{}{}{}",
            self.service_address.trim_end_matches('/'),
            self.path,
            endpoint.suffix()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let config = ClientConfig::new("https://push.example.com/", "/api/messages", "u1");
        assert_eq!(
            config.endpoint_url(Endpoint::Messages),
            "https://push.example.com/api/messages"
        );
        assert_eq!(
            config.endpoint_url(Endpoint::UnreadCount),
            "https://push.example.com/api/messages/unread-count"
        );
    }

    #[test]
    fn test_config_defaults_path() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"service_address": "http://localhost:3000", "user_id": "u1"}"#,
        )
        .unwrap();
        assert_eq!(config.path, "/messages");
    }
}
