//! HTTP service implementation.
//!
//! This module provides the JSON-over-HTTP action service using reqwest.
//! Session cookies set by the service are kept and replayed on later calls.

use async_trait::async_trait;
use courier_protocol::{
    ActionOutcome, ClientConfig, DelayRequest, DeliveredRequest, DeviceRegistration, Endpoint,
    MessageListResponse, MessageQuery, ReadRequest, UnreadCountResponse,
};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::traits::{ActionService, ServiceError};

/// HTTP action service.
#[derive(Debug, Clone)]
pub struct HttpActionService {
    client: Client,
}

impl HttpActionService {
    /// Create a new HTTP service with a cookie-keeping client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ServiceError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ServiceError::Setup(e.to_string()))?;

        Ok(Self { client })
    }

    /// Create a service around an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn url(config: &ClientConfig, endpoint: Endpoint) -> Result<Url, ServiceError> {
        let raw = config.endpoint_url(endpoint);
        Url::parse(&raw).map_err(|e| ServiceError::InvalidAddress(format!("{raw}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        config: &ClientConfig,
        endpoint: Endpoint,
        query: &[(&'static str, String)],
    ) -> Result<T, ServiceError> {
        let url = Self::url(config, endpoint)?;
        debug!(endpoint = %endpoint, url = %url, "Service query");

        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                endpoint,
                reason: e.to_string(),
            })?;

        Self::decode(endpoint, resp).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        config: &ClientConfig,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<T, ServiceError> {
        let url = Self::url(config, endpoint)?;
        debug!(endpoint = %endpoint, url = %url, "Service write");

        let resp = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                endpoint,
                reason: e.to_string(),
            })?;

        Self::decode(endpoint, resp).await
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: Endpoint,
        resp: Response,
    ) -> Result<T, ServiceError> {
        let status = resp.status();
        if !status.is_success() {
            let err = ServiceError::Status {
                endpoint,
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            };
            warn!(error = %err, "Service request rejected");
            return Err(err);
        }

        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::InvalidResponse {
                endpoint,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ActionService for HttpActionService {
    async fn list_messages(
        &self,
        config: &ClientConfig,
        query: &MessageQuery,
    ) -> Result<MessageListResponse, ServiceError> {
        let pairs = query.to_pairs(&config.user_id);
        let list: MessageListResponse = self.get_json(config, Endpoint::Messages, &pairs).await?;
        debug!(messages = list.messages.len(), count = list.count, "Got messages");
        Ok(list)
    }

    async fn unread_count(
        &self,
        config: &ClientConfig,
    ) -> Result<UnreadCountResponse, ServiceError> {
        let pairs = [("userId", config.user_id.clone())];
        self.get_json(config, Endpoint::UnreadCount, &pairs).await
    }

    async fn delivered(
        &self,
        config: &ClientConfig,
        request: &DeliveredRequest,
    ) -> Result<ActionOutcome, ServiceError> {
        self.post_json(config, Endpoint::Delivered, request).await
    }

    async fn read(
        &self,
        config: &ClientConfig,
        request: &ReadRequest,
    ) -> Result<ActionOutcome, ServiceError> {
        self.post_json(config, Endpoint::Read, request).await
    }

    async fn delay(
        &self,
        config: &ClientConfig,
        request: &DelayRequest,
    ) -> Result<ActionOutcome, ServiceError> {
        self.post_json(config, Endpoint::Delay, request).await
    }

    async fn register(
        &self,
        config: &ClientConfig,
        registration: &DeviceRegistration,
    ) -> Result<ActionOutcome, ServiceError> {
        self.post_json(config, Endpoint::Register, registration)
            .await
    }

    async fn unregister(
        &self,
        config: &ClientConfig,
        registration: &DeviceRegistration,
    ) -> Result<ActionOutcome, ServiceError> {
        self.post_json(config, Endpoint::Unregister, registration)
            .await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config_for(server: &mockito::Server) -> ClientConfig {
        ClientConfig::new(server.url(), "/api/messages", "user-1")
    }

    #[tokio::test]
    async fn test_list_messages_sends_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("userId".into(), "user-1".into()),
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("filter".into(), "unread".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "messages": [
                        {"sendId": "a", "isRead": false},
                        {"sendId": 7, "isRead": true}
                    ],
                    "count": 1
                })
                .to_string(),
            )
            .create_async()
            .await;

        let service = HttpActionService::new().unwrap();
        let query = MessageQuery::new().page(2).unread_only();
        let list = service
            .list_messages(&config_for(&server), &query)
            .await
            .unwrap();

        assert_eq!(list.messages.len(), 2);
        assert_eq!(list.count, 1);
        assert_eq!(list.messages[1].send_id, "7");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unread_count_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/messages/unread-count")
            .match_query(Matcher::UrlEncoded("userId".into(), "user-1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"count": 7}).to_string())
            .create_async()
            .await;

        let service = HttpActionService::new().unwrap();
        let count = service.unread_count(&config_for(&server)).await.unwrap();

        assert_eq!(count.count, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unread_count_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/messages/unread-count")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let service = HttpActionService::new().unwrap();
        let err = service
            .unread_count(&config_for(&server))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Status { status: 503, .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_read_posts_send_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/messages/read")
            .match_body(Matcher::Json(json!({"sendId": "abc"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;

        let service = HttpActionService::new().unwrap();
        let outcome = service
            .read(
                &config_for(&server),
                &ReadRequest {
                    send_id: "abc".into(),
                },
            )
            .await
            .unwrap();

        assert!(outcome.success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delay_posts_schedule() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/messages/delay")
            .match_body(Matcher::Json(
                json!({"sendId": "abc", "schedule": "2026-10-19T09:00:00Z"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;

        let service = HttpActionService::new().unwrap();
        let outcome = service
            .delay(
                &config_for(&server),
                &DelayRequest {
                    send_id: "abc".into(),
                    schedule: "2026-10-19T09:00:00Z".into(),
                },
            )
            .await
            .unwrap();

        assert!(outcome.success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_and_unregister_device() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({"userId": "user-1", "deviceId": "dev-1", "channel": "jpush"});
        let register = server
            .mock("POST", "/api/messages/register")
            .match_body(Matcher::Json(body.clone()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;
        let unregister = server
            .mock("POST", "/api/messages/unregister")
            .match_body(Matcher::Json(body))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;

        let service = HttpActionService::new().unwrap();
        let registration = DeviceRegistration {
            user_id: "user-1".into(),
            device_id: "dev-1".into(),
            channel: "jpush".into(),
        };
        let config = config_for(&server);

        assert!(service.register(&config, &registration).await.unwrap().success);
        assert!(service.unregister(&config, &registration).await.unwrap().success);
        register.assert_async().await;
        unregister.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_json_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/messages/delivered")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let service = HttpActionService::new().unwrap();
        let err = service
            .delivered(
                &config_for(&server),
                &DeliveredRequest {
                    push_id: "p-1".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_invalid_service_address() {
        let service = HttpActionService::new().unwrap();
        let config = ClientConfig::new("not a url", "/api", "u");
        let err = service.unread_count(&config).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAddress(_)));
    }
}
