//! Service abstraction traits for Courier.
//!
//! An `ActionService` performs one request/response exchange per call and
//! reports a single terminal outcome. Retries and timeouts belong to the
//! implementation, not to the caller.

use async_trait::async_trait;
use courier_protocol::{
    ActionOutcome, ClientConfig, DelayRequest, DeliveredRequest, DeviceRegistration, Endpoint,
    MessageListResponse, MessageQuery, ReadRequest, UnreadCountResponse,
};
use thiserror::Error;

/// Service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The configured service address cannot be used.
    #[error("Invalid service address: {0}")]
    InvalidAddress(String),

    /// The service client could not be constructed.
    #[error("Service setup failed: {0}")]
    Setup(String),

    /// The request never produced a response.
    #[error("Request to {endpoint} failed: {reason}")]
    Transport {
        /// Endpoint that was called.
        endpoint: Endpoint,
        /// Transport failure description.
        reason: String,
    },

    /// The service answered with a non-success status.
    #[error("{endpoint} failed with err: {status} - {reason}")]
    Status {
        /// Endpoint that was called.
        endpoint: Endpoint,
        /// HTTP status code.
        status: u16,
        /// Status text.
        reason: String,
    },

    /// The response body could not be decoded.
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        /// Endpoint that was called.
        endpoint: Endpoint,
        /// Decoding failure description.
        reason: String,
    },
}

impl ServiceError {
    /// Whether the service itself rejected the request.
    #[must_use]
    pub fn is_status(&self) -> bool {
        matches!(self, ServiceError::Status { .. })
    }

    /// Endpoint the error relates to, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            ServiceError::InvalidAddress(_) | ServiceError::Setup(_) => None,
            ServiceError::Transport { endpoint, .. }
            | ServiceError::Status { endpoint, .. }
            | ServiceError::InvalidResponse { endpoint, .. } => Some(*endpoint),
        }
    }
}

/// A backing service that can execute Courier actions.
///
/// Every call receives the configuration captured by the client's `start`.
#[async_trait]
pub trait ActionService: Send + Sync {
    /// List messages.
    async fn list_messages(
        &self,
        config: &ClientConfig,
        query: &MessageQuery,
    ) -> Result<MessageListResponse, ServiceError>;

    /// Fetch the authoritative unread count.
    async fn unread_count(&self, config: &ClientConfig)
        -> Result<UnreadCountResponse, ServiceError>;

    /// Acknowledge delivery of a push.
    async fn delivered(
        &self,
        config: &ClientConfig,
        request: &DeliveredRequest,
    ) -> Result<ActionOutcome, ServiceError>;

    /// Mark a message read.
    async fn read(
        &self,
        config: &ClientConfig,
        request: &ReadRequest,
    ) -> Result<ActionOutcome, ServiceError>;

    /// Postpone a message.
    async fn delay(
        &self,
        config: &ClientConfig,
        request: &DelayRequest,
    ) -> Result<ActionOutcome, ServiceError>;

    /// Register a device/channel pairing.
    async fn register(
        &self,
        config: &ClientConfig,
        registration: &DeviceRegistration,
    ) -> Result<ActionOutcome, ServiceError>;

    /// Remove a device/channel pairing.
    async fn unregister(
        &self,
        config: &ClientConfig,
        registration: &DeviceRegistration,
    ) -> Result<ActionOutcome, ServiceError>;

    /// Get the service name (e.g., "http").
    fn name(&self) -> &'static str;
}
