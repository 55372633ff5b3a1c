//! # courier-service
//!
//! Action abstraction for the backing message service.
//!
//! The client core never talks to the network itself. It calls an
//! `ActionService` and feeds the results into its unread counter:
//!
//! - **HTTP** - JSON over HTTP with reqwest (default feature `http`)
//!
//! ```rust,ignore
//! use tenvis_courier_service::{ActionService, HttpActionService};
//!
//! let service = HttpActionService::new()?;
//! let unread = service.unread_count(&config).await?;
//! ```

pub mod traits;

#[cfg(feature = "http")]
pub mod http;

pub use traits::{ActionService, ServiceError};

#[cfg(feature = "http")]
pub use http::HttpActionService;
