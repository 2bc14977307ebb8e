//! Request/session plumbing: transport seam, endpoint routing, the
//! auth-retry stage and the typed API client built on top of them.

pub mod api_client;
pub mod auth_retry;
pub mod routing;
pub mod transport;

pub use api_client::{ApiClient, ApiRequest, ResponseBody};
pub use auth_retry::{AuthRetry, HttpTokenRefresher, TokenRefresher};
pub use transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport};
