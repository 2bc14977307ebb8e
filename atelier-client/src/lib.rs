//! Atelier client library
//!
//! Request/session plumbing, service facades and the QR scanner lifecycle
//! used by the Atelier front ends.
//!
//! Notes
//! - [`session::SessionStore`] is the single source of truth for tokens; it
//!   is shared by the request layer and the scanner.
//! - Every network call goes through [`infrastructure::ApiClient`], which
//!   routes by path prefix and retries a 401 once after refreshing.
//! - The `testing` feature exposes scripted transports, refreshers, cameras
//!   and approvers for integration tests.

pub mod api_routes;
pub mod errors;
pub mod infrastructure;
pub mod notifications;
pub mod scanner;
pub mod security;
pub mod services;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::{ApiError, ApiResult};
pub use infrastructure::{ApiClient, ApiRequest, ResponseBody};
pub use notifications::{Notification, NotificationLevel, Notifier};
pub use scanner::{ScannerController, ScannerError, ScannerEvent, ScannerSnapshot, ScannerState};
pub use session::SessionStore;
