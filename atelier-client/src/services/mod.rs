//! Typed service facades over [`ApiClient`](crate::infrastructure::ApiClient).
//!
//! Each service is a thin, cloneable adapter: it builds the path, picks the
//! verb and lets the request layer handle auth, routing and decoding.

pub mod auth;
pub mod gallery;
pub mod profile;
pub mod scan;
pub mod wallet;

pub use auth::AuthService;
pub use gallery::GalleryService;
pub use profile::ProfileService;
pub use scan::ScanService;
pub use wallet::WalletService;
