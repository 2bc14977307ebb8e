//! QR scanner lifecycle
//!
//! The view owns a [`ScannerController`] handle and renders the
//! [`ScannerSnapshot`] it publishes. Camera, decoder and approval are
//! reached through the seams in [`camera`] and [`ScanApprover`], so the
//! controller runs the same against a browser bridge, a native camera or
//! the fakes in `crate::testing`.

pub mod camera;
pub mod controller;
pub mod errors;
pub mod payload;
pub mod state;

use async_trait::async_trait;
use atelier_model::{ScanApproval, ScanToken};
use std::fmt;

use crate::errors::ApiResult;

pub use camera::{CameraBackend, DecodeEvent, Decoder, MediaTrack, VideoSurface};
pub use controller::ScannerController;
pub use errors::ScannerError;
pub use payload::parse_scan_payload;
pub use state::{ScannerEvent, ScannerSnapshot, ScannerState};

/// Exchanges a scanned token for the server's verdict.
#[async_trait]
pub trait ScanApprover: Send + Sync + fmt::Debug {
    async fn approve(&self, token: &ScanToken) -> ApiResult<ScanApproval>;
}
