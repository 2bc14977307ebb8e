//! Camera-side seams of the scanner.
//!
//! Implementations bridge to whatever actually owns the camera. Errors are
//! reported as [`ScannerError`]; the controller logs teardown failures and
//! never lets them escape.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::errors::ScannerError;

/// Output of a running decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A frame contained a readable code.
    Decoded(String),
    /// A frame was processed without a readable code. High volume and not
    /// an attempt.
    Failure(String),
}

#[async_trait]
pub trait CameraBackend: Send + Sync + fmt::Debug {
    /// Acquire and immediately release a stream to trigger the permission
    /// prompt. Returns [`ScannerError::PermissionDenied`] on refusal.
    async fn probe_permission(&self) -> Result<(), ScannerError>;

    /// Start a decoder rendering into `surface_id`, pushing results into
    /// `frames`. The decoder owns the only sender; dropping it ends the
    /// stream.
    async fn open_decoder(
        &self,
        surface_id: &str,
        frames: mpsc::Sender<DecodeEvent>,
    ) -> Result<Box<dyn Decoder>, ScannerError>;

    /// Every video surface that may hold a camera stream.
    fn surfaces(&self) -> Vec<Arc<dyn VideoSurface>>;
}

#[async_trait]
pub trait Decoder: Send + Sync + fmt::Debug {
    fn is_running(&self) -> bool;

    async fn stop(&mut self) -> Result<(), ScannerError>;
}

pub trait VideoSurface: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn active_tracks(&self) -> Vec<Arc<dyn MediaTrack>>;

    /// Drop the surface's reference to its stream.
    fn detach_stream(&self) -> Result<(), ScannerError>;
}

pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn label(&self) -> String;

    fn stop(&self) -> Result<(), ScannerError>;
}
