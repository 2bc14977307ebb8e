use thiserror::Error;

/// Failures surfaced by the scanner controller.
///
/// Cloneable so the same value can sit in the published snapshot and go
/// out as an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScannerError {
    #[error("camera permission denied")]
    PermissionDenied,

    /// Decoded text matched no known payload format.
    #[error("unrecognized QR payload")]
    Unrecognized { raw: String },

    #[error("approval failed: {message}")]
    ApprovalFailed { message: String },

    #[error("not signed in")]
    NotAuthenticated,

    #[error("camera error: {0}")]
    Camera(String),

    #[error("scanner controller has stopped")]
    ControllerStopped,
}

impl ScannerError {
    pub fn user_message(&self) -> String {
        match self {
            ScannerError::PermissionDenied => {
                "Camera access was denied. Allow camera access to scan.".to_string()
            }
            ScannerError::Unrecognized { .. } => {
                "This QR code is not a valid sign-in code.".to_string()
            }
            ScannerError::ApprovalFailed { message } => message.clone(),
            ScannerError::NotAuthenticated => "Sign in before scanning a QR code.".to_string(),
            ScannerError::Camera(_) => "The camera could not be started.".to_string(),
            ScannerError::ControllerStopped => "The scanner is no longer running.".to_string(),
        }
    }
}
