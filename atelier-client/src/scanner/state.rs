use std::time::Duration;

use super::errors::ScannerError;

/// Lifecycle phase of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScannerState {
    #[default]
    Idle,
    /// Permission probe and decoder start in progress.
    Starting,
    Scanning,
    /// A recognized token is awaiting approval.
    Processing,
    Closing,
}

/// Everything a view needs to render the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScannerSnapshot {
    pub state: ScannerState,
    /// Consecutive unrecognized or rejected attempts since the last
    /// success, reset or forced restart.
    pub failed_attempts: u32,
    pub last_error: Option<ScannerError>,
    /// Set once an approval succeeded; cleared by the next start.
    pub completed: bool,
    /// Where the view should navigate after a successful approval.
    pub redirect: Option<String>,
    pub forced_restarts: u32,
}

impl ScannerSnapshot {
    pub fn is_scanning(&self) -> bool {
        self.state == ScannerState::Scanning
    }

    pub fn is_processing(&self) -> bool {
        self.state == ScannerState::Processing
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            ScannerState::Starting | ScannerState::Processing | ScannerState::Closing
        )
    }
}

/// Discrete happenings, broadcast alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerEvent {
    Started,
    Error(ScannerError),
    Approved { redirect: String },
    RetryScheduled { after: Duration },
    ForcedRestart { attempts: u32 },
    TornDown,
    Closed,
}
