//! Scanner lifecycle controller
//!
//! A single actor task owns the camera handle and processes commands,
//! decoded frames, approval results and retry timers one at a time. Views
//! talk to it through the cloneable [`ScannerController`] handle.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use atelier_config::ScannerConfig;
use atelier_model::{ScanApproval, ScanResult, SessionTokens};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, trace, warn};

use super::ScanApprover;
use super::camera::{CameraBackend, DecodeEvent, Decoder};
use super::errors::ScannerError;
use super::payload::parse_scan_payload;
use super::state::{ScannerEvent, ScannerSnapshot, ScannerState};
use crate::errors::{ApiError, ApiResult};
use crate::notifications::Notifier;
use crate::session::SessionStore;

const COMMAND_BUFFER: usize = 32;
const EVENT_CAPACITY: usize = 64;

enum Command {
    Start(oneshot::Sender<Result<(), ScannerError>>),
    Retry(oneshot::Sender<Result<(), ScannerError>>),
    Teardown(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Results of work the actor spawned. Tagged with the generation that
/// spawned them so superseded work is dropped.
enum Internal {
    ApprovalFinished {
        generation: u64,
        scan: ScanResult,
        result: ApiResult<ScanApproval>,
    },
    RetryDue {
        generation: u64,
    },
}

/// The live decoder and its frame stream. At most one exists.
struct ActiveScan {
    decoder: Box<dyn Decoder>,
    surface_id: String,
    frames: mpsc::Receiver<DecodeEvent>,
}

/// Handle to a running scanner actor.
///
/// Dropping the last handle tears the camera down and stops the actor.
#[derive(Clone)]
pub struct ScannerController {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ScannerSnapshot>,
    events: broadcast::Sender<ScannerEvent>,
}

impl fmt::Debug for ScannerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerController")
            .field("snapshot", &*self.snapshot.borrow())
            .field("stopped", &self.commands.is_closed())
            .finish()
    }
}

impl ScannerController {
    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(
        config: ScannerConfig,
        camera: Arc<dyn CameraBackend>,
        approver: Arc<dyn ScanApprover>,
        session: SessionStore,
        notifier: Notifier,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(ScannerSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let session_rx = session.subscribe();

        let actor = ScannerActor {
            config,
            camera,
            approver,
            session,
            notifier,
            snapshot_tx,
            events: events_tx.clone(),
            internal_tx,
            view: ScannerSnapshot::default(),
            active: None,
            generation: 0,
            pending_start: false,
            last_unrecognized: None,
        };
        tokio::spawn(actor.run(command_rx, internal_rx, session_rx));

        Self {
            commands: command_tx,
            snapshot: snapshot_rx,
            events: events_tx,
        }
    }

    /// Begin scanning. A no-op while a scan is already running.
    pub async fn start(&self) -> Result<(), ScannerError> {
        self.request(Command::Start).await?
    }

    /// Manual retry: full teardown, counters reset, then start.
    pub async fn retry(&self) -> Result<(), ScannerError> {
        self.request(Command::Retry).await?
    }

    /// Release the camera without closing the view.
    pub async fn teardown(&self) -> Result<(), ScannerError> {
        self.request(Command::Teardown).await
    }

    /// Tear down and wait out the close grace period. Resolves once the
    /// camera has been released.
    pub async fn close(&self) -> Result<(), ScannerError> {
        self.request(Command::Close).await
    }

    /// Tear down and stop the actor. Later calls fail with
    /// [`ScannerError::ControllerStopped`].
    pub async fn shutdown(&self) -> Result<(), ScannerError> {
        self.request(Command::Shutdown).await
    }

    pub fn snapshot(&self) -> ScannerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScannerSnapshot> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ScannerEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ScannerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(command(ack_tx))
            .await
            .map_err(|_| ScannerError::ControllerStopped)?;
        ack_rx.await.map_err(|_| ScannerError::ControllerStopped)
    }
}

struct ScannerActor {
    config: ScannerConfig,
    camera: Arc<dyn CameraBackend>,
    approver: Arc<dyn ScanApprover>,
    session: SessionStore,
    notifier: Notifier,
    snapshot_tx: watch::Sender<ScannerSnapshot>,
    events: broadcast::Sender<ScannerEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    view: ScannerSnapshot,
    active: Option<ActiveScan>,
    /// Bumped on every start and teardown.
    generation: u64,
    /// A start refused for lack of a session, replayed on sign-in.
    pending_start: bool,
    last_unrecognized: Option<(String, Instant)>,
}

impl ScannerActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        mut session_rx: watch::Receiver<Option<SessionTokens>>,
    ) {
        info!("[Scanner] Controller started");
        let mut session_open = true;

        loop {
            let scanning = self.view.state == ScannerState::Scanning;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!("[Scanner] All handles dropped");
                        self.teardown().await;
                        break;
                    }
                },
                Some(message) = internal.recv() => self.handle_internal(message).await,
                frame = next_frame(&mut self.active), if scanning => {
                    self.handle_frame(frame).await;
                }
                changed = session_rx.changed(), if session_open => {
                    if changed.is_err() {
                        session_open = false;
                    } else {
                        self.handle_session_change().await;
                    }
                }
            }
        }

        info!("[Scanner] Controller stopped");
    }

    /// Returns `true` when the actor should exit.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(ack) => {
                let result = self.start().await;
                let _ = ack.send(result);
            }
            Command::Retry(ack) => {
                info!("[Scanner] Manual retry requested");
                self.teardown().await;
                self.view.failed_attempts = 0;
                self.view.last_error = None;
                self.last_unrecognized = None;
                self.publish();
                let result = self.start().await;
                let _ = ack.send(result);
            }
            Command::Teardown(ack) => {
                self.teardown().await;
                let _ = ack.send(());
            }
            Command::Close(ack) => {
                self.close().await;
                let _ = ack.send(());
            }
            Command::Shutdown(ack) => {
                self.teardown().await;
                let _ = ack.send(());
                return true;
            }
        }
        false
    }

    async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::ApprovalFinished {
                generation,
                scan,
                result,
            } => {
                if generation != self.generation
                    || self.view.state != ScannerState::Processing
                {
                    debug!("[Scanner] Ignoring approval result from a superseded scan");
                    return;
                }
                self.handle_approval(scan, result).await;
            }
            Internal::RetryDue { generation } => {
                if generation != self.generation || self.view.completed {
                    debug!("[Scanner] Scheduled restart superseded, skipping");
                    return;
                }
                info!("[Scanner] Restarting after failed approval");
                let _ = self.start().await;
            }
        }
    }

    async fn handle_session_change(&mut self) {
        if self.session.is_authenticated() {
            if self.pending_start {
                info!("[Scanner] Session available, running deferred start");
                let _ = self.start().await;
            }
            return;
        }

        let approving = self.view.state == ScannerState::Processing;
        if self.active.is_some() || self.view.state != ScannerState::Idle {
            info!("[Scanner] Session ended, releasing camera");
            self.teardown().await;
        }
        if approving {
            // The in-flight approval is now superseded and its result dropped.
            self.surface_error(ScannerError::ApprovalFailed {
                message: ApiError::SessionExpired.user_message(),
            });
        }
    }

    async fn start(&mut self) -> Result<(), ScannerError> {
        if self.view.state != ScannerState::Idle {
            debug!("[Scanner] Start ignored in state {:?}", self.view.state);
            return Ok(());
        }
        if !self.session.is_authenticated() {
            self.pending_start = true;
            let error = ScannerError::NotAuthenticated;
            self.surface_error(error.clone());
            return Err(error);
        }

        self.pending_start = false;
        if self.active.is_some() {
            self.teardown().await;
        }

        self.generation += 1;
        self.view.state = ScannerState::Starting;
        self.view.completed = false;
        self.view.redirect = None;
        self.publish();

        let step = self.config.teardown_step_timeout();
        if let Err(error) = bounded(step, "permission probe", self.camera.probe_permission()).await
        {
            warn!("[Scanner] Camera unavailable: {}", error);
            self.view.state = ScannerState::Idle;
            self.surface_error(error.clone());
            return Err(error);
        }

        let (frames_tx, frames_rx) = mpsc::channel(self.config.frame_buffer);
        let surface_id = self.config.surface_id.clone();
        let opened = bounded(
            step,
            "decoder start",
            self.camera.open_decoder(&surface_id, frames_tx),
        )
        .await;

        match opened {
            Ok(decoder) => {
                self.active = Some(ActiveScan {
                    decoder,
                    surface_id,
                    frames: frames_rx,
                });
                self.view.state = ScannerState::Scanning;
                self.publish();
                self.emit(ScannerEvent::Started);
                info!("[Scanner] Scanning on surface '{}'", self.config.surface_id);
                Ok(())
            }
            Err(error) => {
                warn!("[Scanner] Decoder failed to start: {}", error);
                // The stream may have been acquired before the failure.
                self.teardown().await;
                self.surface_error(error.clone());
                Err(error)
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<DecodeEvent>) {
        match frame {
            Some(DecodeEvent::Decoded(text)) => self.handle_decoded(text).await,
            Some(DecodeEvent::Failure(reason)) => {
                trace!("[Scanner] Frame without code: {}", reason);
            }
            None => {
                warn!("[Scanner] Decoder stream ended unexpectedly");
                self.teardown().await;
                self.fail_attempt(ScannerError::Camera("camera stream ended".to_string()))
                    .await;
            }
        }
    }

    async fn handle_decoded(&mut self, text: String) {
        match parse_scan_payload(&text) {
            Ok(scan) => {
                debug!("[Scanner] Recognized payload, requesting approval");
                self.view.state = ScannerState::Processing;
                self.publish();
                self.spawn_approval(scan);
            }
            Err(error) => {
                let now = Instant::now();
                let window = self.config.error_debounce();
                let repeated = matches!(
                    &self.last_unrecognized,
                    Some((last, seen_at)) if *last == text && now.duration_since(*seen_at) < window
                );

                // Repeats still count toward the restart threshold; only
                // their message is suppressed.
                self.view.failed_attempts += 1;
                if repeated {
                    trace!("[Scanner] Repeated unrecognized payload, message suppressed");
                    self.publish();
                } else {
                    self.last_unrecognized = Some((text, now));
                    self.surface_error(error);
                }
                if self.view.failed_attempts >= self.config.max_failed_attempts {
                    self.forced_restart().await;
                }
            }
        }
    }

    fn spawn_approval(&self, scan: ScanResult) {
        let approver = self.approver.clone();
        let internal = self.internal_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = approver.approve(&scan.token).await;
            let _ = internal.send(Internal::ApprovalFinished {
                generation,
                scan,
                result,
            });
        });
    }

    async fn handle_approval(&mut self, scan: ScanResult, result: ApiResult<ScanApproval>) {
        let failure = match result {
            Ok(approval) if approval.success => {
                self.complete(scan, approval).await;
                return;
            }
            Ok(approval) => approval
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "The sign-in request was rejected.".to_string()),
            Err(err) => err.user_message(),
        };

        warn!("[Scanner] Approval failed: {}", failure);
        self.teardown().await;
        self.fail_attempt(ScannerError::ApprovalFailed { message: failure })
            .await;
    }

    async fn complete(&mut self, scan: ScanResult, approval: ScanApproval) {
        self.view.state = ScannerState::Closing;
        self.publish();
        self.teardown().await;

        let redirect = approval
            .redirect
            .or(scan.redirect)
            .unwrap_or_else(|| self.config.default_redirect.clone());
        self.view.completed = true;
        self.view.redirect = Some(redirect.clone());
        self.view.failed_attempts = 0;
        self.view.last_error = None;
        self.last_unrecognized = None;
        self.publish();

        self.notifier.success(
            approval
                .message
                .unwrap_or_else(|| "Sign-in approved.".to_string()),
        );
        info!("[Scanner] Approval succeeded, redirecting to {}", redirect);
        self.emit(ScannerEvent::Approved { redirect });
    }

    /// Count a failed attempt after the camera has been released, then
    /// either force a restart or schedule one.
    async fn fail_attempt(&mut self, error: ScannerError) {
        self.view.failed_attempts += 1;
        self.surface_error(error);

        if self.view.failed_attempts >= self.config.max_failed_attempts {
            self.forced_restart().await;
            return;
        }

        let delay = self.config.retry_delay();
        let generation = self.generation;
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal.send(Internal::RetryDue { generation });
        });
        debug!("[Scanner] Restart scheduled in {:?}", delay);
        self.emit(ScannerEvent::RetryScheduled { after: delay });
    }

    async fn forced_restart(&mut self) {
        let attempts = self.view.failed_attempts;
        warn!(
            "[Scanner] {} consecutive failed attempts, forcing a full restart",
            attempts
        );
        self.teardown().await;
        self.view.failed_attempts = 0;
        self.view.forced_restarts += 1;
        self.last_unrecognized = None;
        self.publish();
        self.emit(ScannerEvent::ForcedRestart { attempts });
        let _ = self.start().await;
    }

    async fn close(&mut self) {
        info!("[Scanner] Closing");
        self.pending_start = false;
        self.view.state = ScannerState::Closing;
        self.publish();
        self.teardown().await;
        tokio::time::sleep(self.config.close_grace()).await;
        self.emit(ScannerEvent::Closed);
    }

    /// Release every camera resource. Idempotent; failures are logged and
    /// the controller always ends in `Idle`.
    async fn teardown(&mut self) {
        self.generation += 1;
        let step = self.config.teardown_step_timeout();

        let active = self.active.take();
        if let Some(mut scan) = active {
            if scan.decoder.is_running() {
                if let Err(error) = bounded(step, "decoder stop", scan.decoder.stop()).await {
                    warn!(
                        "[Scanner] Failed to stop decoder on '{}': {}",
                        scan.surface_id, error
                    );
                }
            }
            self.release_surfaces();
            // Discard the decoder and its frame stream last.
            drop(scan);
        } else {
            self.release_surfaces();
        }

        if self.view.state != ScannerState::Idle {
            debug!("[Scanner] Teardown complete");
        }
        self.view.state = ScannerState::Idle;
        self.publish();
        self.emit(ScannerEvent::TornDown);
    }

    fn release_surfaces(&self) {
        for surface in self.camera.surfaces() {
            for track in surface.active_tracks() {
                if let Err(error) = track.stop() {
                    warn!(
                        "[Scanner] Failed to stop track '{}' on '{}': {}",
                        track.label(),
                        surface.id(),
                        error
                    );
                }
            }
            if let Err(error) = surface.detach_stream() {
                warn!(
                    "[Scanner] Failed to detach stream from '{}': {}",
                    surface.id(),
                    error
                );
            }
        }
    }

    fn surface_error(&mut self, error: ScannerError) {
        self.notifier.error(error.user_message());
        self.view.last_error = Some(error.clone());
        self.publish();
        self.emit(ScannerEvent::Error(error));
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.view.clone());
    }

    fn emit(&self, event: ScannerEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

async fn next_frame(active: &mut Option<ActiveScan>) -> Option<DecodeEvent> {
    match active {
        Some(scan) => scan.frames.recv().await,
        None => std::future::pending().await,
    }
}

/// Run a camera step with an upper bound, folding a timeout into the
/// step's error.
async fn bounded<T>(
    limit: std::time::Duration,
    step: &str,
    future: impl Future<Output = Result<T, ScannerError>>,
) -> Result<T, ScannerError> {
    match timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(ScannerError::Camera(format!(
            "{step} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
