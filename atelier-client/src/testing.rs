//! Scripted collaborators for exercising the request layer and the scanner
//! without a network or a camera.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use atelier_model::{ScanApproval, ScanToken, SessionTokens};
use reqwest::StatusCode;
use tokio::sync::mpsc;

use crate::errors::{ApiError, ApiResult};
use crate::infrastructure::{OutboundRequest, RawResponse, TokenRefresher, Transport};
use crate::scanner::{
    CameraBackend, DecodeEvent, Decoder, MediaTrack, ScanApprover, ScannerError, VideoSurface,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

type Handler = dyn Fn(&OutboundRequest) -> RawResponse + Send + Sync;

enum Reply {
    Response(RawResponse),
    NetworkError(String),
}

/// Transport that replays queued replies and records every request.
///
/// When the queue is empty the optional handler answers; without one the
/// request fails as a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    handler: Option<Box<Handler>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("queued", &lock(&self.replies).len())
            .field("sent", &lock(&self.requests).len())
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(
        handler: impl Fn(&OutboundRequest) -> RawResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        }
    }

    pub fn push(&self, response: RawResponse) -> &Self {
        lock(&self.replies).push_back(Reply::Response(response));
        self
    }

    pub fn push_json(&self, status: StatusCode, body: serde_json::Value) -> &Self {
        self.push(RawResponse::json(status, &body))
    }

    pub fn push_status(&self, status: StatusCode) -> &Self {
        self.push(RawResponse::empty(status))
    }

    pub fn push_network_error(&self, message: impl Into<String>) -> &Self {
        lock(&self.replies).push_back(Reply::NetworkError(message.into()));
        self
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// `Authorization` header of each recorded request, in order.
    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        lock(&self.requests)
            .iter()
            .map(|request| request.header("authorization").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> ApiResult<RawResponse> {
        lock(&self.requests).push(request.clone());
        let reply = lock(&self.replies).pop_front();
        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::NetworkError(message)) => Err(ApiError::network(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                message,
            ))),
            None => match &self.handler {
                Some(handler) => Ok(handler(&request)),
                None => Err(ApiError::network(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    format!("no scripted reply for {} {}", request.method, request.url),
                ))),
            },
        }
    }
}

/// Refresher with a fixed outcome and a call counter.
#[derive(Debug)]
pub struct ScriptedRefresher {
    outcome: Option<SessionTokens>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedRefresher {
    pub fn succeeding(tokens: SessionTokens) -> Self {
        Self {
            outcome: Some(tokens),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Hold each refresh for `delay` so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in order.
    pub fn presented(&self) -> Vec<String> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str) -> ApiResult<SessionTokens> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push(refresh_token.to_string());
        pause(self.delay).await;
        self.outcome.clone().ok_or_else(|| ApiError::Status {
            status: StatusCode::UNAUTHORIZED,
            message: "Refresh token expired".to_string(),
        })
    }
}

/// Approver that replays queued verdicts, then approves everything.
#[derive(Debug, Default)]
pub struct ScriptedApprover {
    replies: Mutex<VecDeque<ApiResult<ScanApproval>>>,
    tokens: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedApprover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each verdict for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, reply: ApiResult<ScanApproval>) -> &Self {
        lock(&self.replies).push_back(reply);
        self
    }

    pub fn reject(&self, message: impl Into<String>) -> &Self {
        self.push(Ok(ScanApproval::rejected(message)))
    }

    /// Tokens submitted for approval, in order.
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }
}

#[async_trait]
impl ScanApprover for ScriptedApprover {
    async fn approve(&self, token: &ScanToken) -> ApiResult<ScanApproval> {
        lock(&self.tokens).push(token.as_str().to_string());
        pause(self.delay).await;
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Ok(ScanApproval::approved(None)))
    }
}

#[derive(Debug)]
pub struct FakeTrack {
    label: String,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn stop(&self) -> Result<(), ScannerError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Video surface holding the tracks of the streams attached to it.
#[derive(Debug)]
pub struct FakeSurface {
    id: String,
    tracks: Mutex<Vec<Arc<FakeTrack>>>,
    fail_detach: AtomicBool,
    detaches: AtomicUsize,
}

impl FakeSurface {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tracks: Mutex::new(Vec::new()),
            fail_detach: AtomicBool::new(false),
            detaches: AtomicUsize::new(0),
        }
    }

    fn attach(&self, label: String) {
        lock(&self.tracks).push(Arc::new(FakeTrack {
            label,
            stopped: AtomicBool::new(false),
        }));
    }

    /// Tracks still running on this surface.
    pub fn live_tracks(&self) -> usize {
        lock(&self.tracks)
            .iter()
            .filter(|track| !track.is_stopped())
            .count()
    }

    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

impl VideoSurface for FakeSurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn active_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        lock(&self.tracks)
            .iter()
            .filter(|track| !track.is_stopped())
            .map(|track| track.clone() as Arc<dyn MediaTrack>)
            .collect()
    }

    fn detach_stream(&self) -> Result<(), ScannerError> {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        if self.fail_detach.load(Ordering::SeqCst) {
            return Err(ScannerError::Camera("surface is gone".to_string()));
        }
        lock(&self.tracks).clear();
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CameraCounters {
    probes: AtomicUsize,
    opened: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    stops: AtomicUsize,
}

#[derive(Debug)]
pub struct FakeDecoder {
    running: bool,
    fail_stop: bool,
    latency: Duration,
    counters: Arc<CameraCounters>,
}

#[async_trait]
impl Decoder for FakeDecoder {
    fn is_running(&self) -> bool {
        self.running
    }

    async fn stop(&mut self) -> Result<(), ScannerError> {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        pause(self.latency).await;
        self.running = false;
        if self.fail_stop {
            return Err(ScannerError::Camera("decoder already released".to_string()));
        }
        Ok(())
    }
}

impl Drop for FakeDecoder {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Camera whose frames are injected by the test through [`FakeCamera::emit`].
#[derive(Debug, Clone)]
pub struct FakeCamera {
    surface: Arc<FakeSurface>,
    counters: Arc<CameraCounters>,
    frames: Arc<Mutex<Option<mpsc::Sender<DecodeEvent>>>>,
    deny_permission: Arc<AtomicBool>,
    fail_decoder_stop: Arc<AtomicBool>,
    latency: Duration,
}

impl FakeCamera {
    pub fn new(surface_id: &str) -> Self {
        Self {
            surface: Arc::new(FakeSurface::new(surface_id)),
            counters: Arc::new(CameraCounters::default()),
            frames: Arc::new(Mutex::new(None)),
            deny_permission: Arc::new(AtomicBool::new(false)),
            fail_decoder_stop: Arc::new(AtomicBool::new(false)),
            latency: Duration::ZERO,
        }
    }

    /// Hold the permission probe, decoder start and decoder stop for
    /// `latency` each so commands sent together overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    pub fn fail_decoder_stop(&self, fail: bool) {
        self.fail_decoder_stop.store(fail, Ordering::SeqCst);
    }

    pub fn fail_surface_detach(&self, fail: bool) {
        self.surface.fail_detach.store(fail, Ordering::SeqCst);
    }

    /// Push decoded text to the current decoder. Returns `false` when no
    /// decoder is listening.
    pub async fn emit(&self, text: &str) -> bool {
        let sender = lock(&self.frames).clone();
        match sender {
            Some(sender) => sender
                .send(DecodeEvent::Decoded(text.to_string()))
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Drop the decoder's frame sender, ending its stream.
    pub fn end_stream(&self) {
        lock(&self.frames).take();
    }

    pub fn surface(&self) -> Arc<FakeSurface> {
        self.surface.clone()
    }

    pub fn probe_count(&self) -> usize {
        self.counters.probes.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn decoder_stop_count(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    pub fn live_decoders(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Highest number of decoders alive at the same time.
    pub fn max_live_decoders(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraBackend for FakeCamera {
    async fn probe_permission(&self) -> Result<(), ScannerError> {
        self.counters.probes.fetch_add(1, Ordering::SeqCst);
        pause(self.latency).await;
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(ScannerError::PermissionDenied);
        }
        Ok(())
    }

    async fn open_decoder(
        &self,
        surface_id: &str,
        frames: mpsc::Sender<DecodeEvent>,
    ) -> Result<Box<dyn Decoder>, ScannerError> {
        pause(self.latency).await;
        let opened = self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);

        self.surface.attach(format!("{surface_id}-camera-{opened}"));
        *lock(&self.frames) = Some(frames);

        Ok(Box::new(FakeDecoder {
            running: true,
            fail_stop: self.fail_decoder_stop.load(Ordering::SeqCst),
            latency: self.latency,
            counters: self.counters.clone(),
        }))
    }

    fn surfaces(&self) -> Vec<Arc<dyn VideoSurface>> {
        vec![self.surface.clone() as Arc<dyn VideoSurface>]
    }
}
