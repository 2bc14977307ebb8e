//! Camera backend that treats each stdin line as a decoded frame.
//!
//! Lets the scanner controller be driven from a terminal or a pipe (for
//! example the output of `zbarimg --raw`).

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use atelier_client::scanner::{
    CameraBackend, DecodeEvent, Decoder, ScannerError, VideoSurface,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Notify, mpsc};
use tracing::debug;

type FrameSlot = Arc<Mutex<Option<mpsc::Sender<DecodeEvent>>>>;

#[derive(Debug)]
pub struct StdinCamera {
    current: FrameSlot,
    closed: Arc<Notify>,
}

impl StdinCamera {
    /// Start the shared stdin reader. Lines read while no decoder is
    /// attached are dropped.
    pub fn spawn() -> Self {
        let current: FrameSlot = Arc::new(Mutex::new(None));
        let closed = Arc::new(Notify::new());

        let slot = current.clone();
        let notify = closed.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                let sender = slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                match sender {
                    Some(sender) => {
                        let _ = sender.send(DecodeEvent::Decoded(text.to_string())).await;
                    }
                    None => debug!("[StdinCamera] No decoder attached, dropping line"),
                }
            }
            notify.notify_one();
        });

        Self { current, closed }
    }

    /// Resolves once stdin reaches end of input.
    pub async fn input_closed(&self) {
        self.closed.notified().await;
    }
}

#[async_trait]
impl CameraBackend for StdinCamera {
    async fn probe_permission(&self) -> Result<(), ScannerError> {
        Ok(())
    }

    async fn open_decoder(
        &self,
        _surface_id: &str,
        frames: mpsc::Sender<DecodeEvent>,
    ) -> Result<Box<dyn Decoder>, ScannerError> {
        *self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(frames);
        Ok(Box::new(StdinDecoder {
            slot: self.current.clone(),
            running: true,
        }))
    }

    fn surfaces(&self) -> Vec<Arc<dyn VideoSurface>> {
        Vec::new()
    }
}

#[derive(Debug)]
struct StdinDecoder {
    slot: FrameSlot,
    running: bool,
}

#[async_trait]
impl Decoder for StdinDecoder {
    fn is_running(&self) -> bool {
        self.running
    }

    async fn stop(&mut self) -> Result<(), ScannerError> {
        self.running = false;
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
