use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Message, Response, TabId};
use crate::capture::{CaptureFrame, CaptureFuture, CaptureProvider};
use crate::error::SnipError;

const QUEUE_DEPTH: usize = 16;

struct Envelope {
    tab: TabId,
    message: Message,
    reply: oneshot::Sender<Response>,
}

/// Page-side handle to the privileged background service.
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("tab", &self.tab)
            .field("message", &self.message)
            .finish()
    }
}

/// Start the background service. It answers `CaptureTab` asynchronously
/// (the reply channel stays open until the capture resolves) and ignores
/// message types it does not handle.
pub fn spawn_background<C>(capture: C) -> (BackgroundHandle, JoinHandle<()>)
where
    C: CaptureProvider + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Envelope>(QUEUE_DEPTH);
    let capture = Arc::new(capture);
    let task = tokio::spawn(async move {
        info!("background service started");
        while let Some(envelope) = rx.recv().await {
            match envelope.message {
                Message::CaptureTab => {
                    info!(tab = envelope.tab, "CAPTURE_TAB request");
                    let capture = capture.clone();
                    tokio::spawn(async move {
                        let response = capture_response(capture.as_ref(), envelope.tab).await;
                        if envelope.reply.send(response).is_err() {
                            debug!(tab = envelope.tab, "requester went away before capture finished");
                        }
                    });
                }
                other => debug!(?other, "ignoring unsupported message"),
            }
        }
        debug!("background service stopped");
    });
    (BackgroundHandle { tx }, task)
}

async fn capture_response<C: CaptureProvider + ?Sized>(capture: &C, tab: TabId) -> Response {
    let encoded = match capture.capture_visible().await {
        Ok(frame) => frame.to_data_url(),
        Err(err) => Err(err),
    };
    match encoded {
        Ok(data_url) => {
            info!(tab, length = data_url.len(), "captureVisible success");
            Response::TabCaptured { data_url }
        }
        Err(err) => {
            error!(tab, error = %err, "captureVisible failed");
            Response::Error {
                error: capture_message(err),
            }
        }
    }
}

fn capture_message(err: SnipError) -> String {
    match err {
        SnipError::Capture(message) => message,
        other => other.to_string(),
    }
}

impl BackgroundHandle {
    /// Send a message and wait for its reply.
    pub async fn request(&self, tab: TabId, message: Message) -> Result<Response, SnipError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(Envelope {
                tab,
                message,
                reply,
            })
            .await
            .map_err(|_| SnipError::Delivery("background service is not running".to_string()))?;
        answer
            .await
            .map_err(|_| SnipError::Delivery("background service closed the reply channel".to_string()))
    }

    pub async fn capture_tab(&self, tab: TabId) -> Result<CaptureFrame, SnipError> {
        self.request(tab, Message::CaptureTab).await?.into_frame()
    }
}

/// Capture provider used on the page side: asks the background service.
#[derive(Debug, Clone)]
pub struct ChannelCaptureProvider {
    handle: BackgroundHandle,
    tab: TabId,
}

impl ChannelCaptureProvider {
    pub fn new(handle: BackgroundHandle, tab: TabId) -> Self {
        Self { handle, tab }
    }
}

impl CaptureProvider for ChannelCaptureProvider {
    fn capture_visible(&self) -> CaptureFuture<'_> {
        Box::pin(self.handle.capture_tab(self.tab))
    }
}
