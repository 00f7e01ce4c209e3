//! Messaging between the privileged side (which can capture the screen and
//! inject code into pages) and the page side (overlay, panel, pipeline).

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tracing::{error, info, warn};

use crate::capture::CaptureFrame;
use crate::error::SnipError;

pub mod background;
pub mod local;

pub use background::{BackgroundHandle, ChannelCaptureProvider, spawn_background};
pub use local::{ContentRuntime, LocalPages};

pub type TabId = u64;

/// First delivery plus one retry after re-injection.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    StartSelection,
    CaptureTab,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    TabCaptured {
        #[serde(rename = "dataUrl")]
        data_url: String,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn into_frame(self) -> Result<CaptureFrame, SnipError> {
        match self {
            Response::TabCaptured { data_url } => CaptureFrame::from_data_url(&data_url),
            Response::Error { error } => Err(SnipError::Capture(error)),
        }
    }
}

/// Which page-side components answered after an injection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InjectionProbe {
    pub settings: bool,
    pub recognition: bool,
    pub translation: bool,
    pub panel: bool,
    pub overlay: bool,
    pub orchestrator: bool,
}

impl InjectionProbe {
    pub fn complete() -> Self {
        Self {
            settings: true,
            recognition: true,
            translation: true,
            panel: true,
            overlay: true,
            orchestrator: true,
        }
    }

    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("settings", self.settings),
            ("recognition", self.recognition),
            ("translation", self.translation),
            ("panel", self.panel),
            ("overlay", self.overlay),
            ("orchestrator", self.orchestrator),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
    }
}

pub type DispatchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SnipError>> + Send + 'a>>;

/// Privileged view of the pages it can reach.
///
/// `send` must fail with [`SnipError::NoReceiver`] when the page has no
/// listener yet, so delivery can tell it apart from other failures.
pub trait PageMessenger: Send + Sync {
    fn send(&self, tab: TabId, message: Message) -> DispatchFuture<'_, ()>;
    fn inject(&self, tab: TabId) -> DispatchFuture<'_, ()>;
    fn probe(&self, tab: TabId) -> DispatchFuture<'_, InjectionProbe>;
}

/// Inject the page-side code, then check what came up. Probe problems are
/// only logged.
pub async fn ensure_content<M: PageMessenger + ?Sized>(
    messenger: &M,
    tab: TabId,
) -> Result<(), SnipError> {
    if let Err(err) = messenger.inject(tab).await {
        error!(tab, error = %err, "injection failed");
        return Err(err);
    }
    info!(tab, "injected content modules");
    match messenger.probe(tab).await {
        Ok(probe) => {
            let missing = probe.missing();
            if missing.is_empty() {
                info!(tab, "post-inject probe complete");
            } else {
                warn!(tab, ?missing, "some modules missing after injection");
            }
        }
        Err(err) => warn!(tab, error = %err, "probe failed"),
    }
    Ok(())
}

/// Deliver the begin-selection trigger. A missing receiver causes exactly
/// one re-injection and one more attempt. Returns the attempt that succeeded.
pub async fn deliver_start_selection<M: PageMessenger + ?Sized>(
    messenger: &M,
    tab: TabId,
) -> Result<u32, SnipError> {
    let mut attempt = 1;
    loop {
        info!(tab, attempt, "sending START_SELECTION");
        match messenger.send(tab, Message::StartSelection).await {
            Ok(()) => return Ok(attempt),
            Err(SnipError::NoReceiver) if attempt < MAX_DELIVERY_ATTEMPTS => {
                warn!(tab, "no receiver yet; reinjecting then retrying once");
                ensure_content(messenger, tab).await?;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Keyboard-command entry point: make sure the page side is present, then
/// arm the overlay. Failures are logged with likely causes and returned.
pub async fn trigger_snip<M: PageMessenger + ?Sized>(
    messenger: &M,
    tab: TabId,
    url: Option<&str>,
) -> Result<(), SnipError> {
    info!(tab, "trigger-snip");
    let result = async {
        ensure_content(messenger, tab).await?;
        deliver_start_selection(messenger, tab).await
    }
    .await;
    if let Err(err) = &result {
        warn!(tab, error = %err, "failed to start selection");
        warn!(
            url = url.unwrap_or("unknown"),
            "this can happen on browser-internal pages, the extension store, the PDF viewer, or when permission is missing"
        );
        warn!("ensure the active-tab permission is granted, reload, then retry on a normal https:// page");
    }
    result.map(|_| ())
}
