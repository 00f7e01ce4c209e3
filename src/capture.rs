use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbaImage};
use std::future::Future;
use std::io::Cursor;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use crate::error::SnipError;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A lossless grab of the whole visible viewport at display scale.
///
/// Frames are immutable; clones share the same pixels.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    image: Arc<RgbaImage>,
}

impl CaptureFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, SnipError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::new(decoded.to_rgba8()))
    }

    /// Decode the `data:image/png;base64,...` form the capture side answers with.
    pub fn from_data_url(data_url: &str) -> Result<Self, SnipError> {
        let (header, payload) = data_url
            .split_once(',')
            .ok_or_else(|| SnipError::Image("capture payload is not a data URL".to_string()))?;
        if !header.starts_with("data:image/") || !header.ends_with(";base64") {
            return Err(SnipError::Image(format!(
                "unsupported capture payload header '{}'",
                header
            )));
        }
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|err| SnipError::Image(format!("invalid base64 capture payload: {}", err)))?;
        Self::from_png_bytes(&bytes)
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, SnipError> {
        encode_png(&self.image)
    }

    pub fn to_data_url(&self) -> Result<String, SnipError> {
        let bytes = self.to_png_bytes()?;
        Ok(format!("{}{}", PNG_DATA_URL_PREFIX, BASE64.encode(bytes)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, SnipError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

pub type CaptureFuture<'a> = Pin<Box<dyn Future<Output = Result<CaptureFrame, SnipError>> + Send + 'a>>;

/// Grabs the currently visible viewport. Implementations never take a region:
/// cropping happens afterwards on the page side.
pub trait CaptureProvider: Send + Sync {
    fn capture_visible(&self) -> CaptureFuture<'_>;
}

impl<C: CaptureProvider + ?Sized> CaptureProvider for Arc<C> {
    fn capture_visible(&self) -> CaptureFuture<'_> {
        (**self).capture_visible()
    }
}

/// Treats a PNG on disk as the visible viewport.
#[derive(Debug, Clone)]
pub struct FileCaptureProvider {
    path: PathBuf,
}

impl FileCaptureProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureProvider for FileCaptureProvider {
    fn capture_visible(&self) -> CaptureFuture<'_> {
        Box::pin(async move {
            let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
                SnipError::Capture(format!("failed to read {}: {}", self.path.display(), err))
            })?;
            debug!(path = %self.path.display(), bytes = bytes.len(), "loaded capture frame");
            CaptureFrame::from_png_bytes(&bytes)
        })
    }
}
