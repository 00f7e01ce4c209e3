use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

use crate::crop::CroppedRegion;
use crate::error::{SnipError, truncate_body};
use crate::settings::Settings;

pub mod shapes;

const SERVICE_NAME: &str = "Azure Vision";
const ANALYZE_PATH: &str = "computervision/imageanalysis:analyze";
const API_VERSION: &str = "2024-02-01";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Min/max extent of a line's quadrilateral, in cropped-image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl LineBounds {
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut points = points.into_iter();
        let (x, y) = points.next()?;
        let mut bounds = LineBounds {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        };
        for (x, y) in points {
            bounds.min_x = bounds.min_x.min(x);
            bounds.max_x = bounds.max_x.max(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_y = bounds.max_y.max(y);
        }
        Some(bounds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub bounds: Option<LineBounds>,
}

/// How provider-ordered lines are folded into one text blob.
///
/// `Reversed` is tuned to the vision service, which emits the bottom line
/// first for the crops we send; other providers may want `Provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineOrder {
    #[default]
    Reversed,
    Provider,
}

impl LineOrder {
    /// Trim every line, drop empties, join with `\n`.
    pub fn join(&self, lines: &[OcrLine]) -> String {
        let texts = lines.iter().map(|line| line.text.trim());
        let kept: Vec<&str> = match self {
            LineOrder::Reversed => texts.rev().filter(|text| !text.is_empty()).collect(),
            LineOrder::Provider => texts.filter(|text| !text.is_empty()).collect(),
        };
        kept.join("\n")
    }
}

pub type RecognizeFuture<'a> = Pin<Box<dyn Future<Output = Result<String, SnipError>> + Send + 'a>>;

/// Turns a cropped region into text. An empty string means nothing was read.
pub trait Recognizer: Send + Sync {
    fn recognize<'a>(&'a self, settings: &'a Settings, region: &'a CroppedRegion)
    -> RecognizeFuture<'a>;
}

impl<R: Recognizer + ?Sized> Recognizer for Arc<R> {
    fn recognize<'a>(
        &'a self,
        settings: &'a Settings,
        region: &'a CroppedRegion,
    ) -> RecognizeFuture<'a> {
        (**self).recognize(settings, region)
    }
}

/// Client for the image-analysis `read` feature.
#[derive(Debug, Clone, Default)]
pub struct VisionClient {
    http: reqwest::Client,
    order: LineOrder,
}

impl VisionClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            order: LineOrder::default(),
        }
    }

    pub fn with_line_order(mut self, order: LineOrder) -> Self {
        self.order = order;
        self
    }

    pub async fn recognize_png(&self, settings: &Settings, png: Vec<u8>) -> Result<String, SnipError> {
        if !settings.vision_configured() {
            return Err(SnipError::NotConfigured(SERVICE_NAME));
        }
        let url = analyze_url(&settings.vision_endpoint, &settings.vision_model_version)?;
        info!(bytes = png.len(), "sending vision read request");
        let response = self
            .http
            .post(url)
            .header(SUBSCRIPTION_KEY_HEADER, settings.vision_key.trim())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(png)
            .send()
            .await
            .map_err(SnipError::RecognitionTransport)?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SnipError::RecognitionHttp {
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }
        let payload: Value = serde_json::from_str(&text)
            .map_err(|err| SnipError::RecognitionParse(err.to_string()))?;
        Ok(self.text_from_payload(&payload))
    }

    pub fn text_from_payload(&self, payload: &Value) -> String {
        match shapes::extract_lines(payload) {
            Some((shape, lines)) => {
                debug!(shape, lines = lines.len(), "parsed vision lines");
                self.order.join(&lines)
            }
            None => String::new(),
        }
    }
}

impl Recognizer for VisionClient {
    fn recognize<'a>(
        &'a self,
        settings: &'a Settings,
        region: &'a CroppedRegion,
    ) -> RecognizeFuture<'a> {
        Box::pin(async move {
            let png = region.to_png_bytes()?;
            self.recognize_png(settings, png).await
        })
    }
}

pub(crate) fn analyze_url(endpoint: &str, model_version: &str) -> Result<Url, SnipError> {
    let base = endpoint.trim().trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/{}", base, ANALYZE_PATH)).map_err(|_| {
        SnipError::InvalidEndpoint {
            service: SERVICE_NAME,
            url: endpoint.to_string(),
        }
    })?;
    url.query_pairs_mut()
        .append_pair("api-version", API_VERSION)
        .append_pair("features", "read")
        .append_pair("model-version", model_version.trim());
    Ok(url)
}
