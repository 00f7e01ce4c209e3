use thiserror::Error;

/// Upper bound (in characters) for provider bodies carried inside errors.
pub const BODY_SNIPPET_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum SnipError {
    #[error("Capture failed: {0}")]
    Capture(String),

    /// The target page has no listener registered yet.
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Selection too small (<{min}px)")]
    Undersized { min: u32 },

    #[error("{0} not configured (endpoint/key required)")]
    NotConfigured(&'static str),

    #[error("invalid {service} endpoint '{url}'")]
    InvalidEndpoint { service: &'static str, url: String },

    #[error("Vision HTTP {status} {body}")]
    RecognitionHttp { status: u16, body: String },

    #[error("Vision request failed: {0}")]
    RecognitionTransport(#[source] reqwest::Error),

    #[error("Vision response is not valid JSON: {0}")]
    RecognitionParse(String),

    #[error("Empty OCR result")]
    EmptyResult,

    #[error("{provider} translation failed: {message}")]
    Translation {
        provider: &'static str,
        message: String,
    },

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error("Settings unavailable: {0:#}")]
    Settings(anyhow::Error),
}

impl SnipError {
    /// True when the user should be pointed at the settings page rather than
    /// told the service is unavailable.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SnipError::NotConfigured(_) | SnipError::InvalidEndpoint { .. } | SnipError::Settings(_)
        )
    }
}

impl From<image::ImageError> for SnipError {
    fn from(err: image::ImageError) -> Self {
        SnipError::Image(err.to_string())
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LIMIT).collect()
}
