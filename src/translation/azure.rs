use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::TranslateMode;
use crate::error::{SnipError, truncate_body};
use crate::settings::Settings;

const PROVIDER: &str = "Azure";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const SUBSCRIPTION_REGION_HEADER: &str = "Ocp-Apim-Subscription-Region";

#[derive(Debug, Serialize)]
struct RequestItem<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponseItem {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: Option<String>,
}

pub(super) async fn translate(
    http: &reqwest::Client,
    settings: &Settings,
    text: &str,
    mode: TranslateMode,
) -> Result<Option<String>, SnipError> {
    let key = settings.translate_key.trim();
    let endpoint = settings.translate_endpoint.trim();
    if key.is_empty() || endpoint.is_empty() {
        if mode == TranslateMode::Manual {
            warn!("Azure translation not configured");
        }
        return Ok(None);
    }

    info!("performing Azure translation request");
    let mut request = http
        .post(endpoint)
        .header(CONTENT_TYPE, "application/json; charset=UTF-8")
        .header(SUBSCRIPTION_KEY_HEADER, key)
        .json(&[RequestItem { text }]);
    let region = settings.translate_region.trim();
    if !region.is_empty() {
        request = request.header(SUBSCRIPTION_REGION_HEADER, region);
    }

    let response = request.send().await.map_err(|err| SnipError::Translation {
        provider: PROVIDER,
        message: err.to_string(),
    })?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(SnipError::Translation {
            provider: PROVIDER,
            message: format!("HTTP {} {}", status.as_u16(), truncate_body(&body)),
        });
    }
    Ok(extract_translation(&body))
}

/// `[0].translations[0].text`
fn extract_translation(body: &str) -> Option<String> {
    let items: Vec<ResponseItem> = serde_json::from_str(body).ok()?;
    items
        .into_iter()
        .next()?
        .translations
        .into_iter()
        .next()?
        .text
}
