use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{TARGET_LANGUAGE, TranslateMode};
use crate::error::{SnipError, truncate_body};
use crate::settings::Settings;

pub const GOOGLE_TRANSLATE_ENDPOINT: &str =
    "https://translation.googleapis.com/language/translate/v2";

const PROVIDER: &str = "Google";

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: Option<String>,
}

pub(super) async fn translate(
    http: &reqwest::Client,
    endpoint: &str,
    settings: &Settings,
    text: &str,
    mode: TranslateMode,
) -> Result<Option<String>, SnipError> {
    let key = settings.google_translate_key.trim();
    if key.is_empty() {
        if mode == TranslateMode::Manual {
            warn!("Google translation not configured");
        }
        return Ok(None);
    }
    let url = Url::parse_with_params(endpoint, &[("key", key)]).map_err(|_| {
        SnipError::InvalidEndpoint {
            service: "Google Translate",
            url: endpoint.to_string(),
        }
    })?;

    info!("performing Google translation request");
    let response = http
        .post(url)
        .json(&TranslateRequest {
            q: text,
            target: TARGET_LANGUAGE,
            format: "text",
        })
        .send()
        .await
        .map_err(|err| SnipError::Translation {
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

fn extract_translation(body: &str) -> Option<String> {
    let parsed: TranslateResponse = serde_json::from_str(body).ok()?;
    parsed
        .data?
        .translations
        .into_iter()
        .next()?
        .translated_text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::serve;
    use axum::Router;
    use axum::http::{StatusCode, Uri};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    fn configured() -> Settings {
        Settings {
            google_translate_key: "g-key".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn extracts_translated_text() {
        let body = r#"{"data":{"translations":[{"translatedText":"Hello","detectedSourceLanguage":"fr"}]}}"#;
        assert_eq!(extract_translation(body), Some("Hello".to_string()));
        assert_eq!(extract_translation(r#"{"data":{"translations":[]}}"#), None);
        assert_eq!(extract_translation("not json"), None);
    }

    #[tokio::test]
    async fn posts_query_with_key_parameter() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::new(Mutex::new(None));
        let app = Router::new().fallback({
            let seen = seen.clone();
            move |uri: Uri, axum::Json(body): axum::Json<Value>| {
                let seen = seen.clone();
                async move {
                    *seen.lock().unwrap() = Some((uri.to_string(), body));
                    axum::Json(json!({"data": {"translations": [{"translatedText": "Good evening"}]}}))
                }
            }
        });
        let base = serve(app).await;

        let translated = translate(
            &reqwest::Client::new(),
            &format!("{}/language/translate/v2", base),
            &configured(),
            "Bonsoir",
            TranslateMode::Manual,
        )
        .await
        .unwrap();
        assert_eq!(translated.as_deref(), Some("Good evening"));

        let (uri, body) = seen.lock().unwrap().take().expect("request recorded");
        assert_eq!(uri, "/language/translate/v2?key=g-key");
        insta::assert_json_snapshot!(body, @r#"
        {
          "format": "text",
          "q": "Bonsoir",
          "target": "en"
        }
        "#);
    }

    #[tokio::test]
    async fn missing_key_yields_none() {
        let translated = translate(
            &reqwest::Client::new(),
            GOOGLE_TRANSLATE_ENDPOINT,
            &Settings::default(),
            "text",
            TranslateMode::Auto,
        )
        .await
        .unwrap();
        assert_eq!(translated, None);
    }

    #[tokio::test]
    async fn error_status_is_reported_as_failure() {
        let app = Router::new().fallback(|| async { (StatusCode::BAD_REQUEST, "API key not valid") });
        let base = serve(app).await;
        let err = translate(
            &reqwest::Client::new(),
            &base,
            &configured(),
            "text",
            TranslateMode::Manual,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SnipError::Translation { provider: "Google", .. }));
    }
}
