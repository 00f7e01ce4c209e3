use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use crate::error::SnipError;
use crate::settings::{Settings, TranslationProviderKind};

mod azure;
mod google;

pub use google::GOOGLE_TRANSLATE_ENDPOINT;

/// Target language for every provider.
pub const TARGET_LANGUAGE: &str = "en";

/// Automatic runs stay quiet about unavailable providers; manual ones warn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateMode {
    Auto,
    Manual,
}

pub type TranslateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<String>, SnipError>> + Send + 'a>>;

/// `Ok(None)` means no translation is available (provider not configured,
/// nothing to translate, empty answer). `Err` is a failed request.
pub trait Translate: Send + Sync {
    fn translate<'a>(
        &'a self,
        settings: &'a Settings,
        text: &'a str,
        mode: TranslateMode,
    ) -> TranslateFuture<'a>;
}

impl<T: Translate + ?Sized> Translate for Arc<T> {
    fn translate<'a>(
        &'a self,
        settings: &'a Settings,
        text: &'a str,
        mode: TranslateMode,
    ) -> TranslateFuture<'a> {
        (**self).translate(settings, text, mode)
    }
}

/// Best-effort translation gated on the auto-translate option. Failures are
/// swallowed so recognized text is always shown.
pub async fn maybe_translate<T: Translate + ?Sized>(
    translator: &T,
    settings: &Settings,
    text: &str,
) -> Option<String> {
    if !settings.auto_translate {
        return None;
    }
    match translator.translate(settings, text, TranslateMode::Auto).await {
        Ok(translated) => translated,
        Err(err) => {
            debug!(error = %err, "auto translation suppressed");
            None
        }
    }
}

/// Always attempts a translation; used for user-triggered requests.
pub async fn force_translate<T: Translate + ?Sized>(
    translator: &T,
    settings: &Settings,
    text: &str,
) -> Result<Option<String>, SnipError> {
    translator
        .translate(settings, text, TranslateMode::Manual)
        .await
}

/// Replace CR/LF runs with a space, collapse runs of two or more whitespace
/// characters into one space, trim.
pub fn collapse_newlines(text: &str) -> String {
    let mut joined = String::with_capacity(text.len());
    let mut in_break = false;
    for ch in text.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_break {
                joined.push(' ');
            }
            in_break = true;
        } else {
            joined.push(ch);
            in_break = false;
        }
    }

    let mut collapsed = String::with_capacity(joined.len());
    let mut run = String::new();
    for ch in joined.chars() {
        if ch.is_whitespace() {
            run.push(ch);
            continue;
        }
        flush_whitespace(&mut collapsed, &mut run);
        collapsed.push(ch);
    }
    flush_whitespace(&mut collapsed, &mut run);
    collapsed.trim().to_string()
}

fn flush_whitespace(out: &mut String, run: &mut String) {
    if run.chars().count() >= 2 {
        out.push(' ');
    } else {
        out.push_str(run);
    }
    run.clear();
}

/// Dispatches to the provider chosen in the settings.
#[derive(Debug, Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
    google_endpoint: String,
}

impl Default for TranslationClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl TranslationClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            google_endpoint: GOOGLE_TRANSLATE_ENDPOINT.to_string(),
        }
    }

    pub fn with_google_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.google_endpoint = endpoint.into();
        self
    }

    async fn perform(
        &self,
        settings: &Settings,
        text: &str,
        mode: TranslateMode,
    ) -> Result<Option<String>, SnipError> {
        let processed = if settings.ignore_newlines {
            collapse_newlines(text)
        } else {
            text.to_string()
        };
        if processed.is_empty() {
            return Ok(None);
        }
        let translated = match settings.translation_provider {
            TranslationProviderKind::Azure => {
                azure::translate(&self.http, settings, &processed, mode).await?
            }
            TranslationProviderKind::Google => {
                google::translate(&self.http, &self.google_endpoint, settings, &processed, mode)
                    .await?
            }
        };
        Ok(translated.filter(|value| !value.is_empty()))
    }
}

impl Translate for TranslationClient {
    fn translate<'a>(
        &'a self,
        settings: &'a Settings,
        text: &'a str,
        mode: TranslateMode,
    ) -> TranslateFuture<'a> {
        Box::pin(self.perform(settings, text, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTranslator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Translate for CountingTranslator {
        fn translate<'a>(
            &'a self,
            _settings: &'a Settings,
            text: &'a str,
            _mode: TranslateMode,
        ) -> TranslateFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(SnipError::Translation {
                        provider: "Azure",
                        message: "HTTP 500".to_string(),
                    })
                } else {
                    Ok(Some(format!("[{}]", text)))
                }
            })
        }
    }

    #[test]
    fn collapse_newlines_matches_form_rules() {
        assert_eq!(collapse_newlines("a\r\n\r\nb"), "a b");
        assert_eq!(collapse_newlines("  line one \n line two  "), "line one line two");
        assert_eq!(collapse_newlines("tab\tkept"), "tab\tkept");
        assert_eq!(collapse_newlines("\n\n"), "");
    }

    #[tokio::test]
    async fn maybe_translate_respects_auto_flag() {
        let translator = CountingTranslator {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let mut settings = Settings::default();
        settings.auto_translate = false;
        assert_eq!(maybe_translate(&translator, &settings, "hi").await, None);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);

        settings.auto_translate = true;
        assert_eq!(
            maybe_translate(&translator, &settings, "hi").await,
            Some("[hi]".to_string())
        );
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_failures_are_suppressed_but_manual_ones_surface() {
        let translator = CountingTranslator {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let settings = Settings::default();
        assert_eq!(maybe_translate(&translator, &settings, "hi").await, None);
        assert!(force_translate(&translator, &settings, "hi").await.is_err());
    }

    #[tokio::test]
    async fn blank_text_never_reaches_a_provider() {
        let client = TranslationClient::default();
        let settings = Settings {
            translate_key: "k".to_string(),
            ..Settings::default()
        };
        let translated = client
            .translate(&settings, "\n \r\n", TranslateMode::Manual)
            .await
            .unwrap();
        assert_eq!(translated, None);
    }
}
