use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::capture::CaptureProvider;
use crate::crop::crop;
use crate::error::SnipError;
use crate::geometry::{MIN_DEVICE_PIXELS, Point, Rect};
use crate::page::{Page, RunId};
use crate::recognition::Recognizer;
use crate::settings::{self, LastResult, Settings, SettingsStore};
use crate::translation::{Translate, maybe_translate};

/// Milliseconds spent per stage of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub crop_ms: f64,
    pub ocr_ms: f64,
    pub translate_display_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognized {
    pub text: String,
    pub translated: Option<String>,
}

/// How a run ended. Failures have already been rendered into the page.
#[derive(Debug)]
pub struct RunReport {
    pub run: RunId,
    pub outcome: Result<Recognized, SnipError>,
    /// False when the page moved on before the final render.
    pub displayed: bool,
    pub timings: StageTimings,
}

/// Capture, crop, recognize, maybe translate, render. Every failure ends
/// the run as an error panel.
pub struct Pipeline<C, R, T> {
    capture: C,
    recognizer: R,
    translator: T,
    store: Arc<dyn SettingsStore>,
}

impl<C, R, T> Pipeline<C, R, T>
where
    C: CaptureProvider,
    R: Recognizer,
    T: Translate,
{
    pub fn new(capture: C, recognizer: R, translator: T, store: Arc<dyn SettingsStore>) -> Self {
        Self {
            capture,
            recognizer,
            translator,
            store,
        }
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    pub fn settings(&self) -> Result<Settings, SnipError> {
        settings::load(self.store.as_ref()).map_err(SnipError::Settings)
    }

    pub async fn run(&self, page: &Page, rect: Rect) -> RunReport {
        let run = page.start_run();
        let started = Instant::now();
        let mut timings = StageTimings::default();
        let outcome = self.execute(page, run, rect, started, &mut timings).await;
        timings.total_ms = elapsed_ms(started);

        let displayed = match &outcome {
            Ok(recognized) => {
                info!(
                    crop = timings.crop_ms,
                    ocr = timings.ocr_ms,
                    translate_display = timings.translate_display_ms,
                    total = timings.total_ms,
                    "timing ms"
                );
                recognized.displayed
            }
            Err(err) => {
                error!(error = %err, "error during capture/OCR pipeline");
                page.show_error(run, error_anchor(rect, err), &err.to_string())
            }
        };

        RunReport {
            run,
            outcome: outcome.map(|recognized| recognized.value),
            displayed,
            timings,
        }
    }

    async fn execute(
        &self,
        page: &Page,
        run: RunId,
        rect: Rect,
        started: Instant,
        timings: &mut StageTimings,
    ) -> Result<Displayed, SnipError> {
        let settings = self.settings()?;
        page.apply_theme(settings.ui_theme);
        let dpr = page.dpr();

        info!("requesting tab capture");
        let frame = self.capture.capture_visible().await?;
        info!(width = frame.width(), height = frame.height(), "got full screenshot");
        let region = crop(&frame, rect, dpr)?;
        drop(frame);
        info!(width = region.width(), height = region.height(), "cropped region");

        if !rect.meets_device_minimum(dpr) || !region.meets_device_minimum() {
            return Err(SnipError::Undersized {
                min: MIN_DEVICE_PIXELS as u32,
            });
        }
        let anchor = rect.panel_anchor();
        page.show_processing(run, anchor);
        timings.crop_ms = elapsed_ms(started);

        let ocr_started = Instant::now();
        let text = self.recognizer.recognize(&settings, &region).await?;
        if text.is_empty() {
            return Err(SnipError::EmptyResult);
        }
        info!(length = text.chars().count(), "OCR text length");
        timings.ocr_ms = elapsed_ms(ocr_started);

        let translate_started = Instant::now();
        let translated = maybe_translate(&self.translator, &settings, &text).await;
        if let Some(translated) = &translated {
            info!(length = translated.chars().count(), "translation text length");
        }
        let displayed = page.show_result(
            run,
            anchor,
            &text,
            translated.clone(),
            settings.translation_provider,
        );
        if !displayed {
            info!(run = run.get(), "result ready but panel was closed");
        }

        let last = LastResult::now(text.clone(), translated.clone());
        if let Err(err) = settings::save_last_result(self.store.as_ref(), &last) {
            warn!(error = %format!("{err:#}"), "failed to store last result");
        }
        timings.translate_display_ms = elapsed_ms(translate_started);

        Ok(Displayed {
            value: Recognized { text, translated },
            displayed,
        })
    }
}

struct Displayed {
    value: Recognized,
    displayed: bool,
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Where an error panel for `rect` goes.
pub fn error_anchor(rect: Rect, err: &SnipError) -> Point {
    match err {
        SnipError::Undersized { .. } => rect.panel_anchor(),
        _ => rect.origin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureFrame, CaptureFuture};
    use crate::crop::CroppedRegion;
    use crate::geometry::Size;
    use crate::page::PageContext;
    use crate::recognition::RecognizeFuture;
    use crate::settings::MemorySettingsStore;
    use crate::translation::{TranslateFuture, TranslateMode};
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BlankScreen {
        calls: AtomicUsize,
    }

    impl CaptureProvider for BlankScreen {
        fn capture_visible(&self) -> CaptureFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(CaptureFrame::new(RgbaImage::new(400, 300))) })
        }
    }

    struct FixedText {
        text: &'static str,
        sizes: std::sync::Mutex<Vec<(u32, u32)>>,
    }

    impl Recognizer for FixedText {
        fn recognize<'a>(
            &'a self,
            _settings: &'a Settings,
            region: &'a CroppedRegion,
        ) -> RecognizeFuture<'a> {
            self.sizes
                .lock()
                .unwrap()
                .push((region.width(), region.height()));
            Box::pin(async move { Ok(self.text.to_string()) })
        }
    }

    struct NoTranslator;

    impl Translate for NoTranslator {
        fn translate<'a>(
            &'a self,
            _settings: &'a Settings,
            _text: &'a str,
            _mode: TranslateMode,
        ) -> TranslateFuture<'a> {
            Box::pin(async { Ok(None) })
        }
    }

    fn pipeline(text: &'static str) -> Pipeline<BlankScreen, FixedText, NoTranslator> {
        Pipeline::new(
            BlankScreen {
                calls: AtomicUsize::new(0),
            },
            FixedText {
                text,
                sizes: std::sync::Mutex::new(Vec::new()),
            },
            NoTranslator,
            Arc::new(MemorySettingsStore::new()),
        )
    }

    #[tokio::test]
    async fn crops_at_device_scale_before_recognition() {
        let page = Page::new(PageContext {
            dpr: 2.0,
            viewport: Size::new(200.0, 150.0),
            ..PageContext::default()
        });
        let pipeline = pipeline("hello");
        let report = pipeline.run(&page, Rect::new(10.0, 10.0, 100.0, 50.0)).await;
        assert_eq!(report.outcome.unwrap().text, "hello");
        assert_eq!(*pipeline.recognizer.sizes.lock().unwrap(), vec![(200, 100)]);
        assert_eq!(pipeline.capture.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undersized_error_renders_beside_selection() {
        let page = Page::default();
        let pipeline = pipeline("unused");
        let rect = Rect::new(100.0, 100.0, 40.0, 80.0);
        let report = pipeline.run(&page, rect).await;
        assert!(matches!(report.outcome, Err(SnipError::Undersized { min: 50 })));
        assert!(pipeline.recognizer.sizes.lock().unwrap().is_empty());

        let panel = page.panel().unwrap();
        assert_eq!(panel.error_message(), Some("Selection too small (<50px)"));
        assert_eq!(panel.position(), Point::new(148.0, 100.0));
    }

    #[tokio::test]
    async fn selection_clamped_at_the_frame_edge_is_undersized() {
        let page = Page::new(PageContext {
            viewport: Size::new(400.0, 300.0),
            ..PageContext::default()
        });
        let pipeline = pipeline("unused");
        let report = pipeline.run(&page, Rect::new(380.0, 10.0, 60.0, 60.0)).await;
        assert!(matches!(report.outcome, Err(SnipError::Undersized { min: 50 })));
        assert!(pipeline.recognizer.sizes.lock().unwrap().is_empty());
        assert_eq!(pipeline.capture.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_failures_render_at_selection_origin() {
        let page = Page::default();
        let pipeline = pipeline("");
        let rect = Rect::new(100.0, 100.0, 120.0, 80.0);
        let report = pipeline.run(&page, rect).await;
        assert!(matches!(report.outcome, Err(SnipError::EmptyResult)));
        assert!(report.displayed);
        let panel = page.panel().unwrap();
        assert_eq!(panel.error_message(), Some("Empty OCR result"));
        assert_eq!(panel.position(), error_anchor(rect, &SnipError::EmptyResult));
    }
}
