use reqwest::Url;
use std::fmt;

use crate::error::SnipError;
use crate::geometry::{Point, Size, Viewport, clamp_panel_position};
use crate::settings::{Theme, TranslationProviderKind};
use crate::translation::TARGET_LANGUAGE;

pub const PANEL_TITLE: &str = "OCR Result";
pub const TRANSLATION_HEADER: &str = "Translation";
pub const PROCESSING_MESSAGE: &str = "Processing OCR...";
const EXTERNAL_TRANSLATE_BASE: &str = "https://translate.google.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslateButton {
    #[default]
    Ready,
    Translating,
    NoTranslation,
    Failed,
}

impl TranslateButton {
    pub fn label(&self) -> &'static str {
        match self {
            TranslateButton::Ready => "Translate",
            TranslateButton::Translating => "Translating...",
            TranslateButton::NoTranslation => "No translation",
            TranslateButton::Failed => "Error",
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != TranslateButton::Translating
    }
}

/// Last translated source and what it produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TranslationMemo {
    source: String,
    translated: Option<String>,
}

impl TranslationMemo {
    fn lookup(&self, text: &str) -> Option<&str> {
        if self.source == text {
            self.translated.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSection {
    original: String,
    text: String,
    translation: String,
    provider: TranslationProviderKind,
    button: TranslateButton,
    memo: TranslationMemo,
}

impl ResultSection {
    /// Recognized text as it came back from the provider.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Currently displayed (possibly edited) text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Translation body; empty when there is none.
    pub fn translation(&self) -> &str {
        &self.translation
    }

    pub fn provider(&self) -> TranslationProviderKind {
        self.provider
    }

    pub fn button(&self) -> TranslateButton {
        self.button
    }

    /// e.g. "Translation (Azure)"
    pub fn translation_header(&self) -> String {
        format!("{} ({})", TRANSLATION_HEADER, self.provider.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelBody {
    Processing,
    Error(String),
    Result(ResultSection),
}

/// What a translate click should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateStep {
    /// The displayed text was already translated; the cached value is shown.
    Reused(String),
    /// Send this text to the translator, then call `finish_translate`.
    Request(String),
    /// A request is already in flight.
    Busy,
    /// The panel is not showing a result.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragGrip {
    offset: Point,
}

/// Floating panel showing one run's progress or outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPanel {
    position: Point,
    size: Size,
    viewport: Viewport,
    theme: Theme,
    body: PanelBody,
    drag: Option<DragGrip>,
}

impl ResultPanel {
    fn new(position: Point, size: Size, viewport: Viewport, body: PanelBody) -> Self {
        Self {
            position: clamp_panel_position(position, size, viewport),
            size,
            viewport,
            theme: Theme::Light,
            body,
            drag: None,
        }
    }

    pub fn processing(position: Point, size: Size, viewport: Viewport) -> Self {
        Self::new(position, size, viewport, PanelBody::Processing)
    }

    pub fn error(position: Point, size: Size, viewport: Viewport, message: impl Into<String>) -> Self {
        Self::new(position, size, viewport, PanelBody::Error(message.into()))
    }

    /// A result panel. A translation obtained during the run seeds the memo so
    /// an unchanged text is not sent again.
    pub fn result(
        position: Point,
        size: Size,
        viewport: Viewport,
        text: impl Into<String>,
        translation: Option<String>,
        provider: TranslationProviderKind,
    ) -> Self {
        let text = text.into();
        let section = ResultSection {
            original: text.clone(),
            text: text.clone(),
            translation: translation.clone().unwrap_or_default(),
            provider,
            button: TranslateButton::Ready,
            memo: TranslationMemo {
                source: text,
                translated: translation,
            },
        };
        Self::new(position, size, viewport, PanelBody::Result(section))
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn body(&self) -> &PanelBody {
        &self.body
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, PanelBody::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            PanelBody::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn result_section(&self) -> Option<&ResultSection> {
        match &self.body {
            PanelBody::Result(section) => Some(section),
            _ => None,
        }
    }

    fn result_section_mut(&mut self) -> Option<&mut ResultSection> {
        match &mut self.body {
            PanelBody::Result(section) => Some(section),
            _ => None,
        }
    }

    /// Replace the editable text. Returns false when the panel has no text region.
    pub fn edit_text(&mut self, text: impl Into<String>) -> bool {
        match self.result_section_mut() {
            Some(section) => {
                section.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn begin_translate(&mut self) -> TranslateStep {
        let Some(section) = self.result_section_mut() else {
            return TranslateStep::Unavailable;
        };
        if section.button == TranslateButton::Translating {
            return TranslateStep::Busy;
        }
        if let Some(cached) = section.memo.lookup(&section.text) {
            let cached = cached.to_string();
            section.translation = cached.clone();
            return TranslateStep::Reused(cached);
        }
        section.button = TranslateButton::Translating;
        TranslateStep::Request(section.text.clone())
    }

    /// Apply the answer for `source`. Failures leave the memo untouched.
    pub fn finish_translate(
        &mut self,
        source: &str,
        outcome: Result<Option<String>, SnipError>,
    ) -> TranslateButton {
        let Some(section) = self.result_section_mut() else {
            return TranslateButton::Ready;
        };
        section.button = match outcome {
            Ok(translated) => {
                section.translation = translated.clone().unwrap_or_default();
                let button = if translated.is_some() {
                    TranslateButton::Ready
                } else {
                    TranslateButton::NoTranslation
                };
                section.memo = TranslationMemo {
                    source: source.to_string(),
                    translated,
                };
                button
            }
            Err(_) => TranslateButton::Failed,
        };
        section.button
    }

    /// Deep link into the public translation site for the recognized text.
    pub fn external_link(&self) -> Option<Url> {
        let section = self.result_section()?;
        Url::parse_with_params(
            EXTERNAL_TRANSLATE_BASE,
            &[
                ("sl", "auto"),
                ("tl", TARGET_LANGUAGE),
                ("text", section.original.as_str()),
                ("op", "translate"),
            ],
        )
        .ok()
    }

    pub fn begin_drag(&mut self, pointer: Point) {
        self.drag = Some(DragGrip {
            offset: Point::new(pointer.x - self.position.x, pointer.y - self.position.y),
        });
    }

    /// Follow the pointer, clamped to the viewport. `None` when no drag is active.
    pub fn drag_to(&mut self, pointer: Point) -> Option<Point> {
        let grip = self.drag?;
        let target = Point::new(pointer.x - grip.offset.x, pointer.y - grip.offset.y);
        self.position = clamp_panel_position(target, self.size, self.viewport);
        Some(self.position)
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Re-clamp after the viewport changed.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.position = clamp_panel_position(self.position, self.size, viewport);
    }
}

impl fmt::Display for ResultPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            PanelBody::Processing => write!(f, "{}\n{}", PANEL_TITLE, PROCESSING_MESSAGE),
            PanelBody::Error(message) => write!(f, "{} [Error]\n{}", PANEL_TITLE, message),
            PanelBody::Result(section) => {
                writeln!(f, "{} [OCR]", PANEL_TITLE)?;
                writeln!(f, "{}", section.text)?;
                writeln!(f)?;
                writeln!(f, "{}", section.translation_header())?;
                if section.translation.is_empty() {
                    write!(f, "-")
                } else {
                    write!(f, "{}", section.translation)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: Size = Size {
        width: 300.0,
        height: 200.0,
    };
    const VIEWPORT: Viewport = Size {
        width: 1000.0,
        height: 800.0,
    };

    fn result_panel(translation: Option<&str>) -> ResultPanel {
        ResultPanel::result(
            Point::new(100.0, 100.0),
            SIZE,
            VIEWPORT,
            "Bonjour",
            translation.map(str::to_string),
            TranslationProviderKind::Google,
        )
    }

    #[test]
    fn button_labels() {
        let labels: Vec<_> = [
            TranslateButton::Ready,
            TranslateButton::Translating,
            TranslateButton::NoTranslation,
            TranslateButton::Failed,
        ]
        .iter()
        .map(TranslateButton::label)
        .collect();
        assert_eq!(labels, ["Translate", "Translating...", "No translation", "Error"]);
        assert!(!TranslateButton::Translating.is_enabled());
    }

    #[test]
    fn auto_translation_seeds_the_memo() {
        let mut panel = result_panel(Some("Hello"));
        assert_eq!(panel.begin_translate(), TranslateStep::Reused("Hello".to_string()));
    }

    #[test]
    fn memo_is_keyed_on_exact_text() {
        let mut panel = result_panel(None);
        assert_eq!(panel.begin_translate(), TranslateStep::Request("Bonjour".to_string()));
        assert_eq!(panel.begin_translate(), TranslateStep::Busy);
        assert_eq!(
            panel.finish_translate("Bonjour", Ok(Some("Hello".to_string()))),
            TranslateButton::Ready
        );
        assert_eq!(panel.begin_translate(), TranslateStep::Reused("Hello".to_string()));

        assert!(panel.edit_text("Bonjour "));
        assert_eq!(panel.begin_translate(), TranslateStep::Request("Bonjour ".to_string()));
    }

    #[test]
    fn missing_and_failed_translations_are_not_cached() {
        let mut panel = result_panel(None);
        panel.begin_translate();
        assert_eq!(panel.finish_translate("Bonjour", Ok(None)), TranslateButton::NoTranslation);
        assert_eq!(panel.begin_translate(), TranslateStep::Request("Bonjour".to_string()));

        let err = SnipError::Translation {
            provider: "Google",
            message: "HTTP 500".to_string(),
        };
        assert_eq!(panel.finish_translate("Bonjour", Err(err)), TranslateButton::Failed);
        let section = panel.result_section().unwrap();
        assert_eq!(section.button().label(), "Error");
        assert_eq!(section.translation_header(), "Translation (Google)");
    }

    #[test]
    fn non_result_panels_have_no_actions() {
        let mut panel = ResultPanel::error(Point::new(0.0, 0.0), SIZE, VIEWPORT, "Empty OCR result");
        assert_eq!(panel.begin_translate(), TranslateStep::Unavailable);
        assert!(!panel.edit_text("x"));
        assert!(panel.external_link().is_none());
        assert_eq!(panel.error_message(), Some("Empty OCR result"));
    }

    #[test]
    fn external_link_uses_recognized_text() {
        let mut panel = result_panel(None);
        panel.edit_text("changed");
        let link = panel.external_link().unwrap();
        assert_eq!(
            link.as_str(),
            "https://translate.google.com/?sl=auto&tl=en&text=Bonjour&op=translate"
        );
    }

    #[test]
    fn drag_is_clamped_on_every_move() {
        let mut panel = result_panel(None);
        assert_eq!(panel.drag_to(Point::new(0.0, 0.0)), None);

        panel.begin_drag(Point::new(110.0, 105.0));
        assert_eq!(panel.drag_to(Point::new(210.0, 205.0)), Some(Point::new(200.0, 200.0)));
        assert_eq!(panel.drag_to(Point::new(-500.0, 5000.0)), Some(Point::new(4.0, 596.0)));
        panel.end_drag();
        assert!(!panel.is_dragging());
        assert_eq!(panel.position(), Point::new(4.0, 596.0));
    }

    #[test]
    fn construction_clamps_into_viewport() {
        let panel = ResultPanel::processing(Point::new(950.0, 10.0), SIZE, VIEWPORT);
        assert_eq!(panel.position(), Point::new(696.0, 10.0));
        assert_eq!(panel.to_string(), "OCR Result\nProcessing OCR...");
    }
}
