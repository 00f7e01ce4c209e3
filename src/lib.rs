use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use std::sync::Arc;

pub mod capture;
pub mod crop;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod page;
pub mod panel;
pub mod pipeline;
pub mod recognition;
pub mod selection;
pub mod settings;
pub mod translation;

#[cfg(test)]
mod test_util;

pub use capture::{CaptureFrame, CaptureProvider, FileCaptureProvider};
pub use error::SnipError;
pub use geometry::{Point, Rect, Size};
pub use page::{Page, PageContext};
pub use panel::ResultPanel;
pub use pipeline::{Pipeline, RunReport};
pub use recognition::{LineOrder, Recognizer, VisionClient};
pub use settings::{FileSettingsStore, MemorySettingsStore, Settings, SettingsStore};
pub use translation::{Translate, TranslationClient};

const CLI_TAB: dispatch::TabId = 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub settings_path: Option<String>,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Fill in defaults for missing keys.
    Init,
    ShowConfig,
    SetConfig { key: String, value: String },
    Last,
    Snip(SnipRequest),
}

/// One run against a screenshot on disk.
#[derive(Debug, Clone)]
pub struct SnipRequest {
    pub image: PathBuf,
    pub rect: Rect,
    pub dpr: f64,
    pub translate: bool,
    pub prefers_dark: bool,
}

pub async fn run(config: Config) -> Result<String> {
    let store: Arc<dyn SettingsStore> = match config.settings_path.as_deref() {
        Some(path) => Arc::new(FileSettingsStore::new(path)),
        None => Arc::new(FileSettingsStore::open_default()?),
    };

    match config.command {
        Command::Init => {
            let written = settings::ensure_defaults(store.as_ref())?;
            if written.is_empty() {
                Ok("settings already complete".to_string())
            } else {
                Ok(format!("wrote defaults: {}", written.join(", ")))
            }
        }
        Command::ShowConfig => {
            let settings = settings::load(store.as_ref())?;
            Ok(settings
                .entries()
                .into_iter()
                .map(|(key, value)| format!("{} = {}", key, value))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Command::SetConfig { key, value } => {
            settings::update(store.as_ref(), &key, &value)?;
            Ok(format!("{} updated", key))
        }
        Command::Last => Ok(format_last_result(settings::last_result(store.as_ref())?)),
        Command::Snip(request) => snip(store, request).await,
    }
}

fn format_last_result(last: Option<settings::LastResult>) -> String {
    let Some(last) = last else {
        return "No result yet.".to_string();
    };
    let when = time::OffsetDateTime::from_unix_timestamp_nanos(last.timestamp as i128 * 1_000_000)
        .ok()
        .and_then(|at| at.format(&time::format_description::well_known::Rfc3339).ok())
        .unwrap_or_else(|| last.timestamp.to_string());
    let mut out = format!("Last OCR ({}):\n{}", when, last.ocr);
    if let Some(translated) = last.translated {
        out.push_str("\n\nTranslation:\n");
        out.push_str(&translated);
    }
    out
}

/// Parse `L,T,W,H` in CSS pixels.
pub fn parse_rect(raw: &str) -> Result<Rect> {
    let parts = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid number '{}' in rectangle", part.trim()))
        })
        .collect::<Result<Vec<_>>>()?;
    if parts.iter().any(|part| !part.is_finite()) {
        return Err(anyhow!("rectangle values must be finite numbers"));
    }
    match parts.as_slice() {
        [left, top, width, height] if *width >= 0.0 && *height >= 0.0 => {
            Ok(Rect::new(*left, *top, *width, *height))
        }
        [_, _, _, _] => Err(anyhow!("rectangle width and height must not be negative")),
        _ => Err(anyhow!("rectangle must be LEFT,TOP,WIDTH,HEIGHT")),
    }
}

async fn snip(store: Arc<dyn SettingsStore>, request: SnipRequest) -> Result<String> {
    let dpr = geometry::effective_dpr(request.dpr);
    let (width, height) = image::image_dimensions(&request.image)
        .with_context(|| format!("failed to read image: {}", request.image.display()))?;
    let context = PageContext {
        viewport: Size::new(width as f64 / dpr, height as f64 / dpr),
        dpr,
        prefers_dark: request.prefers_dark,
        ..PageContext::default()
    };

    let (background, _service) =
        dispatch::spawn_background(FileCaptureProvider::new(&request.image));
    let pages = dispatch::LocalPages::new();
    let page = pages.open_tab(CLI_TAB, context);
    dispatch::trigger_snip(&pages, CLI_TAB, None).await?;

    let rect = drag_out(&page, request.rect)?;
    let pipeline = Pipeline::new(
        dispatch::ChannelCaptureProvider::new(background, CLI_TAB),
        VisionClient::default(),
        TranslationClient::default(),
        store,
    );
    let report = pipeline.run(&page, rect).await;

    if request.translate && report.outcome.is_ok() {
        let settings = pipeline.settings()?;
        page.manual_translate(pipeline.translator(), &settings).await;
    }

    let panel = page
        .panel()
        .ok_or_else(|| anyhow!("run {} produced no panel", report.run.get()))?;
    let mut out = panel.to_string();
    if let Some(section) = panel.result_section() {
        out.push_str(&format!("\n[{}]", section.button().label()));
    }
    if let Some(link) = panel.external_link() {
        out.push_str(&format!("\n{}", link));
    }
    match report.outcome {
        Ok(_) => Ok(out),
        Err(err) if err.is_configuration() => Err(anyhow!(
            "{}\n\n{}\nrun `snip-ocr config set <key> <value>` to configure",
            out,
            err
        )),
        Err(err) => Err(anyhow!("{}\n\n{}", out, err)),
    }
}

/// Feed the drag for `rect` through the armed overlay.
fn drag_out(page: &Page, rect: Rect) -> Result<Rect> {
    use selection::{Input, Outcome, PointerButton};

    page.handle_input(Input::PointerDown {
        x: rect.left,
        y: rect.top,
        button: PointerButton::Primary,
    });
    page.handle_input(Input::PointerMove {
        x: rect.right(),
        y: rect.bottom(),
    });
    match page.handle_input(Input::PointerUp {
        x: rect.right(),
        y: rect.bottom(),
    }) {
        Outcome::Committed(rect) => Ok(rect),
        Outcome::Cancelled(_) => Err(anyhow!(
            "selection cancelled: width and height must be at least {}px",
            geometry::DRAG_ABORT_MIN
        )),
        other => Err(anyhow!("selection did not complete: {:?}", other)),
    }
}
