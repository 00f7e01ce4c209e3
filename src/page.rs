use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

use crate::geometry::{Point, Size, Viewport, effective_dpr};
use crate::panel::{ResultPanel, TranslateButton, TranslateStep};
use crate::selection::{Input, Outcome, SelectionSurface};
use crate::settings::{Settings, Theme, ThemeChoice, TranslationProviderKind};
use crate::translation::{Translate, force_translate};

/// Facts about the page the overlay and panel live in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageContext {
    pub viewport: Viewport,
    pub dpr: f64,
    pub panel_size: Size,
    pub prefers_dark: bool,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            viewport: Size::new(1280.0, 720.0),
            dpr: 1.0,
            panel_size: Size::new(360.0, 240.0),
            prefers_dark: false,
        }
    }
}

/// Identifies one pipeline run. Renders carrying a stale id are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

impl RunId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct PageState {
    context: PageContext,
    theme: Option<Theme>,
    overlay: Option<SelectionSurface>,
    panel: Option<ResultPanel>,
    panel_run: Option<RunId>,
    panel_generation: u64,
    remembered_position: Option<Point>,
    panel_dragged: bool,
    active_run: Option<RunId>,
    next_run: u64,
}

impl PageState {
    fn theme(&self) -> Theme {
        self.theme
            .unwrap_or_else(|| ThemeChoice::System.resolve(self.context.prefers_dark))
    }

    fn is_current(&self, run: RunId) -> bool {
        if self.active_run == Some(run) {
            return true;
        }
        debug!(run = run.get(), "dropping render for superseded run");
        false
    }

    /// Destroy the previous panel, then create the replacement.
    ///
    /// A `Follow` render inherits the position of the same run's panel. An
    /// `Anchor` render goes to `anchor` unless the user dragged that panel.
    fn replace_panel(
        &mut self,
        run: RunId,
        anchor: Point,
        placement: Placement,
        build: impl FnOnce(Point, Size, Viewport) -> ResultPanel,
    ) {
        let same_run = self.panel.is_some() && self.panel_run == Some(run);
        if !same_run {
            self.panel_dragged = false;
        }
        let position = match (&self.panel, placement) {
            (Some(panel), Placement::Follow) if same_run => panel.position(),
            (Some(panel), Placement::Anchor) if same_run && self.panel_dragged => panel.position(),
            (_, Placement::Anchor) => anchor,
            (_, Placement::Follow) => self.remembered_position.unwrap_or(anchor),
        };
        self.panel = None;
        let panel = build(position, self.context.panel_size, self.context.viewport);
        self.panel = Some(panel.with_theme(self.theme()));
        self.panel_run = Some(run);
        self.panel_generation += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Follow,
    Anchor,
}

/// Shared handle to the page-side UI state: at most one overlay and one
/// panel exist at any time.
#[derive(Debug, Clone, Default)]
pub struct Page {
    state: Arc<Mutex<PageState>>,
}

impl Page {
    pub fn new(context: PageContext) -> Self {
        let state = PageState {
            context,
            ..PageState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> PageContext {
        self.lock().context
    }

    pub fn dpr(&self) -> f64 {
        effective_dpr(self.lock().context.dpr)
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        let mut state = self.lock();
        state.context.viewport = viewport;
        if let Some(panel) = state.panel.as_mut() {
            panel.set_viewport(viewport);
        }
    }

    pub fn apply_theme(&self, choice: ThemeChoice) -> Theme {
        let mut state = self.lock();
        let theme = choice.resolve(state.context.prefers_dark);
        state.theme = Some(theme);
        theme
    }

    /// Arm a fresh overlay. A no-op returning false while one is already up.
    /// Any in-flight run is superseded.
    pub fn begin_selection(&self) -> bool {
        let mut state = self.lock();
        if state.overlay.as_ref().is_some_and(SelectionSurface::is_active) {
            debug!("overlay already exists");
            return false;
        }
        let mut surface = SelectionSurface::new(state.context.dpr);
        surface.arm();
        state.overlay = Some(surface);
        state.active_run = None;
        info!("creating overlay for selection");
        true
    }

    pub fn is_selecting(&self) -> bool {
        self.lock()
            .overlay
            .as_ref()
            .is_some_and(SelectionSurface::is_active)
    }

    /// Route input to the overlay. Committing removes the overlay straight
    /// away; cancelling also removes the panel.
    pub fn handle_input(&self, input: Input) -> Outcome {
        let mut state = self.lock();
        let Some(surface) = state.overlay.as_mut() else {
            return Outcome::Ignored;
        };
        let outcome = surface.handle(input);
        match outcome {
            Outcome::Committed(rect) => {
                info!(
                    left = rect.left,
                    top = rect.top,
                    width = rect.width,
                    height = rect.height,
                    "final selection"
                );
                state.overlay = None;
            }
            Outcome::Cancelled(reason) => {
                info!(?reason, "selection cancelled");
                state.overlay = None;
                state.panel = None;
                state.panel_run = None;
                state.active_run = None;
            }
            Outcome::Updated { .. } | Outcome::Ignored => {}
        }
        outcome
    }

    pub fn start_run(&self) -> RunId {
        let mut state = self.lock();
        state.next_run += 1;
        let run = RunId(state.next_run);
        state.active_run = Some(run);
        run
    }

    pub fn is_active(&self, run: RunId) -> bool {
        self.lock().active_run == Some(run)
    }

    pub fn show_processing(&self, run: RunId, anchor: Point) -> bool {
        let mut state = self.lock();
        if !state.is_current(run) {
            return false;
        }
        state.replace_panel(run, anchor, Placement::Follow, ResultPanel::processing);
        true
    }

    pub fn show_error(&self, run: RunId, anchor: Point, message: &str) -> bool {
        let mut state = self.lock();
        if !state.is_current(run) {
            return false;
        }
        state.replace_panel(run, anchor, Placement::Anchor, |position, size, viewport| {
            ResultPanel::error(position, size, viewport, message)
        });
        true
    }

    pub fn show_result(
        &self,
        run: RunId,
        anchor: Point,
        text: &str,
        translation: Option<String>,
        provider: TranslationProviderKind,
    ) -> bool {
        let mut state = self.lock();
        if !state.is_current(run) {
            return false;
        }
        state.replace_panel(run, anchor, Placement::Follow, |position, size, viewport| {
            ResultPanel::result(position, size, viewport, text, translation, provider)
        });
        true
    }

    pub fn panel(&self) -> Option<ResultPanel> {
        self.lock().panel.clone()
    }

    /// Explicit close. A run still in flight finishes without rendering.
    pub fn close_panel(&self) -> bool {
        let mut state = self.lock();
        state.active_run = None;
        state.panel_run = None;
        state.panel.take().is_some()
    }

    /// Remember where the panel sits, then arm a new selection. The panel
    /// stays until the next run replaces it.
    pub fn repeat(&self) -> bool {
        {
            let mut state = self.lock();
            if let Some(position) = state.panel.as_ref().map(ResultPanel::position) {
                state.remembered_position = Some(position);
            }
        }
        self.begin_selection()
    }

    pub fn remembered_position(&self) -> Option<Point> {
        self.lock().remembered_position
    }

    pub fn edit_text(&self, text: &str) -> bool {
        self.lock()
            .panel
            .as_mut()
            .is_some_and(|panel| panel.edit_text(text))
    }

    pub fn begin_panel_drag(&self, pointer: Point) -> bool {
        match self.lock().panel.as_mut() {
            Some(panel) => {
                panel.begin_drag(pointer);
                true
            }
            None => false,
        }
    }

    pub fn drag_panel(&self, pointer: Point) -> Option<Point> {
        let mut state = self.lock();
        let moved = state.panel.as_mut()?.drag_to(pointer)?;
        state.panel_dragged = true;
        Some(moved)
    }

    pub fn end_panel_drag(&self) {
        if let Some(panel) = self.lock().panel.as_mut() {
            panel.end_drag();
        }
    }

    /// Handle a click on the panel's translate button. Returns the resulting
    /// button state, or `None` when there is nothing to translate.
    pub async fn manual_translate<T: Translate + ?Sized>(
        &self,
        translator: &T,
        settings: &Settings,
    ) -> Option<TranslateButton> {
        let (source, generation) = {
            let mut state = self.lock();
            let generation = state.panel_generation;
            let panel = state.panel.as_mut()?;
            match panel.begin_translate() {
                TranslateStep::Request(source) => (source, generation),
                TranslateStep::Reused(_) => {
                    debug!("reusing memoized translation");
                    return panel.result_section().map(|section| section.button());
                }
                TranslateStep::Busy | TranslateStep::Unavailable => return None,
            }
        };

        let outcome = force_translate(translator, settings, &source).await;
        if let Err(err) = &outcome {
            error!(error = %err, "manual translate error");
        }

        let mut state = self.lock();
        if state.panel_generation != generation {
            debug!("panel replaced while translating");
            return None;
        }
        let panel = state.panel.as_mut()?;
        Some(panel.finish_translate(&source, outcome))
    }
}
