use crate::geometry::{Point, Rect, effective_dpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Auxiliary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    Other(String),
}

impl Key {
    /// Map a DOM-style key name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Escape" | "Esc" => Key::Escape,
            other => Key::Other(other.to_string()),
        }
    }
}

/// Raw input routed to the overlay (pure).
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    PointerDown { x: f64, y: f64, button: PointerButton },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    KeyDown(Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Escape,
    /// Released below the drag-abort threshold.
    TooSmall,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Overlay is showing and waiting for a primary press.
    Armed,
    Dragging { anchor: Point, selection: Rect },
    Committed(Rect),
    Cancelled(CancelReason),
}

/// What the host has to do after an input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Ignored,
    /// Redraw the live rectangle; `too_small` drives the undersized hint.
    Updated { selection: Rect, too_small: bool },
    /// Remove the overlay now and hand the rectangle to the pipeline.
    Committed(Rect),
    /// Remove the overlay and any result panel.
    Cancelled(CancelReason),
}

/// Drag-to-select overlay for one run. Terminal once committed or cancelled;
/// a new selection needs a new surface.
#[derive(Debug, Clone, Default)]
pub struct SelectionSurface {
    phase: Phase,
    dpr: f64,
}

impl SelectionSurface {
    pub fn new(dpr: f64) -> Self {
        Self {
            phase: Phase::Idle,
            dpr: effective_dpr(dpr),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// True while the overlay is on screen.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Armed | Phase::Dragging { .. })
    }

    /// Live rectangle while dragging.
    pub fn selection(&self) -> Option<Rect> {
        match self.phase {
            Phase::Dragging { selection, .. } => Some(selection),
            Phase::Committed(selection) => Some(selection),
            _ => None,
        }
    }

    /// Returns false when the request was a no-op (already armed or dragging,
    /// or the surface already finished).
    pub fn arm(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Armed;
        true
    }

    pub fn handle(&mut self, input: Input) -> Outcome {
        match input {
            Input::KeyDown(Key::Escape) if self.is_active() => {
                self.phase = Phase::Cancelled(CancelReason::Escape);
                Outcome::Cancelled(CancelReason::Escape)
            }
            Input::KeyDown(_) => Outcome::Ignored,

            Input::PointerDown {
                x,
                y,
                button: PointerButton::Primary,
            } => {
                if self.phase != Phase::Armed {
                    return Outcome::Ignored;
                }
                let anchor = Point::new(x, y);
                let selection = Rect::from_points(anchor, anchor);
                self.phase = Phase::Dragging { anchor, selection };
                Outcome::Updated {
                    selection,
                    too_small: true,
                }
            }
            Input::PointerDown { .. } => Outcome::Ignored,

            Input::PointerMove { x, y } => {
                let Phase::Dragging { anchor, selection } = &mut self.phase else {
                    return Outcome::Ignored;
                };
                *selection = Rect::from_points(*anchor, Point::new(x, y));
                Outcome::Updated {
                    selection: *selection,
                    too_small: !selection.meets_device_minimum(self.dpr),
                }
            }

            Input::PointerUp { x, y } => {
                let Phase::Dragging { anchor, .. } = self.phase else {
                    return Outcome::Ignored;
                };
                let selection = Rect::from_points(anchor, Point::new(x, y));
                if selection.exceeds_drag_threshold() {
                    self.phase = Phase::Committed(selection);
                    Outcome::Committed(selection)
                } else {
                    self.phase = Phase::Cancelled(CancelReason::TooSmall);
                    Outcome::Cancelled(CancelReason::TooSmall)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(x: f64, y: f64) -> Input {
        Input::PointerDown {
            x,
            y,
            button: PointerButton::Primary,
        }
    }

    fn armed(dpr: f64) -> SelectionSurface {
        let mut surface = SelectionSurface::new(dpr);
        assert!(surface.arm());
        surface
    }

    #[test]
    fn drag_commits_normalized_rectangle() {
        let mut surface = armed(1.0);
        surface.handle(down(200.0, 150.0));
        surface.handle(Input::PointerMove { x: 80.0, y: 110.0 });
        let outcome = surface.handle(Input::PointerUp { x: 80.0, y: 110.0 });
        let expected = Rect::new(80.0, 110.0, 120.0, 40.0);
        assert_eq!(outcome, Outcome::Committed(expected));
        assert_eq!(surface.phase(), &Phase::Committed(expected));
        assert!(!surface.is_active());
    }

    #[test]
    fn arming_twice_is_a_no_op() {
        let mut surface = armed(1.0);
        assert!(!surface.arm());
        surface.handle(down(1.0, 1.0));
        assert!(!surface.arm());
        assert!(matches!(surface.phase(), Phase::Dragging { .. }));
    }

    #[test]
    fn tiny_release_cancels() {
        for (x, y) in [(3.0, 100.0), (100.0, 3.9), (0.0, 0.0)] {
            let mut surface = armed(2.0);
            surface.handle(down(0.0, 0.0));
            assert_eq!(
                surface.handle(Input::PointerUp { x, y }),
                Outcome::Cancelled(CancelReason::TooSmall)
            );
        }
    }

    #[test]
    fn move_flags_selections_under_device_minimum() {
        let mut surface = armed(2.0);
        surface.handle(down(0.0, 0.0));
        assert_eq!(
            surface.handle(Input::PointerMove { x: 24.0, y: 30.0 }),
            Outcome::Updated {
                selection: Rect::new(0.0, 0.0, 24.0, 30.0),
                too_small: true
            }
        );
        assert_eq!(
            surface.handle(Input::PointerMove { x: 25.0, y: 30.0 }),
            Outcome::Updated {
                selection: Rect::new(0.0, 0.0, 25.0, 30.0),
                too_small: false
            }
        );
    }

    #[test]
    fn escape_cancels_while_armed_or_dragging() {
        let mut surface = armed(1.0);
        assert_eq!(
            surface.handle(Input::KeyDown(Key::from_name("Escape"))),
            Outcome::Cancelled(CancelReason::Escape)
        );

        let mut surface = armed(1.0);
        surface.handle(down(5.0, 5.0));
        surface.handle(Input::PointerMove { x: 90.0, y: 90.0 });
        assert_eq!(
            surface.handle(Input::KeyDown(Key::Escape)),
            Outcome::Cancelled(CancelReason::Escape)
        );
        assert_eq!(
            surface.handle(Input::PointerUp { x: 90.0, y: 90.0 }),
            Outcome::Ignored
        );
    }

    #[test]
    fn non_primary_buttons_and_idle_input_are_ignored() {
        let mut surface = SelectionSurface::new(1.0);
        assert_eq!(surface.handle(down(0.0, 0.0)), Outcome::Ignored);
        assert_eq!(
            surface.handle(Input::KeyDown(Key::Escape)),
            Outcome::Ignored
        );

        surface.arm();
        let right_click = Input::PointerDown {
            x: 0.0,
            y: 0.0,
            button: PointerButton::Secondary,
        };
        assert_eq!(surface.handle(right_click), Outcome::Ignored);
        assert_eq!(surface.phase(), &Phase::Armed);
        assert_eq!(
            surface.handle(Input::KeyDown(Key::from_name("a"))),
            Outcome::Ignored
        );
    }
}
