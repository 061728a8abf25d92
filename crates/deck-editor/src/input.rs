//! Input events, in logical canvas coordinates.
//!
//! Hosts convert screen positions by subtracting the canvas origin and
//! dividing by the zoom factor before handing events over.

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Shift-click toggles an element in or out of the selection.
    pub fn toggles_selection(&self) -> bool {
        self.shift
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64, y: f64, modifiers: Modifiers },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    ContextMenu { x: f64, y: f64 },
    Key { key: String, modifiers: Modifiers },
}
