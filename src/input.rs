//! Input model: tools, modifier keys, pointer buttons, and the gesture state machine.
//!
//! `Tool` and `Modifiers` capture the user's intent at the time of a pointer
//! event. `InputState` is the active gesture being tracked between
//! pointer-down and pointer-up; a surface holds exactly one, so at most one
//! transform session can exist at a time.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::str::FromStr;

use crate::geom::Point;
use crate::transform::TransformSession;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer / selection tool (default).
    #[default]
    Select,
    /// Eraser brush.
    Erase,
}

/// A single modifier key that a configuration option can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKey {
    Shift,
    Ctrl,
    Alt,
    Meta,
}

impl FromStr for ModifierKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shift" => Ok(Self::Shift),
            "ctrl" | "control" => Ok(Self::Ctrl),
            "alt" | "option" => Ok(Self::Alt),
            "meta" | "cmd" | "command" => Ok(Self::Meta),
            other => Err(format!("unknown modifier key: {other}")),
        }
    }
}

/// Keyboard modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    #[must_use]
    pub fn shift() -> Self {
        Self { shift: true, ..Self::default() }
    }

    #[must_use]
    pub fn alt() -> Self {
        Self { alt: true, ..Self::default() }
    }

    /// Whether the bound key is held. An unbound key is never held.
    #[must_use]
    pub fn is_held(self, key: Option<ModifierKey>) -> bool {
        match key {
            Some(ModifierKey::Shift) => self.shift,
            Some(ModifierKey::Ctrl) => self.ctrl,
            Some(ModifierKey::Alt) => self.alt,
            Some(ModifierKey::Meta) => self.meta,
            None => false,
        }
    }
}

/// Pointer button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// Kind of device that produced the pointer event. Touch uses larger handle boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
}

/// Marquee rectangle in progress, in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSelector {
    /// Where the drag started.
    pub start: Point,
    /// The latest pointer position.
    pub current: Point,
}

impl GroupSelector {
    /// Whether the pointer never left the start position.
    #[must_use]
    pub fn is_click(&self) -> bool {
        self.start == self.current
    }
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// A shape or the multi-selection is being moved, scaled, skewed or rotated.
    Transforming(Box<TransformSession>),
    /// A marquee selection rectangle is being dragged on empty canvas.
    Marquee(GroupSelector),
    /// An eraser stroke is in progress.
    Erasing,
}

impl InputState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The active transform session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&TransformSession> {
        match self {
            Self::Transforming(session) => Some(session),
            _ => None,
        }
    }
}
