//! Handle registry: named interactive control points attached to shapes.
//!
//! A [`Control`] is an immutable descriptor: where the handle sits in the
//! shape's unit box, which manipulation it starts, and how its cursor is
//! chosen. Descriptors are grouped into [`ControlSet`]s that are shared by
//! reference between every shape of a kind; nothing on a shape ever writes
//! into a set. Per-shape visibility overrides live on the shape.
//!
//! Cursor choice follows the handle's on-screen orientation: the handle's
//! direction from the shape center plus the shape angle is bucketed into one
//! of eight 45° quadrants, so a rotated shape's east handle can report a
//! south-east or south resize cursor.

#[cfg(test)]
#[path = "control_test.rs"]
mod control_test;

use std::sync::{Arc, LazyLock};

use crate::config::SurfaceConfig;
use crate::consts::ROTATE_HANDLE_OFFSET_PX;
use crate::geom::{Corners, Matrix, Point};
use crate::input::Modifiers;
use crate::shape::Shape;

/// Key naming a control within a set (`"tl"`, `"mr"`, `"mtr"`, ...).
pub type ControlKey = &'static str;

/// The manipulation a control starts when dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Scale both axes; proportional unless the uniform key says otherwise.
    ScaleEqually,
    /// Scale X only.
    ScaleX,
    /// Scale Y only.
    ScaleY,
    /// Scale X, or skew Y while the alt-action key is held.
    ScaleXOrSkewY,
    /// Scale Y, or skew X while the alt-action key is held.
    ScaleYOrSkewX,
    /// Rotate around the pivot with optional angle snapping.
    Rotate,
    /// Change the unscaled width (text boxes).
    ChangeWidth,
}

/// Resolved name of a transform session's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionName {
    Drag,
    Scale,
    ScaleX,
    ScaleY,
    SkewX,
    SkewY,
    Rotate,
    Resizing,
}

/// How a control resolves its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorRule {
    /// Rotated resize cursor, or not-allowed when scaling is locked.
    Scale,
    /// Scale rule, or the skew rule while the alt-action key is held.
    ScaleSkew,
    /// Fixed crosshair, or not-allowed when rotation is locked.
    Rotate,
}

/// Resize cursor directions, named after CSS `*-resize` cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDirection {
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
    N,
    Ne,
    Ns,
    Nesw,
    Ew,
    Nwse,
}

/// Pointer cursor requested from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Move,
    Crosshair,
    NotAllowed,
    Resize(ResizeDirection),
}

impl Cursor {
    /// CSS cursor keyword.
    #[must_use]
    pub fn css(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Move => "move",
            Self::Crosshair => "crosshair",
            Self::NotAllowed => "not-allowed",
            Self::Resize(dir) => match dir {
                ResizeDirection::E => "e-resize",
                ResizeDirection::Se => "se-resize",
                ResizeDirection::S => "s-resize",
                ResizeDirection::Sw => "sw-resize",
                ResizeDirection::W => "w-resize",
                ResizeDirection::Nw => "nw-resize",
                ResizeDirection::N => "n-resize",
                ResizeDirection::Ne => "ne-resize",
                ResizeDirection::Ns => "ns-resize",
                ResizeDirection::Nesw => "nesw-resize",
                ResizeDirection::Ew => "ew-resize",
                ResizeDirection::Nwse => "nwse-resize",
            },
        }
    }
}

/// Scale cursors by quadrant. Index 8 wraps back to east.
const SCALE_MAP: [ResizeDirection; 9] = [
    ResizeDirection::E,
    ResizeDirection::Se,
    ResizeDirection::S,
    ResizeDirection::Sw,
    ResizeDirection::W,
    ResizeDirection::Nw,
    ResizeDirection::N,
    ResizeDirection::Ne,
    ResizeDirection::E,
];

/// Skew cursors by quadrant modulo 4.
const SKEW_MAP: [ResizeDirection; 4] =
    [ResizeDirection::Ns, ResizeDirection::Nesw, ResizeDirection::Ew, ResizeDirection::Nwse];

/// Which axis a scale gesture is limited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleBy {
    Both,
    X,
    Y,
}

/// A single handle descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    /// Horizontal anchor in the unit box, `-0.5` (left) to `0.5` (right).
    pub x: f64,
    /// Vertical anchor in the unit box, `-0.5` (top) to `0.5` (bottom).
    pub y: f64,
    /// Screen-pixel offset added after the anchor.
    pub offset_x: f64,
    pub offset_y: f64,
    pub action: ControlAction,
    pub cursor: CursorRule,
    /// Default visibility; shapes may override per key.
    pub visible: bool,
    /// Handle box size override in screen pixels.
    pub size: Option<f64>,
    pub touch_size: Option<f64>,
    /// Draw a line from the shape edge to this handle.
    pub with_connection: bool,
}

impl Control {
    fn new(x: f64, y: f64, action: ControlAction, cursor: CursorRule) -> Self {
        Self {
            x,
            y,
            offset_x: 0.0,
            offset_y: 0.0,
            action,
            cursor,
            visible: true,
            size: None,
            touch_size: None,
            with_connection: false,
        }
    }

    /// Axis restriction implied by the anchor: side handles scale one axis.
    #[must_use]
    pub fn scale_by(&self) -> ScaleBy {
        if self.x != 0.0 && self.y == 0.0 {
            ScaleBy::X
        } else if self.x == 0.0 && self.y != 0.0 {
            ScaleBy::Y
        } else {
            ScaleBy::Both
        }
    }

    /// Resolve the session action name for a press on this control.
    #[must_use]
    pub fn action_name(&self, modifiers: Modifiers, config: &SurfaceConfig) -> ActionName {
        let alternative = modifiers.is_held(config.alt_action_key);
        match self.action {
            ControlAction::ScaleEqually => ActionName::Scale,
            ControlAction::ScaleX => ActionName::ScaleX,
            ControlAction::ScaleY => ActionName::ScaleY,
            ControlAction::ScaleXOrSkewY | ControlAction::ScaleYOrSkewX => {
                if self.x == 0.0 {
                    if alternative { ActionName::SkewX } else { ActionName::ScaleY }
                } else if alternative {
                    ActionName::SkewY
                } else {
                    ActionName::ScaleX
                }
            }
            ControlAction::Rotate => ActionName::Rotate,
            ControlAction::ChangeWidth => ActionName::Resizing,
        }
    }

    /// Cursor shown while hovering this control on `shape`.
    #[must_use]
    pub fn cursor(&self, shape: &Shape, modifiers: Modifiers, config: &SurfaceConfig) -> Cursor {
        match self.cursor {
            CursorRule::Scale => self.scale_cursor(shape, modifiers, config),
            CursorRule::ScaleSkew => {
                if modifiers.is_held(config.alt_action_key) {
                    self.skew_cursor(shape)
                } else {
                    self.scale_cursor(shape, modifiers, config)
                }
            }
            CursorRule::Rotate => {
                if shape.locks.rotation {
                    Cursor::NotAllowed
                } else {
                    Cursor::Crosshair
                }
            }
        }
    }

    fn scale_cursor(&self, shape: &Shape, modifiers: Modifiers, config: &SurfaceConfig) -> Cursor {
        let proportional = scale_is_proportional(modifiers, config);
        if scaling_is_forbidden(shape, self.scale_by(), proportional) {
            return Cursor::NotAllowed;
        }
        Cursor::Resize(SCALE_MAP[corner_quadrant(shape.geometry().angle, self)])
    }

    fn skew_cursor(&self, shape: &Shape) -> Cursor {
        if self.x != 0.0 && shape.locks.skewing_y {
            return Cursor::NotAllowed;
        }
        if self.y != 0.0 && shape.locks.skewing_x {
            return Cursor::NotAllowed;
        }
        Cursor::Resize(SKEW_MAP[corner_quadrant(shape.geometry().angle, self) % 4])
    }

    /// Screen position of the handle center. `dim` is the shape's on-screen
    /// size and `final_matrix` maps screen-unit offsets around the shape
    /// center onto the screen.
    #[must_use]
    pub fn position(&self, dim: Point, final_matrix: &Matrix) -> Point {
        final_matrix.apply(Point::new(self.x * dim.x + self.offset_x, self.y * dim.y + self.offset_y))
    }

    /// Rotated hit box of this handle centered at `center`.
    #[must_use]
    pub fn corner_box(&self, angle: f64, default_size: f64, center: Point, touch: bool) -> Corners {
        let size = if touch { self.touch_size } else { self.size }.unwrap_or(default_size);
        rotated_square(angle, size, size, center)
    }
}

/// Box of `width × height` pixels rotated by `angle` degrees around `center`.
#[must_use]
pub fn rotated_square(angle: f64, width: f64, height: f64, center: Point) -> Corners {
    let triangle = height.atan2(width);
    let hypotenuse = width.hypot(height) / 2.0;
    let theta = triangle - angle.to_radians();
    let theta_comp = std::f64::consts::FRAC_PI_2 - triangle - angle.to_radians();
    let cos_half = hypotenuse * theta.cos();
    let sin_half = hypotenuse * theta.sin();
    let cos_half_comp = hypotenuse * theta_comp.cos();
    let sin_half_comp = hypotenuse * theta_comp.sin();
    Corners {
        tl: Point::new(center.x - sin_half_comp, center.y - cos_half_comp),
        tr: Point::new(center.x + cos_half, center.y - sin_half),
        br: Point::new(center.x + sin_half_comp, center.y + cos_half_comp),
        bl: Point::new(center.x - cos_half, center.y + sin_half),
    }
}

/// Eight-way quadrant of a control's screen direction, in `0..=8`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn corner_quadrant(shape_angle: f64, control: &Control) -> usize {
    let corner_angle = shape_angle + control.y.atan2(control.x).to_degrees();
    (corner_angle.rem_euclid(360.0) / 45.0).round().clamp(0.0, 8.0) as usize
}

/// Uniform scaling is on when the surface toggle XOR the uniform key is held.
#[must_use]
pub fn scale_is_proportional(modifiers: Modifiers, config: &SurfaceConfig) -> bool {
    config.uniform_scaling != modifiers.is_held(config.uni_scale_key)
}

/// Whether the shape's scaling locks forbid a scale gesture limited to `by`.
#[must_use]
pub fn scaling_is_forbidden(shape: &Shape, by: ScaleBy, proportional: bool) -> bool {
    let lock_x = shape.locks.scaling_x;
    let lock_y = shape.locks.scaling_y;
    if lock_x && lock_y {
        return true;
    }
    match by {
        ScaleBy::Both => proportional && (lock_x || lock_y),
        ScaleBy::X => lock_x,
        ScaleBy::Y => lock_y,
    }
}

// =============================================================
// Control sets
// =============================================================

/// An ordered, immutable collection of controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSet {
    entries: Vec<(ControlKey, Control)>,
}

static OBJECT_CONTROLS: LazyLock<Arc<ControlSet>> = LazyLock::new(|| Arc::new(ControlSet::build_object()));
static TEXTBOX_CONTROLS: LazyLock<Arc<ControlSet>> = LazyLock::new(|| Arc::new(ControlSet::build_textbox()));

impl ControlSet {
    /// Build a set from explicit entries. Later duplicates replace earlier ones.
    #[must_use]
    pub fn new(entries: Vec<(ControlKey, Control)>) -> Self {
        let mut set = Self { entries: Vec::with_capacity(entries.len()) };
        for (key, control) in entries {
            set.insert(key, control);
        }
        set
    }

    fn insert(&mut self, key: ControlKey, control: Control) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = control,
            None => self.entries.push((key, control)),
        }
    }

    /// The shared set used by every ordinary shape.
    #[must_use]
    pub fn object() -> Arc<ControlSet> {
        Arc::clone(&OBJECT_CONTROLS)
    }

    /// The shared set used by text boxes: side handles change width.
    #[must_use]
    pub fn textbox() -> Arc<ControlSet> {
        Arc::clone(&TEXTBOX_CONTROLS)
    }

    fn build_object() -> Self {
        let side_x = |x| Control::new(x, 0.0, ControlAction::ScaleXOrSkewY, CursorRule::ScaleSkew);
        let side_y = |y| Control::new(0.0, y, ControlAction::ScaleYOrSkewX, CursorRule::ScaleSkew);
        let corner = |x, y| Control::new(x, y, ControlAction::ScaleEqually, CursorRule::Scale);
        let rotate = Control {
            offset_y: -ROTATE_HANDLE_OFFSET_PX,
            with_connection: true,
            ..Control::new(0.0, -0.5, ControlAction::Rotate, CursorRule::Rotate)
        };
        Self::new(vec![
            ("ml", side_x(-0.5)),
            ("mr", side_x(0.5)),
            ("mb", side_y(0.5)),
            ("mt", side_y(-0.5)),
            ("tl", corner(-0.5, -0.5)),
            ("tr", corner(0.5, -0.5)),
            ("bl", corner(-0.5, 0.5)),
            ("br", corner(0.5, 0.5)),
            ("mtr", rotate),
        ])
    }

    fn build_textbox() -> Self {
        let mut set = Self::build_object();
        set.insert("ml", Control::new(-0.5, 0.0, ControlAction::ChangeWidth, CursorRule::ScaleSkew));
        set.insert("mr", Control::new(0.5, 0.0, ControlAction::ChangeWidth, CursorRule::ScaleSkew));
        set
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Control> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, c)| c)
    }

    /// Controls in hit-test order.
    pub fn iter(&self) -> impl Iterator<Item = (ControlKey, &Control)> {
        self.entries.iter().map(|(k, c)| (*k, c))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
