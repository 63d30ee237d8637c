//! Transform sessions: one pointer-driven manipulation from press to release.
//!
//! DESIGN
//! ======
//! A [`TransformSession`] is created on pointer-down over a shape (or one of
//! its handles), fed every pointer-move through [`TransformSession::apply`],
//! and dropped on pointer-up or capture loss. It snapshots the geometry at
//! press time and tracks the transform origin, which the scale handler may
//! swap when the pointer crosses it.
//!
//! Handlers are plain functions `(session, shape, input) -> bool` returning
//! whether the geometry changed. Two wrappers compose around them:
//! `with_fixed_anchor` pins the session origin point in place across the
//! mutation, and `apply` only reports an event when the handler returned
//! `true`, so a no-op drag never produces one.

// Change detection compares exact values on purpose.
#![allow(clippy::float_cmp)]

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use crate::config::SurfaceConfig;
use crate::consts::{DEFAULT_SNAP_THRESHOLD_RATIO, EPSILON, SKEW_SNAP_PX};
use crate::control::{ActionName, ControlKey, ScaleBy, scale_is_proportional, scaling_is_forbidden};
use crate::geom::Point;
use crate::input::Modifiers;
use crate::shape::{Geometry, OriginX, OriginY, Shape, ShapeId};

/// What a session manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformTarget {
    Shape(ShapeId),
    /// The multi-selection frame.
    ActiveSelection,
}

/// Named change reported after a handler mutated geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Moving,
    Scaling,
    Skewing,
    Rotating,
    Resizing,
}

/// Per-move input handed to the action handlers.
#[derive(Debug, Clone, Copy)]
pub struct MoveInput<'a> {
    /// Pointer in scene coordinates.
    pub pointer: Point,
    pub modifiers: Modifiers,
    pub config: &'a SurfaceConfig,
    /// Current viewport zoom, used to convert screen padding.
    pub zoom: f64,
}

/// State of one in-progress manipulation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSession {
    pub target: TransformTarget,
    pub action: ActionName,
    /// Handle under the press, `None` for a body drag.
    pub corner: Option<ControlKey>,
    pub origin_x: OriginX,
    pub origin_y: OriginY,
    /// Geometry at press time.
    pub original: Geometry,
    /// Origin derived from the handle, before any centering.
    pub original_origin: (OriginX, OriginY),
    /// Pointer at press time.
    pub start: Point,
    /// Latest pointer seen by `apply`.
    pub last: Point,
    /// Pointer minus `left/top` at press time.
    pub offset: Point,
    /// Shape angle at press time, in radians.
    pub theta: f64,
    pub sign_x: Option<f64>,
    pub sign_y: Option<f64>,
    /// Modifiers held at press time.
    pub modifiers: Modifiers,
    /// Whether any move changed geometry.
    pub changed: bool,
}

impl TransformSession {
    /// Start a session on `shape`. `corner` is the pressed handle, if any,
    /// and `action` the name resolved for it (`Drag` for the body).
    #[must_use]
    pub fn begin(
        target: TransformTarget,
        shape: &Shape,
        corner: Option<ControlKey>,
        action: ActionName,
        pointer: Point,
        modifiers: Modifiers,
        config: &SurfaceConfig,
    ) -> Self {
        let g = *shape.geometry();
        let (origin_x, origin_y) = origin_from_corner(g.origin_x, g.origin_y, corner);
        let centered = should_center_transform(shape, action, modifiers, config);
        let session = Self {
            target,
            action,
            corner,
            origin_x: if centered { OriginX::Center } else { origin_x },
            origin_y: if centered { OriginY::Center } else { origin_y },
            original: g,
            original_origin: (origin_x, origin_y),
            start: pointer,
            last: pointer,
            offset: Point::new(pointer.x - g.left, pointer.y - g.top),
            theta: g.angle.to_radians(),
            sign_x: None,
            sign_y: None,
            modifiers,
            changed: false,
        };
        tracing::debug!(?target, action = ?session.action, corner = ?corner, centered, "transform session started");
        session
    }

    /// Whether the transform origin is the shape center on both axes.
    #[must_use]
    pub fn is_centered(&self) -> bool {
        self.origin_x == OriginX::Center && self.origin_y == OriginY::Center
    }

    /// Apply one pointer move. Returns the change kind when geometry changed.
    pub fn apply(&mut self, shape: &mut Shape, input: &MoveInput<'_>) -> Option<TransformKind> {
        self.last = input.pointer;
        let (kind, performed) = match self.action {
            ActionName::Drag => (TransformKind::Moving, drag(self, shape, input)),
            ActionName::Scale | ActionName::ScaleX | ActionName::ScaleY => {
                (TransformKind::Scaling, with_fixed_anchor(scale, self, shape, input))
            }
            ActionName::SkewX => (TransformKind::Skewing, skew_x(self, shape, input)),
            ActionName::SkewY => (TransformKind::Skewing, skew_y(self, shape, input)),
            ActionName::Rotate => (TransformKind::Rotating, with_fixed_anchor(rotate, self, shape, input)),
            ActionName::Resizing => (TransformKind::Resizing, with_fixed_anchor(change_width, self, shape, input)),
        };
        if performed {
            self.changed = true;
            Some(kind)
        } else {
            None
        }
    }
}

/// Origin implied by the pressed handle: the opposite edge on each axis the
/// handle touches, the shape's own origin otherwise.
#[must_use]
pub fn origin_from_corner(ox: OriginX, oy: OriginY, corner: Option<ControlKey>) -> (OriginX, OriginY) {
    let x = match corner {
        Some("ml" | "tl" | "bl") => OriginX::Right,
        Some("mr" | "tr" | "br") => OriginX::Left,
        _ => ox,
    };
    let y = match corner {
        Some("tl" | "mt" | "tr") => OriginY::Bottom,
        Some("bl" | "mb" | "br") => OriginY::Top,
        _ => oy,
    };
    (x, y)
}

/// Whether the session should transform around the shape center. Scaling
/// and resizing follow the centered-scaling flags, rotation the
/// centered-rotation flags; the centered key inverts the outcome.
#[must_use]
pub fn should_center_transform(shape: &Shape, action: ActionName, modifiers: Modifiers, config: &SurfaceConfig) -> bool {
    let centered = match action {
        ActionName::Scale | ActionName::ScaleX | ActionName::ScaleY | ActionName::Resizing => {
            config.centered_scaling || shape.centered_scaling
        }
        ActionName::Rotate => config.centered_rotation || shape.centered_rotation,
        _ => false,
    };
    centered != modifiers.is_held(config.centered_key)
}

// =============================================================
// Wrappers
// =============================================================

type ActionHandler = fn(&mut TransformSession, &mut Shape, &MoveInput<'_>) -> bool;

/// Run `handler` and then move the shape so the point that sat at the
/// session origin before the call sits at the (possibly swapped) session
/// origin afterwards.
fn with_fixed_anchor(handler: ActionHandler, session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    let anchor = shape.translate_to_origin_point(shape.center_point(), session.origin_x, session.origin_y);
    let performed = handler(session, shape, input);
    shape.set_position_by_origin(anchor, session.origin_x, session.origin_y);
    performed
}

/// Pointer in the shape's unrotated frame relative to `(ox, oy)`, with
/// padding and the pressed control's pixel offset removed.
fn local_point(session: &TransformSession, shape: &Shape, ox: OriginX, oy: OriginY, input: &MoveInput<'_>) -> Point {
    let zoom = if input.zoom > 0.0 { input.zoom } else { 1.0 };
    let padding = shape.geometry().padding / zoom;
    let mut p = shape.to_local_point(input.pointer, ox, oy);
    if p.x >= padding {
        p.x -= padding;
    } else if p.x <= -padding {
        p.x += padding;
    }
    if p.y >= padding {
        p.y -= padding;
    } else if p.y <= -padding {
        p.y += padding;
    }
    let controls = shape.controls();
    if let Some(control) = session.corner.and_then(|key| controls.get(key)) {
        p.x -= control.offset_x;
        p.y -= control.offset_y;
    }
    p
}

fn sign(v: f64) -> f64 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

fn is_flipped(shape: &Shape) -> bool {
    shape.geometry().flip_x != shape.geometry().flip_y
}

// =============================================================
// Handlers
// =============================================================

/// Move `left/top` to follow the pointer, honoring movement locks.
fn drag(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    let new_left = input.pointer.x - session.offset.x;
    let new_top = input.pointer.y - session.offset.y;
    let g = shape.geometry();
    let move_x = !shape.locks.movement_x && g.left != new_left;
    let move_y = !shape.locks.movement_y && g.top != new_top;
    if move_x {
        shape.set_left(new_left);
    }
    if move_y {
        shape.set_top(new_top);
    }
    move_x || move_y
}

fn scale(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    let by = match session.action {
        ActionName::ScaleX => ScaleBy::X,
        ActionName::ScaleY => ScaleBy::Y,
        _ => ScaleBy::Both,
    };
    let proportional = scale_is_proportional(input.modifiers, input.config);
    if scaling_is_forbidden(shape, by, proportional) {
        return false;
    }

    let p = local_point(session, shape, session.origin_x, session.origin_y, input);
    let sign_x = if by == ScaleBy::Y { 1.0 } else { sign(p.x) };
    let sign_y = if by == ScaleBy::X { 1.0 } else { sign(p.y) };
    let prev_x = *session.sign_x.get_or_insert(sign_x);
    let prev_y = *session.sign_y.get_or_insert(sign_y);
    if shape.locks.scaling_flip && (prev_x != sign_x || prev_y != sign_y) {
        return false;
    }

    let g = *shape.geometry();
    let dim = shape.transformed_dimensions();
    if dim.x.abs() < EPSILON || dim.y.abs() < EPSILON {
        return false;
    }
    let (mut scale_x, mut scale_y) = if proportional && by == ScaleBy::Both {
        let distance = p.x.abs() + p.y.abs();
        let original = session.original;
        let original_distance =
            (dim.x * original.scale_x / g.scale_x).abs() + (dim.y * original.scale_y / g.scale_y).abs();
        let factor = distance / original_distance;
        (original.scale_x * factor, original.scale_y * factor)
    } else {
        ((p.x * g.scale_x / dim.x).abs(), (p.y * g.scale_y / dim.y).abs())
    };
    if session.is_centered() {
        scale_x *= 2.0;
        scale_y *= 2.0;
    }
    if prev_x != sign_x && by != ScaleBy::Y {
        session.origin_x = session.origin_x.opposite();
        scale_x = -scale_x;
        session.sign_x = Some(sign_x);
    }
    if prev_y != sign_y && by != ScaleBy::X {
        session.origin_y = session.origin_y.opposite();
        scale_y = -scale_y;
        session.sign_y = Some(sign_y);
    }

    let before = (g.scale_x, g.scale_y, g.flip_x, g.flip_y);
    match by {
        ScaleBy::Both => {
            if !shape.locks.scaling_x {
                shape.set_scale_x(scale_x);
            }
            if !shape.locks.scaling_y {
                shape.set_scale_y(scale_y);
            }
        }
        ScaleBy::X => shape.set_scale_x(scale_x),
        ScaleBy::Y => shape.set_scale_y(scale_y),
    }
    let g = shape.geometry();
    before != (g.scale_x, g.scale_y, g.flip_x, g.flip_y)
}

/// Pick the horizontal origin for an X skew, then skew with the anchor fixed.
fn skew_x(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    if shape.locks.skewing_x {
        return false;
    }
    let current = shape.geometry().skew_x;
    let origin_x = if current == 0.0 {
        let from_center = local_point(session, shape, OriginX::Center, OriginY::Center, input);
        if from_center.x > 0.0 { OriginX::Left } else { OriginX::Right }
    } else {
        let top = session.origin_y == OriginY::Top;
        let ox = if (current > 0.0) == top { OriginX::Left } else { OriginX::Right };
        if is_flipped(shape) { ox.opposite() } else { ox }
    };
    session.origin_x = origin_x;
    with_fixed_anchor(skew_object_x, session, shape, input)
}

/// Y counterpart of [`skew_x`].
fn skew_y(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    if shape.locks.skewing_y {
        return false;
    }
    let current = shape.geometry().skew_y;
    let origin_y = if current == 0.0 {
        let from_center = local_point(session, shape, OriginX::Center, OriginY::Center, input);
        if from_center.y > 0.0 { OriginY::Top } else { OriginY::Bottom }
    } else {
        let left = session.origin_x == OriginX::Left;
        let oy = if (current > 0.0) == left { OriginY::Top } else { OriginY::Bottom };
        if is_flipped(shape) { oy.opposite() } else { oy }
    };
    session.origin_y = origin_y;
    with_fixed_anchor(skew_object_y, session, shape, input)
}

/// The pointer sits on the handle, half way along the skewed edge, so the
/// edge grows by twice its lateral offset.
fn skew_object_x(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    let g = *shape.geometry();
    let no_skew = shape.transformed_dimensions_with(0.0, g.skew_y);
    let p = local_point(session, shape, session.origin_x, session.origin_y, input);
    let total = (p.x * 2.0).abs() - no_skew.x;
    let new_skew = if total < SKEW_SNAP_PX {
        0.0
    } else {
        let mut skew = (total / g.scale_x).atan2(no_skew.y / g.scale_y).to_degrees();
        if session.origin_x == OriginX::Left && session.origin_y == OriginY::Bottom {
            skew = -skew;
        }
        if session.origin_x == OriginX::Right && session.origin_y == OriginY::Top {
            skew = -skew;
        }
        if is_flipped(shape) {
            skew = -skew;
        }
        skew
    };
    if g.skew_x == new_skew {
        return false;
    }
    let reference = shape.transformed_dimensions().y;
    shape.set_skew_x(new_skew);
    if shape.geometry().skew_y != 0.0 {
        let now = shape.transformed_dimensions().y;
        if now.abs() > EPSILON {
            let scale_y = reference / now * shape.geometry().scale_y;
            shape.set_scale_y(scale_y);
        }
    }
    true
}

fn skew_object_y(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    let g = *shape.geometry();
    let no_skew = shape.transformed_dimensions_with(g.skew_x, 0.0);
    let p = local_point(session, shape, session.origin_x, session.origin_y, input);
    let total = (p.y * 2.0).abs() - no_skew.y;
    let new_skew = if total < SKEW_SNAP_PX {
        0.0
    } else {
        let mut skew = (total / g.scale_y).atan2(no_skew.x / g.scale_x).to_degrees();
        if session.origin_x == OriginX::Left && session.origin_y == OriginY::Bottom {
            skew = -skew;
        }
        if session.origin_x == OriginX::Right && session.origin_y == OriginY::Top {
            skew = -skew;
        }
        if is_flipped(shape) {
            skew = -skew;
        }
        skew
    };
    if g.skew_y == new_skew {
        return false;
    }
    let reference = shape.transformed_dimensions().x;
    shape.set_skew_y(new_skew);
    if shape.geometry().skew_x != 0.0 {
        let now = shape.transformed_dimensions().x;
        if now.abs() > EPSILON {
            let scale_x = reference / now * shape.geometry().scale_x;
            shape.set_scale_x(scale_x);
        }
    }
    true
}

/// Rotate by the angle swept around the pivot since press, snapping to
/// multiples of the shape's snap angle within its threshold.
fn rotate(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    if shape.locks.rotation {
        return false;
    }
    let pivot = shape.translate_to_origin_point(shape.center_point(), session.origin_x, session.origin_y);
    let start = (session.start.y - pivot.y).atan2(session.start.x - pivot.x);
    let current = (input.pointer.y - pivot.y).atan2(input.pointer.x - pivot.x);
    let mut angle = (current - start + session.theta).to_degrees();
    if shape.snap_angle > 0.0 {
        angle = snap_angle(angle, shape.snap_angle, shape.snap_threshold);
    }
    let angle = angle.rem_euclid(360.0);
    if shape.geometry().angle == angle {
        return false;
    }
    shape.set_angle(angle);
    true
}

/// Snap `angle` to the lower multiple of `step` when within `threshold`,
/// else to the upper multiple when within `threshold`.
#[must_use]
pub fn snap_angle(angle: f64, step: f64, threshold: Option<f64>) -> f64 {
    let threshold = threshold.unwrap_or(step * DEFAULT_SNAP_THRESHOLD_RATIO);
    let lower = (angle / step).floor() * step;
    let upper = (angle / step).ceil() * step;
    if (angle - lower).abs() < threshold {
        lower
    } else if (angle - upper).abs() < threshold {
        upper
    } else {
        angle
    }
}

/// Change the unscaled width so the dragged side follows the pointer.
fn change_width(session: &mut TransformSession, shape: &mut Shape, input: &MoveInput<'_>) -> bool {
    let p = local_point(session, shape, session.origin_x, session.origin_y, input);
    let multiplier = if session.is_centered() { 2.0 } else { 1.0 };
    let g = shape.geometry();
    let old = g.width;
    let new = (p.x * multiplier / g.scale_x).abs();
    if old == new {
        return false;
    }
    shape.set_width(new);
    true
}
