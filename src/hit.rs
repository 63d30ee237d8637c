//! Target resolution: map a screen point to a handle, a shape, or a nested
//! sub-target.
//!
//! Resolution order:
//! 1. Handles of the active shape (or multi-selection frame), last control
//!    first, so later controls win where boxes overlap.
//! 2. The active shape's body. Returned immediately for a multi-selection,
//!    and for a single shape unless the surface preserves stacking.
//! 3. Every top-level shape, topmost first. A hit group with sub-target
//!    checking is searched the same way and reports the children it hit,
//!    deepest first.
//!
//! Top-level shapes are tested against their viewport line coordinates.
//! Children are tested in their parent's space by inverting the
//! viewport-and-ancestor matrix. With per-pixel hits on, a geometric hit is
//! confirmed by rendering the shape into a tiny raster around the pointer.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::context::RenderContext;
use crate::control::{ControlKey, Cursor};
use crate::geom::{Matrix, Point};
use crate::input::{Modifiers, PointerKind};
use crate::raster::RasterContext;
use crate::render::{DrawFilter, View, draw_shape};
use crate::selection::Selection;
use crate::shape::{CoordSpace, HandleSizes, Shape, ShapeId};

/// What was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Shape(ShapeId),
    /// The multi-selection aggregate.
    ActiveSelection,
}

/// Which part of the target was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    Control(ControlKey),
}

/// A resolved pointer target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub target: HitTarget,
    pub part: HitPart,
    /// Hit children of sub-target-checking groups, deepest first.
    pub sub_targets: Vec<ShapeId>,
}

impl Hit {
    fn body(target: HitTarget, sub_targets: Vec<ShapeId>) -> Self {
        Self { target, part: HitPart::Body, sub_targets }
    }

    /// The handle key, when a handle was hit.
    #[must_use]
    pub fn control(&self) -> Option<ControlKey> {
        match self.part {
            HitPart::Control(key) => Some(key),
            HitPart::Body => None,
        }
    }
}

/// Resolve the target under `pointer` (screen coordinates).
#[must_use]
pub fn find_target(view: &View<'_>, pointer: Point, kind: PointerKind) -> Option<Hit> {
    if view.config.skip_target_find {
        return None;
    }
    if let Some(active) = view.selection.active_shape(view.scene) {
        let target = active_target(view.selection)?;
        if let Some(key) = find_control(view, active, pointer, kind) {
            return Some(Hit { target, part: HitPart::Control(key), sub_targets: Vec::new() });
        }
        let mut subs = Vec::new();
        let body = match view.selection {
            // The frame draws nothing, so it is tested geometrically only.
            Selection::Multi(_) => is_evented(active) && contains(view, active, None, pointer),
            _ => !view.config.preserve_object_stacking && check_target(view, active, None, pointer),
        };
        if body {
            search_children(view, active, Matrix::IDENTITY, pointer, &mut subs);
            return Some(Hit::body(target, subs));
        }
    }
    let mut subs = Vec::new();
    let shape = search(view, view.scene.shapes(), None, pointer, &mut subs)?;
    Some(Hit::body(HitTarget::Shape(shape.id), subs))
}

/// Topmost top-level shape under `pointer`, ignoring handles and the active
/// selection.
#[must_use]
pub fn find_shape(view: &View<'_>, pointer: Point) -> Option<ShapeId> {
    if view.config.skip_target_find {
        return None;
    }
    view.scene.shapes().iter().rev().find(|s| check_target(view, s, None, pointer)).map(|s| s.id)
}

/// The handle of `shape` under `pointer`, checked in reverse control order.
#[must_use]
pub fn find_control(view: &View<'_>, shape: &Shape, pointer: Point, kind: PointerKind) -> Option<ControlKey> {
    if !shape.has_controls {
        return None;
    }
    let sizes = HandleSizes { corner: view.config.corner_size, touch: view.config.touch_corner_size };
    let coords = shape.handle_coords(&view.vpt, sizes);
    coords
        .iter()
        .rev()
        .filter(|h| shape.is_control_visible(h.key))
        .find(|h| match kind {
            PointerKind::Touch => h.touch_corner.contains(pointer),
            PointerKind::Mouse => h.corner.contains(pointer),
        })
        .map(|h| h.key)
}

/// The shape a hit refers to: a scene shape or the multi-selection frame.
#[must_use]
pub fn resolve<'a>(view: &View<'a>, target: HitTarget) -> Option<&'a Shape> {
    match target {
        HitTarget::Shape(id) => view.scene.get(id),
        HitTarget::ActiveSelection => match view.selection {
            Selection::Multi(group) => Some(group.frame()),
            _ => None,
        },
    }
}

/// Cursor for hovering `hit`: the handle's rotated cursor, `move` over a
/// body, `default` over empty canvas.
#[must_use]
pub fn hover_cursor(view: &View<'_>, hit: Option<&Hit>, modifiers: Modifiers) -> Cursor {
    let Some(hit) = hit else {
        return Cursor::Default;
    };
    let Some(shape) = resolve(view, hit.target) else {
        return Cursor::Default;
    };
    match hit.part {
        HitPart::Body => Cursor::Move,
        HitPart::Control(key) => {
            shape.controls().get(key).map_or(Cursor::Default, |c| c.cursor(shape, modifiers, view.config))
        }
    }
}

fn active_target(selection: &Selection) -> Option<HitTarget> {
    match selection {
        Selection::Empty => None,
        Selection::Single(id) => Some(HitTarget::Shape(*id)),
        Selection::Multi(_) => Some(HitTarget::ActiveSelection),
    }
}

/// Topmost shape in `shapes` containing `pointer`. `parent` is the scene
/// matrix of the enclosing group, `None` at the top level.
fn search<'a>(
    view: &View<'a>,
    shapes: &'a [Shape],
    parent: Option<Matrix>,
    pointer: Point,
    subs: &mut Vec<ShapeId>,
) -> Option<&'a Shape> {
    let shape = shapes.iter().rev().find(|s| check_target(view, s, parent, pointer))?;
    search_children(view, shape, parent.unwrap_or(Matrix::IDENTITY), pointer, subs);
    Some(shape)
}

fn search_children(view: &View<'_>, shape: &Shape, parent: Matrix, pointer: Point, subs: &mut Vec<ShapeId>) {
    if !shape.sub_target_check || !shape.is_group() {
        return;
    }
    let inner = parent.multiply(&shape.own_matrix());
    if let Some(sub) = search(view, shape.children(), Some(inner), pointer, subs) {
        subs.push(sub.id);
    }
}

fn is_evented(shape: &Shape) -> bool {
    shape.visible && shape.evented
}

/// Geometric containment in the space implied by `parent`.
fn contains(view: &View<'_>, shape: &Shape, parent: Option<Matrix>, pointer: Point) -> bool {
    match parent {
        None => shape.contains_point(pointer, CoordSpace::Viewport(view.vpt)),
        Some(m) => view
            .vpt
            .multiply(&m)
            .invert()
            .is_some_and(|inv| shape.contains_point(inv.apply(pointer), CoordSpace::Absolute)),
    }
}

fn check_target(view: &View<'_>, shape: &Shape, parent: Option<Matrix>, pointer: Point) -> bool {
    if !is_evented(shape) || !contains(view, shape, parent, pointer) {
        return false;
    }
    if view.config.per_pixel_target_find || shape.per_pixel_target_find {
        return !is_target_transparent(view, shape, parent.unwrap_or(Matrix::IDENTITY), pointer);
    }
    true
}

/// Render `shape` alone into a `(2t+1)²` raster centered on the pointer
/// pixel and report whether every pixel stayed transparent.
fn is_target_transparent(view: &View<'_>, shape: &Shape, parent: Matrix, pointer: Point) -> bool {
    let tolerance = view.config.target_find_tolerance;
    let side = tolerance.saturating_mul(2).saturating_add(1);
    let mut raster = match RasterContext::new(side, side) {
        Ok(raster) => raster,
        Err(e) => {
            tracing::warn!(error = %e, "per-pixel hit raster unavailable; treating shape as opaque");
            return false;
        }
    };
    let t = f64::from(tolerance);
    let origin = Matrix::translate(t - pointer.x.floor(), t - pointer.y.floor());
    raster.set_transform(origin.multiply(&view.vpt).multiply(&parent));
    if let Err(e) = draw_shape(&mut raster, shape, &DrawFilter::default()) {
        tracing::warn!(error = %e, id = %shape.id, "per-pixel hit render failed; treating shape as opaque");
        return false;
    }
    !raster.any_opaque()
}
