//! Eraser brush: stroke capture, three-pass preview, and finalization into
//! per-shape eraser masks.
//!
//! DESIGN
//! ======
//! While a stroke is in progress the surface paints three passes instead
//! of the usual main pass:
//!
//! 1. bottom: background color, non-erasable background image and every
//!    shape with erasable leaves hidden (deep groups are entered so their
//!    non-erasable children stay visible);
//! 2. top: everything that can be erased, then the stroke itself with
//!    destination-out, which cuts a hole down to the bottom pass;
//! 3. overlay: overlay color and a non-erasable overlay image, above the
//!    stroke so it is never cut.
//!
//! On release the stroke becomes a path shape. Each erasable top-level
//! shape it intersects receives the path in its own local space. Deep
//! groups push the path down to their erasable children instead, carrying
//! the group clip along so both stay effective. Shape geometry is never
//! touched: only the mask grows.

#[cfg(test)]
#[path = "eraser_test.rs"]
mod eraser_test;

use crate::context::{CompositeOp, RenderContext, Rgba};
use crate::error::Result;
use crate::geom::{Matrix, Point};
use crate::render::{DrawFilter, View, draw_backdrop_color, draw_backdrop_image, render_objects, with_saved};
use crate::scene::{BackdropSlot, Scene};
use crate::shape::{Erasable, EraserStroke, Shape, ShapeId};

/// Result of finishing a stroke, reported with `ErasingEnded`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErasureReport {
    /// The finalized stroke in scene space; `None` for an empty stroke.
    pub path: Option<Shape>,
    /// Top-level shapes the stroke intersected.
    pub targets: Vec<ShapeId>,
    /// Group children that received the stroke.
    pub sub_targets: Vec<ShapeId>,
    /// Backdrop images that received the stroke.
    pub drawables: Vec<BackdropSlot>,
}

impl ErasureReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_none()
    }
}

/// Captures the points of one erase stroke.
#[derive(Debug, Clone)]
pub struct EraserBrush {
    /// Stroke width in scene units.
    pub width: f64,
    points: Vec<Point>,
    active: bool,
}

impl EraserBrush {
    #[must_use]
    pub fn new(width: f64) -> Self {
        Self { width, points: Vec::new(), active: false }
    }

    /// Start a stroke at `p` (scene coordinates).
    pub fn begin(&mut self, p: Point) {
        self.points.clear();
        self.points.push(p);
        self.active = true;
    }

    /// Extend the stroke. Returns `false` when nothing changed: no stroke is
    /// active or `p` repeats the last point.
    pub fn add_point(&mut self, p: Point) -> bool {
        if !self.active || self.points.last() == Some(&p) {
            return false;
        }
        self.points.push(p);
        true
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Drop the stroke without applying it.
    pub fn cancel(&mut self) {
        self.points.clear();
        self.active = false;
    }

    /// The stroke as a path shape, or `None` when it has no extent.
    #[must_use]
    pub fn stroke_shape(&self) -> Option<Shape> {
        let first = *self.points.first()?;
        if self.points.len() < 2 || self.points.iter().all(|p| *p == first) {
            return None;
        }
        Some(Shape::path(self.points.clone(), Rgba::BLACK, self.width))
    }

    // --- Rendering ---

    /// Paint the three erasing passes: `bottom` receives the pass that
    /// shows through the stroke, `top` the erasable content, the stroke and
    /// the protected overlay.
    ///
    /// # Errors
    ///
    /// Propagates any context failure.
    pub fn render(&self, bottom: &mut dyn RenderContext, top: &mut dyn RenderContext, view: &View<'_>) -> Result<()> {
        render_bottom(bottom, view)?;
        render_top(top, view, |ctx| self.draw_stroke(ctx, view.vpt))?;
        render_protected_overlay(top, view)
    }

    /// Cut the in-progress stroke out of `ctx`.
    fn draw_stroke(&self, ctx: &mut dyn RenderContext, vpt: Matrix) -> Result<()> {
        let Some(first) = self.points.first().copied() else {
            return Ok(());
        };
        with_saved(ctx, |ctx| {
            ctx.set_transform(vpt);
            ctx.set_composite(CompositeOp::DestinationOut);
            ctx.begin_path();
            if self.points.len() == 1 {
                let r = self.width / 2.0;
                ctx.ellipse(first, r, r);
                return ctx.fill(Rgba::BLACK);
            }
            ctx.move_to(first);
            for p in &self.points[1..] {
                ctx.line_to(*p);
            }
            ctx.stroke(Rgba::BLACK, self.width)
        })
    }

    // --- Finalization ---

    /// End the stroke and fold it into the mask of every erasable shape
    /// and backdrop image it touches.
    pub fn finalize(&mut self, scene: &mut Scene) -> ErasureReport {
        let path = self.stroke_shape();
        self.cancel();
        let Some(path) = path else {
            tracing::debug!("empty eraser stroke discarded");
            return ErasureReport::default();
        };
        let stroke = Stroke { path, clip: None };
        let mut report = ErasureReport::default();

        for slot in [BackdropSlot::Background, BackdropSlot::Overlay] {
            if let Some(image) = scene.backdrop_mut(slot).image.as_mut().filter(|img| img.is_erasable()) {
                apply_stroke(image, &stroke, Matrix::IDENTITY, false, &mut report.sub_targets);
                report.drawables.push(slot);
            }
        }

        let targets: Vec<ShapeId> = scene
            .shapes()
            .iter()
            .filter(|s| s.is_erasable() && s.intersects(&stroke.path))
            .map(|s| s.id)
            .collect();
        for id in &targets {
            if let Some(shape) = scene.get_mut(*id) {
                apply_stroke(shape, &stroke, Matrix::IDENTITY, false, &mut report.sub_targets);
            }
        }
        report.targets = targets;

        tracing::debug!(
            targets = report.targets.len(),
            sub_targets = report.sub_targets.len(),
            drawables = report.drawables.len(),
            "eraser stroke applied"
        );
        report.path = Some(stroke.path);
        report
    }
}

impl Default for EraserBrush {
    fn default() -> Self {
        Self::new(crate::consts::ERASER_WIDTH)
    }
}

/// Shapes hidden from the bottom pass: erasable leaves and non-deep
/// erasable groups, found by descending through deep groups.
#[must_use]
pub fn bottom_filter(scene: &Scene) -> DrawFilter {
    let mut filter = DrawFilter::default();
    hide_erasable(scene.shapes(), &mut filter);
    filter
}

fn hide_erasable(shapes: &[Shape], filter: &mut DrawFilter) {
    for shape in shapes {
        if shape.is_group() && shape.erasable == Erasable::Deep {
            hide_erasable(shape.children(), filter);
        } else if shape.is_erasable() {
            filter.hidden.insert(shape.id);
        }
    }
}

fn render_bottom(ctx: &mut dyn RenderContext, view: &View<'_>) -> Result<()> {
    ctx.set_transform(Matrix::IDENTITY);
    ctx.clear();
    let background = &view.scene.background;
    draw_backdrop_color(ctx, background.color)?;
    let fixed = background.image.as_ref().filter(|img| !img.is_erasable());
    draw_backdrop_image(ctx, fixed, view.vpt, &DrawFilter::default())?;
    render_objects(ctx, view, &bottom_filter(view.scene))
}

fn render_top(
    ctx: &mut dyn RenderContext,
    view: &View<'_>,
    stroke: impl FnOnce(&mut dyn RenderContext) -> Result<()>,
) -> Result<()> {
    ctx.set_transform(Matrix::IDENTITY);
    ctx.clear();
    let scene = view.scene;
    let filter = DrawFilter::default();
    draw_backdrop_color(ctx, scene.background.color)?;
    draw_backdrop_image(ctx, scene.background.erasable_image(), view.vpt, &filter)?;
    render_objects(ctx, view, &filter)?;
    draw_backdrop_image(ctx, scene.overlay.erasable_image(), view.vpt, &filter)?;
    stroke(ctx)
}

fn render_protected_overlay(ctx: &mut dyn RenderContext, view: &View<'_>) -> Result<()> {
    let overlay = &view.scene.overlay;
    draw_backdrop_color(ctx, overlay.color)?;
    let fixed = overlay.image.as_ref().filter(|img| !img.is_erasable());
    draw_backdrop_image(ctx, fixed, view.vpt, &DrawFilter::default())
}

/// A stroke on its way down the tree: the path in scene space plus a
/// clip inherited from enclosing deep groups, in the path's own space.
#[derive(Debug, Clone)]
struct Stroke {
    path: Shape,
    clip: Option<Box<Shape>>,
}

/// Add `stroke` to `shape`, whose parent space maps to the scene by
/// `parent`. Children that receive it are recorded in `subs`.
fn apply_stroke(shape: &mut Shape, stroke: &Stroke, parent: Matrix, nested: bool, subs: &mut Vec<ShapeId>) {
    let full = parent.multiply(&shape.own_matrix());
    if shape.is_group() && shape.erasable == Erasable::Deep {
        let has_targets = shape.children().iter().any(Shape::is_erasable);
        if !has_targets {
            return;
        }
        let inherited = match &shape.clip_path {
            Some(clip) => clip_stroke(stroke, clip, full),
            None => stroke.clone(),
        };
        if let Some(children) = shape.children_mut() {
            for child in children.iter_mut().filter(|c| c.is_erasable()) {
                apply_stroke(child, &inherited, full, true, subs);
            }
        }
        return;
    }
    let Some(inverse) = full.invert() else {
        tracing::warn!(id = %shape.id, "eraser skipped a shape with a singular transform");
        return;
    };
    let mut path = stroke.path.clone();
    path.apply_transform_matrix(&inverse.multiply(&stroke.path.own_matrix()));
    if shape.add_eraser_stroke(EraserStroke { path, clip: stroke.clip.clone() }) && nested {
        subs.push(shape.id);
    }
}

/// Confine `stroke` to the clip of a container whose scene matrix is
/// `container`. The clip is re-expressed in the path's own space.
fn clip_stroke(stroke: &Stroke, clip: &Shape, container: Matrix) -> Stroke {
    let mut clip = clip.clone();
    match stroke.path.own_matrix().invert() {
        Some(path_inverse) => {
            let m = path_inverse.multiply(&container).multiply(&clip.own_matrix());
            clip.apply_transform_matrix(&m);
        }
        None => tracing::warn!("eraser path has a singular transform; group clip left in place"),
    }
    Stroke { path: stroke.path.clone(), clip: Some(Box::new(clip)) }
}
