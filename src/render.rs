//! Layered render pipeline.
//!
//! DESIGN
//! ======
//! A surface paints two layers. The main layer holds the background, every
//! shape in back-to-front order and the overlay; it is repainted only when
//! the scene changed. The top layer is a transparent sheet for interaction
//! chrome (selection border, handles, marquee) and is cleared and redrawn
//! on its own, so moving the pointer over handles never repaints the scene.
//!
//! Repaints are requested, not performed: [`FrameScheduler`] marks layers
//! dirty and reports whether a new frame had to be scheduled, so any number
//! of mutations within one tick produce one frame.
//!
//! Clip paths and eraser masks are drawn into an off-screen layer: body
//! first, then the clip with destination-in and each eraser stroke with
//! destination-out, then the layer is composited back with the shape's
//! opacity.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::collections::HashSet;

use crate::config::SurfaceConfig;
use crate::consts::SELECTION_DASH_PX;
use crate::context::{CompositeOp, RenderContext, Rgba};
use crate::error::Result;
use crate::geom::{Corners, Matrix, Point};
use crate::input::GroupSelector;
use crate::scene::{Backdrop, Scene};
use crate::selection::Selection;
use crate::shape::{EraserStroke, HandleSizes, Shape, ShapeId, ShapeKind};

/// Selection border and handle stroke color.
const BORDER_COLOR: Rgba = Rgba::new(30, 144, 255, 255);
/// Handle box fill.
const HANDLE_FILL: Rgba = Rgba::WHITE;
/// Marquee rectangle fill.
const MARQUEE_FILL: Rgba = Rgba::new(30, 144, 255, 31);
/// Border alpha while the active shape is being dragged.
const BORDER_OPACITY_WHEN_MOVING: f64 = 0.4;

// =============================================================
// Scheduling
// =============================================================

/// Which layers a frame must repaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramePlan {
    pub main: bool,
    pub top: bool,
}

/// Dirty flags plus the request/coalesce state of the next frame.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    main_dirty: bool,
    top_dirty: bool,
    requested: bool,
    frames: u64,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self { main_dirty: true, top_dirty: true, requested: false, frames: 0 }
    }
}

impl FrameScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the scene layer dirty. Returns `true` when this call scheduled
    /// a new frame, `false` when one was already pending.
    pub fn invalidate_main(&mut self) -> bool {
        self.main_dirty = true;
        self.top_dirty = true;
        self.request()
    }

    /// Mark only the chrome layer dirty.
    pub fn invalidate_top(&mut self) -> bool {
        self.top_dirty = true;
        self.request()
    }

    fn request(&mut self) -> bool {
        if self.requested {
            return false;
        }
        self.requested = true;
        true
    }

    /// Whether a frame is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    #[must_use]
    pub fn is_main_dirty(&self) -> bool {
        self.main_dirty
    }

    /// Frames started so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Consume the pending request and dirty flags.
    pub fn begin_frame(&mut self) -> FramePlan {
        let plan = FramePlan { main: self.main_dirty, top: self.top_dirty };
        self.main_dirty = false;
        self.top_dirty = false;
        self.requested = false;
        self.frames += 1;
        tracing::trace!(frame = self.frames, main = plan.main, top = plan.top, "frame started");
        plan
    }
}

// =============================================================
// Views
// =============================================================

/// Read-only inputs of one render pass.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub scene: &'a Scene,
    pub selection: &'a Selection,
    pub config: &'a SurfaceConfig,
    /// Viewport transform, scene to screen.
    pub vpt: Matrix,
}

/// Shapes skipped by a pass. Groups are still entered, so a hidden id
/// inside a visible group hides only that child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawFilter {
    pub hidden: HashSet<ShapeId>,
}

impl DrawFilter {
    #[must_use]
    pub fn hides(&self, id: ShapeId) -> bool {
        self.hidden.contains(&id)
    }
}

/// Interaction state drawn on the top layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chrome {
    pub marquee: Option<GroupSelector>,
    /// A drag is in progress: borders fade and handles hide.
    pub moving: bool,
}

// =============================================================
// Passes
// =============================================================

/// Repaint the main layer: background, shapes, overlay.
///
/// # Errors
///
/// Propagates any context failure.
pub fn render_main(ctx: &mut dyn RenderContext, view: &View<'_>, filter: &DrawFilter) -> Result<()> {
    ctx.set_transform(Matrix::IDENTITY);
    ctx.clear();
    draw_backdrop(ctx, &view.scene.background, view.vpt, filter)?;
    render_objects(ctx, view, filter)?;
    draw_backdrop(ctx, &view.scene.overlay, view.vpt, filter)
}

/// Repaint the top layer with the selection chrome and marquee.
///
/// # Errors
///
/// Propagates any context failure.
pub fn render_top(ctx: &mut dyn RenderContext, view: &View<'_>, chrome: &Chrome) -> Result<()> {
    ctx.set_transform(Matrix::IDENTITY);
    ctx.clear();
    with_saved(ctx, |ctx| draw_chrome(ctx, view, chrome))
}

/// Draw the scene's shapes under the viewport transform.
///
/// # Errors
///
/// Propagates any context failure.
pub fn render_objects(ctx: &mut dyn RenderContext, view: &View<'_>, filter: &DrawFilter) -> Result<()> {
    with_saved(ctx, |ctx| {
        ctx.set_transform(view.vpt);
        for shape in objects_to_render(view.scene, view.selection, view.config) {
            draw_shape(ctx, shape, filter)?;
        }
        Ok(())
    })
}

/// Paint order. Members of a multi-selection are drawn last unless the
/// surface preserves stacking.
#[must_use]
pub fn objects_to_render<'a>(scene: &'a Scene, selection: &Selection, config: &SurfaceConfig) -> Vec<&'a Shape> {
    let Selection::Multi(group) = selection else {
        return scene.shapes().iter().collect();
    };
    if config.preserve_object_stacking {
        return scene.shapes().iter().collect();
    }
    let (active, rest): (Vec<&Shape>, Vec<&Shape>) = scene.shapes().iter().partition(|s| group.contains(s.id));
    rest.into_iter().chain(active).collect()
}

/// Fill the whole surface with a flat color.
///
/// # Errors
///
/// Propagates any context failure.
pub fn draw_backdrop_color(ctx: &mut dyn RenderContext, color: Option<Rgba>) -> Result<()> {
    let Some(color) = color else {
        return Ok(());
    };
    with_saved(ctx, |ctx| {
        let (w, h) = ctx.size();
        ctx.set_transform(Matrix::IDENTITY);
        ctx.begin_path();
        ctx.rect(0.0, 0.0, f64::from(w), f64::from(h));
        ctx.fill(color)
    })
}

/// Draw a backdrop image shape under the viewport transform.
///
/// # Errors
///
/// Propagates any context failure.
pub fn draw_backdrop_image(ctx: &mut dyn RenderContext, image: Option<&Shape>, vpt: Matrix, filter: &DrawFilter) -> Result<()> {
    let Some(image) = image else {
        return Ok(());
    };
    with_saved(ctx, |ctx| {
        ctx.set_transform(vpt);
        draw_shape(ctx, image, filter)
    })
}

fn draw_backdrop(ctx: &mut dyn RenderContext, backdrop: &Backdrop, vpt: Matrix, filter: &DrawFilter) -> Result<()> {
    draw_backdrop_color(ctx, backdrop.color)?;
    draw_backdrop_image(ctx, backdrop.image.as_ref(), vpt, filter)
}

// =============================================================
// Shapes
// =============================================================

/// Draw `shape` in the context's current space (its parent's space).
///
/// # Errors
///
/// Propagates any context failure.
pub fn draw_shape(ctx: &mut dyn RenderContext, shape: &Shape, filter: &DrawFilter) -> Result<()> {
    if !shape.visible || shape.style.opacity <= 0.0 || filter.hides(shape.id) {
        return Ok(());
    }
    with_saved(ctx, |ctx| {
        ctx.transform(shape.own_matrix());
        let alpha = ctx.global_alpha() * shape.style.opacity;
        ctx.set_global_alpha(alpha);
        if shape.clip_path.is_some() || shape.eraser.is_some() {
            draw_masked(ctx, shape, filter)
        } else {
            draw_body(ctx, shape, filter)
        }
    })
}

fn draw_body(ctx: &mut dyn RenderContext, shape: &Shape, filter: &DrawFilter) -> Result<()> {
    match &shape.kind {
        ShapeKind::Group { children } => {
            for child in children {
                draw_shape(ctx, child, filter)?;
            }
            Ok(())
        }
        ShapeKind::Image { data, .. } => {
            let g = shape.geometry();
            if let Some(data) = data {
                ctx.draw_image(data, -g.width / 2.0, -g.height / 2.0, g.width, g.height)?;
            }
            paint_outline(ctx, shape, None)
        }
        _ => paint_outline(ctx, shape, shape.style.fill),
    }
}

/// Fill with `fill` and stroke with the shape's stroke style.
fn paint_outline(ctx: &mut dyn RenderContext, shape: &Shape, fill: Option<Rgba>) -> Result<()> {
    let stroke = shape.style.stroke.filter(|_| shape.style.stroke_width > 0.0);
    if fill.is_none() && stroke.is_none() {
        return Ok(());
    }
    trace_outline(ctx, shape);
    if let Some(fill) = fill {
        ctx.fill(fill)?;
    }
    if let Some(stroke) = stroke {
        ctx.stroke(stroke, shape.style.stroke_width)?;
    }
    Ok(())
}

/// Replace the current path with the shape's outline in its local space.
fn trace_outline(ctx: &mut dyn RenderContext, shape: &Shape) {
    let g = shape.geometry();
    let half = Point::new(g.width / 2.0, g.height / 2.0);
    ctx.begin_path();
    match &shape.kind {
        ShapeKind::Ellipse => ctx.ellipse(Point::default(), half.x, half.y),
        ShapeKind::Polygon { points } => {
            trace_polyline(ctx, points.iter().map(|p| *p - half));
            ctx.close_path();
        }
        ShapeKind::Path { points, offset } => trace_polyline(ctx, points.iter().map(|p| *p - *offset)),
        ShapeKind::Rect | ShapeKind::Image { .. } | ShapeKind::Textbox(_) | ShapeKind::Group { .. } => {
            ctx.rect(-half.x, -half.y, g.width, g.height);
        }
    }
}

fn trace_polyline(ctx: &mut dyn RenderContext, points: impl Iterator<Item = Point>) {
    for (i, p) in points.enumerate() {
        if i == 0 {
            ctx.move_to(p);
        } else {
            ctx.line_to(p);
        }
    }
}

fn draw_masked(ctx: &mut dyn RenderContext, shape: &Shape, filter: &DrawFilter) -> Result<()> {
    ctx.begin_layer()?;
    let drawn = draw_masked_layer(ctx, shape, filter);
    let closed = ctx.end_layer();
    drawn.and(closed)
}

fn draw_masked_layer(ctx: &mut dyn RenderContext, shape: &Shape, filter: &DrawFilter) -> Result<()> {
    draw_body(ctx, shape, filter)?;
    let base = shape.eraser.as_ref().and_then(|m| m.base_clip.as_deref());
    for clip in [shape.clip_path.as_deref(), base].into_iter().flatten() {
        with_saved(ctx, |ctx| {
            ctx.set_composite(CompositeOp::DestinationIn);
            draw_silhouette(ctx, clip)
        })?;
    }
    if let Some(mask) = &shape.eraser {
        for stroke in &mask.strokes {
            erase_stroke(ctx, stroke)?;
        }
    }
    Ok(())
}

/// Cut one stroke out of the current layer. A stroke confined to a clip is
/// first intersected with the clip in a layer of its own.
fn erase_stroke(ctx: &mut dyn RenderContext, stroke: &EraserStroke) -> Result<()> {
    with_saved(ctx, |ctx| {
        ctx.set_composite(CompositeOp::DestinationOut);
        let Some(clip) = &stroke.clip else {
            return draw_silhouette(ctx, &stroke.path);
        };
        ctx.begin_layer()?;
        let drawn = draw_silhouette(ctx, &stroke.path).and_then(|()| {
            with_saved(ctx, |ctx| {
                ctx.transform(stroke.path.own_matrix());
                ctx.set_composite(CompositeOp::DestinationIn);
                draw_silhouette(ctx, clip)
            })
        });
        let closed = ctx.end_layer();
        drawn.and(closed)
    })
}

/// Opaque coverage of `shape`: filled outline, stroked for paths.
pub(crate) fn draw_silhouette(ctx: &mut dyn RenderContext, shape: &Shape) -> Result<()> {
    with_saved(ctx, |ctx| {
        ctx.transform(shape.own_matrix());
        match &shape.kind {
            ShapeKind::Group { children } => {
                for child in children {
                    draw_silhouette(ctx, child)?;
                }
                Ok(())
            }
            ShapeKind::Path { .. } => {
                trace_outline(ctx, shape);
                ctx.stroke(Rgba::BLACK, shape.style.stroke_width.max(1.0))
            }
            _ => {
                trace_outline(ctx, shape);
                ctx.fill(Rgba::BLACK)
            }
        }
    })
}

/// Run `draw` between `save` and `restore`, restoring even on error.
pub(crate) fn with_saved(
    ctx: &mut dyn RenderContext,
    draw: impl FnOnce(&mut dyn RenderContext) -> Result<()>,
) -> Result<()> {
    ctx.save();
    let result = draw(ctx);
    ctx.restore();
    result
}

// =============================================================
// Chrome
// =============================================================

fn draw_chrome(ctx: &mut dyn RenderContext, view: &View<'_>, chrome: &Chrome) -> Result<()> {
    ctx.set_transform(Matrix::IDENTITY);
    if let Some(active) = view.selection.active_shape(view.scene) {
        ctx.set_global_alpha(if chrome.moving { BORDER_OPACITY_WHEN_MOVING } else { 1.0 });
        if let Selection::Multi(group) = view.selection {
            ctx.set_line_dash(&[SELECTION_DASH_PX, SELECTION_DASH_PX]);
            for member in group.member_ids().into_iter().filter_map(|id| view.scene.get(id)) {
                stroke_corners(ctx, &member.line_coords(&view.vpt), BORDER_COLOR)?;
            }
            ctx.set_line_dash(&[]);
        }
        stroke_corners(ctx, &active.line_coords(&view.vpt), BORDER_COLOR)?;
        if active.has_controls && !chrome.moving {
            draw_handles(ctx, active, view)?;
        }
        ctx.set_global_alpha(1.0);
    }
    if let Some(marquee) = chrome.marquee {
        draw_marquee(ctx, &marquee, view.vpt)?;
    }
    Ok(())
}

fn draw_handles(ctx: &mut dyn RenderContext, shape: &Shape, view: &View<'_>) -> Result<()> {
    let sizes = HandleSizes { corner: view.config.corner_size, touch: view.config.touch_corner_size };
    let controls = shape.controls();
    let dim = shape.screen_dimensions(&view.vpt);
    let m = shape.handle_matrix(&view.vpt);
    for handle in shape.handle_coords(&view.vpt, sizes).iter() {
        if !shape.is_control_visible(handle.key) {
            continue;
        }
        let Some(control) = controls.get(handle.key) else {
            continue;
        };
        if control.with_connection {
            let edge = m.apply(Point::new(control.x * dim.x, control.y * dim.y));
            ctx.begin_path();
            ctx.move_to(edge);
            ctx.line_to(handle.position);
            ctx.stroke(BORDER_COLOR, 1.0)?;
        }
        trace_corners(ctx, &handle.corner);
        ctx.fill(HANDLE_FILL)?;
        ctx.stroke(BORDER_COLOR, 1.0)?;
    }
    Ok(())
}

fn draw_marquee(ctx: &mut dyn RenderContext, marquee: &GroupSelector, vpt: Matrix) -> Result<()> {
    let a = vpt.apply(marquee.start);
    let b = vpt.apply(marquee.current);
    let lo = a.min(b);
    let hi = a.max(b);
    ctx.begin_path();
    ctx.rect(lo.x, lo.y, hi.x - lo.x, hi.y - lo.y);
    ctx.fill(MARQUEE_FILL)?;
    ctx.set_line_dash(&[SELECTION_DASH_PX, SELECTION_DASH_PX]);
    let stroked = ctx.stroke(BORDER_COLOR, 1.0);
    ctx.set_line_dash(&[]);
    stroked
}

fn trace_corners(ctx: &mut dyn RenderContext, corners: &Corners) {
    ctx.begin_path();
    trace_polyline(ctx, corners.points().into_iter());
    ctx.close_path();
}

fn stroke_corners(ctx: &mut dyn RenderContext, corners: &Corners, color: Rgba) -> Result<()> {
    trace_corners(ctx, corners);
    ctx.stroke(color, 1.0)
}
