//! The render context boundary.
//!
//! The pipeline draws through [`RenderContext`], a small canvas-2D style
//! state machine: a current transform, a current path, a save/restore stack,
//! a composite operation and a global alpha. Off-screen layers give
//! isolated groups: everything drawn between `begin_layer` and `end_layer`
//! is composited back in one step using the composite operation and alpha
//! that were current when the layer began. Masks (clip paths and eraser
//! strokes) are built on top of that with destination-in/destination-out.
//!
//! [`RecordingContext`] implements the trait by logging every call, which
//! is what the pipeline tests assert against.

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;

use serde::{Deserialize, Serialize};

use crate::error::{EaselError, Result};
use crate::geom::{Matrix, Point};
use crate::shape::ImageData;

/// A straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    #[must_use]
    pub fn alpha(self) -> u8 {
        self.0[3]
    }
}

/// Porter-Duff operation used when new content lands on existing pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOp {
    /// Normal painting.
    #[default]
    SourceOver,
    /// Keep existing pixels only where new content is drawn.
    DestinationIn,
    /// Remove existing pixels where new content is drawn.
    DestinationOut,
}

/// Raster drawing context required by the render pipeline.
pub trait RenderContext {
    /// Surface size in device pixels.
    fn size(&self) -> (u32, u32);

    fn save(&mut self);
    fn restore(&mut self);

    /// Replace the current transform.
    fn set_transform(&mut self, m: Matrix);
    /// Post-multiply the current transform by `m`.
    fn transform(&mut self, m: Matrix);

    /// Reset every pixel to transparent, ignoring transform and clip.
    fn clear(&mut self);

    fn begin_path(&mut self);
    fn move_to(&mut self, p: Point);
    fn line_to(&mut self, p: Point);
    fn close_path(&mut self);
    /// Add an axis-aligned rectangle sub-path.
    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    /// Add an axis-aligned ellipse sub-path.
    fn ellipse(&mut self, center: Point, rx: f64, ry: f64);

    /// Fill the current path.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the backend cannot rasterize the path.
    fn fill(&mut self, color: Rgba) -> Result<()>;

    /// Stroke the current path with `width` in current-transform units.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the backend cannot rasterize the path.
    fn stroke(&mut self, color: Rgba, width: f64) -> Result<()>;

    /// Dash pattern for subsequent strokes; empty means solid.
    fn set_line_dash(&mut self, segments: &[f64]);

    /// Intersect the clip region with the current path.
    fn clip(&mut self);

    fn set_composite(&mut self, op: CompositeOp);
    fn set_global_alpha(&mut self, alpha: f64);
    fn global_alpha(&self) -> f64;

    /// Draw `image` into the `width × height` box at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the image buffer is malformed.
    fn draw_image(&mut self, image: &ImageData, x: f64, y: f64, width: f64, height: f64) -> Result<()>;

    /// Start an isolated off-screen layer.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the layer cannot be allocated.
    fn begin_layer(&mut self) -> Result<()>;

    /// Composite the innermost layer back onto its parent.
    ///
    /// # Errors
    ///
    /// Returns `Err` when no layer is open.
    fn end_layer(&mut self) -> Result<()>;
}

// =============================================================
// Recording context
// =============================================================

/// One logged call on a [`RecordingContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    SetTransform(Matrix),
    Transform(Matrix),
    Clear,
    BeginPath,
    MoveTo(Point),
    LineTo(Point),
    ClosePath,
    Rect { x: f64, y: f64, w: f64, h: f64 },
    Ellipse { center: Point, rx: f64, ry: f64 },
    Fill { color: Rgba, composite: CompositeOp, alpha: f64 },
    Stroke { color: Rgba, width: f64, composite: CompositeOp, alpha: f64 },
    LineDash(Vec<f64>),
    Clip,
    Composite(CompositeOp),
    GlobalAlpha(f64),
    Image { width: u32, height: u32 },
    BeginLayer,
    EndLayer { composite: CompositeOp, alpha: f64 },
}

#[derive(Debug, Clone, Copy)]
struct RecordedState {
    composite: CompositeOp,
    alpha: f64,
}

/// A [`RenderContext`] that logs calls instead of drawing.
#[derive(Debug, Clone)]
pub struct RecordingContext {
    width: u32,
    height: u32,
    state: RecordedState,
    stack: Vec<RecordedState>,
    layers: Vec<RecordedState>,
    pub commands: Vec<DrawCommand>,
}

impl RecordingContext {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: RecordedState { composite: CompositeOp::SourceOver, alpha: 1.0 },
            stack: Vec::new(),
            layers: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Forget everything recorded so far.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// Number of fills and strokes recorded.
    #[must_use]
    pub fn paint_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Fill { .. } | DrawCommand::Stroke { .. }))
            .count()
    }

    /// Fill/stroke commands painted with `op`.
    #[must_use]
    pub fn paints_with(&self, op: CompositeOp) -> usize {
        self.commands
            .iter()
            .filter(|c| match c {
                DrawCommand::Fill { composite, .. } | DrawCommand::Stroke { composite, .. } => *composite == op,
                _ => false,
            })
            .count()
    }

    /// Whether a `Clear` was recorded.
    #[must_use]
    pub fn was_cleared(&self) -> bool {
        self.commands.contains(&DrawCommand::Clear)
    }
}

impl RenderContext for RecordingContext {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn save(&mut self) {
        self.stack.push(self.state);
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
        self.commands.push(DrawCommand::Restore);
    }

    fn set_transform(&mut self, m: Matrix) {
        self.commands.push(DrawCommand::SetTransform(m));
    }

    fn transform(&mut self, m: Matrix) {
        self.commands.push(DrawCommand::Transform(m));
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }

    fn move_to(&mut self, p: Point) {
        self.commands.push(DrawCommand::MoveTo(p));
    }

    fn line_to(&mut self, p: Point) {
        self.commands.push(DrawCommand::LineTo(p));
    }

    fn close_path(&mut self) {
        self.commands.push(DrawCommand::ClosePath);
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.commands.push(DrawCommand::Rect { x, y, w, h });
    }

    fn ellipse(&mut self, center: Point, rx: f64, ry: f64) {
        self.commands.push(DrawCommand::Ellipse { center, rx, ry });
    }

    fn fill(&mut self, color: Rgba) -> Result<()> {
        self.commands.push(DrawCommand::Fill { color, composite: self.state.composite, alpha: self.state.alpha });
        Ok(())
    }

    fn stroke(&mut self, color: Rgba, width: f64) -> Result<()> {
        self.commands.push(DrawCommand::Stroke {
            color,
            width,
            composite: self.state.composite,
            alpha: self.state.alpha,
        });
        Ok(())
    }

    fn set_line_dash(&mut self, segments: &[f64]) {
        self.commands.push(DrawCommand::LineDash(segments.to_vec()));
    }

    fn clip(&mut self) {
        self.commands.push(DrawCommand::Clip);
    }

    fn set_composite(&mut self, op: CompositeOp) {
        self.state.composite = op;
        self.commands.push(DrawCommand::Composite(op));
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha;
        self.commands.push(DrawCommand::GlobalAlpha(alpha));
    }

    fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    fn draw_image(&mut self, image: &ImageData, _x: f64, _y: f64, _width: f64, _height: f64) -> Result<()> {
        self.commands.push(DrawCommand::Image { width: image.width, height: image.height });
        Ok(())
    }

    fn begin_layer(&mut self) -> Result<()> {
        self.layers.push(self.state);
        self.state = RecordedState { composite: CompositeOp::SourceOver, alpha: 1.0 };
        self.commands.push(DrawCommand::BeginLayer);
        Ok(())
    }

    fn end_layer(&mut self) -> Result<()> {
        let Some(parent) = self.layers.pop() else {
            return Err(EaselError::Render("end_layer without begin_layer".into()));
        };
        self.state = parent;
        self.commands.push(DrawCommand::EndLayer { composite: parent.composite, alpha: parent.alpha });
        Ok(())
    }
}
