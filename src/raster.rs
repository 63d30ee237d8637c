//! tiny-skia backed [`RenderContext`].
//!
//! Paths are accumulated in device space: every point is pushed through the
//! current transform as it is added, so a later `set_transform` never moves
//! geometry that is already in the path. Stroke widths and dash lengths are
//! scaled by the transform's area factor.
//!
//! Off-screen layers are a stack of pixmaps. `begin_layer` records the
//! composite, alpha and clip in force and resets them; `end_layer` draws the
//! layer pixmap onto its parent with the recorded values. Drawing the whole
//! layer (not only its covered pixels) is what lets a destination-in layer
//! clear everything outside the clip.

// Pixel coordinates and alpha travel as f32/u8 through tiny-skia.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, IntSize, Mask, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, StrokeDash, Transform,
};

use crate::context::{CompositeOp, RenderContext, Rgba};
use crate::error::{EaselError, Result};
use crate::geom::{Matrix, Point};
use crate::shape::ImageData;

#[derive(Clone)]
enum Segment {
    Move(Point),
    Line(Point),
    Close,
    Shape(Path),
}

#[derive(Clone)]
struct State {
    transform: Matrix,
    composite: CompositeOp,
    alpha: f64,
    clip: Option<Mask>,
    dash: Vec<f64>,
}

impl Default for State {
    fn default() -> Self {
        Self { transform: Matrix::IDENTITY, composite: CompositeOp::SourceOver, alpha: 1.0, clip: None, dash: Vec::new() }
    }
}

struct Layer {
    pixmap: Pixmap,
    composite: CompositeOp,
    alpha: f64,
    clip: Option<Mask>,
}

/// A raster surface with canvas-2D style state.
pub struct RasterContext {
    width: u32,
    height: u32,
    base: Pixmap,
    layers: Vec<Layer>,
    state: State,
    stack: Vec<State>,
    path: Vec<Segment>,
}

impl std::fmt::Debug for RasterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterContext")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layers", &self.layers.len())
            .field("saved", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl RasterContext {
    /// Allocate a transparent `width × height` surface.
    ///
    /// # Errors
    ///
    /// Returns [`EaselError::Raster`] for a zero or oversized surface.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let base = Pixmap::new(width, height).ok_or(EaselError::Raster { width, height })?;
        Ok(Self {
            width,
            height,
            base,
            layers: Vec::new(),
            state: State::default(),
            stack: Vec::new(),
            path: Vec::new(),
        })
    }

    /// The base surface.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.base
    }

    /// Premultiplied alpha of the base pixel at `(x, y)`; zero outside.
    #[must_use]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.base.pixel(x, y).map_or(0, |p| p.alpha())
    }

    /// Whether any base pixel has non-zero alpha.
    #[must_use]
    pub fn any_opaque(&self) -> bool {
        self.base.data().chunks_exact(4).any(|px| px[3] > 0)
    }

    /// Paint `other` over this surface with source-over.
    pub fn composite_over(&mut self, other: &RasterContext) {
        self.base.draw_pixmap(0, 0, other.base.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
    }

    /// Encode the base surface as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`EaselError::Encode`] when the encoder fails.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.base.encode_png().map_err(|e| EaselError::Encode(e.to_string()))
    }

    /// The pixmap drawn into (innermost layer or base) and the clip in force.
    fn target(&mut self) -> (&mut Pixmap, Option<&Mask>) {
        let pixmap = match self.layers.last_mut() {
            Some(layer) => &mut layer.pixmap,
            None => &mut self.base,
        };
        (pixmap, self.state.clip.as_ref())
    }

    fn device(&self, p: Point) -> Point {
        self.state.transform.apply(p)
    }

    fn build_path(&self) -> Option<Path> {
        let mut pb = PathBuilder::new();
        for segment in &self.path {
            match segment {
                Segment::Move(p) => pb.move_to(p.x as f32, p.y as f32),
                Segment::Line(p) => pb.line_to(p.x as f32, p.y as f32),
                Segment::Close => pb.close(),
                Segment::Shape(path) => pb.push_path(path),
            }
        }
        pb.finish()
    }

    fn paint(&self, color: Rgba) -> Paint<'static> {
        let [r, g, b, a] = color.0;
        let alpha = (f64::from(a) * self.state.alpha.clamp(0.0, 1.0)).round() as u8;
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(r, g, b, alpha));
        paint.anti_alias = true;
        paint.blend_mode = blend_mode(self.state.composite);
        paint
    }

    /// Square root of the transform's area factor.
    fn scale_factor(&self) -> f64 {
        let [a, b, c, d, ..] = self.state.transform.0;
        (a * d - b * c).abs().sqrt()
    }
}

fn blend_mode(op: CompositeOp) -> BlendMode {
    match op {
        CompositeOp::SourceOver => BlendMode::SourceOver,
        CompositeOp::DestinationIn => BlendMode::DestinationIn,
        CompositeOp::DestinationOut => BlendMode::DestinationOut,
    }
}

fn to_transform(m: &Matrix) -> Transform {
    let [a, b, c, d, e, f] = m.0;
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

impl RenderContext for RasterContext {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn set_transform(&mut self, m: Matrix) {
        self.state.transform = m;
    }

    fn transform(&mut self, m: Matrix) {
        self.state.transform = self.state.transform.multiply(&m);
    }

    fn clear(&mut self) {
        self.target().0.fill(Color::TRANSPARENT);
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, p: Point) {
        let p = self.device(p);
        self.path.push(Segment::Move(p));
    }

    fn line_to(&mut self, p: Point) {
        let p = self.device(p);
        self.path.push(Segment::Line(p));
    }

    fn close_path(&mut self) {
        self.path.push(Segment::Close);
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let corners = [Point::new(x, y), Point::new(x + w, y), Point::new(x + w, y + h), Point::new(x, y + h)];
        self.move_to(corners[0]);
        for p in &corners[1..] {
            self.line_to(*p);
        }
        self.close_path();
    }

    fn ellipse(&mut self, center: Point, rx: f64, ry: f64) {
        let Some(oval) = Rect::from_xywh((center.x - rx) as f32, (center.y - ry) as f32, (2.0 * rx) as f32, (2.0 * ry) as f32)
        else {
            return;
        };
        let transformed = PathBuilder::from_oval(oval).and_then(|p| p.transform(to_transform(&self.state.transform)));
        if let Some(path) = transformed {
            self.path.push(Segment::Shape(path));
        }
    }

    fn fill(&mut self, color: Rgba) -> Result<()> {
        let Some(path) = self.build_path() else {
            return Ok(());
        };
        let paint = self.paint(color);
        let (pixmap, clip) = self.target();
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), clip);
        Ok(())
    }

    fn stroke(&mut self, color: Rgba, width: f64) -> Result<()> {
        let Some(path) = self.build_path() else {
            return Ok(());
        };
        let factor = self.scale_factor();
        let mut stroke = Stroke { width: (width * factor) as f32, ..Stroke::default() };
        if !self.state.dash.is_empty() {
            let segments = self.state.dash.iter().map(|d| (d * factor) as f32).collect();
            stroke.dash = StrokeDash::new(segments, 0.0);
        }
        let paint = self.paint(color);
        let (pixmap, clip) = self.target();
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), clip);
        Ok(())
    }

    fn set_line_dash(&mut self, segments: &[f64]) {
        self.state.dash = segments.to_vec();
    }

    fn clip(&mut self) {
        let Some(path) = self.build_path() else {
            return;
        };
        match &mut self.state.clip {
            Some(mask) => mask.intersect_path(&path, FillRule::Winding, true, Transform::identity()),
            None => match Mask::new(self.width, self.height) {
                Some(mut mask) => {
                    mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
                    self.state.clip = Some(mask);
                }
                None => tracing::warn!(width = self.width, height = self.height, "clip mask allocation failed"),
            },
        }
    }

    fn set_composite(&mut self, op: CompositeOp) {
        self.state.composite = op;
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha;
    }

    fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    fn draw_image(&mut self, image: &ImageData, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        let malformed = || EaselError::Render(format!("malformed {}x{} image buffer", image.width, image.height));
        let size = IntSize::from_wh(image.width, image.height).ok_or_else(malformed)?;
        let pixmap = Pixmap::from_vec(image.pixels.clone(), size).ok_or_else(malformed)?;
        let placement = self
            .state
            .transform
            .multiply(&Matrix::translate(x, y))
            .multiply(&Matrix::scale(width / f64::from(image.width), height / f64::from(image.height)));
        let paint = PixmapPaint {
            opacity: self.state.alpha.clamp(0.0, 1.0) as f32,
            blend_mode: blend_mode(self.state.composite),
            quality: FilterQuality::Bilinear,
        };
        let (target, clip) = self.target();
        target.draw_pixmap(0, 0, pixmap.as_ref(), &paint, to_transform(&placement), clip);
        Ok(())
    }

    fn begin_layer(&mut self) -> Result<()> {
        let pixmap = Pixmap::new(self.width, self.height).ok_or(EaselError::Raster { width: self.width, height: self.height })?;
        self.layers.push(Layer {
            pixmap,
            composite: self.state.composite,
            alpha: self.state.alpha,
            clip: self.state.clip.clone(),
        });
        self.state.composite = CompositeOp::SourceOver;
        self.state.alpha = 1.0;
        Ok(())
    }

    fn end_layer(&mut self) -> Result<()> {
        let Some(layer) = self.layers.pop() else {
            return Err(EaselError::Render("end_layer without begin_layer".into()));
        };
        self.state.composite = layer.composite;
        self.state.alpha = layer.alpha;
        let paint = PixmapPaint {
            opacity: layer.alpha.clamp(0.0, 1.0) as f32,
            blend_mode: blend_mode(layer.composite),
            quality: FilterQuality::Nearest,
        };
        self.target().0.draw_pixmap(0, 0, layer.pixmap.as_ref(), &paint, Transform::identity(), layer.clip.as_ref());
        Ok(())
    }
}
