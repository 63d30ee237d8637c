//! Shapes: positioned, transformable drawables and their coordinate caches.
//!
//! DESIGN
//! ======
//! Geometry (`left`, `top`, size, scale, skew, angle, flip, origin anchors)
//! is private behind setters. Every setter bumps a per-shape generation
//! counter. The three derived coordinate sets are cached together with the
//! generation (and, for screen-space sets, the viewport matrix and handle
//! sizes) they were computed for, and recomputed on the first read after a
//! mismatch. A stale cache read is therefore impossible: there is no flag
//! to forget to reset.
//!
//! `left`/`top` locate the origin anchor, not necessarily the top-left
//! corner. With the default `Left`/`Top` origin they coincide.
//!
//! Groups own their children. A child's geometry is relative to the group
//! center, so a child's full matrix is the group's matrix times its own.

#[cfg(test)]
#[path = "shape_test.rs"]
mod shape_test;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::MIN_SCALE;
use crate::context::Rgba;
use crate::control::{ControlKey, ControlSet};
use crate::geom::{self, ComposeOptions, Corners, Matrix, Point};

pub type ShapeId = Uuid;

// =============================================================
// Origins
// =============================================================

/// Horizontal origin anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginX {
    #[default]
    Left,
    Center,
    Right,
}

impl OriginX {
    /// Offset from the center as a fraction of the width.
    #[must_use]
    pub fn offset(self) -> f64 {
        match self {
            Self::Left => -0.5,
            Self::Center => 0.0,
            Self::Right => 0.5,
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Center => Self::Center,
            Self::Right => Self::Left,
        }
    }
}

/// Vertical origin anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginY {
    #[default]
    Top,
    Center,
    Bottom,
}

impl OriginY {
    /// Offset from the center as a fraction of the height.
    #[must_use]
    pub fn offset(self) -> f64 {
        match self {
            Self::Top => -0.5,
            Self::Center => 0.0,
            Self::Bottom => 0.5,
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Center => Self::Center,
            Self::Bottom => Self::Top,
        }
    }
}

// =============================================================
// Data
// =============================================================

/// Geometry fields. Read through [`Shape::geometry`], write through setters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    /// Rotation in degrees, clockwise.
    pub angle: f64,
    pub flip_x: bool,
    pub flip_y: bool,
    pub origin_x: OriginX,
    pub origin_y: OriginY,
    /// Extra hit area around the box, in screen pixels.
    pub padding: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
            angle: 0.0,
            flip_x: false,
            flip_y: false,
            origin_x: OriginX::Left,
            origin_y: OriginY::Top,
            padding: 0.0,
        }
    }
}

/// Partial geometry update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeometryPatch {
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub skew_x: Option<f64>,
    pub skew_y: Option<f64>,
    pub angle: Option<f64>,
    pub flip_x: Option<bool>,
    pub flip_y: Option<bool>,
    pub origin_x: Option<OriginX>,
    pub origin_y: Option<OriginY>,
    pub padding: Option<f64>,
}

/// Fill/stroke descriptor passed through to rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub fill: Option<Rgba>,
    pub stroke: Option<Rgba>,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self { fill: Some(Rgba::BLACK), stroke: None, stroke_width: 1.0, opacity: 1.0 }
    }
}

/// Interaction locks. A locked axis ignores mutation requests.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locks {
    pub movement_x: bool,
    pub movement_y: bool,
    pub scaling_x: bool,
    pub scaling_y: bool,
    pub rotation: bool,
    pub skewing_x: bool,
    pub skewing_y: bool,
    /// Refuse to flip when a handle is dragged past the origin.
    pub scaling_flip: bool,
}

/// How a shape reacts to the eraser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Erasable {
    /// Never receives a mask.
    No,
    /// Receives a mask of its own.
    #[default]
    Yes,
    /// Groups only: masks are pushed down to erasable children.
    Deep,
}

/// Decoded raster pixels, premultiplied RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Text content of a text box. Glyph layout is delegated to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBlock {
    pub text: String,
    pub font_family: Option<String>,
    pub font_size: f64,
}

impl Default for TextBlock {
    fn default() -> Self {
        Self { text: String::new(), font_family: None, font_size: 16.0 }
    }
}

/// What a shape draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    Rect,
    Ellipse,
    /// Closed polygon; points are relative to the box's top-left corner.
    Polygon { points: Vec<Point> },
    /// Open polyline, stroked. Points are drawn relative to `offset`.
    Path { points: Vec<Point>, offset: Point },
    Image {
        src: String,
        #[serde(skip)]
        data: Option<Arc<ImageData>>,
    },
    Textbox(TextBlock),
    Group { children: Vec<Shape> },
}

/// One erase stroke stored in a shape's local space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraserStroke {
    pub path: Shape,
    /// A container clip the stroke is confined to, in the stroke's own space.
    pub clip: Option<Box<Shape>>,
}

/// Accumulated erasure of one shape: everything inside `base_clip` (when
/// present) minus every stroke.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EraserMask {
    pub base_clip: Option<Box<Shape>>,
    pub strokes: Vec<EraserStroke>,
}

/// Which coordinate set a containment or corner query uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordSpace {
    /// Object-space corners, before the viewport transform.
    Absolute,
    /// Corners through the given viewport transform, with padding.
    Viewport(Matrix),
}

/// Screen position and hit boxes of one control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleCoords {
    pub key: ControlKey,
    pub position: Point,
    pub corner: Corners,
    pub touch_corner: Corners,
}

/// Handle box sizes used when computing [`HandleCoords`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleSizes {
    pub corner: f64,
    pub touch: f64,
}

type HandleCacheEntry = (u64, Matrix, HandleSizes, Arc<[HandleCoords]>);

#[derive(Debug, Clone, Default)]
struct CoordCache {
    absolute: Cell<Option<(u64, Corners)>>,
    line: Cell<Option<(u64, Matrix, Corners)>>,
    handles: RefCell<Option<HandleCacheEntry>>,
}

/// A positioned, transformable drawable.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    geometry: Geometry,
    pub style: Style,
    pub visible: bool,
    /// Receives pointer events. Non-evented shapes are skipped by hit testing.
    pub evented: bool,
    pub selectable: bool,
    pub has_controls: bool,
    pub locks: Locks,
    pub erasable: Erasable,
    /// Hit only on non-transparent pixels.
    pub per_pixel_target_find: bool,
    /// Groups only: report hit children as sub-targets.
    pub sub_target_check: bool,
    pub centered_scaling: bool,
    pub centered_rotation: bool,
    /// Rotation snap step in degrees; zero disables snapping.
    pub snap_angle: f64,
    /// Snap distance in degrees; defaults to a fraction of `snap_angle`.
    pub snap_threshold: Option<f64>,
    /// Smallest scale magnitude; zero means the global floor.
    pub min_scale_limit: f64,
    pub clip_path: Option<Box<Shape>>,
    pub eraser: Option<EraserMask>,
    /// Per-shape overrides of control visibility, by control key.
    pub control_visibility: HashMap<String, bool>,
    #[serde(skip)]
    custom_controls: Option<Arc<ControlSet>>,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    cache: CoordCache,
}

impl Default for Shape {
    fn default() -> Self {
        Self::new(ShapeKind::Rect)
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.geometry == other.geometry
            && self.style == other.style
            && self.clip_path == other.clip_path
            && self.eraser == other.eraser
    }
}

impl Shape {
    #[must_use]
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            geometry: Geometry::default(),
            style: Style::default(),
            visible: true,
            evented: true,
            selectable: true,
            has_controls: true,
            locks: Locks::default(),
            erasable: Erasable::Yes,
            per_pixel_target_find: false,
            sub_target_check: false,
            centered_scaling: false,
            centered_rotation: true,
            snap_angle: 0.0,
            snap_threshold: None,
            min_scale_limit: 0.0,
            clip_path: None,
            eraser: None,
            control_visibility: HashMap::new(),
            custom_controls: None,
            generation: 0,
            cache: CoordCache::default(),
        }
    }

    /// A rectangle with its top-left corner at `(left, top)`.
    #[must_use]
    pub fn rect(left: f64, top: f64, width: f64, height: f64) -> Self {
        let mut shape = Self::new(ShapeKind::Rect);
        shape.geometry = Geometry { left, top, width, height, ..Geometry::default() };
        shape
    }

    /// An ellipse inscribed in the given box.
    #[must_use]
    pub fn ellipse(left: f64, top: f64, width: f64, height: f64) -> Self {
        let mut shape = Self::rect(left, top, width, height);
        shape.kind = ShapeKind::Ellipse;
        shape
    }

    /// A text box at `(left, top)` with a fixed wrapping width.
    #[must_use]
    pub fn textbox(left: f64, top: f64, width: f64, text: &str, font_size: f64) -> Self {
        let mut shape = Self::rect(left, top, width, font_size * 1.16);
        shape.kind = ShapeKind::Textbox(TextBlock { text: text.to_owned(), font_family: None, font_size });
        shape
    }

    /// A stroked polyline through scene-space `points`.
    ///
    /// The box is the points' bounds grown by the stroke width so that a
    /// straight stroke still has area.
    #[must_use]
    pub fn path(points: Vec<Point>, stroke: Rgba, stroke_width: f64) -> Self {
        let (lo, hi) = geom::bounds(points.iter().copied());
        let offset = (lo + hi) * 0.5;
        let mut shape = Self::new(ShapeKind::Path { points, offset });
        shape.geometry = Geometry {
            left: lo.x - stroke_width / 2.0,
            top: lo.y - stroke_width / 2.0,
            width: hi.x - lo.x + stroke_width,
            height: hi.y - lo.y + stroke_width,
            ..Geometry::default()
        };
        shape.style = Style { fill: None, stroke: Some(stroke), stroke_width, opacity: 1.0 };
        shape
    }

    /// Group `children`, re-expressing each child relative to the group center.
    #[must_use]
    pub fn group(mut children: Vec<Shape>) -> Self {
        let (lo, hi) = geom::bounds(children.iter().flat_map(|c| c.corners().points()));
        let center = (lo + hi) * 0.5;
        for child in &mut children {
            let c = child.center_point();
            child.set_position_by_origin(c - center, OriginX::Center, OriginY::Center);
        }
        let mut group = Self::new(ShapeKind::Group { children });
        group.geometry = Geometry { left: lo.x, top: lo.y, width: hi.x - lo.x, height: hi.y - lo.y, ..Geometry::default() };
        group
    }

    // --- Geometry ---

    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Current geometry generation. Changes on every geometry mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Apply every field present in `patch`. Scales go through the same
    /// clamping and flip handling as [`Shape::set_scale_x`].
    pub fn set_geometry(&mut self, patch: GeometryPatch) {
        let g = &mut self.geometry;
        if let Some(v) = patch.left {
            g.left = v;
        }
        if let Some(v) = patch.top {
            g.top = v;
        }
        if let Some(v) = patch.width {
            g.width = v.max(0.0);
        }
        if let Some(v) = patch.height {
            g.height = v.max(0.0);
        }
        if let Some(v) = patch.skew_x {
            g.skew_x = v;
        }
        if let Some(v) = patch.skew_y {
            g.skew_y = v;
        }
        if let Some(v) = patch.angle {
            g.angle = v;
        }
        if let Some(v) = patch.flip_x {
            g.flip_x = v;
        }
        if let Some(v) = patch.flip_y {
            g.flip_y = v;
        }
        if let Some(v) = patch.origin_x {
            g.origin_x = v;
        }
        if let Some(v) = patch.origin_y {
            g.origin_y = v;
        }
        if let Some(v) = patch.padding {
            g.padding = v;
        }
        if let Some(v) = patch.scale_x {
            self.set_scale_x(v);
        }
        if let Some(v) = patch.scale_y {
            self.set_scale_y(v);
        }
        self.touch();
    }

    pub fn set_left(&mut self, v: f64) {
        self.geometry.left = v;
        self.touch();
    }

    pub fn set_top(&mut self, v: f64) {
        self.geometry.top = v;
        self.touch();
    }

    pub fn set_width(&mut self, v: f64) {
        self.geometry.width = v.max(0.0);
        self.touch();
    }

    pub fn set_angle(&mut self, v: f64) {
        self.geometry.angle = v;
        self.touch();
    }

    pub fn set_skew_x(&mut self, v: f64) {
        self.geometry.skew_x = v;
        self.touch();
    }

    pub fn set_skew_y(&mut self, v: f64) {
        self.geometry.skew_y = v;
        self.touch();
    }

    pub fn set_origin(&mut self, x: OriginX, y: OriginY) {
        self.geometry.origin_x = x;
        self.geometry.origin_y = y;
        self.touch();
    }

    /// Set the X scale. The magnitude is clamped away from zero; a negative
    /// value stores its magnitude and toggles `flip_x`.
    pub fn set_scale_x(&mut self, v: f64) {
        let v = self.constrain_scale(v);
        if v < 0.0 {
            self.geometry.flip_x = !self.geometry.flip_x;
        }
        self.geometry.scale_x = v.abs();
        self.touch();
    }

    /// Y counterpart of [`Shape::set_scale_x`].
    pub fn set_scale_y(&mut self, v: f64) {
        let v = self.constrain_scale(v);
        if v < 0.0 {
            self.geometry.flip_y = !self.geometry.flip_y;
        }
        self.geometry.scale_y = v.abs();
        self.touch();
    }

    fn constrain_scale(&self, v: f64) -> f64 {
        let floor = if self.min_scale_limit > 0.0 { self.min_scale_limit } else { MIN_SCALE };
        if v.abs() < floor || !v.is_finite() {
            if v < 0.0 { -floor } else { floor }
        } else {
            v
        }
    }

    /// Replace the geometry with the decomposition of `m`, keeping origins.
    pub fn apply_transform_matrix(&mut self, m: &Matrix) {
        let d = m.decompose();
        self.geometry.flip_x = false;
        self.geometry.flip_y = false;
        self.geometry.skew_y = d.skew_y;
        self.geometry.skew_x = d.skew_x;
        self.geometry.angle = d.angle;
        self.set_scale_x(d.scale_x);
        self.set_scale_y(d.scale_y);
        self.set_position_by_origin(Point::new(d.translate_x, d.translate_y), OriginX::Center, OriginY::Center);
    }

    // --- Origin math ---

    /// Size after scale and skew, before rotation.
    #[must_use]
    pub fn transformed_dimensions(&self) -> Point {
        self.transformed_dimensions_with(self.geometry.skew_x, self.geometry.skew_y)
    }

    /// Size after scale and the given skews, before rotation.
    #[must_use]
    pub fn transformed_dimensions_with(&self, skew_x: f64, skew_y: f64) -> Point {
        let g = &self.geometry;
        if skew_x == 0.0 && skew_y == 0.0 {
            return Point::new(g.width * g.scale_x, g.height * g.scale_y);
        }
        geom::size_after_transform(
            g.width,
            g.height,
            &ComposeOptions { scale_x: g.scale_x, scale_y: g.scale_y, skew_x, skew_y, ..ComposeOptions::default() },
        )
    }

    /// Move `point` from one origin anchor to another, ignoring rotation.
    #[must_use]
    pub fn translate_to_given_origin(&self, point: Point, from: (OriginX, OriginY), to: (OriginX, OriginY)) -> Point {
        let dx = to.0.offset() - from.0.offset();
        let dy = to.1.offset() - from.1.offset();
        if dx == 0.0 && dy == 0.0 {
            return point;
        }
        let dim = self.transformed_dimensions();
        Point::new(point.x + dx * dim.x, point.y + dy * dim.y)
    }

    /// Center of the shape given the position of its `(ox, oy)` anchor.
    #[must_use]
    pub fn translate_to_center_point(&self, point: Point, ox: OriginX, oy: OriginY) -> Point {
        let p = self.translate_to_given_origin(point, (ox, oy), (OriginX::Center, OriginY::Center));
        if self.geometry.angle == 0.0 {
            p
        } else {
            p.rotate_around(point, self.geometry.angle.to_radians())
        }
    }

    /// Position of the `(ox, oy)` anchor given the shape center.
    #[must_use]
    pub fn translate_to_origin_point(&self, center: Point, ox: OriginX, oy: OriginY) -> Point {
        let p = self.translate_to_given_origin(center, (OriginX::Center, OriginY::Center), (ox, oy));
        if self.geometry.angle == 0.0 {
            p
        } else {
            p.rotate_around(center, self.geometry.angle.to_radians())
        }
    }

    /// Center in the parent's coordinate space.
    #[must_use]
    pub fn center_point(&self) -> Point {
        let g = &self.geometry;
        self.translate_to_center_point(Point::new(g.left, g.top), g.origin_x, g.origin_y)
    }

    /// `point` expressed relative to the `(ox, oy)` anchor, with the
    /// shape's rotation undone.
    #[must_use]
    pub fn to_local_point(&self, point: Point, ox: OriginX, oy: OriginY) -> Point {
        let center = self.center_point();
        let anchor = self.translate_to_given_origin(center, (OriginX::Center, OriginY::Center), (ox, oy));
        let p = if self.geometry.angle == 0.0 {
            point
        } else {
            point.rotate_around(center, -self.geometry.angle.to_radians())
        };
        p - anchor
    }

    /// Move the shape so its `(ox, oy)` anchor lands on `pos`.
    pub fn set_position_by_origin(&mut self, pos: Point, ox: OriginX, oy: OriginY) {
        let center = self.translate_to_center_point(pos, ox, oy);
        let origin = self.translate_to_origin_point(center, self.geometry.origin_x, self.geometry.origin_y);
        self.geometry.left = origin.x;
        self.geometry.top = origin.y;
        self.touch();
    }

    /// Matrix from the shape's local space (origin at its center) to its
    /// parent's space.
    #[must_use]
    pub fn own_matrix(&self) -> Matrix {
        let g = &self.geometry;
        let center = self.center_point();
        Matrix::compose(&ComposeOptions {
            translate_x: center.x,
            translate_y: center.y,
            angle: g.angle,
            scale_x: g.scale_x,
            scale_y: g.scale_y,
            skew_x: g.skew_x,
            skew_y: g.skew_y,
            flip_x: g.flip_x,
            flip_y: g.flip_y,
        })
    }

    // --- Coordinate caches ---

    fn compute_corners(&self) -> Corners {
        let center = self.center_point();
        let m = Matrix::translate(center.x, center.y).multiply(&Matrix::rotate(self.geometry.angle));
        let dim = self.transformed_dimensions();
        let w = dim.x / 2.0;
        let h = dim.y / 2.0;
        Corners {
            tl: m.apply(Point::new(-w, -h)),
            tr: m.apply(Point::new(w, -h)),
            br: m.apply(Point::new(w, h)),
            bl: m.apply(Point::new(-w, h)),
        }
    }

    /// Object-space corners (pre-viewport, unpadded).
    #[must_use]
    pub fn corners(&self) -> Corners {
        if let Some((generation, corners)) = self.cache.absolute.get() {
            if generation == self.generation {
                return corners;
            }
        }
        let corners = self.compute_corners();
        self.cache.absolute.set(Some((self.generation, corners)));
        corners
    }

    /// Viewport-transformed, padded corners used for hit testing.
    #[must_use]
    pub fn line_coords(&self, vpt: &Matrix) -> Corners {
        if let Some((generation, cached_vpt, corners)) = self.cache.line.get() {
            if generation == self.generation && cached_vpt == *vpt {
                return corners;
            }
        }
        let mut c = self.corners().transform(vpt);
        let padding = self.geometry.padding;
        if padding != 0.0 {
            let (sin, cos) = self.geometry.angle.to_radians().sin_cos();
            let cos_p = cos * padding;
            let sin_p = sin * padding;
            let sum = cos_p + sin_p;
            let diff = cos_p - sin_p;
            c.tl = c.tl - Point::new(diff, sum);
            c.tr = c.tr + Point::new(sum, -diff);
            c.bl = c.bl + Point::new(-sum, diff);
            c.br = c.br + Point::new(diff, sum);
        }
        self.cache.line.set(Some((self.generation, *vpt, c)));
        c
    }

    /// Corners in the requested space.
    #[must_use]
    pub fn coords(&self, space: CoordSpace) -> Corners {
        match space {
            CoordSpace::Absolute => self.corners(),
            CoordSpace::Viewport(vpt) => self.line_coords(&vpt),
        }
    }

    /// Size on screen, including padding on both sides.
    #[must_use]
    pub fn screen_dimensions(&self, vpt: &Matrix) -> Point {
        let dim = vpt.apply_vector(self.transformed_dimensions());
        let pad = 2.0 * self.geometry.padding;
        Point::new(dim.x + pad, dim.y + pad)
    }

    /// Matrix used to place handles: screen-unit offsets around the center,
    /// rotated with the shape, then through the viewport.
    #[must_use]
    pub fn handle_matrix(&self, vpt: &Matrix) -> Matrix {
        let center = self.center_point();
        let zoom_x = if vpt.0[0] == 0.0 { 1.0 } else { vpt.0[0] };
        let zoom_y = if vpt.0[3] == 0.0 { 1.0 } else { vpt.0[3] };
        vpt.multiply(&Matrix::translate(center.x, center.y))
            .multiply(&Matrix::rotate(self.geometry.angle))
            .multiply(&Matrix::scale(1.0 / zoom_x, 1.0 / zoom_y))
    }

    /// Screen handle coordinates for every control in this shape's set.
    #[must_use]
    pub fn handle_coords(&self, vpt: &Matrix, sizes: HandleSizes) -> Arc<[HandleCoords]> {
        if let Some((generation, cached_vpt, cached_sizes, coords)) = self.cache.handles.borrow().as_ref() {
            if *generation == self.generation && cached_vpt == vpt && *cached_sizes == sizes {
                return Arc::clone(coords);
            }
        }
        let dim = self.screen_dimensions(vpt);
        let m = self.handle_matrix(vpt);
        let angle = self.geometry.angle;
        let coords: Arc<[HandleCoords]> = self
            .controls()
            .iter()
            .map(|(key, control)| {
                let position = control.position(dim, &m);
                HandleCoords {
                    key,
                    position,
                    corner: control.corner_box(angle, sizes.corner, position, false),
                    touch_corner: control.corner_box(angle, sizes.touch, position, true),
                }
            })
            .collect();
        *self.cache.handles.borrow_mut() = Some((self.generation, *vpt, sizes, Arc::clone(&coords)));
        coords
    }

    // --- Containment ---

    /// Crossing-number containment against the corners in `space`.
    #[must_use]
    pub fn contains_point(&self, point: Point, space: CoordSpace) -> bool {
        self.coords(space).contains(point)
    }

    /// Whether every corner of `self` lies inside `other` (object space).
    #[must_use]
    pub fn is_contained_within(&self, other: &Shape) -> bool {
        let outer = other.corners();
        self.corners().points().iter().all(|p| outer.contains(*p))
    }

    /// Whether the two shapes overlap in object space: an edge crossing or
    /// either one fully inside the other.
    #[must_use]
    pub fn intersects(&self, other: &Shape) -> bool {
        let a = self.corners().points();
        let b = other.corners().points();
        geom::polygons_intersect(&a, &b) || other.is_contained_within(self) || self.is_contained_within(other)
    }

    /// Axis-aligned object-space bounds as `(min, max)`.
    #[must_use]
    pub fn bounding_rect(&self) -> (Point, Point) {
        self.corners().bounds()
    }

    /// Whether the bounds lie inside the rectangle `tl`–`br`.
    #[must_use]
    pub fn is_contained_within_rect(&self, tl: Point, br: Point) -> bool {
        let (lo, hi) = self.bounding_rect();
        lo.x >= tl.x && hi.x <= br.x && lo.y >= tl.y && hi.y <= br.y
    }

    /// Whether an edge crosses the rectangle `tl`–`br`.
    #[must_use]
    pub fn intersects_with_rect(&self, tl: Point, br: Point) -> bool {
        geom::polygon_intersects_rect(&self.corners().points(), tl, br)
    }

    // --- Controls ---

    /// The control set for this shape: a shared preset for its kind unless
    /// a custom set was attached.
    #[must_use]
    pub fn controls(&self) -> Arc<ControlSet> {
        if let Some(custom) = &self.custom_controls {
            return Arc::clone(custom);
        }
        match self.kind {
            ShapeKind::Textbox(_) => ControlSet::textbox(),
            _ => ControlSet::object(),
        }
    }

    /// Attach a custom control set.
    pub fn set_controls(&mut self, controls: Arc<ControlSet>) {
        self.custom_controls = Some(controls);
        self.touch();
    }

    /// Show or hide one control on this shape only.
    pub fn set_control_visible(&mut self, key: &str, visible: bool) {
        self.control_visibility.insert(key.to_owned(), visible);
    }

    /// Effective visibility of a control on this shape.
    #[must_use]
    pub fn is_control_visible(&self, key: &str) -> bool {
        let controls = self.controls();
        let Some(control) = controls.get(key) else {
            return false;
        };
        self.control_visibility.get(key).copied().unwrap_or(control.visible)
    }

    // --- Kind helpers ---

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ShapeKind::Group { .. })
    }

    /// Children of a group; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Shape] {
        match &self.kind {
            ShapeKind::Group { children } => children,
            _ => &[],
        }
    }

    /// Mutable children of a group, or `None` for leaves.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Shape>> {
        match &mut self.kind {
            ShapeKind::Group { children } => Some(children),
            _ => None,
        }
    }

    /// Whether this shape (not a group) can receive a mask of its own.
    #[must_use]
    pub fn is_erasable(&self) -> bool {
        self.erasable != Erasable::No
    }

    /// Number of strokes in the accumulated eraser mask.
    #[must_use]
    pub fn eraser_len(&self) -> usize {
        self.eraser.as_ref().map_or(0, |m| m.strokes.len())
    }

    /// Append a stroke to the eraser mask, creating the mask on first use.
    /// The first mask adopts the current clip path so both stay effective.
    /// Returns `false` for non-erasable shapes.
    pub fn add_eraser_stroke(&mut self, stroke: EraserStroke) -> bool {
        if !self.is_erasable() {
            return false;
        }
        let clip = &mut self.clip_path;
        let mask = self.eraser.get_or_insert_with(|| EraserMask { base_clip: clip.take(), strokes: Vec::new() });
        mask.strokes.push(stroke);
        true
    }
}
