//! Points, 2D affine matrices, and polygon intersection.
//!
//! Matrices use the canvas convention `[a, b, c, d, e, f]`, mapping
//! `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`. `a.multiply(&b)` applies `b`
//! first, then `a`, so a chain reads left to right from the outermost frame
//! (viewport, group) to the innermost (the shape itself).
//!
//! Angles are in degrees at every public boundary and converted to radians
//! only inside the math.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A point (or vector) in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Rotate this point around `origin` by `radians`.
    #[must_use]
    pub fn rotate_around(self, origin: Point, radians: f64) -> Point {
        let (sin, cos) = radians.sin_cos();
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        Point::new(dx * cos - dy * sin + origin.x, dx * sin + dy * cos + origin.y)
    }

    /// Point with the smaller coordinate on each axis.
    #[must_use]
    pub fn min(self, other: Point) -> Point {
        Point::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Point with the larger coordinate on each axis.
    #[must_use]
    pub fn max(self, other: Point) -> Point {
        Point::new(self.x.max(other.x), self.y.max(other.y))
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

// =============================================================
// Matrix
// =============================================================

/// A 2D affine transform in canvas `[a, b, c, d, e, f]` layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix(pub [f64; 6]);

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Inputs for [`Matrix::compose`]. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposeOptions {
    pub translate_x: f64,
    pub translate_y: f64,
    pub angle: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

/// Result of [`Matrix::decompose`]: the transform expressed as
/// translate · rotate · scale · skewX. `skew_y` is always zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub angle: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    #[must_use]
    pub const fn translate(x: f64, y: f64) -> Matrix {
        Matrix([1.0, 0.0, 0.0, 1.0, x, y])
    }

    #[must_use]
    pub const fn scale(x: f64, y: f64) -> Matrix {
        Matrix([x, 0.0, 0.0, y, 0.0, 0.0])
    }

    /// Rotation by `degrees` around the origin.
    #[must_use]
    pub fn rotate(degrees: f64) -> Matrix {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Matrix([cos, sin, -sin, cos, 0.0, 0.0])
    }

    /// `self · other`: apply `other` first, then `self`.
    #[must_use]
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let a = &self.0;
        let b = &other.0;
        Matrix([
            a[0] * b[0] + a[2] * b[1],
            a[1] * b[0] + a[3] * b[1],
            a[0] * b[2] + a[2] * b[3],
            a[1] * b[2] + a[3] * b[3],
            a[0] * b[4] + a[2] * b[5] + a[4],
            a[1] * b[4] + a[3] * b[5] + a[5],
        ])
    }

    /// Inverse transform, or `None` when the matrix is singular.
    #[must_use]
    pub fn invert(&self) -> Option<Matrix> {
        let t = &self.0;
        let det = t[0] * t[3] - t[1] * t[2];
        if det.abs() < f64::EPSILON * f64::EPSILON || !det.is_finite() {
            return None;
        }
        let r = 1.0 / det;
        let linear = Matrix([r * t[3], -r * t[1], -r * t[2], r * t[0], 0.0, 0.0]);
        let o = linear.apply_vector(Point::new(t[4], t[5]));
        Some(Matrix([linear.0[0], linear.0[1], linear.0[2], linear.0[3], -o.x, -o.y]))
    }

    /// Transform a point, including translation.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        let t = &self.0;
        Point::new(t[0] * p.x + t[2] * p.y + t[4], t[1] * p.x + t[3] * p.y + t[5])
    }

    /// Transform a vector, ignoring translation.
    #[must_use]
    pub fn apply_vector(&self, p: Point) -> Point {
        let t = &self.0;
        Point::new(t[0] * p.x + t[2] * p.y, t[1] * p.x + t[3] * p.y)
    }

    /// Translation component.
    #[must_use]
    pub fn translation(&self) -> Point {
        Point::new(self.0[4], self.0[5])
    }

    /// Scale, skew and flip part of a shape matrix (no rotation, no translation).
    #[must_use]
    pub fn dimensions(opts: &ComposeOptions) -> Matrix {
        let sx = if opts.flip_x { -opts.scale_x } else { opts.scale_x };
        let sy = if opts.flip_y { -opts.scale_y } else { opts.scale_y };
        let mut m = Matrix::scale(sx, sy);
        if opts.skew_x != 0.0 {
            m = m.multiply(&Matrix([1.0, 0.0, opts.skew_x.to_radians().tan(), 1.0, 0.0, 0.0]));
        }
        if opts.skew_y != 0.0 {
            m = m.multiply(&Matrix([1.0, opts.skew_y.to_radians().tan(), 0.0, 1.0, 0.0, 0.0]));
        }
        m
    }

    /// translate · rotate · scale(flip) · skewX · skewY.
    #[must_use]
    pub fn compose(opts: &ComposeOptions) -> Matrix {
        let mut m = Matrix::translate(opts.translate_x, opts.translate_y);
        if opts.angle != 0.0 {
            m = m.multiply(&Matrix::rotate(opts.angle));
        }
        let plain = opts.scale_x == 1.0
            && opts.scale_y == 1.0
            && opts.skew_x == 0.0
            && opts.skew_y == 0.0
            && !opts.flip_x
            && !opts.flip_y;
        if !plain {
            m = m.multiply(&Matrix::dimensions(opts));
        }
        m
    }

    /// QR-style decomposition into angle, scale, skewX and translation.
    #[must_use]
    pub fn decompose(&self) -> Decomposed {
        let a = &self.0;
        let angle = a[1].atan2(a[0]);
        let denom = a[0] * a[0] + a[1] * a[1];
        let scale_x = denom.sqrt();
        let scale_y = if scale_x == 0.0 { 0.0 } else { (a[0] * a[3] - a[2] * a[1]) / scale_x };
        let skew_x = (a[0] * a[2] + a[1] * a[3]).atan2(denom);
        Decomposed {
            angle: angle.to_degrees(),
            scale_x,
            scale_y,
            skew_x: skew_x.to_degrees(),
            skew_y: 0.0,
            translate_x: a[4],
            translate_y: a[5],
        }
    }

    /// Whether every component is within `eps` of `other`.
    #[must_use]
    pub fn approx_eq(&self, other: &Matrix, eps: f64) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| (a - b).abs() <= eps)
    }
}

/// Size of the `width × height` box centered at the origin after applying the
/// scale/skew/flip described by `opts`.
#[must_use]
pub fn size_after_transform(width: f64, height: f64, opts: &ComposeOptions) -> Point {
    let hx = width / 2.0;
    let hy = height / 2.0;
    let m = Matrix::dimensions(opts);
    let corners = [
        Point::new(-hx, -hy),
        Point::new(hx, -hy),
        Point::new(-hx, hy),
        Point::new(hx, hy),
    ];
    let (lo, hi) = bounds(corners.iter().map(|p| m.apply(*p)));
    hi - lo
}

/// Axis-aligned min and max of a point set. An empty set yields two zero points.
pub fn bounds(points: impl IntoIterator<Item = Point>) -> (Point, Point) {
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return (Point::default(), Point::default());
    };
    iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)))
}

// =============================================================
// Intersection
// =============================================================

/// Whether segments `a1→a2` and `b1→b2` cross. Parallel and coincident
/// segments never count.
#[must_use]
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let ua_t = (b2.x - b1.x) * (a1.y - b1.y) - (b2.y - b1.y) * (a1.x - b1.x);
    let ub_t = (a2.x - a1.x) * (a1.y - b1.y) - (a2.y - a1.y) * (a1.x - b1.x);
    let u_b = (b2.y - b1.y) * (a2.x - a1.x) - (b2.x - b1.x) * (a2.y - a1.y);
    if u_b == 0.0 {
        return false;
    }
    let ua = ua_t / u_b;
    let ub = ub_t / u_b;
    (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub)
}

/// Whether any edge of closed polygon `a` crosses any edge of closed polygon `b`.
#[must_use]
pub fn polygons_intersect(a: &[Point], b: &[Point]) -> bool {
    edges(a).any(|(a1, a2)| edges(b).any(|(b1, b2)| segments_intersect(a1, a2, b1, b2)))
}

/// Whether any edge of polygon `poly` crosses the axis-aligned rectangle spanned by `r1` and `r2`.
#[must_use]
pub fn polygon_intersects_rect(poly: &[Point], r1: Point, r2: Point) -> bool {
    let lo = r1.min(r2);
    let hi = r1.max(r2);
    let rect = [lo, Point::new(hi.x, lo.y), hi, Point::new(lo.x, hi.y)];
    polygons_intersect(poly, &rect)
}

fn edges(poly: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    poly.iter()
        .enumerate()
        .map(move |(i, p)| (*p, poly[(i + 1) % poly.len()]))
}

// =============================================================
// Quads
// =============================================================

/// Four corners of a (possibly rotated or skewed) box, clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Corners {
    pub tl: Point,
    pub tr: Point,
    pub br: Point,
    pub bl: Point,
}

impl Corners {
    /// The corners in boundary order.
    #[must_use]
    pub fn points(&self) -> [Point; 4] {
        [self.tl, self.tr, self.br, self.bl]
    }

    /// Apply `m` to every corner.
    #[must_use]
    pub fn transform(&self, m: &Matrix) -> Corners {
        Corners { tl: m.apply(self.tl), tr: m.apply(self.tr), br: m.apply(self.br), bl: m.apply(self.bl) }
    }

    /// Axis-aligned bounds as `(min, max)`.
    #[must_use]
    pub fn bounds(&self) -> (Point, Point) {
        bounds(self.points())
    }

    /// Boundary edges: top, right, bottom, left.
    fn lines(&self) -> [(Point, Point); 4] {
        [(self.tl, self.tr), (self.tr, self.br), (self.br, self.bl), (self.bl, self.tl)]
    }

    /// Number of boundary crossings of a horizontal ray cast from `p`
    /// towards +x, capped at two.
    #[must_use]
    pub fn crossings(&self, p: Point) -> usize {
        let mut count = 0;
        for (o, d) in self.lines() {
            // Edge entirely above or entirely below the ray.
            if o.y < p.y && d.y < p.y {
                continue;
            }
            if o.y >= p.y && d.y >= p.y {
                continue;
            }
            let xi = if o.x == d.x {
                o.x
            } else {
                let slope = (d.y - o.y) / (d.x - o.x);
                let intercept = o.y - slope * o.x;
                (p.y - intercept) / slope
            };
            if xi >= p.x {
                count += 1;
            }
            if count == 2 {
                break;
            }
        }
        count
    }

    /// Crossing-number containment: odd crossing count means inside.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.crossings(p) % 2 == 1
    }
}
