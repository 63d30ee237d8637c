//! Shared numeric constants for the scene engine.

// ── Geometry ────────────────────────────────────────────────────

/// Smallest scale magnitude a shape can hold. A zero scale would make the
/// shape matrix singular.
pub const MIN_SCALE: f64 = 0.0001;

/// Tolerance used when comparing floating point geometry for equality.
pub const EPSILON: f64 = 1e-9;

/// `sin(45°)`: half-diagonal factor for square handle boxes.
pub const HALF_DIAGONAL: f64 = std::f64::consts::FRAC_1_SQRT_2;

// ── Handles ─────────────────────────────────────────────────────

/// Default side length of a handle box, in screen pixels.
pub const CORNER_SIZE_PX: f64 = 13.0;

/// Handle box side length used for touch input, in screen pixels.
pub const TOUCH_CORNER_SIZE_PX: f64 = 24.0;

/// Distance from the top edge to the rotation handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 40.0;

// ── Transform ───────────────────────────────────────────────────

/// Lateral skew drag, in pixels, below which the skew snaps back to zero.
pub const SKEW_SNAP_PX: f64 = 2.0;

/// Fraction of the snap angle used as the snap threshold when a shape does
/// not set one explicitly.
pub const DEFAULT_SNAP_THRESHOLD_RATIO: f64 = 2.0 / 3.0;

// ── Eraser ──────────────────────────────────────────────────────

/// Default eraser stroke width in scene units.
pub const ERASER_WIDTH: f64 = 10.0;

// ── Chrome ──────────────────────────────────────────────────────

/// Dash segment length for the selection border, in screen pixels.
pub const SELECTION_DASH_PX: f64 = 4.0;
