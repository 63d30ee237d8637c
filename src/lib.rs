//! Interactive 2D scene engine.
//!
//! The crate owns an ordered scene of shapes, resolves pointer input into
//! handle and body hits, runs transform sessions (drag, scale, skew, rotate,
//! resize), keeps the active selection, and renders into two layers: the
//! scene itself and the interaction chrome on top. An eraser brush masks
//! shapes and backdrop images without touching their geometry. Rendering
//! goes through the [`context::RenderContext`] trait; [`raster`] provides a
//! tiny-skia implementation used for snapshots, per-pixel hits and PNG
//! export.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | The [`engine::Surface`]: pointer entry points, actions, frames |
//! | [`scene`] | Ordered shape store plus background and overlay backdrops |
//! | [`shape`] | Shapes, geometry, matrices, bounds and intersection |
//! | [`control`] | Handle registry, per-handle actions and cursors |
//! | [`hit`] | Target resolution for handles, bodies and sub-targets |
//! | [`transform`] | Transform sessions and the per-action handlers |
//! | [`selection`] | Single and multi selection with veto guards |
//! | [`render`] | Layered pipeline and frame coalescing |
//! | [`eraser`] | Eraser stroke capture, preview passes and masks |
//! | [`context`] | The drawing boundary and a recording implementation |
//! | [`raster`] | tiny-skia backed render context |
//! | [`persist`] | JSON documents and asynchronous resource loading |
//! | [`camera`] | Pan/zoom and coordinate conversions |
//! | [`input`] | Tools, modifiers and the gesture state machine |
//! | [`geom`] | Points, affine matrices and polygon tests |
//! | [`config`] | Surface settings with environment overrides |
//! | [`error`] | Error taxonomy |
//! | [`consts`] | Shared numeric constants |

pub mod camera;
pub mod config;
pub mod consts;
pub mod context;
pub mod control;
pub mod engine;
pub mod eraser;
pub mod error;
pub mod geom;
pub mod hit;
pub mod input;
pub mod persist;
pub mod raster;
pub mod render;
pub mod scene;
pub mod selection;
pub mod shape;
pub mod transform;

pub use engine::{Action, Surface};
pub use error::{EaselError, Result};
pub use scene::Scene;
pub use shape::{Shape, ShapeId};
