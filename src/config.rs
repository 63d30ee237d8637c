//! Surface configuration.
//!
//! Every knob has a compiled default; `SurfaceConfig::from_env` lets a host
//! override any of them through `EASEL_*` environment variables. Values that
//! fail to parse fall back to the default rather than failing startup.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::consts::{CORNER_SIZE_PX, ERASER_WIDTH, TOUCH_CORNER_SIZE_PX};
use crate::input::ModifierKey;

pub const DEFAULT_UNIFORM_SCALING: bool = true;
pub const DEFAULT_CENTERED_SCALING: bool = false;
pub const DEFAULT_CENTERED_ROTATION: bool = false;
pub const DEFAULT_SELECTION: bool = true;
pub const DEFAULT_SELECTION_FULLY_CONTAINED: bool = false;
pub const DEFAULT_PRESERVE_OBJECT_STACKING: bool = false;
pub const DEFAULT_SKIP_TARGET_FIND: bool = false;
pub const DEFAULT_PER_PIXEL_TARGET_FIND: bool = false;
pub const DEFAULT_TARGET_FIND_TOLERANCE: u32 = 0;

/// Interaction and rendering settings owned by a [`crate::engine::Surface`].
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    /// Corner handles scale proportionally unless `uni_scale_key` is held.
    pub uniform_scaling: bool,
    /// Key that inverts `uniform_scaling` while held.
    pub uni_scale_key: Option<ModifierKey>,
    /// Scale around the shape center instead of the opposite handle.
    pub centered_scaling: bool,
    /// Rotate around the shape center regardless of the shape's own setting.
    pub centered_rotation: bool,
    /// Key that inverts the centered decision while held.
    pub centered_key: Option<ModifierKey>,
    /// Key that switches side handles from scaling to skewing.
    pub alt_action_key: Option<ModifierKey>,
    /// Marquee selection on empty canvas.
    pub selection: bool,
    /// Key that adds/removes shapes to the active selection on click.
    pub selection_key: Option<ModifierKey>,
    /// Marquee picks only shapes fully inside the rectangle.
    pub selection_fully_contained: bool,
    /// Keep z-order while shapes are active instead of raising them.
    pub preserve_object_stacking: bool,
    /// Disable target resolution entirely.
    pub skip_target_find: bool,
    /// Hit shapes only on non-transparent pixels.
    pub per_pixel_target_find: bool,
    /// Radius in pixels searched around the pointer during per-pixel hits.
    pub target_find_tolerance: u32,
    /// Handle box size in screen pixels.
    pub corner_size: f64,
    /// Handle box size for touch input.
    pub touch_corner_size: f64,
    /// Eraser stroke width in scene units.
    pub eraser_width: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            uniform_scaling: DEFAULT_UNIFORM_SCALING,
            uni_scale_key: Some(ModifierKey::Shift),
            centered_scaling: DEFAULT_CENTERED_SCALING,
            centered_rotation: DEFAULT_CENTERED_ROTATION,
            centered_key: Some(ModifierKey::Alt),
            alt_action_key: Some(ModifierKey::Shift),
            selection: DEFAULT_SELECTION,
            selection_key: Some(ModifierKey::Shift),
            selection_fully_contained: DEFAULT_SELECTION_FULLY_CONTAINED,
            preserve_object_stacking: DEFAULT_PRESERVE_OBJECT_STACKING,
            skip_target_find: DEFAULT_SKIP_TARGET_FIND,
            per_pixel_target_find: DEFAULT_PER_PIXEL_TARGET_FIND,
            target_find_tolerance: DEFAULT_TARGET_FIND_TOLERANCE,
            corner_size: CORNER_SIZE_PX,
            touch_corner_size: TOUCH_CORNER_SIZE_PX,
            eraser_width: ERASER_WIDTH,
        }
    }
}

impl SurfaceConfig {
    /// Build a configuration from `EASEL_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        let cfg = Self {
            uniform_scaling: env_parse("EASEL_UNIFORM_SCALING", d.uniform_scaling),
            uni_scale_key: env_key("EASEL_UNI_SCALE_KEY", d.uni_scale_key),
            centered_scaling: env_parse("EASEL_CENTERED_SCALING", d.centered_scaling),
            centered_rotation: env_parse("EASEL_CENTERED_ROTATION", d.centered_rotation),
            centered_key: env_key("EASEL_CENTERED_KEY", d.centered_key),
            alt_action_key: env_key("EASEL_ALT_ACTION_KEY", d.alt_action_key),
            selection: env_parse("EASEL_SELECTION", d.selection),
            selection_key: env_key("EASEL_SELECTION_KEY", d.selection_key),
            selection_fully_contained: env_parse("EASEL_SELECTION_FULLY_CONTAINED", d.selection_fully_contained),
            preserve_object_stacking: env_parse("EASEL_PRESERVE_OBJECT_STACKING", d.preserve_object_stacking),
            skip_target_find: env_parse("EASEL_SKIP_TARGET_FIND", d.skip_target_find),
            per_pixel_target_find: env_parse("EASEL_PER_PIXEL_TARGET_FIND", d.per_pixel_target_find),
            target_find_tolerance: env_parse("EASEL_TARGET_FIND_TOLERANCE", d.target_find_tolerance),
            corner_size: env_parse("EASEL_CORNER_SIZE", d.corner_size),
            touch_corner_size: env_parse("EASEL_TOUCH_CORNER_SIZE", d.touch_corner_size),
            eraser_width: env_parse("EASEL_ERASER_WIDTH", d.eraser_width),
        };
        tracing::debug!(?cfg, "surface config loaded");
        cfg
    }
}

/// Parse `key` from the environment, falling back to `default` when the
/// variable is missing or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an optional modifier key; `none` disables the binding.
fn env_key(key: &str, default: Option<ModifierKey>) -> Option<ModifierKey> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().eq_ignore_ascii_case("none") => None,
        Ok(raw) => raw.trim().parse::<ModifierKey>().map_or(default, Some),
        Err(_) => default,
    }
}
