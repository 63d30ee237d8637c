#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::geom::{Matrix, Point};

/// Smallest zoom factor the camera accepts.
const MIN_ZOOM: f64 = 0.01;

/// Viewport state for pan/zoom over the scene.
///
/// `pan_x` / `pan_y` are in screen pixels.
/// `zoom` is a scale factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// The viewport transform mapping scene coordinates to screen pixels.
    #[must_use]
    pub fn viewport_transform(&self) -> Matrix {
        Matrix([self.zoom, 0.0, 0.0, self.zoom, self.pan_x, self.pan_y])
    }

    /// Convert a screen-space point to scene coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.pan_x) / self.zoom,
            y: (screen.y - self.pan_y) / self.zoom,
        }
    }

    /// Convert a scene point to screen coordinates.
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point {
            x: world.x * self.zoom + self.pan_x,
            y: world.y * self.zoom + self.pan_y,
        }
    }

    /// Convert a screen-space distance (pixels) to scene distance.
    #[must_use]
    pub fn screen_dist_to_world(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Zoom to `zoom`, keeping the scene point under `screen` fixed.
    pub fn zoom_to_point(&mut self, screen: Point, zoom: f64) {
        let anchor = self.screen_to_world(screen);
        self.zoom = zoom.max(MIN_ZOOM);
        self.pan_x = screen.x - anchor.x * self.zoom;
        self.pan_y = screen.y - anchor.y * self.zoom;
    }
}
