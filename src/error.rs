//! Error taxonomy for the scene engine.
//!
//! Only failures that cross an outer boundary (persistence, resources,
//! raster allocation, file I/O) are errors. Degenerate geometry, locked
//! axes and selection vetoes are handled in place and reported as `bool`
//! returns or as the absence of an event.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EaselError {
    #[error("shape not found: {0}")]
    ShapeNotFound(Uuid),
    #[error("invalid scene document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to load resource {source_ref}: {reason}")]
    ResourceLoad { source_ref: String, reason: String },
    #[error("cannot allocate a {width}x{height} raster")]
    Raster { width: u32, height: u32 },
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("render failed: {0}")]
    Render(String),
    #[error("png encode failed: {0}")]
    Encode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EaselError {
    /// Stable machine-readable code for logs and host bindings.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ShapeNotFound(_) => "E_SHAPE_NOT_FOUND",
            Self::Json(_) => "E_DOCUMENT",
            Self::ResourceLoad { .. } => "E_RESOURCE",
            Self::Raster { .. } => "E_RASTER",
            Self::Image(_) => "E_IMAGE",
            Self::Render(_) => "E_RENDER",
            Self::Encode(_) => "E_ENCODE",
            Self::Io(_) => "E_IO",
        }
    }
}

pub type Result<T> = std::result::Result<T, EaselError>;
