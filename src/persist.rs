//! Scene persistence: a plain JSON document plus asynchronous enlivening.
//!
//! DESIGN
//! ======
//! A [`SceneDocument`] is the serialized form of a scene: the ordered shape
//! list and the two backdrops. Decoded pixels are never serialized; image
//! shapes keep only their `src`. Turning a document back into a live
//! [`Scene`] goes through a [`ResourceLoader`], which fetches every image
//! the shapes and backdrops reference. All loads run concurrently and the
//! scene is returned only after every one of them settled.
//!
//! A shape whose resources fail to load is left out of the scene, with a
//! warning, instead of failing the whole document. A backdrop image that
//! fails is dropped the same way; its color is kept.

#[cfg(test)]
#[path = "persist_test.rs"]
mod persist_test;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{EaselError, Result};
use crate::scene::{Backdrop, Scene};
use crate::shape::{ImageData, Shape, ShapeKind};

/// Serialized document format version.
pub const DOCUMENT_VERSION: &str = "1";

// =============================================================
// Document
// =============================================================

/// The serialized form of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDocument {
    pub version: String,
    /// Shapes, bottom to top.
    pub objects: Vec<Shape>,
    pub background: Backdrop,
    pub overlay: Backdrop,
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self { version: DOCUMENT_VERSION.into(), objects: Vec::new(), background: Backdrop::default(), overlay: Backdrop::default() }
    }
}

impl SceneDocument {
    /// Snapshot `scene`.
    #[must_use]
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            version: DOCUMENT_VERSION.into(),
            objects: scene.shapes().to_vec(),
            background: scene.background.clone(),
            overlay: scene.overlay.clone(),
        }
    }

    /// # Errors
    ///
    /// Returns [`EaselError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns [`EaselError::Json`] for malformed documents.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load every referenced resource and build the live scene.
    pub async fn enliven(self, loader: &dyn ResourceLoader) -> Scene {
        let objects = join_all(self.objects.into_iter().map(|shape| enliven_shape(shape, loader)));
        let background = enliven_backdrop(self.background, loader);
        let overlay = enliven_backdrop(self.overlay, loader);
        let (objects, background, overlay) = futures::join!(objects, background, overlay);
        let total = objects.len();
        let shapes: Vec<Shape> = objects.into_iter().flatten().collect();
        tracing::debug!(loaded = shapes.len(), omitted = total - shapes.len(), "scene enlivened");
        Scene::from_parts(shapes, background, overlay)
    }
}

// =============================================================
// Loading
// =============================================================

/// Source of external resources referenced by shapes.
#[async_trait::async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Fetch and decode the image at `src`.
    ///
    /// # Errors
    ///
    /// Returns [`EaselError::ResourceLoad`] when the resource is missing and
    /// [`EaselError::Image`] when it cannot be decoded.
    async fn load_image(&self, src: &str) -> Result<ImageData>;
}

/// Loads images from files under a root directory.
#[derive(Debug, Clone)]
pub struct FsResourceLoader {
    root: PathBuf,
}

impl FsResourceLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl ResourceLoader for FsResourceLoader {
    async fn load_image(&self, src: &str) -> Result<ImageData> {
        let path = self.root.join(src);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| EaselError::ResourceLoad { source_ref: src.to_owned(), reason: e.to_string() })?;
        decode_image(&bytes)
    }
}

/// Decode PNG or JPEG bytes into premultiplied RGBA8.
///
/// # Errors
///
/// Returns [`EaselError::Image`] for unsupported or corrupt data.
pub fn decode_image(bytes: &[u8]) -> Result<ImageData> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixels = rgba.into_raw();
    for px in pixels.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = u8::try_from((u16::from(*c) * a + 127) / 255).unwrap_or(u8::MAX);
        }
    }
    Ok(ImageData { width, height, pixels })
}

/// Read a document from `path` and enliven it.
///
/// # Errors
///
/// Returns [`EaselError::Io`] if the file cannot be read and
/// [`EaselError::Json`] if it is not a valid document.
pub async fn load_scene(path: &Path, loader: &dyn ResourceLoader) -> Result<Scene> {
    let text = tokio::fs::read_to_string(path).await?;
    let document = SceneDocument::from_json(&text)?;
    Ok(document.enliven(loader).await)
}

/// Write `scene` to `path` as a document.
///
/// # Errors
///
/// Returns [`EaselError::Io`] if the file cannot be written.
pub async fn save_scene(scene: &Scene, path: &Path) -> Result<()> {
    let text = SceneDocument::from_scene(scene).to_json()?;
    tokio::fs::write(path, text).await?;
    Ok(())
}

/// Resolve every image under `shape`. `None` when any of them fails.
async fn enliven_shape(mut shape: Shape, loader: &dyn ResourceLoader) -> Option<Shape> {
    let mut sources = Vec::new();
    collect_sources(&shape, &mut sources);
    sources.sort_unstable();
    sources.dedup();
    let loaded = join_all(sources.iter().map(|src| loader.load_image(src))).await;
    let mut images = HashMap::with_capacity(sources.len());
    for (src, result) in sources.into_iter().zip(loaded) {
        match result {
            Ok(data) => {
                images.insert(src, Arc::new(data));
            }
            Err(e) => {
                tracing::warn!(id = %shape.id, src = %src, error = %e, code = e.error_code(), "shape omitted: resource failed to load");
                return None;
            }
        }
    }
    attach_images(&mut shape, &images);
    Some(shape)
}

async fn enliven_backdrop(mut backdrop: Backdrop, loader: &dyn ResourceLoader) -> Backdrop {
    if let Some(image) = backdrop.image.take() {
        backdrop.image = enliven_shape(image, loader).await;
    }
    backdrop
}

/// Image sources referenced by `shape`, its children, clip and masks.
fn collect_sources(shape: &Shape, out: &mut Vec<String>) {
    if let ShapeKind::Image { src, .. } = &shape.kind {
        out.push(src.clone());
    }
    for child in shape.children() {
        collect_sources(child, out);
    }
    if let Some(clip) = &shape.clip_path {
        collect_sources(clip, out);
    }
    if let Some(base) = shape.eraser.as_ref().and_then(|m| m.base_clip.as_deref()) {
        collect_sources(base, out);
    }
}

fn attach_images(shape: &mut Shape, images: &HashMap<String, Arc<ImageData>>) {
    if let ShapeKind::Image { src, data } = &mut shape.kind {
        *data = images.get(src.as_str()).cloned();
    }
    if let Some(children) = shape.children_mut() {
        for child in children {
            attach_images(child, images);
        }
    }
    if let Some(clip) = shape.clip_path.as_deref_mut() {
        attach_images(clip, images);
    }
    if let Some(base) = shape.eraser.as_mut().and_then(|m| m.base_clip.as_deref_mut()) {
        attach_images(base, images);
    }
}
