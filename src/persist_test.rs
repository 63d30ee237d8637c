use std::sync::atomic::{AtomicUsize, Ordering};

use uuid::Uuid;

use super::*;
use crate::context::{RenderContext, Rgba};
use crate::raster::RasterContext;

// =========================================================================
// MemoryLoader
// =========================================================================

struct MemoryLoader {
    images: HashMap<String, ImageData>,
    calls: AtomicUsize,
}

impl MemoryLoader {
    fn new(sources: &[&str]) -> Self {
        let images = sources
            .iter()
            .map(|src| ((*src).to_owned(), ImageData { width: 1, height: 1, pixels: vec![255, 0, 0, 255] }))
            .collect();
        Self { images, calls: AtomicUsize::new(0) }
    }
}

#[async_trait::async_trait]
impl ResourceLoader for MemoryLoader {
    async fn load_image(&self, src: &str) -> Result<ImageData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images
            .get(src)
            .cloned()
            .ok_or_else(|| EaselError::ResourceLoad { source_ref: src.to_owned(), reason: "not found".into() })
    }
}

fn image(src: &str) -> Shape {
    let mut shape = Shape::rect(0.0, 0.0, 10.0, 10.0);
    shape.kind = ShapeKind::Image { src: src.into(), data: None };
    shape
}

fn image_data(shape: &Shape) -> Option<&Arc<ImageData>> {
    match &shape.kind {
        ShapeKind::Image { data, .. } => data.as_ref(),
        _ => None,
    }
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("easel-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// =========================================================================
// Document
// =========================================================================

#[test]
fn document_round_trips_through_json() {
    let mut scene = Scene::new();
    let a = scene.add(Shape::rect(1.0, 2.0, 3.0, 4.0));
    let b = scene.add(Shape::textbox(0.0, 0.0, 120.0, "hello", 20.0));
    scene.background.color = Some(Rgba::WHITE);
    let json = SceneDocument::from_scene(&scene).to_json().unwrap();
    let doc = SceneDocument::from_json(&json).unwrap();
    assert_eq!(doc.version, DOCUMENT_VERSION);
    assert_eq!(doc.objects.iter().map(|s| s.id).collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(doc.objects[0].geometry(), scene.get(a).unwrap().geometry());
    assert_eq!(doc.background.color, Some(Rgba::WHITE));
}

#[test]
fn pixels_are_not_serialized() {
    let mut shape = image("a.png");
    if let ShapeKind::Image { data, .. } = &mut shape.kind {
        *data = Some(Arc::new(ImageData { width: 1, height: 1, pixels: vec![1, 2, 3, 4] }));
    }
    let doc = SceneDocument { objects: vec![shape], ..SceneDocument::default() };
    let back = SceneDocument::from_json(&doc.to_json().unwrap()).unwrap();
    assert!(image_data(&back.objects[0]).is_none());
}

#[test]
fn malformed_document_is_a_json_error() {
    let err = SceneDocument::from_json("{\"objects\": 3}").unwrap_err();
    assert_eq!(err.error_code(), "E_DOCUMENT");
}

// =========================================================================
// Enliven
// =========================================================================

#[tokio::test]
async fn enliven_attaches_images_everywhere() {
    let nested = image("b.png");
    let nested_id = nested.id;
    let top = image("a.png");
    let top_id = top.id;
    let group = Shape::group(vec![nested, Shape::rect(20.0, 0.0, 5.0, 5.0)]);
    let doc = SceneDocument { objects: vec![top, group], ..SceneDocument::default() };
    let loader = MemoryLoader::new(&["a.png", "b.png"]);
    let scene = doc.enliven(&loader).await;
    assert_eq!(scene.len(), 2);
    assert!(image_data(scene.get(top_id).unwrap()).is_some());
    assert!(image_data(scene.get(nested_id).unwrap()).is_some());
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_shape_is_omitted_and_order_kept() {
    let first = Shape::rect(0.0, 0.0, 1.0, 1.0);
    let broken = image("missing.png");
    let last = image("a.png");
    let ids = (first.id, last.id);
    let doc = SceneDocument { objects: vec![first, broken, last], ..SceneDocument::default() };
    let scene = doc.enliven(&MemoryLoader::new(&["a.png"])).await;
    assert_eq!(scene.shapes().iter().map(|s| s.id).collect::<Vec<_>>(), vec![ids.0, ids.1]);
}

#[tokio::test]
async fn group_with_a_broken_child_is_omitted() {
    let group = Shape::group(vec![image("missing.png"), Shape::rect(0.0, 0.0, 1.0, 1.0)]);
    let doc = SceneDocument { objects: vec![group], ..SceneDocument::default() };
    let scene = doc.enliven(&MemoryLoader::new(&[])).await;
    assert!(scene.is_empty());
}

#[tokio::test]
async fn failed_backdrop_image_keeps_the_color() {
    let doc = SceneDocument {
        background: Backdrop { color: Some(Rgba::BLACK), image: Some(image("missing.png")) },
        overlay: Backdrop { color: None, image: Some(image("a.png")) },
        ..SceneDocument::default()
    };
    let scene = doc.enliven(&MemoryLoader::new(&["a.png"])).await;
    assert_eq!(scene.background.color, Some(Rgba::BLACK));
    assert!(scene.background.image.is_none());
    assert!(image_data(scene.overlay.image.as_ref().unwrap()).is_some());
}

#[tokio::test]
async fn repeated_sources_load_once_per_shape() {
    let mut img = image("a.png");
    let mut clip = image("a.png");
    clip.set_left(-5.0);
    img.clip_path = Some(Box::new(clip));
    let doc = SceneDocument { objects: vec![img], ..SceneDocument::default() };
    let loader = MemoryLoader::new(&["a.png"]);
    let scene = doc.enliven(&loader).await;
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    let clip = scene.shapes()[0].clip_path.as_deref().unwrap();
    assert!(image_data(clip).is_some());
}

// =========================================================================
// Files
// =========================================================================

fn red_png() -> Vec<u8> {
    let mut raster = RasterContext::new(2, 3).unwrap();
    raster.begin_path();
    raster.rect(0.0, 0.0, 2.0, 3.0);
    raster.fill(Rgba::new(255, 0, 0, 255)).unwrap();
    raster.encode_png().unwrap()
}

#[test]
fn decode_png_gives_premultiplied_pixels() {
    let data = decode_image(&red_png()).unwrap();
    assert_eq!((data.width, data.height), (2, 3));
    assert_eq!(&data.pixels[..4], &[255, 0, 0, 255]);
}

#[test]
fn corrupt_bytes_are_an_image_error() {
    assert_eq!(decode_image(b"not an image").unwrap_err().error_code(), "E_IMAGE");
}

#[tokio::test]
async fn fs_loader_reads_relative_to_root() {
    let dir = temp_dir();
    std::fs::write(dir.join("red.png"), red_png()).unwrap();
    let loader = FsResourceLoader::new(&dir);
    assert_eq!(loader.load_image("red.png").await.unwrap().width, 2);
    let err = loader.load_image("nope.png").await.unwrap_err();
    assert_eq!(err.error_code(), "E_RESOURCE");
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn save_then_load_scene() {
    let dir = temp_dir();
    std::fs::write(dir.join("red.png"), red_png()).unwrap();
    let mut scene = Scene::new();
    scene.add(Shape::ellipse(0.0, 0.0, 10.0, 10.0));
    let img = scene.add(image("red.png"));
    let path = dir.join("scene.json");
    save_scene(&scene, &path).await.unwrap();
    let loaded = load_scene(&path, &FsResourceLoader::new(&dir)).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(image_data(loaded.get(img).unwrap()).unwrap().height, 3);
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn missing_document_is_an_io_error() {
    let err = load_scene(Path::new("/nonexistent/easel/scene.json"), &MemoryLoader::new(&[])).await.unwrap_err();
    assert_eq!(err.error_code(), "E_IO");
}
