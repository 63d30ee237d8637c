//! Scene store: the ordered shape list plus background and overlay drawables.
//!
//! Shapes are kept bottom-to-top. Lookups descend into groups, so any shape
//! id in the tree resolves; `add` and `remove` work on the top level only.

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;

use serde::{Deserialize, Serialize};

use crate::context::Rgba;
use crate::geom::Matrix;
use crate::shape::{Shape, ShapeId};

/// A background or overlay: an optional flat color under an optional image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backdrop {
    pub color: Option<Rgba>,
    /// An image shape in scene coordinates. Erasable when its `erasable`
    /// flag allows.
    pub image: Option<Shape>,
}

impl Backdrop {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.image.is_none()
    }

    /// The image, when present and erasable.
    #[must_use]
    pub fn erasable_image(&self) -> Option<&Shape> {
        self.image.as_ref().filter(|img| img.is_erasable())
    }
}

/// Which backdrop slot a drawable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackdropSlot {
    Background,
    Overlay,
}

/// Ordered shapes and backdrops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    shapes: Vec<Shape>,
    pub background: Backdrop,
    pub overlay: Backdrop,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an ordered shape list and backdrops.
    #[must_use]
    pub fn from_parts(shapes: Vec<Shape>, background: Backdrop, overlay: Backdrop) -> Self {
        Self { shapes, background, overlay }
    }

    // --- Mutation ---

    /// Append `shape` on top. Returns its id.
    pub fn add(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id;
        self.shapes.push(shape);
        id
    }

    /// Insert `shape` at `index` in the top-level order, clamped to the end.
    pub fn insert(&mut self, index: usize, shape: Shape) -> ShapeId {
        let id = shape.id;
        let index = index.min(self.shapes.len());
        self.shapes.insert(index, shape);
        id
    }

    /// Remove a top-level shape.
    pub fn remove(&mut self, id: ShapeId) -> Option<Shape> {
        let index = self.index_of(id)?;
        Some(self.shapes.remove(index))
    }

    /// Remove every shape, keeping backdrops.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    // --- Lookup ---

    /// Top-level shapes, bottom first.
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Top-level index of `id`.
    #[must_use]
    pub fn index_of(&self, id: ShapeId) -> Option<usize> {
        self.shapes.iter().position(|s| s.id == id)
    }

    /// Whether `id` is a top-level shape.
    #[must_use]
    pub fn contains(&self, id: ShapeId) -> bool {
        self.index_of(id).is_some()
    }

    /// Find a shape anywhere in the tree.
    #[must_use]
    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        find(&self.shapes, id)
    }

    /// Mutable lookup anywhere in the tree.
    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        let path = self.path_to(id)?;
        let (first, rest) = path.split_first()?;
        let mut shape = self.shapes.get_mut(*first)?;
        for index in rest {
            shape = shape.children_mut()?.get_mut(*index)?;
        }
        Some(shape)
    }

    /// Index path from the top level down to `id`.
    #[must_use]
    pub fn path_to(&self, id: ShapeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        locate(&self.shapes, id, &mut path).then_some(path)
    }

    /// Ids of the groups enclosing `id`, outermost first.
    #[must_use]
    pub fn ancestors(&self, id: ShapeId) -> Option<Vec<ShapeId>> {
        let path = self.path_to(id)?;
        let mut ids = Vec::with_capacity(path.len().saturating_sub(1));
        let mut level = self.shapes.as_slice();
        for index in &path[..path.len().saturating_sub(1)] {
            let group = level.get(*index)?;
            ids.push(group.id);
            level = group.children();
        }
        Some(ids)
    }

    /// Matrix from the local space of the shape's parent to scene space.
    /// Identity for top-level shapes.
    #[must_use]
    pub fn parent_matrix(&self, id: ShapeId) -> Option<Matrix> {
        let path = self.path_to(id)?;
        let mut m = Matrix::IDENTITY;
        let mut level = self.shapes.as_slice();
        for index in &path[..path.len().saturating_sub(1)] {
            let group = level.get(*index)?;
            m = m.multiply(&group.own_matrix());
            level = group.children();
        }
        Some(m)
    }

    /// Matrix from the shape's local space to scene space, through every
    /// enclosing group.
    #[must_use]
    pub fn full_matrix(&self, id: ShapeId) -> Option<Matrix> {
        let parent = self.parent_matrix(id)?;
        let shape = self.get(id)?;
        Some(parent.multiply(&shape.own_matrix()))
    }

    /// Backdrop in `slot`.
    #[must_use]
    pub fn backdrop(&self, slot: BackdropSlot) -> &Backdrop {
        match slot {
            BackdropSlot::Background => &self.background,
            BackdropSlot::Overlay => &self.overlay,
        }
    }

    pub fn backdrop_mut(&mut self, slot: BackdropSlot) -> &mut Backdrop {
        match slot {
            BackdropSlot::Background => &mut self.background,
            BackdropSlot::Overlay => &mut self.overlay,
        }
    }
}

fn find(shapes: &[Shape], id: ShapeId) -> Option<&Shape> {
    for shape in shapes {
        if shape.id == id {
            return Some(shape);
        }
        if let Some(found) = find(shape.children(), id) {
            return Some(found);
        }
    }
    None
}

fn locate(shapes: &[Shape], id: ShapeId, path: &mut Vec<usize>) -> bool {
    for (i, shape) in shapes.iter().enumerate() {
        path.push(i);
        if shape.id == id || locate(shape.children(), id, path) {
            return true;
        }
        path.pop();
    }
    false
}
