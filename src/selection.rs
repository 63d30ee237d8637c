//! Selection model: nothing, one active shape, or a multi-selection aggregate.
//!
//! DESIGN
//! ======
//! A multi-selection is a transient frame [`Shape`] around its members plus
//! each member's matrix relative to that frame. Transform sessions act on
//! the frame; `realize` pushes `frame × relative` back onto every member.
//! The aggregate is rebuilt on every selection change and never persisted.
//!
//! Selection hooks are pure predicates ([`SelectionGuard`]). Every shape
//! leaving the active set must pass `can_deselect` and every shape entering
//! it must pass `can_select`; one veto rejects the whole change and the
//! previous selection stays intact. Change notifications are computed after
//! the transition by diffing the flattened old and new id lists.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use crate::geom::{self, Matrix};
use crate::scene::Scene;
use crate::shape::{Shape, ShapeId};

/// Veto predicates consulted before the active set changes.
pub trait SelectionGuard {
    /// Whether `shape` may become active.
    fn can_select(&self, _shape: &Shape) -> bool {
        true
    }

    /// Whether `shape` may stop being active.
    fn can_deselect(&self, _shape: &Shape) -> bool {
        true
    }
}

/// Guard that never vetoes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl SelectionGuard for AllowAll {}

/// The transformable aggregate around several selected shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSelection {
    frame: Shape,
    /// Member id and its matrix relative to the frame, in scene order.
    members: Vec<(ShapeId, Matrix)>,
}

impl ActiveSelection {
    /// Wrap the given top-level shapes. Members keep scene order.
    #[must_use]
    pub fn new(scene: &Scene, ids: &[ShapeId]) -> Self {
        let shapes: Vec<&Shape> = scene.shapes().iter().filter(|s| ids.contains(&s.id)).collect();
        let (lo, hi) = geom::bounds(shapes.iter().flat_map(|s| s.corners().points()));
        let mut frame = Shape::rect(lo.x, lo.y, hi.x - lo.x, hi.y - lo.y);
        frame.style.fill = None;
        let inverse = frame.own_matrix().invert().unwrap_or(Matrix::IDENTITY);
        let members = shapes.iter().map(|s| (s.id, inverse.multiply(&s.own_matrix()))).collect();
        Self { frame, members }
    }

    #[must_use]
    pub fn frame(&self) -> &Shape {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut Shape {
        &mut self.frame
    }

    /// Member ids in scene order.
    #[must_use]
    pub fn member_ids(&self) -> Vec<ShapeId> {
        self.members.iter().map(|(id, _)| *id).collect()
    }

    #[must_use]
    pub fn contains(&self, id: ShapeId) -> bool {
        self.members.iter().any(|(m, _)| *m == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Apply the frame's current transform to every member.
    pub fn realize(&self, scene: &mut Scene) {
        let frame = self.frame.own_matrix();
        for (id, relative) in &self.members {
            if let Some(shape) = scene.get_mut(*id) {
                shape.apply_transform_matrix(&frame.multiply(relative));
            }
        }
    }
}

/// What is currently active.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    Empty,
    Single(ShapeId),
    Multi(ActiveSelection),
}

impl Selection {
    /// Flattened active ids.
    #[must_use]
    pub fn ids(&self) -> Vec<ShapeId> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(id) => vec![*id],
            Self::Multi(group) => group.member_ids(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn contains(&self, id: ShapeId) -> bool {
        match self {
            Self::Empty => false,
            Self::Single(active) => *active == id,
            Self::Multi(group) => group.contains(id),
        }
    }

    /// The shape whose handles and border are shown: the single active
    /// shape or the aggregate frame.
    #[must_use]
    pub fn active_shape<'a>(&'a self, scene: &'a Scene) -> Option<&'a Shape> {
        match self {
            Self::Empty => None,
            Self::Single(id) => scene.get(*id),
            Self::Multi(group) => Some(group.frame()),
        }
    }
}

/// Notification fired after a net change of the active set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Created { selected: Vec<ShapeId> },
    Updated { selected: Vec<ShapeId>, deselected: Vec<ShapeId> },
    Cleared { deselected: Vec<ShapeId> },
}

/// Outcome of a requested selection change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A guard rejected the change; nothing moved.
    Vetoed,
    /// The active set is what it was.
    Unchanged,
    Changed(SelectionChange),
}

impl Transition {
    /// `false` only for a veto.
    #[must_use]
    pub fn accepted(&self) -> bool {
        !matches!(self, Self::Vetoed)
    }
}

/// Classify the change from `old` to `new`. `None` when both sets hold the
/// same ids.
#[must_use]
pub fn diff(old: &[ShapeId], new: &[ShapeId]) -> Option<SelectionChange> {
    let deselected: Vec<ShapeId> = old.iter().filter(|id| !new.contains(id)).copied().collect();
    let selected: Vec<ShapeId> = new.iter().filter(|id| !old.contains(id)).copied().collect();
    if !old.is_empty() && !new.is_empty() {
        if selected.is_empty() && deselected.is_empty() {
            None
        } else {
            Some(SelectionChange::Updated { selected, deselected })
        }
    } else if !new.is_empty() {
        Some(SelectionChange::Created { selected })
    } else if !old.is_empty() {
        Some(SelectionChange::Cleared { deselected })
    } else {
        None
    }
}

/// Owns the current [`Selection`] and applies guarded transitions.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    current: Selection,
}

impl SelectionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> &Selection {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Selection {
        &mut self.current
    }

    /// Make `id` the sole active shape.
    pub fn set_active(&mut self, scene: &Scene, id: ShapeId, guard: &dyn SelectionGuard) -> Transition {
        if !scene.contains(id) {
            return Transition::Vetoed;
        }
        self.replace(scene, Selection::Single(id), guard)
    }

    /// Make `ids` active: empty clears, one id selects it alone, more build
    /// an aggregate. Unknown and non-top-level ids are ignored.
    pub fn set_active_many(&mut self, scene: &Scene, ids: &[ShapeId], guard: &dyn SelectionGuard) -> Transition {
        let known: Vec<ShapeId> = scene.shapes().iter().map(|s| s.id).filter(|id| ids.contains(id)).collect();
        let next = match known.as_slice() {
            [] => Selection::Empty,
            [only] => Selection::Single(*only),
            _ => Selection::Multi(ActiveSelection::new(scene, &known)),
        };
        self.replace(scene, next, guard)
    }

    /// Clear the selection.
    pub fn discard_active(&mut self, scene: &Scene, guard: &dyn SelectionGuard) -> Transition {
        self.replace(scene, Selection::Empty, guard)
    }

    /// Guarded swap to `next`.
    pub fn replace(&mut self, scene: &Scene, next: Selection, guard: &dyn SelectionGuard) -> Transition {
        let old = self.current.ids();
        let new = next.ids();
        let leaving = old.iter().filter(|id| !new.contains(id)).filter_map(|id| scene.get(*id));
        for shape in leaving {
            if !guard.can_deselect(shape) {
                tracing::debug!(id = %shape.id, "deselection vetoed");
                return Transition::Vetoed;
            }
        }
        let entering = new.iter().filter(|id| !old.contains(id)).filter_map(|id| scene.get(*id));
        for shape in entering {
            if !guard.can_select(shape) {
                tracing::debug!(id = %shape.id, "selection vetoed");
                return Transition::Vetoed;
            }
        }
        self.current = next;
        match diff(&old, &new) {
            Some(change) => Transition::Changed(change),
            None => Transition::Unchanged,
        }
    }

    /// Drop `id` from the selection after it left the scene, without
    /// consulting guards. Used once the removal itself was approved.
    pub fn forget(&mut self, scene: &Scene, id: ShapeId) -> Option<SelectionChange> {
        if !self.current.contains(id) {
            return None;
        }
        let old = self.current.ids();
        let remaining: Vec<ShapeId> = old.iter().copied().filter(|m| *m != id).collect();
        self.current = match remaining.as_slice() {
            [] => Selection::Empty,
            [only] => Selection::Single(*only),
            _ => Selection::Multi(ActiveSelection::new(scene, &remaining)),
        };
        diff(&old, &self.current.ids())
    }
}
