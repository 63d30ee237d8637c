//! Drawing surface: the single owner of scene, camera, selection, gesture
//! state and eraser.
//!
//! DESIGN
//! ======
//! Pointer entry points translate screen input into hit resolution,
//! selection changes, transform sessions, marquee selection and eraser
//! strokes. Every handler returns the [`Action`]s it produced, in order, for
//! the host to process; programmatic operations queue theirs for
//! [`Surface::take_actions`]. Selection hooks run as pure predicates before
//! a transition and notifications are emitted after it, so nothing a host
//! does in response can observe a half-applied state.
//!
//! Rendering is pull-based: mutations mark layers dirty and report
//! `RenderNeeded` once per scheduled frame; the host calls
//! [`Surface::render_frame`] on its next tick.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use crate::camera::Camera;
use crate::config::SurfaceConfig;
use crate::context::RenderContext;
use crate::control::{ActionName, Cursor};
use crate::eraser::{EraserBrush, ErasureReport};
use crate::error::{EaselError, Result};
use crate::geom::Point;
use crate::hit::{self, Hit, HitPart, HitTarget};
use crate::input::{Button, GroupSelector, InputState, Modifiers, PointerKind, Tool};
use crate::raster::RasterContext;
use crate::render::{self, Chrome, DrawFilter, FramePlan, FrameScheduler, View};
use crate::scene::Scene;
use crate::selection::{AllowAll, Selection, SelectionChange, SelectionGuard, SelectionManager, Transition};
use crate::shape::{CoordSpace, Shape, ShapeId};
use crate::transform::{MoveInput, TransformKind, TransformSession, TransformTarget};

/// Notifications returned to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The active set changed.
    Selection(SelectionChange),
    /// A transform session changed geometry during a pointer move.
    Transform { kind: TransformKind, session: Box<TransformSession>, pointer: Point },
    /// A session that changed geometry was committed on pointer-up.
    Modified { target: TransformTarget, action: ActionName },
    ErasingStarted,
    ErasingEnded(ErasureReport),
    SetCursor(Cursor),
    /// A frame was scheduled; call [`Surface::render_frame`] on the next tick.
    RenderNeeded,
}

/// An interactive drawing surface.
pub struct Surface {
    pub scene: Scene,
    pub camera: Camera,
    pub config: SurfaceConfig,
    pub tool: Tool,
    selection: SelectionManager,
    input: InputState,
    eraser: EraserBrush,
    scheduler: FrameScheduler,
    guard: Box<dyn SelectionGuard>,
    cursor: Cursor,
    pending: Vec<Action>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("shapes", &self.scene.len())
            .field("camera", &self.camera)
            .field("tool", &self.tool)
            .field("selection", &self.selection.current().ids())
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(SurfaceConfig::default())
    }
}

impl Surface {
    #[must_use]
    pub fn new(config: SurfaceConfig) -> Self {
        Self::with_scene(Scene::new(), config)
    }

    #[must_use]
    pub fn with_scene(scene: Scene, config: SurfaceConfig) -> Self {
        Self {
            scene,
            camera: Camera::default(),
            eraser: EraserBrush::new(config.eraser_width),
            config,
            tool: Tool::Select,
            selection: SelectionManager::new(),
            input: InputState::Idle,
            scheduler: FrameScheduler::new(),
            guard: Box::new(AllowAll),
            cursor: Cursor::Default,
            pending: Vec::new(),
        }
    }

    /// Install the predicates consulted before every selection change.
    pub fn set_guard(&mut self, guard: Box<dyn SelectionGuard>) {
        self.guard = guard;
    }

    // --- Queries ---

    #[must_use]
    pub fn selection(&self) -> &Selection {
        self.selection.current()
    }

    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    #[must_use]
    pub fn eraser(&self) -> &EraserBrush {
        &self.eraser
    }

    /// Whether a frame is waiting to be rendered.
    #[must_use]
    pub fn needs_render(&self) -> bool {
        self.scheduler.is_requested()
    }

    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.scheduler.frames()
    }

    /// Read-only inputs for a render or hit pass.
    #[must_use]
    pub fn view(&self) -> View<'_> {
        View {
            scene: &self.scene,
            selection: self.selection.current(),
            config: &self.config,
            vpt: self.camera.viewport_transform(),
        }
    }

    /// Resolve the target under a screen point.
    #[must_use]
    pub fn find_target(&self, screen: Point, kind: PointerKind) -> Option<Hit> {
        hit::find_target(&self.view(), screen, kind)
    }

    /// Drain actions queued by programmatic operations.
    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending)
    }

    // --- Scene mutation ---

    /// Add a shape on top of the stack.
    pub fn add(&mut self, shape: Shape) -> ShapeId {
        let id = self.scene.add(shape);
        self.invalidate_main();
        id
    }

    /// Remove a top-level shape. An active shape must first pass the
    /// deselection guard; `Ok(None)` reports a veto.
    ///
    /// # Errors
    ///
    /// Returns [`EaselError::ShapeNotFound`] when `id` is not a top-level shape.
    pub fn remove(&mut self, id: ShapeId) -> Result<Option<Shape>> {
        if self.scene.index_of(id).is_none() {
            return Err(EaselError::ShapeNotFound(id));
        }
        let vetoed = self.selection.current().contains(id)
            && self.scene.get(id).is_some_and(|shape| !self.guard.can_deselect(shape));
        if vetoed {
            tracing::debug!(%id, "removal vetoed");
            return Ok(None);
        }
        if self.session_touches(id) {
            tracing::debug!(%id, "transform session aborted: target removed");
            self.input = InputState::Idle;
        }
        let removed = self.scene.remove(id);
        if let Some(change) = self.selection.forget(&self.scene, id) {
            self.pending.push(Action::Selection(change));
        }
        self.invalidate_main();
        Ok(removed)
    }

    /// Switch tools. A stroke in progress is dropped.
    pub fn set_tool(&mut self, tool: Tool) {
        if matches!(self.input, InputState::Erasing) {
            self.cancel_erasing();
        }
        self.tool = tool;
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.invalidate_main();
    }

    // --- Selection ---

    /// Make `id` the sole active shape. Returns `false` on a veto or an
    /// unknown id.
    pub fn set_active(&mut self, id: ShapeId) -> bool {
        let transition = self.selection.set_active(&self.scene, id, self.guard.as_ref());
        self.apply_transition(transition)
    }

    /// Make `ids` active together. Returns `false` on a veto.
    pub fn set_active_many(&mut self, ids: &[ShapeId]) -> bool {
        let transition = self.selection.set_active_many(&self.scene, ids, self.guard.as_ref());
        self.apply_transition(transition)
    }

    /// Clear the selection. Returns `false` on a veto.
    pub fn discard_active(&mut self) -> bool {
        let transition = self.selection.discard_active(&self.scene, self.guard.as_ref());
        self.apply_transition(transition)
    }

    // --- Pointer input ---

    /// Pointer pressed at `screen`.
    pub fn on_pointer_down(&mut self, screen: Point, button: Button, modifiers: Modifiers, kind: PointerKind) -> Vec<Action> {
        if button != Button::Primary {
            return self.take_actions();
        }
        if !self.input.is_idle() {
            self.finish_gesture();
        }
        let world = self.camera.screen_to_world(screen);

        if self.tool == Tool::Erase {
            self.eraser.width = self.config.eraser_width;
            self.eraser.begin(world);
            self.input = InputState::Erasing;
            self.pending.push(Action::ErasingStarted);
            self.invalidate_main();
            return self.take_actions();
        }

        let hit = self.find_target(screen, kind);
        let Some(hit) = hit else {
            self.discard_active();
            self.start_marquee(world);
            return self.take_actions();
        };

        if self.should_group(&hit, modifiers) {
            self.toggle_membership(&hit, screen);
            return self.take_actions();
        }

        let selectable = self.target_selectable(hit.target);
        if !selectable {
            self.discard_active();
            self.start_marquee(world);
            return self.take_actions();
        }
        if let HitTarget::Shape(id) = hit.target {
            if !self.selection.current().contains(id) || matches!(self.selection.current(), Selection::Multi(_)) {
                self.set_active(id);
            }
        }
        if self.is_active_target(hit.target) {
            self.begin_session(&hit, world, modifiers);
        }
        self.take_actions()
    }

    /// Pointer moved to `screen`.
    pub fn on_pointer_move(&mut self, screen: Point, modifiers: Modifiers, kind: PointerKind) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen);
        match self.input {
            InputState::Idle => self.hover(screen, modifiers, kind),
            InputState::Transforming(_) => self.transform(world, modifiers),
            InputState::Marquee(ref mut selector) => {
                selector.current = world;
                self.invalidate_top();
            }
            InputState::Erasing => {
                if self.eraser.add_point(world) {
                    self.invalidate_main();
                }
            }
        }
        self.take_actions()
    }

    /// Pointer released at `screen`.
    pub fn on_pointer_up(&mut self, screen: Point, modifiers: Modifiers, kind: PointerKind) -> Vec<Action> {
        self.finish_gesture();
        self.hover(screen, modifiers, kind);
        self.take_actions()
    }

    /// Pointer capture lost. A transform session is dropped where it stands
    /// without restoring the press-time geometry.
    pub fn on_pointer_cancel(&mut self) -> Vec<Action> {
        match std::mem::take(&mut self.input) {
            InputState::Idle => {}
            InputState::Transforming(session) => {
                tracing::debug!(target = ?session.target, changed = session.changed, "transform session aborted");
                self.invalidate_top();
            }
            InputState::Marquee(_) => self.invalidate_top(),
            InputState::Erasing => self.cancel_erasing(),
        }
        self.take_actions()
    }

    // --- Rendering ---

    /// Ask for a full repaint on the next tick.
    pub fn request_render(&mut self) {
        self.invalidate_main();
    }

    /// Paint the dirty layers. `main` receives the scene, `top` the
    /// interaction chrome. While erasing, both layers are repainted with
    /// the eraser passes.
    ///
    /// # Errors
    ///
    /// Propagates any context failure.
    pub fn render_frame(&mut self, main: &mut dyn RenderContext, top: &mut dyn RenderContext) -> Result<FramePlan> {
        let plan = self.scheduler.begin_frame();
        let view = View {
            scene: &self.scene,
            selection: self.selection.current(),
            config: &self.config,
            vpt: self.camera.viewport_transform(),
        };
        if matches!(self.input, InputState::Erasing) {
            self.eraser.render(main, top, &view)?;
            return Ok(FramePlan { main: true, top: true });
        }
        if plan.main {
            render::render_main(main, &view, &DrawFilter::default())?;
        }
        if plan.top {
            render::render_top(top, &view, &self.chrome())?;
        }
        Ok(plan)
    }

    /// Render both layers into one `width × height` raster.
    ///
    /// # Errors
    ///
    /// Returns [`EaselError::Raster`] for a zero-sized target and propagates
    /// render failures.
    pub fn snapshot(&self, width: u32, height: u32) -> Result<RasterContext> {
        let view = self.view();
        let mut main = RasterContext::new(width, height)?;
        let mut top = RasterContext::new(width, height)?;
        render::render_main(&mut main, &view, &DrawFilter::default())?;
        render::render_top(&mut top, &view, &self.chrome())?;
        main.composite_over(&top);
        Ok(main)
    }

    // --- Internals ---

    fn chrome(&self) -> Chrome {
        match &self.input {
            InputState::Marquee(selector) => Chrome { marquee: Some(*selector), moving: false },
            InputState::Transforming(session) => {
                Chrome { marquee: None, moving: session.action == ActionName::Drag && session.changed }
            }
            InputState::Idle | InputState::Erasing => Chrome::default(),
        }
    }

    fn invalidate_main(&mut self) {
        if self.scheduler.invalidate_main() {
            self.pending.push(Action::RenderNeeded);
        }
    }

    fn invalidate_top(&mut self) {
        if self.scheduler.invalidate_top() {
            self.pending.push(Action::RenderNeeded);
        }
    }

    /// Queue the notification for a transition. Returns whether it was
    /// accepted.
    fn apply_transition(&mut self, transition: Transition) -> bool {
        let accepted = transition.accepted();
        if let Transition::Changed(change) = transition {
            self.pending.push(Action::Selection(change));
            self.invalidate_main();
        }
        accepted
    }

    fn target_selectable(&self, target: HitTarget) -> bool {
        match target {
            HitTarget::Shape(id) => self.scene.get(id).is_some_and(|s| s.selectable),
            HitTarget::ActiveSelection => true,
        }
    }

    fn is_active_target(&self, target: HitTarget) -> bool {
        match (target, self.selection.current()) {
            (HitTarget::Shape(id), Selection::Single(active)) => id == *active,
            (HitTarget::ActiveSelection, Selection::Multi(_)) => true,
            _ => false,
        }
    }

    fn session_touches(&self, id: ShapeId) -> bool {
        match self.input.session().map(|s| s.target) {
            Some(TransformTarget::Shape(target)) => target == id,
            Some(TransformTarget::ActiveSelection) => self.selection.current().contains(id),
            None => false,
        }
    }

    /// Selection-key press on a selectable target while something else (or
    /// a multi-selection) is active.
    fn should_group(&self, hit: &Hit, modifiers: Modifiers) -> bool {
        if !self.config.selection || !modifiers.is_held(self.config.selection_key) || hit.part != HitPart::Body {
            return false;
        }
        match (self.selection.current(), hit.target) {
            (Selection::Empty, _) => false,
            (Selection::Single(active), HitTarget::Shape(id)) => *active != id && self.target_selectable(hit.target),
            (Selection::Multi(_), _) => self.target_selectable(hit.target),
            (Selection::Single(_), HitTarget::ActiveSelection) => false,
        }
    }

    /// Add the shape under the pointer to the selection, or remove it when
    /// it is already a member.
    fn toggle_membership(&mut self, hit: &Hit, screen: Point) {
        let id = match hit.target {
            HitTarget::Shape(id) => Some(id),
            HitTarget::ActiveSelection => hit::find_shape(&self.view(), screen),
        };
        let Some(id) = id.filter(|id| self.scene.get(*id).is_some_and(|s| s.selectable)) else {
            return;
        };
        let mut ids = self.selection.current().ids();
        if ids.contains(&id) {
            ids.retain(|m| *m != id);
        } else {
            ids.push(id);
        }
        self.set_active_many(&ids);
    }

    fn start_marquee(&mut self, world: Point) {
        if self.config.selection {
            self.input = InputState::Marquee(GroupSelector { start: world, current: world });
        }
    }

    fn begin_session(&mut self, hit: &Hit, world: Point, modifiers: Modifiers) {
        let target = match hit.target {
            HitTarget::Shape(id) => TransformTarget::Shape(id),
            HitTarget::ActiveSelection => TransformTarget::ActiveSelection,
        };
        let view = self.view();
        let Some(shape) = hit::resolve(&view, hit.target) else {
            return;
        };
        let (corner, action) = match hit.part {
            HitPart::Control(key) => {
                let action = shape.controls().get(key).map(|c| c.action_name(modifiers, &self.config));
                (Some(key), action.unwrap_or(ActionName::Drag))
            }
            HitPart::Body => (None, ActionName::Drag),
        };
        let session = TransformSession::begin(target, shape, corner, action, world, modifiers, &self.config);
        self.input = InputState::Transforming(Box::new(session));
        self.invalidate_top();
    }

    fn transform(&mut self, world: Point, modifiers: Modifiers) {
        let InputState::Transforming(session) = &mut self.input else {
            return;
        };
        let input = MoveInput { pointer: world, modifiers, config: &self.config, zoom: self.camera.zoom };
        let changed = match session.target {
            TransformTarget::Shape(id) => self.scene.get_mut(id).and_then(|shape| session.apply(shape, &input)),
            TransformTarget::ActiveSelection => match self.selection.current_mut() {
                Selection::Multi(group) => {
                    let kind = session.apply(group.frame_mut(), &input);
                    if kind.is_some() {
                        group.realize(&mut self.scene);
                    }
                    kind
                }
                _ => None,
            },
        };
        let Some(kind) = changed else {
            return;
        };
        let action = Action::Transform { kind, session: session.clone(), pointer: world };
        self.pending.push(action);
        self.invalidate_main();
    }

    /// End whatever gesture is in progress as a normal release.
    fn finish_gesture(&mut self) {
        match std::mem::take(&mut self.input) {
            InputState::Idle => {}
            InputState::Transforming(session) => {
                tracing::debug!(target = ?session.target, action = ?session.action, changed = session.changed, "transform session committed");
                if session.changed {
                    self.pending.push(Action::Modified { target: session.target, action: session.action });
                }
                self.invalidate_top();
            }
            InputState::Marquee(selector) => {
                self.invalidate_top();
                if !selector.is_click() {
                    let ids = self.collect_marquee(&selector);
                    if !ids.is_empty() {
                        self.set_active_many(&ids);
                    }
                }
            }
            InputState::Erasing => {
                let report = self.eraser.finalize(&mut self.scene);
                self.pending.push(Action::ErasingEnded(report));
                self.invalidate_main();
            }
        }
    }

    /// Top-level shapes caught by the marquee, in scene order.
    fn collect_marquee(&self, selector: &GroupSelector) -> Vec<ShapeId> {
        let tl = selector.start.min(selector.current);
        let br = selector.start.max(selector.current);
        let partial = !self.config.selection_fully_contained;
        self.scene
            .shapes()
            .iter()
            .filter(|s| s.selectable && s.visible && s.evented)
            .filter(|s| {
                s.is_contained_within_rect(tl, br)
                    || (partial
                        && (s.intersects_with_rect(tl, br)
                            || s.contains_point(selector.start, CoordSpace::Absolute)
                            || s.contains_point(selector.current, CoordSpace::Absolute)))
            })
            .map(|s| s.id)
            .collect()
    }

    fn cancel_erasing(&mut self) {
        self.eraser.cancel();
        self.input = InputState::Idle;
        self.pending.push(Action::ErasingEnded(ErasureReport::default()));
        self.invalidate_main();
    }

    fn hover(&mut self, screen: Point, modifiers: Modifiers, kind: PointerKind) {
        let cursor = if self.tool == Tool::Erase {
            Cursor::Crosshair
        } else {
            let view = self.view();
            let hit = hit::find_target(&view, screen, kind);
            hit::hover_cursor(&view, hit.as_ref(), modifiers)
        };
        if cursor != self.cursor {
            self.cursor = cursor;
            self.pending.push(Action::SetCursor(cursor));
        }
    }
}
