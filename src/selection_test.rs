use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::geom::Point;

fn approx_point(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
}

fn scene_of(n: usize) -> (Scene, Vec<ShapeId>) {
    let mut scene = Scene::new();
    let ids = (0..n)
        .map(|i| {
            let offset = 20.0 * f64::from(u32::try_from(i).unwrap());
            scene.add(Shape::rect(offset, offset, 10.0, 10.0))
        })
        .collect();
    (scene, ids)
}

struct Refuse {
    select: Option<ShapeId>,
    deselect: Option<ShapeId>,
}

impl SelectionGuard for Refuse {
    fn can_select(&self, shape: &Shape) -> bool {
        self.select != Some(shape.id)
    }

    fn can_deselect(&self, shape: &Shape) -> bool {
        self.deselect != Some(shape.id)
    }
}

// =============================================================
// Diff
// =============================================================

#[test]
fn diff_classifies_changes() {
    let (_, ids) = scene_of(3);
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    assert_eq!(diff(&[], &[]), None);
    assert_eq!(diff(&[], &[a]), Some(SelectionChange::Created { selected: vec![a] }));
    assert_eq!(diff(&[a], &[]), Some(SelectionChange::Cleared { deselected: vec![a] }));
    assert_eq!(diff(&[a, b], &[b, a]), None);
    assert_eq!(
        diff(&[a, b], &[b, c]),
        Some(SelectionChange::Updated { selected: vec![c], deselected: vec![a] })
    );
    assert_eq!(diff(&[a], &[a, b]), Some(SelectionChange::Updated { selected: vec![b], deselected: vec![] }));
}

// =============================================================
// Transitions
// =============================================================

#[test]
fn set_active_reports_created_then_updated() {
    let (scene, ids) = scene_of(2);
    let mut manager = SelectionManager::new();
    assert_eq!(
        manager.set_active(&scene, ids[0], &AllowAll),
        Transition::Changed(SelectionChange::Created { selected: vec![ids[0]] })
    );
    assert_eq!(manager.set_active(&scene, ids[0], &AllowAll), Transition::Unchanged);
    assert_eq!(
        manager.set_active(&scene, ids[1], &AllowAll),
        Transition::Changed(SelectionChange::Updated { selected: vec![ids[1]], deselected: vec![ids[0]] })
    );
    assert_eq!(manager.current(), &Selection::Single(ids[1]));
}

#[test]
fn set_active_rejects_unknown_and_nested_ids() {
    let (mut scene, _) = scene_of(1);
    let child = Shape::rect(0.0, 0.0, 5.0, 5.0);
    let child_id = child.id;
    scene.add(Shape::group(vec![child]));
    let mut manager = SelectionManager::new();
    assert_eq!(manager.set_active(&scene, uuid::Uuid::new_v4(), &AllowAll), Transition::Vetoed);
    assert_eq!(manager.set_active(&scene, child_id, &AllowAll), Transition::Vetoed);
    assert!(manager.current().is_empty());
}

#[test]
fn many_ids_build_an_aggregate_in_scene_order() {
    let (scene, ids) = scene_of(3);
    let mut manager = SelectionManager::new();
    manager.set_active_many(&scene, &[ids[2], ids[0]], &AllowAll);
    let Selection::Multi(group) = manager.current() else {
        panic!("expected a multi-selection");
    };
    assert_eq!(group.member_ids(), vec![ids[0], ids[2]]);
    let (lo, hi) = group.frame().bounding_rect();
    assert!(approx_point(lo, Point::new(0.0, 0.0)));
    assert!(approx_point(hi, Point::new(50.0, 50.0)));
    assert!(manager.current().active_shape(&scene).is_some());
}

#[test]
fn one_id_selects_it_alone() {
    let (scene, ids) = scene_of(2);
    let mut manager = SelectionManager::new();
    manager.set_active_many(&scene, &[ids[1]], &AllowAll);
    assert_eq!(manager.current(), &Selection::Single(ids[1]));
    assert_eq!(
        manager.set_active_many(&scene, &[], &AllowAll),
        Transition::Changed(SelectionChange::Cleared { deselected: vec![ids[1]] })
    );
}

#[test]
fn discard_clears() {
    let (scene, ids) = scene_of(2);
    let mut manager = SelectionManager::new();
    manager.set_active_many(&scene, &ids, &AllowAll);
    let t = manager.discard_active(&scene, &AllowAll);
    assert_eq!(t, Transition::Changed(SelectionChange::Cleared { deselected: ids.clone() }));
    assert_eq!(manager.discard_active(&scene, &AllowAll), Transition::Unchanged);
}

// =============================================================
// Guards
// =============================================================

#[test]
fn deselect_veto_keeps_previous_selection() {
    let (scene, ids) = scene_of(2);
    let mut manager = SelectionManager::new();
    manager.set_active(&scene, ids[0], &AllowAll);
    let guard = Refuse { select: None, deselect: Some(ids[0]) };
    let t = manager.set_active(&scene, ids[1], &guard);
    assert_eq!(t, Transition::Vetoed);
    assert!(!t.accepted());
    assert_eq!(manager.current(), &Selection::Single(ids[0]));
    assert_eq!(manager.discard_active(&scene, &guard), Transition::Vetoed);
}

#[test]
fn one_select_veto_rejects_the_whole_change() {
    let (scene, ids) = scene_of(3);
    let mut manager = SelectionManager::new();
    manager.set_active(&scene, ids[0], &AllowAll);
    let guard = Refuse { select: Some(ids[2]), deselect: None };
    assert_eq!(manager.set_active_many(&scene, &ids, &guard), Transition::Vetoed);
    assert_eq!(manager.current(), &Selection::Single(ids[0]));
}

#[test]
fn staying_members_are_not_consulted() {
    let (scene, ids) = scene_of(2);
    let mut manager = SelectionManager::new();
    manager.set_active(&scene, ids[0], &AllowAll);
    let guard = Refuse { select: Some(ids[0]), deselect: Some(ids[0]) };
    assert!(manager.set_active_many(&scene, &ids, &guard).accepted());
}

// =============================================================
// Aggregate
// =============================================================

#[test]
fn realize_moves_members_with_the_frame() {
    let (mut scene, ids) = scene_of(2);
    let mut group = ActiveSelection::new(&scene, &ids);
    let left = group.frame().geometry().left;
    group.frame_mut().set_left(left + 100.0);
    group.realize(&mut scene);
    assert!(approx_point(scene.get(ids[0]).unwrap().corners().tl, Point::new(100.0, 0.0)));
    assert!(approx_point(scene.get(ids[1]).unwrap().corners().tl, Point::new(120.0, 20.0)));
}

#[test]
fn realize_rotates_members_around_the_frame_center() {
    let (mut scene, ids) = scene_of(2);
    let mut group = ActiveSelection::new(&scene, &ids);
    let center = group.frame().center_point();
    group.frame_mut().set_origin(crate::shape::OriginX::Center, crate::shape::OriginY::Center);
    group.frame_mut().set_position_by_origin(center, crate::shape::OriginX::Center, crate::shape::OriginY::Center);
    group.frame_mut().set_angle(180.0);
    group.realize(&mut scene);
    let first = scene.get(ids[0]).unwrap();
    assert!(approx_point(first.center_point(), Point::new(25.0, 25.0)));
    assert!((first.geometry().angle.rem_euclid(360.0) - 180.0).abs() < 1e-6);
}

#[test]
fn forget_shrinks_the_selection() {
    let (mut scene, ids) = scene_of(3);
    let mut manager = SelectionManager::new();
    manager.set_active_many(&scene, &ids, &AllowAll);
    scene.remove(ids[1]);
    let change = manager.forget(&scene, ids[1]);
    assert_eq!(change, Some(SelectionChange::Updated { selected: vec![], deselected: vec![ids[1]] }));
    assert_eq!(manager.current().ids(), vec![ids[0], ids[2]]);
    scene.remove(ids[0]);
    manager.forget(&scene, ids[0]);
    assert_eq!(manager.current(), &Selection::Single(ids[2]));
    assert_eq!(manager.forget(&scene, ids[0]), None);
}

// =============================================================
// Properties
// =============================================================

fn id_set(ids: &[ShapeId]) -> BTreeSet<ShapeId> {
    ids.iter().copied().collect()
}

fn random_guard(rng: &mut StdRng, ids: &[ShapeId]) -> Refuse {
    let pick = |rng: &mut StdRng| rng.random_bool(0.15).then(|| ids[rng.random_range(0..ids.len())]);
    let select = pick(rng);
    let deselect = pick(rng);
    Refuse { select, deselect }
}

#[test]
fn active_set_is_always_a_duplicate_free_subset_of_the_scene() {
    let (scene, ids) = scene_of(6);
    let mut rng = StdRng::seed_from_u64(11);
    let mut manager = SelectionManager::new();
    for _ in 0..500 {
        let pick: Vec<ShapeId> = ids.iter().copied().filter(|_| rng.random_bool(0.4)).collect();
        let veto = if rng.random_bool(0.2) { Some(ids[rng.random_range(0..ids.len())]) } else { None };
        let guard = Refuse { select: veto, deselect: None };
        let before = manager.current().clone();
        let t = manager.set_active_many(&scene, &pick, &guard);
        if t == Transition::Vetoed {
            assert_eq!(manager.current(), &before);
        }
        let active = manager.current().ids();
        let mut dedup = active.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), active.len());
        assert!(active.iter().all(|id| scene.contains(*id)));
        assert_eq!(active.len() > 1, matches!(manager.current(), Selection::Multi(_)));
    }
}

#[test]
fn each_net_change_reports_exactly_one_partitioned_event() {
    let (scene, ids) = scene_of(5);
    let mut rng = StdRng::seed_from_u64(29);
    let mut manager = SelectionManager::new();
    for _ in 0..1000 {
        let guard = random_guard(&mut rng, &ids);
        let old = id_set(&manager.current().ids());
        let before = manager.current().clone();
        let t = match rng.random_range(0..3) {
            0 => manager.set_active(&scene, ids[rng.random_range(0..ids.len())], &guard),
            1 => {
                let pick: Vec<ShapeId> = ids.iter().copied().filter(|_| rng.random_bool(0.4)).collect();
                manager.set_active_many(&scene, &pick, &guard)
            }
            _ => manager.discard_active(&scene, &guard),
        };
        let new = id_set(&manager.current().ids());

        let change = match t {
            Transition::Vetoed => {
                assert_eq!(manager.current(), &before);
                continue;
            }
            Transition::Unchanged => {
                assert_eq!(old, new, "a net change must be reported");
                continue;
            }
            Transition::Changed(change) => change,
        };
        assert_ne!(old, new, "no event without a net change");

        let (selected, deselected) = match change {
            SelectionChange::Created { selected } => {
                assert!(old.is_empty() && !new.is_empty());
                (selected, Vec::new())
            }
            SelectionChange::Cleared { deselected } => {
                assert!(!old.is_empty() && new.is_empty());
                (Vec::new(), deselected)
            }
            SelectionChange::Updated { selected, deselected } => {
                assert!(!old.is_empty() && !new.is_empty());
                (selected, deselected)
            }
        };
        let selected = id_set(&selected);
        let deselected = id_set(&deselected);
        assert!(selected.is_disjoint(&deselected));
        assert_eq!(selected, new.difference(&old).copied().collect());
        assert_eq!(deselected, old.difference(&new).copied().collect());
        let union: BTreeSet<ShapeId> = selected.union(&deselected).copied().collect();
        assert_eq!(union, old.symmetric_difference(&new).copied().collect());
    }
}
