#![allow(clippy::float_cmp)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

fn sizes() -> HandleSizes {
    HandleSizes { corner: 13.0, touch: 24.0 }
}

/// Even-odd ray casting over an arbitrary polygon.
fn reference_contains(poly: &[Point], p: Point) -> bool {
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn random_shape(rng: &mut StdRng) -> Shape {
    let mut s = Shape::rect(
        rng.random_range(-200.0..200.0),
        rng.random_range(-200.0..200.0),
        rng.random_range(1.0..150.0),
        rng.random_range(1.0..150.0),
    );
    s.set_geometry(GeometryPatch {
        angle: Some(rng.random_range(0.0..360.0)),
        scale_x: Some(rng.random_range(0.2..3.0)),
        scale_y: Some(rng.random_range(0.2..3.0)),
        skew_x: Some(rng.random_range(-40.0..40.0)),
        ..GeometryPatch::default()
    });
    s
}

// =============================================================
// Origins
// =============================================================

#[test]
fn origin_offsets() {
    assert_eq!(OriginX::Left.offset(), -0.5);
    assert_eq!(OriginX::Right.offset(), 0.5);
    assert_eq!(OriginY::Center.offset(), 0.0);
    assert_eq!(OriginX::Left.opposite(), OriginX::Right);
    assert_eq!(OriginY::Bottom.opposite(), OriginY::Top);
    assert_eq!(OriginY::Center.opposite(), OriginY::Center);
}

#[test]
fn center_point_of_top_left_origin() {
    let s = Shape::rect(10.0, 20.0, 100.0, 50.0);
    assert!(point_approx_eq(s.center_point(), pt(60.0, 45.0)));
}

#[test]
fn center_point_with_center_origin() {
    let mut s = Shape::rect(10.0, 20.0, 100.0, 50.0);
    s.set_origin(OriginX::Center, OriginY::Center);
    assert!(point_approx_eq(s.center_point(), pt(10.0, 20.0)));
}

#[test]
fn center_point_rotates_around_origin_anchor() {
    let mut s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    s.set_angle(90.0);
    assert!(point_approx_eq(s.center_point(), pt(-50.0, 50.0)));
}

#[test]
fn set_position_by_origin_moves_anchor() {
    let mut s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    s.set_position_by_origin(pt(200.0, 200.0), OriginX::Right, OriginY::Bottom);
    assert!(point_approx_eq(s.corners().br, pt(200.0, 200.0)));
    assert!(approx_eq(s.geometry().left, 100.0));
}

#[test]
fn to_local_point_undoes_rotation() {
    let mut s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    s.set_origin(OriginX::Center, OriginY::Center);
    s.set_angle(90.0);
    let local = s.to_local_point(pt(0.0, 30.0), OriginX::Center, OriginY::Center);
    assert!(point_approx_eq(local, pt(30.0, 0.0)));
}

// =============================================================
// Scale
// =============================================================

#[test]
fn zero_scale_is_clamped() {
    let mut s = Shape::rect(0.0, 0.0, 10.0, 10.0);
    s.set_scale_x(0.0);
    assert!(s.geometry().scale_x > 0.0);
    assert!(s.own_matrix().invert().is_some());
}

#[test]
fn min_scale_limit_applies() {
    let mut s = Shape::rect(0.0, 0.0, 10.0, 10.0);
    s.min_scale_limit = 0.5;
    s.set_scale_y(0.1);
    assert_eq!(s.geometry().scale_y, 0.5);
}

#[test]
fn negative_scale_toggles_flip() {
    let mut s = Shape::rect(0.0, 0.0, 10.0, 10.0);
    s.set_scale_x(-2.0);
    assert_eq!(s.geometry().scale_x, 2.0);
    assert!(s.geometry().flip_x);
    s.set_scale_x(-1.0);
    assert!(!s.geometry().flip_x);
}

#[test]
fn apply_transform_matrix_round_trips() {
    let mut s = Shape::rect(5.0, 7.0, 40.0, 30.0);
    s.set_geometry(GeometryPatch { angle: Some(30.0), scale_x: Some(2.0), scale_y: Some(0.5), ..GeometryPatch::default() });
    let m = s.own_matrix();
    let mut t = Shape::rect(0.0, 0.0, 40.0, 30.0);
    t.apply_transform_matrix(&m);
    assert!(t.own_matrix().approx_eq(&m, 1e-9));
}

// =============================================================
// Corners and caches
// =============================================================

#[test]
fn corners_of_unrotated_rect() {
    let c = Shape::rect(10.0, 10.0, 100.0, 50.0).corners();
    assert!(point_approx_eq(c.tl, pt(10.0, 10.0)));
    assert!(point_approx_eq(c.tr, pt(110.0, 10.0)));
    assert!(point_approx_eq(c.br, pt(110.0, 60.0)));
    assert!(point_approx_eq(c.bl, pt(10.0, 60.0)));
}

#[test]
fn line_coords_apply_viewport() {
    let s = Shape::rect(10.0, 10.0, 100.0, 50.0);
    let vpt = Matrix([2.0, 0.0, 0.0, 2.0, 5.0, 5.0]);
    let c = s.line_coords(&vpt);
    assert!(point_approx_eq(c.tl, pt(25.0, 25.0)));
    assert!(point_approx_eq(c.br, pt(225.0, 125.0)));
}

#[test]
fn line_coords_grow_by_padding() {
    let mut s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    s.set_geometry(GeometryPatch { padding: Some(5.0), ..GeometryPatch::default() });
    let c = s.line_coords(&Matrix::IDENTITY);
    assert!(point_approx_eq(c.tl, pt(-5.0, -5.0)));
    assert!(point_approx_eq(c.tr, pt(105.0, -5.0)));
    assert!(point_approx_eq(c.br, pt(105.0, 105.0)));
    assert!(point_approx_eq(c.bl, pt(-5.0, 105.0)));
}

#[test]
fn every_mutation_bumps_generation() {
    let mut s = Shape::rect(0.0, 0.0, 10.0, 10.0);
    let mut last = s.generation();
    let steps: Vec<Box<dyn Fn(&mut Shape)>> = vec![
        Box::new(|s: &mut Shape| s.set_left(3.0)),
        Box::new(|s: &mut Shape| s.set_top(4.0)),
        Box::new(|s: &mut Shape| s.set_width(20.0)),
        Box::new(|s: &mut Shape| s.set_angle(10.0)),
        Box::new(|s: &mut Shape| s.set_skew_x(5.0)),
        Box::new(|s: &mut Shape| s.set_skew_y(5.0)),
        Box::new(|s: &mut Shape| s.set_scale_x(2.0)),
        Box::new(|s: &mut Shape| s.set_scale_y(2.0)),
        Box::new(|s: &mut Shape| s.set_origin(OriginX::Center, OriginY::Center)),
        Box::new(|s: &mut Shape| s.set_geometry(GeometryPatch::default())),
    ];
    for step in steps {
        step(&mut s);
        assert!(s.generation() != last);
        last = s.generation();
    }
}

#[test]
fn caches_never_serve_stale_values() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut s = Shape::rect(0.0, 0.0, 80.0, 40.0);
    let vpt = Matrix([1.5, 0.0, 0.0, 1.5, 10.0, -20.0]);
    for _ in 0..500 {
        match rng.random_range(0..5) {
            0 => s.set_left(rng.random_range(-100.0..100.0)),
            1 => s.set_angle(rng.random_range(0.0..360.0)),
            2 => s.set_scale_x(rng.random_range(0.1..4.0)),
            3 => s.set_skew_y(rng.random_range(-30.0..30.0)),
            _ => s.set_width(rng.random_range(1.0..200.0)),
        }
        let fresh = s.compute_corners();
        assert_eq!(s.corners(), fresh);
        assert_eq!(s.line_coords(&vpt), fresh.transform(&vpt));
        let handles = s.handle_coords(&vpt, sizes());
        let br = handles.iter().find(|h| h.key == "br").unwrap();
        assert!(point_approx_eq(br.position, vpt.apply(fresh.br)));
    }
}

#[test]
fn handle_cache_tracks_viewport() {
    let s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    let a = s.handle_coords(&Matrix::IDENTITY, sizes());
    let b = s.handle_coords(&Matrix::IDENTITY, sizes());
    assert!(Arc::ptr_eq(&a, &b));
    let c = s.handle_coords(&Matrix::scale(2.0, 2.0), sizes());
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn handle_positions_for_unit_shape() {
    let s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    let handles = s.handle_coords(&Matrix::IDENTITY, sizes());
    let find = |key: &str| handles.iter().find(|h| h.key == key).unwrap().position;
    assert!(point_approx_eq(find("br"), pt(100.0, 100.0)));
    assert!(point_approx_eq(find("ml"), pt(0.0, 50.0)));
    assert!(point_approx_eq(find("mtr"), pt(50.0, -40.0)));
}

#[test]
fn handle_offsets_stay_in_screen_pixels_under_zoom() {
    let s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    let handles = s.handle_coords(&Matrix::scale(2.0, 2.0), sizes());
    let mtr = handles.iter().find(|h| h.key == "mtr").unwrap().position;
    assert!(point_approx_eq(mtr, pt(100.0, -40.0)));
}

#[test]
fn handle_box_is_centered_on_position() {
    let s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    let handles = s.handle_coords(&Matrix::IDENTITY, sizes());
    let br = handles.iter().find(|h| h.key == "br").unwrap();
    assert!(point_approx_eq(br.corner.tl, pt(93.5, 93.5)));
    assert!(point_approx_eq(br.corner.br, pt(106.5, 106.5)));
}

// =============================================================
// Containment and intersection
// =============================================================

#[test]
fn contains_point_inside_and_outside() {
    let s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    assert!(s.contains_point(pt(50.0, 50.0), CoordSpace::Absolute));
    assert!(!s.contains_point(pt(150.0, 50.0), CoordSpace::Absolute));
    assert!(!s.contains_point(pt(-1.0, 50.0), CoordSpace::Absolute));
}

#[test]
fn vertical_edges_count_at_or_right_of_point() {
    let s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    assert_eq!(s.corners().crossings(pt(0.0, 50.0)), 2);
    assert!(!s.contains_point(pt(0.0, 50.0), CoordSpace::Absolute));
    assert!(s.contains_point(pt(100.0, 50.0), CoordSpace::Absolute));
    assert!(!s.contains_point(pt(100.0 + 1e-6, 50.0), CoordSpace::Absolute));
}

#[test]
fn contains_point_in_viewport_space() {
    let s = Shape::rect(0.0, 0.0, 100.0, 100.0);
    let vpt = Matrix::scale(2.0, 2.0);
    assert!(s.contains_point(pt(150.0, 150.0), CoordSpace::Viewport(vpt)));
    assert!(!s.contains_point(pt(150.0, 150.0), CoordSpace::Absolute));
}

#[test]
fn containment_agrees_with_ray_casting_reference() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..10_000 {
        let s = random_shape(&mut rng);
        let p = pt(rng.random_range(-500.0..500.0), rng.random_range(-500.0..500.0));
        let poly = s.corners().points();
        assert_eq!(
            s.contains_point(p, CoordSpace::Absolute),
            reference_contains(&poly, p),
            "disagreement at {p:?} for {poly:?}"
        );
    }
}

#[test]
fn overlapping_shapes_intersect() {
    let a = Shape::rect(0.0, 0.0, 100.0, 100.0);
    let b = Shape::rect(50.0, 50.0, 100.0, 100.0);
    assert!(a.intersects(&b));
    assert!(b.intersects(&a));
}

#[test]
fn nested_shapes_intersect_both_ways() {
    let outer = Shape::rect(0.0, 0.0, 100.0, 100.0);
    let inner = Shape::rect(40.0, 40.0, 10.0, 10.0);
    assert!(outer.intersects(&inner));
    assert!(inner.intersects(&outer));
    assert!(inner.is_contained_within(&outer));
    assert!(!outer.is_contained_within(&inner));
}

#[test]
fn disjoint_shapes_do_not_intersect() {
    let a = Shape::rect(0.0, 0.0, 10.0, 10.0);
    let b = Shape::rect(50.0, 50.0, 10.0, 10.0);
    assert!(!a.intersects(&b));
}

#[test]
fn rect_containment_and_crossing() {
    let s = Shape::rect(10.0, 10.0, 20.0, 20.0);
    assert!(s.is_contained_within_rect(pt(0.0, 0.0), pt(50.0, 50.0)));
    assert!(!s.is_contained_within_rect(pt(15.0, 0.0), pt(50.0, 50.0)));
    assert!(s.intersects_with_rect(pt(15.0, 0.0), pt(50.0, 50.0)));
    assert!(!s.intersects_with_rect(pt(0.0, 0.0), pt(50.0, 50.0)));
}

// =============================================================
// Controls
// =============================================================

#[test]
fn shapes_share_one_control_set() {
    let a = Shape::rect(0.0, 0.0, 1.0, 1.0);
    let b = Shape::ellipse(0.0, 0.0, 1.0, 1.0);
    assert!(Arc::ptr_eq(&a.controls(), &b.controls()));
}

#[test]
fn visibility_override_is_per_shape() {
    let mut a = Shape::rect(0.0, 0.0, 1.0, 1.0);
    let b = Shape::rect(0.0, 0.0, 1.0, 1.0);
    a.set_control_visible("mtr", false);
    assert!(!a.is_control_visible("mtr"));
    assert!(b.is_control_visible("mtr"));
    assert!(a.controls().get("mtr").unwrap().visible);
}

#[test]
fn unknown_control_is_invisible() {
    assert!(!Shape::rect(0.0, 0.0, 1.0, 1.0).is_control_visible("zz"));
}

#[test]
fn textbox_uses_textbox_controls() {
    let t = Shape::textbox(0.0, 0.0, 200.0, "hello", 20.0);
    assert!(Arc::ptr_eq(&t.controls(), &ControlSet::textbox()));
}

// =============================================================
// Groups, paths, eraser storage
// =============================================================

#[test]
fn group_bounds_and_relative_children() {
    let g = Shape::group(vec![Shape::rect(0.0, 0.0, 10.0, 10.0), Shape::rect(90.0, 40.0, 10.0, 10.0)]);
    assert!(g.is_group());
    assert!(approx_eq(g.geometry().width, 100.0));
    assert!(approx_eq(g.geometry().height, 50.0));
    let first = &g.children()[0];
    assert!(point_approx_eq(first.center_point(), pt(-45.0, -20.0)));
    let world = g.own_matrix().apply(first.center_point());
    assert!(point_approx_eq(world, pt(5.0, 5.0)));
}

#[test]
fn path_box_includes_stroke_width() {
    let p = Shape::path(vec![pt(0.0, 10.0), pt(100.0, 10.0)], Rgba::BLACK, 10.0);
    assert!(approx_eq(p.geometry().width, 110.0));
    assert!(approx_eq(p.geometry().height, 10.0));
    assert!(point_approx_eq(p.center_point(), pt(50.0, 10.0)));
}

#[test]
fn eraser_stroke_rejected_for_non_erasable() {
    let mut s = Shape::rect(0.0, 0.0, 10.0, 10.0);
    s.erasable = Erasable::No;
    let stroke = EraserStroke { path: Shape::path(vec![pt(0.0, 0.0), pt(5.0, 5.0)], Rgba::BLACK, 2.0), clip: None };
    assert!(!s.add_eraser_stroke(stroke));
    assert!(s.eraser.is_none());
}

#[test]
fn first_eraser_stroke_adopts_clip_path() {
    let mut s = Shape::rect(0.0, 0.0, 10.0, 10.0);
    s.clip_path = Some(Box::new(Shape::ellipse(-5.0, -5.0, 10.0, 10.0)));
    let stroke = EraserStroke { path: Shape::path(vec![pt(0.0, 0.0), pt(5.0, 5.0)], Rgba::BLACK, 2.0), clip: None };
    assert!(s.add_eraser_stroke(stroke.clone()));
    assert!(s.clip_path.is_none());
    assert!(s.eraser.as_ref().unwrap().base_clip.is_some());
    assert!(s.add_eraser_stroke(stroke));
    assert_eq!(s.eraser_len(), 2);
}

#[test]
fn deserialize_fills_defaults() {
    let s: Shape = serde_json::from_str(r#"{"kind":{"type":"ellipse"},"geometry":{"width":20,"height":10}}"#).unwrap();
    assert_eq!(s.kind, ShapeKind::Ellipse);
    assert_eq!(s.geometry().width, 20.0);
    assert_eq!(s.geometry().scale_x, 1.0);
    assert!(s.visible && s.evented && s.selectable);
    assert_eq!(s.erasable, Erasable::Yes);
}
