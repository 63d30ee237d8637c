use super::*;

const RED: Rgba = Rgba::new(255, 0, 0, 255);

fn filled_rect(ctx: &mut RasterContext, x: f64, y: f64, w: f64, h: f64) {
    ctx.begin_path();
    ctx.rect(x, y, w, h);
    ctx.fill(RED).unwrap();
}

// =============================================================
// Allocation
// =============================================================

#[test]
fn zero_size_is_a_raster_error() {
    let err = RasterContext::new(0, 10).unwrap_err();
    assert_eq!(err.error_code(), "E_RASTER");
}

#[test]
fn new_surface_is_transparent() {
    let ctx = RasterContext::new(8, 8).unwrap();
    assert!(!ctx.any_opaque());
    assert_eq!(ctx.size(), (8, 8));
}

// =============================================================
// Painting
// =============================================================

#[test]
fn fill_covers_only_the_path() {
    let mut ctx = RasterContext::new(20, 20).unwrap();
    filled_rect(&mut ctx, 5.0, 5.0, 10.0, 10.0);
    assert_eq!(ctx.alpha_at(10, 10), 255);
    assert_eq!(ctx.alpha_at(2, 2), 0);
    assert_eq!(ctx.alpha_at(18, 18), 0);
}

#[test]
fn transform_applies_when_points_are_added() {
    let mut ctx = RasterContext::new(40, 40).unwrap();
    ctx.set_transform(Matrix::translate(20.0, 20.0));
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 10.0, 10.0);
    ctx.set_transform(Matrix::IDENTITY);
    ctx.fill(RED).unwrap();
    assert_eq!(ctx.alpha_at(25, 25), 255);
    assert_eq!(ctx.alpha_at(5, 5), 0);
}

#[test]
fn global_alpha_scales_paint() {
    let mut ctx = RasterContext::new(10, 10).unwrap();
    ctx.set_global_alpha(0.5);
    filled_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0);
    let a = ctx.alpha_at(5, 5);
    assert!((126..=129).contains(&a), "alpha {a}");
}

#[test]
fn ellipse_leaves_corners_empty() {
    let mut ctx = RasterContext::new(20, 20).unwrap();
    ctx.begin_path();
    ctx.ellipse(Point::new(10.0, 10.0), 10.0, 10.0);
    ctx.fill(RED).unwrap();
    assert_eq!(ctx.alpha_at(10, 10), 255);
    assert_eq!(ctx.alpha_at(0, 0), 0);
}

#[test]
fn stroke_width_follows_the_transform() {
    let mut ctx = RasterContext::new(40, 40).unwrap();
    ctx.set_transform(Matrix::scale(4.0, 4.0));
    ctx.begin_path();
    ctx.move_to(Point::new(0.0, 5.0));
    ctx.line_to(Point::new(10.0, 5.0));
    ctx.stroke(RED, 2.0).unwrap();
    // Line at y=20 with a device width of 8.
    assert_eq!(ctx.alpha_at(20, 17), 255);
    assert_eq!(ctx.alpha_at(20, 26), 0);
}

#[test]
fn destination_out_removes_pixels() {
    let mut ctx = RasterContext::new(20, 20).unwrap();
    filled_rect(&mut ctx, 0.0, 0.0, 20.0, 20.0);
    ctx.set_composite(CompositeOp::DestinationOut);
    filled_rect(&mut ctx, 0.0, 0.0, 10.0, 20.0);
    assert_eq!(ctx.alpha_at(5, 5), 0);
    assert_eq!(ctx.alpha_at(15, 5), 255);
}

#[test]
fn clip_limits_paint_until_restore() {
    let mut ctx = RasterContext::new(20, 20).unwrap();
    ctx.save();
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 10.0, 10.0);
    ctx.clip();
    filled_rect(&mut ctx, 0.0, 0.0, 20.0, 20.0);
    ctx.restore();
    assert_eq!(ctx.alpha_at(5, 5), 255);
    assert_eq!(ctx.alpha_at(15, 15), 0);
    filled_rect(&mut ctx, 0.0, 0.0, 20.0, 20.0);
    assert_eq!(ctx.alpha_at(15, 15), 255);
}

// =============================================================
// Layers
// =============================================================

#[test]
fn destination_in_layer_clears_outside_the_mask() {
    let mut ctx = RasterContext::new(20, 20).unwrap();
    ctx.begin_layer().unwrap();
    filled_rect(&mut ctx, 0.0, 0.0, 20.0, 20.0);
    ctx.set_composite(CompositeOp::DestinationIn);
    filled_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0);
    ctx.end_layer().unwrap();
    assert_eq!(ctx.alpha_at(5, 5), 255);
    assert_eq!(ctx.alpha_at(15, 15), 0);
}

#[test]
fn layer_composites_with_recorded_op() {
    let mut ctx = RasterContext::new(20, 20).unwrap();
    filled_rect(&mut ctx, 0.0, 0.0, 20.0, 20.0);
    ctx.set_composite(CompositeOp::DestinationOut);
    ctx.begin_layer().unwrap();
    filled_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0);
    ctx.end_layer().unwrap();
    assert_eq!(ctx.alpha_at(5, 5), 0);
    assert_eq!(ctx.alpha_at(15, 15), 255);
}

#[test]
fn end_layer_without_begin_fails() {
    let mut ctx = RasterContext::new(4, 4).unwrap();
    assert_eq!(ctx.end_layer().unwrap_err().error_code(), "E_RENDER");
}

// =============================================================
// Images and export
// =============================================================

#[test]
fn image_is_scaled_into_its_box() {
    let mut ctx = RasterContext::new(20, 20).unwrap();
    let image = ImageData { width: 2, height: 2, pixels: vec![255; 16] };
    ctx.draw_image(&image, 0.0, 0.0, 10.0, 10.0).unwrap();
    assert_eq!(ctx.alpha_at(4, 4), 255);
    assert_eq!(ctx.alpha_at(15, 15), 0);
}

#[test]
fn malformed_image_is_a_render_error() {
    let mut ctx = RasterContext::new(4, 4).unwrap();
    let image = ImageData { width: 3, height: 3, pixels: vec![0; 4] };
    assert!(ctx.draw_image(&image, 0.0, 0.0, 4.0, 4.0).is_err());
}

#[test]
fn composite_over_flattens() {
    let mut bottom = RasterContext::new(10, 10).unwrap();
    let mut top = RasterContext::new(10, 10).unwrap();
    filled_rect(&mut top, 0.0, 0.0, 5.0, 5.0);
    bottom.composite_over(&top);
    assert_eq!(bottom.alpha_at(2, 2), 255);
    assert_eq!(bottom.alpha_at(7, 7), 0);
}

#[test]
fn png_has_signature() {
    let ctx = RasterContext::new(3, 3).unwrap();
    let bytes = ctx.encode_png().unwrap();
    assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
}
