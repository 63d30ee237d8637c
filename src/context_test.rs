#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn fills_record_current_composite_and_alpha() {
    let mut ctx = RecordingContext::new(10, 10);
    ctx.set_composite(CompositeOp::DestinationOut);
    ctx.set_global_alpha(0.5);
    ctx.fill(Rgba::BLACK).unwrap();
    assert_eq!(
        ctx.commands.last(),
        Some(&DrawCommand::Fill { color: Rgba::BLACK, composite: CompositeOp::DestinationOut, alpha: 0.5 })
    );
    assert_eq!(ctx.paints_with(CompositeOp::DestinationOut), 1);
    assert_eq!(ctx.paints_with(CompositeOp::SourceOver), 0);
}

#[test]
fn restore_pops_composite_state() {
    let mut ctx = RecordingContext::new(10, 10);
    ctx.save();
    ctx.set_composite(CompositeOp::DestinationIn);
    ctx.set_global_alpha(0.25);
    ctx.restore();
    assert_eq!(ctx.global_alpha(), 1.0);
    ctx.stroke(Rgba::WHITE, 2.0).unwrap();
    assert_eq!(ctx.paints_with(CompositeOp::SourceOver), 1);
}

#[test]
fn unbalanced_restore_is_ignored() {
    let mut ctx = RecordingContext::new(10, 10);
    ctx.set_global_alpha(0.3);
    ctx.restore();
    assert_eq!(ctx.global_alpha(), 0.3);
}

#[test]
fn layer_starts_fresh_and_composites_with_parent_state() {
    let mut ctx = RecordingContext::new(10, 10);
    ctx.set_composite(CompositeOp::DestinationOut);
    ctx.set_global_alpha(0.5);
    ctx.begin_layer().unwrap();
    assert_eq!(ctx.global_alpha(), 1.0);
    ctx.fill(Rgba::BLACK).unwrap();
    assert_eq!(ctx.paints_with(CompositeOp::SourceOver), 1);
    ctx.end_layer().unwrap();
    assert_eq!(
        ctx.commands.last(),
        Some(&DrawCommand::EndLayer { composite: CompositeOp::DestinationOut, alpha: 0.5 })
    );
    assert_eq!(ctx.global_alpha(), 0.5);
}

#[test]
fn end_layer_without_begin_fails() {
    let mut ctx = RecordingContext::new(10, 10);
    let err = ctx.end_layer().unwrap_err();
    assert_eq!(err.error_code(), "E_RENDER");
}

#[test]
fn paint_count_and_clear() {
    let mut ctx = RecordingContext::new(4, 3);
    assert_eq!(ctx.size(), (4, 3));
    assert!(!ctx.was_cleared());
    ctx.clear();
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 1.0, 1.0);
    ctx.fill(Rgba::WHITE).unwrap();
    ctx.stroke(Rgba::BLACK, 1.0).unwrap();
    assert!(ctx.was_cleared());
    assert_eq!(ctx.paint_count(), 2);
    ctx.reset();
    assert_eq!(ctx.paint_count(), 0);
    assert!(!ctx.was_cleared());
}

#[test]
fn image_records_pixel_size() {
    let mut ctx = RecordingContext::new(4, 4);
    let img = ImageData { width: 2, height: 3, pixels: vec![0; 24] };
    ctx.draw_image(&img, 0.0, 0.0, 20.0, 30.0).unwrap();
    assert_eq!(ctx.commands, vec![DrawCommand::Image { width: 2, height: 3 }]);
}

#[test]
fn rgba_helpers() {
    assert_eq!(Rgba::new(1, 2, 3, 4).alpha(), 4);
    assert_eq!(Rgba::TRANSPARENT.alpha(), 0);
}
