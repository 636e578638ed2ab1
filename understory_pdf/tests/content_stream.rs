// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end tests for `understory_pdf`.
//!
//! These drive a `PdfDevice` through its public draw calls and inspect the
//! finished content stream and resource tables.

use kurbo::{Affine, Circle, Point, Rect, Shape, Size};
use peniko::{BlendMode, Brush, Color, ColorStop, ColorStops, Compose, Fill, Gradient};
use understory_pdf::{
    Bitmap, ClipCombine, DeviceOptions, DrawContext, Error, ExtGState, NestedDevice, Paint,
    PdfDevice, ResourceCache, ResourceKind, ResourceTable, TextStyle, Typeface, XObject,
};

const RED: Color = Color::from_rgba8(255, 0, 0, 255);
const BLUE: Color = Color::from_rgba8(0, 0, 255, 255);

fn page(width: f64, height: f64) -> PdfDevice {
    PdfDevice::new(DeviceOptions::default().with_page_size(Size::new(width, height)))
}

fn entry_contents(device: &PdfDevice) -> Vec<&str> {
    device.entries().iter().map(|e| e.content()).collect()
}

#[test]
fn consecutive_draws_in_one_state_share_an_entry() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    let red = Paint::from_color(RED);
    device.draw_rect(&cx, Rect::new(0.0, 0.0, 10.0, 10.0), &red).unwrap();
    device.draw_rect(&cx, Rect::new(20.0, 0.0, 30.0, 10.0), &red).unwrap();

    assert_eq!(device.entries().len(), 1);
    assert_eq!(
        entry_contents(&device),
        ["0 0 10 10 re\nf\n20 0 10 10 re\nf\n"]
    );
}

#[test]
fn destination_mode_records_nothing() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    device
        .draw_rect(&cx, Rect::new(0.0, 0.0, 10.0, 10.0), &Paint::from_color(RED))
        .unwrap();
    let before = device.content();

    let dest = Paint::from_color(BLUE).with_blend(BlendMode::from(Compose::Dest));
    device.draw_rect(&cx, Rect::new(0.0, 0.0, 50.0, 50.0), &dest).unwrap();

    assert_eq!(device.entries().len(), 1);
    assert_eq!(device.content(), before);
    assert!(device.diagnostics().is_empty());
}

#[test]
fn source_in_isolates_the_destination_once() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    device
        .draw_rect(&cx, Rect::new(0.0, 0.0, 50.0, 50.0), &Paint::from_color(RED))
        .unwrap();
    let src_in = Paint::from_color(BLUE).with_blend(BlendMode::from(Compose::SrcIn));
    device.draw_rect(&cx, Rect::new(25.0, 25.0, 75.0, 75.0), &src_in).unwrap();

    let resources = device.resources();
    let forms: Vec<_> = resources.xobjects().iter().filter_map(XObject::as_form).collect();
    assert_eq!(forms.len(), 2);
    let destination = forms
        .iter()
        .find(|f| f.content().contains("1 0 0 RG 1 0 0 rg"))
        .expect("destination form");
    let source = forms
        .iter()
        .find(|f| f.content().contains("0 0 1 RG 0 0 1 rg"))
        .expect("source form");
    assert_eq!(
        forms.iter().filter(|f| std::sync::Arc::ptr_eq(f, destination)).count(),
        1
    );

    let masked_by_destination: Vec<_> = resources
        .ext_states()
        .iter()
        .filter_map(|s| s.soft_mask())
        .filter(|(mask, _)| std::sync::Arc::ptr_eq(mask, destination))
        .collect();
    assert_eq!(masked_by_destination.len(), 1);
    assert!(!masked_by_destination[0].1);

    // The source is drawn through the destination's mask.
    let source_index = resources
        .xobjects()
        .iter()
        .position(|x| x.as_form().is_some_and(|f| std::sync::Arc::ptr_eq(f, source)))
        .unwrap();
    let content = device.content();
    assert!(content.contains(&format!("/X{source_index} Do\n")), "{content}");
    assert!(content.ends_with("gs\n"), "{content}");
}

#[test]
fn source_in_over_nothing_is_a_no_op() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    let src_in = Paint::from_color(BLUE).with_blend(BlendMode::from(Compose::SrcIn));
    device.draw_rect(&cx, Rect::new(0.0, 0.0, 10.0, 10.0), &src_in).unwrap();
    assert!(device.is_empty());
    assert!(device.resources().xobjects().is_empty());
}

const RED_FILL: &str = "1 0 0 RG 1 0 0 rg";
const BLUE_FILL: &str = "0 0 1 RG 0 0 1 rg";

/// Draws a red square, then a blue one with `compose`, and checks the final
/// masked pass: the form filled with `drawn` is painted through a soft mask
/// made from the form filled with `mask`.
fn check_masked_pass(compose: Compose, drawn: &str, mask: &str, invert: bool) {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    device
        .draw_rect(&cx, Rect::new(0.0, 0.0, 50.0, 50.0), &Paint::from_color(RED))
        .unwrap();
    let paint = Paint::from_color(BLUE).with_blend(BlendMode::from(compose));
    device.draw_rect(&cx, Rect::new(25.0, 25.0, 75.0, 75.0), &paint).unwrap();

    let resources = device.resources();
    let drawn_index = resources
        .xobjects()
        .iter()
        .position(|x| x.as_form().is_some_and(|f| f.content().contains(drawn)))
        .expect("masked form is drawn");
    let masks: Vec<(usize, bool)> = resources
        .ext_states()
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            s.soft_mask()
                .filter(|(form, _)| form.content().contains(mask))
                .map(|(_, inverted)| (i, inverted))
        })
        .collect();
    assert_eq!(masks.len(), 1);
    let (mask_index, inverted) = masks[0];
    assert_eq!(inverted, invert);

    let content = device.content();
    assert!(
        content.contains(&format!("/G{mask_index} gs\n/X{drawn_index} Do\n")),
        "{content}"
    );
    assert!(device.diagnostics().is_empty());
}

#[test]
fn source_out_draws_the_source_outside_the_destination() {
    check_masked_pass(Compose::SrcOut, BLUE_FILL, RED_FILL, true);
}

#[test]
fn destination_in_keeps_the_destination_inside_the_source() {
    check_masked_pass(Compose::DestIn, RED_FILL, BLUE_FILL, false);
}

#[test]
fn destination_out_keeps_the_destination_outside_the_source() {
    check_masked_pass(Compose::DestOut, RED_FILL, BLUE_FILL, true);
}

#[test]
fn destination_in_draws_only_the_destination() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    device
        .draw_rect(&cx, Rect::new(0.0, 0.0, 50.0, 50.0), &Paint::from_color(RED))
        .unwrap();
    let paint = Paint::from_color(BLUE).with_blend(BlendMode::from(Compose::DestIn));
    device.draw_rect(&cx, Rect::new(25.0, 25.0, 75.0, 75.0), &paint).unwrap();

    let forms: Vec<_> = device
        .resources()
        .xobjects()
        .iter()
        .filter_map(XObject::as_form)
        .collect();
    assert_eq!(forms.len(), 1);
    assert!(forms[0].content().contains("1 0 0 RG 1 0 0 rg"));
}

#[test]
fn destination_over_draws_beneath() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    device
        .draw_rect(&cx, Rect::new(0.0, 0.0, 10.0, 10.0), &Paint::from_color(RED))
        .unwrap();
    let under = Paint::from_color(BLUE).with_blend(BlendMode::from(Compose::DestOver));
    device.draw_rect(&cx, Rect::new(5.0, 5.0, 15.0, 15.0), &under).unwrap();

    let content = device.content();
    let blue = content.find("0 0 1 rg").unwrap();
    let red = content.find("1 0 0 rg").unwrap();
    assert!(blue < red, "{content}");
}

#[test]
fn equal_values_intern_to_one_index() {
    let mut cache = ResourceCache::new();
    let mut table = ResourceTable::new();
    let paint = Paint::from_color(RED);
    let a = cache.paint_state(understory_pdf::PaintGraphicState::from_paint(&paint, 255));
    let b = cache.paint_state(understory_pdf::PaintGraphicState::from_paint(&paint, 255));
    let c = cache.paint_state(understory_pdf::PaintGraphicState::from_paint(&paint, 128));
    assert_eq!(table.intern(&a), 0);
    assert_eq!(table.intern(&b), 0);
    assert_eq!(table.intern(&c), 1);
    assert_eq!(table.len(), 2);
}

#[test]
fn page_content_is_flipped_and_balanced() {
    let mut device = page(200.0, 100.0);
    let base = device.existing_clip().clone();

    let mut narrow = base.clone();
    narrow.clip_rect(Rect::new(0.0, 0.0, 50.0, 50.0), Affine::IDENTITY, ClipCombine::Intersect);
    let red = Paint::from_color(RED);
    let blue = Paint::from_color(BLUE);

    device
        .draw_rect(&DrawContext::new(&narrow), Rect::new(0.0, 0.0, 5.0, 5.0), &red)
        .unwrap();
    device
        .draw_rect(
            &DrawContext::new(&narrow).with_transform(Affine::translate((10.0, 0.0))),
            Rect::new(0.0, 0.0, 5.0, 5.0),
            &blue,
        )
        .unwrap();
    device
        .draw_rect(&DrawContext::new(&base), Rect::new(60.0, 60.0, 70.0, 70.0), &red)
        .unwrap();

    let content = device.content();
    assert!(content.starts_with("1 0 0 -1 0 100 cm\n"), "{content}");
    assert_eq!(content.matches("q\n").count(), content.matches("Q\n").count());
    // The narrowed clip is set once for both draws that use it.
    assert_eq!(content.matches("0 0 50 50 re\nW n\n").count(), 1);
    assert!(content.contains("1 0 0 1 10 0 cm\n"), "{content}");
}

#[test]
fn non_intersect_clips_use_the_region_boundary() {
    let mut device = page(100.0, 100.0);
    let mut clip = device.existing_clip().clone();
    let hole = Circle::new((50.0, 50.0), 20.0).to_path(0.1);
    clip.clip_path(&hole, Fill::NonZero, false, Affine::IDENTITY, ClipCombine::Difference);
    device
        .draw_rect(&DrawContext::new(&clip), Rect::new(0.0, 0.0, 100.0, 100.0), &Paint::from_color(RED))
        .unwrap();

    let content = device.content();
    assert_eq!(content.matches("W n\n").count(), 1, "{content}");
    assert!(!content.contains(" c\n"), "{content}");
}

#[test]
fn text_runs_select_fonts_and_scale() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    let face = Typeface::new(7, false, vec![0.5; 16]);
    let paint = Paint::from_color(RED).with_text(TextStyle {
        size: 10.0,
        scale_x: 2.0,
        ..TextStyle::default()
    });
    device
        .draw_text(&cx, &face, &[3, 4, 5], Point::new(5.0, 50.0), &paint)
        .unwrap();

    let content = device.content();
    assert!(content.contains("200 Tz\n"), "{content}");
    assert!(
        content.contains("BT\n1 0 0 -1 5 50 Tm\n/F0 10 Tf\n<040506> Tj\nET\n"),
        "{content}"
    );
    assert_eq!(device.resources().fonts().len(), 1);
    assert_eq!(device.resources().fonts().get(0).unwrap().typeface_id(), 7);
}

#[test]
fn empty_text_records_nothing() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let face = Typeface::new(1, false, Vec::new());
    device
        .draw_text(&DrawContext::new(&clip), &face, &[], Point::ORIGIN, &Paint::default())
        .unwrap();
    assert!(device.is_empty());
}

#[test]
fn gradients_become_patterns() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let stops = [ColorStop::from((0.0, RED)), ColorStop::from((1.0, BLUE))];
    let gradient = Gradient {
        stops: ColorStops::from(stops.as_slice()),
        ..Gradient::new_linear((0.0, 0.0), (100.0, 0.0))
    };
    let paint = Paint::new(Brush::Gradient(gradient));
    device
        .draw_rect(&DrawContext::new(&clip), Rect::new(0.0, 0.0, 100.0, 100.0), &paint)
        .unwrap();

    assert_eq!(device.resources().patterns().len(), 1);
    assert!(
        device
            .content()
            .contains("/Pattern CS /Pattern cs /P0 SCN /P0 scn\n")
    );
}

#[test]
fn layers_embed_as_forms() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let mut layer = device.new_layer(100, 100, &clip);
    layer
        .draw_rect(&DrawContext::new(&clip), Rect::new(0.0, 0.0, 10.0, 10.0), &Paint::from_color(RED))
        .unwrap();
    assert!(!layer.is_empty());

    device
        .draw_device(
            &DrawContext::new(&clip),
            NestedDevice::Vector(&mut layer),
            0,
            0,
            &Paint::default(),
        )
        .unwrap();

    assert!(layer.is_empty());
    let form = device.resources().xobjects().get(0).unwrap().as_form().unwrap();
    assert!(form.content().contains("1 0 0 rg"));
    assert_eq!(form.bbox(), Rect::new(0.0, 0.0, 100.0, 100.0));
    assert!(device.content().contains("/X0 Do\n"));
}

#[test]
fn layers_set_their_own_color() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let mut layer = device.new_layer(100, 100, &clip);
    let black = Paint::from_color(Color::from_rgba8(0, 0, 0, 255));
    layer
        .draw_rect(&DrawContext::new(&clip), Rect::new(0.0, 0.0, 10.0, 10.0), &black)
        .unwrap();

    device
        .draw_device(
            &DrawContext::new(&clip),
            NestedDevice::Vector(&mut layer),
            0,
            0,
            &Paint::from_color(RED),
        )
        .unwrap();

    let form = device.resources().xobjects().get(0).unwrap().as_form().unwrap();
    let content = form.content();
    let color = content.find("0 0 0 RG 0 0 0 rg\n").expect(content);
    assert!(color < content.find(" re\n").unwrap(), "{content}");
    assert!(device.content().contains("1 0 0 rg\n"));
}

#[test]
fn short_pixel_buffers_fail_without_drawing() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let pixels = [0_u8; 10];
    let result = device.draw_image(
        &DrawContext::new(&clip),
        &Bitmap::new(4, 4, &pixels),
        None,
        Affine::IDENTITY,
        &Paint::default(),
    );
    assert_eq!(
        result,
        Err(Error::PixelBufferTooSmall {
            expected: 64,
            actual: 10
        })
    );
    assert!(device.is_empty());
    assert!(device.resources().is_empty());
}

#[test]
fn resource_dictionary_names_every_namespace() {
    let mut device = page(100.0, 100.0);
    let clip = device.existing_clip().clone();
    let cx = DrawContext::new(&clip);
    let pixels = [255_u8; 4];
    device
        .draw_sprite(&cx, &Bitmap::new(1, 1, &pixels), 3, 4, &Paint::default())
        .unwrap();

    let mut dict = String::new();
    device.write_resource_dict(&mut dict, |kind, index| {
        let index = u32::try_from(index).unwrap();
        match kind {
            ResourceKind::ExtGState => 10 + index,
            _ => 20 + index,
        }
    });
    assert_eq!(
        dict,
        "<< /ExtGState << /G0 10 0 R >> /XObject << /X0 20 0 R >> \
         /ProcSet [/PDF /Text /ImageB /ImageC /ImageI] >>"
    );
    assert!(matches!(
        &**device.resources().ext_states().get(0).unwrap(),
        ExtGState::Paint(_)
    ));
}
