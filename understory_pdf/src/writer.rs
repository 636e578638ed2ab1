// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Low-level content-stream operator writers.
//!
//! Every function appends complete operators (terminated by a newline) to a
//! `String`. Numbers are written with [`append_scalar`], which keeps the output
//! compact and deterministic.

use alloc::format;
use alloc::string::String;
use core::fmt::Write as _;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _; // for `round` and `abs`
use kurbo::{Affine, BezPath, PathEl, Point, Rect};
use peniko::Fill;

use crate::paint::PaintStyle;

/// Appends a number in the compact form used throughout content streams.
///
/// Integral values are written without a fraction, other values are rounded to
/// four decimals with trailing zeros removed. Negative zero prints as `0`, and
/// non-finite values print as `0` since the format has no representation for
/// them.
pub fn append_scalar(out: &mut String, value: f64) {
    if !value.is_finite() {
        out.push('0');
        return;
    }
    let rounded = value.round();
    if (value - rounded).abs() < 1e-6 && rounded.abs() < 1e15 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "magnitude is bounded by the check above"
        )]
        let i = rounded as i64;
        let _ = write!(out, "{i}");
        return;
    }
    let mut s = format!("{value:.4}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s.remove(0);
    }
    out.push_str(&s);
}

fn append_point(out: &mut String, p: Point) {
    append_scalar(out, p.x);
    out.push(' ');
    append_scalar(out, p.y);
}

/// `x y m`
pub fn move_to(out: &mut String, p: Point) {
    append_point(out, p);
    out.push_str(" m\n");
}

/// `x y l`
pub fn line_to(out: &mut String, p: Point) {
    append_point(out, p);
    out.push_str(" l\n");
}

/// `x1 y1 x2 y2 x3 y3 c`
pub fn cubic_to(out: &mut String, p1: Point, p2: Point, p3: Point) {
    append_point(out, p1);
    out.push(' ');
    append_point(out, p2);
    out.push(' ');
    append_point(out, p3);
    out.push_str(" c\n");
}

/// `h`
pub fn close_path(out: &mut String) {
    out.push_str("h\n");
}

/// `x y w h re`, normalized so the width and height are non-negative.
pub fn append_rect(out: &mut String, rect: Rect) {
    let rect = rect.abs();
    append_point(out, Point::new(rect.x0, rect.y0));
    out.push(' ');
    append_scalar(out, rect.width());
    out.push(' ');
    append_scalar(out, rect.height());
    out.push_str(" re\n");
}

/// Emits the construction operators for `path`.
///
/// The format only has cubic segments, so quadratics are degree-elevated.
pub fn emit_path(out: &mut String, path: &BezPath) {
    let mut current = Point::ORIGIN;
    let mut start = Point::ORIGIN;
    for el in path.iter() {
        match el {
            PathEl::MoveTo(p) => {
                move_to(out, p);
                current = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                line_to(out, p);
                current = p;
            }
            PathEl::QuadTo(p1, p2) => {
                let c1 = current + (p1 - current) * (2.0 / 3.0);
                let c2 = p2 + (p1 - p2) * (2.0 / 3.0);
                cubic_to(out, c1, c2, p2);
                current = p2;
            }
            PathEl::CurveTo(p1, p2, p3) => {
                cubic_to(out, p1, p2, p3);
                current = p3;
            }
            PathEl::ClosePath => {
                close_path(out);
                current = start;
            }
        }
    }
}

/// Paints the current path: `f`, `f*`, `S`, `B`, or `B*`.
pub fn paint_path(out: &mut String, style: PaintStyle, fill: Fill) {
    let op = match (style, fill) {
        (PaintStyle::Fill, Fill::NonZero) => "f",
        (PaintStyle::Fill, Fill::EvenOdd) => "f*",
        (PaintStyle::Stroke, _) => "S",
        (PaintStyle::FillAndStroke, Fill::NonZero) => "B",
        (PaintStyle::FillAndStroke, Fill::EvenOdd) => "B*",
    };
    out.push_str(op);
    out.push('\n');
}

/// `S`
pub fn stroke_path(out: &mut String) {
    out.push_str("S\n");
}

/// Intersects the clip with the current path and ends it without painting.
pub fn clip_current_path(out: &mut String, fill: Fill) {
    out.push_str(match fill {
        Fill::NonZero => "W n\n",
        Fill::EvenOdd => "W* n\n",
    });
}

/// `a b c d e f cm`
pub fn append_transform(out: &mut String, transform: Affine) {
    for (i, v) in transform.as_coeffs().into_iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        append_scalar(out, v);
    }
    out.push_str(" cm\n");
}

/// `/Gn gs`
pub fn apply_graphic_state(out: &mut String, index: usize) {
    let _ = writeln!(out, "/G{index} gs");
}

/// `/Xn Do`
pub fn draw_xobject(out: &mut String, index: usize) {
    let _ = writeln!(out, "/X{index} Do");
}

/// Writes an RGB triple as three unit-interval components.
pub fn append_color(out: &mut String, rgb: [u8; 3]) {
    for (i, c) in rgb.into_iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        append_scalar(out, f64::from(c) / 255.0);
    }
}

/// Writes glyph codes as a hex string, two digits per code for single-byte
/// fonts and four for multi-byte fonts.
pub fn append_glyph_string(out: &mut String, codes: &[u16], multi_byte: bool) {
    out.push('<');
    for &code in codes {
        if multi_byte {
            let _ = write!(out, "{code:04X}");
        } else {
            let _ = write!(out, "{:02X}", code & 0xFF);
        }
    }
    out.push('>');
}
