// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shading patterns derived from gradient brushes.

use kurbo::Affine;
use peniko::{Brush, Color, Gradient};

use crate::region::IRect;

/// A gradient fill positioned in page space.
///
/// Patterns are anchored to the page rather than to the current transform,
/// so the pattern captures the full transform in effect when it was created
/// and the bounds of the clip it will be painted through.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfPattern {
    gradient: Gradient,
    transform: Affine,
    bounds: IRect,
}

impl PdfPattern {
    /// Creates a pattern.
    pub fn new(gradient: Gradient, transform: Affine, bounds: IRect) -> Self {
        Self {
            gradient,
            transform,
            bounds,
        }
    }

    /// The gradient.
    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    /// Gradient space to page space.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Device bounds the pattern has to cover.
    pub fn bounds(&self) -> IRect {
        self.bounds
    }
}

/// What a brush becomes in the output.
#[derive(Clone, Debug)]
pub(crate) enum ResolvedBrush {
    /// A flat color.
    Solid(Color),
    /// A shading pattern.
    Pattern(PdfPattern),
    /// Nothing the output can express.
    Unsupported,
}

/// Resolves `brush` drawn with the full page transform `transform` through a
/// clip bounded by `bounds`.
pub(crate) fn resolve_brush(brush: &Brush, transform: Affine, bounds: IRect) -> ResolvedBrush {
    match brush {
        Brush::Solid(color) => ResolvedBrush::Solid(*color),
        Brush::Gradient(gradient) => match constant_color(gradient) {
            Some(color) => ResolvedBrush::Solid(color),
            None => ResolvedBrush::Pattern(PdfPattern::new(gradient.clone(), transform, bounds)),
        },
        Brush::Image(_) => ResolvedBrush::Unsupported,
    }
}

/// The single color a gradient reduces to, if every stop is the same color.
///
/// A gradient without stops paints nothing and reduces to transparent.
pub(crate) fn constant_color(gradient: &Gradient) -> Option<Color> {
    let stops = gradient.stops.as_ref();
    let Some(first) = stops.first() else {
        return Some(Color::TRANSPARENT);
    };
    let first = first.color.to_alpha_color::<peniko::color::Srgb>();
    let key = first.to_rgba8();
    stops
        .iter()
        .all(|s| {
            let c = s.color.to_alpha_color::<peniko::color::Srgb>().to_rgba8();
            (c.r, c.g, c.b, c.a) == (key.r, key.g, key.b, key.a)
        })
        .then_some(first)
}
