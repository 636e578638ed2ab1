// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint descriptions accepted by the device.

use bitflags::bitflags;
use kurbo::Stroke;
use peniko::{BlendMode, Brush, Color};

/// Whether geometry is filled, stroked, or both.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PaintStyle {
    /// Fill the interior.
    #[default]
    Fill,
    /// Stroke the outline.
    Stroke,
    /// Fill, then stroke.
    FillAndStroke,
}

impl PaintStyle {
    /// The text rendering mode (`Tr`) operand for this style.
    pub const fn text_render_mode(self) -> u8 {
        match self {
            Self::Fill => 0,
            Self::Stroke => 1,
            Self::FillAndStroke => 2,
        }
    }
}

/// Horizontal placement of a glyph run relative to its origin.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextAlign {
    /// The run starts at the origin.
    #[default]
    Left,
    /// The run is centered on the origin.
    Center,
    /// The run ends at the origin.
    Right,
}

impl TextAlign {
    /// How far to move the origin back for a run of `advance` width.
    pub fn offset(self, advance: f64) -> f64 {
        match self {
            Self::Left => 0.0,
            Self::Center => advance / 2.0,
            Self::Right => advance,
        }
    }
}

bitflags! {
    /// Paint effects the content stream cannot represent.
    ///
    /// Draws whose paint carries any of these are skipped and reported as
    /// diagnostics.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PaintEffects: u8 {
        /// The geometry is altered before drawing (dashing, corner rounding).
        const PATH_EFFECT = 1 << 0;
        /// Coverage is filtered (blur and similar).
        const MASK_FILTER = 1 << 1;
        /// Colors are transformed after shading.
        const COLOR_FILTER = 1 << 2;
    }
}

/// Text-specific paint parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Em size in user units.
    pub size: f32,
    /// Horizontal scale, `1.0` for none.
    pub scale_x: f32,
    /// Horizontal skew applied through the text matrix.
    pub skew_x: f32,
    /// Placement relative to the origin.
    pub align: TextAlign,
    /// Embolden by stroking the outline.
    pub fake_bold: bool,
    /// Draw an underline below the run.
    pub underline: bool,
    /// Draw a line through the run.
    pub strike_through: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 12.0,
            scale_x: 1.0,
            skew_x: 0.0,
            align: TextAlign::Left,
            fake_bold: false,
            underline: false,
            strike_through: false,
        }
    }
}

/// Everything a draw call needs to know about how to color its geometry.
#[derive(Clone, Debug)]
pub struct Paint {
    /// Source color or shader.
    pub brush: Brush,
    /// Fill, stroke, or both.
    pub style: PaintStyle,
    /// Stroke parameters, used when `style` strokes.
    pub stroke: Stroke,
    /// Blend and compositing mode.
    pub blend: BlendMode,
    /// Text parameters, used by glyph draws.
    pub text: TextStyle,
    /// Unsupported effects attached to this paint.
    pub effects: PaintEffects,
}

impl Default for Paint {
    fn default() -> Self {
        Self::from_color(Color::BLACK)
    }
}

impl Paint {
    /// A fill paint with a solid color.
    pub fn from_color(color: Color) -> Self {
        Self::new(Brush::Solid(color))
    }

    /// A fill paint with the given brush.
    pub fn new(brush: Brush) -> Self {
        Self {
            brush,
            style: PaintStyle::Fill,
            stroke: Stroke::new(1.0),
            blend: BlendMode::default(),
            text: TextStyle::default(),
            effects: PaintEffects::empty(),
        }
    }

    /// Sets the style.
    #[must_use]
    pub fn with_style(mut self, style: PaintStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the stroke parameters.
    #[must_use]
    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        self.stroke = stroke;
        self
    }

    /// Sets the blend mode.
    #[must_use]
    pub fn with_blend(mut self, blend: impl Into<BlendMode>) -> Self {
        self.blend = blend.into();
        self
    }

    /// Sets the text parameters.
    #[must_use]
    pub fn with_text(mut self, text: TextStyle) -> Self {
        self.text = text;
        self
    }

    /// Adds effects.
    #[must_use]
    pub fn with_effects(mut self, effects: PaintEffects) -> Self {
        self.effects |= effects;
        self
    }
}
