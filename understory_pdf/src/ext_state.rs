// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Extended graphics states (`/ExtGState` resources).

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt::Write as _;

use kurbo::{Cap, Join};
use peniko::Mix;

use crate::paint::{Paint, PaintStyle};
use crate::writer::append_scalar;
use crate::xobject::FormXObject;

/// Separable and non-separable blend modes the output supports natively.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PdfBlendMode {
    /// `/Normal`
    #[default]
    Normal,
    /// `/Multiply`
    Multiply,
    /// `/Screen`
    Screen,
    /// `/Overlay`
    Overlay,
    /// `/Darken`
    Darken,
    /// `/Lighten`
    Lighten,
    /// `/ColorDodge`
    ColorDodge,
    /// `/ColorBurn`
    ColorBurn,
    /// `/HardLight`
    HardLight,
    /// `/SoftLight`
    SoftLight,
    /// `/Difference`
    Difference,
    /// `/Exclusion`
    Exclusion,
    /// `/Hue`
    Hue,
    /// `/Saturation`
    Saturation,
    /// `/Color`
    Color,
    /// `/Luminosity`
    Luminosity,
}

impl PdfBlendMode {
    /// Maps a peniko mix mode.
    pub fn from_mix(mix: Mix) -> Self {
        match mix {
            Mix::Multiply => Self::Multiply,
            Mix::Screen => Self::Screen,
            Mix::Overlay => Self::Overlay,
            Mix::Darken => Self::Darken,
            Mix::Lighten => Self::Lighten,
            Mix::ColorDodge => Self::ColorDodge,
            Mix::ColorBurn => Self::ColorBurn,
            Mix::HardLight => Self::HardLight,
            Mix::SoftLight => Self::SoftLight,
            Mix::Difference => Self::Difference,
            Mix::Exclusion => Self::Exclusion,
            Mix::Hue => Self::Hue,
            Mix::Saturation => Self::Saturation,
            Mix::Color => Self::Color,
            Mix::Luminosity => Self::Luminosity,
            _ => Self::Normal,
        }
    }

    /// The `/BM` name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Multiply => "Multiply",
            Self::Screen => "Screen",
            Self::Overlay => "Overlay",
            Self::Darken => "Darken",
            Self::Lighten => "Lighten",
            Self::ColorDodge => "ColorDodge",
            Self::ColorBurn => "ColorBurn",
            Self::HardLight => "HardLight",
            Self::SoftLight => "SoftLight",
            Self::Difference => "Difference",
            Self::Exclusion => "Exclusion",
            Self::Hue => "Hue",
            Self::Saturation => "Saturation",
            Self::Color => "Color",
            Self::Luminosity => "Luminosity",
        }
    }
}

/// The paint-derived part of the graphics state.
///
/// Float fields are stored as bits so the state can be a hash key; two states
/// with equal fields are the same resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PaintGraphicState {
    alpha: u8,
    blend: PdfBlendMode,
    stroke_width: u64,
    cap: u8,
    join: u8,
    miter_limit: u64,
}

impl PaintGraphicState {
    /// Captures the state of `paint` drawn with opacity `alpha`.
    pub fn from_paint(paint: &Paint, alpha: u8) -> Self {
        let stroke = &paint.stroke;
        let (width, cap, join, miter) = if paint.style == PaintStyle::Fill {
            // Stroke parameters don't affect fills; keep them canonical.
            (0.0, 0, 0, 4.0)
        } else {
            let cap = match stroke.start_cap {
                Cap::Butt => 0,
                Cap::Round => 1,
                Cap::Square => 2,
            };
            let join = match stroke.join {
                Join::Miter => 0,
                Join::Round => 1,
                Join::Bevel => 2,
            };
            (stroke.width, cap, join, stroke.miter_limit)
        };
        Self {
            alpha,
            blend: PdfBlendMode::from_mix(paint.blend.mix),
            stroke_width: width.to_bits(),
            cap,
            join,
            miter_limit: miter.to_bits(),
        }
    }

    /// Constant opacity, `255` for opaque.
    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    /// Blend mode.
    pub fn blend(&self) -> PdfBlendMode {
        self.blend
    }

    /// Line width.
    pub fn stroke_width(&self) -> f64 {
        f64::from_bits(self.stroke_width)
    }

    /// Line cap code (`LC`).
    pub fn cap(&self) -> u8 {
        self.cap
    }

    /// Line join code (`LJ`).
    pub fn join(&self) -> u8 {
        self.join
    }

    /// Miter limit (`ML`).
    pub fn miter_limit(&self) -> f64 {
        f64::from_bits(self.miter_limit)
    }
}

/// An extended graphics state resource.
#[derive(Debug)]
pub enum ExtGState {
    /// Opacity, blend mode and stroke parameters.
    Paint(PaintGraphicState),
    /// Masks everything drawn with the alpha of a form.
    SoftMask {
        /// The form whose alpha is the mask.
        mask: Arc<FormXObject>,
        /// Use `1 - alpha` instead.
        invert: bool,
    },
    /// Removes any soft mask.
    NoSoftMask,
}

impl ExtGState {
    /// The mask and invert flag, if this is a soft-mask state.
    pub fn soft_mask(&self) -> Option<(&Arc<FormXObject>, bool)> {
        match self {
            Self::SoftMask { mask, invert } => Some((mask, *invert)),
            _ => None,
        }
    }

    /// Writes the state's dictionary.
    ///
    /// `mask_ref` resolves the object number of a soft mask's form.
    pub fn write_dict(&self, out: &mut String, mask_ref: impl FnOnce(&Arc<FormXObject>) -> u32) {
        out.push_str("<< /Type /ExtGState ");
        match self {
            Self::Paint(state) => {
                let alpha = f64::from(state.alpha) / 255.0;
                out.push_str("/CA ");
                append_scalar(out, alpha);
                out.push_str(" /ca ");
                append_scalar(out, alpha);
                let _ = write!(out, " /SMask /None /SA true /BM /{}", state.blend.name());
                out.push_str(" /LW ");
                append_scalar(out, state.stroke_width());
                let _ = write!(out, " /LC {} /LJ {} /ML ", state.cap, state.join);
                append_scalar(out, state.miter_limit());
            }
            Self::SoftMask { mask, invert } => {
                let _ = write!(
                    out,
                    "/SMask << /Type /Mask /S /Alpha /G {} 0 R",
                    mask_ref(mask)
                );
                if *invert {
                    out.push_str(" /TR << /FunctionType 2 /Domain [0 1] /C0 [1] /C1 [0] /N 1 >>");
                }
                out.push_str(" >>");
            }
            Self::NoSoftMask => out.push_str("/SMask /None"),
        }
        out.push_str(" >>");
    }
}
