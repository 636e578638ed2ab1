// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graphics state captured by content entries and stack frames.

use alloc::sync::Arc;

use kurbo::Affine;

use crate::clip::ClipChain;
use crate::font::PdfFont;
use crate::paint::PaintStyle;
use crate::region::Region;

/// Where fill and stroke color comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FillSource {
    /// A flat RGB color.
    Color([u8; 3]),
    /// The pattern resource at this index.
    Pattern(usize),
}

impl Default for FillSource {
    fn default() -> Self {
        Self::Color([0, 0, 0])
    }
}

/// Text parameters that live in the graphics state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextState {
    /// Horizontal scale, `1.0` for none (`Tz` is this times 100).
    pub scale_x: f32,
    /// Fill, stroke, or both (`Tr`).
    pub fill_mode: PaintStyle,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            fill_mode: PaintStyle::Fill,
        }
    }
}

/// The font selected with `Tf`.
#[derive(Clone, Debug)]
pub struct ActiveFont {
    /// The font resource.
    pub font: Arc<PdfFont>,
    /// Its index in the font table.
    pub index: usize,
    /// Text size.
    pub size: f32,
}

/// The complete graphics state a run of drawing operations needs.
#[derive(Clone, Debug, Default)]
pub struct CapturedState {
    /// User space to device space.
    pub transform: Affine,
    /// Clip operations since the inherited base clip.
    pub clip: ClipChain,
    /// The resolved clip.
    pub clip_region: Region,
    /// Fill and stroke color source.
    pub fill: FillSource,
    /// Extended state index, if any.
    pub ext_state: Option<usize>,
    /// Text state, `None` when the state draws no text.
    pub text: Option<TextState>,
    /// Font set inside the entry, `None` until text selects one.
    pub font: Option<ActiveFont>,
}

impl CapturedState {
    /// Returns `true` if drawing in `other` needs no state change after
    /// drawing in `self`.
    ///
    /// Text parameters only matter when both sides draw text.
    pub fn compare_initial_state(&self, other: &Self) -> bool {
        let text_matches = match (self.text, other.text) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.fill == other.fill
            && self.ext_state == other.ext_state
            && self.transform == other.transform
            && self.clip == other.clip
            && text_matches
    }
}
