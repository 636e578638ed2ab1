// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typefaces and font resources.
//!
//! A [`Typeface`] is the caller's description of a font: an identity, glyph
//! advances, and whether its glyph ids can be written directly as two-byte
//! codes. A [`PdfFont`] is one font resource as it appears in a resource
//! dictionary. Single-byte fonts can only address 255 glyphs each, so one
//! typeface may need several of them.

use alloc::sync::Arc;
use alloc::vec::Vec;

/// Glyphs addressable by one single-byte font resource.
pub const SINGLE_BYTE_GLYPHS: u16 = 255;

/// A font as supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Typeface {
    id: u32,
    multi_byte: bool,
    advances: Arc<[f32]>,
}

impl Typeface {
    /// Creates a typeface.
    ///
    /// `advances` holds each glyph's horizontal advance as a fraction of the
    /// em; glyphs past the end have no advance.
    pub fn new(id: u32, multi_byte: bool, advances: Vec<f32>) -> Self {
        Self {
            id,
            multi_byte,
            advances: advances.into(),
        }
    }

    /// Caller-assigned identity.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns `true` if glyph ids are written as two-byte codes.
    pub fn is_multi_byte(&self) -> bool {
        self.multi_byte
    }

    /// Advance of `glyph` in ems.
    pub fn advance(&self, glyph: u16) -> f32 {
        self.advances
            .get(usize::from(glyph))
            .copied()
            .unwrap_or(0.0)
    }

    /// Total advance of `glyphs` in ems.
    pub fn run_advance(&self, glyphs: &[u16]) -> f32 {
        glyphs.iter().map(|&g| self.advance(g)).sum()
    }
}

/// One font resource covering a contiguous glyph range of a typeface.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PdfFont {
    typeface_id: u32,
    first_glyph: u16,
    last_glyph: u16,
    multi_byte: bool,
}

impl PdfFont {
    /// The resource that can encode `glyph` from `typeface`.
    pub fn for_glyph(typeface: &Typeface, glyph: u16) -> Self {
        if typeface.is_multi_byte() {
            return Self {
                typeface_id: typeface.id(),
                first_glyph: 0,
                last_glyph: u16::MAX,
                multi_byte: true,
            };
        }
        let first_glyph = glyph / SINGLE_BYTE_GLYPHS * SINGLE_BYTE_GLYPHS;
        Self {
            typeface_id: typeface.id(),
            first_glyph,
            last_glyph: first_glyph.saturating_add(SINGLE_BYTE_GLYPHS - 1),
            multi_byte: false,
        }
    }

    /// The typeface this resource belongs to.
    pub fn typeface_id(&self) -> u32 {
        self.typeface_id
    }

    /// First glyph covered.
    pub fn first_glyph(&self) -> u16 {
        self.first_glyph
    }

    /// Last glyph covered.
    pub fn last_glyph(&self) -> u16 {
        self.last_glyph
    }

    /// Returns `true` if codes are two bytes wide.
    pub fn multi_byte_glyphs(&self) -> bool {
        self.multi_byte
    }

    /// Returns `true` if this resource can encode `glyph`.
    pub fn has_glyph(&self, glyph: u16) -> bool {
        (self.first_glyph..=self.last_glyph).contains(&glyph)
    }

    /// Rewrites the leading glyphs of `glyphs` into this font's codes.
    ///
    /// Stops at the first glyph the font can't encode and returns how many
    /// were converted.
    pub fn glyphs_to_encoding(&self, glyphs: &mut [u16]) -> usize {
        if self.multi_byte {
            return glyphs.len();
        }
        let mut converted = 0;
        for glyph in glyphs.iter_mut() {
            if !self.has_glyph(*glyph) {
                break;
            }
            *glyph = *glyph - self.first_glyph + 1;
            converted += 1;
        }
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn single_byte_fonts_cover_blocks() {
        let face = Typeface::new(7, false, vec![0.5; 600]);
        let low = PdfFont::for_glyph(&face, 3);
        let high = PdfFont::for_glyph(&face, 300);
        assert!(low.has_glyph(0) && low.has_glyph(254));
        assert!(!low.has_glyph(255));
        assert_eq!(high.first_glyph(), 255);
        assert!(high.has_glyph(300));
        assert_ne!(low, high);
    }

    #[test]
    fn encoding_stops_at_the_range_end() {
        let face = Typeface::new(1, false, Vec::new());
        let font = PdfFont::for_glyph(&face, 0);
        let mut glyphs = [0, 10, 254, 255, 3];
        assert_eq!(font.glyphs_to_encoding(&mut glyphs), 3);
        assert_eq!(glyphs, [1, 11, 255, 255, 3]);
    }

    #[test]
    fn multi_byte_fonts_pass_glyphs_through() {
        let face = Typeface::new(2, true, Vec::new());
        let font = PdfFont::for_glyph(&face, 40_000);
        let mut glyphs = [40_000, 1];
        assert_eq!(font.glyphs_to_encoding(&mut glyphs), 2);
        assert_eq!(glyphs, [40_000, 1]);
        assert!(font.multi_byte_glyphs());
    }

    #[test]
    fn advances() {
        let face = Typeface::new(1, false, vec![0.5, 0.25]);
        assert_eq!(face.run_advance(&[0, 1, 9]), 0.75);
    }
}
