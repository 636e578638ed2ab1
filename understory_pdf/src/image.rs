// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raster images embedded as objects.

use alloc::vec::Vec;

use crate::error::Error;
use crate::region::IRect;

/// Borrowed RGBA8 pixels with straight (unpremultiplied) alpha, rows tightly
/// packed top to bottom.
#[derive(Copy, Clone, Debug)]
pub struct Bitmap<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub pixels: &'a [u8],
}

impl<'a> Bitmap<'a> {
    /// Wraps a pixel slice.
    pub fn new(width: u32, height: u32, pixels: &'a [u8]) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// The full pixel rectangle.
    pub fn bounds(&self) -> IRect {
        IRect::from_size(self.width, self.height)
    }
}

/// An image ready to embed: RGB samples and, when any pixel is not opaque, a
/// separate alpha channel used as its soft mask.
#[derive(Debug, PartialEq, Eq)]
pub struct PdfImage {
    width: u32,
    height: u32,
    samples: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl PdfImage {
    /// Extracts `subset` of `bitmap`.
    ///
    /// Returns `Ok(None)` if the subset is empty once clipped to the bitmap,
    /// and [`Error::InvalidImageSubset`] if its edges are inverted.
    pub fn from_bitmap(bitmap: &Bitmap<'_>, subset: IRect) -> Result<Option<Self>, Error> {
        if subset.x0 > subset.x1 || subset.y0 > subset.y1 {
            return Err(Error::InvalidImageSubset);
        }
        let expected = (bitmap.width as usize)
            .saturating_mul(bitmap.height as usize)
            .saturating_mul(4);
        if bitmap.pixels.len() < expected {
            return Err(Error::PixelBufferTooSmall {
                expected,
                actual: bitmap.pixels.len(),
            });
        }
        let Some(area) = bitmap.bounds().intersect(&subset) else {
            return Ok(None);
        };
        let (width, height) = (area.width(), area.height());
        let count = width as usize * height as usize;

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(count * 3)
            .map_err(|_| Error::alloc("image samples", count * 3))?;
        let mut alpha = Vec::new();
        alpha
            .try_reserve_exact(count)
            .map_err(|_| Error::alloc("image alpha", count))?;

        let stride = bitmap.width as usize * 4;
        for y in area.y0..area.y1 {
            let row = y.unsigned_abs() as usize * stride;
            let start = row + area.x0.unsigned_abs() as usize * 4;
            let end = row + area.x1.unsigned_abs() as usize * 4;
            for px in bitmap.pixels[start..end].chunks_exact(4) {
                samples.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
        }
        let alpha = alpha.iter().any(|&a| a != 0xFF).then_some(alpha);
        Ok(Some(Self {
            width,
            height,
            samples,
            alpha,
        }))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGB samples, three bytes per pixel.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Alpha samples, if the image is not fully opaque.
    pub fn alpha(&self) -> Option<&[u8]> {
        self.alpha.as_deref()
    }
}
