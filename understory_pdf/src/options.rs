// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Page device configuration.

use kurbo::{Affine, Size};

use crate::clip::DEFAULT_CLIP_TOLERANCE;

/// US Letter in points.
pub const LETTER: Size = Size::new(612.0, 792.0);

/// Configuration for a page-level [`PdfDevice`](crate::PdfDevice).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DeviceOptions {
    /// Page size in points. This is the media box.
    pub page_size: Size,
    /// Drawable content size in points, `None` for the full page.
    ///
    /// When it differs from the page size the finished stream is clipped to
    /// the content area.
    pub content_size: Option<Size>,
    /// Transform from drawing space to the (y-down) page space, applied
    /// before the flip into the output's y-up coordinates. Use it for margins
    /// or scaling.
    pub initial_transform: Affine,
    /// Flattening tolerance used when clip paths are resolved into regions.
    pub clip_tolerance: f64,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            page_size: LETTER,
            content_size: None,
            initial_transform: Affine::IDENTITY,
            clip_tolerance: DEFAULT_CLIP_TOLERANCE,
        }
    }
}

impl DeviceOptions {
    /// Sets the page size.
    #[must_use]
    pub const fn with_page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the content size.
    #[must_use]
    pub const fn with_content_size(mut self, size: Size) -> Self {
        self.content_size = Some(size);
        self
    }

    /// Sets the initial transform.
    #[must_use]
    pub const fn with_initial_transform(mut self, transform: Affine) -> Self {
        self.initial_transform = transform;
        self
    }

    /// Sets the clip flattening tolerance.
    #[must_use]
    pub const fn with_clip_tolerance(mut self, tolerance: f64) -> Self {
        self.clip_tolerance = tolerance;
        self
    }

    /// The content size, defaulting to the page size.
    pub fn content_size(&self) -> Size {
        self.content_size.unwrap_or(self.page_size)
    }
}
