// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Records of features the device skipped.

use core::fmt;

use peniko::Compose;

/// A draw that was skipped because the content stream cannot express it.
///
/// Each is also logged with [`log::warn!`] when recorded.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// A compositing mode with no emulation.
    UnsupportedCompose(Compose),
    /// The paint carries a path effect.
    PathEffect,
    /// The paint carries a mask filter.
    MaskFilter,
    /// The paint carries a color filter.
    ColorFilter,
    /// Image brushes cannot be used as fills.
    ImageBrush,
    /// Glyphs laid out along a path.
    TextOnPath,
    /// Triangle meshes.
    Vertices,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCompose(compose) => {
                write!(f, "compositing mode {compose:?} is not supported")
            }
            Self::PathEffect => f.write_str("path effects are not supported"),
            Self::MaskFilter => f.write_str("mask filters are not supported"),
            Self::ColorFilter => f.write_str("color filters are not supported"),
            Self::ImageBrush => f.write_str("image brushes are not supported"),
            Self::TextOnPath => f.write_str("text on a path is not supported"),
            Self::Vertices => f.write_str("vertex meshes are not supported"),
        }
    }
}
