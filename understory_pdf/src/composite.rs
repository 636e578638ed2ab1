// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Classification of compositing modes by how the device emulates them.
//!
//! The output only composites source-over (with a blend function). Other
//! Porter-Duff modes are rebuilt from that, soft masks, and the device's
//! ability to capture everything drawn so far as a form object.

use peniko::{BlendMode, Compose};

/// How a draw's compositing mode is carried out.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CompositeMode {
    /// Native source-over, with the mix mode in the extended state.
    SourceOver,
    /// Erase under the clip and draw nothing.
    Clear,
    /// Erase under the clip, then draw.
    Source,
    /// Keep the destination; the draw does nothing.
    Destination,
    /// Draw beneath existing content.
    DestinationOver,
    /// Source, masked by the destination.
    SourceIn,
    /// Destination, masked by the source.
    DestinationIn,
    /// Source, masked by the inverse of the destination.
    SourceOut,
    /// Destination, masked by the inverse of the source.
    DestinationOut,
    /// No emulation exists.
    Unsupported(Compose),
}

/// Which captured picture a soft-mask pass uses as the mask.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaskSource {
    /// The content drawn before the call.
    Destination,
    /// The content drawn by the call.
    Source,
}

impl CompositeMode {
    /// Classifies `blend`.
    pub fn from_blend(blend: &BlendMode) -> Self {
        match blend.compose {
            Compose::SrcOver => Self::SourceOver,
            Compose::Clear => Self::Clear,
            Compose::Copy => Self::Source,
            Compose::Dest => Self::Destination,
            Compose::DestOver => Self::DestinationOver,
            Compose::SrcIn => Self::SourceIn,
            Compose::DestIn => Self::DestinationIn,
            Compose::SrcOut => Self::SourceOut,
            Compose::DestOut => Self::DestinationOut,
            other => Self::Unsupported(other),
        }
    }

    /// Existing content under the clip is erased before drawing.
    pub fn clears_clip(self) -> bool {
        matches!(self, Self::Clear | Self::Source)
    }

    /// The draw needs the destination and source captured separately.
    pub fn needs_isolation(self) -> bool {
        self.soft_mask().is_some()
    }

    /// For masking modes, the picture used as the mask and whether it is
    /// inverted.
    pub fn soft_mask(self) -> Option<(MaskSource, bool)> {
        match self {
            Self::SourceIn => Some((MaskSource::Destination, false)),
            Self::SourceOut => Some((MaskSource::Destination, true)),
            Self::DestinationIn => Some((MaskSource::Source, false)),
            Self::DestinationOut => Some((MaskSource::Source, true)),
            _ => None,
        }
    }
}
