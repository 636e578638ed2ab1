// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors returned by draw calls.

/// An error from a draw call. A failing call contributes nothing to the page.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A scratch or sample buffer could not be allocated.
    #[error("failed to allocate {bytes} bytes for {what}")]
    AllocationFailed {
        /// What the buffer was for.
        what: &'static str,
        /// Requested size.
        bytes: usize,
    },
    /// A bitmap's pixel slice is shorter than its dimensions require.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferTooSmall {
        /// Bytes required by the dimensions.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// An image source rectangle has inverted edges.
    #[error("image subset has inverted edges")]
    InvalidImageSubset,
}

impl Error {
    pub(crate) fn alloc(what: &'static str, bytes: usize) -> Self {
        Self::AllocationFailed { what, bytes }
    }
}
