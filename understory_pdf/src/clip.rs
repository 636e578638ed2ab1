// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clip chains and resolved clips.
//!
//! A [`ClipChain`] is the ordered list of clip operations applied since the
//! device's inherited base clip. The content stream can only intersect clips,
//! so the chain is kept alongside a [`Region`] that resolves every operation
//! exactly; the emitter replays the chain when it can and falls back to the
//! region's boundary otherwise.

use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Point, Rect};
use peniko::Fill;

use crate::region::{IRect, Region};

/// Flattening tolerance used when a clip path is rasterized into a region.
pub const DEFAULT_CLIP_TOLERANCE: f64 = 0.1;

/// How a clip element combines with the clip before it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClipCombine {
    /// Keep pixels inside both.
    #[default]
    Intersect,
    /// Remove the element's pixels.
    Difference,
    /// Add the element's pixels.
    Union,
    /// Keep pixels inside exactly one.
    Xor,
    /// Keep the element's pixels that were outside the clip.
    ReverseDifference,
    /// Discard the previous clip.
    Replace,
}

/// The shape of a clip element, in device space.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipGeometry {
    /// An axis-aligned rectangle.
    Rect(Rect),
    /// An arbitrary path.
    Path {
        /// Outline.
        path: BezPath,
        /// Fill rule used to decide insideness.
        fill: Fill,
        /// Clip to the outside of the path instead.
        inverse: bool,
    },
}

/// One step of a clip chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipElement {
    /// Shape in device space.
    pub geometry: ClipGeometry,
    /// Combination with the preceding clip.
    pub combine: ClipCombine,
}

impl ClipElement {
    /// Returns `true` if the content stream can express this element directly.
    pub fn is_native(&self) -> bool {
        self.combine == ClipCombine::Intersect
            && !matches!(self.geometry, ClipGeometry::Path { inverse: true, .. })
    }
}

/// An immutable, cheaply cloned list of clip elements.
///
/// Clones share storage, so the common case of comparing a state against the
/// state it was derived from is a pointer comparison.
#[derive(Clone, Debug, Default)]
pub struct ClipChain {
    elements: Arc<Vec<ClipElement>>,
}

impl PartialEq for ClipChain {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements) || self.elements == other.elements
    }
}

impl ClipChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a chain from elements.
    pub fn from_elements(elements: Vec<ClipElement>) -> Self {
        Self {
            elements: Arc::new(elements),
        }
    }

    /// The elements, oldest first.
    pub fn elements(&self) -> &[ClipElement] {
        &self.elements
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the chain has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Appends an element, copying the storage if it is shared.
    pub fn push(&mut self, element: ClipElement) {
        Arc::make_mut(&mut self.elements).push(element);
    }

    /// Returns `true` if `prefix` is a leading run of this chain.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        Arc::ptr_eq(&self.elements, &prefix.elements)
            || self.elements.starts_with(&prefix.elements)
    }

    /// The elements after `prefix`, or `None` if `prefix` is not a prefix.
    pub fn suffix_after(&self, prefix: &Self) -> Option<&[ClipElement]> {
        self.starts_with(prefix)
            .then(|| &self.elements[prefix.len()..])
    }
}

/// A clip chain together with its resolved region.
///
/// This is the clip a draw call is made against. Start from a device's
/// existing clip and narrow it:
///
/// ```
/// use kurbo::{Affine, Rect};
/// use understory_pdf::{ClipCombine, DeviceOptions, PdfDevice};
///
/// let device = PdfDevice::new(DeviceOptions::default());
/// let mut clip = device.existing_clip().clone();
/// clip.clip_rect(Rect::new(10.0, 10.0, 50.0, 50.0), Affine::IDENTITY, ClipCombine::Intersect);
/// assert_eq!(clip.chain().len(), 2);
/// assert!(!clip.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct Clip {
    chain: ClipChain,
    region: Region,
    bounds: IRect,
    tolerance: f64,
}

impl Clip {
    /// A clip covering `bounds`, recorded as a single rectangle element.
    pub fn new(bounds: IRect) -> Self {
        let mut chain = ClipChain::new();
        chain.push(ClipElement {
            geometry: ClipGeometry::Rect(bounds.to_rect()),
            combine: ClipCombine::Intersect,
        });
        Self {
            chain,
            region: Region::from_rect(bounds),
            bounds,
            tolerance: DEFAULT_CLIP_TOLERANCE,
        }
    }

    /// Sets the flattening tolerance used to rasterize clip paths.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Flattening tolerance for clip paths.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The clip operations.
    pub fn chain(&self) -> &ClipChain {
        &self.chain
    }

    /// The resolved pixels.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// The device extent the region is limited to.
    pub fn bounds(&self) -> IRect {
        self.bounds
    }

    /// Returns `true` if nothing can be drawn through this clip.
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Combines a rectangle, given in the space of `transform`, into the clip.
    ///
    /// Rectangles that stay axis-aligned under `transform` are recorded as
    /// rectangles; others become paths.
    pub fn clip_rect(&mut self, rect: Rect, transform: Affine, combine: ClipCombine) {
        let [a, b, c, d, _, _] = transform.as_coeffs();
        let geometry = if (b == 0.0 && c == 0.0) || (a == 0.0 && d == 0.0) {
            ClipGeometry::Rect(transform.transform_rect_bbox(rect))
        } else {
            let mut path = BezPath::new();
            path.move_to(transform * rect.origin());
            path.line_to(transform * Point::new(rect.x1, rect.y0));
            path.line_to(transform * Point::new(rect.x1, rect.y1));
            path.line_to(transform * Point::new(rect.x0, rect.y1));
            path.close_path();
            ClipGeometry::Path {
                path,
                fill: Fill::NonZero,
                inverse: false,
            }
        };
        self.apply(ClipElement { geometry, combine });
    }

    /// Combines a path, given in the space of `transform`, into the clip.
    pub fn clip_path(
        &mut self,
        path: &BezPath,
        fill: Fill,
        inverse: bool,
        transform: Affine,
        combine: ClipCombine,
    ) {
        let mut path = path.clone();
        path.apply_affine(transform);
        self.apply(ClipElement {
            geometry: ClipGeometry::Path {
                path,
                fill,
                inverse,
            },
            combine,
        });
    }

    /// Replaces the clip with `region`, recording its boundary as the element.
    pub fn replace_with_region(&mut self, region: &Region) {
        self.chain.push(ClipElement {
            geometry: ClipGeometry::Path {
                path: region.boundary_path(),
                fill: Fill::NonZero,
                inverse: false,
            },
            combine: ClipCombine::Replace,
        });
        self.region = region.clone();
    }

    fn apply(&mut self, element: ClipElement) {
        let covered = match &element.geometry {
            ClipGeometry::Rect(rect) => IRect::round(*rect)
                .intersect(&self.bounds)
                .map(Region::from_rect)
                .unwrap_or_default(),
            ClipGeometry::Path {
                path,
                fill,
                inverse,
            } => Region::from_path(path, *fill, *inverse, self.bounds, self.tolerance),
        };
        self.region = match element.combine {
            ClipCombine::Intersect => self.region.intersect(&covered),
            ClipCombine::Difference => self.region.difference(&covered),
            ClipCombine::Union => self.region.union(&covered),
            ClipCombine::Xor => self.region.xor(&covered),
            ClipCombine::ReverseDifference => covered.difference(&self.region),
            ClipCombine::Replace => covered,
        };
        self.chain.push(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    fn bounds() -> IRect {
        IRect::new(0, 0, 100, 100)
    }

    #[test]
    fn clones_share_and_diverge() {
        let clip = Clip::new(bounds());
        let mut narrowed = clip.clone();
        assert_eq!(clip.chain(), narrowed.chain());

        narrowed.clip_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Affine::IDENTITY, ClipCombine::Intersect);
        assert_ne!(clip.chain(), narrowed.chain());
        assert!(narrowed.chain().starts_with(clip.chain()));
        assert!(!clip.chain().starts_with(narrowed.chain()));
        assert_eq!(narrowed.chain().suffix_after(clip.chain()).map(<[_]>::len), Some(1));
        assert_eq!(clip.chain().len(), 1);
    }

    #[test]
    fn transformed_rects() {
        let mut clip = Clip::new(bounds());
        clip.clip_rect(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Affine::translate((5.0, 5.0)),
            ClipCombine::Intersect,
        );
        assert_eq!(clip.region().rects(), &[IRect::new(5, 5, 15, 15)]);
        assert!(matches!(
            clip.chain().elements()[1].geometry,
            ClipGeometry::Rect(_)
        ));

        clip.clip_rect(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Affine::rotate(0.3),
            ClipCombine::Intersect,
        );
        assert!(matches!(
            clip.chain().elements()[2].geometry,
            ClipGeometry::Path { .. }
        ));
    }

    #[test]
    fn combine_ops_resolve_exactly() {
        let mut clip = Clip::new(bounds());
        clip.clip_rect(Rect::new(0.0, 0.0, 50.0, 100.0), Affine::IDENTITY, ClipCombine::Difference);
        assert!(!clip.region().contains(10, 10));
        assert!(clip.region().contains(60, 10));

        clip.clip_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Affine::IDENTITY, ClipCombine::Union);
        assert!(clip.region().contains(5, 5));

        clip.clip_rect(Rect::new(20.0, 20.0, 30.0, 30.0), Affine::IDENTITY, ClipCombine::Replace);
        assert_eq!(clip.region().rects(), &[IRect::new(20, 20, 30, 30)]);

        clip.clip_rect(Rect::new(0.0, 0.0, 25.0, 25.0), Affine::IDENTITY, ClipCombine::ReverseDifference);
        assert!(clip.region().contains(10, 10));
        assert!(!clip.region().contains(22, 22));

        assert!(!clip.chain().elements()[1].is_native());
    }

    #[test]
    fn empty_intersection() {
        let mut clip = Clip::new(bounds());
        clip.clip_rect(Rect::new(200.0, 200.0, 300.0, 300.0), Affine::IDENTITY, ClipCombine::Intersect);
        assert!(clip.is_empty());
    }

    #[test]
    fn inverse_paths_are_not_native() {
        let mut clip = Clip::new(bounds());
        let path = Rect::new(10.0, 10.0, 20.0, 20.0).to_path(0.1);
        clip.clip_path(&path, Fill::NonZero, true, Affine::IDENTITY, ClipCombine::Intersect);
        assert!(!clip.chain().elements()[1].is_native());
        assert!(!clip.region().contains(15, 15));
        assert!(clip.region().contains(5, 5));
    }
}
