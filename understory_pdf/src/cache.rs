// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value-keyed canonicalization of shared resources.
//!
//! Resource tables compare by identity, so two equal states must be the same
//! object for a page to name them once. The [`ResourceCache`] hands out one
//! shared object per distinct value. A page device and every layer device
//! created from it share one cache.

use alloc::rc::Rc;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::{BuildHasher, Hash, Hasher};

use hashbrown::DefaultHashBuilder;
use hashbrown::HashMap;

use crate::ext_state::{ExtGState, PaintGraphicState};
use crate::font::{PdfFont, Typeface};
use crate::pattern::PdfPattern;
use crate::xobject::FormXObject;

/// A cache shared between a device and its layers.
pub type SharedResourceCache = Rc<RefCell<ResourceCache>>;

/// Canonical shared objects for resource values.
#[derive(Debug, Default)]
pub struct ResourceCache {
    paint_states: HashMap<PaintGraphicState, Arc<ExtGState>>,
    // Weak so a mask lives only as long as some page names its state.
    soft_masks: Vec<(Weak<FormXObject>, bool, Weak<ExtGState>)>,
    no_soft_mask: Option<Arc<ExtGState>>,
    patterns: Vec<Arc<PdfPattern>>,
    pattern_buckets: HashMap<u64, Vec<usize>>,
    fonts: HashMap<(u32, u16), Arc<PdfFont>>,
    build_hasher: DefaultHashBuilder,
}

impl ResourceCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty cache ready to share.
    pub fn shared() -> SharedResourceCache {
        Rc::new(RefCell::new(Self::new()))
    }

    /// The extended state for a paint-derived state.
    pub fn paint_state(&mut self, state: PaintGraphicState) -> Arc<ExtGState> {
        self.paint_states
            .entry(state)
            .or_insert_with(|| Arc::new(ExtGState::Paint(state)))
            .clone()
    }

    /// The extended state that masks drawing with `mask`'s alpha.
    ///
    /// States whose every user has been dropped are forgotten here too.
    pub fn soft_mask_state(&mut self, mask: &Arc<FormXObject>, invert: bool) -> Arc<ExtGState> {
        self.soft_masks.retain(|(_, _, state)| state.strong_count() > 0);
        let found = self
            .soft_masks
            .iter()
            .find(|(m, i, _)| core::ptr::eq(m.as_ptr(), Arc::as_ptr(mask)) && *i == invert)
            .and_then(|(_, _, state)| state.upgrade());
        if let Some(state) = found {
            return state;
        }
        let state = Arc::new(ExtGState::SoftMask {
            mask: mask.clone(),
            invert,
        });
        self.soft_masks
            .push((Arc::downgrade(mask), invert, Arc::downgrade(&state)));
        state
    }

    /// The extended state that removes any soft mask.
    pub fn no_soft_mask_state(&mut self) -> Arc<ExtGState> {
        self.no_soft_mask
            .get_or_insert_with(|| Arc::new(ExtGState::NoSoftMask))
            .clone()
    }

    /// The shared pattern equal to `pattern`.
    pub fn pattern(&mut self, pattern: PdfPattern) -> Arc<PdfPattern> {
        let hash = self.pattern_hash(&pattern);
        let bucket = self.pattern_buckets.entry(hash).or_default();
        if let Some(&index) = bucket.iter().find(|&&i| *self.patterns[i] == pattern) {
            return self.patterns[index].clone();
        }
        bucket.push(self.patterns.len());
        let pattern = Arc::new(pattern);
        self.patterns.push(pattern.clone());
        pattern
    }

    /// The font resource that encodes `glyph` from `typeface`.
    pub fn font_for_glyph(&mut self, typeface: &Typeface, glyph: u16) -> Arc<PdfFont> {
        let font = PdfFont::for_glyph(typeface, glyph);
        self.fonts
            .entry((font.typeface_id(), font.first_glyph()))
            .or_insert_with(|| Arc::new(font))
            .clone()
    }

    // Gradients aren't `Hash`; bucket on the placement and let equality
    // decide within a bucket.
    fn pattern_hash(&self, pattern: &PdfPattern) -> u64 {
        let mut hasher = self.build_hasher.build_hasher();
        for c in pattern.transform().as_coeffs() {
            c.to_bits().hash(&mut hasher);
        }
        pattern.bounds().hash(&mut hasher);
        pattern.gradient().stops.len().hash(&mut hasher);
        hasher.finish()
    }
}
