// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The state diff emitter.
//!
//! [`GraphicStackState`] models the output's save/restore stack as a fixed
//! array of frames and emits the fewest instructions that move the current
//! frame to a requested state. Clips can only be narrowed in the output, so
//! widening a clip means popping back to a frame whose clip is a prefix of
//! the target and replaying the rest.

use alloc::string::String;
use core::fmt::Write as _;

use kurbo::{Affine, Vec2};
use peniko::Fill;

use crate::clip::{ClipChain, ClipElement, ClipGeometry};
use crate::region::Region;
use crate::state::{CapturedState, FillSource, TextState};
use crate::writer;

/// Deepest save nesting the emitter will produce.
///
/// The output format guarantees at least 28 levels; staying well below that
/// leaves room for whoever embeds the stream.
pub const MAX_STACK_DEPTH: usize = 12;

/// Tracks the output's graphics state stack while a content stream is
/// assembled.
///
/// Frame 0 holds the inherited clip and is never popped. Call
/// [`drain`](Self::drain) once at the end to close every open frame.
#[derive(Debug)]
pub struct GraphicStackState<'a> {
    frames: [Frame; MAX_STACK_DEPTH + 1],
    depth: usize,
    out: &'a mut String,
}

#[derive(Clone, Debug)]
struct Frame {
    state: CapturedState,
    // `false` until a color is written, when the stream is embedded in an
    // unknown graphics state.
    fill_known: bool,
}

impl<'a> GraphicStackState<'a> {
    /// Starts at depth 0 with the inherited clip, writing into `out`.
    ///
    /// The stream is assumed to start from the default graphics state, as a
    /// page does.
    pub fn new(inherited_clip: &ClipChain, inherited_region: &Region, out: &'a mut String) -> Self {
        let mut frames: [Frame; MAX_STACK_DEPTH + 1] = core::array::from_fn(|_| Frame {
            state: CapturedState {
                text: Some(TextState::default()),
                ..CapturedState::default()
            },
            fill_known: true,
        });
        frames[0].state.clip = inherited_clip.clone();
        frames[0].state.clip_region = inherited_region.clone();
        Self {
            frames,
            depth: 0,
            out,
        }
    }

    /// Starts with an unknown color and text state instead of the defaults.
    ///
    /// Form objects inherit the graphics state of whatever draws them, so
    /// their first entry must set every drawing parameter it relies on.
    #[must_use]
    pub fn with_inherited_drawing_state(mut self) -> Self {
        let base = &mut self.frames[0];
        base.fill_known = false;
        base.state.text = None;
        self
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The state of the top frame.
    pub fn current(&self) -> &CapturedState {
        &self.frames[self.depth].state
    }

    /// Moves to the clip `chain`, whose resolved pixels are `region`.
    ///
    /// Clip geometry is offset by `origin_shift` as it is written.
    pub fn update_clip(&mut self, chain: &ClipChain, region: &Region, origin_shift: Vec2) {
        if *chain == self.frames[self.depth].state.clip {
            return;
        }
        while self.depth > 0 {
            self.pop();
            if *chain == self.frames[self.depth].state.clip {
                return;
            }
        }
        self.push();

        let shift = Affine::translate(origin_shift);
        match chain.suffix_after(&self.frames[0].state.clip) {
            Some(elements) if elements.iter().all(ClipElement::is_native) => {
                for element in elements {
                    emit_clip_element(self.out, element, shift);
                }
            }
            _ => {
                let mut boundary = region.boundary_path();
                boundary.apply_affine(shift);
                writer::emit_path(self.out, &boundary);
                writer::clip_current_path(self.out, Fill::NonZero);
            }
        }

        let top = &mut self.frames[self.depth].state;
        top.clip = chain.clone();
        top.clip_region = region.clone();
    }

    /// Moves to `transform`.
    ///
    /// A transform can't be undone in place, so a non-identity transform
    /// always lives in its own frame directly above the clip frame.
    pub fn update_transform(&mut self, transform: Affine) {
        if self.frames[self.depth].state.transform == transform {
            return;
        }
        if self.frames[self.depth].state.transform != Affine::IDENTITY {
            let clip = self.frames[self.depth].state.clip.clone();
            self.pop();
            debug_assert!(
                self.frames[self.depth].state.clip == clip,
                "a transform frame must sit directly on its clip frame"
            );
        }
        if transform == Affine::IDENTITY {
            return;
        }
        self.push();
        writer::append_transform(self.out, transform);
        self.frames[self.depth].state.transform = transform;
    }

    /// Emits the color, extended state and text parameters of `state` that
    /// differ from the top frame. Never pushes or pops.
    pub fn update_drawing_state(&mut self, state: &CapturedState) {
        let Frame { state: top, fill_known } = &mut self.frames[self.depth];

        if !*fill_known || state.fill != top.fill {
            match state.fill {
                FillSource::Pattern(index) => {
                    let _ = writeln!(
                        self.out,
                        "/Pattern CS /Pattern cs /P{index} SCN /P{index} scn"
                    );
                }
                FillSource::Color(rgb) => {
                    writer::append_color(self.out, rgb);
                    self.out.push_str(" RG ");
                    writer::append_color(self.out, rgb);
                    self.out.push_str(" rg\n");
                }
            }
            top.fill = state.fill;
            *fill_known = true;
        }

        if let Some(index) = state.ext_state {
            if top.ext_state != Some(index) {
                writer::apply_graphic_state(self.out, index);
                top.ext_state = Some(index);
            }
        }

        if let Some(text) = state.text {
            let current = top.text;
            if current.is_none_or(|c| c.scale_x != text.scale_x) {
                writer::append_scalar(self.out, f64::from(text.scale_x) * 100.0);
                self.out.push_str(" Tz\n");
            }
            if current.is_none_or(|c| c.fill_mode != text.fill_mode) {
                let _ = writeln!(self.out, "{} Tr", text.fill_mode.text_render_mode());
            }
            top.text = Some(text);
        }
    }

    /// Appends drawing instructions that expect the current state.
    pub fn write_content(&mut self, content: &str) {
        self.out.push_str(content);
    }

    /// Pops every open frame. The emitter can't be used afterwards.
    pub fn drain(mut self) {
        while self.depth > 0 {
            self.pop();
        }
    }

    fn push(&mut self) {
        assert!(
            self.depth < MAX_STACK_DEPTH,
            "graphics state stack exceeded {MAX_STACK_DEPTH} levels"
        );
        self.frames[self.depth + 1] = self.frames[self.depth].clone();
        self.depth += 1;
        self.out.push_str("q\n");
    }

    fn pop(&mut self) {
        assert!(self.depth > 0, "the inherited frame can't be popped");
        self.out.push_str("Q\n");
        self.depth -= 1;
    }
}

fn emit_clip_element(out: &mut String, element: &ClipElement, shift: Affine) {
    match &element.geometry {
        ClipGeometry::Rect(rect) => {
            writer::append_rect(out, shift.transform_rect_bbox(*rect));
            writer::clip_current_path(out, Fill::NonZero);
        }
        ClipGeometry::Path { path, fill, .. } => {
            let mut path = path.clone();
            path.apply_affine(shift);
            writer::emit_path(out, &path);
            writer::clip_current_path(out, *fill);
        }
    }
}
