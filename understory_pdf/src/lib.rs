// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory PDF: compiles 2D drawing operations into PDF page content.
//!
//! A [`PdfDevice`] accepts draw calls (paths, rectangles, points, images,
//! glyph runs and nested devices) and records them as [`ContentEntry`]
//! runs that share a graphics state. When asked for [`PdfDevice::content`],
//! it walks the entries with a [`GraphicStackState`], emitting the fewest
//! save/restore, clip, transform and state instructions needed between
//! them.
//!
//! Alongside the content, the device collects the resources it names in a
//! [`PageResources`] table: extended graphics states (`/G`n), external
//! objects (`/X`n), fonts (`/F`n) and shading patterns (`/P`n). Object
//! numbering, compression and file assembly are left to the caller; see
//! [`PdfDevice::write_resource_dict`].
//!
//! ## Quick Start
//!
//! ```rust
//! use kurbo::{Affine, Rect, Size};
//! use peniko::Color;
//! use understory_pdf::{ClipCombine, DeviceOptions, DrawContext, Paint, PdfDevice};
//!
//! let mut device = PdfDevice::new(DeviceOptions::default().with_page_size(Size::new(200.0, 200.0)));
//!
//! let mut clip = device.existing_clip().clone();
//! clip.clip_rect(Rect::new(0.0, 0.0, 100.0, 100.0), Affine::IDENTITY, ClipCombine::Intersect);
//! let cx = DrawContext::new(&clip);
//!
//! let blue = Paint::from_color(Color::from_rgba8(0, 0, 255, 255));
//! device.draw_rect(&cx, Rect::new(10.0, 10.0, 50.0, 50.0), &blue).unwrap();
//! device.draw_rect(&cx, Rect::new(60.0, 10.0, 90.0, 50.0), &blue).unwrap();
//!
//! // Both rectangles share one entry, so the clip and color are set once.
//! let content = device.content();
//! assert_eq!(content.matches("W n").count(), 1);
//! assert_eq!(content.matches(" rg").count(), 1);
//! assert_eq!(content.matches("q\n").count(), content.matches("Q\n").count());
//! ```
//!
//! ## Compositing
//!
//! The output composites source-over only. Other Porter-Duff modes are
//! rebuilt from captured form objects and alpha soft masks; see
//! [`CompositeMode`]. Modes without an emulation, and paint features the
//! format can't carry, are skipped and reported through
//! [`PdfDevice::diagnostics`].
//!
//! ## Layers
//!
//! [`PdfDevice::new_layer`] creates a device that shares the parent's
//! [`ResourceCache`]. Drawing it back with [`PdfDevice::draw_device`]
//! embeds its content as a form object and resets it.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. Enable the `libm` feature when
//! building without `std`.

#![no_std]

extern crate alloc;

mod cache;
mod clip;
mod composite;
mod device;
mod diagnostics;
mod entry;
mod error;
mod ext_state;
mod font;
mod image;
mod options;
mod paint;
mod pattern;
mod region;
mod resources;
mod stack;
mod state;
pub mod writer;
mod xobject;

pub use cache::{ResourceCache, SharedResourceCache};
pub use clip::{Clip, ClipChain, ClipCombine, ClipElement, ClipGeometry, DEFAULT_CLIP_TOLERANCE};
pub use composite::{CompositeMode, MaskSource};
pub use device::{DrawContext, GlyphPositions, NestedDevice, PdfDevice, PointMode};
pub use diagnostics::Diagnostic;
pub use entry::{ContentBatch, ContentEntry, Entries, EntryId, EntryPlacement};
pub use error::Error;
pub use ext_state::{ExtGState, PaintGraphicState, PdfBlendMode};
pub use font::{PdfFont, SINGLE_BYTE_GLYPHS, Typeface};
pub use image::{Bitmap, PdfImage};
pub use options::{DeviceOptions, LETTER};
pub use paint::{Paint, PaintEffects, PaintStyle, TextAlign, TextStyle};
pub use pattern::PdfPattern;
pub use region::{IRect, Region};
pub use resources::{PageResources, Resource, ResourceKind, ResourceTable};
pub use stack::{GraphicStackState, MAX_STACK_DEPTH};
pub use state::{ActiveFont, CapturedState, FillSource, TextState};
pub use xobject::{FormXObject, XObject};
