// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The PDF drawing device.
//!
//! [`PdfDevice`] records draw calls into a [`ContentBatch`] and produces a
//! finished content stream on demand. Every draw goes through the same three
//! steps: acquire an entry whose state matches the call (performing any
//! compositing set-up the mode needs), write the geometry into that entry,
//! then finish the compositing for modes that need a second pass.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Write as _;

use kurbo::{Affine, BezPath, Cap, Point, Rect, Size, Vec2};
use peniko::{Brush, Color, Fill};

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _; // for `abs` and `round`

use crate::cache::{ResourceCache, SharedResourceCache};
use crate::clip::{Clip, ClipChain};
use crate::composite::{CompositeMode, MaskSource};
use crate::diagnostics::Diagnostic;
use crate::entry::{ContentBatch, EntryId, EntryPlacement};
use crate::error::Error;
use crate::ext_state::PaintGraphicState;
use crate::font::{PdfFont, Typeface};
use crate::image::{Bitmap, PdfImage};
use crate::options::DeviceOptions;
use crate::paint::{Paint, PaintEffects, PaintStyle};
use crate::pattern::{ResolvedBrush, resolve_brush};
use crate::region::{IRect, Region};
use crate::resources::{PageResources, ResourceKind};
use crate::stack::GraphicStackState;
use crate::state::{ActiveFont, CapturedState, FillSource, TextState};
use crate::writer;
use crate::xobject::{FormXObject, XObject};

const UNDERLINE_OFFSET: f64 = 1.0 / 9.0;
const UNDERLINE_THICKNESS: f64 = 1.0 / 18.0;
const STRIKE_THROUGH_OFFSET: f64 = -6.0 / 21.0;
const STRIKE_THROUGH_THICKNESS: f64 = UNDERLINE_THICKNESS;

/// The transform and clip a draw call is made under.
#[derive(Copy, Clone, Debug)]
pub struct DrawContext<'a> {
    /// User space to device space.
    pub transform: Affine,
    /// The clip, in device space.
    pub clip: &'a Clip,
}

impl<'a> DrawContext<'a> {
    /// Draws through `clip` with an identity transform.
    pub fn new(clip: &'a Clip) -> Self {
        Self {
            transform: Affine::IDENTITY,
            clip,
        }
    }

    /// Replaces the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }
}

/// How [`PdfDevice::draw_points`] interprets its points.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointMode {
    /// Each point is a dot.
    Points,
    /// Consecutive pairs are segments.
    Lines,
    /// The points form an open polyline.
    Polygon,
}

/// Glyph positions for [`PdfDevice::draw_pos_text`].
#[derive(Copy, Clone, Debug)]
pub enum GlyphPositions<'a> {
    /// Per-glyph x positions on a shared baseline.
    Horizontal {
        /// One x per glyph.
        xs: &'a [f64],
        /// The baseline.
        y: f64,
    },
    /// Per-glyph points.
    Points(&'a [Point]),
}

impl GlyphPositions<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Horizontal { xs, .. } => xs.len(),
            Self::Points(points) => points.len(),
        }
    }

    fn get(&self, index: usize) -> Point {
        match self {
            Self::Horizontal { xs, y } => Point::new(xs[index], *y),
            Self::Points(points) => points[index],
        }
    }
}

/// A device drawn into another with [`PdfDevice::draw_device`].
#[derive(Debug)]
pub enum NestedDevice<'a> {
    /// A vector device, embedded as a form object. It is reset afterwards.
    Vector(&'a mut PdfDevice),
    /// Raster pixels, embedded as an image.
    Raster(Bitmap<'a>),
}

/// The entry a draw writes into, plus the destination captured for a
/// masking compositing mode.
struct EntrySetup {
    entry: EntryId,
    destination: Option<Arc<FormXObject>>,
}

/// Compiles drawing operations into a PDF content stream.
///
/// ```
/// use kurbo::{Rect, Size};
/// use peniko::Color;
/// use understory_pdf::{DeviceOptions, DrawContext, Paint, PdfDevice};
///
/// let mut device = PdfDevice::new(DeviceOptions::default().with_page_size(Size::new(100.0, 100.0)));
/// let clip = device.existing_clip().clone();
/// let cx = DrawContext::new(&clip);
/// let red = Paint::from_color(Color::from_rgba8(255, 0, 0, 255));
/// device.draw_rect(&cx, Rect::new(10.0, 10.0, 20.0, 20.0), &red).unwrap();
///
/// let content = device.content();
/// assert!(content.starts_with("1 0 0 -1 0 100 cm\n"));
/// assert!(content.contains("1 0 0 RG 1 0 0 rg\n"));
/// assert!(content.contains("10 10 10 10 re\nf\n"));
/// ```
#[derive(Debug)]
pub struct PdfDevice {
    page_size: Size,
    content_size: Size,
    width: u32,
    height: u32,
    initial_transform: Affine,
    origin: (i32, i32),
    existing_clip: Clip,
    entries: ContentBatch,
    resources: PageResources,
    cache: SharedResourceCache,
    diagnostics: Vec<Diagnostic>,
}

impl PdfDevice {
    /// A page device with its own resource cache.
    pub fn new(options: DeviceOptions) -> Self {
        Self::with_cache(options, ResourceCache::shared())
    }

    /// A page device using `cache`, so resources are shared with other pages.
    pub fn with_cache(options: DeviceOptions, cache: SharedResourceCache) -> Self {
        Self::build(
            options.page_size,
            options.content_size(),
            options.initial_transform,
            options.clip_tolerance,
            None,
            cache,
        )
    }

    /// A layer device of `width` by `height` that inherits `clip` and shares
    /// this device's resource cache.
    pub fn new_layer(&self, width: u32, height: u32, clip: &Clip) -> Self {
        let size = Size::new(f64::from(width), f64::from(height));
        Self::build(
            size,
            size,
            Affine::IDENTITY,
            self.existing_clip.tolerance(),
            Some(clip.clone()),
            self.cache.clone(),
        )
    }

    fn build(
        page_size: Size,
        content_size: Size,
        user_transform: Affine,
        clip_tolerance: f64,
        clip: Option<Clip>,
        cache: SharedResourceCache,
    ) -> Self {
        let (width, height) = device_extent(content_size, user_transform);
        // The output is y-up with the origin at the bottom left.
        let flip = Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, page_size.height]);
        let existing_clip = clip.unwrap_or_else(|| {
            Clip::new(IRect::from_size(width, height)).with_tolerance(clip_tolerance)
        });
        Self {
            page_size,
            content_size,
            width,
            height,
            initial_transform: flip * user_transform,
            origin: (0, 0),
            existing_clip,
            entries: ContentBatch::new(),
            resources: PageResources::default(),
            cache,
            diagnostics: Vec::new(),
        }
    }

    /// Drawable size in device units.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The clip every draw on this device is limited to.
    pub fn existing_clip(&self) -> &Clip {
        &self.existing_clip
    }

    /// Where this device sits in its parent, for layers.
    ///
    /// Clip geometry is written relative to this origin.
    pub fn set_origin(&mut self, x: i32, y: i32) {
        self.origin = (x, y);
    }

    /// Device space to output space, applied at the start of the stream.
    pub fn initial_transform(&self) -> Affine {
        self.initial_transform
    }

    /// The page rectangle.
    pub fn media_box(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.page_size)
    }

    /// Resources named by the content.
    pub fn resources(&self) -> &PageResources {
        &self.resources
    }

    /// The recorded entries.
    pub fn entries(&self) -> &ContentBatch {
        &self.entries
    }

    /// The resource cache shared with layers.
    pub fn cache(&self) -> &SharedResourceCache {
        &self.cache
    }

    /// Features skipped so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Returns and forgets the recorded diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        core::mem::take(&mut self.diagnostics)
    }

    /// Returns `true` if nothing has been drawn.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the resource dictionary for [`content`](Self::content).
    pub fn write_resource_dict(
        &self,
        out: &mut String,
        object_ref: impl FnMut(ResourceKind, usize) -> u32,
    ) {
        self.resources.write_dict(out, object_ref);
    }

    /// The finished content stream.
    ///
    /// Applies the initial transform and the content-area clip, then emits
    /// each entry behind the state changes it needs. Every save is restored
    /// by the end of the stream.
    pub fn content(&self) -> String {
        self.write_stream(false)
    }

    // Forms start from the state of whatever draws them, pages from the
    // defaults.
    fn write_stream(&self, as_form: bool) -> String {
        let mut out = String::new();
        if self.initial_transform != Affine::IDENTITY {
            writer::append_transform(&mut out, self.initial_transform);
        }
        if self.page_size != self.content_size {
            writer::append_rect(
                &mut out,
                Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height)),
            );
            writer::clip_current_path(&mut out, Fill::NonZero);
        }

        let shift = Vec2::new(-f64::from(self.origin.0), -f64::from(self.origin.1));
        let mut stack = GraphicStackState::new(
            self.existing_clip.chain(),
            self.existing_clip.region(),
            &mut out,
        );
        if as_form {
            stack = stack.with_inherited_drawing_state();
        }
        for entry in self.entries.iter() {
            let state = entry.state();
            stack.update_clip(&state.clip, &state.clip_region, shift);
            stack.update_transform(state.transform);
            stack.update_drawing_state(state);
            stack.write_content(entry.content());
        }
        stack.drain();
        log::debug!("content stream finished: {} bytes", out.len());
        out
    }

    /// Captures everything drawn so far as a form object and resets the
    /// device to empty.
    pub fn take_form_xobject(&mut self) -> Arc<FormXObject> {
        let matrix = (self.initial_transform != Affine::IDENTITY)
            .then(|| self.initial_transform.inverse());
        let form = FormXObject::new(
            self.write_stream(true),
            core::mem::take(&mut self.resources),
            self.media_box(),
            matrix,
        );
        self.entries.clear();
        Arc::new(form)
    }

    /// Discards everything drawn and fills the device with `color`.
    pub fn clear(&mut self, color: Color) {
        self.entries.clear();
        self.resources.clear();
        let clip = self.existing_clip.clone();
        self.draw_paint_in(
            clip.chain(),
            clip.region(),
            Affine::IDENTITY,
            &Paint::from_color(color),
        );
    }

    /// Fills the whole clip.
    pub fn draw_paint(&mut self, cx: &DrawContext<'_>, paint: &Paint) -> Result<(), Error> {
        let paint = paint.clone().with_style(PaintStyle::Fill);
        self.draw_paint_in(cx.clip.chain(), cx.clip.region(), cx.transform, &paint);
        Ok(())
    }

    /// Draws dots, segments, or a polyline.
    pub fn draw_points(
        &mut self,
        cx: &DrawContext<'_>,
        mode: PointMode,
        points: &[Point],
        paint: &Paint,
    ) -> Result<(), Error> {
        if points.is_empty() {
            return Ok(());
        }
        let mut stroke_paint = paint.clone().with_style(PaintStyle::Stroke);
        // A lone point with butt or square caps has no defined orientation;
        // draw squares instead, or hairline dots with round caps.
        if mode == PointMode::Points && paint.stroke.start_cap != Cap::Round {
            let width = paint.stroke.width;
            if width > 0.0 {
                let half = width / 2.0;
                let square_paint = paint.clone().with_style(PaintStyle::Fill);
                for p in points {
                    let square = Rect::new(p.x - half, p.y - half, p.x + half, p.y + half);
                    self.draw_rect(cx, square, &square_paint)?;
                }
                return Ok(());
            }
            stroke_paint.stroke.start_cap = Cap::Round;
            stroke_paint.stroke.end_cap = Cap::Round;
        }

        self.with_entry(
            cx.clip.chain(),
            cx.clip.region(),
            cx.transform,
            &stroke_paint,
            false,
            |dev, entry| {
                let out = dev.entries.content_mut(entry);
                match mode {
                    PointMode::Polygon => {
                        writer::move_to(out, points[0]);
                        for &p in &points[1..] {
                            writer::line_to(out, p);
                        }
                        writer::stroke_path(out);
                    }
                    PointMode::Lines => {
                        for pair in points.chunks_exact(2) {
                            writer::move_to(out, pair[0]);
                            writer::line_to(out, pair[1]);
                            writer::stroke_path(out);
                        }
                    }
                    PointMode::Points => {
                        for &p in points {
                            writer::move_to(out, p);
                            writer::close_path(out);
                            writer::stroke_path(out);
                        }
                    }
                }
            },
        );
        Ok(())
    }

    /// Draws a rectangle.
    pub fn draw_rect(
        &mut self,
        cx: &DrawContext<'_>,
        rect: Rect,
        paint: &Paint,
    ) -> Result<(), Error> {
        let rect = rect.abs();
        self.with_entry(
            cx.clip.chain(),
            cx.clip.region(),
            cx.transform,
            paint,
            false,
            |dev, entry| {
                let out = dev.entries.content_mut(entry);
                writer::append_rect(out, rect);
                writer::paint_path(out, paint.style, Fill::NonZero);
            },
        );
        Ok(())
    }

    /// Draws a path.
    ///
    /// `pre_path_transform` maps path space into the context's user space.
    /// For fills it is folded into the entry transform; strokes are drawn
    /// with the path transformed, so the stroke width stays in user space.
    pub fn draw_path(
        &mut self,
        cx: &DrawContext<'_>,
        path: &BezPath,
        fill: Fill,
        paint: &Paint,
        pre_path_transform: Option<Affine>,
    ) -> Result<(), Error> {
        let (path, transform) = match pre_path_transform {
            Some(m) if paint.style != PaintStyle::Fill => {
                let mut transformed = path.clone();
                transformed.apply_affine(m);
                (Cow::Owned(transformed), cx.transform)
            }
            Some(m) => (Cow::Borrowed(path), cx.transform * m),
            None => (Cow::Borrowed(path), cx.transform),
        };
        self.with_entry(
            cx.clip.chain(),
            cx.clip.region(),
            transform,
            paint,
            false,
            |dev, entry| {
                let out = dev.entries.content_mut(entry);
                writer::emit_path(out, &path);
                writer::paint_path(out, paint.style, fill);
            },
        );
        Ok(())
    }

    /// Draws `src` of `bitmap` (the whole bitmap by default), with
    /// `transform` mapping bitmap pixels into user space.
    pub fn draw_image(
        &mut self,
        cx: &DrawContext<'_>,
        bitmap: &Bitmap<'_>,
        src: Option<IRect>,
        transform: Affine,
        paint: &Paint,
    ) -> Result<(), Error> {
        let subset = src.unwrap_or_else(|| bitmap.bounds());
        let Some(image) = PdfImage::from_bitmap(bitmap, subset)? else {
            return Ok(());
        };
        let Some(area) = bitmap.bounds().intersect(&subset) else {
            return Ok(());
        };
        self.draw_pdf_image(
            cx.clip.chain(),
            cx.clip.region(),
            cx.transform * transform,
            area,
            image,
            paint,
        );
        Ok(())
    }

    /// Draws `bitmap` unscaled at device position `(x, y)`, ignoring the
    /// context transform.
    pub fn draw_sprite(
        &mut self,
        cx: &DrawContext<'_>,
        bitmap: &Bitmap<'_>,
        x: i32,
        y: i32,
        paint: &Paint,
    ) -> Result<(), Error> {
        let Some(image) = PdfImage::from_bitmap(bitmap, bitmap.bounds())? else {
            return Ok(());
        };
        self.draw_pdf_image(
            cx.clip.chain(),
            cx.clip.region(),
            Affine::translate((f64::from(x), f64::from(y))),
            bitmap.bounds(),
            image,
            paint,
        );
        Ok(())
    }

    /// Draws a glyph run whose origin is `origin`, aligned by the paint.
    pub fn draw_text(
        &mut self,
        cx: &DrawContext<'_>,
        typeface: &Typeface,
        glyphs: &[u16],
        origin: Point,
        paint: &Paint,
    ) -> Result<(), Error> {
        if glyphs.is_empty() {
            return Ok(());
        }
        let mut encoded = copy_glyphs(glyphs)?;
        let text_paint = text_paint(paint);
        let advance = run_advance(typeface, glyphs, paint);
        let x = origin.x - paint.text.align.offset(advance);
        let y = origin.y;

        self.with_entry(
            cx.clip.chain(),
            cx.clip.region(),
            cx.transform,
            &text_paint,
            true,
            |dev, entry| {
                let out = dev.entries.content_mut(entry);
                out.push_str("BT\n");
                set_text_transform(out, x, y, paint.text.skew_x);
                let mut consumed = 0;
                while consumed < encoded.len() {
                    let font = dev.update_font(entry, &text_paint, typeface, encoded[consumed]);
                    let count = font.glyphs_to_encoding(&mut encoded[consumed..]);
                    if count == 0 {
                        break;
                    }
                    let out = dev.entries.content_mut(entry);
                    writer::append_glyph_string(
                        out,
                        &encoded[consumed..consumed + count],
                        font.multi_byte_glyphs(),
                    );
                    out.push_str(" Tj\n");
                    consumed += count;
                }
                dev.entries.content_mut(entry).push_str("ET\n");
            },
        );

        self.draw_text_decorations(cx, paint, x, y, advance)
    }

    /// Draws glyphs at individual positions.
    ///
    /// Glyphs without a position are dropped.
    pub fn draw_pos_text(
        &mut self,
        cx: &DrawContext<'_>,
        typeface: &Typeface,
        glyphs: &[u16],
        positions: GlyphPositions<'_>,
        paint: &Paint,
    ) -> Result<(), Error> {
        let count = glyphs.len().min(positions.len());
        if count == 0 {
            return Ok(());
        }
        let text_paint = text_paint(paint);
        let scale = f64::from(paint.text.size) * f64::from(paint.text.scale_x);

        self.with_entry(
            cx.clip.chain(),
            cx.clip.region(),
            cx.transform,
            &text_paint,
            true,
            |dev, entry| {
                dev.entries.content_mut(entry).push_str("BT\n");
                for (i, &glyph) in glyphs[..count].iter().enumerate() {
                    let font = dev.update_font(entry, &text_paint, typeface, glyph);
                    let mut code = [glyph];
                    font.glyphs_to_encoding(&mut code);
                    let advance = f64::from(typeface.advance(glyph)) * scale;
                    let p = positions.get(i);
                    let out = dev.entries.content_mut(entry);
                    set_text_transform(
                        out,
                        p.x - paint.text.align.offset(advance),
                        p.y,
                        paint.text.skew_x,
                    );
                    writer::append_glyph_string(out, &code, font.multi_byte_glyphs());
                    out.push_str(" Tj\n");
                }
                dev.entries.content_mut(entry).push_str("ET\n");
            },
        );
        Ok(())
    }

    /// Glyphs along a path can't be expressed; records a diagnostic.
    pub fn draw_text_on_path(
        &mut self,
        cx: &DrawContext<'_>,
        glyphs: &[u16],
        path: &BezPath,
    ) -> Result<(), Error> {
        if glyphs.is_empty() || path.elements().is_empty() || cx.clip.is_empty() {
            return Ok(());
        }
        self.report(Diagnostic::TextOnPath);
        Ok(())
    }

    /// Triangle meshes can't be expressed; records a diagnostic.
    pub fn draw_vertices(&mut self, cx: &DrawContext<'_>, vertices: &[Point]) -> Result<(), Error> {
        if vertices.len() < 3 || cx.clip.is_empty() {
            return Ok(());
        }
        self.report(Diagnostic::Vertices);
        Ok(())
    }

    /// Draws another device with its origin at device position `(x, y)`.
    pub fn draw_device(
        &mut self,
        cx: &DrawContext<'_>,
        device: NestedDevice<'_>,
        x: i32,
        y: i32,
        paint: &Paint,
    ) -> Result<(), Error> {
        let layer = match device {
            NestedDevice::Raster(bitmap) => return self.draw_sprite(cx, &bitmap, x, y, paint),
            NestedDevice::Vector(layer) => layer,
        };
        self.diagnostics.append(&mut layer.diagnostics);
        if layer.is_empty() {
            return Ok(());
        }
        self.with_entry(
            cx.clip.chain(),
            cx.clip.region(),
            Affine::translate((f64::from(x), f64::from(y))),
            paint,
            false,
            |dev, entry| {
                let form = layer.take_form_xobject();
                let index = dev.resources.xobjects.intern(&XObject::Form(form));
                writer::draw_xobject(dev.entries.content_mut(entry), index);
            },
        );
        Ok(())
    }

    fn draw_paint_in(
        &mut self,
        chain: &ClipChain,
        region: &Region,
        transform: Affine,
        paint: &Paint,
    ) {
        if transform.determinant() == 0.0 {
            return;
        }
        let device = Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height));
        let local = transform.inverse().transform_rect_bbox(device);
        self.with_entry(chain, region, transform, paint, false, |dev, entry| {
            let out = dev.entries.content_mut(entry);
            writer::append_rect(out, local);
            writer::paint_path(out, PaintStyle::Fill, Fill::NonZero);
        });
    }

    fn draw_pdf_image(
        &mut self,
        chain: &ClipChain,
        region: &Region,
        matrix: Affine,
        area: IRect,
        image: PdfImage,
        paint: &Paint,
    ) {
        // Images fill the unit square with their first row at the top.
        let placement = matrix
            * Affine::translate((f64::from(area.x0), f64::from(area.y0)))
            * Affine::scale_non_uniform(f64::from(area.width()), f64::from(area.height()))
            * Affine::translate((0.0, 1.0))
            * Affine::scale_non_uniform(1.0, -1.0);
        let image = Arc::new(image);
        self.with_entry(chain, region, placement, paint, false, |dev, entry| {
            let index = dev.resources.xobjects.intern(&XObject::Image(image));
            writer::draw_xobject(dev.entries.content_mut(entry), index);
        });
    }

    fn draw_text_decorations(
        &mut self,
        cx: &DrawContext<'_>,
        paint: &Paint,
        x: f64,
        y: f64,
        width: f64,
    ) -> Result<(), Error> {
        if !paint.text.underline && !paint.text.strike_through {
            return Ok(());
        }
        let size = f64::from(paint.text.size);
        let line_paint = paint.clone().with_style(PaintStyle::Fill);
        if paint.text.underline {
            let top = y + size * UNDERLINE_OFFSET;
            let bar = Rect::new(x, top, x + width, top + size * UNDERLINE_THICKNESS);
            self.draw_rect(cx, bar, &line_paint)?;
        }
        if paint.text.strike_through {
            let top = y + size * STRIKE_THROUGH_OFFSET;
            let bar = Rect::new(x, top, x + width, top + size * STRIKE_THROUGH_THICKNESS);
            self.draw_rect(cx, bar, &line_paint)?;
        }
        Ok(())
    }

    /// Selects a font that can encode `glyph` in `entry`, emitting `Tf` if
    /// the active font or size changes.
    fn update_font(
        &mut self,
        entry: EntryId,
        paint: &Paint,
        typeface: &Typeface,
        glyph: u16,
    ) -> Arc<PdfFont> {
        let size = paint.text.size;
        if let Some(active) = &self.entries.get(entry).state().font {
            if active.size == size
                && active.font.typeface_id() == typeface.id()
                && active.font.has_glyph(glyph)
            {
                return active.font.clone();
            }
        }
        let font = self.cache.borrow_mut().font_for_glyph(typeface, glyph);
        let index = self.resources.fonts.intern(&font);
        let out = self.entries.content_mut(entry);
        let _ = write!(out, "/F{index} ");
        writer::append_scalar(out, f64::from(size));
        out.push_str(" Tf\n");
        self.entries.get_mut(entry).state.font = Some(ActiveFont {
            font: font.clone(),
            index,
            size,
        });
        font
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Records a diagnostic and returns `false` if `paint` can't be drawn.
    fn check_paint(&mut self, paint: &Paint) -> bool {
        let diagnostic = if paint.effects.contains(PaintEffects::PATH_EFFECT) {
            Diagnostic::PathEffect
        } else if paint.effects.contains(PaintEffects::MASK_FILTER) {
            Diagnostic::MaskFilter
        } else if paint.effects.contains(PaintEffects::COLOR_FILTER) {
            Diagnostic::ColorFilter
        } else if matches!(paint.brush, Brush::Image(_)) {
            Diagnostic::ImageBrush
        } else if let CompositeMode::Unsupported(compose) = CompositeMode::from_blend(&paint.blend)
        {
            Diagnostic::UnsupportedCompose(compose)
        } else {
            return true;
        };
        self.report(diagnostic);
        false
    }

    /// Runs `draw` against an entry set up for the call, then finishes any
    /// compositing the paint's mode needs.
    fn with_entry(
        &mut self,
        chain: &ClipChain,
        region: &Region,
        transform: Affine,
        paint: &Paint,
        has_text: bool,
        draw: impl FnOnce(&mut Self, EntryId),
    ) {
        if !self.check_paint(paint) {
            return;
        }
        let mode = CompositeMode::from_blend(&paint.blend);
        let Some(setup) =
            self.setup_content_entry(chain, region, transform, paint, has_text, mode)
        else {
            return;
        };
        draw(self, setup.entry);
        self.finish_content_entry(mode, setup.destination);
    }

    fn setup_content_entry(
        &mut self,
        chain: &ClipChain,
        region: &Region,
        transform: Affine,
        paint: &Paint,
        has_text: bool,
        mode: CompositeMode,
    ) -> Option<EntrySetup> {
        if region.is_empty() {
            return None;
        }
        // The emitter can only replay clips built on the inherited one.
        let (chain, region) = if chain.starts_with(self.existing_clip.chain()) {
            (chain.clone(), region.clone())
        } else {
            let mut rooted = self.existing_clip.clone();
            rooted.replace_with_region(region);
            (rooted.chain().clone(), rooted.region().clone())
        };

        let mut destination = None;
        if mode.clears_clip() {
            self.clear_clip_from_content(&chain, &region);
        } else if mode.needs_isolation() {
            if self.is_empty() {
                return None;
            }
            log::debug!("isolating destination for {mode:?}");
            destination = Some(self.take_form_xobject());
        }
        if matches!(mode, CompositeMode::Clear | CompositeMode::Destination) {
            return None;
        }

        let state = self.capture_state(chain, region, transform, paint, has_text);
        let placement = if mode == CompositeMode::DestinationOver {
            EntryPlacement::Beneath
        } else {
            EntryPlacement::Above
        };
        let entry = self.entries.acquire(state, placement);
        Some(EntrySetup { entry, destination })
    }

    fn capture_state(
        &mut self,
        clip: ClipChain,
        clip_region: Region,
        transform: Affine,
        paint: &Paint,
        has_text: bool,
    ) -> CapturedState {
        let resolved = resolve_brush(
            &paint.brush,
            self.initial_transform * transform,
            clip_region.bounds(),
        );
        let mut cache = self.cache.borrow_mut();
        let (fill, alpha) = match resolved {
            ResolvedBrush::Solid(color) => {
                let c = color.to_rgba8();
                (FillSource::Color([c.r, c.g, c.b]), c.a)
            }
            ResolvedBrush::Pattern(pattern) => {
                let pattern = cache.pattern(pattern);
                (
                    FillSource::Pattern(self.resources.patterns.intern(&pattern)),
                    0xFF,
                )
            }
            ResolvedBrush::Unsupported => (FillSource::default(), 0xFF),
        };
        let ext_state = cache.paint_state(PaintGraphicState::from_paint(paint, alpha));
        let ext_state = self.resources.ext_states.intern(&ext_state);
        CapturedState {
            transform,
            clip,
            clip_region,
            fill,
            ext_state: Some(ext_state),
            text: has_text.then_some(TextState {
                scale_x: paint.text.scale_x,
                fill_mode: paint.style,
            }),
            font: None,
        }
    }

    fn finish_content_entry(
        &mut self,
        mode: CompositeMode,
        destination: Option<Arc<FormXObject>>,
    ) {
        let Some((mask_source, invert)) = mode.soft_mask() else {
            return;
        };
        let Some(destination) = destination else {
            return;
        };
        let Some(head) = self.entries.head() else {
            return;
        };
        debug_assert_eq!(
            self.entries.len(),
            1,
            "an isolated draw must produce a single entry"
        );
        let state = self.entries.get(head).state();
        let (chain, region) = (state.clip.clone(), state.clip_region.clone());

        log::debug!("compositing {mode:?} through soft masks");
        let source = if self.is_empty() {
            self.entries.clear();
            self.resources.clear();
            None
        } else {
            Some(self.take_form_xobject())
        };

        // Restore the destination outside the draw's clip.
        self.draw_form_xobject_with_clip(&destination, &chain, &region, true);
        let Some(source) = source else {
            return;
        };

        let (mask, drawn) = match mask_source {
            MaskSource::Destination => (destination, source),
            MaskSource::Source => (source, destination),
        };
        let existing = self.existing_clip.clone();
        self.draw_masked_xobject(existing.chain(), existing.region(), drawn, &mask, invert);
    }

    /// Draws `xobject` restricted to `region` (or to its outside, with
    /// `invert`) by painting the clip into a soft mask.
    fn draw_form_xobject_with_clip(
        &mut self,
        xobject: &Arc<FormXObject>,
        chain: &ClipChain,
        region: &Region,
        invert: bool,
    ) {
        if region.is_empty() && !invert {
            return;
        }
        self.draw_paint_in(chain, region, Affine::IDENTITY, &Paint::default());
        let mask = self.take_form_xobject();
        let existing = self.existing_clip.clone();
        self.draw_masked_xobject(
            existing.chain(),
            existing.region(),
            xobject.clone(),
            &mask,
            invert,
        );
    }

    fn draw_masked_xobject(
        &mut self,
        chain: &ClipChain,
        region: &Region,
        xobject: Arc<FormXObject>,
        mask: &Arc<FormXObject>,
        invert: bool,
    ) {
        let Some(setup) = self.setup_content_entry(
            chain,
            region,
            Affine::IDENTITY,
            &Paint::default(),
            false,
            CompositeMode::SourceOver,
        ) else {
            return;
        };
        let (soft_mask, no_soft_mask) = {
            let mut cache = self.cache.borrow_mut();
            (
                cache.soft_mask_state(mask, invert),
                cache.no_soft_mask_state(),
            )
        };
        let mask_index = self.resources.ext_states.intern(&soft_mask);
        let xobject_index = self.resources.xobjects.intern(&XObject::Form(xobject));
        let reset_index = self.resources.ext_states.intern(&no_soft_mask);
        let out = self.entries.content_mut(setup.entry);
        writer::apply_graphic_state(out, mask_index);
        writer::draw_xobject(out, xobject_index);
        writer::apply_graphic_state(out, reset_index);
    }

    /// Erases existing content under `region` by capturing it and redrawing
    /// it outside the region.
    fn clear_clip_from_content(&mut self, chain: &ClipChain, region: &Region) {
        if region.is_empty() || self.is_empty() {
            return;
        }
        log::debug!("clearing clip from existing content");
        let current = self.take_form_xobject();
        self.draw_form_xobject_with_clip(&current, chain, region, true);
    }
}

/// The drawable extent of `content_size` in device units.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the value is rounded, non-negative, and saturates"
)]
fn device_extent(content_size: Size, user_transform: Affine) -> (u32, u32) {
    let [a, b, c, d, _, _] = if user_transform.determinant() == 0.0 {
        Affine::IDENTITY.as_coeffs()
    } else {
        user_transform.inverse().as_coeffs()
    };
    let w = a * content_size.width + c * content_size.height;
    let h = b * content_size.width + d * content_size.height;
    (w.abs().round() as u32, h.abs().round() as u32)
}

/// `1 0 -skew -1 x y Tm`: the glyph space is flipped back to y-up around
/// the glyph origin.
fn set_text_transform(out: &mut String, x: f64, y: f64, skew_x: f32) {
    out.push_str("1 0 ");
    writer::append_scalar(out, -f64::from(skew_x));
    out.push_str(" -1 ");
    writer::append_scalar(out, x);
    out.push(' ');
    writer::append_scalar(out, y);
    out.push_str(" Tm\n");
}

fn run_advance(typeface: &Typeface, glyphs: &[u16], paint: &Paint) -> f64 {
    f64::from(typeface.run_advance(glyphs))
        * f64::from(paint.text.size)
        * f64::from(paint.text.scale_x)
}

/// The paint glyphs are drawn with; fake bold becomes an outline stroke.
fn text_paint(paint: &Paint) -> Paint {
    let mut result = paint.clone();
    if paint.text.fake_bold {
        let width = f64::from(paint.text.size * fake_bold_scale(paint.text.size));
        if paint.style == PaintStyle::Fill {
            result.style = PaintStyle::FillAndStroke;
            result.stroke.width = width;
        } else {
            result.stroke.width += width;
        }
    }
    result
}

/// Outline width per unit of text size, interpolated between small and large
/// text.
fn fake_bold_scale(size: f32) -> f32 {
    const KEYS: [f32; 2] = [9.0, 36.0];
    const VALUES: [f32; 2] = [1.0 / 24.0, 1.0 / 32.0];
    if size <= KEYS[0] {
        VALUES[0]
    } else if size >= KEYS[1] {
        VALUES[1]
    } else {
        let t = (size - KEYS[0]) / (KEYS[1] - KEYS[0]);
        VALUES[0] + t * (VALUES[1] - VALUES[0])
    }
}

fn copy_glyphs(glyphs: &[u16]) -> Result<Vec<u16>, Error> {
    let mut encoded = Vec::new();
    encoded
        .try_reserve_exact(glyphs.len())
        .map_err(|_| Error::alloc("glyph buffer", size_of_val(glyphs)))?;
    encoded.extend_from_slice(glyphs);
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use peniko::{BlendMode, Compose};

    fn device(width: f64, height: f64) -> PdfDevice {
        PdfDevice::new(DeviceOptions::default().with_page_size(Size::new(width, height)))
    }

    fn red() -> Paint {
        Paint::from_color(Color::from_rgba8(255, 0, 0, 255))
    }

    #[test]
    fn page_extent_follows_the_initial_transform() {
        let options = DeviceOptions::default()
            .with_page_size(Size::new(200.0, 100.0))
            .with_initial_transform(Affine::scale(2.0));
        let device = PdfDevice::new(options);
        assert_eq!(device.size(), (100, 50));
        assert_eq!(
            device.initial_transform(),
            Affine::new([2.0, 0.0, 0.0, -2.0, 0.0, 100.0])
        );
    }

    #[test]
    fn content_area_is_clipped() {
        let options = DeviceOptions::default()
            .with_page_size(Size::new(100.0, 100.0))
            .with_content_size(Size::new(50.0, 40.0));
        let device = PdfDevice::new(options);
        assert_eq!(
            device.content(),
            "1 0 0 -1 0 100 cm\n0 0 50 40 re\nW n\n"
        );
    }

    #[test]
    fn fake_bold_strokes_fills() {
        let mut paint = red();
        paint.text.fake_bold = true;
        paint.text.size = 9.0;
        let bold = text_paint(&paint);
        assert_eq!(bold.style, PaintStyle::FillAndStroke);
        assert!((bold.stroke.width - 9.0 / 24.0).abs() < 1e-6);
        assert!((fake_bold_scale(22.5) - (1.0 / 24.0 + 1.0 / 32.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn text_switches_fonts_across_glyph_blocks() {
        let mut device = device(100.0, 100.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        let face = Typeface::new(1, false, vec![0.5; 600]);
        device
            .draw_text(&cx, &face, &[1, 2, 300], Point::new(10.0, 20.0), &red())
            .unwrap();
        let entry = device.entries().head().unwrap();
        assert_eq!(
            device.entries().get(entry).content(),
            "BT\n1 0 0 -1 10 20 Tm\n/F0 12 Tf\n<0203> Tj\n/F1 12 Tf\n<2E> Tj\nET\n"
        );
        assert_eq!(device.resources().fonts().len(), 2);
    }

    #[test]
    fn text_alignment_and_underline() {
        let mut device = device(100.0, 100.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        let face = Typeface::new(1, true, vec![0.5; 4]);
        let mut paint = red();
        paint.text.align = crate::paint::TextAlign::Right;
        paint.text.underline = true;
        paint.text.size = 18.0;
        device
            .draw_text(&cx, &face, &[1, 2], Point::new(50.0, 20.0), &paint)
            .unwrap();
        let content: String = device.entries().iter().map(|e| e.content()).collect();
        assert!(content.contains("1 0 0 -1 32 20 Tm\n"), "{content}");
        assert!(content.contains("<00010002> Tj\n"), "{content}");
        assert!(content.contains("32 22 18 1 re\nf\n"), "{content}");
    }

    #[test]
    fn hairline_points_use_round_caps() {
        let mut device = device(100.0, 100.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        let paint = red().with_stroke(kurbo::Stroke::new(0.0).with_caps(Cap::Butt));
        device
            .draw_points(&cx, PointMode::Points, &[Point::new(1.0, 2.0)], &paint)
            .unwrap();
        let entry = device.entries().head().unwrap();
        assert_eq!(device.entries().get(entry).content(), "1 2 m\nh\nS\n");
        let Some(crate::ExtGState::Paint(state)) = device
            .resources()
            .ext_states()
            .get(0)
            .map(|s| &**s)
        else {
            panic!("expected a paint state");
        };
        assert_eq!(state.cap(), 1);
    }

    #[test]
    fn wide_points_become_squares() {
        let mut device = device(100.0, 100.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        let paint = red().with_stroke(kurbo::Stroke::new(4.0).with_caps(Cap::Square));
        device
            .draw_points(&cx, PointMode::Points, &[Point::new(10.0, 10.0)], &paint)
            .unwrap();
        let entry = device.entries().head().unwrap();
        assert_eq!(device.entries().get(entry).content(), "8 8 4 4 re\nf\n");
    }

    #[test]
    fn images_map_onto_the_unit_square() {
        let mut device = device(100.0, 100.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        let pixels = [0_u8; 4 * 6];
        let bitmap = Bitmap::new(3, 2, &pixels);
        device
            .draw_image(&cx, &bitmap, None, Affine::translate((10.0, 10.0)), &red())
            .unwrap();
        let entry = device.entries().head().unwrap();
        assert_eq!(device.entries().get(entry).content(), "/X0 Do\n");
        assert_eq!(
            device.entries().get(entry).state().transform,
            Affine::new([3.0, 0.0, 0.0, -2.0, 10.0, 12.0])
        );
        assert!(device.resources().xobjects().get(0).unwrap().as_image().is_some());
    }

    #[test]
    fn source_mode_erases_under_the_clip() {
        let mut device = device(100.0, 100.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        device.draw_rect(&cx, Rect::new(0.0, 0.0, 50.0, 50.0), &red()).unwrap();
        let copy = Paint::from_color(Color::WHITE).with_blend(BlendMode::from(Compose::Copy));
        device.draw_rect(&cx, Rect::new(0.0, 0.0, 10.0, 10.0), &copy).unwrap();

        // The red rectangle now lives in a form drawn through an inverted
        // clip mask, followed by the white draw.
        let xobjects = device.resources().xobjects();
        assert_eq!(xobjects.len(), 1);
        let form = xobjects.get(0).unwrap().as_form().unwrap();
        assert!(form.content().contains("1 0 0 rg"));
        let content = device.content();
        let masked = content.find("/X0 Do").unwrap();
        let white = content.find("1 1 1 rg").unwrap();
        assert!(masked < white, "{content}");
    }

    #[test]
    fn clear_mode_draws_nothing_new() {
        let mut device = device(100.0, 100.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        device.draw_rect(&cx, Rect::new(0.0, 0.0, 50.0, 50.0), &red()).unwrap();
        let clear = red().with_blend(BlendMode::from(Compose::Clear));
        device.draw_rect(&cx, Rect::new(0.0, 0.0, 10.0, 10.0), &clear).unwrap();
        let content: String = device.entries().iter().map(|e| e.content()).collect();
        assert!(!content.contains(" re\nf\n"), "{content}");
        assert!(content.contains("/X0 Do\n"), "{content}");
    }

    #[test]
    fn clear_fills_with_a_color() {
        let mut device = device(10.0, 10.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        device.draw_rect(&cx, Rect::new(0.0, 0.0, 5.0, 5.0), &red()).unwrap();
        device.clear(Color::WHITE);
        let content: String = device.entries().iter().map(|e| e.content()).collect();
        assert_eq!(content, "0 0 10 10 re\nf\n");
        assert_eq!(device.entries().len(), 1);
    }

    #[test]
    fn unsupported_features_are_reported() {
        let mut device = device(10.0, 10.0);
        let clip = device.existing_clip().clone();
        let cx = DrawContext::new(&clip);
        let atop = red().with_blend(BlendMode::from(Compose::SrcAtop));
        device.draw_rect(&cx, Rect::new(0.0, 0.0, 5.0, 5.0), &atop).unwrap();
        let dashed = red().with_effects(PaintEffects::PATH_EFFECT);
        device.draw_rect(&cx, Rect::new(0.0, 0.0, 5.0, 5.0), &dashed).unwrap();
        device
            .draw_vertices(&cx, &[Point::ORIGIN, Point::new(1.0, 0.0), Point::new(0.0, 1.0)])
            .unwrap();
        assert!(device.is_empty());
        assert_eq!(
            device.take_diagnostics(),
            [
                Diagnostic::UnsupportedCompose(Compose::SrcAtop),
                Diagnostic::PathEffect,
                Diagnostic::Vertices,
            ]
        );
        assert!(device.diagnostics().is_empty());
    }
}
