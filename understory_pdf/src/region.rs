// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel-accurate clip regions.
//!
//! A [`Region`] is a set of disjoint integer rectangles. It is the resolved
//! form of a clip chain: set operations are exact, and any region can be
//! turned back into a fillable path with [`Region::boundary_path`].

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _; // for `ceil`, `floor` and `round`
use hashbrown::HashMap;
use kurbo::{BezPath, PathEl, Point, Rect, Shape};
use peniko::Fill;

/// An integer rectangle with exclusive right and bottom edges.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    /// Left edge.
    pub x0: i32,
    /// Top edge.
    pub y0: i32,
    /// Right edge (exclusive).
    pub x1: i32,
    /// Bottom edge (exclusive).
    pub y1: i32,
}

impl IRect {
    /// Creates a rectangle from its edges.
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// A rectangle at the origin with the given size.
    #[allow(
        clippy::cast_possible_wrap,
        reason = "device sizes are far below i32::MAX"
    )]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Rounds each edge of `rect` to the nearest pixel boundary.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "float to int casts saturate, which is the clamping we want"
    )]
    pub fn round(rect: Rect) -> Self {
        let rect = rect.abs();
        Self::new(
            rect.x0.round() as i32,
            rect.y0.round() as i32,
            rect.x1.round() as i32,
            rect.y1.round() as i32,
        )
    }

    /// The smallest integer rectangle containing `rect`.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "float to int casts saturate, which is the clamping we want"
    )]
    pub fn round_out(rect: Rect) -> Self {
        let rect = rect.abs();
        Self::new(
            rect.x0.floor() as i32,
            rect.y0.floor() as i32,
            rect.x1.ceil() as i32,
            rect.y1.ceil() as i32,
        )
    }

    /// Width in pixels, zero when empty.
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0).max(0).unsigned_abs()
    }

    /// Height in pixels, zero when empty.
    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0).max(0).unsigned_abs()
    }

    /// Returns `true` if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Returns `true` if the pixel at `(x, y)` is inside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// The overlap of two rectangles, or `None` if they don't overlap.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        (!r.is_empty()).then_some(r)
    }

    /// The smallest rectangle containing both.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Converts to a floating-point rectangle.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// Pushes the parts of `self` not covered by `other` (at most four).
    fn subtract_into(&self, other: &Self, out: &mut Vec<Self>) {
        let Some(i) = self.intersect(other) else {
            out.push(*self);
            return;
        };
        if self.y0 < i.y0 {
            out.push(Self::new(self.x0, self.y0, self.x1, i.y0));
        }
        if i.y1 < self.y1 {
            out.push(Self::new(self.x0, i.y1, self.x1, self.y1));
        }
        if self.x0 < i.x0 {
            out.push(Self::new(self.x0, i.y0, i.x0, i.y1));
        }
        if i.x1 < self.x1 {
            out.push(Self::new(i.x1, i.y0, self.x1, i.y1));
        }
    }
}

/// A set of pixels stored as disjoint rectangles.
///
/// Equality is structural: two regions covering the same pixels with a
/// different decomposition compare unequal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<IRect>,
}

impl Region {
    /// The empty region.
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// A region covering `rect`.
    pub fn from_rect(rect: IRect) -> Self {
        let mut rects = Vec::new();
        if !rect.is_empty() {
            rects.push(rect);
        }
        Self { rects }
    }

    /// Rasterizes a path into a region.
    ///
    /// A pixel is inside when its center is inside the path under `fill`.
    /// With `inverse` set the result is the complement of the path within
    /// `bounds`; otherwise it is clipped to `bounds`. Curves are flattened with
    /// `tolerance`.
    pub fn from_path(
        path: &BezPath,
        fill: Fill,
        inverse: bool,
        bounds: IRect,
        tolerance: f64,
    ) -> Self {
        if bounds.is_empty() {
            return Self::new();
        }
        let edges = flatten_edges(path, tolerance);
        let rows = if inverse {
            bounds
        } else {
            match IRect::round_out(path.bounding_box()).intersect(&bounds) {
                Some(r) => r,
                None => return Self::new(),
            }
        };

        let mut builder = RowCoalescer::default();
        let mut crossings: Vec<(f64, i32)> = Vec::new();
        let mut spans: Vec<(i32, i32)> = Vec::new();
        for y in rows.y0..rows.y1 {
            let cy = f64::from(y) + 0.5;
            crossings.clear();
            for &(a, b) in &edges {
                if a.y <= cy && b.y > cy {
                    crossings.push((a.x + (cy - a.y) * (b.x - a.x) / (b.y - a.y), 1));
                } else if b.y <= cy && a.y > cy {
                    crossings.push((a.x + (cy - a.y) * (b.x - a.x) / (b.y - a.y), -1));
                }
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            spans.clear();
            let mut winding = 0;
            let mut span_start = 0.0;
            for &(x, dir) in &crossings {
                let was_inside = is_inside(winding, fill);
                winding += dir;
                let now_inside = is_inside(winding, fill);
                if !was_inside && now_inside {
                    span_start = x;
                } else if was_inside && !now_inside {
                    let x0 = pixel_start(span_start).max(bounds.x0);
                    let x1 = pixel_start(x).min(bounds.x1);
                    if x0 < x1 {
                        spans.push((x0, x1));
                    }
                }
            }
            if inverse {
                invert_spans(&mut spans, bounds.x0, bounds.x1);
            }
            builder.push_row(y, &spans);
        }
        Self {
            rects: builder.finish(),
        }
    }

    /// Returns `true` if the region covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The disjoint rectangles making up the region.
    pub fn rects(&self) -> &[IRect] {
        &self.rects
    }

    /// The bounding box of the region, empty for an empty region.
    pub fn bounds(&self) -> IRect {
        self.rects
            .iter()
            .fold(IRect::default(), |acc, r| acc.union(r))
    }

    /// Returns `true` if pixel `(x, y)` is in the region.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }

    /// Pixels in both regions.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut rects = Vec::new();
        for a in &self.rects {
            for b in &other.rects {
                if let Some(r) = a.intersect(b) {
                    rects.push(r);
                }
            }
        }
        Self { rects }
    }

    /// Pixels in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        let mut rects = self.rects.clone();
        let mut next = Vec::new();
        for b in &other.rects {
            next.clear();
            for a in &rects {
                a.subtract_into(b, &mut next);
            }
            core::mem::swap(&mut rects, &mut next);
        }
        Self { rects }
    }

    /// Pixels in either region.
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.rects.extend(other.difference(self).rects);
        result
    }

    /// Pixels in exactly one of the regions.
    pub fn xor(&self, other: &Self) -> Self {
        let mut result = self.difference(other);
        result.rects.extend(other.difference(self).rects);
        result
    }

    /// A path whose non-zero fill covers exactly the region.
    ///
    /// Edges shared by neighboring rectangles cancel, so each connected
    /// piece becomes one clockwise outline and each hole one
    /// counter-clockwise outline.
    pub fn boundary_path(&self) -> BezPath {
        let mut rows: BTreeMap<i32, Vec<(i32, i32)>> = BTreeMap::new();
        let mut columns: BTreeMap<i32, Vec<(i32, i32)>> = BTreeMap::new();
        for r in &self.rects {
            push_interval(&mut rows, r.y0, r.x0, r.x1, 1);
            push_interval(&mut rows, r.y1, r.x0, r.x1, -1);
            push_interval(&mut columns, r.x1, r.y0, r.y1, 1);
            push_interval(&mut columns, r.x0, r.y0, r.y1, -1);
        }

        let mut edges = Vec::new();
        for (&y, events) in &mut rows {
            for (a, b, dir) in net_runs(events) {
                let (from, to) = if dir > 0 { (a, b) } else { (b, a) };
                edges.push(Edge {
                    from: (from, y),
                    to: (to, y),
                    horizontal: true,
                });
            }
        }
        for (&x, events) in &mut columns {
            for (a, b, dir) in net_runs(events) {
                let (from, to) = if dir > 0 { (a, b) } else { (b, a) };
                edges.push(Edge {
                    from: (x, from),
                    to: (x, to),
                    horizontal: false,
                });
            }
        }

        let mut outgoing: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.from).or_default().push(i);
        }

        let mut used = alloc::vec![false; edges.len()];
        let mut path = BezPath::new();
        for first in 0..edges.len() {
            if used[first] {
                continue;
            }
            used[first] = true;
            let start = edges[first].from;
            path.move_to(corner(start));
            let mut current = first;
            loop {
                let end = edges[current].to;
                if end == start {
                    break;
                }
                path.line_to(corner(end));
                let horizontal = edges[current].horizontal;
                let next = outgoing.get(&end).and_then(|candidates| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&i| !used[i] && edges[i].horizontal != horizontal)
                });
                let Some(next) = next else {
                    break;
                };
                used[next] = true;
                current = next;
            }
            path.close_path();
        }
        path
    }
}

/// A maximal straight piece of a region outline.
struct Edge {
    from: (i32, i32),
    to: (i32, i32),
    horizontal: bool,
}

fn corner((x, y): (i32, i32)) -> Point {
    Point::new(f64::from(x), f64::from(y))
}

fn push_interval(lines: &mut BTreeMap<i32, Vec<(i32, i32)>>, line: i32, a: i32, b: i32, dir: i32) {
    lines.entry(line).or_default().extend([(a, dir), (b, -dir)]);
}

/// Runs of constant non-zero direction along one line, as `(start, end, dir)`.
fn net_runs(events: &mut [(i32, i32)]) -> Vec<(i32, i32, i32)> {
    events.sort_unstable();
    let mut runs = Vec::new();
    let mut value = 0;
    let mut run_start = 0;
    let mut i = 0;
    while i < events.len() {
        let pos = events[i].0;
        let mut next = value;
        while i < events.len() && events[i].0 == pos {
            next += events[i].1;
            i += 1;
        }
        if next != value {
            if value != 0 {
                runs.push((run_start, pos, value));
            }
            run_start = pos;
            value = next;
        }
    }
    runs
}

fn is_inside(winding: i32, fill: Fill) -> bool {
    match fill {
        Fill::NonZero => winding != 0,
        Fill::EvenOdd => winding % 2 != 0,
    }
}

/// The first pixel whose center lies at or after `x`.
#[allow(
    clippy::cast_possible_truncation,
    reason = "float to int casts saturate, which is the clamping we want"
)]
fn pixel_start(x: f64) -> i32 {
    (x - 0.5).ceil() as i32
}

fn invert_spans(spans: &mut Vec<(i32, i32)>, x0: i32, x1: i32) {
    let mut inverted = Vec::with_capacity(spans.len() + 1);
    let mut cursor = x0;
    for &(a, b) in spans.iter() {
        if a > cursor {
            inverted.push((cursor, a));
        }
        cursor = cursor.max(b);
    }
    if cursor < x1 {
        inverted.push((cursor, x1));
    }
    *spans = inverted;
}

/// Line segments of the flattened path, with every subpath closed.
fn flatten_edges(path: &BezPath, tolerance: f64) -> Vec<(Point, Point)> {
    let mut edges = Vec::new();
    let mut start = Point::ORIGIN;
    let mut last = Point::ORIGIN;
    kurbo::flatten(path.iter(), tolerance, |el| match el {
        PathEl::MoveTo(p) => {
            if last != start {
                edges.push((last, start));
            }
            start = p;
            last = p;
        }
        PathEl::LineTo(p) => {
            edges.push((last, p));
            last = p;
        }
        PathEl::ClosePath => {
            if last != start {
                edges.push((last, start));
            }
            last = start;
        }
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    if last != start {
        edges.push((last, start));
    }
    edges
}

/// Merges identical spans on consecutive rows into taller rectangles.
#[derive(Default)]
struct RowCoalescer {
    done: Vec<IRect>,
    open: Vec<IRect>,
}

impl RowCoalescer {
    fn push_row(&mut self, y: i32, spans: &[(i32, i32)]) {
        let mut next = Vec::with_capacity(spans.len());
        for &(x0, x1) in spans {
            if let Some(pos) = self
                .open
                .iter()
                .position(|r| r.x0 == x0 && r.x1 == x1 && r.y1 == y)
            {
                let mut r = self.open.swap_remove(pos);
                r.y1 = y + 1;
                next.push(r);
            } else {
                next.push(IRect::new(x0, y, x1, y + 1));
            }
        }
        self.done.append(&mut self.open);
        self.open = next;
    }

    fn finish(mut self) -> Vec<IRect> {
        self.done.append(&mut self.open);
        self.done
    }
}
