//! Drawing primitives that stage dots in the pending generation.
//!
//! All primitives clip: dots that fall outside the canvas are dropped. Only
//! [`FrameBuffer::set_pending`] reports out-of-range coordinates.

use embedded_graphics::prelude::{Point, Size};

use crate::font::{char_code, Font, DOUBLE_HEIGHT_OFFSET};
use crate::framebuffer::FrameBuffer;
use crate::DotState;

/// Monochrome bitmap stored column-wise.
///
/// Byte `i` holds rows 0..8 of column `i`, bit 0 at the top. Icons taller
/// than 8 rows store their lower half in a second run of `width` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Icon<'a> {
    /// Width in columns
    pub width: u8,
    /// Height in rows, at most 16
    pub height: u8,
    /// Column bytes
    pub data: &'a [u8],
}

impl<'a> Icon<'a> {
    /// Wraps column data of a `width` x `height` icon.
    #[must_use]
    pub const fn new(width: u8, height: u8, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Stages a run of `len` dots going right from `start`.
pub fn draw_hline<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    start: Point,
    len: u32,
    state: DotState,
) {
    let (from, to) = clamp_run(start.x, len, COLS);
    for x in from..to {
        fb.plot(Point::new(x, start.y), state);
    }
}

/// Stages a run of `len` dots going down from `start`.
pub fn draw_vline<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    start: Point,
    len: u32,
    state: DotState,
) {
    let (from, to) = clamp_run(start.y, len, ROWS);
    for y in from..to {
        fb.plot(Point::new(start.x, y), state);
    }
}

// visible part of a run of `len` starting at `start` on an axis of `extent`
fn clamp_run(start: i32, len: u32, extent: usize) -> (i32, i32) {
    let end = i64::from(start) + i64::from(len);
    let from = i64::from(start).clamp(0, extent as i64);
    let to = end.clamp(0, extent as i64);
    (from as i32, to.max(from) as i32)
}

/// Stages a straight line between two points, both ends included.
pub fn draw_line<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    from: Point,
    to: Point,
    state: DotState,
) {
    if from.x == to.x {
        let top = from.y.min(to.y);
        let len = from.y.abs_diff(to.y).saturating_add(1);
        draw_vline(fb, Point::new(from.x, top), len, state);
    } else if from.y == to.y {
        let left = from.x.min(to.x);
        let len = from.x.abs_diff(to.x).saturating_add(1);
        draw_hline(fb, Point::new(left, from.y), len, state);
    } else {
        bresenham(fb, from, to, state);
    }
}

// Only the part of the major axis inside the canvas is walked. The minor
// coordinate of step k is the one the incremental error term reaches there.
fn bresenham<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    from: Point,
    to: Point,
    state: DotState,
) {
    let (mut x0, mut y0) = (i64::from(from.x), i64::from(from.y));
    let (mut x1, mut y1) = (i64::from(to.x), i64::from(to.y));

    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    if steep {
        core::mem::swap(&mut x0, &mut y0);
        core::mem::swap(&mut x1, &mut y1);
    }
    if x0 > x1 {
        core::mem::swap(&mut x0, &mut x1);
        core::mem::swap(&mut y0, &mut y1);
    }

    let dx = i128::from(x1 - x0);
    let dy = i128::from((y1 - y0).abs());
    let ystep = if y0 < y1 { 1 } else { -1 };
    let extent = (if steep { ROWS } else { COLS }) as i64;

    for x in x0.max(0)..=x1.min(extent - 1) {
        let k = i128::from(x - x0);
        let advance = (k * dy - dx / 2 + dx - 1).div_euclid(dx);
        let y = i128::from(y0) + ystep * advance;
        let p = if steep { (y, i128::from(x)) } else { (i128::from(x), y) };
        plot_wide(fb, p.0, p.1, state);
    }
}

// drops dots whose coordinates do not fit the canvas type
fn plot_wide<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    x: i128,
    y: i128,
    state: DotState,
) {
    if let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) {
        fb.plot(Point::new(x, y), state);
    }
}

/// Stages the outline of a circle.
///
/// Only the columns and rows of the canvas are visited, so the cost does not
/// grow with `radius`.
pub fn draw_circle<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    center: Point,
    radius: i32,
    state: DotState,
) {
    if radius < 0 {
        return;
    }
    let (cx, cy) = (i128::from(center.x), i128::from(center.y));
    let r = i128::from(radius);

    plot_wide(fb, cx, cy + r, state);
    plot_wide(fb, cx, cy - r, state);
    plot_wide(fb, cx + r, cy, state);
    plot_wide(fb, cx - r, cy, state);

    // (x, y) octant offsets land on column cx +- x; (y, x) on row cy +- x
    for col in 0..COLS as i128 {
        if let Some(dy) = octant_offset(r, (col - cx).abs()) {
            plot_wide(fb, col, cy + dy, state);
            plot_wide(fb, col, cy - dy, state);
        }
    }
    for row in 0..ROWS as i128 {
        if let Some(dx) = octant_offset(r, (row - cy).abs()) {
            plot_wide(fb, cx + dx, row, state);
            plot_wide(fb, cx - dx, row, state);
        }
    }
}

// Second offset of the midpoint circle at step `x` of the first octant, or
// `None` if the walk never reaches `x`.
fn octant_offset(r: i128, x: i128) -> Option<i128> {
    if x < 1 {
        return None;
    }
    let prev = if x == 1 { r } else { midpoint_offset(r, x - 1) };
    if x - 1 >= prev {
        return None;
    }
    Some(midpoint_offset(r, x).max(prev - 1))
}

// largest y with x^2 + y(y - 1) < r^2, or 0 if there is none
fn midpoint_offset(r: i128, x: i128) -> i128 {
    let t = r * r - x * x;
    if t <= 0 {
        return 0;
    }
    let mut y = (1 + (4 * t + 1).isqrt()) / 2;
    while y * (y - 1) >= t {
        y -= 1;
    }
    while (y + 1) * y < t {
        y += 1;
    }
    y
}

/// Stages the outline of a rectangle.
pub fn draw_rect<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    top_left: Point,
    size: Size,
    state: DotState,
) {
    if size.width == 0 || size.height == 0 {
        return;
    }
    let right = i64::from(top_left.x) + i64::from(size.width) - 1;
    let bottom = i64::from(top_left.y) + i64::from(size.height) - 1;
    draw_hline(fb, top_left, size.width, state);
    draw_vline(fb, top_left, size.height, state);
    // an edge past i32::MAX is off the canvas anyway
    if let Ok(bottom) = i32::try_from(bottom) {
        draw_hline(fb, Point::new(top_left.x, bottom), size.width, state);
    }
    if let Ok(right) = i32::try_from(right) {
        draw_vline(fb, Point::new(right, top_left.y), size.height, state);
    }
}

/// Stages a filled rectangle.
pub fn fill_rect<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    top_left: Point,
    size: Size,
    state: DotState,
) {
    let (from, to) = clamp_run(top_left.x, size.width, COLS);
    for x in from..to {
        draw_vline(fb, Point::new(x, top_left.y), size.height, state);
    }
}

/// Stages the set bits of `icon` as `state`.
///
/// With `invert` the clear bits are drawn instead.
pub fn draw_icon<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    icon: &Icon<'_>,
    top_left: Point,
    state: DotState,
    invert: bool,
) {
    let width = usize::from(icon.width);
    let tall = icon.height > 8;
    let rows = if tall {
        (icon.height / 2).min(8)
    } else {
        icon.height
    };

    for col in 0..width {
        let x = top_left.x.saturating_add(col as i32);
        let upper = icon.data.get(col).copied().unwrap_or(0);
        plot_column(fb, Point::new(x, top_left.y), upper, rows, invert, state);
        if tall {
            let lower = icon.data.get(col + width).copied().unwrap_or(0);
            let y = top_left.y.saturating_add(i32::from(rows));
            plot_column(fb, Point::new(x, y), lower, rows, invert, state);
        }
    }
}

fn plot_column<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    top: Point,
    bits: u8,
    rows: u8,
    invert: bool,
    state: DotState,
) {
    for row in 0..rows.min(8) {
        if ((bits >> row) & 1 == 1) != invert {
            fb.plot(Point::new(top.x, top.y.saturating_add(i32::from(row))), state);
        }
    }
}

/// Stages one character and returns its width.
///
/// Only the set bits of the glyph are drawn. Fonts taller than 8 rows take
/// the upper 8 rows from the glyph at `code + 128` and the lower 8 rows from
/// the glyph itself.
pub fn draw_char<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    font: &Font<'_>,
    top_left: Point,
    ch: char,
    state: DotState,
) -> u8 {
    let code = char_code(ch);
    let glyph = font.glyph(code);

    if font.is_double_height() {
        let upper = code
            .checked_add(DOUBLE_HEIGHT_OFFSET)
            .map_or(&[][..], |upper| font.glyph(upper));
        let lower_y = top_left.y.saturating_add(8);
        for (col, &bits) in glyph.iter().enumerate() {
            let x = top_left.x.saturating_add(col as i32);
            let upper_bits = upper.get(col).copied().unwrap_or(0);
            plot_column(fb, Point::new(x, top_left.y), upper_bits, 8, false, state);
            plot_column(fb, Point::new(x, lower_y), bits, 8, false, state);
        }
    } else {
        for (col, &bits) in glyph.iter().enumerate() {
            let x = top_left.x.saturating_add(col as i32);
            plot_column(fb, Point::new(x, top_left.y), bits, font.height(), false, state);
        }
    }

    glyph.len() as u8
}

/// Stages `text` and returns the column after the last character.
///
/// The cursor advances by each glyph's width plus `spacing`.
pub fn draw_text<const COLS: usize, const ROWS: usize>(
    fb: &mut FrameBuffer<COLS, ROWS>,
    font: &Font<'_>,
    origin: Point,
    text: &str,
    spacing: u8,
    state: DotState,
) -> i32 {
    let mut x = origin.x;
    for ch in text.chars() {
        let width = draw_char(fb, font, Point::new(x, origin.y), ch, state);
        x = x.saturating_add(i32::from(width) + i32::from(spacing));
    }
    x
}
