//! Two-generation bit matrix backing a flip-dot display.
//!
//! Every column is a `u32` bitmask, bit `r` holding row `r`. The *realized*
//! generation mirrors what the dots physically show after the last commit;
//! the *pending* generation collects everything drawn since. Only the
//! difference between the two is ever pulsed.
//!
//! # Example
//! ```rust
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::pixelcolor::BinaryColor;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use flipdot_framebuffer::{DotState, FrameBuffer};
//!
//! let mut fb = FrameBuffer::<28, 16>::new();
//! fb.set_pending(Point::new(3, 4), DotState::Yellow).unwrap();
//!
//! Rectangle::new(Point::new(10, 2), Size::new(4, 4))
//!     .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
//!     .draw(&mut fb)
//!     .unwrap();
//!
//! assert_eq!(fb.differences(), 17);
//! assert_eq!(fb.realized(Point::new(3, 4)), Ok(DotState::Black));
//! ```

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Point, Size};

use crate::{DotState, OutOfBounds};

/// Most rows a column bitmask can hold.
pub const MAX_ROWS: usize = 32;

/// Direction of a one-cell [`FrameBuffer::shift`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Towards column 0
    Left,
    /// Towards the last column
    Right,
    /// Towards row 0
    Up,
    /// Towards the last row
    Down,
}

/// Realized and pending state of a `COLS` x `ROWS` matrix.
///
/// # Type Parameters
/// - `COLS`: Number of columns of the canvas, may exceed the physical width
/// - `ROWS`: Number of rows (1-32)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FrameBuffer<const COLS: usize, const ROWS: usize> {
    realized: [u32; COLS],
    pending: [u32; COLS],
}

impl<const COLS: usize, const ROWS: usize> Default for FrameBuffer<COLS, ROWS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const COLS: usize, const ROWS: usize> FrameBuffer<COLS, ROWS> {
    const ROWS_FIT: () = assert!(ROWS > 0 && ROWS <= MAX_ROWS, "ROWS must be 1..=32");

    /// Mask of the bits used by a column.
    pub const ROW_MASK: u32 = if ROWS >= MAX_ROWS {
        u32::MAX
    } else {
        (1u32 << ROWS) - 1
    };

    /// Creates a framebuffer with both generations black.
    ///
    /// The realized generation is only a guess until the display has been
    /// cleared once.
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::ROWS_FIT;
        Self {
            realized: [0; COLS],
            pending: [0; COLS],
        }
    }

    fn index(p: Point) -> Result<(usize, usize), OutOfBounds> {
        if p.x < 0 || p.y < 0 || p.x as usize >= COLS || p.y as usize >= ROWS {
            return Err(OutOfBounds(p));
        }
        Ok((p.x as usize, p.y as usize))
    }

    /// Stages `state` for one dot.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if `p` is outside the canvas.
    pub fn set_pending(&mut self, p: Point, state: DotState) -> Result<(), OutOfBounds> {
        let (col, row) = Self::index(p)?;
        write_bit(&mut self.pending[col], row, state.is_yellow());
        Ok(())
    }

    /// Stages `state` for one dot, ignoring points outside the canvas.
    pub fn plot(&mut self, p: Point, state: DotState) {
        if let Ok((col, row)) = Self::index(p) {
            write_bit(&mut self.pending[col], row, state.is_yellow());
        }
    }

    /// Staged state of one dot.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if `p` is outside the canvas.
    pub fn pending(&self, p: Point) -> Result<DotState, OutOfBounds> {
        let (col, row) = Self::index(p)?;
        Ok(DotState::from_bit(read_bit(self.pending[col], row)))
    }

    /// State of one dot as of the last commit.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if `p` is outside the canvas.
    pub fn realized(&self, p: Point) -> Result<DotState, OutOfBounds> {
        let (col, row) = Self::index(p)?;
        Ok(DotState::from_bit(read_bit(self.realized[col], row)))
    }

    /// Realized bitmask of a column.
    #[must_use]
    pub fn realized_column(&self, col: usize) -> Option<u32> {
        self.realized.get(col).copied()
    }

    /// Pending bitmask of a column.
    #[must_use]
    pub fn pending_column(&self, col: usize) -> Option<u32> {
        self.pending.get(col).copied()
    }

    /// Realized states of a row, left to right.
    ///
    /// Returns `None` if `row` is outside the canvas.
    pub fn realized_row(&self, row: usize) -> Option<impl Iterator<Item = DotState> + '_> {
        (row < ROWS).then(|| {
            self.realized
                .iter()
                .map(move |column| DotState::from_bit(read_bit(*column, row)))
        })
    }

    /// Copy of the realized generation.
    #[must_use]
    pub fn snapshot(&self) -> [u32; COLS] {
        self.realized
    }

    /// Replaces the pending generation with `map`.
    ///
    /// Bits above `ROWS` are dropped.
    pub fn restore_pending(&mut self, map: &[u32; COLS]) {
        for (pending, column) in self.pending.iter_mut().zip(map) {
            *pending = column & Self::ROW_MASK;
        }
    }

    /// Stages the whole canvas as `state`.
    pub fn fill_pending(&mut self, state: DotState) {
        self.pending.fill(column_fill(state) & Self::ROW_MASK);
    }

    /// Shifts the realized image one cell and stages the result.
    ///
    /// The edge that moves into view is filled with `fill`; whatever falls
    /// off the opposite edge is lost.
    pub fn shift(&mut self, direction: Direction, fill: DotState) {
        let fill_column = column_fill(fill) & Self::ROW_MASK;
        let mut shifted = self.realized;
        match direction {
            Direction::Right => {
                if COLS > 1 {
                    shifted.copy_within(0..COLS - 1, 1);
                }
                if let Some(first) = shifted.first_mut() {
                    *first = fill_column;
                }
            }
            Direction::Left => {
                if COLS > 1 {
                    shifted.copy_within(1..COLS, 0);
                }
                if let Some(last) = shifted.last_mut() {
                    *last = fill_column;
                }
            }
            Direction::Up => {
                for column in &mut shifted {
                    *column >>= 1;
                    write_bit(column, ROWS - 1, fill.is_yellow());
                }
            }
            Direction::Down => {
                for column in &mut shifted {
                    *column = (*column << 1) & Self::ROW_MASK;
                    write_bit(column, 0, fill.is_yellow());
                }
            }
        }
        self.pending = shifted;
    }

    /// Stages the complement of the realized image.
    pub fn invert(&mut self) {
        for (pending, realized) in self.pending.iter_mut().zip(&self.realized) {
            *pending = !realized & Self::ROW_MASK;
        }
    }

    /// Number of dots whose pending state differs from the realized one.
    #[must_use]
    pub fn differences(&self) -> usize {
        self.pending
            .iter()
            .zip(&self.realized)
            .map(|(p, r)| (p ^ r).count_ones() as usize)
            .sum()
    }

    /// Whether a commit would change anything.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.pending != self.realized
    }

    /// Records that a dot now physically shows `state`.
    pub(crate) fn mark_realized(&mut self, col: usize, row: usize, state: DotState) {
        write_bit(&mut self.realized[col], row, state.is_yellow());
    }

    /// Records a forced sweep of the first `width` columns: both generations
    /// of those columns become `state`. Columns past `width` keep their content.
    pub(crate) fn mark_swept(&mut self, width: usize, state: DotState) {
        let fill = column_fill(state) & Self::ROW_MASK;
        let width = width.min(COLS);
        self.realized[..width].fill(fill);
        self.pending[..width].fill(fill);
    }
}

fn column_fill(state: DotState) -> u32 {
    if state.is_yellow() {
        u32::MAX
    } else {
        0
    }
}

fn read_bit(column: u32, row: usize) -> bool {
    (column >> row) & 1 == 1
}

fn write_bit(column: &mut u32, row: usize, bit: bool) {
    if bit {
        *column |= 1 << row;
    } else {
        *column &= !(1 << row);
    }
}

impl<const COLS: usize, const ROWS: usize> OriginDimensions for FrameBuffer<COLS, ROWS> {
    fn size(&self) -> Size {
        Size::new(COLS as u32, ROWS as u32)
    }
}

impl<const COLS: usize, const ROWS: usize> DrawTarget for FrameBuffer<COLS, ROWS> {
    type Color = BinaryColor;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.plot(pixel.0, pixel.1.into());
        }
        Ok(())
    }
}

impl<const COLS: usize, const ROWS: usize> core::fmt::Debug for FrameBuffer<COLS, ROWS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("cols", &COLS)
            .field("rows", &ROWS)
            .field("differences", &self.differences())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const COLS: usize, const ROWS: usize> defmt::Format for FrameBuffer<COLS, ROWS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameBuffer<{}, {}>", COLS, ROWS);
        defmt::write!(f, " differences: {}", self.differences());
    }
}
