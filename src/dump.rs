//! Text renderings of the realized generation for logs and golden tests.
//!
//! Both renderers borrow the framebuffer and format lazily, so they can be
//! written to any [`core::fmt::Write`] sink without allocating.
//!
//! ```rust,ignore
//! let grid = AsciiGrid::new(display.framebuffer());
//! println!("{grid}");
//! ```

use core::fmt;

use crate::framebuffer::FrameBuffer;

/// Columns per line of a [`HexDump`].
pub const HEX_COLUMNS_PER_LINE: usize = 7;

/// Character of a yellow dot in an [`AsciiGrid`].
pub const YELLOW_CELL: char = '@';

/// Character of a black dot in an [`AsciiGrid`].
pub const BLACK_CELL: char = '.';

/// One row per line, prefixed by its two-digit index.
///
/// Every line starts with a line break and the output ends with one:
///
/// ```text
///
///  0 @..@
///  1 .@@.
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AsciiGrid<'a, const COLS: usize, const ROWS: usize> {
    fb: &'a FrameBuffer<COLS, ROWS>,
}

impl<'a, const COLS: usize, const ROWS: usize> AsciiGrid<'a, COLS, ROWS> {
    /// Renders the realized generation of `fb`.
    #[must_use]
    pub fn new(fb: &'a FrameBuffer<COLS, ROWS>) -> Self {
        Self { fb }
    }

    /// Iterates over the rows without the surrounding line breaks.
    pub fn lines(&self) -> impl Iterator<Item = GridLine<'a, COLS, ROWS>> + 'a {
        let fb = self.fb;
        (0..ROWS).map(move |row| GridLine { fb, row })
    }
}

impl<const COLS: usize, const ROWS: usize> fmt::Display for AsciiGrid<'_, COLS, ROWS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f)?;
            write!(f, "{line}")?;
        }
        writeln!(f)
    }
}

/// A single row of an [`AsciiGrid`].
#[derive(Debug, Clone, Copy)]
pub struct GridLine<'a, const COLS: usize, const ROWS: usize> {
    fb: &'a FrameBuffer<COLS, ROWS>,
    row: usize,
}

impl<const COLS: usize, const ROWS: usize> fmt::Display for GridLine<'_, COLS, ROWS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:2} ", self.row)?;
        if let Some(cells) = self.fb.realized_row(self.row) {
            for state in cells {
                let cell = if state.is_yellow() {
                    YELLOW_CELL
                } else {
                    BLACK_CELL
                };
                fmt::Write::write_char(f, cell)?;
            }
        }
        Ok(())
    }
}

/// Column bitmasks as comma separated hex literals, ready to paste into an
/// icon table.
///
/// A line break precedes every seventh column, starting with the first, and
/// the output ends with one.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a, const COLS: usize, const ROWS: usize> {
    fb: &'a FrameBuffer<COLS, ROWS>,
}

impl<'a, const COLS: usize, const ROWS: usize> HexDump<'a, COLS, ROWS> {
    /// Renders the realized generation of `fb`.
    #[must_use]
    pub fn new(fb: &'a FrameBuffer<COLS, ROWS>) -> Self {
        Self { fb }
    }
}

impl<const COLS: usize, const ROWS: usize> fmt::Display for HexDump<'_, COLS, ROWS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for col in 0..COLS {
            if col % HEX_COLUMNS_PER_LINE == 0 {
                writeln!(f)?;
            }
            let value = self.fb.realized_column(col).unwrap_or(0);
            write!(f, "0x{value:x}")?;
            if col + 1 < COLS {
                f.write_str(", ")?;
            }
        }
        writeln!(f)
    }
}
