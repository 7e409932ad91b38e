//! Framebuffer and minimal-actuation driver for multi-panel flip-dot displays.
//!
//! ## How Flip-Dot Displays Work
//!
//! A flip-dot matrix is made of small bistable discs, black on one side and
//! fluorescent yellow on the other. Each disc sits on a tiny electromagnet and
//! stays in whatever position it was last pushed to, without power. To flip a
//! dot you drive a short current pulse through its coil, and the direction of
//! that current decides which face ends up in front.
//!
//! ### Signal names
//! - **Column address (A0..A4)** – Five address lines into the column driver
//!   chip (an FP2800 on LAWO-style panels). Codes divisible by 8 are unused
//!   by the chip and must never be emitted.
//! - **E lines** – One enable line per panel. Raising it fires the coil
//!   current for the currently selected column of that panel only.
//! - **Row banks** – Port expanders with one output per row. One bank sinks
//!   the "yellow" current, the other the "black" current; an optional third
//!   bank drives rows 16..23 on taller matrices.
//! - **D** – Shared polarity line, high while flipping to black.
//!
//! ### Coincidence selection
//! 1. Select the row on the bank matching the target colour and set D.
//! 2. Put the column code on A0..A4.
//! 3. Raise the panel's E line for a few hundred microseconds, then drop it
//!    and wait for the coil to settle.
//! 4. Only the dot where the selected row and column cross is flipped.
//!
//! ### Implications for software
//! - Every flip is slow (hundreds of microseconds) and audible, so the driver
//!   must never pulse a dot that is already showing the wanted colour.
//! - The controller cannot read dot positions back. The only record of what
//!   the glass shows is the last state the software successfully pulsed, and
//!   at power-on that record is meaningless until every dot has been forced
//!   once.
//! - Long updates must hand control back to the rest of the firmware after
//!   each pulse.
//!
//! ## Crate Layout
//!
//! 1. [`framebuffer::FrameBuffer`] keeps two generations of the matrix:
//!    *realized* (what the glass shows) and *pending* (what was drawn since).
//! 2. [`address::AddressTranslator`] maps logical columns and rows onto column
//!    codes, enable lines and row banks, absorbing wiring quirks described by
//!    [`address::WiringConfig`].
//! 3. [`font::Font`] decodes the versioned glyph table format used for text.
//! 4. [`raster`] draws pixels, lines, circles, rectangles, icons and text into
//!    the pending generation.
//! 5. [`display::FlipDotDisplay`] owns the hardware, commits the difference
//!    between the two generations with the fewest possible pulses, and runs
//!    the maintenance routines.
//! 6. [`dump`] renders the realized buffer as an ASCII grid or as a hex
//!    table for diagnostics.
//!
//! The pending generation also implements `embedded-graphics`'
//! [`DrawTarget`](embedded_graphics::draw_target::DrawTarget) with
//! [`BinaryColor`], so anything from that ecosystem can be drawn on it.
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public data types and emits a few log
//! lines (initialization result, forced clears, repairs) through `defmt`.
//! No functional changes.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::Point;

pub mod address;
pub mod display;
pub mod driver;
pub mod dump;
pub mod font;
pub mod fonts;
pub mod framebuffer;
pub mod raster;

pub use address::{AddressTranslator, ConfigError, WiringConfig};
pub use display::FlipDotDisplay;
pub use font::Font;
pub use framebuffer::{Direction, FrameBuffer};

/// Face shown by a single dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DotState {
    /// Dark side in front
    #[default]
    Black = 0,
    /// Bright side in front
    Yellow = 1,
}

impl DotState {
    /// Returns `true` for [`DotState::Yellow`].
    #[must_use]
    pub const fn is_yellow(self) -> bool {
        matches!(self, DotState::Yellow)
    }

    /// Builds a state from a framebuffer bit.
    #[must_use]
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            DotState::Yellow
        } else {
            DotState::Black
        }
    }
}

impl From<bool> for DotState {
    fn from(bit: bool) -> Self {
        Self::from_bit(bit)
    }
}

impl From<DotState> for bool {
    fn from(state: DotState) -> Self {
        state.is_yellow()
    }
}

impl From<BinaryColor> for DotState {
    fn from(color: BinaryColor) -> Self {
        Self::from_bit(color.is_on())
    }
}

impl From<DotState> for BinaryColor {
    fn from(state: DotState) -> Self {
        if state.is_yellow() {
            BinaryColor::On
        } else {
            BinaryColor::Off
        }
    }
}

impl core::ops::Not for DotState {
    type Output = DotState;

    fn not(self) -> Self::Output {
        match self {
            DotState::Black => DotState::Yellow,
            DotState::Yellow => DotState::Black,
        }
    }
}

/// Multiplier applied to the base pulse durations.
///
/// [`FlipSpeed::Slow`] over-drives the coils and is used by the repair
/// routines to free dots that stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlipSpeed {
    /// Regular drawing speed
    #[default]
    Normal = 250,
    /// Twice the pulse length
    Slow = 500,
}

impl FlipSpeed {
    /// Factor the base durations are multiplied with.
    #[must_use]
    pub const fn factor(self) -> u32 {
        self as u32
    }
}

/// Computes the number of panels needed to cover `width` columns.
///
/// # Arguments
///
/// * `width` - Number of physical columns of the matrix
/// * `panel_width` - Number of columns of a full panel
///
/// # Returns
///
/// Number of panels, counting a trailing partial panel as a whole one
#[must_use]
pub const fn compute_panel_count(width: usize, panel_width: usize) -> usize {
    width.div_ceil(panel_width)
}

/// A coordinate outside the framebuffer was accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds(pub Point);

impl core::fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "coordinate ({}, {}) is outside the matrix", self.0.x, self.0.y)
    }
}

impl core::error::Error for OutOfBounds {}

#[cfg(feature = "defmt")]
impl defmt::Format for OutOfBounds {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "OutOfBounds({}, {})", self.0.x, self.0.y);
    }
}

/// Errors reported by [`FlipDotDisplay`].
///
/// `E` is the error type of the output pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// An output pin failed to change state
    Pin(E),
    /// A single-pixel operation addressed a point outside the matrix
    InvalidCoordinate(Point),
    /// The wiring configuration does not describe a drivable matrix
    InvalidConfig(ConfigError),
}

impl<E> From<OutOfBounds> for Error<E> {
    fn from(err: OutOfBounds) -> Self {
        Error::InvalidCoordinate(err.0)
    }
}

impl<E> From<ConfigError> for Error<E> {
    fn from(err: ConfigError) -> Self {
        Error::InvalidConfig(err)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Pin(err) => write!(f, "output pin error: {err:?}"),
            Error::InvalidCoordinate(p) => {
                write!(f, "coordinate ({}, {}) is outside the matrix", p.x, p.y)
            }
            Error::InvalidConfig(err) => write!(f, "invalid wiring configuration: {err}"),
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for Error<E> {}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Pin(_) => defmt::write!(f, "Pin"),
            Error::InvalidCoordinate(p) => defmt::write!(f, "InvalidCoordinate({}, {})", p.x, p.y),
            Error::InvalidConfig(err) => defmt::write!(f, "InvalidConfig({})", err),
        }
    }
}
