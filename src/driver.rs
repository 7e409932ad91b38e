//! Hardware the display drives.
//!
//! Column address, enable, polarity, reset and LED lines are plain
//! [`embedded_hal::digital::OutputPin`]s. The row banks are port expanders
//! (MCP23017 on LAWO controllers) whose driver lives outside this crate and
//! is reached through the [`LineDriver`] trait.

pub use embedded_hal::digital::PinState;

use crate::address::{Bank, RowSelect};

/// A bank of output lines behind a port expander.
pub trait LineDriver {
    /// Configures every line as a low output.
    ///
    /// Returns `false` if the device did not acknowledge.
    fn initialize(&mut self) -> bool;

    /// Drives every line to `state`.
    fn set_all_lines(&mut self, state: PinState);

    /// Drives line `index` to `state`.
    fn set_line(&mut self, index: u8, state: PinState);
}

/// Hook called after every pulse so that a cooperative scheduler (watchdog
/// feeding, network polling) keeps running during long commits.
pub trait Yield {
    /// Hands control to the scheduler and returns when it is done.
    fn yield_now(&mut self);
}

/// [`Yield`] for firmware without a cooperative scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoYield;

impl Yield for NoYield {
    fn yield_now(&mut self) {}
}

/// [`Yield`] backed by a closure.
#[derive(Debug, Clone, Copy)]
pub struct FnYield<F>(pub F);

impl<F: FnMut()> Yield for FnYield<F> {
    fn yield_now(&mut self) {
        (self.0)();
    }
}

/// Base pulse durations, multiplied by the [`FlipSpeed`](crate::FlipSpeed)
/// factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Enable line high time, in microseconds per speed unit
    pub flip_duration_us: u32,
    /// Pause after the enable line drops, in microseconds per speed unit
    pub pause_duration_us: u32,
    /// Wait between the passes of a forced clear and between repair
    /// half-cycles, in milliseconds
    pub settle_ms: u32,
    /// Full black/yellow cycles run by a repair
    pub repair_cycles: u8,
    /// Reset line low time, in milliseconds
    pub reset_pulse_ms: u32,
    /// Wait after releasing reset, in milliseconds
    pub reset_recovery_ms: u32,
}

impl Timing {
    /// Timing of LAWO panels.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flip_duration_us: 2,
            pause_duration_us: 1,
            settle_ms: 200,
            repair_cycles: 20,
            reset_pulse_ms: 2,
            reset_recovery_ms: 25,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

/// Output pins wired to the panels.
///
/// # Type Parameters
/// - `P`: Output pin type
/// - `ENABLE`: Number of enable lines, one per panel
#[derive(Debug)]
pub struct Pins<P, const ENABLE: usize> {
    /// Column address lines A0..A4
    pub column: [P; 5],
    /// Enable line of each panel
    pub enable: [P; ENABLE],
    /// Shared polarity line
    pub polarity: P,
    /// Optional reset line of the port expanders, active low
    pub reset: Option<P>,
    /// Optional status LED, active low
    pub led: Option<P>,
}

/// Port expanders driving the rows.
#[derive(Debug)]
pub struct RowBanks<B> {
    /// Bank sinking the yellow current for rows 0..16
    pub yellow: B,
    /// Bank sinking the black current for rows 0..16
    pub black: B,
    /// Optional bank for rows 16..24
    pub extended: Option<B>,
}

impl<B: LineDriver> RowBanks<B> {
    /// Initializes every bank; all of them must acknowledge.
    pub fn initialize(&mut self) -> bool {
        let yellow = self.yellow.initialize();
        let black = self.black.initialize();
        let extended = self
            .extended
            .as_mut()
            .is_none_or(|bank| bank.initialize());
        yellow && black && extended
    }

    /// Drives every line of every bank to `state`.
    pub fn set_all_lines(&mut self, state: PinState) {
        self.yellow.set_all_lines(state);
        self.black.set_all_lines(state);
        if let Some(extended) = self.extended.as_mut() {
            extended.set_all_lines(state);
        }
    }

    /// Releases every row and raises the one in `select`.
    pub fn select(&mut self, select: RowSelect) {
        self.set_all_lines(PinState::Low);
        let bank = match select.bank {
            Bank::Yellow => Some(&mut self.yellow),
            Bank::Black => Some(&mut self.black),
            Bank::Extended => self.extended.as_mut(),
        };
        if let Some(bank) = bank {
            bank.set_line(select.line, PinState::High);
        }
    }
}
