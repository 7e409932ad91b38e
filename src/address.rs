//! Logical to physical address translation.
//!
//! The matrix is a chain of panels that is wired "backwards": the column
//! nearest the controller is the last logical column. Inside a panel the
//! column driver takes a 5 bit code, but never uses codes divisible by 8, so
//! every group of 7 addresses skips one code. Individual installations add
//! their own quirks (panels mounted in a different order, a half-width panel
//! at the end, rows or columns mirrored); all of those are described by a
//! [`WiringConfig`] and applied by the [`AddressTranslator`].
//!
//! # Example
//! ```rust
//! use flipdot_framebuffer::address::{AddressTranslator, Bank, WiringConfig};
//! use flipdot_framebuffer::DotState;
//!
//! let translator = AddressTranslator::new(WiringConfig::<4>::new(28, 16)).unwrap();
//!
//! // column 111 is the first column of the chain
//! let column = translator.translate_column(111).unwrap();
//! assert_eq!(column.panel, 0);
//! assert_eq!(column.code.code(), 1);
//!
//! let row = translator.translate_row(3, DotState::Yellow).unwrap();
//! assert_eq!(row.bank, Bank::Yellow);
//! assert_eq!(row.line, 3);
//! ```

use bitfield::bitfield;

use crate::DotState;

/// Column width of a standard panel.
pub const DEFAULT_PANEL_WIDTH: u8 = 28;

/// Addresses per group before the column driver skips a code.
pub const DEFAULT_SKIP_INTERVAL: u8 = 7;

/// Rows served by the yellow and black banks.
pub const PRIMARY_BANK_ROWS: u8 = 16;

/// Rows served by the extended bank, per polarity.
pub const EXTENDED_BANK_ROWS: u8 = 8;

/// Highest code the five column address lines can carry.
pub const MAX_COLUMN_CODE: u8 = 0b1_1111;

bitfield! {
    /// 5-bit code presented on the column address lines.
    ///
    /// The bit layout is as follows:
    /// - Bit 4: A4, inverted for columns behind a half panel
    /// - Bits 3-0: A3..A0
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct ColumnCode(u8);
    impl Debug;
    pub a4, set_a4: 4;
    pub a3, set_a3: 3;
    pub a2, set_a2: 2;
    pub a1, set_a1: 1;
    pub a0, set_a0: 0;
    pub code, set_code: 4, 0;
}

impl ColumnCode {
    /// Code with the given value, truncated to 5 bits.
    #[must_use]
    pub const fn new(code: u8) -> Self {
        Self(code & MAX_COLUMN_CODE)
    }

    /// Levels of A0..A4, in that order.
    #[must_use]
    pub fn lines(&self) -> [bool; 5] {
        [self.a0(), self.a1(), self.a2(), self.a3(), self.a4()]
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ColumnCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ColumnCode({=u8:#04x})", self.0);
    }
}

/// Applies the column driver's code skip to an in-panel address.
///
/// With the usual interval of 7, address 0 becomes code 1, 6 becomes 7 and 7
/// becomes 9: no code is ever a multiple of 8.
///
/// Returns `None` for a zero interval or a code that does not fit in a `u8`.
#[must_use]
pub const fn skip_corrected(address: u8, skip_interval: u8) -> Option<u8> {
    if skip_interval == 0 {
        return None;
    }
    match address.checked_add(address / skip_interval) {
        Some(code) => code.checked_add(1),
        None => None,
    }
}

/// Reasons a [`WiringConfig`] cannot drive a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// No panels, or panels with zero columns
    EmptyPanel,
    /// Skip interval of zero
    ZeroSkipInterval,
    /// The last column of a panel needs more than 5 address bits
    ColumnCodeOverflow,
    /// The physical width is zero or larger than the panels can hold
    WidthOutOfRange,
    /// More rows than the configured banks can serve
    TooManyRows,
    /// The framebuffer is smaller than the wiring describes
    BufferMismatch,
    /// A panel refers to an enable line that does not exist
    EnableLineOutOfRange,
    /// The extended row bank is enabled but was not supplied
    MissingExtendedBank,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ConfigError::EmptyPanel => "no panels or zero panel width",
            ConfigError::ZeroSkipInterval => "skip interval must not be zero",
            ConfigError::ColumnCodeOverflow => "panel too wide for a 5 bit column code",
            ConfigError::WidthOutOfRange => "physical width does not fit the panels",
            ConfigError::TooManyRows => "more rows than the row banks can serve",
            ConfigError::BufferMismatch => "framebuffer does not match the wiring",
            ConfigError::EnableLineOutOfRange => "panel order refers to a missing enable line",
            ConfigError::MissingExtendedBank => "extended row bank enabled but not supplied",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for ConfigError {}

/// Fixed description of how a matrix is wired.
///
/// # Type Parameters
///
/// * `PANELS` - Number of panels in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WiringConfig<const PANELS: usize> {
    /// Columns of a full panel
    pub panel_width: u8,
    /// Columns that physically exist, at most `panel_width * PANELS`
    pub physical_width: u16,
    /// Rows of the matrix
    pub height: u8,
    /// Addresses per group before the column driver skips a code
    pub skip_interval: u8,
    /// Mirror the column order inside every panel
    pub swap_column_order: bool,
    /// Mirror the row order
    pub swap_row_order: bool,
    /// Drive rows 16.. through the extended bank
    pub use_extended_row_bank: bool,
    /// Enable line of each panel, indexed by chain position counted from
    /// the controller end
    pub panel_order: [u8; PANELS],
    /// Panels, by logical index, that sit behind a half-width panel and need
    /// A4 inverted
    pub half_panel_offset: [bool; PANELS],
}

impl<const PANELS: usize> WiringConfig<PANELS> {
    /// Straight wiring: `PANELS` full panels, enable lines in chain order,
    /// no mirroring, no half panels.
    #[must_use]
    pub const fn new(panel_width: u8, height: u8) -> Self {
        let mut panel_order = [0u8; PANELS];
        let mut i = 0;
        while i < PANELS {
            panel_order[i] = i as u8;
            i += 1;
        }
        Self {
            panel_width,
            physical_width: panel_width as u16 * PANELS as u16,
            height,
            skip_interval: DEFAULT_SKIP_INTERVAL,
            swap_column_order: false,
            swap_row_order: false,
            use_extended_row_bank: false,
            panel_order,
            half_panel_offset: [false; PANELS],
        }
    }

    /// Sets the enable line of every chain position.
    #[must_use]
    pub const fn with_panel_order(mut self, panel_order: [u8; PANELS]) -> Self {
        self.panel_order = panel_order;
        self
    }

    /// Flags a logical panel as sitting behind a half-width panel.
    ///
    /// Panel indices at or beyond `PANELS` are ignored.
    #[must_use]
    pub const fn with_half_panel_offset(mut self, panel: usize, offset: bool) -> Self {
        if panel < PANELS {
            self.half_panel_offset[panel] = offset;
        }
        self
    }

    /// Limits the number of physically present columns.
    #[must_use]
    pub const fn with_physical_width(mut self, width: u16) -> Self {
        self.physical_width = width;
        self
    }

    /// Changes the column driver's skip interval.
    #[must_use]
    pub const fn with_skip_interval(mut self, skip_interval: u8) -> Self {
        self.skip_interval = skip_interval;
        self
    }

    /// Mirrors the columns inside each panel.
    #[must_use]
    pub const fn with_swapped_columns(mut self, swap: bool) -> Self {
        self.swap_column_order = swap;
        self
    }

    /// Mirrors the rows.
    #[must_use]
    pub const fn with_swapped_rows(mut self, swap: bool) -> Self {
        self.swap_row_order = swap;
        self
    }

    /// Drives rows beyond the primary banks through the extended bank.
    #[must_use]
    pub const fn with_extended_row_bank(mut self, enabled: bool) -> Self {
        self.use_extended_row_bank = enabled;
        self
    }

    /// Number of rows the configured banks can serve.
    #[must_use]
    pub const fn max_rows(&self) -> u8 {
        if self.use_extended_row_bank {
            PRIMARY_BANK_ROWS + EXTENDED_BANK_ROWS
        } else {
            PRIMARY_BANK_ROWS
        }
    }

    /// Checks that every column and row can be addressed.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if PANELS == 0 || self.panel_width == 0 {
            return Err(ConfigError::EmptyPanel);
        }
        if self.skip_interval == 0 {
            return Err(ConfigError::ZeroSkipInterval);
        }
        let last = u16::from(self.panel_width - 1);
        let skip = u16::from(self.skip_interval);
        if last + last / skip + 1 > u16::from(MAX_COLUMN_CODE) {
            return Err(ConfigError::ColumnCodeOverflow);
        }
        let capacity = usize::from(self.panel_width) * PANELS;
        if self.physical_width == 0 || usize::from(self.physical_width) > capacity {
            return Err(ConfigError::WidthOutOfRange);
        }
        if self.height == 0 || self.height > self.max_rows() {
            return Err(ConfigError::TooManyRows);
        }
        Ok(())
    }
}

impl WiringConfig<4> {
    /// 112 x 16 matrix of four 28 column LAWO panels, enable lines wired in
    /// the order 1, 2, 3, 0 from the left.
    #[must_use]
    pub const fn lawo_112x16() -> Self {
        // chain positions count from the right end
        Self::new(DEFAULT_PANEL_WIDTH, PRIMARY_BANK_ROWS).with_panel_order([0, 3, 2, 1])
    }
}

/// Row bank driven for a flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bank {
    /// Primary bank sinking the yellow current
    Yellow,
    /// Primary bank sinking the black current
    Black,
    /// Extended bank, lines 0..8 black and 8..16 yellow
    Extended,
}

/// Physical selection of a row for one flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RowSelect {
    /// Bank that receives the select
    pub bank: Bank,
    /// Output of that bank
    pub line: u8,
    /// Level of the shared polarity line, high when flipping to black
    pub polarity_high: bool,
}

/// Physical selection of a column for one flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhysicalColumn {
    /// Chain position of the panel, counted from the controller end
    pub panel: u8,
    /// Enable line that fires the panel
    pub enable_line: u8,
    /// Code for the column address lines
    pub code: ColumnCode,
    /// Whether A4 was inverted for a half-panel offset
    pub half_panel: bool,
}

/// Translates logical coordinates with a fixed [`WiringConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressTranslator<const PANELS: usize> {
    config: WiringConfig<PANELS>,
}

impl<const PANELS: usize> AddressTranslator<PANELS> {
    /// Validates `config` and takes ownership of it.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`WiringConfig::validate`].
    pub fn new(config: WiringConfig<PANELS>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Wiring in use.
    #[must_use]
    pub fn config(&self) -> &WiringConfig<PANELS> {
        &self.config
    }

    /// Maps a logical column to its panel and column code.
    ///
    /// Returns `None` for columns that only exist in the virtual canvas.
    #[must_use]
    pub fn translate_column(&self, col: u16) -> Option<PhysicalColumn> {
        let cfg = &self.config;
        if col >= cfg.physical_width {
            return None;
        }
        let width = u16::from(cfg.panel_width);
        let half_panel = cfg.half_panel_offset[usize::from(col / width)];

        let col = if cfg.swap_column_order {
            // a partial last panel mirrors within the columns it has
            let first = col - col % width;
            let present = width.min(cfg.physical_width - first);
            first + (present - 1 - col % width)
        } else {
            col
        };

        // the chain starts at the far end of the matrix
        let reversed = cfg.physical_width - col - 1;
        let panel = (reversed / width) as u8;
        let address = (reversed % width) as u8;

        let mut code = ColumnCode::new(skip_corrected(address, cfg.skip_interval)?);
        if half_panel {
            code.set_a4(!code.a4());
        }

        Some(PhysicalColumn {
            panel,
            enable_line: cfg.panel_order[usize::from(panel)],
            code,
            half_panel,
        })
    }

    /// Maps a logical row and target state to a bank output.
    ///
    /// Returns `None` for rows the banks cannot reach.
    #[must_use]
    pub fn translate_row(&self, row: u8, state: DotState) -> Option<RowSelect> {
        let cfg = &self.config;
        if row >= cfg.height {
            return None;
        }
        let row = if cfg.swap_row_order {
            cfg.height - row - 1
        } else {
            row
        };
        let yellow = state.is_yellow();
        let (bank, line) = if row < PRIMARY_BANK_ROWS {
            (if yellow { Bank::Yellow } else { Bank::Black }, row)
        } else if cfg.use_extended_row_bank && row < PRIMARY_BANK_ROWS + EXTENDED_BANK_ROWS {
            let line = row - PRIMARY_BANK_ROWS;
            (Bank::Extended, if yellow { line + EXTENDED_BANK_ROWS } else { line })
        } else {
            return None;
        };
        Some(RowSelect {
            bank,
            line,
            polarity_high: !yellow,
        })
    }
}
