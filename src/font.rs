//! Decoder for the width-prefixed glyph tables used to render text.
//!
//! A table is a plain byte slice, usually a `static` in flash. It may start
//! with a small header:
//!
//! ```text
//! byte 0        'F' (0x46) indicator, absent => version 0 defaults
//! byte 1        version
//!   version 1   u8 first code, u8 last code, u8 height, data at byte 5
//!   version 2   u16 BE first code, u16 BE last code, u8 height, data at byte 7
//! ```
//!
//! The header is followed by one record per character code from the first
//! to the last code: a width byte `W` and `W` column bytes, bit 0 being the
//! top row. Records are variable length, so finding a glyph means walking
//! every record before it.
//!
//! # Example
//! ```rust
//! use flipdot_framebuffer::font::Font;
//!
//! const TABLE: &[u8] = &[b'F', 1, b'A', b'B', 8, 2, 0x7E, 0x11, 1, 0x7F];
//!
//! let font = Font::new(TABLE);
//! assert_eq!(font.info().first_code, u16::from(b'A'));
//! assert_eq!(font.glyph(u16::from(b'A')), &[0x7E, 0x11]);
//! assert_eq!(font.glyph(u16::from(b'B')), &[0x7F]);
//! assert!(font.glyph(u16::from(b'C')).is_empty());
//! ```

use crate::fonts::DEFAULT_FONT;

/// First byte of a glyph table that carries a header.
pub const FONT_FILE_INDICATOR: u8 = b'F';

/// Offset added to a character code to find the upper half of a double
/// height glyph.
pub const DOUBLE_HEIGHT_OFFSET: u16 = 128;

/// Properties decoded from a glyph table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FontInfo {
    /// Table format version (0, 1 or 2)
    pub version: u8,
    /// Glyph height in pixels
    pub height: u8,
    /// Width of the widest glyph
    pub width_max: u8,
    /// First character code present in the table
    pub first_code: u16,
    /// Last character code present in the table
    pub last_code: u16,
    /// Offset of the first glyph record
    pub data_offset: usize,
}

impl FontInfo {
    /// Defaults of a version 0 table: codes 0..=255, 8 pixels high, records
    /// starting at the first byte.
    #[must_use]
    pub const fn version0() -> Self {
        Self {
            version: 0,
            height: 8,
            width_max: 0,
            first_code: 0,
            last_code: 255,
            data_offset: 0,
        }
    }
}

impl Default for FontInfo {
    fn default() -> Self {
        Self::version0()
    }
}

/// Decodes the header of `table`.
///
/// `width_max` is left at zero, see [`measure_max_width`]. A header that is
/// cut short leaves no usable records.
#[must_use]
pub fn decode_header(table: &[u8]) -> FontInfo {
    if table.first() != Some(&FONT_FILE_INDICATOR) {
        return FontInfo::version0();
    }
    read_header(table).unwrap_or(FontInfo {
        data_offset: table.len(),
        ..FontInfo::version0()
    })
}

fn read_header(table: &[u8]) -> Option<FontInfo> {
    let mut info = FontInfo::version0();
    let version = *table.get(1)?;
    info.version = version;
    info.data_offset = match version {
        1 => {
            let header = table.get(2..5)?;
            info.first_code = u16::from(header[0]);
            info.last_code = u16::from(header[1]);
            info.height = header[2];
            5
        }
        2 => {
            let header = table.get(2..7)?;
            info.first_code = u16::from_be_bytes([header[0], header[1]]);
            info.last_code = u16::from_be_bytes([header[2], header[3]]);
            info.height = header[4];
            7
        }
        // version 0 and unknown versions keep the defaults
        _ => 2,
    };
    Some(info)
}

/// Scans every record once and returns the widest glyph.
#[must_use]
pub fn measure_max_width(table: &[u8], info: &FontInfo) -> u8 {
    let mut max = 0;
    let mut offset = info.data_offset;
    for _ in info.first_code..=info.last_code {
        let Some(&width) = table.get(offset) else {
            break;
        };
        max = max.max(width);
        offset += usize::from(width) + 1;
    }
    max
}

/// A glyph table together with its decoded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Font<'a> {
    data: &'a [u8],
    info: FontInfo,
}

impl Default for Font<'static> {
    fn default() -> Self {
        Self::new(DEFAULT_FONT)
    }
}

impl<'a> Font<'a> {
    /// Decodes the header of `data` and measures its widest glyph.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        let mut info = decode_header(data);
        info.width_max = measure_max_width(data, &info);
        Self { data, info }
    }

    /// Decoded header.
    #[must_use]
    pub fn info(&self) -> &FontInfo {
        &self.info
    }

    /// Raw table.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Glyph height in pixels.
    #[must_use]
    pub fn height(&self) -> u8 {
        self.info.height
    }

    /// Fonts taller than 8 pixels are stored as two 8 pixel planes, the upper
    /// one at `code + 128`.
    #[must_use]
    pub fn is_double_height(&self) -> bool {
        self.info.height > 8
    }

    /// Offset of the record for `code`, or `None` when the code is outside
    /// the table or the table ends early.
    ///
    /// This walks every record from the first code, the table has no index.
    #[must_use]
    pub fn locate_glyph(&self, code: u16) -> Option<usize> {
        if code < self.info.first_code || code > self.info.last_code {
            return None;
        }
        let mut offset = self.info.data_offset;
        for _ in self.info.first_code..code {
            offset += usize::from(*self.data.get(offset)?) + 1;
        }
        self.data.get(offset).map(|_| offset)
    }

    /// Column bytes of `code`, empty when the code is not in the table.
    #[must_use]
    pub fn glyph(&self, code: u16) -> &'a [u8] {
        let Some(offset) = self.locate_glyph(code) else {
            return &[];
        };
        let start = offset + 1;
        let end = (start + usize::from(self.data[offset])).min(self.data.len());
        &self.data[start..end]
    }

    /// Copies the columns of `code` into `buf` and returns how many were
    /// copied.
    ///
    /// An unknown code is a blank glyph: `buf` is zeroed and 0 is returned.
    pub fn read_glyph(&self, code: u16, buf: &mut [u8]) -> usize {
        let glyph = self.glyph(code);
        if glyph.is_empty() {
            buf.fill(0);
            return 0;
        }
        let len = glyph.len().min(buf.len());
        buf[..len].copy_from_slice(&glyph[..len]);
        len
    }

    /// Width of `code` in columns.
    #[must_use]
    pub fn char_width(&self, code: u16) -> u8 {
        self.glyph(code).len() as u8
    }

    /// Total advance of `text` with `spacing` blank columns after every
    /// character, trailing spacing included.
    #[must_use]
    pub fn text_width(&self, text: &str, spacing: u8) -> u32 {
        text.chars()
            .map(|ch| u32::from(self.char_width(char_code(ch))) + u32::from(spacing))
            .sum()
    }

    /// Column at which `text` starts when centered in `width` columns.
    #[must_use]
    pub fn center_position(&self, text: &str, width: u32, spacing: u8) -> u32 {
        (width / 2).saturating_sub(self.text_width(text, spacing) / 2)
    }
}

/// Character code used to look `ch` up in a glyph table.
///
/// Characters outside the 16 bit code space map to a code no table can
/// hold, so they render blank.
#[must_use]
pub fn char_code(ch: char) -> u16 {
    u16::try_from(u32::from(ch)).unwrap_or(u16::MAX)
}
