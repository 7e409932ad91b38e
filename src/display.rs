//! The display: owns the hardware and turns staged drawing into pulses.
//!
//! [`FlipDotDisplay`] wraps a [`FrameBuffer`] and everything needed to drive
//! the panels. Drawing calls only stage dots; [`FlipDotDisplay::commit`]
//! pulses exactly the dots whose staged state differs from what the glass
//! shows.
//!
//! # Example
//! ```rust,ignore
//! let config = WiringConfig::lawo_112x16();
//! let mut display: FlipDotDisplay<'_, _, _, _, _, 112, 16, 4, 4> =
//!     FlipDotDisplay::new(pins, banks, delay, NoYield, config)?;
//! if display.init()? {
//!     display.clear(true)?;
//!     display.print(Point::new(2, 4), "HELLO", DotState::Yellow);
//!     display.commit()?;
//! }
//! ```
//!
//! If the row banks fail to initialize the display becomes inert: drawing
//! and committing return `Ok` without touching the hardware or the buffer.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Point, Size};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::address::{AddressTranslator, ColumnCode, ConfigError, RowSelect, WiringConfig};
use crate::driver::{LineDriver, PinState, Pins, RowBanks, Timing, Yield};
use crate::font::Font;
use crate::framebuffer::{Direction, FrameBuffer};
use crate::raster::{self, Icon};
use crate::{DotState, Error, FlipSpeed};

/// Character spacing used until [`FlipDotDisplay::set_char_spacing`] is
/// called.
pub const DEFAULT_CHAR_SPACING: u8 = 1;

/// A flip-dot matrix together with the hardware that drives it.
///
/// # Type Parameters
/// - `P`: Output pin type for column, enable, polarity, reset and LED lines
/// - `B`: Row bank driver
/// - `D`: Delay provider
/// - `Y`: Hook run after every pulse
/// - `COLS`: Columns of the canvas, at least the physical width
/// - `ROWS`: Rows of the matrix
/// - `PANELS`: Panels in the chain
/// - `ENABLE`: Enable lines wired to the controller
pub struct FlipDotDisplay<
    'a,
    P,
    B,
    D,
    Y,
    const COLS: usize,
    const ROWS: usize,
    const PANELS: usize,
    const ENABLE: usize,
> {
    framebuffer: FrameBuffer<COLS, ROWS>,
    translator: AddressTranslator<PANELS>,
    pins: Pins<P, ENABLE>,
    banks: RowBanks<B>,
    delay: D,
    yielder: Y,
    timing: Timing,
    speed: FlipSpeed,
    char_spacing: u8,
    font: Font<'a>,
    init_ok: bool,
}

impl<
        'a,
        P,
        B,
        D,
        Y,
        const COLS: usize,
        const ROWS: usize,
        const PANELS: usize,
        const ENABLE: usize,
    > FlipDotDisplay<'a, P, B, D, Y, COLS, ROWS, PANELS, ENABLE>
where
    P: OutputPin,
    B: LineDriver,
    D: DelayNs,
    Y: Yield,
{
    /// Creates a display; nothing is driven until [`init`](Self::init).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` is invalid, does not match
    /// the `COLS` x `ROWS` canvas, names an enable line beyond `ENABLE`, or
    /// enables the extended row bank without supplying it.
    pub fn new(
        pins: Pins<P, ENABLE>,
        banks: RowBanks<B>,
        delay: D,
        yielder: Y,
        config: WiringConfig<PANELS>,
    ) -> Result<Self, Error<P::Error>> {
        let translator = AddressTranslator::new(config)?;
        if usize::from(config.height) != ROWS || usize::from(config.physical_width) > COLS {
            return Err(ConfigError::BufferMismatch.into());
        }
        if config
            .panel_order
            .iter()
            .any(|&line| usize::from(line) >= ENABLE)
        {
            return Err(ConfigError::EnableLineOutOfRange.into());
        }
        if config.use_extended_row_bank && banks.extended.is_none() {
            return Err(ConfigError::MissingExtendedBank.into());
        }

        Ok(Self {
            framebuffer: FrameBuffer::new(),
            translator,
            pins,
            banks,
            delay,
            yielder,
            timing: Timing::new(),
            speed: FlipSpeed::Normal,
            char_spacing: DEFAULT_CHAR_SPACING,
            font: Font::default(),
            init_ok: false,
        })
    }

    /// Turns the LED off, strobes the reset line and initializes the row
    /// banks.
    ///
    /// Returns whether every bank acknowledged. On `false` the display stays
    /// inert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if the LED or reset line fails.
    pub fn init(&mut self) -> Result<bool, Error<P::Error>> {
        self.set_led(false)?;
        if let Some(reset) = self.pins.reset.as_mut() {
            reset.set_low().map_err(Error::Pin)?;
            self.delay.delay_ms(self.timing.reset_pulse_ms);
            reset.set_high().map_err(Error::Pin)?;
            self.delay.delay_ms(self.timing.reset_recovery_ms);
        }

        self.init_ok = self.banks.initialize();

        #[cfg(feature = "defmt")]
        {
            if self.init_ok {
                defmt::info!("FlipDotDisplay::init: {}x{} ready", COLS, ROWS);
            } else {
                defmt::warn!("FlipDotDisplay::init: row banks did not acknowledge");
            }
        }

        Ok(self.init_ok)
    }

    /// Whether [`init`](Self::init) succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.init_ok
    }

    /// Switches the status LED, if one is wired. The LED is active low.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if the LED line fails.
    pub fn set_led(&mut self, on: bool) -> Result<(), Error<P::Error>> {
        if let Some(led) = self.pins.led.as_mut() {
            led.set_state(PinState::from(!on)).map_err(Error::Pin)?;
        }
        Ok(())
    }

    /// Pulses every dot whose pending state differs from the realized one.
    ///
    /// Columns beyond the physical width are realized without pulses. The
    /// selects are released afterwards, but only if something was pulsed.
    ///
    /// Returns the number of pulses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if an output line fails. Dots pulsed before the
    /// failure stay realized; the rest stay pending.
    pub fn commit(&mut self) -> Result<usize, Error<P::Error>> {
        if !self.init_ok {
            return Ok(0);
        }

        let mut pulses = 0;
        for col in 0..COLS {
            let (Some(pending), Some(realized)) = (
                self.framebuffer.pending_column(col),
                self.framebuffer.realized_column(col),
            ) else {
                continue;
            };
            let changed = pending ^ realized;
            if changed == 0 {
                continue;
            }

            let column = u16::try_from(col)
                .ok()
                .and_then(|col| self.translator.translate_column(col));
            for row in 0..ROWS {
                if (changed >> row) & 1 == 0 {
                    continue;
                }
                let state = DotState::from_bit((pending >> row) & 1 == 1);
                let select = self.translator.translate_row(row as u8, state);
                if let (Some(column), Some(select)) = (column, select) {
                    self.select_row(select)?;
                    self.select_column(column.code)?;
                    self.fire(column.enable_line)?;
                    pulses += 1;
                }
                self.framebuffer.mark_realized(col, row, state);
            }
        }

        if pulses > 0 {
            self.deselect()?;
        }
        Ok(pulses)
    }

    /// Forces every physical dot to black, ignoring the buffer.
    ///
    /// With `with_yellow` every dot is first forced to yellow and left to
    /// settle. Afterwards both generations of the physical columns are black;
    /// virtual columns past the physical width keep their content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if an output line fails.
    pub fn clear(&mut self, with_yellow: bool) -> Result<(), Error<P::Error>> {
        if !self.init_ok {
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        defmt::info!("FlipDotDisplay::clear: with_yellow={}", with_yellow);

        let width = usize::from(self.translator.config().physical_width);
        if with_yellow {
            self.sweep(DotState::Yellow)?;
            self.framebuffer.mark_swept(width, DotState::Yellow);
            self.delay.delay_ms(self.timing.settle_ms);
        }
        self.sweep(DotState::Black)?;
        self.deselect()?;
        self.framebuffer.mark_swept(width, DotState::Black);
        Ok(())
    }

    /// Clears the glass and redraws what it showed before.
    ///
    /// Returns the number of pulses of the redraw.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if an output line fails.
    pub fn refresh_all(&mut self) -> Result<usize, Error<P::Error>> {
        if !self.init_ok {
            return Ok(0);
        }
        let image = self.framebuffer.snapshot();
        self.clear(true)?;
        self.framebuffer.restore_pending(&image);
        self.commit()
    }

    /// Flips a stuck dot back and forth at slow speed, then restores it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] if `p` is outside the canvas, or
    /// [`Error::Pin`] if an output line fails.
    pub fn repair_pixel(&mut self, p: Point) -> Result<(), Error<P::Error>> {
        if !self.init_ok {
            return Ok(());
        }
        let remembered = self.framebuffer.realized(p)?;

        #[cfg(feature = "defmt")]
        defmt::info!("FlipDotDisplay::repair_pixel: ({}, {})", p.x, p.y);

        self.exercise(|fb, state| fb.plot(p, state))?;
        self.framebuffer.plot(p, remembered);
        self.commit()?;
        Ok(())
    }

    /// Flips a whole column back and forth at slow speed, then restores it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] if `col` is outside the canvas, or
    /// [`Error::Pin`] if an output line fails.
    pub fn repair_column(&mut self, col: usize) -> Result<(), Error<P::Error>> {
        if !self.init_ok {
            return Ok(());
        }
        let x = i32::try_from(col).unwrap_or(i32::MAX);
        let remembered = self
            .framebuffer
            .realized_column(col)
            .ok_or(Error::InvalidCoordinate(Point::new(x, 0)))?;

        #[cfg(feature = "defmt")]
        defmt::info!("FlipDotDisplay::repair_column: {}", col);

        self.exercise(|fb, state| {
            for row in 0..ROWS {
                fb.plot(Point::new(x, row as i32), state);
            }
        })?;
        for row in 0..ROWS {
            let state = DotState::from_bit((remembered >> row) & 1 == 1);
            self.framebuffer.plot(Point::new(x, row as i32), state);
        }
        self.commit()?;
        Ok(())
    }

    // the previous speed is restored even when a pin fails
    fn exercise<F>(&mut self, stage: F) -> Result<(), Error<P::Error>>
    where
        F: Fn(&mut FrameBuffer<COLS, ROWS>, DotState),
    {
        let speed = self.speed;
        self.speed = FlipSpeed::Slow;
        let result = self.cycle(&stage);
        self.speed = speed;
        result
    }

    fn cycle<F>(&mut self, stage: &F) -> Result<(), Error<P::Error>>
    where
        F: Fn(&mut FrameBuffer<COLS, ROWS>, DotState),
    {
        for _ in 0..self.timing.repair_cycles {
            for state in [DotState::Yellow, DotState::Black] {
                stage(&mut self.framebuffer, state);
                self.commit()?;
                self.delay.delay_ms(self.timing.settle_ms);
            }
        }
        Ok(())
    }

    fn sweep(&mut self, state: DotState) -> Result<(), Error<P::Error>> {
        let config = self.translator.config();
        let (width, height) = (config.physical_width, config.height);
        for col in 0..width {
            let Some(column) = self.translator.translate_column(col) else {
                continue;
            };
            self.select_column(column.code)?;
            for row in (0..height).rev() {
                if let Some(select) = self.translator.translate_row(row, state) {
                    self.select_row(select)?;
                    self.fire(column.enable_line)?;
                }
            }
        }
        Ok(())
    }

    fn select_row(&mut self, select: RowSelect) -> Result<(), Error<P::Error>> {
        self.banks.select(select);
        self.pins
            .polarity
            .set_state(PinState::from(select.polarity_high))
            .map_err(Error::Pin)
    }

    fn select_column(&mut self, code: ColumnCode) -> Result<(), Error<P::Error>> {
        for (pin, level) in self.pins.column.iter_mut().zip(code.lines()) {
            pin.set_state(PinState::from(level)).map_err(Error::Pin)?;
        }
        Ok(())
    }

    fn fire(&mut self, enable_line: u8) -> Result<(), Error<P::Error>> {
        let factor = self.speed.factor();
        let enable = &mut self.pins.enable[usize::from(enable_line)];
        enable.set_high().map_err(Error::Pin)?;
        self.delay
            .delay_us(self.timing.flip_duration_us.saturating_mul(factor));
        enable.set_low().map_err(Error::Pin)?;
        self.delay
            .delay_us(self.timing.pause_duration_us.saturating_mul(factor));
        self.yielder.yield_now();
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Error<P::Error>> {
        for pin in &mut self.pins.column {
            pin.set_low().map_err(Error::Pin)?;
        }
        self.banks.set_all_lines(PinState::Low);
        Ok(())
    }

    /// Stages one dot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] if `p` is outside the canvas.
    pub fn set_pixel(&mut self, p: Point, state: DotState) -> Result<(), Error<P::Error>> {
        if self.init_ok {
            self.framebuffer.set_pending(p, state)?;
        }
        Ok(())
    }

    /// Stages a line between two points, both included.
    pub fn draw_line(&mut self, from: Point, to: Point, state: DotState) {
        if self.init_ok {
            raster::draw_line(&mut self.framebuffer, from, to, state);
        }
    }

    /// Stages a circle outline.
    pub fn draw_circle(&mut self, center: Point, radius: i32, state: DotState) {
        if self.init_ok {
            raster::draw_circle(&mut self.framebuffer, center, radius, state);
        }
    }

    /// Stages a rectangle outline.
    pub fn draw_rect(&mut self, top_left: Point, size: Size, state: DotState) {
        if self.init_ok {
            raster::draw_rect(&mut self.framebuffer, top_left, size, state);
        }
    }

    /// Stages a filled rectangle.
    pub fn fill_rect(&mut self, top_left: Point, size: Size, state: DotState) {
        if self.init_ok {
            raster::fill_rect(&mut self.framebuffer, top_left, size, state);
        }
    }

    /// Stages an icon; see [`raster::draw_icon`].
    pub fn draw_icon(&mut self, icon: &Icon<'_>, top_left: Point, state: DotState, invert: bool) {
        if self.init_ok {
            raster::draw_icon(&mut self.framebuffer, icon, top_left, state, invert);
        }
    }

    /// Stages `text` in the current font and returns the column after it.
    pub fn print(&mut self, origin: Point, text: &str, state: DotState) -> i32 {
        if !self.init_ok {
            return origin.x;
        }
        raster::draw_text(
            &mut self.framebuffer,
            &self.font,
            origin,
            text,
            self.char_spacing,
            state,
        )
    }

    /// Stages one character and returns its width.
    pub fn print_char(&mut self, top_left: Point, ch: char, state: DotState) -> u8 {
        if !self.init_ok {
            return 0;
        }
        raster::draw_char(&mut self.framebuffer, &self.font, top_left, ch, state)
    }

    /// Stages an all-black canvas.
    pub fn black(&mut self) {
        if self.init_ok {
            self.framebuffer.fill_pending(DotState::Black);
        }
    }

    /// Stages an all-yellow canvas.
    pub fn yellow(&mut self) {
        if self.init_ok {
            self.framebuffer.fill_pending(DotState::Yellow);
        }
    }

    /// Stages the complement of what the glass shows.
    pub fn invert(&mut self) {
        if self.init_ok {
            self.framebuffer.invert();
        }
    }

    /// Stages the shown image moved by one cell.
    pub fn shift(&mut self, direction: Direction, fill: DotState) {
        if self.init_ok {
            self.framebuffer.shift(direction, fill);
        }
    }

    /// Stages a whole image, one row bitmask per column.
    pub fn set_pixel_map(&mut self, map: &[u32; COLS]) {
        if self.init_ok {
            self.framebuffer.restore_pending(map);
        }
    }

    /// Replaces the font used by [`print`](Self::print).
    pub fn set_font(&mut self, font: Font<'a>) {
        self.font = font;
    }

    /// Font used by [`print`](Self::print).
    #[must_use]
    pub fn font(&self) -> &Font<'a> {
        &self.font
    }

    /// Sets the blank columns between characters.
    pub fn set_char_spacing(&mut self, spacing: u8) {
        self.char_spacing = spacing;
    }

    /// Sets the pulse length multiplier.
    pub fn set_flip_speed(&mut self, speed: FlipSpeed) {
        self.speed = speed;
    }

    /// Current pulse length multiplier.
    #[must_use]
    pub fn flip_speed(&self) -> FlipSpeed {
        self.speed
    }

    /// Replaces the pulse and settle durations.
    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Width of `text` in the current font and spacing.
    #[must_use]
    pub fn text_width(&self, text: &str) -> u32 {
        self.font.text_width(text, self.char_spacing)
    }

    /// Column at which `text` starts when centered on the physical width.
    #[must_use]
    pub fn center_position(&self, text: &str) -> u32 {
        let width = u32::from(self.translator.config().physical_width);
        self.font.center_position(text, width, self.char_spacing)
    }

    /// Both generations of the canvas.
    #[must_use]
    pub fn framebuffer(&self) -> &FrameBuffer<COLS, ROWS> {
        &self.framebuffer
    }

    /// Address translation in use.
    #[must_use]
    pub fn translator(&self) -> &AddressTranslator<PANELS> {
        &self.translator
    }

    /// Gives the hardware back.
    pub fn release(self) -> (Pins<P, ENABLE>, RowBanks<B>, D, Y) {
        (self.pins, self.banks, self.delay, self.yielder)
    }
}

impl<
        P,
        B,
        D,
        Y,
        const COLS: usize,
        const ROWS: usize,
        const PANELS: usize,
        const ENABLE: usize,
    > OriginDimensions for FlipDotDisplay<'_, P, B, D, Y, COLS, ROWS, PANELS, ENABLE>
{
    fn size(&self) -> Size {
        self.framebuffer.size()
    }
}

impl<
        P,
        B,
        D,
        Y,
        const COLS: usize,
        const ROWS: usize,
        const PANELS: usize,
        const ENABLE: usize,
    > DrawTarget for FlipDotDisplay<'_, P, B, D, Y, COLS, ROWS, PANELS, ENABLE>
{
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        if !self.init_ok {
            return Ok(());
        }
        self.framebuffer.draw_iter(pixels)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec;
    use std::vec::Vec;

    use embedded_graphics::prelude::Drawable;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    use super::*;

    const TEST_COLS: usize = 8;
    const TEST_ROWS: usize = 4;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Line {
        Column(u8),
        Enable(u8),
        Polarity,
        Reset,
        Led,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum BankId {
        Yellow,
        Black,
        Extended,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Pin(Line, bool),
        Init(BankId),
        All(BankId, PinState),
        Row(BankId, u8, PinState),
        DelayUs(u32),
        DelayMs(u32),
        Yield,
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct MockPin {
        line: Line,
        fail: bool,
        log: Log,
    }

    impl ErrorType for MockPin {
        type Error = ErrorKind;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.record(false)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.record(true)
        }
    }

    impl MockPin {
        fn record(&mut self, level: bool) -> Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            self.log.borrow_mut().push(Event::Pin(self.line, level));
            Ok(())
        }
    }

    struct MockBank {
        id: BankId,
        ok: bool,
        log: Log,
    }

    impl LineDriver for MockBank {
        fn initialize(&mut self) -> bool {
            self.log.borrow_mut().push(Event::Init(self.id));
            self.ok
        }

        fn set_all_lines(&mut self, state: PinState) {
            self.log.borrow_mut().push(Event::All(self.id, state));
        }

        fn set_line(&mut self, index: u8, state: PinState) {
            self.log.borrow_mut().push(Event::Row(self.id, index, state));
        }
    }

    struct MockDelay(Log);

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_us(&mut self, us: u32) {
            self.0.borrow_mut().push(Event::DelayUs(us));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.0.borrow_mut().push(Event::DelayMs(ms));
        }
    }

    struct MockYield(Log);

    impl Yield for MockYield {
        fn yield_now(&mut self) {
            self.0.borrow_mut().push(Event::Yield);
        }
    }

    type TestDisplay = FlipDotDisplay<
        'static,
        MockPin,
        MockBank,
        MockDelay,
        MockYield,
        TEST_COLS,
        TEST_ROWS,
        2,
        2,
    >;

    // 24 rows, rows 16.. on the extended bank
    type TallDisplay = FlipDotDisplay<
        'static,
        MockPin,
        MockBank,
        MockDelay,
        MockYield,
        TEST_COLS,
        24,
        2,
        2,
    >;

    // two 3 column panels, 2 virtual columns on the right
    fn config() -> WiringConfig<2> {
        WiringConfig::new(3, TEST_ROWS as u8)
    }

    fn pin(log: &Log, line: Line) -> MockPin {
        MockPin {
            line,
            fail: false,
            log: log.clone(),
        }
    }

    fn pins(log: &Log) -> Pins<MockPin, 2> {
        Pins {
            column: core::array::from_fn(|i| pin(log, Line::Column(i as u8))),
            enable: core::array::from_fn(|i| pin(log, Line::Enable(i as u8))),
            polarity: pin(log, Line::Polarity),
            reset: Some(pin(log, Line::Reset)),
            led: Some(pin(log, Line::Led)),
        }
    }

    fn banks(log: &Log, ok: bool) -> RowBanks<MockBank> {
        RowBanks {
            yellow: MockBank {
                id: BankId::Yellow,
                ok: true,
                log: log.clone(),
            },
            black: MockBank {
                id: BankId::Black,
                ok,
                log: log.clone(),
            },
            extended: None,
        }
    }

    fn tall(log: &Log) -> TallDisplay {
        let mut banks = banks(log, true);
        banks.extended = Some(MockBank {
            id: BankId::Extended,
            ok: true,
            log: log.clone(),
        });
        let mut display = FlipDotDisplay::new(
            pins(log),
            banks,
            MockDelay(log.clone()),
            MockYield(log.clone()),
            WiringConfig::new(3, 24).with_extended_row_bank(true),
        )
        .unwrap();
        assert!(display.init().unwrap());
        log.borrow_mut().clear();
        display
    }

    fn build(log: &Log, banks_ok: bool) -> TestDisplay {
        FlipDotDisplay::new(
            pins(log),
            banks(log, banks_ok),
            MockDelay(log.clone()),
            MockYield(log.clone()),
            config(),
        )
        .unwrap()
    }

    fn ready(log: &Log) -> TestDisplay {
        let mut display = build(log, true);
        assert!(display.init().unwrap());
        log.borrow_mut().clear();
        display
    }

    fn count(log: &Log, event: Event) -> usize {
        log.borrow().iter().filter(|&&e| e == event).count()
    }

    fn pulses(log: &Log) -> usize {
        log.borrow()
            .iter()
            .filter(|e| matches!(e, Event::Pin(Line::Enable(_), true)))
            .count()
    }

    #[test]
    fn test_new_rejects_mismatched_wiring() {
        let log = Log::default();
        let result: Result<TestDisplay, _> = FlipDotDisplay::new(
            pins(&log),
            banks(&log, true),
            MockDelay(log.clone()),
            MockYield(log.clone()),
            WiringConfig::new(3, 5),
        );
        assert!(matches!(
            result,
            Err(Error::InvalidConfig(ConfigError::BufferMismatch))
        ));

        let result: Result<TestDisplay, _> = FlipDotDisplay::new(
            pins(&log),
            banks(&log, true),
            MockDelay(log.clone()),
            MockYield(log.clone()),
            WiringConfig::new(5, TEST_ROWS as u8),
        );
        assert!(matches!(
            result,
            Err(Error::InvalidConfig(ConfigError::BufferMismatch))
        ));

        let result: Result<TestDisplay, _> = FlipDotDisplay::new(
            pins(&log),
            banks(&log, true),
            MockDelay(log.clone()),
            MockYield(log.clone()),
            config().with_panel_order([0, 2]),
        );
        assert!(matches!(
            result,
            Err(Error::InvalidConfig(ConfigError::EnableLineOutOfRange))
        ));

        let result: Result<TestDisplay, _> = FlipDotDisplay::new(
            pins(&log),
            banks(&log, true),
            MockDelay(log.clone()),
            MockYield(log.clone()),
            config().with_extended_row_bank(true),
        );
        assert!(matches!(
            result,
            Err(Error::InvalidConfig(ConfigError::MissingExtendedBank))
        ));

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_init_sequence() {
        let log = Log::default();
        let mut display = build(&log, true);
        assert!(!display.is_initialized());
        assert_eq!(display.init(), Ok(true));
        assert!(display.is_initialized());
        assert_eq!(
            *log.borrow(),
            vec![
                Event::Pin(Line::Led, true),
                Event::Pin(Line::Reset, false),
                Event::DelayMs(2),
                Event::Pin(Line::Reset, true),
                Event::DelayMs(25),
                Event::Init(BankId::Yellow),
                Event::Init(BankId::Black),
            ]
        );
    }

    #[test]
    fn test_commit_single_dot_sequence() {
        let log = Log::default();
        let mut display = ready(&log);

        // column 5 is the first column of the chain: panel 0, code 1
        display.set_pixel(Point::new(5, 2), DotState::Yellow).unwrap();
        assert_eq!(display.commit(), Ok(1));
        assert_eq!(
            *log.borrow(),
            vec![
                Event::All(BankId::Yellow, PinState::Low),
                Event::All(BankId::Black, PinState::Low),
                Event::Row(BankId::Yellow, 2, PinState::High),
                Event::Pin(Line::Polarity, false),
                Event::Pin(Line::Column(0), true),
                Event::Pin(Line::Column(1), false),
                Event::Pin(Line::Column(2), false),
                Event::Pin(Line::Column(3), false),
                Event::Pin(Line::Column(4), false),
                Event::Pin(Line::Enable(0), true),
                Event::DelayUs(500),
                Event::Pin(Line::Enable(0), false),
                Event::DelayUs(250),
                Event::Yield,
                Event::Pin(Line::Column(0), false),
                Event::Pin(Line::Column(1), false),
                Event::Pin(Line::Column(2), false),
                Event::Pin(Line::Column(3), false),
                Event::Pin(Line::Column(4), false),
                Event::All(BankId::Yellow, PinState::Low),
                Event::All(BankId::Black, PinState::Low),
            ]
        );
        assert_eq!(
            display.framebuffer().realized(Point::new(5, 2)),
            Ok(DotState::Yellow)
        );
    }

    #[test]
    fn test_commit_black_uses_black_bank_and_high_polarity() {
        let log = Log::default();
        let mut display = ready(&log);
        display.yellow();
        display.commit().unwrap();
        log.borrow_mut().clear();

        // column 0 is the last column of the chain: panel 1, code 3
        display.set_pixel(Point::new(0, 1), DotState::Black).unwrap();
        assert_eq!(display.commit(), Ok(1));
        let events = log.borrow();
        assert_eq!(events[2], Event::Row(BankId::Black, 1, PinState::High));
        assert_eq!(events[3], Event::Pin(Line::Polarity, true));
        assert_eq!(events[4], Event::Pin(Line::Column(0), true));
        assert_eq!(events[5], Event::Pin(Line::Column(1), true));
        assert_eq!(events[9], Event::Pin(Line::Enable(1), true));
    }

    #[test]
    fn test_commit_extended_bank_rows() {
        let log = Log::default();
        let mut display = tall(&log);

        // yellow on row 23: extended line 7 + 8, low polarity
        display.set_pixel(Point::new(5, 23), DotState::Yellow).unwrap();
        assert_eq!(display.commit(), Ok(1));
        assert_eq!(
            log.borrow()[..15],
            [
                Event::All(BankId::Yellow, PinState::Low),
                Event::All(BankId::Black, PinState::Low),
                Event::All(BankId::Extended, PinState::Low),
                Event::Row(BankId::Extended, 15, PinState::High),
                Event::Pin(Line::Polarity, false),
                Event::Pin(Line::Column(0), true),
                Event::Pin(Line::Column(1), false),
                Event::Pin(Line::Column(2), false),
                Event::Pin(Line::Column(3), false),
                Event::Pin(Line::Column(4), false),
                Event::Pin(Line::Enable(0), true),
                Event::DelayUs(500),
                Event::Pin(Line::Enable(0), false),
                Event::DelayUs(250),
                Event::Yield,
            ]
        );
        assert_eq!(
            log.borrow().last(),
            Some(&Event::All(BankId::Extended, PinState::Low))
        );

        display.set_pixel(Point::new(0, 16), DotState::Yellow).unwrap();
        display.commit().unwrap();
        log.borrow_mut().clear();

        // black on row 16: extended line 0, high polarity
        display.set_pixel(Point::new(0, 16), DotState::Black).unwrap();
        assert_eq!(display.commit(), Ok(1));
        assert_eq!(
            log.borrow()[..11],
            [
                Event::All(BankId::Yellow, PinState::Low),
                Event::All(BankId::Black, PinState::Low),
                Event::All(BankId::Extended, PinState::Low),
                Event::Row(BankId::Extended, 0, PinState::High),
                Event::Pin(Line::Polarity, true),
                Event::Pin(Line::Column(0), true),
                Event::Pin(Line::Column(1), true),
                Event::Pin(Line::Column(2), false),
                Event::Pin(Line::Column(3), false),
                Event::Pin(Line::Column(4), false),
                Event::Pin(Line::Enable(1), true),
            ]
        );
        assert_eq!(
            display.framebuffer().realized(Point::new(0, 16)),
            Ok(DotState::Black)
        );
        assert_eq!(
            display.framebuffer().realized(Point::new(5, 23)),
            Ok(DotState::Yellow)
        );
    }

    #[test]
    fn test_commit_primary_rows_of_tall_display() {
        let log = Log::default();
        let mut display = tall(&log);
        display.set_pixel(Point::new(2, 15), DotState::Yellow).unwrap();
        assert_eq!(display.commit(), Ok(1));
        assert_eq!(count(&log, Event::Row(BankId::Yellow, 15, PinState::High)), 1);
        assert!(!log
            .borrow()
            .iter()
            .any(|e| matches!(e, Event::Row(BankId::Extended, _, _))));
    }

    #[test]
    fn test_every_physical_dot_round_trips() {
        let log = Log::default();
        let mut display = ready(&log);

        for col in 0..6 {
            // the chain starts at column 5; columns 0..3 sit on the second panel
            let reversed = 5 - col;
            let enable = (reversed / 3) as u8;
            let code = (reversed % 3) as u8 + 1;
            for row in 0..TEST_ROWS {
                let p = Point::new(col as i32, row as i32);
                log.borrow_mut().clear();
                display.set_pixel(p, DotState::Yellow).unwrap();
                assert_eq!(display.commit(), Ok(1), "yellow at {p:?}");
                assert_eq!(display.framebuffer().realized(p), Ok(DotState::Yellow));

                let events = log.borrow().clone();
                assert_eq!(events[2], Event::Row(BankId::Yellow, row as u8, PinState::High));
                for bit in 0..5u8 {
                    let level = (code >> bit) & 1 == 1;
                    assert_eq!(
                        events[4 + usize::from(bit)],
                        Event::Pin(Line::Column(bit), level),
                        "column line {bit} at {p:?}"
                    );
                }
                assert_eq!(events[9], Event::Pin(Line::Enable(enable), true), "at {p:?}");

                display.set_pixel(p, DotState::Black).unwrap();
                assert_eq!(display.commit(), Ok(1), "black at {p:?}");
                assert_eq!(display.framebuffer().realized(p), Ok(DotState::Black));
            }
        }
        assert_eq!(display.framebuffer().snapshot(), [0; TEST_COLS]);
    }

    #[test]
    fn test_second_commit_is_idle() {
        let log = Log::default();
        let mut display = ready(&log);
        display.draw_line(Point::new(0, 0), Point::new(7, 3), DotState::Yellow);
        assert!(display.commit().unwrap() > 0);
        log.borrow_mut().clear();

        assert_eq!(display.commit(), Ok(0));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_pulses_match_differences() {
        let log = Log::default();
        let mut display = ready(&log);
        display.fill_rect(Point::new(1, 0), Size::new(4, 3), DotState::Yellow);
        display.commit().unwrap();

        display.fill_rect(Point::new(0, 1), Size::new(3, 3), DotState::Yellow);
        display.set_pixel(Point::new(4, 0), DotState::Black).unwrap();
        let expected = display.framebuffer().differences();
        log.borrow_mut().clear();

        assert_eq!(display.commit(), Ok(expected));
        assert_eq!(pulses(&log), expected);
        assert_eq!(count(&log, Event::Yield), expected);
        assert!(!display.framebuffer().is_dirty());
    }

    #[test]
    fn test_virtual_columns_realize_without_pulses() {
        let log = Log::default();
        let mut display = ready(&log);
        display.fill_rect(Point::new(6, 0), Size::new(2, 4), DotState::Yellow);
        assert_eq!(display.commit(), Ok(0));
        assert!(log.borrow().is_empty());
        assert_eq!(display.framebuffer().realized_column(7), Some(0b1111));
        assert!(!display.framebuffer().is_dirty());
    }

    #[test]
    fn test_slow_speed_doubles_pulse() {
        let log = Log::default();
        let mut display = ready(&log);
        display.set_flip_speed(FlipSpeed::Slow);
        display.set_pixel(Point::new(2, 2), DotState::Yellow).unwrap();
        display.commit().unwrap();
        assert_eq!(count(&log, Event::DelayUs(1000)), 1);
        assert_eq!(count(&log, Event::DelayUs(500)), 1);
    }

    #[test]
    fn test_failed_init_is_inert() {
        let log = Log::default();
        let mut display = build(&log, false);
        assert_eq!(display.init(), Ok(false));
        log.borrow_mut().clear();

        assert_eq!(display.set_pixel(Point::new(1, 1), DotState::Yellow), Ok(()));
        assert_eq!(display.set_pixel(Point::new(99, 1), DotState::Yellow), Ok(()));
        display.draw_line(Point::new(0, 0), Point::new(5, 3), DotState::Yellow);
        display.draw_circle(Point::new(3, 2), 2, DotState::Yellow);
        display.fill_rect(Point::new(0, 0), Size::new(8, 4), DotState::Yellow);
        display.yellow();
        display.invert();
        display.shift(Direction::Left, DotState::Yellow);
        assert_eq!(display.print(Point::new(1, 0), "AB", DotState::Yellow), 1);
        Pixel(Point::new(2, 2), BinaryColor::On)
            .draw(&mut display)
            .unwrap();

        assert_eq!(display.commit(), Ok(0));
        assert_eq!(display.clear(true), Ok(()));
        assert_eq!(display.refresh_all(), Ok(0));
        assert_eq!(display.repair_pixel(Point::new(1, 1)), Ok(()));
        assert_eq!(display.repair_column(2), Ok(()));

        assert!(log.borrow().is_empty());
        assert!(!display.framebuffer().is_dirty());
    }

    #[test]
    fn test_set_pixel_rejects_outside_points() {
        let log = Log::default();
        let mut display = ready(&log);
        let p = Point::new(TEST_COLS as i32, 0);
        assert_eq!(
            display.set_pixel(p, DotState::Yellow),
            Err(Error::InvalidCoordinate(p))
        );
        assert_eq!(
            display.repair_pixel(Point::new(0, -1)),
            Err(Error::InvalidCoordinate(Point::new(0, -1)))
        );
        assert_eq!(
            display.repair_column(TEST_COLS),
            Err(Error::InvalidCoordinate(Point::new(TEST_COLS as i32, 0)))
        );
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_clear_sweeps_every_physical_dot() {
        let log = Log::default();
        let mut display = ready(&log);
        display.set_pixel(Point::new(7, 3), DotState::Yellow).unwrap();
        display.commit().unwrap();

        display.clear(true).unwrap();
        assert_eq!(pulses(&log), 2 * 6 * TEST_ROWS);
        assert_eq!(count(&log, Event::DelayMs(200)), 1);

        // bottom row first
        let first_row = log
            .borrow()
            .iter()
            .find_map(|e| match e {
                Event::Row(bank, row, PinState::High) => Some((*bank, *row)),
                _ => None,
            });
        assert_eq!(first_row, Some((BankId::Yellow, 3)));

        for col in 0..6 {
            assert_eq!(display.framebuffer().realized_column(col), Some(0));
            assert_eq!(display.framebuffer().pending_column(col), Some(0));
        }
    }

    #[test]
    fn test_clear_keeps_virtual_columns() {
        let log = Log::default();
        let mut display = ready(&log);
        display.fill_rect(Point::new(4, 0), Size::new(4, 2), DotState::Yellow);
        display.commit().unwrap();

        display.clear(true).unwrap();
        let fb = display.framebuffer();
        assert_eq!(fb.realized_column(4), Some(0));
        assert_eq!(fb.realized_column(5), Some(0));
        assert_eq!(fb.realized_column(6), Some(0b11));
        assert_eq!(fb.pending_column(7), Some(0b11));
        assert!(!fb.is_dirty());
    }

    #[test]
    fn test_clear_without_yellow() {
        let log = Log::default();
        let mut display = ready(&log);
        display.clear(false).unwrap();
        assert_eq!(pulses(&log), 6 * TEST_ROWS);
        assert_eq!(count(&log, Event::DelayMs(200)), 0);
        assert_eq!(count(&log, Event::Pin(Line::Polarity, false)), 0);
    }

    #[test]
    fn test_refresh_all_restores_image() {
        let log = Log::default();
        let mut display = ready(&log);
        display.draw_rect(Point::new(0, 0), Size::new(6, 4), DotState::Yellow);
        display.commit().unwrap();
        let before = display.framebuffer().snapshot();
        assert!(!display.framebuffer().is_dirty());

        assert_eq!(display.refresh_all(), Ok(6 + 6 + 2 + 2));
        assert_eq!(display.framebuffer().snapshot(), before);
    }

    #[test]
    fn test_repair_pixel_cycles_and_restores() {
        let log = Log::default();
        let mut display = ready(&log);
        display.set_timing(Timing {
            repair_cycles: 2,
            ..Timing::new()
        });
        display.set_pixel(Point::new(1, 1), DotState::Yellow).unwrap();
        display.commit().unwrap();
        log.borrow_mut().clear();

        display.repair_pixel(Point::new(1, 1)).unwrap();
        // already yellow: cycle 1 only flips black, cycle 2 yellow and black,
        // restore flips yellow
        assert_eq!(pulses(&log), 4);
        assert_eq!(count(&log, Event::DelayMs(200)), 4);
        assert_eq!(count(&log, Event::DelayUs(1000)), 3);
        assert_eq!(count(&log, Event::DelayUs(500)), 4);
        assert_eq!(display.flip_speed(), FlipSpeed::Normal);
        assert_eq!(
            display.framebuffer().realized(Point::new(1, 1)),
            Ok(DotState::Yellow)
        );
    }

    #[test]
    fn test_repair_column_restores_column() {
        let log = Log::default();
        let mut display = ready(&log);
        display.set_timing(Timing {
            repair_cycles: 1,
            ..Timing::new()
        });
        display.set_pixel(Point::new(3, 0), DotState::Yellow).unwrap();
        display.commit().unwrap();
        log.borrow_mut().clear();

        display.repair_column(3).unwrap();
        // yellow: 3 dots, black: 4 dots, restore: 1 dot
        assert_eq!(pulses(&log), 3 + 4 + 1);
        assert_eq!(display.framebuffer().realized_column(3), Some(0b0001));
        assert_eq!(display.flip_speed(), FlipSpeed::Normal);
    }

    #[test]
    fn test_pin_failure_leaves_dot_pending() {
        let log = Log::default();
        let mut pins = pins(&log);
        pins.enable[0].fail = true;
        let mut display: TestDisplay = FlipDotDisplay::new(
            pins,
            banks(&log, true),
            MockDelay(log.clone()),
            MockYield(log.clone()),
            config(),
        )
        .unwrap();
        assert_eq!(display.init(), Ok(true));

        display.set_pixel(Point::new(5, 0), DotState::Yellow).unwrap();
        assert_eq!(display.commit(), Err(Error::Pin(ErrorKind::Other)));
        assert!(display.framebuffer().is_dirty());
        assert_eq!(
            display.framebuffer().realized(Point::new(5, 0)),
            Ok(DotState::Black)
        );
    }

    #[test]
    fn test_led_is_active_low() {
        let log = Log::default();
        let mut display = ready(&log);
        display.set_led(true).unwrap();
        display.set_led(false).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![Event::Pin(Line::Led, false), Event::Pin(Line::Led, true)]
        );
    }

    #[test]
    fn test_print_uses_char_spacing() {
        let log = Log::default();
        let mut display = ready(&log);
        display.set_char_spacing(2);
        assert_eq!(display.text_width("!!"), 6);
        assert_eq!(display.print(Point::new(0, 0), "!!", DotState::Yellow), 6);
        assert_eq!(display.framebuffer().pending_column(0), Some(0x5F & 0b1111));
        assert_eq!(display.framebuffer().pending_column(3), Some(0x5F & 0b1111));
        assert_eq!(display.print_char(Point::new(6, 0), 'I', DotState::Yellow), 3);
    }

    #[test]
    fn test_draw_target_stages_pixels() {
        let log = Log::default();
        let mut display = ready(&log);
        assert_eq!(display.size(), Size::new(TEST_COLS as u32, TEST_ROWS as u32));
        Pixel(Point::new(2, 3), BinaryColor::On)
            .draw(&mut display)
            .unwrap();
        assert_eq!(
            display.framebuffer().pending(Point::new(2, 3)),
            Ok(DotState::Yellow)
        );
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_release_returns_hardware() {
        let log = Log::default();
        let display = ready(&log);
        let (pins, banks, _delay, _yielder) = display.release();
        assert_eq!(pins.enable.len(), 2);
        assert_eq!(banks.black.id, BankId::Black);
    }
}
