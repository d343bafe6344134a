//! Flow control and handshake line handling
//!
//! The engine only ever asks two questions of the physical handshake lines:
//! "may I keep sending?" (CTS) and "set the carrier line" (DCD). Both are
//! behind the [HandshakeLines] trait so hosts without wired handshake pins
//! can stub them out. [GpioHandshake] is the stock implementation over two
//! `embedded-hal` pins.

use embedded_hal::digital::{InputPin, OutputPin};

/// Flow control mode selected with `AT&K`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowControlMode {
    /// `AT&K0`, never pause
    None,
    /// `AT&K1`, pause while the terminal deasserts CTS
    Hardware,
    /// `AT&K2`, reserved; accepted and stored but currently never pauses
    Software,
}

impl FlowControlMode {
    /// Digit reported by `AT&K?` and `AT&V`
    pub fn code(self) -> u8 {
        match self {
            FlowControlMode::None => 0,
            FlowControlMode::Hardware => 1,
            FlowControlMode::Software => 2,
        }
    }
}

/// Electrical polarity of the handshake lines, selected with `AT&P`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinPolarity {
    /// `AT&P0`
    Inverted,
    /// `AT&P1`
    Normal,
}

impl PinPolarity {
    /// Digit reported by `AT&P?` and `AT&V`
    pub fn code(self) -> u8 {
        match self {
            PinPolarity::Inverted => 0,
            PinPolarity::Normal => 1,
        }
    }

    /// Level at which a line counts as asserted
    pub fn active_high(self) -> bool {
        matches!(self, PinPolarity::Normal)
    }
}

/// Physical handshake line access
pub trait HandshakeLines {
    /// Drives the carrier (DCD) line. `active` is the logical carrier state,
    /// the implementation applies the polarity mapping.
    fn set_carrier(&mut self, active: bool, polarity: PinPolarity);

    /// True while the terminal asks us to hold off sending (CTS deasserted)
    fn stop_requested(&mut self, polarity: PinPolarity) -> bool;
}

/// [HandshakeLines] over two GPIO pins: CTS in, DCD out
pub struct GpioHandshake<CTS, DCD> {
    cts: CTS,
    dcd: DCD,
}

impl<CTS: InputPin, DCD: OutputPin> GpioHandshake<CTS, DCD> {
    pub fn new(cts: CTS, dcd: DCD) -> Self {
        Self { cts, dcd }
    }
}

impl<CTS: InputPin, DCD: OutputPin> HandshakeLines for GpioHandshake<CTS, DCD> {
    fn set_carrier(&mut self, active: bool, polarity: PinPolarity) {
        // With normal polarity the DCD line idles high and drops on carrier
        let level = if polarity.active_high() { !active } else { active };
        let result = if level { self.dcd.set_high() } else { self.dcd.set_low() };
        // Infallible on every platform this runs on
        let _ = result;
    }

    fn stop_requested(&mut self, polarity: PinPolarity) -> bool {
        self.cts.is_high().unwrap_or(false) == polarity.active_high()
    }
}

/// Per-poll pause decision.
///
/// `update` is called at the top of every poll and before every inbound chunk
/// so a terminal raising CTS mid-transfer stops the stream within one byte.
#[derive(Default)]
pub struct FlowController {
    paused: bool,
}

impl FlowController {
    /// Re-samples the handshake lines for the given mode
    pub fn update<L: HandshakeLines>(&mut self, mode: FlowControlMode, lines: &mut L, polarity: PinPolarity) {
        self.paused = match mode {
            FlowControlMode::None => false,
            FlowControlMode::Hardware => lines.stop_requested(polarity),
            // Reserved, never pauses
            FlowControlMode::Software => false,
        };
    }

    /// True while remote-to-serial forwarding must hold off
    pub fn paused(&self) -> bool {
        self.paused
    }
}
