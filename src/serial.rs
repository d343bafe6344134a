//! Serial port seams
//!
//! The engine talks to the terminal through the `embedded-io` traits plus the
//! small [Configure] extension for live baud changes. [DualSerial] merges a
//! USB CDC port and a physical UART into one logical terminal the way the
//! original adapters do: reads prefer USB, writes go to both.

use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};

/// Runtime reconfiguration of a serial port, used by `AT$SB`
pub trait Configure {
    /// Switches the line rate. Takes effect after the current transmit
    /// buffer has drained.
    fn set_baud(&mut self, baud: u32);
}

/// Error from either half of a [DualSerial]
#[derive(Debug)]
pub enum DualError<A, B> {
    Usb(A),
    Uart(B),
}

impl<A: embedded_io::Error, B: embedded_io::Error> embedded_io::Error for DualError<A, B> {
    fn kind(&self) -> ErrorKind {
        match self {
            DualError::Usb(error) => error.kind(),
            DualError::Uart(error) => error.kind(),
        }
    }
}

/// Two serial ports presented as one terminal.
///
/// Reads drain the USB port first so a host plugged into both always wins;
/// writes and flushes are mirrored to both ports.
pub struct DualSerial<A, B> {
    pub(crate) usb: A,
    pub(crate) uart: B,
}

impl<A, B> DualSerial<A, B> {
    pub fn new(usb: A, uart: B) -> Self {
        Self { usb, uart }
    }
}

impl<A: ErrorType, B: ErrorType> ErrorType for DualSerial<A, B> {
    type Error = DualError<A::Error, B::Error>;
}

impl<A: Read + ReadReady, B: Read + ReadReady> ReadReady for DualSerial<A, B> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.usb.read_ready().map_err(DualError::Usb)? {
            return Ok(true);
        }
        self.uart.read_ready().map_err(DualError::Uart)
    }
}

impl<A: Read + ReadReady, B: Read + ReadReady> Read for DualSerial<A, B> {
    /// Blocks until either port has data, polling both. Callers that must
    /// not stall check [ReadReady::read_ready] first, as the engine does.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        loop {
            if self.usb.read_ready().map_err(DualError::Usb)? {
                return self.usb.read(buf).map_err(DualError::Usb);
            }
            if self.uart.read_ready().map_err(DualError::Uart)? {
                return self.uart.read(buf).map_err(DualError::Uart);
            }
        }
    }
}

impl<A: Write, B: Write> Write for DualSerial<A, B> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        // Keep both streams identical, so write the whole chunk everywhere
        self.usb.write_all(buf).map_err(DualError::Usb)?;
        self.uart.write_all(buf).map_err(DualError::Uart)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.usb.flush().map_err(DualError::Usb)?;
        self.uart.flush().map_err(DualError::Uart)
    }
}

impl<A, B: Configure> Configure for DualSerial<A, B> {
    /// Only the physical UART has a line rate; USB CDC ignores it
    fn set_baud(&mut self, baud: u32) {
        self.uart.set_baud(baud);
    }
}
