//! Hayes result codes
//!
//! Every command that does not itself print data is acknowledged with one of
//! these codes. With verbose reporting disabled the bare numeric index is
//! sent, otherwise the textual name (`CONNECT` and `NO CARRIER` carry extra
//! context appended by the engine).

/// Command acknowledgment codes of the classic Hayes command set.
///
/// The numeric values are part of the wire format and must not be reordered.
/// Index 5 is reserved and never emitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResultCode {
    Ok = 0,
    Connect = 1,
    Ring = 2,
    NoCarrier = 3,
    Error = 4,
    NoDialtone = 6,
    Busy = 7,
    NoAnswer = 8,
}

impl ResultCode {
    /// Numeric index sent when verbose reporting is off
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Textual name sent when verbose reporting is on
    pub fn text(self) -> &'static str {
        match self {
            ResultCode::Ok => "OK",
            ResultCode::Connect => "CONNECT",
            ResultCode::Ring => "RING",
            ResultCode::NoCarrier => "NO CARRIER",
            ResultCode::Error => "ERROR",
            ResultCode::NoDialtone => "NO DIALTONE",
            ResultCode::Busy => "BUSY",
            ResultCode::NoAnswer => "NO ANSWER",
        }
    }
}
