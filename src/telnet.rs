//! Telnet IAC handling
//!
//! When Telnet translation is on (`ATNET1`) the inbound stream is filtered
//! through a small negotiation state machine and the outbound stream has its
//! `0xFF` bytes doubled. The codec is deliberately minimal: every option the
//! peer asks of us is refused (`DO` -> `WONT`), every option the peer offers
//! is accepted (`WILL` -> `DO`), and nothing is renegotiated later.
//!
//! The state survives across polls, so an IAC sequence split over two network
//! reads is still handled correctly.

use heapless::Vec;

pub const IAC: u8 = 0xFF;
pub const WILL: u8 = 0xFB;
pub const WONT: u8 = 0xFC;
pub const DO: u8 = 0xFD;
pub const DONT: u8 = 0xFE;

pub const OPT_ECHO: u8 = 0x01;
pub const OPT_SUPPRESS_GO_AHEAD: u8 = 0x03;

/// Negotiation burst sent to a freshly attached console:
/// WILL ECHO, WILL SUPPRESS-GO-AHEAD, DO SUPPRESS-GO-AHEAD.
pub const CONSOLE_PREAMBLE: [u8; 9] = [
    IAC, WILL, OPT_ECHO,
    IAC, WILL, OPT_SUPPRESS_GO_AHEAD,
    IAC, DO, OPT_SUPPRESS_GO_AHEAD,
];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum IacState {
    #[default]
    Idle,
    SawIac,
    SawVerb(u8),
}

/// Outcome of feeding one inbound byte to the codec
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// Plain payload byte, forward it
    Data(u8),
    /// Negotiation finished, send this reply to the peer
    Reply([u8; 3]),
    /// Mid-sequence, nothing to do yet
    Pending,
    /// Sequence finished without a reply
    Consumed,
}

/// Inbound IAC state machine, one instance per connection
#[derive(Default)]
pub struct TelnetCodec {
    state: IacState,
}

impl TelnetCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte received from the network
    pub fn decode(&mut self, byte: u8) -> Decoded {
        match self.state {
            IacState::Idle => {
                if byte == IAC {
                    self.state = IacState::SawIac;
                    Decoded::Pending
                } else {
                    Decoded::Data(byte)
                }
            }
            IacState::SawIac => match byte {
                // Escaped literal 0xFF
                IAC => {
                    self.state = IacState::Idle;
                    Decoded::Data(IAC)
                }
                DO | DONT | WILL | WONT => {
                    self.state = IacState::SawVerb(byte);
                    Decoded::Pending
                }
                // Other two-byte commands (NOP, GA, ...) are dropped
                _ => {
                    self.state = IacState::Idle;
                    Decoded::Consumed
                }
            },
            IacState::SawVerb(verb) => {
                self.state = IacState::Idle;
                match verb {
                    DO => Decoded::Reply([IAC, WONT, byte]),
                    WILL => Decoded::Reply([IAC, DO, byte]),
                    _ => Decoded::Consumed,
                }
            }
        }
    }
}

/// Doubles every `0xFF` in the buffer in place.
///
/// Works from the end backward so earlier insertions do not shift bytes that
/// are still to be scanned. An insertion that would overflow the buffer drops
/// the trailing byte instead; the bridge sizes its chunks at half capacity
/// while Telnet is on, so this never triggers in practice.
pub fn escape<const N: usize>(buffer: &mut Vec<u8, N>) {
    let mut index = buffer.len();
    while index > 0 {
        index -= 1;
        if buffer[index] == IAC {
            if buffer.len() == N {
                buffer.pop();
            }
            // Cannot fail after the pop above
            let _ = buffer.insert(index, IAC);
        }
    }
}
