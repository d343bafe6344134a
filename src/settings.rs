//! Persisted adapter configuration
//!
//! All settings live in one [Settings] struct. The engine edits the in-memory
//! copy; `AT&W` pushes it through the [SettingsStore] seam, `ATZ` pulls the
//! stored copy back and `AT&F` rewrites the factory image. Field capacities
//! mirror the NVRAM layout of the original adapters, so stored images stay
//! compatible.

use crate::flow::{FlowControlMode, PinPolarity};
use core::fmt::Debug;
use heapless::String;

/// Supported serial rates, in the order they are reported by `AT&V`
pub const BAUD_RATES: [u32; 9] = [300, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115_200];

/// Number of stored speed dial slots (`AT&Z0` .. `AT&Z9`)
pub const SPEED_DIAL_SLOTS: usize = 10;

/// Factory inbound listener port
pub const DEFAULT_LISTEN_PORT: u16 = 23;

pub const SSID_LENGTH: usize = 32;
pub const PASSWORD_LENGTH: usize = 63;
pub const BUSY_MESSAGE_LENGTH: usize = 80;
pub const SPEED_DIAL_LENGTH: usize = 50;

/// Speed dials seeded by a factory reset
const FACTORY_SPEED_DIALS: [&str; SPEED_DIAL_SLOTS] = [
    "bbs.fozztexx.com:23",
    "cottonwoodbbs.dyndns.org:6502",
    "borderlinebbs.dyndns.org:6400",
    "particlesbbs.dyndns.org:6400",
    "reflections.servebbs.com:23",
    "heatwave.ddns.net:9640",
    "bat.org:23",
    "blackflag.acid.org:23",
    "cavebbs.homeip.net:23",
    "vert.synchro.net:23",
];

const FACTORY_BUSY_MESSAGE: &str = "SORRY, SYSTEM IS CURRENTLY BUSY. PLEASE TRY AGAIN LATER.";

/// Complete adapter configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub ssid: String<SSID_LENGTH>,
    pub password: String<PASSWORD_LENGTH>,

    /// Index into [BAUD_RATES]
    pub baud_index: u8,

    pub echo: bool,
    pub verbose: bool,
    pub auto_answer: bool,
    pub telnet: bool,
    pub petscii: bool,

    pub flow_control: FlowControlMode,
    pub pin_polarity: PinPolarity,

    /// Sent to inbound callers rejected while a call is active
    pub busy_message: String<BUSY_MESSAGE_LENGTH>,

    pub speed_dials: [String<SPEED_DIAL_LENGTH>; SPEED_DIAL_SLOTS],

    pub listen_port: u16,
}

impl Settings {
    /// Active serial rate in baud
    pub fn baud(&self) -> u32 {
        BAUD_RATES[usize::from(self.baud_index) % BAUD_RATES.len()]
    }

    /// Stores the rate if it is a supported one, returns false otherwise
    pub fn set_baud(&mut self, baud: u32) -> bool {
        match BAUD_RATES.iter().position(|&rate| rate == baud) {
            Some(index) => {
                self.baud_index = index as u8;
                true
            }
            None => false,
        }
    }
}

impl Default for Settings {
    /// Factory image: 9600 8-N-1, echo/verbose/auto-answer on, Telnet and
    /// PETSCII translation off, no flow control, normal pin polarity, a
    /// seeded speed dial list and the Telnet listener port.
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            baud_index: 4,
            echo: true,
            verbose: true,
            auto_answer: true,
            telnet: false,
            petscii: false,
            flow_control: FlowControlMode::None,
            pin_polarity: PinPolarity::Normal,
            busy_message: truncated(FACTORY_BUSY_MESSAGE),
            speed_dials: core::array::from_fn(|slot| truncated(FACTORY_SPEED_DIALS[slot])),
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

/// Copies `value` into a bounded string, truncating if it does not fit
pub(crate) fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for ch in value.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Non-volatile settings backend.
///
/// The engine never assumes a particular medium. Implementations wrap EEPROM,
/// flash pages or a file, and report their own error type.
pub trait SettingsStore {
    type Error: Debug;

    /// Returns the stored settings image
    fn load(&mut self) -> Result<Settings, Self::Error>;

    /// Persists the given settings image
    fn save(&mut self, settings: &Settings) -> Result<(), Self::Error>;

    /// Rewrites the store with the factory image and returns it
    fn reset_to_defaults(&mut self) -> Result<Settings, Self::Error> {
        let settings = Settings::default();
        self.save(&settings)?;
        Ok(settings)
    }
}
