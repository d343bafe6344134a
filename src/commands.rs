//! # AT command grammar
//!
//! The command surface is a closed, case-insensitive set of prefixes matched
//! in a fixed priority order; the first matching rule wins. The grammar is a
//! plain table of rules so it can be unit tested without driving the whole
//! poll loop.
//!
//! Matching order is significant: `ATHEX=1` must be tried before the bare
//! `ATH` hang-up prefix, `ATHELP` before it as well, and so on. The table
//! preserves that order, anything that falls through every rule is
//! [Command::Unknown] and reported as `ERROR`.

use crate::flow::{FlowControlMode, PinPolarity};

/// Maximum accumulated command line length. Further input bytes are silently
/// dropped, not buffered.
pub const MAX_COMMAND_LENGTH: usize = 256;

/// Port used when a dial target carries no explicit `:port` suffix
pub const DEFAULT_DIAL_PORT: u16 = 23;

/// Resolved destination of a dial command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DialTarget<'a> {
    /// Literal `host[:port]` target
    Host { host: &'a str, port: u16 },

    /// Stored speed dial slot 0-9, either explicit (`ATDS3`) or via the
    /// legacy repeated-digit shorthand (`3333333`)
    SpeedDial(usize),

    /// Virtual destination handing control to the SLIP gateway
    Slip,

    /// Virtual destination handing control to the PPP gateway
    Ppp,
}

/// One parsed AT command line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Bare `AT`
    Attention,
    /// `ATDT`/`ATDP`/`ATDI`/`ATDS`
    Dial(DialTarget<'a>),
    /// `ATA`, only valid while an inbound client is pending
    Answer,
    /// `ATH` (and any suffix, as in the classic sets)
    Hangup,
    /// `ATO`, return to the open call
    Resume,
    /// `AT?` / `ATHELP`
    Help,
    /// `ATZ`, reload persisted settings
    Reload,
    /// `AT&W`, persist current settings
    Save,
    /// `AT&F`, factory reset and reload
    FactoryReset,
    /// `AT&V`, active and stored profile listing
    ShowProfile,
    /// `ATI`
    NetworkInfo,
    /// `ATIP?`
    LocalIp,
    /// `ATC1`
    WifiOn,
    /// `ATC0`
    WifiOff,
    SetEcho(bool),
    QueryEcho,
    SetVerbose(bool),
    QueryVerbose,
    SetTelnet(bool),
    QueryTelnet,
    SetPetscii(bool),
    QueryPetscii,
    SetHexEcho(bool),
    SetAutoAnswer(bool),
    QueryAutoAnswer,
    SetPolarity(PinPolarity),
    QueryPolarity,
    SetFlowControl(FlowControlMode),
    QueryFlowControl,
    SetSpeedDial { slot: usize, target: &'a str },
    QuerySpeedDial(usize),
    SetSsid(&'a str),
    QuerySsid,
    SetPassword(&'a str),
    QueryPassword,
    SetBaud(u32),
    QueryBaud,
    SetListenPort(u16),
    QueryListenPort,
    SetBusyMessage(&'a str),
    QueryBusyMessage,
    /// `AT$CON?`
    ConsoleStatus,
    /// `AT$CONDROP`
    ConsoleDrop,
    /// `ATGET<url>` HTTP passthrough
    HttpGet(&'a str),
    /// `AT$RB`, reboot the adapter
    Restart,
    /// `ATX`, leave modem mode for the menu
    ExitModem,
    /// Anything else, reported as `ERROR`
    Unknown,
}

type Build = for<'a> fn(&'a str) -> Option<Command<'a>>;

enum Rule {
    /// Whole line matches the pattern
    Exact(&'static str, Command<'static>),
    /// Line starts with the pattern, the rest is handed to the builder
    Prefix(&'static str, Build),
}

/// Grammar in original priority order
const GRAMMAR: &[Rule] = &[
    Rule::Exact("AT", Command::Attention),
    Rule::Prefix("ATDT", dial),
    Rule::Prefix("ATDP", dial),
    Rule::Prefix("ATDI", dial),
    Rule::Prefix("ATDS", speed_dial),
    Rule::Exact("ATNET0", Command::SetTelnet(false)),
    Rule::Exact("ATNET1", Command::SetTelnet(true)),
    Rule::Exact("ATNET?", Command::QueryTelnet),
    Rule::Exact("ATA", Command::Answer),
    Rule::Exact("AT?", Command::Help),
    Rule::Exact("ATHELP", Command::Help),
    Rule::Exact("ATZ", Command::Reload),
    Rule::Exact("ATC0", Command::WifiOff),
    Rule::Exact("ATC1", Command::WifiOn),
    Rule::Prefix("ATE", echo_switch),
    Rule::Prefix("ATV", verbose_switch),
    Rule::Prefix("AT&P", polarity_switch),
    Rule::Prefix("AT&K", flow_switch),
    Rule::Prefix("AT$SB=", set_baud),
    Rule::Exact("AT$SB?", Command::QueryBaud),
    Rule::Prefix("AT$BM=", set_busy_message),
    Rule::Exact("AT$BM?", Command::QueryBusyMessage),
    Rule::Exact("ATI", Command::NetworkInfo),
    Rule::Exact("AT&V", Command::ShowProfile),
    Rule::Exact("AT&W", Command::Save),
    Rule::Prefix("AT&Z", speed_dial_slot),
    Rule::Prefix("AT$SSID=", set_ssid),
    Rule::Exact("AT$SSID?", Command::QuerySsid),
    Rule::Prefix("AT$PASS=", set_password),
    Rule::Exact("AT$PASS?", Command::QueryPassword),
    Rule::Exact("AT&F", Command::FactoryReset),
    Rule::Exact("ATS0=0", Command::SetAutoAnswer(false)),
    Rule::Exact("ATS0=1", Command::SetAutoAnswer(true)),
    Rule::Exact("ATS0?", Command::QueryAutoAnswer),
    Rule::Exact("ATPET=0", Command::SetPetscii(false)),
    Rule::Exact("ATPET=1", Command::SetPetscii(true)),
    Rule::Exact("ATPET?", Command::QueryPetscii),
    Rule::Exact("ATHEX=0", Command::SetHexEcho(false)),
    Rule::Exact("ATHEX=1", Command::SetHexEcho(true)),
    Rule::Prefix("ATH", hangup),
    Rule::Prefix("AT$RB", restart),
    Rule::Exact("ATO", Command::Resume),
    Rule::Exact("ATX", Command::ExitModem),
    Rule::Prefix("AT$SP=", set_listen_port),
    Rule::Exact("AT$SP?", Command::QueryListenPort),
    Rule::Exact("AT$CON?", Command::ConsoleStatus),
    Rule::Exact("AT$CONDROP", Command::ConsoleDrop),
    Rule::Exact("ATIP?", Command::LocalIp),
    Rule::Prefix("ATGET", http_get),
];

/// Parses one trimmed command line into a [Command]
pub fn parse(line: &str) -> Command<'_> {
    for rule in GRAMMAR {
        match rule {
            Rule::Exact(pattern, command) => {
                if line.eq_ignore_ascii_case(pattern) {
                    return *command;
                }
            }
            Rule::Prefix(pattern, build) => {
                if line.len() >= pattern.len() && line[..pattern.len()].eq_ignore_ascii_case(pattern) {
                    if let Some(command) = build(&line[pattern.len()..]) {
                        return command;
                    }
                }
            }
        }
    }

    Command::Unknown
}

/// Resolves the text after a dial prefix into a [DialTarget]
pub fn dial_target(rest: &str) -> DialTarget<'_> {
    let target = rest.trim();

    if matches_any(target, &["SLIP", "7547", "*75", "*SLIP", "S"]) {
        return DialTarget::Slip;
    }

    if matches_any(target, &["PPP", "777", "*77", "*PPP", "P"]) {
        return DialTarget::Ppp;
    }

    if let Some(slot) = repeated_digit_slot(target) {
        return DialTarget::SpeedDial(slot);
    }

    let (host, port) = split_host_port(target);
    DialTarget::Host { host, port }
}

/// Splits a `host[:port]` string, defaulting to the Telnet port
pub fn split_host_port(target: &str) -> (&str, u16) {
    match target.rfind(':') {
        Some(index) => {
            let port = target[index + 1..].trim().parse().unwrap_or(0);
            (target[..index].trim(), port)
        }
        None => (target.trim(), DEFAULT_DIAL_PORT),
    }
}

fn matches_any(target: &str, options: &[&str]) -> bool {
    options.iter().any(|option| target.eq_ignore_ascii_case(option))
}

/// Legacy shorthand: seven identical digits select a speed dial slot
fn repeated_digit_slot(target: &str) -> Option<usize> {
    let bytes = target.as_bytes();
    if bytes.len() != 7 {
        return None;
    }

    let first = bytes[0];
    if !first.is_ascii_digit() || bytes.iter().any(|&byte| byte != first) {
        return None;
    }

    Some(usize::from(first - b'0'))
}

fn dial(rest: &str) -> Option<Command<'_>> {
    Some(Command::Dial(dial_target(rest)))
}

fn speed_dial(rest: &str) -> Option<Command<'_>> {
    let slot = *rest.as_bytes().first()?;
    if !slot.is_ascii_digit() {
        return None;
    }

    Some(Command::Dial(DialTarget::SpeedDial(usize::from(slot - b'0'))))
}

fn echo_switch(rest: &str) -> Option<Command<'_>> {
    match rest {
        "0" => Some(Command::SetEcho(false)),
        "1" => Some(Command::SetEcho(true)),
        "?" => Some(Command::QueryEcho),
        _ => None,
    }
}

fn verbose_switch(rest: &str) -> Option<Command<'_>> {
    match rest {
        "0" => Some(Command::SetVerbose(false)),
        "1" => Some(Command::SetVerbose(true)),
        "?" => Some(Command::QueryVerbose),
        _ => None,
    }
}

fn polarity_switch(rest: &str) -> Option<Command<'_>> {
    match rest {
        "0" => Some(Command::SetPolarity(PinPolarity::Inverted)),
        "1" => Some(Command::SetPolarity(PinPolarity::Normal)),
        "?" => Some(Command::QueryPolarity),
        _ => None,
    }
}

fn flow_switch(rest: &str) -> Option<Command<'_>> {
    match rest {
        "0" => Some(Command::SetFlowControl(FlowControlMode::None)),
        "1" => Some(Command::SetFlowControl(FlowControlMode::Hardware)),
        "2" => Some(Command::SetFlowControl(FlowControlMode::Software)),
        "?" => Some(Command::QueryFlowControl),
        _ => None,
    }
}

fn set_baud(rest: &str) -> Option<Command<'_>> {
    rest.trim().parse().ok().map(Command::SetBaud)
}

fn set_listen_port(rest: &str) -> Option<Command<'_>> {
    rest.trim().parse().ok().map(Command::SetListenPort)
}

fn set_busy_message(rest: &str) -> Option<Command<'_>> {
    Some(Command::SetBusyMessage(rest))
}

fn set_ssid(rest: &str) -> Option<Command<'_>> {
    Some(Command::SetSsid(rest))
}

fn set_password(rest: &str) -> Option<Command<'_>> {
    Some(Command::SetPassword(rest))
}

fn speed_dial_slot(rest: &str) -> Option<Command<'_>> {
    let slot = *rest.as_bytes().first()?;
    if !slot.is_ascii_digit() {
        return None;
    }
    let slot = usize::from(slot - b'0');

    match rest.as_bytes().get(1)? {
        b'=' => Some(Command::SetSpeedDial { slot, target: &rest[2..] }),
        b'?' => Some(Command::QuerySpeedDial(slot)),
        _ => None,
    }
}

fn hangup(_rest: &str) -> Option<Command<'_>> {
    Some(Command::Hangup)
}

fn restart(_rest: &str) -> Option<Command<'_>> {
    Some(Command::Restart)
}

fn http_get(rest: &str) -> Option<Command<'_>> {
    Some(Command::HttpGet(rest))
}
