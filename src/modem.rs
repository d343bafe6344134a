//! Modem engine
//!
//! [Modem] owns the whole emulation: the AT interpreter, the inbound
//! listener, the single outbound/answered call, the optional remote console
//! and the Command/Connected mode switch. The host firmware constructs it
//! over its platform types, calls [Modem::start] once and then
//! [Modem::poll] from its main loop; `poll` never blocks on the network and
//! only blocks on the serial port for bytes already reported ready.
//!
//! ## Example
//!
//! ```
//! use retromodem::example::{
//!     ExampleDisplay, ExampleGateway, ExampleLines, ExampleSerial, ExampleStack, ExampleStore,
//!     ExampleTimer,
//! };
//! use retromodem::modem::Modem;
//!
//! let mut modem: Modem<_, _, _, _, _, _, _, 1_000_000, 256> = Modem::new(
//!     ExampleSerial::default(),
//!     ExampleStack::default(),
//!     ExampleTimer::default(),
//!     ExampleLines::default(),
//!     ExampleDisplay::default(),
//!     ExampleGateway::default(),
//!     ExampleStore::default(),
//! );
//!
//! modem.start().unwrap();
//! modem.poll().unwrap();
//! ```

use crate::commands::{self, Command, DialTarget, MAX_COMMAND_LENGTH};
use crate::escape::EscapeDetector;
use crate::flow::{FlowController, HandshakeLines};
use crate::platform::{Display, NetworkControl, Transfer};
use crate::results::ResultCode;
use crate::serial::Configure;
use crate::settings::{self, Settings, SettingsStore};
use crate::telnet::{self, Decoded, TelnetCodec, CONSOLE_PREAMBLE};
use core::fmt::Write as FmtWrite;
use embedded_io::{ErrorType, Read, ReadReady, Write};
use core::net::{IpAddr, SocketAddr};
use embedded_nal::{AddrType, Dns, TcpClientStack, TcpFullStack};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use numtoa::NumToA;

/// Spacing between RING reports for an unanswered inbound caller
const RING_INTERVAL_MS: u32 = 6000;

/// Unanswered rings granted before a caller is rejected busy
const MAX_RINGS: u8 = 3;

/// Patience for the "press space" pager prompts
const WAIT_KEY_TIMEOUT_SECS: u32 = 30;

/// Pause between RING and CONNECT when auto-answering
const AUTO_ANSWER_DELAY_MS: u32 = 1000;

/// Drain time granted to the UART before an `AT$SB` rate switch
const BAUD_SETTLE_MS: u32 = 200;

/// Bytes read from the console socket per poll
const CONSOLE_CHUNK: usize = 16;

const CONSOLE_BANNER: &str = "\r\nRETROMODEM REMOTE CONSOLE READY\r\n";

const HELP_PAGE: &str = "COMMAND SUMMARY\r\n\
AT             ATTENTION\r\n\
ATDT HOST:PORT DIAL A HOST (ALSO ATDP/ATDI)\r\n\
ATDSN          DIAL SPEED DIAL SLOT N\r\n\
ATDTSLIP/PPP   START A SLIP OR PPP SESSION\r\n\
ATA            ANSWER AN INCOMING CALL\r\n\
ATH            HANG UP\r\n\
ATO            RETURN TO AN OPEN CALL\r\n\
+++            ESCAPE TO COMMAND MODE\r\n\
ATE0/1         COMMAND ECHO OFF/ON\r\n\
ATV0/1         NUMERIC/VERBOSE RESULTS\r\n\
ATNET0/1       TELNET TRANSLATION OFF/ON\r\n\
ATPET=0/1      PETSCII TRANSLATION OFF/ON\r\n\
ATS0=0/1       AUTO ANSWER OFF/ON";

const HELP_PAGE_TAIL: &str = "AT&K0/1/2      FLOW CONTROL NONE/RTS-CTS/RESERVED\r\n\
AT&P0/1        PIN POLARITY INVERTED/NORMAL\r\n\
AT&ZN=HOST     STORE SPEED DIAL N (AT&ZN? TO SHOW)\r\n\
AT$SSID=/PASS= WIFI CREDENTIALS\r\n\
ATC0/1         WIFI OFF/ON\r\n\
AT$SB=RATE     SERIAL RATE\r\n\
AT$SP=PORT     INBOUND LISTENER PORT\r\n\
AT$BM=TEXT     BUSY MESSAGE\r\n\
AT$CON?        SHOW CONSOLE SESSION (AT$CONDROP TO END IT)\r\n\
ATGETURL       FETCH AN HTTP URL\r\n\
ATI ATIP? AT&V INFO / IP / PROFILE\r\n\
ATZ AT&W AT&F  RELOAD / SAVE / FACTORY RESET\r\n\
AT$RB          REBOOT    ATX  EXIT TO MENU";

/// Engine mode, switched by dial/answer, `+++` and hang-up
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Serial input is interpreted as AT command lines
    Command,
    /// Serial input is bridged to the open call
    Connected,
}

/// What to print once the pager prompt is satisfied
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Continuation {
    HelpTail,
    StoredProfile,
}

#[derive(Copy, Clone, Debug)]
struct WaitKey<const TIMER_HZ: u32> {
    deadline: TimerInstantU32<TIMER_HZ>,
    next: Continuation,
}

/// Interpreter and line state, separate from the sockets so the two can be
/// borrowed independently
pub struct Session<const TIMER_HZ: u32> {
    pub mode: Mode,
    pub settings: Settings,
    pub(crate) cmd: heapless::String<MAX_COMMAND_LENGTH>,
    pub(crate) ring_count: u8,
    pub(crate) last_ring: Option<TimerInstantU32<TIMER_HZ>>,
    pub(crate) hex_echo: bool,
    wait: Option<WaitKey<TIMER_HZ>>,
}

impl<const TIMER_HZ: u32> Default for Session<TIMER_HZ> {
    fn default() -> Self {
        Self {
            mode: Mode::Command,
            settings: Settings::default(),
            cmd: heapless::String::new(),
            ring_count: 0,
            last_ring: None,
            hex_echo: false,
            wait: None,
        }
    }
}

/// The open data call
pub(crate) struct Call<SOCKET, const TIMER_HZ: u32> {
    pub(crate) socket: SOCKET,
    pub(crate) remote: SocketAddr,
    pub(crate) connected_at: TimerInstantU32<TIMER_HZ>,
    codec: TelnetCodec,
}

/// Attached remote console session
pub(crate) struct Console<SOCKET> {
    pub(crate) socket: SOCKET,
    pub(crate) remote: SocketAddr,
    codec: TelnetCodec,
}

/// Accepted inbound connection that has not been answered yet
pub(crate) struct Inbound<SOCKET> {
    pub(crate) socket: SOCKET,
    pub(crate) remote: SocketAddr,
}

/// Engine failure. Call-level network trouble is reported to the terminal as
/// `NO CARRIER` instead and never surfaces here.
#[derive(Debug)]
pub enum Error<SE, NE, PE> {
    /// Terminal port failed
    Serial(SE),
    /// Socket stack failed outside of a call
    Network(NE),
    /// Settings store failed
    Store(PE),
    /// Delay timer failed
    Timer,
}

pub type EngineError<S, N, P> = Error<
    <S as ErrorType>::Error,
    <N as TcpClientStack>::Error,
    <P as SettingsStore>::Error,
>;

/// Hayes modem emulation engine.
///
/// Generic over the serial port `S`, socket stack `N`, delay timer `T`,
/// handshake lines `L`, display `D`, network controller `C` and settings
/// store `P`. `TIMER_HZ` is the timer tick rate, `TX_SIZE` the bridge chunk
/// size (halved while Telnet translation is on, to leave room for IAC
/// doubling).
pub struct Modem<S, N, T, L, D, C, P, const TIMER_HZ: u32, const TX_SIZE: usize>
where
    N: TcpClientStack,
{
    pub(crate) serial: S,
    pub(crate) stack: N,
    pub(crate) timer: T,
    pub(crate) lines: L,
    pub(crate) display: D,
    pub(crate) network: C,
    pub(crate) store: P,
    pub(crate) session: Session<TIMER_HZ>,
    pub(crate) listener: Option<N::TcpSocket>,
    pub(crate) pending: Option<Inbound<N::TcpSocket>>,
    pub(crate) call: Option<Call<N::TcpSocket, TIMER_HZ>>,
    pub(crate) console: Option<Console<N::TcpSocket>>,
    escape: EscapeDetector<TIMER_HZ>,
    flow: FlowController,
    carrier_lost: bool,
}

impl<S, N, T, L, D, C, P, const TIMER_HZ: u32, const TX_SIZE: usize>
    Modem<S, N, T, L, D, C, P, TIMER_HZ, TX_SIZE>
where
    S: Read + ReadReady + Write + Configure,
    N: TcpClientStack + TcpFullStack + Dns,
    T: Timer<TIMER_HZ>,
    L: HandshakeLines,
    D: Display,
    C: NetworkControl,
    P: SettingsStore,
{
    pub fn new(serial: S, stack: N, timer: T, lines: L, display: D, network: C, store: P) -> Self {
        Self {
            serial,
            stack,
            timer,
            lines,
            display,
            network,
            store,
            session: Session::default(),
            listener: None,
            pending: None,
            call: None,
            console: None,
            escape: EscapeDetector::new(),
            flow: FlowController::default(),
            carrier_lost: false,
        }
    }

    /// Loads settings, joins WiFi if credentials are stored, opens the
    /// inbound listener and greets the terminal with `OK`.
    pub fn start(&mut self) -> Result<(), EngineError<S, N, P>> {
        self.session.settings = self.store.load().map_err(Error::Store)?;
        self.serial.set_baud(self.session.settings.baud());

        if !self.network.wifi_connected() && !self.session.settings.ssid.is_empty() {
            let ssid = self.session.settings.ssid.clone();
            let password = self.session.settings.password.clone();
            self.network.connect_wifi(&ssid, &password);
        }
        if self.network.wifi_connected() {
            self.display.show_wifi_icon();
        }

        let mut listener = self.stack.socket().map_err(Error::Network)?;
        self.stack
            .bind(&mut listener, self.session.settings.listen_port)
            .map_err(Error::Network)?;
        self.stack.listen(&mut listener).map_err(Error::Network)?;
        self.listener = Some(listener);

        let polarity = self.session.settings.pin_polarity;
        self.lines.set_carrier(false, polarity);
        self.display.show_message("MODEM READY");
        self.send_result(ResultCode::Ok)
    }

    /// One iteration of the engine. Call from the firmware main loop.
    pub fn poll(&mut self) -> Result<(), EngineError<S, N, P>> {
        let polarity = self.session.settings.pin_polarity;
        let flow_mode = self.session.settings.flow_control;
        self.flow.update(flow_mode, &mut self.lines, polarity);

        self.service_listener()?;

        match self.session.mode {
            Mode::Command => self.poll_command()?,
            Mode::Connected => {
                self.bridge_outbound()?;
                if !self.carrier_lost {
                    self.bridge_inbound()?;
                }
                let now = self.timer.now();
                if self.escape.triggered(now) {
                    self.session.mode = Mode::Command;
                    self.send_result(ResultCode::Ok)?;
                }
            }
        }

        if self.carrier_lost {
            self.carrier_lost = false;
            self.end_call()?;
        }

        self.serial.flush().map_err(Error::Serial)
    }

    // ---- inbound connections ------------------------------------------

    fn service_listener(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(listener) = self.listener.as_mut() else {
            return Ok(());
        };

        if self.pending.is_none() {
            match self.stack.accept(listener) {
                Ok((socket, remote)) => {
                    self.pending = Some(Inbound { socket, remote });
                    self.session.ring_count = 0;
                    self.session.last_ring = None;
                }
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(error)) => return Err(Error::Network(error)),
            }
        }

        if self.pending.is_none() {
            return Ok(());
        }

        if self.call.is_some() {
            return self.reject_busy_call();
        }

        // The first inbound client becomes the management console
        if self.console.is_none() {
            return self.attach_console();
        }

        if self.session.settings.auto_answer {
            return self.answer_with_ring();
        }

        if self.session.ring_count > MAX_RINGS {
            return self.reject_busy_console();
        }

        self.ring_unanswered()
    }

    /// Busy message plus the running call length, then disconnect
    fn reject_busy_call(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(inbound) = self.pending.take() else {
            return Ok(());
        };
        let seconds = self.call_duration_secs();
        let message = self.session.settings.busy_message.clone();

        let mut socket = inbound.socket;
        let _ = Self::socket_write(&mut self.stack, &mut socket, message.as_bytes());
        let mut line = heapless::String::<48>::new();
        let _ = write!(line, "\r\nCURRENT CALL LENGTH: {}\r\n", format_duration(seconds));
        let _ = Self::socket_write(&mut self.stack, &mut socket, line.as_bytes());
        let _ = self.stack.close(socket);
        Ok(())
    }

    /// Ringed out while the console holds the line
    fn reject_busy_console(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(inbound) = self.pending.take() else {
            return Ok(());
        };
        self.session.ring_count = 0;
        self.session.last_ring = None;
        let mut socket = inbound.socket;
        let _ = Self::socket_write(&mut self.stack, &mut socket, b"BUSY - CONSOLE IN USE\r\n");
        let _ = self.stack.close(socket);
        Ok(())
    }

    /// RING every six seconds until answered, rejected or picked up with
    /// `ATA`. Only reached while a console is already attached.
    fn ring_unanswered(&mut self) -> Result<(), EngineError<S, N, P>> {
        let now = self.timer.now();
        let due = match self.session.last_ring {
            None => true,
            Some(last) => now
                .checked_duration_since(last)
                .map(|elapsed| elapsed.to_millis() >= RING_INTERVAL_MS)
                .unwrap_or(false),
        };
        if !due {
            return Ok(());
        }

        self.session.last_ring = Some(now);
        self.session.ring_count += 1;
        self.display.show_message("RING");
        self.send_result(ResultCode::Ring)
    }

    /// First inbound client: banner plus negotiation preamble, the engine
    /// stays in Command mode. The console is a typing terminal, not a call.
    fn attach_console(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(inbound) = self.pending.take() else {
            return Ok(());
        };
        self.session.ring_count = 0;
        self.session.last_ring = None;

        let mut socket = inbound.socket;
        let _ = Self::socket_write(&mut self.stack, &mut socket, &CONSOLE_PREAMBLE);
        let _ = Self::socket_write(&mut self.stack, &mut socket, CONSOLE_BANNER.as_bytes());
        self.console = Some(Console {
            socket,
            remote: inbound.remote,
            codec: TelnetCodec::new(),
        });
        self.send_notice("CONSOLE CONNECTED")
    }

    /// Auto-answer: `RING <remote-ip>`, a short pause, then the call
    fn answer_with_ring(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(remote) = self.pending.as_ref().map(|inbound| inbound.remote) else {
            return Ok(());
        };
        let mut line = heapless::String::<48>::new();
        let _ = write!(line, "RING {}", remote.ip());
        self.send_notice(&line)?;
        self.pause(TimerDurationU32::<TIMER_HZ>::millis(AUTO_ANSWER_DELAY_MS))?;
        self.answer()
    }

    /// `ATA` and the auto-answer path
    fn answer(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(inbound) = self.pending.take() else {
            return self.send_result(ResultCode::Error);
        };
        self.session.ring_count = 0;
        self.session.last_ring = None;
        self.establish_call(inbound.socket, inbound.remote)
    }

    // ---- command mode -------------------------------------------------

    fn poll_command(&mut self) -> Result<(), EngineError<S, N, P>> {
        if self.session.wait.is_some() {
            return self.poll_wait();
        }

        while self.serial.read_ready().map_err(Error::Serial)? {
            let mut byte = [0u8; 1];
            if self.serial.read(&mut byte).map_err(Error::Serial)? == 0 {
                break;
            }
            self.handle_command_byte(byte[0])?;
            if self.session.mode != Mode::Command || self.session.wait.is_some() {
                return Ok(());
            }
        }

        self.poll_console_command()
    }

    /// Console keystrokes reach the same interpreter as the serial port,
    /// after IAC servicing
    fn poll_console_command(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some((data, replies, closed)) = self.drain_console() else {
            return Ok(());
        };

        if let Some(console) = self.console.as_mut() {
            if !replies.is_empty()
                && Self::socket_write(&mut self.stack, &mut console.socket, &replies).is_err()
            {
                self.drop_console();
                return self.send_notice("CONSOLE DISCONNECTED");
            }
        }

        for &byte in data.iter() {
            self.handle_command_byte(byte)?;
            if self.session.mode != Mode::Command || self.session.wait.is_some() {
                return Ok(());
            }
        }

        if closed {
            self.drop_console();
            self.send_notice("CONSOLE DISCONNECTED")?;
        }
        Ok(())
    }

    /// Reads one chunk from the console through its IAC codec. Returns the
    /// payload bytes, the pending negotiation replies and whether the peer
    /// closed. `None` when no console is attached or nothing is readable.
    fn drain_console(
        &mut self,
    ) -> Option<(heapless::Vec<u8, CONSOLE_CHUNK>, heapless::Vec<u8, 48>, bool)> {
        let console = self.console.as_mut()?;
        let mut buffer = [0u8; CONSOLE_CHUNK];
        let mut data = heapless::Vec::new();
        let mut replies = heapless::Vec::new();
        let mut closed = false;

        match self.stack.receive(&mut console.socket, &mut buffer) {
            Ok(0) => closed = true,
            Ok(count) => {
                for &byte in &buffer[..count] {
                    match console.codec.decode(byte) {
                        Decoded::Data(byte) => {
                            let _ = data.push(byte);
                        }
                        Decoded::Reply(reply) => {
                            let _ = replies.extend_from_slice(&reply);
                        }
                        Decoded::Pending | Decoded::Consumed => {}
                    }
                }
            }
            Err(nb::Error::WouldBlock) => return None,
            Err(nb::Error::Other(_)) => closed = true,
        }

        Some((data, replies, closed))
    }

    fn drop_console(&mut self) {
        if let Some(console) = self.console.take() {
            let _ = self.stack.close(console.socket);
        }
    }

    fn handle_command_byte(&mut self, byte: u8) -> Result<(), EngineError<S, N, P>> {
        let petscii = self.session.settings.petscii;
        let byte = if petscii && byte > 127 {
            byte - 128
        } else if !petscii && (193..=218).contains(&byte) {
            // Unshifted PETSCII letters from terminals not yet in PETSCII mode
            byte - 96
        } else {
            byte
        };

        match byte {
            b'\r' | b'\n' => {
                self.echo_byte(byte)?;
                self.dispatch()
            }
            0x08 | 0x7F | 0x14 => {
                if self.session.cmd.pop().is_some() && self.session.settings.echo {
                    self.write_terminal(&[0x08, b' ', 0x08])?;
                }
                Ok(())
            }
            _ => {
                if byte.is_ascii() && self.session.cmd.len() < MAX_COMMAND_LENGTH {
                    let _ = self.session.cmd.push(byte as char);
                }
                self.echo_byte(byte)
            }
        }
    }

    fn echo_byte(&mut self, byte: u8) -> Result<(), EngineError<S, N, P>> {
        if self.session.hex_echo {
            let mut digits = [0u8; 20];
            let text = byte.numtoa_str(16, &mut digits);
            if text.len() == 1 {
                self.write_terminal(b"0")?;
            }
            self.write_terminal(text.as_bytes())?;
            self.write_terminal(b" ")
        } else if self.session.settings.echo {
            self.write_terminal(&[byte])
        } else {
            Ok(())
        }
    }

    fn dispatch(&mut self) -> Result<(), EngineError<S, N, P>> {
        let raw = self.session.cmd.clone();
        self.session.cmd.clear();
        let line = raw.trim();
        if line.is_empty() {
            return Ok(());
        }

        match commands::parse(line) {
            Command::Attention => self.send_result(ResultCode::Ok),
            Command::Dial(target) => self.dial(target),
            Command::Answer => self.answer(),
            Command::Hangup => self.hang_up(),
            Command::Resume => self.resume(),
            Command::Help => {
                self.send_line(HELP_PAGE)?;
                self.prompt_more(Continuation::HelpTail)
            }
            Command::Reload => {
                self.session.settings = self.store.load().map_err(Error::Store)?;
                self.send_result(ResultCode::Ok)
            }
            Command::Save => {
                self.store.save(&self.session.settings).map_err(Error::Store)?;
                self.send_result(ResultCode::Ok)
            }
            Command::FactoryReset => {
                self.session.settings = self.store.reset_to_defaults().map_err(Error::Store)?;
                self.send_result(ResultCode::Ok)
            }
            Command::ShowProfile => {
                self.send_line("ACTIVE PROFILE:")?;
                self.print_profile(self.session.settings.clone())?;
                self.prompt_more(Continuation::StoredProfile)
            }
            Command::NetworkInfo => self.network_info(),
            Command::LocalIp => {
                match self.network.local_ip() {
                    Some(ip) => self.send_display_line(ip)?,
                    None => self.send_line("0.0.0.0")?,
                }
                self.send_result(ResultCode::Ok)
            }
            Command::WifiOn => {
                let ssid = self.session.settings.ssid.clone();
                let password = self.session.settings.password.clone();
                if self.network.connect_wifi(&ssid, &password) {
                    self.display.show_wifi_icon();
                    self.send_result(ResultCode::Ok)
                } else {
                    self.send_result(ResultCode::Error)
                }
            }
            Command::WifiOff => {
                self.network.disconnect_wifi();
                self.send_result(ResultCode::Ok)
            }
            Command::SetEcho(on) => {
                self.session.settings.echo = on;
                self.send_result(ResultCode::Ok)
            }
            Command::QueryEcho => self.query_flag(self.session.settings.echo),
            Command::SetVerbose(on) => {
                self.session.settings.verbose = on;
                self.send_result(ResultCode::Ok)
            }
            Command::QueryVerbose => self.query_flag(self.session.settings.verbose),
            Command::SetTelnet(on) => {
                self.session.settings.telnet = on;
                self.send_result(ResultCode::Ok)
            }
            Command::QueryTelnet => self.query_flag(self.session.settings.telnet),
            Command::SetPetscii(on) => {
                self.session.settings.petscii = on;
                self.send_result(ResultCode::Ok)
            }
            Command::QueryPetscii => self.query_flag(self.session.settings.petscii),
            Command::SetHexEcho(on) => {
                self.session.hex_echo = on;
                self.send_result(ResultCode::Ok)
            }
            Command::SetAutoAnswer(on) => {
                self.session.settings.auto_answer = on;
                self.send_result(ResultCode::Ok)
            }
            Command::QueryAutoAnswer => self.query_flag(self.session.settings.auto_answer),
            Command::SetPolarity(polarity) => {
                self.session.settings.pin_polarity = polarity;
                let carrier = self.call.is_some();
                self.lines.set_carrier(carrier, polarity);
                self.send_result(ResultCode::Ok)
            }
            Command::QueryPolarity => self.query_digit(self.session.settings.pin_polarity.code()),
            Command::SetFlowControl(mode) => {
                self.session.settings.flow_control = mode;
                self.send_result(ResultCode::Ok)
            }
            Command::QueryFlowControl => self.query_digit(self.session.settings.flow_control.code()),
            Command::SetSpeedDial { slot, target } => {
                self.session.settings.speed_dials[slot] = settings::truncated(target.trim());
                self.send_result(ResultCode::Ok)
            }
            Command::QuerySpeedDial(slot) => {
                let stored = self.session.settings.speed_dials[slot].clone();
                self.send_line(&stored)?;
                self.send_result(ResultCode::Ok)
            }
            Command::SetSsid(ssid) => {
                self.session.settings.ssid = settings::truncated(ssid.trim());
                self.send_result(ResultCode::Ok)
            }
            Command::QuerySsid => {
                let ssid = self.session.settings.ssid.clone();
                self.send_line(&ssid)?;
                self.send_result(ResultCode::Ok)
            }
            Command::SetPassword(password) => {
                self.session.settings.password = settings::truncated(password.trim());
                self.send_result(ResultCode::Ok)
            }
            Command::QueryPassword => {
                let password = self.session.settings.password.clone();
                self.send_line(&password)?;
                self.send_result(ResultCode::Ok)
            }
            Command::SetBaud(baud) => self.set_baud(baud),
            Command::QueryBaud => self.query_number(self.session.settings.baud()),
            Command::SetListenPort(port) => {
                self.session.settings.listen_port = port;
                self.send_line("CHANGE REQUIRES NV SAVE (AT&W) AND RESTART")?;
                self.send_result(ResultCode::Ok)
            }
            Command::QueryListenPort => self.query_number(u32::from(self.session.settings.listen_port)),
            Command::SetBusyMessage(message) => {
                self.session.settings.busy_message = settings::truncated(message.trim());
                self.send_result(ResultCode::Ok)
            }
            Command::QueryBusyMessage => {
                let message = self.session.settings.busy_message.clone();
                self.send_line(&message)?;
                self.send_result(ResultCode::Ok)
            }
            Command::ConsoleStatus => {
                match self.console.as_ref().map(|console| console.remote) {
                    Some(remote) => self.send_display_line(remote)?,
                    None => self.send_line("NO CONSOLE SESSION")?,
                }
                self.send_result(ResultCode::Ok)
            }
            Command::ConsoleDrop => {
                self.drop_console();
                self.send_result(ResultCode::Ok)
            }
            Command::HttpGet(url) => self.http_get(url),
            Command::Restart => {
                self.send_line("REBOOTING")?;
                self.serial.flush().map_err(Error::Serial)?;
                self.network.restart()
            }
            Command::ExitModem => {
                self.send_result(ResultCode::Ok)?;
                self.serial.flush().map_err(Error::Serial)?;
                self.network.exit_to_menu();
                Ok(())
            }
            Command::Unknown => self.send_result(ResultCode::Error),
        }
    }

    fn query_flag(&mut self, on: bool) -> Result<(), EngineError<S, N, P>> {
        self.query_number(u32::from(on))
    }

    fn query_digit(&mut self, digit: u8) -> Result<(), EngineError<S, N, P>> {
        self.query_number(u32::from(digit))
    }

    fn query_number(&mut self, value: u32) -> Result<(), EngineError<S, N, P>> {
        let mut digits = [0u8; 20];
        let text = value.numtoa_str(10, &mut digits);
        self.write_terminal(text.as_bytes())?;
        self.write_terminal(b"\r\n")?;
        self.send_result(ResultCode::Ok)
    }

    fn prompt_more(&mut self, next: Continuation) -> Result<(), EngineError<S, N, P>> {
        self.send_line("PRESS SPACE FOR MORE")?;
        let deadline =
            self.timer.now() + TimerDurationU32::<TIMER_HZ>::secs(WAIT_KEY_TIMEOUT_SECS);
        self.session.wait = Some(WaitKey { deadline, next });
        Ok(())
    }

    /// Swallows input until space or the timeout, then prints the pending
    /// page
    fn poll_wait(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(wait) = self.session.wait else {
            return Ok(());
        };

        let mut fire = self
            .timer
            .now()
            .checked_duration_since(wait.deadline)
            .is_some();

        while self.serial.read_ready().map_err(Error::Serial)? {
            let mut byte = [0u8; 1];
            if self.serial.read(&mut byte).map_err(Error::Serial)? == 0 {
                break;
            }
            if byte[0] == b' ' {
                fire = true;
            }
        }

        if !fire {
            return Ok(());
        }
        self.session.wait = None;

        match wait.next {
            Continuation::HelpTail => self.send_line(HELP_PAGE_TAIL)?,
            Continuation::StoredProfile => {
                let stored = self.store.load().map_err(Error::Store)?;
                self.send_line("STORED PROFILE:")?;
                self.print_profile(stored)?;
            }
        }
        self.send_result(ResultCode::Ok)
    }

    fn print_profile(&mut self, settings: Settings) -> Result<(), EngineError<S, N, P>> {
        let mut line = heapless::String::<128>::new();
        let _ = write!(line, "BAUD: {}", settings.baud());
        self.send_line(&line)?;

        line.clear();
        let _ = write!(line, "SSID: {}", settings.ssid);
        self.send_line(&line)?;

        line.clear();
        let _ = write!(
            line,
            "E{} V{} &K{} &P{} NET{} PET{} S0={}",
            u8::from(settings.echo),
            u8::from(settings.verbose),
            settings.flow_control.code(),
            settings.pin_polarity.code(),
            u8::from(settings.telnet),
            u8::from(settings.petscii),
            u8::from(settings.auto_answer),
        );
        self.send_line(&line)?;

        line.clear();
        let _ = write!(line, "LISTEN PORT: {}", settings.listen_port);
        self.send_line(&line)?;

        line.clear();
        let _ = write!(line, "BUSY MSG: {}", settings.busy_message);
        self.send_line(&line)?;

        for (slot, dial) in settings.speed_dials.iter().enumerate() {
            line.clear();
            let _ = write!(line, "{}: {}", slot, dial);
            self.send_line(&line)?;
        }
        Ok(())
    }

    fn network_info(&mut self) -> Result<(), EngineError<S, N, P>> {
        if self.network.wifi_connected() {
            self.send_line("WIFI: CONNECTED")?;
        } else {
            self.send_line("WIFI: NOT CONNECTED")?;
        }

        let mut line = heapless::String::<96>::new();
        let _ = write!(line, "SSID: {}", self.session.settings.ssid);
        self.send_line(&line)?;

        line.clear();
        match self.network.local_ip() {
            Some(ip) => {
                let _ = write!(line, "IP: {}", ip);
            }
            None => {
                let _ = line.push_str("IP: 0.0.0.0");
            }
        }
        self.send_line(&line)?;

        line.clear();
        let _ = write!(line, "LISTEN PORT: {}", self.session.settings.listen_port);
        self.send_line(&line)?;

        line.clear();
        match self.call.as_ref().map(|call| call.remote) {
            Some(remote) => {
                let _ = write!(line, "CALL: {}", remote);
            }
            None => {
                let _ = line.push_str("CALL: NONE");
            }
        }
        self.send_line(&line)?;

        self.send_result(ResultCode::Ok)
    }

    fn set_baud(&mut self, baud: u32) -> Result<(), EngineError<S, N, P>> {
        if !self.session.settings.set_baud(baud) {
            return self.send_result(ResultCode::Error);
        }
        self.send_result(ResultCode::Ok)?;
        self.serial.flush().map_err(Error::Serial)?;
        self.pause(TimerDurationU32::<TIMER_HZ>::millis(BAUD_SETTLE_MS))?;
        self.serial.set_baud(baud);
        Ok(())
    }

    // ---- dialing ------------------------------------------------------

    fn dial(&mut self, target: DialTarget<'_>) -> Result<(), EngineError<S, N, P>> {
        if self.call.is_some() {
            return self.send_result(ResultCode::Error);
        }

        match target {
            DialTarget::Host { host, port } => self.dial_host(host, port),
            DialTarget::SpeedDial(slot) => {
                let stored = self.session.settings.speed_dials[slot].clone();
                if stored.is_empty() {
                    return self.send_result(ResultCode::Error);
                }
                let (host, port) = commands::split_host_port(&stored);
                self.dial_host(host, port)
            }
            DialTarget::Slip => self.enter_gateway(true),
            DialTarget::Ppp => self.enter_gateway(false),
        }
    }

    fn dial_host(&mut self, host: &str, port: u16) -> Result<(), EngineError<S, N, P>> {
        if host.is_empty() || port == 0 {
            return self.send_result(ResultCode::Error);
        }

        let mut line = heapless::String::<96>::new();
        let _ = write!(line, "DIALING {}:{}", host, port);
        self.send_line(&line)?;
        self.serial.flush().map_err(Error::Serial)?;

        // A dead hostname is just a number nobody picks up
        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => match nb::block!(self.stack.get_host_by_name(host, AddrType::IPv4)) {
                Ok(ip) => ip,
                Err(_) => return self.send_result(ResultCode::NoAnswer),
            },
        };

        let mut socket = self.stack.socket().map_err(Error::Network)?;
        let remote = SocketAddr::new(ip, port);
        match nb::block!(self.stack.connect(&mut socket, remote)) {
            Ok(()) => self.establish_call(socket, remote),
            Err(_) => {
                let _ = self.stack.close(socket);
                self.send_result(ResultCode::NoAnswer)
            }
        }
    }

    /// `ATDTSLIP` / `ATDTPPP`: hand the link to the host gateway, report
    /// `NO CARRIER` when it returns
    fn enter_gateway(&mut self, slip: bool) -> Result<(), EngineError<S, N, P>> {
        if !self.network.wifi_connected() {
            self.send_line("WIFI NOT CONNECTED")?;
            return self.send_result(ResultCode::NoCarrier);
        }

        if slip {
            self.send_line("CONNECT SLIP")?;
            self.send_line("GATEWAY: 192.168.7.1")?;
            self.send_line("CLIENT: 192.168.7.2")?;
        } else {
            self.send_line("CONNECT PPP")?;
        }
        self.serial.flush().map_err(Error::Serial)?;

        if slip {
            self.network.enter_slip();
        } else {
            self.network.enter_ppp();
        }
        self.send_result(ResultCode::NoCarrier)
    }

    fn establish_call(
        &mut self,
        socket: N::TcpSocket,
        remote: SocketAddr,
    ) -> Result<(), EngineError<S, N, P>> {
        let connected_at = self.timer.now();
        self.call = Some(Call {
            socket,
            remote,
            connected_at,
            codec: TelnetCodec::new(),
        });
        self.session.mode = Mode::Connected;
        self.escape.reset();
        let polarity = self.session.settings.pin_polarity;
        self.lines.set_carrier(true, polarity);

        let mut overlay = heapless::String::<48>::new();
        let _ = write!(overlay, "{}", remote);
        self.display.show_call_icon();
        self.display.show_connected_overlay(&overlay);

        self.send_result(ResultCode::Connect)
    }

    /// `ATH`. A plain `NO CARRIER` when no call was up, the timed variant
    /// otherwise. The console session is left alone.
    fn hang_up(&mut self) -> Result<(), EngineError<S, N, P>> {
        if self.call.is_some() {
            self.end_call()
        } else {
            self.send_result(ResultCode::NoCarrier)
        }
    }

    /// `ATO`
    fn resume(&mut self) -> Result<(), EngineError<S, N, P>> {
        if self.call.is_none() {
            return self.send_result(ResultCode::Error);
        }
        self.session.mode = Mode::Connected;
        self.escape.reset();
        self.send_result(ResultCode::Connect)
    }

    fn http_get(&mut self, url: &str) -> Result<(), EngineError<S, N, P>> {
        let Some(rest) = strip_scheme(url) else {
            return self.send_result(ResultCode::Error);
        };

        let (location, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };
        let (host, port) = match location.rfind(':') {
            Some(index) => (
                &location[..index],
                location[index + 1..].parse().unwrap_or(0),
            ),
            None => (location, 80),
        };
        if host.is_empty() || port == 0 {
            return self.send_result(ResultCode::Error);
        }

        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => match nb::block!(self.stack.get_host_by_name(host, AddrType::IPv4)) {
                Ok(ip) => ip,
                Err(_) => return self.send_result(ResultCode::Error),
            },
        };

        let mut socket = self.stack.socket().map_err(Error::Network)?;
        let remote = SocketAddr::new(ip, port);
        if nb::block!(self.stack.connect(&mut socket, remote)).is_err() {
            let _ = self.stack.close(socket);
            return self.send_result(ResultCode::NoCarrier);
        }

        self.establish_call(socket, remote)?;

        let Some(call) = self.call.as_mut() else {
            return Ok(());
        };
        let request = [
            b"GET ",
            path.as_bytes(),
            b" HTTP/1.1\r\nHost: ",
            host.as_bytes(),
            b"\r\nConnection: close\r\n\r\n",
        ];
        for part in request {
            if Self::socket_write(&mut self.stack, &mut call.socket, part).is_err() {
                self.carrier_lost = true;
                break;
            }
        }
        Ok(())
    }

    // ---- connected mode -----------------------------------------------

    /// Terminal (and console) to network. Escape detection sees the raw
    /// terminal bytes, then PETSCII folding, then IAC doubling.
    fn bridge_outbound(&mut self) -> Result<(), EngineError<S, N, P>> {
        let telnet = self.session.settings.telnet;
        let petscii = self.session.settings.petscii;
        let limit = if telnet { TX_SIZE / 2 } else { TX_SIZE };
        let mut chunk: heapless::Vec<u8, TX_SIZE> = heapless::Vec::new();

        while chunk.len() < limit && self.serial.read_ready().map_err(Error::Serial)? {
            let mut byte = [0u8; 1];
            if self.serial.read(&mut byte).map_err(Error::Serial)? == 0 {
                break;
            }
            let byte = byte[0];
            let now = self.timer.now();
            self.escape.observe(byte, now);
            self.display.transcript(byte, Transfer::Send);
            let byte = if petscii && byte > 127 { byte - 128 } else { byte };
            let _ = chunk.push(byte);
        }

        // Console keystrokes join the outbound stream, minus IAC traffic.
        // Held back while the serial bytes fill the send budget, so the
        // chunk never exceeds `limit` and IAC doubling cannot overflow.
        if limit.saturating_sub(chunk.len()) >= CONSOLE_CHUNK {
            if let Some((data, replies, closed)) = self.drain_console() {
                if let Some(console) = self.console.as_mut() {
                    if !replies.is_empty() {
                        let _ = Self::socket_write(&mut self.stack, &mut console.socket, &replies);
                    }
                }
                for &byte in data.iter() {
                    let byte = if petscii && byte > 127 { byte - 128 } else { byte };
                    let _ = chunk.push(byte);
                }
                if closed {
                    self.drop_console();
                }
            }
        }

        if chunk.is_empty() {
            return Ok(());
        }
        if telnet {
            telnet::escape(&mut chunk);
        }

        if let Some(call) = self.call.as_mut() {
            if Self::socket_write(&mut self.stack, &mut call.socket, &chunk).is_err() {
                self.carrier_lost = true;
            }
        }
        Ok(())
    }

    /// Network to terminal, one byte at a time so flow control reacts
    /// mid-stream
    fn bridge_inbound(&mut self) -> Result<(), EngineError<S, N, P>> {
        let telnet = self.session.settings.telnet;
        let polarity = self.session.settings.pin_polarity;
        let flow_mode = self.session.settings.flow_control;
        let mut forwarded = 0usize;

        while forwarded < TX_SIZE {
            self.flow.update(flow_mode, &mut self.lines, polarity);
            if self.flow.paused() {
                break;
            }

            let Some(call) = self.call.as_mut() else {
                break;
            };
            let mut byte = [0u8; 1];
            match self.stack.receive(&mut call.socket, &mut byte) {
                Ok(0) => {
                    self.carrier_lost = true;
                    break;
                }
                Ok(_) => {
                    let byte = byte[0];
                    let decoded = if telnet {
                        call.codec.decode(byte)
                    } else {
                        Decoded::Data(byte)
                    };
                    match decoded {
                        Decoded::Data(data) => {
                            forwarded += 1;
                            self.display.transcript(data, Transfer::Recv);
                            self.write_terminal(&[data])?;
                        }
                        Decoded::Reply(reply) => {
                            if Self::socket_write(&mut self.stack, &mut call.socket, &reply)
                                .is_err()
                            {
                                self.carrier_lost = true;
                                break;
                            }
                        }
                        Decoded::Pending | Decoded::Consumed => {}
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    self.carrier_lost = true;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Closes the call, drops carrier and reports the timed `NO CARRIER`
    fn end_call(&mut self) -> Result<(), EngineError<S, N, P>> {
        let Some(call) = self.call.take() else {
            return Ok(());
        };
        let seconds = self
            .timer
            .now()
            .checked_duration_since(call.connected_at)
            .map(|elapsed| elapsed.to_secs())
            .unwrap_or(0);
        let _ = self.stack.close(call.socket);

        self.session.mode = Mode::Command;
        self.escape.reset();
        let polarity = self.session.settings.pin_polarity;
        self.lines.set_carrier(false, polarity);
        self.display.show_message("CALL ENDED");

        self.send_no_carrier(seconds)
    }

    fn call_duration_secs(&mut self) -> u32 {
        let Some(call) = self.call.as_ref() else {
            return 0;
        };
        let connected_at = call.connected_at;
        self.timer
            .now()
            .checked_duration_since(connected_at)
            .map(|elapsed| elapsed.to_secs())
            .unwrap_or(0)
    }

    // ---- terminal output ----------------------------------------------

    /// Writes to the serial port and mirrors to the console session
    fn write_terminal(&mut self, data: &[u8]) -> Result<(), EngineError<S, N, P>> {
        self.serial.write_all(data).map_err(Error::Serial)?;

        if let Some(console) = self.console.as_mut() {
            if Self::socket_write(&mut self.stack, &mut console.socket, data).is_err() {
                self.drop_console();
            }
        }
        Ok(())
    }

    fn send_line(&mut self, text: &str) -> Result<(), EngineError<S, N, P>> {
        self.write_terminal(text.as_bytes())?;
        self.write_terminal(b"\r\n")
    }

    fn send_display_line(&mut self, value: impl core::fmt::Display) -> Result<(), EngineError<S, N, P>> {
        let mut line = heapless::String::<48>::new();
        let _ = write!(line, "{}", value);
        self.send_line(&line)
    }

    /// Blank line, message, blank line; used for unsolicited notices
    fn send_notice(&mut self, text: &str) -> Result<(), EngineError<S, N, P>> {
        self.write_terminal(b"\r\n")?;
        self.send_line(text)
    }

    fn send_result(&mut self, code: ResultCode) -> Result<(), EngineError<S, N, P>> {
        self.write_terminal(b"\r\n")?;
        if self.session.settings.verbose {
            self.write_terminal(code.text().as_bytes())?;
            if code == ResultCode::Connect {
                let mut line = heapless::String::<16>::new();
                let _ = write!(line, " {}", self.session.settings.baud());
                self.write_terminal(line.as_bytes())?;
            }
        } else {
            let mut digits = [0u8; 20];
            let text = code.code().numtoa_str(10, &mut digits);
            self.write_terminal(text.as_bytes())?;
        }
        self.write_terminal(b"\r\n")
    }

    /// `NO CARRIER` with the call length appended in verbose mode
    fn send_no_carrier(&mut self, seconds: u32) -> Result<(), EngineError<S, N, P>> {
        if !self.session.settings.verbose {
            return self.send_result(ResultCode::NoCarrier);
        }
        self.write_terminal(b"\r\n")?;
        let mut line = heapless::String::<32>::new();
        let _ = write!(line, "NO CARRIER ({})", format_duration(seconds));
        self.write_terminal(line.as_bytes())?;
        self.write_terminal(b"\r\n")
    }

    fn pause(&mut self, duration: TimerDurationU32<TIMER_HZ>) -> Result<(), EngineError<S, N, P>> {
        self.timer.start(duration).map_err(|_| Error::Timer)?;
        nb::block!(self.timer.wait()).map_err(|_| Error::Timer)
    }

    /// Sends the whole buffer, blocking on `WouldBlock`
    fn socket_write(
        stack: &mut N,
        socket: &mut N::TcpSocket,
        data: &[u8],
    ) -> Result<(), <N as TcpClientStack>::Error> {
        let mut offset = 0;
        while offset < data.len() {
            let sent = nb::block!(stack.send(socket, &data[offset..]))?;
            if sent == 0 {
                break;
            }
            offset += sent;
        }
        Ok(())
    }
}

/// `HH:MM:SS`, zero padded
fn format_duration(seconds: u32) -> heapless::String<16> {
    let mut out = heapless::String::new();
    let _ = write!(
        out,
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    );
    out
}

/// Accepts `http://` in any case, rejects everything else
fn strip_scheme(url: &str) -> Option<&str> {
    const SCHEME: &str = "http://";
    if url.len() > SCHEME.len() && url[..SCHEME.len()].eq_ignore_ascii_case(SCHEME) {
        Some(&url[SCHEME.len()..])
    } else {
        None
    }
}
