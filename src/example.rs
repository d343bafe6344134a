//! Mock implementations for the documentation examples.
//!
//! Everything here is deliberately inert: the serial port starts empty, the
//! socket stack accepts nobody and the timer just ticks. Real firmware wires
//! the engine to its platform types instead. The module is behind the
//! default `examples` feature and can be disabled for production builds.

use crate::flow::{HandshakeLines, PinPolarity};
use crate::platform::{Display, NetworkControl};
use crate::serial::Configure;
use crate::settings::{Settings, SettingsStore};
use core::convert::Infallible;
use core::net::{IpAddr, Ipv4Addr, SocketAddr};
use embedded_nal::{AddrType, Dns, TcpClientStack, TcpError, TcpErrorKind, TcpFullStack};
use fugit::{TimerDurationU32, TimerInstantU32};

/// Loopback serial port
#[derive(Default)]
pub struct ExampleSerial {
    input: heapless::Deque<u8, 64>,
    output: heapless::Vec<u8, 1024>,
    baud: Option<u32>,
}

impl ExampleSerial {
    /// Queues bytes for the engine to read
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            let _ = self.input.push_back(byte);
        }
    }

    /// Everything the engine wrote so far
    pub fn written(&self) -> &[u8] {
        &self.output
    }

    pub fn baud(&self) -> Option<u32> {
        self.baud
    }
}

impl embedded_io::ErrorType for ExampleSerial {
    type Error = Infallible;
}

impl embedded_io::ReadReady for ExampleSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.input.is_empty())
    }
}

impl embedded_io::Read for ExampleSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        while count < buf.len() {
            match self.input.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl embedded_io::Write for ExampleSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let _ = self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Configure for ExampleSerial {
    fn set_baud(&mut self, baud: u32) {
        self.baud = Some(baud);
    }
}

#[derive(Debug)]
pub struct ExampleNetworkError;

impl TcpError for ExampleNetworkError {
    fn kind(&self) -> TcpErrorKind {
        TcpErrorKind::Other
    }
}

/// Socket stack with no peers: outbound connects succeed and swallow data,
/// nothing ever arrives
#[derive(Default)]
pub struct ExampleStack {
    next_socket: u8,
}

impl TcpClientStack for ExampleStack {
    type TcpSocket = u8;
    type Error = ExampleNetworkError;

    fn socket(&mut self) -> Result<Self::TcpSocket, Self::Error> {
        self.next_socket += 1;
        Ok(self.next_socket)
    }

    fn connect(
        &mut self,
        _socket: &mut Self::TcpSocket,
        _remote: SocketAddr,
    ) -> nb::Result<(), Self::Error> {
        Ok(())
    }

    fn send(
        &mut self,
        _socket: &mut Self::TcpSocket,
        buffer: &[u8],
    ) -> nb::Result<usize, Self::Error> {
        Ok(buffer.len())
    }

    fn receive(
        &mut self,
        _socket: &mut Self::TcpSocket,
        _buffer: &mut [u8],
    ) -> nb::Result<usize, Self::Error> {
        Err(nb::Error::WouldBlock)
    }

    fn close(&mut self, _socket: Self::TcpSocket) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl TcpFullStack for ExampleStack {
    fn bind(&mut self, _socket: &mut Self::TcpSocket, _local_port: u16) -> Result<(), Self::Error> {
        Ok(())
    }

    fn listen(&mut self, _socket: &mut Self::TcpSocket) -> Result<(), Self::Error> {
        Ok(())
    }

    fn accept(
        &mut self,
        _socket: &mut Self::TcpSocket,
    ) -> nb::Result<(Self::TcpSocket, SocketAddr), Self::Error> {
        Err(nb::Error::WouldBlock)
    }
}

impl Dns for ExampleStack {
    type Error = ExampleNetworkError;

    fn get_host_by_name(
        &mut self,
        _hostname: &str,
        _addr_type: AddrType,
    ) -> nb::Result<IpAddr, Self::Error> {
        Ok(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)))
    }

    fn get_host_by_address(
        &mut self,
        _addr: IpAddr,
        _result: &mut [u8],
    ) -> nb::Result<usize, Self::Error> {
        Err(nb::Error::Other(ExampleNetworkError))
    }
}

/// Free-running microsecond timer; every delay finishes immediately
#[derive(Default)]
pub struct ExampleTimer {
    ticks: u32,
}

impl fugit_timer::Timer<1_000_000> for ExampleTimer {
    type Error = Infallible;

    fn now(&mut self) -> TimerInstantU32<1_000_000> {
        self.ticks = self.ticks.wrapping_add(1);
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000_000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

/// Handshake lines that are never asserted
#[derive(Default)]
pub struct ExampleLines {
    pub carrier: bool,
}

impl HandshakeLines for ExampleLines {
    fn set_carrier(&mut self, active: bool, _polarity: PinPolarity) {
        self.carrier = active;
    }

    fn stop_requested(&mut self, _polarity: PinPolarity) -> bool {
        false
    }
}

#[derive(Default)]
pub struct ExampleDisplay;

impl Display for ExampleDisplay {
    fn show_message(&mut self, _message: &str) {}
}

/// Always-associated WiFi controller
#[derive(Default)]
pub struct ExampleGateway;

impl NetworkControl for ExampleGateway {
    fn wifi_connected(&mut self) -> bool {
        true
    }

    fn connect_wifi(&mut self, _ssid: &str, _password: &str) -> bool {
        true
    }

    fn disconnect_wifi(&mut self) {}

    fn local_ip(&mut self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)))
    }

    fn enter_slip(&mut self) {}

    fn enter_ppp(&mut self) {}

    fn restart(&mut self) -> ! {
        panic!("restart requested")
    }

    fn exit_to_menu(&mut self) {}
}

/// Volatile store that always reports the factory image
#[derive(Default)]
pub struct ExampleStore {
    saved: Option<Settings>,
}

impl SettingsStore for ExampleStore {
    type Error = Infallible;

    fn load(&mut self) -> Result<Settings, Self::Error> {
        Ok(self.saved.clone().unwrap_or_default())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), Self::Error> {
        self.saved = Some(settings.clone());
        Ok(())
    }
}
