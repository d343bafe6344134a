//! Host platform collaborators
//!
//! The engine drives a status display and a network/power controller through
//! these traits. Both are notification-only seams: the engine never reads
//! state back from the display, and the controller answers only the WiFi
//! association and address queries needed for `ATI`, `ATC` and the virtual
//! dial targets.

use core::net::IpAddr;

/// Direction tag for the live transfer transcript
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transfer {
    Send,
    Recv,
}

/// Status display hooks.
///
/// Only `show_message` is required; the icon and transcript hooks default to
/// no-ops for headless hosts.
pub trait Display {
    /// Replaces the status line
    fn show_message(&mut self, message: &str);

    /// Shows the remote endpoint while a call is up
    fn show_connected_overlay(&mut self, remote: &str) {
        let _ = remote;
    }

    fn show_wifi_icon(&mut self) {}

    fn show_call_icon(&mut self) {}

    /// Mirrors one bridged byte, for adapters with a traffic view
    fn transcript(&mut self, byte: u8, direction: Transfer) {
        let _ = (byte, direction);
    }
}

/// WiFi association, addressing and platform control.
///
/// Everything the engine cannot do through the socket stack: joining the
/// network, handing the link to the SLIP/PPP gateways, rebooting and leaving
/// modem mode.
pub trait NetworkControl {
    fn wifi_connected(&mut self) -> bool;

    /// Associates with the given network. Blocks until joined or failed.
    fn connect_wifi(&mut self, ssid: &str, password: &str) -> bool;

    fn disconnect_wifi(&mut self);

    /// Local address once associated
    fn local_ip(&mut self) -> Option<IpAddr>;

    /// Hands the serial link to the SLIP gateway. Does not return until the
    /// gateway session ends.
    fn enter_slip(&mut self);

    /// Hands the serial link to the PPP gateway
    fn enter_ppp(&mut self);

    /// Reboots the adapter, does not return
    fn restart(&mut self) -> !;

    /// Leaves modem mode for the host menu
    fn exit_to_menu(&mut self);
}
