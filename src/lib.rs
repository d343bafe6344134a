//! # Hayes modem emulation engine for WiFi-to-serial bridges
//!
//! `retromodem` turns a serial port and a TCP/IP stack into something a 1980s
//! terminal program understands: an AT command set, RING/CONNECT/NO CARRIER
//! call progress, a `+++` escape, and a transparent data bridge with optional
//! Telnet and PETSCII translation.
//!
//! The crate is `no_std` and fully generic over its platform seams:
//!
//! * serial I/O through [embedded-io](https://crates.io/crates/embedded-io)
//! * sockets and DNS through [embedded-nal](https://crates.io/crates/embedded-nal)
//! * handshake pins through [embedded-hal](https://crates.io/crates/embedded-hal)
//! * time through [fugit-timer](https://crates.io/crates/fugit-timer)
//!
//! The entry point is [modem::Modem]: construct it over your platform types,
//! call `start()` once and `poll()` from the main loop. See the module
//! documentation there for a full example.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod commands;
pub mod escape;
#[cfg(any(test, feature = "examples"))]
pub mod example;
pub mod flow;
pub mod modem;
pub mod platform;
pub mod results;
pub mod serial;
pub mod settings;
pub mod telnet;

#[cfg(test)]
mod tests;
