use crate::flow::FlowControlMode;
use crate::modem::Mode;
use crate::platform::Transfer;
use crate::tests::mock::{attach_console, output, started_modem, type_line, TestModem};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

/// Dialed and connected to 10.0.0.1:23 on socket 2, output drained
fn connected_modem() -> (TestModem, Arc<AtomicU32>) {
    let (mut modem, clock) = started_modem();
    type_line(&mut modem, "ATDT10.0.0.1:23");
    assert_eq!(Mode::Connected, modem.session.mode);
    output(&mut modem);
    (modem, clock)
}

#[test]
fn outbound_bytes_reach_the_remote() {
    let (mut modem, _clock) = connected_modem();

    modem.serial.feed(b"HELLO");
    modem.poll().unwrap();

    assert_eq!(b"HELLO".as_slice(), modem.stack.sent_on(2));
}

#[test]
fn inbound_bytes_reach_the_terminal() {
    let (mut modem, _clock) = connected_modem();

    modem.stack.push_rx(2, b"WELCOME");
    modem.poll().unwrap();

    assert_eq!(b"WELCOME".to_vec(), modem.serial.take_output());
}

#[test]
fn transcript_sees_both_directions() {
    let (mut modem, _clock) = connected_modem();
    modem.display.transcript.clear();

    modem.serial.feed(b"A");
    modem.stack.push_rx(2, b"B");
    modem.poll().unwrap();

    assert!(modem.display.transcript.contains(&(b'A', Transfer::Send)));
    assert!(modem.display.transcript.contains(&(b'B', Transfer::Recv)));
}

// ---- telnet translation ------------------------------------------------

fn telnet_connected_modem() -> (TestModem, Arc<AtomicU32>) {
    let (mut modem, clock) = started_modem();
    type_line(&mut modem, "ATNET1");
    type_line(&mut modem, "ATDT10.0.0.1:23");
    output(&mut modem);
    (modem, clock)
}

#[test]
fn outbound_iac_is_doubled() {
    let (mut modem, _clock) = telnet_connected_modem();

    modem.serial.feed(&[b'A', 0xFF, b'B']);
    modem.poll().unwrap();

    assert_eq!(&[b'A', 0xFF, 0xFF, b'B'], modem.stack.sent_on(2));
}

#[test]
fn outbound_chunks_are_halved_under_telnet() {
    let (mut modem, _clock) = telnet_connected_modem();

    modem.serial.feed(&[b'x'; 200]);
    modem.poll().unwrap();
    assert_eq!(128, modem.stack.sent_on(2).len());

    modem.poll().unwrap();
    assert_eq!(200, modem.stack.sent_on(2).len());
}

#[test]
fn inbound_negotiation_is_answered_inline() {
    let (mut modem, _clock) = telnet_connected_modem();

    // DO ECHO then WILL SUPPRESS-GO-AHEAD around payload
    modem.stack.push_rx(2, &[0xFF, 0xFD, 0x01, b'H', b'I', 0xFF, 0xFB, 0x03]);
    modem.poll().unwrap();

    assert_eq!(b"HI".to_vec(), modem.serial.take_output());
    assert_eq!(&[0xFF, 0xFC, 0x01, 0xFF, 0xFD, 0x03], modem.stack.sent_on(2));
}

#[test]
fn inbound_doubled_iac_is_unescaped() {
    let (mut modem, _clock) = telnet_connected_modem();

    modem.stack.push_rx(2, &[0xFF, 0xFF, b'Z']);
    modem.poll().unwrap();

    assert_eq!(vec![0xFF, b'Z'], modem.serial.take_output());
}

#[test]
fn negotiation_split_across_polls_still_completes() {
    let (mut modem, _clock) = telnet_connected_modem();

    modem.stack.push_rx(2, &[0xFF]);
    modem.poll().unwrap();
    assert!(modem.stack.sent_on(2).is_empty());
    assert!(modem.serial.take_output().is_empty());

    modem.stack.push_rx(2, &[0xFD, 0x18]);
    modem.poll().unwrap();

    assert_eq!(&[0xFF, 0xFC, 0x18], modem.stack.sent_on(2));
}

#[test]
fn raw_mode_passes_iac_untouched() {
    let (mut modem, _clock) = connected_modem();

    modem.serial.feed(&[0xFF, b'A']);
    modem.stack.push_rx(2, &[0xFF, 0xFD, 0x01]);
    modem.poll().unwrap();

    assert_eq!(&[0xFF, b'A'], modem.stack.sent_on(2));
    assert_eq!(vec![0xFF, 0xFD, 0x01], modem.serial.take_output());
}

// ---- petscii -----------------------------------------------------------

#[test]
fn petscii_folds_outbound_high_bytes() {
    let (mut modem, _clock) = started_modem();
    type_line(&mut modem, "ATPET=1");
    type_line(&mut modem, "ATDT10.0.0.1:23");
    output(&mut modem);

    modem.serial.feed(&[0xC1, b'!']);
    modem.poll().unwrap();

    assert_eq!(b"A!".as_slice(), modem.stack.sent_on(2));
}

#[test]
fn shifted_petscii_letters_type_commands() {
    let (mut modem, _clock) = started_modem();

    // "AT" typed as unshifted PETSCII letters from a stock C64
    modem.serial.feed(&[0xC1, 0xD4, b'\r']);
    modem.poll().unwrap();

    assert!(output(&mut modem).contains("\r\nOK\r\n"));
}

// ---- flow control ------------------------------------------------------

#[test]
fn hardware_flow_pauses_inbound_forwarding() {
    let (mut modem, _clock) = started_modem();
    type_line(&mut modem, "AT&K1");
    type_line(&mut modem, "ATDT10.0.0.1:23");
    output(&mut modem);

    modem.lines.stop = true;
    modem.stack.push_rx(2, b"HELD");
    modem.poll().unwrap();
    assert!(modem.serial.take_output().is_empty());

    modem.lines.stop = false;
    modem.poll().unwrap();
    assert_eq!(b"HELD".to_vec(), modem.serial.take_output());
}

#[test]
fn flow_none_never_pauses() {
    let (mut modem, _clock) = connected_modem();

    modem.lines.stop = true;
    modem.stack.push_rx(2, b"DATA");
    modem.poll().unwrap();

    assert_eq!(b"DATA".to_vec(), modem.serial.take_output());
}

// ---- console during a call ---------------------------------------------

#[test]
fn console_keystrokes_join_the_call() {
    let (mut modem, _clock) = started_modem();
    let console = attach_console(&mut modem);
    type_line(&mut modem, "ATDT10.0.0.1:23");
    let call_socket = console + 1;
    modem.stack.sent.clear();
    output(&mut modem);

    modem.stack.push_rx(console, b"HI");
    modem.poll().unwrap();

    assert_eq!(b"HI".as_slice(), modem.stack.sent_on(call_socket));
}

#[test]
fn console_bytes_defer_while_serial_fills_the_chunk() {
    let (mut modem, _clock) = started_modem();
    let console = attach_console(&mut modem);
    type_line(&mut modem, "ATNET1");
    type_line(&mut modem, "ATDT10.0.0.1:23");
    let call_socket = console + 1;
    modem.stack.sent.clear();
    output(&mut modem);

    modem.serial.feed(&[b'x'; 200]);
    modem.stack.push_rx(console, b"HI");
    modem.poll().unwrap();
    // Serial bytes fill the halved chunk, the console bytes wait their turn
    assert_eq!(128, modem.stack.sent_on(call_socket).len());

    modem.poll().unwrap();
    let sent = modem.stack.sent_on(call_socket);
    assert_eq!(202, sent.len());
    assert!(sent.ends_with(b"HI"));
}

#[test]
fn inbound_call_data_is_mirrored_to_the_console() {
    let (mut modem, _clock) = started_modem();
    let console = attach_console(&mut modem);
    type_line(&mut modem, "ATDT10.0.0.1:23");
    let call_socket = console + 1;
    modem.stack.sent.clear();
    output(&mut modem);

    modem.stack.push_rx(call_socket, b"NEWS");
    modem.poll().unwrap();

    assert_eq!(b"NEWS".to_vec(), modem.serial.take_output());
    assert_eq!(b"NEWS".as_slice(), modem.stack.sent_on(console));
}

// ---- carrier loss ------------------------------------------------------

#[test]
fn failed_send_drops_the_call() {
    let (mut modem, _clock) = connected_modem();

    modem.stack.send_broken.insert(2);
    modem.serial.feed(b"X");
    modem.poll().unwrap();

    assert!(output(&mut modem).contains("NO CARRIER"));
    assert_eq!(Mode::Command, modem.session.mode);
    assert!(modem.call.is_none());
}
