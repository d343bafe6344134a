use crate::serial::{Configure, DualSerial};
use crate::tests::mock::MockSerial;
use embedded_io::{Read, ReadReady, Write};

#[test]
fn reads_prefer_the_usb_port() {
    let mut usb = MockSerial::default();
    usb.feed(b"U");
    let mut uart = MockSerial::default();
    uart.feed(b"P");
    let mut dual = DualSerial::new(usb, uart);

    let mut byte = [0u8; 1];
    assert_eq!(1, dual.read(&mut byte).unwrap());
    assert_eq!(b'U', byte[0]);

    // USB drained, the UART byte comes through next
    assert_eq!(1, dual.read(&mut byte).unwrap());
    assert_eq!(b'P', byte[0]);
}

#[test]
fn ready_when_either_port_is() {
    let mut dual = DualSerial::new(MockSerial::default(), MockSerial::default());
    assert!(!dual.read_ready().unwrap());

    dual.uart.feed(b"X");
    assert!(dual.read_ready().unwrap());

    let mut byte = [0u8; 1];
    dual.read(&mut byte).unwrap();
    assert!(!dual.read_ready().unwrap());

    dual.usb.feed(b"Y");
    assert!(dual.read_ready().unwrap());
}

#[test]
fn writes_are_mirrored() {
    let mut dual = DualSerial::new(MockSerial::default(), MockSerial::default());

    dual.write_all(b"OK").unwrap();
    dual.flush().unwrap();

    assert_eq!(b"OK".to_vec(), dual.usb.take_output());
    assert_eq!(b"OK".to_vec(), dual.uart.take_output());
}

#[test]
fn baud_changes_reach_only_the_uart() {
    let mut dual = DualSerial::new(MockSerial::default(), MockSerial::default());

    dual.set_baud(19200);

    assert!(dual.usb.baud_changes.is_empty());
    assert_eq!(vec![19200], dual.uart.baud_changes);
}
