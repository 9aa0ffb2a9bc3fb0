/*
 * Socket Pair Tests
 *
 * End-to-end behavior of socket pairs through the handle layer.
 *
 * ## Test Coverage
 * - `test_hello_exchange()` - the basic two-way exchange ending in end-of-stream
 * - `test_full_exchange()` - write, read, half-close, end-of-stream and peer death
 * - `test_short_write_resumes_after_read()` - flow control on a full buffer
 * - `test_peer_close_keeps_buffered_data()` - reads drain what arrived before the close
 * - `test_control_message_limits()` - control size limits and single-slot semantics
 * - `test_datagram_pair()` - record boundaries survive delivery
 * - `test_rights_are_enforced()` - reduced handles cannot read, write or signal
 * - `test_observers_see_transitions()` - readiness changes reach registered observers
 */

use std::sync::{Arc, Mutex};

use cluu_socket::utils::debug::logger;
use cluu_socket::{
    CONTROL_MSG_MAX, ReadStatus, Rights, ShutdownMode, ShutdownState, SignalObserver, Signals,
    SocketConfig, SocketError, SocketFlags, socket_create, socket_create_with_config,
};
use log::LevelFilter;

fn init_logging() {
    let _ = logger::init(LevelFilter::Debug);
}

#[test]
fn test_hello_exchange() {
    let (a, b) = socket_create(0).unwrap();
    let mut buf = [0u8; 10];

    assert_eq!(a.write(b"hello"), Ok(5));
    assert_eq!(b.read(&mut buf), Ok(ReadStatus::Data(5)));
    assert_eq!(&buf[..5], b"hello");

    assert_eq!(b.write(b"hi"), Ok(2));
    assert_eq!(a.read(&mut buf), Ok(ReadStatus::Data(2)));
    assert_eq!(&buf[..2], b"hi");

    a.half_close().unwrap();
    assert_eq!(b.read(&mut buf), Ok(ReadStatus::EndOfStream));
    assert_eq!(a.lifecycle().shutdown, ShutdownState::HalfClosedWrite);
}

#[test]
fn test_full_exchange() {
    init_logging();
    let (a, b) = socket_create(SocketFlags::STREAM.bits()).unwrap();
    assert_eq!(a.related_koid(), Some(b.koid()));

    assert_eq!(a.write(b"hello"), Ok(5));
    assert!(b.signals().contains(Signals::READABLE));

    let mut buf = [0u8; 10];
    assert_eq!(b.read(&mut buf), Ok(ReadStatus::Data(5)));
    assert_eq!(&buf[..5], b"hello");
    assert!(!b.signals().contains(Signals::READABLE));

    a.half_close().unwrap();
    assert!(b.signals().contains(Signals::READ_DISABLED));
    assert_eq!(b.read(&mut buf), Ok(ReadStatus::EndOfStream));
    assert_eq!(a.write(b"x"), Err(SocketError::BadState));

    let b_koid = b.koid();
    drop(a);
    assert!(b.signals().contains(Signals::PEER_CLOSED));
    assert_eq!(b.related_koid(), None);
    assert_eq!(b.write(b"x"), Err(SocketError::PeerClosed));
    assert_eq!(b.koid(), b_koid);
    assert!(logger::buffered() > 0);
}

#[test]
fn test_short_write_resumes_after_read() {
    let (a, b) = socket_create_with_config(0, SocketConfig::new(16, 4)).unwrap();

    let payload: Vec<u8> = (0u8..40).collect();
    assert_eq!(a.write(&payload), Ok(16));
    assert!(!a.signals().contains(Signals::WRITABLE));
    assert_eq!(a.write(&payload[16..]), Err(SocketError::ShouldWait));

    let mut received = Vec::new();
    let mut offset = 16;
    let mut buf = [0u8; 5];
    while received.len() < payload.len() {
        match b.read(&mut buf) {
            Ok(ReadStatus::Data(n)) => received.extend_from_slice(&buf[..n]),
            other => panic!("unexpected read result {:?}", other),
        }
        if offset < payload.len() {
            match a.write(&payload[offset..]) {
                Ok(n) => offset += n,
                Err(SocketError::ShouldWait) => {}
                Err(e) => panic!("write failed: {}", e),
            }
        }
    }
    assert_eq!(received, payload);
    assert_eq!(b.bytes_outstanding(), Ok(0));
}

#[test]
fn test_peer_close_keeps_buffered_data() {
    let (a, b) = socket_create(0).unwrap();
    a.write(b"parting words").unwrap();
    a.write_control(b"ctl").unwrap();
    drop(a);

    let lifecycle = b.lifecycle();
    assert!(lifecycle.peer_gone);
    assert_eq!(lifecycle.shutdown, ShutdownState::Open);

    let mut ctl = [0u8; 8];
    assert_eq!(b.read_control(&mut ctl), Ok(3));
    assert_eq!(b.read_control(&mut ctl), Err(SocketError::PeerClosed));

    let mut buf = [0u8; 64];
    assert_eq!(b.read(&mut buf), Ok(ReadStatus::Data(13)));
    assert_eq!(&buf[..13], b"parting words");
    assert_eq!(b.read(&mut buf), Ok(ReadStatus::EndOfStream));
    assert_eq!(b.write_control(b"x"), Err(SocketError::PeerClosed));
    assert!(b.shutdown(ShutdownMode::WRITE).is_ok());
}

#[test]
fn test_control_message_limits() {
    let (a, b) = socket_create(0).unwrap();
    let max = vec![0x5a; CONTROL_MSG_MAX];

    assert_eq!(a.write_control(&max), Ok(()));
    assert_eq!(a.write_control(b"second"), Err(SocketError::BadState));
    assert_eq!(
        b.write_control(&vec![0u8; CONTROL_MSG_MAX + 1]),
        Err(SocketError::InvalidArgs)
    );
    assert!(b.signals().contains(Signals::CONTROL_READABLE));

    let mut buf = vec![0u8; 2048];
    assert_eq!(b.read_control(&mut buf), Ok(CONTROL_MSG_MAX));
    assert_eq!(&buf[..CONTROL_MSG_MAX], &max[..]);
    assert!(a.signals().contains(Signals::CONTROL_WRITABLE));
    assert_eq!(a.write_control(b"second"), Ok(()));

    // Control traffic does not touch the data stream
    assert_eq!(b.bytes_outstanding(), Ok(0));
}

#[test]
fn test_datagram_pair() {
    let (a, b) = socket_create(SocketFlags::DATAGRAM.bits()).unwrap();
    for msg in [&b"one"[..], b"two2", b"three"] {
        a.write(msg).unwrap();
    }

    let mut buf = [0u8; 32];
    for expected in [&b"one"[..], b"two2", b"three"] {
        match b.read(&mut buf) {
            Ok(ReadStatus::Data(n)) => assert_eq!(&buf[..n], expected),
            other => panic!("unexpected read result {:?}", other),
        }
    }
    assert_eq!(b.read(&mut buf), Err(SocketError::ShouldWait));
}

#[test]
fn test_rights_are_enforced() {
    let (a, b) = socket_create(0).unwrap();
    let reader = a.duplicate(Rights::READ).unwrap();

    assert_eq!(reader.write(b"x"), Err(SocketError::AccessDenied));
    assert_eq!(reader.shutdown(ShutdownMode::READ), Err(SocketError::AccessDenied));
    assert_eq!(reader.user_signal(0, Signals::USER_0.bits(), false), Err(SocketError::AccessDenied));
    assert_eq!(reader.duplicate(Rights::READ).unwrap_err(), SocketError::AccessDenied);

    b.write(b"hi").unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(reader.read(&mut buf), Ok(ReadStatus::Data(2)));

    // Dropping the original keeps the endpoint alive through the duplicate
    drop(a);
    assert!(!b.signals().contains(Signals::PEER_CLOSED));
    drop(reader);
    assert!(b.signals().contains(Signals::PEER_CLOSED));

    let writer = b.replace(Rights::WRITE).unwrap();
    assert_eq!(writer.read(&mut buf), Err(SocketError::AccessDenied));
    assert_eq!(writer.bytes_outstanding(), Err(SocketError::AccessDenied));
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Signals>>,
}

impl SignalObserver for Recorder {
    fn on_state_change(&self, signals: Signals) {
        self.seen.lock().unwrap().push(signals);
    }
}

#[test]
fn test_observers_see_transitions() {
    let (a, b) = socket_create(0).unwrap();
    let recorder = Arc::new(Recorder::default());
    let id = b.signal().add_observer(recorder.clone());

    a.write(b"ping").unwrap();
    a.user_signal(0, Signals::USER_2.bits(), true).unwrap();
    drop(a);

    let seen = recorder.seen.lock().unwrap().clone();
    assert!(!seen[0].contains(Signals::READABLE));
    assert!(seen.iter().any(|s| s.contains(Signals::READABLE)));
    assert!(seen.iter().any(|s| s.contains(Signals::USER_2)));
    let last = *seen.last().unwrap();
    assert!(last.contains(Signals::PEER_CLOSED | Signals::READABLE | Signals::USER_2));

    assert!(b.signal().remove_observer(id));
}
