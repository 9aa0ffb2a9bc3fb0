/*
 * Socket Concurrency Tests
 *
 * Both endpoints of a pair driven from several threads at once.
 *
 * ## Test Coverage
 * - `test_bidirectional_stream_under_load()` - both sides write and read concurrently,
 *   each direction arrives complete and in order, nothing deadlocks
 * - `test_close_races_with_writers()` - dropping one endpoint while the other writes
 * - `test_shutdown_races_with_reader()` - end-of-stream after a concurrent half-close
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use cluu_socket::{
    ReadStatus, SocketConfig, SocketError, SocketHandle, socket_create, socket_create_with_config,
};

const TRANSFER_LEN: usize = 64 * 1024;

fn pattern(seed: u8) -> Vec<u8> {
    (0..TRANSFER_LEN)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

fn write_all(socket: &SocketHandle, data: &[u8]) {
    let mut offset = 0;
    while offset < data.len() {
        match socket.write(&data[offset..]) {
            Ok(n) => offset += n,
            Err(SocketError::ShouldWait) => thread::yield_now(),
            Err(e) => panic!("write failed: {}", e),
        }
    }
}

fn read_exact(socket: &SocketHandle, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut buf = [0u8; 777];
    while out.len() < len {
        match socket.read(&mut buf) {
            Ok(ReadStatus::Data(n)) => out.extend_from_slice(&buf[..n]),
            Err(SocketError::ShouldWait) => thread::yield_now(),
            other => panic!("unexpected read result {:?}", other),
        }
    }
    out
}

#[test]
fn test_bidirectional_stream_under_load() {
    let (a, b) = socket_create_with_config(0, SocketConfig::new(4096, 512)).unwrap();
    let a = Arc::new(a);
    let b = Arc::new(b);

    let mut workers = Vec::new();
    for (writer, reader, seed) in [(a.clone(), b.clone(), 1u8), (b.clone(), a.clone(), 2u8)] {
        let expected = pattern(seed);
        let data = expected.clone();
        workers.push(thread::spawn(move || write_all(&writer, &data)));
        workers.push(thread::spawn(move || {
            assert_eq!(read_exact(&reader, TRANSFER_LEN), expected);
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(a.bytes_outstanding(), Ok(0));
    assert_eq!(b.bytes_outstanding(), Ok(0));
}

#[test]
fn test_close_races_with_writers() {
    for _ in 0..50 {
        let (a, b) = socket_create(0).unwrap();
        let peer_closed = Arc::new(AtomicUsize::new(0));

        let closed = peer_closed.clone();
        let writer = thread::spawn(move || {
            loop {
                match a.write(b"spam") {
                    Ok(_) | Err(SocketError::ShouldWait) => {}
                    Err(SocketError::PeerClosed) => {
                        closed.fetch_add(1, Ordering::SeqCst);
                        break;
                    }
                    Err(e) => panic!("write failed: {}", e),
                }
            }
        });

        thread::yield_now();
        drop(b);
        writer.join().unwrap();
        assert_eq!(peer_closed.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_shutdown_races_with_reader() {
    for _ in 0..50 {
        let (a, b) = socket_create(0).unwrap();
        let reader = thread::spawn(move || {
            let mut total = 0;
            let mut buf = [0u8; 64];
            loop {
                match b.read(&mut buf) {
                    Ok(ReadStatus::Data(n)) => total += n,
                    Ok(ReadStatus::EndOfStream) => return total,
                    Err(SocketError::ShouldWait) => thread::yield_now(),
                    Err(e) => panic!("read failed: {}", e),
                }
            }
        });

        write_all(&a, &[7u8; 1000]);
        a.half_close().unwrap();
        assert_eq!(reader.join().unwrap(), 1000);
    }
}
