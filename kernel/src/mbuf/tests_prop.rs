#![cfg(test)]
//! Property tests for the segment chain
//!
//! - Whatever sequence of appends and consumes runs, the bytes read back are
//!   exactly the bytes accepted, in order
//! - An append never reports more than the free space and the size never
//!   exceeds the capacity

use super::ByteStreamBuffer;
use crate::config::SocketConfig;
use alloc::vec::Vec;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Append(Vec<u8>),
    Consume(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(Op::Append),
        (0usize..64).prop_map(Op::Consume),
    ]
}

fn arb_config() -> impl Strategy<Value = SocketConfig> {
    (1usize..16, 1usize..8).prop_map(|(segments, segment_size)| {
        SocketConfig::new(segments * segment_size, segment_size)
    })
}

proptest! {
    #[test]
    fn fifo_order_is_preserved(config in arb_config(), ops in proptest::collection::vec(arb_op(), 1..64)) {
        let mut buf = ByteStreamBuffer::new(&config);
        let mut accepted = Vec::new();
        let mut received = Vec::new();

        for op in ops {
            match op {
                Op::Append(bytes) => {
                    let n = buf.append(&bytes).unwrap();
                    accepted.extend_from_slice(&bytes[..n]);
                }
                Op::Consume(len) => {
                    let mut out = alloc::vec![0u8; len];
                    let n = buf.consume(&mut out);
                    received.extend_from_slice(&out[..n]);
                }
            }
        }

        let mut out = alloc::vec![0u8; buf.size()];
        let n = buf.consume(&mut out);
        received.extend_from_slice(&out[..n]);

        prop_assert!(buf.is_empty());
        prop_assert_eq!(buf.segment_count(), 0);
        prop_assert_eq!(received, accepted);
    }

    #[test]
    fn appends_never_exceed_capacity(config in arb_config(), chunks in proptest::collection::vec(1usize..48, 1..32)) {
        let mut buf = ByteStreamBuffer::new(&config);
        for len in chunks {
            let free = buf.remaining();
            let n = buf.append(&alloc::vec![0xAAu8; len]).unwrap();
            prop_assert_eq!(n, len.min(free));
            prop_assert!(buf.size() <= buf.capacity());
            // a half-read head and a half-filled tail can add one extra segment
            prop_assert!(buf.segment_count() <= config.capacity.div_ceil(config.segment_size) + 1);
        }
    }
}
