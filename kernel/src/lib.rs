/*
 * CLUU Socket Core
 *
 * Kernel-resident socket pairs: two connected endpoints that exchange a
 * flow-controlled byte stream plus a single out-of-band control message,
 * with explicit shutdown of either direction and peer-death notification.
 *
 * Layout:
 * - mbuf: chained, bounded FIFO byte storage (receive buffers)
 * - object: koids, the Dispatcher trait, handles/rights, readiness signals
 *   and the socket dispatcher itself
 * - sync: rank-ordered locking used whenever both endpoints are touched
 * - utils::debug: ring-buffer backed kernel logger
 *
 * The crate is no_std + alloc so it links into the kernel image; unit tests
 * run on the host with std.
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod mbuf;
pub mod object;
pub mod sync;
pub mod utils;

pub use config::{CONTROL_MSG_MAX, DEFAULT_CAPACITY, DEFAULT_SEGMENT_SIZE, SocketConfig};
pub use error::{Result, SocketError};
pub use mbuf::ByteStreamBuffer;
pub use object::handle::{Handle, Rights};
pub use object::signals::{ObserverId, ReadinessSignal, SignalObserver, Signals};
pub use object::socket::{
    DeliveryMode, Lifecycle, ReadStatus, ShutdownMode, ShutdownState, SocketDispatcher,
    SocketFlags, SocketHandle, socket_create, socket_create_with_config,
};
pub use object::{Dispatcher, Koid, ObjectType};
