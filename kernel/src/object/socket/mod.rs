/*
 * Socket Dispatcher
 *
 * One endpoint of a kernel socket pair. Each endpoint owns its receive
 * buffer and control slot; writing means appending to the *peer's* buffer,
 * so every mutating operation touches both endpoints.
 *
 * Locking:
 * - Each endpoint has one state lock, ranked by its koid
 * - Operations snapshot the peer pointer, take both locks with `lock_pair`
 *   and then check the peer is still attached before touching it
 * - Readiness bits of both endpoints are recomputed from the locked state
 *   before the locks are released, so no observer ever sees a stale state
 *
 * Lifetime:
 * The two endpoints hold strong references to each other. The cycle is
 * broken when the last handle to either endpoint closes: that side detaches
 * itself and its peer under both locks and the peer sees PEER_CLOSED.
 */

pub mod control;

use alloc::sync::Arc;
use bitflags::bitflags;
use spin::MutexGuard;

use self::control::ControlSlot;
use super::handle::{Handle, Rights};
use super::signals::{ReadinessSignal, Signals};
use super::{Dispatcher, HandleCount, Koid, ObjectType, alloc_koid};
use crate::config::{CONTROL_MSG_MAX, SocketConfig};
use crate::error::{Result, SocketError};
use crate::mbuf::ByteStreamBuffer;
use crate::sync::{RankedMutex, lock_pair};

bitflags! {
    /// Creation options for a socket pair
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SocketFlags: u32 {
        /// Preserve write boundaries: each write is delivered as one record
        const DATAGRAM = 1 << 0;
    }
}

impl SocketFlags {
    /// Plain byte stream (no flags)
    pub const STREAM: SocketFlags = SocketFlags::empty();

    /// Parse raw creation flags, rejecting unknown bits
    pub fn from_raw(raw: u32) -> Result<Self> {
        Self::from_bits(raw).ok_or(SocketError::InvalidArgs)
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.contains(Self::DATAGRAM) {
            DeliveryMode::Datagram
        } else {
            DeliveryMode::Stream
        }
    }
}

/// How written bytes are handed to the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Writes coalesce into one byte stream
    Stream,
    /// Each write is read back as one whole record
    Datagram,
}

bitflags! {
    /// Directions closed by `shutdown`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShutdownMode: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

impl ShutdownMode {
    /// Parse a raw shutdown mask
    ///
    /// # Errors
    /// `InvalidArgs` for an empty mask or unknown bits.
    pub fn from_raw(raw: u32) -> Result<Self> {
        match Self::from_bits(raw) {
            Some(how) if !how.is_empty() => Ok(how),
            _ => Err(SocketError::InvalidArgs),
        }
    }
}

/// Outcome of a successful `read`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were copied out
    Data(usize),
    /// Nothing is buffered and nothing more will ever arrive
    EndOfStream,
}

/// Which directions of an endpoint are closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Open,
    HalfClosedRead,
    HalfClosedWrite,
    ClosedBoth,
}

/// Observable lifecycle of one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub shutdown: ShutdownState,
    pub peer_gone: bool,
}

/// Mutable endpoint state, guarded by the endpoint lock
struct SocketState {
    /// Bytes written by the peer, waiting to be read here
    data: ByteStreamBuffer,
    /// Control message written by the peer
    control: ControlSlot,
    peer: Option<Arc<SocketDispatcher>>,
    read_disabled: bool,
    write_disabled: bool,
}

impl SocketState {
    fn is_peer(&self, peer: &SocketDispatcher) -> bool {
        self.peer.as_deref().is_some_and(|p| core::ptr::eq(p, peer))
    }

    /// System readiness bits of this endpoint given its peer's state
    fn system_signals(&self, other: Option<&SocketState>) -> Signals {
        let mut bits = Signals::empty();
        bits.set(Signals::READABLE, !self.data.is_empty());
        bits.set(Signals::READ_DISABLED, self.read_disabled);
        bits.set(Signals::WRITE_DISABLED, self.write_disabled);
        bits.set(Signals::CONTROL_READABLE, self.control.is_occupied());

        match other {
            Some(other) => {
                bits.set(Signals::WRITABLE, !self.write_disabled && !other.data.is_full());
                bits.set(
                    Signals::CONTROL_WRITABLE,
                    !self.write_disabled && !other.control.is_occupied(),
                );
            }
            None => bits |= Signals::PEER_CLOSED,
        }
        bits
    }

    fn shutdown_state(&self) -> ShutdownState {
        match (self.read_disabled, self.write_disabled) {
            (false, false) => ShutdownState::Open,
            (true, false) => ShutdownState::HalfClosedRead,
            (false, true) => ShutdownState::HalfClosedWrite,
            (true, true) => ShutdownState::ClosedBoth,
        }
    }
}

/// Own endpoint lock, plus the peer and its lock while it is attached
struct Locked<'a> {
    own: MutexGuard<'a, SocketState>,
    peer: Option<(&'a SocketDispatcher, MutexGuard<'a, SocketState>)>,
}

impl Locked<'_> {
    /// Recompute and publish the system bits of both endpoints
    fn publish(&self, owner: &SocketDispatcher) {
        match &self.peer {
            Some((peer, other)) => {
                owner
                    .signal
                    .update_system_bits(self.own.system_signals(Some(&**other)));
                peer.signal
                    .update_system_bits(other.system_signals(Some(&*self.own)));
            }
            None => owner
                .signal
                .update_system_bits(self.own.system_signals(None)),
        }
    }
}

/// One endpoint of a socket pair
pub struct SocketDispatcher {
    koid: Koid,
    peer_koid: Koid,
    flags: SocketFlags,
    signal: ReadinessSignal,
    handles: HandleCount,
    state: RankedMutex<SocketState>,
}

/// Handle to a socket endpoint
pub type SocketHandle = Handle<SocketDispatcher>;

impl SocketDispatcher {
    fn new(koid: Koid, peer_koid: Koid, flags: SocketFlags, config: &SocketConfig) -> Self {
        Self {
            koid,
            peer_koid,
            flags,
            signal: ReadinessSignal::new(Signals::WRITABLE | Signals::CONTROL_WRITABLE),
            handles: HandleCount::new(),
            state: RankedMutex::new(
                koid.0,
                SocketState {
                    data: ByteStreamBuffer::new(config),
                    control: ControlSlot::new(),
                    peer: None,
                    read_disabled: false,
                    write_disabled: false,
                },
            ),
        }
    }

    /// Create a connected pair of endpoints
    ///
    /// The endpoints reference each other until one of them goes through
    /// `on_zero_handles`; callers that skip the handle layer must trigger
    /// that themselves or the pair is never freed.
    ///
    /// # Arguments
    /// * `flags` - raw `SocketFlags` bits
    /// * `config` - receive buffer configuration, applied to both endpoints
    ///
    /// # Returns
    /// Both endpoints, the one with the lower koid first.
    pub fn create(flags: u32, config: SocketConfig) -> Result<(Arc<Self>, Arc<Self>)> {
        let flags = SocketFlags::from_raw(flags)?;
        config.validate()?;

        let koid0 = alloc_koid();
        let koid1 = alloc_koid();
        let socket0 = Arc::new(Self::new(koid0, koid1, flags, &config));
        let socket1 = Arc::new(Self::new(koid1, koid0, flags, &config));

        socket0.state.lock().peer = Some(Arc::clone(&socket1));
        socket1.state.lock().peer = Some(Arc::clone(&socket0));

        log::debug!(
            "Socket pair created: {} <-> {} ({:?}, capacity {})",
            koid0,
            koid1,
            flags.delivery_mode(),
            config.capacity
        );
        Ok((socket0, socket1))
    }

    pub fn flags(&self) -> SocketFlags {
        self.flags
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.flags.delivery_mode()
    }

    /// Append `data` to the peer's receive buffer
    ///
    /// In stream mode as many leading bytes as fit are written. In datagram
    /// mode `data` is written as one record or not at all.
    ///
    /// # Returns
    /// Number of bytes written; zero for empty `data` in stream mode.
    ///
    /// # Errors
    /// - `PeerClosed` if the peer is gone
    /// - `BadState` if writing has been shut down, here or by the peer
    /// - `ShouldWait` if the peer buffer has no room
    /// - `InvalidArgs` for an empty datagram or one larger than the buffer
    ///   capacity
    /// - `ResourceExhausted` if buffer memory cannot be allocated
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let peer = self.peer_snapshot().ok_or(SocketError::PeerClosed)?;
        let mut locked = self.lock_with(Some(&*peer));

        let Locked { own, peer: attached } = &mut locked;
        let Some((_, other)) = attached.as_mut() else {
            return Err(SocketError::PeerClosed);
        };
        if own.write_disabled {
            return Err(SocketError::BadState);
        }
        let written = match self.delivery_mode() {
            DeliveryMode::Stream if data.is_empty() => return Ok(0),
            DeliveryMode::Stream => {
                if other.data.is_full() {
                    return Err(SocketError::ShouldWait);
                }
                other.data.append(data)?
            }
            DeliveryMode::Datagram => other.data.append_record(data)?,
        };

        locked.publish(self);
        log::trace!("{}: wrote {}/{} bytes", self.koid, written, data.len());
        Ok(written)
    }

    /// Copy buffered bytes into `buf`, oldest first
    ///
    /// In datagram mode exactly one record is consumed and any part of it
    /// that does not fit `buf` is discarded. Data that arrived before a
    /// shutdown or the peer's death stays readable.
    ///
    /// # Returns
    /// - `Data(n)` with the number of bytes copied
    /// - `EndOfStream` once the buffer is empty and reading was shut down
    ///   (locally or by the peer's write shutdown) or the peer is gone
    ///
    /// # Errors
    /// `ShouldWait` if nothing is buffered but more may still arrive.
    pub fn read(&self, buf: &mut [u8]) -> Result<ReadStatus> {
        let peer = self.peer_snapshot();
        let mut locked = self.lock_with(peer.as_deref());

        if locked.own.data.is_empty() {
            if locked.peer.is_none() || locked.own.read_disabled {
                return Ok(ReadStatus::EndOfStream);
            }
            return Err(SocketError::ShouldWait);
        }
        if buf.is_empty() {
            return Ok(ReadStatus::Data(0));
        }

        let n = match self.delivery_mode() {
            DeliveryMode::Stream => locked.own.data.consume(buf),
            DeliveryMode::Datagram => locked.own.data.consume_record(buf),
        };

        locked.publish(self);
        log::trace!("{}: read {} bytes", self.koid, n);
        Ok(ReadStatus::Data(n))
    }

    /// Place `msg` in the peer's control slot
    ///
    /// # Errors
    /// - `InvalidArgs` if `msg` is empty or longer than CONTROL_MSG_MAX
    /// - `PeerClosed` if the peer is gone
    /// - `BadState` if writing is shut down or the peer slot is occupied
    pub fn write_control(&self, msg: &[u8]) -> Result<()> {
        if msg.is_empty() || msg.len() > CONTROL_MSG_MAX {
            return Err(SocketError::InvalidArgs);
        }
        let peer = self.peer_snapshot().ok_or(SocketError::PeerClosed)?;
        let mut locked = self.lock_with(Some(&*peer));

        let Locked { own, peer: attached } = &mut locked;
        let Some((_, other)) = attached.as_mut() else {
            return Err(SocketError::PeerClosed);
        };
        if own.write_disabled {
            return Err(SocketError::BadState);
        }
        other.control.fill(msg)?;

        locked.publish(self);
        log::trace!("{}: control message of {} bytes", self.koid, msg.len());
        Ok(())
    }

    /// Take the pending control message, truncated to `buf.len()`
    ///
    /// # Errors
    /// - `ShouldWait` if no message is pending
    /// - `PeerClosed` if no message is pending and the peer is gone
    pub fn read_control(&self, buf: &mut [u8]) -> Result<usize> {
        let peer = self.peer_snapshot();
        let mut locked = self.lock_with(peer.as_deref());

        match locked.own.control.take_into(buf) {
            Some(n) => {
                locked.publish(self);
                Ok(n)
            }
            None if locked.peer.is_none() => Err(SocketError::PeerClosed),
            None => Err(SocketError::ShouldWait),
        }
    }

    /// Close one or both directions
    ///
    /// Shutting down READ stops the peer from writing here; shutting down
    /// WRITE tells the peer no more data will arrive. Already buffered data
    /// stays readable on both sides. Repeating a shutdown is a no-op. With
    /// the peer gone only the local flags change.
    ///
    /// # Errors
    /// `InvalidArgs` if `how` is empty.
    pub fn shutdown(&self, how: ShutdownMode) -> Result<()> {
        if how.is_empty() {
            return Err(SocketError::InvalidArgs);
        }
        let peer = self.peer_snapshot();
        let mut locked = self.lock_with(peer.as_deref());

        let read = how.contains(ShutdownMode::READ);
        let write = how.contains(ShutdownMode::WRITE);
        let Locked { own, peer: attached } = &mut locked;
        if read {
            own.read_disabled = true;
        }
        if write {
            own.write_disabled = true;
        }
        if let Some((_, other)) = attached.as_mut() {
            if read {
                other.write_disabled = true;
            }
            if write {
                other.read_disabled = true;
            }
        }

        locked.publish(self);
        log::debug!("{}: shutdown {:?}", self.koid, how);
        Ok(())
    }

    /// Stop writing; the peer reads end-of-stream once drained
    pub fn half_close(&self) -> Result<()> {
        self.shutdown(ShutdownMode::WRITE)
    }

    /// Bytes waiting in this endpoint's receive buffer
    pub fn bytes_outstanding(&self) -> usize {
        self.state.lock().data.size()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        let state = self.state.lock();
        Lifecycle {
            shutdown: state.shutdown_state(),
            peer_gone: state.peer.is_none(),
        }
    }

    fn peer_snapshot(&self) -> Option<Arc<SocketDispatcher>> {
        self.state.lock().peer.clone()
    }

    /// Lock this endpoint, and `peer` too if it is still our peer
    fn lock_with<'a>(&'a self, peer: Option<&'a SocketDispatcher>) -> Locked<'a> {
        let Some(peer) = peer else {
            return Locked {
                own: self.state.lock(),
                peer: None,
            };
        };

        let (own, other) = lock_pair(&self.state, &peer.state);
        if own.is_peer(peer) {
            Locked {
                own,
                peer: Some((peer, other)),
            }
        } else {
            // Detached between the snapshot and the lock
            drop(other);
            Locked { own, peer: None }
        }
    }

    /// The peer lost its last handle; `state` is this endpoint's locked state
    ///
    /// Returns the reference to the peer so the caller can drop it after
    /// releasing both locks.
    fn on_peer_zero_handles(&self, state: &mut SocketState) -> Option<Arc<SocketDispatcher>> {
        let peer = state.peer.take();
        self.signal.update_system_bits(state.system_signals(None));
        log::debug!("{}: peer closed", self.koid);
        peer
    }
}

impl Dispatcher for SocketDispatcher {
    fn koid(&self) -> Koid {
        self.koid
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Socket
    }

    /// Peer koid, until the peer is gone
    fn related_koid(&self) -> Option<Koid> {
        self.state.lock().peer.as_ref().map(|_| self.peer_koid)
    }

    fn signal(&self) -> &ReadinessSignal {
        &self.signal
    }

    fn handle_count(&self) -> &HandleCount {
        &self.handles
    }

    fn on_zero_handles(&self) {
        let Some(peer) = self.peer_snapshot() else {
            return;
        };

        let (detached, back_ref) = {
            let mut locked = self.lock_with(Some(&*peer));
            let Locked { own, peer: attached } = &mut locked;
            let Some((peer_ref, other)) = attached.as_mut() else {
                return;
            };

            let detached = own.peer.take();
            let back_ref = peer_ref.on_peer_zero_handles(other);
            self.signal.update_system_bits(own.system_signals(None));
            (detached, back_ref)
        };

        log::debug!("{}: detached from {}", self.koid, self.peer_koid);
        // Both locks are released; the cycle can unwind now
        drop(back_ref);
        drop(detached);
    }

    fn user_signal(&self, clear_mask: u32, set_mask: u32, peer: bool) -> Result<()> {
        if !peer {
            return self.signal.user_signal(clear_mask, set_mask);
        }
        Signals::user_mask(clear_mask)?;
        Signals::user_mask(set_mask)?;

        let state = self.state.lock();
        let peer = state.peer.as_ref().ok_or(SocketError::PeerClosed)?;
        peer.signal.user_signal(clear_mask, set_mask)
    }
}

impl core::fmt::Debug for SocketDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SocketDispatcher")
            .field("koid", &self.koid)
            .field("peer_koid", &self.peer_koid)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Create a socket pair and wrap both endpoints in full-rights handles
///
/// # Errors
/// `InvalidArgs` for unknown flag bits.
pub fn socket_create(flags: u32) -> Result<(SocketHandle, SocketHandle)> {
    socket_create_with_config(flags, SocketConfig::default())
}

/// `socket_create` with an explicit buffer configuration
pub fn socket_create_with_config(
    flags: u32,
    config: SocketConfig,
) -> Result<(SocketHandle, SocketHandle)> {
    let (socket0, socket1) = SocketDispatcher::create(flags, config)?;
    Ok((
        Handle::new(socket0, Rights::DEFAULT_SOCKET),
        Handle::new(socket1, Rights::DEFAULT_SOCKET),
    ))
}

/// Rights-checked socket operations
///
/// Data and control writes, shutdown and half-close need WRITE; reads need
/// READ.
impl Handle<SocketDispatcher> {
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.checked(Rights::WRITE)?.write(data)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<ReadStatus> {
        self.checked(Rights::READ)?.read(buf)
    }

    pub fn write_control(&self, msg: &[u8]) -> Result<()> {
        self.checked(Rights::WRITE)?.write_control(msg)
    }

    pub fn read_control(&self, buf: &mut [u8]) -> Result<usize> {
        self.checked(Rights::READ)?.read_control(buf)
    }

    pub fn shutdown(&self, how: ShutdownMode) -> Result<()> {
        self.checked(Rights::WRITE)?.shutdown(how)
    }

    pub fn half_close(&self) -> Result<()> {
        self.checked(Rights::WRITE)?.half_close()
    }

    pub fn bytes_outstanding(&self) -> Result<usize> {
        Ok(self.checked(Rights::READ)?.bytes_outstanding())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.object().lifecycle()
    }
}
