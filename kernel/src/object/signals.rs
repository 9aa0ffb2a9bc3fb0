/*
 * Readiness Signals
 *
 * Each kernel object carries a small set of condition bits that generic
 * wait primitives poll or observe.
 *
 * Bit layout:
 * - Bits 0..23: system bits, owned by the object and recomputed after every
 *   state change
 * - Bits 24..31: user bits, set and cleared only through `user_signal`
 *
 * Waiting:
 * The signal never suspends anyone itself. Waiters register a
 * `SignalObserver`; whenever the bits change every observer is told the new
 * state and the waiting layer decides whom to wake. Observers run while the
 * owning object's locks are held and must not call back into the object.
 */

use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use spin::Mutex;

use crate::error::{Result, SocketError};

bitflags! {
    /// Readiness condition bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Signals: u32 {
        /// Receive buffer holds data
        const READABLE = 1 << 0;
        /// Peer receive buffer has room and writing is allowed
        const WRITABLE = 1 << 1;
        /// The peer endpoint is gone
        const PEER_CLOSED = 1 << 2;
        /// No more data will arrive (local read shutdown or peer write shutdown)
        const READ_DISABLED = 1 << 4;
        /// Writing has been shut down
        const WRITE_DISABLED = 1 << 5;
        /// A control message is waiting
        const CONTROL_READABLE = 1 << 6;
        /// The peer control slot is free
        const CONTROL_WRITABLE = 1 << 7;

        const USER_0 = 1 << 24;
        const USER_1 = 1 << 25;
        const USER_2 = 1 << 26;
        const USER_3 = 1 << 27;
        const USER_4 = 1 << 28;
        const USER_5 = 1 << 29;
        const USER_6 = 1 << 30;
        const USER_7 = 1 << 31;
    }
}

impl Signals {
    /// The whole user-defined region
    pub const USER_ALL: Signals = Signals::from_bits_retain(0xff00_0000);

    /// Everything outside the user region
    pub const SYSTEM_ALL: Signals = Signals::from_bits_retain(0x00ff_ffff);

    /// Check a raw user mask stays inside the user region
    pub(crate) fn user_mask(raw: u32) -> Result<Signals> {
        let mask = Signals::from_bits_retain(raw);
        if mask.intersects(Self::SYSTEM_ALL) {
            return Err(SocketError::InvalidArgs);
        }
        Ok(mask)
    }
}

/// Receives every change of a signal's bits
pub trait SignalObserver: Send + Sync {
    fn on_state_change(&self, signals: Signals);
}

/// Registration token returned by `ReadinessSignal::add_observer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub usize);

struct SignalState {
    bits: Signals,
    observers: Vec<(ObserverId, Arc<dyn SignalObserver>)>,
    next_observer: usize,
}

/// Condition bits plus the observers waiting on them
pub struct ReadinessSignal {
    state: Mutex<SignalState>,
}

impl ReadinessSignal {
    pub const fn new(initial: Signals) -> Self {
        Self {
            state: Mutex::new(SignalState {
                bits: initial,
                observers: Vec::new(),
                next_observer: 1,
            }),
        }
    }

    /// Current bits
    pub fn current(&self) -> Signals {
        self.state.lock().bits
    }

    /// Replace the system region with `system`, keeping the user bits
    ///
    /// Observers are notified if anything changed.
    pub fn update_system_bits(&self, system: Signals) {
        self.update(Signals::SYSTEM_ALL, system & Signals::SYSTEM_ALL);
    }

    /// Clear `clear_mask`, then set `set_mask`, in the user region
    ///
    /// # Errors
    /// `InvalidArgs` if either mask touches a system bit. Nothing changes
    /// in that case.
    pub fn user_signal(&self, clear_mask: u32, set_mask: u32) -> Result<()> {
        let clear = Signals::user_mask(clear_mask)?;
        let set = Signals::user_mask(set_mask)?;
        self.update(clear, set);
        Ok(())
    }

    /// Register an observer, which immediately sees the current bits
    pub fn add_observer(&self, observer: Arc<dyn SignalObserver>) -> ObserverId {
        let (id, bits) = {
            let mut state = self.state.lock();
            let id = ObserverId(state.next_observer);
            state.next_observer += 1;
            state.observers.push((id, Arc::clone(&observer)));
            (id, state.bits)
        };
        log::debug!("Observer {} registered", id.0);
        observer.on_state_change(bits);
        id
    }

    /// Unregister an observer; returns false if it was not registered
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state.observers.retain(|(oid, _)| *oid != id);
        before != state.observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    fn update(&self, clear: Signals, set: Signals) {
        let (bits, observers) = {
            let mut state = self.state.lock();
            let next = (state.bits - clear) | set;
            if next == state.bits {
                return;
            }
            state.bits = next;
            let observers: Vec<_> = state
                .observers
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            (next, observers)
        };

        // Notify outside the signal lock
        for observer in observers {
            observer.on_state_change(bits);
        }
    }
}
