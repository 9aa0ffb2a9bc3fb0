/*
 * Kernel Objects
 *
 * Every kernel object has a process-global identity (koid), a readiness
 * signal and a count of the handles referring to it. The handle layer calls
 * back into the object when that count drops to zero.
 *
 * The interface is a flat capability set (`Dispatcher`), implemented here by
 * socket endpoints.
 */

pub mod handle;
pub mod signals;
pub mod socket;

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::Result;
use signals::ReadinessSignal;

/// Kernel object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Koid(pub u64);

impl core::fmt::Display for Koid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Koid({})", self.0)
    }
}

/// Next koid to allocate (koid 0 is never handed out)
static NEXT_KOID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, never reused koid
pub fn alloc_koid() -> Koid {
    Koid(NEXT_KOID.fetch_add(1, Ordering::Relaxed))
}

/// Kernel object kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObjectType {
    Socket,
}

/// Number of live handles referring to an object
#[derive(Debug, Default)]
pub struct HandleCount(AtomicUsize);

impl HandleCount {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn increment(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns true when this removed the last handle
    pub(crate) fn decrement(&self) -> bool {
        let previous = self.0.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "handle count underflow");
        previous == 1
    }
}

/// Operations every kernel object exposes to the handle layer
pub trait Dispatcher: Send + Sync {
    fn koid(&self) -> Koid;

    fn object_type(&self) -> ObjectType;

    /// Identity of the paired object, if any
    fn related_koid(&self) -> Option<Koid> {
        None
    }

    /// Readiness bits exposed to generic wait primitives
    fn signal(&self) -> &ReadinessSignal;

    fn handle_count(&self) -> &HandleCount;

    /// Called exactly once, when the last handle is dropped
    fn on_zero_handles(&self) {}

    /// Clear then set bits in the user signal region
    ///
    /// Targets this object, or its peer when `peer` is true.
    fn user_signal(&self, clear_mask: u32, set_mask: u32, peer: bool) -> Result<()>;
}
