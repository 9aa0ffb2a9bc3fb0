/*
 * Handles
 *
 * A handle is one counted external reference to a kernel object together
 * with the rights it grants. Objects stay alive while any handle or
 * internal reference exists, but they learn about the last handle going
 * away through `Dispatcher::on_zero_handles`; socket pairs use that to break
 * the reference cycle between the two endpoints.
 *
 * Rights only ever shrink: duplicate and replace accept a subset of the
 * current rights.
 */

use alloc::sync::Arc;
use bitflags::bitflags;

use super::signals::{ReadinessSignal, Signals};
use super::{Dispatcher, Koid, ObjectType};
use crate::error::{Result, SocketError};

bitflags! {
    /// Rights granted by a handle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Rights: u32 {
        const DUPLICATE = 1 << 0;
        const TRANSFER = 1 << 1;
        const READ = 1 << 2;
        const WRITE = 1 << 3;
        const SIGNAL = 1 << 4;
        const SIGNAL_PEER = 1 << 5;
    }
}

impl Rights {
    /// Rights of both handles returned by socket creation
    pub const DEFAULT_SOCKET: Rights = Rights::all();
}

/// Counted, rights-carrying reference to a kernel object
pub struct Handle<D: Dispatcher> {
    object: Arc<D>,
    rights: Rights,
}

impl<D: Dispatcher> Handle<D> {
    /// Wrap `object` in a new handle
    pub fn new(object: Arc<D>, rights: Rights) -> Self {
        object.handle_count().increment();
        Self { object, rights }
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }

    pub fn koid(&self) -> Koid {
        self.object.koid()
    }

    pub fn object_type(&self) -> ObjectType {
        self.object.object_type()
    }

    pub fn related_koid(&self) -> Option<Koid> {
        self.object.related_koid()
    }

    /// Readiness signal of the object, for registering observers
    pub fn signal(&self) -> &ReadinessSignal {
        self.object.signal()
    }

    /// Snapshot of the object's readiness bits
    pub fn signals(&self) -> Signals {
        self.object.signal().current()
    }

    /// Create another handle to the same object with `rights`
    ///
    /// # Errors
    /// `AccessDenied` without `DUPLICATE`, or if `rights` is not a subset of
    /// this handle's rights.
    pub fn duplicate(&self, rights: Rights) -> Result<Self> {
        self.require(Rights::DUPLICATE)?;
        if !self.rights.contains(rights) {
            return Err(SocketError::AccessDenied);
        }
        Ok(Self::new(Arc::clone(&self.object), rights))
    }

    /// Swap this handle for one with reduced `rights`
    ///
    /// The original handle is consumed even when the request is rejected.
    ///
    /// # Errors
    /// `AccessDenied` if `rights` is not a subset of the current rights.
    pub fn replace(self, rights: Rights) -> Result<Self> {
        if !self.rights.contains(rights) {
            return Err(SocketError::AccessDenied);
        }
        // New handle first so the count never touches zero
        Ok(Self::new(Arc::clone(&self.object), rights))
    }

    /// Clear then set user signal bits on the object or its peer
    ///
    /// Needs `SIGNAL` for the object itself, `SIGNAL_PEER` for the peer.
    pub fn user_signal(&self, clear_mask: u32, set_mask: u32, peer: bool) -> Result<()> {
        self.require(if peer { Rights::SIGNAL_PEER } else { Rights::SIGNAL })?;
        self.object.user_signal(clear_mask, set_mask, peer)
    }

    /// The object itself, for operations that need no rights
    pub fn object(&self) -> &D {
        self.object.as_ref()
    }

    /// Borrow the object after checking the handle carries `required`
    pub fn checked(&self, required: Rights) -> Result<&D> {
        self.require(required)?;
        Ok(self.object.as_ref())
    }

    fn require(&self, required: Rights) -> Result<()> {
        if self.rights.contains(required) {
            Ok(())
        } else {
            Err(SocketError::AccessDenied)
        }
    }
}

impl<D: Dispatcher> Drop for Handle<D> {
    fn drop(&mut self) {
        if self.object.handle_count().decrement() {
            log::debug!("Last handle to {} closed", self.object.koid());
            self.object.on_zero_handles();
        }
    }
}

impl<D: Dispatcher> core::fmt::Debug for Handle<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handle")
            .field("koid", &self.object.koid())
            .field("rights", &self.rights)
            .finish()
    }
}
