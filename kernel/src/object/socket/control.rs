/*
 * Control Message Slot
 *
 * Holds at most one pending out-of-band message of up to CONTROL_MSG_MAX
 * bytes. The peer fills it, the owning endpoint empties it, and a second
 * message is refused until the first has been read.
 */

use heapless::Vec;

use crate::config::CONTROL_MSG_MAX;
use crate::error::{Result, SocketError};

/// Single pending control message
pub struct ControlSlot {
    message: Vec<u8, CONTROL_MSG_MAX>,
}

impl ControlSlot {
    pub const fn new() -> Self {
        Self { message: Vec::new() }
    }

    /// A message is waiting to be read
    pub fn is_occupied(&self) -> bool {
        !self.message.is_empty()
    }

    /// Length of the pending message, zero when empty
    pub fn len(&self) -> usize {
        self.message.len()
    }

    /// Store `msg` as the pending message
    ///
    /// # Errors
    /// - `InvalidArgs` if `msg` is empty or longer than CONTROL_MSG_MAX
    /// - `BadState` if a message is already pending
    pub fn fill(&mut self, msg: &[u8]) -> Result<()> {
        if msg.is_empty() || msg.len() > CONTROL_MSG_MAX {
            return Err(SocketError::InvalidArgs);
        }
        if self.is_occupied() {
            return Err(SocketError::BadState);
        }
        self.message
            .extend_from_slice(msg)
            .map_err(|_| SocketError::InvalidArgs)
    }

    /// Move the pending message into `out` and empty the slot
    ///
    /// Copies at most `out.len()` bytes; the rest of the message is dropped.
    /// Returns `None` if no message is pending.
    pub fn take_into(&mut self, out: &mut [u8]) -> Option<usize> {
        if !self.is_occupied() {
            return None;
        }
        let n = out.len().min(self.message.len());
        out[..n].copy_from_slice(&self.message[..n]);
        self.message.clear();
        Some(n)
    }
}

impl Default for ControlSlot {
    fn default() -> Self {
        Self::new()
    }
}
