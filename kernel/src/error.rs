/*
 * Socket Error Types
 *
 * Every socket operation reports failure synchronously through
 * `SocketError`. A rejected operation never leaves partial state behind.
 *
 * Callers split the kinds into two groups:
 * - transient: `ShouldWait`, retry after the matching readiness signal
 * - permanent: everything else, retrying cannot succeed
 */

/// Socket error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketError {
    /// Zero-length or oversized control message, reserved signal bits,
    /// unknown flag bits, or an unusable configuration
    InvalidArgs,
    /// Operation not valid for the current shutdown or slot state
    BadState,
    /// Buffer full on write, buffer or control slot empty on read
    ShouldWait,
    /// The peer endpoint is gone
    PeerClosed,
    /// Allocation failed while creating a pair or growing a buffer
    ResourceExhausted,
    /// The handle lacks the rights the operation needs
    AccessDenied,
}

impl SocketError {
    /// True when the caller should wait for a readiness change and retry
    pub fn is_transient(&self) -> bool {
        matches!(self, SocketError::ShouldWait)
    }

    /// True when retrying the same operation can never succeed
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

impl core::fmt::Display for SocketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SocketError::InvalidArgs => write!(f, "Invalid arguments"),
            SocketError::BadState => write!(f, "Operation invalid in current state"),
            SocketError::ShouldWait => write!(f, "Operation would block"),
            SocketError::PeerClosed => write!(f, "Peer endpoint closed"),
            SocketError::ResourceExhausted => write!(f, "Out of memory"),
            SocketError::AccessDenied => write!(f, "Insufficient handle rights"),
        }
    }
}

/// Result alias used throughout the socket core
pub type Result<T> = core::result::Result<T, SocketError>;
