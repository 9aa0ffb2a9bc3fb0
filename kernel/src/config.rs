/*
 * Socket Configuration
 *
 * Compile-time limits and the per-pair buffer configuration.
 *
 * Receive buffers are chains of fixed-size segments, so memory grows in
 * segment-sized steps and drains segment by segment. The defaults give each
 * endpoint 128 segments of 2 KiB.
 */

use crate::error::{Result, SocketError};

/// Maximum size of a control message
pub const CONTROL_MSG_MAX: usize = 1024;

/// Default size of one receive buffer segment
pub const DEFAULT_SEGMENT_SIZE: usize = 2048;

/// Default receive buffer capacity per endpoint (256 KiB)
pub const DEFAULT_CAPACITY: usize = 128 * DEFAULT_SEGMENT_SIZE;

/// Receive buffer configuration for both endpoints of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketConfig {
    /// Maximum number of bytes buffered per endpoint
    pub capacity: usize,
    /// Size of each segment in the buffer chain
    pub segment_size: usize,
}

impl SocketConfig {
    pub const fn new(capacity: usize, segment_size: usize) -> Self {
        Self { capacity, segment_size }
    }

    /// Check the configuration can back a receive buffer
    ///
    /// Both values must be non-zero and a segment may not exceed the capacity.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.segment_size == 0 || self.segment_size > self.capacity {
            log::warn!(
                "Rejected socket config: capacity={} segment_size={}",
                self.capacity,
                self.segment_size
            );
            return Err(SocketError::InvalidArgs);
        }
        Ok(())
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_SEGMENT_SIZE)
    }
}
