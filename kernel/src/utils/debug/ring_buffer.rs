/*
 * Ring Buffer for Logging
 *
 * Fixed-size byte ring that keeps the most recent log output.
 *
 * Design:
 * - Fixed-size circular buffer (32KB), no heap allocations
 * - Overwrite on overflow (loses the oldest bytes)
 * - Not synchronized itself; the logger keeps it behind a spin lock
 */

/// Size of the ring buffer
pub const BUFFER_SIZE: usize = 32 * 1024;

/// Ring buffer for log messages
pub struct RingBuffer {
    buffer: [u8; BUFFER_SIZE],
    /// Index of the oldest byte
    tail: usize,
    /// Number of bytes held
    len: usize,
}

impl RingBuffer {
    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            tail: 0,
            len: 0,
        }
    }

    /// Append `data`, dropping the oldest bytes if it does not fit
    ///
    /// # Returns
    /// Number of bytes of `data` now held (only the last BUFFER_SIZE bytes
    /// of an oversized write survive)
    pub fn write(&mut self, data: &[u8]) -> usize {
        let data = &data[data.len().saturating_sub(BUFFER_SIZE)..];
        let overflow = (self.len + data.len()).saturating_sub(BUFFER_SIZE);
        self.tail = (self.tail + overflow) % BUFFER_SIZE;
        self.len -= overflow;

        let head = (self.tail + self.len) % BUFFER_SIZE;
        let first = data.len().min(BUFFER_SIZE - head);
        self.buffer[head..head + first].copy_from_slice(&data[..first]);
        self.buffer[..data.len() - first].copy_from_slice(&data[first..]);
        self.len += data.len();
        data.len()
    }

    /// Drain up to `dest.len()` of the oldest bytes into `dest`
    ///
    /// # Returns
    /// Number of bytes actually read
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.len);
        let first = n.min(BUFFER_SIZE - self.tail);
        dest[..first].copy_from_slice(&self.buffer[self.tail..self.tail + first]);
        dest[first..n].copy_from_slice(&self.buffer[..n - first]);
        self.tail = (self.tail + n) % BUFFER_SIZE;
        self.len -= n;
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the number of bytes currently in the buffer
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Write for RingBuffer {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}
