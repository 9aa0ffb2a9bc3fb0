/*
 * Chained Byte Stream Buffer
 *
 * Bounded FIFO byte queue built from a chain of fixed-size segments. Each
 * socket endpoint owns one as its receive buffer.
 *
 * Design:
 * - Segments are allocated on demand at the tail, up to the capacity
 * - Fully drained segments are freed from the head immediately
 * - Growth never reallocates or copies already buffered bytes
 * - Appends are truncated to the free space ("short write")
 * - Record boundaries are tracked separately for datagram delivery
 *
 * Error safety:
 * Every segment a write needs is reserved before the first byte is copied,
 * so an allocation failure leaves the buffer exactly as it was.
 */

use crate::config::SocketConfig;
use crate::error::{Result, SocketError};
use alloc::collections::VecDeque;
use alloc::vec::Vec;

#[cfg(test)]
mod tests_prop;

/// One fixed-capacity link of the chain
///
/// `data` holds everything written into the segment; `read` is how much of
/// it has already been consumed from the front.
struct Segment {
    data: Vec<u8>,
    read: usize,
}

impl Segment {
    fn with_capacity(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| SocketError::ResourceExhausted)?;
        Ok(Self { data, read: 0 })
    }

    fn free_space(&self, segment_size: usize) -> usize {
        segment_size - self.data.len()
    }

    fn pending(&self) -> usize {
        self.data.len() - self.read
    }

    fn fill(&mut self, bytes: &[u8], segment_size: usize) -> usize {
        let n = bytes.len().min(self.free_space(segment_size));
        self.data.extend_from_slice(&bytes[..n]);
        n
    }

    fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.pending());
        out[..n].copy_from_slice(&self.data[self.read..self.read + n]);
        self.read += n;
        n
    }

    fn skip(&mut self, len: usize) -> usize {
        let n = len.min(self.pending());
        self.read += n;
        n
    }
}

/// Bounded FIFO byte queue over a chain of fixed-size segments
pub struct ByteStreamBuffer {
    segments: VecDeque<Segment>,
    /// Lengths of the buffered records, oldest first (datagram mode only)
    records: VecDeque<usize>,
    size: usize,
    capacity: usize,
    segment_size: usize,
}

impl ByteStreamBuffer {
    /// Create an empty buffer
    ///
    /// No segment is allocated until the first append.
    pub fn new(config: &SocketConfig) -> Self {
        Self {
            segments: VecDeque::new(),
            records: VecDeque::new(),
            size: 0,
            capacity: config.capacity,
            segment_size: config.segment_size,
        }
    }

    /// Append as many leading bytes of `bytes` as fit
    ///
    /// # Returns
    /// Number of bytes written; less than `bytes.len()` when the buffer runs
    /// out of room and zero when it is already full.
    ///
    /// # Errors
    /// `ResourceExhausted` if a new segment cannot be allocated. Nothing is
    /// written in that case.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let n = bytes.len().min(self.remaining());
        if n == 0 {
            return Ok(0);
        }
        let bytes = &bytes[..n];

        // Reserve everything first so a failed allocation changes nothing
        let tail_free = self
            .segments
            .back()
            .map_or(0, |tail| tail.free_space(self.segment_size));
        let new_segments = n.saturating_sub(tail_free).div_ceil(self.segment_size);

        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(new_segments)
            .map_err(|_| SocketError::ResourceExhausted)?;
        for _ in 0..new_segments {
            fresh.push(Segment::with_capacity(self.segment_size)?);
        }
        self.segments
            .try_reserve(new_segments)
            .map_err(|_| SocketError::ResourceExhausted)?;

        let mut written = 0;
        if let Some(tail) = self.segments.back_mut() {
            written += tail.fill(bytes, self.segment_size);
        }
        for mut segment in fresh {
            written += segment.fill(&bytes[written..], self.segment_size);
            self.segments.push_back(segment);
        }
        debug_assert_eq!(written, n);

        self.size += n;
        Ok(n)
    }

    /// Append `bytes` as a single record, whole or not at all
    ///
    /// # Errors
    /// - `InvalidArgs` for an empty record or one larger than the capacity
    /// - `ShouldWait` if the record does not fit the current free space
    /// - `ResourceExhausted` on allocation failure
    pub fn append_record(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() || bytes.len() > self.capacity {
            return Err(SocketError::InvalidArgs);
        }
        if bytes.len() > self.remaining() {
            return Err(SocketError::ShouldWait);
        }
        self.records
            .try_reserve(1)
            .map_err(|_| SocketError::ResourceExhausted)?;

        let n = self.append(bytes)?;
        debug_assert_eq!(n, bytes.len());
        self.records.push_back(n);
        Ok(n)
    }

    /// Remove up to `out.len()` bytes from the front into `out`
    ///
    /// Returns the number of bytes removed, zero if the buffer is empty.
    pub fn consume(&mut self, out: &mut [u8]) -> usize {
        let n = self.drain_front(out);
        self.forget_record_bytes(n);
        n
    }

    /// Remove the oldest record, copying at most `out.len()` bytes of it
    ///
    /// Whatever part of the record does not fit `out` is discarded.
    /// Returns the number of bytes copied, zero if no record is buffered.
    pub fn consume_record(&mut self, out: &mut [u8]) -> usize {
        let Some(len) = self.records.pop_front() else {
            return 0;
        };
        let copy_len = len.min(out.len());
        let copied = self.drain_front(&mut out[..copy_len]);
        let skipped = self.skip_front(len - copied);
        debug_assert_eq!(copied + skipped, len);
        copied
    }

    /// Total number of buffered bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Configured maximum number of buffered bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes that can still be appended
    pub fn remaining(&self) -> usize {
        self.capacity - self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size >= self.capacity
    }

    /// Number of buffered records (datagram mode)
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of segments currently allocated
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn drain_front(&mut self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            let Some(head) = self.segments.front_mut() else {
                break;
            };
            copied += head.drain_into(&mut out[copied..]);
            self.release_drained_head();
        }
        self.size -= copied;
        copied
    }

    fn skip_front(&mut self, len: usize) -> usize {
        let mut skipped = 0;
        while skipped < len {
            let Some(head) = self.segments.front_mut() else {
                break;
            };
            skipped += head.skip(len - skipped);
            self.release_drained_head();
        }
        self.size -= skipped;
        skipped
    }

    /// Free the head segment once everything written into it has been read
    fn release_drained_head(&mut self) {
        if self.segments.front().is_some_and(|head| head.pending() == 0) {
            self.segments.pop_front();
        }
    }

    /// Keep record lengths in step with a plain byte consume
    fn forget_record_bytes(&mut self, mut n: usize) {
        while n > 0 {
            let Some(front) = self.records.front_mut() else {
                break;
            };
            if *front > n {
                *front -= n;
                break;
            }
            n -= *front;
            self.records.pop_front();
        }
    }
}
