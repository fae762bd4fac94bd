//! Ring buffer holding the most recent samples of the stream
//!
//! The capture pipeline uses it to recover the samples that preceded a
//! threshold crossing. Memory consumption is fixed at capacity * sizeof(i16)
//! regardless of how long the stream runs.

/// Fixed-capacity circular store of the newest samples
///
/// Unwritten slots read as zero, so a freshly created buffer behaves as if the
/// stream had been silent before the first chunk.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    /// Sample storage
    buffer: Vec<i16>,
    /// Next slot to overwrite (also the oldest sample once the buffer wrapped)
    write_pos: usize,
    /// Total samples appended since creation or the last clear
    total_written: u64,
}

impl RingBuffer {
    /// Create a zero-filled ring buffer holding `capacity` samples
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            buffer: vec![0; capacity],
            write_pos: 0,
            total_written: 0,
        }
    }

    /// Number of samples retained
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of retained samples that came from the stream (at most the capacity)
    pub fn len(&self) -> usize {
        self.total_written.min(self.capacity() as u64) as usize
    }

    /// Check if nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.total_written == 0
    }

    /// Total samples appended since creation or the last clear
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Append a chunk, overwriting the oldest samples
    /// A chunk longer than the capacity leaves only its tail visible.
    pub fn append(&mut self, samples: &[i16]) {
        let capacity = self.capacity();
        self.total_written += samples.len() as u64;
        if capacity == 0 || samples.is_empty() {
            return;
        }

        // Only the newest `capacity` samples can survive
        let samples = &samples[samples.len().saturating_sub(capacity)..];
        let to_write = samples.len();

        if self.write_pos + to_write <= capacity {
            // Single write
            self.buffer[self.write_pos..self.write_pos + to_write].copy_from_slice(samples);
        } else {
            // Wrap-around write
            let first_part = capacity - self.write_pos;
            self.buffer[self.write_pos..].copy_from_slice(&samples[..first_part]);
            self.buffer[..to_write - first_part].copy_from_slice(&samples[first_part..]);
        }

        self.write_pos = (self.write_pos + to_write) % capacity;
    }

    /// Copy the newest `dest.len()` samples into `dest`, oldest first
    ///
    /// # Panics
    ///
    /// Panics if `dest` is longer than the capacity.
    pub fn copy_tail(&self, dest: &mut [i16]) {
        let capacity = self.capacity();
        let n = dest.len();
        assert!(
            n <= capacity,
            "requested {n} history samples from a buffer of {capacity}"
        );
        if n == 0 {
            return;
        }

        // Start of the tail in storage order
        let start = (self.write_pos + capacity - n) % capacity;
        if start + n <= capacity {
            dest.copy_from_slice(&self.buffer[start..start + n]);
        } else {
            let first_part = capacity - start;
            dest[..first_part].copy_from_slice(&self.buffer[start..]);
            dest[first_part..].copy_from_slice(&self.buffer[..n - first_part]);
        }
    }

    /// Contents in chronological order (oldest first)
    pub fn snapshot(&self) -> Vec<i16> {
        let mut out = vec![0; self.capacity()];
        self.copy_tail(&mut out);
        out
    }

    /// Zero the contents and rewind
    pub fn clear(&mut self) {
        self.buffer.fill(0);
        self.write_pos = 0;
        self.total_written = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_creation() {
        let rb = RingBuffer::new(8);
        assert_eq!(rb.capacity(), 8);
        assert!(rb.is_empty());
        assert_eq!(rb.len(), 0);
        assert_eq!(rb.snapshot(), vec![0; 8]);
    }

    #[test]
    fn test_partial_fill_reads_zero_prefix() {
        let mut rb = RingBuffer::new(6);
        rb.append(&[1, 2, 3]);
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.snapshot(), vec![0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_ring_buffer_wrap() {
        let mut rb = RingBuffer::new(5);
        rb.append(&[1, 2, 3, 4]);
        rb.append(&[5, 6, 7]);
        assert_eq!(rb.snapshot(), vec![3, 4, 5, 6, 7]);
        assert_eq!(rb.total_written(), 7);
        assert_eq!(rb.len(), 5);
    }

    #[test]
    fn test_oversized_chunk_keeps_tail() {
        let mut rb = RingBuffer::new(4);
        rb.append(&[9]);
        rb.append(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(rb.snapshot(), vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_copy_tail() {
        let mut rb = RingBuffer::new(5);
        rb.append(&[1, 2, 3, 4, 5, 6]);
        let mut tail = [0; 3];
        rb.copy_tail(&mut tail);
        assert_eq!(tail, [4, 5, 6]);

        let mut none: [i16; 0] = [];
        rb.copy_tail(&mut none);
    }

    #[test]
    #[should_panic(expected = "history samples")]
    fn test_copy_tail_too_long() {
        let rb = RingBuffer::new(2);
        let mut dest = [0; 3];
        rb.copy_tail(&mut dest);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let mut rb = RingBuffer::new(3);
        rb.append(&[1, 2]);
        rb.append(&[]);
        assert_eq!(rb.snapshot(), vec![0, 1, 2]);
        assert_eq!(rb.total_written(), 2);
    }

    #[test]
    fn test_clear() {
        let mut rb = RingBuffer::new(3);
        rb.append(&[1, 2, 3, 4]);
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.snapshot(), vec![0, 0, 0]);
    }
}
