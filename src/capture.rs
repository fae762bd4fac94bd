//! Capture windows
//!
//! A capture window is the fixed-length run of samples around one detected
//! crossing. It starts with history recovered from the ring buffer and is then
//! filled chunk by chunk until it reaches its full length.

use crate::ring_buffer::RingBuffer;

/// Fixed-length sample window filled across several chunks
#[derive(Debug, Clone)]
pub struct CaptureWindow {
    /// Creation order since the last reset
    sequence: u64,
    /// Window samples
    samples: Box<[i16]>,
    /// Next offset to write
    write_pos: usize,
    /// Offsets below this are already folded into the running average
    last_averaged: usize,
}

impl CaptureWindow {
    /// Start a window for a crossing at `crossing_index` within `chunk`
    ///
    /// The first `pre_trigger_len` samples are the newest samples of the
    /// history followed by the chunk samples preceding the crossing, so the
    /// crossing sample always lands at offset `pre_trigger_len`. The rest of
    /// the chunk is copied after it, bounded by the window length.
    ///
    /// `history` must not yet contain `chunk`.
    pub fn start(
        sequence: u64,
        window_len: usize,
        pre_trigger_len: usize,
        history: &RingBuffer,
        chunk: &[i16],
        crossing_index: usize,
    ) -> Self {
        assert!(
            pre_trigger_len < window_len && pre_trigger_len <= history.capacity(),
            "pre-trigger length {pre_trigger_len} does not fit window {window_len} / history {}",
            history.capacity()
        );
        assert!(crossing_index < chunk.len(), "crossing outside the chunk");

        let mut samples = vec![0i16; window_len].into_boxed_slice();

        // Pre-trigger context: history tail, then the chunk head before the crossing
        let from_chunk = crossing_index.min(pre_trigger_len);
        let from_history = pre_trigger_len - from_chunk;
        history.copy_tail(&mut samples[..from_history]);
        samples[from_history..pre_trigger_len]
            .copy_from_slice(&chunk[crossing_index - from_chunk..crossing_index]);

        let post = &chunk[crossing_index..];
        let to_copy = post.len().min(window_len - pre_trigger_len);
        samples[pre_trigger_len..pre_trigger_len + to_copy].copy_from_slice(&post[..to_copy]);

        CaptureWindow {
            sequence,
            samples,
            write_pos: pre_trigger_len + to_copy,
            last_averaged: 0,
        }
    }

    /// Append a chunk at the write position
    /// Returns true once the window is fully populated.
    pub fn append(&mut self, chunk: &[i16]) -> bool {
        let to_copy = self.remaining().min(chunk.len());
        self.samples[self.write_pos..self.write_pos + to_copy].copy_from_slice(&chunk[..to_copy]);
        self.write_pos += to_copy;
        self.is_populated()
    }

    /// Check if every offset has been written
    pub fn is_populated(&self) -> bool {
        self.write_pos == self.samples.len()
    }

    /// Offsets still to be written
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.write_pos
    }

    /// Creation order since the last reset
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Next offset to be written
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Offsets below this one are already part of the running average
    pub fn last_averaged(&self) -> usize {
        self.last_averaged
    }

    /// Offsets written but not yet folded
    pub fn pending(&self) -> std::ops::Range<usize> {
        self.last_averaged..self.write_pos
    }

    /// Record that everything written so far has been folded
    pub fn mark_averaged(&mut self) {
        self.last_averaged = self.write_pos;
    }

    /// Window samples (unwritten offsets read as zero)
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Total window length
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check for a zero-length window
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
