//! Incremental per-offset averaging
//!
//! Capture windows are folded into the average offset range by offset range
//! as they fill up. Each offset keeps its own running sum and contributor
//! count, because windows started at different points of a chunk reach a given
//! offset at different times. Once an offset has `max_size` contributors, the
//! oldest contributor's sample is subtracted before the new one is added, so
//! the bound holds at every offset independently.

use std::ops::Range;

/// Where the contributor to evict lives
///
/// Resolved once per fold by the pipeline from window sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionSource {
    /// Window still being filled, at this position of the in-flight list
    InFlight(usize),
    /// Populated window, at this position of the retired history
    Retired(usize),
}

/// Running sum and contributor count at one offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Slot {
    sum: i64,
    count: u32,
}

/// Running per-offset average bounded to `max_size` contributors
#[derive(Debug, Clone)]
pub struct RunningAverage {
    /// Sum and count per offset
    slots: Vec<Slot>,
    /// Average per offset (the output waveform)
    averaged: Vec<i16>,
    /// Contributor bound
    max_size: u32,
}

impl RunningAverage {
    /// Create an empty average over windows of `window_len` samples
    pub fn new(window_len: usize, max_size: usize) -> Self {
        assert!(max_size > 0, "max_size must be greater than 0");
        RunningAverage {
            slots: vec![Slot::default(); window_len],
            averaged: vec![0; window_len],
            max_size: u32::try_from(max_size).unwrap_or(u32::MAX),
        }
    }

    /// Fold `samples[range]` into the average
    ///
    /// `evicted` holds the samples of the oldest contributor; it is consulted
    /// at every offset whose count already reached `max_size`.
    ///
    /// # Panics
    ///
    /// Panics if an offset is full and no evicted contributor was given, or
    /// if the range does not fit the window. Both indicate broken bookkeeping.
    pub fn fold(&mut self, samples: &[i16], range: Range<usize>, evicted: Option<&[i16]>) {
        assert!(
            range.end <= self.slots.len() && samples.len() == self.slots.len(),
            "fold range {range:?} outside window of {}",
            self.slots.len()
        );

        for i in range {
            let slot = &mut self.slots[i];
            if slot.count >= self.max_size {
                let Some(old) = evicted else {
                    panic!(
                        "offset {i} holds {} contributors but nothing to evict",
                        slot.count
                    );
                };
                slot.sum -= old[i] as i64;
                slot.count -= 1;
            }
            slot.sum += samples[i] as i64;
            slot.count += 1;
            // Integer division truncates toward zero, the mean of i16 values fits i16
            self.averaged[i] = (slot.sum / slot.count as i64) as i16;
        }
    }

    /// Current averaged waveform (zero where nothing has been folded)
    pub fn averaged(&self) -> &[i16] {
        &self.averaged
    }

    /// Contributors at `offset`
    pub fn contributors(&self, offset: usize) -> usize {
        self.slots[offset].count as usize
    }

    /// Running sum at `offset`
    pub fn sum(&self, offset: usize) -> i64 {
        self.slots[offset].sum
    }

    /// Contributor bound
    pub fn max_size(&self) -> usize {
        self.max_size as usize
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check for a zero-length window
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check if nothing has been folded yet
    pub fn is_unset(&self) -> bool {
        self.slots.iter().all(|slot| slot.count == 0)
    }

    /// Drop all contributions
    pub fn clear(&mut self) {
        self.slots.fill(Slot::default());
        self.averaged.fill(0);
    }
}
