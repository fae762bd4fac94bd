//! Threshold crossing detection
//!
//! The detector keeps the last sample of the previous chunk so a crossing that
//! straddles a chunk boundary is still seen. At most one crossing is reported
//! per chunk: a burst of spikes inside one chunk yields a single capture
//! window, which keeps windows from piling up on top of each other.

/// A detected crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    /// Index of the first sample beyond the threshold within the chunk
    pub index: usize,
    /// Value of that sample
    pub sample: i16,
}

/// Stateful threshold crossing detector
#[derive(Debug, Clone, Default)]
pub struct CrossingDetector {
    /// Last sample seen (carried across chunks)
    prev_sample: i16,
    /// Samples to skip after an accepted trigger
    dead_period: Option<usize>,
    /// Samples left in the current dead period
    dead_remaining: usize,
}

impl CrossingDetector {
    /// Create a detector with an optional dead period
    pub fn new(dead_period: Option<usize>) -> Self {
        CrossingDetector {
            prev_sample: 0,
            dead_period,
            dead_remaining: 0,
        }
    }

    /// Check a single sample transition against `threshold`
    ///
    /// Non-negative thresholds trigger on rising crossings, negative ones on
    /// falling crossings.
    #[inline]
    pub fn is_crossing(threshold: i32, prev: i16, current: i16) -> bool {
        let (prev, current) = (prev as i32, current as i32);
        if threshold >= 0 {
            current > threshold && prev <= threshold
        } else {
            current < threshold && prev >= threshold
        }
    }

    /// Scan a chunk and return its first crossing
    ///
    /// The previous-sample memory always ends up holding the chunk's last
    /// sample, whether or not a crossing was found.
    pub fn scan(&mut self, threshold: i32, chunk: &[i16]) -> Option<Crossing> {
        let mut found = None;
        let mut prev = self.prev_sample;

        for (index, &sample) in chunk.iter().enumerate() {
            if self.dead_remaining > 0 {
                self.dead_remaining -= 1;
            } else if found.is_none() && Self::is_crossing(threshold, prev, sample) {
                found = Some(Crossing { index, sample });
                self.dead_remaining = self.dead_period.unwrap_or(0);
            }
            prev = sample;
        }

        self.prev_sample = prev;
        found
    }

    /// Last sample seen
    pub fn prev_sample(&self) -> i16 {
        self.prev_sample
    }

    /// Configured dead period
    pub fn dead_period(&self) -> Option<usize> {
        self.dead_period
    }

    /// Check if triggers are currently suppressed
    pub fn in_dead_period(&self) -> bool {
        self.dead_remaining > 0
    }

    /// Forget the previous sample and any running dead period
    pub fn reset(&mut self) {
        self.prev_sample = 0;
        self.dead_remaining = 0;
    }
}
