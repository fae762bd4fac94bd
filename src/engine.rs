//! Spike-triggered averaging pipeline
//!
//! Every ingested chunk goes through the same steps:
//! 1. reset everything if the chunk length, threshold or contributor bound changed
//! 2. feed the chunk to the windows that are still filling
//! 3. scan for the first crossing and start a new window there
//! 4. remember the chunk in the lookback history
//! 5. fold newly written offsets of every filling window into the average
//! 6. retire populated windows into the bounded history

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::averager::{EvictionSource, RunningAverage};
use crate::capture::CaptureWindow;
use crate::config::EngineConfig;
use crate::detector::CrossingDetector;
use crate::ring_buffer::RingBuffer;

/// Counters for monitoring the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AveragerStats {
    /// Non-empty chunks ingested since creation
    pub chunks_ingested: u64,
    /// Samples ingested since creation
    pub samples_ingested: u64,
    /// Capture windows started
    pub triggers: u64,
    /// Capture windows that became fully populated
    pub windows_completed: u64,
    /// Full resets (explicit or caused by a configuration change)
    pub resets: u64,
}

/// Settings the pipeline last processed a chunk with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AppliedSettings {
    chunk_len: usize,
    threshold: i32,
    max_size: usize,
    dead_period: Option<usize>,
}

/// Single-threaded spike-triggered averaging engine
///
/// Use [`crate::SharedAverager`] when chunks, settings and reads come from
/// different threads.
#[derive(Debug)]
pub struct ThresholdAverager {
    /// Requested configuration (setters write here)
    config: EngineConfig,
    /// Settings in effect for the accumulated state
    applied: Option<AppliedSettings>,
    /// Lookback history for pre-trigger context
    history: RingBuffer,
    /// Crossing detector with carried-over previous sample
    detector: CrossingDetector,
    /// Windows still being filled, oldest first
    in_flight: VecDeque<CaptureWindow>,
    /// Populated windows still needed for eviction, oldest first
    retired: VecDeque<CaptureWindow>,
    /// Per-offset running average
    average: RunningAverage,
    /// Sequence number for the next window
    next_sequence: u64,
    /// Pipeline counters
    stats: AveragerStats,
}

impl ThresholdAverager {
    /// Create an engine for the given configuration
    pub fn new(config: EngineConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(ThresholdAverager {
            config,
            applied: None,
            history: RingBuffer::new(config.pre_trigger_len),
            detector: CrossingDetector::new(config.dead_period),
            in_flight: VecDeque::new(),
            retired: VecDeque::new(),
            average: RunningAverage::new(config.window_len, config.max_size),
            next_sequence: 0,
            stats: AveragerStats::default(),
        })
    }

    /// Process one chunk of samples
    pub fn ingest(&mut self, chunk: &[i16]) {
        if chunk.is_empty() {
            return;
        }
        self.apply_settings(chunk.len());
        self.stats.chunks_ingested += 1;
        self.stats.samples_ingested += chunk.len() as u64;

        for window in self.in_flight.iter_mut() {
            window.append(chunk);
        }

        if let Some(crossing) = self.detector.scan(self.config.threshold, chunk) {
            let window = CaptureWindow::start(
                self.next_sequence,
                self.config.window_len,
                self.config.pre_trigger_len,
                &self.history,
                chunk,
                crossing.index,
            );
            trace!(
                sequence = self.next_sequence,
                index = crossing.index,
                sample = crossing.sample,
                "trigger"
            );
            self.next_sequence += 1;
            self.stats.triggers += 1;
            self.in_flight.push_back(window);
        }

        self.history.append(chunk);

        for position in 0..self.in_flight.len() {
            self.fold_in_flight(position);
        }

        self.retire_populated();
    }

    /// Process a chunk of little-endian 16-bit PCM bytes
    /// A trailing odd byte is ignored.
    pub fn ingest_pcm_bytes(&mut self, bytes: &[u8]) {
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        self.ingest(&samples);
    }

    /// Reset everything if the settings differ from the ones in effect
    fn apply_settings(&mut self, chunk_len: usize) {
        let requested = AppliedSettings {
            chunk_len,
            threshold: self.config.threshold,
            max_size: self.config.max_size,
            dead_period: self.config.dead_period,
        };
        match self.applied {
            Some(applied) if applied == requested => {}
            Some(applied) => {
                debug!(?applied, ?requested, "settings changed, resetting averages");
                self.reset();
            }
            None => self.clear_state(),
        }
        self.applied = Some(requested);
    }

    /// Fold the pending offsets of the in-flight window at `position`
    fn fold_in_flight(&mut self, position: usize) {
        let window = &self.in_flight[position];
        let range = window.pending();
        if range.is_empty() {
            return;
        }

        let source = self.eviction_source(window.sequence());
        let evicted = source.map(|source| {
            let old = match source {
                EvictionSource::InFlight(p) => &self.in_flight[p],
                EvictionSource::Retired(p) => &self.retired[p],
            };
            assert!(
                old.last_averaged() >= range.end,
                "evicted window {} has not folded offsets up to {}",
                old.sequence(),
                range.end
            );
            old.samples()
        });

        self.average.fold(window.samples(), range, evicted);
        self.in_flight[position].mark_averaged();
    }

    /// Locate the contributor that window `sequence` replaces
    ///
    /// Windows reach every offset in creation order, so at each offset the
    /// oldest of the last `max_size` contributors is window `sequence - max_size`.
    fn eviction_source(&self, sequence: u64) -> Option<EvictionSource> {
        let target = sequence.checked_sub(self.config.max_size as u64)?;

        let position_in = |windows: &VecDeque<CaptureWindow>| -> Option<usize> {
            let first = windows.front()?.sequence();
            let position = usize::try_from(target.checked_sub(first)?).ok()?;
            (position < windows.len()).then_some(position)
        };

        if let Some(position) = position_in(&self.in_flight) {
            return Some(EvictionSource::InFlight(position));
        }
        if let Some(position) = position_in(&self.retired) {
            return Some(EvictionSource::Retired(position));
        }
        panic!("window {target} needed for eviction is no longer retained");
    }

    /// Move populated windows to the retired history
    fn retire_populated(&mut self) {
        // Older windows fill first, so populated ones are always at the front
        let populated = self
            .in_flight
            .iter()
            .take_while(|window| window.is_populated())
            .count();
        for window in self.in_flight.drain(..populated) {
            trace!(sequence = window.sequence(), "window populated");
            self.stats.windows_completed += 1;
            if self.retired.len() >= self.config.max_size {
                self.retired.pop_front();
            }
            self.retired.push_back(window);
        }
    }

    /// Set the trigger level (applied on the next chunk)
    pub fn set_threshold(&mut self, threshold: i32) {
        debug!(threshold, "set threshold");
        self.config.threshold = threshold;
    }

    /// Set the contributor bound (applied on the next chunk)
    /// Zero is ignored.
    pub fn set_max_size(&mut self, max_size: usize) {
        if max_size > 0 {
            debug!(max_size, "set max size");
            self.config.max_size = max_size;
        }
    }

    /// Enable or disable the dead period (applied on the next chunk)
    pub fn set_dead_period(&mut self, dead_period: Option<usize>) {
        debug!(?dead_period, "set dead period");
        self.config.dead_period = dead_period;
    }

    /// Current trigger level
    pub fn threshold(&self) -> i32 {
        self.config.threshold
    }

    /// Current contributor bound
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Current configuration, including pending setter changes
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Averaged waveform, `window_len` samples long
    pub fn averaged_waveform(&self) -> &[i16] {
        self.average.averaged()
    }

    /// Number of windows contributing at `offset`
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not below the window length.
    pub fn contributors(&self, offset: usize) -> usize {
        self.average.contributors(offset)
    }

    /// Windows still being filled
    pub fn windows_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Populated windows kept for eviction
    pub fn windows_retained(&self) -> usize {
        self.retired.len()
    }

    /// Lookback history
    pub fn history(&self) -> &RingBuffer {
        &self.history
    }

    /// Pipeline counters
    pub fn stats(&self) -> &AveragerStats {
        &self.stats
    }

    /// Clear history, windows and averages
    /// Settings are kept; the next chunk starts a fresh series.
    pub fn reset(&mut self) {
        self.clear_state();
        self.stats.resets += 1;
    }

    fn clear_state(&mut self) {
        if self.average.max_size() != self.config.max_size {
            self.average = RunningAverage::new(self.config.window_len, self.config.max_size);
        } else {
            self.average.clear();
        }
        self.history.clear();
        self.detector = CrossingDetector::new(self.config.dead_period);
        self.in_flight.clear();
        self.retired.clear();
        self.next_sequence = 0;
    }

    /// Release all captured data
    pub fn close(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn averager(pre: usize, window: usize, threshold: i32) -> ThresholdAverager {
        let mut engine = ThresholdAverager::new(EngineConfig::with_lengths(pre, window)).unwrap();
        engine.set_threshold(threshold);
        engine
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(ThresholdAverager::new(EngineConfig::with_lengths(8, 4)).is_err());
    }

    #[test]
    fn test_waveform_has_window_length_before_data() {
        let engine = averager(4, 12, 100);
        assert_eq!(engine.averaged_waveform(), &[0; 12]);
    }

    #[test]
    fn test_disarmed_by_default() {
        let mut engine = ThresholdAverager::new(EngineConfig::with_lengths(2, 6)).unwrap();
        engine.ingest(&[0, i16::MAX, i16::MIN, 0]);
        assert_eq!(engine.stats().triggers, 0);
        assert_eq!(engine.windows_in_flight(), 0);
    }

    #[test]
    fn test_single_window_fills_across_chunks() {
        let mut engine = averager(2, 8, 10);
        engine.ingest(&[0, 0, 50]);
        assert_eq!(engine.windows_in_flight(), 1);
        assert_eq!(engine.contributors(2), 1);
        assert_eq!(engine.contributors(3), 0);

        engine.ingest(&[40, 30, 20]);
        engine.ingest(&[10, 5, 1]);
        assert_eq!(engine.windows_in_flight(), 0);
        assert_eq!(engine.windows_retained(), 1);
        assert_eq!(engine.averaged_waveform(), &[0, 0, 50, 40, 30, 20, 10, 5]);
        assert_eq!(engine.stats().windows_completed, 1);
    }

    #[test]
    fn test_pre_trigger_comes_from_history() {
        let mut engine = averager(3, 6, 100);
        engine.ingest(&[7, 8, 9]);
        engine.ingest(&[1, 200, 2]);
        // Window: history [8, 9] + chunk head [1], crossing 200, then 2
        assert_eq!(&engine.averaged_waveform()[..5], &[8, 9, 1, 200, 2]);
    }

    #[test]
    fn test_max_size_change_resets_lazily() {
        let mut engine = averager(1, 3, 10);
        engine.ingest(&[0, 20, 0]);
        assert_eq!(engine.contributors(1), 1);

        engine.set_max_size(0);
        assert_eq!(engine.max_size(), 30);

        engine.set_max_size(5);
        assert_eq!(engine.contributors(1), 1);
        engine.ingest(&[0, 0, 0]);
        assert_eq!(engine.contributors(1), 0);
        assert_eq!(engine.averaged_waveform(), &[0, 0, 0]);
    }

    #[test]
    fn test_pcm_bytes() {
        let mut engine = averager(1, 3, 10);
        let bytes: Vec<u8> = [0i16, 300, -4]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .chain([0xFF])
            .collect();
        engine.ingest_pcm_bytes(&bytes);
        assert_eq!(engine.averaged_waveform(), &[0, 300, -4]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut engine = averager(2, 6, 10);
        engine.ingest(&[0, 50, 0]);
        engine.reset();
        assert_eq!(engine.windows_in_flight(), 0);
        assert!(engine.history().is_empty());
        assert_eq!(engine.averaged_waveform(), &[0; 6]);
        assert_eq!(engine.threshold(), 10);
    }

    #[test]
    fn test_close_before_any_data() {
        let mut engine = averager(2, 6, 10);
        engine.close();
        assert_eq!(engine.averaged_waveform(), &[0; 6]);
    }

    #[test]
    fn test_unbounded_max_size_in_config() {
        let mut config = EngineConfig::with_lengths(4, 16);
        config.threshold = 100;
        config.max_size = usize::MAX;
        assert!(config.validate().is_ok());

        let mut engine = ThresholdAverager::new(config).unwrap();
        let chunk = [0, 0, 0, 0, 150, 150, 0, 0, 0, 0];
        engine.ingest(&chunk);
        engine.ingest(&chunk);
        assert_eq!(engine.averaged_waveform()[4], 150);
        assert_eq!(engine.contributors(4), 2);
    }

    #[test]
    fn test_populated_windows_retire_in_order() {
        let mut engine = averager(1, 4, 10);
        engine.set_max_size(2);
        for amplitude in [20, 30, 40] {
            engine.ingest(&[0, amplitude]);
        }
        // Each window needs a second chunk to fill, only the newest is still open
        assert_eq!(engine.windows_in_flight(), 1);
        assert_eq!(engine.windows_retained(), 2);
        assert_eq!(engine.stats().windows_completed, 2);
    }
}
