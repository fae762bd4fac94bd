//! Thread-safe handle around the averaging engine
//!
//! One producer thread ingests chunks, a control thread changes settings and
//! a render thread polls the waveform. All of them go through the same
//! `parking_lot::Mutex`, so a setter can never land halfway through a chunk
//! and readers always see the state after a whole chunk.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{AveragerStats, ThresholdAverager};

/// Cloneable, thread-safe spike averager
#[derive(Debug, Clone)]
pub struct SharedAverager {
    engine: Arc<Mutex<ThresholdAverager>>,
}

impl SharedAverager {
    /// Create a shared engine for the given configuration
    pub fn new(config: EngineConfig) -> crate::Result<Self> {
        Ok(SharedAverager {
            engine: Arc::new(Mutex::new(ThresholdAverager::new(config)?)),
        })
    }

    /// Process one chunk of samples
    pub fn ingest(&self, chunk: &[i16]) {
        if chunk.is_empty() {
            return;
        }
        self.engine.lock().ingest(chunk);
    }

    /// Process a chunk of little-endian 16-bit PCM bytes
    pub fn ingest_pcm_bytes(&self, bytes: &[u8]) {
        self.engine.lock().ingest_pcm_bytes(bytes);
    }

    /// Set the trigger level (applied on the next chunk)
    pub fn set_threshold(&self, threshold: i32) {
        self.engine.lock().set_threshold(threshold);
    }

    /// Set the contributor bound (applied on the next chunk, zero is ignored)
    pub fn set_max_size(&self, max_size: usize) {
        self.engine.lock().set_max_size(max_size);
    }

    /// Enable or disable the dead period (applied on the next chunk)
    pub fn set_dead_period(&self, dead_period: Option<usize>) {
        self.engine.lock().set_dead_period(dead_period);
    }

    /// Copy of the averaged waveform
    pub fn averaged_waveform(&self) -> Vec<i16> {
        self.engine.lock().averaged_waveform().to_vec()
    }

    /// Copy the averaged waveform into `dest` without allocating
    /// Returns the number of samples copied.
    pub fn copy_averaged_waveform(&self, dest: &mut [i16]) -> usize {
        let engine = self.engine.lock();
        let waveform = engine.averaged_waveform();
        let n = dest.len().min(waveform.len());
        dest[..n].copy_from_slice(&waveform[..n]);
        n
    }

    /// Current trigger level
    pub fn threshold(&self) -> i32 {
        self.engine.lock().threshold()
    }

    /// Current contributor bound
    pub fn max_size(&self) -> usize {
        self.engine.lock().max_size()
    }

    /// Get current pipeline statistics
    pub fn stats(&self) -> AveragerStats {
        self.engine.lock().stats().clone()
    }

    /// Clear all captured data
    pub fn reset(&self) {
        self.engine.lock().reset();
    }

    /// Clear all captured data on teardown
    pub fn close(&self) {
        self.engine.lock().close();
    }

    /// Run `f` with exclusive access to the engine
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut ThresholdAverager) -> R) -> R {
        f(&mut self.engine.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_state() {
        let shared = SharedAverager::new(EngineConfig::with_lengths(1, 3)).unwrap();
        let other = shared.clone();
        other.set_threshold(10);
        shared.ingest(&[0, 20, 5]);
        assert_eq!(other.averaged_waveform(), vec![0, 20, 5]);
        assert_eq!(other.stats().triggers, 1);
    }

    #[test]
    fn test_accepts_any_valid_max_size() {
        let mut config = EngineConfig::with_lengths(4, 16);
        config.max_size = usize::MAX;
        let shared = SharedAverager::new(config).unwrap();
        shared.set_threshold(100);
        shared.ingest(&[0, 0, 0, 0, 150, 150, 0, 0, 0, 0]);
        assert_eq!(shared.averaged_waveform()[4], 150);
        assert_eq!(shared.max_size(), usize::MAX);
    }

    #[test]
    fn test_copy_into_short_buffer() {
        let shared = SharedAverager::new(EngineConfig::with_lengths(1, 3)).unwrap();
        shared.set_threshold(10);
        shared.ingest(&[0, 20, 5]);
        let mut dest = [0i16; 2];
        assert_eq!(shared.copy_averaged_waveform(&mut dest), 2);
        assert_eq!(dest, [0, 20]);
    }

    #[test]
    fn test_concurrent_producer_and_reader() {
        let shared = SharedAverager::new(EngineConfig::with_lengths(4, 12)).unwrap();
        shared.set_threshold(100);
        shared.set_max_size(3);

        let producer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    shared.ingest(&[0, 0, 0, 0, 150, 150, 0, 0]);
                }
            })
        };
        let reader = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let waveform = shared.averaged_waveform();
                    assert_eq!(waveform.len(), 12);
                    let value = waveform[4];
                    assert!(value == 0 || value == 150, "torn value {value}");
                }
            })
        };

        producer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(shared.averaged_waveform()[4], 150);
        shared.with_engine(|engine| assert_eq!(engine.contributors(4), 3));
    }
}
