//! Spike-triggered averaging over streaming sample chunks
//!
//! Detects threshold crossings in a continuous stream of signed 16-bit samples,
//! captures a fixed-length window around each crossing and keeps a running
//! per-offset average of the most recent windows, so a renderer can show the
//! "typical" spike shape while data keeps arriving.
//!
//! # Features
//! - Circular lookback buffer recovering the pre-trigger context of a spike
//! - Capture windows filled incrementally across chunk boundaries
//! - Running average bounded to `max_size` contributors at every offset
//! - Lazy reset when threshold, contributor bound or chunk length changes
//! - Optional dead period between accepted triggers
//! - Thread-safe handle for producer / control / render threads
//!
//! # Crate feature flags
//! - `cli` (default): `spike-average` binary that averages spikes from a WAV file
//!
//! # Quick start
//! ```
//! use spike_averager::{EngineConfig, ThresholdAverager};
//!
//! let mut averager = ThresholdAverager::new(EngineConfig::with_lengths(4, 16)).unwrap();
//! averager.set_threshold(100);
//! averager.ingest(&[0, 0, 0, 0, 150, 150, 0, 0, 0, 0]);
//! assert_eq!(averager.averaged_waveform()[4], 150);
//! ```
//!
//! ## Sharing between threads
//! ```
//! use spike_averager::{EngineConfig, SharedAverager};
//!
//! let shared = SharedAverager::new(EngineConfig::with_lengths(4, 16)).unwrap();
//! let producer = shared.clone();
//! std::thread::spawn(move || producer.ingest(&[0; 10])).join().unwrap();
//! shared.set_threshold(-200);
//! let waveform = shared.averaged_waveform();
//! assert_eq!(waveform.len(), 16);
//! ```

#![warn(missing_docs)]

pub mod averager; // Per-offset running sums
pub mod capture; // Capture windows
pub mod config; // Engine configuration
pub mod detector; // Threshold crossing detection
pub mod engine; // Ingestion pipeline
pub mod ring_buffer; // Pre-trigger history
pub mod shared; // Thread-safe handle

/// Error types for spike averaging operations
#[derive(thiserror::Error, Debug)]
pub enum SpikeAveragerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error while reading configuration or sample data
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be decoded
    #[error("Config parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SpikeAveragerError {
    /// Converts a String into `SpikeAveragerError::Other`.
    ///
    /// Prefer `SpikeAveragerError::ConfigError(msg)` for invalid settings so
    /// callers can tell the two apart.
    fn from(msg: String) -> Self {
        SpikeAveragerError::Other(msg)
    }
}

impl From<&str> for SpikeAveragerError {
    fn from(msg: &str) -> Self {
        SpikeAveragerError::Other(msg.to_string())
    }
}

/// Result type for spike averaging operations
pub type Result<T> = std::result::Result<T, SpikeAveragerError>;

// Public API exports
pub use averager::{EvictionSource, RunningAverage};
pub use capture::CaptureWindow;
pub use config::{EngineConfig, DEFAULT_MAX_SIZE, DEFAULT_SAMPLE_RATE};
pub use detector::{Crossing, CrossingDetector};
pub use engine::{AveragerStats, ThresholdAverager};
pub use ring_buffer::RingBuffer;
pub use shared::SharedAverager;
