//! Engine configuration
//!
//! Window geometry is fixed when the engine is built. Threshold, contributor
//! bound and dead period can be changed at runtime through the engine setters.

use crate::{Result, SpikeAveragerError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of windows contributing to the average
pub const DEFAULT_MAX_SIZE: usize = 30;

/// Default input sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Pre-trigger span captured before each crossing (and post-trigger span after it)
pub const CAPTURE_SPAN_SECONDS: f64 = 0.68;

/// Minimum spacing between two accepted triggers when the dead period is enabled
pub const DEAD_PERIOD_SECONDS: f64 = 0.005;

/// Threshold value that no 16-bit sample can cross
pub const DISARMED_THRESHOLD: i32 = i32::MAX;

/// Spike averaging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trigger level. Non-negative values trigger on rising crossings,
    /// negative values on falling crossings.
    pub threshold: i32,

    /// Maximum number of windows contributing to the average at any offset
    pub max_size: usize,

    /// Samples taken from history before the crossing sample.
    /// Also the capacity of the lookback ring buffer.
    pub pre_trigger_len: usize,

    /// Total capture window length (pre-trigger + post-trigger samples)
    pub window_len: usize,

    /// Samples to ignore after an accepted trigger (`None` disables)
    pub dead_period: Option<usize>,
}

impl EngineConfig {
    /// Create a configuration for a stream at `sample_rate`
    /// Captures 680 ms either side of the crossing (29 988 + 29 988 samples @ 44.1kHz)
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        let pre_trigger_len = (sample_rate as f64 * CAPTURE_SPAN_SECONDS) as usize;
        EngineConfig {
            threshold: DISARMED_THRESHOLD,
            max_size: DEFAULT_MAX_SIZE,
            pre_trigger_len,
            window_len: pre_trigger_len * 2,
            dead_period: None,
        }
    }

    /// Create a configuration with explicit window geometry
    pub fn with_lengths(pre_trigger_len: usize, window_len: usize) -> Self {
        EngineConfig {
            pre_trigger_len,
            window_len,
            ..Self::default()
        }
    }

    /// Dead period length recommended for `sample_rate` (5 ms of mono samples)
    pub fn dead_period_for(sample_rate: u32) -> usize {
        (sample_rate as f64 * DEAD_PERIOD_SECONDS) as usize
    }

    /// Load a configuration from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Samples captured after the crossing sample (including it)
    pub fn post_trigger_len(&self) -> usize {
        self.window_len.saturating_sub(self.pre_trigger_len)
    }

    /// Window duration in milliseconds at `sample_rate`
    pub fn window_ms(&self, sample_rate: u32) -> f32 {
        (self.window_len as f32 / sample_rate as f32) * 1000.0
    }

    /// Check window geometry and bounds
    pub fn validate(&self) -> Result<()> {
        if self.pre_trigger_len == 0 {
            return Err(SpikeAveragerError::ConfigError(
                "pre-trigger length must be greater than 0".into(),
            ));
        }
        if self.window_len <= self.pre_trigger_len {
            return Err(SpikeAveragerError::ConfigError(format!(
                "window length {} must exceed pre-trigger length {}",
                self.window_len, self.pre_trigger_len
            )));
        }
        if self.max_size == 0 {
            return Err(SpikeAveragerError::ConfigError(
                "max_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_sample_rate(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_default_geometry() {
        let config = EngineConfig::default();
        assert_eq!(config.pre_trigger_len, 29_988);
        assert_eq!(config.window_len, 59_976);
        assert_eq!(config.post_trigger_len(), 29_988);
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.threshold, DISARMED_THRESHOLD);
        assert!(config.dead_period.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_duration() {
        let config = EngineConfig::for_sample_rate(44_100);
        assert_relative_eq!(config.window_ms(44_100), 1360.0, epsilon = 0.1);
    }

    #[test]
    fn test_dead_period_for() {
        assert_eq!(EngineConfig::dead_period_for(44_100), 220);
    }

    #[test]
    fn test_invalid_geometry() {
        let err = EngineConfig::with_lengths(0, 16).validate().unwrap_err();
        assert!(err.to_string().contains("greater than 0"));

        let err = EngineConfig::with_lengths(16, 16).validate().unwrap_err();
        assert!(err.to_string().contains("must exceed"));

        let mut config = EngineConfig::with_lengths(4, 16);
        config.max_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"threshold": 250, "pre_trigger_len": 8, "window_len": 24}}"#).unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.threshold, 250);
        assert_eq!(config.pre_trigger_len, 8);
        assert_eq!(config.window_len, 24);
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
    }

    #[test]
    fn test_load_json_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_size": 0}}"#).unwrap();
        let err = EngineConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, SpikeAveragerError::ConfigError(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = EngineConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, SpikeAveragerError::ParseError(_)));

        let err = EngineConfig::from_json_file("/nonexistent/spike.json").unwrap_err();
        assert!(matches!(err, SpikeAveragerError::Io(_)));
    }

    #[test]
    fn test_json_partial_config() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"threshold": -300, "max_size": 5}"#).unwrap();
        assert_eq!(config.threshold, -300);
        assert_eq!(config.max_size, 5);
        assert_eq!(config.window_len, EngineConfig::default().window_len);
    }
}
