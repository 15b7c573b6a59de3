//! `WorkerConfig`: batch worker settings, loadable from JSON.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    buffering::{DEFAULT_CAPACITY, SAMPLE_RATE},
    error::{Result, RingError},
    registry::DEFAULT_RING_KEY,
};

/// Default poll cadence of the worker.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Minimum buffered audio before a batch is read: 2 s at 16 kHz.
pub const DEFAULT_MIN_BATCH_SAMPLES: usize = SAMPLE_RATE as usize * 2;
/// Largest batch read in one poll: 5 s at 16 kHz.
pub const DEFAULT_MAX_BATCH_SAMPLES: usize = SAMPLE_RATE as usize * 5;

const MAX_POLL_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct WorkerConfig {
    /// Registry key of the ring to attach to.
    pub ring_key: String,
    /// Capacity used if this worker is the first to attach.
    pub ring_capacity: usize,
    /// Sample rate of the ring's stream (Hz).
    pub sample_rate: u32,
    /// Sleep between polls.
    pub poll_interval_ms: u64,
    /// Polls with fewer buffered samples than this read nothing.
    pub min_batch_samples: usize,
    /// Upper bound on the samples read per poll.
    pub max_batch_samples: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ring_key: DEFAULT_RING_KEY.into(),
            ring_capacity: DEFAULT_CAPACITY,
            sample_rate: SAMPLE_RATE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            min_batch_samples: DEFAULT_MIN_BATCH_SAMPLES,
            max_batch_samples: DEFAULT_MAX_BATCH_SAMPLES,
        }
    }
}

impl WorkerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// `RingError::Json` on malformed input, `RingError::Config` if the ring
    /// key is blank.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut config: WorkerConfig = serde_json::from_str(raw)?;
        if config.ring_key.trim().is_empty() {
            return Err(RingError::Config("ringKey must not be empty".into()));
        }
        config.normalize();
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Clamp every field into a range the worker can run with.
    pub fn normalize(&mut self) {
        self.ring_key = self.ring_key.trim().to_string();
        if self.ring_key.is_empty() {
            self.ring_key = DEFAULT_RING_KEY.into();
        }
        if self.ring_capacity == 0 {
            self.ring_capacity = DEFAULT_CAPACITY;
        }
        if self.sample_rate == 0 {
            self.sample_rate = SAMPLE_RATE;
        }
        self.poll_interval_ms = self.poll_interval_ms.clamp(1, MAX_POLL_INTERVAL_MS);
        self.min_batch_samples = self.min_batch_samples.clamp(1, self.ring_capacity);
        self.max_batch_samples = self
            .max_batch_samples
            .clamp(self.min_batch_samples, self.ring_capacity);
    }

    /// Poll interval, honouring `RINGSHARE_POLL_INTERVAL_MS` when set.
    pub fn poll_interval(&self) -> Duration {
        let ms = poll_interval_override().unwrap_or(self.poll_interval_ms);
        Duration::from_millis(ms.max(1))
    }
}

fn poll_interval_override() -> Option<u64> {
    static OVERRIDE: OnceLock<Option<u64>> = OnceLock::new();
    *OVERRIDE.get_or_init(|| {
        std::env::var("RINGSHARE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, MAX_POLL_INTERVAL_MS))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_cadence() {
        let config = WorkerConfig::default();
        assert_eq!(config.ring_key, DEFAULT_RING_KEY);
        assert_eq!(config.ring_capacity, 160_000);
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.min_batch_samples, 32_000);
        assert_eq!(config.max_batch_samples, 80_000);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            WorkerConfig::from_json_str(r#"{"ringKey":"deck-a","pollIntervalMs":500}"#).unwrap();
        assert_eq!(config.ring_key, "deck-a");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.min_batch_samples, DEFAULT_MIN_BATCH_SAMPLES);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(WorkerConfig::default()).unwrap();
        assert_eq!(json["ringCapacity"], 160_000);
        assert_eq!(json["minBatchSamples"], 32_000);
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = WorkerConfig::from_json_str(r#"{"ringKey":"  "}"#).unwrap_err();
        assert!(matches!(err, RingError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = WorkerConfig::from_json_str("{ringKey:").unwrap_err();
        assert!(matches!(err, RingError::Json(_)));
    }

    #[test]
    fn normalize_clamps_batches_into_capacity() {
        let mut config = WorkerConfig {
            ring_capacity: 1_000,
            min_batch_samples: 5_000,
            max_batch_samples: 10,
            poll_interval_ms: 0,
            sample_rate: 0,
            ..WorkerConfig::default()
        };
        config.normalize();
        assert_eq!(config.min_batch_samples, 1_000);
        assert_eq!(config.max_batch_samples, 1_000);
        assert_eq!(config.poll_interval_ms, 1);
        assert_eq!(config.sample_rate, SAMPLE_RATE);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err =
            WorkerConfig::from_json_file(Path::new("/nonexistent/ringshare/worker.json"))
                .unwrap_err();
        assert!(matches!(err, RingError::Io(_)));
    }
}
