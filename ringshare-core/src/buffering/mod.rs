//! Shared audio ring buffer and the chunk type handed to batch consumers.
//!
//! The ring is written by a real-time audio thread and drained by a polling
//! worker. Neither side blocks or allocates after construction.

pub mod chunk;
pub mod ring;

pub use ring::{RingDiagnosticsSnapshot, SharedAudioRing};

/// Sample rate of every stream stored in a ring (Hz, mono).
pub const SAMPLE_RATE: u32 = 16_000;

/// Default ring capacity: 10 s of mono audio at [`SAMPLE_RATE`].
pub const DEFAULT_CAPACITY: usize = SAMPLE_RATE as usize * 10;

/// Convert a sample count at [`SAMPLE_RATE`] to seconds.
pub fn samples_to_secs(samples: usize) -> f64 {
    samples as f64 / SAMPLE_RATE as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_capacity_is_ten_seconds() {
        assert_eq!(DEFAULT_CAPACITY, 160_000);
        assert_relative_eq!(samples_to_secs(DEFAULT_CAPACITY), 10.0);
    }
}
