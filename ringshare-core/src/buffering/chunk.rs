//! Typed batch of samples read out of the ring and passed to a [`BatchSink`].
//!
//! [`BatchSink`]: crate::sink::BatchSink

/// A contiguous block of mono PCM samples at a known sample rate.
///
/// Allocated once per batch on the worker thread, never on the audio thread.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (16000 for everything that passes through a ring).
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn two_second_batch_duration() {
        let chunk = AudioChunk::new(vec![0.0; 32_000], 16_000);
        assert_relative_eq!(chunk.duration_secs(), 2.0);
        assert_eq!(chunk.len(), 32_000);
        assert!(!chunk.is_empty());
    }

    #[test]
    fn zero_rate_has_zero_duration() {
        let chunk = AudioChunk::new(vec![0.1; 4], 0);
        assert_eq!(chunk.duration_secs(), 0.0);
    }
}
