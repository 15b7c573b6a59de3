//! `StubSink`: placeholder sink that describes each batch instead of
//! transcribing it.
//!
//! Lets hosts and tests exercise the full ring → worker → event path without
//! a speech backend.

use crate::buffering::chunk::AudioChunk;
use crate::error::Result;
use crate::sink::BatchSink;
use tracing::debug;

/// Batches shorter than this (10 ms at 16 kHz) produce no text.
const MIN_DESCRIBED_SAMPLES: usize = 160;

/// Echo-style stub sink.
///
/// For every batch of non-trivial length it reports
/// `"[batch <n>: <N> samples @ <SR> Hz]"`.
pub struct StubSink {
    batch_count: u32,
}

impl StubSink {
    pub fn new() -> Self {
        Self { batch_count: 0 }
    }

    /// Batches described so far.
    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }
}

impl Default for StubSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchSink for StubSink {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubSink::warm_up (no-op)");
        Ok(())
    }

    fn consume(&mut self, chunk: &AudioChunk) -> Result<Option<String>> {
        if chunk.samples.len() < MIN_DESCRIBED_SAMPLES {
            return Ok(None);
        }

        self.batch_count += 1;
        Ok(Some(format!(
            "[batch {}: {} samples @ {} Hz]",
            self.batch_count,
            chunk.samples.len(),
            chunk.sample_rate
        )))
    }

    fn reset(&mut self) {
        debug!("StubSink::reset");
        self.batch_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_batches_in_sequence() {
        let mut sink = StubSink::new();
        let chunk = AudioChunk::new(vec![0.0; 32_000], 16_000);

        assert_eq!(
            sink.consume(&chunk).unwrap().as_deref(),
            Some("[batch 1: 32000 samples @ 16000 Hz]")
        );
        assert_eq!(
            sink.consume(&chunk).unwrap().as_deref(),
            Some("[batch 2: 32000 samples @ 16000 Hz]")
        );
        assert_eq!(sink.batch_count(), 2);
    }

    #[test]
    fn tiny_batches_produce_nothing() {
        let mut sink = StubSink::new();
        let chunk = AudioChunk::new(vec![0.0; 100], 16_000);
        assert!(sink.consume(&chunk).unwrap().is_none());
        assert_eq!(sink.batch_count(), 0);
    }

    #[test]
    fn reset_restarts_numbering() {
        let mut sink = StubSink::default();
        sink.warm_up().unwrap();
        sink.consume(&AudioChunk::new(vec![0.0; 320], 16_000)).unwrap();
        sink.reset();
        let text = sink
            .consume(&AudioChunk::new(vec![0.0; 320], 16_000))
            .unwrap();
        assert_eq!(text.as_deref(), Some("[batch 1: 320 samples @ 16000 Hz]"));
    }
}
