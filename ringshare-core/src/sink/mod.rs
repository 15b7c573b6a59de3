//! Batch sink abstraction.
//!
//! A `BatchSink` is whatever consumes the batches the worker pulls out of the
//! ring, such as a transcriber or a file writer. The worker treats it as
//! a black box that turns a chunk of 16 kHz mono audio into optional text.
//!
//! `&mut self` on `consume` expresses that sinks are stateful. All mutation is
//! serialised through `SinkHandle`'s `parking_lot::Mutex`.

pub mod stub;

pub use stub::StubSink;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffering::chunk::AudioChunk;
use crate::error::Result;

/// Contract for consumers of ring batches.
pub trait BatchSink: Send + 'static {
    /// One-time preparation before the first batch (load a model, open a file).
    ///
    /// # Errors
    /// Returns an error if the sink cannot be made ready.
    fn warm_up(&mut self) -> Result<()>;

    /// Consume one batch.
    ///
    /// Returns the text produced for this batch, or `None` when the batch
    /// yielded nothing worth showing. Callers keep their previous output in
    /// that case.
    fn consume(&mut self, chunk: &AudioChunk) -> Result<Option<String>>;

    /// Drop any state carried between batches.
    fn reset(&mut self);
}

/// Thread-safe reference-counted handle to any `BatchSink` implementor.
#[derive(Clone)]
pub struct SinkHandle(pub Arc<Mutex<dyn BatchSink>>);

impl SinkHandle {
    /// Wrap any `BatchSink` in a `SinkHandle`.
    pub fn new<S: BatchSink>(sink: S) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle").finish_non_exhaustive()
    }
}
