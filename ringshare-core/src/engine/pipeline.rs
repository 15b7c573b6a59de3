//! Blocking poll loop of the batch worker.
//!
//! ## Per poll
//!
//! ```text
//! 1. Sleep poll_interval (wakes early on shutdown)
//! 2. available() < min_batch_samples → keep previous output, poll again
//! 3. read(min(available, max_batch_samples)) into the scratch buffer
//! 4. Hand an AudioChunk to the sink
//! 5. Remember the sink's text and broadcast a BatchEvent
//! ```
//!
//! The loop runs on its own OS thread. It owns the worker's `RingHandle`, so
//! the handle is detached when the loop returns. The sink is reset on the way
//! out.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    buffering::chunk::AudioChunk,
    engine::WorkerConfig,
    error::RingError,
    ipc::events::{BatchEvent, WorkerStatus, WorkerStatusEvent},
    registry::RingHandle,
    sink::SinkHandle,
};

/// Log buffered-sample levels on every Nth poll.
const LEVEL_LOG_EVERY: usize = 5;

#[derive(Default)]
pub struct WorkerDiagnostics {
    pub polls: AtomicUsize,
    pub short_polls: AtomicUsize,
    pub batches: AtomicUsize,
    pub samples_consumed: AtomicUsize,
    pub sink_errors: AtomicUsize,
}

impl WorkerDiagnostics {
    pub fn reset(&self) {
        self.polls.store(0, Ordering::Relaxed);
        self.short_polls.store(0, Ordering::Relaxed);
        self.batches.store(0, Ordering::Relaxed);
        self.samples_consumed.store(0, Ordering::Relaxed);
        self.sink_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            short_polls: self.short_polls.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            samples_consumed: self.samples_consumed.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub polls: usize,
    pub short_polls: usize,
    pub batches: usize,
    pub samples_consumed: usize,
    pub sink_errors: usize,
}

/// All context the loop needs, passed as one struct so the spawn stays tidy.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub sink: SinkHandle,
    pub handle: RingHandle,
    pub running: Arc<AtomicBool>,
    /// Any message, or the sender being dropped, ends the loop.
    pub shutdown_rx: Receiver<()>,
    pub batch_tx: broadcast::Sender<BatchEvent>,
    pub status_tx: broadcast::Sender<WorkerStatusEvent>,
    pub status: Arc<Mutex<WorkerStatus>>,
    pub seq: Arc<AtomicU64>,
    pub latest_text: Arc<Mutex<Option<String>>>,
    pub diagnostics: Arc<WorkerDiagnostics>,
}

/// Run the poll loop until shutdown is signalled or the ring goes inactive.
pub fn run(ctx: PipelineContext) {
    let poll_interval = ctx.config.poll_interval();
    // The ring may predate this worker and be smaller than configured.
    let capacity = ctx.handle.capacity();
    let min_batch = ctx.config.min_batch_samples.clamp(1, capacity);
    if min_batch < ctx.config.min_batch_samples {
        warn!(
            key = ctx.handle.key(),
            configured = ctx.config.min_batch_samples,
            capacity,
            "min batch exceeds ring capacity, clamped"
        );
    }
    let max_batch = ctx.config.max_batch_samples.clamp(min_batch, capacity);

    info!(
        key = ctx.handle.key(),
        poll_ms = poll_interval.as_millis() as u64,
        min_batch,
        max_batch,
        "batch worker started"
    );

    // Scratch buffer, allocated once and reused for every batch.
    let mut scratch = vec![0f32; max_batch];

    loop {
        match ctx.shutdown_rx.recv_timeout(poll_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if !ctx.running.load(Ordering::Acquire) {
            break;
        }

        let poll = ctx.diagnostics.polls.fetch_add(1, Ordering::Relaxed);
        let available = ctx.handle.available();
        if poll % LEVEL_LOG_EVERY == 0 {
            debug!(available, need = min_batch, "buffered samples");
        }

        if !ctx.handle.ring().is_active() {
            fail(&ctx, "shared ring was deactivated");
            break;
        }

        if available < min_batch {
            ctx.diagnostics.short_polls.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        let take = available.min(max_batch);
        let batch = &mut scratch[..take];
        match ctx.handle.read(batch) {
            Ok(()) => {}
            Err(e) if e.is_retryable() => {
                ctx.diagnostics.short_polls.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            Err(RingError::InactiveBuffer) => {
                fail(&ctx, "shared ring was deactivated");
                break;
            }
            Err(e) => {
                error!("ring read failed: {e}");
                continue;
            }
        }

        process_batch(&ctx, batch);
    }

    // Session boundary: the next start may see a fresh ring.
    ctx.sink.0.lock().reset();

    let snap = ctx.diagnostics.snapshot();
    let ring = ctx.handle.diagnostics();
    info!(
        polls = snap.polls,
        short_polls = snap.short_polls,
        batches = snap.batches,
        samples_consumed = snap.samples_consumed,
        sink_errors = snap.sink_errors,
        overrun_samples = ring.overrun_samples,
        "batch worker stopped, diagnostics"
    );
}

/// Pass one batch to the sink and broadcast the outcome.
fn process_batch(ctx: &PipelineContext, samples: &[f32]) {
    let chunk = AudioChunk::new(samples.to_vec(), ctx.config.sample_rate);
    ctx.diagnostics.batches.fetch_add(1, Ordering::Relaxed);
    ctx.diagnostics
        .samples_consumed
        .fetch_add(chunk.len(), Ordering::Relaxed);

    let text = match ctx.sink.0.lock().consume(&chunk) {
        Ok(text) => text,
        Err(e) => {
            ctx.diagnostics.sink_errors.fetch_add(1, Ordering::Relaxed);
            warn!(samples = chunk.len(), "sink failed on batch: {e}");
            None
        }
    };

    if let Some(ref t) = text {
        debug!(samples = chunk.len(), text = t.as_str(), "batch produced text");
        *ctx.latest_text.lock() = Some(t.clone());
    }

    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed) + 1;
    let _ = ctx.batch_tx.send(BatchEvent {
        seq,
        samples: chunk.len(),
        duration_secs: chunk.duration_secs(),
        text,
    });
}

fn fail(ctx: &PipelineContext, detail: &str) {
    warn!(key = ctx.handle.key(), "{detail}");
    ctx.running.store(false, Ordering::Release);
    *ctx.status.lock() = WorkerStatus::Error;
    let _ = ctx.status_tx.send(WorkerStatusEvent {
        status: WorkerStatus::Error,
        detail: Some(detail.to_string()),
    });
}
