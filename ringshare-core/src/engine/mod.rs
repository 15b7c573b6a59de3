//! `BatchWorker`: consumer-side lifecycle around a shared ring.
//!
//! ## Lifecycle
//!
//! ```text
//! BatchWorker::new()
//!     └─► warm_up()          → sink prepared
//!         └─► start()        → handle attached, poll thread spawned, status = Running
//!             └─► stop()     → thread signalled + joined, handle detached, status = Stopped
//! ```
//!
//! `start()`/`stop()` in the wrong state return an error rather than
//! panicking. A stopped worker can be started again; it re-attaches and, if
//! every other party detached meanwhile, gets a fresh ring.

pub mod config;
pub mod pipeline;

pub use config::WorkerConfig;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    error::{Result, RingError},
    ipc::events::{BatchEvent, WorkerStatus, WorkerStatusEvent},
    registry::RingRegistry,
    sink::SinkHandle,
};

/// Broadcast channel capacity: batch events buffered for slow subscribers.
const BROADCAST_CAP: usize = 64;

/// The poll thread and the means to stop it.
struct PollThread {
    shutdown_tx: Sender<()>,
    join: JoinHandle<()>,
}

/// Consumer of a shared ring: polls it on a fixed cadence and feeds batches
/// to a [`BatchSink`](crate::sink::BatchSink).
///
/// `BatchWorker` is `Send + Sync`; all state uses interior mutability.
pub struct BatchWorker {
    config: WorkerConfig,
    sink: SinkHandle,
    registry: RingRegistry,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
    batch_tx: broadcast::Sender<BatchEvent>,
    status_tx: broadcast::Sender<WorkerStatusEvent>,
    seq: Arc<AtomicU64>,
    /// Last text the sink produced; kept when later polls produce nothing.
    latest_text: Arc<Mutex<Option<String>>>,
    diagnostics: Arc<pipeline::WorkerDiagnostics>,
    thread: Mutex<Option<PollThread>>,
}

impl BatchWorker {
    /// Create a worker. Does not attach; call `start()`.
    pub fn new(mut config: WorkerConfig, sink: SinkHandle, registry: RingRegistry) -> Self {
        config.normalize();
        let (batch_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            sink,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(WorkerStatus::Idle)),
            batch_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            latest_text: Arc::new(Mutex::new(None)),
            diagnostics: Arc::new(pipeline::WorkerDiagnostics::default()),
            thread: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Prepare the sink. Call once before `start()`.
    pub fn warm_up(&self) -> Result<()> {
        self.sink.0.lock().warm_up()?;
        info!("batch sink ready");
        Ok(())
    }

    /// Attach to the configured ring and start polling it.
    ///
    /// # Errors
    /// - `RingError::AlreadyRunning` if already started.
    /// - `RingError::Allocation` / `RingError::InvalidCapacity` if the ring
    ///   had to be created and could not be.
    /// - `RingError::Io` if the poll thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RingError::AlreadyRunning);
        }

        // Reap a loop that ended on its own (ring deactivated).
        let previous = self.thread.lock().take();
        if let Some(previous) = previous {
            let _ = previous.join.join();
        }

        let handle = match self
            .registry
            .attach(&self.config.ring_key, self.config.ring_capacity)
        {
            Ok(h) => h,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.set_status(WorkerStatus::Error, Some(e.to_string()));
                return Err(e);
            }
        };

        self.diagnostics.reset();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let ctx = pipeline::PipelineContext {
            config: self.config.clone(),
            sink: self.sink.clone(),
            handle,
            running: Arc::clone(&self.running),
            shutdown_rx,
            batch_tx: self.batch_tx.clone(),
            status_tx: self.status_tx.clone(),
            status: Arc::clone(&self.status),
            seq: Arc::clone(&self.seq),
            latest_text: Arc::clone(&self.latest_text),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        self.set_status(WorkerStatus::Running, None);
        let spawned = std::thread::Builder::new()
            .name("ringshare-worker".into())
            .spawn(move || pipeline::run(ctx));

        match spawned {
            Ok(join) => {
                *self.thread.lock() = Some(PollThread { shutdown_tx, join });
                info!(key = self.config.ring_key.as_str(), "batch worker running");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.set_status(WorkerStatus::Error, Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Stop polling, join the poll thread and detach from the ring.
    ///
    /// # Errors
    /// `RingError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RingError::NotRunning);
        }

        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            let _ = thread.shutdown_tx.send(());
            if thread.join.join().is_err() {
                warn!("batch worker thread panicked");
            }
        }

        self.set_status(WorkerStatus::Stopped, None);
        info!("batch worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current worker status (snapshot).
    pub fn status(&self) -> WorkerStatus {
        *self.status.lock()
    }

    /// Most recent text produced by the sink, if any.
    pub fn latest_text(&self) -> Option<String> {
        self.latest_text.lock().clone()
    }

    /// Subscribe to batch events.
    pub fn subscribe_batches(&self) -> broadcast::Receiver<BatchEvent> {
        self.batch_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<WorkerStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of poll counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: WorkerStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(WorkerStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl Drop for BatchWorker {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        } else if let Some(thread) = self.thread.get_mut().take() {
            let _ = thread.join.join();
        }
    }
}

impl std::fmt::Debug for BatchWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWorker")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
