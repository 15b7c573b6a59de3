//! # ringshare-core
//!
//! Shared audio ring buffer for live transcription.
//!
//! ## Architecture
//!
//! ```text
//! audio filter ──write──► SharedAudioRing ◄──available/read── BatchWorker (poll thread)
//!       │                      ▲                                   │
//!       └── RingHandle ── RingRegistry ── RingHandle ──────────────┘
//!                                                                  │
//!                                                        BatchSink::consume
//!                                                                  │
//!                                                  broadcast::Sender<BatchEvent>
//! ```
//!
//! `write` and `read` are lock-free and allocation-free. Producers and
//! consumers find each other through a keyed, reference-counted registry; the
//! ring lives exactly as long as the last attached handle.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod registry;
pub mod sink;

// Convenience re-exports for downstream crates
pub use buffering::{SharedAudioRing, DEFAULT_CAPACITY, SAMPLE_RATE};
pub use engine::{BatchWorker, WorkerConfig};
pub use error::{Result, RingError};
pub use ipc::events::{BatchEvent, WorkerStatus, WorkerStatusEvent};
pub use registry::{RingHandle, RingRegistry, DEFAULT_RING_KEY};
pub use sink::{BatchSink, SinkHandle, StubSink};
