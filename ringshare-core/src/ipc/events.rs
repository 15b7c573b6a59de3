//! Events emitted by `BatchWorker`.
//!
//! | Event | Subscription |
//! |-------|--------------|
//! | `BatchEvent` | `BatchWorker::subscribe_batches` |
//! | `WorkerStatusEvent` | `BatchWorker::subscribe_status` |

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Batch events
// ---------------------------------------------------------------------------

/// Emitted once per batch read out of the ring and handed to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Number of samples in the batch.
    pub samples: usize,
    /// Batch length in seconds at the worker's sample rate.
    pub duration_secs: f64,
    /// Text produced by the sink, if any.
    pub text: Option<String>,
}

// ---------------------------------------------------------------------------
// Worker status events
// ---------------------------------------------------------------------------

/// Emitted when the worker changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatusEvent {
    pub status: WorkerStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of a batch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Created but `start()` not yet called.
    Idle,
    /// Attached to the ring and polling.
    Running,
    /// Polling stopped and handle detached; may be restarted.
    Stopped,
    /// The ring went away or the worker failed to start.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_event_serializes_with_camel_case_fields() {
        let event = BatchEvent {
            seq: 4,
            samples: 32_000,
            duration_secs: 2.0,
            text: Some("hello".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize batch event");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["samples"], 32_000);
        assert_eq!(json["durationSecs"], 2.0);
        assert_eq!(json["text"], "hello");

        let round_trip: BatchEvent =
            serde_json::from_value(json).expect("deserialize batch event");
        assert_eq!(round_trip.samples, 32_000);
        assert_eq!(round_trip.text.as_deref(), Some("hello"));
    }

    #[test]
    fn batch_event_without_text_serializes_null() {
        let event = BatchEvent {
            seq: 1,
            samples: 100,
            duration_secs: 0.00625,
            text: None,
        };
        let json = serde_json::to_value(&event).expect("serialize batch event");
        assert!(json["text"].is_null());
    }

    #[test]
    fn status_event_serializes_with_lowercase_status() {
        let event = WorkerStatusEvent {
            status: WorkerStatus::Running,
            detail: Some("attached".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "running");
        assert_eq!(json["detail"], "attached");

        let round_trip: WorkerStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, WorkerStatus::Running);
    }

    #[test]
    fn status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<WorkerStatus>(r#""Stopped""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
