//! `SharedAudioRing`: fixed-capacity SPSC ring of mono f32 samples.
//!
//! ## Cursors
//!
//! Both cursors are unbounded `u64` counters; the storage slot of a cursor is
//! `cursor % capacity`. The writer is the only party that advances
//! `write_cursor`, the reader the only one that advances `read_cursor`, so
//! `read_cursor <= write_cursor` holds at every instant.
//!
//! ```text
//!   storage  [ . . . R . . . . . W . . ]      available = min(W - R, capacity)
//! ```
//!
//! ## Overflow
//!
//! `write` never looks at the read cursor. When the writer gets more than
//! `capacity` samples ahead, the oldest unread samples are overwritten and the
//! next `read` starts from the oldest sample still resident. Nothing is
//! reported to the writer; the reader counts the skipped samples in
//! `overrun_samples`.
//!
//! ## Memory ordering
//!
//! Slot stores and loads are `Relaxed`. The writer publishes its cursor with
//! `Release` after all slot stores of a call, and the reader loads it with
//! `Acquire`, so every slot covered by an observed cursor is visible.
//! Samples live in `AtomicU32` cells as `f32` bit patterns, which keeps the
//! crate free of `unsafe`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, RingError};

/// Lock-free counters, updated with `Relaxed` ordering from both sides.
#[derive(Debug, Default)]
struct RingDiagnostics {
    write_calls: AtomicU64,
    samples_written: AtomicU64,
    read_calls: AtomicU64,
    samples_read: AtomicU64,
    insufficient_reads: AtomicU64,
    inactive_rejections: AtomicU64,
    overrun_samples: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingDiagnosticsSnapshot {
    pub write_calls: u64,
    pub samples_written: u64,
    pub read_calls: u64,
    pub samples_read: u64,
    pub insufficient_reads: u64,
    pub inactive_rejections: u64,
    /// Unread samples the writer overwrote, counted when the next successful
    /// `read` skips past them. Stays flat while the reader is stalled.
    pub overrun_samples: u64,
}

/// Fixed-capacity circular sample buffer shared by one writer and one reader.
///
/// At most one thread may call [`write`](Self::write) and at most one thread
/// may call [`read`](Self::read). Breaking that discipline cannot cause memory
/// unsafety, but the samples observed are then unspecified.
pub struct SharedAudioRing {
    storage: Box<[AtomicU32]>,
    capacity: usize,
    write_cursor: CachePadded<AtomicU64>,
    read_cursor: CachePadded<AtomicU64>,
    active: AtomicBool,
    diagnostics: RingDiagnostics,
}

impl SharedAudioRing {
    /// Allocate a zero-filled ring holding `capacity` samples.
    ///
    /// # Errors
    /// - `RingError::InvalidCapacity` if `capacity` is zero.
    /// - `RingError::Allocation` if the storage cannot be reserved.
    pub fn create(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RingError::InvalidCapacity(capacity));
        }

        let mut storage: Vec<AtomicU32> = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| RingError::Allocation { capacity })?;
        storage.extend((0..capacity).map(|_| AtomicU32::new(0.0f32.to_bits())));

        debug!(capacity, "ring storage allocated");

        Ok(Self {
            storage: storage.into_boxed_slice(),
            capacity,
            write_cursor: CachePadded::new(AtomicU64::new(0)),
            read_cursor: CachePadded::new(AtomicU64::new(0)),
            active: AtomicBool::new(true),
            diagnostics: RingDiagnostics::default(),
        })
    }

    /// Number of samples the ring can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Append `samples` at the write cursor. Writer side only.
    ///
    /// Never blocks and never fails for lack of space: unread samples older
    /// than `capacity` are silently overwritten.
    ///
    /// # Errors
    /// `RingError::InactiveBuffer` once the ring has been deactivated; nothing
    /// is written in that case.
    pub fn write(&self, samples: &[f32]) -> Result<()> {
        if !self.active.load(Ordering::Acquire) {
            self.diagnostics
                .inactive_rejections
                .fetch_add(1, Ordering::Relaxed);
            return Err(RingError::InactiveBuffer);
        }

        let start = self.write_cursor.load(Ordering::Relaxed);
        let count = samples.len() as u64;

        // Only the last `capacity` samples of an oversized write survive, so
        // the rest are skipped but still counted by the cursor.
        let skip = samples.len().saturating_sub(self.capacity);
        let mut cursor = start + skip as u64;
        for &sample in &samples[skip..] {
            self.storage[self.slot(cursor)].store(sample.to_bits(), Ordering::Relaxed);
            cursor += 1;
        }

        self.write_cursor.store(start + count, Ordering::Release);

        self.diagnostics.write_calls.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .samples_written
            .fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    /// Fill `out` with the next `out.len()` unread samples. Reader side only.
    ///
    /// If the writer has lapped the reader, reading resumes at the oldest
    /// sample still in storage. A request larger than `capacity` can never
    /// be satisfied.
    ///
    /// # Errors
    /// - `RingError::InactiveBuffer` once the ring has been deactivated.
    /// - `RingError::InsufficientData` if fewer than `out.len()` samples are
    ///   buffered. `out` and the read cursor are left untouched.
    pub fn read(&self, out: &mut [f32]) -> Result<()> {
        if !self.active.load(Ordering::Acquire) {
            self.diagnostics
                .inactive_rejections
                .fetch_add(1, Ordering::Relaxed);
            return Err(RingError::InactiveBuffer);
        }

        let read = self.read_cursor.load(Ordering::Acquire);
        let write = self.write_cursor.load(Ordering::Acquire);
        let start = read.max(write.saturating_sub(self.capacity as u64));
        let available = (write - start) as usize;

        if available < out.len() {
            self.diagnostics
                .insufficient_reads
                .fetch_add(1, Ordering::Relaxed);
            return Err(RingError::InsufficientData {
                requested: out.len(),
                available,
            });
        }

        // Copy in at most two runs: up to the end of storage, then from 0.
        let first = self.slot(start);
        let head = out.len().min(self.capacity - first);
        let (front, back) = out.split_at_mut(head);
        for (dst, cell) in front.iter_mut().zip(&self.storage[first..first + head]) {
            *dst = f32::from_bits(cell.load(Ordering::Relaxed));
        }
        for (dst, cell) in back.iter_mut().zip(self.storage.iter()) {
            *dst = f32::from_bits(cell.load(Ordering::Relaxed));
        }

        let count = out.len() as u64;
        self.read_cursor.store(start + count, Ordering::Release);

        self.diagnostics.read_calls.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .samples_read
            .fetch_add(count, Ordering::Relaxed);
        if start > read {
            self.diagnostics
                .overrun_samples
                .fetch_add(start - read, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Samples written but not yet consumed, capped at `capacity`.
    ///
    /// Safe to call from any thread. Returns 0 once the ring is inactive.
    pub fn available(&self) -> usize {
        if !self.active.load(Ordering::Acquire) {
            return 0;
        }
        // Read cursor first: it can only trail the write cursor loaded after it.
        let read = self.read_cursor.load(Ordering::Acquire);
        let write = self.write_cursor.load(Ordering::Acquire);
        (write.saturating_sub(read) as usize).min(self.capacity)
    }

    /// Mark the ring inactive. New reads and writes fail with `InactiveBuffer`;
    /// a call already past its activity check still completes.
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            debug!(capacity = self.capacity, "ring deactivated");
        }
    }

    /// Deactivate and free the ring's storage.
    ///
    /// Taking `self` by value guarantees no other party still holds it.
    pub fn destroy(self) {
        self.deactivate();
        drop(self);
    }

    pub fn diagnostics(&self) -> RingDiagnosticsSnapshot {
        let d = &self.diagnostics;
        RingDiagnosticsSnapshot {
            write_calls: d.write_calls.load(Ordering::Relaxed),
            samples_written: d.samples_written.load(Ordering::Relaxed),
            read_calls: d.read_calls.load(Ordering::Relaxed),
            samples_read: d.samples_read.load(Ordering::Relaxed),
            insufficient_reads: d.insufficient_reads.load(Ordering::Relaxed),
            inactive_rejections: d.inactive_rejections.load(Ordering::Relaxed),
            overrun_samples: d.overrun_samples.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn storage_snapshot(&self) -> Vec<f32> {
        self.storage
            .iter()
            .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed)))
            .collect()
    }

    #[inline]
    fn slot(&self, cursor: u64) -> usize {
        (cursor % self.capacity as u64) as usize
    }
}

impl Drop for SharedAudioRing {
    fn drop(&mut self) {
        debug!(
            capacity = self.capacity,
            written = self.diagnostics.samples_written.load(Ordering::Relaxed),
            "ring storage released"
        );
    }
}

impl std::fmt::Debug for SharedAudioRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAudioRing")
            .field("capacity", &self.capacity)
            .field("active", &self.is_active())
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}
