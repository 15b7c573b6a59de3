//! Keyed, reference-counted attachment to shared rings.
//!
//! ## Lifecycle
//!
//! ```text
//! attach(key)   absent  → create ring, register, ref_count = 1
//!               present → ref_count += 1, share existing ring
//! detach(handle)        → ref_count -= 1
//!                         at 0: unregister key, deactivate ring,
//!                               storage freed with the last reference
//! ```
//!
//! Every create-or-increment and decrement-and-teardown runs inside one
//! registry critical section, so an `attach` racing the final `detach` either
//! keeps the old ring alive or gets a brand-new one, never a ring that is
//! about to be torn down.
//!
//! The registry is an ordinary value. Tests and embedders create their own;
//! hosts that want one process-wide slot use [`RingRegistry::global`].

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, OnceLock,
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    buffering::{RingDiagnosticsSnapshot, SharedAudioRing},
    error::Result,
};

/// Key used by producers and consumers that do not configure one.
pub const DEFAULT_RING_KEY: &str = "transcription-audio";

/// One registered ring and the number of live handles on it.
struct Attachment {
    ring: SharedAudioRing,
    ref_count: AtomicUsize,
}

type Slots = HashMap<String, Arc<Attachment>>;

/// Shared registration point for rings, keyed by name.
///
/// Cheap to clone; clones refer to the same set of slots.
#[derive(Clone, Default)]
pub struct RingRegistry {
    slots: Arc<Mutex<Slots>>,
}

impl RingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry for hosts that cannot pass one around.
    pub fn global() -> &'static RingRegistry {
        static GLOBAL: OnceLock<RingRegistry> = OnceLock::new();
        GLOBAL.get_or_init(RingRegistry::new)
    }

    /// Attach to the ring registered under `key`, creating it if absent.
    ///
    /// `capacity` is only used when the ring is created; an existing ring is
    /// shared as-is.
    ///
    /// # Errors
    /// `RingError::Allocation` / `RingError::InvalidCapacity` if the ring had
    /// to be created and could not be. The key stays unregistered, so a later
    /// attach can retry.
    pub fn attach(&self, key: &str, capacity: usize) -> Result<RingHandle> {
        let mut slots = self.slots.lock();

        let attachment = match slots.get(key) {
            Some(existing) => {
                let count = existing.ref_count.fetch_add(1, Ordering::AcqRel) + 1;
                if existing.ring.capacity() != capacity {
                    warn!(
                        key,
                        requested = capacity,
                        capacity = existing.ring.capacity(),
                        "attach ignores capacity of an existing ring"
                    );
                }
                debug!(key, ref_count = count, "attached to existing ring");
                Arc::clone(existing)
            }
            None => {
                let ring = SharedAudioRing::create(capacity)?;
                let attachment = Arc::new(Attachment {
                    ring,
                    ref_count: AtomicUsize::new(1),
                });
                slots.insert(key.to_owned(), Arc::clone(&attachment));
                info!(key, capacity, "shared ring created");
                attachment
            }
        };

        Ok(RingHandle {
            key: key.to_owned(),
            attachment,
            registry: self.clone(),
        })
    }

    /// Whether a ring is currently registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.lock().contains_key(key)
    }

    /// Live handle count for `key`, or `None` if nothing is registered.
    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.slots
            .lock()
            .get(key)
            .map(|a| a.ref_count.load(Ordering::Acquire))
    }

    /// Number of registered rings.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Drop one reference; tear the ring down if it was the last.
    fn release(&self, key: &str, attachment: &Arc<Attachment>) {
        let mut slots = self.slots.lock();

        let previous = attachment.ref_count.fetch_sub(1, Ordering::AcqRel);
        if previous != 1 {
            debug!(key, ref_count = previous - 1, "detached from shared ring");
            return;
        }

        // A fresh ring may only be registered under this key after removal,
        // so the slot still holds ours; check anyway before removing.
        if slots
            .get(key)
            .is_some_and(|registered| Arc::ptr_eq(registered, attachment))
        {
            slots.remove(key);
        }
        attachment.ring.deactivate();
        drop(slots);

        info!(key, "last handle detached, shared ring torn down");
    }
}

impl std::fmt::Debug for RingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingRegistry")
            .field("rings", &self.len())
            .finish()
    }
}

/// A live attachment to a shared ring.
///
/// Dropping the handle (or calling [`detach`](Self::detach)) releases it.
/// Each handle is released exactly once; the last release deactivates the
/// ring and frees its storage.
pub struct RingHandle {
    key: String,
    attachment: Arc<Attachment>,
    registry: RingRegistry,
}

impl RingHandle {
    /// Registry key this handle is attached under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The shared ring.
    pub fn ring(&self) -> &SharedAudioRing {
        &self.attachment.ring
    }

    /// Current number of live handles on this ring.
    pub fn ref_count(&self) -> usize {
        self.attachment.ref_count.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.attachment.ring.capacity()
    }

    /// See [`SharedAudioRing::write`]. Producer side only.
    pub fn write(&self, samples: &[f32]) -> Result<()> {
        self.attachment.ring.write(samples)
    }

    /// See [`SharedAudioRing::read`]. Consumer side only.
    pub fn read(&self, out: &mut [f32]) -> Result<()> {
        self.attachment.ring.read(out)
    }

    /// See [`SharedAudioRing::available`].
    pub fn available(&self) -> usize {
        self.attachment.ring.available()
    }

    pub fn diagnostics(&self) -> RingDiagnosticsSnapshot {
        self.attachment.ring.diagnostics()
    }

    /// Whether `other` is attached to the same ring instance.
    pub fn shares_ring_with(&self, other: &RingHandle) -> bool {
        Arc::ptr_eq(&self.attachment, &other.attachment)
    }

    /// Release this handle.
    pub fn detach(self) {
        drop(self);
    }
}

impl Drop for RingHandle {
    fn drop(&mut self) {
        self.registry.release(&self.key, &self.attachment);
    }
}

impl std::fmt::Debug for RingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingHandle")
            .field("key", &self.key)
            .field("ref_count", &self.ref_count())
            .field("ring", &self.attachment.ring)
            .finish()
    }
}
