//! Probe registry
//!
//! Owns probe storage as a slot-map arena with stable keys, plus the set of
//! currently registered (scene-active) probes. Registration order is
//! stamped with a monotonic sequence number; the manager's selection sort
//! uses it as the deterministic tiebreak, so two frames with identical
//! scores always produce identical array ordering.

use crate::foundation::collections::{new_key_type, SlotMap};
use crate::probes::record::ProbeRecord;
use crate::probes::MAX_PROBE_COUNT;

new_key_type! {
    /// Stable handle to a probe slot
    pub struct ProbeKey;
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    key: ProbeKey,
    sequence: u64,
}

/// Arena of probe records plus the registered-probe set
///
/// A probe exists in the arena from [`insert`](Self::insert) to
/// [`remove`](Self::remove); it participates in per-frame selection only
/// while registered. Registering beyond [`MAX_PROBE_COUNT`] is silently
/// ignored: the probe keeps its slot but stays invisible to selection until
/// capacity frees up.
#[derive(Debug, Default)]
pub struct ProbeRegistry {
    slots: SlotMap<ProbeKey, ProbeRecord>,
    registered: Vec<Registration>,
    next_sequence: u64,
}

impl ProbeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot for a record
    ///
    /// The probe is not registered yet; call [`register`](Self::register)
    /// when it enters the scene.
    pub fn insert(&mut self, record: ProbeRecord) -> ProbeKey {
        self.slots.insert(record)
    }

    /// Free a probe's slot, unregistering it first
    ///
    /// Returns the record so the caller can release its capture resources.
    pub fn remove(&mut self, key: ProbeKey) -> Option<ProbeRecord> {
        self.unregister(key);
        self.slots.remove(key)
    }

    /// Add a probe to the registered set
    ///
    /// Idempotent: registering an already-registered key changes nothing.
    /// Returns whether the probe is registered after the call; `false` means
    /// the key has no slot or the set is at capacity (a soft bound, logged
    /// and ignored rather than treated as an error).
    pub fn register(&mut self, key: ProbeKey) -> bool {
        if !self.slots.contains_key(key) {
            log::warn!("register of unknown probe {key:?} ignored");
            return false;
        }
        if self.is_registered(key) {
            return true;
        }
        if self.registered.len() >= MAX_PROBE_COUNT {
            log::warn!(
                "probe registry full ({MAX_PROBE_COUNT}); ignoring registration of {key:?}"
            );
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.registered.push(Registration { key, sequence });
        log::debug!(
            "registered probe {key:?} (seq {sequence}, {} active)",
            self.registered.len()
        );
        true
    }

    /// Remove a probe from the registered set; no-op if absent
    pub fn unregister(&mut self, key: ProbeKey) {
        let before = self.registered.len();
        self.registered.retain(|r| r.key != key);
        if self.registered.len() != before {
            log::debug!("unregistered probe {key:?} ({} active)", self.registered.len());
        }
    }

    /// Whether a key is currently in the registered set
    pub fn is_registered(&self, key: ProbeKey) -> bool {
        self.registered.iter().any(|r| r.key == key)
    }

    /// Registered keys with their registration sequence, in registration order
    pub fn registered(&self) -> impl Iterator<Item = (ProbeKey, u64)> + '_ {
        self.registered.iter().map(|r| (r.key, r.sequence))
    }

    /// Number of registered probes
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Number of allocated slots (registered or not)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds no probes at all
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrow a record
    pub fn get(&self, key: ProbeKey) -> Option<&ProbeRecord> {
        self.slots.get(key)
    }

    /// Mutably borrow a record
    pub fn get_mut(&mut self, key: ProbeKey) -> Option<&mut ProbeRecord> {
        self.slots.get_mut(key)
    }

    /// Iterate every allocated record
    pub fn iter(&self) -> impl Iterator<Item = (ProbeKey, &ProbeRecord)> {
        self.slots.iter()
    }
}
