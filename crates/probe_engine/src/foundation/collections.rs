//! Specialized collection types
//!
//! Re-exports the slot-map arena used for probe storage. Slot keys stay
//! stable across removals, which is what makes probe handles safe to hold
//! onto while the registry churns.

pub use slotmap::{new_key_type, Key, SlotMap};
