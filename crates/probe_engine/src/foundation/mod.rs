//! Foundation utilities
//!
//! Math types, collections, logging, and timing shared by the rest of the
//! crate.

pub mod collections;
pub mod logging;
pub mod math;
pub mod time;
