//! # Reflection Probe System
//!
//! Registration, per-frame selection, baking, and shader binding for
//! reflection and irradiance probes.
//!
//! ## Architecture
//!
//! - **Registry**: Slot-map storage plus the registered (visible) subset
//! - **Scoring**: Pluggable per-frame ranking policies
//! - **Frame Data**: The selected probes flattened into parallel arrays
//! - **Baker**: Scene capture, irradiance convolution, and GPU upload
//! - **Constants**: Per-shader uniform handle cache
//! - **Manager**: Ties the above together behind one facade
//!
//! The [`manager::ProbeManager`] is the intended entry point; the lower
//! modules are public for hosts that need to reach around it (custom
//! scorers, direct registry access, offline baking).

// Storage and identity
pub mod record;
pub mod registry;

// Per-frame work
pub mod frame;
pub mod scoring;

// Capture-to-GPU pipeline
pub mod baker;
pub mod irradiance;

// Shader plumbing
pub mod constants;

// Facade
pub mod manager;

pub use baker::{BakeError, ProbeBaker};
pub use constants::{ProbeConstantsCache, ProbeShaderConstants};
pub use frame::{GpuProbe, GpuProbeBlock, ProbeFrameData};
pub use manager::{DrawSubmission, ProbeArrayBindings, ProbeManager, ShadingPath};
pub use record::{ProbeRecord, ProbeShape};
pub use registry::{ProbeKey, ProbeRegistry};
pub use scoring::{DistancePriorityScorer, PriorityScorer, ProbeScorer, ViewInfo};

/// Hard upper bound on probes considered in one frame
///
/// Matches the fixed array sizes compiled into probe shaders; selection
/// never exceeds it regardless of configuration.
pub const MAX_PROBE_COUNT: usize = 50;

/// Hard upper bound on probes bound to a single forward draw
pub const MAX_FORWARD_PROBES: usize = 4;

#[cfg(test)]
mod tests;
