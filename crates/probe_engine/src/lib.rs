//! # Probe Engine
//!
//! Reflection and irradiance probe management for real-time renderers.
//!
//! ## Features
//!
//! - **Bounded Selection**: Scores every registered probe each frame and
//!   selects the best up to a fixed limit, with skylights always retained
//! - **Dual Shading Paths**: Cubemap-array binding on capable devices,
//!   per-draw forward binding everywhere else
//! - **CPU Bake Pipeline**: Six-face scene capture, mip chain generation,
//!   and cosine-weighted irradiance convolution before any GPU upload
//! - **Pluggable Scoring**: Selection policy behind a trait, with distance
//!   and priority policies built in
//! - **Device Agnostic**: All GPU work goes through a small device trait; a
//!   null device backs the test suite and headless tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use probe_engine::prelude::*;
//! use probe_engine::capture::GradientSkyCapture;
//! use probe_engine::gfx::null::NullGfxDevice;
//!
//! fn main() {
//!     let mut device = NullGfxDevice::new();
//!     let mut capture = GradientSkyCapture::default();
//!
//!     let mut probes = ProbeManager::new(ProbeSystemConfig::default());
//!     probes.add_probe(ProbeRecord::sphere(Vec3::new(0.0, 2.0, 0.0), 10.0));
//!     probes.add_probe(ProbeRecord::skylight());
//!     probes.bake_probes(&mut device, &mut capture);
//!
//!     let view = ViewInfo::from_origin(Vec3::zeros());
//!     probes.update_probes(&mut device, &view);
//!     assert_eq!(probes.effective_probe_count(), 2);
//! }
//! ```
//!
//! ## Threading
//!
//! The manager is not internally synchronized. Every method is meant to be
//! called from the render thread; hosts that edit probes from other threads
//! marshal those edits onto it before the per-frame update runs.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Shared utilities
pub mod foundation;

// Graphics device abstraction
pub mod gfx;

// Scene capture collaborators
pub mod capture;

// The probe system itself
pub mod probes;

// Configuration and debug output
pub mod config;
pub mod debug;

pub use config::{ConfigError, ProbeSystemConfig, ScorerKind};
pub use probes::{ProbeKey, ProbeManager, ProbeRecord};

/// Common imports for probe engine users
pub mod prelude {
    pub use crate::{
        capture::{CaptureParams, SceneCapture},
        config::{ConfigError, ProbeSystemConfig, ScorerKind},
        foundation::math::{Aabb, Transform, Vec3},
        gfx::{GfxCapabilities, GfxDevice, GfxError, ShaderConstantBuffer, ShaderId},
        probes::{
            DrawSubmission, ProbeKey, ProbeManager, ProbeRecord, ProbeShape, ShadingPath,
            ViewInfo, MAX_FORWARD_PROBES, MAX_PROBE_COUNT,
        },
    };
}
