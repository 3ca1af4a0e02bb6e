//! Debug visualization primitives
//!
//! The probe manager emits these wireframe shapes when probe visualization
//! is enabled; the host's debug renderer decides how to draw them. Pure
//! data, no drawing here.

use crate::foundation::math::Vec3;
use crate::probes::record::{ProbeRecord, ProbeShape};

/// Wireframe color for probes placed in the current frame
pub const COLOR_PLACED: [f32; 3] = [0.2, 0.9, 0.2];
/// Wireframe color for selected probes awaiting a bake
pub const COLOR_UNBAKED: [f32; 3] = [0.9, 0.8, 0.1];
/// Wireframe color for registered probes outside the selection
pub const COLOR_IDLE: [f32; 3] = [0.5, 0.5, 0.5];
/// Marker color for skylight probes
pub const COLOR_SKYLIGHT: [f32; 3] = [0.3, 0.6, 1.0];

/// A single debug primitive to be drawn by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugShape {
    /// Wireframe sphere
    Sphere {
        /// Center in world space
        center: Vec3,
        /// Sphere radius
        radius: f32,
        /// RGB line color
        color: [f32; 3],
    },
    /// Wireframe axis-aligned box
    Box {
        /// Minimum corner in world space
        min: Vec3,
        /// Maximum corner in world space
        max: Vec3,
        /// RGB line color
        color: [f32; 3],
    },
    /// Point marker
    Point {
        /// Position in world space
        position: Vec3,
        /// RGB marker color
        color: [f32; 3],
    },
}

/// The outline shape for one probe record
///
/// Skylights have unbounded influence, so they get a point marker at their
/// origin instead of a degenerate volume.
pub fn probe_outline(record: &ProbeRecord, color: [f32; 3]) -> DebugShape {
    if record.skylight {
        return DebugShape::Point {
            position: record.position,
            color,
        };
    }
    match record.shape {
        ProbeShape::Sphere => DebugShape::Sphere {
            center: record.position,
            radius: record.radius,
            color,
        },
        ProbeShape::Box => DebugShape::Box {
            min: record.bounds.min,
            max: record.bounds.max,
            color,
        },
    }
}
