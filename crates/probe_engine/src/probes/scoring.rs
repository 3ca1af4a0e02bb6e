//! Probe scoring policies
//!
//! Which probes matter most this frame is a host-engine heuristic, so the
//! formula lives behind a trait. The manager only requires that scores form
//! a total order; skylight retention is enforced by the manager itself, not
//! the policy, so a custom scorer cannot accidentally cull the sky.

use crate::foundation::math::Vec3;
use crate::probes::record::{ProbeRecord, ProbeShape};

/// Per-frame view information handed to scoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewInfo {
    /// World-space camera position
    pub origin: Vec3,
    /// Normalized view direction
    pub forward: Vec3,
}

impl ViewInfo {
    /// Create view info from a camera position and direction
    pub fn new(origin: Vec3, forward: Vec3) -> Self {
        Self { origin, forward }
    }

    /// View info for policies that only care about position
    pub fn from_origin(origin: Vec3) -> Self {
        Self {
            origin,
            forward: -Vec3::z(),
        }
    }
}

/// Ranks probes for per-frame selection
///
/// Higher scores select first. Implementations must return values forming a
/// total order over the registered set; NaN is tolerated by the manager's
/// sort but ranks below every real score.
pub trait ProbeScorer {
    /// Compute this frame's score for one probe
    fn score(&self, record: &ProbeRecord, view: &ViewInfo) -> f32;
}

/// Default policy: priority attenuated by view distance
///
/// `priority / (1 + d^2 / extent^2)` where `d` is the distance from the view
/// origin to the probe position and `extent` is the probe's influence size
/// (sphere radius, or the box half-diagonal). Close or large probes keep
/// most of their priority; small distant ones fade out. Cheap enough to run
/// over the whole registered set every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistancePriorityScorer;

impl ProbeScorer for DistancePriorityScorer {
    fn score(&self, record: &ProbeRecord, view: &ViewInfo) -> f32 {
        let extent = match record.shape {
            ProbeShape::Sphere => record.radius,
            ProbeShape::Box => record.bounds.extents().norm(),
        };
        let extent_sq = (extent * extent).max(f32::EPSILON);
        let dist_sq = (record.position - view.origin).norm_squared();
        record.priority / (1.0 + dist_sq / extent_sq)
    }
}

/// Policy that ranks purely by designer priority
///
/// View independent, which makes selection fully predictable; useful for
/// cinematic setups and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer;

impl ProbeScorer for PriorityScorer {
    fn score(&self, record: &ProbeRecord, _view: &ViewInfo) -> f32 {
        record.priority
    }
}
