//! Probe records
//!
//! A [`ProbeRecord`] is pure data: the transform, influence volume, capture
//! handles, and selection fields for one environment probe. All logic lives
//! in the registry, manager, and baker; the record only carries state between
//! them.

use crate::foundation::math::{Aabb, Transform, Vec3};
use crate::gfx::CubemapHandle;

/// Influence volume shape of a probe
///
/// The discriminants are the values packed into the per-frame config vector
/// consumed by shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProbeShape {
    /// Spherical influence volume with radial falloff
    Sphere = 0,
    /// Box influence volume bounded by the probe's AABB
    Box = 1,
}

impl ProbeShape {
    /// Shape flag as packed into the GPU config vector
    pub const fn config_flag(self) -> f32 {
        match self {
            Self::Sphere => 0.0,
            Self::Box => 1.0,
        }
    }
}

/// All state for one environment probe
///
/// Exactly one shape applies: `radius` is meaningful only for
/// [`ProbeShape::Sphere`], while `bounds` is meaningful for both (boxes use
/// it for their extent, spheres for broad-phase culling). `score` is
/// transient and rewritten every frame by the manager's scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRecord {
    /// World rotation and translation
    pub transform: Transform,
    /// Influence volume shape
    pub shape: ProbeShape,
    /// World-space bounding box
    pub bounds: Aabb,
    /// World-space position
    pub position: Vec3,
    /// Parallax reference offset, remapping shaded points into the probe's
    /// capture space
    pub ref_offset: Vec3,
    /// Parallax reference scale
    pub ref_scale: Vec3,
    /// Influence falloff radius (sphere probes)
    pub radius: f32,
    /// Falloff attenuation exponent
    pub attenuation: f32,
    /// Captured radiance cubemap, present once baked
    pub cubemap: Option<CubemapHandle>,
    /// Derived irradiance cubemap, present once baked
    pub irradiance: Option<CubemapHandle>,
    /// Designer-assigned importance used by scoring
    pub priority: f32,
    /// Per-frame ranking value, rewritten by the scoring pass
    pub score: f32,
    /// Needs a (re-)bake before its capture data can be used
    pub dirty: bool,
    /// Global ambient probe, always selected and never culled
    pub skylight: bool,
}

impl Default for ProbeRecord {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            shape: ProbeShape::Sphere,
            bounds: Aabb::zero(),
            position: Vec3::zeros(),
            ref_offset: Vec3::zeros(),
            ref_scale: Vec3::new(1.0, 1.0, 1.0),
            radius: 0.0,
            attenuation: 1.0,
            cubemap: None,
            irradiance: None,
            priority: 0.0,
            score: 0.0,
            dirty: false,
            skylight: false,
        }
    }
}

impl ProbeRecord {
    /// Create a sphere probe at a position with the given influence radius
    ///
    /// The bounding box is derived from the radius for broad-phase culling.
    /// New probes start dirty so the next bake pass captures them.
    pub fn sphere(position: Vec3, radius: f32) -> Self {
        Self {
            transform: Transform::from_position(position),
            shape: ProbeShape::Sphere,
            bounds: Aabb::from_center_extents(position, Vec3::new(radius, radius, radius)),
            position,
            radius,
            dirty: true,
            ..Default::default()
        }
    }

    /// Create a box probe covering the given world bounds
    pub fn box_volume(bounds: Aabb) -> Self {
        let position = bounds.center();
        Self {
            transform: Transform::from_position(position),
            shape: ProbeShape::Box,
            bounds,
            position,
            dirty: true,
            ..Default::default()
        }
    }

    /// Create a skylight probe at the world origin
    ///
    /// Skylights represent distant sky ambient: they are always selected
    /// regardless of score and never culled.
    pub fn skylight() -> Self {
        Self {
            shape: ProbeShape::Sphere,
            radius: f32::MAX,
            bounds: Aabb::from_center_extents(
                Vec3::zeros(),
                Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            ),
            dirty: true,
            skylight: true,
            ..Default::default()
        }
    }

    /// Copy every field from another record
    ///
    /// Used to promote a scene object's live probe state into a render-time
    /// snapshot, so scene-graph mutation later in the frame cannot disturb
    /// data already handed to rendering.
    pub fn set(&mut self, other: &Self) {
        *self = other.clone();
    }

    /// Reset to a neutral, inactive state
    ///
    /// Identity transform, zero radius, not dirty, no capture data.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Forward vector of the probe's transform
    pub fn direction(&self) -> Vec3 {
        self.transform.forward()
    }

    /// Re-derive the transform's rotation so its forward vector matches `dir`
    ///
    /// Position is untouched; only orientation changes.
    pub fn set_direction(&mut self, dir: Vec3) {
        self.transform.set_forward(dir);
    }

    /// Whether this probe has usable capture data
    ///
    /// True once both cubemaps exist and no re-bake is pending.
    pub fn is_baked(&self) -> bool {
        !self.dirty && self.cubemap.is_some() && self.irradiance.is_some()
    }
}
