//! Math utilities and types
//!
//! Provides the fundamental math types used throughout the probe system.

pub use nalgebra::{
    Matrix3, Matrix4,
    Quaternion,
    Unit, UnitQuaternion,
    Vector2, Vector3, Vector4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid transform representing position and rotation
///
/// Probe volumes never scale; their extent is carried by the bounding box
/// and sphere radius instead, so this stays a rotation+translation pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Get the forward vector (local +Z in world space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::z()
    }

    /// Re-derive the rotation so `forward()` matches the given direction
    ///
    /// Position is untouched. A zero-length direction leaves the rotation
    /// unchanged. The up reference is world +Y, falling back to +Z when the
    /// direction is vertical.
    pub fn set_forward(&mut self, direction: Vec3) {
        let len = direction.norm();
        if len <= f32::EPSILON {
            return;
        }
        let dir = direction / len;
        let up = if dir.x.abs() < 1e-4 && dir.z.abs() < 1e-4 {
            Vec3::z()
        } else {
            Vec3::y()
        };
        self.rotation = UnitQuaternion::face_towards(&dir, &up);
    }

    /// Convert to a transformation matrix (local to world)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position) * self.rotation.to_homogeneous()
    }

    /// Get the inverse transform
    pub fn inverse(&self) -> Transform {
        let inv_rotation = self.rotation.inverse();
        Transform {
            position: inv_rotation * (-self.position),
            rotation: inv_rotation,
        }
    }

    /// Convert to a world-to-local matrix
    ///
    /// Used to map a shaded world-space point into probe-local space for
    /// box/sphere falloff evaluation.
    pub fn to_world_to_local(&self) -> Mat4 {
        self.inverse().to_matrix()
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.position
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half-extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// An AABB collapsed to the origin
    pub fn zero() -> Self {
        Self {
            min: Vec3::zeros(),
            max: Vec3::zeros(),
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the half-extents of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::zero()
    }
}
