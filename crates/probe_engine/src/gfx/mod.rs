//! Graphics resource abstraction for the probe system
//!
//! This module defines the narrow interface the probe manager consumes from
//! the host engine's graphics layer: cubemap and cubemap-array allocation,
//! shader constant resolution, and per-draw constant writes. Backends are
//! abstracted behind traits so the probe logic never touches a graphics API
//! directly; the [`null`] device provides a complete in-memory
//! implementation used by tests and headless tools.

pub mod null;

use bitflags::bitflags;
use thiserror::Error;

pub use null::{NullConstantBuffer, NullGfxDevice};

/// Result type for graphics resource operations
pub type GfxResult<T> = Result<T, GfxError>;

/// Errors reported by the graphics resource layer
#[derive(Debug, Error)]
pub enum GfxError {
    /// A handle did not refer to a live resource
    #[error("invalid resource handle: {0}")]
    InvalidHandle(String),

    /// Resource allocation was refused by the device
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    /// Uploaded face data did not match the expected texel count
    #[error("face data size mismatch: expected {expected} floats, got {actual}")]
    FaceSizeMismatch {
        /// Expected number of f32 texel components
        expected: usize,
        /// Number of f32 components actually supplied
        actual: usize,
    },

    /// A constant write referenced a handle the buffer does not know
    #[error("unknown shader constant handle: {0:?}")]
    UnknownConstant(ConstantHandle),
}

/// Identity of a shader program
///
/// Used as the key of the probe constants cache; a reloaded shader keeps its
/// id and the host signals the reload explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u64);

/// Handle to a cubemap resource stored in the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CubemapHandle(pub u64);

/// Handle to a cubemap-array resource stored in the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CubemapArrayHandle(pub u64);

/// Handle to a resolved shader constant location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantHandle(pub u64);

bitflags! {
    /// Device capability bits that select the probe shading path
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GfxCapabilities: u32 {
        /// Cubemap-array textures are supported (enables the array path)
        const CUBEMAP_ARRAYS = 1 << 0;
    }
}

/// One face of a cubemap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CubemapFace {
    /// Positive X
    PositiveX = 0,
    /// Negative X
    NegativeX = 1,
    /// Positive Y
    PositiveY = 2,
    /// Negative Y
    NegativeY = 3,
    /// Positive Z
    PositiveZ = 4,
    /// Negative Z
    NegativeZ = 5,
}

impl CubemapFace {
    /// Number of cubemap faces
    pub const COUNT: usize = 6;

    /// All faces in layer order
    pub const ALL: [Self; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// View direction for rendering this face
    pub const fn direction(&self) -> [f32; 3] {
        match self {
            Self::PositiveX => [1.0, 0.0, 0.0],
            Self::NegativeX => [-1.0, 0.0, 0.0],
            Self::PositiveY => [0.0, 1.0, 0.0],
            Self::NegativeY => [0.0, -1.0, 0.0],
            Self::PositiveZ => [0.0, 0.0, 1.0],
            Self::NegativeZ => [0.0, 0.0, -1.0],
        }
    }

    /// Up vector for rendering this face
    pub const fn up(&self) -> [f32; 3] {
        match self {
            Self::PositiveX => [0.0, -1.0, 0.0],
            Self::NegativeX => [0.0, -1.0, 0.0],
            Self::PositiveY => [0.0, 0.0, 1.0],
            Self::NegativeY => [0.0, 0.0, -1.0],
            Self::PositiveZ => [0.0, -1.0, 0.0],
            Self::NegativeZ => [0.0, -1.0, 0.0],
        }
    }

    /// Layer index of this face within a cubemap
    pub const fn layer(&self) -> u32 {
        *self as u32
    }
}

/// Description of a cubemap to allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubemapDesc {
    /// Edge length of each face in texels
    pub resolution: u32,
    /// Number of mip levels
    pub mip_count: u32,
}

impl CubemapDesc {
    /// Create a description with a full mip chain for the given resolution
    pub fn with_mip_chain(resolution: u32) -> Self {
        Self {
            resolution,
            mip_count: mip_count_for_resolution(resolution),
        }
    }
}

/// Description of a cubemap array to allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubemapArrayDesc {
    /// Edge length of each face in texels
    pub resolution: u32,
    /// Number of mip levels per layer
    pub mip_count: u32,
    /// Number of cubemap layers
    pub layer_count: u32,
}

/// Properties of a live cubemap resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubemapInfo {
    /// Edge length of each face in texels
    pub resolution: u32,
    /// Number of mip levels
    pub mip_count: u32,
}

/// Number of mip levels in a full chain for the given face resolution
pub fn mip_count_for_resolution(resolution: u32) -> u32 {
    if resolution == 0 {
        return 1;
    }
    32 - resolution.leading_zeros()
}

/// Graphics device operations the probe system depends on
///
/// Implementations wrap the host engine's resource layer. All cubemap data
/// crosses this boundary as tightly packed RGBA f32 texels. Destroying a
/// resource that draws in flight still reference must be deferred by the
/// implementation (fence or frame-queue the release); the probe manager
/// swaps handles freely and assumes old resources stay valid until the
/// device retires them.
pub trait GfxDevice {
    /// Query device capability bits
    fn capabilities(&self) -> GfxCapabilities;

    /// Allocate a cubemap
    fn create_cubemap(&mut self, desc: &CubemapDesc) -> GfxResult<CubemapHandle>;

    /// Release a cubemap
    fn destroy_cubemap(&mut self, handle: CubemapHandle);

    /// Look up the properties of a live cubemap
    fn cubemap_info(&self, handle: CubemapHandle) -> Option<CubemapInfo>;

    /// Upload one face mip of a cubemap as RGBA f32 texels
    fn upload_cubemap_face(
        &mut self,
        handle: CubemapHandle,
        face: CubemapFace,
        mip: u32,
        texels: &[f32],
    ) -> GfxResult<()>;

    /// Allocate a cubemap array
    fn create_cubemap_array(&mut self, desc: &CubemapArrayDesc) -> GfxResult<CubemapArrayHandle>;

    /// Release a cubemap array
    fn destroy_cubemap_array(&mut self, handle: CubemapArrayHandle);

    /// Copy a whole cubemap (all faces, all mips) into one array layer
    fn copy_cubemap_to_layer(
        &mut self,
        src: CubemapHandle,
        dst: CubemapArrayHandle,
        layer: u32,
    ) -> GfxResult<()>;

    /// Resolve a named shader constant to a handle
    ///
    /// Returns `None` when the shader has no such constant (the compiler may
    /// have stripped it); callers skip writes for unresolved constants.
    fn resolve_constant(&mut self, shader: ShaderId, name: &str) -> Option<ConstantHandle>;
}

/// Per-draw shader constant writes
///
/// The material system hands the probe manager one of these for every draw
/// submission on the forward path; the manager fills in the probe uniforms
/// it owns and leaves everything else untouched.
pub trait ShaderConstantBuffer {
    /// Write a scalar float constant
    fn set_f32(&mut self, handle: ConstantHandle, value: f32) -> GfxResult<()>;

    /// Write a scalar integer constant
    fn set_u32(&mut self, handle: ConstantHandle, value: u32) -> GfxResult<()>;

    /// Write a vec4 constant
    fn set_vec4(&mut self, handle: ConstantHandle, value: [f32; 4]) -> GfxResult<()>;

    /// Write a float array constant
    fn set_f32_array(&mut self, handle: ConstantHandle, values: &[f32]) -> GfxResult<()>;

    /// Write a vec4 array constant
    fn set_vec4_array(&mut self, handle: ConstantHandle, values: &[[f32; 4]]) -> GfxResult<()>;

    /// Write a mat4 array constant (column-major)
    fn set_mat4_array(&mut self, handle: ConstantHandle, values: &[[f32; 16]]) -> GfxResult<()>;

    /// Bind a cubemap to a sampler constant
    fn bind_cubemap(&mut self, handle: ConstantHandle, cubemap: CubemapHandle) -> GfxResult<()>;

    /// Bind a cubemap array to a sampler constant
    fn bind_cubemap_array(
        &mut self,
        handle: ConstantHandle,
        array: CubemapArrayHandle,
    ) -> GfxResult<()>;
}

/// Number of f32 components in one RGBA face mip at the given base resolution
pub fn face_texel_len(base_resolution: u32, mip: u32) -> usize {
    let edge = (base_resolution >> mip).max(1) as usize;
    edge * edge * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_chain_counts() {
        assert_eq!(mip_count_for_resolution(1), 1);
        assert_eq!(mip_count_for_resolution(2), 2);
        assert_eq!(mip_count_for_resolution(128), 8);
        assert_eq!(mip_count_for_resolution(256), 9);
        assert_eq!(CubemapDesc::with_mip_chain(64).mip_count, 7);
    }

    #[test]
    fn test_face_texel_len_shrinks_per_mip() {
        assert_eq!(face_texel_len(4, 0), 64);
        assert_eq!(face_texel_len(4, 1), 16);
        assert_eq!(face_texel_len(4, 2), 4);
        // Clamped at 1x1
        assert_eq!(face_texel_len(4, 5), 4);
    }

    #[test]
    fn test_faces_cover_all_layers() {
        for (i, face) in CubemapFace::ALL.iter().enumerate() {
            assert_eq!(face.layer() as usize, i);
        }
    }
}
