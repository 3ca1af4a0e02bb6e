//! Headless graphics device
//!
//! A complete in-memory implementation of the gfx traits. Resources live in
//! hash maps keyed by handle, face uploads are stored as CPU texel buffers,
//! and constant writes are recorded verbatim. Tests and headless tools run
//! the full probe pipeline against this device without any GPU.

use std::collections::HashMap;

use super::{
    face_texel_len, ConstantHandle, CubemapArrayDesc, CubemapArrayHandle, CubemapDesc,
    CubemapFace, CubemapHandle, CubemapInfo, GfxCapabilities, GfxDevice, GfxError, GfxResult,
    ShaderConstantBuffer, ShaderId,
};

struct CubemapStorage {
    info: CubemapInfo,
    // Keyed by (face layer, mip)
    faces: HashMap<(u32, u32), Vec<f32>>,
}

struct ArrayStorage {
    desc: CubemapArrayDesc,
    layers: Vec<Option<CubemapHandle>>,
}

struct ShaderRecord {
    constants: HashMap<String, ConstantHandle>,
}

/// In-memory device used by tests and headless tools
pub struct NullGfxDevice {
    caps: GfxCapabilities,
    cubemaps: HashMap<u64, CubemapStorage>,
    arrays: HashMap<u64, ArrayStorage>,
    shaders: HashMap<u64, ShaderRecord>,
    next_cubemap: u64,
    next_array: u64,
    next_shader: u64,
    next_constant: u64,
}

impl Default for NullGfxDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl NullGfxDevice {
    /// Create a device advertising cubemap-array support
    pub fn new() -> Self {
        Self::with_capabilities(GfxCapabilities::CUBEMAP_ARRAYS)
    }

    /// Create a device with an explicit capability set
    ///
    /// Pass `GfxCapabilities::empty()` to force the forward shading path.
    pub fn with_capabilities(caps: GfxCapabilities) -> Self {
        Self {
            caps,
            cubemaps: HashMap::new(),
            arrays: HashMap::new(),
            shaders: HashMap::new(),
            // Handles start from 1; 0 is reserved for "no resource"
            next_cubemap: 1,
            next_array: 1,
            next_shader: 1,
            next_constant: 1,
        }
    }

    /// Register a shader exposing the given constant names
    ///
    /// Each name gets a unique [`ConstantHandle`]; `resolve_constant` returns
    /// `None` for anything not in the list, mimicking constants stripped by
    /// a shader compiler.
    pub fn register_shader(&mut self, constant_names: &[&str]) -> ShaderId {
        let id = ShaderId(self.next_shader);
        self.next_shader += 1;

        let mut constants = HashMap::with_capacity(constant_names.len());
        for name in constant_names {
            constants.insert((*name).to_string(), ConstantHandle(self.next_constant));
            self.next_constant += 1;
        }
        self.shaders.insert(id.0, ShaderRecord { constants });
        id
    }

    /// Re-register a shader after a reload, reassigning every constant handle
    ///
    /// Keeps the shader id stable (the host's shader object survives a
    /// reload) while invalidating previously resolved handles, which is
    /// exactly what a driver-side recompile does.
    pub fn reload_shader(&mut self, shader: ShaderId, constant_names: &[&str]) {
        let mut constants = HashMap::with_capacity(constant_names.len());
        for name in constant_names {
            constants.insert((*name).to_string(), ConstantHandle(self.next_constant));
            self.next_constant += 1;
        }
        self.shaders.insert(shader.0, ShaderRecord { constants });
    }

    /// Number of live cubemaps
    pub fn live_cubemap_count(&self) -> usize {
        self.cubemaps.len()
    }

    /// Number of live cubemap arrays
    pub fn live_array_count(&self) -> usize {
        self.arrays.len()
    }

    /// Description of a live array, if any
    pub fn array_desc(&self, handle: CubemapArrayHandle) -> Option<CubemapArrayDesc> {
        self.arrays.get(&handle.0).map(|a| a.desc)
    }

    /// Which cubemap was last copied into the given array layer
    pub fn array_layer_source(
        &self,
        handle: CubemapArrayHandle,
        layer: u32,
    ) -> Option<CubemapHandle> {
        self.arrays
            .get(&handle.0)
            .and_then(|a| a.layers.get(layer as usize))
            .copied()
            .flatten()
    }

    /// Stored texels for one face mip of a cubemap
    pub fn face_texels(
        &self,
        handle: CubemapHandle,
        face: CubemapFace,
        mip: u32,
    ) -> Option<&[f32]> {
        self.cubemaps
            .get(&handle.0)
            .and_then(|c| c.faces.get(&(face.layer(), mip)))
            .map(Vec::as_slice)
    }
}

impl GfxDevice for NullGfxDevice {
    fn capabilities(&self) -> GfxCapabilities {
        self.caps
    }

    fn create_cubemap(&mut self, desc: &CubemapDesc) -> GfxResult<CubemapHandle> {
        if desc.resolution == 0 || desc.mip_count == 0 {
            return Err(GfxError::AllocationFailed(format!(
                "degenerate cubemap description: {desc:?}"
            )));
        }
        let handle = CubemapHandle(self.next_cubemap);
        self.next_cubemap += 1;
        self.cubemaps.insert(
            handle.0,
            CubemapStorage {
                info: CubemapInfo {
                    resolution: desc.resolution,
                    mip_count: desc.mip_count,
                },
                faces: HashMap::new(),
            },
        );
        log::trace!("null gfx: created cubemap {:?} ({desc:?})", handle);
        Ok(handle)
    }

    fn destroy_cubemap(&mut self, handle: CubemapHandle) {
        if self.cubemaps.remove(&handle.0).is_none() {
            log::warn!("null gfx: destroy of unknown cubemap {handle:?}");
        }
    }

    fn cubemap_info(&self, handle: CubemapHandle) -> Option<CubemapInfo> {
        self.cubemaps.get(&handle.0).map(|c| c.info)
    }

    fn upload_cubemap_face(
        &mut self,
        handle: CubemapHandle,
        face: CubemapFace,
        mip: u32,
        texels: &[f32],
    ) -> GfxResult<()> {
        let storage = self
            .cubemaps
            .get_mut(&handle.0)
            .ok_or_else(|| GfxError::InvalidHandle(format!("{handle:?}")))?;
        if mip >= storage.info.mip_count {
            return Err(GfxError::InvalidHandle(format!(
                "mip {mip} out of range for {handle:?}"
            )));
        }
        let expected = face_texel_len(storage.info.resolution, mip);
        if texels.len() != expected {
            return Err(GfxError::FaceSizeMismatch {
                expected,
                actual: texels.len(),
            });
        }
        storage.faces.insert((face.layer(), mip), texels.to_vec());
        Ok(())
    }

    fn create_cubemap_array(&mut self, desc: &CubemapArrayDesc) -> GfxResult<CubemapArrayHandle> {
        if desc.layer_count == 0 || desc.resolution == 0 {
            return Err(GfxError::AllocationFailed(format!(
                "degenerate array description: {desc:?}"
            )));
        }
        let handle = CubemapArrayHandle(self.next_array);
        self.next_array += 1;
        self.arrays.insert(
            handle.0,
            ArrayStorage {
                desc: *desc,
                layers: vec![None; desc.layer_count as usize],
            },
        );
        log::debug!("null gfx: created cubemap array {:?} ({desc:?})", handle);
        Ok(handle)
    }

    fn destroy_cubemap_array(&mut self, handle: CubemapArrayHandle) {
        if self.arrays.remove(&handle.0).is_none() {
            log::warn!("null gfx: destroy of unknown cubemap array {handle:?}");
        }
    }

    fn copy_cubemap_to_layer(
        &mut self,
        src: CubemapHandle,
        dst: CubemapArrayHandle,
        layer: u32,
    ) -> GfxResult<()> {
        let info = self
            .cubemap_info(src)
            .ok_or_else(|| GfxError::InvalidHandle(format!("{src:?}")))?;
        let array = self
            .arrays
            .get_mut(&dst.0)
            .ok_or_else(|| GfxError::InvalidHandle(format!("{dst:?}")))?;
        if layer >= array.desc.layer_count {
            return Err(GfxError::InvalidHandle(format!(
                "layer {layer} out of range for {dst:?}"
            )));
        }
        if info.resolution != array.desc.resolution || info.mip_count != array.desc.mip_count {
            return Err(GfxError::AllocationFailed(format!(
                "cubemap {src:?} ({info:?}) does not match array {:?}",
                array.desc
            )));
        }
        array.layers[layer as usize] = Some(src);
        Ok(())
    }

    fn resolve_constant(&mut self, shader: ShaderId, name: &str) -> Option<ConstantHandle> {
        self.shaders
            .get(&shader.0)
            .and_then(|s| s.constants.get(name))
            .copied()
    }
}

/// A recorded shader constant write
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// Scalar float
    F32(f32),
    /// Scalar integer
    U32(u32),
    /// Single vec4
    Vec4([f32; 4]),
    /// Float array
    F32Array(Vec<f32>),
    /// Vec4 array
    Vec4Array(Vec<[f32; 4]>),
    /// Mat4 array, column-major
    Mat4Array(Vec<[f32; 16]>),
    /// Cubemap sampler binding
    Cubemap(CubemapHandle),
    /// Cubemap-array sampler binding
    CubemapArray(CubemapArrayHandle),
}

/// Constant buffer that records every write for inspection
#[derive(Default)]
pub struct NullConstantBuffer {
    writes: HashMap<ConstantHandle, ConstantValue>,
}

impl NullConstantBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// The last value written through a handle
    pub fn value(&self, handle: ConstantHandle) -> Option<&ConstantValue> {
        self.writes.get(&handle)
    }

    /// Number of distinct constants written
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }
}

impl ShaderConstantBuffer for NullConstantBuffer {
    fn set_f32(&mut self, handle: ConstantHandle, value: f32) -> GfxResult<()> {
        self.writes.insert(handle, ConstantValue::F32(value));
        Ok(())
    }

    fn set_u32(&mut self, handle: ConstantHandle, value: u32) -> GfxResult<()> {
        self.writes.insert(handle, ConstantValue::U32(value));
        Ok(())
    }

    fn set_vec4(&mut self, handle: ConstantHandle, value: [f32; 4]) -> GfxResult<()> {
        self.writes.insert(handle, ConstantValue::Vec4(value));
        Ok(())
    }

    fn set_f32_array(&mut self, handle: ConstantHandle, values: &[f32]) -> GfxResult<()> {
        self.writes
            .insert(handle, ConstantValue::F32Array(values.to_vec()));
        Ok(())
    }

    fn set_vec4_array(&mut self, handle: ConstantHandle, values: &[[f32; 4]]) -> GfxResult<()> {
        self.writes
            .insert(handle, ConstantValue::Vec4Array(values.to_vec()));
        Ok(())
    }

    fn set_mat4_array(&mut self, handle: ConstantHandle, values: &[[f32; 16]]) -> GfxResult<()> {
        self.writes
            .insert(handle, ConstantValue::Mat4Array(values.to_vec()));
        Ok(())
    }

    fn bind_cubemap(&mut self, handle: ConstantHandle, cubemap: CubemapHandle) -> GfxResult<()> {
        self.writes.insert(handle, ConstantValue::Cubemap(cubemap));
        Ok(())
    }

    fn bind_cubemap_array(
        &mut self,
        handle: ConstantHandle,
        array: CubemapArrayHandle,
    ) -> GfxResult<()> {
        self.writes
            .insert(handle, ConstantValue::CubemapArray(array));
        Ok(())
    }
}
