//! Per-frame probe data
//!
//! The manager rebuilds these parallel arrays from scratch every frame in
//! selection order; nothing here persists across frames. Index `i` in every
//! array refers to the same probe, and on the array shading path it is also
//! that probe's layer in the cubemap arrays — downstream temporal effects
//! rely on this index stability within a frame.

use bytemuck::Zeroable;

use crate::foundation::math::Mat4;
use crate::gfx::CubemapHandle;
use crate::probes::record::ProbeRecord;
use crate::probes::registry::ProbeKey;
use crate::probes::MAX_PROBE_COUNT;

/// One probe as laid out for shaders
///
/// `config` packs `[shape flag, radius, attenuation, 0]`; the shape flag is
/// [`ProbeShape::config_flag`](crate::probes::record::ProbeShape::config_flag).
/// Matrices are column-major.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuProbe {
    /// World position, w unused
    pub position: [f32; 4],
    /// Parallax reference position in world space, w unused
    pub ref_position: [f32; 4],
    /// Parallax reference scale, w unused
    pub ref_scale: [f32; 4],
    /// World-to-probe-local matrix, column-major
    pub world_to_local: [f32; 16],
    /// Bounding box minimum corner, w unused
    pub box_min: [f32; 4],
    /// Bounding box maximum corner, w unused
    pub box_max: [f32; 4],
    /// Packed shape flag, radius, attenuation
    pub config: [f32; 4],
}

// Plain f32 arrays under repr(C), no padding
unsafe impl bytemuck::Pod for GpuProbe {}
unsafe impl bytemuck::Zeroable for GpuProbe {}

/// Bounded, shader-ready block of all probes placed this frame
///
/// Fixed-size so the whole block can cross the gfx boundary as plain bytes;
/// entries past `count` are zeroed.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GpuProbeBlock {
    /// Number of valid entries in `probes`
    pub count: u32,
    _pad: [u32; 3],
    /// Probe entries in selection order
    pub probes: [GpuProbe; MAX_PROBE_COUNT],
}

// repr(C); the u32 header is padded out to 16 bytes explicitly
unsafe impl bytemuck::Pod for GpuProbeBlock {}
unsafe impl bytemuck::Zeroable for GpuProbeBlock {}

impl GpuProbeBlock {
    /// The block as raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl std::fmt::Debug for GpuProbeBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuProbeBlock")
            .field("count", &self.count)
            .field("probes", &&self.probes[..self.count as usize])
            .finish()
    }
}

/// Parallel per-frame arrays for every probe placed this frame
///
/// Rebuilt by `ProbeManager::update_probes`; all vectors share indexing, and
/// the cubemap handles at index `i` are the source for array layer `i`.
#[derive(Debug, Default, Clone)]
pub struct ProbeFrameData {
    keys: Vec<ProbeKey>,
    positions: Vec<[f32; 4]>,
    ref_positions: Vec<[f32; 4]>,
    ref_scales: Vec<[f32; 4]>,
    world_to_local: Vec<[f32; 16]>,
    box_min: Vec<[f32; 4]>,
    box_max: Vec<[f32; 4]>,
    config: Vec<[f32; 4]>,
    cubemaps: Vec<CubemapHandle>,
    irradiance_maps: Vec<CubemapHandle>,
}

fn vec4_from(v: crate::foundation::math::Vec3, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

fn mat4_to_array(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}

impl ProbeFrameData {
    /// Create empty frame data with capacity for the probe limit
    pub fn new() -> Self {
        Self {
            keys: Vec::with_capacity(MAX_PROBE_COUNT),
            positions: Vec::with_capacity(MAX_PROBE_COUNT),
            ref_positions: Vec::with_capacity(MAX_PROBE_COUNT),
            ref_scales: Vec::with_capacity(MAX_PROBE_COUNT),
            world_to_local: Vec::with_capacity(MAX_PROBE_COUNT),
            box_min: Vec::with_capacity(MAX_PROBE_COUNT),
            box_max: Vec::with_capacity(MAX_PROBE_COUNT),
            config: Vec::with_capacity(MAX_PROBE_COUNT),
            cubemaps: Vec::with_capacity(MAX_PROBE_COUNT),
            irradiance_maps: Vec::with_capacity(MAX_PROBE_COUNT),
        }
    }

    /// Drop all entries, keeping allocations for the next frame
    pub fn clear(&mut self) {
        self.keys.clear();
        self.positions.clear();
        self.ref_positions.clear();
        self.ref_scales.clear();
        self.world_to_local.clear();
        self.box_min.clear();
        self.box_max.clear();
        self.config.clear();
        self.cubemaps.clear();
        self.irradiance_maps.clear();
    }

    /// Drop entries past `len`, keeping earlier probes and their layers
    pub fn truncate(&mut self, len: usize) {
        self.keys.truncate(len);
        self.positions.truncate(len);
        self.ref_positions.truncate(len);
        self.ref_scales.truncate(len);
        self.world_to_local.truncate(len);
        self.box_min.truncate(len);
        self.box_max.truncate(len);
        self.config.truncate(len);
        self.cubemaps.truncate(len);
        self.irradiance_maps.truncate(len);
    }

    /// Append one probe's data to every array
    ///
    /// Callers pass the capture handles separately so only baked probes can
    /// be placed. Silently refuses past [`MAX_PROBE_COUNT`].
    pub fn push(
        &mut self,
        key: ProbeKey,
        record: &ProbeRecord,
        cubemap: CubemapHandle,
        irradiance: CubemapHandle,
    ) {
        if self.keys.len() >= MAX_PROBE_COUNT {
            log::warn!("frame data full; dropping probe {key:?}");
            return;
        }
        self.keys.push(key);
        self.positions.push(vec4_from(record.position, 0.0));
        self.ref_positions
            .push(vec4_from(record.position + record.ref_offset, 0.0));
        self.ref_scales.push(vec4_from(record.ref_scale, 0.0));
        self.world_to_local
            .push(mat4_to_array(&record.transform.to_world_to_local()));
        self.box_min.push(vec4_from(record.bounds.min, 0.0));
        self.box_max.push(vec4_from(record.bounds.max, 0.0));
        self.config.push([
            record.shape.config_flag(),
            record.radius,
            record.attenuation,
            0.0,
        ]);
        self.cubemaps.push(cubemap);
        self.irradiance_maps.push(irradiance);
    }

    /// Number of probes placed this frame
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no probes were placed
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys of placed probes in array order
    pub fn keys(&self) -> &[ProbeKey] {
        &self.keys
    }

    /// Array index of a placed probe, if present
    pub fn index_of(&self, key: ProbeKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    /// World positions, w unused
    pub fn positions(&self) -> &[[f32; 4]] {
        &self.positions
    }

    /// Parallax reference positions in world space
    pub fn ref_positions(&self) -> &[[f32; 4]] {
        &self.ref_positions
    }

    /// Parallax reference scales
    pub fn ref_scales(&self) -> &[[f32; 4]] {
        &self.ref_scales
    }

    /// World-to-probe-local matrices, column-major
    pub fn world_to_local(&self) -> &[[f32; 16]] {
        &self.world_to_local
    }

    /// Bounding box minimum corners
    pub fn box_min(&self) -> &[[f32; 4]] {
        &self.box_min
    }

    /// Bounding box maximum corners
    pub fn box_max(&self) -> &[[f32; 4]] {
        &self.box_max
    }

    /// Packed `[shape, radius, attenuation, 0]` vectors
    pub fn config(&self) -> &[[f32; 4]] {
        &self.config
    }

    /// Radiance cubemaps; index doubles as the array layer
    pub fn cubemaps(&self) -> &[CubemapHandle] {
        &self.cubemaps
    }

    /// Irradiance cubemaps; index doubles as the array layer
    pub fn irradiance_maps(&self) -> &[CubemapHandle] {
        &self.irradiance_maps
    }

    /// Pack everything into the bounded shader block
    pub fn as_gpu_block(&self) -> GpuProbeBlock {
        let mut block = GpuProbeBlock::zeroed();
        block.count = self.keys.len() as u32;
        for i in 0..self.keys.len() {
            block.probes[i] = GpuProbe {
                position: self.positions[i],
                ref_position: self.ref_positions[i],
                ref_scale: self.ref_scales[i],
                world_to_local: self.world_to_local[i],
                box_min: self.box_min[i],
                box_max: self.box_max[i],
                config: self.config[i],
            };
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::probes::registry::ProbeRegistry;
    use approx::assert_relative_eq;

    fn placed_frame() -> (ProbeFrameData, ProbeKey, ProbeRegistry) {
        let mut registry = ProbeRegistry::new();
        let mut record = ProbeRecord::sphere(Vec3::new(2.0, 3.0, 4.0), 6.0);
        record.attenuation = 2.5;
        record.ref_offset = Vec3::new(1.0, 0.0, -1.0);
        let key = registry.insert(record);

        let mut frame = ProbeFrameData::new();
        let record = registry.get(key).unwrap();
        frame.push(key, record, CubemapHandle(1), CubemapHandle(2));
        (frame, key, registry)
    }

    #[test]
    fn test_arrays_stay_parallel() {
        let (frame, key, _) = placed_frame();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.index_of(key), Some(0));
        assert_eq!(frame.positions().len(), frame.cubemaps().len());
        assert_eq!(frame.world_to_local().len(), frame.config().len());

        assert_relative_eq!(frame.positions()[0][0], 2.0);
        // Record offset applied on push: ref position = position + offset
        assert_relative_eq!(frame.ref_positions()[0][0], 3.0);
        assert_relative_eq!(frame.ref_positions()[0][2], 3.0);
        assert_relative_eq!(frame.box_min()[0][1], -3.0);
        assert_relative_eq!(frame.config()[0][0], 0.0, epsilon = 1e-6); // sphere flag
        assert_relative_eq!(frame.config()[0][1], 6.0); // radius
        assert_relative_eq!(frame.config()[0][2], 2.5); // attenuation
    }

    #[test]
    fn test_world_to_local_maps_probe_center_to_origin() {
        let (frame, _, _) = placed_frame();
        let m = frame.world_to_local()[0];
        // Column-major: translation lives in elements 12..15
        let p = [2.0_f32, 3.0, 4.0, 1.0];
        let local_x = m[0] * p[0] + m[4] * p[1] + m[8] * p[2] + m[12] * p[3];
        let local_y = m[1] * p[0] + m[5] * p[1] + m[9] * p[2] + m[13] * p[3];
        let local_z = m[2] * p[0] + m[6] * p[1] + m[10] * p[2] + m[14] * p[3];
        assert_relative_eq!(local_x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(local_y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(local_z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_clear_empties_every_array() {
        let (mut frame, _, _) = placed_frame();
        frame.clear();
        assert!(frame.is_empty());
        assert!(frame.cubemaps().is_empty());
        assert!(frame.irradiance_maps().is_empty());
    }

    #[test]
    fn test_truncate_keeps_arrays_parallel() {
        let (mut frame, first, mut registry) = placed_frame();
        let second = registry.insert(ProbeRecord::sphere(Vec3::new(9.0, 0.0, 0.0), 3.0));
        let record = registry.get(second).unwrap();
        frame.push(second, record, CubemapHandle(7), CubemapHandle(8));

        frame.truncate(1);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.index_of(first), Some(0));
        assert_eq!(frame.index_of(second), None);
        assert_eq!(frame.cubemaps(), &[CubemapHandle(1)]);
        assert_eq!(frame.irradiance_maps().len(), frame.positions().len());

        // Truncating past the end keeps everything
        frame.truncate(5);
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_gpu_block_packs_count_and_zeroes_tail() {
        let (frame, _, _) = placed_frame();
        let block = frame.as_gpu_block();
        assert_eq!(block.count, 1);
        assert_relative_eq!(block.probes[0].position[0], 2.0);
        assert_eq!(block.probes[1], GpuProbe::zeroed());

        // Byte size is stable: header + 50 fixed probe entries
        let expected = 16 + MAX_PROBE_COUNT * std::mem::size_of::<GpuProbe>();
        assert_eq!(block.as_bytes().len(), expected);
    }

    #[test]
    fn test_push_refuses_past_capacity() {
        let mut registry = ProbeRegistry::new();
        let mut frame = ProbeFrameData::new();
        for i in 0..MAX_PROBE_COUNT + 3 {
            let key = registry.insert(ProbeRecord::sphere(Vec3::new(i as f32, 0.0, 0.0), 1.0));
            let record = registry.get(key).unwrap();
            frame.push(key, record, CubemapHandle(1), CubemapHandle(2));
        }
        assert_eq!(frame.len(), MAX_PROBE_COUNT);
    }
}
