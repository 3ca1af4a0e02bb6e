//! Per-shader probe constant handles
//!
//! Looking up uniform handles by name every frame is wasted work, so the
//! handle set for each shader is resolved once and cached. A one-entry
//! fast path covers the common case of many consecutive draws with the
//! same shader.

use std::collections::HashMap;

use crate::gfx::{ConstantHandle, GfxDevice, ShaderId};
use crate::probes::MAX_FORWARD_PROBES;

/// Resolved probe uniform handles for one shader
///
/// Handles are `None` when the shader does not declare that uniform; the
/// whole set is cheap to copy around. Forward-path samplers get one handle
/// per slot, the shared arrays one handle each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeShaderConstants {
    /// `probeCount`
    pub count: Option<ConstantHandle>,
    /// `probePositions[]`
    pub positions: Option<ConstantHandle>,
    /// `probeRefPositions[]`
    pub ref_positions: Option<ConstantHandle>,
    /// `probeRefScales[]`
    pub ref_scales: Option<ConstantHandle>,
    /// `probeWorldToLocal[]`
    pub world_to_local: Option<ConstantHandle>,
    /// `probeBoxMin[]`
    pub box_min: Option<ConstantHandle>,
    /// `probeBoxMax[]`
    pub box_max: Option<ConstantHandle>,
    /// `probeConfig[]`, packed `[shape, radius, attenuation, 0]`
    pub config: Option<ConstantHandle>,
    /// `skylightCubemapIdx`
    pub skylight_index: Option<ConstantHandle>,
    /// `probeCubemap0..3`, forward path only
    pub forward_cubemaps: [Option<ConstantHandle>; MAX_FORWARD_PROBES],
    /// `probeIrradiance0..3`, forward path only
    pub forward_irradiance: [Option<ConstantHandle>; MAX_FORWARD_PROBES],
    /// `probeCubemapArray`, array path only
    pub cubemap_array: Option<ConstantHandle>,
    /// `probeIrradianceArray`, array path only
    pub irradiance_array: Option<ConstantHandle>,
}

impl ProbeShaderConstants {
    /// Resolve every probe uniform the shader declares
    pub fn resolve(device: &mut dyn GfxDevice, shader: ShaderId) -> Self {
        let mut forward_cubemaps = [None; MAX_FORWARD_PROBES];
        let mut forward_irradiance = [None; MAX_FORWARD_PROBES];
        for slot in 0..MAX_FORWARD_PROBES {
            forward_cubemaps[slot] = device.resolve_constant(shader, &format!("probeCubemap{slot}"));
            forward_irradiance[slot] =
                device.resolve_constant(shader, &format!("probeIrradiance{slot}"));
        }

        Self {
            count: device.resolve_constant(shader, "probeCount"),
            positions: device.resolve_constant(shader, "probePositions"),
            ref_positions: device.resolve_constant(shader, "probeRefPositions"),
            ref_scales: device.resolve_constant(shader, "probeRefScales"),
            world_to_local: device.resolve_constant(shader, "probeWorldToLocal"),
            box_min: device.resolve_constant(shader, "probeBoxMin"),
            box_max: device.resolve_constant(shader, "probeBoxMax"),
            config: device.resolve_constant(shader, "probeConfig"),
            skylight_index: device.resolve_constant(shader, "skylightCubemapIdx"),
            forward_cubemaps,
            forward_irradiance,
            cubemap_array: device.resolve_constant(shader, "probeCubemapArray"),
            irradiance_array: device.resolve_constant(shader, "probeIrradianceArray"),
        }
    }

    /// True if the shader declares no probe uniforms at all
    pub fn is_empty(&self) -> bool {
        self.count.is_none()
            && self.positions.is_none()
            && self.ref_positions.is_none()
            && self.ref_scales.is_none()
            && self.world_to_local.is_none()
            && self.box_min.is_none()
            && self.box_max.is_none()
            && self.config.is_none()
            && self.skylight_index.is_none()
            && self.forward_cubemaps.iter().all(Option::is_none)
            && self.forward_irradiance.iter().all(Option::is_none)
            && self.cubemap_array.is_none()
            && self.irradiance_array.is_none()
    }
}

/// Cache of resolved constant sets, keyed by shader
#[derive(Debug, Default)]
pub struct ProbeConstantsCache {
    entries: HashMap<ShaderId, ProbeShaderConstants>,
    last: Option<(ShaderId, ProbeShaderConstants)>,
}

impl ProbeConstantsCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant set for a shader, resolving and caching on first sight
    pub fn lookup_or_build(
        &mut self,
        device: &mut dyn GfxDevice,
        shader: ShaderId,
    ) -> ProbeShaderConstants {
        if let Some((last_shader, constants)) = self.last {
            if last_shader == shader {
                return constants;
            }
        }
        let constants = *self
            .entries
            .entry(shader)
            .or_insert_with(|| ProbeShaderConstants::resolve(device, shader));
        self.last = Some((shader, constants));
        constants
    }

    /// Drop one shader's cached handles, e.g. after a shader reload
    ///
    /// Other shaders keep their entries; the next lookup for this shader
    /// re-resolves against the device.
    pub fn invalidate(&mut self, shader: ShaderId) {
        self.entries.remove(&shader);
        if matches!(self.last, Some((last, _)) if last == shader) {
            self.last = None;
        }
    }

    /// Drop every cached entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last = None;
    }

    /// Number of shaders with cached handles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a shader has a cached entry
    pub fn contains(&self, shader: ShaderId) -> bool {
        self.entries.contains_key(&shader)
    }
}
