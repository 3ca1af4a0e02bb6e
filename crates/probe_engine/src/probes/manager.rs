//! Probe selection and shader binding
//!
//! `ProbeManager` ties the subsystem together. Once per frame it re-scores
//! every registered probe, selects the best candidates up to the probe
//! limit, fills the parallel shader arrays and, when the device supports
//! cubemap arrays, keeps two array textures populated with the selected
//! captures. During draw submission it writes per-shader probe uniforms
//! through a cached constant-handle set.
//!
//! The manager is an explicitly owned instance; hosts construct one with
//! their config and thread it through their frame loop. All methods take
//! `&mut self` on the render thread, see the crate docs for the threading
//! contract.

use crate::capture::SceneCapture;
use crate::config::ProbeSystemConfig;
use crate::debug::{
    probe_outline, DebugShape, COLOR_IDLE, COLOR_PLACED, COLOR_SKYLIGHT, COLOR_UNBAKED,
};
use crate::foundation::math::Vec3;
use crate::gfx::{
    mip_count_for_resolution, CubemapArrayDesc, CubemapArrayHandle, CubemapDesc, CubemapHandle,
    GfxCapabilities, GfxDevice, GfxResult, ShaderConstantBuffer, ShaderId,
};
use crate::probes::baker::{BakeError, ProbeBaker};
use crate::probes::constants::{ProbeConstantsCache, ProbeShaderConstants};
use crate::probes::frame::ProbeFrameData;
use crate::probes::record::ProbeRecord;
use crate::probes::registry::{ProbeKey, ProbeRegistry};
use crate::probes::scoring::{ProbeScorer, ViewInfo};
use crate::probes::{MAX_FORWARD_PROBES, MAX_PROBE_COUNT};

/// How probe data reaches the shaders this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingPath {
    /// Up to four individually bound cubemaps per draw
    Forward,
    /// All selected probes in two cubemap-array textures
    CubemapArray,
}

/// Probe-relevant inputs of one draw submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawSubmission {
    /// Shader the draw uses
    pub shader: ShaderId,
    /// World position of the drawn object
    pub world_position: Vec3,
}

/// Array-texture handles shaders bind on the array path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeArrayBindings {
    /// Radiance cubemap array
    pub radiance: CubemapArrayHandle,
    /// Irradiance cubemap array
    pub irradiance: CubemapArrayHandle,
    /// Number of populated layers
    pub layer_count: u32,
}

// Array textures plus enough bookkeeping to skip redundant layer copies.
struct ProbeArrays {
    radiance: CubemapArrayHandle,
    irradiance: CubemapArrayHandle,
    desc: CubemapArrayDesc,
    radiance_sources: Vec<Option<CubemapHandle>>,
    irradiance_sources: Vec<Option<CubemapHandle>>,
}

#[derive(Debug, Clone, Copy)]
struct SelectionEntry {
    key: ProbeKey,
    sequence: u64,
    score: f32,
    skylight: bool,
}

/// Owns the registered probe set and drives per-frame probe state
pub struct ProbeManager {
    config: ProbeSystemConfig,
    registry: ProbeRegistry,
    scorer: Box<dyn ProbeScorer>,
    baker: ProbeBaker,
    constants: ProbeConstantsCache,
    frame: ProbeFrameData,
    selected: Vec<ProbeKey>,
    arrays: Option<ProbeArrays>,
    shading_path: ShadingPath,
    render_reflection_probes: bool,
}

impl ProbeManager {
    /// Create a manager with the config's scoring policy
    pub fn new(config: ProbeSystemConfig) -> Self {
        let scorer = config.scorer.build();
        Self::with_scorer(config, scorer)
    }

    /// Create a manager with a custom scoring policy
    pub fn with_scorer(config: ProbeSystemConfig, scorer: Box<dyn ProbeScorer>) -> Self {
        Self {
            baker: ProbeBaker::new(&config),
            render_reflection_probes: config.render_reflection_probes,
            registry: ProbeRegistry::new(),
            scorer,
            constants: ProbeConstantsCache::new(),
            frame: ProbeFrameData::new(),
            selected: Vec::with_capacity(MAX_PROBE_COUNT),
            arrays: None,
            shading_path: ShadingPath::Forward,
            config,
        }
    }

    /// The configuration the manager was built with
    pub fn config(&self) -> &ProbeSystemConfig {
        &self.config
    }

    /// The probe registry
    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// The probe registry, mutable
    pub fn registry_mut(&mut self) -> &mut ProbeRegistry {
        &mut self.registry
    }

    /// One probe record, if the key is live
    pub fn probe(&self, key: ProbeKey) -> Option<&ProbeRecord> {
        self.registry.get(key)
    }

    /// One probe record for editing, if the key is live
    pub fn probe_mut(&mut self, key: ProbeKey) -> Option<&mut ProbeRecord> {
        self.registry.get_mut(key)
    }

    /// Insert a probe and register it for selection
    pub fn add_probe(&mut self, record: ProbeRecord) -> ProbeKey {
        let key = self.registry.insert(record);
        self.registry.register(key);
        key
    }

    /// Destroy a probe and its baked captures
    ///
    /// Returns false when the key was already gone.
    pub fn remove_probe(&mut self, device: &mut dyn GfxDevice, key: ProbeKey) -> bool {
        match self.registry.remove(key) {
            Some(mut record) => {
                if let Some(handle) = record.cubemap.take() {
                    device.destroy_cubemap(handle);
                }
                if let Some(handle) = record.irradiance.take() {
                    device.destroy_cubemap(handle);
                }
                true
            }
            None => false,
        }
    }

    /// Add an existing probe to the registered set
    pub fn register_probe(&mut self, key: ProbeKey) -> bool {
        self.registry.register(key)
    }

    /// Remove a probe from the registered set without destroying it
    pub fn unregister_probe(&mut self, key: ProbeKey) {
        self.registry.unregister(key);
    }

    /// Drop cached constant handles for a reloaded shader
    pub fn invalidate_shader(&mut self, shader: ShaderId) {
        self.constants.invalidate(shader);
    }

    /// The constant-handle cache
    pub fn constants_cache(&self) -> &ProbeConstantsCache {
        &self.constants
    }

    /// Bake one probe through the given capture collaborator
    pub fn bake_probe(
        &mut self,
        device: &mut dyn GfxDevice,
        capture: &mut dyn SceneCapture,
        key: ProbeKey,
    ) -> Result<(), BakeError> {
        self.baker.bake_probe(device, capture, &mut self.registry, key)
    }

    /// Bake every dirty registered probe; returns the number baked
    pub fn bake_probes(
        &mut self,
        device: &mut dyn GfxDevice,
        capture: &mut dyn SceneCapture,
    ) -> usize {
        self.baker.bake_probes(device, capture, &mut self.registry)
    }

    /// Refresh scores, selection, frame arrays and array textures
    ///
    /// Runs once per frame before draw submission. Never fails; probes
    /// without usable captures are skipped, and when an array reallocation
    /// fails the previous arrays stay bound with the placed probes clamped
    /// to their layer count.
    pub fn update_probes(&mut self, device: &mut dyn GfxDevice, view: &ViewInfo) {
        self.shading_path = if device
            .capabilities()
            .contains(GfxCapabilities::CUBEMAP_ARRAYS)
        {
            ShadingPath::CubemapArray
        } else {
            ShadingPath::Forward
        };

        let registered: Vec<(ProbeKey, u64)> = self.registry.registered().collect();
        for (key, _) in &registered {
            if let Some(record) = self.registry.get_mut(*key) {
                record.score = self.scorer.score(record, view);
            }
        }

        let mut ordered: Vec<SelectionEntry> = Vec::with_capacity(registered.len());
        for (key, sequence) in registered {
            if let Some(record) = self.registry.get(key) {
                ordered.push(SelectionEntry {
                    key,
                    sequence,
                    score: record.score,
                    skylight: record.skylight,
                });
            }
        }
        // Descending score; registration order breaks ties so identical
        // frames produce identical layer assignments.
        ordered.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.sequence.cmp(&b.sequence)));

        let cap = self.config.max_probes.min(MAX_PROBE_COUNT);
        let mut selection: Vec<SelectionEntry> = ordered.iter().take(cap).copied().collect();
        for entry in ordered.iter().skip(cap) {
            if !entry.skylight {
                continue;
            }
            // Skylights always ship; push out the weakest non-skylight
            match selection.iter().rposition(|e| !e.skylight) {
                Some(weakest) => {
                    let dropped = selection.remove(weakest);
                    log::trace!("skylight {:?} displaced probe {:?}", entry.key, dropped.key);
                    selection.push(*entry);
                }
                None => {
                    log::warn!("selection saturated with skylights; {:?} not placed", entry.key);
                }
            }
        }

        self.selected.clear();
        self.selected.extend(selection.iter().map(|e| e.key));

        self.frame.clear();
        let expected_radiance = CubemapDesc::with_mip_chain(self.config.capture_resolution);
        let expected_irradiance = CubemapDesc {
            resolution: self.config.irradiance_resolution,
            mip_count: 1,
        };
        for entry in &selection {
            let record = match self.registry.get(entry.key) {
                Some(record) => record,
                None => continue,
            };
            let (cubemap, irradiance) = match (record.cubemap, record.irradiance) {
                (Some(cubemap), Some(irradiance)) if !record.dirty => (cubemap, irradiance),
                _ => {
                    log::trace!(
                        "probe {:?} has no usable capture; falling back to ambient",
                        entry.key
                    );
                    continue;
                }
            };
            // Captures from before a settings change would break layer
            // uniformity; leave them out until the next bake refreshes them.
            if !matches_shape(device, cubemap, &expected_radiance)
                || !matches_shape(device, irradiance, &expected_irradiance)
            {
                log::trace!(
                    "probe {:?} capture predates current settings; skipped until rebake",
                    entry.key
                );
                continue;
            }
            self.frame.push(entry.key, record, cubemap, irradiance);
        }

        if self.shading_path == ShadingPath::CubemapArray {
            self.update_arrays(device);
        }

        log::trace!(
            "probe update: {} registered, {} selected, {} placed ({:?})",
            self.registry.registered_count(),
            self.selected.len(),
            self.frame.len(),
            self.shading_path
        );
    }

    fn update_arrays(&mut self, device: &mut dyn GfxDevice) {
        if self.frame.is_empty() {
            // Keep whatever is allocated; a zero probe count already stops
            // shaders from sampling it.
            return;
        }
        let layer_count = self.frame.len() as u32;
        let desc = CubemapArrayDesc {
            resolution: self.config.capture_resolution,
            mip_count: mip_count_for_resolution(self.config.capture_resolution),
            layer_count,
        };
        let irradiance_desc = CubemapArrayDesc {
            resolution: self.config.irradiance_resolution,
            mip_count: 1,
            layer_count,
        };

        if self.arrays.as_ref().map_or(true, |a| a.desc != desc) {
            match allocate_array_pair(device, &desc, &irradiance_desc) {
                Ok((radiance, irradiance)) => {
                    // Old arrays go only after both replacements exist;
                    // in-flight frames are the device's problem per the
                    // GfxDevice contract.
                    if let Some(old) = self.arrays.take() {
                        device.destroy_cubemap_array(old.radiance);
                        device.destroy_cubemap_array(old.irradiance);
                    }
                    log::debug!(
                        "probe arrays reallocated: {layer_count} layer(s) at {}px",
                        desc.resolution
                    );
                    self.arrays = Some(ProbeArrays {
                        radiance,
                        irradiance,
                        desc,
                        radiance_sources: vec![None; layer_count as usize],
                        irradiance_sources: vec![None; layer_count as usize],
                    });
                }
                Err(err) => {
                    // Shaders keep sampling the previous arrays, so the frame
                    // must not describe probes past their last layer.
                    let kept = self.arrays.as_ref().map_or(0, |a| a.desc.layer_count);
                    log::warn!("probe array allocation failed: {err}; keeping {kept} layer(s)");
                    self.frame.truncate(kept as usize);
                }
            }
        }

        let arrays = match self.arrays.as_mut() {
            Some(arrays) => arrays,
            None => return,
        };
        for layer in 0..self.frame.len() {
            let cubemap = self.frame.cubemaps()[layer];
            if arrays.radiance_sources[layer] != Some(cubemap) {
                match device.copy_cubemap_to_layer(cubemap, arrays.radiance, layer as u32) {
                    Ok(()) => arrays.radiance_sources[layer] = Some(cubemap),
                    Err(err) => {
                        log::warn!("probe layer {layer} copy failed: {err}");
                        arrays.radiance_sources[layer] = None;
                    }
                }
            }
            let irradiance = self.frame.irradiance_maps()[layer];
            if arrays.irradiance_sources[layer] != Some(irradiance) {
                match device.copy_cubemap_to_layer(irradiance, arrays.irradiance, layer as u32) {
                    Ok(()) => arrays.irradiance_sources[layer] = Some(irradiance),
                    Err(err) => {
                        log::warn!("irradiance layer {layer} copy failed: {err}");
                        arrays.irradiance_sources[layer] = None;
                    }
                }
            }
        }
    }

    /// Write one draw's probe uniforms into its constant buffer
    ///
    /// On the forward path this picks the probes nearest the draw position,
    /// up to the forward limit, with skylights exempt from the distance
    /// cut. On the array path it writes the whole frame's arrays plus the
    /// array-texture bindings. Constants the shader does not declare are
    /// skipped; the probe count is always written.
    pub fn set_probe_info(
        &mut self,
        device: &mut dyn GfxDevice,
        submission: &DrawSubmission,
        buffer: &mut dyn ShaderConstantBuffer,
    ) -> GfxResult<()> {
        let constants = self.constants.lookup_or_build(device, submission.shader);
        if constants.is_empty() {
            return Ok(());
        }
        match self.shading_path {
            ShadingPath::Forward => self.write_forward_constants(&constants, submission, buffer),
            ShadingPath::CubemapArray => self.write_array_constants(&constants, buffer),
        }
    }

    // Indices into the frame arrays for the probes this draw should use.
    fn forward_slots(&self, target: Vec3) -> Vec<usize> {
        let cap = self.config.max_forward_probes.min(MAX_FORWARD_PROBES);
        let mut slots: Vec<usize> = Vec::with_capacity(cap);
        let mut candidates: Vec<(f32, usize)> = Vec::new();
        for (index, key) in self.frame.keys().iter().enumerate() {
            if self.registry.get(*key).is_some_and(|r| r.skylight) {
                if slots.len() < cap {
                    slots.push(index);
                }
            } else {
                let p = self.frame.positions()[index];
                let delta = Vec3::new(p[0], p[1], p[2]) - target;
                candidates.push((delta.norm_squared(), index));
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (_, index) in candidates {
            if slots.len() == cap {
                break;
            }
            slots.push(index);
        }
        slots
    }

    fn is_skylight_slot(&self, index: usize) -> bool {
        self.frame
            .keys()
            .get(index)
            .and_then(|key| self.registry.get(*key))
            .is_some_and(|record| record.skylight)
    }

    fn write_forward_constants(
        &self,
        constants: &ProbeShaderConstants,
        submission: &DrawSubmission,
        buffer: &mut dyn ShaderConstantBuffer,
    ) -> GfxResult<()> {
        let slots = self.forward_slots(submission.world_position);
        if let Some(handle) = constants.count {
            buffer.set_u32(handle, slots.len() as u32)?;
        }
        if slots.is_empty() {
            if let Some(handle) = constants.skylight_index {
                buffer.set_f32(handle, -1.0)?;
            }
            return Ok(());
        }

        let gather = |source: &[[f32; 4]]| -> Vec<[f32; 4]> {
            slots.iter().map(|&i| source[i]).collect()
        };
        if let Some(handle) = constants.positions {
            buffer.set_vec4_array(handle, &gather(self.frame.positions()))?;
        }
        if let Some(handle) = constants.ref_positions {
            buffer.set_vec4_array(handle, &gather(self.frame.ref_positions()))?;
        }
        if let Some(handle) = constants.ref_scales {
            buffer.set_vec4_array(handle, &gather(self.frame.ref_scales()))?;
        }
        if let Some(handle) = constants.world_to_local {
            let matrices: Vec<[f32; 16]> = slots
                .iter()
                .map(|&i| self.frame.world_to_local()[i])
                .collect();
            buffer.set_mat4_array(handle, &matrices)?;
        }
        if let Some(handle) = constants.box_min {
            buffer.set_vec4_array(handle, &gather(self.frame.box_min()))?;
        }
        if let Some(handle) = constants.box_max {
            buffer.set_vec4_array(handle, &gather(self.frame.box_max()))?;
        }
        if let Some(handle) = constants.config {
            buffer.set_vec4_array(handle, &gather(self.frame.config()))?;
        }
        for (slot, &index) in slots.iter().enumerate().take(MAX_FORWARD_PROBES) {
            if let Some(handle) = constants.forward_cubemaps[slot] {
                buffer.bind_cubemap(handle, self.frame.cubemaps()[index])?;
            }
            if let Some(handle) = constants.forward_irradiance[slot] {
                buffer.bind_cubemap(handle, self.frame.irradiance_maps()[index])?;
            }
        }
        if let Some(handle) = constants.skylight_index {
            let slot = slots.iter().position(|&i| self.is_skylight_slot(i));
            buffer.set_f32(handle, slot.map_or(-1.0, |s| s as f32))?;
        }
        Ok(())
    }

    fn write_array_constants(
        &self,
        constants: &ProbeShaderConstants,
        buffer: &mut dyn ShaderConstantBuffer,
    ) -> GfxResult<()> {
        let arrays = match &self.arrays {
            Some(arrays) if !self.frame.is_empty() => arrays,
            _ => {
                if let Some(handle) = constants.count {
                    buffer.set_u32(handle, 0)?;
                }
                if let Some(handle) = constants.skylight_index {
                    buffer.set_f32(handle, -1.0)?;
                }
                return Ok(());
            }
        };

        if let Some(handle) = constants.count {
            buffer.set_u32(handle, self.frame.len() as u32)?;
        }
        if let Some(handle) = constants.positions {
            buffer.set_vec4_array(handle, self.frame.positions())?;
        }
        if let Some(handle) = constants.ref_positions {
            buffer.set_vec4_array(handle, self.frame.ref_positions())?;
        }
        if let Some(handle) = constants.ref_scales {
            buffer.set_vec4_array(handle, self.frame.ref_scales())?;
        }
        if let Some(handle) = constants.world_to_local {
            buffer.set_mat4_array(handle, self.frame.world_to_local())?;
        }
        if let Some(handle) = constants.box_min {
            buffer.set_vec4_array(handle, self.frame.box_min())?;
        }
        if let Some(handle) = constants.box_max {
            buffer.set_vec4_array(handle, self.frame.box_max())?;
        }
        if let Some(handle) = constants.config {
            buffer.set_vec4_array(handle, self.frame.config())?;
        }
        if let Some(handle) = constants.cubemap_array {
            buffer.bind_cubemap_array(handle, arrays.radiance)?;
        }
        if let Some(handle) = constants.irradiance_array {
            buffer.bind_cubemap_array(handle, arrays.irradiance)?;
        }
        if let Some(handle) = constants.skylight_index {
            let layer = (0..self.frame.len()).find(|&i| self.is_skylight_slot(i));
            buffer.set_f32(handle, layer.map_or(-1.0, |l| l as f32))?;
        }
        Ok(())
    }

    /// Number of probes placed in the frame arrays (at most the probe limit)
    pub fn effective_probe_count(&self) -> usize {
        self.frame.len()
    }

    /// Keys selected this frame, including probes awaiting a bake
    pub fn selected_keys(&self) -> &[ProbeKey] {
        &self.selected
    }

    /// The per-frame parallel arrays
    pub fn frame_data(&self) -> &ProbeFrameData {
        &self.frame
    }

    /// Current array-texture bindings, if allocated
    pub fn array_bindings(&self) -> Option<ProbeArrayBindings> {
        self.arrays.as_ref().map(|arrays| ProbeArrayBindings {
            radiance: arrays.radiance,
            irradiance: arrays.irradiance,
            layer_count: arrays.desc.layer_count,
        })
    }

    /// The shading path chosen by the last update
    pub fn shading_path(&self) -> ShadingPath {
        self.shading_path
    }

    /// Toggle probe visualization output
    pub fn set_render_reflection_probes(&mut self, enabled: bool) {
        self.render_reflection_probes = enabled;
    }

    /// Whether probe visualization output is enabled
    pub fn render_reflection_probes(&self) -> bool {
        self.render_reflection_probes
    }

    /// Wireframe shapes for every registered probe, colored by state
    ///
    /// Empty unless probe visualization is enabled.
    pub fn debug_shapes(&self) -> Vec<DebugShape> {
        if !self.render_reflection_probes {
            return Vec::new();
        }
        let mut shapes = Vec::new();
        for (key, _) in self.registry.registered() {
            let record = match self.registry.get(key) {
                Some(record) => record,
                None => continue,
            };
            let color = if record.skylight {
                COLOR_SKYLIGHT
            } else if self.frame.index_of(key).is_some() {
                COLOR_PLACED
            } else if self.selected.contains(&key) {
                COLOR_UNBAKED
            } else {
                COLOR_IDLE
            };
            shapes.push(probe_outline(record, color));
        }
        shapes
    }

    /// Destroy every device resource the manager created
    ///
    /// Records stay registered but are marked dirty again, so a later bake
    /// pass can rebuild everything.
    pub fn release_resources(&mut self, device: &mut dyn GfxDevice) {
        if let Some(arrays) = self.arrays.take() {
            device.destroy_cubemap_array(arrays.radiance);
            device.destroy_cubemap_array(arrays.irradiance);
        }
        let keys: Vec<ProbeKey> = self.registry.iter().map(|(key, _)| key).collect();
        for key in keys {
            if let Some(record) = self.registry.get_mut(key) {
                if let Some(handle) = record.cubemap.take() {
                    device.destroy_cubemap(handle);
                }
                if let Some(handle) = record.irradiance.take() {
                    device.destroy_cubemap(handle);
                }
                record.dirty = true;
            }
        }
        self.frame.clear();
        self.selected.clear();
        self.constants.clear();
        log::debug!("released probe graphics resources");
    }
}

fn matches_shape(device: &dyn GfxDevice, handle: CubemapHandle, expected: &CubemapDesc) -> bool {
    device.cubemap_info(handle).is_some_and(|info| {
        info.resolution == expected.resolution && info.mip_count == expected.mip_count
    })
}

// Both arrays or neither; the radiance array is rolled back when the
// irradiance allocation fails.
fn allocate_array_pair(
    device: &mut dyn GfxDevice,
    radiance_desc: &CubemapArrayDesc,
    irradiance_desc: &CubemapArrayDesc,
) -> GfxResult<(CubemapArrayHandle, CubemapArrayHandle)> {
    let radiance = device.create_cubemap_array(radiance_desc)?;
    match device.create_cubemap_array(irradiance_desc) {
        Ok(irradiance) => Ok((radiance, irradiance)),
        Err(err) => {
            device.destroy_cubemap_array(radiance);
            Err(err)
        }
    }
}
