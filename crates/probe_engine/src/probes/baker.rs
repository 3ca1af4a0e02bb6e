//! Probe capture baking
//!
//! Orchestrates the offline half of the probe pipeline: render six faces
//! through the host's [`SceneCapture`], upload them as a mip-chained
//! radiance cubemap, convolve and upload the matching irradiance map, then
//! swap the new handles into the probe record. A failed bake leaves the
//! record exactly as it was, dirty flag included, so the next bake pass
//! retries it.

use thiserror::Error;

use crate::capture::{CaptureError, CaptureParams, FaceImage, SceneCapture};
use crate::config::ProbeSystemConfig;
use crate::foundation::time::Stopwatch;
use crate::gfx::{CubemapDesc, CubemapFace, CubemapHandle, GfxDevice, GfxError, GfxResult};
use crate::probes::irradiance::{convolve_irradiance, CpuCubemap};
use crate::probes::registry::{ProbeKey, ProbeRegistry};

/// Errors reported by a probe bake
#[derive(Debug, Error)]
pub enum BakeError {
    /// The key did not refer to a live probe record
    #[error("probe key is not in the registry")]
    UnknownProbe,

    /// Scene capture failed or broke its resolution contract
    #[error("scene capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// Resource allocation or upload failed
    #[error("graphics resource operation failed: {0}")]
    Gfx(#[from] GfxError),
}

/// Bakes probe captures through a [`SceneCapture`] collaborator
///
/// Holds only the capture parameters; all state lives in the registry and
/// the device.
#[derive(Debug, Clone)]
pub struct ProbeBaker {
    capture_resolution: u32,
    irradiance_resolution: u32,
    irradiance_samples: u32,
    near: f32,
    far: f32,
}

impl ProbeBaker {
    /// Create a baker with the configured capture parameters
    pub fn new(config: &ProbeSystemConfig) -> Self {
        Self {
            capture_resolution: config.capture_resolution,
            irradiance_resolution: config.irradiance_resolution,
            irradiance_samples: config.irradiance_samples,
            near: config.capture_near,
            far: config.capture_far,
        }
    }

    /// Edge length of baked radiance cubemaps
    pub fn capture_resolution(&self) -> u32 {
        self.capture_resolution
    }

    /// Edge length of baked irradiance cubemaps
    pub fn irradiance_resolution(&self) -> u32 {
        self.irradiance_resolution
    }

    fn captured_face(
        &self,
        capture: &mut dyn SceneCapture,
        params: &CaptureParams,
        face: CubemapFace,
    ) -> Result<FaceImage, BakeError> {
        let image = capture.capture_face(params, face)?;
        if image.resolution() != params.resolution {
            return Err(CaptureError::WrongResolution {
                requested: params.resolution,
                actual: image.resolution(),
            }
            .into());
        }
        Ok(image)
    }

    /// Re-capture one probe and swap in the fresh cubemaps
    ///
    /// On success the record holds new radiance and irradiance handles, the
    /// old ones are destroyed and `dirty` is cleared. On any failure the
    /// record is untouched and partially created resources are released.
    pub fn bake_probe(
        &self,
        device: &mut dyn GfxDevice,
        capture: &mut dyn SceneCapture,
        registry: &mut ProbeRegistry,
        key: ProbeKey,
    ) -> Result<(), BakeError> {
        let position = registry.get(key).ok_or(BakeError::UnknownProbe)?.position;
        let stopwatch = Stopwatch::start_new();
        let params = CaptureParams {
            position,
            resolution: self.capture_resolution,
            near: self.near,
            far: self.far,
        };

        // All CPU work happens before any resource is allocated, so the
        // common failure mode (a capture error) needs no cleanup at all.
        let faces = [
            self.captured_face(capture, &params, CubemapFace::PositiveX)?,
            self.captured_face(capture, &params, CubemapFace::NegativeX)?,
            self.captured_face(capture, &params, CubemapFace::PositiveY)?,
            self.captured_face(capture, &params, CubemapFace::NegativeY)?,
            self.captured_face(capture, &params, CubemapFace::PositiveZ)?,
            self.captured_face(capture, &params, CubemapFace::NegativeZ)?,
        ];
        let radiance = CpuCubemap::from_faces(faces)?;
        let irradiance =
            convolve_irradiance(&radiance, self.irradiance_resolution, self.irradiance_samples)?;

        let radiance_handle = upload_with_mip_chain(device, &radiance)?;
        let irradiance_handle = match upload_flat(device, &irradiance) {
            Ok(handle) => handle,
            Err(err) => {
                device.destroy_cubemap(radiance_handle);
                return Err(err.into());
            }
        };

        let record = match registry.get_mut(key) {
            Some(record) => record,
            None => {
                device.destroy_cubemap(radiance_handle);
                device.destroy_cubemap(irradiance_handle);
                return Err(BakeError::UnknownProbe);
            }
        };
        if let Some(old) = record.cubemap.take() {
            device.destroy_cubemap(old);
        }
        if let Some(old) = record.irradiance.take() {
            device.destroy_cubemap(old);
        }
        record.cubemap = Some(radiance_handle);
        record.irradiance = Some(irradiance_handle);
        record.dirty = false;

        log::debug!(
            "baked probe {key:?} at {}x{} in {:.1} ms",
            self.capture_resolution,
            self.capture_resolution,
            stopwatch.elapsed_millis()
        );
        Ok(())
    }

    /// Bake every registered probe marked dirty, in registration order
    ///
    /// Individual failures are logged and skipped; returns the number of
    /// probes actually baked.
    pub fn bake_probes(
        &self,
        device: &mut dyn GfxDevice,
        capture: &mut dyn SceneCapture,
        registry: &mut ProbeRegistry,
    ) -> usize {
        let dirty: Vec<ProbeKey> = registry
            .registered()
            .filter(|(key, _)| registry.get(*key).is_some_and(|r| r.dirty))
            .map(|(key, _)| key)
            .collect();
        if dirty.is_empty() {
            return 0;
        }

        let stopwatch = Stopwatch::start_new();
        let mut baked = 0;
        for key in dirty {
            match self.bake_probe(device, capture, registry, key) {
                Ok(()) => baked += 1,
                Err(err) => log::warn!("probe bake failed for {key:?}: {err}"),
            }
        }
        log::info!(
            "baked {baked} probe(s) in {:.1} ms",
            stopwatch.elapsed_millis()
        );
        baked
    }
}

// Upload a cubemap with a full mip chain, box-filtering each level on the
// CPU. Destroys the cubemap again if any face upload fails.
fn upload_with_mip_chain(
    device: &mut dyn GfxDevice,
    cubemap: &CpuCubemap,
) -> GfxResult<CubemapHandle> {
    let desc = CubemapDesc::with_mip_chain(cubemap.resolution());
    let handle = device.create_cubemap(&desc)?;
    let result = (|| {
        for face in CubemapFace::ALL {
            let mut texels = cubemap.face(face).texels().to_vec();
            let mut resolution = cubemap.resolution();
            device.upload_cubemap_face(handle, face, 0, &texels)?;
            for mip in 1..desc.mip_count {
                texels = downsample(&texels, resolution);
                resolution = (resolution / 2).max(1);
                device.upload_cubemap_face(handle, face, mip, &texels)?;
            }
        }
        Ok(())
    })();
    match result {
        Ok(()) => Ok(handle),
        Err(err) => {
            device.destroy_cubemap(handle);
            Err(err)
        }
    }
}

// Upload a single-mip cubemap, destroying it again on upload failure.
fn upload_flat(device: &mut dyn GfxDevice, cubemap: &CpuCubemap) -> GfxResult<CubemapHandle> {
    let desc = CubemapDesc {
        resolution: cubemap.resolution(),
        mip_count: 1,
    };
    let handle = device.create_cubemap(&desc)?;
    for face in CubemapFace::ALL {
        if let Err(err) = device.upload_cubemap_face(handle, face, 0, cubemap.face(face).texels())
        {
            device.destroy_cubemap(handle);
            return Err(err);
        }
    }
    Ok(handle)
}

// 2x2 box filter over RGBA texels; `resolution` is the source edge length.
fn downsample(texels: &[f32], resolution: u32) -> Vec<f32> {
    let src = resolution as usize;
    let dst = (src / 2).max(1);
    let mut out = Vec::with_capacity(dst * dst * 4);
    for y in 0..dst {
        for x in 0..dst {
            let mut sum = [0.0_f32; 4];
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let sx = (x * 2 + dx).min(src - 1);
                let sy = (y * 2 + dy).min(src - 1);
                let idx = (sy * src + sx) * 4;
                for c in 0..4 {
                    sum[c] += texels[idx + c];
                }
            }
            out.extend_from_slice(&[sum[0] / 4.0, sum[1] / 4.0, sum[2] / 4.0, sum[3] / 4.0]);
        }
    }
    out
}
