//! Scene capture collaborator interface
//!
//! Baking a probe means rendering the scene six times from the probe's
//! position, once per cubemap face. That rasterization belongs to the host
//! engine's render pipeline; this module defines the narrow seam the baker
//! drives it through, plus the face/texel geometry shared with the CPU-side
//! irradiance convolution. [`GradientSkyCapture`] is a synthetic
//! implementation so tests and headless tools can bake without a scene.

use thiserror::Error;

use crate::foundation::math::Vec3;
use crate::gfx::CubemapFace;

/// Errors reported by a scene capture implementation
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture surface could not be allocated
    #[error("capture surface allocation failed: {0}")]
    SurfaceAllocation(String),

    /// The scene render itself failed
    #[error("scene render failed: {0}")]
    Render(String),

    /// The produced image does not match the requested resolution
    #[error("captured face is {actual}x{actual}, requested {requested}x{requested}")]
    WrongResolution {
        /// Resolution the caller asked for
        requested: u32,
        /// Resolution the implementation produced
        actual: u32,
    },
}

/// Parameters for capturing one probe's surroundings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureParams {
    /// World-space eye position (the probe's position)
    pub position: Vec3,
    /// Edge length of each captured face in texels
    pub resolution: u32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

/// One captured cubemap face as CPU-side RGBA f32 texels
#[derive(Debug, Clone, PartialEq)]
pub struct FaceImage {
    resolution: u32,
    texels: Vec<f32>,
}

impl FaceImage {
    /// Wrap raw texels, validating the RGBA texel count
    pub fn new(resolution: u32, texels: Vec<f32>) -> Result<Self, CaptureError> {
        if resolution == 0 {
            return Err(CaptureError::Render("zero-resolution face".to_string()));
        }
        let expected = resolution as usize * resolution as usize * 4;
        if texels.len() != expected {
            return Err(CaptureError::Render(format!(
                "face data holds {} floats, expected {expected}",
                texels.len()
            )));
        }
        Ok(Self { resolution, texels })
    }

    /// Create a face filled with a single RGBA color
    pub fn solid(resolution: u32, color: [f32; 4]) -> Self {
        let count = resolution as usize * resolution as usize;
        let mut texels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            texels.extend_from_slice(&color);
        }
        Self { resolution, texels }
    }

    /// Edge length in texels
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Raw RGBA texels, row-major
    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    /// One RGBA texel
    ///
    /// Coordinates outside the face are clamped to the edge.
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x.min(self.resolution - 1) as usize;
        let y = y.min(self.resolution - 1) as usize;
        let idx = (y * self.resolution as usize + x) * 4;
        [
            self.texels[idx],
            self.texels[idx + 1],
            self.texels[idx + 2],
            self.texels[idx + 3],
        ]
    }
}

/// World-space direction through the center of a face texel
///
/// Uses the standard cubemap convention: `u`/`v` run left-to-right and
/// top-to-bottom across the face, and the returned direction is normalized.
/// This is the exact inverse of [`CpuCubemap::sample`] face selection, so a
/// texel written through one is read back through the other.
///
/// [`CpuCubemap::sample`]: crate::probes::irradiance::CpuCubemap::sample
pub fn texel_direction(face: CubemapFace, x: u32, y: u32, resolution: u32) -> Vec3 {
    // Texel center in [-1, 1]
    let u = ((x as f32 + 0.5) / resolution as f32) * 2.0 - 1.0;
    let v = ((y as f32 + 0.5) / resolution as f32) * 2.0 - 1.0;

    let dir = match face {
        CubemapFace::PositiveX => Vec3::new(1.0, -v, -u),
        CubemapFace::NegativeX => Vec3::new(-1.0, -v, u),
        CubemapFace::PositiveY => Vec3::new(u, 1.0, v),
        CubemapFace::NegativeY => Vec3::new(u, -1.0, -v),
        CubemapFace::PositiveZ => Vec3::new(u, -v, 1.0),
        CubemapFace::NegativeZ => Vec3::new(-u, -v, -1.0),
    };
    dir.normalize()
}

/// Face and texel coordinates a world-space direction lands in
pub fn direction_to_texel(dir: Vec3, resolution: u32) -> (CubemapFace, u32, u32) {
    let ax = dir.x.abs();
    let ay = dir.y.abs();
    let az = dir.z.abs();

    // Major axis picks the face; the remaining components become uv
    let (face, u, v, ma) = if ax >= ay && ax >= az {
        if dir.x > 0.0 {
            (CubemapFace::PositiveX, -dir.z, -dir.y, ax)
        } else {
            (CubemapFace::NegativeX, dir.z, -dir.y, ax)
        }
    } else if ay >= az {
        if dir.y > 0.0 {
            (CubemapFace::PositiveY, dir.x, dir.z, ay)
        } else {
            (CubemapFace::NegativeY, dir.x, -dir.z, ay)
        }
    } else if dir.z > 0.0 {
        (CubemapFace::PositiveZ, dir.x, -dir.y, az)
    } else {
        (CubemapFace::NegativeZ, -dir.x, -dir.y, az)
    };

    let scale = if ma > 0.0 { 1.0 / ma } else { 0.0 };
    let tx = ((u * scale + 1.0) * 0.5 * resolution as f32) as u32;
    let ty = ((v * scale + 1.0) * 0.5 * resolution as f32) as u32;
    (face, tx.min(resolution - 1), ty.min(resolution - 1))
}

/// Renders the scene from a probe's position, one cubemap face at a time
///
/// Implemented by the host engine's render pipeline. The baker calls this
/// six times per probe with the standard face direction/up convention
/// ([`CubemapFace::direction`], [`CubemapFace::up`]) and a 90 degree field
/// of view. Implementations return CPU-side texels; GPU readback and
/// surface management stay on their side of the seam.
pub trait SceneCapture {
    /// Render one cubemap face and return its texels
    fn capture_face(
        &mut self,
        params: &CaptureParams,
        face: CubemapFace,
    ) -> Result<FaceImage, CaptureError>;
}

/// Synthetic sky-gradient capture for headless runs
///
/// Shades each texel purely by its view direction: ground color below the
/// horizon blending up to a zenith color. Deterministic, position
/// independent, and good enough to exercise the whole bake path in tests
/// and the demo.
#[derive(Debug, Clone)]
pub struct GradientSkyCapture {
    /// Color straight up
    pub zenith: [f32; 3],
    /// Color at the horizon
    pub horizon: [f32; 3],
    /// Color straight down
    pub ground: [f32; 3],
}

impl Default for GradientSkyCapture {
    fn default() -> Self {
        Self {
            zenith: [0.25, 0.45, 0.85],
            horizon: [0.75, 0.80, 0.90],
            ground: [0.20, 0.16, 0.12],
        }
    }
}

impl GradientSkyCapture {
    /// Color for a world-space view direction
    fn shade(&self, dir: Vec3) -> [f32; 4] {
        let t = dir.y.clamp(-1.0, 1.0);
        let (from, to, blend) = if t >= 0.0 {
            (self.horizon, self.zenith, t)
        } else {
            (self.horizon, self.ground, -t)
        };
        [
            from[0] + (to[0] - from[0]) * blend,
            from[1] + (to[1] - from[1]) * blend,
            from[2] + (to[2] - from[2]) * blend,
            1.0,
        ]
    }
}

impl SceneCapture for GradientSkyCapture {
    fn capture_face(
        &mut self,
        params: &CaptureParams,
        face: CubemapFace,
    ) -> Result<FaceImage, CaptureError> {
        if params.resolution == 0 {
            return Err(CaptureError::SurfaceAllocation(
                "zero capture resolution".to_string(),
            ));
        }
        let res = params.resolution;
        let mut texels = Vec::with_capacity(res as usize * res as usize * 4);
        for y in 0..res {
            for x in 0..res {
                let dir = texel_direction(face, x, y, res);
                texels.extend_from_slice(&self.shade(dir));
            }
        }
        FaceImage::new(res, texels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_texel_direction_roundtrip() {
        let res = 8;
        for face in CubemapFace::ALL {
            for y in 0..res {
                for x in 0..res {
                    let dir = texel_direction(face, x, y, res);
                    let (back_face, bx, by) = direction_to_texel(dir, res);
                    assert_eq!(back_face, face, "face mismatch at ({x},{y})");
                    assert_eq!((bx, by), (x, y), "texel mismatch on {face:?}");
                }
            }
        }
    }

    #[test]
    fn test_face_centers_point_along_axes() {
        // A 1x1 face has its single texel centered on the face axis
        let dir = texel_direction(CubemapFace::PositiveY, 0, 0, 1);
        assert_relative_eq!(dir.y, 1.0, epsilon = 1e-6);
        let dir = texel_direction(CubemapFace::NegativeZ, 0, 0, 1);
        assert_relative_eq!(dir.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_capture_is_view_dependent() {
        let mut capture = GradientSkyCapture::default();
        let params = CaptureParams {
            position: Vec3::zeros(),
            resolution: 4,
            near: 0.1,
            far: 100.0,
        };

        let up = capture.capture_face(&params, CubemapFace::PositiveY).unwrap();
        let down = capture.capture_face(&params, CubemapFace::NegativeY).unwrap();
        assert_eq!(up.resolution(), 4);

        // Sky should be brighter than ground in the blue channel
        let sky = up.texel(1, 1);
        let ground = down.texel(1, 1);
        assert!(sky[2] > ground[2]);

        // Deterministic across calls
        let again = capture.capture_face(&params, CubemapFace::PositiveY).unwrap();
        assert_eq!(up, again);
    }

    #[test]
    fn test_face_image_validates_length() {
        assert!(FaceImage::new(2, vec![0.0; 16]).is_ok());
        assert!(FaceImage::new(2, vec![0.0; 15]).is_err());
        let solid = FaceImage::solid(2, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(solid.texel(0, 1), [0.1, 0.2, 0.3, 1.0]);
    }
}
