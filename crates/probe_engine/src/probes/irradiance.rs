//! CPU irradiance convolution
//!
//! Derives a low-resolution diffuse irradiance cubemap from a captured
//! radiance cubemap by cosine-hemisphere Monte Carlo integration. Runs
//! entirely on the CPU so bakes work on any device, including the null
//! one. The sample pattern is a fixed Hammersley sequence, so convolving
//! the same input twice produces bit-identical output.

use crate::capture::{direction_to_texel, texel_direction, CaptureError, FaceImage};
use crate::foundation::math::Vec3;
use crate::gfx::CubemapFace;

/// A whole cubemap held in CPU memory, one [`FaceImage`] per face
#[derive(Debug, Clone, PartialEq)]
pub struct CpuCubemap {
    resolution: u32,
    faces: [FaceImage; 6],
}

impl CpuCubemap {
    /// Assemble a cubemap from six equally sized faces in layer order
    pub fn from_faces(faces: [FaceImage; 6]) -> Result<Self, CaptureError> {
        let resolution = faces[0].resolution();
        for face in &faces[1..] {
            if face.resolution() != resolution {
                return Err(CaptureError::WrongResolution {
                    requested: resolution,
                    actual: face.resolution(),
                });
            }
        }
        Ok(Self { resolution, faces })
    }

    /// Edge length of each face in texels
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// One face of the cubemap
    pub fn face(&self, face: CubemapFace) -> &FaceImage {
        &self.faces[face.layer() as usize]
    }

    /// Nearest-texel radiance lookup along a direction
    pub fn sample(&self, dir: Vec3) -> [f32; 3] {
        let (face, x, y) = direction_to_texel(dir, self.resolution);
        let texel = self.face(face).texel(x, y);
        [texel[0], texel[1], texel[2]]
    }
}

// Van der Corput radical inverse, base 2
fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f32 * 2.328_306_4e-10 // 1 / 2^32
}

fn hammersley(i: u32, count: u32) -> (f32, f32) {
    (i as f32 / count as f32, radical_inverse_vdc(i))
}

// Cosine-weighted hemisphere directions in a local z-up frame
fn hemisphere_samples(count: u32) -> Vec<Vec3> {
    let mut samples = Vec::with_capacity(count as usize);
    for i in 0..count {
        let (u1, u2) = hammersley(i, count);
        let r = u1.sqrt();
        let phi = 2.0 * std::f32::consts::PI * u2;
        samples.push(Vec3::new(
            r * phi.cos(),
            r * phi.sin(),
            (1.0 - u1).sqrt(),
        ));
    }
    samples
}

fn orthonormal_basis(normal: Vec3) -> (Vec3, Vec3) {
    let up = if normal.z.abs() > 0.999 {
        Vec3::new(1.0, 0.0, 0.0)
    } else {
        Vec3::new(0.0, 0.0, 1.0)
    };
    let tangent = up.cross(&normal).normalize();
    let bitangent = normal.cross(&tangent);
    (tangent, bitangent)
}

fn convolve_face(
    source: &CpuCubemap,
    face: CubemapFace,
    resolution: u32,
    samples: &[Vec3],
) -> Result<FaceImage, CaptureError> {
    let mut texels = Vec::with_capacity(resolution as usize * resolution as usize * 4);
    for y in 0..resolution {
        for x in 0..resolution {
            let normal = texel_direction(face, x, y, resolution);
            let (tangent, bitangent) = orthonormal_basis(normal);

            let mut sum = [0.0_f32; 3];
            for s in samples {
                let dir = tangent * s.x + bitangent * s.y + normal * s.z;
                let radiance = source.sample(dir);
                sum[0] += radiance[0];
                sum[1] += radiance[1];
                sum[2] += radiance[2];
            }

            // Cosine importance sampling folds the cos term into the sample
            // distribution, so the plain average already is the diffuse
            // response: a uniform environment convolves to exactly itself.
            let inv = 1.0 / samples.len() as f32;
            texels.extend_from_slice(&[sum[0] * inv, sum[1] * inv, sum[2] * inv, 1.0]);
        }
    }
    FaceImage::new(resolution, texels)
}

/// Convolve a radiance cubemap into a diffuse irradiance cubemap
///
/// `sample_count` is clamped to at least one sample. The output resolution
/// is typically much smaller than the source; irradiance varies slowly.
pub fn convolve_irradiance(
    source: &CpuCubemap,
    resolution: u32,
    sample_count: u32,
) -> Result<CpuCubemap, CaptureError> {
    let samples = hemisphere_samples(sample_count.max(1));
    let faces = [
        convolve_face(source, CubemapFace::PositiveX, resolution, &samples)?,
        convolve_face(source, CubemapFace::NegativeX, resolution, &samples)?,
        convolve_face(source, CubemapFace::PositiveY, resolution, &samples)?,
        convolve_face(source, CubemapFace::NegativeY, resolution, &samples)?,
        convolve_face(source, CubemapFace::PositiveZ, resolution, &samples)?,
        convolve_face(source, CubemapFace::NegativeZ, resolution, &samples)?,
    ];
    CpuCubemap::from_faces(faces)
}
