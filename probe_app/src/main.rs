//! Headless reflection probe demo
//!
//! Exercises the whole probe pipeline against the in-memory device:
//! - Bakes a ring of sphere probes, a box probe and a skylight against the
//!   synthetic sky capture
//! - Orbits a camera and re-runs per-frame selection
//! - Submits draws each frame and lets the manager bind probe constants
//!
//! The same scene runs twice, once on a device with cubemap-array support
//! and once without, so both shading paths show up in the log. Pass a
//! config path (`.ron` or `.toml`) as the first argument to override the
//! defaults.

use std::f32::consts::TAU;

use probe_engine::capture::GradientSkyCapture;
use probe_engine::foundation::logging;
use probe_engine::gfx::null::{NullConstantBuffer, NullGfxDevice};
use probe_engine::prelude::*;

// Scene layout
const RING_PROBES: usize = 6;
const RING_RADIUS: f32 = 18.0;
const PROBE_INFLUENCE: f32 = 9.0;

// Simulated camera orbit
const FRAME_COUNT: u32 = 120;
const ORBIT_RADIUS: f32 = 25.0;

// What the demo's stand-in material shader declares
const SHADER_UNIFORMS: &[&str] = &[
    "probeCount",
    "probePositions",
    "probeRefPositions",
    "probeRefScales",
    "probeWorldToLocal",
    "probeBoxMin",
    "probeBoxMax",
    "probeConfig",
    "skylightCubemapIdx",
    "probeCubemap0",
    "probeCubemap1",
    "probeCubemap2",
    "probeCubemap3",
    "probeIrradiance0",
    "probeIrradiance1",
    "probeIrradiance2",
    "probeIrradiance3",
    "probeCubemapArray",
    "probeIrradianceArray",
];

struct ProbeDemoApp {
    device: NullGfxDevice,
    capture: GradientSkyCapture,
    manager: ProbeManager,
    shader: ShaderId,
}

impl ProbeDemoApp {
    fn new(config: ProbeSystemConfig, mut device: NullGfxDevice) -> Self {
        let shader = device.register_shader(SHADER_UNIFORMS);
        Self {
            manager: ProbeManager::new(config),
            capture: GradientSkyCapture::default(),
            device,
            shader,
        }
    }

    fn populate_scene(&mut self) {
        for i in 0..RING_PROBES {
            let angle = i as f32 / RING_PROBES as f32 * TAU;
            let mut probe = ProbeRecord::sphere(
                Vec3::new(angle.cos() * RING_RADIUS, 2.0, angle.sin() * RING_RADIUS),
                PROBE_INFLUENCE,
            );
            probe.priority = 1.0;
            self.manager.add_probe(probe);
        }

        // The hall in the middle gets a box volume with a parallax anchor
        let mut hall = ProbeRecord::box_volume(Aabb::new(
            Vec3::new(-6.0, 0.0, -10.0),
            Vec3::new(6.0, 8.0, 10.0),
        ));
        hall.priority = 2.0;
        hall.ref_offset = Vec3::new(0.0, -2.0, 0.0);
        self.manager.add_probe(hall);

        self.manager.add_probe(ProbeRecord::skylight());
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.populate_scene();
        let baked = self.manager.bake_probes(&mut self.device, &mut self.capture);
        log::info!(
            "baked {baked} probe(s), {} cubemap(s) live",
            self.device.live_cubemap_count()
        );

        self.manager.set_render_reflection_probes(true);
        for frame in 0..FRAME_COUNT {
            let angle = frame as f32 / FRAME_COUNT as f32 * TAU;
            let eye = Vec3::new(angle.cos() * ORBIT_RADIUS, 4.0, angle.sin() * ORBIT_RADIUS);
            let view = ViewInfo::new(eye, (-eye).normalize());
            self.manager.update_probes(&mut self.device, &view);

            // One draw near the hall, one out by the ring
            for target in [Vec3::new(0.0, 1.0, 0.0), eye * 0.8] {
                let mut buffer = NullConstantBuffer::new();
                let submission = DrawSubmission {
                    shader: self.shader,
                    world_position: target,
                };
                self.manager
                    .set_probe_info(&mut self.device, &submission, &mut buffer)?;
            }

            if frame % 30 == 0 {
                log::info!(
                    "frame {frame}: {} selected, {} placed on the {:?} path, {} debug shape(s)",
                    self.manager.selected_keys().len(),
                    self.manager.effective_probe_count(),
                    self.manager.shading_path(),
                    self.manager.debug_shapes().len()
                );
            }
        }

        self.manager.release_resources(&mut self.device);
        log::info!(
            "released resources: {} cubemap(s), {} array(s) left",
            self.device.live_cubemap_count(),
            self.device.live_array_count()
        );
        Ok(())
    }
}

fn load_config() -> ProbeSystemConfig {
    match std::env::args().nth(1) {
        Some(path) => match ProbeSystemConfig::load_from_file(&path) {
            Ok(config) => {
                log::info!("loaded probe config from {path}");
                config
            }
            Err(err) => {
                log::warn!("failed to load {path}: {err}; using defaults");
                ProbeSystemConfig::default()
            }
        },
        None => ProbeSystemConfig::default(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    log::info!("starting probe demo");

    let config = load_config();
    let mut app = ProbeDemoApp::new(config.clone(), NullGfxDevice::new());
    app.run()?;

    // Same scene again without cubemap arrays to show the forward path
    log::info!("re-running on a forward-only device");
    let mut forward = ProbeDemoApp::new(
        config,
        NullGfxDevice::with_capabilities(GfxCapabilities::empty()),
    );
    forward.run()?;

    log::info!("probe demo completed");
    Ok(())
}
