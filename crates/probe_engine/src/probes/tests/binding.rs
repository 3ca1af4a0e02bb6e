//! Draw-time probe constant binding
//!
//! Drives `set_probe_info` against the null device on both shading paths
//! and inspects the recorded constant writes, including the cached-handle
//! behavior across shader reloads.

use approx::assert_relative_eq;

use crate::capture::GradientSkyCapture;
use crate::config::{ProbeSystemConfig, ScorerKind};
use crate::foundation::math::Vec3;
use crate::gfx::null::{ConstantValue, NullConstantBuffer, NullGfxDevice};
use crate::gfx::{GfxCapabilities, GfxDevice};
use crate::probes::manager::{DrawSubmission, ProbeManager, ShadingPath};
use crate::probes::record::ProbeRecord;
use crate::probes::scoring::ViewInfo;

// Every probe uniform a fully featured shader declares
const PROBE_UNIFORMS: &[&str] = &[
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

fn small_config() -> ProbeSystemConfig {
    ProbeSystemConfig {
        capture_resolution: 8,
        irradiance_resolution: 4,
        irradiance_samples: 8,
        ..ProbeSystemConfig::default()
    }
}

fn lit_sphere(x: f32) -> ProbeRecord {
    let mut record = ProbeRecord::sphere(Vec3::new(x, 0.0, 0.0), 4.0);
    record.priority = 1.0;
    record
}

fn origin_view() -> ViewInfo {
    ViewInfo::from_origin(Vec3::zeros())
}

#[test]
fn test_forward_path_binds_probes_nearest_the_draw() {
    let mut device = NullGfxDevice::with_capabilities(GfxCapabilities::empty());
    let mut capture = GradientSkyCapture::default();
    let mut manager = ProbeManager::new(small_config());

    let near = manager.add_probe(lit_sphere(1.0));
    let mid = manager.add_probe(lit_sphere(10.0));
    let far = manager.add_probe(lit_sphere(100.0));
    manager.bake_probes(&mut device, &mut capture);
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.shading_path(), ShadingPath::Forward);
    assert_eq!(manager.effective_probe_count(), 3);
    assert!(manager.frame_data().index_of(mid).is_some());

    let shader = device.register_shader(PROBE_UNIFORMS);
    let count_handle = device.resolve_constant(shader, "probeCount").unwrap();
    let cubemap0 = device.resolve_constant(shader, "probeCubemap0").unwrap();
    let positions_handle = device.resolve_constant(shader, "probePositions").unwrap();

    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::zeros(),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();

    assert_eq!(buffer.value(count_handle), Some(&ConstantValue::U32(3)));
    let near_cubemap = manager.probe(near).unwrap().cubemap.unwrap();
    assert_eq!(
        buffer.value(cubemap0),
        Some(&ConstantValue::Cubemap(near_cubemap))
    );

    // A draw at the far end gets the far probe in slot zero instead
    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::new(100.0, 0.0, 0.0),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();

    let far_cubemap = manager.probe(far).unwrap().cubemap.unwrap();
    assert_eq!(
        buffer.value(cubemap0),
        Some(&ConstantValue::Cubemap(far_cubemap))
    );
    match buffer.value(positions_handle) {
        Some(ConstantValue::Vec4Array(values)) => {
            assert_eq!(values.len(), 3);
            assert_relative_eq!(values[0][0], 100.0);
        }
        other => panic!("positions not written as a vec4 array: {other:?}"),
    }
}

#[test]
fn test_forward_limit_caps_bound_probes() {
    let mut device = NullGfxDevice::with_capabilities(GfxCapabilities::empty());
    let mut capture = GradientSkyCapture::default();
    let mut manager = ProbeManager::new(ProbeSystemConfig {
        max_forward_probes: 2,
        ..small_config()
    });

    for x in [1.0, 2.0, 3.0] {
        manager.add_probe(lit_sphere(x));
    }
    manager.bake_probes(&mut device, &mut capture);
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.effective_probe_count(), 3);

    let shader = device.register_shader(PROBE_UNIFORMS);
    let count_handle = device.resolve_constant(shader, "probeCount").unwrap();
    let cubemap1 = device.resolve_constant(shader, "probeCubemap1").unwrap();
    let cubemap2 = device.resolve_constant(shader, "probeCubemap2").unwrap();

    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::zeros(),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();

    assert_eq!(buffer.value(count_handle), Some(&ConstantValue::U32(2)));
    assert!(buffer.value(cubemap1).is_some());
    assert!(
        buffer.value(cubemap2).is_none(),
        "slots past the forward limit stay unbound"
    );
}

#[test]
fn test_skylight_is_exempt_from_the_distance_cut() {
    let mut device = NullGfxDevice::with_capabilities(GfxCapabilities::empty());
    let mut capture = GradientSkyCapture::default();
    let mut manager = ProbeManager::new(ProbeSystemConfig {
        max_forward_probes: 2,
        ..small_config()
    });

    let sky = manager.add_probe(ProbeRecord::skylight());
    manager.add_probe(lit_sphere(1.0));
    let near_draw = manager.add_probe(lit_sphere(3.0));
    manager.bake_probes(&mut device, &mut capture);
    manager.update_probes(&mut device, &origin_view());

    let shader = device.register_shader(PROBE_UNIFORMS);
    let count_handle = device.resolve_constant(shader, "probeCount").unwrap();
    let skylight_handle = device.resolve_constant(shader, "skylightCubemapIdx").unwrap();
    let cubemap0 = device.resolve_constant(shader, "probeCubemap0").unwrap();
    let cubemap1 = device.resolve_constant(shader, "probeCubemap1").unwrap();

    // The draw sits 1000 units from the skylight's origin; by distance the
    // two spheres would win both slots.
    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::new(1000.0, 0.0, 0.0),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();

    assert_eq!(buffer.value(count_handle), Some(&ConstantValue::U32(2)));
    assert_eq!(buffer.value(skylight_handle), Some(&ConstantValue::F32(0.0)));
    let sky_cubemap = manager.probe(sky).unwrap().cubemap.unwrap();
    let near_cubemap = manager.probe(near_draw).unwrap().cubemap.unwrap();
    assert_eq!(
        buffer.value(cubemap0),
        Some(&ConstantValue::Cubemap(sky_cubemap))
    );
    assert_eq!(
        buffer.value(cubemap1),
        Some(&ConstantValue::Cubemap(near_cubemap))
    );
}

#[test]
fn test_empty_frame_writes_count_zero_and_no_skylight() {
    let mut device = NullGfxDevice::with_capabilities(GfxCapabilities::empty());
    let mut manager = ProbeManager::new(small_config());

    // Registered but never baked: selected, yet nothing reaches the frame
    manager.add_probe(lit_sphere(1.0));
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.effective_probe_count(), 0);

    let shader = device.register_shader(PROBE_UNIFORMS);
    let count_handle = device.resolve_constant(shader, "probeCount").unwrap();
    let skylight_handle = device.resolve_constant(shader, "skylightCubemapIdx").unwrap();

    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::zeros(),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();

    assert_eq!(buffer.value(count_handle), Some(&ConstantValue::U32(0)));
    assert_eq!(buffer.value(skylight_handle), Some(&ConstantValue::F32(-1.0)));
    assert_eq!(buffer.write_count(), 2, "only count and skylight sentinel");
}

#[test]
fn test_array_path_without_arrays_writes_count_zero() {
    let mut device = NullGfxDevice::new();
    let mut manager = ProbeManager::new(small_config());
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.shading_path(), ShadingPath::CubemapArray);

    let shader = device.register_shader(PROBE_UNIFORMS);
    let count_handle = device.resolve_constant(shader, "probeCount").unwrap();
    let array_handle = device.resolve_constant(shader, "probeCubemapArray").unwrap();

    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::zeros(),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();

    assert_eq!(buffer.value(count_handle), Some(&ConstantValue::U32(0)));
    assert!(
        buffer.value(array_handle).is_none(),
        "no array binding without allocated arrays"
    );
}

#[test]
fn test_array_path_binds_arrays_and_skylight_layer() {
    let mut device = NullGfxDevice::new();
    let mut capture = GradientSkyCapture::default();
    let mut manager = ProbeManager::new(ProbeSystemConfig {
        scorer: ScorerKind::PriorityOnly,
        ..small_config()
    });

    let mut a = lit_sphere(1.0);
    a.priority = 5.0;
    manager.add_probe(a);
    let mut b = lit_sphere(2.0);
    b.priority = 3.0;
    manager.add_probe(b);
    let mut sky = ProbeRecord::skylight();
    sky.priority = 0.2;
    manager.add_probe(sky);

    manager.bake_probes(&mut device, &mut capture);
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.shading_path(), ShadingPath::CubemapArray);
    assert_eq!(manager.effective_probe_count(), 3);

    let shader = device.register_shader(PROBE_UNIFORMS);
    let count_handle = device.resolve_constant(shader, "probeCount").unwrap();
    let radiance_handle = device.resolve_constant(shader, "probeCubemapArray").unwrap();
    let irradiance_handle = device
        .resolve_constant(shader, "probeIrradianceArray")
        .unwrap();
    let skylight_handle = device.resolve_constant(shader, "skylightCubemapIdx").unwrap();
    let ref_positions_handle = device
        .resolve_constant(shader, "probeRefPositions")
        .unwrap();
    let cubemap0 = device.resolve_constant(shader, "probeCubemap0").unwrap();

    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::zeros(),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();

    let bindings = manager.array_bindings().unwrap();
    assert_eq!(buffer.value(count_handle), Some(&ConstantValue::U32(3)));
    assert_eq!(
        buffer.value(radiance_handle),
        Some(&ConstantValue::CubemapArray(bindings.radiance))
    );
    assert_eq!(
        buffer.value(irradiance_handle),
        Some(&ConstantValue::CubemapArray(bindings.irradiance))
    );
    // Lowest score puts the skylight in the last layer
    assert_eq!(buffer.value(skylight_handle), Some(&ConstantValue::F32(2.0)));
    match buffer.value(ref_positions_handle) {
        Some(ConstantValue::Vec4Array(values)) => assert_eq!(values.len(), 3),
        other => panic!("ref positions not written as a vec4 array: {other:?}"),
    }
    assert!(
        buffer.value(cubemap0).is_none(),
        "per-slot samplers are a forward-path concern"
    );
}

#[test]
fn test_shader_without_probe_uniforms_is_untouched() {
    let mut device = NullGfxDevice::new();
    let mut capture = GradientSkyCapture::default();
    let mut manager = ProbeManager::new(small_config());
    manager.add_probe(lit_sphere(1.0));
    manager.bake_probes(&mut device, &mut capture);
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.effective_probe_count(), 1);

    let shader = device.register_shader(&["modelViewProj", "diffuseMap"]);
    let mut buffer = NullConstantBuffer::new();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::zeros(),
    };
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();
    assert_eq!(buffer.write_count(), 0);
}

#[test]
fn test_shader_reload_requires_explicit_invalidation() {
    let mut device = NullGfxDevice::new();
    let mut capture = GradientSkyCapture::default();
    let mut manager = ProbeManager::new(small_config());
    manager.add_probe(lit_sphere(1.0));
    manager.bake_probes(&mut device, &mut capture);
    manager.update_probes(&mut device, &origin_view());

    let shader = device.register_shader(PROBE_UNIFORMS);
    let old_count = device.resolve_constant(shader, "probeCount").unwrap();
    let draw = DrawSubmission {
        shader,
        world_position: Vec3::zeros(),
    };

    let mut buffer = NullConstantBuffer::new();
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();
    assert!(buffer.value(old_count).is_some());

    // The reload hands out fresh handles, but the manager keeps writing
    // through its cached set until told otherwise.
    device.reload_shader(shader, PROBE_UNIFORMS);
    let new_count = device.resolve_constant(shader, "probeCount").unwrap();
    assert_ne!(old_count, new_count);

    let mut buffer = NullConstantBuffer::new();
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();
    assert!(buffer.value(old_count).is_some());
    assert!(buffer.value(new_count).is_none());

    manager.invalidate_shader(shader);
    let mut buffer = NullConstantBuffer::new();
    manager.set_probe_info(&mut device, &draw, &mut buffer).unwrap();
    assert!(buffer.value(new_count).is_some());
    assert!(buffer.value(old_count).is_none());
}
