//! Selection and ordering behavior through the manager
//!
//! Each test runs full update cycles and checks which probes end up
//! selected, in what order, and how skylights interact with the cap.

use crate::capture::GradientSkyCapture;
use crate::config::{ProbeSystemConfig, ScorerKind};
use crate::foundation::math::Vec3;
use crate::gfx::null::NullGfxDevice;
use crate::probes::manager::ProbeManager;
use crate::probes::record::ProbeRecord;
use crate::probes::scoring::ViewInfo;
use crate::probes::MAX_PROBE_COUNT;

fn small_config() -> ProbeSystemConfig {
    ProbeSystemConfig {
        capture_resolution: 8,
        irradiance_resolution: 4,
        irradiance_samples: 8,
        ..ProbeSystemConfig::default()
    }
}

fn priority_sphere(x: f32, priority: f32) -> ProbeRecord {
    let mut record = ProbeRecord::sphere(Vec3::new(x, 0.0, 0.0), 4.0);
    record.priority = priority;
    record
}

fn origin_view() -> ViewInfo {
    ViewInfo::from_origin(Vec3::zeros())
}

#[test]
fn test_priority_ordering_places_skylight_last() {
    let mut manager = ProbeManager::new(ProbeSystemConfig {
        scorer: ScorerKind::PriorityOnly,
        ..small_config()
    });
    let mut device = NullGfxDevice::new();
    let mut capture = GradientSkyCapture::default();

    let a = manager.add_probe(priority_sphere(1.0, 10.0));
    let b = manager.add_probe(priority_sphere(2.0, 5.0));
    let mut sky = ProbeRecord::skylight();
    sky.priority = 0.0;
    let c = manager.add_probe(sky);

    assert_eq!(manager.bake_probes(&mut device, &mut capture), 3);
    manager.update_probes(&mut device, &origin_view());

    // Scores 10, 5, 0 give a fixed descending order, skylight trailing
    assert_eq!(manager.selected_keys(), &[a, b, c]);
    assert_eq!(manager.frame_data().keys(), &[a, b, c]);
}

#[test]
fn test_identical_updates_produce_identical_ordering() {
    let mut manager = ProbeManager::new(small_config());
    let mut device = NullGfxDevice::new();
    let mut capture = GradientSkyCapture::default();

    // Six probes on the axes: distances are all exactly 10, so every score
    // ties and only the registration sequence can order them.
    let positions = [
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(-10.0, 0.0, 0.0),
        Vec3::new(0.0, 10.0, 0.0),
        Vec3::new(0.0, -10.0, 0.0),
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
    ];
    for position in positions {
        let mut record = ProbeRecord::sphere(position, 4.0);
        record.priority = 1.0;
        manager.add_probe(record);
    }
    manager.bake_probes(&mut device, &mut capture);

    manager.update_probes(&mut device, &origin_view());
    let first = manager.frame_data().keys().to_vec();
    assert_eq!(first.len(), 6);

    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.frame_data().keys(), first.as_slice());

    let registered: Vec<_> = manager.registry().registered().map(|(k, _)| k).collect();
    assert_eq!(first, registered);
}

#[test]
fn test_skylight_displaces_weakest_probe_at_capacity() {
    let mut manager = ProbeManager::new(ProbeSystemConfig {
        max_probes: 4,
        scorer: ScorerKind::PriorityOnly,
        ..small_config()
    });
    let mut device = NullGfxDevice::new();

    let strong: Vec<_> = (0..4)
        .map(|i| manager.add_probe(priority_sphere(i as f32, (4 - i) as f32)))
        .collect();
    let mut sky = ProbeRecord::skylight();
    sky.priority = 0.0;
    let sky = manager.add_probe(sky);

    manager.update_probes(&mut device, &origin_view());

    let selected = manager.selected_keys();
    assert_eq!(selected.len(), 4);
    assert!(selected.contains(&sky), "skylight must always ship");
    assert!(
        !selected.contains(&strong[3]),
        "the lowest-priority probe gives up its slot"
    );
    assert_eq!(&selected[..3], &strong[..3]);
}

#[test]
fn test_registration_clamps_to_probe_limit() {
    let mut manager = ProbeManager::new(small_config());
    let mut device = NullGfxDevice::new();

    let mut keys = Vec::new();
    for i in 0..=MAX_PROBE_COUNT {
        keys.push(manager.add_probe(priority_sphere(i as f32, 1.0)));
    }
    assert_eq!(manager.registry().registered_count(), MAX_PROBE_COUNT);
    assert_eq!(manager.registry().len(), MAX_PROBE_COUNT + 1);

    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.selected_keys().len(), MAX_PROBE_COUNT);
    assert!(!manager.selected_keys().contains(&keys[MAX_PROBE_COUNT]));
}

#[test]
fn test_unregistered_probe_disappears_from_frame() {
    let mut manager = ProbeManager::new(small_config());
    let mut device = NullGfxDevice::new();
    let mut capture = GradientSkyCapture::default();

    let a = manager.add_probe(priority_sphere(1.0, 1.0));
    let b = manager.add_probe(priority_sphere(2.0, 1.0));
    manager.bake_probes(&mut device, &mut capture);
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.frame_data().keys(), &[a, b]);

    manager.unregister_probe(a);
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.frame_data().keys(), &[b]);
    assert!(
        manager.probe(a).unwrap().is_baked(),
        "unregistration keeps the record and its captures"
    );

    // Re-registering puts it straight back without a rebake
    assert!(manager.register_probe(a));
    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.frame_data().keys(), &[a, b]);
}

#[test]
fn test_view_motion_reorders_frame_arrays() {
    let mut manager = ProbeManager::new(small_config());
    let mut device = NullGfxDevice::new();
    let mut capture = GradientSkyCapture::default();

    let near = manager.add_probe(priority_sphere(5.0, 1.0));
    let far = manager.add_probe(priority_sphere(200.0, 1.0));
    manager.bake_probes(&mut device, &mut capture);

    manager.update_probes(&mut device, &origin_view());
    assert_eq!(manager.frame_data().keys(), &[near, far]);

    manager.update_probes(
        &mut device,
        &ViewInfo::from_origin(Vec3::new(200.0, 0.0, 0.0)),
    );
    assert_eq!(manager.frame_data().keys(), &[far, near]);
}

#[test]
fn test_adding_an_added_probe_key_changes_nothing() {
    let mut manager = ProbeManager::new(small_config());
    let key = manager.add_probe(priority_sphere(0.0, 1.0));

    assert!(manager.register_probe(key));
    assert!(manager.register_probe(key));
    assert_eq!(manager.registry().registered_count(), 1);
    assert_eq!(manager.registry().len(), 1);
}
