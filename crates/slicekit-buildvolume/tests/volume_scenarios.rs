use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use slicekit_buildvolume::{BuildVolume, SettingDebouncer, VolumeState};
use slicekit_core::{
    AppEvent, BuildVolumeEvent, EventBus, EventCategory, EventFilter, GeometryError, Vec3,
};
use slicekit_settings::ProfileStore;

fn profile(pairs: &[(&str, &str)]) -> ProfileStore {
    let mut store = ProfileStore::new();
    for (k, v) in pairs {
        store.put_setting(k, v).expect("put");
    }
    store
}

fn volume_events(bus: &EventBus) -> Arc<Mutex<Vec<BuildVolumeEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    bus.subscribe(
        EventFilter::Categories(vec![EventCategory::BuildVolume]),
        move |event| {
            if let AppEvent::BuildVolume(e) = event {
                sink.lock().push(e);
            }
        },
    );
    events
}

#[test]
fn raft_lowers_the_volume() {
    let bus = Arc::new(EventBus::new());
    let events = volume_events(&bus);
    let mut volume = BuildVolume::new().with_event_bus(bus);
    volume.load_profile(&profile(&[
        ("adhesion_type", "raft"),
        ("raft_base_thickness", "0.3"),
        ("raft_interface_thickness", "0.2"),
        ("raft_surface_layers", "2"),
        ("raft_surface_thickness", "0.1"),
        ("raft_airgap", "0.3"),
        ("layer_0_z_overlap", "0.1"),
    ]));

    assert!((volume.raft_thickness() - 0.9).abs() < 1e-4);
    let position = volume.position();
    assert!((position.y + 0.9).abs() < 1e-4);
    assert_eq!((position.x, position.z), (0.0, 0.0));

    let top = volume.bounding_box().expect("built").top();
    assert!((top - (volume.height() - 0.9)).abs() < 1e-4);

    let events = events.lock();
    assert!(events
        .iter()
        .any(|e| matches!(e, BuildVolumeEvent::RaftThicknessChanged { thickness } if (thickness - 0.9).abs() < 1e-4)));
    assert!(matches!(events.last(), Some(BuildVolumeEvent::Rebuilt { has_errors: false, .. })));
}

#[test]
fn prime_tower_on_prime_blob_is_an_error() {
    let mut volume = BuildVolume::new();
    volume.load_profile(&profile(&[
        ("machine_width", "200"),
        ("machine_depth", "200"),
        ("extruder_amount", "2"),
        ("prime_tower_enable", "True"),
        ("prime_tower_size", "20"),
        ("prime_tower_position_x", "170"),
        ("prime_tower_position_y", "170"),
        ("prime_blob_enable", "True"),
        ("extruder_prime_pos_x", "170"),
        ("extruder_prime_pos_y", "170"),
    ]));

    assert!(volume.has_errors());
    let tower = volume.error_areas().first().expect("tower in errors");
    let (min, max) = tower.bounds().expect("bounds");
    assert!(((min.x + max.x) / 2.0 - 70.0).abs() < 1e-3);
    assert!(((min.y + max.y) / 2.0 + 70.0).abs() < 1e-3);

    // No disallowed area is tower sized.
    assert!(volume.disallowed_areas().iter().all(|area| {
        area.bounds()
            .is_some_and(|(lo, hi)| !((hi.x - lo.x - 20.0).abs() < 0.5 && (hi.y - lo.y - 20.0).abs() < 0.5))
    }));
    assert!(matches!(
        volume.errors().first(),
        Some(GeometryError::PrimeTowerCollision { .. })
    ));
}

#[test]
fn brim_border_is_seven_point_six() {
    let mut volume = BuildVolume::new();
    volume.load_profile(&profile(&[
        ("machine_width", "200"),
        ("machine_depth", "200"),
        ("adhesion_type", "brim"),
        ("brim_line_count", "20"),
        ("skirt_brim_line_width", "0.4"),
        ("initial_layer_line_width_factor", "100"),
    ]));
    assert!((volume.edge_disallowed_size() - 7.6).abs() < 1e-4);

    let (min, max) = volume.disallowed_areas()[0].bounds().expect("bounds");
    assert!((max.x - min.x - 7.6).abs() < 1e-4);
}

#[test]
fn rebuild_is_idempotent() {
    let store = profile(&[
        ("extruder_amount", "2"),
        ("extruder_enabled2", "True"),
        ("adhesion_type", "brim"),
        ("prime_tower_enable", "True"),
        ("machine_disallowed_areas", "[[[0, 0], [20, 0], [20, 20], [0, 20]]]"),
    ]);
    let mut volume = BuildVolume::new();
    volume.load_profile(&store);
    let first = volume.disallowed_areas().to_vec();
    let first_no_brim = volume.disallowed_areas_no_brim().to_vec();

    volume.rebuild();
    assert_eq!(volume.disallowed_areas(), first.as_slice());
    assert_eq!(volume.disallowed_areas_no_brim(), first_no_brim.as_slice());
}

#[test]
fn centred_machine_has_zero_origin() {
    let mut volume = BuildVolume::new();
    volume.load_profile(&profile(&[("machine_center_is_zero", "True")]));
    assert_eq!(volume.origin(), Vec3::ZERO);
}

#[tokio::test]
async fn debouncer_coalesces_setting_bursts() {
    let bus = Arc::new(EventBus::new());
    let profile = ProfileStore::new().with_event_bus(bus.clone()).into_shared();
    let volume = {
        let mut volume = BuildVolume::new().with_event_bus(bus.clone());
        volume.load_profile(&profile.read());
        volume.into_shared()
    };
    let events = volume_events(&bus);
    let debouncer = SettingDebouncer::spawn(
        bus.clone(),
        profile.clone(),
        volume.clone(),
        Duration::from_millis(20),
    );

    {
        let mut store = profile.write();
        store.put_setting("adhesion_type", "raft").expect("put");
        store.put_setting("raft_airgap", "0.5").expect("put");
        store.put_setting("raft_margin", "12").expect("put");
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(volume.read().state(), VolumeState::Dirty);

    tokio::time::sleep(Duration::from_millis(150)).await;
    {
        let volume = volume.read();
        assert_eq!(volume.state(), VolumeState::Ready);
        assert!(volume.raft_thickness() > 0.5);
        assert!((volume.edge_disallowed_size() - 12.0).abs() < 1e-4);
    }
    let rebuilds = events
        .lock()
        .iter()
        .filter(|e| matches!(e, BuildVolumeEvent::Rebuilt { .. }))
        .count();
    assert_eq!(rebuilds, 1);

    profile.write().reset_profile();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(volume.read().raft_thickness(), 0.0);

    debouncer.stop().await;
}

proptest! {
    #[test]
    fn border_vertices_stay_on_the_platform(
        width in 50.0f32..400.0,
        depth in 50.0f32..400.0,
        brim_lines in 0u32..40,
        elliptic in any::<bool>(),
    ) {
        let store = profile(&[
            ("machine_width", &width.to_string()),
            ("machine_depth", &depth.to_string()),
            ("adhesion_type", "brim"),
            ("brim_line_count", &brim_lines.to_string()),
            ("machine_shape", if elliptic { "elliptic" } else { "rectangular" }),
        ]);
        let mut volume = BuildVolume::new();
        volume.load_profile(&store);

        let (hw, hd) = (width / 2.0 + 1e-3, depth / 2.0 + 1e-3);
        for area in volume.disallowed_areas() {
            for p in area.points() {
                prop_assert!(p.x.abs() <= hw && p.y.abs() <= hd, "{:?} outside {}x{}", p, width, depth);
            }
        }
    }
}
