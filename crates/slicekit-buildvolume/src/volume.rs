//! The build volume and its derived state.
//!
//! A [`BuildVolume`] holds a [`VolumeSettings`] snapshot and everything
//! derived from it: size, disallowed areas, raft thickness, Z clearance and
//! the printable bounding box. It is driven from outside; see
//! [`crate::debounce`] for the setting-change plumbing.

use parking_lot::RwLock;
use std::sync::Arc;

use slicekit_core::{
    AppEvent, BoundingBox3D, BuildVolumeEvent, EventBus, GeometryError, NodeId, Polygon2D, Scene,
    Vec3,
};
use slicekit_settings::ProfileStore;

use crate::disallowed::{self, DisallowedAreas};
use crate::settings::{ChangeGroups, MachineShape, VolumeSettings};

/// Bottom used for boundary checks; objects may sink through the plate
const BOUNDARY_CHECK_BOTTOM: f32 = -9001.0;

/// Lifecycle of the derived state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    /// No profile has been loaded yet.
    Uninitialized,
    /// Derived state matches the snapshot.
    Ready,
    /// Something changed since the last rebuild.
    Dirty,
}

/// Build volume shared between the debouncer and its users
pub type SharedBuildVolume = Arc<RwLock<BuildVolume>>;

/// Printable space of the configured machine
#[derive(Debug)]
pub struct BuildVolume {
    bus: Option<Arc<EventBus>>,
    state: VolumeState,
    settings: Option<VolumeSettings>,
    width: f32,
    height: f32,
    depth: f32,
    shape: MachineShape,
    root_printable_count: usize,
    edge_disallowed_size: f32,
    areas: DisallowedAreas,
    raft_thickness: f32,
    extra_z_clearance: f32,
    bounding_box: Option<BoundingBox3D>,
    maximum_scale_bounds: Option<BoundingBox3D>,
    origin: Vec3,
    pending: Vec<String>,
}

impl Default for BuildVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildVolume {
    pub fn new() -> Self {
        Self {
            bus: None,
            state: VolumeState::Uninitialized,
            settings: None,
            width: 0.0,
            height: 0.0,
            depth: 0.0,
            shape: MachineShape::Rectangular,
            root_printable_count: 0,
            edge_disallowed_size: 0.0,
            areas: DisallowedAreas::default(),
            raft_thickness: 0.0,
            extra_z_clearance: 0.0,
            bounding_box: None,
            maximum_scale_bounds: None,
            origin: Vec3::ZERO,
            pending: Vec::new(),
        }
    }

    /// Publish rebuild and raft events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn into_shared(self) -> SharedBuildVolume {
        Arc::new(RwLock::new(self))
    }

    /// Take a fresh snapshot of `profile` and rebuild
    pub fn load_profile(&mut self, profile: &ProfileStore) {
        self.settings = Some(VolumeSettings::from_profile(profile));
        self.pending.clear();
        self.rebuild();
    }

    /// Record a changed setting; the volume stays dirty until the change is
    /// applied
    pub fn setting_changed(&mut self, name: &str) {
        if !self.pending.iter().any(|n| n == name) {
            self.pending.push(name.to_string());
        }
        self.mark_dirty(name);
    }

    /// Names recorded since the last rebuild, in arrival order
    pub fn pending_changes(&self) -> &[String] {
        &self.pending
    }

    /// Apply every change recorded with [`BuildVolume::setting_changed`]
    pub fn apply_pending(&mut self, profile: &ProfileStore) -> bool {
        let names = std::mem::take(&mut self.pending);
        self.apply_setting_changes(profile, &names)
    }

    /// React to a batch of changed setting names.
    ///
    /// Returns true when the volume was rebuilt. Names that affect nothing
    /// here only refresh the snapshot.
    pub fn apply_setting_changes(&mut self, profile: &ProfileStore, names: &[String]) -> bool {
        if self.settings.is_none() {
            self.load_profile(profile);
            return true;
        }
        self.settings = Some(VolumeSettings::from_profile(profile));
        self.pending.retain(|pending| !names.contains(pending));

        let groups = names
            .iter()
            .map(|name| ChangeGroups::classify(name))
            .fold(ChangeGroups::default(), ChangeGroups::merge);
        tracing::debug!("Applying {} setting change(s): {:?}", names.len(), groups);

        if groups.any() {
            self.rebuild();
            true
        } else {
            if self.pending.is_empty() && self.state == VolumeState::Dirty {
                self.state = VolumeState::Ready;
            }
            false
        }
    }

    /// Count root-level printable nodes; a group counts once.
    ///
    /// A change matters for the one-at-a-time height limit, so it marks the
    /// volume dirty as if `print_sequence` had changed. Returns true when
    /// the count changed.
    pub fn update_root_printable_count(&mut self, scene: &Scene) -> bool {
        let count = scene.printable_root_count();
        if count == self.root_printable_count {
            return false;
        }
        self.root_printable_count = count;
        self.setting_changed("print_sequence");
        true
    }

    /// Scene edited: refresh the object count, rebuild if needed and
    /// re-check every node
    pub fn on_scene_changed(&mut self, scene: &mut Scene) {
        if self.update_root_printable_count(scene) && self.settings.is_some() {
            self.pending.retain(|n| n != "print_sequence");
            self.rebuild();
        }
        self.update_node_boundary_check(scene);
    }

    fn mark_dirty(&mut self, reason: &str) {
        if self.state != VolumeState::Ready {
            return;
        }
        self.state = VolumeState::Dirty;
        self.publish(BuildVolumeEvent::Dirty {
            reason: reason.to_string(),
        });
    }

    /// Recompute all derived state from the current snapshot.
    ///
    /// Without a loaded profile, or with a zero-sized machine, this is a
    /// no-op.
    pub fn rebuild(&mut self) {
        let Some(settings) = self.settings.as_ref() else {
            tracing::debug!("Build volume rebuild skipped: no profile loaded");
            return;
        };

        let width = settings.machine_width;
        let depth = settings.machine_depth;
        let height = if settings.one_at_a_time && self.root_printable_count > 1 {
            settings.gantry_height.min(settings.machine_height)
        } else {
            settings.machine_height
        };
        if width <= 0.0 || depth <= 0.0 || height <= 0.0 {
            tracing::debug!(
                "Build volume rebuild skipped: machine size {}x{}x{}",
                width,
                depth,
                height
            );
            return;
        }
        if height < self.height && self.state != VolumeState::Uninitialized {
            tracing::info!(
                "Build volume height reduced to {:.1} mm for one-at-a-time printing",
                height
            );
        }

        let edge = disallowed::edge_disallowed_size(settings);
        let areas = disallowed::compute(settings, edge);
        let raft = disallowed::raft_thickness(settings);
        let extra_z = disallowed::extra_z_clearance(settings);

        let (half_w, half_d) = (width / 2.0, depth / 2.0);
        let top = height - raft - extra_z;
        self.origin = if settings.center_is_zero {
            Vec3::ZERO
        } else {
            Vec3::new(-half_w, 0.0, half_d)
        };
        self.bounding_box = Some(BoundingBox3D::new(
            Vec3::new(-half_w, -1.0, -half_d),
            Vec3::new(half_w, top, half_d),
        ));
        self.maximum_scale_bounds = Some(BoundingBox3D::new(
            Vec3::new(-half_w + edge + 1.0, 0.0, -half_d + edge + 1.0),
            Vec3::new(half_w - edge - 1.0, top, half_d - edge - 1.0),
        ));

        self.width = width;
        self.depth = depth;
        self.height = height;
        self.shape = settings.shape;
        self.edge_disallowed_size = edge;
        self.areas = areas;
        self.extra_z_clearance = extra_z;
        self.state = VolumeState::Ready;

        if raft != self.raft_thickness {
            self.raft_thickness = raft;
            tracing::debug!("Raft thickness changed to {:.3} mm", raft);
            self.publish(BuildVolumeEvent::RaftThicknessChanged { thickness: raft });
        }

        tracing::debug!(
            "Build volume rebuilt: {}x{}x{} {:?}, edge {:.2}, {} disallowed areas",
            width,
            depth,
            height,
            self.shape,
            edge,
            self.areas.areas.len()
        );
        self.publish(BuildVolumeEvent::Rebuilt {
            disallowed_areas: self.areas.areas.len(),
            has_errors: self.has_errors(),
        });
    }

    /// Set `outside_build_area` on every node.
    ///
    /// A group is outside when any of its children is, and its children
    /// then take the group's flag.
    pub fn update_node_boundary_check(&self, scene: &mut Scene) {
        let Some(bounds) = self.boundary_check_box() else {
            return;
        };

        let ids: Vec<NodeId> = scene.ids().collect();
        for &id in &ids {
            self.check_node(scene, id, &bounds);
        }

        for &id in &ids {
            let Some(children) = scene
                .node(id)
                .filter(|node| node.is_group())
                .map(|node| node.children().to_vec())
            else {
                continue;
            };
            let child_outside = children
                .iter()
                .any(|&c| scene.node(c).is_some_and(|n| n.outside_build_area));
            let outside = child_outside || scene.node(id).is_some_and(|n| n.outside_build_area);
            scene.set_outside_build_area(id, outside);
            for child in children {
                scene.set_outside_build_area(child, outside);
            }
        }
    }

    /// Check a single node against `bounds`, or the current volume
    pub fn check_bounds_and_update(&self, scene: &mut Scene, id: NodeId, bounds: Option<BoundingBox3D>) {
        let Some(bounds) = bounds.or_else(|| self.boundary_check_box()) else {
            return;
        };
        self.check_node(scene, id, &bounds);
    }

    fn boundary_check_box(&self) -> Option<BoundingBox3D> {
        self.settings.as_ref()?;
        self.bounding_box
            .map(|bbox| bbox.with_bottom(BOUNDARY_CHECK_BOTTOM))
    }

    fn check_node(&self, scene: &mut Scene, id: NodeId, bounds: &BoundingBox3D) {
        let outside = match self.node_outside_reason(scene, id, bounds) {
            Some(reason) => {
                tracing::trace!("{}", reason);
                true
            }
            None => false,
        };
        scene.set_outside_build_area(id, outside);
    }

    fn node_outside_reason(&self, scene: &Scene, id: NodeId, bounds: &BoundingBox3D) -> Option<GeometryError> {
        let node = scene.node(id)?;
        let bbox = scene.bounding_box(id)?;
        let outside = Some(GeometryError::ObjectOutsideVolume { node: id.0 });

        if !bounds.contains_box(&bbox) {
            return outside;
        }

        let footprint = Polygon2D::rectangle(bbox.left(), bbox.back(), bbox.right(), bbox.front());
        if self
            .areas
            .areas
            .iter()
            .any(|area| footprint.intersects_polygon(area).is_some())
        {
            return outside;
        }

        let parent_is_group = node
            .parent()
            .and_then(|p| scene.node(p))
            .is_some_and(|p| p.is_group());
        if bbox.top() < 0.0 && !parent_is_group {
            return outside;
        }

        let extruder_enabled = self
            .settings
            .as_ref()
            .is_some_and(|s| s.is_extruder_enabled(node.extruder));
        if !node.is_group() && !extruder_enabled {
            return outside;
        }
        None
    }

    fn publish(&self, event: BuildVolumeEvent) {
        if let Some(bus) = &self.bus {
            if bus.publish(AppEvent::BuildVolume(event)).is_err() {
                tracing::trace!("Build volume event had no subscribers");
            }
        }
    }

    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// Snapshot the volume was last built from
    pub fn settings(&self) -> Option<&VolumeSettings> {
        self.settings.as_ref()
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn shape(&self) -> MachineShape {
        self.shape
    }

    /// Margin by which the platform shrinks on every side
    pub fn edge_disallowed_size(&self) -> f32 {
        self.edge_disallowed_size
    }

    pub fn disallowed_areas(&self) -> &[Polygon2D] {
        &self.areas.areas
    }

    /// Disallowed areas without adhesion margins
    pub fn disallowed_areas_no_brim(&self) -> &[Polygon2D] {
        &self.areas.no_brim
    }

    /// Prime tower areas that collided with another area
    pub fn error_areas(&self) -> &[Polygon2D] {
        &self.areas.errors
    }

    /// Collisions found by the last rebuild
    pub fn errors(&self) -> &[GeometryError] {
        &self.areas.collisions
    }

    pub fn has_errors(&self) -> bool {
        !self.areas.errors.is_empty()
    }

    pub fn raft_thickness(&self) -> f32 {
        self.raft_thickness
    }

    pub fn extra_z_clearance(&self) -> f32 {
        self.extra_z_clearance
    }

    /// Printable box, `None` before the first successful rebuild
    pub fn bounding_box(&self) -> Option<BoundingBox3D> {
        self.bounding_box
    }

    /// Largest box an object may be scaled to fill
    pub fn maximum_scale_bounds(&self) -> Option<BoundingBox3D> {
        self.maximum_scale_bounds
    }

    /// Machine origin marker in scene space
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// World position of the volume; lowered by the raft so models sit on it
    pub fn position(&self) -> Vec3 {
        Vec3::new(0.0, -self.raft_thickness, 0.0)
    }

    pub fn root_printable_count(&self) -> usize {
        self.root_printable_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicekit_core::{EventCategory, EventFilter};

    fn profile(pairs: &[(&str, &str)]) -> ProfileStore {
        let mut store = ProfileStore::new();
        for (k, v) in pairs {
            store.put_setting(k, v).expect("put");
        }
        store
    }

    fn cube(scene: &mut Scene, size: f32, x: f32, z: f32) -> NodeId {
        let id = scene.add_object("cube", BoundingBox3D::from_footprint(size, size, size));
        scene.translate(id, Vec3::new(x, 0.0, z));
        id
    }

    #[test]
    fn test_uninitialized_rebuild_is_noop() {
        let mut volume = BuildVolume::new();
        volume.rebuild();
        assert_eq!(volume.state(), VolumeState::Uninitialized);
        assert!(volume.bounding_box().is_none());
        assert!(volume.disallowed_areas().is_empty());
    }

    #[test]
    fn test_zero_size_machine_is_skipped() {
        let mut volume = BuildVolume::new();
        volume.load_profile(&profile(&[("machine_width", "0")]));
        assert_eq!(volume.state(), VolumeState::Uninitialized);
        assert!(volume.bounding_box().is_none());
    }

    #[test]
    fn test_bounding_box_and_origin() {
        let mut volume = BuildVolume::new();
        volume.load_profile(&profile(&[
            ("machine_width", "200"),
            ("machine_depth", "180"),
            ("machine_height", "150"),
            ("retraction_hop_enabled", "True"),
            ("retraction_hop", "1"),
        ]));
        assert_eq!(volume.state(), VolumeState::Ready);
        let bbox = volume.bounding_box().expect("built");
        assert_eq!(bbox.left(), -100.0);
        assert_eq!(bbox.front(), 90.0);
        assert_eq!(bbox.bottom(), -1.0);
        assert_eq!(bbox.top(), 149.0);
        assert_eq!(volume.origin(), Vec3::new(-100.0, 0.0, 90.0));

        let scale = volume.maximum_scale_bounds().expect("built");
        let edge = volume.edge_disallowed_size();
        assert!((scale.left() - (-100.0 + edge + 1.0)).abs() < 1e-4);
    }

    #[test]
    fn test_setting_changes_mark_dirty_until_applied() {
        let mut store = profile(&[]);
        let mut volume = BuildVolume::new();
        volume.load_profile(&store);

        store.put_setting("adhesion_type", "raft").expect("put");
        volume.setting_changed("adhesion_type");
        volume.setting_changed("adhesion_type");
        assert_eq!(volume.state(), VolumeState::Dirty);
        assert_eq!(volume.pending_changes(), ["adhesion_type".to_string()]);

        assert!(volume.apply_pending(&store));
        assert_eq!(volume.state(), VolumeState::Ready);
        assert!(volume.raft_thickness() > 0.0);
        assert!(volume.pending_changes().is_empty());
    }

    #[test]
    fn test_unrelated_change_does_not_rebuild() {
        let bus = Arc::new(EventBus::new());
        let rebuilds = Arc::new(parking_lot::Mutex::new(0usize));
        let counter = rebuilds.clone();
        bus.subscribe(EventFilter::Categories(vec![EventCategory::BuildVolume]), move |event| {
            if matches!(event, AppEvent::BuildVolume(BuildVolumeEvent::Rebuilt { .. })) {
                *counter.lock() += 1;
            }
        });

        let store = profile(&[]);
        let mut volume = BuildVolume::new().with_event_bus(bus);
        volume.load_profile(&store);
        volume.setting_changed("fill_density");
        assert!(!volume.apply_pending(&store));
        assert_eq!(volume.state(), VolumeState::Ready);
        assert_eq!(*rebuilds.lock(), 1);
    }

    #[test]
    fn test_one_at_a_time_height_clamp() {
        let store = profile(&[
            ("print_sequence", "one_at_a_time"),
            ("machine_height", "200"),
            ("gantry_height", "55"),
        ]);
        let mut volume = BuildVolume::new();
        volume.load_profile(&store);
        let mut scene = Scene::new();
        cube(&mut scene, 10.0, 0.0, 0.0);
        volume.on_scene_changed(&mut scene);
        assert_eq!(volume.height(), 200.0);

        let a = cube(&mut scene, 10.0, 30.0, 0.0);
        let b = cube(&mut scene, 10.0, -30.0, 0.0);
        volume.on_scene_changed(&mut scene);
        assert_eq!(volume.root_printable_count(), 3);
        assert_eq!(volume.height(), 55.0);

        // Grouping leaves two roots; still clamped.
        scene.add_group("pair", &[a, b]);
        volume.on_scene_changed(&mut scene);
        assert_eq!(volume.root_printable_count(), 2);
        assert_eq!(volume.height(), 55.0);
        assert_eq!(volume.state(), VolumeState::Ready);
    }

    #[test]
    fn test_boundary_check() {
        let mut volume = BuildVolume::new();
        volume.load_profile(&profile(&[
            ("machine_width", "200"),
            ("machine_depth", "200"),
            ("adhesion_type", "brim"),
        ]));

        let mut scene = Scene::new();
        let inside = cube(&mut scene, 20.0, 0.0, 0.0);
        let in_border = cube(&mut scene, 20.0, 87.0, 0.0);
        let beyond = cube(&mut scene, 20.0, 150.0, 0.0);
        let sunk = cube(&mut scene, 20.0, 0.0, 40.0);
        scene.translate(sunk, Vec3::new(0.0, -30.0, 0.0));
        let wrong_extruder = cube(&mut scene, 20.0, -40.0, 0.0);
        if let Some(node) = scene.node_mut(wrong_extruder) {
            node.extruder = 2;
        }

        volume.update_node_boundary_check(&mut scene);
        let outside = |id: NodeId| scene.node(id).is_some_and(|n| n.outside_build_area);
        assert!(!outside(inside));
        assert!(outside(in_border));
        assert!(outside(beyond));
        assert!(outside(sunk));
        assert!(outside(wrong_extruder));
    }

    #[test]
    fn test_group_takes_worst_child() {
        let mut volume = BuildVolume::new();
        volume.load_profile(&profile(&[("machine_width", "200"), ("machine_depth", "200")]));

        let mut scene = Scene::new();
        let good = cube(&mut scene, 10.0, 0.0, 0.0);
        let bad = cube(&mut scene, 10.0, 120.0, 0.0);
        let group = scene.add_group("group", &[good, bad]);

        volume.update_node_boundary_check(&mut scene);
        for id in [good, bad, group] {
            assert!(scene.node(id).is_some_and(|n| n.outside_build_area));
        }
    }

    #[test]
    fn test_check_bounds_with_explicit_box() {
        let mut volume = BuildVolume::new();
        volume.load_profile(&profile(&[]));
        let mut scene = Scene::new();
        let id = cube(&mut scene, 10.0, 0.0, 0.0);

        let tiny = BoundingBox3D::from_footprint(5.0, 5.0, 5.0);
        volume.check_bounds_and_update(&mut scene, id, Some(tiny));
        assert!(scene.node(id).is_some_and(|n| n.outside_build_area));
        volume.check_bounds_and_update(&mut scene, id, None);
        assert!(scene.node(id).is_some_and(|n| !n.outside_build_area));
    }
}
