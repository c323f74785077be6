//! Profile values the build volume depends on.
//!
//! [`VolumeSettings`] is read from the profile store in one go so the
//! geometry code never touches the store (or its lock) while computing.

use serde::{Deserialize, Serialize};
use slicekit_core::{Point2D, Polygon2D};
use slicekit_settings::ProfileStore;

/// Settings that change the machine outline
pub const MACHINE_SETTINGS: &[&str] = &[
    "machine_width",
    "machine_depth",
    "machine_height",
    "machine_shape",
    "machine_center_is_zero",
];

pub const SKIRT_SETTINGS: &[&str] = &[
    "adhesion_type",
    "skirt_gap",
    "skirt_line_count",
    "skirt_brim_line_width",
    "brim_line_count",
    "raft_margin",
    "draft_shield_enabled",
    "draft_shield_dist",
    "initial_layer_line_width_factor",
];

pub const RAFT_SETTINGS: &[&str] = &[
    "adhesion_type",
    "raft_base_thickness",
    "raft_interface_layers",
    "raft_interface_thickness",
    "raft_surface_layers",
    "raft_surface_thickness",
    "raft_airgap",
    "layer_0_z_overlap",
];

pub const EXTRA_Z_SETTINGS: &[&str] = &["retraction_hop_enabled", "retraction_hop"];

pub const PRIME_SETTINGS: &[&str] = &[
    "extruder_prime_pos_x",
    "extruder_prime_pos_y",
    "prime_blob_enable",
];

pub const TOWER_SETTINGS: &[&str] = &[
    "prime_tower_enable",
    "prime_tower_size",
    "prime_tower_position_x",
    "prime_tower_position_y",
    "prime_tower_brim_enable",
];

pub const OOZE_SHIELD_SETTINGS: &[&str] = &["ooze_shield_enabled", "ooze_shield_dist"];

pub const DISTANCE_SETTINGS: &[&str] = &[
    "infill_wipe_dist",
    "travel_avoid_distance",
    "support_offset",
    "support_enable",
    "travel_avoid_other_parts",
    "travel_avoid_supports",
];

/// Settings that change which extruders take part
pub const EXTRUDER_SETTINGS: &[&str] = &[
    "extruder_amount",
    "extruder_enabled",
    "adhesion_extruder_nr",
    "support_enable",
    "brim_line_count",
    "adhesion_type",
    "machine_disallowed_areas",
    "nozzle_disallowed_areas",
];

/// What a changed setting affects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeGroups {
    pub machine: bool,
    pub print_sequence: bool,
    pub disallowed_areas: bool,
    pub raft: bool,
    pub extra_z: bool,
}

impl ChangeGroups {
    /// Classify a setting name.
    ///
    /// Per-extruder variants (`retraction_hop2`, `extruder_offset_y1`, ...)
    /// are classified like their base name.
    pub fn classify(name: &str) -> Self {
        let base = base_name(name);
        let is_in = |group: &[&str]| group.contains(&name) || group.contains(&base);
        let disallowed = [
            SKIRT_SETTINGS,
            PRIME_SETTINGS,
            TOWER_SETTINGS,
            OOZE_SHIELD_SETTINGS,
            DISTANCE_SETTINGS,
            EXTRUDER_SETTINGS,
        ]
        .iter()
        .any(|group| is_in(group))
            || base.starts_with("extruder_offset_");

        Self {
            machine: is_in(MACHINE_SETTINGS),
            print_sequence: name == "print_sequence" || name == "gantry_height",
            disallowed_areas: disallowed,
            raft: is_in(RAFT_SETTINGS),
            extra_z: is_in(EXTRA_Z_SETTINGS),
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            machine: self.machine || other.machine,
            print_sequence: self.print_sequence || other.print_sequence,
            disallowed_areas: self.disallowed_areas || other.disallowed_areas,
            raft: self.raft || other.raft,
            extra_z: self.extra_z || other.extra_z,
        }
    }

    /// True when anything needs recomputing
    pub fn any(&self) -> bool {
        self.machine || self.print_sequence || self.disallowed_areas || self.raft || self.extra_z
    }
}

fn base_name(name: &str) -> &str {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Platform outline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineShape {
    #[default]
    Rectangular,
    Elliptic,
}

impl MachineShape {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("elliptic") => MachineShape::Elliptic,
            _ => MachineShape::Rectangular,
        }
    }
}

/// Bed adhesion strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdhesionType {
    None,
    #[default]
    Skirt,
    Brim,
    Raft,
}

impl AdhesionType {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("none") => AdhesionType::None,
            Some("brim") => AdhesionType::Brim,
            Some("raft") => AdhesionType::Raft,
            _ => AdhesionType::Skirt,
        }
    }
}

/// Values of one extruder
#[derive(Debug, Clone, PartialEq)]
pub struct ExtruderVolumeSettings {
    pub index: usize,
    pub enabled: bool,
    /// Nozzle offset in platform coordinates (Y already inverted).
    pub nozzle_offset: (f32, f32),
    pub skirt_brim_line_width: f32,
    pub initial_layer_line_width_factor: f32,
    pub travel_avoid_other_parts: bool,
    pub travel_avoid_distance: f32,
    pub infill_wipe_dist: f32,
    pub retraction_hop_enabled: bool,
    pub retraction_hop: f32,
    pub prime_blob_enable: bool,
    /// Prime position in machine coordinates.
    pub prime_position: (f32, f32),
    pub nozzle_disallowed_areas: Vec<Polygon2D>,
}

impl ExtruderVolumeSettings {
    /// First-layer line width of this extruder's adhesion lines
    pub fn initial_line_width(&self) -> f32 {
        self.skirt_brim_line_width * self.initial_layer_line_width_factor / 100.0
    }
}

/// Snapshot of every profile value the build volume reads
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSettings {
    pub machine_width: f32,
    pub machine_depth: f32,
    pub machine_height: f32,
    pub shape: MachineShape,
    pub center_is_zero: bool,
    pub gantry_height: f32,
    pub one_at_a_time: bool,
    pub adhesion: AdhesionType,
    pub adhesion_extruder: usize,
    pub skirt_gap: f32,
    pub skirt_line_count: f32,
    pub brim_line_count: f32,
    pub raft_margin: f32,
    pub raft_base_thickness: f32,
    pub raft_interface_layers: f32,
    pub raft_interface_thickness: f32,
    pub raft_surface_layers: f32,
    pub raft_surface_thickness: f32,
    pub raft_airgap: f32,
    pub layer_0_z_overlap: f32,
    pub support_enable: bool,
    pub support_offset: f32,
    pub draft_shield_enabled: bool,
    pub draft_shield_dist: f32,
    pub ooze_shield_enabled: bool,
    pub ooze_shield_dist: f32,
    pub prime_tower_enable: bool,
    pub prime_tower_size: f32,
    pub prime_tower_position: (f32, f32),
    pub prime_tower_brim_enable: bool,
    pub machine_disallowed_areas: Vec<Polygon2D>,
    /// Every configured extruder, enabled or not.
    pub extruders: Vec<ExtruderVolumeSettings>,
}

impl VolumeSettings {
    /// Read the snapshot from a profile.
    ///
    /// Missing or unparseable numbers read as 0.
    pub fn from_profile(profile: &ProfileStore) -> Self {
        let f = |name: &str| profile.get_setting_float(name) as f32;
        let b = |name: &str| profile.get_setting_bool(name);

        let enabled = profile.enabled_extruders();
        let extruders = (0..profile.extruder_count())
            .map(|n| {
                let ef = |name: &str| profile.get_extruder_setting_float(n, name) as f32;
                let eb = |name: &str| profile.get_extruder_setting_bool(n, name);
                let (offset_x, offset_y) = profile.nozzle_offset(n);
                ExtruderVolumeSettings {
                    index: n,
                    enabled: enabled.contains(&n),
                    nozzle_offset: (offset_x as f32, -(offset_y as f32)),
                    skirt_brim_line_width: ef("skirt_brim_line_width"),
                    initial_layer_line_width_factor: ef("initial_layer_line_width_factor"),
                    travel_avoid_other_parts: eb("travel_avoid_other_parts"),
                    travel_avoid_distance: ef("travel_avoid_distance"),
                    infill_wipe_dist: ef("infill_wipe_dist"),
                    retraction_hop_enabled: eb("retraction_hop_enabled"),
                    retraction_hop: ef("retraction_hop"),
                    prime_blob_enable: eb("prime_blob_enable"),
                    prime_position: (ef("extruder_prime_pos_x"), ef("extruder_prime_pos_y")),
                    nozzle_disallowed_areas: parse_areas(
                        "nozzle_disallowed_areas",
                        profile.get_extruder_setting(n, "nozzle_disallowed_areas"),
                    ),
                }
            })
            .collect();

        Self {
            machine_width: f("machine_width"),
            machine_depth: f("machine_depth"),
            machine_height: f("machine_height"),
            shape: MachineShape::parse(profile.get_setting("machine_shape")),
            center_is_zero: b("machine_center_is_zero"),
            gantry_height: f("gantry_height"),
            one_at_a_time: profile.get_setting("print_sequence") == Some("one_at_a_time"),
            adhesion: AdhesionType::parse(profile.get_setting("adhesion_type")),
            adhesion_extruder: profile.get_setting_int("adhesion_extruder_nr").max(0) as usize,
            skirt_gap: f("skirt_gap"),
            skirt_line_count: f("skirt_line_count"),
            brim_line_count: f("brim_line_count"),
            raft_margin: f("raft_margin"),
            raft_base_thickness: f("raft_base_thickness"),
            raft_interface_layers: f("raft_interface_layers"),
            raft_interface_thickness: f("raft_interface_thickness"),
            raft_surface_layers: f("raft_surface_layers"),
            raft_surface_thickness: f("raft_surface_thickness"),
            raft_airgap: f("raft_airgap"),
            layer_0_z_overlap: f("layer_0_z_overlap"),
            support_enable: b("support_enable"),
            support_offset: f("support_offset"),
            draft_shield_enabled: b("draft_shield_enabled"),
            draft_shield_dist: f("draft_shield_dist"),
            ooze_shield_enabled: b("ooze_shield_enabled"),
            ooze_shield_dist: f("ooze_shield_dist"),
            prime_tower_enable: b("prime_tower_enable"),
            prime_tower_size: f("prime_tower_size"),
            prime_tower_position: (f("prime_tower_position_x"), f("prime_tower_position_y")),
            prime_tower_brim_enable: b("prime_tower_brim_enable"),
            machine_disallowed_areas: parse_areas(
                "machine_disallowed_areas",
                profile.get_setting("machine_disallowed_areas"),
            ),
            extruders,
        }
    }

    /// Extruders taking part in the print
    pub fn used_extruders(&self) -> impl Iterator<Item = &ExtruderVolumeSettings> {
        self.extruders.iter().filter(|e| e.enabled)
    }

    /// Extruder printing skirt, brim or raft; the first used one when the
    /// configured index is not in use
    pub fn adhesion_extruder(&self) -> Option<&ExtruderVolumeSettings> {
        self.used_extruders()
            .find(|e| e.index == self.adhesion_extruder)
            .or_else(|| self.used_extruders().next())
    }

    /// True when the extruder exists and is enabled
    pub fn is_extruder_enabled(&self, index: usize) -> bool {
        self.extruders.get(index).is_some_and(|e| e.enabled)
    }

    /// Convert a machine coordinate to platform space: Y is inverted and,
    /// unless the machine is centred, the origin moves to the platform centre
    pub fn machine_to_platform(&self, x: f32, y: f32) -> (f32, f32) {
        let (mut px, mut py) = (x, -y);
        if !self.center_is_zero {
            px -= self.machine_width / 2.0;
            py += self.machine_depth / 2.0;
        }
        (px, py)
    }
}

/// Parse a JSON list of polygons such as `[[[0,0],[10,0],[10,10]]]`.
///
/// Malformed input is logged and ignored.
pub fn parse_areas(name: &str, raw: Option<&str>) -> Vec<Polygon2D> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Vec<[f32; 2]>>>(raw) {
        Ok(areas) => areas
            .into_iter()
            .filter(|area| !area.is_empty())
            .map(|area| Polygon2D::new(area.into_iter().map(|[x, y]| Point2D::new(x, y)).collect()))
            .collect(),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", name, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_groups() {
        let raft = ChangeGroups::classify("raft_airgap");
        assert!(raft.raft && !raft.disallowed_areas);

        let adhesion = ChangeGroups::classify("adhesion_type");
        assert!(adhesion.raft && adhesion.disallowed_areas);

        assert!(ChangeGroups::classify("retraction_hop3").extra_z);
        assert!(ChangeGroups::classify("extruder_offset_y1").disallowed_areas);
        assert!(ChangeGroups::classify("machine_width").machine);
        assert!(ChangeGroups::classify("print_sequence").print_sequence);
        assert!(!ChangeGroups::classify("fill_density").any());
    }

    #[test]
    fn test_parse_areas() {
        let areas = parse_areas("test", Some("[[[0, 0], [10, 0], [10, 10]], []]"));
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].points()[1], Point2D::new(10.0, 0.0));
        assert!(parse_areas("test", Some("not json")).is_empty());
        assert!(parse_areas("test", None).is_empty());
    }

    #[test]
    fn test_snapshot_from_defaults() {
        let mut profile = ProfileStore::new();
        profile.put_setting("adhesion_type", "raft").expect("put");
        profile.put_setting("extruder_amount", "2").expect("put");
        profile.put_setting("extruder_enabled2", "False").expect("put");

        let settings = VolumeSettings::from_profile(&profile);
        assert_eq!(settings.adhesion, AdhesionType::Raft);
        assert_eq!(settings.machine_width, 205.0);
        assert_eq!(settings.extruders.len(), 2);
        assert_eq!(settings.used_extruders().count(), 1);
        assert!(!settings.is_extruder_enabled(1));
        assert!(!settings.is_extruder_enabled(5));
        assert_eq!(settings.adhesion_extruder().map(|e| e.index), Some(0));
    }

    #[test]
    fn test_machine_to_platform() {
        let mut profile = ProfileStore::new();
        profile.put_setting("machine_width", "200").expect("put");
        profile.put_setting("machine_depth", "200").expect("put");
        let settings = VolumeSettings::from_profile(&profile);
        assert_eq!(settings.machine_to_platform(170.0, 170.0), (70.0, -70.0));

        profile.put_setting("machine_center_is_zero", "True").expect("put");
        let settings = VolumeSettings::from_profile(&profile);
        assert_eq!(settings.machine_to_platform(10.0, 20.0), (10.0, -20.0));
    }
}
