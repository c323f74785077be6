//! Profile to engine settings.
//!
//! The engine takes integer settings, lengths in microns, plus the start
//! and end code as text.

use std::collections::BTreeMap;

use slicekit_settings::calculations::{calculate_edge_width, calculate_line_count, calculate_solid_layer_count, minimal_extruder_count};
use slicekit_settings::{ProfileStore, SettingsResult};

use crate::emitter::GcodeEmitter;

/// Skin count forcing solid layers throughout
const FULLY_SOLID_SKIN: i64 = 10_000;

fn microns(mm: f64) -> i64 {
    (mm * 1000.0).round() as i64
}

/// Engine settings by key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    values: BTreeMap<String, String>,
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    /// Settings sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Engine settings for `extruder_count` extruders.
    ///
    /// # Errors
    /// Fails only when the profile snapshot for the end code cannot be
    /// encoded
    pub fn from_profile(profile: &ProfileStore, extruder_count: usize) -> SettingsResult<Self> {
        let float = |name: &str| profile.get_setting_float(name);
        let on = |name: &str| profile.get_setting_bool(name);
        let speed_or_print = |name: &str| {
            let speed = float(name) as i64;
            if speed > 0 {
                speed
            } else {
                float("print_speed") as i64
            }
        };

        let edge_width = calculate_edge_width(profile);
        let solid_layers = calculate_solid_layer_count(profile) as i64;
        let mut layer_thickness = microns(float("layer_height"));
        if layer_thickness <= 0 {
            layer_thickness = 1000;
        }
        let initial_layer = if float("bottom_thickness") > 0.0 {
            microns(float("bottom_thickness"))
        } else {
            layer_thickness
        };

        let mut s = Self::new();
        s.set_int("layerThickness", layer_thickness)
            .set_int("initialLayerThickness", initial_layer)
            .set_int("filamentDiameter", microns(float("filament_diameter")))
            .set_int("filamentFlow", float("filament_flow") as i64)
            .set_int("extrusionWidth", microns(edge_width))
            .set_int("layer0extrusionWidth", microns(edge_width * float("layer0_width_factor") / 100.0))
            .set_int("insetCount", calculate_line_count(profile) as i64)
            .set_int("downSkinCount", if on("solid_bottom") { solid_layers } else { 0 })
            .set_int("upSkinCount", if on("solid_top") { solid_layers } else { 0 })
            .set_int("infillOverlap", float("fill_overlap") as i64)
            .set_int("initialSpeedupLayers", 4)
            .set_int("initialLayerSpeed", float("bottom_layer_speed") as i64)
            .set_int("printSpeed", float("print_speed") as i64)
            .set_int("infillSpeed", speed_or_print("infill_speed"))
            .set_int("inset0Speed", speed_or_print("inset0_speed"))
            .set_int("insetXSpeed", speed_or_print("insetx_speed"))
            .set_int("moveSpeed", float("travel_speed") as i64);

        let fan = on("fan_enabled");
        s.set_int("fanSpeedMin", if fan { float("fan_speed") as i64 } else { 0 })
            .set_int("fanSpeedMax", if fan { float("fan_speed_max") as i64 } else { 0 });

        let support = profile.get_setting("support").unwrap_or("None");
        let support_extruder = match profile.get_setting("support_dual_extrusion") {
            Some("First extruder") => 0,
            Some("Second extruder") if minimal_extruder_count(profile) > 1 => 1,
            _ => -1,
        };
        s.set_int("supportAngle", if support == "None" { -1 } else { float("support_angle") as i64 })
            .set_int("supportEverywhere", i64::from(support == "Everywhere"))
            .set_int(
                "supportLineDistance",
                if float("support_fill_rate") > 0.0 {
                    (100.0 * edge_width * 1000.0 / float("support_fill_rate")) as i64
                } else {
                    -1
                },
            )
            .set_int("supportXYDistance", microns(float("support_xy_distance")))
            .set_int("supportZDistance", microns(float("support_z_distance")))
            .set_int("supportExtruder", support_extruder);
        if profile.get_setting("support_type") == Some("Lines") {
            s.set_int("supportType", 1);
        }

        s.set_int(
            "retractionAmount",
            if on("retraction_enable") { microns(float("retraction_amount")) } else { 0 },
        )
        .set_int("retractionSpeed", float("retraction_speed") as i64)
        .set_int("retractionMinimalDistance", microns(float("retraction_min_travel")))
        .set_int("retractionAmountExtruderSwitch", microns(float("retraction_dual_amount")))
        .set_int("retractionZHop", microns(float("retraction_hop")))
        .set_int("minimalExtrusionBeforeRetraction", microns(float("retraction_minimal_extrusion")))
        .set_int("enableCombing", i64::from(on("retraction_combing")))
        .set_int("multiVolumeOverlap", microns(float("overlap_dual")))
        .set_int("objectSink", microns(float("object_sink")).max(0))
        .set_int("minimalLayerTime", float("cool_min_layer_time") as i64)
        .set_int("minimalFeedrate", float("cool_min_feedrate") as i64)
        .set_int("coolHeadLift", i64::from(on("cool_head_lift")));

        let fan_full_height = microns(float("fan_full_height"));
        let fan_full_layer = (fan_full_height - initial_layer - 1).div_euclid(layer_thickness) + 1;
        s.set_int("fanFullOnLayerNr", fan_full_layer.max(0));

        let fill = float("fill_density");
        if fill == 0.0 {
            s.set_int("sparseInfillLineDistance", -1);
        } else if fill == 100.0 {
            s.set_int("sparseInfillLineDistance", microns(edge_width))
                .set_int("downSkinCount", FULLY_SOLID_SKIN)
                .set_int("upSkinCount", FULLY_SOLID_SKIN);
        } else {
            s.set_int("sparseInfillLineDistance", (100.0 * edge_width * 1000.0 / fill) as i64);
        }

        match profile.get_setting("adhesion_type") {
            Some("brim") => {
                s.set_int("skirtDistance", 0)
                    .set_int("skirtLineCount", float("brim_line_count") as i64);
            }
            Some("raft") => {
                let interface = microns(float("raft_interface_thickness"));
                s.set_int("skirtDistance", 0)
                    .set_int("skirtLineCount", 0)
                    .set_int("raftMargin", microns(float("raft_margin")))
                    .set_int("raftLineSpacing", microns(float("raft_line_spacing")))
                    .set_int("raftBaseThickness", microns(float("raft_base_thickness")))
                    .set_int("raftBaseLinewidth", microns(float("raft_base_linewidth")))
                    .set_int("raftInterfaceThickness", interface)
                    .set_int("raftInterfaceLinewidth", microns(float("raft_interface_linewidth")))
                    .set_int("raftInterfaceLineSpacing", microns(float("raft_interface_linewidth") * 2.0))
                    .set_int("raftAirGapLayer0", microns(float("raft_airgap")))
                    .set_int("raftBaseSpeed", float("bottom_layer_speed") as i64)
                    .set_int("raftFanSpeed", 100)
                    .set_int("raftSurfaceThickness", interface)
                    .set_int("raftSurfaceLinewidth", microns(edge_width))
                    .set_int("raftSurfaceLineSpacing", microns(edge_width * 0.9))
                    .set_int("raftSurfaceLayers", float("raft_surface_layers") as i64)
                    .set_int("raftSurfaceSpeed", float("bottom_layer_speed") as i64);
            }
            _ => {
                s.set_int("skirtDistance", microns(float("skirt_gap")))
                    .set_int("skirtLineCount", float("skirt_line_count") as i64)
                    .set_int("skirtMinLength", microns(float("skirt_minimal_length")));
            }
        }

        let mut fix_horrible = 0;
        for (name, bit) in [
            ("fix_horrible_union_all_type_a", 0x01),
            ("fix_horrible_union_all_type_b", 0x02),
            ("fix_horrible_extensive_stitching", 0x04),
            ("fix_horrible_use_open_bits", 0x10),
        ] {
            if on(name) {
                fix_horrible |= bit;
            }
        }
        s.set_int("fixHorrible", fix_horrible);

        let flavor = match profile.get_setting("gcode_flavor") {
            Some("UltiGCode") => Some(1),
            Some("MakerBot") => Some(2),
            Some("BFB") => Some(3),
            Some("Mach3") => Some(4),
            Some("RepRap (Volumetric)") => Some(5),
            _ => None,
        };
        if let Some(flavor) = flavor {
            s.set_int("gcodeFlavor", flavor);
        }
        if on("spiralize") {
            s.set_int("spiralizeMode", 1);
        }
        if on("simple_mode") {
            s.set_int("simpleMode", 1);
        }
        if on("wipe_tower") && extruder_count > 1 {
            let volume = float("wipe_tower_volume") * 1e9;
            s.set_int("wipeTowerSize", (volume / layer_thickness as f64).sqrt() as i64);
        }
        if on("ooze_shield") {
            s.set_int("enableOozeShield", 1);
        }

        for n in 1..4 {
            let (x, y) = profile.nozzle_offset(n);
            s.set_int(&format!("extruderOffset[{}].X", n), microns(x))
                .set_int(&format!("extruderOffset[{}].Y", n), microns(y));
        }

        let emitter = GcodeEmitter::new(profile);
        s.set_text("startCode", emitter.alteration_contents("start.gcode", extruder_count)?)
            .set_text("endCode", emitter.alteration_contents("end.gcode", extruder_count)?)
            .set_text(
                "preSwitchExtruderCode",
                emitter.alteration_contents("preSwitchExtruder.gcode", extruder_count)?,
            )
            .set_text(
                "postSwitchExtruderCode",
                emitter.alteration_contents("postSwitchExtruder.gcode", extruder_count)?,
            );

        tracing::debug!("Built {} engine settings for {} extruder(s)", s.len(), extruder_count);
        Ok(s)
    }
}
