//! Default setting registry.
//!
//! Every setting known to the profile store is registered here, in display
//! order, together with its range, warnings and visibility conditions.

use crate::setting::{Condition, Setting, SettingCategory};
use crate::validators::{
    PrintSpeedValidator, Threshold, WallThicknessValidator, WarningAbove, WarningBelow,
};
use crate::value::SettingType;

pub const ADHESION_TYPES: &[&str] = &["none", "skirt", "brim", "raft"];
pub const SUPPORT_TYPES: &[&str] = &["None", "Touching buildplate", "Everywhere"];
pub const SUPPORT_EXTRUDERS: &[&str] = &["Both", "First extruder", "Second extruder"];
pub const SUPPORT_PATTERNS: &[&str] = &["Grid", "Lines"];
pub const MACHINE_SHAPES: &[&str] = &["rectangular", "elliptic"];
pub const PRINT_SEQUENCES: &[&str] = &["all_at_once", "one_at_a_time"];
pub const EXTRUDER_COUNTS: &[&str] = &["1", "2", "3", "4"];
pub const START_MODES: &[&str] = &["Simple", "Normal"];
pub const GCODE_FLAVORS: &[&str] = &[
    "RepRap (Marlin/Sprinter)",
    "RepRap (Volumetric)",
    "UltiGCode",
    "MakerBot",
    "BFB",
    "Mach3",
];

/// Highest supported extruder count
pub const MAX_EXTRUDERS: usize = 4;

/// Settings that carry `<name>2` .. `<name>4` variants for the extra
/// extruders
pub const PER_EXTRUDER_SETTINGS: &[&str] = &[
    "extruder_enabled",
    "skirt_brim_line_width",
    "initial_layer_line_width_factor",
    "travel_avoid_distance",
    "travel_avoid_other_parts",
    "infill_wipe_dist",
    "retraction_hop_enabled",
    "retraction_hop",
    "prime_blob_enable",
    "extruder_prime_pos_x",
    "extruder_prime_pos_y",
    "nozzle_disallowed_areas",
];

const UNLIKELY_TEMPERATURE: &str = "Temperatures above 260C could damage your machine, be careful!";
const THICK_FILAMENT: &str =
    "Are you sure your filament is that thick? Normal filament is around 3mm or 1.75mm.";

fn float(name: &'static str, default: &str, category: SettingCategory, sub: &'static str) -> Setting {
    Setting::new(name, default, SettingType::Float, category, sub)
}

fn int(name: &'static str, default: &str, category: SettingCategory, sub: &'static str) -> Setting {
    Setting::new(name, default, SettingType::Int, category, sub)
}

fn boolean(name: &'static str, default: &str, category: SettingCategory, sub: &'static str) -> Setting {
    Setting::new(name, default, SettingType::Bool, category, sub)
}

fn text(name: &'static str, default: &str, category: SettingCategory, sub: &'static str) -> Setting {
    Setting::new(name, default, SettingType::String, category, sub)
}

fn choice(
    name: &'static str,
    default: &str,
    options: &'static [&'static str],
    category: SettingCategory,
    sub: &'static str,
) -> Setting {
    Setting::new(name, default, SettingType::Enum(options), category, sub)
}

fn alteration(name: &'static str, default: impl Into<String>) -> Setting {
    Setting::new(
        name,
        default,
        SettingType::String,
        SettingCategory::Alteration,
        "alteration",
    )
}

fn too_hot() -> WarningAbove {
    WarningAbove {
        threshold: Threshold::Fixed(260.0),
        message: UNLIKELY_TEMPERATURE,
    }
}

fn extruders_above(n: u32) -> Condition {
    Condition::ExtruderCountAbove(n)
}

fn not_ultigcode() -> Condition {
    Condition::NotEquals {
        setting: "gcode_flavor",
        value: "UltiGCode",
    }
}

/// Leak a formatted variant name; the registry lives for the whole process
fn variant_name(base: &str, extruder: usize) -> &'static str {
    Box::leak(format!("{}{}", base, extruder + 1).into_boxed_str())
}

/// Build the full list of settings with their default values
pub fn default_settings() -> Vec<Setting> {
    use SettingCategory::*;

    let mut settings = vec![
        // Quality
        float("layer_height", "0.1", Basic, "Quality")
            .with_label("Layer height (mm)")
            .with_range(Some(0.0001), None)
            .with_validator(WarningAbove {
                threshold: Threshold::Scaled {
                    setting: "nozzle_size",
                    factor: 0.8,
                },
                message: "Thicker layers than {threshold}mm (80% nozzle size) usually give bad results and are not recommended.",
            }),
        float("wall_thickness", "0.8", Basic, "Quality")
            .with_label("Shell thickness (mm)")
            .with_range(Some(0.0), None)
            .with_validator(WallThicknessValidator),
        boolean("retraction_enable", "True", Basic, "Quality").with_label("Enable retraction"),
        float("bottom_thickness", "0.3", Advanced, "Quality")
            .with_label("Initial layer thickness (mm)")
            .with_range(Some(0.0), None)
            .with_validator(WarningAbove {
                threshold: Threshold::Scaled {
                    setting: "nozzle_size",
                    factor: 0.75,
                },
                message: "A bottom layer of more than {threshold}mm (3/4 nozzle size) usually gives bad results and is not recommended.",
            }),
        float("layer0_width_factor", "100", Advanced, "Quality")
            .with_label("Initial layer line width (%)")
            .with_range(Some(50.0), Some(300.0)),
        float("object_sink", "0.0", Advanced, "Quality")
            .with_label("Cut off object bottom (mm)")
            .with_range(Some(0.0), None),
        float("overlap_dual", "0.15", Advanced, "Quality").with_label("Dual extrusion overlap (mm)"),
        // Fill
        float("solid_layer_thickness", "0.6", Basic, "Fill")
            .with_label("Bottom/Top thickness (mm)")
            .with_range(Some(0.0), None),
        float("fill_density", "20", Basic, "Fill")
            .with_label("Fill Density (%)")
            .with_range(Some(0.0), Some(100.0)),
        // Machine
        float("nozzle_size", "0.4", Advanced, "Machine")
            .with_label("Nozzle size (mm)")
            .with_range(Some(0.1), Some(10.0)),
        // Speed and temperature
        float("print_speed", "50", Basic, "Speed and Temperature")
            .with_label("Print speed (mm/s)")
            .with_range(Some(1.0), None)
            .with_validator(WarningAbove {
                threshold: Threshold::Fixed(150.0),
                message: "It is highly unlikely that your machine can achieve a printing speed above 150mm/s",
            })
            .with_validator(PrintSpeedValidator),
        int("print_temperature", "220", Basic, "Speed and Temperature")
            .with_label("Printing temperature (C)")
            .with_range(Some(0.0), Some(340.0))
            .with_validator(too_hot())
            .with_condition(not_ultigcode()),
        int("print_temperature2", "0", Basic, "Speed and Temperature")
            .with_label("2nd nozzle temperature (C)")
            .with_range(Some(0.0), Some(340.0))
            .with_validator(too_hot())
            .with_condition(extruders_above(1))
            .with_condition(not_ultigcode()),
        int("print_temperature3", "0", Basic, "Speed and Temperature")
            .with_label("3rd nozzle temperature (C)")
            .with_range(Some(0.0), Some(340.0))
            .with_validator(too_hot())
            .with_condition(extruders_above(2))
            .with_condition(not_ultigcode()),
        int("print_temperature4", "0", Basic, "Speed and Temperature")
            .with_label("4th nozzle temperature (C)")
            .with_range(Some(0.0), Some(340.0))
            .with_validator(too_hot())
            .with_condition(extruders_above(3))
            .with_condition(not_ultigcode()),
        int("print_bed_temperature", "70", Basic, "Speed and Temperature")
            .with_label("Bed temperature (C)")
            .with_range(Some(0.0), Some(340.0))
            .with_condition(Condition::Equals {
                setting: "has_heated_bed",
                value: "True",
            })
            .with_condition(not_ultigcode()),
        // Support
        choice("support", "None", SUPPORT_TYPES, Basic, "Support").with_label("Support type"),
        choice("adhesion_type", "skirt", ADHESION_TYPES, Basic, "Support")
            .with_label("Platform adhesion type"),
        choice("support_dual_extrusion", "Both", SUPPORT_EXTRUDERS, Basic, "Support")
            .with_label("Support dual extrusion")
            .with_condition(extruders_above(1)),
        choice("support_type", "Lines", SUPPORT_PATTERNS, Expert, "Support")
            .with_label("Structure type"),
        float("support_angle", "60", Expert, "Support")
            .with_label("Overhang angle for support (deg)")
            .with_range(Some(0.0), Some(90.0)),
        int("support_fill_rate", "15", Expert, "Support")
            .with_label("Fill amount (%)")
            .with_range(Some(0.0), Some(100.0)),
        float("support_xy_distance", "0.7", Expert, "Support")
            .with_label("Distance X/Y (mm)")
            .with_range(Some(0.0), Some(10.0)),
        float("support_z_distance", "0.15", Expert, "Support")
            .with_label("Distance Z (mm)")
            .with_range(Some(0.0), Some(10.0)),
        boolean("support_enable", "False", Advanced, "Support"),
        float("support_offset", "0.2", Expert, "Support").with_label("Support horizontal expansion (mm)"),
        // Dual extrusion
        boolean("wipe_tower", "False", Basic, "Dual extrusion")
            .with_label("Wipe&prime tower")
            .with_condition(extruders_above(1)),
        float("wipe_tower_volume", "15", Expert, "Dual extrusion")
            .with_label("Wipe&prime tower volume per layer (mm3)")
            .with_condition(extruders_above(1)),
        boolean("ooze_shield", "False", Basic, "Dual extrusion")
            .with_label("Ooze shield")
            .with_condition(extruders_above(1)),
        // Filament
        float("filament_diameter", "2.85", Basic, "Filament")
            .with_label("Diameter (mm)")
            .with_range(Some(1.0), None)
            .with_validator(WarningAbove {
                threshold: Threshold::Fixed(3.5),
                message: THICK_FILAMENT,
            })
            .with_condition(not_ultigcode()),
        float("filament_diameter2", "0", Basic, "Filament")
            .with_label("Diameter2 (mm)")
            .with_validator(WarningAbove {
                threshold: Threshold::Fixed(3.5),
                message: THICK_FILAMENT,
            })
            .with_condition(extruders_above(1))
            .with_condition(not_ultigcode()),
        float("filament_diameter3", "0", Basic, "Filament")
            .with_label("Diameter3 (mm)")
            .with_validator(WarningAbove {
                threshold: Threshold::Fixed(3.5),
                message: THICK_FILAMENT,
            })
            .with_condition(extruders_above(2))
            .with_condition(not_ultigcode()),
        float("filament_diameter4", "0", Basic, "Filament")
            .with_label("Diameter4 (mm)")
            .with_validator(WarningAbove {
                threshold: Threshold::Fixed(3.5),
                message: THICK_FILAMENT,
            })
            .with_condition(extruders_above(3))
            .with_condition(not_ultigcode()),
        float("filament_flow", "100.0", Basic, "Filament")
            .with_label("Flow (%)")
            .with_range(Some(5.0), Some(300.0))
            .with_validator(WarningAbove {
                threshold: Threshold::Fixed(150.0),
                message: "More flow than 150% is rare and usually not recommended.",
            })
            .with_validator(WarningBelow {
                threshold: Threshold::Fixed(50.0),
                message: "Less flow than 50% is rare and usually not recommended.",
            })
            .with_condition(not_ultigcode()),
        // Retraction
        float("retraction_speed", "40.0", Advanced, "Retraction")
            .with_label("Speed (mm/s)")
            .with_range(Some(0.1), None)
            .with_condition(not_ultigcode()),
        float("retraction_amount", "4.5", Advanced, "Retraction")
            .with_label("Distance (mm)")
            .with_range(Some(0.0), None)
            .with_condition(not_ultigcode()),
        float("retraction_dual_amount", "16.5", Advanced, "Retraction")
            .with_label("Dual extrusion switch amount (mm)")
            .with_range(Some(0.0), None)
            .with_condition(extruders_above(1))
            .with_condition(not_ultigcode()),
        float("retraction_min_travel", "1.5", Expert, "Retraction")
            .with_label("Minimum travel (mm)")
            .with_range(Some(0.0), None),
        boolean("retraction_combing", "True", Expert, "Retraction").with_label("Enable combing"),
        float("retraction_minimal_extrusion", "0.02", Expert, "Retraction")
            .with_label("Minimal extrusion before retracting (mm)")
            .with_range(Some(0.0), None),
        boolean("retraction_hop_enabled", "False", Expert, "Retraction").with_label("Z hop when retracting"),
        float("retraction_hop", "0.0", Expert, "Retraction")
            .with_label("Z hop height (mm)")
            .with_range(Some(0.0), None),
        // Speed
        float("travel_speed", "150.0", Advanced, "Speed")
            .with_label("Travel speed (mm/s)")
            .with_range(Some(0.1), None)
            .with_validator(WarningAbove {
                threshold: Threshold::Fixed(300.0),
                message: "It is highly unlikely that your machine can achieve a travel speed above 300mm/s",
            }),
        float("bottom_layer_speed", "20", Advanced, "Speed")
            .with_label("Bottom layer speed (mm/s)")
            .with_range(Some(0.1), None),
        float("infill_speed", "0.0", Advanced, "Speed")
            .with_label("Infill speed (mm/s)")
            .with_range(Some(0.0), None),
        float("solidarea_speed", "0.0", Advanced, "Speed")
            .with_label("Top/bottom speed (mm/s)")
            .with_range(Some(0.0), None),
        float("inset0_speed", "0.0", Advanced, "Speed")
            .with_label("Outer shell speed (mm/s)")
            .with_range(Some(0.0), None),
        float("insetx_speed", "0.0", Advanced, "Speed")
            .with_label("Inner shell speed (mm/s)")
            .with_range(Some(0.0), None),
        // Travel
        boolean("travel_avoid_other_parts", "True", Expert, "Travel"),
        float("travel_avoid_distance", "0.625", Expert, "Travel")
            .with_label("Travel avoid distance (mm)")
            .with_range(Some(0.0), None),
        boolean("travel_avoid_supports", "False", Expert, "Travel"),
        // Cool
        float("cool_min_layer_time", "5", Advanced, "Cool")
            .with_label("Minimal layer time (sec)")
            .with_range(Some(0.0), None),
        boolean("fan_enabled", "True", Advanced, "Cool").with_label("Enable cooling fan"),
        float("fan_full_height", "0.5", Expert, "Cool")
            .with_label("Fan full on at height (mm)")
            .with_range(Some(0.0), None),
        int("fan_speed", "100", Expert, "Cool")
            .with_label("Fan speed min (%)")
            .with_range(Some(0.0), Some(100.0)),
        int("fan_speed_max", "100", Expert, "Cool")
            .with_label("Fan speed max (%)")
            .with_range(Some(0.0), Some(100.0)),
        float("cool_min_feedrate", "10", Expert, "Cool")
            .with_label("Minimum speed (mm/s)")
            .with_range(Some(0.0), None),
        boolean("cool_head_lift", "False", Expert, "Cool").with_label("Cool head lift"),
        // Infill
        boolean("solid_top", "True", Expert, "Infill").with_label("Solid infill top"),
        boolean("solid_bottom", "True", Expert, "Infill").with_label("Solid infill bottom"),
        int("fill_overlap", "15", Expert, "Infill")
            .with_label("Infill overlap (%)")
            .with_range(Some(0.0), Some(100.0)),
        float("infill_wipe_dist", "0.0", Expert, "Infill")
            .with_label("Infill wipe distance (mm)")
            .with_range(Some(0.0), None),
        // Black magic
        boolean("spiralize", "False", Expert, "Black Magic").with_label("Spiralize the outer contour"),
        boolean("simple_mode", "False", Expert, "Black Magic").with_label("Only follow mesh surface"),
        // Skirt
        int("skirt_line_count", "1", Expert, "Skirt")
            .with_label("Line count")
            .with_range(Some(0.0), None),
        float("skirt_gap", "3.0", Expert, "Skirt")
            .with_label("Start distance (mm)")
            .with_range(Some(0.0), None),
        float("skirt_minimal_length", "150.0", Expert, "Skirt")
            .with_label("Minimal length (mm)")
            .with_range(Some(0.0), None),
        float("skirt_brim_line_width", "0.4", Expert, "Skirt")
            .with_label("Skirt/brim line width (mm)")
            .with_range(Some(0.0), None),
        float("initial_layer_line_width_factor", "100", Expert, "Skirt")
            .with_label("Initial layer line width (%)")
            .with_range(Some(0.0), None),
        // Brim
        int("brim_line_count", "20", Expert, "Brim")
            .with_label("Brim line amount")
            .with_range(Some(1.0), Some(100.0)),
        // Raft
        float("raft_margin", "5.0", Expert, "Raft")
            .with_label("Extra margin (mm)")
            .with_range(Some(-1.0), None),
        float("raft_line_spacing", "3.0", Expert, "Raft")
            .with_label("Line spacing (mm)")
            .with_range(Some(0.0), None),
        float("raft_base_thickness", "0.3", Expert, "Raft")
            .with_label("Base thickness (mm)")
            .with_range(Some(0.0), None),
        float("raft_base_linewidth", "1.0", Expert, "Raft")
            .with_label("Base line width (mm)")
            .with_range(Some(0.0), None),
        int("raft_interface_layers", "1", Expert, "Raft")
            .with_label("Interface layers")
            .with_range(Some(0.0), None),
        float("raft_interface_thickness", "0.27", Expert, "Raft")
            .with_label("Interface thickness (mm)")
            .with_range(Some(0.0), None),
        float("raft_interface_linewidth", "0.4", Expert, "Raft")
            .with_label("Interface line width (mm)")
            .with_range(Some(0.0), None),
        float("raft_airgap_all", "0.0", Expert, "Raft")
            .with_label("Airgap (mm)")
            .with_range(Some(0.0), None),
        float("raft_airgap", "0.22", Expert, "Raft")
            .with_label("First layer airgap (mm)")
            .with_range(Some(0.0), None),
        int("raft_surface_layers", "2", Expert, "Raft")
            .with_label("Surface layers")
            .with_range(Some(0.0), None),
        float("raft_surface_thickness", "0.27", Expert, "Raft")
            .with_label("Surface layer thickness (mm)")
            .with_range(Some(0.0), None),
        float("raft_surface_linewidth", "0.4", Expert, "Raft")
            .with_label("Surface layer line width (mm)")
            .with_range(Some(0.0), None),
        float("layer_0_z_overlap", "0.0", Expert, "Raft")
            .with_label("Initial layer Z overlap (mm)")
            .with_range(Some(0.0), None),
        // Shields
        boolean("draft_shield_enabled", "False", Expert, "Shields"),
        float("draft_shield_dist", "10", Expert, "Shields").with_range(Some(0.0), None),
        boolean("ooze_shield_enabled", "False", Expert, "Shields"),
        float("ooze_shield_dist", "2", Expert, "Shields").with_range(Some(0.0), None),
        // Prime tower
        boolean("prime_tower_enable", "False", Expert, "Prime tower"),
        float("prime_tower_size", "15", Expert, "Prime tower").with_range(Some(0.0), None),
        float("prime_tower_position_x", "200", Expert, "Prime tower"),
        float("prime_tower_position_y", "200", Expert, "Prime tower"),
        boolean("prime_tower_brim_enable", "False", Expert, "Prime tower"),
        boolean("prime_blob_enable", "False", Expert, "Prime tower"),
        float("extruder_prime_pos_x", "0", Expert, "Prime tower"),
        float("extruder_prime_pos_y", "0", Expert, "Prime tower"),
        // Sequence
        choice("print_sequence", "all_at_once", PRINT_SEQUENCES, Expert, "Sequence")
            .with_label("Print sequence"),
        int("adhesion_extruder_nr", "0", Expert, "Sequence").with_range(Some(0.0), Some(3.0)),
        // Fix horrible
        boolean("fix_horrible_union_all_type_a", "True", Expert, "Fix horrible"),
        boolean("fix_horrible_union_all_type_b", "False", Expert, "Fix horrible"),
        boolean("fix_horrible_use_open_bits", "False", Expert, "Fix horrible"),
        boolean("fix_horrible_extensive_stitching", "False", Expert, "Fix horrible"),
        // Hidden
        text("plugin_config", "", Hidden, "hidden"),
        float("object_center_x", "-1", Hidden, "hidden"),
        float("object_center_y", "-1", Hidden, "hidden"),
        boolean("extruder_enabled", "True", Hidden, "hidden"),
        // Alterations
        alteration("start.gcode", start_template(1)),
        alteration("end.gcode", end_template(1)),
        alteration("start2.gcode", start_template(2)),
        alteration("end2.gcode", end_template(2)),
        alteration("start3.gcode", start_template(3)),
        alteration("end3.gcode", end_template(3)),
        alteration("start4.gcode", start_template(4)),
        alteration("end4.gcode", end_template(4)),
        alteration("nextobject.gcode", NEXT_OBJECT_TEMPLATE),
        alteration("switchExtruder.gcode", SWITCH_EXTRUDER_TEMPLATE),
        alteration("support_start.gcode", ""),
        alteration("support_end.gcode", ""),
        alteration("cool_start.gcode", ""),
        alteration("cool_end.gcode", ""),
        alteration("replace.csv", ""),
        alteration(
            "preSwitchExtruder.gcode",
            ";Switch between the current extruder and the next extruder, when printing with multiple extruders.\n;This code is added before the T(n)\n",
        ),
        alteration(
            "postSwitchExtruder.gcode",
            ";Switch between the current extruder and the next extruder, when printing with multiple extruders.\n;This code is added after the T(n)\n",
        ),
        // Preferences
        choice("startMode", "Simple", START_MODES, Preference, "hidden"),
        text("simpleModeProfile", "2_normal", Preference, "hidden"),
        text("simpleModeMaterial", "1_pla", Preference, "hidden"),
        boolean("oneAtATime", "True", Preference, "hidden"),
        text("lastFile", "", Preference, "hidden"),
        boolean("save_profile", "False", Preference, "hidden").with_label("Save profile on slice"),
        float("filament_cost_kg", "0", Preference, "hidden").with_label("Cost (price/kg)"),
        float("filament_cost_meter", "0", Preference, "hidden").with_label("Cost (price/m)"),
        float("filament_physical_density", "1240", Preference, "hidden")
            .with_label("Density (kg/m3)")
            .with_range(Some(500.0), Some(3000.0)),
        text("language", "English", Preference, "hidden").with_label("Language"),
        int("active_machine", "0", Preference, "hidden"),
        text("model_colour", "#FFC924", Preference, "hidden"),
        text("model_colour2", "#CB3030", Preference, "hidden"),
        text("model_colour3", "#DDD93C", Preference, "hidden"),
        text("model_colour4", "#4550D3", Preference, "hidden"),
        boolean("window_maximized", "True", Preference, "hidden"),
        float("window_pos_x", "-1", Preference, "hidden"),
        float("window_pos_y", "-1", Preference, "hidden"),
        float("window_width", "-1", Preference, "hidden"),
        float("window_height", "-1", Preference, "hidden"),
        float("window_normal_sash", "320", Preference, "hidden"),
        text("last_run_version", "", Preference, "hidden"),
        // Machine
        text("machine_name", "", Machine, "hidden"),
        text("machine_type", "unknown", Machine, "hidden"),
        float("machine_width", "205", Machine, "hidden")
            .with_label("Maximum width (mm)")
            .with_range(Some(0.0), None),
        float("machine_depth", "205", Machine, "hidden")
            .with_label("Maximum depth (mm)")
            .with_range(Some(0.0), None),
        float("machine_height", "200", Machine, "hidden")
            .with_label("Maximum height (mm)")
            .with_range(Some(0.0), None),
        boolean("machine_center_is_zero", "False", Machine, "hidden").with_label("Machine center 0,0"),
        choice("machine_shape", "rectangular", MACHINE_SHAPES, Machine, "hidden")
            .with_label("Build area shape"),
        boolean("has_heated_bed", "False", Machine, "hidden").with_label("Heated bed"),
        choice("gcode_flavor", "RepRap (Marlin/Sprinter)", GCODE_FLAVORS, Machine, "hidden")
            .with_label("GCode Flavor"),
        choice("extruder_amount", "1", EXTRUDER_COUNTS, Machine, "hidden").with_label("Extruder count"),
        float("extruder_offset_x1", "0.0", Machine, "hidden"),
        float("extruder_offset_y1", "21.6", Machine, "hidden"),
        float("extruder_offset_x2", "0.0", Machine, "hidden"),
        float("extruder_offset_y2", "0.0", Machine, "hidden"),
        float("extruder_offset_x3", "0.0", Machine, "hidden"),
        float("extruder_offset_y3", "0.0", Machine, "hidden"),
        float("steps_per_e", "0", Machine, "hidden").with_label("E-Steps per 1mm filament"),
        text("serial_port", "AUTO", Machine, "hidden"),
        text("serial_baud", "AUTO", Machine, "hidden"),
        float("extruder_head_size_min_x", "0.0", Machine, "hidden"),
        float("extruder_head_size_min_y", "0.0", Machine, "hidden"),
        float("extruder_head_size_max_x", "0.0", Machine, "hidden"),
        float("extruder_head_size_max_y", "0.0", Machine, "hidden"),
        float("gantry_height", "60", Machine, "hidden")
            .with_label("Printer gantry height (mm)")
            .with_range(Some(0.0), None),
        text("machine_disallowed_areas", "[]", Machine, "hidden"),
        text("nozzle_disallowed_areas", "[]", Machine, "hidden"),
    ];

    let variants = per_extruder_variants(&settings);
    settings.extend(variants);
    settings
}

/// Copies of the per-extruder settings for extruders 2 to 4
fn per_extruder_variants(settings: &[Setting]) -> Vec<Setting> {
    let mut variants = Vec::new();
    for base in PER_EXTRUDER_SETTINGS {
        let Some(setting) = settings.iter().find(|s| s.name() == *base) else {
            continue;
        };
        for extruder in 1..MAX_EXTRUDERS {
            variants.push(
                Setting::new(
                    variant_name(base, extruder),
                    setting.default_value(),
                    setting.kind().clone(),
                    setting.category(),
                    setting.subcategory(),
                )
                .with_condition(extruders_above(extruder as u32)),
            );
        }
    }
    variants
}

const NEXT_OBJECT_TEMPLATE: &str = ";Move to next object on the platform. clear_z is the minimal z height we need to make sure we do not hit any objects.
G92 E0

G91                                    ;relative positioning
G1 E-1 F300                            ;retract the filament a bit before lifting the nozzle
G1 Z+0.5 E-5 F{travel_speed}           ;move Z up a bit and retract filament even more
G90                                    ;absolute positioning

G1 Z{clear_z} F{max_z_speed}
G92 E0
G1 X{object_center_x} Y{object_center_y} F{travel_speed}
G1 F200 E6
G92 E0
";

const SWITCH_EXTRUDER_TEMPLATE: &str = ";Switch between the current extruder and the next extruder, when printing with multiple extruders.
G92 E0
G1 E-{retraction_dual_amount} F{retraction_speed}
G92 E0
T{extruder}
G92 E0
G1 E{retraction_dual_amount} F{retraction_speed}
G92 E0
";

/// Default start snippet for a machine with `extruders` extruders
fn start_template(extruders: usize) -> String {
    let mut out = String::from(
        ";Sliced at: {day} {date} {time}
;Basic settings: Layer height: {layer_height} Walls: {wall_thickness} Fill: {fill_density}
;Print time: {print_time}
;Filament used: {filament_amount}m {filament_weight}g
;Filament cost: {filament_cost}
;M190 S{print_bed_temperature} ;Uncomment to add your own bed temperature line
",
    );
    if extruders == 1 {
        out.push_str(";M109 S{print_temperature} ;Uncomment to add your own temperature line\n");
    } else {
        out.push_str(";M104 S{print_temperature} ;Uncomment to add your own temperature line\n");
        for n in (1..extruders).rev() {
            out.push_str(&format!(
                ";M109 T{n} S{{print_temperature{}}} ;Uncomment to add your own temperature line\n",
                n + 1
            ));
        }
        out.push_str(";M109 T0 S{print_temperature} ;Uncomment to add your own temperature line\n");
    }
    out.push_str("G21        ;metric values\nG90        ;absolute positioning\n");
    if extruders == 1 {
        out.push_str("M82        ;set extruder to absolute mode\n");
    }
    out.push_str(
        "M107       ;start with the fan off

G28 X0 Y0  ;move X/Y to min endstops
G28 Z0     ;move Z to min endstops

G1 Z15.0 F{travel_speed} ;move the platform down 15mm

",
    );
    if extruders == 1 {
        out.push_str(
            "G92 E0                  ;zero the extruded length
G1 F200 E3              ;extrude 3mm of feed stock
G92 E0                  ;zero the extruded length again
",
        );
    } else {
        for n in (1..extruders).rev() {
            out.push_str(&format!(
                "T{n}                      ;switch to extruder {}
G92 E0                  ;zero the extruded length
G1 F200 E10             ;extrude 10mm of feed stock
G92 E0                  ;zero the extruded length again
G1 F200 E-{{retraction_dual_amount}}

",
                n + 1
            ));
        }
        out.push_str(
            "T0                      ;switch to the first extruder
G92 E0                  ;zero the extruded length
G1 F200 E10             ;extrude 10mm of feed stock
G92 E0                  ;zero the extruded length again
",
        );
    }
    out.push_str("G1 F{travel_speed}\n;Put printing message on LCD screen\nM117 Printing...\n");
    out
}

/// Default end snippet for a machine with `extruders` extruders
fn end_template(extruders: usize) -> String {
    let mut out = String::from(";End GCode\n");
    if extruders == 1 {
        out.push_str("M104 S0                     ;extruder heater off\n");
    } else {
        for n in 0..extruders {
            out.push_str(&format!("M104 T{n} S0                  ;extruder heater off\n"));
        }
    }
    out.push_str(
        "M140 S0                     ;heated bed heater off (if you have it)

G91                                    ;relative positioning
G1 E-1 F300                            ;retract the filament a bit before lifting the nozzle
G1 Z+0.5 E-5 X-20 Y-20 F{travel_speed} ;move Z up a bit and retract filament even more
G28 X0 Y0                              ;move X/Y to min endstops, so the head is out of the way

M84                         ;steppers off
G90                         ;absolute positioning
",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let settings = default_settings();
        let mut seen = HashSet::new();
        for setting in &settings {
            assert!(seen.insert(setting.name()), "duplicate {}", setting.name());
        }
    }

    #[test]
    fn test_defaults_parse_as_declared_type() {
        for setting in default_settings() {
            assert!(
                setting.kind().parse(setting.default_value()).is_ok(),
                "default of {} does not parse",
                setting.name()
            );
        }
    }

    #[test]
    fn test_variants_registered() {
        let settings = default_settings();
        for name in ["skirt_brim_line_width2", "retraction_hop4", "extruder_enabled3"] {
            assert!(settings.iter().any(|s| s.name() == name), "{name} missing");
        }
        assert!(!settings.iter().any(|s| s.name() == "skirt_brim_line_width5"));
    }

    #[test]
    fn test_templates() {
        let single = start_template(1);
        assert!(single.contains("M82        ;set extruder to absolute mode"));
        assert!(single.contains("G1 Z15.0 F{travel_speed}"));

        let dual = start_template(2);
        assert!(dual.contains(";M109 T1 S{print_temperature2}"));
        assert!(dual.contains("T1                      ;switch to extruder 2"));
        assert!(!dual.contains("M82"));

        assert!(end_template(1).ends_with("G90                         ;absolute positioning\n"));
        assert!(end_template(3).contains("M104 T2 S0"));
    }
}
