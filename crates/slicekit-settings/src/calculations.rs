//! Values derived from the profile.

use crate::store::ProfileStore;

/// Wall thickness and nozzle size in mm
fn wall_and_nozzle(profile: &ProfileStore) -> (f64, f64) {
    (
        profile.get_setting_float("wall_thickness"),
        profile.get_setting_float("nozzle_size"),
    )
}

fn follows_surface_only(profile: &ProfileStore) -> bool {
    profile.get_setting_bool("spiralize") || profile.get_setting_bool("simple_mode")
}

/// Width of one wall line
pub fn calculate_edge_width(profile: &ProfileStore) -> f64 {
    let (wall, nozzle) = wall_and_nozzle(profile);
    if follows_surface_only(profile) {
        return wall;
    }
    if wall < 0.01 {
        return nozzle;
    }
    if wall < nozzle {
        return wall;
    }

    let line_count = (wall / (nozzle - 0.0001)).trunc();
    if line_count == 0.0 {
        return nozzle;
    }
    let line_width = wall / line_count;
    if line_width > nozzle * 1.5 {
        return wall / (line_count + 1.0);
    }
    line_width
}

/// Number of wall lines
pub fn calculate_line_count(profile: &ProfileStore) -> u32 {
    let (wall, nozzle) = wall_and_nozzle(profile);
    if wall < 0.01 {
        return 0;
    }
    if wall < nozzle {
        return 1;
    }
    if follows_surface_only(profile) {
        return 1;
    }

    let line_count = ((wall / (nozzle - 0.0001)).trunc() as u32).max(1);
    if wall / line_count as f64 > nozzle * 1.5 {
        return line_count + 1;
    }
    line_count
}

/// Number of solid top/bottom layers
pub fn calculate_solid_layer_count(profile: &ProfileStore) -> u32 {
    let layer_height = profile.get_setting_float("layer_height");
    let solid = profile.get_setting_float("solid_layer_thickness");
    if layer_height == 0.0 {
        return 1;
    }
    ((solid - 0.0001) / layer_height).ceil().max(0.0) as u32
}

/// Extra footprint around each object taken by brim or skirt, in X and Y
pub fn calculate_object_size_offsets(profile: &ProfileStore) -> [f64; 2] {
    let size = match profile.get_setting("adhesion_type").unwrap_or_default() {
        "brim" => profile.get_setting_float("brim_line_count") * calculate_edge_width(profile),
        "raft" => 0.0,
        _ => {
            let lines = profile.get_setting_float("skirt_line_count");
            if lines > 0.0 {
                lines * calculate_edge_width(profile) + profile.get_setting_float("skirt_gap")
            } else {
                0.0
            }
        }
    };
    [size, size]
}

/// Platform center in machine coordinates
pub fn machine_center_coords(profile: &ProfileStore) -> [f64; 2] {
    if profile.get_setting_bool("machine_center_is_zero") {
        return [0.0, 0.0];
    }
    [
        profile.get_setting_float("machine_width") / 2.0,
        profile.get_setting_float("machine_depth") / 2.0,
    ]
}

/// Platform outline first, then the machine's fixed no-go zones.
///
/// Coordinates are centered on the platform.
pub fn machine_size_polygons(profile: &ProfileStore) -> Vec<Vec<[f64; 2]>> {
    let half_w = profile.get_setting_float("machine_width") / 2.0;
    let half_d = profile.get_setting_float("machine_depth") / 2.0;

    let mut polygons = Vec::new();
    if profile.get_setting("machine_shape") == Some("elliptic") {
        const STEPS: usize = 32;
        polygons.push(
            (0..STEPS)
                .map(|n| {
                    let angle = n as f64 / STEPS as f64 * std::f64::consts::TAU;
                    [angle.cos() * half_w, angle.sin() * half_d]
                })
                .collect(),
        );
    } else {
        polygons.push(vec![
            [-half_w, -half_d],
            [half_w, -half_d],
            [half_w, half_d],
            [-half_w, half_d],
        ]);
    }

    if profile.get_setting("machine_type") == Some("ultimaker2") {
        // Clip corners holding the glass plate.
        let (w, h) = (25.0, 10.0);
        polygons.push(vec![
            [-half_w, -half_d],
            [-half_w + w + 2.0, -half_d],
            [-half_w + w, -half_d + h],
            [-half_w, -half_d + h],
        ]);
        polygons.push(vec![
            [half_w - w - 2.0, -half_d],
            [half_w, -half_d],
            [half_w, -half_d + h],
            [half_w - w, -half_d + h],
        ]);
        polygons.push(vec![
            [-half_w + w + 2.0, half_d],
            [-half_w, half_d],
            [-half_w, half_d - h],
            [-half_w + w, half_d - h],
        ]);
        polygons.push(vec![
            [half_w, half_d],
            [half_w - w - 2.0, half_d],
            [half_w - w, half_d - h],
            [half_w, half_d - h],
        ]);
    }
    polygons
}

/// Extruders needed at minimum; 2 only when support prints with the
/// second extruder
pub fn minimal_extruder_count(profile: &ProfileStore) -> usize {
    if profile.extruder_count() < 2 {
        return 1;
    }
    if profile.get_setting("support") == Some("None") {
        return 1;
    }
    if profile.get_setting("support_dual_extrusion") == Some("Second extruder") {
        return 2;
    }
    1
}

/// Output file extension for the configured flavor
pub fn gcode_extension(profile: &ProfileStore) -> &'static str {
    if profile.get_setting("gcode_flavor") == Some("BFB") {
        ".bfb"
    } else {
        ".gcode"
    }
}
