//! Disallowed-area computation.
//!
//! Everything here is a pure function of a [`VolumeSettings`] snapshot.
//! Polygons are in platform space: X to the right, Y towards the front,
//! origin at the platform centre.

use slicekit_core::{GeometryError, Point2D, Polygon2D, CIRCLE_SEGMENTS};

use crate::settings::{AdhesionType, ExtruderVolumeSettings, MachineShape, VolumeSettings};

/// Radius kept clear around a prime blob
pub const PRIME_CLEARANCE: f32 = 6.5;

/// Smallest border kept along the platform edge
pub const MIN_BORDER: f32 = 0.1;

/// Edge size used when printing one object at a time
pub const ONE_AT_A_TIME_EDGE: f32 = 0.1;

/// Result of one disallowed-area pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisallowedAreas {
    /// Areas no extruder may print in, including adhesion margins.
    pub areas: Vec<Polygon2D>,
    /// The same areas without adhesion margins.
    pub no_brim: Vec<Polygon2D>,
    /// Prime tower polygons that collided with another area.
    pub errors: Vec<Polygon2D>,
    /// One entry per collision, for reporting.
    pub collisions: Vec<GeometryError>,
}

/// Room taken by skirt, brim or raft around each object
pub fn bed_adhesion_size(settings: &VolumeSettings) -> f32 {
    let Some(printing) = settings.adhesion_extruder() else {
        return 0.0;
    };
    let others: f32 = settings
        .used_extruders()
        .filter(|e| e.index != printing.index)
        .map(ExtruderVolumeSettings::initial_line_width)
        .sum();
    let line_width = printing.initial_line_width();

    let size = match settings.adhesion {
        AdhesionType::Brim => {
            (settings.brim_line_count - 1.0).max(0.0) * line_width + others
        }
        AdhesionType::Skirt => {
            settings.skirt_gap + settings.skirt_line_count * line_width + others
        }
        AdhesionType::Raft => settings.raft_margin,
        AdhesionType::None => 0.0,
    };

    let max_length_available = 0.5 * settings.machine_width.min(settings.machine_depth);
    size.min(max_length_available).max(0.0)
}

pub fn support_expansion(settings: &VolumeSettings) -> f32 {
    if settings.support_enable && settings.support_offset != 0.0 {
        settings.support_offset
    } else {
        0.0
    }
}

pub fn farthest_shield_distance(settings: &VolumeSettings) -> f32 {
    let mut distance = 0.0f32;
    if settings.draft_shield_enabled {
        distance = distance.max(settings.draft_shield_dist);
    }
    if settings.ooze_shield_enabled {
        distance = distance.max(settings.ooze_shield_dist);
    }
    distance
}

/// Longest move that may start from an outer wall
pub fn move_from_wall_radius(settings: &VolumeSettings) -> f32 {
    settings
        .used_extruders()
        .map(|e| {
            let travel = if e.travel_avoid_other_parts {
                e.travel_avoid_distance
            } else {
                0.0
            };
            travel.max(e.infill_wipe_dist)
        })
        .fold(0.0, f32::max)
}

/// Margin by which the reachable platform shrinks on every side
pub fn edge_disallowed_size(settings: &VolumeSettings) -> f32 {
    if settings.one_at_a_time {
        return ONE_AT_A_TIME_EDGE;
    }
    if settings.used_extruders().next().is_none() {
        return 0.0;
    }
    let support = support_expansion(settings);
    move_from_wall_radius(settings)
        .max(support + farthest_shield_distance(settings))
        .max(support + bed_adhesion_size(settings))
}

/// Total raft height, 0 unless the raft is the adhesion type
pub fn raft_thickness(settings: &VolumeSettings) -> f32 {
    if settings.adhesion != AdhesionType::Raft {
        return 0.0;
    }
    settings.raft_base_thickness
        + settings.raft_interface_layers * settings.raft_interface_thickness
        + settings.raft_surface_layers * settings.raft_surface_thickness
        + settings.raft_airgap
        - settings.layer_0_z_overlap
}

/// Largest Z hop among the used extruders
pub fn extra_z_clearance(settings: &VolumeSettings) -> f32 {
    settings
        .used_extruders()
        .filter(|e| e.retraction_hop_enabled)
        .map(|e| e.retraction_hop)
        .fold(0.0, f32::max)
}

/// Compute every disallowed area for an edge margin of `border`
pub fn compute(settings: &VolumeSettings, border: f32) -> DisallowedAreas {
    let mut result = static_areas(settings, border);
    let mut result_no_brim = static_areas(settings, 0.0);
    let prime_areas = prime_blob_areas(settings, border);

    for (extruder, prime) in settings.used_extruders().zip(prime_areas) {
        let Some(slot) = result.iter().position(|(index, _)| *index == extruder.index) else {
            continue;
        };
        result[slot].1.extend(prime.iter().cloned());
        result_no_brim[slot].1.extend(prime);

        for area in &extruder.nozzle_disallowed_areas {
            result[slot].1.push(dilate(area, border));
            result_no_brim[slot].1.push(area.clone());
        }
    }

    let mut out = DisallowedAreas::default();

    if settings.used_extruders().count() > 1 {
        if let Some(tower) = prime_tower_area(settings, border) {
            let mut collision = false;
            for ((_, areas), (_, no_brim)) in result.iter_mut().zip(result_no_brim.iter_mut()) {
                if !collision {
                    collision = no_brim.iter().any(|area| tower.intersects_polygon(area).is_some());
                    if collision {
                        let (tx, ty) = settings.prime_tower_position;
                        let (x, y) = settings.machine_to_platform(tx, ty);
                        tracing::warn!(
                            "Prime tower at ({:.1}, {:.1}) collides with a disallowed area",
                            x,
                            y
                        );
                        out.collisions.push(GeometryError::PrimeTowerCollision { x, y });
                    }
                }
                if collision {
                    out.errors.push(tower.clone());
                } else {
                    areas.push(tower.clone());
                    no_brim.push(tower.clone());
                }
            }
        }
    }

    out.areas = result.into_iter().flat_map(|(_, areas)| areas).collect();
    out.no_brim = result_no_brim.into_iter().flat_map(|(_, areas)| areas).collect();
    out
}

/// Grow `area` by `border`; a non-positive border leaves it as is
fn dilate(area: &Polygon2D, border: f32) -> Polygon2D {
    if border > 0.0 {
        area.minkowski_hull(&Polygon2D::approximated_circle(border))
    } else {
        area.clone()
    }
}

/// Machine-defined areas and the platform border, per used extruder
fn static_areas(settings: &VolumeSettings, border: f32) -> Vec<(usize, Vec<Polygon2D>)> {
    let machine_areas: Vec<Polygon2D> = settings
        .machine_disallowed_areas
        .iter()
        .map(|area| dilate(area, border))
        .collect();
    let half_w = settings.machine_width / 2.0;
    let half_d = settings.machine_depth / 2.0;
    let border = border.max(MIN_BORDER);

    settings
        .used_extruders()
        .map(|extruder| {
            let (offset_x, offset_y) = extruder.nozzle_offset;
            let mut areas: Vec<Polygon2D> = machine_areas
                .iter()
                .map(|area| area.translate(offset_x, offset_y))
                .collect();

            // The volume is what every enabled nozzle can reach.
            let mut unreachable = Unreachable::default();
            for other in settings.used_extruders() {
                let dx = other.nozzle_offset.0 - offset_x;
                let dy = other.nozzle_offset.1 - offset_y;
                unreachable.left = unreachable.left.min(dx);
                unreachable.right = unreachable.right.max(dx);
                unreachable.top = unreachable.top.min(dy);
                unreachable.bottom = unreachable.bottom.max(dy);
            }

            match settings.shape {
                MachineShape::Rectangular => {
                    areas.extend(rectangular_border(half_w, half_d, border, unreachable))
                }
                MachineShape::Elliptic => areas.extend(elliptic_border(half_w, half_d, border)),
            }
            (extruder.index, areas)
        })
        .collect()
}

/// Extra margins caused by other nozzles' offsets
#[derive(Debug, Clone, Copy, Default)]
struct Unreachable {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

fn rectangular_border(half_w: f32, half_d: f32, border: f32, u: Unreachable) -> Vec<Polygon2D> {
    let inner_left = -half_w + border - u.left;
    let inner_right = half_w - border - u.right;
    let inner_top = -half_d + border - u.top;
    let inner_bottom = half_d - border - u.bottom;

    let mut out = Vec::with_capacity(4);
    if border - u.left > 0.0 {
        out.push(Polygon2D::from_coords(&[
            (-half_w, -half_d),
            (-half_w, half_d),
            (inner_left, inner_bottom),
            (inner_left, inner_top),
        ]));
    }
    if border + u.right > 0.0 {
        out.push(Polygon2D::from_coords(&[
            (half_w, half_d),
            (half_w, -half_d),
            (inner_right, inner_top),
            (inner_right, inner_bottom),
        ]));
    }
    if border + u.bottom > 0.0 {
        out.push(Polygon2D::from_coords(&[
            (-half_w, half_d),
            (half_w, half_d),
            (inner_right, inner_bottom),
            (inner_left, inner_bottom),
        ]));
    }
    if border - u.top > 0.0 {
        out.push(Polygon2D::from_coords(&[
            (half_w, -half_d),
            (-half_w, -half_d),
            (inner_left, inner_top),
            (inner_right, inner_top),
        ]));
    }
    out
}

/// Corner wedges between the platform rectangle and an inset ellipse,
/// plus four triangles closing the gaps at the ellipse's extremes
fn elliptic_border(half_w: f32, half_d: f32, border: f32) -> Vec<Polygon2D> {
    let sections = CIRCLE_SEGMENTS;
    let (rx, ry) = ((half_w - border) as f64, (half_d - border) as f64);
    let mut out = Vec::with_capacity(sections + 4);

    let mut arc_vertex = Point2D::new(0.0, half_d - border);
    for i in 0..sections {
        let corner = match 4 * i / sections {
            0 => Point2D::new(-half_w, half_d),
            1 => Point2D::new(-half_w, -half_d),
            2 => Point2D::new(half_w, -half_d),
            _ => Point2D::new(half_w, half_d),
        };
        let angle = std::f64::consts::TAU * (i + 1) as f64 / sections as f64;
        let next = Point2D::new((-rx * angle.sin()) as f32, (ry * angle.cos()) as f32);
        out.push(Polygon2D::new(vec![corner, arc_vertex, next]));
        arc_vertex = next;
    }

    if border > 0.0 {
        out.push(Polygon2D::from_coords(&[
            (-half_w, -half_d),
            (-half_w, half_d),
            (-half_w + border, 0.0),
        ]));
        out.push(Polygon2D::from_coords(&[
            (-half_w, half_d),
            (half_w, half_d),
            (0.0, half_d - border),
        ]));
        out.push(Polygon2D::from_coords(&[
            (half_w, half_d),
            (half_w, -half_d),
            (half_w - border, 0.0),
        ]));
        out.push(Polygon2D::from_coords(&[
            (half_w, -half_d),
            (-half_w, -half_d),
            (0.0, -half_d + border),
        ]));
    }
    out
}

/// Clearance circle around each used extruder's prime position.
///
/// Not subject to adhesion margins themselves, but grown by the border so
/// other objects' brims stay away.
fn prime_blob_areas(settings: &VolumeSettings, border: f32) -> Vec<Vec<Polygon2D>> {
    settings
        .used_extruders()
        .map(|extruder| {
            let (x, y) = extruder.prime_position;
            if !extruder.prime_blob_enable || (x == 0.0 && y == 0.0) {
                return Vec::new();
            }
            let (px, py) = settings.machine_to_platform(x, y);
            vec![dilate(&Polygon2D::approximated_circle(PRIME_CLEARANCE), border).translate(px, py)]
        })
        .collect()
}

/// Prime tower footprint, if one is printed
fn prime_tower_area(settings: &VolumeSettings, border: f32) -> Option<Polygon2D> {
    if !settings.prime_tower_enable || settings.prime_tower_size <= 0.0 {
        return None;
    }
    let (x, y) = settings.machine_to_platform(settings.prime_tower_position.0, settings.prime_tower_position.1);
    let mut tower = Polygon2D::approximated_circle(settings.prime_tower_size / 2.0);
    if settings.prime_tower_brim_enable && settings.adhesion != AdhesionType::Raft {
        tower = dilate(&tower, border);
    }
    Some(tower.translate(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicekit_settings::ProfileStore;

    fn settings(pairs: &[(&str, &str)]) -> VolumeSettings {
        let mut profile = ProfileStore::new();
        for (k, v) in pairs {
            profile.put_setting(k, v).expect("put");
        }
        VolumeSettings::from_profile(&profile)
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_brim_size() {
        let s = settings(&[
            ("adhesion_type", "brim"),
            ("brim_line_count", "20"),
            ("skirt_brim_line_width", "0.4"),
            ("initial_layer_line_width_factor", "100"),
        ]);
        assert!(close(bed_adhesion_size(&s), 7.6));
        assert!(close(edge_disallowed_size(&s), 7.6));
    }

    #[test]
    fn test_brim_adds_other_extruders() {
        let s = settings(&[
            ("adhesion_type", "brim"),
            ("brim_line_count", "10"),
            ("extruder_amount", "2"),
            ("skirt_brim_line_width2", "0.6"),
            ("initial_layer_line_width_factor2", "50"),
        ]);
        // 9 lines of 0.4 plus one 0.3 line of the second extruder.
        assert!(close(bed_adhesion_size(&s), 3.6 + 0.3));
    }

    #[test]
    fn test_skirt_and_raft_size() {
        let skirt = settings(&[("skirt_gap", "3"), ("skirt_line_count", "2")]);
        assert!(close(bed_adhesion_size(&skirt), 3.8));

        let raft = settings(&[("adhesion_type", "raft"), ("raft_margin", "15")]);
        assert!(close(bed_adhesion_size(&raft), 15.0));

        let huge = settings(&[
            ("adhesion_type", "raft"),
            ("raft_margin", "500"),
            ("machine_width", "100"),
            ("machine_depth", "80"),
        ]);
        assert!(close(bed_adhesion_size(&huge), 40.0));
    }

    #[test]
    fn test_edge_size_without_adhesion() {
        let s = settings(&[("adhesion_type", "none"), ("infill_wipe_dist", "0.2")]);
        assert!(close(edge_disallowed_size(&s), 0.625));

        let s = settings(&[("adhesion_type", "none"), ("infill_wipe_dist", "2.5")]);
        assert!(close(edge_disallowed_size(&s), 2.5));

        let s = settings(&[("adhesion_type", "none"), ("travel_avoid_other_parts", "False")]);
        assert!(close(edge_disallowed_size(&s), 0.0));
    }

    #[test]
    fn test_edge_size_shields_and_support() {
        let s = settings(&[
            ("adhesion_type", "none"),
            ("draft_shield_enabled", "True"),
            ("draft_shield_dist", "10"),
            ("support_enable", "True"),
            ("support_offset", "0.5"),
        ]);
        assert!(close(edge_disallowed_size(&s), 10.5));

        let s = settings(&[("print_sequence", "one_at_a_time"), ("adhesion_type", "brim")]);
        assert!(close(edge_disallowed_size(&s), ONE_AT_A_TIME_EDGE));
    }

    #[test]
    fn test_raft_thickness() {
        let s = settings(&[
            ("adhesion_type", "raft"),
            ("raft_base_thickness", "0.3"),
            ("raft_interface_thickness", "0.2"),
            ("raft_surface_layers", "2"),
            ("raft_surface_thickness", "0.1"),
            ("raft_airgap", "0.3"),
            ("layer_0_z_overlap", "0.1"),
        ]);
        assert!(close(raft_thickness(&s), 0.9));
        assert_eq!(raft_thickness(&settings(&[("raft_airgap", "0.3")])), 0.0);
    }

    #[test]
    fn test_extra_z_clearance() {
        let s = settings(&[
            ("extruder_amount", "2"),
            ("retraction_hop_enabled", "True"),
            ("retraction_hop", "0.5"),
            ("retraction_hop_enabled2", "True"),
            ("retraction_hop2", "1.5"),
        ]);
        assert!(close(extra_z_clearance(&s), 1.5));
        assert_eq!(extra_z_clearance(&settings(&[("retraction_hop", "2")])), 0.0);
    }

    #[test]
    fn test_rectangular_border_thickness() {
        let s = settings(&[
            ("machine_width", "200"),
            ("machine_depth", "200"),
            ("adhesion_type", "brim"),
        ]);
        let result = compute(&s, 7.6);
        assert_eq!(result.areas.len(), 4);
        let (min, max) = result.areas[0].bounds().expect("left border");
        assert!(close(min.x, -100.0));
        assert!(close(max.x, -92.4));
        assert!(close(min.y, -100.0) && close(max.y, 100.0));
    }

    #[test]
    fn test_nozzle_offset_widens_border() {
        let s = settings(&[
            ("machine_width", "200"),
            ("machine_depth", "200"),
            ("extruder_amount", "2"),
            ("extruder_offset_x1", "18"),
            ("extruder_offset_y1", "0"),
        ]);
        let result = compute(&s, 1.0);
        // Each nozzle loses the strip only the other one can reach.
        let first_right = result.areas[1].bounds().expect("bounds");
        assert!(close(first_right.0.x, 100.0 - 1.0 - 18.0));
        let second_left = result.areas[4].bounds().expect("bounds");
        assert!(close(second_left.1.x, -100.0 + 1.0 + 18.0));
    }

    #[test]
    fn test_elliptic_border() {
        let s = settings(&[
            ("machine_width", "200"),
            ("machine_depth", "200"),
            ("machine_shape", "elliptic"),
        ]);
        let result = compute(&s, 2.0);
        assert_eq!(result.areas.len(), CIRCLE_SEGMENTS + 4);
        for area in &result.areas {
            let (min, max) = area.bounds().expect("bounds");
            assert!(min.x >= -100.001 && max.x <= 100.001);
            assert!(min.y >= -100.001 && max.y <= 100.001);
        }
    }

    #[test]
    fn test_machine_areas_are_dilated_only_with_margin() {
        let s = settings(&[("machine_disallowed_areas", "[[[-10, -10], [10, -10], [10, 10], [-10, 10]]]")]);
        let result = compute(&s, 2.0);
        let grown = result.areas[0].bounds().expect("bounds");
        assert!(close(grown.1.x, 12.0));
        let plain = result.no_brim[0].bounds().expect("bounds");
        assert!(close(plain.1.x, 10.0));
    }

    #[test]
    fn test_prime_blob_position() {
        let s = settings(&[
            ("machine_width", "200"),
            ("machine_depth", "200"),
            ("prime_blob_enable", "True"),
            ("extruder_prime_pos_x", "20"),
            ("extruder_prime_pos_y", "30"),
        ]);
        let result = compute(&s, 0.0);
        let blob = result.areas.last().expect("prime blob");
        let (min, max) = blob.bounds().expect("bounds");
        assert!(close((min.x + max.x) / 2.0, -80.0));
        assert!(close((min.y + max.y) / 2.0, 70.0));
        assert!(close(max.x - min.x, 2.0 * PRIME_CLEARANCE));
    }

    #[test]
    fn test_prime_tower_needs_two_extruders() {
        let tower = [
            ("machine_width", "200"),
            ("machine_depth", "200"),
            ("prime_tower_enable", "True"),
            ("prime_tower_size", "20"),
            ("prime_tower_position_x", "100"),
            ("prime_tower_position_y", "100"),
            ("extruder_offset_y1", "0"),
        ];
        assert_eq!(compute(&settings(&tower), 1.0).areas.len(), 4);

        let mut dual = tower.to_vec();
        dual.push(("extruder_amount", "2"));
        let result = compute(&settings(&dual), 1.0);
        assert_eq!(result.areas.len(), 10);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_prime_tower_collision() {
        let s = settings(&[
            ("machine_width", "200"),
            ("machine_depth", "200"),
            ("extruder_amount", "2"),
            ("extruder_offset_y1", "0"),
            ("prime_tower_enable", "True"),
            ("prime_tower_size", "20"),
            ("prime_tower_position_x", "170"),
            ("prime_tower_position_y", "170"),
            ("prime_blob_enable", "True"),
            ("extruder_prime_pos_x", "170"),
            ("extruder_prime_pos_y", "170"),
        ]);
        let result = compute(&s, 1.0);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(
            result.collisions,
            vec![GeometryError::PrimeTowerCollision { x: 70.0, y: -70.0 }]
        );
        // Borders of both extruders and the first extruder's blob, no tower.
        assert_eq!(result.areas.len(), 9);
    }
}
