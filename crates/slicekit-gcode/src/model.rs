//! Parsed G-code document model.
//!
//! Points are stored in machine coordinates as read from the file: `x`
//! and `y` on the platform, `z` the nozzle height.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use slicekit_core::Vec3;
use slicekit_settings::{ProfileStore, SettingsResult};

/// How the nozzle moves along a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathKind {
    /// Travel without extrusion
    Move,
    /// Positive extrusion
    Extrude,
    /// Negative extrusion
    Retract,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathKind::Move => "move",
            PathKind::Extrude => "extrude",
            PathKind::Retract => "retract",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature a path belongs to, from `;TYPE:` markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PathType {
    WallOuter,
    WallInner,
    Skin,
    Fill,
    Support,
    SupportInterface,
    Skirt,
    PrimeTower,
    #[default]
    Custom,
}

impl PathType {
    /// Parse a marker name such as `WALL-OUTER`
    pub fn from_marker(name: &str) -> Option<Self> {
        let path_type = match name.trim() {
            "WALL-OUTER" => PathType::WallOuter,
            "WALL-INNER" => PathType::WallInner,
            "SKIN" => PathType::Skin,
            "FILL" => PathType::Fill,
            "SUPPORT" => PathType::Support,
            "SUPPORT-INTERFACE" => PathType::SupportInterface,
            "SKIRT" => PathType::Skirt,
            "PRIME-TOWER" => PathType::PrimeTower,
            "CUSTOM" => PathType::Custom,
            _ => return None,
        };
        Some(path_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PathType::WallOuter => "WALL-OUTER",
            PathType::WallInner => "WALL-INNER",
            PathType::Skin => "SKIN",
            PathType::Fill => "FILL",
            PathType::Support => "SUPPORT",
            PathType::SupportInterface => "SUPPORT-INTERFACE",
            PathType::Skirt => "SKIRT",
            PathType::PrimeTower => "PRIME-TOWER",
            PathType::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polyline of one kind and feature.
///
/// Always holds at least its start point; `extrusion[i]` is the filament
/// fed while moving to `points[i]` and is `0` for the start point.
#[derive(Debug, Clone, PartialEq)]
pub struct GcodePath {
    pub kind: PathKind,
    pub path_type: PathType,
    pub layer_thickness: f32,
    pub extruder: usize,
    pub points: Vec<Vec3>,
    pub extrusion: Vec<f32>,
}

impl GcodePath {
    pub fn new(
        kind: PathKind,
        path_type: PathType,
        layer_thickness: f32,
        extruder: usize,
        start: Vec3,
    ) -> Self {
        Self {
            kind,
            path_type,
            layer_thickness,
            extruder,
            points: vec![start],
            extrusion: vec![0.0],
        }
    }

    pub fn push(&mut self, point: Vec3, extrusion: f32) {
        self.points.push(point);
        self.extrusion.push(extrusion);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_point(&self) -> Vec3 {
        self.points.last().copied().unwrap_or(Vec3::ZERO)
    }

    /// Filament fed along the whole path
    pub fn total_extrusion(&self) -> f64 {
        self.extrusion.iter().map(|&e| e as f64).sum()
    }

    /// Travelled distance
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].as_dvec3().distance(w[1].as_dvec3())).sum()
    }
}

/// Paths between two layer markers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcodeLayer {
    pub paths: Vec<GcodePath>,
}

impl GcodeLayer {
    pub fn new(paths: Vec<GcodePath>) -> Self {
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths of one kind
    pub fn paths_of(&self, kind: PathKind) -> impl Iterator<Item = &GcodePath> {
        self.paths.iter().filter(move |p| p.kind == kind)
    }
}

/// Segment flagged by a `;Model error(<kind>): (...) (...)` comment
#[derive(Debug, Clone, PartialEq)]
pub struct ModelError {
    pub kind: String,
    pub from: Vec3,
    pub to: Vec3,
}

/// Heater targets seen in the file; the highest target per heater is kept
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Temperatures {
    pub nozzle: BTreeMap<usize, f32>,
    pub bed: Option<f32>,
}

impl Temperatures {
    pub fn record_nozzle(&mut self, extruder: usize, target: f32) {
        let entry = self.nozzle.entry(extruder).or_insert(target);
        *entry = entry.max(target);
    }

    pub fn record_bed(&mut self, target: f32) {
        self.bed = Some(self.bed.map_or(target, |b| b.max(target)));
    }

    pub fn nozzle(&self, extruder: usize) -> Option<f32> {
        self.nozzle.get(&extruder).copied()
    }
}

/// Result of interpreting a G-code file
#[derive(Debug, Clone, Default)]
pub struct GcodeDocument {
    pub layers: Vec<GcodeLayer>,
    /// Highest cumulative filament length reached, in mm
    pub extrusion_amount: f64,
    /// Estimated duration of all moves and dwells
    pub total_move_time_minute: f64,
    pub source: Option<PathBuf>,
    /// Last `;CURA_PROFILE_STRING:` snapshot in the file
    pub embedded_profile: Option<String>,
    pub model_errors: Vec<ModelError>,
    pub temperatures: Temperatures,
}

impl GcodeDocument {
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &GcodePath> {
        self.layers.iter().flat_map(|l| l.paths.iter())
    }

    /// Filament weight in kg
    pub fn calculate_weight(&self, profile: &ProfileStore) -> f64 {
        filament_weight(self.extrusion_amount, profile)
    }

    /// Filament cost text, `None` when no cost is configured
    pub fn calculate_cost(&self, profile: &ProfileStore) -> Option<String> {
        filament_cost(self.extrusion_amount, profile)
    }

    pub fn print_time_seconds(&self) -> u64 {
        (self.total_move_time_minute * 60.0).max(0.0) as u64
    }

    pub fn print_time_text(&self) -> String {
        format_print_time(self.print_time_seconds())
    }

    /// Load the embedded snapshot into `profile`.
    ///
    /// Returns `false` when the file carried no snapshot.
    pub fn restore_profile(&self, profile: &mut ProfileStore) -> SettingsResult<bool> {
        match &self.embedded_profile {
            Some(snapshot) => {
                profile.load_profile_from_string(snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Weight in kg of `length_mm` of filament
pub fn filament_weight(length_mm: f64, profile: &ProfileStore) -> f64 {
    let radius = profile.get_setting_float("filament_diameter") / 2.0;
    let volume_m3 = length_mm * std::f64::consts::PI * radius * radius / 1e9;
    volume_m3 * profile.get_setting_float("filament_physical_density")
}

/// Cost of `length_mm` of filament.
///
/// `"<per kg> / <per m>"` when both prices are set, a single figure when
/// one is, `None` otherwise.
pub fn filament_cost(length_mm: f64, profile: &ProfileStore) -> Option<String> {
    let cost_kg = profile.get_setting_float("filament_cost_kg");
    let cost_meter = profile.get_setting_float("filament_cost_meter");
    let by_weight = filament_weight(length_mm, profile) * cost_kg;
    let by_length = length_mm / 1000.0 * cost_meter;
    match (cost_kg > 0.0, cost_meter > 0.0) {
        (true, true) => Some(format!("{:.2} / {:.2}", by_weight, by_length)),
        (true, false) => Some(format!("{:.2}", by_weight)),
        (false, true) => Some(format!("{:.2}", by_length)),
        (false, false) => None,
    }
}

/// `N minutes`, `1 hour N minutes` or `N hours N minutes`
pub fn format_print_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds / 60) % 60;
    match hours {
        0 => format!("{} minutes", minutes),
        1 => format!("1 hour {} minutes", minutes),
        _ => format!("{} hours {} minutes", hours, minutes),
    }
}
