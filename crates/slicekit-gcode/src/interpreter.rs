//! Line-by-line G-code interpreter.
//!
//! Feeds lines through a small machine model (position, offsets, extruder
//! state) and groups the resulting moves into layers of typed paths.
//! Bad input never fails: unknown codes and malformed numbers are logged
//! and skipped.

use glam::DVec3;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use slicekit_core::Vec3;
use slicekit_settings::registry::MAX_EXTRUDERS;
use slicekit_settings::ProfileStore;

use crate::model::{
    GcodeDocument, GcodeLayer, GcodePath, ModelError, PathKind, PathType, Temperatures,
};

/// Feed rate before the first `F` word, mm/min
pub const DEFAULT_FEED_RATE: f64 = 3600.0;
const DEFAULT_LAYER_THICKNESS: f32 = 0.1;
const INCH: f64 = 25.4;
const PROFILE_COMMENT: &str = "CURA_PROFILE_STRING:";

fn model_error_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let n = r"([0-9.\-e]*)";
        Regex::new(&format!(
            r";Model error\(([a-z ]*)\): \({n}, {n}, {n}\) \({n}, {n}, {n}\)"
        ))
        .expect("valid regex")
    })
}

/// Value of the first word starting with `letter`.
///
/// `None` when the word is absent or its number does not parse.
pub fn code_float(words: &str, letter: char) -> Option<f64> {
    words
        .split_whitespace()
        .find(|w| w.starts_with(letter))
        .and_then(|w| w[letter.len_utf8()..].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Integer variant of [`code_float`]
pub fn code_int(words: &str, letter: char) -> Option<i64> {
    words
        .split_whitespace()
        .find(|w| w.starts_with(letter))
        .and_then(|w| w[letter.len_utf8()..].parse::<i64>().ok())
}

/// Split a stripped line into its command word and parameters,
/// skipping an `N` line number
fn split_command(line: &str) -> Option<(char, &str, &str)> {
    let mut rest = line.trim();
    if rest.starts_with('N') {
        rest = rest.split_once(char::is_whitespace).map_or("", |(_, r)| r.trim_start());
    }
    let (word, params) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let mut chars = word.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    Some((letter, chars.as_str(), params))
}

/// Streaming G-code interpreter
#[derive(Debug)]
pub struct Interpreter {
    offsets: Vec<(f64, f64)>,
    layers: Vec<GcodeLayer>,
    finished_paths: Vec<GcodePath>,
    current: GcodePath,
    pos: DVec3,
    pos_offset: DVec3,
    current_e: f64,
    total_extrusion: f64,
    max_extrusion: f64,
    extruder: usize,
    multipliers: BTreeMap<usize, f64>,
    absolute_e: bool,
    absolute_pos: bool,
    scale: f64,
    feed_rate: f64,
    path_type: PathType,
    layer_thickness: f32,
    seen_layer_marker: bool,
    move_time_minute: f64,
    embedded_profile: Option<String>,
    model_errors: Vec<ModelError>,
    temperatures: Temperatures,
    lines: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter without nozzle offsets
    pub fn new() -> Self {
        Self::with_extruder_offsets(Vec::new())
    }

    /// `offsets[n]` is the nozzle offset of extruder `n`
    pub fn with_extruder_offsets(offsets: Vec<(f64, f64)>) -> Self {
        Self {
            offsets,
            layers: Vec::new(),
            finished_paths: Vec::new(),
            current: GcodePath::new(
                PathKind::Move,
                PathType::Custom,
                DEFAULT_LAYER_THICKNESS,
                0,
                Vec3::ZERO,
            ),
            pos: DVec3::ZERO,
            pos_offset: DVec3::ZERO,
            current_e: 0.0,
            total_extrusion: 0.0,
            max_extrusion: 0.0,
            extruder: 0,
            multipliers: BTreeMap::new(),
            absolute_e: true,
            absolute_pos: true,
            scale: 1.0,
            feed_rate: DEFAULT_FEED_RATE,
            path_type: PathType::Custom,
            layer_thickness: DEFAULT_LAYER_THICKNESS,
            seen_layer_marker: false,
            move_time_minute: 0.0,
            embedded_profile: None,
            model_errors: Vec::new(),
            temperatures: Temperatures::default(),
            lines: 0,
        }
    }

    /// Interpreter using the profile's extruder offsets
    pub fn from_profile(profile: &ProfileStore) -> Self {
        Self::with_extruder_offsets((0..MAX_EXTRUDERS).map(|n| profile.nozzle_offset(n)).collect())
    }

    /// Interpret a whole text at once
    pub fn parse_str(text: &str) -> GcodeDocument {
        let mut interpreter = Self::new();
        for line in text.lines() {
            interpreter.feed_line(line);
        }
        interpreter.finish()
    }

    pub fn lines_read(&self) -> u64 {
        self.lines
    }

    pub fn layers_closed(&self) -> usize {
        self.layers.len()
    }

    /// Interpret one line
    pub fn feed_line(&mut self, line: &str) {
        self.lines += 1;
        let mut code = line;

        if line.trim_start().starts_with(";TYPE:") {
            let name = &line.trim_start()[";TYPE:".len()..];
            self.path_type = PathType::from_marker(name).unwrap_or_else(|| {
                tracing::trace!("Unknown path type '{}', using CUSTOM", name.trim());
                PathType::Custom
            });
        }

        if let Some(idx) = line.find(';') {
            self.handle_comment(line, line[idx + 1..].trim());
            code = &line[..idx];
        }

        let Some((letter, number, params)) = split_command(code) else {
            return;
        };
        let Ok(number) = number.parse::<i64>() else {
            tracing::debug!("Skipping malformed line {}: '{}'", self.lines, line.trim());
            return;
        };

        match letter {
            'G' => self.handle_g(number, params),
            'M' => self.handle_m(number, params),
            'T' => self.switch_extruder(number.max(0) as usize),
            _ => tracing::trace!("Ignoring line {}: '{}'", self.lines, line.trim()),
        }
    }

    fn handle_comment(&mut self, line: &str, comment: &str) {
        match comment {
            "fill" => self.path_type = PathType::Fill,
            "perimeter" => self.path_type = PathType::WallInner,
            "skirt" => self.path_type = PathType::Skirt,
            _ => {}
        }

        if comment.starts_with("LAYER:") {
            self.layer_marker();
        } else if let Some(snapshot) = comment.strip_prefix(PROFILE_COMMENT) {
            self.embedded_profile = Some(snapshot.trim().to_string());
        } else if comment.starts_with("Model error") {
            self.record_model_error(line);
        }
    }

    fn record_model_error(&mut self, line: &str) {
        let Some(caps) = model_error_regex().captures(line) else {
            tracing::debug!("Unreadable model error comment: '{}'", line.trim());
            return;
        };
        let num = |i: usize| caps[i].parse::<f32>().unwrap_or(0.0);
        self.model_errors.push(ModelError {
            kind: caps[1].to_string(),
            from: Vec3::new(num(2), num(3), num(4)),
            to: Vec3::new(num(5), num(6), num(7)),
        });
    }

    /// The first marker opens the first layer; later ones close the
    /// current layer and continue from its last point
    fn layer_marker(&mut self) {
        if !self.seen_layer_marker {
            self.seen_layer_marker = true;
            return;
        }
        let next = GcodePath::new(
            self.current.kind,
            self.path_type,
            self.layer_thickness,
            self.extruder,
            self.current.last_point(),
        );
        let last = std::mem::replace(&mut self.current, next);
        let mut paths = std::mem::take(&mut self.finished_paths);
        paths.push(last);
        self.layers.push(close_layer(paths));
    }

    fn switch_extruder(&mut self, extruder: usize) {
        if self.extruder > 0 {
            let (x, y) = self.offset_of(self.extruder);
            self.pos_offset[0] -= x;
            self.pos_offset[1] -= y;
        }
        self.extruder = extruder;
        if extruder > 0 {
            let (x, y) = self.offset_of(extruder);
            self.pos_offset[0] += x;
            self.pos_offset[1] += y;
        }
    }

    fn offset_of(&self, extruder: usize) -> (f64, f64) {
        self.offsets.get(extruder).copied().unwrap_or((0.0, 0.0))
    }

    fn handle_g(&mut self, code: i64, params: &str) {
        match code {
            0 | 1 => self.linear_move(params),
            4 => {
                if let Some(s) = code_float(params, 'S') {
                    self.move_time_minute += s / 60.0;
                }
                if let Some(p) = code_float(params, 'P') {
                    self.move_time_minute += p / 60.0 / 1000.0;
                }
            }
            // Firmware retract and recover
            10 | 11 => {}
            20 => self.scale = INCH,
            21 => self.scale = 1.0,
            28 => {
                let axes = ['X', 'Y', 'Z'].map(|a| params.split_whitespace().any(|w| w.starts_with(a)));
                if axes.iter().all(|named| !named) {
                    self.pos = DVec3::ZERO;
                } else {
                    for (axis, named) in axes.iter().enumerate() {
                        if *named {
                            self.pos[axis] = 0.0;
                        }
                    }
                }
            }
            90 => self.absolute_pos = true,
            91 => self.absolute_pos = false,
            92 => {
                if let Some(e) = code_float(params, 'E') {
                    self.current_e = e;
                }
                for (axis, letter) in ['X', 'Y', 'Z'].into_iter().enumerate() {
                    if let Some(v) = code_float(params, letter) {
                        self.pos_offset[axis] = self.pos[axis] - v;
                    }
                }
            }
            _ => tracing::debug!("Unknown G code: G{}", code),
        }
    }

    fn linear_move(&mut self, params: &str) {
        let old = self.pos;
        for (axis, letter) in ['X', 'Y', 'Z'].into_iter().enumerate() {
            if let Some(v) = code_float(params, letter) {
                if self.absolute_pos {
                    self.pos[axis] = v * self.scale + self.pos_offset[axis];
                } else {
                    self.pos[axis] += v * self.scale;
                }
            }
        }

        if let Some(f) = code_float(params, 'F').filter(|f| *f > 0.0) {
            self.feed_rate = f;
        }
        self.move_time_minute += old.distance(self.pos) / self.feed_rate;

        let mut kind = PathKind::Move;
        let mut e = 0.0;
        if let Some(value) = code_float(params, 'E') {
            e = if self.absolute_e { value - self.current_e } else { value };
            if e > 0.0 {
                kind = PathKind::Extrude;
            } else if e < 0.0 {
                kind = PathKind::Retract;
            }
            self.total_extrusion += e;
            self.current_e += e;
            self.max_extrusion = self.max_extrusion.max(self.total_extrusion);
        }

        if kind == PathKind::Move && old[2] != self.pos[2] {
            let mut old_z = old[2];
            // Dropping back to the bed after a long lift starts from zero
            if old_z > self.pos[2] && old_z - self.pos[2] > 5.0 && self.pos[2] < 1.0 {
                old_z = 0.0;
            }
            self.layer_thickness = (old_z - self.pos[2]).abs() as f32;
        }

        if self.current.kind != kind || self.current.path_type != self.path_type {
            let next = GcodePath::new(
                kind,
                self.path_type,
                self.layer_thickness,
                self.extruder,
                self.current.last_point(),
            );
            let done = std::mem::replace(&mut self.current, next);
            self.finished_paths.push(done);
        }

        let multiplier = self.multipliers.get(&self.extruder).copied().unwrap_or(1.0);
        self.current.push(self.pos.as_vec3(), (e * multiplier) as f32);
    }

    fn target_extruder(&self, params: &str) -> usize {
        code_int(params, 'T').map_or(self.extruder, |t| t.max(0) as usize)
    }

    fn handle_m(&mut self, code: i64, params: &str) {
        match code {
            82 => self.absolute_e = true,
            83 => self.absolute_e = false,
            104 | 109 => {
                if let Some(s) = code_float(params, 'S') {
                    let extruder = self.target_extruder(params);
                    self.temperatures.record_nozzle(extruder, s as f32);
                }
            }
            140 | 190 => {
                if let Some(s) = code_float(params, 'S') {
                    self.temperatures.record_bed(s as f32);
                }
            }
            221 => {
                if let Some(s) = code_float(params, 'S') {
                    let extruder = self.target_extruder(params);
                    self.multipliers.insert(extruder, s / 100.0);
                }
            }
            // Messages, power, steppers, steps/mm, extruder on/off, fan,
            // RPM, line numbers, PWM, LCD, temperature report
            0 | 1 | 80 | 81 | 84 | 92 | 101 | 103 | 105 | 106 | 107 | 108 | 110 | 113 | 117 => {}
            _ => tracing::debug!("Unknown M code: M{}", code),
        }
    }

    /// Close the last layer and build the document
    pub fn finish(mut self) -> GcodeDocument {
        let mut paths = std::mem::take(&mut self.finished_paths);
        paths.push(self.current);
        self.layers.push(close_layer(paths));
        tracing::debug!(
            "Interpreted {} lines: {} layers, {:.1} mm filament, {:.1} min",
            self.lines,
            self.layers.len(),
            self.max_extrusion,
            self.move_time_minute
        );
        GcodeDocument {
            layers: self.layers,
            extrusion_amount: self.max_extrusion,
            total_move_time_minute: self.move_time_minute,
            source: None,
            embedded_profile: self.embedded_profile,
            model_errors: self.model_errors,
            temperatures: self.temperatures,
        }
    }
}

/// Drop start-point-only paths when the layer holds real ones
fn close_layer(mut paths: Vec<GcodePath>) -> GcodeLayer {
    if paths.iter().any(|p| p.len() > 1) {
        paths.retain(|p| p.len() > 1);
    }
    GcodeLayer::new(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_lookup() {
        assert_eq!(code_float("X10 Y-2.5 E0.5", 'Y'), Some(-2.5));
        assert_eq!(code_float("X10 Yabc", 'Y'), None);
        assert_eq!(code_float("X10", 'E'), None);
        assert_eq!(code_int("S210 T1", 'T'), Some(1));
        assert_eq!(code_int("S210 T1.5", 'T'), None);
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("G1 X10"), Some(('G', "1", "X10")));
        assert_eq!(split_command("N12 M104 S200"), Some(('M', "104", "S200")));
        assert_eq!(split_command("T1"), Some(('T', "1", "")));
        assert_eq!(split_command("   "), None);
    }

    #[test]
    fn test_relative_moves_and_inches() {
        let doc = Interpreter::parse_str("G20\nG91\nG1 X1 Y1\nG1 X1\nG90\nG21\nG1 Z2");
        let last = doc.paths().last().expect("path").last_point();
        assert!((last.x - 50.8).abs() < 1e-4);
        assert!((last.y - 25.4).abs() < 1e-4);
        assert!((last.z - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_relative_extrusion_and_retract() {
        let doc = Interpreter::parse_str("M83\nG1 X5 E2\nG1 E-1\nG1 X10 E1.5");
        let kinds: Vec<PathKind> = doc.paths().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PathKind::Extrude, PathKind::Retract, PathKind::Extrude]);
        // 2 - 1 + 1.5, peak reached at the end
        assert!((doc.extrusion_amount - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_g92_resets_extruder_and_offsets() {
        let doc = Interpreter::parse_str("G1 X10 E5\nG92 E0 X0\nG1 X5 E1");
        assert!((doc.extrusion_amount - 6.0).abs() < 1e-9);
        let last = doc.paths().last().expect("path").last_point();
        assert!((last.x - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_home_named_axes() {
        let doc = Interpreter::parse_str("G1 X10 Y10 Z5\nG28 X0\nG1 Y12");
        let last = doc.paths().last().expect("path").last_point();
        assert_eq!((last.x, last.y, last.z), (0.0, 12.0, 5.0));

        let doc = Interpreter::parse_str("G1 X10 Y10 Z5\nG28\nG1 Y12");
        let last = doc.paths().last().expect("path").last_point();
        assert_eq!((last.x, last.y, last.z), (0.0, 12.0, 0.0));
    }

    #[test]
    fn test_move_time_and_dwell() {
        let doc = Interpreter::parse_str("G1 X30 Y40 F600\nG4 S30\nG4 P30000");
        // 50 mm at 600 mm/min, then a minute of dwell
        assert!((doc.total_move_time_minute - (50.0 / 600.0 + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tool_change_offsets() {
        let mut interpreter = Interpreter::with_extruder_offsets(vec![(0.0, 0.0), (18.0, 0.0)]);
        for line in ["T1", "G1 X10 Y0", "T0", "G1 X10 Y0"] {
            interpreter.feed_line(line);
        }
        let doc = interpreter.finish();
        let points = &doc.layers[0].paths[0].points;
        assert!((points[1].x - 28.0).abs() < 1e-4);
        assert!((points[2].x - 10.0).abs() < 1e-4);
        assert_eq!(doc.layers[0].paths[0].extruder, 0);
    }

    #[test]
    fn test_temperature_param_is_not_a_tool_change() {
        let doc = Interpreter::parse_str("M104 S210 T1\nM109 S200\nM190 S60\nG1 X1 E1");
        assert_eq!(doc.temperatures.nozzle(1), Some(210.0));
        assert_eq!(doc.temperatures.nozzle(0), Some(200.0));
        assert_eq!(doc.temperatures.bed, Some(60.0));
        assert_eq!(doc.paths().last().map(|p| p.extruder), Some(0));
    }

    #[test]
    fn test_flow_multiplier() {
        let doc = Interpreter::parse_str("M221 S50\nG1 X1 E2");
        let path = doc.paths().last().expect("path");
        assert_eq!(path.extrusion, vec![0.0, 1.0]);
        assert!((doc.extrusion_amount - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_slic3r_comments_and_unknown_codes() {
        let doc = Interpreter::parse_str("G1 X1 E1 ; perimeter\nG1 X2 E2 ; fill\nG5 X1\nM999\nGxyz\n");
        let types: Vec<PathType> = doc.paths().map(|p| p.path_type).collect();
        assert_eq!(types, vec![PathType::WallInner, PathType::Fill]);
    }

    #[test]
    fn test_layer_thickness_from_z_moves() {
        let doc = Interpreter::parse_str(
            ";LAYER:0\nG0 Z0.3\nG1 X1 E1\n;LAYER:1\nG0 Z0.5\nG1 X2 E2\nG0 Z10\nG0 Z0.2\nG1 X3 E3",
        );
        assert_eq!(doc.layer_count(), 2);
        let thickness: Vec<f32> = doc.layers[1].paths_of(PathKind::Extrude).map(|p| p.layer_thickness).collect();
        assert!((thickness[0] - 0.2).abs() < 1e-5);
        assert!((thickness[1] - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_model_error_and_profile_comments() {
        let doc = Interpreter::parse_str(
            ";Model error(open edge): (1.0, 2.0, 3.0) (4.0, 5.0, -6.5)\n;CURA_PROFILE_STRING:abc\n;CURA_PROFILE_STRING:def\n",
        );
        assert_eq!(doc.model_errors.len(), 1);
        assert_eq!(doc.model_errors[0].kind, "open edge");
        assert_eq!(doc.model_errors[0].to, Vec3::new(4.0, 5.0, -6.5));
        assert_eq!(doc.embedded_profile.as_deref(), Some("def"));
    }

    #[test]
    fn test_empty_input_gives_one_layer() {
        let doc = Interpreter::parse_str("");
        assert_eq!(doc.layer_count(), 1);
        assert_eq!(doc.layers[0].paths.len(), 1);
        assert_eq!(doc.extrusion_amount, 0.0);
    }
}
