//! Engine output parsing and the result of a run

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::io;
use std::path::{Path, PathBuf};

use slicekit_settings::registry::MAX_EXTRUDERS;
use slicekit_settings::ProfileStore;

use crate::model::{filament_cost, filament_weight, format_print_time};
use crate::tags::replace_in_header;

/// Steps that make up the progress of one object
const PROGRESS_STEPS: [&str; 3] = ["inset", "skin", "export"];

/// A recognized engine output line
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    Progress { step: String, current: f64, total: f64 },
    PrintTime(u64),
    Filament { extruder: usize, amount: f64 },
    Replace { key: String, value: String },
    Log(String),
}

impl EngineLine {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let number = |text: &str| text.trim().parse::<f64>().ok();

        if let Some(rest) = line.strip_prefix("Progress:") {
            let mut parts = rest.split(':');
            if let (Some(step), Some(current), Some(total)) = (parts.next(), parts.next(), parts.next()) {
                if let (Some(current), Some(total)) = (number(current), number(total)) {
                    return EngineLine::Progress {
                        step: step.to_string(),
                        current,
                        total,
                    };
                }
            }
        } else if let Some(rest) = line.strip_prefix("Print time:") {
            if let Some(seconds) = number(rest) {
                return EngineLine::PrintTime(seconds.max(0.0) as u64);
            }
        } else if let Some(rest) = line.strip_prefix("Filament:") {
            if let Some(amount) = number(rest) {
                return EngineLine::Filament { extruder: 0, amount };
            }
        } else if let Some(rest) = line.strip_prefix("Filament2:") {
            if let Some(amount) = number(rest) {
                return EngineLine::Filament { extruder: 1, amount };
            }
        } else if let Some(rest) = line.strip_prefix("Replace:") {
            let mut parts = rest.splitn(2, ':');
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                return EngineLine::Replace {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                };
            }
        }
        EngineLine::Log(line.to_string())
    }
}

/// Overall progress across objects and their steps
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    object_count: usize,
    object_nr: usize,
}

impl ProgressTracker {
    pub fn new(object_count: usize) -> Self {
        Self {
            object_count: object_count.max(1),
            object_nr: 0,
        }
    }

    /// Fraction for a progress line; `process` advances to the next object
    pub fn update(&mut self, step: &str, current: f64, total: f64) -> Option<f32> {
        if step == "process" {
            self.object_nr += 1;
            return None;
        }
        let index = PROGRESS_STEPS.iter().position(|s| *s == step)?;
        if total <= 0.0 {
            return None;
        }
        let steps = PROGRESS_STEPS.len() as f64;
        let step_fraction = (current / total) / steps + index as f64 / steps;
        let objects = self.object_count as f64;
        let fraction = step_fraction / objects + self.object_nr as f64 / objects;
        Some(fraction.clamp(0.0, 1.0) as f32)
    }
}

/// What a finished engine run produced
#[derive(Debug, Clone, Default)]
pub struct EngineResult {
    pub(crate) output: PathBuf,
    pub(crate) print_time_seconds: Option<u64>,
    pub(crate) filament_mm: [f64; MAX_EXTRUDERS],
    pub(crate) replace: BTreeMap<String, String>,
    pub(crate) log: Vec<String>,
    pub(crate) post_process_error: Option<String>,
}

impl EngineResult {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Fold one output line into the result.
    ///
    /// `volumetric_diameter` converts filament volume to length.
    pub(crate) fn record(&mut self, line: EngineLine, volumetric_diameter: Option<f64>) {
        match line {
            EngineLine::PrintTime(seconds) => self.print_time_seconds = Some(seconds),
            EngineLine::Filament { extruder, amount } => {
                let amount = match volumetric_diameter {
                    Some(diameter) if diameter > 0.0 => {
                        let radius = diameter / 2.0;
                        amount / (PI * radius * radius)
                    }
                    _ => amount,
                };
                if let Some(slot) = self.filament_mm.get_mut(extruder) {
                    *slot = amount;
                }
            }
            EngineLine::Replace { key, value } => {
                self.replace.insert(key, value);
            }
            EngineLine::Log(text) => self.log.push(text),
            EngineLine::Progress { .. } => {}
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn print_time_seconds(&self) -> Option<u64> {
        self.print_time_seconds
    }

    /// Empty when the engine reported no print time
    pub fn print_time_text(&self) -> String {
        self.print_time_seconds.map(format_print_time).unwrap_or_default()
    }

    pub fn filament_mm(&self, extruder: usize) -> f64 {
        self.filament_mm.get(extruder).copied().unwrap_or(0.0)
    }

    /// Weight in kg
    pub fn filament_weight(&self, extruder: usize, profile: &ProfileStore) -> f64 {
        filament_weight(self.filament_mm(extruder), profile)
    }

    pub fn filament_cost(&self, extruder: usize, profile: &ProfileStore) -> Option<String> {
        filament_cost(self.filament_mm(extruder), profile)
    }

    /// `"<m> meter <g> gram"`, or `None` when nothing was extruded
    pub fn filament_amount_text(&self, extruder: usize, profile: &ProfileStore) -> Option<String> {
        let mm = self.filament_mm(extruder);
        if mm == 0.0 {
            return None;
        }
        Some(format!(
            "{:.2} meter {:.0} gram",
            mm / 1000.0,
            self.filament_weight(extruder, profile) * 1000.0
        ))
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn replacements(&self) -> &BTreeMap<String, String> {
        &self.replace
    }

    /// Error of the post-process chain; the output is then unprocessed
    pub fn post_process_error(&self) -> Option<&str> {
        self.post_process_error.as_deref()
    }

    /// The produced G-code with `Replace:` values applied to its header
    pub fn gcode(&self) -> io::Result<String> {
        let data = std::fs::read_to_string(&self.output)?;
        if self.replace.is_empty() {
            return Ok(data);
        }
        Ok(replace_in_header(
            &data,
            self.replace.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        assert_eq!(
            EngineLine::parse("Progress:skin:3:10\n"),
            EngineLine::Progress {
                step: "skin".into(),
                current: 3.0,
                total: 10.0
            }
        );
        assert_eq!(EngineLine::parse("Print time: 5025"), EngineLine::PrintTime(5025));
        assert_eq!(
            EngineLine::parse("Filament2: 1200"),
            EngineLine::Filament { extruder: 1, amount: 1200.0 }
        );
        assert_eq!(
            EngineLine::parse("Replace: #F_AMNT#: 12.5"),
            EngineLine::Replace {
                key: "#F_AMNT#".into(),
                value: "12.5".into()
            }
        );
        assert_eq!(EngineLine::parse("Progress:bad"), EngineLine::Log("Progress:bad".into()));
    }

    #[test]
    fn test_progress_over_objects() {
        let mut tracker = ProgressTracker::new(2);
        assert_eq!(tracker.update("slice", 1.0, 2.0), None);
        assert_eq!(tracker.update("inset", 0.0, 10.0), Some(0.0));
        let f = tracker.update("export", 10.0, 10.0).expect("fraction");
        assert!((f - 0.5).abs() < 1e-6);
        assert_eq!(tracker.update("process", 1.0, 1.0), None);
        let f = tracker.update("skin", 5.0, 10.0).expect("fraction");
        assert!((f - (0.5 + 0.5 * 0.5)).abs() < 1e-6, "{f}");
    }

    #[test]
    fn test_volumetric_filament() {
        let mut result = EngineResult::new("out.gcode");
        let area = PI * 1.0 * 1.0;
        result.record(EngineLine::Filament { extruder: 0, amount: area * 100.0 }, Some(2.0));
        assert!((result.filament_mm(0) - 100.0).abs() < 1e-9);
        assert_eq!(result.filament_mm(7), 0.0);
    }

    #[test]
    fn test_texts() {
        let profile = ProfileStore::new();
        let mut result = EngineResult::new("out.gcode");
        assert_eq!(result.print_time_text(), "");
        assert_eq!(result.filament_amount_text(0, &profile), None);

        result.record(EngineLine::PrintTime(3_900), None);
        result.record(EngineLine::Filament { extruder: 0, amount: 2_500.0 }, None);
        assert_eq!(result.print_time_text(), "1 hour 5 minutes");
        let text = result.filament_amount_text(0, &profile).expect("amount");
        assert!(text.starts_with("2.50 meter "), "{text}");
    }

    #[test]
    fn test_gcode_applies_replacements() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("out.gcode");
        std::fs::write(&path, ";FLAVOR:UltiGCode\n;TIME:_______\nG1 X1\n").expect("write");

        let mut result = EngineResult::new(&path);
        result.record(EngineLine::parse("Replace: _______: 42"), None);
        assert_eq!(result.gcode().expect("read"), ";FLAVOR:UltiGCode\n;TIME:42     \nG1 X1\n");
    }
}
