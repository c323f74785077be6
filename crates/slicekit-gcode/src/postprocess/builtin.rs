//! Built-in plugins.
//!
//! Both act at the first move that reaches a target height once printing
//! proper has started (after the first `;LAYER:` marker), so moves in the
//! start snippet never trigger them.

use std::fs;
use std::path::Path;

use slicekit_core::PluginError;

use super::plugin::{PluginInfo, PluginParams, PostProcessPlugin};
use crate::interpreter::code_float;

const PAUSE_HEADER: &str = "#Name: PauseAtZ
#Info: Pause the printer at a certain height
#Type: postprocess
#Param: pauseLevel(float:5.0) Pause height (mm)
#Param: parkX(float:190) Head park X (mm)
#Param: parkY(float:190) Head park Y (mm)
#Param: retractAmount(float:5) Retraction amount (mm)
";

const TWEAK_HEADER: &str = "#Name: TweakAtZ
#Info: Change printing parameters at a given height
#Type: postprocess
#Param: targetZ(float:5.0) Z height to tweak at (mm)
#Param: speed(int:) New speed (%)
#Param: flowrate(int:) New flow rate (%)
#Param: platformTemp(int:) New bed temperature (deg C)
#Param: extruderOne(int:) New extruder 1 temperature (deg C)
#Param: extruderTwo(int:) New extruder 2 temperature (deg C)
#Param: fanSpeed(int:) New fan speed (0-255 PWM)
";

fn header_info(header: &str, name: &str) -> PluginInfo {
    PluginInfo::parse_header(header).unwrap_or_else(|| PluginInfo::new(name))
}

/// Head position tracked while scanning a file
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Head {
    x: f64,
    y: f64,
    z: f64,
    e: f64,
}

impl Head {
    /// Update from a line; returns the new Z when the line is a move with Z
    fn feed(&mut self, line: &str) -> Option<f64> {
        let code = line.split(';').next().unwrap_or("").trim();
        let (word, params) = code.split_once(char::is_whitespace).unwrap_or((code, ""));
        match word {
            "G0" | "G1" => {
                self.x = code_float(params, 'X').unwrap_or(self.x);
                self.y = code_float(params, 'Y').unwrap_or(self.y);
                self.e = code_float(params, 'E').unwrap_or(self.e);
                let z = code_float(params, 'Z')?;
                self.z = z;
                Some(z)
            }
            "G92" => {
                self.e = code_float(params, 'E').unwrap_or(self.e);
                None
            }
            _ => None,
        }
    }
}

/// Index of the first printing move at or above `target`, with the head
/// state just before it
fn find_height(lines: &[&str], target: f64) -> Option<(usize, Head)> {
    let mut head = Head::default();
    let mut printing = false;
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with(";LAYER:") {
            printing = true;
            continue;
        }
        let before = head;
        if let Some(z) = head.feed(line) {
            if printing && z >= target {
                return Some((i, before));
            }
        }
    }
    None
}

fn read_lines(path: &Path, function: &str) -> Result<String, PluginError> {
    fs::read_to_string(path).map_err(|e| PluginError::failed("IOError", e.to_string(), function))
}

fn write_with_insert(
    path: &Path,
    text: &str,
    index: usize,
    insert: &str,
    function: &str,
) -> Result<(), PluginError> {
    let mut out = String::with_capacity(text.len() + insert.len());
    for (i, line) in text.lines().enumerate() {
        if i == index {
            out.push_str(insert);
        }
        out.push_str(line);
        out.push('\n');
    }
    fs::write(path, out).map_err(|e| PluginError::failed("IOError", e.to_string(), function))
}

/// Parks the head and waits for the user at a given height
#[derive(Debug, Clone)]
pub struct PauseAtZ {
    info: PluginInfo,
}

impl Default for PauseAtZ {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseAtZ {
    pub fn new() -> Self {
        Self {
            info: header_info(PAUSE_HEADER, "PauseAtZ"),
        }
    }
}

impl PostProcessPlugin for PauseAtZ {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn transform(&self, path: &Path, params: &PluginParams) -> Result<(), PluginError> {
        let level = params.float("pauseLevel").unwrap_or(5.0);
        let park_x = params.float("parkX").unwrap_or(190.0);
        let park_y = params.float("parkY").unwrap_or(190.0);
        let retract = params.float("retractAmount").unwrap_or(5.0);
        if retract < 0.0 {
            return Err(PluginError::failed(
                "ValueError",
                format!("retractAmount must not be negative, got {}", retract),
                "PauseAtZ::transform",
            ));
        }

        let text = read_lines(path, "PauseAtZ::transform")?;
        let lines: Vec<&str> = text.lines().collect();
        let Some((index, head)) = find_height(&lines, level) else {
            tracing::info!("PauseAtZ: print never reaches {:.2} mm", level);
            return Ok(());
        };

        let lift = if head.z + 1.0 < 15.0 { 15.0 } else { head.z + 1.0 };
        let mut block = String::new();
        block.push_str(&format!(";PauseAtZ at {:.2} mm\n", level));
        block.push_str("M83\n");
        block.push_str(&format!("G1 E-{:.5} F6000\n", retract));
        block.push_str(&format!("G1 Z{:.3} F300\n", lift));
        block.push_str(&format!("G1 X{:.3} Y{:.3} F9000\n", park_x, park_y));
        block.push_str("M84 E0\n");
        block.push_str("M0\n");
        block.push_str(&format!("G1 X{:.3} Y{:.3} F9000\n", head.x, head.y));
        block.push_str(&format!("G1 Z{:.3} F300\n", head.z));
        block.push_str(&format!("G1 E{:.5} F6000\n", retract));
        block.push_str("M82\n");
        block.push_str(&format!("G92 E{:.5}\n", head.e));

        write_with_insert(path, &text, index, &block, "PauseAtZ::transform")?;
        tracing::info!("PauseAtZ: inserted pause before line {}", index + 1);
        Ok(())
    }
}

/// Changes speed, flow, temperatures or fan from a given height on
#[derive(Debug, Clone)]
pub struct TweakAtZ {
    info: PluginInfo,
}

impl Default for TweakAtZ {
    fn default() -> Self {
        Self::new()
    }
}

impl TweakAtZ {
    pub fn new() -> Self {
        Self {
            info: header_info(TWEAK_HEADER, "TweakAtZ"),
        }
    }
}

impl PostProcessPlugin for TweakAtZ {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn transform(&self, path: &Path, params: &PluginParams) -> Result<(), PluginError> {
        let target = params.float("targetZ").unwrap_or(5.0);

        let mut commands = Vec::new();
        if let Some(speed) = params.int("speed") {
            commands.push(format!("M220 S{}", speed));
        }
        if let Some(flow) = params.int("flowrate") {
            commands.push(format!("M221 S{}", flow));
        }
        if let Some(bed) = params.int("platformTemp") {
            commands.push(format!("M140 S{}", bed));
        }
        if let Some(temp) = params.int("extruderOne") {
            commands.push(format!("M104 T0 S{}", temp));
        }
        if let Some(temp) = params.int("extruderTwo") {
            commands.push(format!("M104 T1 S{}", temp));
        }
        if let Some(fan) = params.int("fanSpeed") {
            if !(0..=255).contains(&fan) {
                return Err(PluginError::failed(
                    "ValueError",
                    format!("fanSpeed must be within 0-255, got {}", fan),
                    "TweakAtZ::transform",
                ));
            }
            commands.push(format!("M106 S{}", fan));
        }
        if commands.is_empty() {
            tracing::debug!("TweakAtZ: nothing to change");
            return Ok(());
        }

        let text = read_lines(path, "TweakAtZ::transform")?;
        let lines: Vec<&str> = text.lines().collect();
        let Some((index, _)) = find_height(&lines, target) else {
            tracing::info!("TweakAtZ: print never reaches {:.2} mm", target);
            return Ok(());
        };

        let mut block = format!(";TweakAtZ at {:.2} mm\n", target);
        for command in &commands {
            block.push_str(command);
            block.push('\n');
        }
        write_with_insert(path, &text, index, &block, "TweakAtZ::transform")
    }
}
