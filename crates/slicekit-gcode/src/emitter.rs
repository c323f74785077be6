//! Alteration snippets with `{tag}` substitution.
//!
//! Start and end snippets get machine preparation lines and the profile
//! snapshot around the user's text. Tags resolve to the clock, to header
//! placeholders patched after analysis, or to profile settings.

use chrono::{DateTime, Local};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use slicekit_settings::value::evaluate;
use slicekit_settings::{ProfileStore, SettingsResult};

use crate::tags;

/// Flavor that reads its own header and needs no start snippet
pub const ULTIGCODE: &str = "UltiGCode";
const PROFILE_PREFIX: &str = "CURA_PROFILE_STRING:";
const REPLACE_PREAMBLE: &str = "M101\nM103\n";

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^}\n]*)\}").expect("valid regex"))
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r";[^\n]*\n").expect("valid regex"))
}

/// Whether `tag` occurs in `contents` outside `;` comments
pub fn is_tag_in(tag: &str, contents: &str) -> bool {
    comment_regex().replace_all(contents, "").contains(tag)
}

/// Integral values print without a fraction
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Renders alteration snippets for one profile
#[derive(Debug, Clone)]
pub struct GcodeEmitter<'a> {
    profile: &'a ProfileStore,
    now: DateTime<Local>,
    tags: BTreeMap<String, String>,
}

impl<'a> GcodeEmitter<'a> {
    pub fn new(profile: &'a ProfileStore) -> Self {
        Self {
            profile,
            now: Local::now(),
            tags: BTreeMap::new(),
        }
    }

    /// Use a fixed clock for `{time}`, `{date}` and `{day}`
    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    /// Extra tag resolved before profile settings, e.g. `clear_z`
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    fn profile_string(&self) -> SettingsResult<String> {
        self.profile.get_profile_string()
    }

    /// Replacement for `{tag}`, given the character in front of it
    fn tag_value(
        &self,
        pre: Option<char>,
        tag: &str,
        extra: &BTreeMap<String, String>,
    ) -> SettingsResult<String> {
        if let Some(value) = extra.get(tag).or_else(|| self.tags.get(tag)) {
            return Ok(value.clone());
        }
        let per_minute = pre == Some('F');
        let value = match tag {
            "time" => self.now.format("%H:%M:%S").to_string(),
            "date" => self.now.format("%d-%m-%Y").to_string(),
            "day" => self.now.format("%a").to_string(),
            "print_time" => tags::PRINT_TIME.to_string(),
            "filament_amount" => tags::FILAMENT_AMOUNT.to_string(),
            "filament_weight" => tags::FILAMENT_WEIGHT.to_string(),
            "filament_cost" => tags::FILAMENT_COST.to_string(),
            "profile_string" => format!("{}{}", PROFILE_PREFIX, self.profile_string()?),
            "max_z_speed" => {
                let speed = self.profile.get_setting_float("travel_speed");
                format_number(if per_minute { speed * 60.0 } else { speed })
            }
            _ => match self.profile.get_setting(tag) {
                Some(raw) if !self.profile.is_alteration(tag) => match evaluate(raw) {
                    Some(v) if per_minute => format_number(v * 60.0),
                    Some(v) => format_number(v),
                    None => raw.to_string(),
                },
                _ => {
                    tracing::debug!("Unknown tag '{{{}}}' in snippet", tag);
                    format!("?{}?", tag)
                }
            },
        };
        Ok(value)
    }

    fn substitute(&self, text: &str, extra: &BTreeMap<String, String>) -> SettingsResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in tag_regex().captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            let pre = text[..whole.start()].chars().next_back();
            out.push_str(&self.tag_value(pre, name.as_str(), extra)?);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    /// Substitute every `{tag}` in `text`
    pub fn replace_tags(&self, text: &str) -> SettingsResult<String> {
        self.substitute(text, &BTreeMap::new())
    }

    fn raw(&self, name: &str) -> String {
        match self.profile.get_setting(name) {
            Some(value) => value.to_string(),
            None => {
                tracing::warn!("'{}' is not an alteration snippet", name);
                String::new()
            }
        }
    }

    fn print_temperature(&self, extruder: usize) -> f64 {
        let base = self.profile.get_setting_float("print_temperature");
        if extruder == 0 {
            return base;
        }
        let own = self
            .profile
            .get_setting_float(&format!("print_temperature{}", extruder + 1));
        if own > 0.0 {
            own
        } else {
            base
        }
    }

    /// Heating and steps-per-mm lines put in front of the start snippet
    fn start_prefix(&self, contents: &str, extruder_count: usize) -> String {
        let mut prefix = String::new();

        let e_steps = self.profile.get_setting_float("steps_per_e");
        if e_steps > 0.0 {
            prefix.push_str(&format!("M92 E{:.6}\n", e_steps));
        }

        let bed = if self.profile.get_setting_bool("has_heated_bed") {
            self.profile.get_setting_float("print_bed_temperature")
        } else {
            0.0
        };
        let heat_bed = bed > 0.0 && !is_tag_in("{print_bed_temperature}", contents);
        if heat_bed {
            prefix.push_str(&format!("M140 S{:.6}\n", bed));
        }

        let temp = self.profile.get_setting_float("print_temperature");
        if temp > 0.0 && !is_tag_in("{print_temperature}", contents) {
            let extruders: Vec<usize> = self
                .profile
                .enabled_extruders()
                .into_iter()
                .filter(|&n| n < extruder_count.max(1))
                .collect();
            for &n in &extruders {
                prefix.push_str(&format!("M104 T{} S{:.6}\n", n, self.print_temperature(n)));
            }
            for &n in &extruders {
                prefix.push_str(&format!("M109 T{} S{:.6}\n", n, self.print_temperature(n)));
            }
            prefix.push_str("T0\n");
        }

        if heat_bed {
            prefix.push_str(&format!("M190 S{:.6}\n", bed));
        }
        prefix
    }

    /// Support printed with the second extruder
    fn dual_support(&self, extruder_count: usize) -> bool {
        extruder_count > 1
            && self.profile.get_setting("support") != Some("None")
            && self.profile.get_setting("support_dual_extrusion") == Some("Second extruder")
    }

    /// Snippet `name` ready to be written into a G-code file.
    ///
    /// `extruder_count` picks the `startN`/`endN` variant and bounds the
    /// heated extruders.
    pub fn alteration_contents(&self, name: &str, extruder_count: usize) -> SettingsResult<String> {
        if self.profile.get_setting("gcode_flavor") == Some(ULTIGCODE) {
            if name == "end.gcode" {
                return Ok(format!(
                    "M25 ;Stop reading from this point on.\n;{}{}\n",
                    PROFILE_PREFIX,
                    self.profile_string()?
                ));
            }
            return Ok(String::new());
        }

        let mut prefix = String::new();
        let mut postfix = String::new();
        let mut extra = BTreeMap::new();
        let mut contents = self.raw(name);

        match name {
            "start.gcode" => {
                if extruder_count > 1 {
                    contents = self.raw(&format!("start{}.gcode", extruder_count));
                }
                prefix = self.start_prefix(&contents, extruder_count);
            }
            "end.gcode" => {
                if extruder_count > 1 {
                    contents = self.raw(&format!("end{}.gcode", extruder_count));
                }
                postfix = format!(";{}{}\n", PROFILE_PREFIX, self.profile_string()?);
            }
            "replace.csv" => prefix = REPLACE_PREAMBLE.to_string(),
            "support_start.gcode" | "support_end.gcode" if self.dual_support(extruder_count) => {
                contents = self.raw("switchExtruder.gcode");
                let extruder = if name == "support_start.gcode" { "1" } else { "0" };
                extra.insert("extruder".to_string(), extruder.to_string());
            }
            _ => {}
        }

        let body = self.substitute(&contents, &extra)?;
        let text = format!("{}{}\n{}", prefix, body.trim_end(), postfix);
        Ok(format!("{}\n", text.trim()))
    }
}
