//! Setting validators.
//!
//! Validators never block a write. They report a level and a message that
//! the caller shows next to the setting; slicing is refused only while some
//! setting reports [`ValidationLevel::Error`].

use crate::value::evaluate;

/// Severity of a validation result, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationLevel {
    Success,
    Warning,
    Error,
}

/// Result of running one or more validators
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub level: ValidationLevel,
    pub message: String,
}

impl Validation {
    pub fn success() -> Self {
        Self {
            level: ValidationLevel::Success,
            message: String::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: ValidationLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ValidationLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.level == ValidationLevel::Success
    }

    /// Fold several results: the worst level wins, messages are joined by
    /// newlines
    pub fn combine(results: impl IntoIterator<Item = Validation>) -> Validation {
        let mut level = ValidationLevel::Success;
        let mut messages = Vec::new();
        for result in results {
            level = level.max(result.level);
            if result.level != ValidationLevel::Success {
                messages.push(result.message);
            }
        }
        Validation {
            level,
            message: messages.join("\n"),
        }
    }
}

/// Read access to other settings, used by validators and conditions
pub trait SettingLookup {
    /// Effective raw value, temp overrides applied
    fn raw_setting(&self, name: &str) -> Option<String>;

    /// Effective numeric value, `0.0` when missing or not numeric
    fn setting_float(&self, name: &str) -> f64 {
        self.raw_setting(name)
            .and_then(|raw| evaluate(&raw))
            .unwrap_or(0.0)
    }
}

/// A check attached to a setting
pub trait Validator: Send + Sync + std::fmt::Debug {
    /// Check `raw`, the setting's current text
    fn validate(&self, raw: &str, lookup: &dyn SettingLookup) -> Validation;

    /// Adjust the allowed range; only range validators react
    fn set_range(&mut self, _min: Option<f64>, _max: Option<f64>) {}
}

/// Python-style number text: integral values print without a fraction
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", (value * 1000.0).round() / 1000.0)
    }
}

/// Float parse check with optional error bounds
#[derive(Debug, Clone, Default)]
pub struct ValidFloat {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for ValidFloat {
    fn validate(&self, raw: &str, _lookup: &dyn SettingLookup) -> Validation {
        let Some(value) = evaluate(raw).filter(|v| v.is_finite()) else {
            return Validation::error(format!("\"{}\" is not a valid number or expression", raw));
        };
        check_range(value, self.min, self.max)
    }

    fn set_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.min = min;
        self.max = max;
    }
}

/// Integer parse check with optional error bounds
#[derive(Debug, Clone, Default)]
pub struct ValidInt {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for ValidInt {
    fn validate(&self, raw: &str, _lookup: &dyn SettingLookup) -> Validation {
        let Some(value) = evaluate(raw).filter(|v| v.is_finite()) else {
            return Validation::error(format!(
                "\"{}\" is not a valid whole number or expression",
                raw
            ));
        };
        check_range(value.trunc(), self.min, self.max)
    }

    fn set_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.min = min;
        self.max = max;
    }
}

fn check_range(value: f64, min: Option<f64>, max: Option<f64>) -> Validation {
    if let Some(min) = min.filter(|m| value < *m) {
        return Validation::error(format!(
            "This setting should not be below {}",
            format_number(min)
        ));
    }
    if let Some(max) = max.filter(|m| value > *m) {
        return Validation::error(format!(
            "This setting should not be above {}",
            format_number(max)
        ));
    }
    Validation::success()
}

/// Threshold for the warning validators
#[derive(Debug, Clone)]
pub enum Threshold {
    Fixed(f64),
    /// `factor` times another setting's value.
    Scaled { setting: &'static str, factor: f64 },
}

impl Threshold {
    fn resolve(&self, lookup: &dyn SettingLookup) -> f64 {
        match self {
            Threshold::Fixed(v) => *v,
            Threshold::Scaled { setting, factor } => lookup.setting_float(setting) * factor,
        }
    }
}

/// Warns when the value is at or above the threshold.
///
/// `{threshold}` in the message is replaced by the resolved threshold.
#[derive(Debug, Clone)]
pub struct WarningAbove {
    pub threshold: Threshold,
    pub message: &'static str,
}

impl Validator for WarningAbove {
    fn validate(&self, raw: &str, lookup: &dyn SettingLookup) -> Validation {
        // Unparseable input is already reported by the type validator.
        let Some(value) = evaluate(raw) else {
            return Validation::success();
        };
        let limit = self.threshold.resolve(lookup);
        if value >= limit {
            Validation::warning(self.message.replace("{threshold}", &format!("{:.2}", limit)))
        } else {
            Validation::success()
        }
    }
}

/// Warns when the value is at or below the threshold
#[derive(Debug, Clone)]
pub struct WarningBelow {
    pub threshold: Threshold,
    pub message: &'static str,
}

impl Validator for WarningBelow {
    fn validate(&self, raw: &str, lookup: &dyn SettingLookup) -> Validation {
        let Some(value) = evaluate(raw) else {
            return Validation::success();
        };
        let limit = self.threshold.resolve(lookup);
        if value <= limit {
            Validation::warning(self.message.replace("{threshold}", &format!("{:.2}", limit)))
        } else {
            Validation::success()
        }
    }
}

/// Checks that the shell thickness splits into printable line widths for
/// the configured nozzle
#[derive(Debug, Clone, Default)]
pub struct WallThicknessValidator;

impl Validator for WallThicknessValidator {
    fn validate(&self, raw: &str, lookup: &dyn SettingLookup) -> Validation {
        let Some(wall) = evaluate(raw) else {
            return Validation::success();
        };
        let nozzle = lookup.setting_float("nozzle_size");

        if wall < 0.01 {
            return Validation::success();
        }
        if wall <= nozzle * 0.5 {
            return Validation::error(
                "Walls thinner than half the nozzle size will not produce anything usable",
            );
        }
        if wall <= nozzle * 0.85 {
            return Validation::warning(
                "Walls thinner than 0.85 times the nozzle size are unlikely to print well",
            );
        }
        if wall < nozzle {
            return Validation::success();
        }
        if nozzle <= 0.0 {
            return Validation::error("Incorrect nozzle size");
        }

        let line_count = (wall / nozzle).trunc();
        let line_width = wall / line_count;
        let line_width_alt = wall / (line_count + 1.0);
        if line_width >= nozzle * 1.5 && line_width_alt <= nozzle * 0.85 {
            return Validation::warning(format!(
                "This wall thickness results in {:.3}mm lines, which is not recommended with a {}mm nozzle",
                line_width_alt,
                format_number(nozzle)
            ));
        }
        Validation::success()
    }
}

/// Warns when the volumetric flow exceeds what a nozzle can melt, scaled
/// from 10 mm³/s for a 0.4 mm nozzle
#[derive(Debug, Clone, Default)]
pub struct PrintSpeedValidator;

impl PrintSpeedValidator {
    /// Maximum flow in mm³/s for a nozzle diameter
    pub fn max_volume_per_second(nozzle: f64) -> f64 {
        10.0 * (nozzle / 0.4).powi(2)
    }
}

impl Validator for PrintSpeedValidator {
    fn validate(&self, raw: &str, lookup: &dyn SettingLookup) -> Validation {
        let Some(speed) = evaluate(raw) else {
            return Validation::success();
        };
        let nozzle = lookup.setting_float("nozzle_size");
        let layer_height = lookup.setting_float("layer_height");

        let volume = layer_height * nozzle * speed;
        let limit = Self::max_volume_per_second(nozzle);
        if volume > limit {
            return Validation::warning(format!(
                "Printing more than {:.1}mm^3 of filament per second may cause the filament to slip (currently {:.1}mm^3 per second)",
                limit, volume
            ));
        }
        Validation::success()
    }
}
