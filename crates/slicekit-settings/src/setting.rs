//! A single keyed setting with type metadata, validators and visibility
//! conditions.

use crate::validators::{SettingLookup, ValidFloat, ValidInt, Validation, Validator};
use crate::value::{SettingType, Value};

/// Where a setting lives and how it is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingCategory {
    Basic,
    Advanced,
    Expert,
    /// Application preference, stored in the preferences file.
    Preference,
    /// Physical machine description, stored per machine.
    Machine,
    /// Start/end G-code templates.
    Alteration,
    Hidden,
}

impl SettingCategory {
    /// Part of the slicing profile
    pub fn is_profile(&self) -> bool {
        !matches!(
            self,
            SettingCategory::Preference | SettingCategory::Machine | SettingCategory::Alteration
        )
    }
}

impl std::fmt::Display for SettingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Advanced => write!(f, "advanced"),
            Self::Expert => write!(f, "expert"),
            Self::Preference => write!(f, "preference"),
            Self::Machine => write!(f, "machine"),
            Self::Alteration => write!(f, "alteration"),
            Self::Hidden => write!(f, "hidden"),
        }
    }
}

/// Visibility condition evaluated against the current settings
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `extruder_amount` must exceed this count.
    ExtruderCountAbove(u32),
    /// Setting must equal the value.
    Equals {
        setting: &'static str,
        value: &'static str,
    },
    /// Setting must differ from the value.
    NotEquals {
        setting: &'static str,
        value: &'static str,
    },
}

impl Condition {
    pub fn holds(&self, lookup: &dyn SettingLookup) -> bool {
        match self {
            Condition::ExtruderCountAbove(n) => {
                lookup.setting_float("extruder_amount") as u32 > *n
            }
            Condition::Equals { setting, value } => {
                lookup.raw_setting(setting).as_deref() == Some(*value)
            }
            Condition::NotEquals { setting, value } => {
                lookup.raw_setting(setting).as_deref() != Some(*value)
            }
        }
    }
}

/// A registered setting
#[derive(Debug)]
pub struct Setting {
    name: &'static str,
    label: &'static str,
    kind: SettingType,
    category: SettingCategory,
    subcategory: &'static str,
    default: String,
    raw: String,
    value: Value,
    validators: Vec<Box<dyn Validator>>,
    conditions: Vec<Condition>,
}

impl Setting {
    /// Register a setting with its default.
    ///
    /// Float and int settings get a parse validator in slot 0, adjustable
    /// through [`Setting::with_range`].
    pub fn new(
        name: &'static str,
        default: impl Into<String>,
        kind: SettingType,
        category: SettingCategory,
        subcategory: &'static str,
    ) -> Self {
        let default = default.into();
        let value = kind
            .parse(&default)
            .unwrap_or_else(|_| Value::String(default.clone()));
        let mut validators: Vec<Box<dyn Validator>> = Vec::new();
        match kind {
            SettingType::Float => validators.push(Box::new(ValidFloat::default())),
            SettingType::Int => validators.push(Box::new(ValidInt::default())),
            _ => {}
        }
        Self {
            name,
            label: name,
            kind,
            category,
            subcategory,
            raw: default.clone(),
            default,
            value,
            validators,
            conditions: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Set the error bounds of the parse validator
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        if let Some(first) = self.validators.first_mut() {
            first.set_range(min, max);
        }
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn kind(&self) -> &SettingType {
        &self.kind
    }

    pub fn category(&self) -> SettingCategory {
        self.category
    }

    pub fn subcategory(&self) -> &'static str {
        self.subcategory
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// Persistent raw value
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Persistent typed value
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_profile(&self) -> bool {
        self.category.is_profile()
    }

    pub fn is_preference(&self) -> bool {
        self.category == SettingCategory::Preference
    }

    pub fn is_machine_setting(&self) -> bool {
        self.category == SettingCategory::Machine
    }

    pub fn is_alteration(&self) -> bool {
        self.category == SettingCategory::Alteration
    }

    /// Parse and store a new persistent value.
    ///
    /// Returns whether the stored text changed.
    pub(crate) fn set_raw(&mut self, raw: &str) -> Result<bool, String> {
        let value = self.kind.parse(raw)?;
        if self.raw == raw {
            return Ok(false);
        }
        self.raw = raw.to_string();
        self.value = value;
        Ok(true)
    }

    /// Restore the default; returns whether anything changed
    pub(crate) fn reset(&mut self) -> bool {
        let default = self.default.clone();
        self.set_raw(&default).unwrap_or_else(|_| {
            self.raw = default;
            true
        })
    }

    /// Run every validator against `raw`
    pub fn validate_raw(&self, raw: &str, lookup: &dyn SettingLookup) -> Validation {
        Validation::combine(self.validators.iter().map(|v| v.validate(raw, lookup)))
    }

    /// All conditions hold
    pub fn check_conditions(&self, lookup: &dyn SettingLookup) -> bool {
        self.conditions.iter().all(|c| c.holds(lookup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::ValidationLevel;

    struct NoLookup;

    impl SettingLookup for NoLookup {
        fn raw_setting(&self, name: &str) -> Option<String> {
            match name {
                "extruder_amount" => Some("2".to_string()),
                "gcode_flavor" => Some("UltiGCode".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    fn test_float_setting_gets_parse_validator() {
        let setting = Setting::new(
            "layer_height",
            "0.1",
            SettingType::Float,
            SettingCategory::Basic,
            "Quality",
        )
        .with_range(Some(0.0001), None);
        assert_eq!(setting.value(), &Value::Float(0.1));
        assert!(setting.validate_raw("0.2", &NoLookup).is_success());
        assert_eq!(
            setting.validate_raw("x", &NoLookup).level,
            ValidationLevel::Error
        );
        assert_eq!(
            setting.validate_raw("-1", &NoLookup).level,
            ValidationLevel::Error
        );
    }

    #[test]
    fn test_set_raw_rejects_wrong_type() {
        let mut setting = Setting::new(
            "retraction_enable",
            "True",
            SettingType::Bool,
            SettingCategory::Basic,
            "Quality",
        );
        assert!(setting.set_raw("yes").is_err());
        assert_eq!(setting.raw(), "True");
        assert_eq!(setting.set_raw("False"), Ok(true));
        assert_eq!(setting.set_raw("False"), Ok(false));
        assert!(setting.reset());
        assert_eq!(setting.value(), &Value::Bool(true));
    }

    #[test]
    fn test_conditions() {
        let setting = Setting::new(
            "print_temperature2",
            "0",
            SettingType::Int,
            SettingCategory::Basic,
            "Speed and Temperature",
        )
        .with_condition(Condition::ExtruderCountAbove(1));
        assert!(setting.check_conditions(&NoLookup));

        let hidden = Setting::new(
            "filament_flow",
            "100",
            SettingType::Float,
            SettingCategory::Basic,
            "Filament",
        )
        .with_condition(Condition::NotEquals {
            setting: "gcode_flavor",
            value: "UltiGCode",
        });
        assert!(!hidden.check_conditions(&NoLookup));
    }

    #[test]
    fn test_categories() {
        assert!(SettingCategory::Hidden.is_profile());
        assert!(!SettingCategory::Machine.is_profile());
        assert!(!SettingCategory::Alteration.is_profile());
        assert_eq!(SettingCategory::Preference.to_string(), "preference");
    }
}
