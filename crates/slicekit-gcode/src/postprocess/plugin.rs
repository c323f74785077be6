//! Plugin metadata, parameters and the plugin trait.
//!
//! Plugins describe themselves with a comment header:
//!
//! ```text
//! #Name: PauseAtZ
//! #Info: Pause the printer at a certain height
//! #Type: postprocess
//! #Param: pauseLevel(float:5.0) Pause height (mm)
//! ```

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use slicekit_core::PluginError;

fn param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)\((\w+):([^)]*)\)\s*(.*)$").expect("valid regex"))
}

/// Declared type of a plugin parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Int,
    Str,
}

impl ParamKind {
    fn parse(name: &str) -> Self {
        match name {
            "float" => ParamKind::Float,
            "int" => ParamKind::Int,
            _ => ParamKind::Str,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Float => "float",
            ParamKind::Int => "int",
            ParamKind::Str => "str",
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct PluginParam {
    pub name: String,
    pub kind: ParamKind,
    /// Empty when the parameter is optional
    pub default: String,
    pub label: String,
}

/// Plugin metadata
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub name: String,
    pub info: String,
    pub kind: String,
    pub params: Vec<PluginParam>,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: String::new(),
            kind: "postprocess".to_string(),
            params: Vec::new(),
        }
    }

    /// Parse a `#Name:`/`#Info:`/`#Type:`/`#Param:` header.
    ///
    /// Returns `None` without a `#Name:` line. Malformed `#Param:` lines are
    /// skipped.
    pub fn parse_header(text: &str) -> Option<Self> {
        let mut info = PluginInfo::new("");
        for line in text.lines() {
            let Some((key, value)) = line.strip_prefix('#').and_then(|l| l.split_once(':')) else {
                continue;
            };
            let value = value.trim();
            match key {
                "Name" => info.name = value.to_string(),
                "Info" => info.info = value.to_string(),
                "Type" => info.kind = value.to_string(),
                "Param" => match param_regex().captures(value) {
                    Some(caps) => info.params.push(PluginParam {
                        name: caps[1].to_string(),
                        kind: ParamKind::parse(&caps[2]),
                        default: caps[3].trim().to_string(),
                        label: caps[4].trim().to_string(),
                    }),
                    None => tracing::warn!("Skipping malformed plugin parameter '{}'", value),
                },
                _ => {}
            }
        }
        (!info.name.is_empty()).then_some(info)
    }

    pub fn param(&self, name: &str) -> Option<&PluginParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Coerce textual bindings to the declared parameter types.
    ///
    /// Missing bindings take the declared default; parameters with neither
    /// are left unset.
    pub fn bind(&self, bindings: &BTreeMap<String, String>) -> Result<PluginParams, PluginError> {
        for key in bindings.keys() {
            if self.param(key).is_none() {
                tracing::warn!("Plugin {} has no parameter '{}'", self.name, key);
            }
        }

        let mut values = BTreeMap::new();
        for param in &self.params {
            let raw = bindings
                .get(&param.name)
                .map(|v| v.trim())
                .unwrap_or(param.default.as_str());
            if raw.is_empty() {
                continue;
            }
            let invalid = || PluginError::InvalidParameter {
                plugin: self.name.clone(),
                param: param.name.clone(),
                value: raw.to_string(),
                expected: param.kind.as_str().to_string(),
            };
            let value = match param.kind {
                ParamKind::Float => ParamValue::Float(
                    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(invalid)?,
                ),
                ParamKind::Int => ParamValue::Int(raw.parse::<i64>().map_err(|_| invalid())?),
                ParamKind::Str => ParamValue::Str(raw.to_string()),
            };
            values.insert(param.name.clone(), value);
        }
        Ok(PluginParams { values })
    }
}

/// A coerced parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

/// Bound parameters handed to [`PostProcessPlugin::transform`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginParams {
    values: BTreeMap<String, ParamValue>,
}

impl PluginParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Numeric value; integers widen
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Str(_) => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A post-processing step that rewrites a G-code file in place
pub trait PostProcessPlugin: Send + Sync {
    fn info(&self) -> &PluginInfo;

    /// Rewrite the file at `path`
    fn transform(&self, path: &Path, params: &PluginParams) -> Result<(), PluginError>;
}

/// Arc-wrapped plugin for sharing between pipelines
pub type PluginHandle = Arc<dyn PostProcessPlugin>;
