//! The profile store.
//!
//! Holds every registered setting with a persistent value and an optional
//! temporary override layer. Changes are announced on the event bus as
//! `(setting, "value")` notifications; the store itself never coalesces.
//!
//! Event handlers run on the publishing thread while the caller may still
//! hold the lock of a [`SharedProfile`], so subscribers must not lock the
//! profile from inside a handler.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use slicekit_core::{AppEvent, EventBus, SettingsEvent};

use crate::error::{SettingsError, SettingsResult};
use crate::registry::{default_settings, MAX_EXTRUDERS};
use crate::setting::{Setting, SettingCategory};
use crate::snapshot::{self, Snapshot};
use crate::validators::{SettingLookup, Validation, ValidationLevel};
use crate::value::{evaluate, parse_bool, Value};

/// Profile shared between components
pub type SharedProfile = Arc<RwLock<ProfileStore>>;

/// Keyed store of all settings
#[derive(Debug)]
pub struct ProfileStore {
    settings: Vec<Setting>,
    index: HashMap<String, usize>,
    temp_overrides: HashMap<String, String>,
    bus: Option<Arc<EventBus>>,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore {
    /// Store with every default setting registered
    pub fn new() -> Self {
        Self::with_settings(default_settings())
    }

    /// Store over an explicit setting list
    pub fn with_settings(settings: Vec<Setting>) -> Self {
        let index = settings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name().to_ascii_lowercase(), i))
            .collect();
        Self {
            settings,
            index,
            temp_overrides: HashMap::new(),
            bus: None,
        }
    }

    /// Announce changes on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Wrap into a shared handle
    pub fn into_shared(self) -> SharedProfile {
        Arc::new(RwLock::new(self))
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn setting(&self, name: &str) -> Option<&Setting> {
        self.position(name).map(|i| &self.settings[i])
    }

    /// All settings in registration order
    pub fn settings(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    /// Effective value, temp override first
    pub fn get_setting(&self, name: &str) -> Option<&str> {
        let setting = self.setting(name)?;
        Some(
            self.temp_overrides
                .get(setting.name())
                .map(String::as_str)
                .unwrap_or_else(|| setting.raw()),
        )
    }

    /// Effective numeric value; `0.0` when missing or not numeric
    pub fn get_setting_float(&self, name: &str) -> f64 {
        self.get_setting(name).and_then(evaluate).unwrap_or(0.0)
    }

    pub fn get_setting_int(&self, name: &str) -> i64 {
        self.get_setting_float(name).trunc() as i64
    }

    pub fn get_setting_bool(&self, name: &str) -> bool {
        self.get_setting(name).and_then(parse_bool).unwrap_or(false)
    }

    /// Effective value parsed as the setting's type
    pub fn get_setting_value(&self, name: &str) -> Option<Value> {
        let setting = self.setting(name)?;
        let raw = self.get_setting(name)?;
        setting.kind().parse(raw).ok()
    }

    /// Write a value.
    ///
    /// Goes to the temp override when one is active for this setting,
    /// otherwise to the persistent layer. Values that do not parse as the
    /// declared type are rejected.
    pub fn put_setting(&mut self, name: &str, value: &str) -> SettingsResult<()> {
        let index = self.position(name).ok_or_else(|| SettingsError::UnknownSetting {
            key: name.to_string(),
        })?;
        let key = self.settings[index].name();

        if let Some(current) = self.temp_overrides.get(key) {
            self.check_parse(index, value)?;
            if current != value {
                self.temp_overrides.insert(key.to_string(), value.to_string());
                self.notify(index);
            }
            return Ok(());
        }

        let changed = self.settings[index]
            .set_raw(value)
            .map_err(|reason| SettingsError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason,
            })?;
        if changed {
            self.notify(index);
        }
        Ok(())
    }

    fn check_parse(&self, index: usize, value: &str) -> SettingsResult<()> {
        let setting = &self.settings[index];
        setting
            .kind()
            .parse(value)
            .map(|_| ())
            .map_err(|reason| SettingsError::InvalidValue {
                key: setting.name().to_string(),
                value: value.to_string(),
                reason,
            })
    }

    /// Shadow the persistent value until cleared
    pub fn set_temp_override(&mut self, name: &str, value: &str) -> SettingsResult<()> {
        let index = self.position(name).ok_or_else(|| SettingsError::UnknownSetting {
            key: name.to_string(),
        })?;
        self.check_parse(index, value)?;
        let before = self.get_setting(name).map(str::to_string);
        self.temp_overrides
            .insert(self.settings[index].name().to_string(), value.to_string());
        if before.as_deref() != Some(value) {
            self.notify(index);
        }
        Ok(())
    }

    pub fn clear_temp_override(&mut self, name: &str) {
        let Some(index) = self.position(name) else {
            return;
        };
        let key = self.settings[index].name();
        if let Some(old) = self.temp_overrides.remove(key) {
            if old != self.settings[index].raw() {
                self.notify(index);
            }
        }
    }

    /// Drop every temp override
    pub fn reset_temp_override(&mut self) {
        let keys: Vec<String> = self.temp_overrides.keys().cloned().collect();
        for key in keys {
            self.clear_temp_override(&key);
        }
    }

    pub fn has_temp_override(&self, name: &str) -> bool {
        self.setting(name)
            .is_some_and(|s| self.temp_overrides.contains_key(s.name()))
    }

    /// Restore every profile setting to its default
    pub fn reset_profile(&mut self) {
        for index in 0..self.settings.len() {
            if self.settings[index].is_profile() && self.settings[index].reset() {
                self.notify(index);
            }
        }
        tracing::info!("Profile reset to defaults");
        self.publish(SettingsEvent::ProfileReset);
    }

    pub fn is_profile_setting(&self, name: &str) -> bool {
        self.setting(name).is_some_and(Setting::is_profile)
    }

    pub fn is_preference(&self, name: &str) -> bool {
        self.setting(name).is_some_and(Setting::is_preference)
    }

    pub fn is_machine_setting(&self, name: &str) -> bool {
        self.setting(name).is_some_and(Setting::is_machine_setting)
    }

    pub fn is_alteration(&self, name: &str) -> bool {
        self.setting(name).is_some_and(Setting::is_alteration)
    }

    /// Run the validator chain against the effective value
    pub fn validate(&self, name: &str) -> Validation {
        match (self.setting(name), self.get_setting(name)) {
            (Some(setting), Some(raw)) => setting.validate_raw(raw, self),
            _ => Validation::error(format!("Unknown setting '{}'", name)),
        }
    }

    /// All visibility conditions hold
    pub fn is_visible(&self, name: &str) -> bool {
        self.setting(name)
            .is_some_and(|s| s.check_conditions(self))
    }

    /// No visible profile setting reports an error
    pub fn can_slice(&self) -> bool {
        self.settings
            .iter()
            .filter(|s| s.is_profile() && s.check_conditions(self))
            .all(|s| {
                let raw = self.get_setting(s.name()).unwrap_or_default();
                s.validate_raw(raw, self).level != ValidationLevel::Error
            })
    }

    /// Visible settings of a category, optionally narrowed to a subcategory
    pub fn settings_for_category(
        &self,
        category: SettingCategory,
        subcategory: Option<&str>,
    ) -> Vec<&Setting> {
        self.settings
            .iter()
            .filter(|s| s.category() == category)
            .filter(|s| subcategory.is_none_or(|sub| s.subcategory() == sub))
            .filter(|s| s.check_conditions(self))
            .collect()
    }

    /// Distinct subcategories of the visible settings in a category
    pub fn sub_categories_for(&self, category: SettingCategory) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for setting in self.settings_for_category(category, None) {
            if !out.contains(&setting.subcategory()) {
                out.push(setting.subcategory());
            }
        }
        out
    }

    /// Configured extruder count, 1 to 4
    pub fn extruder_count(&self) -> usize {
        (self.get_setting_int("extruder_amount").max(1) as usize).min(MAX_EXTRUDERS)
    }

    /// Indices of the extruders that exist and are enabled
    pub fn enabled_extruders(&self) -> Vec<usize> {
        (0..self.extruder_count())
            .filter(|&n| {
                self.get_extruder_setting(n, "extruder_enabled")
                    .and_then(parse_bool)
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Per-extruder value: `<name><n+1>` for extruders past the first,
    /// falling back to `name` when no variant is registered
    pub fn get_extruder_setting(&self, extruder: usize, name: &str) -> Option<&str> {
        if extruder > 0 {
            let variant = format!("{}{}", name, extruder + 1);
            if let Some(value) = self.get_setting(&variant) {
                return Some(value);
            }
        }
        self.get_setting(name)
    }

    pub fn get_extruder_setting_float(&self, extruder: usize, name: &str) -> f64 {
        self.get_extruder_setting(extruder, name)
            .and_then(evaluate)
            .unwrap_or(0.0)
    }

    pub fn get_extruder_setting_bool(&self, extruder: usize, name: &str) -> bool {
        self.get_extruder_setting(extruder, name)
            .and_then(parse_bool)
            .unwrap_or(false)
    }

    /// Nozzle offset of an extruder relative to the first one
    pub fn nozzle_offset(&self, extruder: usize) -> (f64, f64) {
        if extruder == 0 {
            return (0.0, 0.0);
        }
        (
            self.get_setting_float(&format!("extruder_offset_x{}", extruder)),
            self.get_setting_float(&format!("extruder_offset_y{}", extruder)),
        )
    }

    /// Snapshot of the effective profile and alterations
    pub fn get_profile_string(&self) -> SettingsResult<String> {
        let collect = |pred: fn(&Setting) -> bool| -> Vec<(String, String)> {
            self.settings
                .iter()
                .filter(|s| pred(s))
                .map(|s| {
                    (
                        s.name().to_string(),
                        self.get_setting(s.name()).unwrap_or_default().to_string(),
                    )
                })
                .collect()
        };
        Snapshot {
            profile: collect(Setting::is_profile),
            alterations: collect(Setting::is_alteration),
        }
        .encode()
    }

    /// Restore profile settings and alterations from a snapshot.
    ///
    /// Unknown keys and values of the wrong type are skipped.
    pub fn load_profile_from_string(&mut self, encoded: &str) -> SettingsResult<()> {
        let snapshot = Snapshot::decode(encoded)?;
        for (key, value) in snapshot.profile {
            if self.is_profile_setting(&key) {
                self.put_logged(&key, &value);
            }
        }
        for (key, value) in snapshot.alterations {
            if self.is_alteration(&key) {
                self.put_logged(&key, &value);
            }
        }
        self.publish(SettingsEvent::Loaded { path: None });
        Ok(())
    }

    /// Preferences and machine settings in snapshot encoding
    pub fn get_preferences_string(&self) -> SettingsResult<String> {
        let pairs: Vec<(String, String)> = self
            .settings
            .iter()
            .filter(|s| (s.is_preference() || s.is_machine_setting()) && s.name() != "lastFile")
            .map(|s| (s.name().to_string(), s.raw().to_string()))
            .collect();
        snapshot::encode_pairs(&pairs)
    }

    /// Put a value, logging instead of failing
    pub(crate) fn put_logged(&mut self, key: &str, value: &str) {
        if let Err(e) = self.put_setting(key, value) {
            tracing::warn!("Skipping setting: {}", e);
        }
    }

    fn notify(&self, index: usize) {
        let Some(bus) = &self.bus else {
            return;
        };
        let setting = &self.settings[index];
        let value = self
            .get_setting_value(setting.name())
            .map(|v| setting.kind().to_event_value(&v))
            .unwrap_or_else(|| slicekit_core::SettingValue::String(setting.raw().to_string()));
        bus.publish_setting_changed(setting.name(), "value", value);
    }

    pub(crate) fn publish(&self, event: SettingsEvent) {
        if let Some(bus) = &self.bus {
            if bus.publish(AppEvent::Settings(event)).is_err() {
                tracing::trace!("Settings event had no subscribers");
            }
        }
    }
}

impl SettingLookup for ProfileStore {
    fn raw_setting(&self, name: &str) -> Option<String> {
        self.get_setting(name).map(str::to_string)
    }

    fn setting_float(&self, name: &str) -> f64 {
        self.get_setting_float(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use slicekit_core::EventFilter;

    fn store_with_bus() -> (ProfileStore, Arc<Mutex<Vec<String>>>) {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(EventFilter::All, move |event| {
            if let AppEvent::Settings(SettingsEvent::Changed { key, .. }) = event {
                sink.lock().push(key);
            }
        });
        (ProfileStore::new().with_event_bus(bus), seen)
    }

    #[test]
    fn test_get_and_put() {
        let mut store = ProfileStore::new();
        assert_eq!(store.get_setting("layer_height"), Some("0.1"));
        assert_eq!(store.get_setting("LAYER_HEIGHT"), Some("0.1"));
        store.put_setting("layer_height", "0,2").expect("put");
        assert_eq!(store.get_setting("layer_height"), Some("0,2"));
        assert!((store.get_setting_float("layer_height") - 0.2).abs() < 1e-12);
        assert_eq!(store.get_setting_float("machine_name"), 0.0);
        assert!(store.get_setting_bool("retraction_enable"));
        assert_eq!(store.get_setting_int("fill_density"), 20);
    }

    #[test]
    fn test_put_rejects_bad_values() {
        let mut store = ProfileStore::new();
        assert!(matches!(
            store.put_setting("no_such_setting", "1"),
            Err(SettingsError::UnknownSetting { .. })
        ));
        assert!(matches!(
            store.put_setting("retraction_enable", "perhaps"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(store.put_setting("adhesion_type", "triangle").is_err());
        assert_eq!(store.get_setting("adhesion_type"), Some("skirt"));
    }

    #[test]
    fn test_change_notifications() {
        let (mut store, seen) = store_with_bus();
        store.put_setting("print_speed", "45").expect("put");
        store.put_setting("print_speed", "45").expect("put");
        store.put_setting("layer_height", "0.2").expect("put");
        assert_eq!(*seen.lock(), vec!["print_speed", "layer_height"]);
    }

    #[test]
    fn test_temp_override_layer() {
        let (mut store, seen) = store_with_bus();
        store.set_temp_override("fill_density", "50").expect("override");
        assert_eq!(store.get_setting("fill_density"), Some("50"));

        store.put_setting("fill_density", "60").expect("put");
        assert_eq!(store.get_setting("fill_density"), Some("60"));
        assert_eq!(store.setting("fill_density").map(|s| s.raw()), Some("20"));

        store.reset_temp_override();
        assert_eq!(store.get_setting("fill_density"), Some("20"));
        assert!(!store.has_temp_override("fill_density"));
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_categories() {
        let store = ProfileStore::new();
        assert!(store.is_profile_setting("layer_height"));
        assert!(store.is_preference("filament_cost_kg"));
        assert!(store.is_machine_setting("machine_width"));
        assert!(store.is_alteration("start.gcode"));
        assert!(!store.is_profile_setting("start.gcode"));
        assert!(!store.is_profile_setting("unknown"));
    }

    #[test]
    fn test_visibility_conditions() {
        let mut store = ProfileStore::new();
        assert!(!store.is_visible("print_temperature2"));
        store.put_setting("extruder_amount", "2").expect("put");
        assert!(store.is_visible("print_temperature2"));
        assert!(!store.is_visible("print_temperature3"));

        assert!(!store.is_visible("print_bed_temperature"));
        store.put_setting("has_heated_bed", "True").expect("put");
        assert!(store.is_visible("print_bed_temperature"));
        store.put_setting("gcode_flavor", "UltiGCode").expect("put");
        assert!(!store.is_visible("print_bed_temperature"));
        assert!(!store.is_visible("filament_flow"));
    }

    #[test]
    fn test_validation_and_can_slice() {
        let mut store = ProfileStore::new();
        assert!(store.can_slice());
        store.put_setting("filament_flow", "160").expect("put");
        assert_eq!(store.validate("filament_flow").level, ValidationLevel::Warning);
        assert!(store.can_slice());
        store.put_setting("wall_thickness", "0.1").expect("put");
        assert_eq!(store.validate("wall_thickness").level, ValidationLevel::Error);
        assert!(!store.can_slice());
    }

    #[test]
    fn test_subcategories() {
        let store = ProfileStore::new();
        let basic = store.sub_categories_for(SettingCategory::Basic);
        assert_eq!(basic.first(), Some(&"Quality"));
        assert!(basic.contains(&"Filament"));
        let quality = store.settings_for_category(SettingCategory::Basic, Some("Quality"));
        assert_eq!(quality.first().map(|s| s.name()), Some("layer_height"));
    }

    #[test]
    fn test_extruder_settings() {
        let mut store = ProfileStore::new();
        assert_eq!(store.enabled_extruders(), vec![0]);
        store.put_setting("extruder_amount", "3").expect("put");
        store.put_setting("extruder_enabled2", "False").expect("put");
        assert_eq!(store.enabled_extruders(), vec![0, 2]);

        store.put_setting("retraction_hop3", "0.7").expect("put");
        assert!((store.get_extruder_setting_float(2, "retraction_hop") - 0.7).abs() < 1e-12);
        assert_eq!(store.get_extruder_setting_float(0, "retraction_hop"), 0.0);
        assert_eq!(store.nozzle_offset(0), (0.0, 0.0));
        assert_eq!(store.nozzle_offset(1), (0.0, 21.6));
    }

    #[test]
    fn test_profile_string_round_trip() {
        let mut store = ProfileStore::new();
        store.put_setting("layer_height", "0.08").expect("put");
        store.put_setting("print_speed", "45").expect("put");
        store.put_setting("start.gcode", "G28\n").expect("put");
        let snapshot = store.get_profile_string().expect("snapshot");

        store.reset_profile();
        assert_eq!(store.get_setting_float("layer_height"), 0.1);

        store.load_profile_from_string(&snapshot).expect("load");
        assert_eq!(store.get_setting_float("layer_height"), 0.08);
        assert_eq!(store.get_setting_float("print_speed"), 45.0);
        assert_eq!(store.get_setting("start.gcode"), Some("G28\n"));
    }

    #[test]
    fn test_reset_profile_keeps_machine_settings() {
        let mut store = ProfileStore::new();
        store.put_setting("machine_width", "300").expect("put");
        store.put_setting("fill_density", "80").expect("put");
        store.reset_profile();
        assert_eq!(store.get_setting("machine_width"), Some("300"));
        assert_eq!(store.get_setting("fill_density"), Some("20"));
    }

    #[test]
    fn test_preferences_string_excludes_last_file() {
        let mut store = ProfileStore::new();
        store.put_setting("lastFile", "/tmp/model.stl").expect("put");
        let encoded = store.get_preferences_string().expect("encode");
        let pairs = snapshot::decode_pairs(&encoded).expect("decode");
        assert!(pairs.iter().any(|(k, _)| k == "machine_width"));
        assert!(!pairs.iter().any(|(k, _)| k == "lastFile"));
    }
}
