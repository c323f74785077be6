//! Profile and preference files.
//!
//! Profiles are INI files with `[general]`, `[profile]` and `[alterations]`
//! sections; preferences use `[preference]` and `[machine_0]`. Files older
//! than [`PROFILE_VERSION`] are migrated on load.

use std::fs;
use std::path::Path;

use slicekit_core::SettingsEvent;

use crate::error::SettingsResult;
use crate::ini::IniDocument;
use crate::setting::Setting;
use crate::store::ProfileStore;

/// Version written to `[general] version`
pub const PROFILE_VERSION: u32 = 2;

const GENERAL: &str = "general";
const PROFILE: &str = "profile";
const ALTERATIONS: &str = "alterations";
const PREFERENCE: &str = "preference";
const MACHINE: &str = "machine_0";
const LEGACY_MACHINE: &str = "machine";

impl ProfileStore {
    /// Load `[profile]` and `[alterations]` from an INI file.
    ///
    /// A missing file leaves the profile untouched. Unknown keys and
    /// unparseable values are skipped with a warning.
    pub fn load_profile(&mut self, path: &Path) -> SettingsResult<()> {
        if !path.is_file() {
            tracing::info!("No profile at {}, keeping current settings", path.display());
            return Ok(());
        }
        let mut doc = IniDocument::parse(&fs::read_to_string(path)?)?;
        migrate(&mut doc);
        self.apply_profile_document(&doc);
        tracing::info!("Loaded profile from {}", path.display());
        self.publish(SettingsEvent::Loaded {
            path: Some(path.to_path_buf()),
        });
        Ok(())
    }

    /// Apply the profile sections of an already parsed document
    pub fn apply_profile_document(&mut self, doc: &IniDocument) {
        if let Some(section) = doc.section(PROFILE) {
            for (key, value) in &section.entries {
                if self.is_profile_setting(key) {
                    self.put_logged(key, value);
                } else {
                    tracing::warn!("Ignoring unknown profile setting '{}'", key);
                }
            }
        }
        if let Some(section) = doc.section(ALTERATIONS) {
            for (key, value) in &section.entries {
                if self.is_alteration(key) {
                    self.put_logged(key, value);
                } else {
                    tracing::warn!("Ignoring unknown alteration '{}'", key);
                }
            }
        }
    }

    /// Current profile as an INI document
    pub fn profile_document(&self) -> IniDocument {
        self.profile_document_filtered(|_| true)
    }

    fn profile_document_filtered(&self, keep: impl Fn(&Setting) -> bool) -> IniDocument {
        let mut doc = IniDocument::new();
        doc.set(GENERAL, "version", PROFILE_VERSION.to_string());
        doc.section_mut(PROFILE);
        for setting in self.settings().filter(|s| s.is_profile() && keep(s)) {
            doc.set(PROFILE, setting.name(), setting.raw());
        }
        doc.section_mut(ALTERATIONS);
        for setting in self.settings().filter(|s| s.is_alteration() && keep(s)) {
            doc.set(ALTERATIONS, setting.name(), setting.raw());
        }
        doc
    }

    /// Write every profile setting and alteration
    pub fn save_profile(&self, path: &Path) -> SettingsResult<()> {
        write_document(path, &self.profile_document())?;
        tracing::info!("Saved profile to {}", path.display());
        self.publish(SettingsEvent::Saved {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Write only the settings that differ from their defaults
    pub fn save_profile_difference_from_default(&self, path: &Path) -> SettingsResult<()> {
        let doc = self.profile_document_filtered(|s| s.raw() != s.default_value());
        write_document(path, &doc)?;
        tracing::info!("Saved profile changes to {}", path.display());
        Ok(())
    }

    /// Load preferences and machine settings.
    ///
    /// `[machine_0]` is preferred; a legacy `[machine]` section is used when
    /// it is absent.
    pub fn load_preferences(&mut self, path: &Path) -> SettingsResult<()> {
        if !path.is_file() {
            tracing::info!("No preferences at {}, using defaults", path.display());
            return Ok(());
        }
        let mut doc = IniDocument::parse(&fs::read_to_string(path)?)?;
        migrate(&mut doc);

        if let Some(section) = doc.section(PREFERENCE) {
            for (key, value) in &section.entries {
                if self.is_preference(key) {
                    self.put_logged(key, value);
                } else {
                    tracing::warn!("Ignoring unknown preference '{}'", key);
                }
            }
        }
        let machine = doc.section(MACHINE).or_else(|| doc.section(LEGACY_MACHINE));
        if let Some(section) = machine {
            for (key, value) in &section.entries {
                if self.is_machine_setting(key) {
                    self.put_logged(key, value);
                } else {
                    tracing::warn!("Ignoring unknown machine setting '{}'", key);
                }
            }
        }
        tracing::info!("Loaded preferences from {}", path.display());
        self.publish(SettingsEvent::Loaded {
            path: Some(path.to_path_buf()),
        });
        Ok(())
    }

    pub fn save_preferences(&self, path: &Path) -> SettingsResult<()> {
        let mut doc = IniDocument::new();
        doc.set(GENERAL, "version", PROFILE_VERSION.to_string());
        for setting in self.settings() {
            if setting.is_preference() {
                doc.set(PREFERENCE, setting.name(), setting.raw());
            } else if setting.is_machine_setting() {
                doc.set(MACHINE, setting.name(), setting.raw());
            }
        }
        write_document(path, &doc)?;
        tracing::info!("Saved preferences to {}", path.display());
        self.publish(SettingsEvent::Saved {
            path: path.to_path_buf(),
        });
        Ok(())
    }
}

fn write_document(path: &Path, doc: &IniDocument) -> SettingsResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;
    Ok(())
}

/// Rewrite settings from older file versions in place
pub fn migrate(doc: &mut IniDocument) {
    let version = doc
        .get(GENERAL, "version")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0);
    if version >= PROFILE_VERSION {
        return;
    }
    tracing::debug!("Migrating settings file from version {}", version);

    if doc.section(PROFILE).is_some() {
        let profile = doc.section_mut(PROFILE);
        if let Some(old) = profile.remove("platform_adhesion") {
            if profile.get("adhesion_type").is_none() {
                profile.set("adhesion_type", old.to_ascii_lowercase());
            }
        }
    }

    for name in [MACHINE, LEGACY_MACHINE] {
        if doc.section(name).is_none() {
            continue;
        }
        let machine = doc.section_mut(name);
        if let Some(shape) = machine.get("machine_shape").map(str::to_string) {
            let migrated = match shape.as_str() {
                "Square" => "rectangular",
                "Circular" => "elliptic",
                other => other,
            };
            machine.set("machine_shape", migrated.to_string());
        }
        if let Some(height) = machine.remove("extruder_head_size_height") {
            let nonzero = height.trim().parse::<f64>().is_ok_and(|h| h > 0.0);
            if nonzero && machine.get("gantry_height").is_none() {
                machine.set("gantry_height", height);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_old_profile() {
        let mut doc = IniDocument::parse(
            "[profile]\nplatform_adhesion = Brim\n[machine]\nmachine_shape = Circular\nextruder_head_size_height = 55\n",
        )
        .expect("parse");
        migrate(&mut doc);
        assert_eq!(doc.get("profile", "adhesion_type"), Some("brim"));
        assert_eq!(doc.get("profile", "platform_adhesion"), None);
        assert_eq!(doc.get("machine", "machine_shape"), Some("elliptic"));
        assert_eq!(doc.get("machine", "gantry_height"), Some("55"));
    }

    #[test]
    fn test_current_version_untouched() {
        let mut doc = IniDocument::parse(
            "[general]\nversion = 2\n[profile]\nplatform_adhesion = Raft\n",
        )
        .expect("parse");
        migrate(&mut doc);
        assert_eq!(doc.get("profile", "platform_adhesion"), Some("Raft"));
        assert_eq!(doc.get("profile", "adhesion_type"), None);
    }

    #[test]
    fn test_profile_document_sections() {
        let mut store = ProfileStore::new();
        store.put_setting("fill_density", "35").expect("put");
        let doc = store.profile_document();
        assert_eq!(doc.get("general", "version"), Some("2"));
        assert_eq!(doc.get("profile", "fill_density"), Some("35"));
        assert!(doc.get("alterations", "start.gcode").is_some());
        assert!(doc.get("profile", "machine_width").is_none());
    }

    #[test]
    fn test_apply_document_skips_invalid_values() {
        let mut store = ProfileStore::new();
        let doc = IniDocument::parse(
            "[profile]\nfill_density = lots\nprint_speed = 70\nmachine_width = 500\n",
        )
        .expect("parse");
        store.apply_profile_document(&doc);
        assert_eq!(store.get_setting("fill_density"), Some("20"));
        assert_eq!(store.get_setting("print_speed"), Some("70"));
        assert_eq!(store.get_setting("machine_width"), Some("205"));
    }
}
