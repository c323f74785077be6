//! Minimal INI document used for profile and preference files.
//!
//! Multi-line values are written with every continuation line prefixed by
//! a tab; reading strips exactly one leading tab from each continuation.
//! Section and key lookups ignore ASCII case.

use std::fmt;

use crate::error::{PersistenceError, PersistenceResult};

/// One `[section]` and its entries in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniSection {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl IniSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replace an existing entry or append a new one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(index).1)
    }
}

/// Parsed INI file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text.
    ///
    /// Lines starting with `;` or `#` are comments. Keys before the first
    /// section header are rejected.
    pub fn parse(text: &str) -> PersistenceResult<Self> {
        let mut doc = IniDocument::new();
        let mut last_key: Option<usize> = None;

        for (number, raw_line) in text.lines().enumerate() {
            let line_no = number + 1;
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            if let Some(continuation) = line.strip_prefix('\t') {
                let (Some(section), Some(entry)) = (doc.sections.last_mut(), last_key) else {
                    return Err(PersistenceError::MalformedLine {
                        line: line_no,
                        content: line.to_string(),
                    });
                };
                let value = &mut section.entries[entry].1;
                value.push('\n');
                value.push_str(continuation);
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            if let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                doc.sections.push(IniSection::new(name.trim()));
                last_key = None;
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(PersistenceError::MalformedLine {
                    line: line_no,
                    content: line.to_string(),
                });
            };
            let Some(section) = doc.sections.last_mut() else {
                return Err(PersistenceError::MissingSection(line_no));
            };
            section
                .entries
                .push((key.trim().to_string(), value.trim().to_string()));
            last_key = Some(section.entries.len() - 1);
        }

        Ok(doc)
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Section by name, created at the end when missing
    pub fn section_mut(&mut self, name: &str) -> &mut IniSection {
        let index = match self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
        {
            Some(index) => index,
            None => {
                self.sections.push(IniSection::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn set(&mut self, section: &str, key: impl Into<String>, value: impl Into<String>) {
        self.section_mut(section).set(key, value);
    }

    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                writeln!(f, "{} = {}", key, value.replace('\n', "\n\t"))?;
            }
        }
        Ok(())
    }
}
