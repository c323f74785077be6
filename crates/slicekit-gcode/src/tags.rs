//! Header placeholders and their back-patching.
//!
//! The start snippet is written with fixed-width placeholders because the
//! print time and filament use are only known once the whole file exists.
//! Patching replaces them in place inside the first 2048 bytes, so the
//! file never changes length.

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use slicekit_settings::ProfileStore;

use crate::model::GcodeDocument;

pub const PRINT_TIME: &str = "#P_TIME#";
pub const FILAMENT_AMOUNT: &str = "#F_AMNT#";
pub const FILAMENT_WEIGHT: &str = "#F_WGHT#";
pub const FILAMENT_COST: &str = "#F_COST#";

/// Bytes of the file searched for placeholders
pub const HEADER_SIZE: usize = 2048;

/// Values written over the placeholders, each exactly 8 characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderValues {
    pub print_time: String,
    pub filament_amount: String,
    pub filament_weight: String,
    pub filament_cost: String,
}

fn last8(text: String) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(8)).collect()
}

impl HeaderValues {
    /// Header values from raw figures: minutes, filament mm, weight kg
    pub fn new(minutes: f64, filament_mm: f64, weight_kg: f64, cost: Option<&str>) -> Self {
        let minutes = minutes.max(0.0);
        let cost = cost.and_then(|c| c.split(' ').next()).unwrap_or("Unknown");
        Self {
            print_time: last8(format!("{:5}:{:02}", (minutes / 60.0) as u64, (minutes % 60.0) as u64)),
            filament_amount: last8(format!("{:8.2}", filament_mm / 1000.0)),
            filament_weight: last8(format!("{:8.2}", weight_kg * 1000.0)),
            filament_cost: last8(format!("{:>8}", cost)),
        }
    }

    pub fn from_document(document: &GcodeDocument, profile: &ProfileStore) -> Self {
        Self::new(
            document.total_move_time_minute,
            document.extrusion_amount,
            document.calculate_weight(profile),
            document.calculate_cost(profile).as_deref(),
        )
    }

    fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (PRINT_TIME, &self.print_time),
            (FILAMENT_AMOUNT, &self.filament_amount),
            (FILAMENT_WEIGHT, &self.filament_weight),
            (FILAMENT_COST, &self.filament_cost),
        ]
    }
}

/// Replace same-length needles in place
fn patch_bytes(data: &mut [u8], needle: &[u8], value: &[u8]) -> usize {
    if needle.len() != value.len() || needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut i = 0;
    while i + needle.len() <= data.len() {
        if &data[i..i + needle.len()] == needle {
            data[i..i + needle.len()].copy_from_slice(value);
            count += 1;
            i += needle.len();
        } else {
            i += 1;
        }
    }
    count
}

/// Patch the placeholders in a header buffer; returns how many were replaced
pub fn patch_header(header: &mut [u8], values: &HeaderValues) -> usize {
    values
        .pairs()
        .iter()
        .map(|(needle, value)| patch_bytes(header, needle.as_bytes(), value.as_bytes()))
        .sum()
}

/// Back-patch a written G-code file with figures from its analysis
pub fn replace_gcode_tags(path: &Path, document: &GcodeDocument, profile: &ProfileStore) -> io::Result<usize> {
    write_header_values(path, &HeaderValues::from_document(document, profile))
}

/// Back-patch a written G-code file with the given values
pub fn write_header_values(path: &Path, values: &HeaderValues) -> io::Result<usize> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut header = Vec::with_capacity(HEADER_SIZE);
    (&mut file).take(HEADER_SIZE as u64).read_to_end(&mut header)?;

    let patched = patch_header(&mut header, values);
    if patched > 0 {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.flush()?;
    }
    tracing::debug!("Patched {} header placeholders in {}", patched, path.display());
    Ok(patched)
}

/// Apply `key -> value` replacements inside the first 2048 bytes of a
/// text, padding or truncating each value to its key's length
pub fn replace_in_header<'a, I>(data: &str, replacements: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut cut = data.len().min(HEADER_SIZE);
    while !data.is_char_boundary(cut) {
        cut -= 1;
    }
    let (head, tail) = data.split_at(cut);
    let mut head = head.to_string();
    for (key, value) in replacements {
        if key.is_empty() {
            continue;
        }
        let width = key.chars().count();
        let fitted: String = value.chars().chain(std::iter::repeat(' ')).take(width).collect();
        head = head.replace(key, &fitted);
    }
    head.push_str(tail);
    head
}
