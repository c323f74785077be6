//! Compact profile snapshot codec.
//!
//! A snapshot is `base64(zlib(body))` where the body lists profile settings
//! as `key=value` pairs separated by `\b`, then a `\f`, then the alteration
//! pairs in the same form. Snapshots are embedded at the tail of generated
//! G-code and restored from there.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SettingsError, SettingsResult};

const PAIR_SEPARATOR: char = '\u{8}';
const SECTION_SEPARATOR: char = '\u{c}';

/// Decoded snapshot contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub profile: Vec<(String, String)>,
    pub alterations: Vec<(String, String)>,
}

impl Snapshot {
    /// Encode into the embeddable text form
    pub fn encode(&self) -> SettingsResult<String> {
        let body = format!(
            "{}{}{}",
            join_pairs(&self.profile),
            SECTION_SEPARATOR,
            join_pairs(&self.alterations)
        );
        compress(&body)
    }

    /// Decode the text form; a missing `\f` means there are no alterations
    pub fn decode(encoded: &str) -> SettingsResult<Self> {
        let body = decompress(encoded)?;
        let (profile, alterations) = match body.split_once(SECTION_SEPARATOR) {
            Some((profile, alterations)) => (profile, alterations),
            None => (body.as_str(), ""),
        };
        Ok(Self {
            profile: split_pairs(profile),
            alterations: split_pairs(alterations),
        })
    }
}

/// Encode a flat list of pairs, as used for the preferences string
pub fn encode_pairs(pairs: &[(String, String)]) -> SettingsResult<String> {
    compress(&join_pairs(pairs))
}

/// Decode a flat list of pairs
pub fn decode_pairs(encoded: &str) -> SettingsResult<Vec<(String, String)>> {
    Ok(split_pairs(&decompress(encoded)?))
}

fn join_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(&PAIR_SEPARATOR.to_string())
}

fn split_pairs(text: &str) -> Vec<(String, String)> {
    text.split(PAIR_SEPARATOR)
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn compress(body: &str) -> SettingsResult<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
    encoder.write_all(body.as_bytes())?;
    let bytes = encoder.finish()?;
    Ok(STANDARD.encode(bytes))
}

fn decompress(encoded: &str) -> SettingsResult<String> {
    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SettingsError::Snapshot(format!("base64: {}", e)))?;
    let mut body = String::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_string(&mut body)
        .map_err(|e| SettingsError::Snapshot(format!("zlib: {}", e)))?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_encode_decode() {
        let snapshot = Snapshot {
            profile: pairs(&[("layer_height", "0.08"), ("print_speed", "45")]),
            alterations: pairs(&[("start.gcode", "G28\nG1 Z5=up")]),
        };
        let encoded = snapshot.encode().expect("encode");
        assert!(!encoded.contains('\n'));
        assert_eq!(Snapshot::decode(&encoded).expect("decode"), snapshot);
    }

    #[test]
    fn test_decode_without_alterations() {
        let encoded = encode_pairs(&pairs(&[("a", "1"), ("b", "2")])).expect("encode");
        let snapshot = Snapshot::decode(&encoded).expect("decode");
        assert_eq!(snapshot.profile.len(), 2);
        assert!(snapshot.alterations.is_empty());
        assert_eq!(decode_pairs(&encoded).expect("decode")[1].1, "2");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Snapshot::decode("not base64!"),
            Err(SettingsError::Snapshot(_))
        ));
        let not_zlib = STANDARD.encode(b"plain text");
        assert!(matches!(
            Snapshot::decode(&not_zlib),
            Err(SettingsError::Snapshot(_))
        ));
    }
}
