use std::io::Write;

use proptest::prelude::*;
use slicekit_core::Vec3;
use slicekit_gcode::tags::{FILAMENT_AMOUNT, PRINT_TIME};
use slicekit_gcode::{replace_gcode_tags, GcodeEmitter, GcodeLoader, Interpreter, PathKind, PathType};
use slicekit_settings::ProfileStore;

#[test]
fn wall_outer_path_spans_first_layer_marker() {
    let doc = Interpreter::parse_str(";TYPE:WALL-OUTER\nG1 X10 Y0 E0.5 F1200\n;LAYER:0\nG1 X20 Y0 E1.0\n");

    assert_eq!(doc.layer_count(), 1);
    let paths: Vec<_> = doc.paths().collect();
    assert_eq!(paths.len(), 1);
    let path = paths[0];
    assert_eq!(path.kind, PathKind::Extrude);
    assert_eq!(path.path_type, PathType::WallOuter);
    assert_eq!(
        path.points,
        vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)]
    );
    assert_eq!(path.extrusion, vec![0.0, 0.5, 0.5]);
    assert!((doc.extrusion_amount - 1.0).abs() < 1e-9);
}

#[test]
fn later_layer_markers_close_layers() {
    let doc = Interpreter::parse_str(
        ";LAYER:0\nG1 X10 E1\n;LAYER:1\nG1 Z0.2\nG1 X0 E2\n;LAYER:2\nG1 Z0.4\nG1 X10 E3\n",
    );
    assert_eq!(doc.layer_count(), 3);
    assert!(doc.layers.iter().all(|l| !l.is_empty()));
}

#[test]
fn emitted_profile_string_is_restored_from_gcode() {
    let mut profile = ProfileStore::new();
    profile.put_setting("layer_height", "0.08").expect("put");
    profile.put_setting("print_speed", "45").expect("put");

    let emitter = GcodeEmitter::new(&profile);
    let mut text = emitter.alteration_contents("start.gcode", 1).expect("start");
    text.push_str(";LAYER:0\nG1 X10 Y10 E1\n");
    text.push_str(&emitter.alteration_contents("end.gcode", 1).expect("end"));

    let doc = Interpreter::parse_str(&text);
    assert!(doc.embedded_profile.is_some());

    let mut restored = ProfileStore::new();
    assert!(doc.restore_profile(&mut restored).expect("restore"));
    assert_eq!(restored.get_setting_float("layer_height"), 0.08);
    assert_eq!(restored.get_setting_float("print_speed"), 45.0);
}

#[test]
fn header_placeholders_are_patched_after_loading() {
    let profile = ProfileStore::new();
    let start = GcodeEmitter::new(&profile)
        .alteration_contents("start.gcode", 1)
        .expect("start");
    assert!(start.contains(PRINT_TIME));
    assert!(start.contains(FILAMENT_AMOUNT));

    let mut file = tempfile::NamedTempFile::new().expect("temp");
    write!(file, "{};LAYER:0\nG1 X100 Y0 E2500 F600\n", start).expect("write");
    let before = std::fs::metadata(file.path()).expect("meta").len();

    let doc = GcodeLoader::new()
        .load_file(file.path(), |_| false)
        .expect("load")
        .expect("document");
    let patched = replace_gcode_tags(file.path(), &doc, &profile).expect("patch");
    assert!(patched >= 2);

    let text = std::fs::read_to_string(file.path()).expect("read");
    assert_eq!(text.len() as u64, before);
    assert!(!text.contains(PRINT_TIME));
    assert!(text.contains(";Filament used:     2.50m"));
}

/// Lines for the extrusion-total property. `M221` is left out on purpose:
/// flow scaling shrinks the per-point extrusion stored on paths but not
/// `extrusion_amount`, so the two totals only agree at 100% flow.
fn move_line() -> impl Strategy<Value = String> {
    prop_oneof![
        (-100.0f64..100.0, -100.0f64..100.0).prop_map(|(x, y)| format!("G0 X{:.2} Y{:.2}", x, y)),
        (-100.0f64..100.0, 0.0f64..5.0).prop_map(|(x, e)| format!("G1 X{:.2} E{:.3}", x, e)),
        (0.0f64..2.0).prop_map(|e| format!("G1 E-{:.3}", e)),
        Just("G92 E0".to_string()),
        Just("M83".to_string()),
        Just("M82".to_string()),
        (0u32..5).prop_map(|n| format!(";LAYER:{}", n)),
        (0.0f64..10.0).prop_map(|z| format!("G1 Z{:.2}", z)),
    ]
}

proptest! {
    #[test]
    fn extruded_amounts_cover_document_total(lines in prop::collection::vec(move_line(), 1..60)) {
        let doc = Interpreter::parse_str(&lines.join("\n"));

        let extruded: f64 = doc
            .paths()
            .filter(|p| p.kind == PathKind::Extrude)
            .map(|p| p.extrusion.iter().map(|&e| e.max(0.0) as f64).sum::<f64>())
            .sum();
        prop_assert!(extruded >= doc.extrusion_amount - 1e-2, "{} < {}", extruded, doc.extrusion_amount);
        prop_assert!(doc.layer_count() >= 1);
    }
}
