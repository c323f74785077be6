use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slicekit_gcode::Interpreter;

fn sample_gcode(layers: usize) -> String {
    let mut text = String::from(";FLAVOR:RepRap\nG28\nG92 E0\n");
    let mut e = 0.0;
    for layer in 0..layers {
        text.push_str(&format!(";LAYER:{}\nG0 Z{:.2}\n;TYPE:WALL-OUTER\n", layer, 0.2 * (layer + 1) as f64));
        for i in 0..100 {
            e += 0.05;
            let angle = i as f64 * std::f64::consts::TAU / 100.0;
            text.push_str(&format!(
                "G1 X{:.3} Y{:.3} E{:.5} F1800\n",
                100.0 + 20.0 * angle.cos(),
                100.0 + 20.0 * angle.sin(),
                e
            ));
        }
        text.push_str("G1 E-1 F2400\nG0 X80 Y80\nG1 E0 F2400\n");
        text.push_str(&format!("G92 E{:.5}\n", e));
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let text = sample_gcode(200);
    c.bench_function("interpret_200_layers", |b| {
        b.iter(|| Interpreter::parse_str(black_box(&text)))
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
