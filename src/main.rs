use std::path::PathBuf;

use anyhow::Context;
use slicekit::{init_logging, load_environment, GcodeLoader, BUILD_DATE, VERSION};

/// Prints a summary of each G-code file given on the command line.
fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("SliceKit {} (built {})", VERSION, BUILD_DATE);

    let files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if files.is_empty() {
        eprintln!("usage: slicekit <file.gcode>...");
        return Ok(());
    }

    let (config, profile) = load_environment(None)?;
    let loader = GcodeLoader::from_profile(&profile).with_progress_step(config.interpreter.progress_step);

    for path in files {
        let document = loader
            .load_file(&path, |_| false)
            .with_context(|| format!("reading {}", path.display()))?
            .context("load aborted")?;

        println!("{}", path.display());
        println!("  layers:   {}", document.layer_count());
        println!("  time:     {}", document.print_time_text());
        println!("  filament: {:.2} m", document.extrusion_amount / 1000.0);
        println!("  weight:   {:.0} g", document.calculate_weight(&profile) * 1000.0);
        if let Some(cost) = document.calculate_cost(&profile) {
            println!("  cost:     {}", cost);
        }
        if !document.model_errors.is_empty() {
            println!("  warnings: {}", document.model_errors.len());
        }
    }
    Ok(())
}
