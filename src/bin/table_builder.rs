// Travel-Time Table Builder
// Generates tau-p travel-time tables from an Earth model and a phase list

use anyhow::Context;
use std::path::PathBuf;
use std::process::exit;
use travel_time_tables::{TableEngine, TablesConfig};
use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!("usage: table_builder <model-file> <phase-list> [output.json]");
        exit(1);
    }
    let model_path = PathBuf::from(&args[1]);
    let phase_path = PathBuf::from(&args[2]);
    let output_path = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("travel_time_tables.json"));

    let config_path = std::env::var("TT_CONFIG").ok().map(PathBuf::from);
    let config = match TablesConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {}", e);
            exit(e.exit_code() as i32);
        }
    };

    info!("model: {}", model_path.display());
    info!("phases: {}", phase_path.display());

    let engine = TableEngine::new(config);
    let table = match engine.run(&model_path, &phase_path) {
        Ok(t) => t,
        Err(e) => {
            error!("table generation failed: {}", e);
            exit(e.exit_code() as i32);
        }
    };

    if let Err(e) = write_output(&table, &output_path) {
        error!("could not write output: {:#}", e);
        exit(1);
    }

    info!(
        "wrote {} phases, {} grid points to {}",
        table.phases.len(),
        table.final_grids.ray_params.len(),
        output_path.display()
    );
}

fn write_output(
    table: &travel_time_tables::TravelTimeTable,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(table).context("serializing table")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
