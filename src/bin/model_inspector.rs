// Model Inspector
// Prints the shell structure, discontinuities, and critical slownesses of
// an Earth model file

use std::path::PathBuf;
use std::process::exit;
use travel_time_tables::reference_model::{RadialModel, ReferenceModel};
use travel_time_tables::{TablesConfig, WaveType};
use tracing::error;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: model_inspector <model-file>");
        exit(1);
    }
    let path = PathBuf::from(&args[1]);

    let file = match earth_model::read_model_file(&path) {
        Ok(f) => f,
        Err(e) => {
            error!("model read failed: {}", e);
            exit(2);
        }
    };
    let config = TablesConfig::default();
    let model = match ReferenceModel::build(&file, &config) {
        Ok(m) => m,
        Err(e) => {
            error!("model build failed: {}", e);
            exit(2);
        }
    };

    println!("model: {}", model.name);
    println!("samples: {}", model.samples().len());
    println!();
    println!("shells (surface to centre):");
    for shell in model.shells() {
        let kind = if shell.is_discontinuity {
            "discontinuity"
        } else {
            "shell"
        };
        let name = shell.name.map(|n| n.label()).unwrap_or("unnamed");
        let lvz = if shell.has_low_velocity_zone.iter().any(|&f| f) {
            "  [low-velocity zone]"
        } else {
            ""
        };
        println!(
            "  {:>13}  {:>8.1} - {:>8.1} km  {}{}",
            kind, shell.r_bot, shell.r_top, name, lvz
        );
    }

    for wave in [WaveType::P, WaveType::S] {
        let crit = model.critical_slownesses(wave);
        println!();
        println!("critical slownesses ({:?}): {}", wave, crit.len());
        for c in crit {
            println!("  {:.8}", c);
        }
    }
}
