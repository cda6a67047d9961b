// Table Engine
// Sequential pipeline driver: wires every stage from model ingest to the
// finalized travel-time table

use crate::branches::{
    build_phase_branches, build_upgoing_stub, builder::BuilderContext, finalize_table,
    parse_phase, read_phase_list, PhaseBranches, TravelTimeTable,
};
use crate::config::TablesConfig;
use crate::errors::TableResult;
use crate::reference_model::{RadialModel, ReferenceModel};
use crate::resampled_model::ResampledModel;
use crate::sampling::{
    assign_merged_indices, merge_slownesses, resample_depths, sample_slownesses,
    slowness_at_radius,
};
use crate::tables::{build_pieces, integrate_cumulative};
use crate::WaveType;
use earth_model::{read_model_file, EarthModelFile};
use std::path::Path;
use tracing::{info, warn};

/// The table generation engine. Holds only the configuration; every run
/// is independent and runs the stages strictly in sequence.
pub struct TableEngine {
    config: TablesConfig,
}

impl TableEngine {
    pub fn new(config: TablesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TablesConfig {
        &self.config
    }

    /// Full run from file paths: model text plus phase list in, table out.
    pub fn run(&self, model_path: &Path, phase_path: &Path) -> TableResult<TravelTimeTable> {
        let file = read_model_file(model_path)?;
        let phases = read_phase_list(phase_path)?;
        self.build(&file, &phases)
    }

    /// Builds the table for an already-parsed model.
    pub fn build(&self, file: &EarthModelFile, phases: &[String]) -> TableResult<TravelTimeTable> {
        let config = &self.config;

        info!(model = file.name.as_str(), "building reference model");
        let reference = ReferenceModel::build(file, config)?;

        info!("resampling model radially");
        let model = ResampledModel::build(&reference, config)?;

        info!("sampling slownesses");
        let mut p_samples = sample_slownesses(&model, WaveType::P, config)?;
        let mut s_samples = sample_slownesses(&model, WaveType::S, config)?;

        info!(
            p = p_samples.len(),
            s = s_samples.len(),
            "merging slowness grids"
        );
        let merged = merge_slownesses(
            &p_samples,
            &s_samples,
            &model.critical_slownesses(WaveType::P),
            &model.critical_slownesses(WaveType::S),
        );
        assign_merged_indices(&mut p_samples, &merged);
        assign_merged_indices(&mut s_samples, &merged);

        info!(grid = merged.values.len(), "rebuilding depth models");
        let p_depth = resample_depths(&model, WaveType::P, &merged, config)?;
        let s_depth = resample_depths(&model, WaveType::S, &merged, config)?;

        info!("integrating cumulative tables");
        let conv = model.conversions();
        let r_max_depth = (conv.surface_radius - config.max_earthquake_depth_km).max(1.0);
        let s_limit = slowness_at_radius(&model, WaveType::P, r_max_depth);

        let p_cum = integrate_cumulative(&model, WaveType::P, &p_depth, &merged, config, None)?;
        let s_cum = integrate_cumulative(&model, WaveType::S, &s_depth, &merged, config, s_limit)?;

        info!("piecing shell partials");
        let p_pieces = build_pieces(&p_cum, &merged);
        let s_pieces = build_pieces(&s_cum, &merged);

        let ctx = BuilderContext {
            model: &model,
            merged: &merged,
            p_pieces: &p_pieces,
            s_pieces: &s_pieces,
            config,
        };

        let mut master_keep = vec![false; merged.values.len()];
        let mut built: Vec<PhaseBranches> = Vec::new();
        for code in phases {
            if built.iter().any(|b| &b.code == code) {
                continue;
            }
            let Some(spec) = parse_phase(code) else {
                warn!(code = code.as_str(), "unknown phase code, skipping");
                continue;
            };
            let branches = build_phase_branches(&ctx, &spec, &mut master_keep);
            if branches.is_empty() {
                warn!(code = code.as_str(), "phase not representable in this model");
            }
            info!(
                code = code.as_str(),
                branches = branches.len(),
                "phase built"
            );
            built.push(PhaseBranches {
                code: code.clone(),
                branches,
            });
        }

        info!("building up-going stubs");
        let p_upgoing = build_upgoing_stub(&ctx, WaveType::P, &p_cum, &mut master_keep);
        let s_upgoing = build_upgoing_stub(&ctx, WaveType::S, &s_cum, &mut master_keep);

        info!("final decimation");
        let (final_grids, p_final, s_final) =
            finalize_table(&merged, &p_pieces, &s_pieces, master_keep, &built);

        info!(
            grid = final_grids.ray_params.len(),
            ends = final_grids.branch_end_ray_params.len(),
            "table complete"
        );
        Ok(TravelTimeTable {
            model_name: file.name.clone(),
            phases: built,
            p_pieces: p_final,
            s_pieces: s_final,
            p_upgoing,
            s_upgoing,
            final_grids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earth_model::parse_model;

    const SIMPLE: &str = "\
simple gradient model
4
1 0.0    13.0 10.0 10.0 5.7 5.7 1.0 300.0 600.0
2 3000.0 11.0 9.5  9.5  5.4 5.4 1.0 300.0 600.0
3 5500.0 4.0  8.5  8.5  4.8 4.8 1.0 300.0 600.0
4 6371.0 2.7  6.0  6.0  3.5 3.5 1.0 300.0 600.0
";

    #[test]
    fn test_engine_builds_direct_phase() {
        let file = parse_model(SIMPLE).unwrap();
        let engine = TableEngine::new(TablesConfig::default());
        let table = engine
            .build(&file, &["P".to_string(), "XQ".to_string()])
            .unwrap();
        // Unknown code skipped, P built.
        assert_eq!(table.phases.len(), 1);
        assert_eq!(table.phases[0].code, "P");
        assert!(!table.phases[0].branches.is_empty());
        assert!(!table.final_grids.ray_params.is_empty());
        assert!(table.p_upgoing.is_up_going);
    }

    #[test]
    fn test_table_serializes() {
        let file = parse_model(SIMPLE).unwrap();
        let engine = TableEngine::new(TablesConfig::default());
        let table = engine.build(&file, &["P".to_string()]).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: TravelTimeTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model_name, table.model_name);
        assert_eq!(back.phases.len(), table.phases.len());
    }
}
