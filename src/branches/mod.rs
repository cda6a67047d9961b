// Branch Data
// Travel-time branches, the per-phase grammar, and the emitted table

pub mod builder;
pub mod final_decimation;
pub mod grammar;
pub mod naming;
pub mod spline;

pub use builder::{build_phase_branches, build_upgoing_stub};
pub use final_decimation::{finalize_table, FinalGrids};
pub use grammar::{parse_phase, PhaseFamily, PhaseSpec};

use crate::errors::{TableError, TableResult};
use crate::tables::WavePieces;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One travel-time branch: a contiguous ray-parameter interval of one
/// phase with its spline basis. Mutable while the builder works on it,
/// frozen after final decimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchData {
    /// Synthesized phase code of this sub-branch (e.g. "Pn", "PKPab").
    pub phase_code: String,
    /// Ray segment types: upgoing, downgoing, returning.
    pub segment_codes: [char; 3],
    /// Mantle traversal pairs, 0..=2.
    pub mantle_traversals: u8,
    /// Sign of the up-going depth correction.
    pub upgoing_sign: i8,
    /// Radius interval of the turning shell, if the branch turns.
    pub turning_shell: Option<(f64, f64)>,
    pub turning_shell_name: Option<String>,
    pub is_up_going: bool,
    /// Strictly decreasing ray parameters.
    pub ray_params: Vec<f64>,
    pub tau: Vec<f64>,
    pub x: Vec<f64>,
    /// Five basis coefficients per knot.
    pub basis: Vec<[f64; 5]>,
}

impl BranchData {
    pub fn len(&self) -> usize {
        self.ray_params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ray_params.is_empty()
    }
}

/// All branches generated for one requested phase code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseBranches {
    pub code: String,
    pub branches: Vec<BranchData>,
}

/// The emitted table: per-phase branch lists plus the per-wave-type
/// grids, partial-integral tables, and up-going stubs the evaluator
/// needs. Serialization is plain serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelTimeTable {
    pub model_name: String,
    pub phases: Vec<PhaseBranches>,
    pub p_pieces: WavePieces,
    pub s_pieces: WavePieces,
    pub p_upgoing: BranchData,
    pub s_upgoing: BranchData,
    pub final_grids: FinalGrids,
}

/// Reads the phase list: whitespace-separated codes. An empty list is an
/// error, not an empty table.
pub fn read_phase_list(path: &Path) -> TableResult<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let phases: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if phases.is_empty() {
        return Err(TableError::MissingPhaseList(path.display().to_string()));
    }
    Ok(phases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_phase_list_rejected() {
        let dir = std::env::temp_dir().join("ttt_phase_list_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty_phases.txt");
        fs::write(&path, "  \n \t ").unwrap();
        let err = read_phase_list(&path).unwrap_err();
        assert!(matches!(err, TableError::MissingPhaseList(_)));
    }

    #[test]
    fn test_phase_list_parsing() {
        let dir = std::env::temp_dir().join("ttt_phase_list_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("phases.txt");
        fs::write(&path, "P S\nPcP  PKiKP\n").unwrap();
        let phases = read_phase_list(&path).unwrap();
        assert_eq!(phases, vec!["P", "S", "PcP", "PKiKP"]);
    }
}
