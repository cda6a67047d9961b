// Travel-Time Table Generation Library
// Exposes the tau-p pipeline stages for the standalone table builder

pub mod branches;
pub mod config;
pub mod decimator;
pub mod errors;
pub mod layer_integrals;
pub mod model_conversions;
pub mod pegasus;
pub mod reference_model;
pub mod resampled_model;
pub mod sampling;
pub mod table_engine;
pub mod tables;

// Re-export key types
pub use crate::branches::{BranchData, TravelTimeTable};
pub use crate::config::TablesConfig;
pub use crate::errors::{ExitCode, TableError, TableResult};
pub use crate::table_engine::TableEngine;

// Numerical guard bands. These are fixed properties of the closed-form
// integrals, not tunables, so they live here rather than in the config.
pub const DTOL: f64 = 1e-10;
pub const DMIN: f64 = 1e-30;
pub const TAUINTTOL: f64 = 1e-6;

// Wave types
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveType {
    P,
    S,
}

impl WaveType {
    pub fn letter(&self) -> char {
        match self {
            WaveType::P => 'P',
            WaveType::S => 'S',
        }
    }

    pub fn other(&self) -> WaveType {
        match self {
            WaveType::P => WaveType::S,
            WaveType::S => WaveType::P,
        }
    }
}
