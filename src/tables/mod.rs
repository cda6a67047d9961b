// Integral Tables
// Cumulative tau/X rows per wave type and the per-shell partials pieced
// out of them

pub mod cumulative;
pub mod pieces;

pub use cumulative::{integrate_cumulative, CumulativeIntegrals, CumulativeRow, RowTag};
pub use pieces::{build_pieces, CoreShell, WavePieces};
