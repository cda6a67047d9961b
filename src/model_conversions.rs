// Model Conversions
// Earth-flattening transform and unit conversions between dimensional and
// non-dimensional quantities

use crate::errors::{validate_positive, TableResult};
use serde::{Deserialize, Serialize};

/// Immutable conversion constants for one Earth model. All τ/X integration
/// happens in the flattened coordinates these methods produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelConversions {
    /// Surface radius R0 (km).
    pub surface_radius: f64,
    /// Surface S velocity (km/s).
    pub surface_s_velocity: f64,
    /// Ray-parameter normalization, 1/R0.
    pub kx: f64,
    /// Slowness normalization, 1/(R0 * vs).
    pub kz: f64,
}

impl ModelConversions {
    pub fn new(surface_radius: f64, surface_s_velocity: f64) -> TableResult<Self> {
        validate_positive(surface_radius, "surface radius")?;
        validate_positive(surface_s_velocity, "surface S velocity")?;
        Ok(Self {
            surface_radius,
            surface_s_velocity,
            kx: 1.0 / surface_radius,
            kz: 1.0 / (surface_radius * surface_s_velocity),
        })
    }

    /// Depth under the flattening transform: z = ln(R0 / r).
    pub fn flat_z(&self, r: f64) -> f64 {
        (self.surface_radius / r).ln()
    }

    /// Inverse of flat_z: r = R0 * exp(-z).
    pub fn real_z(&self, z: f64) -> f64 {
        self.surface_radius * (-z).exp()
    }

    /// Flattened slowness at radius r with velocity v. The fluid mask at
    /// ingest guarantees v > 0 here.
    pub fn flat_p(&self, v: f64, r: f64) -> f64 {
        r / (v * self.surface_radius)
    }

    pub fn norm_r(&self, x: f64) -> f64 {
        x / self.surface_radius
    }

    pub fn dim_r(&self, x: f64) -> f64 {
        x * self.surface_radius
    }
}
