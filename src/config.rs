// Table Generation Configuration
// Every tunable of the pipeline in one explicit record, passed to each stage

use crate::errors::{validate_positive, TableResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Target range-sampling step per major shell (km). Deeper shells tolerate
/// coarser range sampling because their branches are smoother.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSpacingKm {
    pub inner_core: f64,
    pub outer_core: f64,
    pub lower_mantle: f64,
    pub upper_mantle: f64,
    pub lower_crust: f64,
    pub upper_crust: f64,
}

impl Default for ShellSpacingKm {
    fn default() -> Self {
        Self {
            inner_core: 300.0,
            outer_core: 300.0,
            lower_mantle: 150.0,
            upper_mantle: 150.0,
            lower_crust: 100.0,
            upper_crust: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Maximum radial spacing of the resampled model (km).
    pub resample_radius_km: f64,
    /// Maximum bottoming-radius step between accepted slowness samples (km).
    pub max_radius_increment_km: f64,
    /// Maximum non-dimensional slowness step between accepted samples.
    pub max_slowness_increment: f64,
    /// Target range step per shell for the slowness sampler (km).
    pub target_travel_distances_km: ShellSpacingKm,
    /// Target range spacing for up-going branch decimation (km).
    pub target_upgoing_spacing_km: f64,
    /// Fraction of the surface slowness kept in the up-going proxy grid.
    pub ray_param_limit_ratio: f64,
    /// Dedup tolerance for branch-end ray parameters.
    pub ray_param_tolerance: f64,
    /// Convergence tolerance on non-dimensional range (XTOL).
    pub distance_tolerance: f64,
    /// Relative velocity jump below which a discontinuity is bridged.
    pub velocity_tolerance: f64,
    /// Slowness back-off used when a caustic bracket lands on a shell top.
    pub slowness_offset: f64,
    /// Iteration bound for Pegasus root finding.
    pub max_root_finding_iterations: usize,
    /// Hard cap on the caustic back-off loop.
    pub max_caustic_backoff_iterations: usize,
    /// Deepest allowed earthquake depth (km); fixes the UPPER_MANTLE row.
    pub max_earthquake_depth_km: f64,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            resample_radius_km: 50.0,
            max_radius_increment_km: 75.0,
            max_slowness_increment: 0.01,
            target_travel_distances_km: ShellSpacingKm::default(),
            target_upgoing_spacing_km: 400.0,
            ray_param_limit_ratio: 0.7,
            ray_param_tolerance: 0.03,
            distance_tolerance: 5e-6,      // XTOL, non-dimensional
            velocity_tolerance: 2e-5,
            slowness_offset: 1e-6,
            max_root_finding_iterations: 30,
            max_caustic_backoff_iterations: 1000,
            max_earthquake_depth_km: 800.0,
        }
    }
}

impl TablesConfig {
    /// Loads the configuration: defaults, overlaid by an optional file,
    /// overlaid by TT_-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> TableResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(p) = path {
            builder = builder.add_source(config::File::from(p));
        }
        builder = builder.add_source(config::Environment::with_prefix("TT").separator("__"));
        let cfg: TablesConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> TableResult<()> {
        validate_positive(self.resample_radius_km, "resample_radius_km")?;
        validate_positive(self.max_radius_increment_km, "max_radius_increment_km")?;
        validate_positive(self.max_slowness_increment, "max_slowness_increment")?;
        validate_positive(self.target_upgoing_spacing_km, "target_upgoing_spacing_km")?;
        validate_positive(self.ray_param_limit_ratio, "ray_param_limit_ratio")?;
        validate_positive(self.distance_tolerance, "distance_tolerance")?;
        validate_positive(self.velocity_tolerance, "velocity_tolerance")?;
        validate_positive(self.slowness_offset, "slowness_offset")?;
        validate_positive(self.max_earthquake_depth_km, "max_earthquake_depth_km")?;
        if self.max_root_finding_iterations == 0 {
            return Err(crate::errors::TableError::InvalidInput(
                "max_root_finding_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Target range step (km) for a ray bottoming in the named shell.
    pub fn shell_spacing_km(&self, shell: crate::reference_model::ShellName) -> f64 {
        use crate::reference_model::ShellName::*;
        match shell {
            InnerCore | InnerCoreBoundary => self.target_travel_distances_km.inner_core,
            OuterCore | CoreMantleBoundary => self.target_travel_distances_km.outer_core,
            LowerMantle => self.target_travel_distances_km.lower_mantle,
            UpperMantle | MohoDiscontinuity => self.target_travel_distances_km.upper_mantle,
            LowerCrust | ConradDiscontinuity => self.target_travel_distances_km.lower_crust,
            UpperCrust | Surface => self.target_travel_distances_km.upper_crust,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = TablesConfig::default();
        assert_eq!(cfg.resample_radius_km, 50.0);
        assert_eq!(cfg.max_radius_increment_km, 75.0);
        assert_eq!(cfg.max_slowness_increment, 0.01);
        assert_eq!(cfg.target_travel_distances_km.inner_core, 300.0);
        assert_eq!(cfg.target_travel_distances_km.upper_crust, 100.0);
        assert_eq!(cfg.target_upgoing_spacing_km, 400.0);
        assert_eq!(cfg.max_root_finding_iterations, 30);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_nonsense() {
        let cfg = TablesConfig {
            resample_radius_km: -1.0,
            ..TablesConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
