//! ============================================================
//! EARTH MODEL - RADIAL VELOCITY MODEL INGEST
//! ============================================================
//! Version: 1.0.0
//! Module: Travel-Time Table Generation
//! Input: text models sampled in radius (PREM/AK135 layout)
//! ============================================================

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

// ============================================================
// SECTION 1: ERRORS
// ============================================================

#[derive(Error, Debug)]
pub enum ModelReadError {
    #[error("Malformed model header: {0}")]
    MalformedHeader(String),

    #[error("Non-monotonic radius at record {index}: {radius} km follows {previous} km")]
    NonMonotonicRadius {
        index: usize,
        radius: f64,
        previous: f64,
    },

    #[error("Malformed model record {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("Model file unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
}

pub type ModelReadResult<T> = Result<T, ModelReadError>;

// ============================================================
// SECTION 2: RAW RECORDS
// ============================================================

/// One record of the model file, exactly as read. Density and the two
/// quality factors are carried but never used downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub index: usize,
    /// Radius from the Earth's centre (km).
    pub radius: f64,
    pub density: f64,
    /// Vertically polarised P velocity (km/s).
    pub vpv: f64,
    /// Horizontally polarised P velocity (km/s).
    pub vph: f64,
    /// Vertically polarised S velocity (km/s).
    pub vsv: f64,
    /// Horizontally polarised S velocity (km/s).
    pub vsh: f64,
    /// Anisotropy parameter eta; 1 for isotropic records.
    pub eta: f64,
    pub q_mu: f64,
    pub q_kappa: f64,
}

impl ModelRecord {
    pub fn is_anisotropic(&self) -> bool {
        self.eta != 1.0 || self.vpv != self.vph || self.vsv != self.vsh
    }

    /// Collapse the record to isotropic equivalents by the Voigt-style
    /// average. Isotropic records pass through unchanged.
    pub fn isotropic_velocities(&self) -> (f64, f64) {
        if !self.is_anisotropic() {
            return (self.vpv, self.vsv);
        }
        let eta = self.eta;
        let vph2 = self.vph * self.vph;
        let vpv2 = self.vpv * self.vpv;
        let vsh2 = self.vsh * self.vsh;
        let vsv2 = self.vsv * self.vsv;
        let vs2 = ((1.0 - 2.0 * eta) * vph2 + vpv2 + 5.0 * vsh2 + (6.0 + 4.0 * eta) * vsv2) / 15.0;
        let vp2 = ((8.0 + 4.0 * eta) * vph2 + 3.0 * vpv2 + (8.0 - 8.0 * eta) * vsv2) / 15.0;
        (vp2.sqrt(), vs2.sqrt())
    }

    /// Fluid records carry a zero shear velocity before masking.
    pub fn is_fluid(&self) -> bool {
        self.vsv == 0.0 && self.vsh == 0.0
    }
}

/// Reference radii declared in the model header. All optional except the
/// free surface; a header may omit the whole block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceRadii {
    pub free_surface: Option<f64>,
    pub upper_mantle: Option<f64>,
    pub moho: Option<f64>,
    pub conrad: Option<f64>,
}

/// A parsed model file: header plus records in ascending-radius order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarthModelFile {
    pub name: String,
    pub reference_radii: ReferenceRadii,
    pub records: Vec<ModelRecord>,
}

// ============================================================
// SECTION 3: INGESTED SAMPLES
// ============================================================

/// One ingested sample: isotropic velocities with the fluid mask applied.
/// The fluid flag preserves what the mask erased so core boundaries stay
/// detectable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IngestedSample {
    pub radius: f64,
    pub vp: f64,
    pub vs: f64,
    pub fluid: bool,
}

impl EarthModelFile {
    /// Collapse every record to an isotropic sample and mask fluid regions.
    /// Masking sets vs to vp so the table builder never generates the
    /// physically unobserved PKJKP family.
    pub fn ingest(&self) -> Vec<IngestedSample> {
        self.records
            .iter()
            .map(|r| {
                let (vp, vs) = r.isotropic_velocities();
                let fluid = r.is_fluid();
                IngestedSample {
                    radius: r.radius,
                    vp,
                    vs: if fluid { vp } else { vs },
                    fluid,
                }
            })
            .collect()
    }
}

// ============================================================
// SECTION 4: FILE READER
// ============================================================

/// Reads a model file from disk. Errors other than I/O failures indicate a
/// malformed file, not a missing one.
pub fn read_model_file(path: &Path) -> ModelReadResult<EarthModelFile> {
    let text = fs::read_to_string(path)?;
    parse_model(&text)
}

/// Parses model text. The first line is the model name; the remainder is a
/// whitespace-separated token stream:
///
/// ```text
/// n [r_surface r_upper_mantle r_moho r_conrad]
/// i  r  rho  vpv vph vsv vsh eta q_mu q_kappa   (n records)
/// ```
///
/// The reference-radii block is omitted when the token after n is the
/// integer index of the first record.
pub fn parse_model(text: &str) -> ModelReadResult<EarthModelFile> {
    let mut lines = text.lines();
    let name = lines
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ModelReadError::MalformedHeader("empty file".to_string()))?
        .to_string();

    let rest: String = lines.collect::<Vec<_>>().join("\n");
    let mut tokens = rest.split_whitespace();

    let n: usize = next_token(&mut tokens, "sample count")?
        .parse()
        .map_err(|_| ModelReadError::MalformedHeader("sample count is not an integer".to_string()))?;
    if n < 2 {
        return Err(ModelReadError::MalformedHeader(format!(
            "sample count {} is too small for a layered model",
            n
        )));
    }

    // The reference-radii block is present exactly when the next token is
    // not a bare integer (record indices are bare integers, radii are not
    // guaranteed to be).
    let mut pending: Option<&str> = None;
    let first = next_token(&mut tokens, "reference radii or first record")?;
    let reference_radii = if is_integer_token(first) {
        pending = Some(first);
        ReferenceRadii::default()
    } else {
        let free_surface = parse_float(first, "free surface radius")?;
        let upper_mantle = parse_float(next_token(&mut tokens, "upper mantle radius")?, "upper mantle radius")?;
        let moho = parse_float(next_token(&mut tokens, "Moho radius")?, "Moho radius")?;
        let conrad = parse_float(next_token(&mut tokens, "Conrad radius")?, "Conrad radius")?;
        ReferenceRadii {
            free_surface: Some(free_surface),
            upper_mantle: Some(upper_mantle),
            moho: Some(moho),
            conrad: Some(conrad),
        }
    };

    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let expect = i + 1;
        let index_tok = match pending.take() {
            Some(t) => t,
            None => next_token(&mut tokens, "record index")?,
        };
        let index: usize = index_tok.parse().map_err(|_| ModelReadError::MalformedRecord {
            index: expect,
            reason: format!("record index '{}' is not an integer", index_tok),
        })?;
        if index != expect {
            return Err(ModelReadError::MalformedRecord {
                index: expect,
                reason: format!("record index {} out of order", index),
            });
        }

        let mut field = |label: &str| -> ModelReadResult<f64> {
            let tok = next_token(&mut tokens, label)?;
            tok.parse().map_err(|_| ModelReadError::MalformedRecord {
                index: expect,
                reason: format!("{} '{}' is not a number", label, tok),
            })
        };

        let record = ModelRecord {
            index,
            radius: field("radius")?,
            density: field("density")?,
            vpv: field("vpv")?,
            vph: field("vph")?,
            vsv: field("vsv")?,
            vsh: field("vsh")?,
            eta: field("eta")?,
            q_mu: field("q_mu")?,
            q_kappa: field("q_kappa")?,
        };

        if let Some(prev) = records.last() {
            let prev: &ModelRecord = prev;
            if record.radius < prev.radius {
                return Err(ModelReadError::NonMonotonicRadius {
                    index,
                    radius: record.radius,
                    previous: prev.radius,
                });
            }
        }
        records.push(record);
    }

    Ok(EarthModelFile {
        name,
        reference_radii,
        records,
    })
}

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a str>, label: &str) -> ModelReadResult<&'a str> {
    tokens
        .next()
        .ok_or_else(|| ModelReadError::MalformedHeader(format!("file ended before {}", label)))
}

fn parse_float(tok: &str, label: &str) -> ModelReadResult<f64> {
    tok.parse()
        .map_err(|_| ModelReadError::MalformedHeader(format!("{} '{}' is not a number", label, tok)))
}

fn is_integer_token(tok: &str) -> bool {
    !tok.contains('.') && tok.parse::<i64>().is_ok()
}

// ============================================================
// SECTION 5: TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SHELL: &str = "\
toy two-shell model
4
1 0.0     13.0 8.0 8.0 4.0 4.0 1.0 300.0 600.0
2 3000.0  11.0 8.0 8.0 4.0 4.0 1.0 300.0 600.0
3 3000.0  5.0  6.0 6.0 3.5 3.5 1.0 300.0 600.0
4 6371.0  2.7  6.0 6.0 3.5 3.5 1.0 300.0 600.0
";

    const WITH_RADII: &str = "\
toy with header radii
2 6371.0 5961.0 6336.0 6351.0
1 0.0    13.0 8.0 8.0 4.0 4.0 1.0 300.0 600.0
2 6371.0 2.7  6.0 6.0 3.5 3.5 1.0 300.0 600.0
";

    #[test]
    fn test_parse_without_reference_radii() {
        let model = parse_model(TWO_SHELL).unwrap();
        assert_eq!(model.name, "toy two-shell model");
        assert_eq!(model.records.len(), 4);
        assert!(model.reference_radii.free_surface.is_none());
        assert_eq!(model.records.last().unwrap().radius, 6371.0);
        // Equal radii at records 2 and 3 mark the discontinuity.
        assert_eq!(model.records[1].radius, model.records[2].radius);
    }

    #[test]
    fn test_parse_with_reference_radii() {
        let model = parse_model(WITH_RADII).unwrap();
        assert_eq!(model.reference_radii.free_surface, Some(6371.0));
        assert_eq!(model.reference_radii.moho, Some(6336.0));
        assert_eq!(model.records.len(), 2);
    }

    #[test]
    fn test_non_monotonic_radius_rejected() {
        let bad = "\
bad model
2
1 6371.0 2.7 6.0 6.0 3.5 3.5 1.0 300.0 600.0
2 6000.0 2.7 6.0 6.0 3.5 3.5 1.0 300.0 600.0
";
        let err = parse_model(bad).unwrap_err();
        assert!(matches!(err, ModelReadError::NonMonotonicRadius { .. }));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let bad = "\
bad model
3
1 0.0 13.0 8.0 8.0 4.0 4.0 1.0 300.0 600.0
";
        let err = parse_model(bad).unwrap_err();
        assert!(matches!(err, ModelReadError::MalformedHeader(_)));
    }

    #[test]
    fn test_isotropic_collapse_identity() {
        let model = parse_model(TWO_SHELL).unwrap();
        let (vp, vs) = model.records[0].isotropic_velocities();
        assert_eq!(vp, 8.0);
        assert_eq!(vs, 4.0);
    }

    #[test]
    fn test_voigt_collapse_anisotropic() {
        let rec = ModelRecord {
            index: 1,
            radius: 6000.0,
            density: 3.3,
            vpv: 8.0,
            vph: 8.2,
            vsv: 4.4,
            vsh: 4.6,
            eta: 0.9,
            q_mu: 300.0,
            q_kappa: 600.0,
        };
        let (vp, vs) = rec.isotropic_velocities();
        let vs2 = ((1.0 - 1.8) * 8.2f64.powi(2)
            + 8.0f64.powi(2)
            + 5.0 * 4.6f64.powi(2)
            + (6.0 + 3.6) * 4.4f64.powi(2))
            / 15.0;
        let vp2 = ((8.0 + 3.6) * 8.2f64.powi(2) + 3.0 * 8.0f64.powi(2) + (8.0 - 7.2) * 4.4f64.powi(2)) / 15.0;
        assert!((vs - vs2.sqrt()).abs() < 1e-12);
        assert!((vp - vp2.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_fluid_masking() {
        let fluid_model = "\
fluid core model
3
1 0.0    11.0 9.0 9.0 0.0 0.0 1.0 0.0 600.0
2 3480.0 10.0 8.0 8.0 0.0 0.0 1.0 0.0 600.0
3 6371.0 2.7  6.0 6.0 3.5 3.5 1.0 300.0 600.0
";
        let model = parse_model(fluid_model).unwrap();
        let samples = model.ingest();
        assert!(samples[0].fluid);
        assert_eq!(samples[0].vs, samples[0].vp);
        assert!(!samples[2].fluid);
        assert_eq!(samples[2].vs, 3.5);
    }
}
