// Phase Grammar
// The complete enumeration of recognised phase codes and their traversal
// structure

use crate::WaveType;
use serde::{Deserialize, Serialize};

/// Structural family of a phase, fixing which shells are walked for
/// sub-branches and where the ray-parameter range ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseFamily {
    /// Turning phases walked from the surface to the centre: P, pP, PP.
    Refracted,
    /// Surface conversion at the midpoint: SP, PS. Mantle turning only.
    SurfaceConverted,
    /// Topside reflection off the outer core: PcP, ScS, PcS, ScP.
    CoreReflected,
    /// Topside reflection off the inner core: PKiKP and relatives.
    InnerCoreReflected,
    /// Core-penetrating turning phases: PKP, SKS, SKP, PKS.
    CorePenetrating,
    /// Underside reflection at the core top: PKKP, SKKS, SKKP, PKKS.
    CoreUnderside,
}

/// Parsed structure of one phase code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub code: String,
    pub family: PhaseFamily,
    /// Wave type of the downgoing legs.
    pub down_wave: WaveType,
    /// Wave type of the returning legs.
    pub return_wave: WaveType,
    /// Lowercase depth-phase prefix, if any.
    pub up_prefix: Option<char>,
    /// Traversal pairs per major shell: (mantle, outer core, inner core).
    pub counts: (u8, u8, u8),
    /// Sign of the up-going depth correction.
    pub upgoing_sign: i8,
    /// Ray segment types: upgoing, downgoing, returning.
    pub segment_codes: [char; 3],
}

/// Parses a phase code against the fixed grammar. Unknown codes yield
/// None; the builder logs and skips them.
pub fn parse_phase(code: &str) -> Option<PhaseSpec> {
    if code.is_empty() {
        return None;
    }
    let (up_prefix, body) = match code.chars().next() {
        Some(c @ ('p' | 's')) => (Some(c), &code[1..]),
        _ => (None, code),
    };

    let (family, counts) = match body {
        "P" | "S" => (PhaseFamily::Refracted, (1, 1, 1)),
        "PP" | "SS" => (PhaseFamily::Refracted, (2, 2, 2)),
        "SP" | "PS" => (PhaseFamily::SurfaceConverted, (2, 0, 0)),
        "PcP" | "ScS" | "PcS" | "ScP" => (PhaseFamily::CoreReflected, (1, 0, 0)),
        "PKiKP" | "SKiKS" | "PKiKS" | "SKiKP" => (PhaseFamily::InnerCoreReflected, (1, 1, 0)),
        "PKKP" | "SKKS" | "SKKP" | "PKKS" => (PhaseFamily::CoreUnderside, (1, 2, 2)),
        "PKP" | "SKS" | "SKP" | "PKS" => (PhaseFamily::CorePenetrating, (1, 1, 1)),
        _ => return None,
    };

    // Depth-phase prefixes only make sense on codes that leave the source
    // downward after the surface bounce.
    if up_prefix.is_some()
        && !matches!(
            family,
            PhaseFamily::Refracted | PhaseFamily::InnerCoreReflected | PhaseFamily::CorePenetrating
        )
    {
        return None;
    }
    // Doubled phases reflect at the surface already; a depth prefix on
    // them is not in the grammar.
    if up_prefix.is_some() && (body == "PP" || body == "SS") {
        return None;
    }

    let first = body.chars().next()?;
    let last = body.chars().last()?;
    let down_wave = wave_of(first)?;
    let return_wave = wave_of(last)?;

    let upgoing_sign = if up_prefix.is_some() { 1 } else { -1 };
    let up_char = up_prefix.unwrap_or(match down_wave {
        WaveType::P => 'p',
        WaveType::S => 's',
    });

    Some(PhaseSpec {
        code: code.to_string(),
        family,
        down_wave,
        return_wave,
        up_prefix,
        counts,
        upgoing_sign,
        segment_codes: [up_char, first, last],
    })
}

impl PhaseSpec {
    /// True when down and return legs differ in wave type.
    pub fn is_converted(&self) -> bool {
        self.down_wave != self.return_wave
    }

    /// True for codes with any P-type leg; they are bounded by the P
    /// surface slowness rather than the S one.
    pub fn p_bearing(&self) -> bool {
        self.down_wave == WaveType::P || self.return_wave == WaveType::P
    }

    pub fn max_count(&self) -> u8 {
        self.counts.0.max(self.counts.1).max(self.counts.2)
    }
}

fn wave_of(c: char) -> Option<WaveType> {
    match c {
        'P' => Some(WaveType::P),
        'S' => Some(WaveType::S),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_phases() {
        let p = parse_phase("P").unwrap();
        assert_eq!(p.family, PhaseFamily::Refracted);
        assert_eq!(p.counts, (1, 1, 1));
        assert_eq!(p.down_wave, WaveType::P);
        assert_eq!(p.upgoing_sign, -1);
        assert_eq!(p.segment_codes, ['p', 'P', 'P']);

        let s = parse_phase("S").unwrap();
        assert_eq!(s.down_wave, WaveType::S);
        assert_eq!(s.return_wave, WaveType::S);
    }

    #[test]
    fn test_depth_phases() {
        let pp = parse_phase("pP").unwrap();
        assert_eq!(pp.up_prefix, Some('p'));
        assert_eq!(pp.upgoing_sign, 1);
        assert_eq!(pp.segment_codes, ['p', 'P', 'P']);

        let sp = parse_phase("sP").unwrap();
        assert_eq!(sp.segment_codes, ['s', 'P', 'P']);
        assert_eq!(sp.down_wave, WaveType::P);
    }

    #[test]
    fn test_surface_reflections_and_conversions() {
        let pp = parse_phase("PP").unwrap();
        assert_eq!(pp.counts, (2, 2, 2));
        let sp = parse_phase("SP").unwrap();
        assert_eq!(sp.family, PhaseFamily::SurfaceConverted);
        assert_eq!(sp.counts, (2, 0, 0));
        assert!(sp.is_converted());
        assert_eq!(sp.down_wave, WaveType::S);
        assert_eq!(sp.return_wave, WaveType::P);
    }

    #[test]
    fn test_core_phases() {
        let pcp = parse_phase("PcP").unwrap();
        assert_eq!(pcp.family, PhaseFamily::CoreReflected);
        assert_eq!(pcp.counts, (1, 0, 0));

        let scp = parse_phase("ScP").unwrap();
        assert!(scp.is_converted());
        assert!(scp.p_bearing());

        let pkikp = parse_phase("PKiKP").unwrap();
        assert_eq!(pkikp.family, PhaseFamily::InnerCoreReflected);
        assert_eq!(pkikp.counts, (1, 1, 0));

        let ppkikp = parse_phase("pPKiKP").unwrap();
        assert_eq!(ppkikp.up_prefix, Some('p'));
        assert_eq!(ppkikp.counts, (1, 1, 0));

        let pkkp = parse_phase("PKKP").unwrap();
        assert_eq!(pkkp.family, PhaseFamily::CoreUnderside);
        assert_eq!(pkkp.counts, (1, 2, 2));

        let sks = parse_phase("SKS").unwrap();
        assert_eq!(sks.family, PhaseFamily::CorePenetrating);
        assert_eq!(sks.counts, (1, 1, 1));
    }

    #[test]
    fn test_unknown_codes_rejected() {
        for bad in ["Q", "PKJKP", "PcPcP", "pPP", "sSS", "", "pScS", "Pdiff"] {
            assert!(parse_phase(bad).is_none(), "{} should not parse", bad);
        }
    }
}
