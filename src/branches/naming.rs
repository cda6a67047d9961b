// Sub-Branch Naming
// Pure, table-driven synthesis of sub-branch phase codes from the
// turning-shell temporary codes and the original phase structure

/// Composes the phase code of one sub-branch from the temporary codes of
/// its turning shell. Non-converted phases use the downgoing code alone;
/// converted phases splice the downgoing and returning codes. A lowercase
/// depth prefix is carried over, and the S caustic-suffix rewrite is
/// applied last.
pub fn synthesize_name(
    down_code: &str,
    return_code: &str,
    converted: bool,
    up_prefix: Option<char>,
    core_suffix: Option<&str>,
) -> String {
    let mut name = if converted {
        format!("{}{}", down_code, return_code)
    } else {
        down_code.to_string()
    };
    if let Some(suffix) = core_suffix {
        name.push_str(suffix);
    }
    if let Some(prefix) = up_prefix {
        name.insert(0, prefix);
    }
    rewrite_s_caustic_suffix(&name)
}

/// Doubled surface-reflected phases repeat the shell code: PP in the
/// crust is PgPg, in the mantle PnPn.
pub fn synthesize_doubled_name(down_code: &str, up_prefix: Option<char>) -> String {
    let mut name = format!("{}{}", down_code, down_code);
    if let Some(prefix) = up_prefix {
        name.insert(0, prefix);
    }
    rewrite_s_caustic_suffix(&name)
}

/// S-bearing core codes rename their upper-branch suffix: the `ab` pair
/// after `KS` or `S'` becomes `ac`.
pub fn rewrite_s_caustic_suffix(name: &str) -> String {
    name.replace("KSab", "KSac").replace("S'ab", "S'ac")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names() {
        assert_eq!(synthesize_name("Pn", "Pn", false, None, None), "Pn");
        assert_eq!(synthesize_name("PKIKP", "PKIKP", false, None, None), "PKIKP");
    }

    #[test]
    fn test_converted_names() {
        assert_eq!(synthesize_name("S", "P", true, None, None), "SP");
        assert_eq!(synthesize_name("Sg", "Pg", true, None, None), "SgPg");
    }

    #[test]
    fn test_depth_prefix() {
        assert_eq!(synthesize_name("P", "P", false, Some('p'), None), "pP");
        assert_eq!(
            synthesize_name("PKIKP", "PKIKP", false, Some('s'), None),
            "sPKIKP"
        );
    }

    #[test]
    fn test_core_suffix_and_rewrite() {
        assert_eq!(synthesize_name("PKP", "PKP", false, None, Some("ab")), "PKPab");
        // The S-bearing upper core branch renames ab to ac.
        assert_eq!(synthesize_name("SKS", "SKS", false, None, Some("ab")), "SKSac");
        assert_eq!(rewrite_s_caustic_suffix("S'ab"), "S'ac");
        assert_eq!(rewrite_s_caustic_suffix("PKPab"), "PKPab");
    }

    #[test]
    fn test_doubled_names() {
        assert_eq!(synthesize_doubled_name("Pg", None), "PgPg");
        assert_eq!(synthesize_doubled_name("Sn", None), "SnSn");
    }
}
