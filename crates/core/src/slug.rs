//! Normalization of generated display names into storage-safe slugs.

/// Derives a storage-safe slug from a free-form generated name.
///
/// Every character outside ASCII letters, spaces, periods and hyphens
/// is stripped, the remainder is lower-cased, surrounding whitespace
/// is trimmed and the remaining spaces become hyphens. Stripping
/// happens before case-folding, so a Unicode letter whose fold would
/// land in the ASCII range does not survive. The mapping is pure and
/// deterministic; two distinct names can normalize to the same slug
/// and callers must handle that themselves.
pub fn to_slug(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| {
            c.is_ascii_alphabetic() || matches!(c, ' ' | '.' | '-')
        })
        .collect();
    kept.to_ascii_lowercase().trim().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_name() {
        assert_eq!(to_slug("Horizontal Boring Mill"), "horizontal-boring-mill");
    }

    #[test]
    fn test_punctuation_and_digits_stripped() {
        // The stripped "#4!" leaves a trailing space, which trimming
        // removes before hyphenation, so no trailing hyphen remains.
        assert_eq!(to_slug("CNC Milling Machine #4!"), "cnc-milling-machine");
    }

    #[test]
    fn test_idempotent() {
        let once = to_slug("CNC Milling Machine #4!");
        assert_eq!(to_slug(&once), once);

        let dotted = to_slug("Rev. 2 Stamping Press");
        assert_eq!(to_slug(&dotted), dotted);
    }

    #[test]
    fn test_periods_kept() {
        assert_eq!(to_slug("St. Laser Cutter"), "st.-laser-cutter");
    }

    #[test]
    fn test_stripped_before_case_folding() {
        // U+212A KELVIN SIGN folds to ASCII `k`, but it is not an
        // ASCII letter, so it never reaches the fold.
        assert_eq!(to_slug("\u{212A}elvin Probe"), "elvin-probe");
        assert_eq!(to_slug("Straßenbahn"), "straenbahn");
    }

    #[test]
    fn test_collapses_to_empty() {
        assert_eq!(to_slug("  #42!  "), "");
        assert_eq!(to_slug(""), "");
    }
}
