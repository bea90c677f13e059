//! Locale-tolerant conversion of display amounts ("1,92T €", "$123.4M", "3,55%")
//! into plain `f64` values.

/// Placeholder text for anything that could not be located.
pub const SENTINEL: &str = "N/A";

const CURRENCY_SYMBOLS: [char; 3] = ['$', '€', '£'];

/// Multiplier for a magnitude suffix letter, if it is one.
pub fn multiplier(suffix: char) -> Option<f64> {
    match suffix.to_ascii_uppercase() {
        'K' => Some(1e3),
        'M' => Some(1e6),
        'B' => Some(1e9),
        'T' => Some(1e12),
        _ => None,
    }
}

/// Parses a display amount. Returns `None` for empty input, the `"N/A"` and `"-"`
/// placeholders, or anything left unparseable after cleanup. A present `0.0` means
/// the page really showed zero.
///
/// Percentages are returned unscaled: `"3,55%"` gives `3.55`.
pub fn normalize(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == SENTINEL || trimmed == "-" {
        return None;
    }

    let mut cleaned: String = trimmed
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c))
        .collect();
    let is_percent = cleaned.contains('%');

    let mut scale = 1.0;
    if !is_percent {
        let body = cleaned.trim_end();
        if let Some(last) = body.chars().last() {
            if let Some(m) = multiplier(last) {
                scale = m;
                cleaned = body[..body.len() - last.len_utf8()].to_string();
            }
        }
    }

    let compact: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    let numeric: String = canonical_separators(&compact)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if !numeric.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let value = numeric.parse::<f64>().ok()? * scale;
    value.is_finite().then_some(value)
}

/// Rewrites grouping/decimal separators so that only a single `.` decimal point
/// remains.
///
/// With both `,` and `.` present, the rightmost one is the decimal point. A
/// repeated separator is always grouping. A single comma is grouping only when
/// exactly three digits follow it.
fn canonical_separators(s: &str) -> String {
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            let (decimal, group) = if c > d { (',', '.') } else { ('.', ',') };
            s.chars()
                .filter(|ch| *ch != group)
                .map(|ch| if ch == decimal { '.' } else { ch })
                .collect()
        }
        (Some(_), None) => {
            if is_grouping(s, ',') {
                s.replace(',', "")
            } else {
                s.replace(',', ".")
            }
        }
        (None, Some(_)) => {
            if s.matches('.').count() > 1 {
                s.replace('.', "")
            } else {
                s.to_string()
            }
        }
        (None, None) => s.to_string(),
    }
}

fn is_grouping(s: &str, sep: char) -> bool {
    let groups: Vec<&str> = s.split(sep).collect();
    if groups.len() > 2 {
        return true;
    }
    // "67,000" reads as a thousands group; "1,92" and "1,9200" as decimals.
    groups[1].len() == 3 && groups[1].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= b.abs() * 1e-12
    }

    #[test]
    fn magnitude_suffixes_scale() {
        for (suffix, mult) in [("K", 1e3), ("M", 1e6), ("B", 1e9), ("T", 1e12)] {
            let v = normalize(&format!("4.25{suffix}")).unwrap();
            assert!(approx(v, 4.25 * mult), "{suffix} -> {v}");
        }
    }

    #[test]
    fn comma_decimal_with_trailing_euro() {
        assert!(approx(normalize("1,92T €").unwrap(), 1.92e12));
        assert!(approx(normalize("1,92T").unwrap(), 1.92e12));
    }

    #[test]
    fn dollar_prefix() {
        assert!(approx(normalize("$123.4M").unwrap(), 123.4e6));
        assert!(approx(normalize("$1.32T").unwrap(), 1.32e12));
    }

    #[test]
    fn thousands_groups() {
        assert!(approx(normalize("$67,000.00").unwrap(), 67_000.0));
        assert!(approx(normalize("$1,234,567").unwrap(), 1_234_567.0));
        assert!(approx(normalize("1.234.567,89 €").unwrap(), 1_234_567.89));
        assert!(approx(normalize("1\u{202f}234\u{202f}567,89 €").unwrap(), 1_234_567.89));
    }

    #[test]
    fn percent_is_not_scaled() {
        assert!(approx(normalize("3,55%").unwrap(), 3.55));
        assert!(approx(normalize(" 12.5 % ").unwrap(), 12.5));
    }

    #[test]
    fn placeholders_are_missing() {
        assert_eq!(normalize("N/A"), None);
        assert_eq!(normalize("-"), None);
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("$"), None);
        assert_eq!(normalize("abc"), None);
    }

    #[test]
    fn zero_is_present() {
        assert_eq!(normalize("$0"), Some(0.0));
    }
}
