//! Monetary amounts ("$12.5 million", "$1,234,567")
//!
//! Grammar, tried in this order:
//! 1. Range collapse: `$<a>–<b> ...` becomes `$<b> ...`
//! 2. Scaled form: `$` number `million|billion` (tolerates "millon", "millio", "milli")
//! 3. Grouped form: `$` digits in groups of three separated by `,` or `.`,
//!    not followed by whitespace + "million"/"billion"
//!
//! The leftmost match in the text wins; at the same position the scaled form
//! wins over the grouped form.

use once_cell::sync::Lazy;
use regex::Regex;

static SCALED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s*(?P<number>[0-9]+\.?[0-9]*)\s*(?P<scale>[mb])ill(?:i?on|io|i)")
        .expect("scaled money regex")
});

static GROUPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*(?P<digits>[0-9]{1,3}(?:[,.][0-9]{3})+)").expect("grouped money regex")
});

static SCALE_WORD_AHEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s[mb]illion").expect("scale lookahead regex"));

static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[0-9]+\]\s*").expect("citation regex"));

/// Unit multiplier of the scaled form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Million,
    Billion,
}

impl Scale {
    fn exponent(self) -> usize {
        match self {
            Scale::Million => 6,
            Scale::Billion => 9,
        }
    }
}

/// A recognised money mention, before numeric conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyMatch {
    /// `number` is the decimal prefix, e.g. "12.5"
    Scaled { start: usize, number: String, scale: Scale },
    /// `digits` still contains its grouping separators, e.g. "1,234,567"
    Grouped { start: usize, digits: String },
}

impl MoneyMatch {
    fn start(&self) -> usize {
        match self {
            MoneyMatch::Scaled { start, .. } | MoneyMatch::Grouped { start, .. } => *start,
        }
    }

    /// Amount in base currency units
    pub fn amount(&self) -> Option<f64> {
        match self {
            MoneyMatch::Scaled { number, scale, .. } => {
                shift_decimal(number, scale.exponent()).parse().ok()
            }
            MoneyMatch::Grouped { digits, .. } => {
                let plain: String = digits.chars().filter(|c| c.is_ascii_digit()).collect();
                plain.parse().ok()
            }
        }
    }
}

/// Parse a money mention into base currency units
///
/// Returns `None` when no form matches.
pub fn parse_money(text: &str) -> Option<f64> {
    let collapsed = collapse_ranges(text);
    find_money(&collapsed)?.amount()
}

/// Parse a budget field: citation markers like `[3]` are removed first
pub fn parse_budget(text: &str) -> Option<f64> {
    let cleaned = CITATION.replace_all(text, "");
    parse_money(&cleaned)
}

/// Locate the leftmost money mention
pub fn find_money(text: &str) -> Option<MoneyMatch> {
    let scaled = SCALED.captures(text).map(|caps| {
        let scale = match &caps["scale"] {
            "m" | "M" => Scale::Million,
            _ => Scale::Billion,
        };
        MoneyMatch::Scaled {
            start: caps.get(0).map_or(0, |m| m.start()),
            number: caps["number"].to_string(),
            scale,
        }
    });

    let grouped = find_grouped(text);

    match (scaled, grouped) {
        (Some(s), Some(g)) if g.start() < s.start() => Some(g),
        (Some(s), _) => Some(s),
        (None, g) => g,
    }
}

/// Leftmost grouped match whose tail is not a scale word
///
/// When the full match is followed by " million", the last digit group is
/// given back (the next char is then a separator, not whitespace); a match
/// with a single group left cannot shrink and is rejected.
fn find_grouped(text: &str) -> Option<MoneyMatch> {
    for caps in GROUPED.captures_iter(text) {
        let whole = caps.get(0)?;
        let digits = caps.name("digits")?;
        let mut digits_str = digits.as_str();

        if SCALE_WORD_AHEAD.is_match(&text[whole.end()..]) {
            // Each group is one separator + three digits
            if digits_str.len() >= 9 {
                digits_str = &digits_str[..digits_str.len() - 4];
            } else {
                continue;
            }
        }

        return Some(MoneyMatch::Grouped {
            start: whole.start(),
            digits: digits_str.to_string(),
        });
    }
    None
}

/// Collapse `$a-b` ranges to `$b`
///
/// From a `$`, everything up to and including the last dash on the same line
/// that is not followed by a lowercase letter is replaced by a single `$`.
pub fn collapse_ranges(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(dollar) = rest.find('$') {
        let after = &rest[dollar + 1..];
        let line = after.find('\n').map_or(after, |end| &after[..end]);

        match last_range_dash(line) {
            Some(dash_end) => {
                out.push_str(&rest[..dollar]);
                out.push('$');
                rest = &after[dash_end..];
            }
            None => {
                out.push_str(&rest[..=dollar]);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Byte offset just past the last qualifying dash in `line`
fn last_range_dash(line: &str) -> Option<usize> {
    let mut found = None;
    for (i, c) in line.char_indices() {
        if matches!(c, '-' | '\u{2014}' | '\u{2013}') {
            let end = i + c.len_utf8();
            let followed_by_word = line[end..]
                .chars()
                .next()
                .is_some_and(|n| n.is_ascii_lowercase());
            if !followed_by_word {
                found = Some(end);
            }
        }
    }
    found
}

/// Move the decimal point of `number` right by `places` without going through
/// floating point multiplication ("12.5", 6 -> "12500000")
fn shift_decimal(number: &str, places: usize) -> String {
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));

    let mut digits = String::with_capacity(int_part.len() + places + 1);
    digits.push_str(int_part);

    if frac_part.len() <= places {
        digits.push_str(frac_part);
        digits.extend(std::iter::repeat('0').take(places - frac_part.len()));
    } else {
        digits.push_str(&frac_part[..places]);
        digits.push('.');
        digits.push_str(&frac_part[places..]);
    }

    if digits.is_empty() {
        "0".to_string()
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_million() {
        assert_eq!(parse_money("$12.5 million"), Some(12_500_000.0));
        assert_eq!(parse_money("$7 million"), Some(7_000_000.0));
        assert_eq!(parse_money("$ 3.25 Million"), Some(3_250_000.0));
    }

    #[test]
    fn test_scaled_billion() {
        assert_eq!(parse_money("$1.2 billion"), Some(1_200_000_000.0));
        assert_eq!(parse_money("$2.787 billion[2]"), Some(2_787_000_000.0));
    }

    #[test]
    fn test_scaled_typos_tolerated() {
        assert_eq!(parse_money("$4 millon"), Some(4_000_000.0));
        assert_eq!(parse_money("$4 millio"), Some(4_000_000.0));
        assert_eq!(parse_money("$4 milli"), Some(4_000_000.0));
        assert_eq!(parse_money("$1 billio"), Some(1_000_000_000.0));
    }

    #[test]
    fn test_scaled_is_exact_for_long_fractions() {
        assert_eq!(parse_money("$1.23456789 billion"), Some(1_234_567_890.0));
        assert_eq!(parse_money("$0.1 million"), Some(100_000.0));
        assert_eq!(parse_money("$12. million"), Some(12_000_000.0));
    }

    #[test]
    fn test_grouped() {
        assert_eq!(parse_money("$1,234,567"), Some(1_234_567.0));
        assert_eq!(parse_money("$1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_money("$ 950,000 (estimated)"), Some(950_000.0));
    }

    #[test]
    fn test_grouped_followed_by_scale_word() {
        // Single group cannot shrink: no value
        assert_eq!(parse_money("$1,234 million"), None);
        // Multi-group gives back the last group
        assert_eq!(parse_money("$1,234,567 million"), Some(1_234.0));
    }

    #[test]
    fn test_no_value() {
        assert_eq!(parse_money("unknown"), None);
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("12 million"), None);
        assert_eq!(parse_money("$1234"), None);
        assert_eq!(parse_money("£5 million"), None);
    }

    #[test]
    fn test_leftmost_match_wins() {
        assert_eq!(parse_money("$500,000 to $2 million"), Some(500_000.0));
        assert_eq!(parse_money("about $2 million ($1,500,000 net)"), Some(2_000_000.0));
    }

    #[test]
    fn test_range_collapse() {
        assert_eq!(collapse_ranges("$12\u{2013}15 million"), "$15 million");
        assert_eq!(collapse_ranges("$1.5-2 billion"), "$2 billion");
        assert_eq!(collapse_ranges("$5 million-plus"), "$5 million-plus");
        assert_eq!(collapse_ranges("no currency - here"), "no currency - here");
        assert_eq!(parse_money("$12\u{2013}15 million"), Some(15_000_000.0));
        assert_eq!(parse_money("$60\u{2014}$65 million"), Some(65_000_000.0));
    }

    #[test]
    fn test_budget_strips_citations() {
        assert_eq!(parse_budget("$1[3] million"), Some(1_000_000.0));
        assert_eq!(parse_budget("$20 million[1][2]"), Some(20_000_000.0));
    }

    #[test]
    fn test_shift_decimal() {
        assert_eq!(shift_decimal("12.5", 6), "12500000");
        assert_eq!(shift_decimal("1.2", 9), "1200000000");
        assert_eq!(shift_decimal("0.0000001", 6), "0000000.1");
        assert_eq!(shift_decimal("3", 6), "3000000");
    }
}
