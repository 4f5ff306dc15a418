//! Running times ("1h 30min", "102 minutes", "1 hour 47 minutes")
//!
//! One pattern with two alternatives: `<h> hour(s) <m>` or `<m> m...`.
//! Unlike money and dates, unrecognised text is 0 minutes, not "no value".

use once_cell::sync::Lazy;
use regex::Regex;

static RUNTIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<hours>[0-9]+)\s*ho?u?r?s?\s*(?P<minutes>[0-9]*)|(?P<bare>[0-9]+)\s*m")
        .expect("runtime regex")
});

/// Raw captures of the runtime pattern, missing captures as 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeParts {
    pub hours: u32,
    pub minutes: u32,
    pub bare_minutes: u32,
}

impl RuntimeParts {
    /// Bare minutes win unless they are 0
    pub fn total_minutes(&self) -> u32 {
        if self.bare_minutes == 0 {
            self.hours.saturating_mul(60).saturating_add(self.minutes)
        } else {
            self.bare_minutes
        }
    }
}

/// Extract the three captures from the first match in `text`
pub fn runtime_parts(text: &str) -> RuntimeParts {
    let Some(caps) = RUNTIME.captures(text) else {
        return RuntimeParts::default();
    };
    let field = |name: &str| {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };

    RuntimeParts {
        hours: field("hours"),
        minutes: field("minutes"),
        bare_minutes: field("bare"),
    }
}

/// Running time in minutes
pub fn parse_runtime(text: &str) -> u32 {
    runtime_parts(text).total_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_and_minutes() {
        assert_eq!(parse_runtime("1h 30min"), 90);
        assert_eq!(parse_runtime("1 hour 47 minutes"), 107);
        assert_eq!(parse_runtime("2 hours"), 120);
        assert_eq!(parse_runtime("2hrs 5"), 125);
    }

    #[test]
    fn test_bare_minutes() {
        assert_eq!(parse_runtime("45 m"), 45);
        assert_eq!(parse_runtime("102 minutes"), 102);
        assert_eq!(parse_runtime("approx. 90 min (DVD)"), 90);
    }

    #[test]
    fn test_unrecognised_is_zero() {
        assert_eq!(parse_runtime(""), 0);
        assert_eq!(parse_runtime("Two hours"), 0);
        assert_eq!(parse_runtime("unknown"), 0);
    }

    #[test]
    fn test_captures() {
        assert_eq!(
            runtime_parts("1h 30min"),
            RuntimeParts { hours: 1, minutes: 30, bare_minutes: 0 }
        );
        assert_eq!(
            runtime_parts("45 m"),
            RuntimeParts { hours: 0, minutes: 0, bare_minutes: 45 }
        );
    }

    #[test]
    fn test_zero_bare_minutes_falls_back_to_hours() {
        assert_eq!(parse_runtime("0 m"), 0);
    }
}
