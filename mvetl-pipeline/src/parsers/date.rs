//! Calendar dates ("January 3, 1999", "1999-01-03", "January 1999", "1999")
//!
//! The four forms are alternatives of one pattern; the leftmost match in the
//! text wins and, at the same position, the earlier form wins. Missing day
//! and month default to 1.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static DATE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        concat!(
            r"(?P<mdy_month>{m})\s(?P<mdy_day>[0-9]{{1,2}}),\s(?P<mdy_year>[0-9]{{4}})",
            r"|(?P<ymd_year>[0-9]{{4}})[^0-9\s](?P<ymd_month>[01][0-9])[^0-9\s](?P<ymd_day>[0-3][0-9])",
            r"|(?P<my_month>{m})\s(?P<my_year>[0-9]{{4}})",
            r"|(?P<year>[0-9]{{4}})",
        ),
        m = MONTHS
    );
    Regex::new(&pattern).expect("date regex")
});

/// Which alternative matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateForm {
    /// "January 3, 1999"
    MonthDayYear,
    /// "1999-01-03", "1999/01/03"
    YearMonthDay,
    /// "January 1999"
    MonthYear,
    /// "1999"
    Year,
}

/// Parse the first date mention in `text`
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    parse_date_with_form(text).map(|(date, _)| date)
}

/// Parse the first date mention and report which form matched
///
/// A match that names an impossible date (e.g. "February 30, 2001") gives
/// `None`.
pub fn parse_date_with_form(text: &str) -> Option<(NaiveDate, DateForm)> {
    let caps = DATE.captures(text)?;
    let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<i32>().ok());

    let (y, m, d, form) = if caps.name("mdy_month").is_some() {
        (
            year("mdy_year")?,
            month_number(&caps["mdy_month"])?,
            num("mdy_day")?,
            DateForm::MonthDayYear,
        )
    } else if caps.name("ymd_year").is_some() {
        (
            year("ymd_year")?,
            num("ymd_month")?,
            num("ymd_day")?,
            DateForm::YearMonthDay,
        )
    } else if caps.name("my_month").is_some() {
        (
            year("my_year")?,
            month_number(&caps["my_month"])?,
            1,
            DateForm::MonthYear,
        )
    } else {
        (year("year")?, 1, 1, DateForm::Year)
    };

    NaiveDate::from_ymd_opt(y, m, d).map(|date| (date, form))
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .split('|')
        .position(|month| month == name)
        .map(|index| index as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_all_day_forms_agree() {
        let expected = ymd(1999, 1, 3);
        assert_eq!(parse_date("January 3, 1999"), Some(expected));
        assert_eq!(parse_date("1999-01-03"), Some(expected));
        assert_eq!(parse_date("1999/01/03"), Some(expected));
        assert_eq!(parse_date("1999.01.03"), Some(expected));
    }

    #[test]
    fn test_month_year_defaults_to_first() {
        assert_eq!(
            parse_date_with_form("January 1999"),
            Some((ymd(1999, 1, 1), DateForm::MonthYear))
        );
    }

    #[test]
    fn test_bare_year() {
        assert_eq!(
            parse_date_with_form("1999"),
            Some((ymd(1999, 1, 1), DateForm::Year))
        );
    }

    #[test]
    fn test_embedded_in_prose() {
        assert_eq!(
            parse_date("July 19, 1990 (1990-07-19) (United States)"),
            Some(ymd(1990, 7, 19))
        );
        assert_eq!(parse_date("Released in December 2005 worldwide"), Some(ymd(2005, 12, 1)));
        // Non-English month names only contribute their year
        assert_eq!(parse_date("janvier 1999"), Some(ymd(1999, 1, 1)));
    }

    #[test]
    fn test_leftmost_alternative_priority() {
        // Full date is preferred over the month-year reading at the same position
        assert_eq!(
            parse_date_with_form("March 12, 2004").map(|(_, f)| f),
            Some(DateForm::MonthDayYear)
        );
        // Day-first prose is not a supported form; the month-year reading applies
        assert_eq!(parse_date("3 January 1999"), Some(ymd(1999, 1, 1)));
    }

    #[test]
    fn test_no_value() {
        assert_eq!(parse_date("TBA"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("Jan 99"), None);
    }

    #[test]
    fn test_impossible_date_is_no_value() {
        assert_eq!(parse_date("February 30, 2001"), None);
        // The numeric form matches first, so no fallback to the bare year
        assert_eq!(parse_date("2001-13-01"), None);
    }
}
