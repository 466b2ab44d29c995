//! PGN `Date` tag: `YYYY.MM.DD` with any component allowed to be `??` or
//! missing, meaning unknown.

use std::fmt;

/// A PGN date. A zero component means "unknown", matching how BCGN encodes
/// the same field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Date {
    year: u16,
    month: u8,
    day: u8,
}

impl Date {
    pub const UNKNOWN: Date = Date { year: 0, month: 0, day: 0 };

    pub fn new(year: u16, month: u8, day: u8) -> Date {
        Date { year, month, day }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    /// Parses `YYYY`, `YYYY.MM`, or `YYYY.MM.DD`; any component may be `?`
    /// (or the whole string may be `?`) to mean unknown.
    pub fn parse(s: &str) -> Option<Date> {
        let s = s.trim();
        if s.is_empty() || s == "?" {
            return Some(Date::UNKNOWN);
        }

        let mut parts = s.split('.');
        let year = match parts.next()? {
            "?" | "????" => 0,
            field => field.parse().ok()?,
        };
        let month = match parts.next() {
            None => 0,
            Some("?") | Some("??") => 0,
            Some(field) => field.parse().ok()?,
        };
        let day = match parts.next() {
            None => 0,
            Some("?") | Some("??") => 0,
            Some(field) => field.parse().ok()?,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Date { year, month, day })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year = if self.year == 0 { "????".to_string() } else { format!("{:04}", self.year) };
        let month = if self.month == 0 { "??".to_string() } else { format!("{:02}", self.month) };
        let day = if self.day == 0 { "??".to_string() } else { format!("{:02}", self.day) };
        write!(f, "{year}.{month}.{day}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_date() {
        let date = Date::parse("1851.06.21").unwrap();
        assert_eq!(date, Date::new(1851, 6, 21));
    }

    #[test]
    fn parses_year_only() {
        let date = Date::parse("1851").unwrap();
        assert_eq!(date, Date::new(1851, 0, 0));
    }

    #[test]
    fn parses_year_and_month() {
        let date = Date::parse("1851.06").unwrap();
        assert_eq!(date, Date::new(1851, 6, 0));
    }

    #[test]
    fn unknown_components_become_zero() {
        let date = Date::parse("1851.??.21").unwrap();
        assert_eq!(date, Date::new(1851, 0, 21));
    }

    #[test]
    fn bare_question_mark_is_fully_unknown() {
        assert_eq!(Date::parse("?").unwrap(), Date::UNKNOWN);
    }

    #[test]
    fn displays_unknown_components_as_question_marks() {
        assert_eq!(Date::new(1851, 0, 21).to_string(), "1851.??.21");
        assert_eq!(Date::UNKNOWN.to_string(), "????.??.??");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Date::parse("not-a-date").is_none());
    }
}
