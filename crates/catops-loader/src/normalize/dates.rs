// Lenient date and date-time parsing for extract cells

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Result of parsing a date-like cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    /// Source carried no time of day
    Date(NaiveDate),
    /// Source carried a time of day
    DateTime(NaiveDateTime),
}

impl ParsedDate {
    pub fn date(self) -> NaiveDate {
        match self {
            ParsedDate::Date(d) => d,
            ParsedDate::DateTime(dt) => dt.date(),
        }
    }

    /// Date-only values land at midnight.
    pub fn date_time(self) -> NaiveDateTime {
        match self {
            ParsedDate::Date(d) => d.and_time(NaiveTime::MIN),
            ParsedDate::DateTime(dt) => dt,
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

// Month-first when the year comes last, the order the extract producer writes.
// Day-first only matches once the leading field cannot be a month.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d-%m-%Y", "%Y%m%d"];

/// Parse a cell into a date or date-time. `None` when nothing matches.
pub fn parse_date_like(raw: &str) -> Option<ParsedDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // Offsets are dropped, wall-clock time is kept
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(ParsedDate::DateTime(dt.naive_local()));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ParsedDate::DateTime(dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(ParsedDate::Date(d));
        }
    }

    None
}
