//! Deadline date parsing.
//!
//! Deadlines are entered as `DD-MM-YYYY` and carry no time component. Every
//! comparison in the crate is done on `NaiveDate`, never on the raw text.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Textual format used for deadlines in commands and in the store file
pub const DEADLINE_FORMAT: &str = "%d-%m-%Y";

static DEADLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{2})-([0-9]{2})-([0-9]{4})$").expect("static regex"));

/// Why a deadline string was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// Not `DD-MM-YYYY` (two, two and four digits)
    Format(String),
    /// Month outside 1..=12
    Month(u32),
    /// Day outside the month's range for that year
    Day { day: u32, month: u32, year: i32 },
}

impl fmt::Display for DateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateError::Format(text) => write!(f, "'{}' is not in DD-MM-YYYY format", text),
            DateError::Month(month) => write!(f, "month {} is out of range", month),
            DateError::Day { day, month, year } => {
                write!(f, "day {} does not exist in {:02}-{}", day, month, year)
            }
        }
    }
}

impl std::error::Error for DateError {}

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` (1-based) of `year`
pub fn days_in_month(month: u32, year: i32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Validate a `DD-MM-YYYY` string and turn it into a calendar date
pub fn parse_deadline(text: &str) -> Result<NaiveDate, DateError> {
    let caps = DEADLINE_RE
        .captures(text)
        .ok_or_else(|| DateError::Format(text.to_string()))?;

    // The regex guarantees ASCII digits of bounded width, so these cannot overflow
    let day: u32 = caps[1].parse().map_err(|_| DateError::Format(text.to_string()))?;
    let month: u32 = caps[2].parse().map_err(|_| DateError::Format(text.to_string()))?;
    let year: i32 = caps[3].parse().map_err(|_| DateError::Format(text.to_string()))?;

    if !(1..=12).contains(&month) {
        return Err(DateError::Month(month));
    }
    if day < 1 || day > days_in_month(month, year) {
        return Err(DateError::Day { day, month, year });
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or(DateError::Day { day, month, year })
}

/// Render a deadline back into `DD-MM-YYYY`
pub fn format_deadline(date: NaiveDate) -> String {
    date.format(DEADLINE_FORMAT).to_string()
}

/// Serde adapter for deadlines stored as `DD-MM-YYYY`
pub mod dmy {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_deadline(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_deadline(&text).map_err(serde::de::Error::custom)
    }
}
