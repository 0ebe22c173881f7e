//! Migration version numbers in `yyyyMMddHHmm` form
//!
//! A `TimestampToken` is the sortable version a `[Migration(...)]` marker carries: twelve ASCII
//! digits, 24-hour clock, no timezone, nothing before or after. Parsing is strict and
//! calendar-aware, so `202402301200` (February 30th) is rejected just like `abc`.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// chrono format string for a token
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Human-facing spelling of the format, used in diagnostic messages
pub const TIMESTAMP_PATTERN: &str = "yyyyMMddHHmm";

lazy_static! {
    // `\d` would accept non-ASCII digits
    static ref TOKEN_SHAPE: Regex =
        Regex::new(r"^[0-9]{12}$").expect("timestamp shape pattern is a valid regex");
}

/// Why a piece of text is not a valid migration timestamp
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("'{text}' is not twelve ASCII digits ({TIMESTAMP_PATTERN})")]
    Shape { text: String },

    #[error("'{text}' is not a valid calendar date and time")]
    Calendar { text: String },

    #[error("year {year} cannot be written as a four digit migration number")]
    YearOutOfRange { year: i32 },
}

/// A validated `yyyyMMddHHmm` migration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampToken(NaiveDateTime);

impl TimestampToken {
    /// Strictly parse a token from source text
    pub fn parse(text: &str) -> Result<Self, TimestampError> {
        if !TOKEN_SHAPE.is_match(text) {
            return Err(TimestampError::Shape {
                text: text.to_string(),
            });
        }

        let calendar = || TimestampError::Calendar {
            text: text.to_string(),
        };
        let field = |range: std::ops::Range<usize>| -> Result<u32, TimestampError> {
            text[range].parse::<u32>().map_err(|_| calendar())
        };

        let year = field(0..4)? as i32;
        if year == 0 {
            return Err(calendar());
        }

        let datetime = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)
            .and_then(|date| date.and_hms_opt(field(8..10).ok()?, field(10..12).ok()?, 0))
            .ok_or_else(calendar)?;

        Ok(Self(datetime))
    }

    /// Build a token from an instant, dropping seconds and below
    pub fn from_datetime(datetime: NaiveDateTime) -> Result<Self, TimestampError> {
        let year = datetime.year();
        if !(1..=9999).contains(&year) {
            return Err(TimestampError::YearOutOfRange { year });
        }

        let truncated = datetime
            .date()
            .and_hms_opt(datetime.hour(), datetime.minute(), 0)
            .unwrap_or(datetime);
        Ok(Self(truncated))
    }

    /// The instant this token encodes
    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// The token as the integer literal written into source
    pub fn as_number(&self) -> u64 {
        let d = self.0;
        u64::from(d.year() as u32) * 100_000_000
            + u64::from(d.month()) * 1_000_000
            + u64::from(d.day()) * 10_000
            + u64::from(d.hour()) * 100
            + u64::from(d.minute())
    }
}

impl fmt::Display for TimestampToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for TimestampToken {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Source of the current instant for generated migration numbers
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Freeze the clock at the instant a token encodes
    pub fn at(token: TimestampToken) -> Self {
        Self(token.datetime())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
