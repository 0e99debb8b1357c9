use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DayError;
use crate::time::study_date;

/// A calendar day written as the number `YYYYMMDD`.
///
/// Always a real date. Ordering follows the calendar.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "DayRepr", into = "u32")]
pub struct StudyDay(u32);

impl StudyDay {
    /// Validate a `YYYYMMDD` number.
    ///
    /// # Errors
    ///
    /// Returns `DayError` if the value is not 8 digits or not a calendar date.
    pub fn from_number(value: u32) -> Result<Self, DayError> {
        if !(10_000_000..=99_999_999).contains(&value) {
            return Err(DayError::Format(value.to_string()));
        }
        let (year, month, day) = (value / 10_000, (value / 100) % 100, value % 100);
        let year = i32::try_from(year).map_err(|_| DayError::Calendar(value))?;
        NaiveDate::from_ymd_opt(year, month, day)
            .map(|_| Self(value))
            .ok_or(DayError::Calendar(value))
    }

    /// Same as [`StudyDay::from_number`], for loosely typed payload values.
    ///
    /// # Errors
    ///
    /// Returns `DayError` for negative or out-of-range values.
    pub fn from_i64(value: i64) -> Result<Self, DayError> {
        u32::try_from(value)
            .map_err(|_| DayError::Format(value.to_string()))
            .and_then(Self::from_number)
    }

    /// Returns `None` for dates outside the four-digit year range.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        let year = u32::try_from(date.year()).ok()?;
        Self::from_number(year * 10_000 + date.month() * 100 + date.day()).ok()
    }

    /// The study day containing `at` on the JST calendar.
    ///
    /// Falls back to the earliest representable day for instants outside
    /// the four-digit year range.
    #[must_use]
    pub fn jst(at: DateTime<Utc>) -> Self {
        Self::from_date(study_date(at)).unwrap_or(Self(10_000_101))
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        let (year, month, day) = (self.0 / 10_000, (self.0 / 100) % 100, self.0 % 100);
        i32::try_from(year)
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Debug for StudyDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StudyDay({})", self.0)
    }
}

impl fmt::Display for StudyDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudyDay {
    type Err = DayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 8 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DayError::Format(s.to_owned()));
        }
        let value = trimmed
            .parse::<u32>()
            .map_err(|_| DayError::Format(s.to_owned()))?;
        Self::from_number(value)
    }
}

impl From<StudyDay> for u32 {
    fn from(day: StudyDay) -> Self {
        day.0
    }
}

/// Days arrive as numbers from this workspace and as strings from older clients.
#[derive(Deserialize)]
#[serde(untagged)]
enum DayRepr {
    Number(i64),
    Text(String),
}

impl TryFrom<DayRepr> for StudyDay {
    type Error = DayError;

    fn try_from(repr: DayRepr) -> Result<Self, Self::Error> {
        match repr {
            DayRepr::Number(n) => Self::from_i64(n),
            DayRepr::Text(s) => s.parse(),
        }
    }
}
