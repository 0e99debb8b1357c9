use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{IdentityError, QidError};
use crate::model::StudyDay;

/// Identifier of one quiz question: the day its set was published and its
/// three-digit number within that day, written `YYYYMMDD-NNN`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Qid {
    day: StudyDay,
    number: u16,
}

impl Qid {
    /// Creates a `Qid` from its parts.
    ///
    /// # Errors
    ///
    /// Returns `QidError::Number` unless `number` is in `1..=999`.
    pub fn new(day: StudyDay, number: u16) -> Result<Self, QidError> {
        if number == 0 || number > 999 {
            return Err(QidError::Number(number.to_string()));
        }
        Ok(Self { day, number })
    }

    #[must_use]
    pub fn day(&self) -> StudyDay {
        self.day
    }

    #[must_use]
    pub fn number(&self) -> u16 {
        self.number
    }
}

/// Replace anything outside printable ASCII with `-`.
///
/// Question pages are generated with full-width hyphens in some titles; the
/// counters must land on the same key regardless.
fn normalize_qid(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_ascii_graphic() { c } else { '-' })
        .collect()
}

impl FromStr for Qid {
    type Err = QidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_qid(s);
        let (day, number) = normalized
            .split_once('-')
            .ok_or_else(|| QidError::Shape(s.to_owned()))?;
        let day: StudyDay = day.parse()?;
        if number.len() != 3 || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QidError::Number(number.to_owned()));
        }
        let number = number
            .parse::<u16>()
            .map_err(|_| QidError::Number(number.to_owned()))?;
        Self::new(day, number)
    }
}

impl TryFrom<String> for Qid {
    type Error = QidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Qid> for String {
    fn from(qid: Qid) -> Self {
        qid.to_string()
    }
}

impl fmt::Debug for Qid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qid({self})")
    }
}

impl fmt::Display for Qid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", self.day, self.number)
    }
}

// ─── Identity ──────────────────────────────────────────────────────────────────

/// Email address supplied by the access layer, trimmed and lowercased.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserEmail(String);

impl UserEmail {
    /// Normalize and validate an authenticated email.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the value is blank or not shaped like an email.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(IdentityError::Empty);
        }
        let well_formed = normalized
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
            && !normalized.chars().any(char::is_whitespace);
        if !well_formed {
            return Err(IdentityError::Malformed(raw.to_owned()));
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserEmail({})", self.0)
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key-value partition holding one user's aggregate record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SyncKey(String);

impl SyncKey {
    pub const PREFIX: &'static str = "sync:";

    #[must_use]
    pub fn for_user(email: &UserEmail) -> Self {
        Self(format!("{}{}", Self::PREFIX, email.as_str()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a key presented by a client names this partition.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented.trim()
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
