//! Validation errors for the quiz progress domain.

use thiserror::Error;

/// A study day that is not a valid `YYYYMMDD` calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DayError {
    #[error("study day must be an 8-digit YYYYMMDD value, got {0:?}")]
    Format(String),
    #[error("study day {0} is not a calendar date")]
    Calendar(u32),
}

/// A question id that does not match `YYYYMMDD-NNN`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QidError {
    #[error("question id must look like YYYYMMDD-NNN, got {0:?}")]
    Shape(String),
    #[error("question number must be exactly three digits, got {0:?}")]
    Number(String),
    #[error(transparent)]
    Day(#[from] DayError),
}

/// An authenticated identity that cannot be used as a sync partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("identity is empty")]
    Empty,
    #[error("identity is not an email address: {0:?}")]
    Malformed(String),
}

/// A string tag outside the accepted vocabulary (choice letter, fav level, reset scope).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {raw:?}")]
pub struct TagError {
    pub kind: &'static str,
    pub raw: String,
}

impl TagError {
    pub(crate) fn new(kind: &'static str, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_owned(),
        }
    }
}

/// Structural problems in a delta payload. Any of these rejects the whole delta.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DeltaError {
    #[error("{field} lists question {qid} more than once")]
    DuplicateQid { field: &'static str, qid: String },
    #[error("{field} declares unique_count {declared} but lists {actual} questions")]
    UniqueCountMismatch {
        field: &'static str,
        declared: usize,
        actual: usize,
    },
}
