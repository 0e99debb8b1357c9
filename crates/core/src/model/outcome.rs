use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TagError;

/// Result of judging one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOutcome {
    Correct,
    Wrong,
}

impl AnswerOutcome {
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Self::Correct)
    }
}

/// One of the four answer letters of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    /// Compare the learner's pick with the correct letter.
    #[must_use]
    pub fn judge(self, correct: Choice) -> AnswerOutcome {
        if self == correct {
            AnswerOutcome::Correct
        } else {
            AnswerOutcome::Wrong
        }
    }
}

impl FromStr for Choice {
    type Err = TagError;

    /// Accepts `A`..`D` in either case, including the full-width letters
    /// that appear in generated answer pages.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(TagError::new("choice", s));
        };
        match c {
            'A' | 'a' | 'Ａ' | 'ａ' => Ok(Self::A),
            'B' | 'b' | 'Ｂ' | 'ｂ' => Ok(Self::B),
            'C' | 'c' | 'Ｃ' | 'ｃ' => Ok(Self::C),
            'D' | 'd' | 'Ｄ' | 'ｄ' => Ok(Self::D),
            _ => Err(TagError::new("choice", s)),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(letter)
    }
}

/// Favourite marker a learner can put on a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavLevel {
    #[default]
    Unset,
    Fav001,
    Fav002,
    Fav003,
}

impl FromStr for FavLevel {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" => Ok(Self::Unset),
            "fav001" => Ok(Self::Fav001),
            "fav002" => Ok(Self::Fav002),
            "fav003" => Ok(Self::Fav003),
            _ => Err(TagError::new("fav level", s)),
        }
    }
}

/// One-day-one-answer verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OdoaMode {
    On,
    #[default]
    Off,
}

impl FromStr for OdoaMode {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(TagError::new("odoa mode", s)),
        }
    }
}
