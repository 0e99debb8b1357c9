use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TagError;
use crate::model::{DailyQidSet, OncePerDayResults, Qid, SyncState};

/// Portion of the aggregate a reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    /// Per-question correct and incorrect totals.
    QTotals,
    /// Per-question streak completions and current runs, both directions.
    QStreaks,
    /// Global streak maxima and the days they were reached.
    GlobalStreak,
    Streak3Today,
    Streak3WrongToday,
    OncePerDay,
    /// Day-level tallies kept by older clients; the record holds none.
    Daily,
    /// Client-side metadata; the record holds none.
    Meta,
    /// The A-to-B relay token lives on the device, not in the record.
    TokenFromA,
    #[default]
    All,
}

impl ResetScope {
    /// Scope named by a reset request.
    ///
    /// A missing, empty or unrecognised tag resets everything.
    #[must_use]
    pub fn from_request_tag(tag: Option<&str>) -> Self {
        tag.map(str::trim)
            .filter(|tag| !tag.is_empty())
            .and_then(|tag| tag.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for ResetScope {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "q_totals" => Ok(Self::QTotals),
            "q_streaks" => Ok(Self::QStreaks),
            "global_streak" => Ok(Self::GlobalStreak),
            "streak3_today" => Ok(Self::Streak3Today),
            "streak3_wrong_today" => Ok(Self::Streak3WrongToday),
            "once_per_day" => Ok(Self::OncePerDay),
            "daily" => Ok(Self::Daily),
            "meta" => Ok(Self::Meta),
            "token_from_a" => Ok(Self::TokenFromA),
            "all" => Ok(Self::All),
            _ => Err(TagError::new("reset scope", s)),
        }
    }
}

/// Number of entries removed from each map by [`SyncState::clear_all_qids`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearedCounts {
    pub correct: usize,
    pub incorrect: usize,
    pub streak3: usize,
    #[serde(rename = "streakLen")]
    pub streak_len: usize,
}

impl SyncState {
    pub fn reset(&mut self, scope: ResetScope, now: DateTime<Utc>) {
        let all = scope == ResetScope::All;
        if all || scope == ResetScope::QTotals {
            self.correct.clear();
            self.incorrect.clear();
        }
        if all || scope == ResetScope::QStreaks {
            self.streak3.clear();
            self.streak_len.clear();
            self.streak3_wrong.clear();
            self.streak_wrong_len.clear();
        }
        if all || scope == ResetScope::GlobalStreak {
            self.global.correct_streak_max = 0;
            self.global.correct_streak_max_day = None;
            self.global.wrong_streak_max = 0;
            self.global.wrong_streak_max_day = None;
        }
        if all || scope == ResetScope::Streak3Today {
            self.streak3_today = None;
        }
        if all || scope == ResetScope::Streak3WrongToday {
            self.streak3_wrong_today = None;
        }
        if all || scope == ResetScope::OncePerDay {
            self.once_per_day_today = None;
        }
        self.touch(now);
    }

    /// Forget every counter and status kept for one question.
    pub fn clear_qid(&mut self, qid: &Qid, now: DateTime<Utc>) {
        self.correct.remove(qid);
        self.incorrect.remove(qid);
        self.streak3.remove(qid);
        self.streak_len.remove(qid);
        self.streak3_wrong.remove(qid);
        self.streak_wrong_len.remove(qid);
        self.consistency_status.remove(qid);
        self.touch(now);
    }

    pub fn clear_all_qids(&mut self, now: DateTime<Utc>) -> ClearedCounts {
        let cleared = ClearedCounts {
            correct: self.correct.len(),
            incorrect: self.incorrect.len(),
            streak3: self.streak3.len(),
            streak_len: self.streak_len.len(),
        };
        self.correct.clear();
        self.incorrect.clear();
        self.streak3.clear();
        self.streak_len.clear();
        self.touch(now);
        cleared
    }

    /// Zero the correct-streak counters of one question, keeping its totals.
    pub fn clear_streak3_qid(&mut self, qid: &Qid, now: DateTime<Utc>) {
        self.streak3.insert(*qid, 0);
        self.streak_len.insert(*qid, 0);
        self.touch(now);
    }

    pub fn reset_streak3_today(&mut self, now: DateTime<Utc>) -> Option<DailyQidSet> {
        let previous = self.streak3_today.take();
        self.touch(now);
        previous
    }

    pub fn reset_once_per_day_today(&mut self, now: DateTime<Utc>) -> Option<OncePerDayResults> {
        let previous = self.once_per_day_today.take();
        self.touch(now);
        previous
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.timestamp_millis();
    }
}
