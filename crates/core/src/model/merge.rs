use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::DeltaError;
use crate::model::delta::{SignedMap, ValidatedDelta};
use crate::model::state::{CountMap, DayMap};
use crate::model::{OdoaMode, OncePerDayResults, Qid, StudyDay, SyncDelta, SyncState};

/// What a merge changed, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Sum of all positive count increments applied.
    pub added: u64,
    /// Distinct questions whose per-question data changed.
    pub touched: usize,
    /// The once-per-day block was replaced by a newer day.
    pub once_per_day_rolled: bool,
}

impl SyncState {
    /// Fold `delta` into the record and stamp `updatedAt`.
    ///
    /// Validation happens before any field is written, so on error the
    /// record is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `DeltaError` when a today summary is inconsistent.
    pub fn merge(&mut self, delta: &SyncDelta, now: DateTime<Utc>) -> Result<MergeSummary, DeltaError> {
        let summaries = delta.validate()?;
        let summary = self.apply(delta, summaries);
        self.updated_at = now.timestamp_millis();
        Ok(summary)
    }

    pub(crate) fn apply(&mut self, delta: &SyncDelta, summaries: ValidatedDelta) -> MergeSummary {
        let mut touched = BTreeSet::new();
        let mut added = 0;

        added += add_counts(&mut self.correct, &delta.correct_delta, &mut touched);
        added += add_counts(&mut self.incorrect, &delta.incorrect_delta, &mut touched);
        added += add_counts(&mut self.streak3, &delta.streak3_delta, &mut touched);
        added += add_counts(&mut self.streak3_wrong, &delta.streak3_wrong_delta, &mut touched);

        replace_lengths(&mut self.streak_len, &delta.streak_len_delta, &mut touched);
        replace_lengths(&mut self.streak_wrong_len, &delta.streak_wrong_len_delta, &mut touched);

        max_days(&mut self.last_seen_day, &delta.last_seen_day_delta, &mut touched);
        max_days(&mut self.last_correct_day, &delta.last_correct_day_delta, &mut touched);
        max_days(&mut self.last_wrong_day, &delta.last_wrong_day_delta, &mut touched);

        for (qid, status) in &delta.consistency_status_delta {
            if status.is_null() {
                self.consistency_status.remove(qid);
            } else {
                self.consistency_status.insert(*qid, status.clone());
            }
            touched.insert(*qid);
        }

        for (qid, level) in &delta.fav {
            self.fav.insert(*qid, *level);
            touched.insert(*qid);
        }

        self.merge_global(delta);

        if let Some(set) = summaries.streak3_today {
            self.streak3_today = Some(set);
        }
        if let Some(set) = summaries.streak3_wrong_today {
            self.streak3_wrong_today = Some(set);
        }

        let mut once_per_day_rolled = false;
        if let Some(incoming) = &delta.once_per_day_today_delta {
            match &mut self.once_per_day_today {
                Some(current) if current.day == incoming.day => {
                    current.results.extend(incoming.results.iter().map(|(q, o)| (*q, *o)));
                }
                slot => {
                    once_per_day_rolled = slot.is_some();
                    *slot = Some(OncePerDayResults {
                        day: incoming.day,
                        results: incoming.results.clone(),
                    });
                }
            }
        }

        if let Some(mode) = delta.odoa_mode.as_deref().and_then(|m| m.parse::<OdoaMode>().ok()) {
            self.odoa_mode = mode;
        }
        if let Some(date) = delta
            .exam_date_iso
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
        {
            self.exam_date = Some(date);
        }

        MergeSummary {
            added,
            touched: touched.len(),
            once_per_day_rolled,
        }
    }

    fn merge_global(&mut self, delta: &SyncDelta) {
        let global = &mut self.global;
        if let Some(total) = delta.global.as_ref().and_then(|g| g.total_questions) {
            if let Ok(total @ 1..) = u64::try_from(total) {
                global.total_questions = total;
            }
        }
        if let Some(Ok(max)) = delta.correct_streak_max_delta.map(u64::try_from) {
            global.correct_streak_max = global.correct_streak_max.max(max);
        }
        if let Some(Ok(max)) = delta.wrong_streak_max_delta.map(u64::try_from) {
            global.wrong_streak_max = global.wrong_streak_max.max(max);
        }
        if let Some(Ok(day)) = delta.correct_streak_max_day_delta.map(StudyDay::from_i64) {
            global.correct_streak_max_day = global.correct_streak_max_day.max(Some(day));
        }
        if let Some(Ok(day)) = delta.wrong_streak_max_day_delta.map(StudyDay::from_i64) {
            global.wrong_streak_max_day = global.wrong_streak_max_day.max(Some(day));
        }
    }
}

fn add_counts(target: &mut CountMap, delta: &SignedMap, touched: &mut BTreeSet<Qid>) -> u64 {
    let mut added = 0_u64;
    for (qid, n) in delta {
        let Ok(n @ 1..) = u64::try_from(*n) else {
            continue;
        };
        let slot = target.entry(*qid).or_default();
        *slot = slot.saturating_add(n);
        added = added.saturating_add(n);
        touched.insert(*qid);
    }
    added
}

fn replace_lengths(target: &mut CountMap, delta: &SignedMap, touched: &mut BTreeSet<Qid>) {
    for (qid, n) in delta {
        if let Ok(len) = u64::try_from(*n) {
            target.insert(*qid, len);
            touched.insert(*qid);
        }
    }
}

fn max_days(target: &mut DayMap, delta: &DayMap, touched: &mut BTreeSet<Qid>) {
    for (qid, day) in delta {
        let slot = target.entry(*qid).or_insert(*day);
        if *day > *slot {
            *slot = *day;
        }
        touched.insert(*qid);
    }
}
