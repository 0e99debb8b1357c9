use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DeltaError;
use crate::model::{AnswerOutcome, FavLevel, OdoaMode, Qid, StudyDay};

pub type CountMap = BTreeMap<Qid, u64>;
pub type DayMap = BTreeMap<Qid, StudyDay>;

/// Aggregate progress of one user, stored as a single JSON value.
///
/// Every field has a default shape, so a partially written or empty record
/// reads back as a complete one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncState {
    pub(crate) correct: CountMap,
    pub(crate) incorrect: CountMap,
    pub(crate) streak3: CountMap,
    #[serde(rename = "streakLen")]
    pub(crate) streak_len: CountMap,
    #[serde(rename = "streak3Wrong")]
    pub(crate) streak3_wrong: CountMap,
    #[serde(rename = "streakWrongLen")]
    pub(crate) streak_wrong_len: CountMap,
    #[serde(rename = "lastSeenDay")]
    pub(crate) last_seen_day: DayMap,
    #[serde(rename = "lastCorrectDay")]
    pub(crate) last_correct_day: DayMap,
    #[serde(rename = "lastWrongDay")]
    pub(crate) last_wrong_day: DayMap,
    pub(crate) consistency_status: BTreeMap<Qid, serde_json::Value>,
    pub(crate) fav: BTreeMap<Qid, FavLevel>,
    pub(crate) global: GlobalStats,
    pub(crate) odoa_mode: OdoaMode,
    #[serde(rename = "streak3Today", skip_serializing_if = "Option::is_none")]
    pub(crate) streak3_today: Option<DailyQidSet>,
    #[serde(rename = "streak3WrongToday", skip_serializing_if = "Option::is_none")]
    pub(crate) streak3_wrong_today: Option<DailyQidSet>,
    #[serde(rename = "oncePerDayToday", skip_serializing_if = "Option::is_none")]
    pub(crate) once_per_day_today: Option<OncePerDayResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) exam_date: Option<NaiveDate>,
    #[serde(rename = "updatedAt")]
    pub(crate) updated_at: i64,
}

/// Streak maxima across all questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_questions: u64,
    pub correct_streak_max: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_streak_max_day: Option<StudyDay>,
    pub wrong_streak_max: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrong_streak_max_day: Option<StudyDay>,
}

/// Distinct questions that completed a three-in-a-row streak on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQidSet {
    day: StudyDay,
    unique_count: usize,
    qids: Vec<Qid>,
}

impl DailyQidSet {
    #[must_use]
    pub fn empty(day: StudyDay) -> Self {
        Self {
            day,
            unique_count: 0,
            qids: Vec::new(),
        }
    }

    /// Build a summary from a list that must not repeat a question.
    ///
    /// # Errors
    ///
    /// Returns `DeltaError::DuplicateQid` naming `field` if a qid repeats.
    pub fn new(field: &'static str, day: StudyDay, qids: Vec<Qid>) -> Result<Self, DeltaError> {
        for (idx, qid) in qids.iter().enumerate() {
            if qids[..idx].contains(qid) {
                return Err(DeltaError::DuplicateQid {
                    field,
                    qid: qid.to_string(),
                });
            }
        }
        Ok(Self {
            day,
            unique_count: qids.len(),
            qids,
        })
    }

    /// Add a question; returns false when it was already listed.
    pub fn insert(&mut self, qid: Qid) -> bool {
        if self.qids.contains(&qid) {
            return false;
        }
        self.qids.push(qid);
        self.unique_count = self.qids.len();
        true
    }

    #[must_use]
    pub fn day(&self) -> StudyDay {
        self.day
    }

    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.unique_count
    }

    #[must_use]
    pub fn qids(&self) -> &[Qid] {
        &self.qids
    }
}

/// First outcome of each question answered on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OncePerDayResults {
    pub day: StudyDay,
    #[serde(default)]
    pub results: BTreeMap<Qid, AnswerOutcome>,
}

impl OncePerDayResults {
    #[must_use]
    pub fn new(day: StudyDay) -> Self {
        Self {
            day,
            results: BTreeMap::new(),
        }
    }
}

impl SyncState {
    #[must_use]
    pub fn correct(&self) -> &CountMap {
        &self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> &CountMap {
        &self.incorrect
    }

    #[must_use]
    pub fn streak3(&self) -> &CountMap {
        &self.streak3
    }

    #[must_use]
    pub fn streak_len(&self) -> &CountMap {
        &self.streak_len
    }

    #[must_use]
    pub fn streak3_wrong(&self) -> &CountMap {
        &self.streak3_wrong
    }

    #[must_use]
    pub fn streak_wrong_len(&self) -> &CountMap {
        &self.streak_wrong_len
    }

    #[must_use]
    pub fn last_seen_day(&self) -> &DayMap {
        &self.last_seen_day
    }

    #[must_use]
    pub fn last_correct_day(&self) -> &DayMap {
        &self.last_correct_day
    }

    #[must_use]
    pub fn last_wrong_day(&self) -> &DayMap {
        &self.last_wrong_day
    }

    #[must_use]
    pub fn consistency_status(&self) -> &BTreeMap<Qid, serde_json::Value> {
        &self.consistency_status
    }

    #[must_use]
    pub fn fav(&self) -> &BTreeMap<Qid, FavLevel> {
        &self.fav
    }

    #[must_use]
    pub fn global(&self) -> &GlobalStats {
        &self.global
    }

    #[must_use]
    pub fn odoa_mode(&self) -> OdoaMode {
        self.odoa_mode
    }

    #[must_use]
    pub fn streak3_today(&self) -> Option<&DailyQidSet> {
        self.streak3_today.as_ref()
    }

    #[must_use]
    pub fn streak3_wrong_today(&self) -> Option<&DailyQidSet> {
        self.streak3_wrong_today.as_ref()
    }

    #[must_use]
    pub fn once_per_day_today(&self) -> Option<&OncePerDayResults> {
        self.once_per_day_today.as_ref()
    }

    #[must_use]
    pub fn exam_date(&self) -> Option<NaiveDate> {
        self.exam_date
    }

    /// Milliseconds since the Unix epoch of the last write, 0 if never written.
    #[must_use]
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_fills_default_shapes() {
        let state: SyncState = serde_json::from_str("{}").unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["correct"], serde_json::json!({}));
        assert_eq!(json["streakLen"], serde_json::json!({}));
        assert_eq!(json["odoa_mode"], "off");
        assert_eq!(json["global"]["totalQuestions"], 0);
        assert_eq!(json["updatedAt"], 0);
        assert!(json.get("streak3Today").is_none());
    }

    #[test]
    fn reads_partial_record() {
        let state: SyncState = serde_json::from_str(
            r#"{"correct":{"20250926-001":4},"streak3Today":{"day":20250926,"unique_count":1,"qids":["20250926-001"]}}"#,
        )
        .unwrap();
        let qid: Qid = "20250926-001".parse().unwrap();
        assert_eq!(state.correct().get(&qid), Some(&4));
        assert!(state.incorrect().is_empty());
        assert_eq!(state.streak3_today().map(DailyQidSet::unique_count), Some(1));
    }

    #[test]
    fn daily_set_rejects_duplicates() {
        let day = StudyDay::from_number(20250926).unwrap();
        let qid: Qid = "20250926-001".parse().unwrap();
        let err = DailyQidSet::new("streak3TodayDelta", day, vec![qid, qid]).unwrap_err();
        assert!(matches!(err, DeltaError::DuplicateQid { .. }));

        let mut set = DailyQidSet::empty(day);
        assert!(set.insert(qid));
        assert!(!set.insert(qid));
        assert_eq!(set.unique_count(), 1);
    }
}
