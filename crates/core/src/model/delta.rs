use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DeltaError;
use crate::model::{AnswerOutcome, DailyQidSet, FavLevel, Qid, StudyDay};

pub type SignedMap = BTreeMap<Qid, i64>;

/// Partial update of a [`SyncState`](crate::model::SyncState).
///
/// Counts are increments, streak lengths and today summaries are
/// replacements, days are maxima. Absent fields leave the record untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncDelta {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub correct_delta: SignedMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub incorrect_delta: SignedMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub streak3_delta: SignedMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub streak3_wrong_delta: SignedMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub streak_len_delta: SignedMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub streak_wrong_len_delta: SignedMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub last_seen_day_delta: BTreeMap<Qid, StudyDay>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub last_correct_day_delta: BTreeMap<Qid, StudyDay>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub last_wrong_day_delta: BTreeMap<Qid, StudyDay>,
    /// `null` removes the entry.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub consistency_status_delta: BTreeMap<Qid, serde_json::Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fav: BTreeMap<Qid, FavLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_streak_max_delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_streak_max_day_delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrong_streak_max_delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrong_streak_max_day_delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak3_today_delta: Option<DailyQidSetDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak3_wrong_today_delta: Option<DailyQidSetDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub once_per_day_today_delta: Option<OncePerDayDelta>,
    /// `"on"` or `"off"`; anything else is ignored.
    #[serde(rename = "odoa_mode", skip_serializing_if = "Option::is_none")]
    pub odoa_mode: Option<String>,
    /// `YYYY-MM-DD`; values that are not a calendar date are ignored.
    #[serde(rename = "exam_date_iso", skip_serializing_if = "Option::is_none")]
    pub exam_date_iso: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<i64>,
}

/// Replacement for a today summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQidSetDelta {
    pub day: StudyDay,
    pub qids: Vec<Qid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<usize>,
}

impl DailyQidSetDelta {
    #[must_use]
    pub fn from_set(set: &DailyQidSet) -> Self {
        Self {
            day: set.day(),
            qids: set.qids().to_vec(),
            unique_count: Some(set.unique_count()),
        }
    }

    /// Check the declared count and uniqueness, producing the stored summary.
    ///
    /// # Errors
    ///
    /// Returns `DeltaError` if `unique_count` disagrees with `qids` or a qid repeats.
    pub fn validate(&self, field: &'static str) -> Result<DailyQidSet, DeltaError> {
        if let Some(declared) = self.unique_count {
            if declared != self.qids.len() {
                return Err(DeltaError::UniqueCountMismatch {
                    field,
                    declared,
                    actual: self.qids.len(),
                });
            }
        }
        DailyQidSet::new(field, self.day, self.qids.clone())
    }
}

/// Results to fold into the once-per-day block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OncePerDayDelta {
    pub day: StudyDay,
    #[serde(default)]
    pub results: BTreeMap<Qid, AnswerOutcome>,
}

/// A delta whose today summaries passed validation, ready to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedDelta {
    pub(crate) streak3_today: Option<DailyQidSet>,
    pub(crate) streak3_wrong_today: Option<DailyQidSet>,
}

impl ValidatedDelta {
    /// Summary that replaces `streak3Today`, with its count recomputed.
    #[must_use]
    pub fn streak3_today(&self) -> Option<&DailyQidSet> {
        self.streak3_today.as_ref()
    }

    #[must_use]
    pub fn streak3_wrong_today(&self) -> Option<&DailyQidSet> {
        self.streak3_wrong_today.as_ref()
    }
}

impl SyncDelta {
    /// Validate the structural parts of the delta.
    ///
    /// Days and once-per-day results are already typed on deserialization;
    /// what remains is the uniqueness and declared count of the today
    /// summaries.
    ///
    /// # Errors
    ///
    /// Returns the first `DeltaError` found in the today summaries.
    pub fn validate(&self) -> Result<ValidatedDelta, DeltaError> {
        Ok(ValidatedDelta {
            streak3_today: self
                .streak3_today_delta
                .as_ref()
                .map(|d| d.validate("streak3TodayDelta"))
                .transpose()?,
            streak3_wrong_today: self
                .streak3_wrong_today_delta
                .as_ref()
                .map(|d| d.validate("streak3WrongTodayDelta"))
                .transpose()?,
        })
    }

    /// True when sending this delta could not change any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let positive = |map: &SignedMap| map.values().any(|n| *n > 0);
        let non_negative = |map: &SignedMap| map.values().any(|n| *n >= 0);
        !(positive(&self.correct_delta)
            || positive(&self.incorrect_delta)
            || positive(&self.streak3_delta)
            || positive(&self.streak3_wrong_delta)
            || non_negative(&self.streak_len_delta)
            || non_negative(&self.streak_wrong_len_delta)
            || !self.last_seen_day_delta.is_empty()
            || !self.last_correct_day_delta.is_empty()
            || !self.last_wrong_day_delta.is_empty()
            || !self.consistency_status_delta.is_empty()
            || !self.fav.is_empty()
            || self.global.as_ref().and_then(|g| g.total_questions).is_some()
            || self.correct_streak_max_delta.is_some()
            || self.correct_streak_max_day_delta.is_some()
            || self.wrong_streak_max_delta.is_some()
            || self.wrong_streak_max_day_delta.is_some()
            || self.streak3_today_delta.is_some()
            || self.streak3_wrong_today_delta.is_some()
            || self.once_per_day_today_delta.is_some()
            || self.odoa_mode.is_some()
            || self.exam_date_iso.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_wire_field_names() {
        let delta: SyncDelta = serde_json::from_str(
            r#"{
                "correctDelta": {"20250926-001": 2},
                "streakLenDelta": {"20250926-001": 1},
                "streak3TodayDelta": {"day": "20250926", "qids": ["20250926-001"], "unique_count": 1},
                "oncePerDayTodayDelta": {"day": 20250926, "results": {"20250926-001": "correct"}},
                "global": {"totalQuestions": 30},
                "odoa_mode": "on",
                "exam_date_iso": "2026-01-18"
            }"#,
        )
        .unwrap();
        assert_eq!(delta.correct_delta.len(), 1);
        assert_eq!(delta.global.and_then(|g| g.total_questions), Some(30));
        assert_eq!(delta.odoa_mode.as_deref(), Some("on"));
        assert!(delta.streak3_today_delta.is_some());
    }

    #[test]
    fn rejects_unknown_result_and_fav_values() {
        assert!(serde_json::from_str::<SyncDelta>(
            r#"{"oncePerDayTodayDelta": {"day": 20250926, "results": {"20250926-001": "maybe"}}}"#
        )
        .is_err());
        assert!(serde_json::from_str::<SyncDelta>(r#"{"fav": {"20250926-001": "gold"}}"#).is_err());
    }

    #[test]
    fn unique_count_must_match() {
        let delta = DailyQidSetDelta {
            day: StudyDay::from_number(20250926).unwrap(),
            qids: vec!["20250926-001".parse().unwrap()],
            unique_count: Some(2),
        };
        assert_eq!(
            delta.validate("streak3TodayDelta"),
            Err(DeltaError::UniqueCountMismatch {
                field: "streak3TodayDelta",
                declared: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn validation_recomputes_the_count() {
        let delta: SyncDelta = serde_json::from_str(
            r#"{"streak3WrongTodayDelta": {"day": 20250926, "qids": ["20250926-001", "20250926-002"]}}"#,
        )
        .unwrap();
        let validated = delta.validate().unwrap();
        assert!(validated.streak3_today().is_none());
        assert_eq!(validated.streak3_wrong_today().map(DailyQidSet::unique_count), Some(2));

        let repeated: SyncDelta = serde_json::from_str(
            r#"{"streak3TodayDelta": {"day": 20250926, "qids": ["20250926-001", "20250926-001"]}}"#,
        )
        .unwrap();
        assert!(matches!(repeated.validate(), Err(DeltaError::DuplicateQid { .. })));
    }

    #[test]
    fn emptiness_ignores_non_positive_counts() {
        let mut delta = SyncDelta::default();
        assert!(delta.is_empty());
        delta.correct_delta.insert("20250926-001".parse().unwrap(), 0);
        assert!(delta.is_empty());
        delta.streak_len_delta.insert("20250926-001".parse().unwrap(), 0);
        assert!(!delta.is_empty());
    }

    #[test]
    fn serializes_only_present_fields() {
        let mut delta = SyncDelta::default();
        delta.incorrect_delta.insert("20250926-003".parse().unwrap(), 1);
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json, serde_json::json!({"incorrectDelta": {"20250926-003": 1}}));
    }
}
