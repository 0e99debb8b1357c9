//! Client-side answer bookkeeping.
//!
//! `LocalProgress` is the one object a quiz client keeps between page loads.
//! It records judged answers, remembers what the server has already
//! acknowledged, and produces the delta that brings the server up to date.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::delta::{DailyQidSetDelta, OncePerDayDelta, SignedMap};
use crate::model::state::{CountMap, DayMap};
use crate::model::{AnswerOutcome, DailyQidSet, OncePerDayResults, Qid, StudyDay, SyncDelta, SyncState};

/// Consecutive answers needed to complete a streak.
pub const STREAK_TARGET: u64 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionProgress {
    pub correct: u64,
    pub wrong: u64,
    pub streak3: u64,
    pub streak_len: u64,
    pub streak3_wrong: u64,
    pub wrong_streak_len: u64,
    pub last_seen: Option<StudyDay>,
    pub last_correct: Option<StudyDay>,
    pub last_wrong: Option<StudyDay>,
}

/// Run of consecutive outcomes across all questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalRun {
    pub correct_run: u64,
    pub wrong_run: u64,
    pub correct_max: u64,
    pub correct_max_day: Option<StudyDay>,
    pub wrong_max: u64,
    pub wrong_max_day: Option<StudyDay>,
}

/// What recording one answer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub qid: Qid,
    pub outcome: AnswerOutcome,
    pub day: StudyDay,
    pub streak_len: u64,
    pub wrong_streak_len: u64,
    pub streak3_completed: bool,
    pub wrong_streak3_completed: bool,
    /// First answer to this question on `day`.
    pub first_today: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalProgress {
    questions: BTreeMap<Qid, QuestionProgress>,
    run: GlobalRun,
    streak3_today: Option<DailyQidSet>,
    streak3_wrong_today: Option<DailyQidSet>,
    once_per_day: Option<OncePerDayResults>,
    /// Server view of this client's progress as of the last acknowledged push or pull.
    synced: SyncState,
}

impl LocalProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn question(&self, qid: &Qid) -> Option<&QuestionProgress> {
        self.questions.get(qid)
    }

    #[must_use]
    pub fn run(&self) -> &GlobalRun {
        &self.run
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
    pub fn once_per_day(&self) -> Option<&OncePerDayResults> {
        self.once_per_day.as_ref()
    }

    #[must_use]
    pub fn synced(&self) -> &SyncState {
        &self.synced
    }

    /// Apply one judged answer.
    ///
    /// Streaks are non-overlapping: reaching [`STREAK_TARGET`] counts one
    /// completion and restarts the run at zero.
    pub fn record_answer(&mut self, qid: Qid, outcome: AnswerOutcome, day: StudyDay) -> AnswerRecord {
        self.roll_day(day);

        let q = self.questions.entry(qid).or_default();
        q.last_seen = q.last_seen.max(Some(day));
        let mut streak3_completed = false;
        let mut wrong_streak3_completed = false;

        match outcome {
            AnswerOutcome::Correct => {
                q.correct += 1;
                q.wrong_streak_len = 0;
                q.streak_len += 1;
                q.last_correct = q.last_correct.max(Some(day));
                if q.streak_len >= STREAK_TARGET {
                    q.streak3 += 1;
                    q.streak_len = 0;
                    streak3_completed = true;
                }
                self.run.wrong_run = 0;
                self.run.correct_run += 1;
                if self.run.correct_run > self.run.correct_max {
                    self.run.correct_max = self.run.correct_run;
                    self.run.correct_max_day = Some(day);
                }
            }
            AnswerOutcome::Wrong => {
                q.wrong += 1;
                q.streak_len = 0;
                q.wrong_streak_len += 1;
                q.last_wrong = q.last_wrong.max(Some(day));
                if q.wrong_streak_len >= STREAK_TARGET {
                    q.streak3_wrong += 1;
                    q.wrong_streak_len = 0;
                    wrong_streak3_completed = true;
                }
                self.run.correct_run = 0;
                self.run.wrong_run += 1;
                if self.run.wrong_run > self.run.wrong_max {
                    self.run.wrong_max = self.run.wrong_run;
                    self.run.wrong_max_day = Some(day);
                }
            }
        }
        let (streak_len, wrong_streak_len) = (q.streak_len, q.wrong_streak_len);

        if streak3_completed {
            if let Some(set) = self.streak3_today.as_mut() {
                set.insert(qid);
            }
        }
        if wrong_streak3_completed {
            if let Some(set) = self.streak3_wrong_today.as_mut() {
                set.insert(qid);
            }
        }

        let first_today = match self.once_per_day.as_mut() {
            Some(block) if !block.results.contains_key(&qid) => {
                block.results.insert(qid, outcome);
                true
            }
            _ => false,
        };

        AnswerRecord {
            qid,
            outcome,
            day,
            streak_len,
            wrong_streak_len,
            streak3_completed,
            wrong_streak3_completed,
            first_today,
        }
    }

    fn roll_day(&mut self, day: StudyDay) {
        for slot in [&mut self.streak3_today, &mut self.streak3_wrong_today] {
            if slot.as_ref().is_none_or(|set| set.day() != day) {
                *slot = Some(DailyQidSet::empty(day));
            }
        }
        if self.once_per_day.as_ref().is_none_or(|block| block.day != day) {
            self.once_per_day = Some(OncePerDayResults::new(day));
        }
    }

    /// Everything recorded locally that the server has not acknowledged.
    ///
    /// A baseline above the local value (local data was cleared) is clamped
    /// down first so that later answers are not swallowed.
    pub fn prepare_delta(&mut self) -> SyncDelta {
        let mut delta = SyncDelta::default();
        let base = &mut self.synced;

        for (qid, q) in &self.questions {
            diff_count(&mut base.correct, &mut delta.correct_delta, *qid, q.correct);
            diff_count(&mut base.incorrect, &mut delta.incorrect_delta, *qid, q.wrong);
            diff_count(&mut base.streak3, &mut delta.streak3_delta, *qid, q.streak3);
            diff_count(&mut base.streak3_wrong, &mut delta.streak3_wrong_delta, *qid, q.streak3_wrong);
            diff_length(&base.streak_len, &mut delta.streak_len_delta, *qid, q.streak_len);
            diff_length(&base.streak_wrong_len, &mut delta.streak_wrong_len_delta, *qid, q.wrong_streak_len);
            diff_day(&base.last_seen_day, &mut delta.last_seen_day_delta, *qid, q.last_seen);
            diff_day(&base.last_correct_day, &mut delta.last_correct_day_delta, *qid, q.last_correct);
            diff_day(&base.last_wrong_day, &mut delta.last_wrong_day_delta, *qid, q.last_wrong);
        }

        if self.run.correct_max > base.global.correct_streak_max {
            delta.correct_streak_max_delta = Some(saturating_i64(self.run.correct_max));
            delta.correct_streak_max_day_delta = self.run.correct_max_day.map(|d| i64::from(d.value()));
        }
        if self.run.wrong_max > base.global.wrong_streak_max {
            delta.wrong_streak_max_delta = Some(saturating_i64(self.run.wrong_max));
            delta.wrong_streak_max_day_delta = self.run.wrong_max_day.map(|d| i64::from(d.value()));
        }

        delta.streak3_today_delta = diff_set(base.streak3_today.as_ref(), self.streak3_today.as_ref());
        delta.streak3_wrong_today_delta =
            diff_set(base.streak3_wrong_today.as_ref(), self.streak3_wrong_today.as_ref());

        if let Some(block) = &self.once_per_day {
            let results: BTreeMap<_, _> = match &base.once_per_day_today {
                Some(synced) if synced.day == block.day => block
                    .results
                    .iter()
                    .filter(|(qid, outcome)| synced.results.get(*qid) != Some(*outcome))
                    .map(|(qid, outcome)| (*qid, *outcome))
                    .collect(),
                _ => block.results.clone(),
            };
            if !results.is_empty() {
                delta.once_per_day_today_delta = Some(OncePerDayDelta {
                    day: block.day,
                    results,
                });
            }
        }

        delta
    }

    /// Fold a delta the server accepted into the baseline.
    ///
    /// Answers recorded after the delta was prepared stay pending.
    pub fn acknowledge(&mut self, delta: &SyncDelta) {
        if let Ok(summaries) = delta.validate() {
            self.synced.apply(delta, summaries);
        }
    }

    /// Catch up with progress made on other devices.
    ///
    /// Each local value becomes the server value plus whatever this client
    /// still has pending; the server record becomes the new baseline.
    pub fn adopt_server(&mut self, server: &SyncState) {
        let base = &self.synced;
        let qids: BTreeSet<Qid> = self
            .questions
            .keys()
            .chain(server.correct.keys())
            .chain(server.incorrect.keys())
            .chain(server.streak3.keys())
            .chain(server.streak3_wrong.keys())
            .chain(server.streak_len.keys())
            .chain(server.streak_wrong_len.keys())
            .chain(server.last_seen_day.keys())
            .copied()
            .collect();

        let mut questions = BTreeMap::new();
        for qid in qids {
            let local = self.questions.get(&qid).cloned().unwrap_or_default();
            let merged = QuestionProgress {
                correct: rebase(local.correct, &base.correct, &server.correct, &qid),
                wrong: rebase(local.wrong, &base.incorrect, &server.incorrect, &qid),
                streak3: rebase(local.streak3, &base.streak3, &server.streak3, &qid),
                streak3_wrong: rebase(local.streak3_wrong, &base.streak3_wrong, &server.streak3_wrong, &qid),
                streak_len: keep_pending(local.streak_len, &base.streak_len, &server.streak_len, &qid),
                wrong_streak_len: keep_pending(
                    local.wrong_streak_len,
                    &base.streak_wrong_len,
                    &server.streak_wrong_len,
                    &qid,
                ),
                last_seen: local.last_seen.max(server.last_seen_day.get(&qid).copied()),
                last_correct: local.last_correct.max(server.last_correct_day.get(&qid).copied()),
                last_wrong: local.last_wrong.max(server.last_wrong_day.get(&qid).copied()),
            };
            questions.insert(qid, merged);
        }
        self.questions = questions;

        let global = &server.global;
        if global.correct_streak_max > self.run.correct_max {
            self.run.correct_max = global.correct_streak_max;
            self.run.correct_max_day = global.correct_streak_max_day;
        }
        if global.wrong_streak_max > self.run.wrong_max {
            self.run.wrong_max = global.wrong_streak_max;
            self.run.wrong_max_day = global.wrong_streak_max_day;
        }

        self.streak3_today = adopt_daily_set(
            self.streak3_today.take(),
            base.streak3_today.as_ref(),
            server.streak3_today.as_ref(),
        );
        self.streak3_wrong_today = adopt_daily_set(
            self.streak3_wrong_today.take(),
            base.streak3_wrong_today.as_ref(),
            server.streak3_wrong_today.as_ref(),
        );
        self.once_per_day = merge_once_per_day(self.once_per_day.take(), server.once_per_day_today.as_ref());

        self.synced = server.clone();
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn diff_count(base: &mut CountMap, out: &mut SignedMap, qid: Qid, local: u64) {
    let synced = base.get(&qid).copied().unwrap_or(0);
    if synced > local {
        base.insert(qid, local);
    } else if local > synced {
        out.insert(qid, saturating_i64(local - synced));
    }
}

fn diff_length(base: &CountMap, out: &mut SignedMap, qid: Qid, local: u64) {
    if base.get(&qid) != Some(&local) {
        out.insert(qid, saturating_i64(local));
    }
}

fn diff_day(base: &DayMap, out: &mut DayMap, qid: Qid, local: Option<StudyDay>) {
    if let Some(day) = local {
        if base.get(&qid).is_none_or(|synced| day > *synced) {
            out.insert(qid, day);
        }
    }
}

fn diff_set(base: Option<&DailyQidSet>, local: Option<&DailyQidSet>) -> Option<DailyQidSetDelta> {
    match local {
        Some(set) if base != Some(set) => Some(DailyQidSetDelta::from_set(set)),
        _ => None,
    }
}

fn rebase(local: u64, base: &CountMap, server: &CountMap, qid: &Qid) -> u64 {
    let pending = local.saturating_sub(base.get(qid).copied().unwrap_or(0));
    server.get(qid).copied().unwrap_or(0).saturating_add(pending)
}

fn keep_pending(local: u64, base: &CountMap, server: &CountMap, qid: &Qid) -> u64 {
    if base.get(qid).copied().unwrap_or(0) == local {
        server.get(qid).copied().unwrap_or(0)
    } else {
        local
    }
}

/// Nothing pending locally: take the server summary as is, including a
/// reset. Otherwise keep the later day, uniting both lists on the same day.
fn adopt_daily_set(
    local: Option<DailyQidSet>,
    base: Option<&DailyQidSet>,
    server: Option<&DailyQidSet>,
) -> Option<DailyQidSet> {
    if local.as_ref() == base {
        return server.cloned();
    }
    match (local, server) {
        (Some(mut local), Some(server)) if local.day() == server.day() => {
            for qid in server.qids() {
                local.insert(*qid);
            }
            Some(local)
        }
        (Some(local), Some(server)) if server.day() > local.day() => Some(server.clone()),
        (Some(local), _) => Some(local),
        (None, server) => server.cloned(),
    }
}

fn merge_once_per_day(
    local: Option<OncePerDayResults>,
    server: Option<&OncePerDayResults>,
) -> Option<OncePerDayResults> {
    match (local, server) {
        (Some(mut local), Some(server)) if local.day == server.day => {
            for (qid, outcome) in &server.results {
                local.results.entry(*qid).or_insert(*outcome);
            }
            Some(local)
        }
        (Some(local), Some(server)) if server.day > local.day => Some(server.clone()),
        (Some(local), _) => Some(local),
        (None, server) => server.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn qid(raw: &str) -> Qid {
        raw.parse().unwrap()
    }

    fn day(n: u32) -> StudyDay {
        StudyDay::from_number(n).unwrap()
    }

    #[test]
    fn third_correct_completes_a_streak_and_restarts() {
        let mut progress = LocalProgress::new();
        let q = qid("20250926-001");
        let d = day(20250926);
        progress.record_answer(q, AnswerOutcome::Correct, d);
        progress.record_answer(q, AnswerOutcome::Correct, d);
        let third = progress.record_answer(q, AnswerOutcome::Correct, d);
        assert!(third.streak3_completed);
        assert_eq!(third.streak_len, 0);

        let stats = progress.question(&q).unwrap();
        assert_eq!((stats.correct, stats.streak3, stats.streak_len), (3, 1, 0));
        assert_eq!(progress.streak3_today().map(DailyQidSet::qids), Some(&[q][..]));

        // five more: one further completion, two into the next run
        for _ in 0..5 {
            progress.record_answer(q, AnswerOutcome::Correct, d);
        }
        let stats = progress.question(&q).unwrap();
        assert_eq!((stats.streak3, stats.streak_len), (2, 2));
        assert_eq!(progress.streak3_today().map(DailyQidSet::unique_count), Some(1));
    }

    #[test]
    fn wrong_answer_breaks_correct_streak() {
        let mut progress = LocalProgress::new();
        let q = qid("20250926-001");
        let d = day(20250926);
        progress.record_answer(q, AnswerOutcome::Correct, d);
        progress.record_answer(q, AnswerOutcome::Correct, d);
        let wrong = progress.record_answer(q, AnswerOutcome::Wrong, d);
        assert_eq!(wrong.streak_len, 0);
        assert_eq!(wrong.wrong_streak_len, 1);

        progress.record_answer(q, AnswerOutcome::Wrong, d);
        let third = progress.record_answer(q, AnswerOutcome::Wrong, d);
        assert!(third.wrong_streak3_completed);
        assert_eq!(progress.question(&q).map(|s| s.streak3_wrong), Some(1));
        assert_eq!(progress.run().correct_max, 2);
        assert_eq!(progress.run().wrong_max, 3);
    }

    #[test]
    fn once_per_day_keeps_first_outcome_and_rolls_over() {
        let mut progress = LocalProgress::new();
        let q = qid("20250926-001");
        assert!(progress.record_answer(q, AnswerOutcome::Wrong, day(20250926)).first_today);
        assert!(!progress.record_answer(q, AnswerOutcome::Correct, day(20250926)).first_today);
        assert_eq!(
            progress.once_per_day().and_then(|b| b.results.get(&q)),
            Some(&AnswerOutcome::Wrong)
        );

        assert!(progress.record_answer(q, AnswerOutcome::Correct, day(20250927)).first_today);
        let block = progress.once_per_day().unwrap();
        assert_eq!(block.day, day(20250927));
        assert_eq!(block.results.get(&q), Some(&AnswerOutcome::Correct));
        assert_eq!(progress.streak3_today().map(DailyQidSet::day), Some(day(20250927)));
    }

    #[test]
    fn delta_is_difference_against_baseline() {
        let mut progress = LocalProgress::new();
        let q = qid("20250926-001");
        let d = day(20250926);
        progress.record_answer(q, AnswerOutcome::Correct, d);
        progress.record_answer(q, AnswerOutcome::Wrong, d);

        let first = progress.prepare_delta();
        assert_eq!(first.correct_delta.get(&q), Some(&1));
        assert_eq!(first.incorrect_delta.get(&q), Some(&1));
        assert_eq!(first.last_seen_day_delta.get(&q), Some(&d));
        progress.acknowledge(&first);

        assert!(progress.prepare_delta().is_empty());

        progress.record_answer(q, AnswerOutcome::Correct, d);
        let second = progress.prepare_delta();
        assert_eq!(second.correct_delta.get(&q), Some(&1));
        assert!(second.incorrect_delta.is_empty());
        assert_eq!(second.streak_len_delta.get(&q), Some(&1));
        let results = &second.once_per_day_today_delta;
        assert!(results.is_none(), "first outcome already synced");
    }

    #[test]
    fn unacknowledged_delta_is_resent() {
        let mut progress = LocalProgress::new();
        let q = qid("20250926-001");
        progress.record_answer(q, AnswerOutcome::Correct, day(20250926));
        let lost = progress.prepare_delta();
        progress.record_answer(q, AnswerOutcome::Correct, day(20250926));
        let retry = progress.prepare_delta();
        assert_eq!(lost.correct_delta.get(&q), Some(&1));
        assert_eq!(retry.correct_delta.get(&q), Some(&2));
    }

    #[test]
    fn baseline_above_local_is_clamped() {
        let mut progress = LocalProgress::new();
        let q = qid("20250926-001");
        let mut server = SyncState::default();
        let mut seed = SyncDelta::default();
        seed.correct_delta.insert(q, 10);
        server.merge(&seed, fixed_now()).unwrap();
        progress.synced = server;

        progress.record_answer(q, AnswerOutcome::Correct, day(20250926));
        let delta = progress.prepare_delta();
        assert!(delta.correct_delta.is_empty());
        assert_eq!(progress.synced().correct().get(&q), Some(&1));

        progress.record_answer(q, AnswerOutcome::Correct, day(20250926));
        assert_eq!(progress.prepare_delta().correct_delta.get(&q), Some(&1));
    }

    #[test]
    fn adopting_server_keeps_pending_answers() {
        let q = qid("20250926-001");
        let other = qid("20250926-002");
        let mut server = SyncState::default();
        let mut remote = SyncDelta::default();
        remote.correct_delta.insert(q, 5);
        remote.incorrect_delta.insert(other, 2);
        remote.correct_streak_max_delta = Some(9);
        server.merge(&remote, fixed_now()).unwrap();

        let mut progress = LocalProgress::new();
        progress.record_answer(q, AnswerOutcome::Correct, day(20250926));
        progress.adopt_server(&server);

        assert_eq!(progress.question(&q).map(|s| s.correct), Some(6));
        assert_eq!(progress.question(&other).map(|s| s.wrong), Some(2));
        assert_eq!(progress.run().correct_max, 9);
        let delta = progress.prepare_delta();
        assert_eq!(delta.correct_delta.get(&q), Some(&1));
        assert!(delta.incorrect_delta.is_empty());
    }

    fn server_with(delta: serde_json::Value) -> SyncState {
        let delta: SyncDelta = serde_json::from_value(delta).unwrap();
        let mut server = SyncState::default();
        server.merge(&delta, fixed_now()).unwrap();
        server
    }

    fn streak(progress: &mut LocalProgress, q: Qid, d: StudyDay) {
        for _ in 0..3 {
            progress.record_answer(q, AnswerOutcome::Correct, d);
        }
    }

    #[test]
    fn pending_summary_is_united_with_the_servers_on_the_same_day() {
        let mine = qid("20250926-002");
        let theirs = qid("20250926-001");
        let server = server_with(serde_json::json!({
            "streak3TodayDelta": {"day": 20250926, "qids": ["20250926-001"]}
        }));

        let mut progress = LocalProgress::new();
        streak(&mut progress, mine, day(20250926));
        progress.adopt_server(&server);

        let today = progress.streak3_today().unwrap();
        assert_eq!(today.qids(), &[mine, theirs][..]);
        assert_eq!(today.unique_count(), 2);
        let delta = progress.prepare_delta();
        assert_eq!(delta.streak3_today_delta.map(|d| d.qids.len()), Some(2));
    }

    #[test]
    fn later_day_wins_when_summaries_disagree() {
        let server = server_with(serde_json::json!({
            "streak3TodayDelta": {"day": 20250927, "qids": ["20250927-001"]}
        }));
        let mut progress = LocalProgress::new();
        streak(&mut progress, qid("20250926-002"), day(20250926));
        progress.adopt_server(&server);
        assert_eq!(progress.streak3_today().map(DailyQidSet::day), Some(day(20250927)));
        assert_eq!(progress.streak3_today().map(DailyQidSet::unique_count), Some(1));

        let older = server_with(serde_json::json!({
            "streak3TodayDelta": {"day": 20250925, "qids": ["20250925-001"]}
        }));
        let mut progress = LocalProgress::new();
        streak(&mut progress, qid("20250926-002"), day(20250926));
        progress.adopt_server(&older);
        assert_eq!(progress.streak3_today().map(DailyQidSet::day), Some(day(20250926)));
        assert_eq!(progress.streak3_today().map(DailyQidSet::qids), Some(&[qid("20250926-002")][..]));
    }

    #[test]
    fn synced_summary_follows_a_server_reset() {
        let q = qid("20250926-001");
        let mut progress = LocalProgress::new();
        streak(&mut progress, q, day(20250926));
        let delta = progress.prepare_delta();
        progress.acknowledge(&delta);

        let mut server = SyncState::default();
        server.merge(&delta, fixed_now()).unwrap();
        server.reset_streak3_today(fixed_now());
        progress.adopt_server(&server);
        assert!(progress.streak3_today().is_none());
    }

    #[test]
    fn wrong_summary_is_adopted_like_the_correct_one() {
        let server = server_with(serde_json::json!({
            "streak3WrongTodayDelta": {"day": 20250926, "qids": ["20250926-001"]}
        }));
        let mut progress = LocalProgress::new();
        progress.adopt_server(&server);
        assert_eq!(
            progress.streak3_wrong_today().map(DailyQidSet::qids),
            Some(&[qid("20250926-001")][..])
        );
    }

    #[test]
    fn once_per_day_keeps_local_first_outcomes_on_the_same_day() {
        let q = qid("20250926-001");
        let other = qid("20250926-002");
        let server = server_with(serde_json::json!({
            "oncePerDayTodayDelta": {"day": 20250926, "results": {
                "20250926-001": "correct",
                "20250926-002": "wrong"
            }}
        }));

        let mut progress = LocalProgress::new();
        progress.record_answer(q, AnswerOutcome::Wrong, day(20250926));
        progress.adopt_server(&server);

        let block = progress.once_per_day().unwrap();
        assert_eq!(block.results.get(&q), Some(&AnswerOutcome::Wrong));
        assert_eq!(block.results.get(&other), Some(&AnswerOutcome::Wrong));
        // a later answer to a question the server saw today is not a first
        assert!(!progress.record_answer(other, AnswerOutcome::Correct, day(20250926)).first_today);
    }

    #[test]
    fn once_per_day_block_of_a_newer_day_replaces_the_local_one() {
        let newer = server_with(serde_json::json!({
            "oncePerDayTodayDelta": {"day": 20250927, "results": {"20250927-001": "correct"}}
        }));
        let mut progress = LocalProgress::new();
        progress.record_answer(qid("20250926-001"), AnswerOutcome::Wrong, day(20250926));
        progress.adopt_server(&newer);
        let block = progress.once_per_day().unwrap();
        assert_eq!(block.day, day(20250927));
        assert_eq!(block.results.len(), 1);

        let older = server_with(serde_json::json!({
            "oncePerDayTodayDelta": {"day": 20250925, "results": {"20250925-001": "correct"}}
        }));
        let mut progress = LocalProgress::new();
        progress.adopt_server(&older);
        assert_eq!(progress.once_per_day().map(|b| b.day), Some(day(20250925)));
        progress.record_answer(qid("20250926-001"), AnswerOutcome::Correct, day(20250926));
        progress.adopt_server(&older);
        assert_eq!(progress.once_per_day().map(|b| b.day), Some(day(20250926)));
    }

    #[test]
    fn serializes_for_local_storage() {
        let mut progress = LocalProgress::new();
        progress.record_answer(qid("20250926-001"), AnswerOutcome::Correct, day(20250926));
        let json = serde_json::to_string(&progress).unwrap();
        let back: LocalProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }
}
