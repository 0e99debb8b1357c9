use quiz_core::model::{AnswerOutcome, AnswerRecord, Choice, Qid, StudyDay};
use tracing::{debug, info};

use crate::error::ClientError;
use crate::local_store::ProgressStore;
use crate::token_relay::TokenRelay;
use crate::Clock;

/// Why a B-part visit did not change any counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotCountedReason {
    /// No relay token: the page was reloaded or opened without passing through A.
    MissingToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBResult {
    Recorded(AnswerRecord),
    NotCounted {
        outcome: AnswerOutcome,
        reason: NotCountedReason,
    },
}

impl PartBResult {
    /// The judgement shown to the learner, counted or not.
    #[must_use]
    pub fn outcome(&self) -> AnswerOutcome {
        match self {
            Self::Recorded(record) => record.outcome,
            Self::NotCounted { outcome, .. } => *outcome,
        }
    }
}

/// Drives the A/B page pair of one question on the client.
#[derive(Clone)]
pub struct AnswerRecorder {
    clock: Clock,
    relay: TokenRelay,
    progress: ProgressStore,
}

impl AnswerRecorder {
    #[must_use]
    pub fn new(clock: Clock, relay: TokenRelay, progress: ProgressStore) -> Self {
        Self {
            clock,
            relay,
            progress,
        }
    }

    /// Called when the learner leaves the A part for the B part.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::LocalStore` if the relay token cannot be stored.
    pub fn leave_part_a(&self, qid: &Qid) -> Result<(), ClientError> {
        self.relay.issue(qid)?;
        Ok(())
    }

    /// Judge the learner's pick on the B part and count it at most once.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::LocalStore` if the relay or progress cannot be
    /// read or written.
    pub fn arrive_part_b(
        &self,
        qid: Qid,
        picked: Choice,
        correct: Choice,
    ) -> Result<PartBResult, ClientError> {
        let outcome = picked.judge(correct);
        if self.relay.consume(&qid)?.is_none() {
            debug!(%qid, "no relay token, answer not counted");
            return Ok(PartBResult::NotCounted {
                outcome,
                reason: NotCountedReason::MissingToken,
            });
        }

        let day = StudyDay::jst(self.clock.now());
        let record = self
            .progress
            .update(|progress| progress.record_answer(qid, outcome, day))?;
        info!(
            %qid,
            ?outcome,
            streak_len = record.streak_len,
            streak3_completed = record.streak3_completed,
            "answer recorded"
        );
        Ok(PartBResult::Recorded(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::{LocalStore, MemoryLocalStore};
    use quiz_core::time::fixed_clock;
    use std::sync::Arc;

    fn recorder() -> (AnswerRecorder, ProgressStore) {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let progress = ProgressStore::new(Arc::clone(&store));
        let recorder = AnswerRecorder::new(fixed_clock(), TokenRelay::new(store), progress.clone());
        (recorder, progress)
    }

    #[test]
    fn reload_of_part_b_is_not_counted() {
        let (recorder, progress) = recorder();
        let qid: Qid = "20250926-001".parse().unwrap();

        recorder.leave_part_a(&qid).unwrap();
        let first = recorder.arrive_part_b(qid, Choice::C, Choice::C).unwrap();
        assert!(matches!(first, PartBResult::Recorded(ref r) if r.outcome == AnswerOutcome::Correct));

        let reload = recorder.arrive_part_b(qid, Choice::C, Choice::C).unwrap();
        assert_eq!(
            reload,
            PartBResult::NotCounted {
                outcome: AnswerOutcome::Correct,
                reason: NotCountedReason::MissingToken
            }
        );
        assert_eq!(progress.load().unwrap().question(&qid).map(|q| q.correct), Some(1));
    }

    #[test]
    fn direct_navigation_still_judges() {
        let (recorder, progress) = recorder();
        let qid: Qid = "20250926-002".parse().unwrap();
        let result = recorder.arrive_part_b(qid, Choice::A, Choice::B).unwrap();
        assert_eq!(result.outcome(), AnswerOutcome::Wrong);
        assert!(progress.load().unwrap().question(&qid).is_none());
    }

    #[test]
    fn records_on_jst_day() {
        let (recorder, _) = recorder();
        let qid: Qid = "20250926-003".parse().unwrap();
        recorder.leave_part_a(&qid).unwrap();
        let PartBResult::Recorded(record) = recorder.arrive_part_b(qid, Choice::D, Choice::A).unwrap()
        else {
            panic!("expected recorded answer");
        };
        assert_eq!(record.day.value(), 20231115);
        assert!(record.first_today);
    }
}
