mod consistency;
mod day;
pub mod delta;
mod ids;
mod merge;
mod outcome;
pub mod progress;
mod reset;
pub mod state;

pub use consistency::ConsistencyStatus;
pub use day::StudyDay;
pub use delta::{DailyQidSetDelta, GlobalDelta, OncePerDayDelta, SyncDelta, ValidatedDelta};
pub use ids::{Qid, SyncKey, UserEmail};
pub use merge::MergeSummary;
pub use outcome::{AnswerOutcome, Choice, FavLevel, OdoaMode};
pub use progress::{AnswerRecord, LocalProgress, QuestionProgress};
pub use reset::{ClearedCounts, ResetScope};
pub use state::{DailyQidSet, GlobalStats, OncePerDayResults, SyncState};
