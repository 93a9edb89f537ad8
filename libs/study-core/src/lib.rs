//! Adaptive study scheduling core.
//!
//! Provides:
//! - 3PL item response model and ability estimation (`algorithm::irt`)
//! - Theta scale conversions and ability bands (`algorithm::scale`)
//! - SM-2 review scheduling with a bounded retention cache (`algorithm::sm2`)
//! - Maximum-information question selection with topic coverage
//! - Review queue ordering, priorities and statistics
//! - Answer grading and a per-learner study session
//!
//! The crate does no I/O. Hosts load and persist [`LearnerState`] and
//! [`StudyConfig`] themselves.

pub mod algorithm;
pub mod engine;
pub mod error;
pub mod grading;
pub mod queue;
pub mod selector;
pub mod session;
pub mod settings;
pub mod types;

pub use algorithm::{
    AbilityBand, AbilityBands, ExpectedScore, RetentionForecast, ReviewSchedule,
    ReviewScheduleResult, Sm2Scheduler, ThetaUpdate,
};
pub use engine::{AbilitySnapshot, AbilityUpdateResult, IrtEngine, StopDecision, StopReason};
pub use error::{Result, StudyError};
pub use grading::{grade, AnswerEvent, Confidence, Grade};
pub use queue::{ReviewPriority, ReviewQueue, ReviewStatistics};
pub use selector::{CoverageRequirement, QuestionSelector};
pub use session::{AnswerOutcome, LearnerState, ResponseRecord, SessionSummary, StudySession};
pub use settings::{
    CatSettings, DifficultyRange, EffectiveSessionSettings, GradingSettings, LapsePolicy,
    QueueSettings, ReusePolicy, SelectorSettings, Sm2Settings, StudyConfig, SubjectSettings,
    ThetaStep,
};
pub use types::{AbilityEstimate, ItemCalibration, Question, Quality, ReviewItem, ReviewState};
