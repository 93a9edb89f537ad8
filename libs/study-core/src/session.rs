//! One learner's sitting: ties grading, ability, selection and review
//! scheduling together.
//!
//! A session is built from plain [`LearnerState`] and hands plain state back
//! from [`StudySession::finish`]. Persisting it is the host's job.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::algorithm::scale::{get_ability_level, theta_to_percentile, AbilityBands};
use crate::algorithm::sm2::{ReviewScheduleResult, Sm2Scheduler};
use crate::engine::{AbilitySnapshot, AbilityUpdateResult, IrtEngine, StopDecision, StopReason};
use crate::error::{Result, StudyError};
use crate::grading::{grade, AnswerEvent, Grade};
use crate::queue::{ReviewQueue, ReviewStatistics};
use crate::selector::{CoverageRequirement, QuestionSelector};
use crate::settings::{EffectiveSessionSettings, GradingSettings, StudyConfig};
use crate::types::{Question, ReviewItem};

/// Everything the core needs to remember about a learner between sittings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerState {
    pub learner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub ability: AbilitySnapshot,
    #[serde(default)]
    pub review_items: Vec<ReviewItem>,
    #[serde(default)]
    pub exposures: HashMap<String, u32>,
}

impl LearnerState {
    /// A learner with no history, starting at the configured theta for the
    /// subject.
    pub fn new(
        learner_id: impl Into<String>,
        subject_id: Option<String>,
        config: &StudyConfig,
    ) -> Self {
        let effective = config.effective_for(subject_id.as_deref());
        Self {
            learner_id: learner_id.into(),
            subject_id,
            ability: AbilitySnapshot::initial(&effective.cat),
            review_items: Vec::new(),
            exposures: HashMap::new(),
        }
    }
}

/// Per-response log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub question_id: String,
    pub topic_id: String,
    pub is_correct: bool,
    pub quality: u8,
    pub response_time: Duration,
    pub theta_after: f64,
    pub answered_at: DateTime<Utc>,
}

/// What one answer changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub grade: Grade,
    pub ability: AbilityUpdateResult,
    pub review: ReviewScheduleResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub learner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: i64,
    pub questions_attempted: usize,
    pub questions_correct: usize,
    /// Percentage, 0 when nothing was attempted.
    pub accuracy: f64,
    pub total_response_seconds: f64,
    pub average_response_seconds: f64,
    pub theta_start: f64,
    pub theta_end: f64,
    pub theta_change: f64,
    pub standard_error: f64,
    pub percentile: f64,
    pub ability_level: String,
    pub stop_reason: StopReason,
}

#[derive(Debug)]
pub struct StudySession {
    id: Uuid,
    learner_id: String,
    subject_id: Option<String>,
    started_at: DateTime<Utc>,
    settings: EffectiveSessionSettings,
    grading: GradingSettings,
    ability_bands: AbilityBands,
    engine: IrtEngine,
    selector: QuestionSelector,
    scheduler: Sm2Scheduler,
    queue: ReviewQueue,
    review_items: Vec<ReviewItem>,
    used: HashSet<String>,
    responses: Vec<ResponseRecord>,
    theta_start: f64,
}

impl StudySession {
    pub fn start(config: &StudyConfig, learner: LearnerState, now: DateTime<Utc>) -> Result<Self> {
        config.validate()?;
        let settings = config.effective_for(learner.subject_id.as_deref());
        let engine = IrtEngine::resume(settings.cat.clone(), learner.ability)?
            .with_step(config.step.clone())?;
        let id = Uuid::new_v4();

        tracing::debug!(
            session_id = %id,
            learner_id = %learner.learner_id,
            theta = engine.theta(),
            review_items = learner.review_items.len(),
            "session started"
        );

        Ok(Self {
            id,
            learner_id: learner.learner_id,
            subject_id: learner.subject_id,
            started_at: now,
            settings,
            grading: config.grading.clone(),
            ability_bands: config.ability_bands.clone(),
            theta_start: engine.theta(),
            engine,
            selector: QuestionSelector::with_exposures(config.selector.clone(), learner.exposures),
            scheduler: Sm2Scheduler::new(config.sm2.clone())?,
            queue: ReviewQueue::new(config.queue.clone(), &config.sm2)?,
            review_items: learner.review_items,
            used: HashSet::new(),
            responses: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &EffectiveSessionSettings {
        &self.settings
    }

    pub fn theta(&self) -> f64 {
        self.engine.theta()
    }

    pub fn standard_error(&self) -> f64 {
        self.engine.standard_error()
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    pub fn review_items(&self) -> &[ReviewItem] {
        &self.review_items
    }

    /// Best next question among those inside the session's difficulty
    /// range. A pool with nothing in range is treated as empty.
    pub fn next_question<'a>(
        &self,
        pool: &'a [Question],
        coverage: Option<&CoverageRequirement>,
    ) -> Result<&'a Question> {
        let range = self.settings.difficulty_range;
        let in_range = pool
            .iter()
            .filter(|q| range.contains(q.calibration.difficulty()));
        self.selector
            .select_optimal_question(self.engine.theta(), in_range, &self.used, coverage)
    }

    /// Grade an answer and feed it to both engines.
    ///
    /// Nothing in the session changes unless every step succeeds.
    pub fn record_answer(
        &mut self,
        question: &Question,
        event: &AnswerEvent,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome> {
        if event.question_id != question.id {
            return Err(StudyError::AnswerMismatch {
                question: question.id.clone(),
                answered: event.question_id.clone(),
            });
        }
        let grade = grade(event, &self.grading);

        let position = self.review_items.iter().position(|item| item.id == question.id);
        let mut item = match position {
            Some(index) => self.review_items[index].clone(),
            None => self.scheduler.create_item(&question.id, &question.topic_id, now),
        };
        let review = self
            .scheduler
            .record_review(&mut item, i64::from(grade.quality.to_value()), now)?;

        let mut engine = self.engine.clone();
        let ability = engine.process_response(question, grade.is_correct)?;

        self.engine = engine;
        match position {
            Some(index) => self.review_items[index] = item,
            None => self.review_items.push(item),
        }
        self.used.insert(question.id.clone());
        self.selector.record_exposure(&question.id);
        self.responses.push(ResponseRecord {
            question_id: question.id.clone(),
            topic_id: question.topic_id.clone(),
            is_correct: grade.is_correct,
            quality: grade.quality.to_value(),
            response_time: event.response_time,
            theta_after: ability.theta_after,
            answered_at: now,
        });

        Ok(AnswerOutcome {
            grade,
            ability,
            review,
        })
    }

    pub fn stop_decision(&self) -> StopDecision {
        self.engine.stop_decision()
    }

    /// Due review items, most urgent first.
    pub fn due_reviews(&self, now: DateTime<Utc>) -> Vec<&ReviewItem> {
        self.queue.get_due_reviews(&self.review_items, now)
    }

    pub fn review_statistics(&self, now: DateTime<Utc>) -> ReviewStatistics {
        self.queue.statistics(&self.review_items, now, &self.scheduler)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> Result<SessionSummary> {
        let attempted = self.responses.len();
        let correct = self.responses.iter().filter(|r| r.is_correct).count();
        let total_response_seconds: f64 = self
            .responses
            .iter()
            .map(|r| r.response_time.as_secs_f64())
            .sum();
        let (accuracy, average_response_seconds) = if attempted > 0 {
            (
                correct as f64 / attempted as f64 * 100.0,
                total_response_seconds / attempted as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let theta_end = self.engine.theta();

        Ok(SessionSummary {
            session_id: self.id,
            learner_id: self.learner_id.clone(),
            subject_id: self.subject_id.clone(),
            started_at: self.started_at,
            elapsed_seconds: now.signed_duration_since(self.started_at).num_seconds(),
            questions_attempted: attempted,
            questions_correct: correct,
            accuracy,
            total_response_seconds,
            average_response_seconds,
            theta_start: self.theta_start,
            theta_end,
            theta_change: theta_end - self.theta_start,
            standard_error: self.engine.standard_error(),
            percentile: theta_to_percentile(theta_end)?,
            ability_level: get_ability_level(theta_end, &self.ability_bands)?.level.clone(),
            stop_reason: self.engine.stop_decision().reason,
        })
    }

    /// End the sitting and hand back the learner's updated state.
    pub fn finish(self, now: DateTime<Utc>) -> LearnerState {
        tracing::debug!(
            session_id = %self.id,
            answered = self.responses.len(),
            theta = self.engine.theta(),
            elapsed_seconds = now.signed_duration_since(self.started_at).num_seconds(),
            "session finished"
        );
        LearnerState {
            learner_id: self.learner_id,
            subject_id: self.subject_id,
            ability: self.engine.snapshot(),
            review_items: self.review_items,
            exposures: self.selector.exposures().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Confidence;
    use crate::settings::{DifficultyRange, SubjectSettings};
    use crate::types::{ItemCalibration, ReviewState};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn question(id: &str, topic: &str, b: f64) -> Question {
        Question::new(id, topic, ItemCalibration::with_default_guessing(1.2, b).unwrap())
    }

    fn answer(id: &str, correct: bool, secs: u64) -> AnswerEvent {
        AnswerEvent::new(id, correct, Duration::from_secs(secs))
    }

    fn session() -> StudySession {
        let config = StudyConfig::default();
        let learner = LearnerState::new("learner-1", None, &config);
        StudySession::start(&config, learner, now()).unwrap()
    }

    #[test]
    fn answer_updates_both_engines() {
        let mut session = session();
        let q = question("q1", "algebra", 0.0);
        let outcome = session.record_answer(&q, &answer("q1", true, 10), now()).unwrap();

        assert_eq!(outcome.grade.quality.to_value(), 5);
        assert!(outcome.ability.theta_after > 0.0);
        assert_eq!(outcome.review.previous_state, ReviewState::New);
        assert_eq!(outcome.review.interval_days, 1);
        assert_eq!(session.review_items().len(), 1);
        assert_eq!(session.responses().len(), 1);
    }

    #[test]
    fn mismatched_answer_is_rejected_without_side_effects() {
        let mut session = session();
        let q = question("q1", "algebra", 0.0);
        let err = session.record_answer(&q, &answer("q2", true, 10), now()).unwrap_err();
        assert!(matches!(err, StudyError::AnswerMismatch { .. }));
        assert_eq!(session.theta(), 0.0);
        assert!(session.review_items().is_empty());
    }

    #[test]
    fn corrupt_review_item_leaves_session_untouched() {
        let config = StudyConfig::default();
        let mut learner = LearnerState::new("learner-1", None, &config);
        let mut broken = ReviewItem::new("q1", "algebra", 2.5, now());
        broken.ease_factor = 9.0;
        learner.review_items.push(broken);
        let mut session = StudySession::start(&config, learner, now()).unwrap();

        let q = question("q1", "algebra", 0.0);
        assert!(matches!(
            session.record_answer(&q, &answer("q1", true, 10), now()),
            Err(StudyError::InvalidEaseFactor(_))
        ));
        assert_eq!(session.theta(), 0.0);
        assert!(session.responses().is_empty());
    }

    #[test]
    fn next_question_skips_used_and_out_of_range() {
        let mut config = StudyConfig::default();
        let mut maths = SubjectSettings::new("maths".to_string());
        maths.difficulty_range = Some(DifficultyRange { min: -1.0, max: 1.0 });
        config.subjects.push(maths);
        let learner = LearnerState::new("learner-1", Some("maths".to_string()), &config);
        let mut session = StudySession::start(&config, learner, now()).unwrap();

        let pool = vec![
            question("hard", "algebra", 2.5),
            question("mid", "algebra", 0.0),
            question("easy", "algebra", -0.8),
        ];
        let first = session.next_question(&pool, None).unwrap();
        assert_eq!(first.id, "mid");

        session.record_answer(first, &answer("mid", false, 30), now()).unwrap();
        let second = session.next_question(&pool, None).unwrap();
        assert_eq!(second.id, "easy");

        session.record_answer(second, &answer("easy", true, 30), now()).unwrap();
        assert!(matches!(
            session.next_question(&pool, None),
            Err(StudyError::QuestionPoolExhausted { pool_size: 2 })
        ));
    }

    #[test]
    fn summary_reports_progress() {
        let mut session = session();
        let q1 = question("q1", "algebra", -1.0);
        let q2 = question("q2", "algebra", 1.0);
        session.record_answer(&q1, &answer("q1", true, 10), now()).unwrap();
        session
            .record_answer(
                &q2,
                &answer("q2", false, 50).with_confidence(Confidence::High),
                now(),
            )
            .unwrap();

        let summary = session.summary(now() + chrono::Duration::minutes(5)).unwrap();
        assert_eq!(summary.questions_attempted, 2);
        assert_eq!(summary.questions_correct, 1);
        assert_eq!(summary.accuracy, 50.0);
        assert_eq!(summary.total_response_seconds, 60.0);
        assert_eq!(summary.average_response_seconds, 30.0);
        assert_eq!(summary.elapsed_seconds, 300);
        assert_eq!(summary.theta_start, 0.0);
        assert!((summary.theta_change - (summary.theta_end - summary.theta_start)).abs() < 1e-12);
        assert_eq!(summary.stop_reason, StopReason::MinimumNotReached);
        assert!(!summary.ability_level.is_empty());
    }

    #[test]
    fn finish_returns_resumable_state() {
        let mut session = session();
        let q = question("q1", "algebra", 0.5);
        session.record_answer(&q, &answer("q1", true, 25), now()).unwrap();
        let theta = session.theta();

        let state = session.finish(now());
        assert_eq!(state.ability.questions_answered, 1);
        assert_eq!(state.exposures.get("q1"), Some(&1));
        assert_eq!(state.review_items.len(), 1);

        let resumed = StudySession::start(&StudyConfig::default(), state, now()).unwrap();
        assert_eq!(resumed.theta(), theta);
    }
}
