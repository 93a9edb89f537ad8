//! Stateful adaptive-testing engine for one learner.

use serde::{Deserialize, Serialize};

use crate::algorithm::irt::{
    calculate_standard_error, check_theta, should_stop_cat, update_theta_with, SE_UNKNOWN,
};
use crate::error::{Result, StudyError};
use crate::settings::{CatSettings, ThetaStep};
use crate::types::{AbilityEstimate, Question};

/// Persisted form of an engine's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilitySnapshot {
    pub theta: f64,
    pub standard_error: f64,
    pub information_sum: f64,
    /// Lifetime count across every sitting.
    pub questions_answered: u32,
}

impl AbilitySnapshot {
    /// Snapshot of a learner nobody has measured yet.
    pub fn initial(settings: &CatSettings) -> Self {
        Self {
            theta: settings.initial_theta,
            standard_error: SE_UNKNOWN,
            information_sum: 0.0,
            questions_answered: 0,
        }
    }
}

/// Everything that changed when one response was processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityUpdateResult {
    pub question_id: String,
    pub is_correct: bool,
    pub theta_before: f64,
    pub theta_after: f64,
    pub standard_error: f64,
    pub information_gained: f64,
    pub probability_correct: f64,
}

impl AbilityUpdateResult {
    pub fn theta_change(&self) -> f64 {
        self.theta_after - self.theta_before
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxQuestionsReached,
    PrecisionReached,
    MinimumNotReached,
    Continue,
}

/// Stop check for the current sitting. `questions_answered` counts this
/// sitting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDecision {
    pub should_stop: bool,
    pub reason: StopReason,
    pub questions_answered: u32,
    pub standard_error: f64,
}

/// Owns the running ability estimate and the information it rests on.
///
/// SE is always `1 / sqrt(information_sum)`, so it can only shrink as
/// responses arrive. Theta stays within [-4, 4].
///
/// Information and the lifetime answer count survive `resume`; the stop
/// rule only looks at answers given since the engine was built.
#[derive(Debug, Clone)]
pub struct IrtEngine {
    settings: CatSettings,
    step: ThetaStep,
    theta: f64,
    information_sum: f64,
    questions_answered: u32,
    answered_this_sitting: u32,
}

impl IrtEngine {
    pub fn new(settings: CatSettings) -> Result<Self> {
        let snapshot = AbilitySnapshot::initial(&settings);
        Self::resume(settings, snapshot)
    }

    /// Rebuild an engine from persisted state.
    pub fn resume(settings: CatSettings, snapshot: AbilitySnapshot) -> Result<Self> {
        settings.validate()?;
        let theta = check_theta(snapshot.theta)?;
        if !(snapshot.information_sum >= 0.0 && snapshot.information_sum.is_finite()) {
            return Err(StudyError::InvalidConfig(format!(
                "information sum {} must be finite and non-negative",
                snapshot.information_sum
            )));
        }
        Ok(Self {
            settings,
            step: ThetaStep::default(),
            theta,
            information_sum: snapshot.information_sum,
            questions_answered: snapshot.questions_answered,
            answered_this_sitting: 0,
        })
    }

    /// Replace the per-response step bounds.
    pub fn with_step(mut self, step: ThetaStep) -> Result<Self> {
        step.validate()?;
        self.step = step;
        Ok(self)
    }

    pub fn settings(&self) -> &CatSettings {
        &self.settings
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn standard_error(&self) -> f64 {
        calculate_standard_error(self.information_sum)
    }

    pub fn questions_answered(&self) -> u32 {
        self.questions_answered
    }

    pub fn answered_this_sitting(&self) -> u32 {
        self.answered_this_sitting
    }

    pub fn estimate(&self) -> AbilityEstimate {
        AbilityEstimate {
            theta: self.theta,
            standard_error: self.standard_error(),
        }
    }

    pub fn snapshot(&self) -> AbilitySnapshot {
        AbilitySnapshot {
            theta: self.theta,
            standard_error: self.standard_error(),
            information_sum: self.information_sum,
            questions_answered: self.questions_answered,
        }
    }

    /// Fold one response into the estimate.
    pub fn process_response(
        &mut self,
        question: &Question,
        is_correct: bool,
    ) -> Result<AbilityUpdateResult> {
        let theta_before = self.theta;
        let update =
            update_theta_with(theta_before, &question.calibration, is_correct, &self.step)?;

        self.theta = update.theta;
        self.information_sum += update.information;
        self.questions_answered = self.questions_answered.saturating_add(1);
        self.answered_this_sitting = self.answered_this_sitting.saturating_add(1);
        let standard_error = self.standard_error();

        tracing::debug!(
            question_id = %question.id,
            is_correct,
            theta_before,
            theta_after = self.theta,
            standard_error,
            "ability updated"
        );

        Ok(AbilityUpdateResult {
            question_id: question.id.clone(),
            is_correct,
            theta_before,
            theta_after: self.theta,
            standard_error,
            information_gained: update.information,
            probability_correct: update.probability,
        })
    }

    pub fn should_stop(&self) -> bool {
        self.stop_decision().should_stop
    }

    pub fn stop_decision(&self) -> StopDecision {
        let standard_error = self.standard_error();
        let answered = self.answered_this_sitting;

        let (should_stop, reason) = match self.settings.max_questions {
            Some(max) if answered >= max => (true, StopReason::MaxQuestionsReached),
            _ if answered < self.settings.min_questions => {
                (false, StopReason::MinimumNotReached)
            }
            _ if should_stop_cat(standard_error, answered, &self.settings) => {
                (true, StopReason::PrecisionReached)
            }
            _ => (false, StopReason::Continue),
        };

        StopDecision {
            should_stop,
            reason,
            questions_answered: answered,
            standard_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemCalibration;
    use pretty_assertions::assert_eq;

    fn question(id: &str, a: f64, b: f64) -> Question {
        Question::new(id, "topic", ItemCalibration::with_default_guessing(a, b).unwrap())
    }

    #[test]
    fn fresh_engine_knows_nothing() {
        let engine = IrtEngine::new(CatSettings::default()).unwrap();
        assert_eq!(engine.theta(), 0.0);
        assert_eq!(engine.standard_error(), SE_UNKNOWN);
        assert_eq!(engine.stop_decision().reason, StopReason::MinimumNotReached);
    }

    #[test]
    fn standard_error_never_grows() {
        let mut engine = IrtEngine::new(CatSettings::default()).unwrap();
        let mut previous = engine.standard_error();
        for i in 0..15 {
            let q = question(&format!("q{}", i), 1.5, (i % 5) as f64 - 2.0);
            let result = engine.process_response(&q, i % 3 != 0).unwrap();
            assert!(result.standard_error <= previous);
            assert!(result.information_gained >= 0.0);
            previous = result.standard_error;
        }
        assert_eq!(engine.questions_answered(), 15);
    }

    #[test]
    fn result_reports_before_and_after() {
        let mut engine = IrtEngine::new(CatSettings::default()).unwrap();
        let result = engine.process_response(&question("q1", 1.0, 0.0), true).unwrap();
        assert_eq!(result.question_id, "q1");
        assert_eq!(result.theta_before, 0.0);
        assert_eq!(result.theta_after, engine.theta());
        assert!(result.theta_change() > 0.0);
        assert!(result.probability_correct > 0.25 && result.probability_correct < 1.0);
    }

    #[test]
    fn max_questions_stops_before_precision() {
        let settings = CatSettings {
            min_questions: 1,
            max_questions: Some(2),
            ..Default::default()
        };
        let mut engine = IrtEngine::new(settings).unwrap();
        engine.process_response(&question("q1", 0.5, 0.0), true).unwrap();
        assert_eq!(engine.stop_decision().reason, StopReason::Continue);
        engine.process_response(&question("q2", 0.5, 0.0), false).unwrap();
        let decision = engine.stop_decision();
        assert!(decision.should_stop);
        assert_eq!(decision.reason, StopReason::MaxQuestionsReached);
    }

    #[test]
    fn precision_stops_once_minimum_met() {
        let settings = CatSettings {
            se_target: 0.9,
            min_questions: 2,
            ..Default::default()
        };
        let mut engine = IrtEngine::new(settings).unwrap();
        let q = question("q1", 2.5, 0.0);
        engine.process_response(&q, true).unwrap();
        // one highly informative item already beats the target
        assert!(engine.standard_error() < 0.9);
        assert!(!engine.should_stop());
        engine.process_response(&q, false).unwrap();
        assert_eq!(engine.stop_decision().reason, StopReason::PrecisionReached);
    }

    #[test]
    fn snapshot_round_trips_through_resume() {
        let mut engine = IrtEngine::new(CatSettings::default()).unwrap();
        engine.process_response(&question("q1", 1.2, -1.0), true).unwrap();
        engine.process_response(&question("q2", 1.2, 1.0), false).unwrap();

        let snapshot = engine.snapshot();
        let resumed = IrtEngine::resume(CatSettings::default(), snapshot.clone()).unwrap();
        assert_eq!(resumed.snapshot(), snapshot);
        assert_eq!(resumed.estimate(), engine.estimate());

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: AbilitySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.questions_answered, 2);
        assert!((restored.theta - snapshot.theta).abs() < 1e-12);
    }

    #[test]
    fn resumed_engine_counts_a_new_sitting() {
        let settings = CatSettings {
            se_target: 0.9,
            min_questions: 2,
            max_questions: Some(3),
            ..Default::default()
        };
        let mut engine = IrtEngine::new(settings.clone()).unwrap();
        let q = question("q1", 2.5, 0.0);
        for _ in 0..3 {
            engine.process_response(&q, true).unwrap();
        }
        assert_eq!(engine.stop_decision().reason, StopReason::MaxQuestionsReached);

        let mut resumed = IrtEngine::resume(settings, engine.snapshot()).unwrap();
        assert_eq!(resumed.questions_answered(), 3);
        assert_eq!(resumed.answered_this_sitting(), 0);
        let decision = resumed.stop_decision();
        assert!(!decision.should_stop);
        assert_eq!(decision.reason, StopReason::MinimumNotReached);
        assert_eq!(decision.questions_answered, 0);
        // information carried over, so SE is already below the target
        assert!(decision.standard_error < 0.9);

        resumed.process_response(&q, false).unwrap();
        resumed.process_response(&q, true).unwrap();
        assert_eq!(resumed.stop_decision().reason, StopReason::PrecisionReached);
        assert_eq!(resumed.questions_answered(), 5);
    }

    #[test]
    fn resume_rejects_corrupt_snapshot() {
        let mut snapshot = AbilitySnapshot::initial(&CatSettings::default());
        snapshot.theta = 7.0;
        assert!(matches!(
            IrtEngine::resume(CatSettings::default(), snapshot.clone()),
            Err(StudyError::InvalidTheta(_))
        ));
        snapshot.theta = 0.0;
        snapshot.information_sum = -1.0;
        assert!(IrtEngine::resume(CatSettings::default(), snapshot).is_err());
    }
}
