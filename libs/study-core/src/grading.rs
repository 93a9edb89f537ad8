//! Turns a raw answer into the signals each engine consumes.
//!
//! | correct | condition                                | quality |
//! |---------|------------------------------------------|---------|
//! | no      | high confidence                          | 0       |
//! | no      | otherwise                                | 1       |
//! | yes     | low confidence, or slower than `slow`    | 3       |
//! | yes     | within `fast` and not low confidence     | 5       |
//! | yes     | otherwise                                | 4       |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::settings::GradingSettings;
use crate::types::Quality;

/// Learner's self-reported confidence in an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A submitted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub question_id: String,
    pub is_correct: bool,
    pub response_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl AnswerEvent {
    pub fn new(question_id: impl Into<String>, is_correct: bool, response_time: Duration) -> Self {
        Self {
            question_id: question_id.into(),
            is_correct,
            response_time,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub is_correct: bool,
    pub quality: Quality,
}

pub fn grade(event: &AnswerEvent, settings: &GradingSettings) -> Grade {
    let seconds = event.response_time.as_secs_f64();
    let quality = match (event.is_correct, event.confidence) {
        (false, Some(Confidence::High)) => Quality::Blackout,
        (false, _) => Quality::Incorrect,
        (true, Some(Confidence::Low)) => Quality::Hesitant,
        (true, _) if seconds > settings.slow_seconds => Quality::Hesitant,
        (true, _) if seconds <= settings.fast_seconds => Quality::Perfect,
        (true, _) => Quality::Correct,
    };
    Grade {
        is_correct: event.is_correct,
        quality,
    }
}
