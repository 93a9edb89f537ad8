//! Core types for the adaptive study scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// Discrimination (a) bounds.
pub const DISCRIMINATION_MIN: f64 = 0.5;
pub const DISCRIMINATION_MAX: f64 = 2.5;
/// Difficulty (b) bounds.
pub const DIFFICULTY_MIN: f64 = -3.0;
pub const DIFFICULTY_MAX: f64 = 3.0;
/// Guessing (c) bounds.
pub const GUESSING_MIN: f64 = 0.0;
pub const GUESSING_MAX: f64 = 0.5;
/// Guessing floor of a four-option multiple choice question.
pub const GUESSING_DEFAULT: f64 = 0.25;

/// Quality at or above which a review counts as remembered.
pub const REMEMBERED_QUALITY_THRESHOLD: u8 = 3;

/// 3PL parameters of a question. Immutable once constructed.
///
/// Out-of-domain values are rejected, never clamped: a bad calibration is a
/// content bug. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCalibration")]
pub struct ItemCalibration {
    discrimination: f64,
    difficulty: f64,
    guessing: f64,
}

#[derive(Deserialize)]
struct RawCalibration {
    discrimination: f64,
    difficulty: f64,
    #[serde(default = "default_guessing")]
    guessing: f64,
}

fn default_guessing() -> f64 {
    GUESSING_DEFAULT
}

impl TryFrom<RawCalibration> for ItemCalibration {
    type Error = StudyError;

    fn try_from(raw: RawCalibration) -> Result<Self> {
        Self::new(raw.discrimination, raw.difficulty, raw.guessing)
    }
}

impl ItemCalibration {
    /// Validate and build a calibration.
    pub fn new(discrimination: f64, difficulty: f64, guessing: f64) -> Result<Self> {
        check_domain("discrimination", discrimination, DISCRIMINATION_MIN, DISCRIMINATION_MAX)?;
        check_domain("difficulty", difficulty, DIFFICULTY_MIN, DIFFICULTY_MAX)?;
        check_domain("guessing", guessing, GUESSING_MIN, GUESSING_MAX)?;
        Ok(Self {
            discrimination,
            difficulty,
            guessing,
        })
    }

    /// Calibration with the four-option guessing floor.
    pub fn with_default_guessing(discrimination: f64, difficulty: f64) -> Result<Self> {
        Self::new(discrimination, difficulty, GUESSING_DEFAULT)
    }

    pub fn discrimination(&self) -> f64 {
        self.discrimination
    }

    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    pub fn guessing(&self) -> f64 {
        self.guessing
    }
}

fn check_domain(parameter: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    // NaN fails the range check too
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(StudyError::InvalidCalibration {
            parameter,
            value,
            min,
            max,
        })
    }
}

/// A calibrated question as supplied by the content layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub topic_id: String,
    pub calibration: ItemCalibration,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        topic_id: impl Into<String>,
        calibration: ItemCalibration,
    ) -> Self {
        Self {
            id: id.into(),
            topic_id: topic_id.into(),
            calibration,
        }
    }
}

/// A learner's latent ability on the theta scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub standard_error: f64,
}

/// Recall quality for a review (0-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quality {
    /// No recall at all.
    Blackout,
    /// Wrong, but the answer was recognized.
    Incorrect,
    /// Wrong, but the answer felt familiar.
    Difficult,
    /// Right with serious difficulty.
    Hesitant,
    /// Right after some hesitation.
    Correct,
    Perfect,
}

impl Quality {
    /// Convert to numeric value (0-5).
    pub fn to_value(self) -> u8 {
        match self {
            Self::Blackout => 0,
            Self::Incorrect => 1,
            Self::Difficult => 2,
            Self::Hesitant => 3,
            Self::Correct => 4,
            Self::Perfect => 5,
        }
    }

    /// Create from a numeric value; anything outside 0-5 is rejected.
    pub fn from_value(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Blackout),
            1 => Ok(Self::Incorrect),
            2 => Ok(Self::Difficult),
            3 => Ok(Self::Hesitant),
            4 => Ok(Self::Correct),
            5 => Ok(Self::Perfect),
            other => Err(StudyError::InvalidQuality(other)),
        }
    }

    /// Whether this quality counts as a successful recall.
    pub fn is_remembered(self) -> bool {
        self.to_value() >= REMEMBERED_QUALITY_THRESHOLD
    }
}

impl TryFrom<u8> for Quality {
    type Error = StudyError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_value(i64::from(value))
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.to_value()
    }
}

/// Where an item sits in the review cycle.
///
/// `New -> Due -> Scheduled -> Due -> ...`, and `Due -> Reset -> Due` after a
/// forgotten review. Items never leave the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    New,
    Due,
    Scheduled,
    Reset,
}

/// Spaced-repetition state for one learnable question or topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub topic_id: String,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub due_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub lapses: u32,
    #[serde(default)]
    pub average_quality: f64,
}

impl ReviewItem {
    /// A never-reviewed item, due immediately.
    pub fn new(
        id: impl Into<String>,
        topic_id: impl Into<String>,
        ease_factor: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            topic_id: topic_id.into(),
            repetitions: 0,
            ease_factor,
            interval_days: 0,
            due_date: now,
            last_reviewed: None,
            total_reviews: 0,
            lapses: 0,
            average_quality: 0.0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }

    /// Fractional days past the due date; negative while not yet due.
    pub fn days_overdue(&self, now: DateTime<Utc>) -> f64 {
        now.signed_duration_since(self.due_date).num_seconds() as f64 / 86_400.0
    }

    /// Whole days since the last review, if any.
    pub fn days_since_review(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_reviewed
            .map(|reviewed| now.signed_duration_since(reviewed).num_days())
    }

    pub fn state(&self, now: DateTime<Utc>) -> ReviewState {
        if self.last_reviewed.is_none() {
            ReviewState::New
        } else if self.is_due(now) {
            ReviewState::Due
        } else if self.repetitions == 0 {
            ReviewState::Reset
        } else {
            ReviewState::Scheduled
        }
    }
}
