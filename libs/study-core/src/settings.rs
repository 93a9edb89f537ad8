//! Configuration for every engine in the core.
//!
//! All structs default to the standard algorithm constants and deserialize
//! with `#[serde(default)]`, so a JSON file only needs the fields it changes.

use serde::{Deserialize, Serialize};

use crate::algorithm::irt::{THETA_MAX, THETA_MIN};
use crate::algorithm::scale::AbilityBands;
use crate::error::{Result, StudyError};
use crate::types::{DIFFICULTY_MAX, DIFFICULTY_MIN};

/// Adaptive-testing stopping rule and starting point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatSettings {
    pub initial_theta: f64,
    pub se_target: f64,
    pub min_questions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_questions: Option<u32>,
}

impl Default for CatSettings {
    fn default() -> Self {
        Self {
            initial_theta: 0.0,
            se_target: 0.3,
            min_questions: 5,
            max_questions: None,
        }
    }
}

impl CatSettings {
    pub fn validate(&self) -> Result<()> {
        if !(THETA_MIN..=THETA_MAX).contains(&self.initial_theta) {
            return Err(StudyError::InvalidTheta(self.initial_theta));
        }
        if !(self.se_target > 0.0 && self.se_target < 1.0) {
            return Err(invalid(format!("se_target {} must lie in (0, 1)", self.se_target)));
        }
        if let Some(max) = self.max_questions {
            if max < self.min_questions {
                return Err(invalid(format!(
                    "max_questions {} below min_questions {}",
                    max, self.min_questions
                )));
            }
        }
        Ok(())
    }
}

/// Bounds on a single ability update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThetaStep {
    /// Fraction of the Newton step actually taken.
    pub damping: f64,
    /// Largest theta move a single response may cause.
    pub max_step: f64,
    /// Below this information the response carries no usable signal.
    pub min_information: f64,
}

impl Default for ThetaStep {
    fn default() -> Self {
        Self {
            damping: 0.7,
            max_step: 0.5,
            min_information: 1e-6,
        }
    }
}

impl ThetaStep {
    pub fn validate(&self) -> Result<()> {
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(invalid(format!("damping {} must lie in (0, 1]", self.damping)));
        }
        if !(self.max_step > 0.0 && self.max_step.is_finite()) {
            return Err(invalid(format!("max_step {} must be positive", self.max_step)));
        }
        if !(self.min_information >= 0.0 && self.min_information.is_finite()) {
            return Err(invalid(format!(
                "min_information {} must be non-negative",
                self.min_information
            )));
        }
        Ok(())
    }
}

/// Whether questions already used may be offered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReusePolicy {
    /// Used questions are never offered again; exhaustion is an error.
    #[default]
    Never,
    /// Once every question has been used, all become eligible again.
    AfterExhaustion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    pub reuse_policy: ReusePolicy,
}

/// How a forgotten review treats the ease factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapsePolicy {
    /// Apply the SM-2 ease formula, which lowers the factor for quality < 3.
    #[default]
    Formula,
    /// Leave the ease factor untouched.
    Unchanged,
}

/// SM-2 parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sm2Settings {
    pub initial_ease: f64,
    pub minimum_ease: f64,
    pub maximum_ease: f64,
    pub first_interval: u32,
    pub second_interval: u32,
    pub maximum_interval: u32,
    pub lapse_policy: LapsePolicy,
    pub retention_cache_capacity: usize,
    pub target_retention: f64,
}

impl Default for Sm2Settings {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            minimum_ease: 1.3,
            maximum_ease: 3.0,
            first_interval: 1,
            second_interval: 6,
            maximum_interval: 365,
            lapse_policy: LapsePolicy::default(),
            retention_cache_capacity: 4096,
            target_retention: 0.9,
        }
    }
}

impl Sm2Settings {
    pub fn validate(&self) -> Result<()> {
        if !(self.minimum_ease > 0.0 && self.minimum_ease <= self.maximum_ease) {
            return Err(invalid(format!(
                "ease bounds [{}, {}] are not ordered",
                self.minimum_ease, self.maximum_ease
            )));
        }
        if !(self.minimum_ease..=self.maximum_ease).contains(&self.initial_ease) {
            return Err(StudyError::InvalidEaseFactor(self.initial_ease));
        }
        if self.first_interval == 0 || self.second_interval < self.first_interval {
            return Err(invalid(format!(
                "interval sequence {} -> {} must start positive and not shrink",
                self.first_interval, self.second_interval
            )));
        }
        if self.maximum_interval < self.second_interval {
            return Err(invalid(format!(
                "maximum_interval {} below second_interval {}",
                self.maximum_interval, self.second_interval
            )));
        }
        if self.retention_cache_capacity == 0 {
            return Err(invalid("retention_cache_capacity must be non-zero".to_string()));
        }
        if !(self.target_retention > 0.0 && self.target_retention < 1.0) {
            return Err(StudyError::InvalidTargetRetention(self.target_retention));
        }
        Ok(())
    }

    pub fn check_ease(&self, ease_factor: f64) -> Result<()> {
        if (self.minimum_ease..=self.maximum_ease).contains(&ease_factor) {
            Ok(())
        } else {
            Err(StudyError::InvalidEaseFactor(ease_factor))
        }
    }
}

/// Urgency weights and thresholds for the review queue. The ease ceiling
/// comes from [`Sm2Settings::maximum_ease`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub overdue_grace_days: f64,
    pub overdue_weight: f64,
    pub ease_weight: f64,
    pub critical_retention: f64,
    pub soon_days: i64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            overdue_grace_days: 1.0,
            overdue_weight: 10.0,
            ease_weight: 5.0,
            critical_retention: 0.5,
            soon_days: 3,
        }
    }
}

impl QueueSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.overdue_grace_days >= 0.0) {
            return Err(invalid(format!(
                "overdue_grace_days {} must be non-negative",
                self.overdue_grace_days
            )));
        }
        if !(self.overdue_weight > 0.0 && self.ease_weight > 0.0) {
            return Err(invalid("urgency weights must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.critical_retention) {
            return Err(invalid(format!(
                "critical_retention {} outside [0, 1]",
                self.critical_retention
            )));
        }
        Ok(())
    }
}

/// Response-time thresholds, in seconds, used to grade answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingSettings {
    pub fast_seconds: f64,
    pub slow_seconds: f64,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            fast_seconds: 20.0,
            slow_seconds: 90.0,
        }
    }
}

impl GradingSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.fast_seconds >= 0.0 && self.fast_seconds <= self.slow_seconds) {
            return Err(invalid(format!(
                "fast_seconds {} must not exceed slow_seconds {}",
                self.fast_seconds, self.slow_seconds
            )));
        }
        Ok(())
    }
}

/// Inclusive difficulty window a session draws questions from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyRange {
    pub min: f64,
    pub max: f64,
}

impl Default for DifficultyRange {
    fn default() -> Self {
        Self {
            min: DIFFICULTY_MIN,
            max: DIFFICULTY_MAX,
        }
    }
}

impl DifficultyRange {
    pub fn contains(&self, difficulty: f64) -> bool {
        (self.min..=self.max).contains(&difficulty)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min <= self.max) {
            return Err(invalid(format!(
                "difficulty range [{}, {}] is empty",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Per-subject overrides (all fields optional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSettings {
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub se_target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_questions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_questions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_range: Option<DifficultyRange>,
}

impl SubjectSettings {
    /// Create subject settings with only the id set.
    pub fn new(subject_id: String) -> Self {
        Self {
            subject_id,
            se_target: None,
            min_questions: None,
            max_questions: None,
            difficulty_range: None,
        }
    }
}

/// Session settings after merging subject overrides onto the global config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSessionSettings {
    pub cat: CatSettings,
    pub difficulty_range: DifficultyRange,
}

impl EffectiveSessionSettings {
    pub fn merge(global: &StudyConfig, subject: Option<&SubjectSettings>) -> Self {
        match subject {
            Some(s) => Self {
                cat: CatSettings {
                    initial_theta: global.cat.initial_theta,
                    se_target: s.se_target.unwrap_or(global.cat.se_target),
                    min_questions: s.min_questions.unwrap_or(global.cat.min_questions),
                    max_questions: s.max_questions.or(global.cat.max_questions),
                },
                difficulty_range: s.difficulty_range.unwrap_or(global.difficulty_range),
            },
            None => Self {
                cat: global.cat.clone(),
                difficulty_range: global.difficulty_range,
            },
        }
    }
}

/// Top-level configuration accepted by the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub cat: CatSettings,
    pub step: ThetaStep,
    pub selector: SelectorSettings,
    pub sm2: Sm2Settings,
    pub queue: QueueSettings,
    pub grading: GradingSettings,
    pub ability_bands: AbilityBands,
    pub difficulty_range: DifficultyRange,
    pub subjects: Vec<SubjectSettings>,
}

impl StudyConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cat.validate()?;
        self.step.validate()?;
        self.sm2.validate()?;
        self.queue.validate()?;
        self.grading.validate()?;
        self.ability_bands.validate()?;
        self.difficulty_range.validate()?;
        for subject in &self.subjects {
            let merged = EffectiveSessionSettings::merge(self, Some(subject));
            merged.cat.validate()?;
            merged.difficulty_range.validate()?;
        }
        Ok(())
    }

    /// Effective settings for a subject, or the global ones.
    pub fn effective_for(&self, subject_id: Option<&str>) -> EffectiveSessionSettings {
        let subject = subject_id.and_then(|id| self.subjects.iter().find(|s| s.subject_id == id));
        EffectiveSessionSettings::merge(self, subject)
    }
}

fn invalid(message: String) -> StudyError {
    StudyError::InvalidConfig(message)
}
