//! Error types for study-core.

use thiserror::Error;

/// Result type alias using StudyError.
pub type Result<T> = std::result::Result<T, StudyError>;

/// Errors raised synchronously by the scheduling core.
///
/// Every variant is caller error or bad data; nothing here is transient.
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("invalid calibration: {parameter} = {value} outside [{min}, {max}]")]
    InvalidCalibration {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("theta {0} outside [-4, 4]")]
    InvalidTheta(f64),

    #[error("quality {0} outside 0-5")]
    InvalidQuality(i64),

    #[error("ease factor {0} outside configured bounds")]
    InvalidEaseFactor(f64),

    #[error("percentage {0} outside [0, 100]")]
    InvalidPercentage(f64),

    #[error("target retention {0} must lie strictly between 0 and 1")]
    InvalidTargetRetention(f64),

    #[error("candidate pool is empty")]
    EmptyCandidatePool,

    #[error("all {pool_size} questions in the pool have been used")]
    QuestionPoolExhausted { pool_size: usize },

    #[error("answer for '{answered}' submitted against question '{question}'")]
    AnswerMismatch { question: String, answered: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}
