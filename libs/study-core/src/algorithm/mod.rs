//! Psychometric and spaced repetition models.
//!
//! Everything here is a pure function of its inputs except the retention
//! cache inside [`sm2::Sm2Scheduler`].

pub mod irt;
pub mod scale;
pub mod sm2;

pub use irt::{
    calculate_standard_error, estimate_theta_mle, expected_score, fisher_information,
    probability_correct, should_stop_cat, update_theta, update_theta_with, ExpectedScore,
    ThetaUpdate,
};
pub use scale::{
    get_ability_level, percentage_to_theta, theta_to_percentage, theta_to_percentile, AbilityBand,
    AbilityBands,
};
pub use sm2::{
    calculate_next_review, calculate_next_review_with, calculate_optimal_review_delay,
    calculate_retention_probability, ReviewSchedule, ReviewScheduleResult, RetentionForecast,
    Sm2Scheduler,
};
