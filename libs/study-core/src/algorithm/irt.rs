//! Three-parameter logistic (3PL) item response model.
//!
//! P(θ) = c + (1 - c) / (1 + e^(-D·a·(θ - b)))
//!
//! - a: discrimination, how sharply the item separates ability levels
//! - b: difficulty, the theta at which the non-guessing part is 50%
//! - c: guessing floor
//! - D: 1.7, puts the logistic curve on the normal-ogive metric
//!
//! Every function is pure. Calibrations are valid by construction, so only
//! theta needs checking here.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};
use crate::settings::{CatSettings, ThetaStep};
use crate::types::ItemCalibration;

/// Logistic-to-normal scaling constant.
pub const D_SCALING: f64 = 1.7;
pub const THETA_MIN: f64 = -4.0;
pub const THETA_MAX: f64 = 4.0;
/// `exp` is never evaluated outside ±EXPONENT_LIMIT.
pub const EXPONENT_LIMIT: f64 = 35.0;
/// Standard error reported before any information has been observed.
pub const SE_UNKNOWN: f64 = THETA_MAX - THETA_MIN;

const INFORMATION_EPSILON: f64 = 1e-9;
const MLE_MAX_ITERATIONS: usize = 50;
const MLE_MAX_STEP: f64 = 1.0;
const MLE_CONVERGENCE: f64 = 1e-3;

/// Reject a theta that is NaN or outside [THETA_MIN, THETA_MAX].
pub fn check_theta(theta: f64) -> Result<f64> {
    if (THETA_MIN..=THETA_MAX).contains(&theta) {
        Ok(theta)
    } else {
        Err(StudyError::InvalidTheta(theta))
    }
}

/// Logistic part of the curve as (p*, 1 - p*), each computed without
/// cancellation so the tails stay strictly inside (0, 1).
fn logistic_pair(theta: f64, calibration: &ItemCalibration) -> (f64, f64) {
    let z = (D_SCALING * calibration.discrimination() * (theta - calibration.difficulty()))
        .clamp(-EXPONENT_LIMIT, EXPONENT_LIMIT);
    let p_star = 1.0 / (1.0 + (-z).exp());
    let q_star = 1.0 / (1.0 + z.exp());
    (p_star, q_star)
}

fn probability_unchecked(theta: f64, calibration: &ItemCalibration) -> f64 {
    let c = calibration.guessing();
    let (p_star, _) = logistic_pair(theta, calibration);
    c + (1.0 - c) * p_star
}

fn information_unchecked(theta: f64, calibration: &ItemCalibration) -> f64 {
    let c = calibration.guessing();
    let (p_star, q_star) = logistic_pair(theta, calibration);
    let p = c + (1.0 - c) * p_star;
    if p <= 0.0 {
        return 0.0;
    }
    let da = D_SCALING * calibration.discrimination();
    // (Da)^2 * (Q / P) * ((P - c) / (1 - c))^2 with Q = (1 - c) q*
    da * da * (1.0 - c) * q_star * p_star * p_star / p
}

/// Probability that a learner at `theta` answers the item correctly.
pub fn probability_correct(theta: f64, calibration: &ItemCalibration) -> Result<f64> {
    check_theta(theta)?;
    Ok(probability_unchecked(theta, calibration))
}

/// Fisher information of the item at `theta`.
///
/// Peaks at `b + ln((1 + sqrt(1 + 8c)) / 2) / (D a)`, which is exactly `b`
/// when there is no guessing.
pub fn fisher_information(theta: f64, calibration: &ItemCalibration) -> Result<f64> {
    check_theta(theta)?;
    Ok(information_unchecked(theta, calibration))
}

/// Outcome of a single ability update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThetaUpdate {
    pub theta: f64,
    /// Standard error implied by this observation alone.
    pub standard_error: f64,
    /// Fisher information of the item at the pre-update theta.
    pub information: f64,
    /// Model probability of a correct answer at the pre-update theta.
    pub probability: f64,
}

/// One bounded Fisher-scoring step with the default step settings.
pub fn update_theta(
    theta: f64,
    calibration: &ItemCalibration,
    is_correct: bool,
) -> Result<ThetaUpdate> {
    update_theta_with(theta, calibration, is_correct, &ThetaStep::default())
}

/// One Fisher-scoring step: `Δ = damping · g / I`, clamped to `±max_step`.
///
/// `g` is the gradient of the response log-likelihood and `I` the item's
/// Fisher information, both at the current theta.
pub fn update_theta_with(
    theta: f64,
    calibration: &ItemCalibration,
    is_correct: bool,
    step: &ThetaStep,
) -> Result<ThetaUpdate> {
    check_theta(theta)?;

    let probability = probability_unchecked(theta, calibration);
    let information = information_unchecked(theta, calibration);

    if information < step.min_information {
        return Ok(ThetaUpdate {
            theta,
            standard_error: calculate_standard_error(information),
            information,
            probability,
        });
    }

    let (p_star, _) = logistic_pair(theta, calibration);
    let observed = if is_correct { 1.0 } else { 0.0 };
    let gradient =
        D_SCALING * calibration.discrimination() * (observed - probability) * p_star / probability;
    let delta = (step.damping * gradient / information).clamp(-step.max_step, step.max_step);

    Ok(ThetaUpdate {
        theta: (theta + delta).clamp(THETA_MIN, THETA_MAX),
        standard_error: calculate_standard_error(information),
        information,
        probability,
    })
}

/// SE = 1 / sqrt(total information), or `SE_UNKNOWN` when nothing is known.
pub fn calculate_standard_error(information_sum: f64) -> f64 {
    if information_sum.is_finite() && information_sum > INFORMATION_EPSILON {
        1.0 / information_sum.sqrt()
    } else {
        SE_UNKNOWN
    }
}

/// CAT stopping rule: precise enough, and enough questions seen.
pub fn should_stop_cat(
    standard_error: f64,
    questions_answered: u32,
    settings: &CatSettings,
) -> bool {
    standard_error < settings.se_target && questions_answered >= settings.min_questions
}

/// Expected performance on a set of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedScore {
    pub expected_correct: f64,
    pub total_questions: usize,
    pub expected_percentage: f64,
    pub min_probability: f64,
    pub max_probability: f64,
}

pub fn expected_score(theta: f64, calibrations: &[ItemCalibration]) -> Result<ExpectedScore> {
    check_theta(theta)?;
    if calibrations.is_empty() {
        return Ok(ExpectedScore {
            expected_correct: 0.0,
            total_questions: 0,
            expected_percentage: 0.0,
            min_probability: 0.0,
            max_probability: 0.0,
        });
    }

    let probabilities: Vec<f64> = calibrations
        .iter()
        .map(|c| probability_unchecked(theta, c))
        .collect();
    let expected_correct: f64 = probabilities.iter().sum();

    Ok(ExpectedScore {
        expected_correct,
        total_questions: calibrations.len(),
        expected_percentage: expected_correct / calibrations.len() as f64 * 100.0,
        min_probability: probabilities.iter().copied().fold(f64::INFINITY, f64::min),
        max_probability: probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Maximum-likelihood theta over a whole response history.
///
/// Newton-Raphson with expected information as curvature. A history with
/// no mixed responses has no interior maximum, so it maps to the bound.
pub fn estimate_theta_mle(
    responses: &[(ItemCalibration, bool)],
    initial_theta: f64,
) -> Result<f64> {
    let mut theta = check_theta(initial_theta)?;

    if responses.is_empty() {
        return Ok(theta);
    }
    if responses.iter().all(|(_, correct)| *correct) {
        return Ok(THETA_MAX);
    }
    if responses.iter().all(|(_, correct)| !*correct) {
        return Ok(THETA_MIN);
    }

    for _ in 0..MLE_MAX_ITERATIONS {
        let mut gradient = 0.0;
        let mut information = 0.0;
        for (calibration, correct) in responses {
            let p = probability_unchecked(theta, calibration);
            let (p_star, _) = logistic_pair(theta, calibration);
            let observed = if *correct { 1.0 } else { 0.0 };
            gradient += D_SCALING * calibration.discrimination() * (observed - p) * p_star / p;
            information += information_unchecked(theta, calibration);
        }

        if information < INFORMATION_EPSILON {
            tracing::warn!(theta, "MLE stopped on vanishing information");
            return Ok(theta);
        }

        let delta = (gradient / information).clamp(-MLE_MAX_STEP, MLE_MAX_STEP);
        let next = (theta + delta).clamp(THETA_MIN, THETA_MAX);
        if (next - theta).abs() < MLE_CONVERGENCE {
            return Ok(next);
        }
        theta = next;
    }

    tracing::warn!(theta, iterations = MLE_MAX_ITERATIONS, "MLE did not converge");
    Ok(theta)
}
