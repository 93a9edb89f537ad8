//! Seeded simulation of one learner: a placement session followed by daily
//! review sittings.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use study_core::algorithm::irt::probability_correct;
use study_core::algorithm::sm2::calculate_retention_probability;
use study_core::{
    AnswerEvent, CoverageRequirement, ItemCalibration, LearnerState, Question, RetentionForecast,
    ReviewItem, ReviewQueue, ReviewStatistics, SessionSummary, Sm2Scheduler, StudyError,
    StudySession,
};

use crate::config::SimConfig;

const TOPICS: [&str; 4] = ["algebra", "geometry", "statistics", "calculus"];
const FORECAST_DAYS: u32 = 7;

/// One day of review practice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReport {
    pub day: u32,
    pub reviewed: usize,
    pub remembered: usize,
    pub theta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub true_theta: f64,
    pub placement: SessionSummary,
    /// Placement estimate minus the true theta.
    pub estimate_error: f64,
    pub days: Vec<DayReport>,
    pub statistics: ReviewStatistics,
    pub forecast: Vec<RetentionForecast>,
}

/// Random but reproducible calibrated pool spread over every topic.
pub fn generate_pool(rng: &mut ChaCha8Rng, size: usize) -> anyhow::Result<Vec<Question>> {
    (0..size)
        .map(|i| {
            let calibration = ItemCalibration::new(
                rng.gen_range(0.6..2.2),
                rng.gen_range(-2.8..2.8),
                rng.gen_range(0.15..0.3),
            )?;
            Ok(Question::new(format!("q{:04}", i), TOPICS[i % TOPICS.len()], calibration))
        })
        .collect()
}

/// Draw whether the simulated learner answers `question` correctly.
fn respond(
    rng: &mut ChaCha8Rng,
    true_theta: f64,
    question: &Question,
) -> anyhow::Result<AnswerEvent> {
    let p = probability_correct(true_theta, &question.calibration)?;
    let is_correct = rng.gen::<f64>() < p;
    let seconds = if is_correct {
        rng.gen_range(8..60)
    } else {
        rng.gen_range(20..120)
    };
    Ok(AnswerEvent::new(question.id.clone(), is_correct, Duration::from_secs(seconds)))
}

/// Recall mixes the forgetting curve with how hard the item is for the
/// learner.
fn recall(
    rng: &mut ChaCha8Rng,
    true_theta: f64,
    question: &Question,
    item: &ReviewItem,
    now: DateTime<Utc>,
) -> anyhow::Result<AnswerEvent> {
    let days = item.days_since_review(now).unwrap_or(0) as f64;
    let memory = calculate_retention_probability(days, item.ease_factor, item.repetitions);
    let skill = probability_correct(true_theta, &question.calibration)?;
    let is_correct = rng.gen::<f64>() < 0.5 * (memory + skill);
    let seconds = rng.gen_range(5..90);
    Ok(AnswerEvent::new(question.id.clone(), is_correct, Duration::from_secs(seconds)))
}

pub fn simulate(config: &SimConfig, start: DateTime<Utc>) -> anyhow::Result<SimulationReport> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let pool = generate_pool(&mut rng, config.pool_size)?;
    let coverage = CoverageRequirement::new(TOPICS.iter().map(|t| t.to_string()).collect(), None);

    let learner = LearnerState::new("simulated", None, &config.study);
    let mut session = StudySession::start(&config.study, learner, start)?;
    while !session.stop_decision().should_stop {
        let question = match session.next_question(&pool, Some(&coverage)) {
            Ok(question) => question,
            Err(StudyError::QuestionPoolExhausted { pool_size }) => {
                tracing::warn!(pool_size, "pool exhausted before the estimate converged");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let event = respond(&mut rng, config.true_theta, question)?;
        session.record_answer(question, &event, start)?;
    }

    let placement = session.summary(start)?;
    tracing::info!(
        answered = placement.questions_attempted,
        theta = placement.theta_end,
        standard_error = placement.standard_error,
        level = %placement.ability_level,
        "placement finished"
    );
    let mut state = session.finish(start);

    let mut days = Vec::with_capacity(config.days as usize);
    for day in 1..=config.days {
        let now = start + chrono::Duration::days(i64::from(day));
        let mut session = StudySession::start(&config.study, state, now)?;

        let due: Vec<ReviewItem> = session.due_reviews(now).into_iter().cloned().collect();
        let mut remembered = 0;
        for item in &due {
            let Some(question) = pool.iter().find(|q| q.id == item.id) else {
                continue;
            };
            let event = recall(&mut rng, config.true_theta, question, item, now)?;
            let outcome = session.record_answer(question, &event, now)?;
            if !outcome.review.forgotten {
                remembered += 1;
            }
        }

        tracing::debug!(day, reviewed = due.len(), remembered, "review day");
        days.push(DayReport {
            day,
            reviewed: due.len(),
            remembered,
            theta: session.theta(),
        });
        state = session.finish(now);
    }

    let end = start + chrono::Duration::days(i64::from(config.days));
    let scheduler = Sm2Scheduler::new(config.study.sm2.clone())?;
    let queue = ReviewQueue::new(config.study.queue.clone(), &config.study.sm2)?;

    Ok(SimulationReport {
        true_theta: config.true_theta,
        estimate_error: placement.theta_end - config.true_theta,
        placement,
        days,
        statistics: queue.statistics(&state.review_items, end, &scheduler),
        forecast: scheduler.predict_retention_rate(&state.review_items, end, FORECAST_DAYS),
    })
}
