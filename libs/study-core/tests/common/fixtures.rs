//! Test fixtures and factory functions for creating test data.

use std::time::Duration;

use chrono::{DateTime, Utc};

use study_core::{AnswerEvent, ItemCalibration, Question, ReviewItem, StudyConfig};

/// A question with the default guessing floor.
pub fn question(id: &str, topic: &str, discrimination: f64, difficulty: f64) -> Question {
    Question::new(
        id,
        topic,
        ItemCalibration::with_default_guessing(discrimination, difficulty).unwrap(),
    )
}

/// `count` questions on one topic with difficulties spread evenly over
/// `[low, high]`.
///
/// # Arguments
/// * `prefix` - Id prefix, ids are `{prefix}-{index}`
/// * `topic` - Topic shared by every question
pub fn question_ladder(
    prefix: &str,
    topic: &str,
    count: usize,
    low: f64,
    high: f64,
) -> Vec<Question> {
    (0..count)
        .map(|i| {
            let step = if count > 1 {
                (high - low) / (count - 1) as f64
            } else {
                0.0
            };
            question(&format!("{}-{}", prefix, i), topic, 1.2, low + step * i as f64)
        })
        .collect()
}

/// An answer given in `seconds` with no confidence rating.
pub fn answer(question: &Question, is_correct: bool, seconds: u64) -> AnswerEvent {
    AnswerEvent::new(question.id.clone(), is_correct, Duration::from_secs(seconds))
}

/// A review item that has been reviewed before and is due at `due`.
pub fn scheduled_item(
    id: &str,
    ease_factor: f64,
    repetitions: u32,
    due: DateTime<Utc>,
) -> ReviewItem {
    let mut item = ReviewItem::new(id, "topic", ease_factor, due);
    item.repetitions = repetitions;
    item.interval_days = 6;
    item.last_reviewed = Some(due - chrono::Duration::days(6));
    item.total_reviews = repetitions;
    item
}

/// Default config with a looser precision target and a small minimum, so
/// sessions finish well before a modest pool runs out.
pub fn quick_config() -> StudyConfig {
    let mut config = StudyConfig::default();
    config.cat.se_target = 0.4;
    config.cat.min_questions = 3;
    config
}
