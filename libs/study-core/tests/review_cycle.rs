//! Spaced repetition cycle and review queue behaviour.

mod common;

use pretty_assertions::assert_eq;

use common::{clock, days_later, fixtures};
use study_core::{
    LearnerState, ReviewPriority, ReviewQueue, ReviewState, Sm2Scheduler, Sm2Settings, StudyConfig,
    StudySession,
};

/// Successful reviews follow 1, 6, then multiply by the ease factor.
#[test]
fn test_interval_sequence() {
    let scheduler = Sm2Scheduler::new(Sm2Settings::default()).unwrap();
    let mut item = scheduler.create_item("q1", "algebra", clock());

    let first = scheduler.record_review(&mut item, 4, clock()).unwrap();
    assert_eq!(first.interval_days, 1);

    let second = scheduler.record_review(&mut item, 4, days_later(1)).unwrap();
    assert_eq!(second.interval_days, 6);

    let third = scheduler.record_review(&mut item, 4, days_later(7)).unwrap();
    assert_eq!(third.interval_days, 15);
    assert_eq!(third.due_date, days_later(22));
    assert_eq!(item.repetitions, 3);
}

/// Forgetting resets the item to a one-day relearn interval.
#[test]
fn test_forgotten_item_resets() {
    let scheduler = Sm2Scheduler::new(Sm2Settings::default()).unwrap();
    let mut item = fixtures::scheduled_item("q1", 2.5, 5, clock());
    item.interval_days = 30;

    let result = scheduler.record_review(&mut item, 1, clock()).unwrap();
    assert!(result.forgotten);
    assert_eq!(result.previous_state, ReviewState::Due);
    assert_eq!(result.new_state, ReviewState::Reset);
    assert_eq!(item.interval_days, 1);
    assert_eq!(item.repetitions, 0);
    assert!(item.ease_factor < 2.5);
    assert_eq!(item.state(days_later(1)), ReviewState::Due);
}

/// Due reviews are exactly the due items, in a stable order.
#[test]
fn test_due_queue_is_deterministic() {
    let queue = ReviewQueue::default();
    let items = vec![
        fixtures::scheduled_item("b", 2.5, 2, days_later(-3)),
        fixtures::scheduled_item("a", 2.5, 2, days_later(-3)),
        fixtures::scheduled_item("hard", 1.5, 2, days_later(-3)),
        fixtures::scheduled_item("later", 2.5, 2, days_later(2)),
        fixtures::scheduled_item("oldest", 2.8, 2, days_later(-10)),
    ];

    let ids: Vec<&str> = queue
        .get_due_reviews(&items, clock())
        .iter()
        .map(|item| item.id.as_str())
        .collect();
    assert_eq!(ids, vec!["oldest", "hard", "a", "b"]);

    let mut shuffled = items.clone();
    shuffled.reverse();
    let again: Vec<&str> = queue
        .get_due_reviews(&shuffled, clock())
        .iter()
        .map(|item| item.id.as_str())
        .collect();
    assert_eq!(again, ids);
}

/// Priority and statistics agree with the retention model.
#[test]
fn test_priorities_follow_retention() {
    let scheduler = Sm2Scheduler::new(Sm2Settings::default()).unwrap();
    let queue = ReviewQueue::default();

    let mut fresh = scheduler.create_item("fresh", "algebra", clock());
    scheduler.record_review(&mut fresh, 5, clock()).unwrap();

    let retention_now = scheduler.retention(&fresh, days_later(1));
    assert_eq!(queue.priority(&fresh, days_later(1), retention_now), ReviewPriority::High);

    let retention_later = scheduler.retention(&fresh, days_later(30));
    assert!(retention_later < 0.5);
    assert_eq!(
        queue.priority(&fresh, days_later(30), retention_later),
        ReviewPriority::Critical
    );

    let forecast = scheduler.predict_retention_rate(&[fresh], clock(), 5);
    assert_eq!(forecast.len(), 6);
    for pair in forecast.windows(2) {
        assert!(pair[1].average_retention < pair[0].average_retention);
    }
}

/// A session's answers feed the review queue.
#[test]
fn test_session_answers_become_due_reviews() {
    let config = StudyConfig::default();
    let learner = LearnerState::new("learner-1", None, &config);
    let mut session = StudySession::start(&config, learner, clock()).unwrap();
    let pool = fixtures::question_ladder("q", "algebra", 6, -1.0, 1.0);

    for question in pool.iter().take(3) {
        session
            .record_answer(question, &fixtures::answer(question, true, 10), clock())
            .unwrap();
    }

    assert!(session.due_reviews(clock()).is_empty());
    assert_eq!(session.due_reviews(days_later(1)).len(), 3);

    let stats = session.review_statistics(days_later(1));
    assert_eq!(stats.total_items, 3);
    assert_eq!(stats.due_items, 3);
    assert_eq!(stats.overdue_items, 0);
}
