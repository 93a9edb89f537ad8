//! SM-2 spaced repetition algorithm.
//!
//! Based on SuperMemo 2. Interval sequence is `first_interval`,
//! `second_interval`, then the previous interval times the previous ease
//! factor. Retention follows an exponential forgetting curve whose
//! stability grows with the ease factor and the repetition count.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};
use crate::settings::{LapsePolicy, Sm2Settings};
use crate::types::{Quality, ReviewItem, ReviewState};

/// Stability bonus per successful repetition.
const STABILITY_PER_REPETITION: f64 = 0.5;

/// Outcome of one SM-2 step, independent of any item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewSchedule {
    pub quality: Quality,
    pub forgotten: bool,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
}

/// SM-2 step with the default parameters.
pub fn calculate_next_review(
    quality: i64,
    ease_factor: f64,
    interval_days: u32,
    repetitions: u32,
) -> Result<ReviewSchedule> {
    calculate_next_review_with(
        quality,
        ease_factor,
        interval_days,
        repetitions,
        &Sm2Settings::default(),
    )
}

pub fn calculate_next_review_with(
    quality: i64,
    ease_factor: f64,
    interval_days: u32,
    repetitions: u32,
    settings: &Sm2Settings,
) -> Result<ReviewSchedule> {
    let quality = Quality::from_value(quality)?;
    settings.check_ease(ease_factor)?;

    if !quality.is_remembered() {
        let ease_factor = match settings.lapse_policy {
            LapsePolicy::Formula => {
                calculate_ease_factor(quality, ease_factor, settings).min(ease_factor)
            }
            LapsePolicy::Unchanged => ease_factor,
        };
        return Ok(ReviewSchedule {
            quality,
            forgotten: true,
            interval_days: settings.first_interval,
            ease_factor,
            repetitions: 0,
        });
    }

    let interval_days = match repetitions {
        0 => settings.first_interval,
        1 => settings.second_interval,
        _ => {
            let grown = (f64::from(interval_days) * ease_factor).round().max(1.0);
            grown.min(f64::from(settings.maximum_interval)) as u32
        }
    };

    Ok(ReviewSchedule {
        quality,
        forgotten: false,
        interval_days,
        ease_factor: calculate_ease_factor(quality, ease_factor, settings),
        repetitions: repetitions.saturating_add(1),
    })
}

/// `EF' = EF + (0.1 - (5 - q)(0.08 + (5 - q) 0.02))`, clamped to the
/// configured bounds.
pub fn calculate_ease_factor(quality: Quality, ease_factor: f64, settings: &Sm2Settings) -> f64 {
    let miss = f64::from(5 - quality.to_value());
    let adjusted = ease_factor + (0.1 - miss * (0.08 + miss * 0.02));
    adjusted.clamp(settings.minimum_ease, settings.maximum_ease)
}

/// Days after which retention has decayed to 1/e.
pub fn stability_days(ease_factor: f64, repetitions: u32) -> f64 {
    ease_factor * (1.0 + STABILITY_PER_REPETITION * f64::from(repetitions))
}

/// `exp(-t / S)`, in [0, 1]. No successful recall yet gives 0; a review in
/// the future or just now gives 1.
pub fn calculate_retention_probability(
    days_since_review: f64,
    ease_factor: f64,
    repetitions: u32,
) -> f64 {
    if repetitions == 0 {
        return 0.0;
    }
    if days_since_review <= 0.0 {
        return 1.0;
    }
    let stability = stability_days(ease_factor, repetitions);
    if !(stability > 0.0) {
        return 0.0;
    }
    (-days_since_review / stability).exp().clamp(0.0, 1.0)
}

/// Days until retention falls to `target_retention`, with the default
/// interval bounds.
pub fn calculate_optimal_review_delay(
    ease_factor: f64,
    repetitions: u32,
    target_retention: f64,
) -> Result<u32> {
    calculate_optimal_review_delay_with(
        ease_factor,
        repetitions,
        target_retention,
        &Sm2Settings::default(),
    )
}

/// Solves `target = exp(-t / S)` for whole days `t`, clamped to
/// `[first_interval, maximum_interval]`.
pub fn calculate_optimal_review_delay_with(
    ease_factor: f64,
    repetitions: u32,
    target_retention: f64,
    settings: &Sm2Settings,
) -> Result<u32> {
    if !(target_retention > 0.0 && target_retention < 1.0) {
        return Err(StudyError::InvalidTargetRetention(target_retention));
    }
    settings.check_ease(ease_factor)?;

    let days = -stability_days(ease_factor, repetitions) * target_retention.ln();
    let clamped = days
        .floor()
        .clamp(f64::from(settings.first_interval), f64::from(settings.maximum_interval));
    Ok(clamped as u32)
}

/// Full record of one review applied to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewScheduleResult {
    pub item_id: String,
    pub quality: Quality,
    pub forgotten: bool,
    pub previous_state: ReviewState,
    pub new_state: ReviewState,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub due_date: DateTime<Utc>,
}

/// Mean predicted retention across reviewed items on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionForecast {
    pub date: NaiveDate,
    pub average_retention: f64,
    pub items_counted: usize,
}

/// (whole days since review, ease factor in hundredths, repetitions)
type RetentionKey = (i64, i64, u32);

/// Stateful SM-2 scheduler with a bounded retention cache.
#[derive(Debug)]
pub struct Sm2Scheduler {
    settings: Sm2Settings,
    retention_cache: Mutex<LruCache<RetentionKey, f64>>,
}

impl Sm2Scheduler {
    pub fn new(settings: Sm2Settings) -> Result<Self> {
        settings.validate()?;
        let capacity = NonZeroUsize::new(settings.retention_cache_capacity).ok_or_else(|| {
            StudyError::InvalidConfig("retention_cache_capacity must be non-zero".to_string())
        })?;
        Ok(Self {
            settings,
            retention_cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn settings(&self) -> &Sm2Settings {
        &self.settings
    }

    /// A fresh item at the initial ease factor, due now.
    pub fn create_item(
        &self,
        id: impl Into<String>,
        topic_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> ReviewItem {
        ReviewItem::new(id, topic_id, self.settings.initial_ease, now)
    }

    /// Apply a review to `item` in place.
    ///
    /// The item is left untouched when the quality or its stored ease factor
    /// is invalid.
    pub fn record_review(
        &self,
        item: &mut ReviewItem,
        quality: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewScheduleResult> {
        let previous_state = item.state(now);
        let schedule = calculate_next_review_with(
            quality,
            item.ease_factor,
            item.interval_days,
            item.repetitions,
            &self.settings,
        )?;

        let quality_sum = item.average_quality * f64::from(item.total_reviews);
        item.total_reviews = item.total_reviews.saturating_add(1);
        item.average_quality = (quality_sum + f64::from(schedule.quality.to_value()))
            / f64::from(item.total_reviews);
        if schedule.forgotten {
            item.lapses = item.lapses.saturating_add(1);
        }
        item.repetitions = schedule.repetitions;
        item.interval_days = schedule.interval_days;
        item.ease_factor = schedule.ease_factor;
        item.last_reviewed = Some(now);
        item.due_date = now + Duration::days(i64::from(schedule.interval_days));

        let new_state = item.state(now);
        tracing::debug!(
            item_id = %item.id,
            quality = schedule.quality.to_value(),
            interval_days = schedule.interval_days,
            ease_factor = schedule.ease_factor,
            forgotten = schedule.forgotten,
            "review recorded"
        );

        Ok(ReviewScheduleResult {
            item_id: item.id.clone(),
            quality: schedule.quality,
            forgotten: schedule.forgotten,
            previous_state,
            new_state,
            interval_days: schedule.interval_days,
            ease_factor: schedule.ease_factor,
            repetitions: schedule.repetitions,
            due_date: item.due_date,
        })
    }

    /// Current retention of `item`; 0 for an item with no successful recall
    /// on record.
    pub fn retention(&self, item: &ReviewItem, now: DateTime<Utc>) -> f64 {
        match item.days_since_review(now) {
            Some(days) if item.repetitions > 0 => {
                self.cached_retention(days, item.ease_factor, item.repetitions)
            }
            _ => 0.0,
        }
    }

    fn cached_retention(&self, days: i64, ease_factor: f64, repetitions: u32) -> f64 {
        let key = (days, (ease_factor * 100.0).round() as i64, repetitions);
        // A poisoned cache still holds valid entries.
        let mut cache = self
            .retention_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = cache.get(&key) {
            tracing::trace!(days, repetitions, "retention cache hit");
            return *hit;
        }
        let value = calculate_retention_probability(days as f64, key.1 as f64 / 100.0, repetitions);
        cache.put(key, value);
        value
    }

    /// Mean retention of reviewed items for today and each of the next
    /// `days_ahead` days.
    pub fn predict_retention_rate(
        &self,
        items: &[ReviewItem],
        now: DateTime<Utc>,
        days_ahead: u32,
    ) -> Vec<RetentionForecast> {
        (0..=days_ahead)
            .map(|offset| {
                let at = now + Duration::days(i64::from(offset));
                let (sum, count) = items
                    .iter()
                    .filter(|item| item.last_reviewed.is_some() && item.repetitions > 0)
                    .fold((0.0, 0usize), |(sum, count), item| {
                        (sum + self.retention(item, at), count + 1)
                    });
                RetentionForecast {
                    date: at.date_naive(),
                    average_retention: if count > 0 { sum / count as f64 } else { 0.0 },
                    items_counted: count,
                }
            })
            .collect()
    }

    /// Delay until `ease_factor`/`repetitions` decays to the configured
    /// target retention.
    pub fn optimal_review_delay(&self, ease_factor: f64, repetitions: u32) -> Result<u32> {
        calculate_optimal_review_delay_with(
            ease_factor,
            repetitions,
            self.settings.target_retention,
            &self.settings,
        )
    }

    pub fn cache_len(&self) -> usize {
        self.retention_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn clear_cache(&self) {
        self.retention_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
