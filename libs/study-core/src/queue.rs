//! Review queue ordering and reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithm::sm2::Sm2Scheduler;
use crate::error::Result;
use crate::settings::{QueueSettings, Sm2Settings};
use crate::types::ReviewItem;

/// Coarse urgency bucket for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    /// Retention has fallen below the critical threshold.
    Critical,
    /// Due now.
    High,
    /// Due within `soon_days`.
    Medium,
    Low,
}

/// Aggregate view of a learner's review items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStatistics {
    pub total_items: usize,
    pub due_items: usize,
    pub overdue_items: usize,
    pub critical_items: usize,
    pub average_ease_factor: f64,
    /// Mean retention over items with at least one successful recall.
    pub average_retention: f64,
}

#[derive(Debug, Clone)]
pub struct ReviewQueue {
    settings: QueueSettings,
    maximum_ease: f64,
}

impl Default for ReviewQueue {
    fn default() -> Self {
        Self {
            settings: QueueSettings::default(),
            maximum_ease: Sm2Settings::default().maximum_ease,
        }
    }
}

impl ReviewQueue {
    /// Takes its ease ceiling from the scheduler's settings.
    pub fn new(settings: QueueSettings, sm2: &Sm2Settings) -> Result<Self> {
        settings.validate()?;
        sm2.validate()?;
        Ok(Self {
            settings,
            maximum_ease: sm2.maximum_ease,
        })
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Higher is more urgent. Items not yet due score below zero on the
    /// overdue term.
    pub fn calculate_review_urgency(&self, item: &ReviewItem, now: DateTime<Utc>) -> f64 {
        self.settings.overdue_weight * item.days_overdue(now)
            + self.settings.ease_weight * (self.maximum_ease - item.ease_factor)
    }

    /// Urgency descending, then id ascending.
    pub fn sort_by_urgency(&self, items: &mut [&ReviewItem], now: DateTime<Utc>) {
        items.sort_by(|a, b| {
            self.calculate_review_urgency(b, now)
                .total_cmp(&self.calculate_review_urgency(a, now))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    /// Exactly the items with `due_date <= now`, most urgent first.
    pub fn get_due_reviews<'a>(
        &self,
        items: &'a [ReviewItem],
        now: DateTime<Utc>,
    ) -> Vec<&'a ReviewItem> {
        let mut due: Vec<&ReviewItem> = items.iter().filter(|item| item.is_due(now)).collect();
        self.sort_by_urgency(&mut due, now);
        due
    }

    /// Items more than `overdue_grace_days` past due, most urgent first.
    pub fn get_overdue_reviews<'a>(
        &self,
        items: &'a [ReviewItem],
        now: DateTime<Utc>,
    ) -> Vec<&'a ReviewItem> {
        let mut overdue: Vec<&ReviewItem> = items
            .iter()
            .filter(|item| item.days_overdue(now) > self.settings.overdue_grace_days)
            .collect();
        self.sort_by_urgency(&mut overdue, now);
        overdue
    }

    pub fn priority(
        &self,
        item: &ReviewItem,
        now: DateTime<Utc>,
        retention: f64,
    ) -> ReviewPriority {
        if retention < self.settings.critical_retention {
            return ReviewPriority::Critical;
        }
        let days_until = item
            .due_date
            .date_naive()
            .signed_duration_since(now.date_naive())
            .num_days();
        if days_until <= 0 {
            ReviewPriority::High
        } else if days_until <= self.settings.soon_days {
            ReviewPriority::Medium
        } else {
            ReviewPriority::Low
        }
    }

    pub fn statistics(
        &self,
        items: &[ReviewItem],
        now: DateTime<Utc>,
        scheduler: &Sm2Scheduler,
    ) -> ReviewStatistics {
        if items.is_empty() {
            return ReviewStatistics {
                total_items: 0,
                due_items: 0,
                overdue_items: 0,
                critical_items: 0,
                average_ease_factor: 0.0,
                average_retention: 0.0,
            };
        }

        let mut due_items = 0;
        let mut overdue_items = 0;
        let mut critical_items = 0;
        let mut ease_sum = 0.0;
        let mut retention_sum = 0.0;
        let mut retained = 0usize;

        for item in items {
            ease_sum += item.ease_factor;
            if item.is_due(now) {
                due_items += 1;
            }
            if item.days_overdue(now) > self.settings.overdue_grace_days {
                overdue_items += 1;
            }
            let retention = scheduler.retention(item, now);
            if retention < self.settings.critical_retention {
                critical_items += 1;
            }
            if item.last_reviewed.is_some() && item.repetitions > 0 {
                retention_sum += retention;
                retained += 1;
            }
        }

        ReviewStatistics {
            total_items: items.len(),
            due_items,
            overdue_items,
            critical_items,
            average_ease_factor: ease_sum / items.len() as f64,
            average_retention: if retained > 0 {
                retention_sum / retained as f64
            } else {
                0.0
            },
        }
    }
}
