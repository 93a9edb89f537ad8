//! Common test utilities for study-core integration tests.
//!
//! - A fixed clock so due dates are reproducible
//! - Factory helpers in [`fixtures`]

#![allow(dead_code)]

pub mod fixtures;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Fixed reference instant for every test.
pub fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 30, 0).unwrap()
}

pub fn days_later(days: i64) -> DateTime<Utc> {
    clock() + Duration::days(days)
}
