// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::TrackerRecord;

/// Aggregate figures shown on the statistics screen.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub best_streak: usize,
    pub ideal_days: usize,
    pub total_completed: usize,
    pub average_per_day: usize,
}

/// Computes statistics over every completion record.
///
/// Records on the same day count once towards streaks; `ideal_days` counts
/// days on which the number of records equals `total_tracker_count`.
pub fn compute_statistics(records: &[TrackerRecord], total_tracker_count: usize) -> Statistics {
    if records.is_empty() {
        return Statistics::default();
    }

    // Ordered by day, which is what the streak scan needs.
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in records {
        *per_day.entry(record.date).or_default() += 1;
    }

    let mut best_streak: usize = 0;
    let mut current: usize = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in per_day.keys() {
        current = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => current + 1,
            _ => 1,
        };
        best_streak = best_streak.max(current);
        previous = Some(day);
    }

    let ideal_days = if total_tracker_count == 0 {
        0
    } else {
        per_day
            .values()
            .filter(|&&count| count == total_tracker_count)
            .count()
    };

    Statistics {
        best_streak,
        ideal_days,
        total_completed: records.len(),
        average_per_day: records.len() / per_day.len(),
    }
}
