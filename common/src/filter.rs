// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::weekday::weekday_of;
use crate::{Tracker, TrackerKind, TrackerRecord};

/// Which trackers to show for a selected day.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    All,
    DueToday,
    Completed,
    NotCompleted,
}

impl Tracker {
    /// The one rule for "due": irregular events and trackers with an empty
    /// schedule are due every day, everything else on its scheduled weekdays.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.kind == TrackerKind::IrregularEvent
            || self.schedule.is_empty()
            || self.schedule.contains(weekday_of(date))
    }
}

/// Filters trackers for one day.
///
/// Search is applied first (case-insensitive substring of the name, only an
/// empty search keeps everything), then the mode. Source order is preserved.
pub fn filter_trackers<F>(
    trackers: &[Tracker],
    mode: FilterMode,
    date: NaiveDate,
    search: &str,
    is_completed_on: F,
) -> Vec<Tracker>
where
    F: Fn(&Tracker, NaiveDate) -> bool,
{
    let needle = search.to_lowercase();

    trackers
        .iter()
        .filter(|tracker| needle.is_empty() || tracker.name.to_lowercase().contains(&needle))
        .filter(|tracker| match mode {
            FilterMode::All => true,
            FilterMode::DueToday => tracker.is_due_on(date),
            FilterMode::Completed => is_completed_on(tracker, date),
            FilterMode::NotCompleted => !is_completed_on(tracker, date),
        })
        .cloned()
        .collect()
}

/// Completion lookup built once from the full record set.
#[derive(Debug, Clone, Default)]
pub struct CompletionIndex {
    done: HashSet<(i64, NaiveDate)>,
    days_per_tracker: HashMap<i64, usize>,
}

impl CompletionIndex {
    pub fn new(records: &[TrackerRecord]) -> Self {
        let mut index = Self::default();
        for record in records {
            if index.done.insert((record.tracker_id, record.date)) {
                *index.days_per_tracker.entry(record.tracker_id).or_default() += 1;
            }
        }
        index
    }

    pub fn is_completed(&self, tracker_id: i64, date: NaiveDate) -> bool {
        self.done.contains(&(tracker_id, date))
    }

    /// Number of distinct days the tracker was completed on.
    pub fn completed_days(&self, tracker_id: i64) -> usize {
        self.days_per_tracker.get(&tracker_id).copied().unwrap_or(0)
    }
}
