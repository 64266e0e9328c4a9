// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod filter;
pub mod grouping;
pub mod statistics;
pub mod weekday;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub use filter::{CompletionIndex, FilterMode, filter_trackers};
pub use grouping::{Section, group_into_sections};
pub use statistics::{Statistics, compute_statistics};
pub use weekday::{InvalidWeekDay, Schedule, WeekDay, weekday_of};

/// Title of the display section holding pinned trackers. User categories may
/// not take this title.
pub const PINNED_SECTION_TITLE: &str = "Pinned";

/// Title of the display section holding trackers without a category.
pub const UNCATEGORIZED_SECTION_TITLE: &str = "Uncategorized";

/// Longest tracker name accepted, in characters.
pub const MAX_TRACKER_NAME_LEN: usize = 38;

/// Whether a tracker is a recurring habit or a one-off irregular event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TrackerKind {
    #[default]
    Habit,
    IrregularEvent,
}

/// A habit or irregular event being tracked.
///
/// Irregular events carry the full weekday set as their schedule, which is
/// how they are persisted; `kind` is what tells them apart from a habit that
/// happens to be due every day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tracker {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub emoji: String,
    pub schedule: Schedule,
    pub kind: TrackerKind,
    pub category_id: Option<i64>,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
}

/// A named grouping of trackers. Identity is `id`; `title` is only shown.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One completion of a tracker on one calendar day.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::FromRow)]
pub struct TrackerRecord {
    pub tracker_id: i64,
    // Day granularity only, so two marks on the same day can never differ.
    #[sqlx(rename = "record_date")]
    pub date: NaiveDate,
}

impl TrackerRecord {
    pub fn new(tracker_id: i64, date: NaiveDate) -> Self {
        Self { tracker_id, date }
    }
}

/// Truncates a timestamp to the calendar day it falls on in its own offset.
pub fn day_of<Tz: TimeZone>(moment: &DateTime<Tz>) -> NaiveDate {
    moment.date_naive()
}

/// A day as sent by a client: either a plain `YYYY-MM-DD` date or a full
/// RFC 3339 timestamp, which is truncated to its local calendar day.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum DayInput {
    Day(NaiveDate),
    Moment(DateTime<FixedOffset>),
}

impl DayInput {
    pub fn day(&self) -> NaiveDate {
        match self {
            DayInput::Day(day) => *day,
            DayInput::Moment(moment) => day_of(moment),
        }
    }
}

/// Structure used to receive tracker creation data from the API.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateTrackerPayload {
    pub name: String,
    pub emoji: String,
    // Assigned from the palette when absent.
    pub color: Option<String>,
    #[serde(default)]
    pub kind: TrackerKind,
    #[serde(default)]
    pub schedule: Schedule,
    pub category_id: Option<i64>,
}

/// Structure used to receive tracker edits. A missing color or kind keeps
/// the current one.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateTrackerPayload {
    pub name: String,
    pub emoji: String,
    pub color: Option<String>,
    pub kind: Option<TrackerKind>,
    #[serde(default)]
    pub schedule: Schedule,
    pub category_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct PinPayload {
    pub pinned: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CategoryPayload {
    pub title: String,
}

/// Marks or unmarks one tracker on one day.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct RecordPayload {
    pub tracker_id: i64,
    pub date: DayInput,
}

/// Query parameters for listing trackers.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TrackerQuery {
    // Defaults to today on the server side.
    pub date: Option<NaiveDate>,
    pub filter: Option<FilterMode>,
    pub search: Option<String>,
}

/// A tracker as shown for one selected day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackerView {
    #[serde(flatten)]
    pub tracker: Tracker,
    pub completed: bool,
    pub completed_days: usize,
}

impl AsRef<Tracker> for TrackerView {
    fn as_ref(&self) -> &Tracker {
        &self.tracker
    }
}

impl AsRef<Tracker> for Tracker {
    fn as_ref(&self) -> &Tracker {
        self
    }
}
