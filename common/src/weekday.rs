// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A day of the week, numbered Monday = 1 through Sunday = 7.
///
/// The numbering is the one used in every persisted schedule, so it must not
/// follow whatever convention the underlying calendar happens to use.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum WeekDay {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

/// Raised when an integer outside `1..=7` is used as a weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid weekday number {0}, expected 1 (Monday) to 7 (Sunday)")]
pub struct InvalidWeekDay(pub u8);

impl WeekDay {
    pub const ALL: [WeekDay; 7] = [
        WeekDay::Monday,
        WeekDay::Tuesday,
        WeekDay::Wednesday,
        WeekDay::Thursday,
        WeekDay::Friday,
        WeekDay::Saturday,
        WeekDay::Sunday,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn short_name(self) -> &'static str {
        match self {
            WeekDay::Monday => "Mon",
            WeekDay::Tuesday => "Tue",
            WeekDay::Wednesday => "Wed",
            WeekDay::Thursday => "Thu",
            WeekDay::Friday => "Fri",
            WeekDay::Saturday => "Sat",
            WeekDay::Sunday => "Sun",
        }
    }
}

impl TryFrom<u8> for WeekDay {
    type Error = InvalidWeekDay;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1..=7 => Ok(WeekDay::ALL[usize::from(value - 1)]),
            other => Err(InvalidWeekDay(other)),
        }
    }
}

impl From<WeekDay> for u8 {
    fn from(day: WeekDay) -> Self {
        day.number()
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Returns the weekday of a calendar date.
pub fn weekday_of(date: NaiveDate) -> WeekDay {
    // num_days_from_monday is always in 0..=6
    WeekDay::ALL[date.weekday().num_days_from_monday() as usize]
}

/// The set of weekdays on which a tracker is due.
///
/// Serialized as an ascending array of weekday numbers, e.g. `[1,3]`.
/// An empty schedule is valid and means the tracker is always due.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Schedule(BTreeSet<WeekDay>);

impl Schedule {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn every_day() -> Self {
        WeekDay::ALL.into_iter().collect()
    }

    pub fn contains(&self, day: WeekDay) -> bool {
        self.0.contains(&day)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_every_day(&self) -> bool {
        self.0.len() == WeekDay::ALL.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn days(&self) -> impl Iterator<Item = WeekDay> + '_ {
        self.0.iter().copied()
    }

    /// Encodes the schedule as its persisted JSON array.
    pub fn encode(&self) -> String {
        let numbers: Vec<u8> = self.days().map(WeekDay::number).collect();
        // Serializing a Vec<u8> cannot fail.
        serde_json::to_string(&numbers).unwrap_or_else(|_| "[]".to_string())
    }

    /// Strict decoding of a persisted schedule.
    pub fn try_decode(encoded: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(encoded)
    }

    /// Decodes a persisted schedule, falling back to the empty schedule when
    /// the data is malformed.
    pub fn decode(encoded: &str) -> Self {
        Self::try_decode(encoded).unwrap_or_default()
    }
}

impl FromIterator<WeekDay> for Schedule {
    fn from_iter<I: IntoIterator<Item = WeekDay>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
