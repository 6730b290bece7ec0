//! Progress photo and weekly check-in models.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A progress photo attached to a date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPhoto {
    pub id: String,
    /// Image reference returned by the picker
    pub uri: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Request body for adding a photo.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhoto {
    pub uri: String,
    /// Defaults to today when omitted
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

/// ISO year-week label, rendered `YYYY-WW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekLabel {
    year: i32,
    week: u32,
}

impl WeekLabel {
    /// The ISO week a date falls in.
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }
}

impl fmt::Display for WeekLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.week)
    }
}

impl FromStr for WeekLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid week label '{}', expected YYYY-WW", s);
        let (year, week) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || week.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        // Rejects week 53 in years that only have 52.
        NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon).ok_or_else(invalid)?;
        Ok(Self { year, week })
    }
}

impl Serialize for WeekLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Answers of the weekly symptom checklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckAnswers {
    #[serde(default)]
    pub shedding: bool,
    #[serde(default)]
    pub itch: bool,
    #[serde(default)]
    pub redness: bool,
    #[serde(default)]
    pub dizziness: bool,
    #[serde(default)]
    pub libido_changes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_note: Option<String>,
}

/// One weekly check-in. At most one exists per week label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCheck {
    pub id: String,
    pub week_of: WeekLabel,
    pub answers: CheckAnswers,
}

/// Request body for the weekly check upsert.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCheckRequest {
    /// Defaults to the current ISO week when omitted
    #[serde(default)]
    pub week_of: Option<WeekLabel>,
    pub answers: CheckAnswers,
}

/// Read-only view of the progress store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub photos: Vec<ProgressPhoto>,
    pub checks: Vec<WeeklyCheck>,
}

/// Headline numbers shown on the progress screen.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMetrics {
    pub streak_days: u32,
    pub done_today: usize,
    pub total_today: usize,
    pub adherence_pct: u8,
    pub photo_count: usize,
    pub checked_in_this_week: bool,
}
