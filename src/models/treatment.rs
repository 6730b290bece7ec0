//! Treatment and daily checklist models.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Unit a dose is measured in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoseUnit {
    Ml,
    Mg,
    Mcg,
    Drops,
    Pills,
}

impl DoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnit::Ml => "ml",
            DoseUnit::Mg => "mg",
            DoseUnit::Mcg => "mcg",
            DoseUnit::Drops => "drops",
            DoseUnit::Pills => "pills",
        }
    }
}

/// Amount of a treatment taken per application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dose {
    pub amount: f64,
    pub unit: DoseUnit,
}

impl std::fmt::Display for Dose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.unit.as_str())
    }
}

/// How often a treatment is scheduled. Only daily for now.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
}

/// A user-defined treatment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub id: String,
    pub name: String,
    /// Scheduled time of day, `HH:MM`
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<Dose>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<bool>,
}

/// Request body for adding a treatment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTreatment {
    pub name: String,
    pub time: String,
    #[serde(default)]
    pub dose: Option<Dose>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub days: Option<Vec<String>>,
    #[serde(default)]
    pub reminder: Option<bool>,
}

impl NewTreatment {
    /// A daily treatment with only name and time set.
    pub fn daily(name: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: time.into(),
            dose: None,
            frequency: Frequency::Daily,
            days: None,
            reminder: None,
        }
    }

    /// Attach a dose.
    pub fn with_dose(mut self, amount: f64, unit: DoseUnit) -> Self {
        self.dose = Some(Dose { amount, unit });
        self
    }
}

/// One row of the daily checklist, derived from a treatment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodayItem {
    pub id: String,
    pub done: bool,
    pub time: String,
}

/// Read-only view of the treatment store.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentSnapshot {
    pub treatments: Vec<Treatment>,
    pub today: Vec<TodayItem>,
    pub streak_days: u32,
    pub streak_marked_for: Option<NaiveDate>,
}

/// Completion of today's checklist.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodayProgress {
    pub done: usize,
    pub total: usize,
    /// Rounded percentage, 0 when there is nothing scheduled
    pub adherence_pct: u8,
}

impl TodayProgress {
    pub fn from_items(items: &[TodayItem]) -> Self {
        let total = items.len();
        let done = items.iter().filter(|item| item.done).count();
        let adherence_pct = if total == 0 {
            0
        } else {
            ((done as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            done,
            total,
            adherence_pct,
        }
    }
}

/// Parse an `HH:MM` time of day.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    if raw.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dose_display() {
        let dose = Dose {
            amount: 1.0,
            unit: DoseUnit::Ml,
        };
        assert_eq!(dose.to_string(), "1 ml");

        let dose = Dose {
            amount: 2.5,
            unit: DoseUnit::Mg,
        };
        assert_eq!(dose.to_string(), "2.5 mg");
    }

    #[test]
    fn test_parse_time_of_day() {
        assert!(parse_time_of_day("08:00").is_some());
        assert!(parse_time_of_day("23:59").is_some());
        assert!(parse_time_of_day("24:00").is_none());
        assert!(parse_time_of_day("8:00").is_none());
        assert!(parse_time_of_day("morning").is_none());
    }

    #[test]
    fn test_today_progress() {
        let items = vec![
            TodayItem {
                id: "a".into(),
                done: true,
                time: "08:00".into(),
            },
            TodayItem {
                id: "b".into(),
                done: false,
                time: "21:00".into(),
            },
            TodayItem {
                id: "c".into(),
                done: false,
                time: "22:00".into(),
            },
        ];
        let progress = TodayProgress::from_items(&items);
        assert_eq!(progress.done, 1);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.adherence_pct, 33);

        assert_eq!(TodayProgress::from_items(&[]).adherence_pct, 0);
    }

    #[test]
    fn test_treatment_wire_shape() {
        let json = serde_json::json!({
            "id": "Minoxidil-08:00-1",
            "name": "Minoxidil",
            "time": "08:00",
            "dose": { "amount": 1, "unit": "ml" },
            "frequency": "daily"
        });
        let treatment: Treatment = serde_json::from_value(json).unwrap();
        assert_eq!(treatment.dose.unwrap().unit, DoseUnit::Ml);
        assert_eq!(treatment.frequency, Frequency::Daily);
        assert!(treatment.reminder.is_none());
    }
}
