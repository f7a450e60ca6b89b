//! Clinic locations and their weekly open/close schedules

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open/close pair; both set, or the day is closed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DayHours {
    pub open: Option<NaiveTime>,
    pub close: Option<NaiveTime>,
}

impl DayHours {
    /// Scheduled hours for this day (0.0 when closed or misconfigured)
    pub fn scheduled_hours(&self) -> f64 {
        match (self.open, self.close) {
            (Some(open), Some(close)) if close > open => {
                (close - open).num_minutes() as f64 / 60.0
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub location_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub timezone: String,
    /// Monday-first, seven entries
    pub schedule: [DayHours; 7],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    /// Total scheduled open hours across the week
    pub fn weekly_open_hours(&self) -> f64 {
        self.schedule.iter().map(DayHours::scheduled_hours).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLocation {
    /// Required for superusers; overwritten for tenant admins
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub schedule: [DayHours; 7],
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationUpdate {
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub schedule: [DayHours; 7],
}

/// Timings-only partial update; `None` leaves a day untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationTimingsUpdate {
    pub timezone: Option<String>,
    pub schedule: [Option<DayHours>; 7],
}

impl LocationTimingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.timezone.is_none() && self.schedule.iter().all(Option::is_none)
    }
}

/// Location enriched with patient counts and the derived remaining-hours
/// figure for the current week
#[derive(Debug, Clone, Serialize)]
pub struct LocationStats {
    #[serde(flatten)]
    pub location: Location,
    pub total_patients: i64,
    pub assigned_patients: i64,
    pub pending_patients: i64,
    pub weekly_hours_remaining: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours(open: &str, close: &str) -> DayHours {
        DayHours {
            open: Some(open.parse().unwrap()),
            close: Some(close.parse().unwrap()),
        }
    }

    #[test]
    fn test_weekly_open_hours_sums_open_days() {
        let mut schedule = [DayHours::default(); 7];
        schedule[0] = hours("09:00:00", "17:00:00"); // 8h
        schedule[2] = hours("09:00:00", "12:30:00"); // 3.5h

        let location = Location {
            location_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Main".into(),
            timezone: "America/New_York".into(),
            schedule,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!((location.weekly_open_hours() - 11.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_closed_day_contributes_zero() {
        assert_eq!(DayHours::default().scheduled_hours(), 0.0);
        // close before open is treated as closed
        let backwards = DayHours {
            open: Some("17:00:00".parse().unwrap()),
            close: Some("09:00:00".parse().unwrap()),
        };
        assert_eq!(backwards.scheduled_hours(), 0.0);
    }
}
