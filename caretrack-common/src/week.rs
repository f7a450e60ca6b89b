//! Week-window helpers for the risk pipeline
//!
//! Weeks start on Monday. Remaining clinic capacity for a week is the
//! scheduled hours not yet elapsed: a fully past week has zero remaining,
//! a future week has the full schedule remaining.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::models::location::DayHours;

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Day after the last day of the week (exclusive end)
pub fn week_end_exclusive(start: NaiveDate) -> NaiveDate {
    start + chrono::Duration::days(7)
}

/// Scheduled clinic hours remaining in the week starting `start`, as of `now`
///
/// Days wholly in the past contribute nothing; the current day contributes
/// the still-open portion; future days contribute their full schedule.
/// Schedule times are treated as wall-clock in UTC; per-location timezone
/// conversion is the dashboard's concern, not the capacity model's.
pub fn remaining_hours_in_week(
    schedule: &[DayHours; 7],
    start: NaiveDate,
    now: DateTime<Utc>,
) -> f64 {
    let today = now.date_naive();
    let mut remaining = 0.0;

    for offset in 0..7 {
        let day = start + chrono::Duration::days(offset);
        let hours = &schedule[day.weekday().num_days_from_monday() as usize];

        if day < today {
            continue;
        }
        if day > today {
            remaining += hours.scheduled_hours();
            continue;
        }

        // Partially elapsed day
        if let (Some(open), Some(close)) = (hours.open, hours.close) {
            if close > open {
                let now_time = now.time();
                let effective_open = if now_time > open { now_time } else { open };
                if close > effective_open {
                    remaining += (close - effective_open).num_minutes() as f64 / 60.0;
                }
            }
        }
    }

    remaining
}

/// Total scheduled hours for one week of the given schedule
pub fn total_hours_in_week(schedule: &[DayHours; 7]) -> f64 {
    schedule.iter().map(DayHours::scheduled_hours).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_9_to_17() -> [DayHours; 7] {
        let mut schedule = [DayHours::default(); 7];
        for day in schedule.iter_mut().take(5) {
            *day = DayHours {
                open: Some("09:00:00".parse().unwrap()),
                close: Some("17:00:00".parse().unwrap()),
            };
        }
        schedule
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2026-08-26 is a Wednesday
        let wednesday = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        assert_eq!(week_start(wednesday), monday);
        assert_eq!(week_start(monday), monday);
    }

    #[test]
    fn test_past_week_has_no_remaining_hours() {
        let schedule = open_9_to_17();
        let start = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
        assert_eq!(remaining_hours_in_week(&schedule, start, now), 0.0);
    }

    #[test]
    fn test_future_week_has_full_schedule_remaining() {
        let schedule = open_9_to_17();
        let start = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
        assert_eq!(remaining_hours_in_week(&schedule, start, now), 40.0);
    }

    #[test]
    fn test_midweek_counts_partial_day_and_future_days() {
        let schedule = open_9_to_17();
        // Wednesday 13:00: 4h left today + Thu/Fri full
        let start = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 26, 13, 0, 0).unwrap();
        assert_eq!(remaining_hours_in_week(&schedule, start, now), 20.0);
    }

    #[test]
    fn test_before_opening_counts_whole_day() {
        let schedule = open_9_to_17();
        let start = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        // Monday 06:00
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 6, 0, 0).unwrap();
        assert_eq!(remaining_hours_in_week(&schedule, start, now), 40.0);
    }
}
