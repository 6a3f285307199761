use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use serde_json::json;

use crate::error::{AppError, AppResult};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parses "HH:MM" into minutes since midnight. "24:00" is accepted as end of day.
pub fn parse_hhmm(value: &str) -> AppResult<u32> {
    let invalid = || {
        AppError::validation_with_details("invalid time of day", json!({ "value": value }))
    };

    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;

    if hours > 24 || minutes >= 60 {
        return Err(invalid());
    }
    let total = hours * 60 + minutes;
    if total > MINUTES_PER_DAY {
        return Err(invalid());
    }
    Ok(total)
}

pub fn format_hhmm(total_minutes: u32) -> String {
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

/// Absolute instant for `minute_of_day` on `date`; 1440 rolls into the next day.
pub fn at_minute(date: NaiveDate, minute_of_day: u32) -> AppResult<DateTime<Utc>> {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::other("midnight must be representable"))?;
    let base = Utc.from_utc_datetime(&date.and_time(midnight));
    add_minutes(base, minute_of_day as i64)
}

pub fn add_minutes(dt: DateTime<Utc>, minutes: i64) -> AppResult<DateTime<Utc>> {
    Duration::try_minutes(minutes)
        .and_then(|delta| dt.checked_add_signed(delta))
        .ok_or_else(|| AppError::validation("time arithmetic out of range"))
}

pub fn add_days(date: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| AppError::validation("date arithmetic out of range"))
}

pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    end.signed_duration_since(start).num_minutes()
}

/// Strict interval overlap; touching intervals do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

pub fn minute_of_day(dt: DateTime<Utc>) -> u32 {
    dt.hour() * 60 + dt.minute()
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// End of the working day containing `now`, at `hour`:00.
pub fn end_of_day(now: DateTime<Utc>, hour: u32) -> AppResult<DateTime<Utc>> {
    at_minute(now.date_naive(), hour.min(24) * 60)
}

/// Minutes between `now` and the end of day, never negative.
pub fn minutes_until_end_of_day(now: DateTime<Utc>, hour: u32) -> AppResult<i64> {
    Ok(duration_minutes(now, end_of_day(now, hour)?).max(0))
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip_common_times() -> AppResult<()> {
        assert_eq!(parse_hhmm("09:00")?, 540);
        assert_eq!(parse_hhmm(" 17:45 ")?, 1065);
        assert_eq!(parse_hhmm("24:00")?, 1440);
        assert_eq!(format_hhmm(545), "09:05");
        Ok(())
    }

    #[test]
    fn parse_rejects_malformed_values() {
        assert!(parse_hhmm("9").is_err());
        assert!(parse_hhmm("10:75").is_err());
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("ab:cd").is_err());
    }

    #[test]
    fn touching_intervals_do_not_overlap() -> AppResult<()> {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).expect("date");
        let nine = at_minute(date, 540)?;
        let ten = at_minute(date, 600)?;
        let eleven = at_minute(date, 660)?;
        assert!(!overlaps(nine, ten, ten, eleven));
        assert!(overlaps(nine, eleven, ten, eleven));
        Ok(())
    }

    #[test]
    fn minutes_until_end_of_day_floors_at_zero() -> AppResult<()> {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).expect("date");
        assert_eq!(minutes_until_end_of_day(at_minute(date, 17 * 60)?, 18)?, 60);
        assert_eq!(minutes_until_end_of_day(at_minute(date, 19 * 60)?, 18)?, 0);
        assert_eq!(weekday_name(date), "monday");
        Ok(())
    }
}
