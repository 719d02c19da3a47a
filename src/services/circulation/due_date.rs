//! Due date and request expiry computation

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::{
    error::{CirculationError, CirculationResult},
    services::calendar::{Calendar, MAX_LOOKAHEAD_DAYS},
};

fn no_opening_hours(library_id: i32) -> CirculationError {
    CirculationError::Configuration(format!(
        "Library {} has no opening hours within {} days",
        library_id, MAX_LOOKAHEAD_DAYS
    ))
}

fn local_to_utc(tz: FixedOffset, local: NaiveDateTime) -> CirculationResult<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .single()
        .map(|d| d.with_timezone(&Utc))
        .ok_or_else(|| CirculationError::Internal(format!("Ambiguous local time {}", local)))
}

/// Due date of a loan period of `duration_days` starting at `from`.
///
/// The end falls at closing time of an open day, never before
/// `from + duration_days`. A zero duration ends at closing time of the day
/// the library is (or next) open.
pub fn end_date(
    calendar: &dyn Calendar,
    library_id: i32,
    from: DateTime<Utc>,
    duration_days: i64,
) -> CirculationResult<DateTime<Utc>> {
    let tz = calendar.timezone(library_id);

    if duration_days <= 0 {
        let start = if calendar.is_open(library_id, from) {
            from
        } else {
            calendar
                .next_open(library_id, from)
                .ok_or_else(|| no_opening_hours(library_id))?
        };
        let day = start.with_timezone(&tz).date_naive();
        let close = calendar
            .closing_time(library_id, day)
            .ok_or_else(|| no_opening_hours(library_id))?;
        return local_to_utc(tz, day.and_time(close));
    }

    let target = from + Duration::days(duration_days);
    let first_day = target.with_timezone(&tz).date_naive();
    for offset in 0..=MAX_LOOKAHEAD_DAYS {
        let Some(day) = first_day.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(close) = calendar.closing_time(library_id, day) {
            let end = local_to_utc(tz, day.and_time(close))?;
            if end >= target {
                return Ok(end);
            }
        }
    }
    Err(no_opening_hours(library_id))
}

/// Last instant a patron may collect a request: 23:59:59 local time,
/// `window_days` after `from`, in the pickup library timezone
pub fn request_expire_date(
    calendar: &dyn Calendar,
    library_id: i32,
    from: DateTime<Utc>,
    window_days: u32,
) -> CirculationResult<DateTime<FixedOffset>> {
    let tz = calendar.timezone(library_id);
    let day = from
        .with_timezone(&tz)
        .date_naive()
        .checked_add_days(Days::new(window_days as u64))
        .ok_or_else(|| CirculationError::Validation("Request window out of range".to_string()))?;
    let last_second = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| CirculationError::Internal("Invalid end of day".to_string()))?;
    tz.from_local_datetime(&day.and_time(last_second))
        .single()
        .ok_or_else(|| CirculationError::Internal(format!("Ambiguous local date {}", day)))
}
