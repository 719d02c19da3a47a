//! Library calendar: timezone, opening hours, closures

use std::collections::HashMap;

use chrono::{
    DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};

use crate::models::schedule::{LibrarySchedule, ScheduleSlot};

/// How far ahead the calendar searches for an open day
pub const MAX_LOOKAHEAD_DAYS: u64 = 366;

/// Opening-hours service consulted for due dates and request expiry
pub trait Calendar: Send + Sync {
    /// Library timezone
    fn timezone(&self, library_id: i32) -> FixedOffset;

    fn is_open(&self, library_id: i32, at: DateTime<Utc>) -> bool;

    /// First instant at or after `from` when the library is open
    fn next_open(&self, library_id: i32, from: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Closing time on a local day, `None` when closed all day
    fn closing_time(&self, library_id: i32, day: NaiveDate) -> Option<NaiveTime>;
}

/// Calendar built from weekly slots and closure days.
///
/// Libraries without a schedule are treated as open around the clock in UTC.
#[derive(Debug, Clone, Default)]
pub struct ScheduleCalendar {
    schedules: HashMap<i32, LibrarySchedule>,
}

impl ScheduleCalendar {
    pub fn new(schedules: Vec<LibrarySchedule>) -> Self {
        Self {
            schedules: schedules.into_iter().map(|s| (s.library_id, s)).collect(),
        }
    }

    fn slots_on(&self, schedule: &LibrarySchedule, day: NaiveDate) -> Vec<ScheduleSlot> {
        if schedule.closures.iter().any(|c| c.closure_date == day) {
            return Vec::new();
        }
        let weekday = day.weekday().num_days_from_monday() as i16;
        let mut slots: Vec<ScheduleSlot> = schedule
            .slots
            .iter()
            .filter(|s| s.day_of_week == weekday)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.open_time);
        slots
    }

    fn to_utc(tz: FixedOffset, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        tz.from_local_datetime(&local)
            .single()
            .map(|d| d.with_timezone(&Utc))
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

impl Calendar for ScheduleCalendar {
    fn timezone(&self, library_id: i32) -> FixedOffset {
        self.schedules
            .get(&library_id)
            .and_then(|s| FixedOffset::east_opt(s.utc_offset_minutes * 60))
            .unwrap_or_else(|| Utc.fix())
    }

    fn is_open(&self, library_id: i32, at: DateTime<Utc>) -> bool {
        let Some(schedule) = self.schedules.get(&library_id) else {
            return true;
        };
        let local = at.with_timezone(&self.timezone(library_id));
        let time = local.time();
        self.slots_on(schedule, local.date_naive())
            .iter()
            .any(|s| s.open_time <= time && time < s.close_time)
    }

    fn next_open(&self, library_id: i32, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let Some(schedule) = self.schedules.get(&library_id) else {
            return Some(from);
        };
        let tz = self.timezone(library_id);
        let local = from.with_timezone(&tz);
        let today = local.date_naive();

        for offset in 0..=MAX_LOOKAHEAD_DAYS {
            let day = today.checked_add_days(Days::new(offset))?;
            for slot in self.slots_on(schedule, day) {
                if offset == 0 {
                    if local.time() < slot.close_time {
                        if slot.open_time <= local.time() {
                            return Some(from);
                        }
                        return Self::to_utc(tz, day.and_time(slot.open_time));
                    }
                } else {
                    return Self::to_utc(tz, day.and_time(slot.open_time));
                }
            }
        }
        None
    }

    fn closing_time(&self, library_id: i32, day: NaiveDate) -> Option<NaiveTime> {
        match self.schedules.get(&library_id) {
            Some(schedule) => self
                .slots_on(schedule, day)
                .iter()
                .map(|s| s.close_time)
                .max(),
            None => Some(end_of_day()),
        }
    }
}
