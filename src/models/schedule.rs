//! Library opening schedule models (slots, closures)

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ScheduleSlot
// ---------------------------------------------------------------------------

/// A weekly opening slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

// ---------------------------------------------------------------------------
// ScheduleClosure
// ---------------------------------------------------------------------------

/// An exceptional closure day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleClosure {
    pub closure_date: NaiveDate,
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// LibrarySchedule
// ---------------------------------------------------------------------------

/// Opening hours and timezone of one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySchedule {
    pub library_id: i32,
    /// Offset from UTC in minutes (library timezone)
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub slots: Vec<ScheduleSlot>,
    #[serde(default)]
    pub closures: Vec<ScheduleClosure>,
}
