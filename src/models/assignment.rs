use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Policy constant: when the source omits a due time-of-day, the assignment is
/// treated as due at the end of the day, UTC.
pub const DEFAULT_DUE_HOUR: u32 = 23;
pub const DEFAULT_DUE_MINUTE: u32 = 59;
pub const DEFAULT_DUE_SECOND: u32 = 59;

// NOTE: coursework ids are only unique within a course in the source system;
// the natural key is (course_id, id).

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub due_year: Option<i64>,
    pub due_month: Option<i64>,
    pub due_day: Option<i64>,
    pub due_hours: Option<i64>,
    pub due_minutes: Option<i64>,
    pub creation_time: Option<String>,
    pub submission_count: i64,
    pub course_name: Option<String>,
    pub synced_by: String,
    pub synced_at: String,
}

impl Assignment {
    /// The due instant in UTC, or `None` if the source gave no usable due
    /// date. A partial date (missing year, month, or day) counts as no due
    /// date rather than an error.
    pub fn due_instant(&self) -> Option<DateTime<Utc>> {
        let (year, month, day) = (self.due_year?, self.due_month?, self.due_day?);
        let hours = self.due_hours.unwrap_or(DEFAULT_DUE_HOUR as i64);
        let minutes = self.due_minutes.unwrap_or(DEFAULT_DUE_MINUTE as i64);
        Utc.with_ymd_and_hms(
            year as i32,
            month as u32,
            day as u32,
            hours as u32,
            minutes as u32,
            DEFAULT_DUE_SECOND,
        )
        .single()
    }

    pub fn has_due_date(&self) -> bool {
        self.due_instant().is_some()
    }
}
