use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Assignment, Submission};

// Thresholds are institutional policy, not mechanism. Retune them here
// without touching the algorithm.

/// No counted submission for this many days (or ever) marks a student at
/// risk.
pub const AT_RISK_INACTIVITY_DAYS: i64 = 30;
/// Inactivity in [SILENT_INACTIVITY_DAYS, AT_RISK_INACTIVITY_DAYS) marks a
/// student silent.
pub const SILENT_INACTIVITY_DAYS: i64 = 15;
/// The chronic-missed rule only applies once a course load has at least this
/// many passed due-date assignments.
pub const CHRONIC_MIN_PASSED: usize = 4;
/// Missing at least this many assignments due within the lookback window
/// marks a student silent regardless of recency.
pub const CHRONIC_MISSED_THRESHOLD: usize = 4;
/// Lookback window for the chronic-missed rule.
pub const CHRONIC_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcademicStatus {
    Active,
    Silent,
    AtRisk,
    NotApplicable,
}

#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub status: AcademicStatus,
    /// Days since the last turned-in/returned submission. `None` means no
    /// counted submission exists at all.
    pub days_inactive: Option<i64>,
    /// Passed due-date assignments with no counted submission.
    pub missed_count: usize,
}

/// Classify one student against a slice of assignments and their submissions.
///
/// Scope is the caller's choice: pass one course's assignments and the
/// student's submissions in that course for a per-course answer, or
/// everything across the institute for the institute-wide answer. Priority is
/// strict: NOT_APPLICABLE, then AT_RISK, then SILENT, then ACTIVE.
pub fn classify(
    student_id: &str,
    assignments: &[&Assignment],
    submissions: &[&Submission],
    now: DateTime<Utc>,
) -> Classification {
    // No due-date assignments means no expectations to fail to meet. This
    // must come before any inactivity math: a student with nothing due looks
    // identical to one who never submitted.
    let with_due: Vec<&Assignment> =
        assignments.iter().copied().filter(|a| a.has_due_date()).collect();
    if with_due.is_empty() {
        return Classification {
            status: AcademicStatus::NotApplicable,
            days_inactive: None,
            missed_count: 0,
        };
    }

    let counted: Vec<&Submission> = submissions
        .iter()
        .copied()
        .filter(|s| s.user_id == student_id && s.state.counts_as_submitted())
        .collect();

    let last_activity = counted.iter().filter_map(|s| submission_instant(s)).max();
    let days_inactive = last_activity.map(|t| (now - t).num_days());

    let passed: Vec<&Assignment> = with_due
        .iter()
        .copied()
        .filter(|a| a.due_instant().is_some_and(|due| due < now))
        .collect();

    // Coursework ids are only unique within a course, so submissions match
    // assignments on the (course, coursework) pair.
    let submitted_work: Vec<(&str, &str)> = counted
        .iter()
        .map(|s| (s.course_id.as_str(), s.course_work_id.as_str()))
        .collect();
    let missed_count = passed
        .iter()
        .filter(|a| !submitted_work.contains(&(a.course_id.as_str(), a.id.as_str())))
        .count();

    if counted.is_empty() || days_inactive.is_some_and(|d| d >= AT_RISK_INACTIVITY_DAYS) {
        return Classification {
            status: AcademicStatus::AtRisk,
            days_inactive,
            missed_count,
        };
    }

    let silent_by_inactivity = days_inactive
        .is_some_and(|d| d >= SILENT_INACTIVITY_DAYS && d < AT_RISK_INACTIVITY_DAYS);

    let window_start = now - Duration::days(CHRONIC_LOOKBACK_DAYS);
    let missed_in_window = passed
        .iter()
        .filter(|a| a.due_instant().is_some_and(|due| due >= window_start))
        .filter(|a| !submitted_work.contains(&(a.course_id.as_str(), a.id.as_str())))
        .count();
    let chronic_missed =
        passed.len() >= CHRONIC_MIN_PASSED && missed_in_window >= CHRONIC_MISSED_THRESHOLD;

    let status = if silent_by_inactivity || chronic_missed {
        AcademicStatus::Silent
    } else {
        AcademicStatus::Active
    };

    Classification { status, days_inactive, missed_count }
}

/// Timestamp of a submission for recency purposes: the latest state change,
/// falling back to creation.
pub fn submission_instant(submission: &Submission) -> Option<DateTime<Utc>> {
    submission
        .update_time
        .as_deref()
        .or(submission.creation_time.as_deref())
        .and_then(parse_timestamp)
}

/// Parse an RFC3339 timestamp into UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
