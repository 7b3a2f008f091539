use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// NOTE: `user_id` is the primary student identifier (Google User ID, NOT
// email). State transitions are owned by the external source; we only mirror
// the latest observed state.

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: String,
    pub course_id: String,
    pub course_work_id: String,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub state: SubmissionState,
    pub late: bool,
    pub creation_time: Option<String>,
    pub update_time: Option<String>,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub course_name: Option<String>,
    pub assignment_title: Option<String>,
    pub synced_by: String,
    pub synced_at: String,
}

/// Submission state as reported by the external source, with an escape hatch
/// for values the source may add in the future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SubmissionState {
    New,
    Created,
    TurnedIn,
    Returned,
    ReclaimedByStudent,
    Other(String),
}

impl SubmissionState {
    pub fn as_str(&self) -> &str {
        match self {
            SubmissionState::New => "NEW",
            SubmissionState::Created => "CREATED",
            SubmissionState::TurnedIn => "TURNED_IN",
            SubmissionState::Returned => "RETURNED",
            SubmissionState::ReclaimedByStudent => "RECLAIMED_BY_STUDENT",
            SubmissionState::Other(s) => s.as_str(),
        }
    }

    /// Only turned-in and returned submissions count toward denormalized
    /// submission totals and classification activity.
    pub fn counts_as_submitted(&self) -> bool {
        matches!(self, SubmissionState::TurnedIn | SubmissionState::Returned)
    }
}

impl From<String> for SubmissionState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NEW" => SubmissionState::New,
            "CREATED" => SubmissionState::Created,
            "TURNED_IN" => SubmissionState::TurnedIn,
            "RETURNED" => SubmissionState::Returned,
            "RECLAIMED_BY_STUDENT" => SubmissionState::ReclaimedByStudent,
            _ => SubmissionState::Other(s),
        }
    }
}

impl From<SubmissionState> for String {
    fn from(state: SubmissionState) -> Self {
        state.as_str().to_string()
    }
}
