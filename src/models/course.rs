use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// NOTE: `teachers` and `students` hold Google User IDs, NOT emails.
// `synced_by` is the impersonation email used for authorization only.

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    pub owner_id: String,
    #[sqlx(try_from = "String")]
    pub course_state: CourseState,
    #[sqlx(json)]
    pub teachers: Vec<String>,
    #[sqlx(json)]
    pub students: Vec<String>,
    pub teacher_count: i64,
    pub student_count: i64,
    pub assignment_count: i64,
    pub synced_by: String,
    pub synced_at: String,
}

/// Course lifecycle state as reported by the external source. The source is
/// the final authority on the value set, so unrecognized states are carried
/// through rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CourseState {
    Active,
    Archived,
    Provisioned,
    Declined,
    Suspended,
    Other(String),
}

impl CourseState {
    pub fn as_str(&self) -> &str {
        match self {
            CourseState::Active => "ACTIVE",
            CourseState::Archived => "ARCHIVED",
            CourseState::Provisioned => "PROVISIONED",
            CourseState::Declined => "DECLINED",
            CourseState::Suspended => "SUSPENDED",
            CourseState::Other(s) => s.as_str(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, CourseState::Active)
    }
}

impl From<String> for CourseState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ACTIVE" => CourseState::Active,
            "ARCHIVED" => CourseState::Archived,
            "PROVISIONED" => CourseState::Provisioned,
            "DECLINED" => CourseState::Declined,
            "SUSPENDED" => CourseState::Suspended,
            _ => CourseState::Other(s),
        }
    }
}

impl From<CourseState> for String {
    fn from(state: CourseState) -> Self {
        state.as_str().to_string()
    }
}
