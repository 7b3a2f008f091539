use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Uniqueness is (user_id, course_id), never (email, course_id): the source
// may return the same redacted "no-email-*" address for distinct teachers.

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeacherAssignment {
    pub user_id: String,
    pub course_id: String,
    pub full_name: String,
    pub email_address: String,
    pub synced_by: String,
    pub synced_at: String,
}
