use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// `google_id` is the permanent primary key. Records are created lazily on
// first observation from any roster and never overwritten by roster sync, so
// roster data cannot clobber profile fields written at login.

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
    pub role: Option<String>,
    pub source: String,
    pub total_courses: i64,
    pub created_at: String,
}

impl User {
    /// Placeholder email used when the source hides the real address. The
    /// external id is embedded so two redacted users never collide; the value
    /// carries no identity meaning and must never be used as a key.
    pub fn sentinel_email(google_id: &str) -> String {
        format!("no-email-{google_id}@google.com")
    }

    pub fn is_sentinel_email(email: &str) -> bool {
        email.starts_with("no-email-") && email.ends_with("@google.com")
    }
}
