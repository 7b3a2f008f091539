use chrono::Utc;
use sqlx::SqlitePool;

use crate::classroom::dto::UserProfile;
use crate::db::repository;
use crate::error::AppError;
use crate::models::User;

// The external source may hide emails ("no-email-*" addresses or nothing at
// all) depending on domain privacy settings. That is expected behavior, never
// a reason to skip a user, and never an identity signal.

/// Ensure an internal identity record exists for an external profile.
///
/// Lookup is by external id only. An existing record is returned untouched
/// (first-write-wins); a missing external id makes the call a silent no-op so
/// a malformed profile cannot abort the surrounding sync.
pub async fn resolve_or_create(
    db: &SqlitePool,
    profile: &UserProfile,
    role_hint: &str,
) -> Result<(), AppError> {
    if profile.id.is_empty() {
        return Ok(());
    }

    if repository::find_user(db, &profile.id).await?.is_some() {
        return Ok(());
    }

    let name = profile
        .name
        .as_ref()
        .and_then(|n| n.full_name.clone())
        .unwrap_or_else(|| "Unknown User".to_string());
    let email = profile
        .email_address
        .clone()
        .unwrap_or_else(|| User::sentinel_email(&profile.id));

    let user = User {
        google_id: profile.id.clone(),
        name,
        email,
        picture: profile.photo_url.clone(),
        role: Some(role_hint.to_string()),
        source: "classroom".to_string(),
        total_courses: 0,
        created_at: Utc::now().to_rfc3339(),
    };
    repository::insert_user_if_absent(db, &user).await?;
    Ok(())
}
