use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::classroom::{ClassroomClient, ClassroomClientFactory, dto};
use crate::db::repository;
use crate::error::AppError;
use crate::models::{Assignment, Course, CourseState, Submission, SubmissionState, TeacherAssignment, User};
use crate::services::cache::TtlCache;
use crate::services::{denormalize, identity};

/// Drives one full import cycle: per-account course listing, roster merge,
/// feature-flagged coursework/submission sync, then denormalization and cache
/// invalidation.
pub struct SyncService {
    db: SqlitePool,
    classroom: Arc<dyn ClassroomClientFactory>,
    cache: Arc<TtlCache>,
    accounts: Vec<String>,
    enable_assignments: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct SyncStats {
    pub courses_updated: usize,
    pub assignments_updated: usize,
    pub submissions_updated: usize,
    pub users_processed: usize,
    pub users_errors: usize,
    pub courses_errors: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub stats: SyncStats,
}

impl SyncService {
    pub fn new(
        db: SqlitePool,
        classroom: Arc<dyn ClassroomClientFactory>,
        cache: Arc<TtlCache>,
        accounts: Vec<String>,
        enable_assignments: bool,
    ) -> Self {
        Self { db, classroom, cache, accounts, enable_assignments }
    }

    /// Full institute sync. Import-once by design: if any course rows exist
    /// the run is a no-op, checked a single time per invocation. Use
    /// [`reset_and_sync`](Self::reset_and_sync) after a deliberate wipe.
    pub async fn run_sync(&self) -> Result<SyncReport, AppError> {
        let existing = repository::count_courses(&self.db).await?;
        if existing > 0 {
            info!("sync skipped: {} courses already present", existing);
            return Ok(SyncReport {
                success: true,
                message: "Data already exists, sync skipped.".to_string(),
                stats: SyncStats::default(),
            });
        }
        self.sync_all_accounts().await
    }

    /// Same algorithm as [`run_sync`](Self::run_sync) with the idempotency
    /// guard bypassed. Every write is still an upsert, so re-running against
    /// an unchanged source produces no duplicates and no drift.
    pub async fn reset_and_sync(&self) -> Result<SyncReport, AppError> {
        self.sync_all_accounts().await
    }

    async fn sync_all_accounts(&self) -> Result<SyncReport, AppError> {
        if self.accounts.is_empty() {
            return Err(AppError::Config(
                "no sync accounts configured (SYNC_ACCOUNTS / GOOGLE_IMPERSONATED_USER)".to_string(),
            ));
        }

        info!("starting sync for {} accounts", self.accounts.len());
        // Uniform timestamp for the whole cycle.
        let synced_at = Utc::now().to_rfc3339();
        let mut stats = SyncStats::default();

        // Accounts are processed serially: API quota and the impersonation
        // context make per-account concurrency a liability, not a win.
        for account in &self.accounts {
            info!("impersonating {}", account);
            // A factory failure means bad configuration or the wrong kind of
            // credential; that aborts the whole run before further writes.
            let client = self.classroom.client_for(account)?;

            match self.sync_account(client.as_ref(), account, &synced_at, &mut stats).await {
                Ok(()) => stats.users_processed += 1,
                Err(e) => {
                    error!("account {} failed: {}", account, e);
                    stats.users_errors += 1;
                }
            }
        }

        info!(
            "sync complete: {} courses, {} assignments, {} submissions ({} course errors, {} account errors)",
            stats.courses_updated,
            stats.assignments_updated,
            stats.submissions_updated,
            stats.courses_errors,
            stats.users_errors
        );

        // All sync writes are done; recompute derived fields exactly once,
        // then drop any cached reads built on the old data.
        denormalize::recompute_all(&self.db).await;
        self.cache.invalidate_all();

        Ok(SyncReport {
            success: true,
            message: format!(
                "Synced {} courses, {} assignments, {} submissions",
                stats.courses_updated, stats.assignments_updated, stats.submissions_updated
            ),
            stats,
        })
    }

    async fn sync_account(
        &self,
        client: &dyn ClassroomClient,
        account: &str,
        synced_at: &str,
        stats: &mut SyncStats,
    ) -> Result<(), AppError> {
        let courses = client.list_courses().await?;
        info!("courses fetched for {}: {}", account, courses.len());

        for course in &courses {
            // One course failing must not abort its siblings.
            match self.sync_course(client, course, account, synced_at, stats).await {
                Ok(()) => stats.courses_updated += 1,
                Err(e) => {
                    error!("failed to process course {} for {}: {}", course.id, account, e);
                    stats.courses_errors += 1;
                }
            }
        }
        Ok(())
    }

    async fn sync_course(
        &self,
        client: &dyn ClassroomClient,
        course: &dto::Course,
        account: &str,
        synced_at: &str,
        stats: &mut SyncStats,
    ) -> Result<(), AppError> {
        // The two roster reads are independent; issue them together. A failed
        // roster fetch degrades to an empty roster for this pass and the
        // course still gets persisted.
        let (teachers_res, students_res) =
            tokio::join!(client.list_teachers(&course.id), client.list_students(&course.id));

        let roster_teachers = teachers_res.unwrap_or_else(|e| {
            warn!("failed to fetch teachers for {}: {}", course.id, e);
            Vec::new()
        });
        let roster_students = students_res.unwrap_or_else(|e| {
            warn!("failed to fetch students for {}: {}", course.id, e);
            Vec::new()
        });

        let mut teacher_ids = Vec::new();
        for t in &roster_teachers {
            let email = t
                .profile
                .email_address
                .clone()
                .unwrap_or_else(|| User::sentinel_email(&t.user_id));
            let full_name = t
                .profile
                .name
                .as_ref()
                .and_then(|n| n.full_name.clone())
                .unwrap_or_else(|| "Unknown Teacher".to_string());
            repository::upsert_teacher_assignment(
                &self.db,
                &TeacherAssignment {
                    user_id: t.user_id.clone(),
                    course_id: course.id.clone(),
                    full_name,
                    email_address: email,
                    synced_by: account.to_string(),
                    synced_at: synced_at.to_string(),
                },
            )
            .await?;
            identity::resolve_or_create(&self.db, &t.profile, "teacher").await?;
            push_unique(&mut teacher_ids, &t.user_id);
        }

        let mut student_ids = Vec::new();
        for s in &roster_students {
            identity::resolve_or_create(&self.db, &s.profile, "student").await?;
            push_unique(&mut student_ids, &s.user_id);
        }

        // Cross-account roster merge: a course visible to two impersonated
        // accounts keeps the union of both views, never whichever synced last.
        if let Some(existing) = repository::find_course_by_id(&self.db, &course.id).await? {
            student_ids = merge_ids(&existing.students, &student_ids);
            teacher_ids = merge_ids(&existing.teachers, &teacher_ids);
        }

        let state = course
            .course_state
            .clone()
            .map(CourseState::from)
            .unwrap_or(CourseState::Other("COURSE_STATE_UNSPECIFIED".to_string()));

        repository::upsert_course(
            &self.db,
            &Course {
                id: course.id.clone(),
                name: course.name.clone(),
                section: course.section.clone(),
                owner_id: course.owner_id.clone(),
                course_state: state,
                teachers: teacher_ids,
                students: student_ids,
                teacher_count: 0,
                student_count: 0,
                assignment_count: 0,
                synced_by: account.to_string(),
                synced_at: synced_at.to_string(),
            },
        )
        .await?;

        if self.enable_assignments {
            self.sync_coursework(client, course, account, synced_at, stats).await;
        }

        Ok(())
    }

    /// Coursework and submission failures are logged and skipped; they never
    /// abort the course or the run.
    async fn sync_coursework(
        &self,
        client: &dyn ClassroomClient,
        course: &dto::Course,
        account: &str,
        synced_at: &str,
        stats: &mut SyncStats,
    ) {
        let coursework = match client.list_coursework(&course.id).await {
            Ok(work) => work,
            Err(e) => {
                warn!("failed coursework for course {}: {}", course.id, e);
                return;
            }
        };

        for work in &coursework {
            let assignment = Assignment {
                id: work.id.clone(),
                course_id: course.id.clone(),
                title: work.title.clone(),
                due_year: work.due_date.as_ref().and_then(|d| d.year),
                due_month: work.due_date.as_ref().and_then(|d| d.month),
                due_day: work.due_date.as_ref().and_then(|d| d.day),
                due_hours: work.due_time.as_ref().and_then(|t| t.hours),
                due_minutes: work.due_time.as_ref().and_then(|t| t.minutes),
                creation_time: work.creation_time.clone(),
                submission_count: 0,
                course_name: Some(course.name.clone()),
                synced_by: account.to_string(),
                synced_at: synced_at.to_string(),
            };
            if let Err(e) = repository::upsert_assignment(&self.db, &assignment).await {
                warn!("failed to upsert assignment {} in {}: {}", work.id, course.id, e);
                continue;
            }
            stats.assignments_updated += 1;

            let submissions = match client.list_submissions(&course.id, &work.id).await {
                Ok(subs) => subs,
                Err(e) => {
                    warn!("failed submissions for assignment {} in {}: {}", work.id, course.id, e);
                    continue;
                }
            };

            for sub in &submissions {
                let submission = Submission {
                    id: sub.id.clone(),
                    course_id: course.id.clone(),
                    course_work_id: work.id.clone(),
                    user_id: sub.user_id.clone(),
                    state: sub
                        .state
                        .clone()
                        .map(SubmissionState::from)
                        .unwrap_or(SubmissionState::New),
                    late: sub.late.unwrap_or(false),
                    creation_time: sub.creation_time.clone(),
                    update_time: sub.update_time.clone(),
                    student_name: None,
                    student_email: None,
                    course_name: None,
                    assignment_title: None,
                    synced_by: account.to_string(),
                    synced_at: synced_at.to_string(),
                };
                match repository::upsert_submission(&self.db, &submission).await {
                    Ok(()) => stats.submissions_updated += 1,
                    Err(e) => {
                        warn!("failed to upsert submission {} in {}: {}", sub.id, course.id, e)
                    }
                }
            }
        }
    }
}

fn push_unique(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

/// Set union that keeps the previously stored order stable and appends new
/// ids at the end.
fn merge_ids(existing: &[String], current: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for id in current {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    merged
}
