use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;

// Compute once during sync, never during read: counters and display copies
// are recomputed here so the read paths need no joins or aggregations.
//
// Best-effort by design: a failing step is logged and the remaining steps
// still run. The next full sync recomputes everything anyway, so eventual
// consistency of derived fields beats rolling back a finished sync.

/// Recompute every derived field from the store. Invoked after each full
/// sync, and callable standalone for repair.
pub async fn recompute_all(db: &SqlitePool) {
    info!("denormalization starting");

    if let Err(e) = recompute_course_counts(db).await {
        warn!("course count denormalization failed: {}", e);
    }
    if let Err(e) = recompute_submission_counts(db).await {
        warn!("submission count denormalization failed: {}", e);
    }
    if let Err(e) = backfill_submission_display(db).await {
        warn!("submission display backfill failed: {}", e);
    }
    if let Err(e) = recompute_user_course_totals(db).await {
        warn!("user course total denormalization failed: {}", e);
    }

    info!("denormalization complete");
}

/// Steps 1-2: per-course roster sizes and assignment counts. The stored
/// rosters are already deduplicated id sets, so size is the count.
async fn recompute_course_counts(db: &SqlitePool) -> Result<(), AppError> {
    let assignments = repository::fetch_assignments(db).await?;
    let mut per_course: HashMap<&str, i64> = HashMap::new();
    for assignment in &assignments {
        *per_course.entry(assignment.course_id.as_str()).or_insert(0) += 1;
    }

    for course in repository::fetch_courses(db).await? {
        repository::set_course_roster_counts(
            db,
            &course.id,
            course.students.len() as i64,
            course.teachers.len() as i64,
        )
        .await?;
        let count = per_course.get(course.id.as_str()).copied().unwrap_or(0);
        repository::set_course_assignment_count(db, &course.id, count).await?;
    }
    Ok(())
}

/// Step 3: submission counts per assignment, counting only turned-in and
/// returned states. Counts are reset first so assignments that lost all
/// their submissions land on zero.
async fn recompute_submission_counts(db: &SqlitePool) -> Result<(), AppError> {
    repository::reset_submission_counts(db).await?;

    let submissions = repository::fetch_submissions(db).await?;
    let mut per_assignment: HashMap<(&str, &str), i64> = HashMap::new();
    for sub in &submissions {
        if sub.state.counts_as_submitted() {
            *per_assignment
                .entry((sub.course_id.as_str(), sub.course_work_id.as_str()))
                .or_insert(0) += 1;
        }
    }

    for ((course_id, work_id), count) in per_assignment {
        repository::set_assignment_submission_count(db, course_id, work_id, count).await?;
    }
    Ok(())
}

/// Step 4: copy display fields onto submissions (assignment title, course
/// name, student name/email). Re-run on every sync so upstream renames
/// propagate.
async fn backfill_submission_display(db: &SqlitePool) -> Result<(), AppError> {
    for assignment in repository::fetch_assignments(db).await? {
        repository::backfill_submission_assignment_fields(
            db,
            &assignment.course_id,
            &assignment.id,
            &assignment.title,
            assignment.course_name.as_deref(),
        )
        .await?;
    }

    for user in repository::fetch_users(db).await? {
        repository::backfill_submission_student_fields(db, &user.google_id, &user.name, &user.email)
            .await?;
    }
    Ok(())
}

/// Step 5: per-identity course totals. Enrollment (course membership) and
/// teaching load (teacher-assignment rows) are two independent counts since a
/// single identity can hold both roles.
async fn recompute_user_course_totals(db: &SqlitePool) -> Result<(), AppError> {
    repository::reset_user_course_totals(db).await?;

    let mut totals: HashMap<String, i64> = HashMap::new();
    for course in repository::fetch_courses(db).await? {
        for student_id in &course.students {
            *totals.entry(student_id.clone()).or_insert(0) += 1;
        }
    }
    for (google_id, count) in &totals {
        repository::set_user_total_courses(db, google_id, *count).await?;
    }

    let mut teaching: HashMap<String, i64> = HashMap::new();
    for row in repository::fetch_teacher_assignments(db).await? {
        *teaching.entry(row.user_id).or_insert(0) += 1;
    }
    for (google_id, count) in &teaching {
        repository::set_user_total_courses(db, google_id, *count).await?;
    }

    Ok(())
}
