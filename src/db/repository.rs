use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::models::{Assignment, Course, Submission, TeacherAssignment, User};

// Every write here is an upsert by natural key. The keys are UNIQUE
// constraints in the schema, so re-running a sync can update rows but never
// duplicate them.

pub async fn count_courses(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
        .fetch_one(db)
        .await
}

pub async fn find_course_by_id(db: &SqlitePool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY name")
        .fetch_all(db)
        .await
}

pub async fn fetch_courses_by_state(
    db: &SqlitePool,
    state: &str,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE course_state = ? ORDER BY name")
        .bind(state)
        .fetch_all(db)
        .await
}

pub async fn upsert_course(db: &SqlitePool, course: &Course) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO courses
            (id, name, section, owner_id, course_state, teachers, students,
             teacher_count, student_count, assignment_count, synced_by, synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            section = excluded.section,
            owner_id = excluded.owner_id,
            course_state = excluded.course_state,
            teachers = excluded.teachers,
            students = excluded.students,
            synced_by = excluded.synced_by,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(&course.id)
    .bind(&course.name)
    .bind(&course.section)
    .bind(&course.owner_id)
    .bind(course.course_state.as_str())
    .bind(Json(&course.teachers))
    .bind(Json(&course.students))
    .bind(course.teacher_count)
    .bind(course.student_count)
    .bind(course.assignment_count)
    .bind(&course.synced_by)
    .bind(&course.synced_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn set_course_roster_counts(
    db: &SqlitePool,
    id: &str,
    student_count: i64,
    teacher_count: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE courses SET student_count = ?, teacher_count = ? WHERE id = ?")
        .bind(student_count)
        .bind(teacher_count)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_course_assignment_count(
    db: &SqlitePool,
    id: &str,
    count: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE courses SET assignment_count = ? WHERE id = ?")
        .bind(count)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn fetch_teacher_assignments(
    db: &SqlitePool,
) -> Result<Vec<TeacherAssignment>, sqlx::Error> {
    sqlx::query_as::<_, TeacherAssignment>(
        "SELECT * FROM teacher_assignments ORDER BY course_id, user_id",
    )
    .fetch_all(db)
    .await
}

pub async fn fetch_teacher_assignments_for_user(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<TeacherAssignment>, sqlx::Error> {
    sqlx::query_as::<_, TeacherAssignment>(
        "SELECT * FROM teacher_assignments WHERE user_id = ? ORDER BY course_id",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn upsert_teacher_assignment(
    db: &SqlitePool,
    teacher: &TeacherAssignment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO teacher_assignments
            (user_id, course_id, full_name, email_address, synced_by, synced_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, course_id) DO UPDATE SET
            full_name = excluded.full_name,
            email_address = excluded.email_address,
            synced_by = excluded.synced_by,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(&teacher.user_id)
    .bind(&teacher.course_id)
    .bind(&teacher.full_name)
    .bind(&teacher.email_address)
    .bind(&teacher.synced_by)
    .bind(&teacher.synced_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn fetch_assignments(db: &SqlitePool) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>("SELECT * FROM assignments ORDER BY course_id, id")
        .fetch_all(db)
        .await
}

pub async fn upsert_assignment(db: &SqlitePool, assignment: &Assignment) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO assignments
            (id, course_id, title, due_year, due_month, due_day, due_hours, due_minutes,
             creation_time, submission_count, course_name, synced_by, synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(course_id, id) DO UPDATE SET
            title = excluded.title,
            due_year = excluded.due_year,
            due_month = excluded.due_month,
            due_day = excluded.due_day,
            due_hours = excluded.due_hours,
            due_minutes = excluded.due_minutes,
            creation_time = excluded.creation_time,
            course_name = excluded.course_name,
            synced_by = excluded.synced_by,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(&assignment.id)
    .bind(&assignment.course_id)
    .bind(&assignment.title)
    .bind(assignment.due_year)
    .bind(assignment.due_month)
    .bind(assignment.due_day)
    .bind(assignment.due_hours)
    .bind(assignment.due_minutes)
    .bind(&assignment.creation_time)
    .bind(assignment.submission_count)
    .bind(&assignment.course_name)
    .bind(&assignment.synced_by)
    .bind(&assignment.synced_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn reset_submission_counts(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assignments SET submission_count = 0")
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_assignment_submission_count(
    db: &SqlitePool,
    course_id: &str,
    id: &str,
    count: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assignments SET submission_count = ? WHERE course_id = ? AND id = ?")
        .bind(count)
        .bind(course_id)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn fetch_submissions(db: &SqlitePool) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>("SELECT * FROM submissions ORDER BY course_id, course_work_id")
        .fetch_all(db)
        .await
}

// Last-write-wins: the external source owns submission state transitions.
pub async fn upsert_submission(db: &SqlitePool, submission: &Submission) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO submissions
            (id, course_id, course_work_id, user_id, state, late, creation_time, update_time,
             student_name, student_email, course_name, assignment_title, synced_by, synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(course_id, course_work_id, user_id) DO UPDATE SET
            id = excluded.id,
            state = excluded.state,
            late = excluded.late,
            creation_time = excluded.creation_time,
            update_time = excluded.update_time,
            synced_by = excluded.synced_by,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(&submission.id)
    .bind(&submission.course_id)
    .bind(&submission.course_work_id)
    .bind(&submission.user_id)
    .bind(submission.state.as_str())
    .bind(submission.late)
    .bind(&submission.creation_time)
    .bind(&submission.update_time)
    .bind(&submission.student_name)
    .bind(&submission.student_email)
    .bind(&submission.course_name)
    .bind(&submission.assignment_title)
    .bind(&submission.synced_by)
    .bind(&submission.synced_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn backfill_submission_assignment_fields(
    db: &SqlitePool,
    course_id: &str,
    course_work_id: &str,
    assignment_title: &str,
    course_name: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE submissions SET assignment_title = ?, course_name = ?
        WHERE course_id = ? AND course_work_id = ?
        "#,
    )
    .bind(assignment_title)
    .bind(course_name)
    .bind(course_id)
    .bind(course_work_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn backfill_submission_student_fields(
    db: &SqlitePool,
    user_id: &str,
    name: &str,
    email: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE submissions SET student_name = ?, student_email = ? WHERE user_id = ?")
        .bind(name)
        .bind(email)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn find_user(db: &SqlitePool, google_id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ?")
        .bind(google_id)
        .fetch_optional(db)
        .await
}

pub async fn fetch_users(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
        .fetch_all(db)
        .await
}

/// First-write-wins: an existing identity record is left untouched so roster
/// sync can never clobber profile data.
pub async fn insert_user_if_absent(db: &SqlitePool, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (google_id, name, email, picture, role, source, total_courses, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(google_id) DO NOTHING
        "#,
    )
    .bind(&user.google_id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.picture)
    .bind(&user.role)
    .bind(&user.source)
    .bind(user.total_courses)
    .bind(&user.created_at)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn reset_user_course_totals(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET total_courses = 0")
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_user_total_courses(
    db: &SqlitePool,
    google_id: &str,
    count: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET total_courses = ? WHERE google_id = ?")
        .bind(count)
        .bind(google_id)
        .execute(db)
        .await?;
    Ok(())
}
