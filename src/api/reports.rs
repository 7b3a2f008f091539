use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Course, CourseState, User};
use crate::services::classifier::{self, AcademicStatus};
use crate::state::AppState;

const DASHBOARD_STATS_KEY: &str = "dashboard_stats";
const DEFAULT_PAGE_LIMIT: u32 = 25;

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_id: String,
    pub student_name: String,
    pub student_email: Option<String>,
    pub course_name: String,
    pub status: AcademicStatus,
    pub days_since_last_activity: Option<i64>,
    pub missed_assignments: usize,
    pub last_submission_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListResponse {
    pub items: Vec<StudentReport>,
    pub pagination: Pagination,
}

/// Institute-wide classification of every student enrolled in an ACTIVE
/// course. Canonical scope for the at-risk and silent endpoints; recency and
/// missed counts are computed across all of a student's active courses.
async fn build_student_reports(state: &AppState) -> Result<Vec<StudentReport>, AppError> {
    let now = Utc::now();
    let courses = repository::fetch_courses_by_state(&state.db, CourseState::Active.as_str()).await?;
    let assignments = repository::fetch_assignments(&state.db).await?;
    let submissions = repository::fetch_submissions(&state.db).await?;
    let users = repository::fetch_users(&state.db).await?;

    let user_map: HashMap<&str, &User> =
        users.iter().map(|u| (u.google_id.as_str(), u)).collect();

    let mut courses_by_student: HashMap<&str, Vec<&Course>> = HashMap::new();
    for course in &courses {
        for student_id in &course.students {
            courses_by_student.entry(student_id.as_str()).or_default().push(course);
        }
    }

    let mut reports = Vec::new();
    for (student_id, enrolled) in courses_by_student {
        let course_assignments: Vec<_> = assignments
            .iter()
            .filter(|a| enrolled.iter().any(|c| c.id == a.course_id))
            .collect();
        let student_submissions: Vec<_> =
            submissions.iter().filter(|s| s.user_id == student_id).collect();

        let classification =
            classifier::classify(student_id, &course_assignments, &student_submissions, now);

        let last_submission_date = student_submissions
            .iter()
            .filter(|s| s.state.counts_as_submitted())
            .filter_map(|s| classifier::submission_instant(s))
            .max()
            .map(|t| t.format("%Y-%m-%d").to_string());

        let user = user_map.get(student_id);
        // Redacted sentinel emails are display noise, not contact info.
        let student_email = user
            .map(|u| u.email.clone())
            .filter(|email| !User::is_sentinel_email(email));

        reports.push(StudentReport {
            student_id: student_id.to_string(),
            student_name: user.map(|u| u.name.clone()).unwrap_or_else(|| "Unknown Student".to_string()),
            student_email,
            course_name: enrolled.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "),
            status: classification.status,
            days_since_last_activity: classification.days_inactive,
            missed_assignments: classification.missed_count,
            last_submission_date,
        });
    }

    reports.sort_by(|a, b| a.student_name.cmp(&b.student_name));
    Ok(reports)
}

fn paginate(mut reports: Vec<StudentReport>, params: &PageParams) -> StudentListResponse {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
    let total_items = reports.len();
    let total_pages = total_items.div_ceil(limit as usize);

    // Query params are caller-controlled; the offset math must not overflow.
    let skip = u64::from(page - 1) * u64::from(limit);
    let items: Vec<StudentReport> = if skip >= reports.len() as u64 {
        Vec::new()
    } else {
        reports.drain(skip as usize..).take(limit as usize).collect()
    };

    StudentListResponse {
        items,
        pagination: Pagination { page, limit, total_items, total_pages },
    }
}

pub async fn at_risk_students(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<StudentListResponse>, AppError> {
    let reports = build_student_reports(&state).await?;
    let at_risk: Vec<_> = reports
        .into_iter()
        .filter(|r| r.status == AcademicStatus::AtRisk)
        .collect();
    Ok(Json(paginate(at_risk, &params)))
}

pub async fn silent_students(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<StudentListResponse>, AppError> {
    let reports = build_student_reports(&state).await?;
    let silent: Vec<_> = reports
        .into_iter()
        .filter(|r| r.status == AcademicStatus::Silent)
        .collect();
    Ok(Json(paginate(silent, &params)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherOverviewEntry {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub total_courses: usize,
}

pub async fn teachers_overview(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let teachers = collect_teachers_overview(&state).await?;
    Ok(Json(json!({
        "totalTeachers": teachers.len(),
        "teachers": teachers,
    })))
}

// Grouped by userId, never by email: distinct teachers can share a redacted
// "no-email-*" address.
async fn collect_teachers_overview(
    state: &AppState,
) -> Result<Vec<TeacherOverviewEntry>, AppError> {
    let active_courses =
        repository::fetch_courses_by_state(&state.db, CourseState::Active.as_str()).await?;
    let rows = repository::fetch_teacher_assignments(&state.db).await?;

    let mut grouped: HashMap<&str, TeacherOverviewEntry> = HashMap::new();
    for row in &rows {
        if !active_courses.iter().any(|c| c.id == row.course_id) {
            continue;
        }
        grouped
            .entry(row.user_id.as_str())
            .and_modify(|entry| entry.total_courses += 1)
            .or_insert_with(|| TeacherOverviewEntry {
                user_id: row.user_id.clone(),
                name: row.full_name.clone(),
                email: row.email_address.clone(),
                total_courses: 1,
            });
    }

    let mut teachers: Vec<TeacherOverviewEntry> = grouped.into_values().collect();
    teachers.sort_by(|a, b| {
        b.total_courses.cmp(&a.total_courses).then_with(|| a.name.cmp(&b.name))
    });
    Ok(teachers)
}

pub async fn teacher_courses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let rows = repository::fetch_teacher_assignments_for_user(&state.db, &user_id).await?;
    let teacher = rows.first().ok_or(AppError::NotFound)?;

    let mut courses = Vec::new();
    for row in &rows {
        let Some(course) = repository::find_course_by_id(&state.db, &row.course_id).await? else {
            continue;
        };
        if !course.course_state.is_active() {
            continue;
        }
        courses.push(json!({
            "courseId": course.id,
            "name": course.name,
            "section": course.section,
            "studentsCount": course.student_count,
            "assignmentCount": course.assignment_count,
        }));
    }

    Ok(Json(json!({
        "teacher": {
            "userId": teacher.user_id,
            "name": teacher.full_name,
            "email": teacher.email_address,
        },
        "totalActiveCourses": courses.len(),
        "courses": courses,
    })))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(cached) = state.cache.get(DASHBOARD_STATS_KEY) {
        info!("serving dashboard stats from cache");
        return Ok(Json(cached));
    }

    let active_courses =
        repository::fetch_courses_by_state(&state.db, CourseState::Active.as_str()).await?;
    let assignments = repository::fetch_assignments(&state.db).await?;
    let teachers = collect_teachers_overview(&state).await?;
    let reports = build_student_reports(&state).await?;

    let mut unique_students: Vec<&str> = Vec::new();
    for course in &active_courses {
        for student_id in &course.students {
            if !unique_students.contains(&student_id.as_str()) {
                unique_students.push(student_id);
            }
        }
    }

    // All counters below come from denormalized fields; no joins at read time.
    let active_assignments: Vec<_> = assignments
        .iter()
        .filter(|a| active_courses.iter().any(|c| c.id == a.course_id))
        .collect();
    let submitted: i64 = active_assignments.iter().map(|a| a.submission_count).sum();
    let expected: i64 = active_assignments
        .iter()
        .filter_map(|a| {
            active_courses
                .iter()
                .find(|c| c.id == a.course_id)
                .map(|c| c.student_count)
        })
        .sum();
    let pending = (expected - submitted).max(0);

    let at_risk = reports.iter().filter(|r| r.status == AcademicStatus::AtRisk).count();
    let silent = reports.iter().filter(|r| r.status == AcademicStatus::Silent).count();
    let max_inactivity = reports
        .iter()
        .filter_map(|r| r.days_since_last_activity)
        .max()
        .unwrap_or(0);

    let response = json!({
        "courses": active_courses.len(),
        "students": unique_students.len(),
        "teachers": teachers.len(),
        "assignments": active_assignments.len(),
        "submitted": submitted,
        "pending": pending,
        "atRisk": at_risk,
        "silent": silent,
        "maxInactivity": max_inactivity,
        "teachersOverview": teachers,
    });

    state.cache.insert(DASHBOARD_STATS_KEY, response.clone());
    Ok(Json(response))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub student_data: ExplainStudentData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainStudentData {
    pub student_name: String,
    pub course_name: String,
    #[serde(default)]
    pub missed_assignments: usize,
    #[serde(default)]
    pub days_since_last_activity: Option<i64>,
    #[serde(default)]
    pub last_submission_date: Option<String>,
}

pub async fn explain_at_risk(
    State(state): State<AppState>,
    Json(req): Json<ExplainRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let data = &req.student_data;
    let system_prompt = "You are an academic advisor. Explain why a student is flagged as \
\"At-Risk\" based on the data provided. Use neutral, professional academic language. Do not \
predict outcomes or recommend disciplinary actions. Focus strictly on the provided metrics. \
Do not use bold/markdown formatting.";
    let user_content = format!(
        "Student: {}\nCourse: {}\nMissed Assignments: {}\nDays since last activity: {}",
        data.student_name,
        data.course_name,
        data.missed_assignments,
        data.days_since_last_activity
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
    );

    let explanation = state.insights.complete(system_prompt, &user_content).await;
    Ok(Json(json!({ "explanation": explanation })))
}

pub async fn explain_silence(
    State(state): State<AppState>,
    Json(req): Json<ExplainRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let data = &req.student_data;
    let system_prompt = "You are an academic analyst. Explain the patterns of a \"Silent \
Student\". Focus on inactivity and missed deadlines. No bold/markdown.";
    let user_content = format!(
        "Student: {}, Course: {}, Inactive: {}, Missed: {}, Last: {}",
        data.student_name,
        data.course_name,
        data.days_since_last_activity
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Never".to_string()),
        data.missed_assignments,
        data.last_submission_date.as_deref().unwrap_or("None"),
    );

    let explanation = state.insights.complete(system_prompt, &user_content).await;
    Ok(Json(json!({ "explanation": explanation })))
}
