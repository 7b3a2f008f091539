use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use classboard_backend::classroom::{ClassroomClient, ClassroomClientFactory, dto};
use classboard_backend::db::repository;
use classboard_backend::error::AppError;
use classboard_backend::models::{Course, CourseState};
use classboard_backend::services::SyncService;
use classboard_backend::services::cache::TtlCache;
use sqlx::SqlitePool;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Canned responses for one impersonated account.
#[derive(Default, Clone)]
struct FixtureAccount {
    courses: Vec<dto::Course>,
    teachers: HashMap<String, Vec<dto::Teacher>>,
    students: HashMap<String, Vec<dto::Student>>,
    coursework: HashMap<String, Vec<dto::CourseWork>>,
    submissions: HashMap<(String, String), Vec<dto::StudentSubmission>>,
    fail_rosters_for: Vec<String>,
    fail_courses: bool,
}

struct FixtureClient {
    data: FixtureAccount,
}

#[async_trait]
impl ClassroomClient for FixtureClient {
    async fn list_courses(&self) -> Result<Vec<dto::Course>, AppError> {
        if self.data.fail_courses {
            return Err(AppError::External("course listing unavailable".to_string()));
        }
        Ok(self.data.courses.clone())
    }

    async fn list_teachers(&self, course_id: &str) -> Result<Vec<dto::Teacher>, AppError> {
        if self.data.fail_rosters_for.iter().any(|c| c == course_id) {
            return Err(AppError::External("teacher roster unavailable".to_string()));
        }
        Ok(self.data.teachers.get(course_id).cloned().unwrap_or_default())
    }

    async fn list_students(&self, course_id: &str) -> Result<Vec<dto::Student>, AppError> {
        if self.data.fail_rosters_for.iter().any(|c| c == course_id) {
            return Err(AppError::External("student roster unavailable".to_string()));
        }
        Ok(self.data.students.get(course_id).cloned().unwrap_or_default())
    }

    async fn list_coursework(&self, course_id: &str) -> Result<Vec<dto::CourseWork>, AppError> {
        Ok(self.data.coursework.get(course_id).cloned().unwrap_or_default())
    }

    async fn list_submissions(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<Vec<dto::StudentSubmission>, AppError> {
        Ok(self
            .data
            .submissions
            .get(&(course_id.to_string(), course_work_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

struct FixtureFactory {
    accounts: HashMap<String, FixtureAccount>,
}

impl ClassroomClientFactory for FixtureFactory {
    fn client_for(&self, subject: &str) -> Result<Arc<dyn ClassroomClient>, AppError> {
        let data = self
            .accounts
            .get(subject)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("unknown account {subject}")))?;
        Ok(Arc::new(FixtureClient { data }))
    }
}

fn make_service(
    pool: &SqlitePool,
    factory: FixtureFactory,
    accounts: Vec<&str>,
    enable_assignments: bool,
) -> SyncService {
    SyncService::new(
        pool.clone(),
        Arc::new(factory),
        Arc::new(TtlCache::new(Duration::from_secs(60))),
        accounts.into_iter().map(String::from).collect(),
        enable_assignments,
    )
}

fn api_course(id: &str, name: &str) -> dto::Course {
    dto::Course {
        id: id.to_string(),
        name: name.to_string(),
        section: None,
        owner_id: "owner-1".to_string(),
        course_state: Some("ACTIVE".to_string()),
    }
}

fn profile(user_id: &str, name: &str, email: Option<&str>) -> dto::UserProfile {
    dto::UserProfile {
        id: user_id.to_string(),
        name: Some(dto::ProfileName { full_name: Some(name.to_string()) }),
        email_address: email.map(String::from),
        photo_url: None,
    }
}

fn api_teacher(user_id: &str, name: &str, email: Option<&str>) -> dto::Teacher {
    dto::Teacher { user_id: user_id.to_string(), profile: profile(user_id, name, email) }
}

fn api_student(user_id: &str, name: &str, email: Option<&str>) -> dto::Student {
    dto::Student { user_id: user_id.to_string(), profile: profile(user_id, name, email) }
}

#[tokio::test]
async fn run_sync_skips_when_courses_exist() {
    let pool = test_pool().await;

    repository::upsert_course(
        &pool,
        &Course {
            id: "pre-existing".to_string(),
            name: "Already imported".to_string(),
            section: None,
            owner_id: "owner-1".to_string(),
            course_state: CourseState::Active,
            teachers: vec![],
            students: vec![],
            teacher_count: 0,
            student_count: 0,
            assignment_count: 0,
            synced_by: "admin@school.edu".to_string(),
            synced_at: "2026-01-01T00:00:00Z".to_string(),
        },
    )
    .await
    .expect("Failed to seed course");

    let mut accounts = HashMap::new();
    accounts.insert(
        "admin@school.edu".to_string(),
        FixtureAccount { courses: vec![api_course("c-new", "Fresh course")], ..Default::default() },
    );
    let service = make_service(&pool, FixtureFactory { accounts }, vec!["admin@school.edu"], false);

    let report = service.run_sync().await.expect("run_sync failed");

    assert!(report.success);
    assert_eq!(report.message, "Data already exists, sync skipped.");
    assert_eq!(report.stats.courses_updated, 0);

    // The fixture course was never written.
    let count = repository::count_courses(&pool).await.expect("count failed");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn rosters_merge_across_accounts() {
    let pool = test_pool().await;

    // Both accounts see course c3; each sees a partial roster.
    let mut first = FixtureAccount { courses: vec![api_course("c3", "Biology")], ..Default::default() };
    first.teachers.insert("c3".to_string(), vec![api_teacher("t1", "Alice Teacher", Some("alice@school.edu"))]);
    first.students.insert(
        "c3".to_string(),
        vec![
            api_student("s1", "Student One", Some("s1@school.edu")),
            api_student("s2", "Student Two", Some("s2@school.edu")),
        ],
    );

    let mut second = FixtureAccount { courses: vec![api_course("c3", "Biology")], ..Default::default() };
    second.teachers.insert(
        "c3".to_string(),
        vec![
            api_teacher("t1", "Alice Teacher", Some("alice@school.edu")),
            api_teacher("t2", "Bob Teacher", Some("bob@school.edu")),
        ],
    );
    second.students.insert(
        "c3".to_string(),
        vec![
            api_student("s2", "Student Two", Some("s2@school.edu")),
            api_student("s3", "Student Three", Some("s3@school.edu")),
        ],
    );

    let mut accounts = HashMap::new();
    accounts.insert("first@school.edu".to_string(), first);
    accounts.insert("second@school.edu".to_string(), second);
    let service = make_service(
        &pool,
        FixtureFactory { accounts },
        vec!["first@school.edu", "second@school.edu"],
        false,
    );

    let report = service.run_sync().await.expect("run_sync failed");
    assert_eq!(report.stats.users_errors, 0);

    let course = repository::find_course_by_id(&pool, "c3")
        .await
        .expect("fetch failed")
        .expect("course missing");

    assert_eq!(course.students, vec!["s1", "s2", "s3"]);
    assert_eq!(course.teachers, vec!["t1", "t2"]);
}

#[tokio::test]
async fn reset_and_sync_is_idempotent() {
    let pool = test_pool().await;

    let mut data = FixtureAccount { courses: vec![api_course("c1", "Algebra")], ..Default::default() };
    data.teachers.insert("c1".to_string(), vec![api_teacher("t1", "Alice Teacher", Some("alice@school.edu"))]);
    data.students.insert("c1".to_string(), vec![api_student("s1", "Student One", Some("s1@school.edu"))]);
    data.coursework.insert(
        "c1".to_string(),
        vec![dto::CourseWork {
            id: "w1".to_string(),
            title: "Homework 1".to_string(),
            due_date: Some(dto::Date { year: Some(2026), month: Some(9), day: Some(1) }),
            due_time: None,
            creation_time: Some("2026-08-01T00:00:00Z".to_string()),
        }],
    );
    data.submissions.insert(
        ("c1".to_string(), "w1".to_string()),
        vec![dto::StudentSubmission {
            id: "sub1".to_string(),
            course_id: "c1".to_string(),
            course_work_id: "w1".to_string(),
            user_id: "s1".to_string(),
            state: Some("TURNED_IN".to_string()),
            late: Some(false),
            creation_time: Some("2026-08-20T10:00:00Z".to_string()),
            update_time: Some("2026-08-21T10:00:00Z".to_string()),
        }],
    );

    let mut accounts = HashMap::new();
    accounts.insert("admin@school.edu".to_string(), data);
    let service = make_service(&pool, FixtureFactory { accounts }, vec!["admin@school.edu"], true);

    service.reset_and_sync().await.expect("first sync failed");
    service.reset_and_sync().await.expect("second sync failed");

    assert_eq!(repository::count_courses(&pool).await.expect("count"), 1);
    assert_eq!(repository::fetch_assignments(&pool).await.expect("assignments").len(), 1);
    assert_eq!(repository::fetch_submissions(&pool).await.expect("submissions").len(), 1);
    assert_eq!(repository::fetch_teacher_assignments(&pool).await.expect("teachers").len(), 1);
}

#[tokio::test]
async fn teacher_row_follows_latest_email() {
    let pool = test_pool().await;

    let build = |email: &str| {
        let mut data =
            FixtureAccount { courses: vec![api_course("c1", "Algebra")], ..Default::default() };
        data.teachers
            .insert("c1".to_string(), vec![api_teacher("t1", "Alice Teacher", Some(email))]);
        data
    };

    let mut accounts = HashMap::new();
    accounts.insert("admin@school.edu".to_string(), build("old@school.edu"));
    let service = make_service(&pool, FixtureFactory { accounts }, vec!["admin@school.edu"], false);
    service.reset_and_sync().await.expect("first sync failed");

    let mut accounts = HashMap::new();
    accounts.insert("admin@school.edu".to_string(), build("new@school.edu"));
    let service = make_service(&pool, FixtureFactory { accounts }, vec!["admin@school.edu"], false);
    service.reset_and_sync().await.expect("second sync failed");

    let rows = repository::fetch_teacher_assignments_for_user(&pool, "t1")
        .await
        .expect("fetch failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email_address, "new@school.edu");
}

#[tokio::test]
async fn missing_emails_get_distinct_placeholders() {
    let pool = test_pool().await;

    let mut data = FixtureAccount { courses: vec![api_course("c1", "Algebra")], ..Default::default() };
    data.students.insert(
        "c1".to_string(),
        vec![
            api_student("s1", "Student One", None),
            api_student("s2", "Student Two", None),
        ],
    );

    let mut accounts = HashMap::new();
    accounts.insert("admin@school.edu".to_string(), data);
    let service = make_service(&pool, FixtureFactory { accounts }, vec!["admin@school.edu"], false);
    service.run_sync().await.expect("sync failed");

    let users = repository::fetch_users(&pool).await.expect("fetch users failed");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].email, "no-email-s1@google.com");
    assert_eq!(users[1].email, "no-email-s2@google.com");
    assert_ne!(users[0].email, users[1].email);
}

#[tokio::test]
async fn roster_failure_still_persists_course() {
    let pool = test_pool().await;

    let data = FixtureAccount {
        courses: vec![api_course("c1", "Algebra")],
        fail_rosters_for: vec!["c1".to_string()],
        ..Default::default()
    };

    let mut accounts = HashMap::new();
    accounts.insert("admin@school.edu".to_string(), data);
    let service = make_service(&pool, FixtureFactory { accounts }, vec!["admin@school.edu"], false);

    let report = service.run_sync().await.expect("sync failed");
    assert_eq!(report.stats.courses_updated, 1);
    assert_eq!(report.stats.courses_errors, 0);

    let course = repository::find_course_by_id(&pool, "c1")
        .await
        .expect("fetch failed")
        .expect("course missing");
    assert!(course.students.is_empty());
    assert!(course.teachers.is_empty());
}

#[tokio::test]
async fn account_failure_is_counted_and_later_accounts_still_run() {
    let pool = test_pool().await;

    let broken = FixtureAccount { fail_courses: true, ..Default::default() };
    let mut healthy =
        FixtureAccount { courses: vec![api_course("c1", "Algebra")], ..Default::default() };
    healthy.students.insert("c1".to_string(), vec![api_student("s1", "Student One", None)]);

    let mut accounts = HashMap::new();
    accounts.insert("broken@school.edu".to_string(), broken);
    accounts.insert("healthy@school.edu".to_string(), healthy);
    let service = make_service(
        &pool,
        FixtureFactory { accounts },
        vec!["broken@school.edu", "healthy@school.edu"],
        false,
    );

    let report = service.run_sync().await.expect("run should survive one bad account");
    assert_eq!(report.stats.users_errors, 1);
    assert_eq!(report.stats.users_processed, 1);
    assert_eq!(report.stats.courses_updated, 1);

    // The healthy account's course landed despite the earlier failure.
    assert!(repository::find_course_by_id(&pool, "c1")
        .await
        .expect("fetch failed")
        .is_some());
}

#[tokio::test]
async fn factory_error_aborts_whole_run() {
    let pool = test_pool().await;

    // The factory knows only the second account; resolving the first fails,
    // which is a configuration problem and fatal for the run.
    let mut accounts = HashMap::new();
    accounts.insert(
        "known@school.edu".to_string(),
        FixtureAccount { courses: vec![api_course("c1", "Algebra")], ..Default::default() },
    );
    let service = make_service(
        &pool,
        FixtureFactory { accounts },
        vec!["unknown@school.edu", "known@school.edu"],
        false,
    );

    let err = service.run_sync().await.expect_err("run should abort");
    assert!(matches!(err, AppError::Config(_)));

    // Nothing was written before the abort.
    assert_eq!(repository::count_courses(&pool).await.expect("count"), 0);
}

#[tokio::test]
async fn sync_recomputes_derived_counts() {
    let pool = test_pool().await;

    let mut data = FixtureAccount { courses: vec![api_course("c1", "Algebra")], ..Default::default() };
    data.teachers.insert("c1".to_string(), vec![api_teacher("t1", "Alice Teacher", Some("alice@school.edu"))]);
    data.students.insert(
        "c1".to_string(),
        vec![
            api_student("s1", "Student One", Some("s1@school.edu")),
            api_student("s2", "Student Two", Some("s2@school.edu")),
        ],
    );
    data.coursework.insert(
        "c1".to_string(),
        vec![dto::CourseWork {
            id: "w1".to_string(),
            title: "Homework 1".to_string(),
            due_date: Some(dto::Date { year: Some(2026), month: Some(9), day: Some(1) }),
            due_time: Some(dto::TimeOfDay { hours: Some(17), minutes: Some(0) }),
            creation_time: None,
        }],
    );
    data.submissions.insert(
        ("c1".to_string(), "w1".to_string()),
        vec![
            dto::StudentSubmission {
                id: "sub1".to_string(),
                course_id: "c1".to_string(),
                course_work_id: "w1".to_string(),
                user_id: "s1".to_string(),
                state: Some("TURNED_IN".to_string()),
                late: Some(false),
                creation_time: None,
                update_time: Some("2026-08-21T10:00:00Z".to_string()),
            },
            dto::StudentSubmission {
                id: "sub2".to_string(),
                course_id: "c1".to_string(),
                course_work_id: "w1".to_string(),
                user_id: "s2".to_string(),
                state: Some("CREATED".to_string()),
                late: Some(false),
                creation_time: None,
                update_time: None,
            },
        ],
    );

    let mut accounts = HashMap::new();
    accounts.insert("admin@school.edu".to_string(), data);
    let service = make_service(&pool, FixtureFactory { accounts }, vec!["admin@school.edu"], true);
    service.run_sync().await.expect("sync failed");

    let course = repository::find_course_by_id(&pool, "c1")
        .await
        .expect("fetch failed")
        .expect("course missing");
    assert_eq!(course.student_count, 2);
    assert_eq!(course.teacher_count, 1);
    assert_eq!(course.assignment_count, 1);

    // Only the turned-in submission counts.
    let assignments = repository::fetch_assignments(&pool).await.expect("assignments");
    assert_eq!(assignments[0].submission_count, 1);
}
