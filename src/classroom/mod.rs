pub mod auth;
pub mod dto;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::classroom::auth::ServiceAccountAuth;
use crate::error::AppError;

const API_BASE: &str = "https://classroom.googleapis.com/v1";
const PAGE_SIZE: u32 = 100;
// One hung upstream call must not stall an entire sync run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

/// Read contract against the external Classroom source, scoped to one
/// impersonated account. All listings are fully paginated.
#[async_trait]
pub trait ClassroomClient: Send + Sync {
    /// Courses visible to the impersonated account, in every lifecycle state.
    async fn list_courses(&self) -> Result<Vec<dto::Course>, AppError>;
    async fn list_teachers(&self, course_id: &str) -> Result<Vec<dto::Teacher>, AppError>;
    async fn list_students(&self, course_id: &str) -> Result<Vec<dto::Student>, AppError>;
    async fn list_coursework(&self, course_id: &str) -> Result<Vec<dto::CourseWork>, AppError>;
    async fn list_submissions(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<Vec<dto::StudentSubmission>, AppError>;
}

/// Hands out one client per impersonated subject. A factory error is a
/// configuration or credential problem and is fatal for the whole sync run.
pub trait ClassroomClientFactory: Send + Sync {
    fn client_for(&self, subject: &str) -> Result<Arc<dyn ClassroomClient>, AppError>;
}

pub struct GoogleClassroomFactory {
    auth: Arc<ServiceAccountAuth>,
    http: Client,
}

impl GoogleClassroomFactory {
    pub fn new(auth: ServiceAccountAuth) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { auth: Arc::new(auth), http })
    }
}

impl ClassroomClientFactory for GoogleClassroomFactory {
    fn client_for(&self, subject: &str) -> Result<Arc<dyn ClassroomClient>, AppError> {
        if subject.is_empty() {
            return Err(AppError::Config("impersonation subject is empty".to_string()));
        }
        Ok(Arc::new(GoogleClassroomClient {
            auth: self.auth.clone(),
            http: self.http.clone(),
            subject: subject.to_string(),
            token: Mutex::new(None),
        }))
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct GoogleClassroomClient {
    auth: Arc<ServiceAccountAuth>,
    http: Client,
    subject: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleClassroomClient {
    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self.auth.fetch_access_token(&self.http, &self.subject).await?;
        let ttl = Duration::from_secs(response.expires_in.unwrap_or(3600))
            .saturating_sub(TOKEN_EXPIRY_SLACK);
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(response.access_token)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        page_token: Option<&str>,
    ) -> Result<T, AppError> {
        let token = self.access_token().await?;
        let page_size = PAGE_SIZE.to_string();
        let mut request = self
            .http
            .get(format!("{API_BASE}/{path}"))
            .bearer_auth(token)
            .query(&[("pageSize", page_size.as_str())])
            .query(query);
        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!(
                "classroom api error on {path}: {status} {body}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::External(format!("failed to parse {path} response: {e}")))
    }
}

#[async_trait]
impl ClassroomClient for GoogleClassroomClient {
    async fn list_courses(&self) -> Result<Vec<dto::Course>, AppError> {
        let mut courses = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: dto::ListCoursesResponse = self
                .get_page(
                    "courses",
                    &[
                        ("teacherId", "me"),
                        ("courseStates", "ACTIVE"),
                        ("courseStates", "ARCHIVED"),
                        ("courseStates", "PROVISIONED"),
                    ],
                    page_token.as_deref(),
                )
                .await?;
            courses.extend(page.courses);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(courses)
    }

    async fn list_teachers(&self, course_id: &str) -> Result<Vec<dto::Teacher>, AppError> {
        let mut teachers = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: dto::ListTeachersResponse = self
                .get_page(&format!("courses/{course_id}/teachers"), &[], page_token.as_deref())
                .await?;
            teachers.extend(page.teachers);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(teachers)
    }

    async fn list_students(&self, course_id: &str) -> Result<Vec<dto::Student>, AppError> {
        let mut students = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: dto::ListStudentsResponse = self
                .get_page(&format!("courses/{course_id}/students"), &[], page_token.as_deref())
                .await?;
            students.extend(page.students);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(students)
    }

    async fn list_coursework(&self, course_id: &str) -> Result<Vec<dto::CourseWork>, AppError> {
        let mut work = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: dto::ListCourseWorkResponse = self
                .get_page(&format!("courses/{course_id}/courseWork"), &[], page_token.as_deref())
                .await?;
            work.extend(page.course_work);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(work)
    }

    async fn list_submissions(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<Vec<dto::StudentSubmission>, AppError> {
        let mut submissions = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: dto::ListStudentSubmissionsResponse = self
                .get_page(
                    &format!("courses/{course_id}/courseWork/{course_work_id}/studentSubmissions"),
                    &[],
                    page_token.as_deref(),
                )
                .await?;
            submissions.extend(page.student_submissions);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(submissions)
    }
}

/// Client that sees an empty institute. Used when no credential is configured
/// and as a base for test doubles.
pub struct NoopClassroomClient;

#[async_trait]
impl ClassroomClient for NoopClassroomClient {
    async fn list_courses(&self) -> Result<Vec<dto::Course>, AppError> {
        Ok(Vec::new())
    }

    async fn list_teachers(&self, _course_id: &str) -> Result<Vec<dto::Teacher>, AppError> {
        Ok(Vec::new())
    }

    async fn list_students(&self, _course_id: &str) -> Result<Vec<dto::Student>, AppError> {
        Ok(Vec::new())
    }

    async fn list_coursework(&self, _course_id: &str) -> Result<Vec<dto::CourseWork>, AppError> {
        Ok(Vec::new())
    }

    async fn list_submissions(
        &self,
        _course_id: &str,
        _course_work_id: &str,
    ) -> Result<Vec<dto::StudentSubmission>, AppError> {
        Ok(Vec::new())
    }
}

pub struct NoopClassroomFactory;

impl ClassroomClientFactory for NoopClassroomFactory {
    fn client_for(&self, _subject: &str) -> Result<Arc<dyn ClassroomClient>, AppError> {
        Ok(Arc::new(NoopClassroomClient))
    }
}
