use serde::Deserialize;

// Wire types for the Classroom v1 REST API. Only the fields the sync pipeline
// reads are modeled; everything else is ignored.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListCoursesResponse {
    pub courses: Vec<Course>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    pub owner_id: String,
    pub course_state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListTeachersResponse {
    pub teachers: Vec<Teacher>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Teacher {
    pub user_id: String,
    pub profile: UserProfile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListStudentsResponse {
    pub students: Vec<Student>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Student {
    pub user_id: String,
    pub profile: UserProfile,
}

// emailAddress may be absent or a redacted "no-email-*" placeholder depending
// on the domain's privacy settings. Both are expected, not errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<ProfileName>,
    pub email_address: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileName {
    pub full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListCourseWorkResponse {
    pub course_work: Vec<CourseWork>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseWork {
    pub id: String,
    pub title: String,
    pub due_date: Option<Date>,
    pub due_time: Option<TimeOfDay>,
    pub creation_time: Option<String>,
}

// The API may send partial dates; missing pieces are handled downstream as
// "no due date".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Date {
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeOfDay {
    pub hours: Option<i64>,
    pub minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListStudentSubmissionsResponse {
    pub student_submissions: Vec<StudentSubmission>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentSubmission {
    pub id: String,
    pub course_id: String,
    pub course_work_id: String,
    pub user_id: String,
    pub state: Option<String>,
    pub late: Option<bool>,
    pub creation_time: Option<String>,
    pub update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
