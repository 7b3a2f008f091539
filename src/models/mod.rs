pub mod assignment;
pub mod course;
pub mod submission;
pub mod teacher_assignment;
pub mod user;

pub use assignment::Assignment;
pub use course::{Course, CourseState};
pub use submission::{Submission, SubmissionState};
pub use teacher_assignment::TeacherAssignment;
pub use user::User;
