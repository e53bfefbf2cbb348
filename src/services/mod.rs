pub mod assignment_service;
pub mod course_service;
pub mod forum_service;
pub mod grade_service;
pub mod user_service;

use thiserror::Error;

use crate::database::StoreError;

pub use assignment_service::{AssignmentAction, AssignmentEntry, AssignmentService, CourseAssignments};
pub use course_service::{CourseAction, CourseService};
pub use forum_service::{Author, ForumService, ThreadQuery};
pub use grade_service::{GradeAction, GradeService};
pub use user_service::{SyncOutcome, UserService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
