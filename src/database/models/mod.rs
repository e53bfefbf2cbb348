pub mod assignment;
pub mod course;
pub mod forum;
pub mod grade;
pub mod usuario;

pub use assignment::{
    Assignment, AssignmentCompletion, CompleteAssignmentRequest, CompletionInfo, CompletionStats,
    CreateAssignmentRequest, NewAssignment,
};
pub use course::{CourseMember, CourseRequest, Curso, EnrollRequest, Inscripcion, NewCurso, NewInscripcion};
pub use forum::{
    CreateReplyRequest, CreateThreadRequest, ForumCategory, ForumReply, ForumThread, ThreadDetail, ThreadSummary,
};
pub use grade::{GradeRequest, GradeUpdate, NewNota, Nota};
pub use usuario::{NewUsuario, Rol, Usuario};

/// Timestamp columns arrive as RFC 3339 from `timestamptz` and without an
/// offset from `timestamp`; both are read as UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw))),
            }
        }
    }

}
