use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Row of `<prefix>_notas`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nota {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub grade: Option<Decimal>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub registered_at: Option<DateTime<Utc>>,
}

/// One entry of a bulk grade upload
#[derive(Debug, Clone, Deserialize)]
pub struct GradeRequest {
    pub student_id: i64,
    pub course_id: i64,
    pub grade: Decimal,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradeUpdate {
    #[serde(default)]
    pub grade: Option<Decimal>,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNota {
    pub student_id: i64,
    pub course_id: i64,
    pub grade: Decimal,
    pub subject: Option<String>,
    pub registered_at: DateTime<Utc>,
}
