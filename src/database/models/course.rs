use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, Usuario};

/// Row of `<prefix>_cursos`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Curso {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub profesor_id: Option<i64>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of course create and update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseRequest {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCurso {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row of `<prefix>_inscripciones`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inscripcion {
    pub id: i64,
    pub usuario_id: i64,
    pub curso_id: i64,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EnrollRequest {
    pub usuario_id: i64,
    pub curso_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewInscripcion {
    pub usuario_id: i64,
    pub curso_id: i64,
    pub created_at: DateTime<Utc>,
}

/// An enrolled user together with the enrollment that links them to the course
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseMember {
    pub inscripcion_id: i64,
    pub enrolled_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub usuario: Usuario,
}
