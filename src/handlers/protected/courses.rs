// handlers/protected/courses.rs - courses and enrollments

use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::{CourseMember, CourseRequest, Curso, EnrollRequest, Inscripcion, Usuario};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::tenant::TenantContext;

/// GET /api/courses
pub async fn list(State(state): State<AppState>, Extension(tenant): Extension<TenantContext>) -> ApiResult<Vec<Curso>> {
    Ok(ApiResponse::success(state.courses.list_courses(&tenant).await?))
}

/// POST /api/courses - Director
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<CourseRequest>,
) -> ApiResult<Curso> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::created(state.courses.create_course(&tenant, &caller, body).await?))
}

/// GET /api/courses/my-courses
pub async fn mine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<Curso>> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::success(state.courses.my_courses(&tenant, &caller).await?))
}

/// PUT /api/courses/:id - Director
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CourseRequest>,
) -> ApiResult<Curso> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::success(state.courses.update_course(&tenant, &caller, id, body).await?))
}

/// DELETE /api/courses/:id - Director
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    state.courses.delete_course(&tenant, &caller, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// GET /api/courses/:id/enrollments - Director, or Profesor enrolled in the course
pub async fn enrollments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Vec<CourseMember>> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::success(state.courses.course_enrollments(&tenant, &caller, id).await?))
}

/// GET /api/courses/:id/students - same access as enrollments
pub async fn students(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Vec<Usuario>> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::success(state.courses.course_students(&tenant, &caller, id).await?))
}

/// POST /api/courses/enroll
pub async fn enroll(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<EnrollRequest>,
) -> ApiResult<Inscripcion> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::created(state.courses.enroll(&tenant, &caller, body).await?))
}

/// DELETE /api/courses/enroll/:id
pub async fn unenroll(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    state.courses.unenroll(&tenant, &caller, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct AssignTeacherQuery {
    pub profesor_id: i64,
}

/// POST /api/courses/:id/assign-teacher?profesor_id= - Director
pub async fn assign_teacher(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<AssignTeacherQuery>,
) -> ApiResult<Curso> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    let curso = state
        .courses
        .assign_teacher(&tenant, &caller, id, query.profesor_id)
        .await?;
    Ok(ApiResponse::success(curso))
}
