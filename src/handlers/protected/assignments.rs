// handlers/protected/assignments.rs - course assignments

use axum::{
    extract::State,
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::{Assignment, AssignmentCompletion, CompleteAssignmentRequest, CreateAssignmentRequest};
use crate::middleware::{ApiJson, ApiPath, ApiResponse, ApiResult, AuthUser};
use crate::services::CourseAssignments;
use crate::tenant::TenantContext;

/// GET /api/courses/:id/assignments - Estudiante or Profesor enrolled in the course
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(curso_id): ApiPath<i64>,
) -> ApiResult<CourseAssignments> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    let listed = state
        .assignments
        .list_course_assignments(&tenant, &caller, curso_id)
        .await?;
    Ok(ApiResponse::success(listed))
}

/// POST /api/courses/:id/assignments - Profesor assigned to the course
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(curso_id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateAssignmentRequest>,
) -> ApiResult<Assignment> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    let created = state
        .assignments
        .create_assignment(&tenant, &caller, curso_id, body)
        .await?;
    Ok(ApiResponse::created(created))
}

/// GET /api/assignments/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Assignment> {
    Ok(ApiResponse::success(state.assignments.get_assignment(&tenant, id).await?))
}

/// POST /api/assignments/:id/complete - Estudiante enrolled in the assignment's course
pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
    body: Option<Json<CompleteAssignmentRequest>>,
) -> ApiResult<AssignmentCompletion> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    let submitted = body.and_then(|Json(b)| b.submitted_content);
    let completion = state
        .assignments
        .complete_assignment(&tenant, &caller, id, submitted)
        .await?;
    Ok(ApiResponse::success(completion))
}
