// handlers/protected/grades.rs - course grades

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::{GradeRequest, GradeUpdate, Nota};
use crate::middleware::{ApiJson, ApiPath, ApiResponse, ApiResult, AuthUser};
use crate::tenant::TenantContext;

/// GET /api/grades - scoped to what the caller may see
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<Nota>> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::success(state.grades.list_grades(&tenant, &caller).await?))
}

/// GET /api/grades/course/:id
pub async fn by_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(course_id): ApiPath<i64>,
) -> ApiResult<Vec<Nota>> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    let grades = state.grades.list_course_grades(&tenant, &caller, course_id).await?;
    Ok(ApiResponse::success(grades))
}

/// POST /api/grades - array of grades
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<Vec<GradeRequest>>,
) -> ApiResult<Vec<Nota>> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::created(state.grades.create_grades(&tenant, &caller, body).await?))
}

/// PUT /api/grades/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<GradeUpdate>,
) -> ApiResult<Nota> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    Ok(ApiResponse::success(state.grades.update_grade(&tenant, &caller, id, body).await?))
}

/// DELETE /api/grades/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let caller = state.users.require_user(&tenant, &user.email).await?;
    state.grades.delete_grade(&tenant, &caller, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
