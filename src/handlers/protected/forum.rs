// handlers/protected/forum.rs - tenant forum

use axum::{extract::State, Extension};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{
    CreateReplyRequest, CreateThreadRequest, ForumCategory, ForumReply, ThreadDetail, ThreadSummary,
};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::{Author, ThreadQuery};
use crate::tenant::TenantContext;

/// GET /api/forum/threads?category=&search=
pub async fn threads_list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(query): ApiQuery<ThreadQuery>,
) -> ApiResult<Vec<ThreadSummary>> {
    Ok(ApiResponse::success(state.forum.list_threads(&tenant, &query).await?))
}

/// GET /api/forum/threads/:id - counts as a view
pub async fn thread_show(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ThreadDetail> {
    Ok(ApiResponse::success(state.forum.get_thread(&tenant, id).await?))
}

/// POST /api/forum/threads
pub async fn thread_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<CreateThreadRequest>,
) -> ApiResult<ThreadSummary> {
    let row = state.users.require_user(&tenant, &user.email).await?;
    let author = Author { subject: &user.sub, user: &row };
    let thread = state.forum.create_thread(&tenant, &author, body).await?;
    Ok(ApiResponse::created(thread))
}

/// POST /api/forum/replies
pub async fn reply_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<CreateReplyRequest>,
) -> ApiResult<ForumReply> {
    let row = state.users.require_user(&tenant, &user.email).await?;
    let author = Author { subject: &user.sub, user: &row };
    let reply = state.forum.create_reply(&tenant, &author, body).await?;
    Ok(ApiResponse::created(reply))
}

/// DELETE /api/forum/threads/:id - owner only
pub async fn thread_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Value> {
    state.forum.delete_thread(&tenant, &user.sub, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// DELETE /api/forum/replies/:id - owner only
pub async fn reply_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Value> {
    state.forum.delete_reply(&tenant, &user.sub, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// GET /api/forum/categories
pub async fn categories_list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<ForumCategory>> {
    Ok(ApiResponse::success(state.forum.list_categories(&tenant).await?))
}
