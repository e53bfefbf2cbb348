// handlers/protected/auth.rs - caller identity and user sync

use axum::{extract::State, Extension};
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::Usuario;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::tenant::TenantContext;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub sub: String,
    pub email: String,
    pub full_name: Option<String>,
    pub tenant: Option<String>,
}

/// GET /auth/me - claims summary; `tenant` is null when the domain is not served
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<MeResponse> {
    let tenant = state.tenants.resolve(&user.email).await.ok().map(|t| t.key);
    Ok(ApiResponse::success(MeResponse {
        sub: user.sub,
        email: user.email,
        full_name: user.full_name,
        tenant,
    }))
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub user: Usuario,
    pub created: bool,
    pub tenant: String,
}

/// POST /api/auth/sync-user - 201 when the row was created, 200 when it already existed
pub async fn sync_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<SyncResponse> {
    let outcome = state
        .users
        .sync_user(&tenant, &user.email, user.full_name.as_deref())
        .await?;

    let created = outcome.created();
    let body = SyncResponse {
        user: outcome.user().clone(),
        created,
        tenant: tenant.key,
    };
    Ok(if created {
        ApiResponse::created(body)
    } else {
        ApiResponse::success(body)
    })
}

/// GET /api/auth/user-profile
pub async fn user_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Usuario> {
    Ok(ApiResponse::success(state.users.profile(&tenant, &user.email).await?))
}
