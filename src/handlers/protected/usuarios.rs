// handlers/protected/usuarios.rs - tenant user listing and role management

use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{Rol, Usuario};
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiPath, ApiResponse, ApiResult, AuthUser};
use crate::tenant::TenantContext;

/// The path tenant must be the caller's own, and the caller must hold one of `allowed`
async fn authorize(
    state: &AppState,
    user: &AuthUser,
    tenant: &TenantContext,
    path_tenant: &str,
    allowed: &[Rol],
) -> Result<Usuario, ApiError> {
    if !path_tenant.eq_ignore_ascii_case(&tenant.key) {
        return Err(ApiError::forbidden("Cannot access another tenant's users"));
    }
    let caller = state.users.require_user(tenant, &user.email).await?;
    if !allowed.contains(&caller.rol) {
        return Err(ApiError::forbidden(format!("Role {} cannot manage users", caller.rol)));
    }
    Ok(caller)
}

/// GET /api/usuarios/:tenant - Director or Profesor of that tenant
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(path_tenant): ApiPath<String>,
) -> ApiResult<Vec<Usuario>> {
    authorize(&state, &user, &tenant, &path_tenant, &[Rol::Director, Rol::Profesor]).await?;
    Ok(ApiResponse::success(state.users.list_users(&tenant).await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    #[serde(default)]
    pub rol: String,
}

/// PUT/PATCH /api/usuarios/:tenant/:id/rol - Director of that tenant
pub async fn update_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath((path_tenant, id)): ApiPath<(String, i64)>,
    ApiJson(body): ApiJson<RoleUpdate>,
) -> ApiResult<Usuario> {
    authorize(&state, &user, &tenant, &path_tenant, &[Rol::Director]).await?;
    let rol: Rol = body.rol.parse().map_err(ApiError::validation_error)?;
    Ok(ApiResponse::success(state.users.update_role(&tenant, id, rol).await?))
}
