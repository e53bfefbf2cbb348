use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::auth::AuthUser;
use crate::app::AppState;
use crate::error::ApiError;

/// Resolves the caller's tenant from the email domain and injects the `TenantContext`.
/// Must run after `jwt_auth_middleware`.
pub async fn resolve_tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before tenant resolution"))?;

    let tenant = state.tenants.resolve(&auth_user.email).await.map_err(|e| {
        warn!("Tenant resolution failed for {}: {}", auth_user.email, e);
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}
