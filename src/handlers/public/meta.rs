// handlers/public/meta.rs - service info, health and reference lists

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::Rol;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenant::TenantSummary;

/// GET / - service name, version and route map
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Campus API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/login (public), /auth/me (jwt)",
                "reference": "/api/tenants, /api/roles (public)",
                "users": "/api/auth/sync-user, /api/auth/user-profile, /api/usuarios/:tenant[/:id/rol] (jwt + tenant)",
                "assignments": "/api/courses/:id/assignments, /api/assignments/:id[/complete] (jwt + tenant)",
                "forum": "/api/forum/threads[/:id], /api/forum/replies[/:id], /api/forum/categories (jwt + tenant)",
            }
        }
    }))
}

/// GET /health - 200 when the storage backend answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "storage": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "storage unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}

/// GET /api/tenants - configured tenants without credentials
pub async fn tenants_list(State(state): State<AppState>) -> ApiResult<Vec<TenantSummary>> {
    Ok(ApiResponse::success(state.tenants.list().await?))
}

/// GET /api/roles
pub async fn roles_list() -> ApiResult<Vec<Rol>> {
    Ok(ApiResponse::success(Rol::all().to_vec()))
}
