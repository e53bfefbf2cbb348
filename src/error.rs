// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::auth::AuthError;
use crate::database::{DatabaseError, StoreError};
use crate::services::ServiceError;
use crate::tenant::TenantError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError(String),
    InvalidJson(String),
    UnsupportedDomain(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (identity provider or REST backend)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError(_) => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::UnsupportedDomain(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::ValidationError(msg)
            | ApiError::InvalidJson(msg)
            | ApiError::UnsupportedDomain(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.message(),
            "code": self.error_code()
        })
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::UnsupportedDomain(_) => "UNSUPPORTED_DOMAIN",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        ApiError::ValidationError(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConfigMissing(what) => {
                tracing::error!("Database not configured: {} missing", what);
                ApiError::service_unavailable("Database not configured")
            }
            DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("DATABASE_URL could not be parsed");
                ApiError::service_unavailable("Database not configured")
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_)) => {
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => {
                tracing::debug!("Store reported not found: {}", msg);
                ApiError::not_found("Record not found")
            }
            StoreError::Conflict(msg) => {
                tracing::debug!("Store reported conflict: {}", msg);
                ApiError::conflict("Record already exists")
            }
            StoreError::InvalidIdentifier(name) => ApiError::bad_request(format!("Invalid identifier '{}'", name)),
            StoreError::Upstream { status, message } => {
                tracing::error!("REST backend returned {}: {}", status, message);
                ApiError::bad_gateway("Storage backend error")
            }
            StoreError::Decode(msg) => {
                tracing::error!("Row decode error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            StoreError::Database(db) => db.into(),
            StoreError::Http(e) => {
                tracing::error!("REST backend unreachable: {}", e);
                ApiError::bad_gateway("Storage backend unreachable")
            }
        }
    }
}

impl From<TenantError> for ApiError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::InvalidEmail(_) => ApiError::bad_request("Token email is not a valid address"),
            TenantError::UnsupportedDomain(domain) => {
                ApiError::UnsupportedDomain(format!("Domain not supported: {}", domain))
            }
            TenantError::UnknownTenant(key) => ApiError::not_found(format!("Unknown tenant: {}", key)),
            TenantError::InvalidDefinition(msg) => {
                tracing::error!("Invalid tenant definition: {}", msg);
                ApiError::internal_server_error("Tenant configuration error")
            }
            TenantError::Store(e) => e.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::Validation(msg) => ApiError::validation_error(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken(msg) => ApiError::unauthorized(msg),
            AuthError::InvalidToken(reason) => {
                tracing::debug!("Rejected token: {}", reason);
                ApiError::unauthorized("Invalid or expired token")
            }
            AuthError::NotConfigured(what) => {
                tracing::error!("Authentication not configured: {}", what);
                ApiError::service_unavailable("Authentication not configured")
            }
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            AuthError::Unreachable(reason) => {
                tracing::error!("Identity provider unreachable: {}", reason);
                ApiError::bad_gateway("Identity provider unreachable")
            }
            AuthError::Upstream(status) => {
                tracing::error!("Identity provider returned {}", status);
                ApiError::bad_gateway("Identity provider error")
            }
        }
    }
}

// Extractor rejections keep axum's description but use our body shape
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_tenant_errors() {
        let err: ApiError = TenantError::UnsupportedDomain("example.com".into()).into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json()["code"], "UNSUPPORTED_DOMAIN");
        assert_eq!(err.to_json()["error"], "Domain not supported: example.com");
    }

    #[test]
    fn hides_backend_details() {
        let err: ApiError = StoreError::Upstream {
            status: 500,
            message: "relation \"secret_table\" does not exist".into(),
        }
        .into();
        assert_eq!(err.status_code(), 502);
        assert!(!err.message().contains("secret_table"));
    }

    #[test]
    fn hides_store_messages_on_not_found_and_conflict() {
        let missing: ApiError = StoreError::NotFound("relation \"public.tenant_x_forum_threads\" does not exist".into()).into();
        assert_eq!(missing.status_code(), 404);
        assert_eq!(missing.message(), "Record not found");

        let duplicate: ApiError =
            StoreError::Conflict("duplicate key value violates unique constraint \"usuarios_email_key\"".into()).into();
        assert_eq!(duplicate.status_code(), 409);
        assert_eq!(duplicate.message(), "Record already exists");
        assert!(!duplicate.to_json().to_string().contains("usuarios_email_key"));
    }

    #[test]
    fn maps_service_errors() {
        let forbidden: ApiError = ServiceError::Forbidden("no".into()).into();
        assert_eq!(forbidden.status_code(), 403);
        let conflict: ApiError = ServiceError::Store(StoreError::Conflict("dup".into())).into();
        assert_eq!(conflict.error_code(), "CONFLICT");
        let enrolled: ApiError = ServiceError::Conflict("User 3 is already enrolled in course 10".into()).into();
        assert_eq!((enrolled.status_code(), enrolled.message()), (409, "User 3 is already enrolled in course 10"));
        let login: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!((login.status_code(), login.message()), (401, "Invalid credentials"));
    }
}
