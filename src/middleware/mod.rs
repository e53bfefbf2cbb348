pub mod auth;
pub mod extract;
pub mod response;
pub mod tenant;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use response::{ApiResponse, ApiResult};
pub use tenant::resolve_tenant_middleware;
