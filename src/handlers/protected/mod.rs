// handlers/protected/mod.rs - JWT authenticated handlers
//
// Everything except /auth/me also runs behind resolve_tenant_middleware, so
// handlers receive both Extension<AuthUser> and Extension<TenantContext>.
pub mod assignments;
pub mod auth;
pub mod courses;
pub mod forum;
pub mod grades;
pub mod usuarios;
