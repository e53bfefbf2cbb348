// handlers/public/mod.rs - Public handlers (no authentication required)
pub mod auth;
pub mod meta;

pub use auth::login;
pub use meta::{health, roles_list, root, tenants_list};
