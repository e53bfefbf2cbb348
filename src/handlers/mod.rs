// handlers/mod.rs - two handler tiers
//
// public:    no authentication (/, /health, /auth/login, /api/tenants, /api/roles)
// protected: bearer JWT, and for everything under /api a resolved tenant
pub mod protected;
pub mod public;
