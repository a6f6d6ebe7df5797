// handlers/mod.rs - HTTP handlers grouped by access level
//
// public/    - token acquisition, no bearer token required
// protected/ - require a bearer token (jwt_auth_middleware injects AuthUser)

pub mod protected;
pub mod public;
