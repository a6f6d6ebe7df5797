// handlers/public/auth/mod.rs - Public authentication handlers
//
// Token acquisition endpoints that do not require authentication.

pub mod login;  // POST /auth/login - authenticate and get JWT
pub mod signup; // POST /auth/signup - create new account

pub use login::login_post;
pub use signup::signup_post;
