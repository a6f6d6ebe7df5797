// handlers/protected/broker/mod.rs - Upstox connection management
//
// Every route here runs behind jwt_auth_middleware and acts on the
// connection owned by the authenticated user.

pub mod auth_url;
pub mod callback;
pub mod credentials;
pub mod disconnect;
pub mod status;

pub use auth_url::auth_url_get;
pub use callback::callback_post;
pub use credentials::credentials_post;
pub use disconnect::disconnect_delete;
pub use status::status_get;
