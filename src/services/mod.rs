pub mod auth_service;
pub mod broker_service;
pub mod upstox;

pub use auth_service::{AuthError, AuthService};
pub use broker_service::{BrokerError, BrokerService};
pub use upstox::UpstoxClient;
