pub mod broker_connection;
pub mod user;

pub use broker_connection::{BrokerConnection, NewCredentials, TokenUpdate, UpsertOutcome, UPSTOX};
pub use user::PlatformUser;
