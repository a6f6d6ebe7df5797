use async_trait::async_trait;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{BrokerConnection, NewCredentials, PlatformUser, TokenUpdate, UpsertOutcome};

/// Persistence for platform users and their broker connections.
///
/// Constructed once at startup and shared by the services through `AppState`.
#[async_trait]
pub trait Store: Send + Sync {
    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<PlatformUser>, DatabaseError>;

    /// Fails with `DatabaseError::Conflict` when the email is taken.
    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<PlatformUser, DatabaseError>;

    async fn find_connection(
        &self,
        user_id: Uuid,
        broker_name: &str,
    ) -> Result<Option<BrokerConnection>, DatabaseError>;

    /// Atomic insert-or-update keyed by `(user_id, broker_name)`. An update
    /// replaces the credentials, reactivates the connection and clears any
    /// stored tokens.
    async fn upsert_credentials(
        &self,
        user_id: Uuid,
        broker_name: &str,
        credentials: &NewCredentials,
    ) -> Result<UpsertOutcome, DatabaseError>;

    async fn store_tokens(&self, connection_id: Uuid, tokens: &TokenUpdate) -> Result<(), DatabaseError>;

    /// Returns the id of the deleted connection, if one existed.
    async fn delete_connection(&self, user_id: Uuid, broker_name: &str) -> Result<Option<Uuid>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
