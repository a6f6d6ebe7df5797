use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{BrokerConnection, NewCredentials, PlatformUser, TokenUpdate, UpsertOutcome};
use super::store::Store;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, PlatformUser>,
    connections: HashMap<Uuid, BrokerConnection>,
}

impl Tables {
    fn connection_for(&mut self, user_id: Uuid, broker_name: &str) -> Option<&mut BrokerConnection> {
        self.connections
            .values_mut()
            .find(|c| c.user_id == user_id && c.broker_name == broker_name)
    }
}

/// In-process store for `serve --memory` and tests. Contents are lost on exit.
///
/// Every operation takes the table lock once, so upserts are atomic and the
/// uniqueness rules match the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connection_count(&self) -> usize {
        self.tables.read().await.connections.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<PlatformUser>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<PlatformUser, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(DatabaseError::Conflict(format!("email {} already exists", email)));
        }

        let user = PlatformUser {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn find_connection(
        &self,
        user_id: Uuid,
        broker_name: &str,
    ) -> Result<Option<BrokerConnection>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .connections
            .values()
            .find(|c| c.user_id == user_id && c.broker_name == broker_name)
            .cloned())
    }

    async fn upsert_credentials(
        &self,
        user_id: Uuid,
        broker_name: &str,
        credentials: &NewCredentials,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(DatabaseError::NotFound("User not found".to_string()));
        }

        if let Some(existing) = tables.connection_for(user_id, broker_name) {
            existing.api_key_encrypted = credentials.api_key_encrypted.clone();
            existing.api_secret_encrypted = credentials.api_secret_encrypted.clone();
            existing.redirect_uri = credentials.redirect_uri.clone();
            existing.is_active = true;
            existing.access_token_encrypted = None;
            existing.refresh_token_encrypted = None;
            existing.token_valid_until = None;
            return Ok(UpsertOutcome {
                connection_id: existing.connection_id,
                created: false,
            });
        }

        let connection = BrokerConnection {
            connection_id: Uuid::new_v4(),
            user_id,
            broker_name: broker_name.to_string(),
            api_key_encrypted: credentials.api_key_encrypted.clone(),
            api_secret_encrypted: credentials.api_secret_encrypted.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            access_token_encrypted: None,
            refresh_token_encrypted: None,
            token_valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let connection_id = connection.connection_id;
        tables.connections.insert(connection_id, connection);
        Ok(UpsertOutcome {
            connection_id,
            created: true,
        })
    }

    async fn store_tokens(&self, connection_id: Uuid, tokens: &TokenUpdate) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let connection = tables
            .connections
            .get_mut(&connection_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("Connection {} not found", connection_id)))?;

        connection.access_token_encrypted = Some(tokens.access_token_encrypted.clone());
        connection.refresh_token_encrypted = tokens.refresh_token_encrypted.clone();
        connection.token_valid_until = Some(tokens.token_valid_until);
        connection.is_active = true;
        Ok(())
    }

    async fn delete_connection(&self, user_id: Uuid, broker_name: &str) -> Result<Option<Uuid>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let id = tables
            .connections
            .values()
            .find(|c| c.user_id == user_id && c.broker_name == broker_name)
            .map(|c| c.connection_id);
        if let Some(id) = id {
            tables.connections.remove(&id);
        }
        Ok(id)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
