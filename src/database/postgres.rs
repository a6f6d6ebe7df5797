use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::models::{BrokerConnection, NewCredentials, PlatformUser, TokenUpdate, UpsertOutcome};
use super::store::Store;

const CONNECTION_COLUMNS: &str = r#"
    connection_id, user_id, broker_name,
    upstox_api_key_encrypted, upstox_api_secret_encrypted, upstox_redirect_uri,
    access_token_encrypted, refresh_token_encrypted, token_valid_until,
    is_active, created_at
"#;

/// PostgreSQL-backed store over a shared pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn classify(err: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return DatabaseError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return DatabaseError::NotFound("User not found".to_string());
        }
    }
    DatabaseError::Sqlx(err)
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<PlatformUser>, DatabaseError> {
        let user = sqlx::query_as::<_, PlatformUser>(
            "SELECT user_id, email, password_hash, created_at FROM platform_users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<PlatformUser, DatabaseError> {
        sqlx::query_as::<_, PlatformUser>(
            r#"
            INSERT INTO platform_users (email, password_hash)
            VALUES ($1, $2)
            RETURNING user_id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn find_connection(
        &self,
        user_id: Uuid,
        broker_name: &str,
    ) -> Result<Option<BrokerConnection>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM broker_connections WHERE user_id = $1 AND broker_name = $2",
            CONNECTION_COLUMNS
        );
        let connection = sqlx::query_as::<_, BrokerConnection>(&query)
            .bind(user_id)
            .bind(broker_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(connection)
    }

    async fn upsert_credentials(
        &self,
        user_id: Uuid,
        broker_name: &str,
        credentials: &NewCredentials,
    ) -> Result<UpsertOutcome, DatabaseError> {
        // xmax is zero only for freshly inserted tuples
        let (connection_id, created): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO broker_connections (
                user_id, broker_name,
                upstox_api_key_encrypted, upstox_api_secret_encrypted, upstox_redirect_uri
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, broker_name) DO UPDATE SET
                upstox_api_key_encrypted = EXCLUDED.upstox_api_key_encrypted,
                upstox_api_secret_encrypted = EXCLUDED.upstox_api_secret_encrypted,
                upstox_redirect_uri = EXCLUDED.upstox_redirect_uri,
                is_active = TRUE,
                access_token_encrypted = NULL,
                refresh_token_encrypted = NULL,
                token_valid_until = NULL
            RETURNING connection_id, (xmax = 0) AS created
            "#,
        )
        .bind(user_id)
        .bind(broker_name)
        .bind(&credentials.api_key_encrypted)
        .bind(&credentials.api_secret_encrypted)
        .bind(&credentials.redirect_uri)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(UpsertOutcome { connection_id, created })
    }

    async fn store_tokens(&self, connection_id: Uuid, tokens: &TokenUpdate) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE broker_connections SET
                access_token_encrypted = $2,
                refresh_token_encrypted = $3,
                token_valid_until = $4,
                is_active = TRUE
            WHERE connection_id = $1
            "#,
        )
        .bind(connection_id)
        .bind(&tokens.access_token_encrypted)
        .bind(&tokens.refresh_token_encrypted)
        .bind(tokens.token_valid_until)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Connection {} not found", connection_id)));
        }
        Ok(())
    }

    async fn delete_connection(&self, user_id: Uuid, broker_name: &str) -> Result<Option<Uuid>, DatabaseError> {
        let deleted: Option<(Uuid,)> = sqlx::query_as(
            "DELETE FROM broker_connections WHERE user_id = $1 AND broker_name = $2 RETURNING connection_id",
        )
        .bind(user_id)
        .bind(broker_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deleted.map(|(id,)| id))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
