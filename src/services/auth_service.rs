use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password, PasswordHashError};
use crate::auth::{Claims, JwtError, JwtKeys};
use crate::database::models::user::normalize_email;
use crate::database::{DatabaseError, Store};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("user already exists")]
    Conflict,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error("blocking task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for AuthError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(_) => AuthError::Conflict,
            other => AuthError::Database(other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResult {
    pub user_id: Uuid,
    pub email: String,
}

/// Signup, login and bearer-token introspection for platform users.
pub struct AuthService {
    store: Arc<dyn Store>,
    keys: JwtKeys,
    token_expiry_hours: u64,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, keys: JwtKeys, token_expiry_hours: u64) -> Self {
        Self {
            store,
            keys,
            token_expiry_hours,
        }
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<SignupResult, AuthError> {
        let email = normalize_email(email);

        if self.store.find_user_by_email(&email).await?.is_some() {
            tracing::info!("Signup rejected, email already registered");
            return Err(AuthError::Conflict);
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))??;

        // A concurrent signup for the same email surfaces here as Conflict
        let user = self.store.insert_user(&email, &password_hash).await?;
        tracing::info!(user_id = %user.user_id, "Registered platform user");

        Ok(SignupResult {
            user_id: user.user_id,
            email: user.email,
        })
    }

    /// Returns a signed session token. Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            tracing::warn!("Login failed for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let stored = user.password_hash.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&stored, &password))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))?;

        if !matches {
            tracing::warn!(user_id = %user.user_id, "Login failed, password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let claims = Claims::new(user.user_id, user.email, self.token_expiry_hours);
        let token = self.keys.sign(&claims)?;
        tracing::info!(user_id = %user.user_id, "Issued session token");
        Ok(token)
    }

    /// Verify a bearer token and return its claims without touching the store.
    pub fn introspect(&self, token: Option<&str>) -> Result<Claims, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Unauthorized("missing token".to_string()))?;

        self.keys
            .verify::<Claims>(token)
            .map_err(|e| AuthError::Unauthorized(e.to_string()))
    }
}
