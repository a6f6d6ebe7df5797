use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{JwtError, JwtKeys};
use crate::crypto::{CredentialCipher, CryptoError};
use crate::database::models::{BrokerConnection, NewCredentials, TokenUpdate, UpsertOutcome, UPSTOX};
use crate::database::{DatabaseError, Store};
use crate::services::upstox::{next_session_reset, TokenExchange, UpstoxClient, UpstoxError};

const STATE_PURPOSE: &str = "upstox_oauth_state";

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection not found")]
    NotFound,
    #[error("authorization state is invalid or expired")]
    InvalidState,
    #[error("upstream rejected token exchange with status {status}")]
    UpstreamRejected { status: u16 },
    #[error(transparent)]
    Upstox(UpstoxError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<UpstoxError> for BrokerError {
    fn from(err: UpstoxError) -> Self {
        match err {
            UpstoxError::Rejected { status, body } => {
                tracing::error!(status, body = %body, "Upstox token error");
                BrokerError::UpstreamRejected { status }
            }
            other => BrokerError::Upstox(other),
        }
    }
}

/// Signed OAuth `state` payload binding the dialog to one user for a short window.
#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    sub: Uuid,
    purpose: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationUrl {
    pub auth_url: String,
    pub state: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOutcome {
    pub token_valid_until: DateTime<Utc>,
    pub has_extended_token: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConnectionStatus {
    #[serde(rename_all = "camelCase")]
    Missing {
        is_connected: bool,
        has_credentials: bool,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Present {
        is_connected: bool,
        has_credentials: bool,
        is_active: bool,
        token_valid_until: Option<DateTime<Utc>>,
        connection_id: Uuid,
        created_at: DateTime<Utc>,
    },
}

impl ConnectionStatus {
    fn from_connection(connection: Option<BrokerConnection>, now: DateTime<Utc>) -> Self {
        match connection {
            None => ConnectionStatus::Missing {
                is_connected: false,
                has_credentials: false,
                message: "No Upstox connection found".to_string(),
            },
            Some(conn) => ConnectionStatus::Present {
                is_connected: conn.is_connected_at(now),
                has_credentials: conn.has_credentials(),
                is_active: conn.is_active,
                token_valid_until: conn.token_valid_until,
                connection_id: conn.connection_id,
                created_at: conn.created_at,
            },
        }
    }
}

/// Upstox credential lifecycle: store credentials, authorize, exchange, report, disconnect.
pub struct BrokerService {
    store: Arc<dyn Store>,
    cipher: CredentialCipher,
    upstox: UpstoxClient,
    state_keys: JwtKeys,
    authorization_window_secs: u64,
}

impl BrokerService {
    pub fn new(
        store: Arc<dyn Store>,
        cipher: CredentialCipher,
        upstox: UpstoxClient,
        state_keys: JwtKeys,
        authorization_window_secs: u64,
    ) -> Self {
        Self {
            store,
            cipher,
            upstox,
            state_keys,
            authorization_window_secs,
        }
    }

    async fn connection(&self, user_id: Uuid) -> Result<BrokerConnection, BrokerError> {
        self.store
            .find_connection(user_id, UPSTOX)
            .await?
            .ok_or(BrokerError::NotFound)
    }

    pub async fn upsert_credentials(
        &self,
        user_id: Uuid,
        api_key: &str,
        api_secret: &str,
        redirect_uri: &str,
    ) -> Result<UpsertOutcome, BrokerError> {
        let credentials = NewCredentials {
            api_key_encrypted: self.cipher.encrypt(api_key)?,
            api_secret_encrypted: self.cipher.encrypt(api_secret)?,
            redirect_uri: redirect_uri.to_string(),
        };

        let outcome = self.store.upsert_credentials(user_id, UPSTOX, &credentials).await?;
        tracing::info!(
            %user_id,
            connection_id = %outcome.connection_id,
            created = outcome.created,
            "Saved Upstox credentials"
        );
        Ok(outcome)
    }

    pub async fn build_authorization_url(&self, user_id: Uuid) -> Result<AuthorizationUrl, BrokerError> {
        let connection = self.connection(user_id).await?;
        let client_id = self.cipher.decrypt(&connection.api_key_encrypted)?;

        let state = self.issue_state(user_id, Utc::now())?;
        let url = self
            .upstox
            .authorization_url(&client_id, &connection.redirect_uri, &state)?;

        Ok(AuthorizationUrl {
            auth_url: url.to_string(),
            state,
            expires_in: self.authorization_window_secs,
        })
    }

    /// Exchange an authorization code and persist the resulting tokens.
    /// Stored tokens are left untouched on any failure.
    pub async fn exchange_code(
        &self,
        user_id: Uuid,
        code: &str,
        state: Option<&str>,
    ) -> Result<ExchangeOutcome, BrokerError> {
        let connection = self.connection(user_id).await?;

        // An empty state is treated the same as an absent one
        if let Some(state) = state.filter(|s| !s.is_empty()) {
            self.verify_state(user_id, state)?;
        }

        let client_id = self.cipher.decrypt(&connection.api_key_encrypted)?;
        let client_secret = self.cipher.decrypt(&connection.api_secret_encrypted)?;

        let grant = self
            .upstox
            .exchange_code(&TokenExchange {
                code,
                client_id: &client_id,
                client_secret: &client_secret,
                redirect_uri: &connection.redirect_uri,
            })
            .await?;

        let token_valid_until = next_session_reset(Utc::now());
        let tokens = TokenUpdate {
            access_token_encrypted: self.cipher.encrypt(&grant.access_token)?,
            refresh_token_encrypted: grant
                .refresh_token
                .as_deref()
                .map(|t| self.cipher.encrypt(t))
                .transpose()?,
            token_valid_until,
        };
        self.store.store_tokens(connection.connection_id, &tokens).await?;

        tracing::info!(
            %user_id,
            connection_id = %connection.connection_id,
            %token_valid_until,
            "Upstox connection established"
        );
        Ok(ExchangeOutcome {
            token_valid_until,
            has_extended_token: grant.extended_token.is_some(),
        })
    }

    pub async fn get_status(&self, user_id: Uuid) -> Result<ConnectionStatus, BrokerError> {
        let connection = self.store.find_connection(user_id, UPSTOX).await?;
        Ok(ConnectionStatus::from_connection(connection, Utc::now()))
    }

    pub async fn disconnect(&self, user_id: Uuid) -> Result<Uuid, BrokerError> {
        let connection_id = self
            .store
            .delete_connection(user_id, UPSTOX)
            .await?
            .ok_or(BrokerError::NotFound)?;
        tracing::info!(%user_id, %connection_id, "Disconnected Upstox");
        Ok(connection_id)
    }

    fn issue_state(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, BrokerError> {
        let claims = StateClaims {
            sub: user_id,
            purpose: STATE_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.authorization_window_secs as i64)).timestamp(),
        };
        Ok(self.state_keys.sign(&claims)?)
    }

    fn verify_state(&self, user_id: Uuid, state: &str) -> Result<(), BrokerError> {
        let claims: StateClaims = self.state_keys.verify(state).map_err(|e| {
            tracing::warn!(%user_id, "Rejected OAuth state: {}", e);
            BrokerError::InvalidState
        })?;
        if claims.purpose != STATE_PURPOSE || claims.sub != user_id {
            tracing::warn!(%user_id, "OAuth state issued for a different user or purpose");
            return Err(BrokerError::InvalidState);
        }
        Ok(())
    }
}
