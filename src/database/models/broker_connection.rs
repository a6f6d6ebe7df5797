use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Broker name of the only supported integration.
pub const UPSTOX: &str = "upstox";

/// One user's credentials and tokens for one broker. Secret fields hold
/// `CredentialCipher` output, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConnection {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub broker_name: String,
    #[sqlx(rename = "upstox_api_key_encrypted")]
    #[serde(skip_serializing)]
    pub api_key_encrypted: String,
    #[sqlx(rename = "upstox_api_secret_encrypted")]
    #[serde(skip_serializing)]
    pub api_secret_encrypted: String,
    #[sqlx(rename = "upstox_redirect_uri")]
    pub redirect_uri: String,
    #[serde(skip_serializing)]
    pub access_token_encrypted: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token_encrypted: Option<String>,
    pub token_valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl BrokerConnection {
    pub fn has_credentials(&self) -> bool {
        !self.api_key_encrypted.is_empty() && !self.api_secret_encrypted.is_empty()
    }

    /// Connected means an access token is stored and its validity is strictly in the future.
    pub fn is_connected_at(&self, now: DateTime<Utc>) -> bool {
        self.access_token_encrypted.is_some()
            && self.token_valid_until.map_or(false, |until| until > now)
    }
}

/// Encrypted credential fields written by an upsert.
#[derive(Debug, Clone)]
pub struct NewCredentials {
    pub api_key_encrypted: String,
    pub api_secret_encrypted: String,
    pub redirect_uri: String,
}

/// Encrypted token fields written after a successful code exchange.
#[derive(Debug, Clone)]
pub struct TokenUpdate {
    pub access_token_encrypted: String,
    pub refresh_token_encrypted: Option<String>,
    pub token_valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub connection_id: Uuid,
    pub created: bool,
}
