use anyhow::Context;
use std::sync::Arc;

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::crypto::CredentialCipher;
use crate::database::Store;
use crate::services::{AuthService, BrokerService, UpstoxClient};

/// Shared request context. Built once at startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub auth: Arc<AuthService>,
    pub broker: Arc<BrokerService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        config.validate()?;

        let keys = JwtKeys::from_secret(&config.security.jwt_secret).context("invalid JWT secret")?;
        let cipher = CredentialCipher::from_secret(&config.security.credential_key)
            .context("invalid credential encryption key")?;
        let upstox = UpstoxClient::new(&config.upstox).context("failed to build Upstox client")?;

        let auth = AuthService::new(store.clone(), keys.clone(), config.security.jwt_expiry_hours);
        let broker = BrokerService::new(
            store.clone(),
            cipher,
            upstox,
            keys,
            config.upstox.authorization_window_secs,
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            auth: Arc::new(auth),
            broker: Arc::new(broker),
        })
    }
}
