use std::sync::Arc;

use log::{info, warn};
use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    util::KeyedLocks, Config, CredentialData, CredentialError, CredentialStore, DatabaseError,
};

use super::{HttpRequest, HttpTransport};

/// The body of a successful answer from the token endpoint.
/// Every field is optional since what is required depends on the grant.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum TokenRequestError {
    #[error("{0}")]
    Transport(String),
    #[error("token endpoint answered {status}")]
    Rejected { status: u16, body: String },
    #[error("token endpoint answered with an unreadable body")]
    Malformed,
}

/// Posts a grant to the token endpoint, with the client credentials added
pub(crate) async fn request_token(
    transport: &dyn HttpTransport,
    config: &Config,
    grant: &[(&str, &str)],
) -> Result<TokenResponse, TokenRequestError> {
    let mut params = grant.to_vec();
    params.push(("client_id", config.client_id.as_str()));
    params.push(("client_secret", config.client_secret.as_str()));

    let request = HttpRequest::new(Method::POST, &config.token_url).form(&params);

    let response = transport
        .send(request)
        .await
        .map_err(|e| TokenRequestError::Transport(e.0))?;

    if response.status != 200 {
        return Err(TokenRequestError::Rejected {
            status: response.status,
            body: response.body,
        });
    }

    serde_json::from_str(&response.body).map_err(|_| TokenRequestError::Malformed)
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("No refresh token is stored for this user")]
    MissingRefreshToken,
    #[error("Spotify rejected the refresh with status {0}")]
    Rejected(u16),
    #[error("Spotify answered the refresh without a usable access token")]
    Malformed,
    #[error("Network error while refreshing: {0}")]
    Transport(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<CredentialError> for RefreshError {
    fn from(value: CredentialError) -> Self {
        match value {
            CredentialError::InvalidExpiry(_) => Self::Malformed,
            CredentialError::Database(e) => Self::Database(e),
        }
    }
}

/// Exchanges stored refresh tokens for new access tokens
#[derive(Clone)]
pub struct TokenRefresher {
    config: Arc<Config>,
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialStore,
    locks: Arc<KeyedLocks<String>>,
}

impl TokenRefresher {
    pub fn new(
        config: &Arc<Config>,
        transport: &Arc<dyn HttpTransport>,
        credentials: &CredentialStore,
    ) -> Self {
        Self {
            config: config.clone(),
            transport: transport.clone(),
            credentials: credentials.clone(),
            locks: Default::default(),
        }
    }

    /// Refreshes the access token of a user, whether it has expired or not
    pub async fn refresh(&self, user_key: &str) -> Result<CredentialData, RefreshError> {
        let _guard = self.locks.lock(&user_key.to_string()).await;

        self.refresh_locked(user_key).await
    }

    /// Returns a usable credential, refreshing it first if it has expired.
    /// If another task refreshed the credential while this one waited, no request is made.
    pub async fn ensure_fresh(&self, user_key: &str) -> Result<CredentialData, RefreshError> {
        let _guard = self.locks.lock(&user_key.to_string()).await;

        match self.credentials.get(user_key).await? {
            Some(credential) if !credential.is_expired() => Ok(credential),
            Some(_) => self.refresh_locked(user_key).await,
            None => Err(RefreshError::MissingRefreshToken),
        }
    }

    async fn refresh_locked(&self, user_key: &str) -> Result<CredentialData, RefreshError> {
        let credential = self
            .credentials
            .get(user_key)
            .await?
            .ok_or(RefreshError::MissingRefreshToken)?;

        let refresh_token = credential
            .usable_refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;

        let response = request_token(
            self.transport.as_ref(),
            &self.config,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
        .await
        .map_err(|e| {
            warn!("Refreshing token for {} failed: {}", user_key, e);

            match e {
                TokenRequestError::Transport(message) => RefreshError::Transport(message),
                TokenRequestError::Rejected { status, body: _ } => RefreshError::Rejected(status),
                TokenRequestError::Malformed => RefreshError::Malformed,
            }
        })?;

        let access_token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::Malformed)?;

        let token_type = response
            .token_type
            .unwrap_or_else(|| credential.token_type.clone());
        let expires_in = response
            .expires_in
            .unwrap_or(Config::DEFAULT_EXPIRES_IN_SECONDS);

        // Spotify usually leaves out the refresh token, in which case the old one stays valid
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or(credential.refresh_token.clone());

        let updated = self
            .credentials
            .upsert(
                user_key,
                &access_token,
                &token_type,
                expires_in,
                refresh_token.as_deref(),
            )
            .await?;

        info!("Refreshed Spotify token for {}", user_key);

        Ok(updated)
    }
}
