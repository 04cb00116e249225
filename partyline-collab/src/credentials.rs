use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{CredentialData, Database, DatabaseError, OptionalResult, UpsertedCredential};

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The token lifetime cannot be turned into an expiry date
    #[error("Token lifetime of {0} seconds is out of range")]
    InvalidExpiry(i64),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Returns the instant a token that lives for the given amount of seconds expires,
/// or None if it would overflow
pub fn expiry_after(expires_in_seconds: i64) -> Option<DateTime<Utc>> {
    let lifetime = Duration::try_seconds(expires_in_seconds)?;

    Utc::now().checked_add_signed(lifetime)
}

/// Stores one Spotify credential per user key
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<dyn Database>,
}

impl CredentialStore {
    pub fn new(db: &Arc<dyn Database>) -> Self {
        Self { db: db.clone() }
    }

    /// Returns the credential of a user, if it exists
    pub async fn get(&self, user_key: &str) -> Result<Option<CredentialData>, DatabaseError> {
        self.db.credential_by_user_key(user_key).await.optional()
    }

    /// Creates or updates the credential of a user.
    /// The refresh token is only overwritten if a non-empty one is given.
    pub async fn upsert(
        &self,
        user_key: &str,
        access_token: &str,
        token_type: &str,
        expires_in_seconds: i64,
        refresh_token: Option<&str>,
    ) -> Result<CredentialData, CredentialError> {
        let expires_at = expiry_after(expires_in_seconds)
            .ok_or(CredentialError::InvalidExpiry(expires_in_seconds))?;

        let credential = self
            .db
            .upsert_credential(UpsertedCredential {
                user_key: user_key.to_string(),
                access_token: access_token.to_string(),
                refresh_token: refresh_token
                    .filter(|t| !t.is_empty())
                    .map(ToString::to_string),
                token_type: token_type.to_string(),
                expires_at,
            })
            .await?;

        Ok(credential)
    }

    /// Returns true if the user has no credential, or it has expired
    pub async fn is_expired(&self, user_key: &str) -> Result<bool, DatabaseError> {
        let credential = self.get(user_key).await?;

        Ok(credential.map(|c| c.is_expired()).unwrap_or(true))
    }
}
