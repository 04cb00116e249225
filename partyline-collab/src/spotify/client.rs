use std::sync::Arc;

use log::warn;
use serde_json::{json, Value};

use crate::{Config, CredentialStore};

use super::{
    ApiError, ApiMethod, ApiResponse, ApiResult, HttpRequest, HttpTransport, TokenRefresher,
};

/// Calls the Spotify player API on behalf of a user, refreshing their token when needed
#[derive(Clone)]
pub struct SpotifyClient {
    config: Arc<Config>,
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialStore,
    refresher: TokenRefresher,
}

impl SpotifyClient {
    pub fn new(
        config: &Arc<Config>,
        transport: &Arc<dyn HttpTransport>,
        credentials: &CredentialStore,
        refresher: &TokenRefresher,
    ) -> Self {
        Self {
            config: config.clone(),
            transport: transport.clone(),
            credentials: credentials.clone(),
            refresher: refresher.clone(),
        }
    }

    /// Calls an endpoint relative to the player API base, such as `player/next`.
    /// Every outcome is returned as a result, this never panics on a bad response.
    pub async fn call(&self, user_key: &str, endpoint: &str, method: ApiMethod) -> ApiResult {
        let credential = self
            .credentials
            .get(user_key)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?
            .ok_or(ApiError::NoCredential)?;

        let credential = if credential.is_expired() {
            self.refresher.ensure_fresh(user_key).await.map_err(|e| {
                warn!("Could not refresh token for {}: {}", user_key, e);
                ApiError::RefreshFailed
            })?
        } else {
            credential
        };

        let mut request = HttpRequest::new(method.into(), self.config.endpoint_url(endpoint))
            .header("Content-Type", "application/json")
            .header(
                "Authorization",
                format!("Bearer {}", credential.access_token),
            );

        // Player commands carry no body, but Spotify answers 411 without a length
        if matches!(method, ApiMethod::Post | ApiMethod::Put) {
            request = request.header("Content-Length", "0");
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiError::Network(e.0))?;

        if response.status == 204 {
            return Ok(ApiResponse::NoContent);
        }

        let payload: Value =
            serde_json::from_str(&response.body).map_err(|_| ApiError::Parse {
                status: response.status,
                raw: response.body.clone(),
            })?;

        if !matches!(response.status, 200 | 201) {
            let payload = payload
                .get("error")
                .cloned()
                .unwrap_or_else(|| json!({ "message": "Spotify API error" }));

            return Err(ApiError::Upstream {
                status: response.status,
                payload,
            });
        }

        Ok(ApiResponse::Json(payload))
    }
}
