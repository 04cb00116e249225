use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{info, warn};
use thiserror::Error;
use url::Url;

use crate::{
    spotify::{request_token, HttpTransport, TokenRequestError, TokenRefresher},
    util::random_string,
    Config, CredentialData, CredentialError, CredentialStore, DatabaseError, SPOTIFY_SCOPES,
};

const STATE_LENGTH: usize = 32;

/// How long a user has to finish logging in with Spotify
const STATE_LIFETIME_SECONDS: i64 = 600;

/// Links Spotify accounts to user keys with the authorization code flow
pub struct Auth {
    config: Arc<Config>,
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialStore,
    refresher: TokenRefresher,
    /// Logins that were started but not finished, keyed by the state sent to Spotify
    pending: DashMap<String, PendingLogin>,
}

struct PendingLogin {
    user_key: String,
    started_at: DateTime<Utc>,
}

impl PendingLogin {
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at > Duration::seconds(STATE_LIFETIME_SECONDS)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The user declined, or Spotify reported an error on the redirect
    #[error("{0}")]
    Denied(String),
    #[error("Authorization code not provided")]
    MissingCode,
    /// The state is unknown, was already used, or belongs to a login that took too long
    #[error("Invalid or expired login state")]
    UnknownState,
    #[error("Failed to authenticate with Spotify")]
    Exchange { status: u16, details: String },
    #[error("Incomplete token response from Spotify")]
    IncompleteResponse,
    #[error("Network error while authenticating: {0}")]
    Transport(String),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl From<CredentialError> for AuthError {
    fn from(value: CredentialError) -> Self {
        match value {
            CredentialError::InvalidExpiry(_) => Self::IncompleteResponse,
            CredentialError::Database(e) => Self::Db(e),
        }
    }
}

impl Auth {
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
            pending: DashMap::new(),
        }
    }

    /// Returns the url the user visits to grant access to their account.
    /// The url carries a one-time state that maps back to the user on the redirect,
    /// so the user key itself never leaves the server.
    pub fn authorization_url(&self, user_key: &str) -> Result<Url, url::ParseError> {
        let now = Utc::now();
        self.pending.retain(|_, login| !login.is_stale(now));

        let state = random_string(STATE_LENGTH);
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("scope", SPOTIFY_SCOPES),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("state", state.as_str()),
            ],
        )?;

        self.pending.insert(
            state,
            PendingLogin {
                user_key: user_key.to_string(),
                started_at: now,
            },
        );

        Ok(url)
    }

    /// Consumes the state of a started login, returning the user it belongs to
    fn take_login(&self, state: &str) -> Result<String, AuthError> {
        let (_, login) = self.pending.remove(state).ok_or(AuthError::UnknownState)?;

        if login.is_stale(Utc::now()) {
            return Err(AuthError::UnknownState);
        }

        Ok(login.user_key)
    }

    /// Exchanges the code Spotify redirected with for tokens,
    /// and stores them for the user that started the login with `state`
    pub async fn handle_callback(
        &self,
        state: &str,
        code: &str,
    ) -> Result<CredentialData, AuthError> {
        let user_key = self.take_login(state)?;
        let user_key = user_key.as_str();

        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let response = request_token(
            self.transport.as_ref(),
            &self.config,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .await
        .map_err(|e| match e {
            TokenRequestError::Transport(message) => AuthError::Transport(message),
            TokenRequestError::Rejected { status, body } => AuthError::Exchange {
                status,
                details: body,
            },
            TokenRequestError::Malformed => AuthError::IncompleteResponse,
        })?;

        let (access_token, token_type, expires_in) =
            match (response.access_token, response.token_type, response.expires_in) {
                (Some(access_token), Some(token_type), Some(expires_in))
                    if !access_token.is_empty() && !token_type.is_empty() && expires_in > 0 =>
                {
                    (access_token, token_type, expires_in)
                }
                _ => {
                    warn!("Spotify answered the code exchange with an incomplete response");
                    return Err(AuthError::IncompleteResponse);
                }
            };

        let credential = self
            .credentials
            .upsert(
                user_key,
                &access_token,
                &token_type,
                expires_in,
                response.refresh_token.as_deref(),
            )
            .await?;

        info!("Linked Spotify account to {}", user_key);

        Ok(credential)
    }

    /// Returns true if the user has a usable credential, refreshing it if it has expired
    pub async fn is_authenticated(&self, user_key: &str) -> bool {
        match self.credentials.get(user_key).await {
            Ok(Some(credential)) if !credential.is_expired() => true,
            Ok(Some(_)) => self.refresher.ensure_fresh(user_key).await.is_ok(),
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read credential of {}: {}", user_key, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;
    use crate::{spotify::mock::MockTransport, Database, MemoryDatabase};

    const TOKEN_PATH: &str = "/api/token";

    struct Fixture {
        transport: Arc<MockTransport>,
        credentials: CredentialStore,
        auth: Auth,
    }

    fn fixture() -> Fixture {
        let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new());
        let transport = MockTransport::new();
        let credentials = CredentialStore::new(&db);
        let config = Arc::new(Config {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://127.0.0.1:9050/v1/spotify/redirect".to_string(),
            ..Default::default()
        });

        let dyn_transport: Arc<dyn HttpTransport> = transport.clone();
        let refresher = TokenRefresher::new(&config, &dyn_transport, &credentials);
        let auth = Auth::new(&config, &dyn_transport, &credentials, &refresher);

        Fixture {
            transport,
            credentials,
            auth,
        }
    }

    /// Starts a login for the user, returning the state Spotify would redirect with
    fn start_login(fixture: &Fixture, user_key: &str) -> String {
        let url = fixture.auth.authorization_url(user_key).unwrap();

        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let fixture = fixture();
        let url = fixture.auth.authorization_url("my-session").unwrap();

        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(get("scope").as_deref(), Some(SPOTIFY_SCOPES));
        assert_eq!(get("response_type").as_deref(), Some("code"));
        assert_eq!(get("client_id").as_deref(), Some("client"));
        let state = get("state").unwrap();
        assert_eq!(state.len(), 32);
        assert!(!url.as_str().contains("my-session"));
        assert_eq!(
            get("redirect_uri").as_deref(),
            Some("http://127.0.0.1:9050/v1/spotify/redirect")
        );
    }

    #[tokio::test]
    async fn test_callback_stores_credential() {
        let fixture = fixture();
        fixture.transport.on(
            Method::POST,
            TOKEN_PATH,
            200,
            r#"{"access_token":"a","token_type":"Bearer","expires_in":3600,"refresh_token":"r"}"#,
        );

        let state = start_login(&fixture, "session");
        let credential = fixture
            .auth
            .handle_callback(&state, "the-code")
            .await
            .unwrap();
        assert_eq!(credential.access_token, "a");
        assert_eq!(credential.refresh_token.as_deref(), Some("r"));

        let body = fixture.transport.requests()[0].body.clone().unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=the-code"));
        assert!(body.contains("redirect_uri="));

        assert!(fixture.auth.is_authenticated("session").await);
    }

    #[tokio::test]
    async fn test_callback_rejects_incomplete_response() {
        let fixture = fixture();
        fixture.transport.on(
            Method::POST,
            TOKEN_PATH,
            200,
            r#"{"access_token":"a","token_type":"Bearer"}"#,
        );
        fixture.transport.on(
            Method::POST,
            TOKEN_PATH,
            200,
            r#"{"access_token":"a","token_type":"Bearer","expires_in":0}"#,
        );
        fixture.transport.on(
            Method::POST,
            TOKEN_PATH,
            200,
            r#"{"access_token":"a","token_type":"Bearer","expires_in":9223372036854775807}"#,
        );

        for _ in 0..3 {
            let state = start_login(&fixture, "session");
            let result = fixture.auth.handle_callback(&state, "code").await;

            assert!(matches!(result, Err(AuthError::IncompleteResponse)));
        }

        assert!(fixture.credentials.get("session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_callback_reports_failed_exchange() {
        let fixture = fixture();
        fixture.transport.on(
            Method::POST,
            TOKEN_PATH,
            400,
            r#"{"error":"invalid_grant"}"#,
        );

        let state = start_login(&fixture, "session");
        let result = fixture.auth.handle_callback(&state, "code").await;

        match result {
            Err(AuthError::Exchange { status, details }) => {
                assert_eq!(status, 400);
                assert!(details.contains("invalid_grant"));
            }
            other => panic!("expected exchange error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_is_authenticated() {
        let fixture = fixture();
        assert!(!fixture.auth.is_authenticated("session").await);

        // Expired, and the refresh fails
        fixture
            .credentials
            .upsert("session", "a", "Bearer", -1, Some("r"))
            .await
            .unwrap();
        fixture.transport.on(Method::POST, TOKEN_PATH, 400, "{}");
        assert!(!fixture.auth.is_authenticated("session").await);

        // Expired, and the refresh succeeds
        fixture.transport.on(
            Method::POST,
            TOKEN_PATH,
            200,
            r#"{"access_token":"b","expires_in":3600}"#,
        );
        assert!(fixture.auth.is_authenticated("session").await);

        let credential = fixture.credentials.get("session").await.unwrap().unwrap();
        assert_eq!(credential.access_token, "b");
    }

    #[tokio::test]
    async fn test_callback_rejects_unknown_state() {
        let fixture = fixture();
        start_login(&fixture, "session");

        let result = fixture.auth.handle_callback("session", "code").await;

        assert!(matches!(result, Err(AuthError::UnknownState)));
        assert!(fixture.transport.requests().is_empty());
        assert!(fixture.credentials.get("session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_callback_state_is_single_use() {
        let fixture = fixture();
        fixture.transport.on(
            Method::POST,
            TOKEN_PATH,
            200,
            r#"{"access_token":"a","token_type":"Bearer","expires_in":3600}"#,
        );

        let state = start_login(&fixture, "session");
        fixture.auth.handle_callback(&state, "code").await.unwrap();

        let result = fixture.auth.handle_callback(&state, "code").await;

        assert!(matches!(result, Err(AuthError::UnknownState)));
        assert_eq!(fixture.transport.count(Method::POST, TOKEN_PATH), 1);
    }

    #[tokio::test]
    async fn test_callback_rejects_stale_state() {
        let fixture = fixture();
        let state = start_login(&fixture, "session");

        fixture.auth.pending.get_mut(&state).unwrap().started_at =
            Utc::now() - Duration::seconds(STATE_LIFETIME_SECONDS + 1);

        let result = fixture.auth.handle_callback(&state, "code").await;

        assert!(matches!(result, Err(AuthError::UnknownState)));
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn test_stale_logins_are_pruned() {
        let fixture = fixture();
        let stale = start_login(&fixture, "first");

        fixture.auth.pending.get_mut(&stale).unwrap().started_at =
            Utc::now() - Duration::seconds(STATE_LIFETIME_SECONDS + 1);

        let fresh = start_login(&fixture, "second");

        assert!(!fixture.auth.pending.contains_key(&stale));
        assert!(fixture.auth.pending.contains_key(&fresh));
    }
}
