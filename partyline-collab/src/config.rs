use std::{env, time::Duration};

use thiserror::Error;

/// The scopes requested when a host links their Spotify account
pub const SPOTIFY_SCOPES: &str =
    "user-read-playback-state user-modify-playback-state user-read-currently-playing streaming";

/// The configuration of the collab system
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    /// Where Spotify sends the user back to after authorizing
    pub redirect_uri: String,
    /// Where the user ends up after the callback is handled
    pub frontend_url: String,
    /// The base of every player endpoint, without a trailing slash
    pub api_base: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Upper bound for every request made to Spotify
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} must be set")]
    Missing(&'static str),
    #[error("Environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl Config {
    /// Expiry used when Spotify leaves out `expires_in` on refresh
    pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

    /// Reads the configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &'static str| env::var(name).map_err(|_| ConfigError::Missing(name));

        let request_timeout = match env::var("PARTYLINE_REQUEST_TIMEOUT_SECS") {
            Ok(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::Invalid {
                    name: "PARTYLINE_REQUEST_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?,
            Err(_) => Self::default().request_timeout,
        };

        Ok(Self {
            client_id: required("SPOTIFY_CLIENT_ID")?,
            client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            redirect_uri: required("SPOTIFY_REDIRECT_URI")?,
            frontend_url: env::var("PARTYLINE_FRONTEND_URL")
                .unwrap_or_else(|_| Self::default().frontend_url),
            request_timeout,
            ..Default::default()
        })
    }

    /// Returns the full url of a player endpoint, such as `player/next`
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://127.0.0.1:9050/v1/spotify/redirect".to_string(),
            frontend_url: "http://127.0.0.1:8000".to_string(),
            api_base: "https://api.spotify.com/v1/me".to_string(),
            authorize_url: "https://accounts.spotify.com/authorize".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let config = Config::default();

        assert_eq!(
            config.endpoint_url("player/next"),
            "https://api.spotify.com/v1/me/player/next"
        );
        assert_eq!(
            config.endpoint_url("/player/play"),
            "https://api.spotify.com/v1/me/player/play"
        );
    }
}
