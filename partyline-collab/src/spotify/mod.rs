//! Everything that talks to Spotify: the token endpoint and the player API.

mod client;
mod token;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use client::*;
pub use token::*;
pub use transport::*;

use serde_json::Value;
use thiserror::Error;

pub type ApiResult = Result<ApiResponse, ApiError>;

/// A successful response from the player API
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Spotify answered 204, which for `currently-playing` means nothing is playing
    NoContent,
    Json(Value),
}

/// Every way a call to the player API can fail
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("No Spotify tokens found for this user/session")]
    NoCredential,
    #[error("Failed to refresh Spotify token")]
    RefreshFailed,
    #[error("Network error while calling Spotify: {0}")]
    Network(String),
    #[error("Failed to parse Spotify API response")]
    Parse { status: u16, raw: String },
    /// Spotify answered with an error, the payload is the `error` member of the body
    #[error("Spotify API error ({status})")]
    Upstream { status: u16, payload: Value },
    #[error("Could not access stored credentials: {0}")]
    Storage(String),
}

impl ApiError {
    /// The http status Spotify answered with, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Parse { status, .. } | Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The methods the player API is called with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
}

impl From<ApiMethod> for reqwest::Method {
    fn from(value: ApiMethod) -> Self {
        match value {
            ApiMethod::Get => Self::GET,
            ApiMethod::Post => Self::POST,
            ApiMethod::Put => Self::PUT,
        }
    }
}
