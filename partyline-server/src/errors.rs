use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use partyline_collab::{ApiError, AuthError, DatabaseError, PlaybackError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Room {0} not found")]
    RoomNotFound(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("You already voted to skip this song")]
    AlreadyVoted,
    #[error(transparent)]
    Spotify(ApiError),
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Option<String>,
    },
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

/// The json body of every error response
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::AlreadyVoted => StatusCode::CONFLICT,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Spotify(e) => match e {
                ApiError::NoCredential | ApiError::RefreshFailed => StatusCode::UNAUTHORIZED,
                ApiError::Upstream { status, .. } => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                ApiError::Network(_) | ApiError::Parse { .. } => StatusCode::BAD_GATEWAY,
                ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn as_body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            error: Value::String(self.to_string()),
            status: None,
            raw: None,
            details: None,
        };

        match self {
            Self::Spotify(e) => {
                body.status = e.status();

                match e {
                    ApiError::Upstream { payload, .. } => body.error = payload.clone(),
                    ApiError::Parse { raw, .. } => body.raw = Some(raw.clone()),
                    _ => {}
                }
            }
            Self::BadRequest {
                details: Some(details),
                ..
            } => body.details = Some(details.clone()),
            _ => {}
        }

        body
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), Json(self.as_body())).into_response()
    }
}

impl From<PlaybackError> for ServerError {
    fn from(value: PlaybackError) -> Self {
        match value {
            PlaybackError::PermissionDenied => Self::PermissionDenied,
            PlaybackError::NotFound(code) => Self::RoomNotFound(code),
            PlaybackError::AlreadyVoted => Self::AlreadyVoted,
            PlaybackError::Api(e) => Self::Spotify(e),
            PlaybackError::Db(e) => e.into(),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Exchange { status: _, details } => Self::BadRequest {
                message: "Failed to authenticate with Spotify".to_string(),
                details: Some(details),
            },
            AuthError::Db(e) => e.into(),
            e => Self::BadRequest {
                message: e.to_string(),
                details: None,
            },
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        Self::Unknown(value.to_string())
    }
}
