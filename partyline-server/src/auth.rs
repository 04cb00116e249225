use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query, State},
    http::{header, request::Parts, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json,
};
use log::warn;
use partyline_collab::random_string;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    serialized::{AuthStatus, AuthUrl, NewSession},
    Router,
};

const SESSION_KEY_LENGTH: usize = 32;
const MAX_SESSION_KEY_LENGTH: usize = 64;

/// The session key of the caller, which identifies them and their linked Spotify account
pub struct Session(String);

impl Session {
    pub fn key(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    ServerContext: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let segments: Vec<_> = token.split_ascii_whitespace().collect();

        if segments.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let key = segments.get(1).cloned().unwrap_or_default();

        if key.is_empty() {
            return Err((StatusCode::UNAUTHORIZED, "Missing session key"));
        }

        if key.len() > MAX_SESSION_KEY_LENGTH {
            return Err((StatusCode::BAD_REQUEST, "Session key is too long"));
        }

        Ok(Self(key.to_string()))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// The authorization code, present if the user granted access
    code: Option<String>,
    /// The one-time state handed out with the authorization url
    state: Option<String>,
    /// Present if the user denied access
    error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/v1/sessions",
    tag = "auth",
    responses(
        (status = 200, body = NewSession)
    )
)]
async fn create_session() -> Json<NewSession> {
    Json(NewSession {
        session_id: random_string(SESSION_KEY_LENGTH),
    })
}

#[utoipa::path(
    get,
    path = "/v1/spotify/auth-url",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = AuthUrl)
    )
)]
async fn auth_url(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<AuthUrl>> {
    let url = context
        .collab
        .auth
        .authorization_url(session.key())
        .map_err(|e| ServerError::Unknown(e.to_string()))?;

    Ok(Json(AuthUrl {
        url: url.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/spotify/redirect",
    tag = "auth",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Account was linked, redirects to the web client"),
        (status = 400, description = "Spotify denied access, the state is unknown, or the code exchange failed")
    )
)]
async fn spotify_callback(
    State(context): State<ServerContext>,
    Query(query): Query<CallbackQuery>,
) -> ServerResult<Redirect> {
    if let Some(error) = query.error {
        warn!("Spotify authorization was denied: {}", error);

        return Err(ServerError::BadRequest {
            message: error,
            details: None,
        });
    }

    let code = query.code.ok_or_else(|| ServerError::BadRequest {
        message: "Authorization code not provided".to_string(),
        details: None,
    })?;

    let state = query
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::BadRequest {
            message: "Login state not provided".to_string(),
            details: None,
        })?;

    context.collab.auth.handle_callback(&state, &code).await?;

    Ok(Redirect::to(&context.collab.config.frontend_url))
}

#[utoipa::path(
    get,
    path = "/v1/spotify/is-authenticated",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = AuthStatus)
    )
)]
async fn is_authenticated(
    session: Session,
    State(context): State<ServerContext>,
) -> Json<AuthStatus> {
    let status = context.collab.auth.is_authenticated(session.key()).await;

    Json(AuthStatus {
        status,
        session_id: session.key().to_string(),
    })
}

pub fn router() -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/spotify/auth-url", get(auth_url))
        .route("/spotify/redirect", get(spotify_callback))
        .route("/spotify/is-authenticated", get(is_authenticated))
}
