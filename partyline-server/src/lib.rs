mod auth;
mod context;
mod docs;
mod errors;
mod rooms;
mod serialized;

use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use log::info;
use partyline_collab::Collab;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use errors::{ServerError, ServerResult};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Builds the complete router, with all routes nested under their version
pub fn app(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .merge(auth::router())
        .merge(rooms::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the partyline server
pub async fn run_server(collab: Collab) -> std::io::Result<()> {
    let port = match env::var("PARTYLINE_SERVER_PORT") {
        Ok(x) => x.parse::<u16>().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "PARTYLINE_SERVER_PORT must be a number",
            )
        })?,
        Err(_) => DEFAULT_PORT,
    };

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    let context = ServerContext {
        collab: Arc::new(collab),
    };

    info!("Listening on port {}", port);
    axum::serve(listener, app(context).into_make_service()).await
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use partyline_collab::{
        Collab, Config, Database, MemoryDatabase, NewRoom, ReqwestTransport,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    const HOST: &str = "host-session";
    const GUEST: &str = "guest-session";

    async fn setup(votes_to_skip: i32, guest_can_pause: bool) -> axum::Router {
        let database = Arc::new(MemoryDatabase::new());
        let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(1)).unwrap());

        database
            .create_room(NewRoom {
                code: "PARTY1".to_string(),
                host: HOST.to_string(),
                votes_to_skip,
                guest_can_pause,
            })
            .await
            .unwrap();

        let collab = Collab::new(Config::default(), database, transport);

        app(ServerContext {
            collab: Arc::new(collab),
        })
    }

    async fn send(app: axum::Router, method: Method, uri: &str, session: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);

        if let Some(session) = session {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", session));
        }

        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_session() {
        let app = setup(2, false).await;
        let response = send(app, Method::POST, "/v1/sessions", None).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["sessionId"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let app = setup(2, false).await;
        let response = send(app, Method::PUT, "/v1/rooms/PARTY1/play", None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_authorization_is_rejected() {
        let app = setup(2, false).await;
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/v1/rooms/PARTY1/play")
            .header(header::AUTHORIZATION, "Basic abc")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let app = setup(2, false).await;
        let response = send(app, Method::PUT, "/v1/rooms/NOPE/pause", Some(HOST)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json(response).await;
        assert_eq!(body["error"], "Room NOPE not found");
    }

    #[tokio::test]
    async fn test_guest_cannot_play_without_permission() {
        let app = setup(2, false).await;
        let response = send(app, Method::PUT, "/v1/rooms/PARTY1/play", Some(GUEST)).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_guest_vote_below_threshold() {
        let app = setup(3, false).await;
        let response = send(app, Method::POST, "/v1/rooms/PARTY1/skip", Some(GUEST)).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["message"], "Voted to skip");
    }

    #[tokio::test]
    async fn test_repeated_vote_conflicts() {
        let app = setup(3, false).await;

        let first = send(app.clone(), Method::POST, "/v1/rooms/PARTY1/skip", Some(GUEST)).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = send(app, Method::POST, "/v1/rooms/PARTY1/skip", Some(GUEST)).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_is_authenticated_without_credential() {
        let app = setup(2, false).await;
        let response = send(app, Method::GET, "/v1/spotify/is-authenticated", Some(GUEST)).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["status"], false);
        assert_eq!(body["sessionId"], GUEST);
    }

    #[tokio::test]
    async fn test_auth_url_hides_session_key() {
        let app = setup(2, false).await;
        let response = send(app, Method::GET, "/v1/spotify/auth-url", Some(GUEST)).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("https://accounts.spotify.com/authorize"));
        assert!(url.contains("state="));
        assert!(!url.contains(GUEST));
    }

    #[tokio::test]
    async fn test_callback_with_forged_state_is_bad_request() {
        let app = setup(2, false).await;
        let uri = format!("/v1/spotify/redirect?code=abc&state={}", GUEST);
        let response = send(app, Method::GET, &uri, None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json(response).await;
        assert_eq!(body["error"], "Invalid or expired login state");
    }

    #[tokio::test]
    async fn test_denied_callback_is_bad_request() {
        let app = setup(2, false).await;
        let response = send(
            app,
            Method::GET,
            "/v1/spotify/redirect?error=access_denied&state=abc",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_document_is_served() {
        let app = setup(2, false).await;
        let response = send(app, Method::GET, "/api.json", None).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert!(body["paths"]["/v1/rooms/{code}/skip"].is_object());
    }
}
