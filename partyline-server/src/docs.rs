use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, rooms, serialized};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::create_session,
        auth::auth_url,
        auth::spotify_callback,
        auth::is_authenticated,
        rooms::current_song,
        rooms::play,
        rooms::pause,
        rooms::skip,
    ),
    components(schemas(
        serialized::Song,
        serialized::Message,
        serialized::AuthUrl,
        serialized::AuthStatus,
        serialized::NewSession,
    )),
    modifiers(&Security),
    info(
        description = "partyline-server exposes endpoints to link Spotify accounts and control playback in rooms"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <session key>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
