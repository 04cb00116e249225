use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json,
};
use partyline_collab::CurrentSong;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{Message, Song, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/current-song",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "The room code")
    ),
    responses(
        (status = 200, body = Song),
        (status = 204, description = "Nothing is playing for the host")
    )
)]
async fn current_song(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Response> {
    let room = context.collab.rooms.room_by_code(&code).await?;
    let song = context.collab.votes.current_song(&room).await?;

    let response = match song {
        CurrentSong::NothingPlaying => StatusCode::NO_CONTENT.into_response(),
        CurrentSong::Playing(song) => Json(song.to_serialized()).into_response(),
    };

    Ok(response)
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{code}/play",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "The room code")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message),
        (status = 403, description = "Caller is not the host and guests may not control playback")
    )
)]
async fn play(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Message>> {
    let room = context.collab.rooms.room_by_code(&code).await?;
    context.collab.playback.play(session.key(), &room).await?;

    Ok(Json(Message::new("Playing")))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{code}/pause",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "The room code")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message),
        (status = 403, description = "Caller is not the host and guests may not control playback")
    )
)]
async fn pause(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Message>> {
    let room = context.collab.rooms.room_by_code(&code).await?;
    context.collab.playback.pause(session.key(), &room).await?;

    Ok(Json(Message::new("Paused")))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/skip",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "The room code")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message),
        (status = 409, description = "Caller already voted to skip this song")
    )
)]
async fn skip(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Message>> {
    let room = context.collab.rooms.room_by_code(&code).await?;
    let outcome = context.collab.votes.cast_vote(session.key(), &room).await?;

    Ok(Json(outcome.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/rooms/:code/current-song", get(current_song))
        .route("/rooms/:code/play", put(play))
        .route("/rooms/:code/pause", put(pause))
        .route("/rooms/:code/skip", post(skip))
}
