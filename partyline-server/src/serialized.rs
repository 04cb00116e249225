//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use partyline_collab::{SongView, VoteOutcome};
use serde::Serialize;
use utoipa::ToSchema;

/// The song playing in a room.
/// Field names match what the web client reads.
#[derive(Debug, Serialize, ToSchema)]
pub struct Song {
    title: String,
    /// Comma separated artist names
    artist: String,
    /// Length of the song in milliseconds
    duration: u64,
    /// Playback position in milliseconds
    time: u64,
    image_url: String,
    is_playing: bool,
    votes: usize,
    votes_required: i32,
    id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthUrl {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub status: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub session_id: String,
}

impl Message {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl ToSerialized<Song> for SongView {
    fn to_serialized(&self) -> Song {
        Song {
            title: self.title.clone(),
            artist: self.artist.clone(),
            duration: self.duration_ms,
            time: self.progress_ms,
            image_url: self.album_art_url.clone(),
            is_playing: self.is_playing,
            votes: self.vote_count,
            votes_required: self.votes_required,
            id: self.song_id.clone(),
        }
    }
}

impl ToSerialized<Message> for VoteOutcome {
    fn to_serialized(&self) -> Message {
        match self {
            VoteOutcome::Skipped => Message::new("Skipped"),
            VoteOutcome::Voted => Message::new("Voted to skip"),
        }
    }
}
