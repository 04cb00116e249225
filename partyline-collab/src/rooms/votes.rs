use log::info;

use crate::{
    spotify::{ApiError, ApiMethod, ApiResponse},
    CollabContext, NewVote, RoomData,
};

use super::{CurrentSong, CurrentlyPlaying, PlaybackCommand, PlaybackError, SongView};

const CURRENTLY_PLAYING: &str = "player/currently-playing";

/// The result of a guest or host asking to skip the current song
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The song was skipped, and all votes were cleared
    Skipped,
    /// A vote was recorded, but there are not enough votes yet
    Voted,
}

/// Tracks votes to skip the current song of a room.
///
/// Votes are only counted for the song the room currently tracks. When the host's player
/// moves on to a different song, all votes of the room are discarded.
pub struct SkipVoteCoordinator {
    context: CollabContext,
}

impl SkipVoteCoordinator {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Reads what the host is playing.
    /// If the song differs from the one the room tracks, the room is updated and its votes are cleared.
    pub async fn current_song(&self, room: &RoomData) -> Result<CurrentSong, PlaybackError> {
        let response = self
            .context
            .spotify
            .call(&room.host, CURRENTLY_PLAYING, ApiMethod::Get)
            .await?;

        let payload = match response {
            ApiResponse::NoContent => return Ok(CurrentSong::NothingPlaying),
            ApiResponse::Json(payload) => payload,
        };

        let playing: CurrentlyPlaying =
            serde_json::from_value(payload.clone()).map_err(|_| ApiError::Parse {
                status: 200,
                raw: payload.to_string(),
            })?;

        let Some(item) = playing.item else {
            return Ok(CurrentSong::NothingPlaying);
        };

        let _guard = self.context.room_locks.lock(&room.id).await;
        let database = &self.context.database;
        let room = database.room_by_id(room.id).await?;

        if room.current_song != item.id {
            database
                .update_room_song(room.id, item.id.as_deref())
                .await?;
            database.delete_room_votes(room.id).await?;

            info!(
                "Room {} is now playing {}, votes were reset",
                room.code,
                item.id.as_deref().unwrap_or("an unknown song")
            );
        }

        let vote_count = database.count_votes(room.id, item.id.as_deref()).await?;

        Ok(CurrentSong::Playing(SongView {
            artist: item.artist_names(),
            album_art_url: item.album_art_url(),
            title: item.name,
            duration_ms: item.duration_ms,
            progress_ms: playing.progress_ms.unwrap_or_default(),
            is_playing: playing.is_playing,
            vote_count,
            votes_required: room.votes_to_skip,
            song_id: item.id,
        }))
    }

    /// Votes to skip the current song of the room.
    /// The song is skipped right away if the actor is the host, or if this vote reaches the threshold.
    pub async fn cast_vote(
        &self,
        actor_key: &str,
        room: &RoomData,
    ) -> Result<VoteOutcome, PlaybackError> {
        let _guard = self.context.room_locks.lock(&room.id).await;
        let database = &self.context.database;
        let room = database.room_by_id(room.id).await?;

        let votes: Vec<_> = database
            .list_votes(room.id)
            .await?
            .into_iter()
            .filter(|v| v.song_id == room.current_song)
            .collect();

        let is_host = room.is_host(actor_key);

        if !is_host && votes.iter().any(|v| v.user_key == actor_key) {
            return Err(PlaybackError::AlreadyVoted);
        }

        let votes_needed = room.votes_to_skip.max(1) as usize;

        if is_host || votes.len() + 1 >= votes_needed {
            // Votes stay cleared even if the skip fails
            database.delete_room_votes(room.id).await?;
            self.context
                .send_command(PlaybackCommand::Skip, &room)
                .await?;

            return Ok(VoteOutcome::Skipped);
        }

        database
            .create_vote(NewVote {
                user_key: actor_key.to_string(),
                room_id: room.id,
                song_id: room.current_song.clone(),
            })
            .await?;

        info!(
            "Vote to skip recorded in room {} ({}/{})",
            room.code,
            votes.len() + 1,
            votes_needed
        );

        Ok(VoteOutcome::Voted)
    }
}
