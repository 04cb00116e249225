use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// An OAuth credential linked to a user or session
#[derive(Debug, Clone, FromRow)]
pub struct CredentialData {
    pub id: PrimaryKey,
    /// The session key or user identifier this credential belongs to
    pub user_key: String,
    pub access_token: String,
    /// Spotify may omit this on refresh, in which case the previous one stays valid
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl CredentialData {
    /// Returns true if the access token is no longer usable at the given time
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns the refresh token if there is a usable one
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// A listening room
#[derive(Debug, Clone, FromRow)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// The code guests use to join the room
    pub code: String,
    /// The user key of the host, whose Spotify account is used for playback
    pub host: String,
    pub votes_to_skip: i32,
    /// If this is true, guests may play and pause
    pub guest_can_pause: bool,
    /// The id of the song that was last seen playing
    pub current_song: Option<String>,
}

impl RoomData {
    pub fn is_host(&self, user_key: &str) -> bool {
        self.host == user_key
    }
}

/// A vote to skip a song
#[derive(Debug, Clone, FromRow)]
pub struct VoteData {
    pub id: PrimaryKey,
    pub user_key: String,
    pub room_id: PrimaryKey,
    pub song_id: Option<String>,
}
