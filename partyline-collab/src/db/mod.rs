use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait OptionalResult<T> {
    /// Turns a NotFound error into None
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalResult<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can fetch partyline data from a database
#[async_trait]
pub trait Database: Send + Sync {
    async fn credential_by_user_key(&self, user_key: &str) -> Result<CredentialData>;
    /// Creates or overwrites the credential of a user in one atomic step.
    /// The stored refresh token is kept if the new one is missing or empty.
    async fn upsert_credential(&self, credential: UpsertedCredential) -> Result<CredentialData>;

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData>;
    async fn room_by_code(&self, code: &str) -> Result<RoomData>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn update_room_song(&self, room_id: PrimaryKey, song_id: Option<&str>) -> Result<()>;

    async fn count_votes(&self, room_id: PrimaryKey, song_id: Option<&str>) -> Result<usize>;
    async fn list_votes(&self, room_id: PrimaryKey) -> Result<Vec<VoteData>>;
    /// Fails with a conflict if the user already voted for this song in this room
    async fn create_vote(&self, new_vote: NewVote) -> Result<VoteData>;
    async fn delete_room_votes(&self, room_id: PrimaryKey) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct UpsertedCredential {
    pub user_key: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug)]
pub struct NewRoom {
    pub code: String,
    pub host: String,
    pub votes_to_skip: i32,
    pub guest_can_pause: bool,
}

#[derive(Debug)]
pub struct NewVote {
    pub user_key: String,
    pub room_id: PrimaryKey,
    pub song_id: Option<String>,
}
