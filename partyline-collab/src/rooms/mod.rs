mod playback;
mod song;
mod votes;

pub use playback::*;
pub use song::*;
pub use votes::*;

use thiserror::Error;

use crate::{spotify::ApiError, CollabContext, DatabaseError, RoomData};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Room {0} not found")]
    NotFound(String),
    #[error("You already voted to skip this song")]
    AlreadyVoted,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Db(DatabaseError),
}

impl From<DatabaseError> for PlaybackError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::Conflict { resource: "vote", .. } => Self::AlreadyVoted,
            e => Self::Db(e),
        }
    }
}

/// Resolves the rooms commands are scoped to
pub struct RoomManager {
    context: CollabContext,
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Returns the room with the given code
    pub async fn room_by_code(&self, code: &str) -> Result<RoomData, PlaybackError> {
        self.context
            .database
            .room_by_code(code)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => PlaybackError::NotFound(code.to_string()),
                e => PlaybackError::Db(e),
            })
    }
}
