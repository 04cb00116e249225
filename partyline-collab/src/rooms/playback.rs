use log::info;

use crate::{spotify::ApiMethod, CollabContext, RoomData};

use super::PlaybackError;

/// A command that controls the host's Spotify player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Skip,
}

impl PlaybackCommand {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Play => "player/play",
            Self::Pause => "player/pause",
            Self::Skip => "player/next",
        }
    }

    pub fn method(&self) -> ApiMethod {
        match self {
            Self::Play | Self::Pause => ApiMethod::Put,
            Self::Skip => ApiMethod::Post,
        }
    }

    /// Checks if the actor may issue this command in the room.
    /// Anyone may skip, since skips by guests are gated by votes instead.
    pub fn authorize(&self, actor_key: &str, room: &RoomData) -> Result<(), PlaybackError> {
        match self {
            Self::Play | Self::Pause if !room.is_host(actor_key) && !room.guest_can_pause => {
                Err(PlaybackError::PermissionDenied)
            }
            _ => Ok(()),
        }
    }
}

/// Executes playback commands in a room, always as the host
/// since only the host has a linked Spotify account.
pub struct PlaybackHandler {
    context: CollabContext,
}

impl PlaybackHandler {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn play(&self, actor_key: &str, room: &RoomData) -> Result<(), PlaybackError> {
        self.execute(PlaybackCommand::Play, actor_key, room).await
    }

    pub async fn pause(&self, actor_key: &str, room: &RoomData) -> Result<(), PlaybackError> {
        self.execute(PlaybackCommand::Pause, actor_key, room).await
    }

    /// Authorizes the actor, then sends the command
    pub async fn execute(
        &self,
        command: PlaybackCommand,
        actor_key: &str,
        room: &RoomData,
    ) -> Result<(), PlaybackError> {
        command.authorize(actor_key, room)?;

        self.context.send_command(command, room).await
    }
}

impl CollabContext {
    /// Sends a command to the host's player without any authorization
    pub(crate) async fn send_command(
        &self,
        command: PlaybackCommand,
        room: &RoomData,
    ) -> Result<(), PlaybackError> {
        self.spotify
            .call(&room.host, command.endpoint(), command.method())
            .await?;

        info!("Sent {:?} to the player of room {}", command, room.code);

        Ok(())
    }
}
