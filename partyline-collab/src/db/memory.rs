use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    CredentialData, Database, DatabaseError, NewRoom, NewVote, PrimaryKey, Result, RoomData,
    UpsertedCredential, VoteData,
};

/// An in-process database, used when no postgres instance is configured and in tests.
/// All state is lost when the process exits.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_id: PrimaryKey,
    credentials: HashMap<String, CredentialData>,
    rooms: Vec<RoomData>,
    votes: Vec<VoteData>,
}

impl MemoryState {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn room(&self, room_id: PrimaryKey) -> Result<&RoomData> {
        self.rooms
            .iter()
            .find(|r| r.id == room_id)
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn credential_by_user_key(&self, user_key: &str) -> Result<CredentialData> {
        self.state
            .lock()
            .credentials
            .get(user_key)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "credential",
                identifier: "user_key",
            })
    }

    async fn upsert_credential(&self, credential: UpsertedCredential) -> Result<CredentialData> {
        let mut state = self.state.lock();
        let new_refresh_token = credential.refresh_token.filter(|t| !t.is_empty());

        if let Some(existing) = state.credentials.get_mut(&credential.user_key) {
            existing.access_token = credential.access_token;
            existing.token_type = credential.token_type;
            existing.expires_at = credential.expires_at;

            if new_refresh_token.is_some() {
                existing.refresh_token = new_refresh_token;
            }

            return Ok(existing.clone());
        }

        let id = state.next_id();
        let created = CredentialData {
            id,
            user_key: credential.user_key.clone(),
            access_token: credential.access_token,
            refresh_token: new_refresh_token,
            token_type: credential.token_type,
            expires_at: credential.expires_at,
        };

        state
            .credentials
            .insert(credential.user_key, created.clone());

        Ok(created)
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        self.state.lock().room(room_id).cloned()
    }

    async fn room_by_code(&self, code: &str) -> Result<RoomData> {
        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.code == code)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "code",
            })
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut state = self.state.lock();

        if state.rooms.iter().any(|r| r.code == new_room.code) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "code",
                value: new_room.code,
            });
        }

        let room = RoomData {
            id: state.next_id(),
            code: new_room.code,
            host: new_room.host,
            votes_to_skip: new_room.votes_to_skip,
            guest_can_pause: new_room.guest_can_pause,
            current_song: None,
        };

        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn update_room_song(&self, room_id: PrimaryKey, song_id: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();

        let room = state
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })?;

        room.current_song = song_id.map(ToString::to_string);
        Ok(())
    }

    async fn count_votes(&self, room_id: PrimaryKey, song_id: Option<&str>) -> Result<usize> {
        let state = self.state.lock();

        Ok(state
            .votes
            .iter()
            .filter(|v| v.room_id == room_id && v.song_id.as_deref() == song_id)
            .count())
    }

    async fn list_votes(&self, room_id: PrimaryKey) -> Result<Vec<VoteData>> {
        let state = self.state.lock();

        Ok(state
            .votes
            .iter()
            .filter(|v| v.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn create_vote(&self, new_vote: NewVote) -> Result<VoteData> {
        let mut state = self.state.lock();
        state.room(new_vote.room_id)?;

        let exists = state.votes.iter().any(|v| {
            v.room_id == new_vote.room_id
                && v.song_id == new_vote.song_id
                && v.user_key == new_vote.user_key
        });

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "vote",
                field: "room:song:user",
                value: format!(
                    "{}:{}:{}",
                    new_vote.room_id,
                    new_vote.song_id.as_deref().unwrap_or_default(),
                    new_vote.user_key
                ),
            });
        }

        let vote = VoteData {
            id: state.next_id(),
            user_key: new_vote.user_key,
            room_id: new_vote.room_id,
            song_id: new_vote.song_id,
        };

        state.votes.push(vote.clone());
        Ok(vote)
    }

    async fn delete_room_votes(&self, room_id: PrimaryKey) -> Result<()> {
        self.state.lock().votes.retain(|v| v.room_id != room_id);
        Ok(())
    }
}
