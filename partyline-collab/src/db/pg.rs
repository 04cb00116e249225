use async_trait::async_trait;
use sqlx::{
    postgres::PgPoolOptions, query, query_as, query_scalar, Error as SqlxError, PgPool,
};

use crate::{
    CredentialData, Database, DatabaseError, IntoDatabaseError, NewRoom, NewVote, PrimaryKey,
    Result, RoomData, UpsertedCredential, VoteData,
};

/// A postgres database implementation for partyline
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn credential_by_user_key(&self, user_key: &str) -> Result<CredentialData> {
        query_as::<_, CredentialData>("SELECT * FROM credentials WHERE user_key = $1")
            .bind(user_key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("credential", "user_key"))
    }

    async fn upsert_credential(&self, credential: UpsertedCredential) -> Result<CredentialData> {
        // A single statement, so concurrent refreshes never leave a mismatched token and expiry
        query_as::<_, CredentialData>(
            "
            INSERT INTO credentials (user_key, access_token, refresh_token, token_type, expires_at)
            VALUES ($1, $2, NULLIF($3, ''), $4, $5)
            ON CONFLICT (user_key) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, credentials.refresh_token),
                token_type = EXCLUDED.token_type,
                expires_at = EXCLUDED.expires_at
            RETURNING *",
        )
        .bind(&credential.user_key)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(&credential.token_type)
        .bind(credential.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        query_as::<_, RoomData>("SELECT * FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn room_by_code(&self, code: &str) -> Result<RoomData> {
        query_as::<_, RoomData>("SELECT * FROM rooms WHERE code = $1")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "code"))
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        match self.room_by_code(&new_room.code).await {
            Ok(_) => {
                return Err(DatabaseError::Conflict {
                    resource: "room",
                    field: "code",
                    value: new_room.code,
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        query_as::<_, RoomData>(
            "
            INSERT INTO rooms (code, host, votes_to_skip, guest_can_pause)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(&new_room.code)
        .bind(&new_room.host)
        .bind(new_room.votes_to_skip)
        .bind(new_room.guest_can_pause)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_room_song(&self, room_id: PrimaryKey, song_id: Option<&str>) -> Result<()> {
        let result = query("UPDATE rooms SET current_song = $1 WHERE id = $2")
            .bind(song_id)
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn count_votes(&self, room_id: PrimaryKey, song_id: Option<&str>) -> Result<usize> {
        let count: i64 = query_scalar(
            "SELECT COUNT(*) FROM votes WHERE room_id = $1 AND song_id IS NOT DISTINCT FROM $2",
        )
        .bind(room_id)
        .bind(song_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(count as usize)
    }

    async fn list_votes(&self, room_id: PrimaryKey) -> Result<Vec<VoteData>> {
        query_as::<_, VoteData>("SELECT * FROM votes WHERE room_id = $1")
            .bind(room_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_vote(&self, new_vote: NewVote) -> Result<VoteData> {
        // Ensure room exists
        let _ = self.room_by_id(new_vote.room_id).await?;

        let vote = query_as::<_, VoteData>(
            "
            INSERT INTO votes (user_key, room_id, song_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING *",
        )
        .bind(&new_vote.user_key)
        .bind(new_vote.room_id)
        .bind(&new_vote.song_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.any())?;

        vote.ok_or_else(|| DatabaseError::Conflict {
            resource: "vote",
            field: "room:song:user",
            value: format!(
                "{}:{}:{}",
                new_vote.room_id,
                new_vote.song_id.as_deref().unwrap_or_default(),
                new_vote.user_key
            ),
        })
    }

    async fn delete_room_votes(&self, room_id: PrimaryKey) -> Result<()> {
        query("DELETE FROM votes WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
