mod auth;
mod config;
mod credentials;
mod db;
mod rooms;
mod spotify;
mod util;

use std::sync::Arc;

pub use auth::*;
pub use config::*;
pub use credentials::*;
pub use db::*;
pub use rooms::*;
pub use spotify::*;
pub use util::random_string;

use util::KeyedLocks;

/// The partyline collab system, facilitating Spotify authentication, playback control, and skip votes.
pub struct Collab {
    pub config: Arc<Config>,
    pub credentials: CredentialStore,

    pub auth: Auth,
    pub rooms: RoomManager,
    pub playback: PlaybackHandler,
    pub votes: SkipVoteCoordinator,
}

/// A type passed to various components of the collab system, to access state and call Spotify.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Arc<Config>,
    pub database: Arc<dyn Database>,
    pub spotify: SpotifyClient,

    /// Serializes vote counting and song changes per room
    room_locks: Arc<KeyedLocks<PrimaryKey>>,
}

impl Collab {
    pub fn new(
        config: Config,
        database: Arc<dyn Database>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let config = Arc::new(config);
        let credentials = CredentialStore::new(&database);
        let refresher = TokenRefresher::new(&config, &transport, &credentials);
        let spotify = SpotifyClient::new(&config, &transport, &credentials, &refresher);

        let context = CollabContext {
            config: config.clone(),
            database,
            spotify,
            room_locks: Default::default(),
        };

        Self {
            auth: Auth::new(&config, &transport, &credentials, &refresher),
            rooms: RoomManager::new(&context),
            playback: PlaybackHandler::new(&context),
            votes: SkipVoteCoordinator::new(&context),
            credentials,
            config,
        }
    }
}
