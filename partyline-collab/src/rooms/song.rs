use serde::Deserialize;

/// What the host's player is doing right now
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentSong {
    NothingPlaying,
    Playing(SongView),
}

/// A song as presented to the room
#[derive(Debug, Clone, PartialEq)]
pub struct SongView {
    pub title: String,
    /// The names of all artists, comma separated
    pub artist: String,
    pub duration_ms: u64,
    pub progress_ms: u64,
    /// Empty if the album has no artwork
    pub album_art_url: String,
    pub is_playing: bool,
    pub vote_count: usize,
    pub votes_required: i32,
    pub song_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub item: Option<PlayingItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayingItem {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    pub album: Option<Album>,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Album {
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Image {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Artist {
    pub name: String,
}

impl PlayingItem {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The first image is the largest one
    pub fn album_art_url(&self) -> String {
        self.album
            .as_ref()
            .and_then(|a| a.images.first())
            .map(|i| i.url.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currently_playing() {
        let body = r#"{
            "is_playing": true,
            "progress_ms": 42000,
            "item": {
                "id": "4uLU6hMCjMI75M1A2tKUQC",
                "name": "Never Gonna Give You Up",
                "duration_ms": 213573,
                "album": { "images": [{ "url": "https://i.scdn.co/large" }, { "url": "https://i.scdn.co/small" }] },
                "artists": [{ "name": "Rick Astley" }, { "name": "Someone Else" }]
            }
        }"#;

        let playing: CurrentlyPlaying = serde_json::from_str(body).unwrap();
        let item = playing.item.unwrap();

        assert!(playing.is_playing);
        assert_eq!(playing.progress_ms, Some(42000));
        assert_eq!(item.artist_names(), "Rick Astley, Someone Else");
        assert_eq!(item.album_art_url(), "https://i.scdn.co/large");
    }

    #[test]
    fn test_parse_item_without_album_art() {
        let body = r#"{ "item": { "id": null, "name": "Local file", "album": { "images": [] } } }"#;

        let playing: CurrentlyPlaying = serde_json::from_str(body).unwrap();
        let item = playing.item.unwrap();

        assert!(!playing.is_playing);
        assert_eq!(item.id, None);
        assert_eq!(item.album_art_url(), "");
        assert_eq!(item.artist_names(), "");
    }
}
