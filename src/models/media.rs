//! Aggregates of media items: search results and browse folders.

use serde::{Deserialize, Serialize};

use super::{Album, Artist, Playlist, Track};

/// Any canonical media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "media_type", rename_all = "snake_case")]
pub enum MediaItem {
    Artist(Artist),
    Album(Album),
    Track(Track),
    Playlist(Playlist),
    Folder(BrowseFolder),
}

/// Per-type search result lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
    pub playlists: Vec<Playlist>,
}

impl SearchResults {
    /// Total number of items across all lists.
    pub fn len(&self) -> usize {
        self.artists.len() + self.albums.len() + self.tracks.len() + self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Virtual folder used for browse and recommendation listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseFolder {
    pub item_id: String,
    pub provider: String,
    pub path: String,
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub items: Vec<MediaItem>,
}
