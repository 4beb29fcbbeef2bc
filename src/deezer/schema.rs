//! Partial records of the Deezer public API.
//!
//! Every field is optional: the API omits fields depending on the endpoint
//! (search results are much thinner than `/track/{id}`). Mappers decide
//! which fields are required.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerUser {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerArtist {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub picture_big: Option<String>,
    pub nb_fan: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerGenre {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerGenres {
    #[serde(default)]
    pub data: Vec<DeezerGenre>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerAlbum {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub cover_big: Option<String>,
    pub record_type: Option<String>,
    pub explicit_lyrics: Option<bool>,
    pub release_date: Option<String>,
    pub upc: Option<String>,
    pub artist: Option<DeezerArtist>,
    pub genres: Option<DeezerGenres>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerTrack {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub title_short: Option<String>,
    pub link: Option<String>,
    pub duration: Option<u64>,
    pub isrc: Option<String>,
    pub preview: Option<String>,
    pub explicit_lyrics: Option<bool>,
    pub rank: Option<u64>,
    pub release_date: Option<String>,
    pub available_countries: Option<Vec<String>>,
    pub artist: Option<DeezerArtist>,
    pub album: Option<DeezerAlbum>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerPlaylist {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub picture_big: Option<String>,
    pub checksum: Option<String>,
    pub creator: Option<DeezerUser>,
    pub user: Option<DeezerUser>,
}

impl DeezerPlaylist {
    /// Playlist owner; some endpoints return `user` instead of `creator`.
    pub fn owner(&self) -> Option<&DeezerUser> {
        self.creator.as_ref().or(self.user.as_ref())
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub data: Vec<Value>,
    pub next: Option<String>,
    pub total: Option<u64>,
}

/// Decode a listing page.
///
/// A page with the wrong shape is an `Api` error: it ends the listing and
/// must reach the caller instead of being skipped like a bad element.
pub fn decode_page(value: Value) -> Result<Page> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::Api(format!("malformed Deezer page: {}", e)))
}

/// Decode a raw record, reporting shape mismatches as invalid data.
pub fn decode<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::InvalidData(format!("malformed Deezer {}: {}", kind, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thin_search_record() {
        let track: DeezerTrack = decode(
            "track",
            json!({"id": 3135556, "title": "Harder, Better, Faster, Stronger"}),
        )
        .unwrap();
        assert_eq!(track.id, Some(3135556));
        assert!(track.isrc.is_none());
        assert!(track.album.is_none());
    }

    #[test]
    fn test_wrong_shape_is_invalid_data() {
        let result = decode::<DeezerArtist>("artist", json!({"id": "not a number"}));
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_playlist_owner_fallback() {
        let playlist: DeezerPlaylist =
            decode("playlist", json!({"id": 1, "user": {"id": 5, "name": "me"}})).unwrap();
        assert_eq!(playlist.owner().and_then(|u| u.id), Some(5));
    }
}
