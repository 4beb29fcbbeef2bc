//! Deezer records to canonical models.
//!
//! Pure functions: no I/O, no logging. A record without an id is rejected
//! with [`ProviderError::InvalidData`]; everything else is optional.

use serde_json::Value;

use super::schema::{decode, DeezerAlbum, DeezerArtist, DeezerPlaylist, DeezerTrack};
use crate::error::{ProviderError, Result};
use crate::models::{
    Album, AlbumType, Artist, AudioFormat, ContentType, ExternalId, ItemMapping, MediaItemImage,
    MediaType, Playlist, ProviderMapping, Track, TrackPosition,
};

/// Context shared by all mappings of one provider instance.
#[derive(Debug, Clone)]
pub struct Mapper {
    pub domain: String,
    pub instance_id: String,
    /// Id of the logged in user, used for playlist ownership.
    pub user_id: Option<i64>,
    /// Country of the logged in user, used for track availability.
    pub user_country: Option<String>,
}

fn required_id(kind: &str, id: Option<i64>) -> Result<String> {
    id.map(|id| id.to_string())
        .ok_or_else(|| ProviderError::InvalidData(format!("Deezer {} without id", kind)))
}

impl Mapper {
    fn mapping(&self, item_id: &str, url: Option<&String>) -> ProviderMapping {
        ProviderMapping::new(item_id, self.domain.as_str(), self.instance_id.as_str())
            .with_url(url.cloned())
    }

    fn artist_mapping(&self, artist: &DeezerArtist) -> Result<ItemMapping> {
        let item_id = required_id("artist", artist.id)?;
        let mut mapping = ItemMapping::new(
            MediaType::Artist,
            item_id,
            self.instance_id.as_str(),
            artist.name.clone().unwrap_or_default(),
        );
        mapping.image = artist.picture_big.as_deref().map(MediaItemImage::thumb);
        Ok(mapping)
    }

    fn album_mapping(&self, album: &DeezerAlbum) -> Result<ItemMapping> {
        let item_id = required_id("album", album.id)?;
        let mut mapping = ItemMapping::new(
            MediaType::Album,
            item_id,
            self.instance_id.as_str(),
            album.title.clone().unwrap_or_default(),
        );
        mapping.image = album.cover_big.as_deref().map(MediaItemImage::thumb);
        Ok(mapping)
    }

    pub fn parse_artist(&self, artist: &DeezerArtist) -> Result<Artist> {
        let item_id = required_id("artist", artist.id)?;
        let mut result = Artist::new(
            item_id.as_str(),
            self.domain.as_str(),
            artist.name.clone().unwrap_or_default(),
        );
        result
            .provider_mappings
            .insert(self.mapping(&item_id, artist.link.as_ref()));
        if let Some(picture) = &artist.picture_big {
            result.metadata.images.push(MediaItemImage::thumb(picture));
        }
        result.metadata.popularity = artist.nb_fan;
        Ok(result)
    }

    pub fn parse_album(&self, album: &DeezerAlbum) -> Result<Album> {
        let item_id = required_id("album", album.id)?;
        let mut result = Album::new(
            item_id.as_str(),
            self.domain.as_str(),
            album.title.clone().unwrap_or_default(),
        );
        result
            .provider_mappings
            .insert(self.mapping(&item_id, album.link.as_ref()));
        result.album_type = album
            .record_type
            .as_deref()
            .map(AlbumType::parse)
            .unwrap_or_default();
        if let Some(artist) = &album.artist {
            result.artists.push(self.artist_mapping(artist)?);
        }
        if let Some(upc) = &album.upc {
            result.external_ids.insert((ExternalId::Upc, upc.clone()));
        }

        let metadata = &mut result.metadata;
        if let Some(cover) = &album.cover_big {
            metadata.images.push(MediaItemImage::thumb(cover));
        }
        if let Some(genres) = &album.genres {
            metadata
                .genres
                .extend(genres.data.iter().filter_map(|g| g.name.clone()));
        }
        metadata.explicit = album.explicit_lyrics;
        metadata.release_date = album.release_date.clone();
        Ok(result)
    }

    pub fn parse_playlist(&self, playlist: &DeezerPlaylist) -> Result<Playlist> {
        let item_id = required_id("playlist", playlist.id)?;
        let mut result = Playlist::new(
            item_id.as_str(),
            self.domain.as_str(),
            playlist.title.clone().unwrap_or_default(),
        );
        result
            .provider_mappings
            .insert(self.mapping(&item_id, playlist.link.as_ref()));

        let owner = playlist.owner();
        result.owner = owner.and_then(|o| o.name.clone());
        result.is_editable = match (owner.and_then(|o| o.id), self.user_id) {
            (Some(owner_id), Some(user_id)) => owner_id == user_id,
            _ => false,
        };

        let metadata = &mut result.metadata;
        if let Some(picture) = &playlist.picture_big {
            metadata.images.push(MediaItemImage::thumb(picture));
        }
        metadata.description = playlist.description.clone().filter(|d| !d.is_empty());
        metadata.checksum = playlist.checksum.clone();
        Ok(result)
    }

    /// Map a track; `position` places it in its album or playlist.
    pub fn parse_track(&self, track: &DeezerTrack, position: TrackPosition) -> Result<Track> {
        let item_id = required_id("track", track.id)?;
        let title = track.title.clone().unwrap_or_default();
        let mut result = Track::new(item_id.as_str(), self.domain.as_str(), title.as_str());
        result.sort_name = Some(track.title_short.clone().unwrap_or(title));
        result.duration = track.duration.unwrap_or_default();
        result.position = position;

        let available = match (&track.available_countries, &self.user_country) {
            (Some(countries), Some(country)) => countries.iter().any(|c| c == country),
            _ => true,
        };
        result.provider_mappings.insert(
            self.mapping(&item_id, track.link.as_ref())
                .with_available(available)
                .with_audio_format(AudioFormat::new(ContentType::Mp3)),
        );

        if let Some(artist) = &track.artist {
            result.artists.push(self.artist_mapping(artist)?);
        }
        if let Some(album) = &track.album {
            result.album = Some(self.album_mapping(album)?);
        }
        if let Some(isrc) = &track.isrc {
            result.external_ids.insert((ExternalId::Isrc, isrc.clone()));
        }

        let metadata = &mut result.metadata;
        if let Some(cover) = track.album.as_ref().and_then(|a| a.cover_big.as_ref()) {
            metadata.images.push(MediaItemImage::thumb(cover));
        }
        metadata.explicit = track.explicit_lyrics;
        metadata.popularity = track.rank;
        metadata.preview = track.preview.clone().filter(|p| !p.is_empty());
        metadata.release_date = track.release_date.clone();
        Ok(result)
    }

    pub fn artist_from_value(&self, value: Value) -> Result<Artist> {
        self.parse_artist(&decode("artist", value)?)
    }

    pub fn album_from_value(&self, value: Value) -> Result<Album> {
        self.parse_album(&decode("album", value)?)
    }

    pub fn playlist_from_value(&self, value: Value) -> Result<Playlist> {
        self.parse_playlist(&decode("playlist", value)?)
    }

    pub fn track_from_value(&self, value: Value, position: TrackPosition) -> Result<Track> {
        self.parse_track(&decode("track", value)?, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> Mapper {
        Mapper {
            domain: "deezer".to_string(),
            instance_id: "deezer--abc".to_string(),
            user_id: Some(42),
            user_country: Some("NL".to_string()),
        }
    }

    #[test]
    fn test_parse_track_full_record() {
        let value = json!({
            "id": 3135556,
            "title": "Harder, Better, Faster, Stronger (Live)",
            "title_short": "Harder, Better, Faster, Stronger",
            "duration": 224,
            "isrc": "GBDUW0000059",
            "link": "https://www.deezer.com/track/3135556",
            "rank": 956167,
            "explicit_lyrics": false,
            "available_countries": ["NL", "BE"],
            "artist": {"id": 27, "name": "Daft Punk"},
            "album": {"id": 302127, "title": "Discovery", "cover_big": "https://cdn/cover.jpg"}
        });
        let track = mapper()
            .track_from_value(value, TrackPosition::Playlist { position: 3 })
            .unwrap();

        assert_eq!(track.item_id, "3135556");
        assert_eq!(track.provider, "deezer");
        assert_eq!(track.artists[0].provider, "deezer--abc");
        assert_eq!(track.duration, 224);
        assert_eq!(track.sort_name.as_deref(), Some("Harder, Better, Faster, Stronger"));
        assert_eq!(track.isrc(), Some("GBDUW0000059"));
        assert_eq!(track.playlist_position(), Some(3));
        assert_eq!(track.artists[0].name, "Daft Punk");
        assert_eq!(track.album.as_ref().map(|a| a.item_id.as_str()), Some("302127"));
        assert_eq!(track.metadata.images.len(), 1);

        let mapping = track.provider_mappings.iter().next().unwrap();
        assert!(mapping.available);
        assert_eq!(mapping.provider_domain, "deezer");
        assert_eq!(mapping.url.as_deref(), Some("https://www.deezer.com/track/3135556"));
    }

    #[test]
    fn test_track_unavailable_outside_user_country() {
        let value = json!({"id": 1, "title": "x", "available_countries": ["US"]});
        let track = mapper().track_from_value(value, TrackPosition::Bare).unwrap();
        assert!(!track.provider_mappings.iter().all(|m| m.available));
    }

    #[test]
    fn test_thin_track_defaults() {
        let track = mapper()
            .track_from_value(json!({"id": 7}), TrackPosition::Bare)
            .unwrap();
        assert_eq!(track.name, "");
        assert!(track.album.is_none());
        assert!(track.external_ids.is_empty());
        assert!(track.provider_mappings.iter().all(|m| m.available));
    }

    #[test]
    fn test_missing_id_is_invalid_data() {
        let result = mapper().artist_from_value(json!({"name": "No Id"}));
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));

        let result = mapper().track_from_value(
            json!({"id": 1, "artist": {"name": "No Id"}}),
            TrackPosition::Bare,
        );
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_playlist_editable_for_owner_only() {
        let own = mapper()
            .playlist_from_value(json!({"id": 1, "title": "Mine", "creator": {"id": 42, "name": "me"}}))
            .unwrap();
        assert!(own.is_editable);
        assert_eq!(own.owner.as_deref(), Some("me"));

        let other = mapper()
            .playlist_from_value(json!({"id": 2, "title": "Theirs", "user": {"id": 7}}))
            .unwrap();
        assert!(!other.is_editable);
    }

    #[test]
    fn test_parse_album() {
        let album = mapper()
            .album_from_value(json!({
                "id": 302127,
                "title": "Discovery",
                "record_type": "compile",
                "upc": "724384960650",
                "artist": {"id": 27, "name": "Daft Punk"},
                "genres": {"data": [{"name": "Electro"}, {"name": "Dance"}]}
            }))
            .unwrap();
        assert_eq!(album.album_type, AlbumType::Compilation);
        assert_eq!(album.artists_string(", "), "Daft Punk");
        assert!(album.metadata.genres.contains("Electro"));
        assert!(album
            .external_ids
            .contains(&(ExternalId::Upc, "724384960650".to_string())));
    }
}
