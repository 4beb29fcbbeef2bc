//! SoundCloud records to canonical models.

use serde_json::Value;

use super::schema::{decode, SoundcloudId, SoundcloudPlaylist, SoundcloudTrack, SoundcloudUser};
use crate::error::{ProviderError, Result};
use crate::models::{
    Artist, AudioFormat, ContentType, ItemMapping, MediaItemImage, MediaItemMetadata, MediaType,
    Playlist, ProviderMapping, Track, TrackPosition,
};
use crate::util::parse_title_and_version;

const SITE_URL: &str = "https://soundcloud.com";

#[derive(Debug, Clone)]
pub struct Mapper {
    pub domain: String,
    pub instance_id: String,
}

fn required_id(kind: &str, id: Option<&SoundcloudId>) -> Result<String> {
    id.map(|id| id.0.clone())
        .ok_or_else(|| ProviderError::InvalidData(format!("SoundCloud {} without id", kind)))
}

fn fill_genre_and_tags(metadata: &mut MediaItemMetadata, genre: &Option<String>, tags: &Option<String>) {
    if let Some(genre) = genre.as_deref().filter(|g| !g.is_empty()) {
        metadata.genres.insert(genre.to_string());
    }
    metadata.style = tags.clone().filter(|t| !t.is_empty());
}

impl Mapper {
    fn mapping(&self, item_id: &str, url: Option<String>) -> ProviderMapping {
        ProviderMapping::new(item_id, self.domain.as_str(), self.instance_id.as_str()).with_url(url)
    }

    pub fn parse_artist(&self, user: &SoundcloudUser) -> Result<Artist> {
        let item_id = required_id("user", user.id.as_ref())?;
        let mut artist = Artist::new(
            item_id.as_str(),
            self.domain.as_str(),
            user.username.clone().unwrap_or_default(),
        );
        let url = user
            .permalink
            .as_ref()
            .map(|permalink| format!("{}/{}", SITE_URL, permalink));
        artist.provider_mappings.insert(self.mapping(&item_id, url));
        artist.metadata.description = user.description.clone().filter(|d| !d.is_empty());
        if let Some(avatar) = &user.avatar_url {
            artist.metadata.images.push(MediaItemImage::thumb(avatar));
        }
        Ok(artist)
    }

    pub fn parse_playlist(&self, playlist: &SoundcloudPlaylist) -> Result<Playlist> {
        let item_id = required_id("playlist", playlist.id.as_ref())?;
        let mut result = Playlist::new(
            item_id.as_str(),
            self.domain.as_str(),
            playlist.title.clone().unwrap_or_default(),
        );
        result
            .provider_mappings
            .insert(self.mapping(&item_id, playlist.permalink_url.clone()));
        result.is_editable = false;

        let metadata = &mut result.metadata;
        metadata.description = playlist.description.clone().filter(|d| !d.is_empty());
        if let Some(artwork) = &playlist.artwork_url {
            metadata.images.push(MediaItemImage::thumb(artwork));
        }
        fill_genre_and_tags(metadata, &playlist.genre, &playlist.tag_list);
        Ok(result)
    }

    /// Map a track. `artist` is the resolved uploader, if any.
    pub fn parse_track(
        &self,
        track: &SoundcloudTrack,
        artist: Option<&SoundcloudUser>,
        position: TrackPosition,
    ) -> Result<Track> {
        let item_id = required_id("track", track.id.as_ref())?;
        let (name, version) = parse_title_and_version(track.title.as_deref().unwrap_or_default());
        let mut result = Track::new(item_id.as_str(), self.domain.as_str(), name);
        result.version = version;
        result.duration = track.duration.unwrap_or_default() / 1000;
        result.position = position;
        result.provider_mappings.insert(
            self.mapping(&item_id, track.permalink_url.clone())
                .with_audio_format(AudioFormat::new(ContentType::Mp3)),
        );

        if let Some(user) = artist {
            let artist_id = required_id("user", user.id.as_ref())?;
            let mut mapping = ItemMapping::new(
                MediaType::Artist,
                artist_id,
                self.instance_id.as_str(),
                user.username.clone().unwrap_or_default(),
            );
            mapping.image = user.avatar_url.as_deref().map(MediaItemImage::thumb);
            result.artists.push(mapping);
        }

        let metadata = &mut result.metadata;
        if let Some(artwork) = &track.artwork_url {
            metadata.images.push(MediaItemImage::thumb(artwork));
        }
        metadata.description = track.description.clone().filter(|d| !d.is_empty());
        fill_genre_and_tags(metadata, &track.genre, &track.tag_list);
        Ok(result)
    }

    pub fn artist_from_value(&self, value: Value) -> Result<Artist> {
        self.parse_artist(&decode("user", value)?)
    }

    pub fn playlist_from_value(&self, value: Value) -> Result<Playlist> {
        self.parse_playlist(&decode("playlist", value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> Mapper {
        Mapper {
            domain: "soundcloud".to_string(),
            instance_id: "soundcloud--xyz".to_string(),
        }
    }

    #[test]
    fn test_parse_artist() {
        let artist = mapper()
            .artist_from_value(json!({
                "id": 7,
                "username": "Field Recordist",
                "permalink": "field-recordist",
                "avatar_url": "https://i1.sndcdn.com/avatar.jpg",
                "description": ""
            }))
            .unwrap();

        assert_eq!(artist.item_id, "7");
        assert_eq!(artist.provider, "soundcloud");
        assert_eq!(artist.metadata.description, None);
        let mapping = artist.provider_mappings.iter().next().unwrap();
        assert_eq!(mapping.provider_instance, "soundcloud--xyz");
        assert_eq!(mapping.url.as_deref(), Some("https://soundcloud.com/field-recordist"));
    }

    #[test]
    fn test_artist_without_id_is_invalid() {
        let result = mapper().artist_from_value(json!({"username": "nobody"}));
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_parse_track_splits_version() {
        let track: SoundcloudTrack = decode(
            "track",
            json!({
                "id": 555,
                "title": "Night Drive (Extended Mix)",
                "duration": 241_500,
                "permalink_url": "https://soundcloud.com/a/night-drive",
                "genre": "Techno",
                "tag_list": "dark driving"
            }),
        )
        .unwrap();
        let user = SoundcloudUser {
            id: Some(SoundcloudId("7".into())),
            username: Some("Uploader".into()),
            ..Default::default()
        };
        let result = mapper()
            .parse_track(&track, Some(&user), TrackPosition::Playlist { position: 2 })
            .unwrap();

        assert_eq!(result.name, "Night Drive");
        assert_eq!(result.version, "Extended Mix");
        assert_eq!(result.duration, 241);
        assert_eq!(result.playlist_position(), Some(2));
        assert_eq!(result.artists[0].provider, "soundcloud--xyz");
        assert!(result.metadata.genres.contains("Techno"));
        assert_eq!(result.metadata.style.as_deref(), Some("dark driving"));
        assert_eq!(result.isrc(), None);
    }

    #[test]
    fn test_playlist_is_never_editable() {
        let playlist = mapper()
            .playlist_from_value(json!({"id": 9, "title": "Mix", "genre": ""}))
            .unwrap();
        assert!(!playlist.is_editable);
        assert!(playlist.metadata.genres.is_empty());
    }
}
