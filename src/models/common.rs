//! Common types shared across all media items.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Kind of media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Artist,
    Album,
    Track,
    Playlist,
    Radio,
    Folder,
    Unknown,
}

impl MediaType {
    /// The four media types a provider can search for.
    pub const SEARCHABLE: [MediaType; 4] = [
        MediaType::Artist,
        MediaType::Album,
        MediaType::Track,
        MediaType::Playlist,
    ];
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaType::Artist => "artist",
            MediaType::Album => "album",
            MediaType::Track => "track",
            MediaType::Playlist => "playlist",
            MediaType::Radio => "radio",
            MediaType::Folder => "folder",
            MediaType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Album release type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumType {
    Album,
    Single,
    Compilation,
    Ep,
    #[default]
    Unknown,
}

impl AlbumType {
    /// Parse a vendor record type ("album", "single", "ep", "compile", ...).
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "album" => AlbumType::Album,
            "single" => AlbumType::Single,
            "ep" => AlbumType::Ep,
            "compile" | "compilation" => AlbumType::Compilation,
            _ => AlbumType::Unknown,
        }
    }
}

/// Audio container/codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Mp3,
    Flac,
    Aac,
    Ogg,
    Opus,
    M4a,
    Wav,
    #[default]
    Unknown,
}

impl ContentType {
    /// Best-effort parse of a codec name, file extension or mime type.
    ///
    /// Accepts values like `MP3`, `flac`, `audio/mpeg` or
    /// `audio/ogg; codecs="opus"`. Unrecognised input maps to `Unknown`.
    pub fn try_parse(value: &str) -> Self {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered.contains("opus") {
            return ContentType::Opus;
        }
        let base = lowered.split(';').next().unwrap_or_default().trim();
        let base = base.rsplit('/').next().unwrap_or(base);
        let base = base.trim_start_matches("x-");
        match base {
            "mp3" | "mpeg" | "mpeg3" => ContentType::Mp3,
            "flac" => ContentType::Flac,
            "aac" | "aacp" => ContentType::Aac,
            "ogg" | "vorbis" => ContentType::Ogg,
            "m4a" | "mp4" => ContentType::M4a,
            "wav" | "wave" => ContentType::Wav,
            _ => ContentType::Unknown,
        }
    }
}

/// Audio format details of a stream or provider mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AudioFormat {
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
}

impl AudioFormat {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            ..Default::default()
        }
    }
}

/// Kind of image attached to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Thumb,
    Fanart,
    Logo,
}

/// Image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaItemImage {
    #[serde(rename = "type")]
    pub type_: ImageType,
    pub path: String,
}

impl MediaItemImage {
    /// Create a thumbnail image from a URL.
    pub fn thumb<S: Into<String>>(path: S) -> Self {
        Self {
            type_: ImageType::Thumb,
            path: path.into(),
        }
    }
}

/// External identifier kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalId {
    Isrc,
    Upc,
    Musicbrainz,
}

/// Set of external ids, ordered for stable serialization.
pub type ExternalIds = BTreeSet<(ExternalId, String)>;

/// Optional descriptive metadata of a media item.
///
/// Every field is optional; mappers only fill what the vendor supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItemMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<MediaItemImage>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub genres: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Link from a canonical item to one provider's native id.
///
/// Two mappings are the same mapping when they point at the same item id on
/// the same provider instance; the remaining fields are descriptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMapping {
    pub item_id: String,
    pub provider_domain: String,
    pub provider_instance: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub audio_format: AudioFormat,
}

impl ProviderMapping {
    pub fn new<S1, S2, S3>(item_id: S1, provider_domain: S2, provider_instance: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            item_id: item_id.into(),
            provider_domain: provider_domain.into(),
            provider_instance: provider_instance.into(),
            available: true,
            url: None,
            audio_format: AudioFormat::default(),
        }
    }

    pub fn with_url<S: Into<String>>(mut self, url: Option<S>) -> Self {
        self.url = url.map(Into::into);
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn with_audio_format(mut self, audio_format: AudioFormat) -> Self {
        self.audio_format = audio_format;
        self
    }
}

impl PartialEq for ProviderMapping {
    fn eq(&self, other: &Self) -> bool {
        self.provider_instance == other.provider_instance && self.item_id == other.item_id
    }
}

impl Eq for ProviderMapping {}

impl Hash for ProviderMapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider_instance.hash(state);
        self.item_id.hash(state);
    }
}

/// Minimal reference to another media item (e.g. a track's album).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMapping {
    pub media_type: MediaType,
    pub item_id: String,
    pub provider: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaItemImage>,
}

impl ItemMapping {
    pub fn new<S1, S2, S3>(media_type: MediaType, item_id: S1, provider: S2, name: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            media_type,
            item_id: item_id.into(),
            provider: provider.into(),
            name: name.into(),
            image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_content_type_parse() {
        assert_eq!(ContentType::try_parse("MP3"), ContentType::Mp3);
        assert_eq!(ContentType::try_parse("FLAC"), ContentType::Flac);
        assert_eq!(ContentType::try_parse("audio/mpeg"), ContentType::Mp3);
        assert_eq!(
            ContentType::try_parse("audio/ogg; codecs=\"opus\""),
            ContentType::Opus
        );
        assert_eq!(ContentType::try_parse("audio/x-flac"), ContentType::Flac);
        assert_eq!(ContentType::try_parse("something"), ContentType::Unknown);
    }

    #[test]
    fn test_album_type_parse() {
        assert_eq!(AlbumType::parse("album"), AlbumType::Album);
        assert_eq!(AlbumType::parse("compile"), AlbumType::Compilation);
        assert_eq!(AlbumType::parse("EP"), AlbumType::Ep);
        assert_eq!(AlbumType::parse("bootleg"), AlbumType::Unknown);
    }

    #[test]
    fn test_provider_mapping_identity() {
        let a = ProviderMapping::new("1", "deezer", "deezer--abc").with_url(Some("x"));
        let b = ProviderMapping::new("1", "deezer", "deezer--abc").with_available(false);
        let c = ProviderMapping::new("2", "deezer", "deezer--abc");

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
