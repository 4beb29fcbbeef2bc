//! Partial records of the SoundCloud v2 API.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};

/// SoundCloud id; numeric for most records, a URN string for some playlists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoundcloudId(pub String);

impl<'de> Deserialize<'de> for SoundcloudId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => Ok(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Ok(Self(s)),
            other => Err(de::Error::custom(format!("invalid id: {}", other))),
        }
    }
}

impl std::fmt::Display for SoundcloudId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoundcloudUser {
    pub id: Option<SoundcloudId>,
    pub username: Option<String>,
    pub permalink: Option<String>,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscodingFormat {
    pub protocol: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcoding {
    pub url: Option<String>,
    pub preset: Option<String>,
    pub format: Option<TranscodingFormat>,
}

impl Transcoding {
    pub fn is_progressive(&self) -> bool {
        self.format
            .as_ref()
            .and_then(|f| f.protocol.as_deref())
            == Some("progressive")
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.format.as_ref().and_then(|f| f.mime_type.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoundcloudMedia {
    #[serde(default)]
    pub transcodings: Vec<Transcoding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoundcloudTrack {
    pub id: Option<SoundcloudId>,
    pub title: Option<String>,
    /// Duration in milliseconds.
    pub duration: Option<u64>,
    pub permalink_url: Option<String>,
    pub artwork_url: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub tag_list: Option<String>,
    pub user: Option<SoundcloudUser>,
    pub media: Option<SoundcloudMedia>,
    pub track_authorization: Option<String>,
}

impl SoundcloudTrack {
    pub fn transcodings(&self) -> &[Transcoding] {
        self.media
            .as_ref()
            .map(|m| m.transcodings.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoundcloudPlaylist {
    pub id: Option<SoundcloudId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub artwork_url: Option<String>,
    pub permalink_url: Option<String>,
    pub genre: Option<String>,
    pub tag_list: Option<String>,
    /// Track stubs; only ids are guaranteed.
    #[serde(default)]
    pub tracks: Vec<Value>,
}

/// One page of a v2 collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub collection: Vec<Value>,
    pub next_href: Option<String>,
}

/// Decode a collection page.
///
/// A page with the wrong shape is an `Api` error: it ends the listing and
/// must reach the caller instead of being skipped like a bad element.
pub fn decode_collection(value: Value) -> Result<Collection> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::Api(format!("malformed SoundCloud collection: {}", e)))
}

/// Decode a raw record, reporting shape mismatches as invalid data.
pub fn decode<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::InvalidData(format!("malformed SoundCloud {}: {}", kind, e)))
}

/// `id` of a record, or of the record nested under `key`.
pub fn nested_id(value: &Value, key: Option<&str>) -> Result<SoundcloudId> {
    let record = match key {
        Some(key) => value.get(key),
        None => Some(value),
    };
    record
        .and_then(|r| r.get("id"))
        .cloned()
        .map(|id| decode::<SoundcloudId>("id", id))
        .unwrap_or_else(|| {
            Err(ProviderError::InvalidData(format!(
                "SoundCloud entry without {} id",
                key.unwrap_or("item")
            )))
        })
}
