//! Track model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::common::{ExternalId, ExternalIds, ItemMapping, MediaItemMetadata, ProviderMapping};

/// Where a track sits inside its container.
///
/// Chosen explicitly by the caller of a mapper: listings of a playlist pass
/// `Playlist`, album listings pass `Album`, everything else `Bare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackPosition {
    #[default]
    Bare,
    Playlist {
        position: u32,
    },
    Album {
        disc_number: u32,
        track_number: u32,
    },
}

/// Canonical track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub item_id: String,
    pub provider: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
    /// Duration in seconds.
    pub duration: u64,
    #[serde(default)]
    pub artists: Vec<ItemMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<ItemMapping>,
    #[serde(default)]
    pub metadata: MediaItemMetadata,
    pub provider_mappings: HashSet<ProviderMapping>,
    #[serde(default)]
    pub external_ids: ExternalIds,
    #[serde(default)]
    pub position: TrackPosition,
}

impl Track {
    pub fn new<S1, S2, S3>(item_id: S1, provider: S2, name: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            item_id: item_id.into(),
            provider: provider.into(),
            name: name.into(),
            version: String::new(),
            sort_name: None,
            duration: 0,
            artists: Vec::new(),
            album: None,
            metadata: MediaItemMetadata::default(),
            provider_mappings: HashSet::new(),
            external_ids: ExternalIds::new(),
            position: TrackPosition::Bare,
        }
    }

    /// The ISRC of this track, if known.
    pub fn isrc(&self) -> Option<&str> {
        self.external_ids
            .iter()
            .find(|(kind, _)| *kind == ExternalId::Isrc)
            .map(|(_, value)| value.as_str())
    }

    /// Playlist position, when this is a playlist track.
    pub fn playlist_position(&self) -> Option<u32> {
        match self.position {
            TrackPosition::Playlist { position } => Some(position),
            _ => None,
        }
    }

    /// Get all artist names joined by a separator.
    pub fn artists_string(&self, separator: &str) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::MediaType;

    #[test]
    fn test_isrc_lookup() {
        let mut track = Track::new("1", "deezer", "Song");
        assert_eq!(track.isrc(), None);

        track
            .external_ids
            .insert((ExternalId::Isrc, "GBAYE0601498".to_string()));
        assert_eq!(track.isrc(), Some("GBAYE0601498"));
    }

    #[test]
    fn test_artists_string() {
        let mut track = Track::new("1", "deezer", "Song");
        track
            .artists
            .push(ItemMapping::new(MediaType::Artist, "1", "dz", "A"));
        track
            .artists
            .push(ItemMapping::new(MediaType::Artist, "2", "dz", "B"));
        assert_eq!(track.artists_string(", "), "A, B");
    }

    #[test]
    fn test_position_serialization() {
        let value = serde_json::to_value(TrackPosition::Playlist { position: 3 }).unwrap();
        assert_eq!(value["kind"], "playlist");
        assert_eq!(value["position"], 3);
    }
}
