//! Album model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::common::{AlbumType, ExternalIds, ItemMapping, MediaItemMetadata, ProviderMapping};

/// Canonical album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub item_id: String,
    pub provider: String,
    pub name: String,
    #[serde(default)]
    pub album_type: AlbumType,
    #[serde(default)]
    pub artists: Vec<ItemMapping>,
    #[serde(default)]
    pub metadata: MediaItemMetadata,
    pub provider_mappings: HashSet<ProviderMapping>,
    #[serde(default)]
    pub external_ids: ExternalIds,
}

impl Album {
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
            album_type: AlbumType::default(),
            artists: Vec::new(),
            metadata: MediaItemMetadata::default(),
            provider_mappings: HashSet::new(),
            external_ids: ExternalIds::new(),
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
