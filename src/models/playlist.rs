//! Playlist model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::common::{MediaItemMetadata, ProviderMapping};

/// Canonical playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub item_id: String,
    pub provider: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Whether the current user may add or remove tracks.
    pub is_editable: bool,
    #[serde(default)]
    pub metadata: MediaItemMetadata,
    pub provider_mappings: HashSet<ProviderMapping>,
}

impl Playlist {
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
            owner: None,
            is_editable: false,
            metadata: MediaItemMetadata::default(),
            provider_mappings: HashSet::new(),
        }
    }
}
