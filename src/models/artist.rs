//! Artist model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::common::{ItemMapping, MediaItemMetadata, MediaType, ProviderMapping};

/// Canonical artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub item_id: String,
    pub provider: String,
    pub name: String,
    #[serde(default)]
    pub metadata: MediaItemMetadata,
    pub provider_mappings: HashSet<ProviderMapping>,
}

impl Artist {
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
            metadata: MediaItemMetadata::default(),
            provider_mappings: HashSet::new(),
        }
    }

    /// Reduce to a reference usable inside tracks and albums.
    pub fn to_item_mapping(&self, provider_instance: &str) -> ItemMapping {
        let mut mapping = ItemMapping::new(
            MediaType::Artist,
            self.item_id.clone(),
            provider_instance,
            self.name.clone(),
        );
        mapping.image = self.metadata.images.first().cloned();
        mapping
    }
}
