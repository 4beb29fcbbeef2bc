//! Canonical media model shared by all providers.
//!
//! Providers only construct these values; they are owned by the host once
//! returned.

pub mod album;
pub mod artist;
pub mod common;
pub mod media;
pub mod playlist;
pub mod stream;
pub mod track;

// Re-exports for convenience
pub use album::Album;
pub use artist::Artist;
pub use common::{
    AlbumType, AudioFormat, ContentType, ExternalId, ExternalIds, ImageType, ItemMapping,
    MediaItemImage, MediaItemMetadata, MediaType, ProviderMapping,
};
pub use media::{BrowseFolder, MediaItem, SearchResults};
pub use playlist::Playlist;
pub use stream::{StreamCallback, StreamDetails};
pub use track::{Track, TrackPosition};
