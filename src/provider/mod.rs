//! The provider contract.
//!
//! A provider is an implementation of [`Provider`] (lifecycle and identity)
//! and, for music sources, [`MusicProvider`] (catalog, library and playback).
//! Every `MusicProvider` operation defaults to [`ProviderError::NotImplemented`];
//! a provider overrides exactly the operations backing the features it
//! declares in [`Provider::supported_features`].

pub mod config;
pub mod host;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn, Span};

use crate::error::{ProviderError, Result};
use crate::logging;
use crate::models::{
    Album, Artist, BrowseFolder, MediaType, Playlist, SearchResults, StreamDetails, Track,
};

pub use config::{
    ConfigEntry, ConfigEntryType, ConfigValue, ConfigValues, ProviderConfig, ProviderManifest,
    ProviderType, CONF_LOG_LEVEL,
};
pub use host::{AuthenticationHelper, Host, StandaloneHost};

/// Capability a provider declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFeature {
    LibraryArtists,
    LibraryAlbums,
    LibraryTracks,
    LibraryPlaylists,
    LibraryArtistsEdit,
    LibraryAlbumsEdit,
    LibraryTracksEdit,
    LibraryPlaylistsEdit,
    ArtistMetadata,
    AlbumMetadata,
    TrackMetadata,
    ArtistAlbums,
    ArtistToptracks,
    Browse,
    Search,
    PlaylistTracksEdit,
    PlaylistCreate,
    Recommendations,
    SimilarTracks,
}

/// Serializable snapshot of a provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInstance {
    #[serde(rename = "type")]
    pub type_: ProviderType,
    pub domain: String,
    pub name: String,
    pub instance_id: String,
    pub supported_features: Vec<ProviderFeature>,
    pub available: bool,
}

/// State every provider carries: manifest, config, host handle and its
/// logging span.
pub struct ProviderBase {
    pub manifest: ProviderManifest,
    pub config: ProviderConfig,
    host: Arc<dyn Host>,
    span: Span,
    available: bool,
}

impl ProviderBase {
    pub fn new(host: Arc<dyn Host>, manifest: ProviderManifest, config: ProviderConfig) -> Self {
        let span = logging::provider_span(&manifest.domain, &config.instance_id);
        span.in_scope(|| debug!("Log level configured to {}", config.log_level().as_str()));
        Self {
            manifest,
            config,
            host,
            span,
            available: false,
        }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn domain(&self) -> &str {
        &self.manifest.domain
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Friendly name of this instance.
    ///
    /// A custom configured name wins. Otherwise the manifest name is used,
    /// suffixed with the instance id (minus its last 8 characters) when the
    /// host runs several instances of the same domain.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.config.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        if self.host.instance_count(self.domain()) > 1 {
            let id = self.instance_id();
            let keep = id.chars().count().saturating_sub(8);
            let postfix: String = id.chars().take(keep).collect();
            return format!("{}.{}", self.manifest.name, postfix);
        }
        self.manifest.name.clone()
    }
}

impl std::fmt::Debug for ProviderBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBase")
            .field("domain", &self.manifest.domain)
            .field("instance_id", &self.config.instance_id)
            .field("available", &self.available)
            .finish()
    }
}

/// Lifecycle and identity of a provider instance.
#[async_trait]
pub trait Provider: Send + Sync {
    fn base(&self) -> &ProviderBase;

    fn base_mut(&mut self) -> &mut ProviderBase;

    /// Features the host may invoke on this provider.
    fn supported_features(&self) -> &'static [ProviderFeature] {
        &[]
    }

    /// Authenticate and prepare vendor clients.
    async fn handle_setup(&mut self) -> Result<()> {
        self.base_mut().set_available(true);
        Ok(())
    }

    /// Release resources; called when the instance is deregistered.
    async fn unload(&mut self) -> Result<()> {
        self.base_mut().set_available(false);
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        self.base().manifest.type_
    }

    fn domain(&self) -> &str {
        self.base().domain()
    }

    fn instance_id(&self) -> &str {
        self.base().instance_id()
    }

    fn name(&self) -> String {
        self.base().display_name()
    }

    fn available(&self) -> bool {
        self.base().available()
    }

    fn supports(&self, feature: ProviderFeature) -> bool {
        self.supported_features().contains(&feature)
    }

    fn to_dict(&self) -> ProviderInstance {
        ProviderInstance {
            type_: self.provider_type(),
            domain: self.domain().to_string(),
            name: self.name(),
            instance_id: self.instance_id().to_string(),
            supported_features: self.supported_features().to_vec(),
            available: self.available(),
        }
    }
}

/// Build the error returned by operations a provider does not implement.
pub fn not_implemented(operation: &str) -> ProviderError {
    ProviderError::NotImplemented(operation.to_string())
}

/// A listing that fails immediately with `NotImplemented`.
pub fn not_implemented_stream<'a, T: Send + 'a>(operation: &str) -> BoxStream<'a, Result<T>> {
    error_stream(not_implemented(operation))
}

/// A listing that yields a single error.
pub fn error_stream<'a, T: Send + 'a>(error: ProviderError) -> BoxStream<'a, Result<T>> {
    stream::once(futures_util::future::ready(Err(error))).boxed()
}

/// Drop elements of a listing whose vendor record was malformed.
///
/// Any other error is kept so the caller sees transport and auth failures.
pub fn skip_malformed<T>(kind: &str, item: Result<T>) -> Option<Result<T>> {
    match item {
        Err(ProviderError::InvalidData(msg)) => {
            debug!("Skipping malformed {}: {}", kind, msg);
            None
        }
        other => Some(other),
    }
}

/// Degrade vendor-side failures of a single-item fetch to `None`.
pub fn soft_lookup<T>(kind: &str, item_id: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(item) => Ok(Some(item)),
        Err(e) if e.is_soft_lookup_failure() => {
            warn!("Could not fetch {} {}: {}", kind, item_id, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Map a raw listing through `parse`, skipping malformed elements.
pub fn map_listing<'a, T, F>(
    items: BoxStream<'a, Result<serde_json::Value>>,
    kind: &'static str,
    parse: F,
) -> BoxStream<'a, Result<T>>
where
    T: Send + 'a,
    F: Fn(serde_json::Value) -> Result<T> + Send + 'a,
{
    items
        .filter_map(move |item| {
            futures_util::future::ready(skip_malformed(kind, item.and_then(&parse)))
        })
        .boxed()
}

/// Catalog, library and playback operations of a music source.
///
/// Listings are one-shot lazy streams; bounded result sets are returned as
/// vectors. Single-item lookups return `Ok(None)` when the vendor does not
/// know the item.
#[async_trait]
pub trait MusicProvider: Provider {
    async fn search(
        &self,
        query: &str,
        media_types: &[MediaType],
        limit: usize,
    ) -> Result<SearchResults> {
        let _ = (query, media_types, limit);
        Err(not_implemented("search"))
    }

    fn get_library_artists(&self) -> BoxStream<'_, Result<Artist>> {
        not_implemented_stream("get_library_artists")
    }

    fn get_library_albums(&self) -> BoxStream<'_, Result<Album>> {
        not_implemented_stream("get_library_albums")
    }

    fn get_library_tracks(&self) -> BoxStream<'_, Result<Track>> {
        not_implemented_stream("get_library_tracks")
    }

    fn get_library_playlists(&self) -> BoxStream<'_, Result<Playlist>> {
        not_implemented_stream("get_library_playlists")
    }

    async fn get_artist(&self, prov_artist_id: &str) -> Result<Option<Artist>> {
        let _ = prov_artist_id;
        Err(not_implemented("get_artist"))
    }

    async fn get_album(&self, prov_album_id: &str) -> Result<Option<Album>> {
        let _ = prov_album_id;
        Err(not_implemented("get_album"))
    }

    async fn get_track(&self, prov_track_id: &str) -> Result<Option<Track>> {
        let _ = prov_track_id;
        Err(not_implemented("get_track"))
    }

    async fn get_playlist(&self, prov_playlist_id: &str) -> Result<Option<Playlist>> {
        let _ = prov_playlist_id;
        Err(not_implemented("get_playlist"))
    }

    async fn get_album_tracks(&self, prov_album_id: &str) -> Result<Vec<Track>> {
        let _ = prov_album_id;
        Err(not_implemented("get_album_tracks"))
    }

    fn get_playlist_tracks<'a>(&'a self, prov_playlist_id: &'a str) -> BoxStream<'a, Result<Track>> {
        let _ = prov_playlist_id;
        not_implemented_stream("get_playlist_tracks")
    }

    async fn get_artist_albums(&self, prov_artist_id: &str) -> Result<Vec<Album>> {
        let _ = prov_artist_id;
        Err(not_implemented("get_artist_albums"))
    }

    async fn get_artist_toptracks(&self, prov_artist_id: &str) -> Result<Vec<Track>> {
        let _ = prov_artist_id;
        Err(not_implemented("get_artist_toptracks"))
    }

    async fn get_similar_tracks(&self, prov_track_id: &str, limit: usize) -> Result<Vec<Track>> {
        let _ = (prov_track_id, limit);
        Err(not_implemented("get_similar_tracks"))
    }

    async fn recommendations(&self) -> Result<Vec<BrowseFolder>> {
        Err(not_implemented("recommendations"))
    }

    async fn library_add(&self, prov_item_id: &str, media_type: MediaType) -> Result<bool> {
        let _ = (prov_item_id, media_type);
        Err(not_implemented("library_add"))
    }

    async fn library_remove(&self, prov_item_id: &str, media_type: MediaType) -> Result<bool> {
        let _ = (prov_item_id, media_type);
        Err(not_implemented("library_remove"))
    }

    async fn add_playlist_tracks(&self, prov_playlist_id: &str, prov_track_ids: &[String]) -> Result<()> {
        let _ = (prov_playlist_id, prov_track_ids);
        Err(not_implemented("add_playlist_tracks"))
    }

    async fn remove_playlist_tracks(&self, prov_playlist_id: &str, positions: &[u32]) -> Result<()> {
        let _ = (prov_playlist_id, positions);
        Err(not_implemented("remove_playlist_tracks"))
    }

    async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        let _ = name;
        Err(not_implemented("create_playlist"))
    }

    /// Resolve how to play `item_id`.
    async fn get_stream_details(&self, item_id: &str) -> Result<StreamDetails>;

    /// Audio bytes for a resolved stream, starting at `seek_position` seconds.
    ///
    /// Only providers that must decode the stream themselves implement this;
    /// the others set [`StreamDetails::direct`].
    async fn get_audio_stream(
        &self,
        details: &mut StreamDetails,
        seek_position: u64,
    ) -> Result<BoxStream<'static, Result<Bytes>>> {
        let _ = (details, seek_position);
        Err(not_implemented("get_audio_stream"))
    }
}
