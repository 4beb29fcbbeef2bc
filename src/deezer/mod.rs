//! Deezer music provider.
//!
//! Catalog and library operations go through the public REST API; playback
//! goes through the private gateway, which hands out Blowfish stripe
//! encrypted streams that are decrypted on the fly.

pub mod api;
pub mod auth;
pub mod convert;
pub mod crypto;
pub mod gateway;
pub mod schema;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::header::RANGE;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::error::{ProviderError, Result};
use crate::models::{
    Album, Artist, AudioFormat, BrowseFolder, ContentType, MediaItem, MediaType, Playlist,
    SearchResults, StreamDetails, Track, TrackPosition,
};
use crate::provider::{
    error_stream, map_listing, skip_malformed, soft_lookup, Host, MusicProvider, Provider,
    ProviderBase, ProviderConfig, ProviderFeature, ProviderManifest, ProviderType,
};

pub use api::DeezerApi;
pub use auth::{get_config_entries, DeezerOAuth, CONF_ACCESS_TOKEN, CONF_ACTION_AUTH};
pub use convert::Mapper;
pub use gateway::GatewayClient;

pub const DOMAIN: &str = "deezer";

/// Top tracks requested per artist.
const ARTIST_TOP_TRACKS: usize = 50;

const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(600);

const SUPPORTED_FEATURES: &[ProviderFeature] = &[
    ProviderFeature::LibraryArtists,
    ProviderFeature::LibraryAlbums,
    ProviderFeature::LibraryTracks,
    ProviderFeature::LibraryPlaylists,
    ProviderFeature::LibraryAlbumsEdit,
    ProviderFeature::LibraryTracksEdit,
    ProviderFeature::LibraryArtistsEdit,
    ProviderFeature::LibraryPlaylistsEdit,
    ProviderFeature::AlbumMetadata,
    ProviderFeature::TrackMetadata,
    ProviderFeature::ArtistMetadata,
    ProviderFeature::ArtistAlbums,
    ProviderFeature::ArtistToptracks,
    ProviderFeature::Browse,
    ProviderFeature::Search,
    ProviderFeature::PlaylistTracksEdit,
    ProviderFeature::PlaylistCreate,
    ProviderFeature::Recommendations,
    ProviderFeature::SimilarTracks,
];

/// Manifest of the Deezer provider.
pub fn manifest() -> ProviderManifest {
    ProviderManifest {
        type_: ProviderType::Music,
        domain: DOMAIN.to_string(),
        name: "Deezer".to_string(),
        description: "Stream music from Deezer.".to_string(),
        requirements: Vec::new(),
    }
}

/// Vendor clients of an authenticated provider.
struct Session {
    api: DeezerApi,
    gw: Arc<GatewayClient>,
    mapper: Mapper,
    stream_client: Client,
}

impl Session {
    /// Run a per-type search and map its results.
    async fn search<T, F>(&self, kind: &'static str, query: &str, limit: usize, parse: F) -> Result<Vec<T>>
    where
        F: Fn(&Mapper, Value) -> Result<T>,
    {
        self.api
            .search(kind, query, limit)
            .await?
            .into_iter()
            .filter_map(|value| skip_malformed(kind, parse(&self.mapper, value)))
            .collect()
    }

    /// Collect a full listing, skipping malformed elements.
    async fn collect<T, F>(&self, path: &str, kind: &'static str, parse: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize, Value) -> Result<T> + Send,
    {
        let items: Vec<Value> = self.api.paginate(path, Vec::new()).try_collect().await?;
        items
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| skip_malformed(kind, parse(index, value)))
            .collect()
    }
}

/// Library collection name of a media type.
fn library_kind(media_type: MediaType) -> Result<&'static str> {
    match media_type {
        MediaType::Artist => Ok("artists"),
        MediaType::Album => Ok("albums"),
        MediaType::Track => Ok("tracks"),
        MediaType::Playlist => Ok("playlists"),
        other => Err(ProviderError::NotImplemented(format!(
            "library edit of {}",
            other
        ))),
    }
}

/// Deezer ids are integers; reject anything else before calling the API.
fn numeric_id(id: &str) -> Result<&str> {
    id.parse::<i64>()
        .map(|_| id)
        .map_err(|_| ProviderError::InvalidData(format!("invalid Deezer id: {}", id)))
}

/// Deezer music provider instance.
#[derive(Debug)]
pub struct DeezerProvider {
    base: ProviderBase,
    session: Option<Session>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.mapper.user_id)
            .field("user_country", &self.mapper.user_country)
            .finish()
    }
}

impl DeezerProvider {
    pub fn new(host: Arc<dyn Host>, config: ProviderConfig) -> Self {
        Self {
            base: ProviderBase::new(host, manifest(), config),
            session: None,
        }
    }

    /// Create and set up a provider instance.
    pub async fn setup(host: Arc<dyn Host>, config: ProviderConfig) -> Result<Self> {
        let mut provider = Self::new(host, config);
        provider.handle_setup().await?;
        Ok(provider)
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| ProviderError::LoginFailed("Deezer provider is not set up".to_string()))
    }

    /// Fetch the current user and keep the clients for later calls.
    async fn attach(&mut self, api: DeezerApi, gw: GatewayClient) -> Result<()> {
        let user = api.get_user_me().await?;
        let user_id = user
            .id
            .ok_or_else(|| ProviderError::LoginFailed("Deezer returned no user".to_string()))?;
        info!(
            "Logged in to Deezer as {} ({})",
            user.name.as_deref().unwrap_or_default(),
            user_id
        );

        let stream_client = Client::builder()
            .connect_timeout(STREAM_CONNECT_TIMEOUT)
            .read_timeout(STREAM_READ_TIMEOUT)
            .build()?;
        let user_country = Some(gw.user_country().to_string()).filter(|c| !c.is_empty());

        self.session = Some(Session {
            api,
            gw: Arc::new(gw),
            mapper: Mapper {
                domain: self.base.domain().to_string(),
                instance_id: self.base.instance_id().to_string(),
                user_id: Some(user_id),
                user_country,
            },
            stream_client,
        });
        Ok(())
    }

    fn listing<'a, T, F>(&'a self, build: F) -> BoxStream<'a, Result<T>>
    where
        T: Send + 'a,
        F: FnOnce(&'a Session) -> BoxStream<'a, Result<T>>,
    {
        match self.session() {
            Ok(session) => build(session),
            Err(e) => error_stream(e),
        }
    }
}

#[async_trait]
impl Provider for DeezerProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    fn supported_features(&self) -> &'static [ProviderFeature] {
        SUPPORTED_FEATURES
    }

    async fn handle_setup(&mut self) -> Result<()> {
        let span = self.base.span().clone();
        async {
            let access_token = self
                .base
                .config
                .get_str(CONF_ACCESS_TOKEN)
                .ok_or_else(|| ProviderError::LoginFailed("Invalid login credentials".to_string()))?
                .to_string();

            let api = DeezerApi::new(self.base.host().http_client().clone(), access_token.as_str());
            let gw = GatewayClient::connect(&access_token).await?;
            self.attach(api, gw).await?;
            self.base.set_available(true);
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn unload(&mut self) -> Result<()> {
        self.session = None;
        self.base.set_available(false);
        Ok(())
    }
}

#[async_trait]
impl MusicProvider for DeezerProvider {
    async fn search(
        &self,
        query: &str,
        media_types: &[MediaType],
        limit: usize,
    ) -> Result<SearchResults> {
        let session = self.session()?;
        let wanted = |media_type: MediaType| media_types.is_empty() || media_types.contains(&media_type);
        let started = Instant::now();

        let (artists, albums, tracks, playlists) = tokio::try_join!(
            async {
                if wanted(MediaType::Artist) {
                    session.search("artist", query, limit, |m, v| m.artist_from_value(v)).await
                } else {
                    Ok(Vec::new())
                }
            },
            async {
                if wanted(MediaType::Album) {
                    session.search("album", query, limit, |m, v| m.album_from_value(v)).await
                } else {
                    Ok(Vec::new())
                }
            },
            async {
                if wanted(MediaType::Track) {
                    session
                        .search("track", query, limit, |m, v| {
                            m.track_from_value(v, TrackPosition::Bare)
                        })
                        .await
                } else {
                    Ok(Vec::new())
                }
            },
            async {
                if wanted(MediaType::Playlist) {
                    session.search("playlist", query, limit, |m, v| m.playlist_from_value(v)).await
                } else {
                    Ok(Vec::new())
                }
            },
        )?;

        debug!(
            "Search for '{}' took {:.2}s",
            query,
            started.elapsed().as_secs_f64()
        );
        Ok(SearchResults {
            artists,
            albums,
            tracks,
            playlists,
        })
    }

    fn get_library_artists(&self) -> BoxStream<'_, Result<Artist>> {
        self.listing(|session| {
            let mapper = &session.mapper;
            map_listing(session.api.paginate("user/me/artists", Vec::new()), "artist", move |v| {
                mapper.artist_from_value(v)
            })
        })
    }

    fn get_library_albums(&self) -> BoxStream<'_, Result<Album>> {
        self.listing(|session| {
            let mapper = &session.mapper;
            map_listing(session.api.paginate("user/me/albums", Vec::new()), "album", move |v| {
                mapper.album_from_value(v)
            })
        })
    }

    fn get_library_tracks(&self) -> BoxStream<'_, Result<Track>> {
        self.listing(|session| {
            let mapper = &session.mapper;
            map_listing(session.api.paginate("user/me/tracks", Vec::new()), "track", move |v| {
                mapper.track_from_value(v, TrackPosition::Bare)
            })
        })
    }

    fn get_library_playlists(&self) -> BoxStream<'_, Result<Playlist>> {
        self.listing(|session| {
            let mapper = &session.mapper;
            map_listing(
                session.api.paginate("user/me/playlists", Vec::new()),
                "playlist",
                move |v| mapper.playlist_from_value(v),
            )
        })
    }

    async fn get_artist(&self, prov_artist_id: &str) -> Result<Option<Artist>> {
        let session = self.session()?;
        let result = async {
            session
                .mapper
                .artist_from_value(session.api.get_artist(prov_artist_id).await?)
        }
        .await;
        soft_lookup("artist", prov_artist_id, result)
    }

    async fn get_album(&self, prov_album_id: &str) -> Result<Option<Album>> {
        let session = self.session()?;
        let result = async {
            session
                .mapper
                .album_from_value(session.api.get_album(prov_album_id).await?)
        }
        .await;
        soft_lookup("album", prov_album_id, result)
    }

    async fn get_track(&self, prov_track_id: &str) -> Result<Option<Track>> {
        let session = self.session()?;
        let result = async {
            session.mapper.track_from_value(
                session.api.get_track(prov_track_id).await?,
                TrackPosition::Bare,
            )
        }
        .await;
        soft_lookup("track", prov_track_id, result)
    }

    async fn get_playlist(&self, prov_playlist_id: &str) -> Result<Option<Playlist>> {
        let session = self.session()?;
        let result = async {
            session
                .mapper
                .playlist_from_value(session.api.get_playlist(prov_playlist_id).await?)
        }
        .await;
        soft_lookup("playlist", prov_playlist_id, result)
    }

    async fn get_album_tracks(&self, prov_album_id: &str) -> Result<Vec<Track>> {
        let session = self.session()?;
        let mapper = &session.mapper;
        session
            .collect(
                &format!("album/{}/tracks", prov_album_id),
                "track",
                |index, value| {
                    let position = TrackPosition::Album {
                        disc_number: 0,
                        track_number: index as u32 + 1,
                    };
                    mapper.track_from_value(value, position)
                },
            )
            .await
    }

    fn get_playlist_tracks<'a>(&'a self, prov_playlist_id: &'a str) -> BoxStream<'a, Result<Track>> {
        self.listing(move |session| {
            let mapper = &session.mapper;
            session
                .api
                .paginate(&format!("playlist/{}/tracks", prov_playlist_id), Vec::new())
                .enumerate()
                .filter_map(move |(index, item)| {
                    let position = TrackPosition::Playlist {
                        position: index as u32 + 1,
                    };
                    let track = item.and_then(|v| mapper.track_from_value(v, position));
                    future::ready(skip_malformed("track", track))
                })
                .boxed()
        })
    }

    async fn get_artist_albums(&self, prov_artist_id: &str) -> Result<Vec<Album>> {
        let session = self.session()?;
        let mapper = &session.mapper;
        session
            .collect(
                &format!("artist/{}/albums", prov_artist_id),
                "album",
                |_, value| mapper.album_from_value(value),
            )
            .await
    }

    async fn get_artist_toptracks(&self, prov_artist_id: &str) -> Result<Vec<Track>> {
        let session = self.session()?;
        let limit = ARTIST_TOP_TRACKS.to_string();
        let items: Vec<Value> = session
            .api
            .paginate(
                &format!("artist/{}/top", prov_artist_id),
                api::params([("limit", limit.as_str())]),
            )
            .take(ARTIST_TOP_TRACKS)
            .try_collect()
            .await?;
        items
            .into_iter()
            .filter_map(|value| {
                skip_malformed(
                    "track",
                    session.mapper.track_from_value(value, TrackPosition::Bare),
                )
            })
            .collect()
    }

    async fn get_similar_tracks(&self, prov_track_id: &str, limit: usize) -> Result<Vec<Track>> {
        let session = self.session()?;
        let ids = session.gw.get_track_mix(prov_track_id).await?;

        let mut tracks = Vec::new();
        for id in ids.iter().take(limit) {
            if let Some(track) = self.get_track(id).await? {
                tracks.push(track);
            }
        }
        Ok(tracks)
    }

    async fn recommendations(&self) -> Result<Vec<BrowseFolder>> {
        let session = self.session()?;
        let mapper = &session.mapper;
        let tracks = session
            .collect("user/me/recommendations/tracks", "track", |_, value| {
                mapper.track_from_value(value, TrackPosition::Bare)
            })
            .await?;

        Ok(vec![BrowseFolder {
            item_id: "recommendations".to_string(),
            provider: self.domain().to_string(),
            path: "recommendations".to_string(),
            name: "Recommendations".to_string(),
            label: "recommendations".to_string(),
            items: tracks.into_iter().map(MediaItem::Track).collect(),
        }])
    }

    async fn library_add(&self, prov_item_id: &str, media_type: MediaType) -> Result<bool> {
        let kind = library_kind(media_type)?;
        let id = numeric_id(prov_item_id)?;
        self.session()?.api.library_add(kind, id).await
    }

    async fn library_remove(&self, prov_item_id: &str, media_type: MediaType) -> Result<bool> {
        let kind = library_kind(media_type)?;
        let id = numeric_id(prov_item_id)?;
        self.session()?.api.library_remove(kind, id).await
    }

    async fn add_playlist_tracks(&self, prov_playlist_id: &str, prov_track_ids: &[String]) -> Result<()> {
        let playlist_id = numeric_id(prov_playlist_id)?;
        for id in prov_track_ids {
            numeric_id(id)?;
        }
        self.session()?
            .api
            .add_playlist_tracks(playlist_id, prov_track_ids)
            .await?;
        Ok(())
    }

    async fn remove_playlist_tracks(&self, prov_playlist_id: &str, positions: &[u32]) -> Result<()> {
        let playlist_id = numeric_id(prov_playlist_id)?;
        let wanted: HashSet<u32> = positions.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(());
        }

        let mut track_ids = Vec::with_capacity(wanted.len());
        let mut tracks = self.get_playlist_tracks(playlist_id);
        while let Some(track) = tracks.next().await {
            let track = track?;
            if track.playlist_position().is_some_and(|p| wanted.contains(&p)) {
                track_ids.push(track.item_id);
            }
            if track_ids.len() == wanted.len() {
                break;
            }
        }
        drop(tracks);

        if track_ids.is_empty() {
            debug!("No tracks at positions {:?} of playlist {}", positions, playlist_id);
            return Ok(());
        }
        self.session()?
            .api
            .remove_playlist_tracks(playlist_id, &track_ids)
            .await?;
        Ok(())
    }

    async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        let session = self.session()?;
        let playlist = session.api.create_playlist(name).await?;
        session.mapper.parse_playlist(&playlist)
    }

    async fn get_stream_details(&self, item_id: &str) -> Result<StreamDetails> {
        let session = self.session()?;
        let (track_url, song) = session
            .gw
            .get_track_url(item_id)
            .instrument(self.base.span().clone())
            .await?;

        let codec = track_url.format.split('_').next().unwrap_or_default();
        let mut details = StreamDetails::new(self.instance_id(), item_id);
        details.audio_format = AudioFormat::new(ContentType::try_parse(codec));
        details.duration = song.duration;
        details.size = song.file_size(&track_url.format);
        details.expires = track_url.expires;
        details.data.insert("url".to_string(), json!(track_url.url));
        details.data.insert("format".to_string(), json!(track_url.format));

        let gw = Arc::clone(&session.gw);
        details.callback = Some(Arc::new(
            move |finished: StreamDetails| -> BoxFuture<'static, Result<()>> {
                let gw = Arc::clone(&gw);
                async move { gw.log_listen(None, Some(&finished)).await }.boxed()
            },
        ));
        Ok(details)
    }

    async fn get_audio_stream(
        &self,
        details: &mut StreamDetails,
        seek_position: u64,
    ) -> Result<BoxStream<'static, Result<Bytes>>> {
        let session = self.session()?;
        let url = details
            .data_str("url")
            .ok_or_else(|| ProviderError::InvalidData("stream details without url".to_string()))?
            .to_string();
        let key = crypto::blowfish_key(&details.item_id);

        let mut request = session.stream_client.get(&url);
        let mut first_segment = 0;
        if seek_position > 0 {
            if let (Some(size), Some(duration)) = (details.size, details.duration) {
                first_segment = crypto::seek_segment_index(size, duration, seek_position);
                if first_segment > 0 {
                    let offset = crypto::segment_offset(first_segment);
                    request = request.header(RANGE, format!("bytes={}-", offset));
                }
            }
        }

        details
            .data
            .insert("start_ts".to_string(), json!(Utc::now().timestamp()));
        details
            .data
            .insert("stream_id".to_string(), json!(Uuid::new_v4().to_string()));
        details
            .data
            .insert("seek_position".to_string(), json!(seek_position));

        let gw = Arc::clone(&session.gw);
        let next_track = details.item_id.clone();
        self.base.host().spawn(
            async move {
                if let Err(e) = gw.log_listen(Some(&next_track), None).await {
                    warn!("Failed to report upcoming track {}: {}", next_track, e);
                }
            }
            .instrument(self.base.span().clone())
            .boxed(),
        );

        debug!(
            "Streaming {} from segment {} ({})",
            details.item_id,
            first_segment,
            details.data_str("format").unwrap_or_default()
        );
        let response = request.send().await?.error_for_status()?;
        Ok(crypto::decrypt_stream(
            response.bytes_stream(),
            key,
            first_segment,
        ))
    }
}
