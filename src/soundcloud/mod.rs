//! SoundCloud music provider.
//!
//! Read-only: library, search and lookups through the v2 API. Streams are
//! not decoded locally; the host fetches the resolved URL directly.

pub mod api;
pub mod convert;
pub mod schema;

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

use crate::error::{ProviderError, Result};
use crate::models::{
    Artist, AudioFormat, ContentType, MediaType, Playlist, SearchResults, StreamDetails, Track,
    TrackPosition,
};
use crate::provider::config::log_level_entry;
use crate::provider::{
    error_stream, map_listing, skip_malformed, soft_lookup, ConfigEntry, ConfigEntryType,
    ConfigValues, Host, MusicProvider, Provider, ProviderBase, ProviderConfig, ProviderFeature,
    ProviderManifest, ProviderType,
};
use schema::{decode, nested_id, SoundcloudPlaylist, SoundcloudTrack, SoundcloudUser};

pub use api::SoundcloudApi;
pub use convert::Mapper;

pub const DOMAIN: &str = "soundcloud";

pub const CONF_CLIENT_ID: &str = "client_id";
pub const CONF_AUTHORIZATION: &str = "authorization";

/// Top tracks requested per artist.
const ARTIST_TOP_TRACKS: usize = 25;

const SUPPORTED_FEATURES: &[ProviderFeature] = &[
    ProviderFeature::LibraryArtists,
    ProviderFeature::LibraryTracks,
    ProviderFeature::LibraryPlaylists,
    ProviderFeature::Browse,
    ProviderFeature::Search,
    ProviderFeature::ArtistToptracks,
    ProviderFeature::SimilarTracks,
];

pub fn manifest() -> ProviderManifest {
    ProviderManifest {
        type_: ProviderType::Music,
        domain: DOMAIN.to_string(),
        name: "SoundCloud".to_string(),
        description: "Stream music from SoundCloud.".to_string(),
        requirements: Vec::new(),
    }
}

/// Setup form of the SoundCloud provider.
pub fn get_config_entries(values: &ConfigValues) -> Vec<ConfigEntry> {
    vec![
        ConfigEntry::new(CONF_CLIENT_ID, ConfigEntryType::SecureString, "Client ID")
            .required()
            .with_value(values.get(CONF_CLIENT_ID).cloned()),
        ConfigEntry::new(
            CONF_AUTHORIZATION,
            ConfigEntryType::SecureString,
            "Authorization",
        )
        .required()
        .with_description("The OAuth token sent in the Authorization header.")
        .with_value(values.get(CONF_AUTHORIZATION).cloned()),
        log_level_entry(),
    ]
}

struct Session {
    api: SoundcloudApi,
    mapper: Mapper,
    user_id: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Session {
    /// Full uploader record, falling back to the one embedded in the track.
    async fn uploader(&self, track: &SoundcloudTrack) -> Option<SoundcloudUser> {
        let embedded = track.user.as_ref()?;
        let Some(user_id) = &embedded.id else {
            return Some(embedded.clone());
        };
        let full = self
            .api
            .get_user_details(&user_id.0)
            .await
            .and_then(|value| decode::<SoundcloudUser>("user", value));
        match full {
            Ok(user) if user.id.is_some() => Some(user),
            Ok(_) => Some(embedded.clone()),
            Err(e) => {
                debug!("Using embedded user {}: {}", user_id, e);
                Some(embedded.clone())
            }
        }
    }

    async fn parse_track(&self, track: &SoundcloudTrack, position: TrackPosition) -> Result<Track> {
        let uploader = self.uploader(track).await;
        self.mapper.parse_track(track, uploader.as_ref(), position)
    }

    async fn fetch_track(&self, track_id: &str) -> Result<SoundcloudTrack> {
        let details = self.api.get_track_details(track_id).await?;
        let value = details.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidData(format!("no details for track {}", track_id))
        })?;
        decode("track", value)
    }

    async fn track_by_id(&self, track_id: &str, position: TrackPosition) -> Result<Track> {
        let track = self.fetch_track(track_id).await?;
        self.parse_track(&track, position).await
    }

    async fn playlist_by_id(&self, playlist_id: &str) -> Result<Playlist> {
        let value = self.api.get_playlist_details(playlist_id).await?;
        self.mapper.playlist_from_value(value)
    }

    /// Fetch each listed track in full, skipping malformed ones.
    async fn tracks_from_stubs(&self, stubs: Vec<Value>) -> Result<Vec<Track>> {
        let mut tracks = Vec::with_capacity(stubs.len());
        for stub in stubs {
            let track = match nested_id(&stub, None) {
                Ok(id) => self.track_by_id(&id.0, TrackPosition::Bare).await,
                Err(e) => Err(e),
            };
            if let Some(track) = skip_malformed("track", track) {
                tracks.push(track?);
            }
        }
        Ok(tracks)
    }
}

/// SoundCloud music provider instance.
#[derive(Debug)]
pub struct SoundcloudProvider {
    base: ProviderBase,
    session: Option<Session>,
}

impl SoundcloudProvider {
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
        self.session.as_ref().ok_or_else(|| {
            ProviderError::LoginFailed("SoundCloud provider is not set up".to_string())
        })
    }

    async fn attach(&mut self, api: SoundcloudApi) -> Result<()> {
        let me = api.get_account_details().await?;
        let user_id = me
            .id
            .ok_or_else(|| ProviderError::LoginFailed("SoundCloud returned no user".to_string()))?;
        info!(
            "Logged in to SoundCloud as {} ({})",
            me.username.as_deref().unwrap_or_default(),
            user_id
        );

        self.session = Some(Session {
            api,
            mapper: Mapper {
                domain: self.base.domain().to_string(),
                instance_id: self.base.instance_id().to_string(),
            },
            user_id: user_id.0,
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
impl Provider for SoundcloudProvider {
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
            let config = &self.base.config;
            let (Some(client_id), Some(authorization)) = (
                config.get_str(CONF_CLIENT_ID),
                config.get_str(CONF_AUTHORIZATION),
            ) else {
                return Err(ProviderError::LoginFailed(
                    "Invalid login credentials".to_string(),
                ));
            };

            let api = SoundcloudApi::new(
                self.base.host().http_client().clone(),
                client_id,
                authorization,
            );
            self.attach(api).await?;
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
impl MusicProvider for SoundcloudProvider {
    async fn search(
        &self,
        query: &str,
        media_types: &[MediaType],
        limit: usize,
    ) -> Result<SearchResults> {
        let session = self.session()?;
        let wanted = |media_type: MediaType| media_types.is_empty() || media_types.contains(&media_type);
        let started = Instant::now();

        let mut results = SearchResults::default();
        for item in session.api.search(query, limit).await? {
            match item.get("kind").and_then(Value::as_str) {
                Some("user") if wanted(MediaType::Artist) => {
                    if let Some(artist) = skip_malformed("artist", session.mapper.artist_from_value(item)) {
                        results.artists.push(artist?);
                    }
                }
                Some("track") if wanted(MediaType::Track) => {
                    let track = match decode::<SoundcloudTrack>("track", item) {
                        Ok(track) => session.parse_track(&track, TrackPosition::Bare).await,
                        Err(e) => Err(e),
                    };
                    if let Some(track) = skip_malformed("track", track) {
                        results.tracks.push(track?);
                    }
                }
                Some("playlist") if wanted(MediaType::Playlist) => {
                    if let Some(playlist) =
                        skip_malformed("playlist", session.mapper.playlist_from_value(item))
                    {
                        results.playlists.push(playlist?);
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Search for '{}' took {:.2}s",
            query,
            started.elapsed().as_secs_f64()
        );
        Ok(results)
    }

    fn get_library_artists(&self) -> BoxStream<'_, Result<Artist>> {
        self.listing(|session| {
            let mapper = &session.mapper;
            map_listing(session.api.get_following(&session.user_id), "artist", move |v| {
                mapper.artist_from_value(v)
            })
        })
    }

    fn get_library_tracks(&self) -> BoxStream<'_, Result<Track>> {
        self.listing(|session| {
            session
                .api
                .get_tracks_liked(&session.user_id)
                .then(move |item| async move {
                    let track_id = nested_id(&item?, Some("track"))?;
                    session.track_by_id(&track_id.0, TrackPosition::Bare).await
                })
                .filter_map(|track| future::ready(skip_malformed("track", track)))
                .boxed()
        })
    }

    fn get_library_playlists(&self) -> BoxStream<'_, Result<Playlist>> {
        self.listing(|session| {
            session
                .api
                .get_account_playlists()
                .then(move |item| async move {
                    let playlist_id = nested_id(&item?, Some("playlist"))?;
                    session.playlist_by_id(&playlist_id.0).await
                })
                .filter_map(|playlist| future::ready(skip_malformed("playlist", playlist)))
                .boxed()
        })
    }

    async fn get_artist(&self, prov_artist_id: &str) -> Result<Option<Artist>> {
        let session = self.session()?;
        let result = async {
            session
                .mapper
                .artist_from_value(session.api.get_user_details(prov_artist_id).await?)
        }
        .await;
        soft_lookup("artist", prov_artist_id, result)
    }

    async fn get_track(&self, prov_track_id: &str) -> Result<Option<Track>> {
        let session = self.session()?;
        let result = session.track_by_id(prov_track_id, TrackPosition::Bare).await;
        soft_lookup("track", prov_track_id, result)
    }

    async fn get_playlist(&self, prov_playlist_id: &str) -> Result<Option<Playlist>> {
        let session = self.session()?;
        let result = session.playlist_by_id(prov_playlist_id).await;
        soft_lookup("playlist", prov_playlist_id, result)
    }

    fn get_playlist_tracks<'a>(&'a self, prov_playlist_id: &'a str) -> BoxStream<'a, Result<Track>> {
        self.listing(move |session| {
            stream::once(async move {
                let value = session.api.get_playlist_details(prov_playlist_id).await?;
                let playlist: SoundcloudPlaylist = decode("playlist", value).map_err(|e| {
                    ProviderError::Api(format!("playlist {} has no track list: {}", prov_playlist_id, e))
                })?;
                Ok::<_, ProviderError>(stream::iter(
                    playlist
                        .tracks
                        .into_iter()
                        .enumerate()
                        .map(Ok::<_, ProviderError>),
                ))
            })
            .try_flatten()
            .then(move |item| async move {
                let (index, stub) = item?;
                let track_id = nested_id(&stub, None)?;
                let position = TrackPosition::Playlist {
                    position: index as u32 + 1,
                };
                session.track_by_id(&track_id.0, position).await
            })
            .filter_map(|track| future::ready(skip_malformed("track", track)))
            .boxed()
        })
    }

    async fn get_artist_toptracks(&self, prov_artist_id: &str) -> Result<Vec<Track>> {
        let session = self.session()?;
        let started = Instant::now();
        let stubs = session
            .api
            .get_popular_tracks_user(prov_artist_id, ARTIST_TOP_TRACKS)
            .await?;
        let tracks = session.tracks_from_stubs(stubs).await?;
        debug!(
            "Top tracks of {} took {:.2}s",
            prov_artist_id,
            started.elapsed().as_secs_f64()
        );
        Ok(tracks)
    }

    async fn get_similar_tracks(&self, prov_track_id: &str, limit: usize) -> Result<Vec<Track>> {
        let session = self.session()?;
        let stubs = session.api.get_recommended(prov_track_id, limit).await?;
        session.tracks_from_stubs(stubs).await
    }

    async fn get_stream_details(&self, item_id: &str) -> Result<StreamDetails> {
        let session = self.session()?;
        let track = session
            .fetch_track(item_id)
            .await
            .map_err(|e| match e {
                ProviderError::InvalidData(msg) => ProviderError::NotFound(msg),
                other => other,
            })?;
        let stream = session
            .api
            .get_stream_url(&track)
            .instrument(self.base.span().clone())
            .await?;

        let mut details = StreamDetails::new(self.instance_id(), item_id);
        details.audio_format = AudioFormat::new(ContentType::try_parse(
            stream.mime_type.as_deref().unwrap_or_default(),
        ));
        details.duration = track.duration.map(|ms| ms / 1000);
        details.direct = Some(stream.url);
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StandaloneHost;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer) -> SoundcloudProvider {
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 100, "username": "listener"})),
            )
            .mount(server)
            .await;

        let host = StandaloneHost::with_client(Client::new());
        let mut provider =
            SoundcloudProvider::new(Arc::new(host), ProviderConfig::new("soundcloud--test1234"));
        let api = SoundcloudApi::new(Client::new(), "cid", "OAuth x").with_base_url(server.uri());
        provider.attach(api).await.unwrap();
        provider
    }

    async fn mount_track(server: &MockServer, id: u64, title: &str) {
        Mock::given(method("GET"))
            .and(path("/tracks"))
            .and(query_param("ids", id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": id,
                "title": title,
                "duration": 180_000,
                "user": {"id": 7, "username": "embedded"}
            }])))
            .mount(server)
            .await;
    }

    async fn mount_uploader(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/users/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7, "username": "Full Name", "permalink": "full"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_setup_requires_both_credentials() {
        let host = Arc::new(StandaloneHost::with_client(Client::new()));
        let config = ProviderConfig::new("soundcloud--1").with_value(CONF_CLIENT_ID, "cid");
        let error = tokio_test::assert_err!(SoundcloudProvider::setup(host, config).await);
        assert!(matches!(error, ProviderError::LoginFailed(_)));
    }

    #[test]
    fn test_config_entries() {
        let mut values = ConfigValues::new();
        values.insert(CONF_CLIENT_ID.to_string(), "cid".into());
        let entries = get_config_entries(&values);

        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec![CONF_CLIENT_ID, CONF_AUTHORIZATION, "log_level"]);
        assert!(entries[0].required && entries[1].required);
        assert_eq!(entries[0].type_, ConfigEntryType::SecureString);
        assert_eq!(entries[0].value, Some("cid".into()));
        assert_eq!(entries[1].value, None);
    }

    #[tokio::test]
    async fn test_search_splits_by_kind() {
        let server = MockServer::start().await;
        Mock::given(path("/search"))
            .and(query_param("q", "drive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"collection": [
                {"kind": "user", "id": 1, "username": "a"},
                {"kind": "user", "username": "no id"},
                {"kind": "track", "id": 2, "title": "Drive (VIP)", "duration": 1000,
                 "user": {"id": 7, "username": "embedded"}},
                {"kind": "track", "id": 3, "title": "Preview", "duration": 30000, "full_duration": 200000},
                {"kind": "playlist", "id": 4, "title": "Set"}
            ]})))
            .mount(&server)
            .await;
        mount_uploader(&server).await;
        let provider = provider(&server).await;

        let all = provider.search("drive", &[], 10).await.unwrap();
        assert_eq!(all.artists.len(), 1);
        assert_eq!(all.tracks.len(), 2);
        assert_eq!(all.tracks[0].version, "VIP");
        assert_eq!(all.tracks[0].artists[0].name, "Full Name");
        assert_eq!(all.playlists.len(), 1);

        let only_playlists = provider
            .search("drive", &[MediaType::Playlist], 10)
            .await
            .unwrap();
        assert_eq!(only_playlists.len(), 1);
    }

    #[tokio::test]
    async fn test_search_keeps_preview_tracks() {
        let server = MockServer::start().await;
        Mock::given(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"collection": [
                {"kind": "track", "id": 3, "title": "Teaser", "duration": 30000, "full_duration": 200000}
            ]})))
            .mount(&server)
            .await;
        let provider = provider(&server).await;

        let results = provider.search("teaser", &[MediaType::Track], 10).await.unwrap();
        assert_eq!(results.tracks.len(), 1);
        assert_eq!(results.tracks[0].item_id, "3");
        assert_eq!(results.tracks[0].duration, 30);
    }

    #[tokio::test]
    async fn test_library_playlists_skip_non_playlist_entries() {
        let server = MockServer::start().await;
        Mock::given(path("/me/library/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"collection": [
                {"type": "playlist-like", "playlist": {"id": 10}},
                {"type": "system-playlist-like", "system_playlist": {"id": "soundcloud:system-playlists:x"}},
                {"type": "playlist", "playlist": {"id": 11}}
            ]})))
            .mount(&server)
            .await;
        for id in [10, 11] {
            Mock::given(path(format!("/playlists/{}", id)))
                .and(query_param("representation", "full"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id, "title": format!("Playlist {}", id)
                })))
                .expect(1)
                .mount(&server)
                .await;
        }
        let provider = provider(&server).await;

        let playlists: Vec<Playlist> = provider.get_library_playlists().try_collect().await.unwrap();
        let ids: Vec<_> = playlists.iter().map(|p| p.item_id.as_str()).collect();
        assert_eq!(ids, vec!["10", "11"]);
    }

    #[tokio::test]
    async fn test_library_tracks_fetch_each_like() {
        let server = MockServer::start().await;
        Mock::given(path("/users/100/track_likes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"collection": [
                {"track": {"id": 21}},
                {"kind": "like"},
                {"track": {"id": 22}}
            ]})))
            .mount(&server)
            .await;
        mount_track(&server, 21, "First").await;
        mount_track(&server, 22, "Second").await;
        Mock::given(path("/users/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let provider = provider(&server).await;

        let tracks: Vec<Track> = provider.get_library_tracks().try_collect().await.unwrap();
        let names: Vec<_> = tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(tracks[0].artists[0].name, "embedded");
        assert_eq!(tracks[0].duration, 180);
    }

    #[tokio::test]
    async fn test_playlist_tracks_positions() {
        let server = MockServer::start().await;
        Mock::given(path("/playlists/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5,
                "tracks": [{"id": 31}, {"policy": "BLOCK"}, {"id": 33}]
            })))
            .mount(&server)
            .await;
        mount_track(&server, 31, "One").await;
        mount_track(&server, 33, "Three").await;
        mount_uploader(&server).await;
        let provider = provider(&server).await;

        let tracks: Vec<Track> = provider.get_playlist_tracks("5").try_collect().await.unwrap();
        let positions: Vec<_> = tracks.iter().map(|t| t.playlist_position()).collect();
        assert_eq!(positions, vec![Some(1), Some(3)]);
    }

    #[tokio::test]
    async fn test_get_track_unknown_is_none() {
        let server = MockServer::start().await;
        Mock::given(path("/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(path("/users/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let provider = provider(&server).await;

        assert!(provider.get_track("404").await.unwrap().is_none());
        assert!(provider.get_artist("9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toptracks_fetch_full_records() {
        let server = MockServer::start().await;
        Mock::given(path("/users/7/toptracks"))
            .and(query_param("limit", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"collection": [
                {"id": 41}, {"id": 42}
            ]})))
            .mount(&server)
            .await;
        mount_track(&server, 41, "Hit").await;
        mount_track(&server, 42, "Other Hit").await;
        mount_uploader(&server).await;
        let provider = provider(&server).await;

        let tracks = provider.get_artist_toptracks("7").await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.position == TrackPosition::Bare));
    }

    #[tokio::test]
    async fn test_stream_details_are_direct() {
        let server = MockServer::start().await;
        Mock::given(path("/tracks"))
            .and(query_param("ids", "51"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 51,
                "duration": 200_000,
                "track_authorization": "ta",
                "media": {"transcodings": [
                    {"url": format!("{}/media/51/stream/hls", server.uri()),
                     "format": {"protocol": "hls", "mime_type": "audio/ogg; codecs=\"opus\""}},
                    {"url": format!("{}/media/51/stream/progressive", server.uri()),
                     "format": {"protocol": "progressive", "mime_type": "audio/mpeg"}}
                ]}
            }])))
            .mount(&server)
            .await;
        Mock::given(path("/media/51/stream/progressive"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn/51.mp3"})),
            )
            .mount(&server)
            .await;
        let provider = provider(&server).await;

        let mut details = tokio_test::assert_ok!(provider.get_stream_details("51").await);
        assert_eq!(details.direct.as_deref(), Some("https://cdn/51.mp3"));
        assert_eq!(details.audio_format.content_type, ContentType::Mp3);
        assert_eq!(details.duration, Some(200));
        assert_eq!(details.provider, "soundcloud--test1234");

        let audio = provider.get_audio_stream(&mut details, 0).await;
        assert!(matches!(audio, Err(ProviderError::NotImplemented(_))));
    }
}
