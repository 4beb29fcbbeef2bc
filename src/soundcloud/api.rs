//! SoundCloud v2 API client (api-v2.soundcloud.com).
//!
//! Every request carries the `Authorization` header and the `client_id`
//! query parameter. Collections follow `next_href` lazily.

use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use super::schema::{decode, decode_collection, SoundcloudTrack, SoundcloudUser};
use crate::error::{ProviderError, Result};

/// Base URL for the SoundCloud v2 API.
pub const API_BASE_URL: &str = "https://api-v2.soundcloud.com";

/// Page size requested from collection endpoints.
const PAGE_SIZE: usize = 50;

type Params = Vec<(String, String)>;

fn check_status(status: StatusCode, url: &str) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::LoginFailed(
            format!("SoundCloud rejected the credentials ({})", status),
        )),
        StatusCode::NOT_FOUND => Err(ProviderError::NotFound(url.to_string())),
        _ => {
            error!("SoundCloud API error {} for {}", status, url);
            Err(ProviderError::Api(format!("HTTP {} for {}", status, url)))
        }
    }
}

/// Playable URL of a track and the mime type of the transcoding behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrl {
    pub url: String,
    pub mime_type: Option<String>,
}

/// SoundCloud client bound to one client id and authorization token.
#[derive(Debug, Clone)]
pub struct SoundcloudApi {
    client: Client,
    base_url: String,
    client_id: String,
    authorization: String,
}

impl SoundcloudApi {
    pub fn new<S1: Into<String>, S2: Into<String>>(client: Client, client_id: S1, authorization: S2) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
            client_id: client_id.into(),
            authorization: authorization.into(),
        }
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn request(&self, url: &str, params: &[(String, String)]) -> Result<Value> {
        debug!("GET {} with params: {:?}", url, params);

        let mut request = self
            .client
            .get(url)
            .header("Authorization", self.authorization.as_str())
            .query(params);
        let has_client_id = Url::parse(url)
            .map(|u| u.query_pairs().any(|(k, _)| k == "client_id"))
            .unwrap_or(false);
        if !has_client_id {
            request = request.query(&[("client_id", self.client_id.as_str())]);
        }

        let response = request.send().await?;
        check_status(response.status(), url)?;
        Ok(response.json().await?)
    }

    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        self.request(&self.endpoint(path), params).await
    }

    /// Lazily walk a collection, yielding raw elements.
    fn paginate(&self, path: &str, params: Params) -> BoxStream<'_, Result<Value>> {
        let first = Some((self.endpoint(path), params));

        stream::try_unfold(first, move |next| async move {
            let Some((url, params)) = next else {
                return Ok(None);
            };
            let page = decode_collection(self.request(&url, &params).await?)?;
            let next = page.next_href.map(|url| (url, Params::new()));
            Ok(Some((
                stream::iter(page.collection.into_iter().map(Ok::<Value, ProviderError>)),
                next,
            )))
        })
        .map(|page| match page {
            Ok(items) => items.boxed(),
            Err(e) => stream::once(futures_util::future::ready(Err(e))).boxed(),
        })
        .flatten()
        .boxed()
    }

    fn limit_params(limit: usize) -> Params {
        vec![("limit".to_string(), limit.to_string())]
    }

    pub async fn get_account_details(&self) -> Result<SoundcloudUser> {
        decode("user", self.get("me", &[]).await?)
    }

    /// Combined search over users, tracks and playlists.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        let params = vec![
            ("q".to_string(), query.to_string()),
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), "0".to_string()),
        ];
        let page = decode_collection(self.get("search", &params).await?)?;
        Ok(page.collection)
    }

    /// Users followed by `user_id`.
    pub fn get_following(&self, user_id: &str) -> BoxStream<'_, Result<Value>> {
        self.paginate(
            &format!("users/{}/followings", user_id),
            Self::limit_params(PAGE_SIZE),
        )
    }

    /// Library entries (liked and owned playlists, albums, stations).
    pub fn get_account_playlists(&self) -> BoxStream<'_, Result<Value>> {
        self.paginate("me/library/all", Self::limit_params(PAGE_SIZE))
    }

    pub async fn get_playlist_details(&self, playlist_id: &str) -> Result<Value> {
        let params = vec![("representation".to_string(), "full".to_string())];
        self.get(&format!("playlists/{}", playlist_id), &params).await
    }

    /// Track likes of `user_id`; each entry nests the track under `track`.
    pub fn get_tracks_liked(&self, user_id: &str) -> BoxStream<'_, Result<Value>> {
        self.paginate(
            &format!("users/{}/track_likes", user_id),
            Self::limit_params(PAGE_SIZE),
        )
    }

    /// Full track records for a comma-separated list of ids.
    pub async fn get_track_details(&self, track_ids: &str) -> Result<Vec<Value>> {
        let params = vec![("ids".to_string(), track_ids.to_string())];
        let data = self.get("tracks", &params).await?;
        match data {
            Value::Array(items) => Ok(items),
            other => Err(ProviderError::InvalidData(format!(
                "unexpected track details payload: {}",
                other
            ))),
        }
    }

    pub async fn get_user_details(&self, user_id: &str) -> Result<Value> {
        self.get(&format!("users/{}", user_id), &[]).await
    }

    pub async fn get_popular_tracks_user(&self, user_id: &str, limit: usize) -> Result<Vec<Value>> {
        let data = self
            .get(&format!("users/{}/toptracks", user_id), &Self::limit_params(limit))
            .await?;
        Ok(decode_collection(data)?.collection)
    }

    pub async fn get_recommended(&self, track_id: &str, limit: usize) -> Result<Vec<Value>> {
        let data = self
            .get(&format!("tracks/{}/related", track_id), &Self::limit_params(limit))
            .await?;
        Ok(decode_collection(data)?.collection)
    }

    /// Resolve a playable URL, preferring the progressive transcoding.
    pub async fn get_stream_url(&self, track: &SoundcloudTrack) -> Result<StreamUrl> {
        let transcodings = track.transcodings();
        let transcoding = transcodings
            .iter()
            .find(|t| t.is_progressive())
            .or_else(|| transcodings.first())
            .ok_or_else(|| ProviderError::NotFound("track has no transcodings".to_string()))?;
        let url = transcoding
            .url
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidData("transcoding without url".to_string()))?;

        let mut params = Params::new();
        if let Some(authorization) = &track.track_authorization {
            params.push(("track_authorization".to_string(), authorization.clone()));
        }
        let data = self.request(url, &params).await?;
        let url = data
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidData("stream response without url".to_string()))?;
        Ok(StreamUrl {
            url: url.to_string(),
            mime_type: transcoding.mime_type().map(str::to_string),
        })
    }
}
