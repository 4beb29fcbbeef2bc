//! Deezer public REST API client (api.deezer.com).
//!
//! All calls are authenticated with the OAuth `access_token` query
//! parameter. Listings follow the `next` link of each page lazily.

use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use super::schema::{decode, decode_page, DeezerPlaylist, DeezerUser};
use crate::error::{ProviderError, Result};

/// Base URL for the Deezer public API.
pub const API_BASE_URL: &str = "https://api.deezer.com";

/// Deezer error code for "no data".
const ERROR_CODE_NOT_FOUND: u64 = 800;

/// Error type Deezer uses for invalid or expired tokens.
const ERROR_TYPE_OAUTH: &str = "OAuthException";

/// Query parameters of a request.
pub type Params = Vec<(String, String)>;

/// Build query parameters from string pairs.
pub fn params<const N: usize>(pairs: [(&str, &str); N]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Turn a Deezer error object into a typed error.
fn check_error(data: Value) -> Result<Value> {
    if !data.get("error").is_some_and(Value::is_object) {
        return Ok(data);
    }
    let error = &data["error"];

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    let code = error.get("code").and_then(|c| c.as_u64());
    let type_ = error.get("type").and_then(|t| t.as_str());

    if code == Some(ERROR_CODE_NOT_FOUND) {
        return Err(ProviderError::NotFound(message));
    }
    if type_ == Some(ERROR_TYPE_OAUTH) {
        return Err(ProviderError::LoginFailed(message));
    }
    error!("Deezer API error: {}", message);
    Err(ProviderError::Api(message))
}

/// Deezer public API client bound to one access token.
#[derive(Debug, Clone)]
pub struct DeezerApi {
    client: Client,
    base_url: String,
    access_token: String,
}

impl DeezerApi {
    pub fn new<S: Into<String>>(client: Client, access_token: S) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
            access_token: access_token.into(),
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

    async fn request(&self, method: Method, url: &str, params: &[(String, String)]) -> Result<Value> {
        debug!("{} {} with params: {:?}", method, url, params);

        let mut request = self.client.request(method, url).query(params);
        let has_token = Url::parse(url)
            .map(|u| u.query_pairs().any(|(k, _)| k == "access_token"))
            .unwrap_or(false);
        if !has_token {
            request = request.query(&[("access_token", self.access_token.as_str())]);
        }

        let data: Value = request.send().await?.json().await?;
        check_error(data)
    }

    /// GET an API path.
    pub async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        self.request(Method::GET, &self.endpoint(path), params).await
    }

    async fn post(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        self.request(Method::POST, &self.endpoint(path), params).await
    }

    async fn delete(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        self.request(Method::DELETE, &self.endpoint(path), params).await
    }

    /// Lazily walk all pages of a listing, yielding raw elements.
    pub fn paginate(&self, path: &str, params: Params) -> BoxStream<'_, Result<Value>> {
        let first = Some((self.endpoint(path), params));

        stream::try_unfold(first, move |next| async move {
            let Some((url, params)) = next else {
                return Ok(None);
            };
            let page = decode_page(self.request(Method::GET, &url, &params).await?)?;
            let next = page.next.map(|url| (url, Params::new()));
            Ok(Some((stream::iter(page.data.into_iter().map(Ok::<Value, ProviderError>)), next)))
        })
        .map(|page| match page {
            Ok(items) => items.boxed(),
            Err(e) => stream::once(futures_util::future::ready(Err(e))).boxed(),
        })
        .flatten()
        .boxed()
    }

    pub async fn get_user_me(&self) -> Result<DeezerUser> {
        decode("user", self.get("user/me", &[]).await?)
    }

    pub async fn get_artist(&self, id: &str) -> Result<Value> {
        self.get(&format!("artist/{}", id), &[]).await
    }

    pub async fn get_album(&self, id: &str) -> Result<Value> {
        self.get(&format!("album/{}", id), &[]).await
    }

    pub async fn get_track(&self, id: &str) -> Result<Value> {
        self.get(&format!("track/{}", id), &[]).await
    }

    pub async fn get_playlist(&self, id: &str) -> Result<Value> {
        self.get(&format!("playlist/{}", id), &[]).await
    }

    /// First `limit` results of a per-type search (`track`, `artist`, ...).
    pub async fn search(&self, kind: &str, query: &str, limit: usize) -> Result<Vec<Value>> {
        let limit_str = limit.to_string();
        let results = self.paginate(
            &format!("search/{}", kind),
            params([("q", query), ("limit", limit_str.as_str())]),
        );
        results.take(limit).collect::<Vec<_>>().await.into_iter().collect()
    }

    /// Add an item to the user's library; `kind` is the plural collection name.
    pub async fn library_add(&self, kind: &str, id: &str) -> Result<bool> {
        let key = format!("{}_id", kind.trim_end_matches('s'));
        let data = self
            .post(&format!("user/me/{}", kind), &params([(key.as_str(), id)]))
            .await?;
        Ok(data.as_bool().unwrap_or(false))
    }

    pub async fn library_remove(&self, kind: &str, id: &str) -> Result<bool> {
        let key = format!("{}_id", kind.trim_end_matches('s'));
        let data = self
            .delete(&format!("user/me/{}", kind), &params([(key.as_str(), id)]))
            .await?;
        Ok(data.as_bool().unwrap_or(false))
    }

    pub async fn add_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<bool> {
        let songs = track_ids.join(",");
        let data = self
            .post(
                &format!("playlist/{}/tracks", playlist_id),
                &params([("songs", songs.as_str())]),
            )
            .await?;
        Ok(data.as_bool().unwrap_or(false))
    }

    pub async fn remove_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<bool> {
        let songs = track_ids.join(",");
        let data = self
            .delete(
                &format!("playlist/{}/tracks", playlist_id),
                &params([("songs", songs.as_str())]),
            )
            .await?;
        Ok(data.as_bool().unwrap_or(false))
    }

    /// Create a playlist and return its full record.
    pub async fn create_playlist(&self, title: &str) -> Result<DeezerPlaylist> {
        let created = self
            .post("user/me/playlists", &params([("title", title)]))
            .await?;
        let id = created
            .get("id")
            .and_then(|id| id.as_i64())
            .ok_or_else(|| ProviderError::InvalidData("created playlist without id".into()))?;
        decode("playlist", self.get_playlist(&id.to_string()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> DeezerApi {
        DeezerApi::new(Client::new(), "token").with_base_url(server.uri())
    }

    #[test]
    fn test_check_error_codes() {
        let not_found = json!({"error": {"type": "DataException", "message": "no data", "code": 800}});
        assert!(matches!(check_error(not_found), Err(ProviderError::NotFound(_))));

        let expired = json!({"error": {"type": "OAuthException", "message": "Invalid OAuth access token.", "code": 300}});
        assert!(matches!(check_error(expired), Err(ProviderError::LoginFailed(_))));

        let quota = json!({"error": {"type": "Exception", "message": "Quota limit exceeded", "code": 4}});
        assert!(matches!(check_error(quota), Err(ProviderError::Api(_))));

        assert!(check_error(json!({"id": 1})).is_ok());
        assert!(check_error(json!(true)).is_ok());
    }

    #[tokio::test]
    async fn test_paginate_follows_next_links() {
        let server = MockServer::start().await;
        let next = format!("{}/user/me/artists?index=2&access_token=token", server.uri());

        Mock::given(method("GET"))
            .and(path("/user/me/artists"))
            .and(query_param("index", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 3}],
                "total": 3
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/me/artists"))
            .and(query_param("access_token", "token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 1}, {"id": 2}],
                "total": 3,
                "next": next
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let api = api(&server);
        let items: Vec<Value> = api
            .paginate("user/me/artists", Params::new())
            .map(|item| item.unwrap())
            .collect()
            .await;
        let ids: Vec<i64> = items.iter().filter_map(|v| v["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_search_truncates_to_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/track"))
            .and(query_param("q", "daft punk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 1}, {"id": 2}, {"id": 3}]
            })))
            .mount(&server)
            .await;

        let results = api(&server).search("track", "daft punk", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_library_add_uses_singular_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/me/albums"))
            .and(query_param("album_id", "302127"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        assert!(api(&server).library_add("albums", "302127").await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artist/0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"type": "DataException", "message": "no data", "code": 800}
            })))
            .mount(&server)
            .await;

        let result = api(&server).get_artist("0").await;
        assert!(matches!(result, Err(ProviderError::NotFound(_))));
    }
}
