//! Deezer gateway client (www.deezer.com/ajax/gw-light.php).
//!
//! The private gateway is needed for everything playback related: track
//! tokens, the media URL service and listen reporting. It is bootstrapped
//! from the OAuth access token, which yields a session cookie, the CSRF
//! `checkForm` token and the license token.

use chrono::Utc;
use reqwest::{cookie::Jar, Client};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{ProviderError, Result};
use crate::models::StreamDetails;

/// Gateway API private endpoint.
const GATEWAY_URL: &str = "https://www.deezer.com/ajax/gw-light.php";

/// Media URL endpoint.
const MEDIA_URL: &str = "https://media.deezer.com/v1/get_url";

/// Endpoint that hands out a `sid` session cookie for a bearer token.
const SESSION_URL: &str = "https://api.deezer.com/platform/generic/track/3135556";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Client version reported with listen events.
const LISTEN_DEVICE_VERSION: &str = "10020230525142740";

/// Endpoints used by the gateway client.
#[derive(Debug, Clone)]
pub struct GatewayUrls {
    pub gateway: String,
    pub media: String,
    pub session: String,
}

impl Default for GatewayUrls {
    fn default() -> Self {
        Self {
            gateway: GATEWAY_URL.to_string(),
            media: MEDIA_URL.to_string(),
            session: SESSION_URL.to_string(),
        }
    }
}

/// Song data from `song.getData`.
#[derive(Debug, Clone)]
pub struct SongData {
    pub id: String,
    pub track_token: Option<String>,
    /// Duration in seconds.
    pub duration: Option<u64>,
    /// Raw JSON data for additional fields.
    pub raw: Value,
}

impl SongData {
    fn from_results(results: Value) -> Result<Self> {
        let id = value_to_string(results.get("SNG_ID"))
            .ok_or_else(|| ProviderError::InvalidData("song data without SNG_ID".into()))?;
        Ok(Self {
            id,
            track_token: results
                .get("TRACK_TOKEN")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            duration: value_to_u64(results.get("DURATION")),
            raw: results,
        })
    }

    /// Size in bytes of the file in `format` (e.g. `MP3_320`).
    pub fn file_size(&self, format: &str) -> Option<u64> {
        value_to_u64(self.raw.get(format!("FILESIZE_{}", format).as_str())).filter(|s| *s > 0)
    }
}

/// Resolved media URL.
#[derive(Debug, Clone)]
pub struct TrackUrl {
    pub url: String,
    /// Format (e.g., "FLAC", "MP3_320").
    pub format: String,
    /// Unix timestamp after which the URL stops working.
    pub expires: Option<i64>,
}

/// Deezer numbers arrive as JSON numbers or as strings.
fn value_to_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Authenticated gateway session.
#[derive(Debug)]
pub struct GatewayClient {
    client: Client,
    urls: GatewayUrls,
    access_token: String,
    api_token: String,
    license_token: String,
    user_country: String,
    lossless: bool,
}

impl GatewayClient {
    /// Bootstrap a gateway session from an OAuth access token.
    ///
    /// # Errors
    ///
    /// Returns `LoginFailed` if Deezer does not recognise the token.
    pub async fn connect(access_token: &str) -> Result<Self> {
        Self::connect_with_urls(access_token, GatewayUrls::default()).await
    }

    pub async fn connect_with_urls(access_token: &str, urls: GatewayUrls) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::new(Jar::default()))
            .build()?;

        let mut gw = Self {
            client,
            urls,
            access_token: access_token.to_string(),
            api_token: "null".to_string(),
            license_token: String::new(),
            user_country: String::new(),
            lossless: false,
        };
        gw.set_session_cookie().await?;
        gw.refresh_user_data().await?;
        Ok(gw)
    }

    /// Session with fixed tokens, for tests that only exercise later calls.
    #[cfg(test)]
    pub(crate) fn from_parts(urls: GatewayUrls, user_country: &str, lossless: bool) -> Self {
        Self {
            client: Client::new(),
            urls,
            access_token: "token".to_string(),
            api_token: "check".to_string(),
            license_token: "license".to_string(),
            user_country: user_country.to_string(),
            lossless,
        }
    }

    pub fn user_country(&self) -> &str {
        &self.user_country
    }

    pub fn lossless(&self) -> bool {
        self.lossless
    }

    async fn set_session_cookie(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.urls.session)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        debug!("Session cookie request returned {}", response.status());
        Ok(())
    }

    /// Refresh the CSRF token, license token and account details.
    async fn refresh_user_data(&mut self) -> Result<()> {
        let user_data = self.call_api("deezer.getUserData", None).await?;

        let user = user_data.get("USER");
        let user_id = value_to_u64(user.and_then(|u| u.get("USER_ID"))).unwrap_or(0);
        if user_id == 0 {
            return Err(ProviderError::LoginFailed(
                "Deezer gateway rejected the access token".to_string(),
            ));
        }

        self.api_token = user_data
            .get("checkForm")
            .and_then(|t| t.as_str())
            .unwrap_or("null")
            .to_string();

        let options = user.and_then(|u| u.get("OPTIONS"));
        self.license_token = options
            .and_then(|o| o.get("license_token"))
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .to_string();
        self.lossless = options
            .and_then(|o| {
                o.get("web_lossless")
                    .or_else(|| o.get("web_sound_quality").and_then(|q| q.get("lossless")))
            })
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        self.user_country = user_data
            .get("COUNTRY")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        info!(
            "Gateway session ready. User ID: {}, country: {}, lossless: {}",
            user_id, self.user_country, self.lossless
        );
        Ok(())
    }

    /// Call a gateway method and return its `results`.
    pub async fn call_api(&self, method: &str, args: Option<Value>) -> Result<Value> {
        let params = [
            ("api_version", "1.0"),
            ("api_token", self.api_token.as_str()),
            ("input", "3"),
            ("method", method),
        ];

        // Deezer answers 411 without a body, so always send one.
        let body = args.unwrap_or_else(|| json!({}));

        let response = self
            .client
            .post(&self.urls.gateway)
            .query(&params)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let result: Value = serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(500).collect();
            error!("Failed to parse gateway response (status {}): {}", status, preview);
            ProviderError::Api(format!("Invalid gateway response (status {}): {}", status, e))
        })?;

        if let Some(error) = result.get("error").filter(|e| match e {
            Value::Object(map) => !map.is_empty(),
            Value::Array(list) => !list.is_empty(),
            _ => false,
        }) {
            error!("Gateway API error in {}: {}", method, error);
            return Err(ProviderError::Api(format!("{}: {}", method, error)));
        }

        Ok(result.get("results").cloned().unwrap_or(Value::Null))
    }

    pub async fn get_song_data(&self, track_id: &str) -> Result<SongData> {
        let results = self
            .call_api("song.getData", Some(json!({ "sng_id": track_id })))
            .await?;
        if results.is_null() {
            return Err(ProviderError::NotFound(format!("track {}", track_id)));
        }
        SongData::from_results(results)
    }

    /// Formats to request, best first.
    fn formats(&self) -> Vec<Value> {
        let mut names = Vec::with_capacity(3);
        if self.lossless {
            names.push("FLAC");
        }
        names.extend(["MP3_320", "MP3_128"]);
        names
            .into_iter()
            .map(|format| json!({ "cipher": "BF_CBC_STRIPE", "format": format }))
            .collect()
    }

    /// Resolve the encrypted media URL of a track.
    pub async fn get_track_url(&self, track_id: &str) -> Result<(TrackUrl, SongData)> {
        let song = self.get_song_data(track_id).await?;
        let track_token = song
            .track_token
            .clone()
            .ok_or_else(|| ProviderError::InvalidData(format!("track {} has no token", track_id)))?;

        let payload = json!({
            "license_token": self.license_token,
            "media": [{ "type": "FULL", "formats": self.formats() }],
            "track_tokens": [track_token],
        });
        let result: Value = self
            .client
            .post(&self.urls.media)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        let entry = result
            .get("data")
            .and_then(|d| d.get(0))
            .ok_or_else(|| ProviderError::Api("media service returned no data".to_string()))?;

        if let Some(first_error) = entry
            .get("errors")
            .and_then(|e| e.as_array())
            .and_then(|e| e.first())
        {
            let msg = first_error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(ProviderError::Api(msg.to_string()));
        }

        let media = entry
            .get("media")
            .and_then(|m| m.get(0))
            .ok_or_else(|| ProviderError::Api(format!("no media for track {}", track_id)))?;
        let url = media
            .get("sources")
            .and_then(|s| s.get(0))
            .and_then(|s| s.get("url"))
            .and_then(|u| u.as_str())
            .ok_or_else(|| ProviderError::InvalidData("media without source url".to_string()))?;
        let format = media
            .get("format")
            .and_then(|f| f.as_str())
            .unwrap_or("MP3_128");

        let track_url = TrackUrl {
            url: url.to_string(),
            format: format.to_string(),
            expires: media.get("exp").and_then(|e| e.as_i64()),
        };
        Ok((track_url, song))
    }

    /// Ids of tracks similar to `track_id`.
    pub async fn get_track_mix(&self, track_id: &str) -> Result<Vec<String>> {
        let results = self
            .call_api("song.getSearchTrackMix", Some(json!({ "SNG_ID": track_id })))
            .await?;
        let ids = results
            .get("data")
            .and_then(|d| d.as_array())
            .map(|tracks| {
                tracks
                    .iter()
                    .filter_map(|t| value_to_string(t.get("SNG_ID")))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    /// Report playback to Deezer.
    ///
    /// `next_track` announces a track that is about to play; `last_track` is
    /// a finished stream whose data blob holds `start_ts`, `stream_id` and
    /// `format`.
    pub async fn log_listen(
        &self,
        next_track: Option<&str>,
        last_track: Option<&StreamDetails>,
    ) -> Result<()> {
        let mut payload = json!({});

        if let Some(next) = next_track {
            payload["next_media"] = json!({ "media": { "id": next, "type": "song" } });
        }

        if let Some(last) = last_track {
            payload["params"] = listen_params(last, Utc::now().timestamp());
        }

        if payload.as_object().is_some_and(|p| p.is_empty()) {
            return Ok(());
        }
        self.call_api("log.listen", Some(payload)).await?;
        Ok(())
    }
}

/// `params` object of a `log.listen` call for a finished stream.
fn listen_params(last: &StreamDetails, now: i64) -> Value {
    let start_ts = last
        .data
        .get("start_ts")
        .and_then(|t| t.as_i64())
        .unwrap_or(now);
    let elapsed = (now - start_ts).max(0);
    let seconds_streamed = match last.seconds_streamed {
        Some(seconds) => (seconds as i64).min(elapsed),
        None => elapsed,
    };
    let format = last.data_str("format").unwrap_or("MP3_128");
    let stream_id = last.data_str("stream_id").unwrap_or_default();
    let seeked = last
        .data
        .get("seek_position")
        .and_then(|s| s.as_u64())
        .is_some_and(|s| s > 0);

    json!({
        "__type": "KEY_VALUE",
        "media": { "id": last.item_id, "type": "song", "format": format },
        "type": 1,
        "stat": { "seek": u8::from(seeked), "pause": 0, "sync": 0, "next": false },
        "lt": seconds_streamed,
        "ctxt": { "t": "search_page", "id": last.item_id },
        "dev": { "v": LISTEN_DEVICE_VERSION, "t": 0 },
        "ls": [],
        "ts_listen": start_ts,
        "is_shuffle": false,
        "stream_id": stream_id,
    })
}
