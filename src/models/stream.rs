//! Playback descriptors.

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::common::AudioFormat;
use crate::error::Result;

/// Callback invoked by the host once playback of a stream has ended.
pub type StreamCallback = Arc<dyn Fn(StreamDetails) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Ephemeral description of how to play one item.
///
/// Created per playback request and discarded after the stream ends.
#[derive(Clone)]
pub struct StreamDetails {
    /// Provider instance id that produced the stream.
    pub provider: String,
    pub item_id: String,
    pub audio_format: AudioFormat,
    /// Duration in seconds, if known.
    pub duration: Option<u64>,
    /// Size in bytes, if known.
    pub size: Option<u64>,
    /// Unix timestamp after which the resolved URL is no longer valid.
    pub expires: Option<i64>,
    /// Opaque provider data.
    pub data: Map<String, Value>,
    /// URL the host can fetch itself, when no provider-side decoding is needed.
    pub direct: Option<String>,
    /// Filled in by the host when playback stops.
    pub seconds_streamed: Option<f64>,
    pub callback: Option<StreamCallback>,
}

impl StreamDetails {
    pub fn new<S1: Into<String>, S2: Into<String>>(provider: S1, item_id: S2) -> Self {
        Self {
            provider: provider.into(),
            item_id: item_id.into(),
            audio_format: AudioFormat::default(),
            duration: None,
            size: None,
            expires: None,
            data: Map::new(),
            direct: None,
            seconds_streamed: None,
            callback: None,
        }
    }

    /// String value from the provider data blob.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Run the post-playback callback, if any.
    pub async fn finish(&self) -> Result<()> {
        match &self.callback {
            Some(callback) => callback(self.clone()).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StreamDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDetails")
            .field("provider", &self.provider)
            .field("item_id", &self.item_id)
            .field("audio_format", &self.audio_format)
            .field("duration", &self.duration)
            .field("size", &self.size)
            .field("expires", &self.expires)
            .field("data", &self.data)
            .field("direct", &self.direct)
            .field("seconds_streamed", &self.seconds_streamed)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
