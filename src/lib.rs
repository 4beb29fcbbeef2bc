//! # musicbridge
//!
//! Deezer and SoundCloud provider adapters for a music aggregation host.
//!
//! The host owns the canonical media model and the provider contract
//! ([`Provider`], [`MusicProvider`]). Each adapter maps one vendor's catalog,
//! library and playback onto that contract.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use musicbridge::provider::{ProviderConfig, StandaloneHost};
//! use musicbridge::{DeezerProvider, MusicProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = Arc::new(StandaloneHost::new()?);
//!     let config = ProviderConfig::new("deezer--a1b2c3d4").with_value("access_token", "...");
//!     let deezer = DeezerProvider::setup(host, config).await?;
//!
//!     let results = deezer.search("daft punk", &[], 5).await?;
//!     for track in &results.tracks {
//!         println!("{} - {}", track.artists_string(", "), track.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Adapters
//!
//! - [`deezer`]: public REST API for catalog and library, private gateway
//!   for playback with on-the-fly stream decryption, OAuth setup flow.
//! - [`soundcloud`]: v2 API for catalog and library, direct stream URLs.

pub mod deezer;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod soundcloud;
pub mod util;

pub use deezer::DeezerProvider;
pub use error::{ProviderError, Result};
pub use provider::{MusicProvider, Provider};
pub use soundcloud::SoundcloudProvider;
