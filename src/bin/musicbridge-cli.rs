use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use futures_util::stream::{BoxStream, StreamExt};
use musicbridge::deezer::{self, DeezerOAuth, CONF_ACCESS_TOKEN, CONF_ACTION_AUTH};
use musicbridge::logging::{self, LogLevel};
use musicbridge::models::{MediaType, SearchResults};
use musicbridge::provider::{
    AuthenticationHelper, ConfigValue, ConfigValues, ProviderConfig, StandaloneHost,
};
use musicbridge::soundcloud::{self, CONF_AUTHORIZATION, CONF_CLIENT_ID};
use musicbridge::{DeezerProvider, MusicProvider, Provider, SoundcloudProvider};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "musicbridge")]
#[command(about = "CLI for the Deezer and SoundCloud providers", long_about = None)]
struct Cli {
    /// Log level (GLOBAL, ERROR, WARN, INFO, DEBUG, TRACE)
    #[arg(long, default_value = "INFO")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to Deezer
    Deezer {
        /// OAuth access token (can also be set via DEEZER_ACCESS_TOKEN env var)
        #[arg(long, env = "DEEZER_ACCESS_TOKEN")]
        access_token: Option<String>,

        #[command(subcommand)]
        command: DeezerCommand,
    },
    /// Talk to SoundCloud
    Soundcloud {
        #[arg(long, env = "SOUNDCLOUD_CLIENT_ID")]
        client_id: String,

        /// Value of the Authorization header, e.g. "OAuth 2-..."
        #[arg(long, env = "SOUNDCLOUD_AUTHORIZATION")]
        authorization: String,

        #[command(subcommand)]
        command: SoundcloudCommand,
    },
}

#[derive(Subcommand)]
enum DeezerCommand {
    /// Obtain an access token through the OAuth flow
    Auth {
        #[arg(long, env = "DEEZER_APP_ID")]
        app_id: String,

        #[arg(long, env = "DEEZER_APP_SECRET")]
        app_secret: String,
    },
    /// Search the catalog
    Search {
        query: String,

        /// Restrict to one media type
        #[arg(short, long, value_enum)]
        r#type: Option<SearchType>,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// List the user's library
    Library {
        #[arg(value_enum)]
        kind: LibraryKind,
    },
    /// Decrypt a track into a file
    Stream {
        track_id: String,

        #[arg(short, long)]
        output: PathBuf,

        /// Start position in seconds
        #[arg(long, default_value_t = 0)]
        seek: u64,
    },
}

#[derive(Subcommand)]
enum SoundcloudCommand {
    /// Search the catalog
    Search {
        query: String,

        #[arg(short, long, value_enum)]
        r#type: Option<SearchType>,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// List the user's library
    Library {
        #[arg(value_enum)]
        kind: LibraryKind,
    },
    /// Print the direct stream URL of a track
    Stream { track_id: String },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SearchType {
    Artist,
    Album,
    Track,
    Playlist,
}

impl From<SearchType> for MediaType {
    fn from(t: SearchType) -> Self {
        match t {
            SearchType::Artist => MediaType::Artist,
            SearchType::Album => MediaType::Album,
            SearchType::Track => MediaType::Track,
            SearchType::Playlist => MediaType::Playlist,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LibraryKind {
    Artists,
    Albums,
    Tracks,
    Playlists,
}

/// Authorization by hand: the user opens the URL and pastes the code back.
struct ConsoleAuth;

#[async_trait]
impl AuthenticationHelper for ConsoleAuth {
    fn callback_url(&self) -> &str {
        "http://localhost/callback"
    }

    async fn authenticate(&self, auth_url: &str) -> musicbridge::Result<HashMap<String, String>> {
        println!("Open this URL and authorize the app:\n{}", auth_url);
        println!("Then paste the `code` value from the redirect:");

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(HashMap::from([("code".to_string(), line.trim().to_string())]))
    }
}

fn print_results(results: &SearchResults) {
    for artist in &results.artists {
        println!("artist   {} (ID: {})", artist.name, artist.item_id);
    }
    for album in &results.albums {
        println!("album    {} - {} (ID: {})", album.artists_string(", "), album.name, album.item_id);
    }
    for track in &results.tracks {
        println!("track    {} - {} (ID: {})", track.artists_string(", "), track.name, track.item_id);
    }
    for playlist in &results.playlists {
        println!("playlist {} (ID: {})", playlist.name, playlist.item_id);
    }
}

async fn print_listing<T, F>(
    mut items: BoxStream<'_, musicbridge::Result<T>>,
    describe: F,
) -> musicbridge::Result<()>
where
    F: Fn(&T) -> String,
{
    let mut count = 0;
    while let Some(item) = items.next().await {
        count += 1;
        println!("{}. {}", count, describe(&item?));
    }
    println!("{} items", count);
    Ok(())
}

async fn list_library<P: MusicProvider>(provider: &P, kind: LibraryKind) -> musicbridge::Result<()> {
    match kind {
        LibraryKind::Artists => {
            print_listing(provider.get_library_artists(), |a| format!("{} (ID: {})", a.name, a.item_id)).await
        }
        LibraryKind::Albums => {
            print_listing(provider.get_library_albums(), |a| {
                format!("{} - {} (ID: {})", a.artists_string(", "), a.name, a.item_id)
            })
            .await
        }
        LibraryKind::Tracks => {
            print_listing(provider.get_library_tracks(), |t| {
                format!("{} - {} (ID: {})", t.artists_string(", "), t.name, t.item_id)
            })
            .await
        }
        LibraryKind::Playlists => {
            print_listing(provider.get_library_playlists(), |p| format!("{} (ID: {})", p.name, p.item_id)).await
        }
    }
}

fn media_types(search_type: Option<SearchType>) -> Vec<MediaType> {
    search_type.map(MediaType::from).into_iter().collect()
}

async fn run_deezer(
    host: StandaloneHost,
    access_token: Option<String>,
    command: DeezerCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    if let DeezerCommand::Auth { app_id, app_secret } = &command {
        let host = host.with_auth_helper(Arc::new(ConsoleAuth));
        let oauth = DeezerOAuth::new(app_id.as_str(), app_secret.as_str());
        let mut values = ConfigValues::new();
        values.insert("session_id".to_string(), ConfigValue::from("cli"));
        deezer::get_config_entries(&host, &oauth, None, Some(CONF_ACTION_AUTH), &mut values).await?;
        if let Some(token) = values.get(CONF_ACCESS_TOKEN).and_then(ConfigValue::as_str) {
            println!("✅ Access token: {}", token);
        }
        return Ok(());
    }

    let access_token = access_token.ok_or("DEEZER_ACCESS_TOKEN is not set")?;
    let config = ProviderConfig::new("deezer--cli").with_value(CONF_ACCESS_TOKEN, access_token);
    let provider = DeezerProvider::setup(Arc::new(host), config).await?;
    println!("Logged in to {}", provider.name());

    match command {
        DeezerCommand::Auth { .. } => {}
        DeezerCommand::Search { query, r#type, limit } => {
            println!("Searching for '{}'...", query);
            print_results(&provider.search(&query, &media_types(r#type), limit).await?);
        }
        DeezerCommand::Library { kind } => list_library(&provider, kind).await?,
        DeezerCommand::Stream { track_id, output, seek } => {
            let mut details = provider.get_stream_details(&track_id).await?;
            println!(
                "Streaming {} as {:?} ({} bytes)",
                track_id,
                details.audio_format.content_type,
                details.size.unwrap_or_default()
            );

            let mut audio = provider.get_audio_stream(&mut details, seek).await?;
            let mut file = tokio::fs::File::create(&output).await?;
            let mut written = 0;
            while let Some(chunk) = audio.next().await {
                let chunk = chunk?;
                written += chunk.len();
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            details.seconds_streamed = details.duration.map(|d| d.saturating_sub(seek) as f64);
            details.finish().await?;
            println!("✅ Wrote {} bytes to {}", written, output.display());
        }
    }
    Ok(())
}

async fn run_soundcloud(
    host: StandaloneHost,
    client_id: String,
    authorization: String,
    command: SoundcloudCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ProviderConfig::new("soundcloud--cli")
        .with_value(CONF_CLIENT_ID, client_id)
        .with_value(CONF_AUTHORIZATION, authorization);
    let provider = SoundcloudProvider::setup(Arc::new(host), config).await?;
    println!("Logged in to {}", provider.name());

    match command {
        SoundcloudCommand::Search { query, r#type, limit } => {
            println!("Searching for '{}'...", query);
            print_results(&provider.search(&query, &media_types(r#type), limit).await?);
        }
        SoundcloudCommand::Library { kind } => list_library(&provider, kind).await?,
        SoundcloudCommand::Stream { track_id } => {
            let details = provider.get_stream_details(&track_id).await?;
            println!(
                "{:?}: {}",
                details.audio_format.content_type,
                details.direct.as_deref().unwrap_or("?")
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(LogLevel::parse(&cli.log_level));

    let host = StandaloneHost::new()?
        .with_instances(deezer::DOMAIN, 1)
        .with_instances(soundcloud::DOMAIN, 1);

    match cli.command {
        Commands::Deezer { access_token, command } => run_deezer(host, access_token, command).await,
        Commands::Soundcloud { client_id, authorization, command } => {
            run_soundcloud(host, client_id, authorization, command).await
        }
    }
}
