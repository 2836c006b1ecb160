//! Song lookup and search behind a request/response trait.

use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

static SONG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/songs");

/// Ids of bundled songs start with this; they have no streaming page
pub const BUNDLED_ID_PREFIX: &str = "pd-";
/// At most this many search results, like the upstream search endpoint
pub const SEARCH_LIMIT: usize = 5;
/// Previews are short clips; anything bigger is refused
const MAX_PREVIEW_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("search query is empty")]
    EmptyQuery,
    #[error("song {0} not found")]
    NotFound(String),
    #[error("song {0} has no lyrics")]
    NoLyrics(String),
    #[error("request failed: {0}")]
    Http(String),
    #[error("catalog service error: {0}")]
    Remote(String),
    #[error("preview is larger than {0} bytes")]
    TooLarge(u64),
    #[error("malformed catalog data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not read catalog: {0}")]
    Io(#[from] io::Error),
}

/// A song as returned by lookup and search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(alias = "spotify_id")]
    pub spotify_id: String,
    pub title: String,
    pub artist: String,
    /// Raw newline-delimited lyrics; search results may leave this out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(default, alias = "preview_url", skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl Track {
    pub fn has_lyrics(&self) -> bool {
        self.lyrics.as_deref().is_some_and(|l| !l.trim().is_empty())
    }
}

pub trait SongCatalog: Send + Sync {
    fn lookup(&self, spotify_id: &str) -> Result<Vec<Track>, CatalogError>;
    fn search(&self, query: &str) -> Result<Vec<Track>, CatalogError>;
    fn fetch_preview(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        fetch_bytes(url)
    }
}

/// Case-insensitive substring match on title or artist
pub fn search_tracks(tracks: &[Track], query: &str) -> Result<Vec<Track>, CatalogError> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(CatalogError::EmptyQuery);
    }
    Ok(tracks
        .iter()
        .filter(|t| t.title.to_lowercase().contains(&needle) || t.artist.to_lowercase().contains(&needle))
        .take(SEARCH_LIMIT)
        .cloned()
        .collect())
}

fn lookup_track(tracks: &[Track], spotify_id: &str) -> Vec<Track> {
    tracks
        .iter()
        .filter(|t| t.spotify_id == spotify_id)
        .cloned()
        .collect()
}

/// Public-domain songs compiled into the binary
#[derive(Debug, Clone)]
pub struct BundledCatalog {
    tracks: Vec<Track>,
}

impl BundledCatalog {
    pub fn new() -> Result<Self, CatalogError> {
        let mut tracks = SONG_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
            .map(|f| serde_json::from_slice::<Track>(f.contents()))
            .collect::<Result<Vec<_>, _>>()?;
        tracks.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(Self { tracks })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn random(&self) -> Option<&Track> {
        self.tracks.choose(&mut rand::thread_rng())
    }
}

impl SongCatalog for BundledCatalog {
    fn lookup(&self, spotify_id: &str) -> Result<Vec<Track>, CatalogError> {
        Ok(lookup_track(&self.tracks, spotify_id))
    }

    fn search(&self, query: &str) -> Result<Vec<Track>, CatalogError> {
        search_tracks(&self.tracks, query)
    }
}

/// Tracks read from a JSON array on disk
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
    tracks: Vec<Track>,
}

impl FileCatalog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path.as_ref())?;
        let tracks = serde_json::from_slice(&bytes)?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            tracks,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SongCatalog for FileCatalog {
    fn lookup(&self, spotify_id: &str) -> Result<Vec<Track>, CatalogError> {
        Ok(lookup_track(&self.tracks, spotify_id))
    }

    fn search(&self, query: &str) -> Result<Vec<Track>, CatalogError> {
        search_tracks(&self.tracks, query)
    }
}

/// Remote catalog speaking the search/lookup function contract:
/// `POST {base}/search-songs {"query"}` and `POST {base}/lookup-song {"spotifyId"}`,
/// each answering a JSON array of tracks or `{"error": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .user_agent(concat!("lyrictype/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn call(&self, function: &str, body: serde_json::Value) -> Result<Vec<Track>, CatalogError> {
        let url = format!("{}/{}", self.base_url, function);
        tracing::debug!(%url, "catalog request");
        let response = self.agent.post(&url).send_json(body).map_err(|err| match err {
            ureq::Error::Status(code, resp) => {
                status_error(&url, code, &resp.into_string().unwrap_or_default())
            }
            other => CatalogError::Http(other.to_string()),
        })?;
        let text = response.into_string()?;
        parse_tracks(&text)
    }
}

impl SongCatalog for HttpCatalog {
    fn lookup(&self, spotify_id: &str) -> Result<Vec<Track>, CatalogError> {
        self.call("lookup-song", serde_json::json!({ "spotifyId": spotify_id }))
    }

    fn search(&self, query: &str) -> Result<Vec<Track>, CatalogError> {
        if query.trim().is_empty() {
            return Err(CatalogError::EmptyQuery);
        }
        self.call("search-songs", serde_json::json!({ "query": query.trim() }))
    }

    fn fetch_preview(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        if is_http_url(url) {
            read_http(&self.agent, url)
        } else {
            fetch_bytes(url)
        }
    }
}

/// Error for a non-2xx answer: the service's own `{"error"}` message when it sent one.
fn status_error(url: &str, code: u16, body: &str) -> CatalogError {
    match parse_tracks(body) {
        Err(CatalogError::Remote(message)) => CatalogError::Remote(message),
        _ => CatalogError::Http(format!("{url} returned {code}")),
    }
}

/// Decode a catalog response: a track array, or an object carrying `error`.
pub fn parse_tracks(body: &str) -> Result<Vec<Track>, CatalogError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Some(message) = value.get("error") {
        let message = message.as_str().map(str::to_string).unwrap_or_else(|| message.to_string());
        return Err(CatalogError::Remote(message));
    }
    Ok(serde_json::from_value(value)?)
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Load preview bytes from an http(s) URL, a `file://` URL or a plain path.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>, CatalogError> {
    if is_http_url(url) {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .build();
        return read_http(&agent, url);
    }
    let path = url.strip_prefix("file://").unwrap_or(url);
    Ok(std::fs::read(path)?)
}

fn read_http(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, CatalogError> {
    let response = agent
        .get(url)
        .call()
        .map_err(|err| CatalogError::Http(err.to_string()))?;
    read_capped(response.into_reader(), MAX_PREVIEW_BYTES)
}

/// Read everything from `reader`, failing rather than truncating past `limit` bytes.
fn read_capped(reader: impl Read, limit: u64) -> Result<Vec<u8>, CatalogError> {
    let mut bytes = Vec::new();
    reader.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(CatalogError::TooLarge(limit));
    }
    Ok(bytes)
}
