//! Background catalog requests, delivered back to the event loop with a ticket
//! so results for a screen that has moved on can be dropped.

use std::cell::Cell;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use crate::catalog::{CatalogError, SongCatalog, Track};
use crate::playback::PreviewClip;
use crate::runtime::AppEvent;

/// Identifies one outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug)]
pub enum LoadEvent {
    Search {
        ticket: Ticket,
        result: Result<Vec<Track>, CatalogError>,
    },
    Song {
        ticket: Ticket,
        result: Result<LoadedSong, CatalogError>,
    },
}

impl LoadEvent {
    pub fn ticket(&self) -> Ticket {
        match self {
            LoadEvent::Search { ticket, .. } | LoadEvent::Song { ticket, .. } => *ticket,
        }
    }
}

/// A track ready to be typed, with its preview if one could be fetched
#[derive(Debug, Clone)]
pub struct LoadedSong {
    pub track: Track,
    pub preview: Option<PreviewClip>,
    /// Why the preview is missing when the track named one
    pub preview_error: Option<String>,
}

pub struct Loader {
    catalog: Arc<dyn SongCatalog>,
    tx: Sender<AppEvent>,
    next_ticket: Cell<u64>,
    fetch_previews: bool,
}

impl Loader {
    pub fn new(catalog: Arc<dyn SongCatalog>, tx: Sender<AppEvent>, fetch_previews: bool) -> Self {
        Self {
            catalog,
            tx,
            next_ticket: Cell::new(1),
            fetch_previews,
        }
    }

    fn issue(&self) -> Ticket {
        let id = self.next_ticket.get();
        self.next_ticket.set(id + 1);
        Ticket(id)
    }

    pub fn search(&self, query: &str) -> Ticket {
        let ticket = self.issue();
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        let query = query.to_string();
        thread::spawn(move || {
            let result = catalog.search(&query);
            // the receiver is gone once the app has quit
            let _ = tx.send(AppEvent::Loaded(LoadEvent::Search { ticket, result }));
        });
        tracing::debug!(?ticket, "search requested");
        ticket
    }

    pub fn load_song(&self, spotify_id: &str) -> Ticket {
        let ticket = self.issue();
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        let spotify_id = spotify_id.to_string();
        let fetch_previews = self.fetch_previews;
        thread::spawn(move || {
            let result = resolve_song(catalog.as_ref(), &spotify_id, fetch_previews);
            let _ = tx.send(AppEvent::Loaded(LoadEvent::Song { ticket, result }));
        });
        tracing::debug!(?ticket, "song load requested");
        ticket
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("next_ticket", &self.next_ticket.get())
            .field("fetch_previews", &self.fetch_previews)
            .finish()
    }
}

/// Look a song up, insist on lyrics, and fetch its preview when asked to.
pub fn resolve_song(
    catalog: &dyn SongCatalog,
    spotify_id: &str,
    fetch_previews: bool,
) -> Result<LoadedSong, CatalogError> {
    let track = catalog
        .lookup(spotify_id)?
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::NotFound(spotify_id.to_string()))?;

    if !track.has_lyrics() {
        return Err(CatalogError::NoLyrics(track.title));
    }

    let (preview, preview_error) = match track.preview_url.as_deref() {
        Some(url) if fetch_previews => match catalog.fetch_preview(url) {
            Ok(bytes) => (
                Some(PreviewClip {
                    url: url.to_string(),
                    bytes,
                }),
                None,
            ),
            Err(err) => {
                tracing::warn!(%url, "preview fetch failed: {err}");
                (None, Some(err.to_string()))
            }
        },
        _ => (None, None),
    };

    Ok(LoadedSong {
        track,
        preview,
        preview_error,
    })
}
