use std::rc::Rc;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::catalog::{Track, BUNDLED_ID_PREFIX};
use crate::game::Game;
use crate::loader::{LoadEvent, Loader, Ticket};
use crate::notice::{Notice, Notices};
use crate::playback::AudioBackend;
use crate::reporter::CompletionReporter;
use crate::runtime::AppEvent;
use crate::session::{Phase, SongMeta};
use crate::store::{LeaderboardEntry, ProgressStore, UserStats};

/// Rows shown on the leaderboard screen
pub const LEADERBOARD_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Search,
    Game,
    Stats,
    Leaderboard,
}

#[derive(Debug, Default)]
pub struct SearchState {
    pub query: String,
    /// Query the current results belong to
    pub searched: Option<String>,
    pub results: Vec<Track>,
    pub selected: usize,
    pub pending: Option<Ticket>,
}

impl SearchState {
    pub fn is_searching(&self) -> bool {
        self.pending.is_some()
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.results.get(self.selected)
    }
}

#[derive(Debug, Default)]
pub struct LeaderboardState {
    pub filter: String,
    pub entries: Vec<LeaderboardEntry>,
    pub scroll_offset: usize,
}

/// Builds the audio backend for each new game
pub type BackendFactory = Box<dyn Fn() -> Box<dyn AudioBackend>>;

pub struct App {
    pub state: AppState,
    pub search: SearchState,
    pub game: Option<Game>,
    /// Song the game screen was opened for
    pub song_id: Option<String>,
    /// Outstanding song load
    pub pending_song: Option<Ticket>,
    pub stats: Option<UserStats>,
    pub leaderboard: LeaderboardState,
    pub notices: Notices,
    countdown_secs: Option<u32>,
    loader: Loader,
    store: Rc<dyn ProgressStore>,
    reporter: Rc<CompletionReporter>,
    backend_factory: BackendFactory,
    should_quit: bool,
}

impl App {
    pub fn new(
        loader: Loader,
        store: Rc<dyn ProgressStore>,
        user: Option<String>,
        countdown_secs: Option<u32>,
        backend_factory: BackendFactory,
    ) -> Self {
        let reporter = Rc::new(CompletionReporter::new(user, Rc::clone(&store)));
        Self {
            state: AppState::Search,
            search: SearchState::default(),
            game: None,
            song_id: None,
            pending_song: None,
            stats: None,
            leaderboard: LeaderboardState::default(),
            notices: Notices::default(),
            countdown_secs,
            loader,
            store,
            reporter,
            backend_factory,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn user(&self) -> Option<&str> {
        self.reporter.user_id()
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Key(key) => self.on_key(key),
            AppEvent::Resize | AppEvent::Tick => {}
            AppEvent::Loaded(event) => self.on_loaded(event),
        }
    }

    /// Feed wall-clock time to the running game's countdown
    pub fn advance(&mut self, elapsed: Duration) {
        if let Some(game) = self.game.as_mut() {
            game.advance(elapsed);
        }
    }

    pub fn start_search(&mut self, query: &str) {
        self.search.query = query.to_string();
        if query.trim().is_empty() {
            return;
        }
        self.search.pending = Some(self.loader.search(query));
        self.search.searched = Some(query.to_string());
    }

    /// Open the game screen for a song; any previous game is torn down first.
    pub fn open_song(&mut self, spotify_id: &str) {
        self.game = Some(Game::new(
            self.countdown_secs,
            (self.backend_factory)(),
            Rc::clone(&self.reporter),
        ));
        self.pending_song = Some(self.loader.load_song(spotify_id));
        self.song_id = Some(spotify_id.to_string());
        self.state = AppState::Game;
    }

    /// Drop the game and its resources; a load still in flight becomes stale.
    pub fn leave_game(&mut self) {
        self.game = None;
        self.song_id = None;
        self.pending_song = None;
        self.state = AppState::Search;
    }

    pub fn is_loading_song(&self) -> bool {
        self.pending_song.is_some()
    }

    fn on_loaded(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Search { ticket, result } => {
                if self.search.pending != Some(ticket) {
                    tracing::debug!(?ticket, "dropping stale search result");
                    return;
                }
                self.search.pending = None;
                match result {
                    Ok(tracks) => {
                        if tracks.is_empty() {
                            self.notices.push(Notice::info("No songs found"));
                        }
                        self.search.results = tracks;
                        self.search.selected = 0;
                    }
                    Err(err) => {
                        tracing::warn!("search failed: {err}");
                        self.notices.push(Notice::error(format!("Search failed: {err}")));
                    }
                }
            }
            LoadEvent::Song { ticket, result } => {
                let is_current = self.pending_song == Some(ticket);
                let Some(game) = self.game.as_mut().filter(|_| is_current) else {
                    tracing::debug!(?ticket, "dropping stale song load");
                    return;
                };
                self.pending_song = None;
                match result {
                    Ok(song) => game.load(song),
                    Err(err) => game.load_failed(&err),
                }
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.state {
            AppState::Search => self.on_search_key(key),
            AppState::Game => self.on_game_key(key),
            AppState::Stats => self.on_stats_key(key),
            AppState::Leaderboard => self.on_leaderboard_key(key),
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.show_stats(),
            KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.show_leaderboard()
            }
            KeyCode::Up => {
                self.search.selected = self.search.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.search.selected + 1 < self.search.results.len() {
                    self.search.selected += 1;
                }
            }
            KeyCode::Enter => {
                let fresh = self.search.searched.as_deref() == Some(self.search.query.as_str());
                match self.search.selected_track() {
                    Some(track) if fresh => {
                        let id = track.spotify_id.clone();
                        self.open_song(&id);
                    }
                    _ => {
                        let query = self.search.query.clone();
                        self.start_search(&query);
                    }
                }
            }
            KeyCode::Backspace => {
                self.search.query.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search.query.push(c)
            }
            _ => {}
        }
    }

    fn on_game_key(&mut self, key: KeyEvent) {
        let Some(game) = self.game.as_mut() else {
            self.state = AppState::Search;
            return;
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if key.code == KeyCode::Esc {
            self.leave_game();
            return;
        }
        if ctrl && key.code == KeyCode::Char('r') {
            game.reset();
            return;
        }

        if game.session().is_completed() {
            match key.code {
                KeyCode::Char('r') => game.reset(),
                KeyCode::Char('n') => self.leave_game(),
                KeyCode::Char('o') => open_in_browser(&song_url(game.session().song())),
                _ => {}
            }
            return;
        }

        if game.session().phase() == Phase::Idle {
            // still loading, or the load failed and can be retried
            if self.pending_song.is_none() && key.code == KeyCode::Char('r') {
                if let Some(id) = self.song_id.clone() {
                    self.open_song(&id);
                }
            }
            return;
        }

        match key.code {
            KeyCode::Tab => {
                game.toggle_play();
            }
            KeyCode::Enter => {
                game.commit();
            }
            KeyCode::Backspace => {
                game.backspace();
            }
            KeyCode::Char(c) if !ctrl => {
                game.type_char(c);
            }
            _ => {}
        }
    }

    fn on_stats_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Tab) {
            self.state = AppState::Search;
        }
    }

    fn on_leaderboard_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.state = AppState::Search,
            KeyCode::Up => {
                self.leaderboard.scroll_offset = self.leaderboard.scroll_offset.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.leaderboard.scroll_offset + 1 < self.leaderboard.entries.len() {
                    self.leaderboard.scroll_offset += 1;
                }
            }
            KeyCode::Backspace => {
                self.leaderboard.filter.pop();
                self.refresh_leaderboard();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.leaderboard.filter.push(c);
                self.refresh_leaderboard();
            }
            _ => {}
        }
    }

    pub fn show_stats(&mut self) {
        self.state = AppState::Stats;
        self.stats = None;
        let Some(user) = self.user().map(str::to_string) else {
            self.notices
                .push(Notice::info("Set a user name (--user) to track your progress"));
            return;
        };
        match self.store.user_stats(&user, Local::now()) {
            Ok(stats) => self.stats = Some(stats),
            Err(err) => {
                tracing::warn!("loading stats failed: {err}");
                self.notices
                    .push(Notice::error(format!("Could not load stats: {err}")));
            }
        }
    }

    pub fn show_leaderboard(&mut self) {
        self.state = AppState::Leaderboard;
        self.refresh_leaderboard();
    }

    fn refresh_leaderboard(&mut self) {
        self.leaderboard.scroll_offset = 0;
        match self.store.leaderboard(&self.leaderboard.filter, LEADERBOARD_LIMIT) {
            Ok(entries) => self.leaderboard.entries = entries,
            Err(err) => {
                tracing::warn!("loading leaderboard failed: {err}");
                self.leaderboard.entries.clear();
                self.notices
                    .push(Notice::error(format!("Could not load leaderboard: {err}")));
            }
        }
    }

    /// Notices from the app and the current game, newest last
    pub fn visible_notice(&self) -> Option<&Notice> {
        let game_notice = self
            .game
            .as_ref()
            .filter(|_| self.state == AppState::Game)
            .and_then(|g| g.notices().latest());
        game_notice.or_else(|| self.notices.latest())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("state", &self.state)
            .field("search", &self.search)
            .field("game", &self.game)
            .field("song_id", &self.song_id)
            .field("pending_song", &self.pending_song)
            .finish_non_exhaustive()
    }
}

/// Streaming page for a song; bundled songs fall back to a search for title and artist
pub fn song_url(song: &SongMeta) -> String {
    if song.song_id.is_empty() || song.song_id.starts_with(BUNDLED_ID_PREFIX) {
        search_url(&song.title, &song.artist)
    } else {
        format!("https://open.spotify.com/track/{}", song.song_id)
    }
}

fn search_url(title: &str, artist: &str) -> String {
    let query = format!("{title} {artist}");
    let mut encoded = String::new();
    for byte in query.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    format!("https://open.spotify.com/search/{encoded}")
}

fn open_in_browser(url: &str) {
    if webbrowser::Browser::is_available() {
        if let Err(err) = webbrowser::open(url) {
            tracing::warn!(%url, "could not open browser: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BundledCatalog, SongCatalog};
    use crate::notice::Severity;
    use crate::playback::SilentBackend;
    use crate::store::ProgressDb;
    use std::sync::{mpsc, Arc};

    fn app(user: Option<&str>) -> (App, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        let catalog: Arc<dyn SongCatalog> = Arc::new(BundledCatalog::new().unwrap());
        let store: Rc<dyn ProgressStore> = Rc::new(ProgressDb::open_in_memory().unwrap());
        let app = App::new(
            Loader::new(catalog, tx, false),
            store,
            user.map(str::to_string),
            None,
            Box::new(|| Box::new(SilentBackend) as Box<dyn AudioBackend>),
        );
        (app, rx)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_event(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn track(id: &str) -> Track {
        Track {
            spotify_id: id.to_string(),
            title: id.to_uppercase(),
            artist: "A".to_string(),
            lyrics: None,
            preview_url: None,
        }
    }

    #[test]
    fn test_search_query_editing() {
        let (mut app, _rx) = app(None);
        for c in "gracx".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Char('e'));
        app.handle_event(AppEvent::Key(KeyEvent::new(
            KeyCode::Char('x'),
            KeyModifiers::CONTROL,
        )));
        assert_eq!(app.search.query, "grace");
        assert_eq!(app.state, AppState::Search);
        assert!(!app.search.is_searching());

        press(&mut app, KeyCode::Enter);
        assert!(app.search.is_searching());
        assert_eq!(app.search.searched.as_deref(), Some("grace"));
    }

    #[test]
    fn test_blank_query_is_not_searched() {
        let (mut app, _rx) = app(None);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Enter);
        assert!(!app.search.is_searching());
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let (mut app, _rx) = app(None);
        app.search.results = vec![track("a"), track("b")];
        press(&mut app, KeyCode::Up);
        assert_eq!(app.search.selected, 0);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.search.selected, 1);
        assert_eq!(app.search.selected_track().unwrap().spotify_id, "b");
    }

    #[test]
    fn test_enter_opens_selection_for_current_query() {
        let (mut app, _rx) = app(None);
        app.search.query = "x".to_string();
        app.search.searched = Some("x".to_string());
        app.search.results = vec![track("pd-daisy-bell")];

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Game);
        assert!(app.is_loading_song());
        assert_eq!(app.song_id.as_deref(), Some("pd-daisy-bell"));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Search);
        assert!(app.game.is_none());
        assert!(!app.is_loading_song());
    }

    #[test]
    fn test_anonymous_stats_show_notice() {
        let (mut app, _rx) = app(None);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.state, AppState::Stats);
        assert!(app.stats.is_none());
        assert_eq!(app.notices.latest().unwrap().severity, Severity::Info);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Search);
    }

    #[test]
    fn test_named_user_stats_start_empty() {
        let (mut app, _rx) = app(Some("ada"));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.stats, Some(UserStats::default()));
    }

    #[test]
    fn test_escape_quits_from_search() {
        let (mut app, _rx) = app(None);
        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit());
    }

    #[test]
    fn test_song_url() {
        let bundled = SongMeta {
            song_id: "pd-oh-susanna".to_string(),
            title: "Oh! Susanna".to_string(),
            artist: "Stephen Foster".to_string(),
            preview_url: None,
        };
        assert_eq!(
            song_url(&bundled),
            "https://open.spotify.com/search/Oh%21%20Susanna%20Stephen%20Foster"
        );

        let streamed = SongMeta {
            song_id: "4uLU6hMCjMI75M1A2tKUQC".to_string(),
            ..bundled
        };
        assert_eq!(
            song_url(&streamed),
            "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"
        );
    }

    #[test]
    fn test_ctrl_l_opens_leaderboard() {
        let (mut app, _rx) = app(None);
        app.handle_event(AppEvent::Key(KeyEvent::new(
            KeyCode::Char('l'),
            KeyModifiers::CONTROL,
        )));
        assert_eq!(app.state, AppState::Leaderboard);
        assert!(app.leaderboard.entries.is_empty());
        assert!(app.search.query.is_empty());
    }
}
