use ratatui::{buffer::Buffer, layout::Rect};

use crate::app::{App, AppState};
use crate::ui::{game, leaderboard, progress, search};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

pub struct SearchScreen;

impl Screen for SearchScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        search::render_search(app, area, buf);
    }
}

/// Typing view while playing, results view once the session completed
pub struct GameScreen;

impl Screen for GameScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        game::render_game(app, area, buf);
    }
}

pub struct StatsScreen;

impl Screen for StatsScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        progress::render_progress(app, area, buf);
    }
}

pub struct LeaderboardScreen;

impl Screen for LeaderboardScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        leaderboard::render_leaderboard(app, area, buf);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Search => Box::new(SearchScreen),
        AppState::Game => Box::new(GameScreen),
        AppState::Stats => Box::new(StatsScreen),
        AppState::Leaderboard => Box::new(LeaderboardScreen),
    }
}
