pub mod charting;
pub mod game;
pub mod leaderboard;
pub mod progress;
pub mod screen;
pub mod search;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::app::App;
use crate::notice::{Notice, Severity};

pub(crate) const HORIZONTAL_MARGIN: u16 = 5;
pub(crate) const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(&self.state).render(self, area, buf);
    }
}

pub(crate) fn bold_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

pub(crate) fn dim_style() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

pub(crate) fn italic_style() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

/// One-line rendering of the most recent notice
pub(crate) fn notice_line(notice: Option<&Notice>) -> Line<'static> {
    let Some(notice) = notice else {
        return Line::default();
    };
    let color = match notice.severity {
        Severity::Info => Color::Cyan,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    };
    Line::from(Span::styled(
        notice.message.clone(),
        Style::default().fg(color).add_modifier(Modifier::ITALIC),
    ))
}

/// Key hints, e.g. `(tab) play   (esc) back`
pub(crate) fn legend(keys: &[(&str, &str)]) -> Line<'static> {
    let text = keys
        .iter()
        .map(|(key, action)| format!("({key}) {action}"))
        .join("   ");
    Line::from(Span::styled(text, italic_style()))
}

/// Seconds as `m:ss`
pub(crate) fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
