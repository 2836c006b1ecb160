use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::ui::{bold_style, dim_style, legend, notice_line, HORIZONTAL_MARGIN, VERTICAL_MARGIN};
use crate::util::truncate;

pub fn render_search(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2), // title
            Constraint::Length(3), // query box
            Constraint::Min(1),    // results
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    let mut title = vec![Span::styled(
        "lyrictype",
        bold_style().fg(Color::Magenta),
    )];
    if let Some(user) = app.user() {
        title.push(Span::styled(format!("  playing as {user}"), dim_style()));
    }
    Paragraph::new(Line::from(title))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let query = Paragraph::new(Line::from(vec![
        Span::styled(app.search.query.clone(), bold_style()),
        Span::styled(
            "_",
            Style::default().add_modifier(Modifier::SLOW_BLINK | Modifier::DIM),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title("search songs"));
    query.render(chunks[1], buf);

    let results_width = chunks[2].width.saturating_sub(4) as usize;
    let lines: Vec<Line> = if app.search.is_searching() {
        vec![Line::from(Span::styled("searching...", dim_style()))]
    } else if app.search.results.is_empty() {
        vec![Line::from(Span::styled(
            "type a song title or artist and press enter",
            dim_style(),
        ))]
    } else {
        app.search
            .results
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let selected = i == app.search.selected;
                let marker = if selected { "> " } else { "  " };
                let label = format!("{} - {}", track.title, track.artist);
                let label = if label.width() > results_width {
                    truncate(&label, results_width)
                } else {
                    label
                };
                let style = if selected {
                    bold_style().fg(Color::Green)
                } else {
                    Style::default()
                };
                Line::from(vec![Span::raw(marker), Span::styled(label, style)])
            })
            .collect()
    };
    Paragraph::new(lines).render(chunks[2], buf);

    Paragraph::new(notice_line(app.notices.latest()))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(legend(&[
        ("enter", "search / open"),
        ("↑↓", "select"),
        ("tab", "stats"),
        ("ctrl-l", "leaderboard"),
        ("esc", "quit"),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);
}
