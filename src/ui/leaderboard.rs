use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

use crate::app::App;
use crate::store::LeaderboardEntry;
use crate::ui::{bold_style, dim_style, legend, notice_line, HORIZONTAL_MARGIN, VERTICAL_MARGIN};
use crate::util::truncate;

const USER_COLUMN_WIDTH: usize = 24;

/// Pure presenter for a single leaderboard row
pub fn present_row(entry: &LeaderboardEntry, is_current_user: bool) -> Row<'static> {
    let rank_color = match entry.rank {
        1 => Color::Yellow,
        2 => Color::White,
        3 => Color::Rgb(205, 127, 50),
        _ => Color::Gray,
    };
    let row = Row::new(vec![
        Cell::from(format!("#{}", entry.rank)).style(Style::default().fg(rank_color)),
        Cell::from(truncate(&entry.user_id, USER_COLUMN_WIDTH)),
        Cell::from(entry.average_wpm.to_string()),
        Cell::from(entry.songs_completed.to_string()),
    ]);
    if is_current_user {
        row.style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        row
    }
}

pub fn render_leaderboard(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3), // filter
            Constraint::Min(3),    // table
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    let board = &app.leaderboard;
    Paragraph::new(Line::from(vec![
        Span::styled(board.filter.clone(), bold_style()),
        Span::styled("_", dim_style()),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("filter players"),
    )
    .render(chunks[0], buf);

    if board.entries.is_empty() {
        let message = if board.filter.is_empty() {
            "no completed songs yet"
        } else {
            "no players match"
        };
        Paragraph::new(Span::styled(message, dim_style()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("leaderboard"))
            .render(chunks[1], buf);
    } else {
        let me = app.user();
        let rows = board
            .entries
            .iter()
            .skip(board.scroll_offset)
            .map(|entry| present_row(entry, me == Some(entry.user_id.as_str())))
            .collect::<Vec<_>>();

        let header = Row::new(vec!["Rank", "Player", "Avg WPM", "Songs"])
            .style(bold_style().add_modifier(Modifier::UNDERLINED));

        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(USER_COLUMN_WIDTH as u16 + 2),
                Constraint::Length(9),
                Constraint::Length(7),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("leaderboard"))
        .render(chunks[1], buf);
    }

    Paragraph::new(notice_line(app.notices.latest()))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new(legend(&[("type", "filter"), ("↑↓", "scroll"), ("esc", "back")]))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: usize, user: &str) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            user_id: user.to_string(),
            average_wpm: 55,
            songs_completed: 4,
        }
    }

    #[test]
    fn test_present_row_renders_columns() {
        let area = Rect::new(0, 0, 50, 3);
        let mut buf = Buffer::empty(area);
        Table::new(
            vec![present_row(&entry(2, "ada"), false)],
            [
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Length(9),
                Constraint::Length(7),
            ],
        )
        .render(area, &mut buf);

        let text = crate::ui::tests::buffer_text(&buf);
        assert!(text.contains("#2"));
        assert!(text.contains("ada"));
        assert!(text.contains("55"));
    }

    #[test]
    fn test_present_row_highlights_current_user() {
        let area = Rect::new(0, 0, 50, 1);
        let mut buf = Buffer::empty(area);
        Table::new(
            vec![present_row(&entry(5, "me"), true)],
            [Constraint::Length(6), Constraint::Length(10)],
        )
        .render(area, &mut buf);
        assert_eq!(buf[(7, 0)].fg, Color::Green);
    }
}
