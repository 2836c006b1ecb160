use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
};
use webbrowser::Browser;

use crate::app::App;
use crate::feedback::{self, LineStatus, Mark};
use crate::game::Game;
use crate::reporter::ReportOutcome;
use crate::session::{Phase, Session};
use crate::ui::{
    bold_style, dim_style, format_clock, italic_style, legend, notice_line, HORIZONTAL_MARGIN,
    VERTICAL_MARGIN,
};

pub fn render_game(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(game) = app.game.as_ref() else {
        return;
    };
    let session = game.session();

    if session.is_completed() {
        render_results(app, game, area, buf);
    } else if session.phase() == Phase::Idle {
        render_loading(app, area, buf);
    } else {
        render_typing(app, game, area, buf);
    }
}

fn render_loading(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let loading = app.is_loading_song();
    let message = if loading {
        "loading song..."
    } else {
        "song unavailable"
    };
    let keys: &[(&str, &str)] = if loading {
        &[("esc", "back")]
    } else {
        &[("r", "retry"), ("esc", "back")]
    };

    Paragraph::new(Span::styled(
        message,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(notice_line(app.visible_notice()))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    Paragraph::new(legend(keys))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
}

fn render_typing(app: &App, game: &Game, area: Rect, buf: &mut Buffer) {
    let session = game.session();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // song
            Constraint::Length(1), // live stats
            Constraint::Length(1), // progress
            Constraint::Length(1), // padding
            Constraint::Min(1),    // lyrics
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    let song = session.song();
    Paragraph::new(Line::from(vec![
        Span::styled(song.title.clone(), bold_style()),
        Span::styled(format!("  by {}", song.artist), italic_style()),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    Paragraph::new(stats_line(session, game.playback().has_audio()))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let percent = session.progress_percent().clamp(0.0, 100.0);
    Gauge::default()
        .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Reset))
        .ratio(percent / 100.0)
        .label(format!("{:.0}%", percent))
        .render(chunks[2], buf);

    Paragraph::new(lyric_lines(session, chunks[4].height as usize))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    Paragraph::new(notice_line(app.visible_notice()))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

    let play_label = if session.phase() == Phase::Playing {
        "pause"
    } else {
        "play"
    };
    Paragraph::new(legend(&[
        ("tab", play_label),
        ("enter", "next line"),
        ("ctrl-r", "restart"),
        ("esc", "back"),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[6], buf);
}

fn stats_line(session: &Session, has_audio: bool) -> Line<'static> {
    let metrics = session.live_metrics();
    let mut text = format!(
        "{} wpm   {}% acc   {}",
        metrics.wpm,
        metrics.accuracy,
        format_clock(session.elapsed().as_secs())
    );
    if let Some(remaining) = session.time_remaining() {
        text.push_str(&format!("   {} left", format_clock(remaining as u64)));
    }

    let state = match session.phase() {
        Phase::Playing => Span::styled("  playing", bold_style().fg(Color::Green)),
        _ if session.is_paused() => Span::styled("  paused", bold_style().fg(Color::Yellow)),
        _ => Span::styled("  press tab to start", dim_style()),
    };
    let mut spans = vec![Span::styled(text, bold_style()), state];
    if !has_audio {
        spans.push(Span::styled("  (no audio)", dim_style()));
    }
    Line::from(spans)
}

/// The visible slice of lyrics with per-character marks on the active line
fn lyric_lines(session: &Session, height: usize) -> Vec<Line<'static>> {
    let lines = session.lines();
    let current = session.current_line();
    let completed_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::DIM);
    let pending_style = dim_style();

    feedback::visible_window(lines.len(), current, height)
        .map(|index| {
            let line = &lines[index];
            match feedback::line_status(index, current) {
                LineStatus::Completed => Line::from(Span::styled(line.clone(), completed_style)),
                LineStatus::Pending => Line::from(Span::styled(line.clone(), pending_style)),
                LineStatus::Active => active_line(line, session.typed()),
            }
        })
        .collect()
}

fn active_line(line: &str, typed: &str) -> Line<'static> {
    let green_bold_style = bold_style().fg(Color::Green);
    let red_bold_style = bold_style().fg(Color::Red);
    let untyped_style = bold_style().add_modifier(Modifier::DIM);
    let cursor_style = untyped_style.add_modifier(Modifier::UNDERLINED);

    let typed_count = typed.chars().count();
    let mut spans: Vec<Span> = feedback::mark_line(line, typed)
        .into_iter()
        .enumerate()
        .map(|(idx, cell)| {
            let text = match (cell.mark, cell.expected) {
                (Mark::Incorrect, ' ') => "·".to_string(),
                (_, c) => c.to_string(),
            };
            let style = match cell.mark {
                Mark::Correct => green_bold_style,
                Mark::Incorrect => red_bold_style,
                Mark::Untyped if idx == typed_count => cursor_style,
                Mark::Untyped => untyped_style,
            };
            Span::styled(text, style)
        })
        .collect();

    let overflow = feedback::overflow(line, typed);
    if overflow > 0 {
        spans.push(Span::styled(
            typed.chars().skip(typed_count - overflow).collect::<String>(),
            red_bold_style.add_modifier(Modifier::CROSSED_OUT),
        ));
    }
    Line::from(spans)
}

fn render_results(app: &App, game: &Game, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(1), // song
            Constraint::Length(1), // padding
            Constraint::Length(1), // stats
            Constraint::Length(1), // detail
            Constraint::Length(1), // save outcome
            Constraint::Min(0),
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    let session = game.session();
    let song = session.song();
    Paragraph::new(Line::from(vec![
        Span::styled(song.title.clone(), bold_style()),
        Span::styled(format!("  by {}", song.artist), italic_style()),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    if let Some(completion) = game.completion() {
        let report = &completion.report;
        Paragraph::new(Span::styled(
            format!("{} wpm   {}% acc", report.wpm, report.accuracy),
            bold_style().fg(Color::Magenta),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

        let lines_done = format!("{}/{} lines", session.current_line(), session.lines().len());
        Paragraph::new(Span::styled(
            format!(
                "{} chars typed   {} correct   {}   {}",
                report.typed_chars,
                report.correct_chars,
                lines_done,
                format_clock(report.elapsed.as_secs())
            ),
            dim_style(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

        let saved = match &completion.saved {
            ReportOutcome::Saved => Span::styled(
                "progress saved",
                Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
            ),
            ReportOutcome::SkippedAnonymous => {
                Span::styled("anonymous session, not saved", italic_style())
            }
            ReportOutcome::Failed(_) => Span::styled(
                "progress not saved",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ),
        };
        Paragraph::new(saved)
            .alignment(Alignment::Center)
            .render(chunks[5], buf);
    }

    Paragraph::new(notice_line(app.visible_notice()))
        .alignment(Alignment::Center)
        .render(chunks[7], buf);

    let keys: &[(&str, &str)] = if Browser::is_available() {
        &[("r", "retry"), ("n", "new song"), ("o", "open"), ("esc", "back")]
    } else {
        &[("r", "retry"), ("n", "new song"), ("esc", "back")]
    };
    Paragraph::new(legend(keys))
        .alignment(Alignment::Center)
        .render(chunks[8], buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_active_line_marks() {
        let line = active_line("hello", "hex");
        assert_eq!(symbols(&line), "hello");
        assert_eq!(line.spans[0].style.fg, Some(Color::Green));
        assert_eq!(line.spans[1].style.fg, Some(Color::Green));
        assert_eq!(line.spans[2].style.fg, Some(Color::Red));
        assert!(line.spans[3].style.add_modifier.contains(Modifier::UNDERLINED));
        assert!(!line.spans[4].style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_active_line_wrong_space_is_visible() {
        let line = active_line("a b", "axb");
        assert_eq!(symbols(&line), "a·b");
    }

    #[test]
    fn test_active_line_overflow_is_shown() {
        let line = active_line("hi", "hiya");
        assert_eq!(symbols(&line), "hiya");
        let extra = line.spans.last().unwrap();
        assert_eq!(extra.content, "ya");
        assert_eq!(extra.style.fg, Some(Color::Red));
    }
}
