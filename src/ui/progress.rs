use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget},
};

use crate::app::App;
use crate::store::UserStats;
use crate::ui::charting::{compute_chart_params, format_label, progress_points};
use crate::ui::{bold_style, dim_style, legend, notice_line, HORIZONTAL_MARGIN, VERTICAL_MARGIN};

pub fn render_progress(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2), // title
            Constraint::Length(1), // summary
            Constraint::Length(1), // padding
            Constraint::Min(3),    // chart
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    let title = match app.user() {
        Some(user) => format!("progress for {user}"),
        None => "progress".to_string(),
    };
    Paragraph::new(Span::styled(title, bold_style().fg(Color::Magenta)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    match &app.stats {
        Some(stats) => {
            Paragraph::new(summary_line(stats))
                .alignment(Alignment::Center)
                .render(chunks[1], buf);
            if stats.progress_data.is_empty() {
                Paragraph::new(Span::styled("no songs completed this week", dim_style()))
                    .alignment(Alignment::Center)
                    .render(chunks[3], buf);
            } else {
                render_chart(stats, chunks[3], buf);
            }
        }
        None => {
            Paragraph::new(Span::styled("no stats available", dim_style()))
                .alignment(Alignment::Center)
                .render(chunks[1], buf);
        }
    }

    Paragraph::new(notice_line(app.notices.latest()))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    Paragraph::new(legend(&[("esc", "back")]))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);
}

fn summary_line(stats: &UserStats) -> Line<'static> {
    Line::from(Span::styled(
        format!(
            "{} avg wpm   {:.1}% avg acc   {} songs completed",
            stats.average_wpm, stats.average_accuracy, stats.songs_completed
        ),
        bold_style(),
    ))
}

fn render_chart(stats: &UserStats, area: Rect, buf: &mut Buffer) {
    let (x_max, y_max) = compute_chart_params(&stats.progress_data);
    let points = progress_points(&stats.progress_data);

    let datasets = vec![Dataset::default()
        .marker(Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&points)];

    let x_labels = stats
        .progress_data
        .iter()
        .map(|day| Span::styled(day.date.clone(), bold_style()))
        .collect_vec();

    Chart::new(datasets)
        .x_axis(Axis::default().title("day").bounds([0.0, x_max]).labels(x_labels))
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, y_max])
                .labels(vec![
                    Span::styled("0", bold_style()),
                    Span::styled(format_label(y_max), bold_style()),
                ]),
        )
        .render(area, buf);
}
