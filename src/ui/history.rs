use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use learnclock::report::summarize;

use crate::{
    ui::charting::{compute_chart_bounds, day_label, format_label, short_label},
    App,
};

const SERIES_COLORS: [Color; 6] = [
    Color::Magenta,
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Red,
];

const BAR_WIDTH: u16 = 8;

pub fn render_history(app: &App, f: &mut Frame) {
    let area = f.area();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Percentage(45), // bars
            Constraint::Min(6),         // lines
            Constraint::Length(1),      // summary
            Constraint::Length(1),      // legend
        ])
        .split(area);

    let ledger = app.tracker.history();

    // newest entries that fit, oldest on the left
    let max_bars = (chunks[0].width.saturating_sub(2) / (BAR_WIDTH + 1)).max(1) as usize;
    let entries: Vec<(&str, f64)> = ledger.iter().collect();
    let visible = &entries[entries.len().saturating_sub(max_bars)..];
    let bars: Vec<Bar> = visible
        .iter()
        .map(|&(label, secs)| {
            Bar::default()
                .value((secs / 60.0).round() as u64)
                .text_value(format!("{:.1}h", secs / 3600.0))
                .label(Line::from(short_label(label)))
        })
        .collect();

    let bar_chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Learning Hours History"),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(BAR_WIDTH)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Magenta))
        .value_style(Style::default().fg(Color::Black).bg(Color::Magenta));
    f.render_widget(bar_chart, chunks[0]);

    // session ledger first, then one line per countdown
    let mut names = vec!["Global".to_string()];
    let mut series: Vec<Vec<(f64, f64)>> = vec![ledger.series()];
    for countdown in app.tracker.countdowns() {
        names.push(format!("Countdown: {}", countdown.name()));
        series.push(countdown.history().series());
    }

    let (x_bounds, y_bounds) = compute_chart_bounds(&series);
    let datasets: Vec<Dataset> = series
        .iter()
        .zip(&names)
        .enumerate()
        .filter(|(_, (points, _))| !points.is_empty())
        .map(|(i, (points, name))| {
            Dataset::default()
                .name(name.as_str())
                .marker(Marker::Braille)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .graph_type(GraphType::Line)
                .data(points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("History Overview"))
        .x_axis(
            Axis::default()
                .title("date")
                .bounds(x_bounds)
                .labels(vec![
                    Span::styled(day_label(x_bounds[0]), bold_style),
                    Span::styled(day_label(x_bounds[1]), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("hours")
                .bounds(y_bounds)
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(format_label(y_bounds[1]), bold_style),
                ]),
        );
    f.render_widget(chart, chunks[1]);

    let summary = summarize(ledger);
    let summary_text = match (summary.mean_hours, summary.std_dev_hours) {
        (Some(mean), Some(sd)) => format!(
            "{} days   {:.2} h total   {:.2} h mean   {:.2} sd",
            summary.days, summary.total_hours, mean, sd
        ),
        _ => "No finished days yet".to_string(),
    };
    f.render_widget(
        Paragraph::new(Span::styled(summary_text, bold_style)).alignment(Alignment::Center),
        chunks[2],
    );

    f.render_widget(
        Paragraph::new(Span::styled(
            "(h)/(esc) back",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        chunks[3],
    );
}
