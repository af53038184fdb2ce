pub mod charting;
pub mod forms;
pub mod history;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Widget, Wrap},
    Frame,
};

use crate::{ui::charting::format_hms, App};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

pub fn ui(app: &App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let tracker = &self.tracker;
        let session = tracker.session();
        let now = tracker.now();

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // banner
                Constraint::Length(3), // clock
                Constraint::Length(1), // today
                Constraint::Min(3),    // laps
                Constraint::Min(4),    // countdowns
                Constraint::Length(2), // legend
            ])
            .split(area);

        if let Some(banner) = &self.banner {
            Paragraph::new(Span::styled(
                banner.text.as_str(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);
        }

        let clock_style = if session.is_running() {
            Style::default().fg(Color::Green).patch(bold_style)
        } else {
            dim_style.patch(bold_style)
        };
        let mode = if session.policy().is_test_mode() {
            " (test mode)"
        } else {
            ""
        };
        Paragraph::new(Span::styled(format_hms(session.elapsed_seconds()), clock_style))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Learning Hours Tracker{mode}")),
            )
            .render(chunks[1], buf);

        Paragraph::new(Line::from(vec![
            Span::styled("today ", dim_style),
            Span::styled(format_hms(session.today_seconds(now)), bold_style),
            Span::styled(format!("   {}", session.current_label()), dim_style),
        ]))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        let laps: Vec<ListItem> = session
            .laps()
            .iter()
            .enumerate()
            .map(|(i, lap)| ListItem::new(format!("Lap {:>2}  {}", i + 1, format_hms(*lap))))
            .collect();
        List::new(laps)
            .block(Block::default().borders(Borders::ALL).title("Laps"))
            .render(chunks[3], buf);

        let header = Row::new(vec![
            Cell::from("Timer"),
            Cell::from("Remaining"),
            Cell::from("Today"),
            Cell::from("Goal"),
            Cell::from("State"),
        ])
        .style(Style::default().fg(Color::Yellow).patch(bold_style));

        let rows: Vec<Row> = tracker
            .countdowns()
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let state = if c.is_running() { "running" } else { "paused" };
                let row = Row::new(vec![
                    Cell::from(c.name().to_string()),
                    Cell::from(format_hms(c.current_remaining(now))),
                    Cell::from(format_hms(c.daily_max_progress())),
                    Cell::from(format!("{:.2} h", c.goal_seconds() / 3600.0)),
                    Cell::from(state),
                ]);
                if i == self.selected {
                    row.style(Style::default().bg(Color::DarkGray))
                } else {
                    row
                }
            })
            .collect();

        if rows.is_empty() {
            Paragraph::new("No countdown timers yet. Press (a) to add one.")
                .style(dim_style)
                .block(Block::default().borders(Borders::ALL).title("Countdown Timers"))
                .render(chunks[4], buf);
        } else {
            Table::new(
                rows,
                [
                    Constraint::Min(12),
                    Constraint::Length(10),
                    Constraint::Length(10),
                    Constraint::Length(9),
                    Constraint::Length(8),
                ],
            )
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Countdown Timers"))
            .render(chunks[4], buf);
        }

        Paragraph::new(vec![
            Line::from("(s)tart (p)ause (l)ap (r)eset (h)istory (q)uit"),
            Line::from("(a)dd timer  ↑/↓ select  (enter) start/pause  (x) reset  (d)elete"),
        ])
        .style(italic_style)
        .wrap(Wrap { trim: true })
        .render(chunks[5], buf);
    }
}
