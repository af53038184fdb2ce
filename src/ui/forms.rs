use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::{FormField, GoalForm};

/// A `width` x `height` rect centered in `area`, clipped to it.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Line<'a> {
    let value_style = if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default()
    };
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(label, Style::default().add_modifier(Modifier::DIM)),
        Span::styled(value, value_style),
        Span::styled(cursor, value_style),
    ])
}

pub fn render_goal_form(form: &GoalForm, f: &mut Frame) {
    let area = centered_rect(50, 9, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Add Countdown Timer");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(inner);

    f.render_widget(
        Paragraph::new(field_line(
            "Timer Name: ",
            &form.name,
            form.focus == FormField::Name,
        )),
        rows[0],
    );
    f.render_widget(
        Paragraph::new(field_line(
            "Duration (hours): ",
            &form.hours,
            form.focus == FormField::Hours,
        )),
        rows[1],
    );

    if let Some(error) = &form.error {
        f.render_widget(
            Paragraph::new(Span::styled(
                error.as_str(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ))
            .wrap(Wrap { trim: true }),
            rows[3],
        );
    }

    f.render_widget(
        Paragraph::new(Span::styled(
            "(tab) switch field / (enter) create / (esc) cancel",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center),
        rows[4],
    );
}

pub fn render_confirm_delete(name: &str, f: &mut Frame) {
    let area = centered_rect(50, 5, f.area());
    f.render_widget(Clear, area);

    let text = vec![
        Line::from(format!("Are you sure you want to delete timer: {name}?")),
        Line::from(Span::styled(
            "(y)es / (n)o",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];
    let prompt = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Delete Timer")
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(prompt, area);
}
