mod digits;

use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, Focus, Popup};
use crate::countdown::ticker::Scheduler;
use crate::countdown::Phase;
use crate::theme::Theme;

// Theme is fixed once at startup (config overrides applied in main)
static THEME: OnceLock<Theme> = OnceLock::new();

/// Install the theme. Only the first call has any effect.
pub fn init_theme(theme: Theme) {
    let _ = THEME.set(theme);
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn inactive() -> Color { theme().inactive }
fn header() -> Color { theme().header }
fn bg_selected() -> Color { theme().bg_selected }

/// Width and height of the timer panel, borders included
const PANEL_WIDTH: u16 = 52;
const PANEL_HEIGHT: u16 = 15;

/// Remaining seconds at which a running display turns to the danger color
const LOW_TIME_SECONDS: u64 = 10;

pub fn draw<S: Scheduler>(f: &mut Frame, app: &App<S>) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Min(PANEL_HEIGHT),
            Constraint::Length(1), // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    draw_panel(f, app, centered_fixed(PANEL_WIDTH, PANEL_HEIGHT, chunks[1]));
    draw_footer(f, app, chunks[2]);

    if app.popup == Popup::Help {
        draw_help_popup(f);
    }
}

fn draw_info_line<S: Scheduler>(f: &mut Frame, app: &App<S>, area: Rect) {
    // Priority: status message > phase hint
    let line = if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status.as_str(), Style::default().fg(warning())))
    } else {
        let hint = match app.countdown.phase() {
            Phase::Idle => "Enter a duration in seconds",
            Phase::Ready => "Ready",
            Phase::Running => "Running",
            Phase::Paused => "Paused",
            Phase::Finished => "Finished",
        };
        Line::from(Span::styled(hint, Style::default().fg(text_dim())))
    };

    let info = Paragraph::new(line).alignment(Alignment::Center);
    f.render_widget(info, area);
}

fn draw_panel<S: Scheduler>(f: &mut Frame, app: &App<S>, area: Rect) {
    let block = Block::default()
        .title(Span::styled(
            " COUNTDOWN TIMER ",
            Style::default().fg(header()).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Input + Set
            Constraint::Length(1),
            Constraint::Length(5), // Display
            Constraint::Length(1),
            Constraint::Length(3), // Start / Pause / Reset
        ])
        .split(inner);

    let input_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(9)])
        .split(rows[0]);

    draw_input(f, app, input_row[0]);
    draw_button(f, "Set", app.focus == Focus::Set, app.countdown.duration().is_some(), input_row[1]);

    draw_display(f, app, rows[2]);

    let buttons = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(rows[4]);

    let countdown = &app.countdown;
    draw_button(
        f,
        countdown.start_label(),
        app.focus == Focus::Start,
        countdown.time_left() > 0 && !countdown.is_active(),
        buttons[0],
    );
    draw_button(f, "Pause", app.focus == Focus::Pause, countdown.is_active(), buttons[1]);
    draw_button(f, "Reset", app.focus == Focus::Reset, true, buttons[2]);
}

fn draw_input<S: Scheduler>(f: &mut Frame, app: &App<S>, area: Rect) {
    let focused = app.focus == Focus::Input;
    let border_color = if focused { accent() } else { inactive() };

    let block = Block::default()
        .title(Span::styled(" Duration ", Style::default().fg(border_color)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let content = if app.input_buffer.is_empty() {
        Span::styled("Enter time duration in seconds", Style::default().fg(text_dim()))
    } else {
        Span::styled(
            app.input_buffer.as_str(),
            Style::default().fg(text()).add_modifier(Modifier::BOLD),
        )
    };

    f.render_widget(Paragraph::new(Line::from(content)).block(block), area);

    if focused && app.popup == Popup::None {
        let x = area.x + 1 + app.input_buffer.len() as u16;
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_button(f: &mut Frame, label: &str, focused: bool, enabled: bool, area: Rect) {
    let (border_color, label_style) = match (focused, enabled) {
        (true, _) => (
            accent(),
            Style::default().fg(accent()).bg(bg_selected()).add_modifier(Modifier::BOLD),
        ),
        (false, true) => (inactive(), Style::default().fg(text())),
        (false, false) => (inactive(), Style::default().fg(text_dim())),
    };

    let button = Paragraph::new(Line::from(Span::styled(format!(" {} ", label), label_style)))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        );
    f.render_widget(button, area);
}

fn display_color(phase: Phase, time_left: u64) -> Color {
    match phase {
        Phase::Running if time_left <= LOW_TIME_SECONDS => danger(),
        Phase::Running => accent(),
        Phase::Paused => warning(),
        Phase::Finished => danger(),
        Phase::Ready | Phase::Idle => text(),
    }
}

fn draw_display<S: Scheduler>(f: &mut Frame, app: &App<S>, area: Rect) {
    let countdown = &app.countdown;
    let time = countdown.display();
    let style = Style::default()
        .fg(display_color(countdown.phase(), countdown.time_left()))
        .add_modifier(Modifier::BOLD);

    let big = digits::render(&time)
        .filter(|rows| rows.first().map(|r| r.chars().count()).unwrap_or(0) <= area.width as usize);

    let lines: Vec<Line> = match big {
        Some(rows) => rows.into_iter().map(|row| Line::from(Span::styled(row, style))).collect(),
        None => {
            // Too narrow for block digits, center plain text vertically
            let pad = area.height.saturating_sub(1) / 2;
            let mut lines = vec![Line::from(""); pad as usize];
            lines.push(Line::from(Span::styled(time, style)));
            lines
        }
    };

    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn draw_footer<S: Scheduler>(f: &mut Frame, app: &App<S>, area: Rect) {
    let hints: Vec<(&str, &str)> = vec![
        ("0-9", "Duration"),
        ("Enter", "Set"),
        ("s", app.countdown.start_label()),
        ("p", "Pause"),
        ("r", "Reset"),
        ("Tab", "Focus"),
        ("h", "Help"),
        ("q", "Quit"),
    ];

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 90 { 6 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_fixed(56, 18, area);

    f.render_widget(Clear, popup_area);

    let key_line = |key: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<13}", key), Style::default().fg(accent())),
            Span::raw(what),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled("═══ Duration ═══", Style::default().fg(header()).add_modifier(Modifier::BOLD))),
        key_line("0-9", "Type the duration in seconds"),
        key_line("Backspace", "Delete the last digit"),
        key_line("Enter", "Set the countdown to the duration"),
        Line::from(""),
        Line::from(Span::styled("═══ Countdown ═══", Style::default().fg(header()).add_modifier(Modifier::BOLD))),
        key_line("s", "Start, or resume when paused"),
        key_line("p", "Pause"),
        key_line("r", "Reset to the duration"),
        Line::from(""),
        Line::from(Span::styled("═══ Navigation ═══", Style::default().fg(header()).add_modifier(Modifier::BOLD))),
        key_line("Tab", "Move focus between field and buttons"),
        key_line("Enter/Space", "Press the focused button"),
        key_line("q/Esc", "Quit"),
        Line::from(""),
        Line::from(Span::styled("Press Esc or h to close", Style::default().fg(text_dim()))),
    ];

    let help = Paragraph::new(help_text).block(
        Block::default()
            .title(Span::styled(" Help ", Style::default().fg(accent())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent())),
    );

    f.render_widget(help, popup_area);
}

/// Rect of at most `width` x `height`, centered in `r`
fn centered_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}
