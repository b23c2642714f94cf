//! Rendering.
//!
//! ```text
//! ┌ ryxmsg ──────┐┌ conversation ─────────────────┐
//! │ name         ││ > outgoing                    │
//! │ identity     ││ < incoming                    │
//! │ peer         ││                               │
//! │ status       │└───────────────────────────────┘
//! │              │┌───────────────────────────────┐
//! │              ││ input, grows with wrapping    │
//! └──────────────┘└───────────────────────────────┘
//! ```

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line as TextLine, Span},
    widgets::{Block, Paragraph, Wrap},
};
use ryxmsg_core::PeerIdentity;

use crate::app::{App, Line};

/// Input rows shown before the box stops growing.
const MAX_INPUT_ROWS: usize = 6;

/// Characters of an identity shown in the side pane.
const IDENTITY_PREVIEW: usize = 16;

/// Draw the whole shell.
pub fn render(frame: &mut Frame<'_>, app: &App) {
    let [side, main] =
        Layout::horizontal([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)]).areas(frame.area());

    let input_width = usize::from(main.width.saturating_sub(2)).max(1);
    let rows = app.input().height(input_width).min(MAX_INPUT_ROWS);
    let [conversation, input] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(rows as u16 + 2)]).areas(main);

    render_side(frame, side, app);
    render_conversation(frame, conversation, app);
    render_input(frame, input, app, input_width);
}

fn preview(identity: &PeerIdentity) -> String {
    let encoded = identity.as_str();
    match encoded.char_indices().nth(IDENTITY_PREVIEW) {
        Some((cut, _)) => format!("{}...", &encoded[..cut]),
        None => encoded.to_string(),
    }
}

fn render_side(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let label = Style::default().add_modifier(Modifier::BOLD);
    let peer = app.peer().map_or_else(|| "none".to_string(), preview);
    let lines = vec![
        TextLine::from(vec![Span::styled("name   ", label), Span::raw(app.name())]),
        TextLine::from(vec![Span::styled("id     ", label), Span::raw(preview(app.identity()))]),
        TextLine::from(vec![Span::styled("peer   ", label), Span::raw(peer)]),
        TextLine::from(vec![Span::styled("status ", label), Span::raw(app.status())]),
    ];
    frame.render_widget(Paragraph::new(lines).block(Block::bordered().title(" ryxmsg ")), area);
}

fn render_conversation(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let visible = usize::from(area.height.saturating_sub(2));
    let skip = app.lines().len().saturating_sub(visible);
    let lines: Vec<TextLine<'_>> = app.lines()[skip..]
        .iter()
        .map(|line| match line {
            Line::Outgoing(text) => {
                TextLine::styled(format!("> {text}"), Style::default().fg(Color::Cyan))
            },
            Line::Incoming(text) => {
                TextLine::styled(format!("< {text}"), Style::default().fg(Color::Green))
            },
            Line::Info(text) => TextLine::styled(text.clone(), Style::default().fg(Color::DarkGray)),
            Line::Error(text) => TextLine::styled(text.clone(), Style::default().fg(Color::Red)),
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(Block::bordered().title(" conversation "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame<'_>, area: Rect, app: &App, width: usize) {
    let wrapped = app.input().wrap(width);
    let visible = usize::from(area.height.saturating_sub(2));
    let (row, col) = app.input().cursor_position(width);
    // Show the tail, unless the cursor moved above it.
    let skip = wrapped.len().saturating_sub(visible).min(row);
    let lines: Vec<TextLine<'_>> = wrapped[skip..].iter().cloned().map(TextLine::from).collect();
    frame.render_widget(Paragraph::new(lines).block(Block::bordered()), area);

    let row = row - skip;
    frame.set_cursor_position(Position::new(area.x + 1 + col as u16, area.y + 1 + row as u16));
}
