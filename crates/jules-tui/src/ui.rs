use jules_session::{BannerKind, Message, Role};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Min(10),    // Messages
            Constraint::Length(3),  // Input
            Constraint::Length(1),  // Status bar
        ])
        .split(f.size());

    draw_header(f, app, chunks[0]);
    draw_messages(f, app, chunks[1]);
    draw_input(f, app, chunks[2]);
    draw_status_bar(f, app, chunks[3]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " Jules",
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Cyan),
        ),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
        Span::styled(app.origin.as_str(), Style::default().fg(Color::Gray)),
    ];
    if app.session.is_request_in_flight() {
        spans.push(Span::styled("  ◐ Streaming...", Style::default().fg(Color::Yellow)));
    }
    if app.session.is_upload_in_flight() {
        spans.push(Span::styled("  ⇪ Uploading...", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let messages = app.messages();
    let branch_point = app.session.branch_point();

    let items: Vec<ListItem> = messages
        .iter()
        .map(|msg| {
            let is_branch_point = branch_point.as_ref() == Some(&msg.id);
            ListItem::new(format_message(msg, is_branch_point))
        })
        .collect();

    // Without a selection the list follows the newest messages
    let visible_height = area.height.saturating_sub(2) as usize;
    let selected = app.selected.filter(|i| *i < items.len());
    let first = match selected {
        Some(_) => 0,
        None => tail_start(&items, visible_height),
    };
    let mut state = ListState::default();
    state.select(selected);
    let items: Vec<ListItem> = items.into_iter().skip(first).collect();

    let title = format!("Messages ({})", short_id(app.session.session_id()));
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, &mut state);
}

/// Index of the first item such that the rest fits in `height` rows
fn tail_start(items: &[ListItem], height: usize) -> usize {
    let mut used = 0;
    for (index, item) in items.iter().enumerate().rev() {
        used += item.height();
        if used > height {
            return index + 1;
        }
    }
    0
}

fn short_id(id: &str) -> &str {
    id.char_indices().nth(16).map(|(i, _)| &id[..i]).unwrap_or(id)
}

fn format_message(msg: &Message, is_branch_point: bool) -> Text<'_> {
    let (prefix, style) = match msg.role {
        Role::User => ("you ", Style::default().fg(Color::Cyan)),
        Role::Model => ("jules ", Style::default().fg(Color::Green)),
    };

    let mut lines = Vec::new();
    for (n, text) in msg.parts.lines().enumerate() {
        let lead = if n == 0 { prefix } else { "" };
        lines.push(Line::from(vec![
            Span::styled(lead, style.add_modifier(Modifier::BOLD)),
            Span::styled(text, style),
        ]));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(prefix, style.add_modifier(Modifier::BOLD))));
    }

    if msg.streaming {
        if let Some(last) = lines.last_mut() {
            last.spans.push(Span::styled("▌", Style::default().fg(Color::Green)));
        }
    }

    let id_style = if msg.id.is_confirmed() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)
    };
    let mut footer = vec![Span::styled(
        format!("   └─ {} {} ", msg.created_at.format("%H:%M:%S"), msg.id),
        id_style.add_modifier(Modifier::ITALIC),
    )];
    if is_branch_point {
        footer.push(Span::styled("⎇ branch point", Style::default().fg(Color::Magenta)));
    }
    lines.push(Line::from(footer));
    lines.push(Line::from(""));

    Text::from(lines)
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let busy = app.session.is_busy();
    let input_text = if app.input.is_empty() && !busy {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(
                "Type a message and press Enter to send...",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ),
        ])
    } else {
        let color = if busy { Color::Yellow } else { Color::Green };
        Line::from(vec![
            Span::styled("> ", Style::default().fg(color)),
            Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
            Span::styled("▌", Style::default().fg(color)),
        ])
    };

    let title = if app.session.is_branching() {
        "Input (editing branch, Esc to cancel)"
    } else {
        "Input"
    };
    let input = Paragraph::new(input_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(input, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if let Some(banner) = app.banner() {
        let color = match banner.kind {
            BannerKind::Progress => Color::Yellow,
            BannerKind::Success => Color::Green,
            BannerKind::Error => Color::Red,
        };
        (format!(" {}", banner.text), Style::default().fg(color))
    } else if let Some(notice) = &app.notice {
        (format!(" {}", notice), Style::default().fg(Color::Yellow))
    } else {
        let mut state = Vec::new();
        if app.session.is_request_in_flight() {
            state.push("streaming");
        }
        if app.session.is_upload_in_flight() {
            state.push("uploading");
        }
        if app.session.is_branching() {
            state.push("branching");
        }
        let help = "[Enter] Send  [↑↓] Select  [Ctrl+B] Branch  [Esc] Cancel  [Ctrl+U] Upload  [Ctrl+C] Quit";
        let status = if state.is_empty() {
            format!(" Messages: {} | {}", app.session.message_count(), help)
        } else {
            format!(" {} | {}", state.join(", "), help)
        };
        (status, Style::default().fg(Color::Gray))
    };

    let status_bar = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(style.add_modifier(Modifier::REVERSED));

    f.render_widget(status_bar, area);
}
