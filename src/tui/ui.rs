// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::app::{App, Focus};
use super::widgets::{
    CARD_HEIGHT, CARD_WIDTH, centered_rect, channel_card, create_help_widget, truncate,
};
use crate::state::{PlaybackStatus, PlayerOverlay};
use crate::view::{View, ViewKind};

const SIDEBAR_WIDTH: u16 = 24;
const NAV_PANEL_WIDTH: u16 = 28;

pub fn draw(frame: &mut Frame, app: &mut App) {
    let size = frame.area();
    app.hits.clear();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(size);

    draw_header(frame, app, chunks[0]);
    draw_content(frame, app, chunks[1]);
    draw_footer(frame, app, chunks[2]);

    if app.state.nav().open {
        draw_nav_overlay(frame, app, chunks[1]);
    }

    if let Some(player) = app.state.player().cloned() {
        draw_player_overlay(frame, app, &player, chunks[1]);
    }

    if app.show_logs {
        draw_logs_overlay(frame, app, size);
    }

    if app.show_help {
        draw_help_overlay(frame, size);
    }
}

fn draw_header(frame: &mut Frame, app: &mut App, area: Rect) {
    let compact = app.state.nav().compact;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(if compact { 5 } else { 0 }),
            Constraint::Length(12),
            Constraint::Min(10),
        ])
        .split(area);

    if compact {
        let button = Paragraph::new("≡")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(button, chunks[0]);
        app.hits.nav_button = Some(chunks[0]);
    }

    let title = Paragraph::new("tvgrid")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );
    frame.render_widget(title, chunks[1]);

    let query = app.state.search_query();
    let text = if app.search_active {
        Line::from(vec![
            Span::raw(query.to_string()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
        ])
    } else if query.is_empty() {
        Line::from("Press / to search channels").style(Style::default().fg(Color::DarkGray))
    } else {
        Line::from(query.to_string())
    };
    let border = if app.search_active {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let search = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Search "),
    );
    frame.render_widget(search, chunks[2]);
    app.hits.search = Some(chunks[2]);
}

fn draw_content(frame: &mut Frame, app: &mut App, area: Rect) {
    if app.state.nav().compact {
        draw_grid(frame, app, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(CARD_WIDTH)])
        .split(area);

    draw_sidebar(frame, app, chunks[0]);
    draw_grid(frame, app, chunks[1]);
}

fn draw_sidebar(frame: &mut Frame, app: &mut App, area: Rect) {
    let focused = app.focus == Focus::Categories;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::White } else { Color::DarkGray }))
        .title(" Categories ");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    draw_category_list(frame, app, inner, focused);
}

/// Category rows for the sidebar and the compact navigation overlay.
fn draw_category_list(frame: &mut Frame, app: &mut App, area: Rect, focused: bool) {
    if area.height == 0 {
        return;
    }
    let labels = app.category_labels();
    let visible = area.height as usize;
    let start = app.category_cursor.saturating_sub(visible - 1);
    let width = area.width.saturating_sub(3) as usize;

    for (row, (index, label)) in labels.iter().enumerate().skip(start).take(visible).enumerate() {
        let active = label == app.state.active_category();
        let marker = if active { "● " } else { "  " };
        let mut style = if active {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        if focused && index == app.category_cursor {
            style = style.bg(Color::DarkGray);
        }

        let rect = Rect::new(area.x, area.y + row as u16, area.width, 1);
        let line = Line::from(format!("{}{}", marker, truncate(label, width))).style(style);
        frame.render_widget(Paragraph::new(line), rect);
        app.hits.categories.push((rect, label.clone()));
    }
}

fn grid_title(app: &App) -> String {
    match app.state.view().kind {
        ViewKind::Dashboard => " Home ".to_string(),
        ViewKind::Category => format!(" {} ", app.state.active_category()),
        ViewKind::Search => " Search results ".to_string(),
    }
}

enum GridItem<'a> {
    Title(&'a str),
    Card { position: usize, channel: usize, column: usize },
}

/// Virtual layout of the view: each entry with its top row. Rows are counted
/// in `usize` because search and category sections are uncapped.
fn layout_grid(view: &View, columns: usize) -> Vec<(usize, GridItem<'_>)> {
    let card_height = CARD_HEIGHT as usize;
    let mut items = Vec::new();
    let mut y = 0;
    let mut position = 0;

    for section in &view.sections {
        items.push((y, GridItem::Title(&section.title)));
        y += 1;
        for (i, channel) in section.channels.iter().enumerate() {
            items.push((
                y + (i / columns) * card_height,
                GridItem::Card {
                    position,
                    channel: *channel,
                    column: i % columns,
                },
            ));
            position += 1;
        }
        y += section.channels.len().div_ceil(columns) * card_height + 1;
    }

    items
}

fn draw_grid(frame: &mut Frame, app: &mut App, area: Rect) {
    let focused = app.focus == Focus::Grid;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::White } else { Color::DarkGray }))
        .title(grid_title(app));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !app.state.is_loaded() {
        let loading = Paragraph::new(vec![
            Line::from(""),
            Line::from("Loading channels...").style(Style::default().fg(Color::Yellow)),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(loading, inner);
        return;
    }

    let view = app.state.view();
    if view.item_count() == 0 {
        let message = match view.kind {
            ViewKind::Search => format!("No channels match \"{}\"", app.state.search_query()),
            _ => "No channels found".to_string(),
        };
        let empty = Paragraph::new(vec![Line::from(""), Line::from(message)])
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, inner);
        return;
    }

    let columns = (inner.width / CARD_WIDTH).max(1) as usize;
    app.grid_columns = columns;
    let items = layout_grid(view, columns);

    // Keep the highlighted card on screen
    let card_height = CARD_HEIGHT as usize;
    let height = inner.height as usize;
    if let Some((top, _)) = items.iter().find(|(_, item)| {
        matches!(item, GridItem::Card { position, .. } if *position == app.grid_cursor)
    }) {
        let top = *top;
        if top < app.grid_scroll {
            app.grid_scroll = top.saturating_sub(1);
        } else if top + card_height > app.grid_scroll + height {
            app.grid_scroll = (top + card_height).saturating_sub(height);
        }
    }
    let scroll = app.grid_scroll;
    let bottom = scroll + height;

    let mut cards = Vec::new();
    for (top, item) in &items {
        // Only rows inside the window are converted back to screen offsets
        match item {
            GridItem::Title(title) => {
                if *top < scroll || *top >= bottom {
                    continue;
                }
                let row = (top - scroll) as u16;
                let rect = Rect::new(inner.x, inner.y + row, inner.width, 1);
                let line = Line::from(Span::styled(
                    format!(" {}", title),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ));
                frame.render_widget(Paragraph::new(line), rect);
            }
            GridItem::Card {
                position,
                channel,
                column,
            } => {
                if *top < scroll || top + card_height > bottom {
                    continue;
                }
                let Some(channel) = app.state.channels().get(*channel) else {
                    continue;
                };
                let rect = Rect::new(
                    inner.x + *column as u16 * CARD_WIDTH,
                    inner.y + (top - scroll) as u16,
                    CARD_WIDTH.min(inner.width),
                    CARD_HEIGHT,
                );
                let selected = focused && *position == app.grid_cursor;
                frame.render_widget(channel_card(channel, selected), rect);
                cards.push((rect, *position));
            }
        }
    }
    app.hits.cards = cards;
}

fn draw_nav_overlay(frame: &mut Frame, app: &mut App, area: Rect) {
    let panel = Rect::new(area.x, area.y, NAV_PANEL_WIDTH.min(area.width), area.height);
    frame.render_widget(Clear, panel);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Categories ");
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    draw_category_list(frame, app, inner, true);
    app.hits.nav_panel = Some(panel);
}

fn player_status_line(player: &PlayerOverlay, app: &App) -> Line<'static> {
    match &player.status {
        PlaybackStatus::Starting => {
            Line::from("⏳ Starting playback...").style(Style::default().fg(Color::Yellow))
        }
        PlaybackStatus::Playing => {
            let backend = app
                .backend
                .map(|kind| format!(" in {}", kind))
                .unwrap_or_default();
            let pip = if player.pip { " (picture-in-picture)" } else { "" };
            Line::from(format!("▶ Playing{}{}", backend, pip))
                .style(Style::default().fg(Color::Green))
        }
        PlaybackStatus::Failed(reason) => Line::from(format!("❌ {}", reason))
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
    }
}

fn draw_player_overlay(frame: &mut Frame, app: &mut App, player: &PlayerOverlay, area: Rect) {
    let overlay = centered_rect(70, 70, area);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Now Playing ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(inner);

    let channel = &player.channel;
    let info = Paragraph::new(vec![
        Line::from(""),
        Line::from(channel.name.clone())
            .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Line::from(channel.group.clone()).style(Style::default().fg(Color::Gray)),
        Line::from(""),
        player_status_line(player, app),
        Line::from(""),
        Line::from(channel.url.clone()).style(Style::default().fg(Color::DarkGray)),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(info, chunks[0]);

    if !player.controls_visible {
        let hint = Paragraph::new("Move the mouse or press a key for controls")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(hint, chunks[1]);
        return;
    }

    let buttons = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
        ])
        .split(chunks[1]);

    let close = Paragraph::new("Close (x)")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(close, buttons[1]);
    app.hits.close_button = Some(buttons[1]);

    let pip_label = if player.pip { "Exit PiP (p)" } else { "PiP (p)" };
    let pip = Paragraph::new(pip_label)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(pip, buttons[2]);
    app.hits.pip_button = Some(buttons[2]);
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let (text, color) = if let Some(msg) = &app.status_message {
        (msg.clone(), Color::Yellow)
    } else if app.state.player().is_some() {
        (
            " x/Esc: Close | p: Picture-in-picture | q: Quit ".to_string(),
            Color::DarkGray,
        )
    } else {
        let count = app.state.view().item_count();
        let position = if count == 0 { 0 } else { app.grid_cursor + 1 };
        (
            format!(
                " {} of {} | /: Search | Tab: Focus | Enter: Play | m: Menu | ?: Help | q: Quit ",
                position, count
            ),
            Color::DarkGray,
        )
    };

    let footer = Paragraph::new(text)
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(footer, area);
}

fn draw_logs_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let log_area = centered_rect(80, 80, area);
    frame.render_widget(Clear, log_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Logs (Esc to close) ");
    let inner = block.inner(log_area);
    frame.render_widget(block, log_area);

    // Most recent lines that fit
    let start = app.logs.len().saturating_sub(inner.height as usize);
    let lines: Vec<Line> = app.logs[start..]
        .iter()
        .map(|(time, msg)| {
            Line::from(vec![
                Span::styled(
                    format!("{} ", time.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(msg.clone(), Style::default().fg(Color::Gray)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let help_area = centered_rect(60, 80, area);
    frame.render_widget(Clear, help_area);
    frame.render_widget(create_help_widget(), help_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Catalog;
    use crate::channel::Channel;
    use crate::state::{Intent, StateOptions};
    use ratatui::{Terminal, backend::TestBackend};
    use std::time::{Duration, Instant};

    fn render(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn catalog() -> Catalog {
        Catalog {
            channels: vec![
                Channel::new("BBC News", "News;UK", "http://x/bbc.m3u8"),
                Channel::new("Jazz FM", "Music;Radio", "http://x/jazz.m3u8"),
            ],
            categories: vec!["Music".to_string(), "News".to_string()],
            errors: Vec::new(),
        }
    }

    fn app(width: u16) -> App {
        let mut app = App::new(StateOptions::default(), None);
        app.resize(width, Instant::now());
        app
    }

    #[test]
    fn placeholder_is_replaced_once_data_arrives() {
        let mut app = app(120);
        let before = render(&mut app, 120, 30);
        assert!(before.contains("Loading channels..."));
        assert!(!before.contains("Trending"));

        app.catalog_loaded(catalog(), Instant::now());
        let after = render(&mut app, 120, 30);
        assert!(!after.contains("Loading channels..."));
        assert!(after.contains("Trending"));
        assert!(after.contains("BBC News"));
        assert!(after.contains("Jazz FM"));
        assert!(!app.hits.cards.is_empty());
    }

    #[test]
    fn empty_catalog_shows_message() {
        let mut app = app(120);
        app.catalog_loaded(Catalog::default(), Instant::now());
        let screen = render(&mut app, 120, 30);
        assert!(screen.contains("No channels found"));
    }

    #[test]
    fn search_without_hits_names_the_query() {
        let mut app = app(120);
        app.catalog_loaded(catalog(), Instant::now());
        app.dispatch(Intent::SearchChanged("zzz".to_string()), Instant::now());
        let screen = render(&mut app, 120, 30);
        assert!(screen.contains("No channels match \"zzz\""));
    }

    #[test]
    fn sidebar_marks_active_category() {
        let mut app = app(120);
        app.catalog_loaded(catalog(), Instant::now());
        let screen = render(&mut app, 120, 30);
        assert!(screen.contains("● All"));
        assert_eq!(app.hits.categories.len(), 3);
    }

    #[test]
    fn player_controls_hide_after_timeout() {
        let now = Instant::now();
        let mut app = app(120);
        app.catalog_loaded(catalog(), now);
        app.dispatch(Intent::ChannelSelected(0), now);
        let token = app.state.player().unwrap().token;
        app.playback_outcome(token, Ok(1), now);

        let screen = render(&mut app, 120, 30);
        assert!(screen.contains("Now Playing"));
        assert!(screen.contains("Close (x)"));
        assert!(app.hits.close_button.is_some());

        app.tick(now + Duration::from_secs(5));
        let screen = render(&mut app, 120, 30);
        assert!(!screen.contains("Close (x)"));
        assert!(app.hits.close_button.is_none());
    }

    #[test]
    fn compact_layout_hides_sidebar_until_menu_opens() {
        let now = Instant::now();
        let mut app = app(60);
        app.catalog_loaded(catalog(), now);
        render(&mut app, 60, 30);
        assert!(app.hits.categories.is_empty());
        assert!(app.hits.nav_button.is_some());

        app.dispatch(Intent::NavToggled, now);
        render(&mut app, 60, 30);
        assert_eq!(app.hits.categories.len(), 3);
        assert!(app.hits.nav_panel.is_some());
    }

    #[test]
    fn redrawing_unchanged_state_is_identical() {
        let mut app = app(120);
        app.catalog_loaded(catalog(), Instant::now());

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| draw(frame, &mut app)).unwrap();
        let first = terminal.backend().buffer().clone();
        let cards = app.hits.cards.clone();
        let categories = app.hits.categories.len();

        terminal.draw(|frame| draw(frame, &mut app)).unwrap();
        assert_eq!(terminal.backend().buffer(), &first);
        assert_eq!(app.hits.cards, cards);
        assert_eq!(app.hits.categories.len(), categories);
    }

    #[test]
    fn huge_search_result_renders_on_narrow_terminal() {
        let channels = (0..20_000)
            .map(|i| Channel::new(format!("Channel {}", i), "General", "http://x/s.m3u8"))
            .collect();
        let mut app = app(40);
        app.catalog_loaded(
            Catalog {
                channels,
                categories: Vec::new(),
                errors: Vec::new(),
            },
            Instant::now(),
        );
        app.dispatch(Intent::SearchChanged("chan".to_string()), Instant::now());

        let screen = render(&mut app, 40, 30);
        assert_eq!(app.grid_columns, 1);
        assert!(screen.contains("Channel 0"));

        app.grid_cursor = 19_999;
        let screen = render(&mut app, 40, 30);
        assert!(screen.contains("Channel 19999"));
        assert!(app.grid_scroll > u16::MAX as usize);
        assert!(app.hits.cards.iter().any(|(_, position)| *position == 19_999));
    }
}
