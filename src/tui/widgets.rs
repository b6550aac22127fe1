// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::channel::Channel;

pub const CARD_WIDTH: u16 = 26;
pub const CARD_HEIGHT: u16 = 4;

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Cuts `text` to `width` columns, marking the cut with an ellipsis.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

pub fn channel_card(channel: &Channel, selected: bool) -> Paragraph<'static> {
    let inner_width = CARD_WIDTH.saturating_sub(2) as usize;
    let border = if selected { Color::Yellow } else { Color::DarkGray };
    let name_style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    let group = channel.primary_category().unwrap_or("Uncategorized");

    Paragraph::new(vec![
        Line::from(Span::styled(truncate(&channel.name, inner_width), name_style)),
        Line::from(Span::styled(
            truncate(group, inner_width),
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    )
}

pub fn get_help_lines() -> Vec<Line<'static>> {
    let heading = |text: &'static str| {
        Line::from(vec![Span::styled(
            text,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )])
    };

    vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            "tvgrid - Help",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        heading("Browsing:"),
        Line::from("  ←↑↓→/hjkl - Move between channel cards"),
        Line::from("  Tab       - Switch between categories and channels"),
        Line::from("  Enter     - Play channel / select category"),
        Line::from("  /         - Search channel names and groups"),
        Line::from("  Esc       - Leave search, clear query"),
        Line::from("  m         - Open category menu (narrow terminals)"),
        Line::from("  q         - Quit"),
        Line::from(""),
        heading("Player:"),
        Line::from("  x/Esc     - Close player"),
        Line::from("  p         - Toggle picture-in-picture"),
        Line::from("  any key   - Show player controls"),
        Line::from(""),
        heading("Mouse:"),
        Line::from("  Click a card to play it, a category to filter"),
        Line::from("  Click outside the category menu to close it"),
        Line::from(""),
        Line::from("Press Esc, ? or F1 to close this help"),
    ]
}

pub fn create_help_widget() -> Paragraph<'static> {
    Paragraph::new(get_help_lines())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(" Help "),
        )
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("BBC News", 20), "BBC News");
        assert_eq!(truncate("BBC News International", 8), "BBC New…");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn centered_rect_stays_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(60, 50, area);
        assert_eq!(popup.width, 60);
        assert_eq!(popup.height, 20);
        assert!(popup.x >= area.x && popup.right() <= area.right());
    }
}
