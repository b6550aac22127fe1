// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};
use std::time::Instant;
use tracing::{info, warn};

use crate::api::Catalog;
use crate::channel::Category;
use crate::player::BackendKind;
use crate::session::{PlaybackError, SessionId};
use crate::state::{Effect, Intent, SessionToken, StateOptions, UiState};
use crate::view::ALL_CATEGORY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Categories,
    Grid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
}

/// Screen regions recorded by the last draw, used to route mouse clicks.
#[derive(Debug, Default, Clone)]
pub struct HitMap {
    /// Card area and its position in the view
    pub cards: Vec<(Rect, usize)>,
    pub categories: Vec<(Rect, Category)>,
    pub search: Option<Rect>,
    pub nav_button: Option<Rect>,
    pub nav_panel: Option<Rect>,
    pub close_button: Option<Rect>,
    pub pip_button: Option<Rect>,
}

fn hit(area: Option<Rect>, column: u16, row: u16) -> bool {
    area.is_some_and(|a| a.contains(Position::new(column, row)))
}

impl HitMap {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn card_at(&self, column: u16, row: u16) -> Option<usize> {
        self.cards
            .iter()
            .find(|(area, _)| hit(Some(*area), column, row))
            .map(|(_, pos)| *pos)
    }

    pub fn category_at(&self, column: u16, row: u16) -> Option<&Category> {
        self.categories
            .iter()
            .find(|(area, _)| hit(Some(*area), column, row))
            .map(|(_, label)| label)
    }
}

pub struct App {
    pub state: UiState,
    pub focus: Focus,
    /// Position of the highlighted card across all sections
    pub grid_cursor: usize,
    /// First virtual grid row shown on screen
    /// First visible row of the virtual grid
    pub grid_scroll: usize,
    pub grid_columns: usize,
    pub category_cursor: usize,
    pub search_active: bool,
    pub show_help: bool,
    pub show_logs: bool,
    pub status_message: Option<String>,
    pub logs: Vec<(DateTime<Local>, String)>,
    pub backend: Option<BackendKind>,
    pub hits: HitMap,
    effects: Vec<Effect>,
}

const MAX_LOG_LINES: usize = 100;

impl App {
    pub fn new(options: StateOptions, backend: Option<BackendKind>) -> Self {
        Self {
            state: UiState::new(options),
            focus: Focus::Grid,
            grid_cursor: 0,
            grid_scroll: 0,
            grid_columns: 1,
            category_cursor: 0,
            search_active: false,
            show_help: false,
            show_logs: false,
            status_message: None,
            logs: Vec::new(),
            backend,
            hits: HitMap::default(),
            effects: Vec::new(),
        }
    }

    /// "All" followed by the loaded categories, in sidebar order.
    pub fn category_labels(&self) -> Vec<Category> {
        std::iter::once(ALL_CATEGORY.to_string())
            .chain(self.state.categories().iter().cloned())
            .collect()
    }

    pub fn dispatch(&mut self, intent: Intent, now: Instant) {
        let effects = self.state.apply(intent, now);
        self.effects.extend(effects);
        self.clamp_cursors();
    }

    /// Effects produced since the last call, in the order they were emitted.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn tick(&mut self, now: Instant) {
        let effects = self.state.poll_timers(now);
        self.effects.extend(effects);
    }

    pub fn resize(&mut self, width: u16, now: Instant) {
        self.dispatch(Intent::ViewportResized { width }, now);
        if self.state.nav().compact && self.focus == Focus::Categories {
            self.focus = Focus::Grid;
        }
    }

    pub fn catalog_loaded(&mut self, catalog: Catalog, now: Instant) {
        for error in &catalog.errors {
            self.add_log(error.clone());
        }
        if !catalog.errors.is_empty() {
            self.status_message = Some(catalog.errors.join("; "));
        }
        info!(
            "Loaded {} channels and {} categories",
            catalog.channels.len(),
            catalog.categories.len()
        );
        self.add_log(format!(
            "Loaded {} channels in {} categories",
            catalog.channels.len(),
            catalog.categories.len()
        ));
        self.dispatch(
            Intent::DataLoaded {
                channels: catalog.channels,
                categories: catalog.categories,
            },
            now,
        );
    }

    pub fn playback_outcome(
        &mut self,
        token: SessionToken,
        outcome: Result<SessionId, PlaybackError>,
        now: Instant,
    ) {
        let intent = match outcome {
            Ok(_) => {
                if let Some(player) = self.state.player().filter(|p| p.token == token) {
                    let message = format!("Playing: {}", player.channel.name);
                    self.add_log(message);
                }
                Intent::PlaybackStarted(token)
            }
            Err(PlaybackError::Unsupported) => {
                self.add_log("No supported player found (install mpv or ffplay)".to_string());
                Intent::PlaybackUnsupported(token)
            }
            Err(e) => {
                warn!("Playback failed: {}", e);
                self.add_log(format!("Playback failed: {}", e));
                Intent::PlaybackFailed {
                    token,
                    reason: e.to_string(),
                }
            }
        };
        self.dispatch(intent, now);
    }

    pub fn pip_outcome(
        &mut self,
        token: SessionToken,
        outcome: Result<bool, PlaybackError>,
        now: Instant,
    ) {
        match outcome {
            Ok(enabled) => self.dispatch(Intent::PipChanged { token, enabled }, now),
            Err(e) => {
                self.add_log(e.to_string());
                self.status_message = Some(e.to_string());
                self.effects.push(Effect::Render);
            }
        }
    }

    /// The external player window went away without a close request.
    pub fn player_exited(&mut self, now: Instant) {
        if self.state.player().is_some() {
            self.status_message = Some("Player exited".to_string());
            self.add_log("Player exited".to_string());
            self.dispatch(Intent::PlayerClosed, now);
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent, now: Instant) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        self.status_message = None;

        if key.code == KeyCode::F(2)
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('.'))
        {
            self.show_logs = !self.show_logs;
            self.effects.push(Effect::Render);
            return None;
        }

        if self.show_logs {
            if key.code == KeyCode::Esc {
                self.show_logs = false;
            }
            self.effects.push(Effect::Render);
            return None;
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::F(1)) {
                self.show_help = false;
            }
            self.effects.push(Effect::Render);
            return None;
        }

        if self.state.player().is_some() {
            return self.handle_player_key(key, now);
        }

        if self.search_active {
            self.handle_search_key(key, now);
            return None;
        }

        if self.state.nav().open {
            self.handle_nav_key(key, now);
            return None;
        }

        match key.code {
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Char('?') | KeyCode::F(1) => self.show_help = true,
            KeyCode::Char('/') => self.search_active = true,
            KeyCode::Char('m') => self.dispatch(Intent::NavToggled, now),
            KeyCode::Esc => {
                if !self.state.search_query().is_empty() {
                    self.update_search(String::new(), now);
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if !self.state.nav().compact {
                    self.focus = match self.focus {
                        Focus::Grid => Focus::Categories,
                        Focus::Categories => Focus::Grid,
                    };
                }
            }
            KeyCode::Enter => match self.focus {
                Focus::Grid => self.play_cursor(now),
                Focus::Categories => self.select_category_at_cursor(now),
            },
            _ => match self.focus {
                Focus::Grid => self.move_grid_cursor(key.code),
                Focus::Categories => self.move_category_cursor(key.code),
            },
        }

        self.effects.push(Effect::Render);
        None
    }

    fn handle_player_key(&mut self, key: KeyEvent, now: Instant) -> Option<Action> {
        self.dispatch(Intent::Activity, now);
        match key.code {
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Esc | KeyCode::Char('x') => self.dispatch(Intent::PlayerClosed, now),
            KeyCode::Char('p') => self.dispatch(Intent::PipToggled, now),
            _ => {}
        }
        None
    }

    fn handle_search_key(&mut self, key: KeyEvent, now: Instant) {
        let mut query = self.state.search_query().to_string();
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Down | KeyCode::Tab => {
                self.search_active = false;
                self.focus = Focus::Grid;
                self.effects.push(Effect::Render);
                return;
            }
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => query.clear(),
            KeyCode::Char(c) => query.push(c),
            _ => return,
        }
        self.update_search(query, now);
    }

    fn handle_nav_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('m') => self.dispatch(Intent::NavToggled, now),
            KeyCode::Enter => self.select_category_at_cursor(now),
            code => self.move_category_cursor(code),
        }
        self.effects.push(Effect::Render);
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent, now: Instant) {
        let (column, row) = (mouse.column, mouse.row);

        if self.state.player().is_some() {
            match mouse.kind {
                MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                    self.dispatch(Intent::Activity, now)
                }
                MouseEventKind::Down(MouseButton::Left) => {
                    if hit(self.hits.close_button, column, row) {
                        self.dispatch(Intent::PlayerClosed, now);
                    } else if hit(self.hits.pip_button, column, row) {
                        self.dispatch(Intent::Activity, now);
                        self.dispatch(Intent::PipToggled, now);
                    } else {
                        self.dispatch(Intent::Activity, now);
                    }
                }
                _ => {}
            }
            return;
        }

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.handle_click(column, row, now),
            MouseEventKind::ScrollDown => {
                self.move_grid_cursor(KeyCode::Down);
                self.effects.push(Effect::Render);
            }
            MouseEventKind::ScrollUp => {
                self.move_grid_cursor(KeyCode::Up);
                self.effects.push(Effect::Render);
            }
            _ => {}
        }
    }

    fn handle_click(&mut self, column: u16, row: u16, now: Instant) {
        if self.state.nav().open {
            if let Some(label) = self.hits.category_at(column, row).cloned() {
                self.select_category(label, now);
            } else if !hit(self.hits.nav_panel, column, row) {
                self.dispatch(Intent::OutsideClick, now);
            }
            return;
        }

        if hit(self.hits.nav_button, column, row) {
            self.dispatch(Intent::NavToggled, now);
        } else if hit(self.hits.search, column, row) {
            self.search_active = true;
            self.effects.push(Effect::Render);
        } else if let Some(label) = self.hits.category_at(column, row).cloned() {
            self.focus = Focus::Categories;
            self.select_category(label, now);
        } else if let Some(position) = self.hits.card_at(column, row) {
            self.focus = Focus::Grid;
            self.grid_cursor = position;
            self.play_cursor(now);
        } else if self.search_active {
            self.search_active = false;
            self.effects.push(Effect::Render);
        }
    }

    fn update_search(&mut self, query: String, now: Instant) {
        self.grid_cursor = 0;
        self.grid_scroll = 0;
        self.dispatch(Intent::SearchChanged(query), now);
    }

    fn select_category(&mut self, label: Category, now: Instant) {
        if let Some(index) = self.category_labels().iter().position(|c| *c == label) {
            self.category_cursor = index;
        }
        self.grid_cursor = 0;
        self.grid_scroll = 0;
        self.dispatch(Intent::CategorySelected(label), now);
    }

    fn select_category_at_cursor(&mut self, now: Instant) {
        if let Some(label) = self.category_labels().get(self.category_cursor).cloned() {
            self.select_category(label, now);
        }
    }

    fn play_cursor(&mut self, now: Instant) {
        if let Some(index) = self.state.view().channel_at(self.grid_cursor) {
            self.dispatch(Intent::ChannelSelected(index), now);
        }
    }

    fn move_grid_cursor(&mut self, code: KeyCode) {
        let count = self.state.view().item_count();
        if count == 0 {
            return;
        }
        let columns = self.grid_columns.max(1);
        let last = count - 1;
        self.grid_cursor = match code {
            KeyCode::Left | KeyCode::Char('h') => self.grid_cursor.saturating_sub(1),
            KeyCode::Right | KeyCode::Char('l') => (self.grid_cursor + 1).min(last),
            KeyCode::Up | KeyCode::Char('k') => self.grid_cursor.saturating_sub(columns),
            KeyCode::Down | KeyCode::Char('j') => (self.grid_cursor + columns).min(last),
            KeyCode::Home => 0,
            KeyCode::End => last,
            _ => self.grid_cursor,
        };
    }

    fn move_category_cursor(&mut self, code: KeyCode) {
        let last = self.state.categories().len();
        self.category_cursor = match code {
            KeyCode::Up | KeyCode::Char('k') => self.category_cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => (self.category_cursor + 1).min(last),
            KeyCode::Home => 0,
            KeyCode::End => last,
            _ => self.category_cursor,
        };
    }

    fn add_log(&mut self, message: String) {
        self.logs.push((Local::now(), message));
        if self.logs.len() > MAX_LOG_LINES {
            self.logs.remove(0);
        }
    }

    fn clamp_cursors(&mut self) {
        let count = self.state.view().item_count();
        self.grid_cursor = self.grid_cursor.min(count.saturating_sub(1));
        self.category_cursor = self.category_cursor.min(self.state.categories().len());
    }
}
