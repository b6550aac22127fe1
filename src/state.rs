// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Owned UI state and the single reducer every interaction goes through.
//!
//! The reducer never performs side effects. It mutates the state, re-derives
//! the view and returns the [`Effect`]s the caller must carry out (start or
//! stop playback, toggle picture-in-picture, redraw). Outcomes of those effects
//! come back in as intents tagged with the session token they belong to.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::channel::{Category, Channel};
use crate::config::UiConfig;
use crate::timer::{TimerKind, Timers};
use crate::view::{self, ALL_CATEGORY, View, ViewOptions};

/// Identifies one playback attempt started from the UI.
pub type SessionToken = u64;

#[derive(Debug, Clone)]
pub enum Intent {
    DataLoaded {
        channels: Vec<Channel>,
        categories: Vec<Category>,
    },
    SearchChanged(String),
    CategorySelected(Category),
    /// Index into the channel list
    ChannelSelected(usize),
    PlaybackStarted(SessionToken),
    PlaybackFailed {
        token: SessionToken,
        reason: String,
    },
    PlaybackUnsupported(SessionToken),
    PlayerClosed,
    PipToggled,
    PipChanged {
        token: SessionToken,
        enabled: bool,
    },
    /// Pointer movement, click or key press while the player overlay is open
    Activity,
    TimerFired(TimerKind),
    NavToggled,
    /// Click that landed outside the navigation overlay
    OutsideClick,
    ViewportResized {
        width: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartPlayback {
        token: SessionToken,
        channel: Channel,
    },
    StopPlayback,
    TogglePip {
        token: SessionToken,
    },
    Render,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    Starting,
    Playing,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PlayerOverlay {
    pub token: SessionToken,
    pub channel_index: usize,
    pub channel: Channel,
    pub status: PlaybackStatus,
    pub controls_visible: bool,
    pub pip: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavState {
    /// Terminal is narrower than the compact breakpoint
    pub compact: bool,
    /// Compact navigation overlay is expanded
    pub open: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StateOptions {
    pub view: ViewOptions,
    pub idle_timeout: Duration,
    pub autohide_delay: Duration,
    pub compact_width: u16,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            view: ViewOptions::default(),
            idle_timeout: Duration::from_secs(3),
            autohide_delay: Duration::from_secs(3),
            compact_width: 80,
        }
    }
}

impl From<&UiConfig> for StateOptions {
    fn from(ui: &UiConfig) -> Self {
        Self {
            view: ViewOptions {
                section_cap: ui.section_cap.max(1),
                match_mode: ui.match_mode,
            },
            idle_timeout: Duration::from_millis(ui.idle_timeout_ms),
            autohide_delay: Duration::from_millis(ui.autohide_ms),
            compact_width: ui.compact_width,
        }
    }
}

#[derive(Debug)]
pub struct UiState {
    channels: Vec<Channel>,
    categories: Vec<Category>,
    active_category: Category,
    search_query: String,
    loaded: bool,
    view: View,
    player: Option<PlayerOverlay>,
    nav: NavState,
    timers: Timers,
    next_token: SessionToken,
    options: StateOptions,
}

impl UiState {
    pub fn new(options: StateOptions) -> Self {
        Self {
            channels: Vec::new(),
            categories: Vec::new(),
            active_category: ALL_CATEGORY.to_string(),
            search_query: String::new(),
            loaded: false,
            view: View::empty(),
            player: None,
            nav: NavState::default(),
            timers: Timers::new(),
            next_token: 1,
            options,
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn active_category(&self) -> &str {
        &self.active_category
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn player(&self) -> Option<&PlayerOverlay> {
        self.player.as_ref()
    }

    pub fn nav(&self) -> NavState {
        self.nav
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn set_category(&mut self, label: impl Into<Category>, now: Instant) -> Vec<Effect> {
        self.apply(Intent::CategorySelected(label.into()), now)
    }

    pub fn set_search_query(&mut self, text: impl Into<String>, now: Instant) -> Vec<Effect> {
        self.apply(Intent::SearchChanged(text.into()), now)
    }

    pub fn set_active_channel(&mut self, index: usize, now: Instant) -> Vec<Effect> {
        self.apply(Intent::ChannelSelected(index), now)
    }

    /// Fires every expired timer through the reducer.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        for kind in self.timers.take_expired(now) {
            effects.extend(self.apply(Intent::TimerFired(kind), now));
        }
        effects
    }

    pub fn apply(&mut self, intent: Intent, now: Instant) -> Vec<Effect> {
        match intent {
            Intent::DataLoaded {
                channels,
                categories,
            } => {
                debug!(
                    "Catalog loaded: {} channels, {} categories",
                    channels.len(),
                    categories.len()
                );
                self.channels = channels;
                self.categories = categories;
                self.loaded = true;
                self.rederive();
                vec![Effect::Render]
            }
            Intent::SearchChanged(query) => {
                self.search_query = query;
                self.rederive();
                vec![Effect::Render]
            }
            Intent::CategorySelected(category) => {
                self.active_category = category;
                self.nav.open = false;
                self.rederive();
                vec![Effect::Render]
            }
            Intent::ChannelSelected(index) => {
                let Some(channel) = self.channels.get(index).cloned() else {
                    debug!("Ignoring selection of unknown channel index {}", index);
                    return Vec::new();
                };
                let token = self.next_token;
                self.next_token += 1;
                self.timers.cancel_all();
                self.player = Some(PlayerOverlay {
                    token,
                    channel_index: index,
                    channel: channel.clone(),
                    status: PlaybackStatus::Starting,
                    controls_visible: true,
                    pip: false,
                });
                vec![Effect::StartPlayback { token, channel }, Effect::Render]
            }
            Intent::PlaybackStarted(token) => {
                let autohide = self.options.autohide_delay;
                let Some(player) = self.current_player_mut(token) else {
                    return Vec::new();
                };
                player.status = PlaybackStatus::Playing;
                self.timers
                    .schedule(TimerKind::ControlsAutoHide, now, autohide);
                vec![Effect::Render]
            }
            Intent::PlaybackFailed { token, reason } => {
                let Some(player) = self.current_player_mut(token) else {
                    return Vec::new();
                };
                player.status = PlaybackStatus::Failed(reason);
                player.controls_visible = true;
                self.timers.cancel_all();
                vec![Effect::Render]
            }
            Intent::PlaybackUnsupported(token) => {
                if self.current_player_mut(token).is_none() {
                    return Vec::new();
                }
                debug!("No playback backend on this host, closing player overlay");
                self.player = None;
                self.timers.cancel_all();
                vec![Effect::Render]
            }
            Intent::PlayerClosed => {
                self.timers.cancel_all();
                if self.player.take().is_none() {
                    return Vec::new();
                }
                vec![Effect::StopPlayback, Effect::Render]
            }
            Intent::PipToggled => match &self.player {
                Some(player) => vec![Effect::TogglePip {
                    token: player.token,
                }],
                None => Vec::new(),
            },
            Intent::PipChanged { token, enabled } => {
                let Some(player) = self.current_player_mut(token) else {
                    return Vec::new();
                };
                player.pip = enabled;
                vec![Effect::Render]
            }
            Intent::Activity => {
                let idle = self.options.idle_timeout;
                let Some(player) = self.player.as_mut() else {
                    return Vec::new();
                };
                let was_hidden = !player.controls_visible;
                player.controls_visible = true;
                self.timers.cancel(TimerKind::ControlsAutoHide);
                // A failed start keeps its controls up until the overlay closes
                if !matches!(player.status, PlaybackStatus::Failed(_)) {
                    self.timers.schedule(TimerKind::ControlsIdle, now, idle);
                }
                if was_hidden {
                    vec![Effect::Render]
                } else {
                    Vec::new()
                }
            }
            Intent::TimerFired(kind) => {
                let Some(player) = self.player.as_mut() else {
                    return Vec::new();
                };
                debug!("Timer {:?} fired, hiding player controls", kind);
                player.controls_visible = false;
                vec![Effect::Render]
            }
            Intent::NavToggled => {
                if !self.nav.compact {
                    return Vec::new();
                }
                self.nav.open = !self.nav.open;
                vec![Effect::Render]
            }
            Intent::OutsideClick => {
                if !self.nav.open {
                    return Vec::new();
                }
                self.nav.open = false;
                vec![Effect::Render]
            }
            Intent::ViewportResized { width } => {
                self.nav.compact = width < self.options.compact_width;
                if !self.nav.compact {
                    self.nav.open = false;
                }
                vec![Effect::Render]
            }
        }
    }

    fn current_player_mut(&mut self, token: SessionToken) -> Option<&mut PlayerOverlay> {
        match self.player.as_mut() {
            Some(player) if player.token == token => Some(player),
            _ => {
                debug!("Ignoring outcome of superseded session {}", token);
                None
            }
        }
    }

    fn rederive(&mut self) {
        self.view = view::derive(
            &self.channels,
            &self.active_category,
            &self.search_query,
            &self.options.view,
        );
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(StateOptions::default())
    }
}
