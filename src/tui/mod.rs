// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod app;
pub mod event;
pub mod ui;
pub mod widgets;

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::api::{Catalog, ContentClient};
use crate::config::Config;
use crate::player::{BackendProvider, HostPlayers};
use crate::session::{SessionManager, SessionState};
use crate::state::{Effect, SessionToken, StateOptions};

pub use app::{Action, App};
pub use event::{Event, EventHandler};

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    pub event_handler: EventHandler,
}

impl Tui {
    pub fn new(tick_rate: Duration) -> Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        let event_handler = EventHandler::new(tick_rate);
        Ok(Self {
            terminal,
            event_handler,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    pub fn width(&self) -> Result<u16> {
        Ok(self.terminal.size()?.width)
    }

    pub fn draw(&mut self, app: &mut App) -> Result<()> {
        self.terminal.draw(|frame| ui::draw(frame, app))?;
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

pub async fn run_tui(config: Config) -> Result<()> {
    let client = ContentClient::new(&config.server.url)?;
    let players = HostPlayers::detect(&config.player);
    let backend = players.kind();
    let mut session = SessionManager::new(players);

    let mut tui = Tui::new(Duration::from_millis(config.ui.tick_rate_ms.max(10)))?;
    tui.init()?;

    let mut app = App::new(StateOptions::from(&config.ui), backend);
    let res = run_app(&mut tui, &mut app, &mut session, client).await;

    // Release the player before giving the terminal back
    session.shutdown().await;

    tui.exit()?;

    if let Err(err) = &res {
        error!("TUI exited with error: {:#}", err);
    }
    res
}

async fn run_app<P: BackendProvider>(
    tui: &mut Tui,
    app: &mut App,
    session: &mut SessionManager<P>,
    client: ContentClient,
) -> Result<()> {
    let (catalog_tx, mut catalog_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = catalog_tx.send(client.load_catalog().await);
    });
    let mut catalog_pending = true;
    // Token of the UI selection whose start is in flight in the session manager
    let mut starting: Option<SessionToken> = None;

    app.resize(tui.width()?, Instant::now());
    tui.draw(app)?;

    loop {
        tokio::select! {
            catalog = &mut catalog_rx, if catalog_pending => {
                catalog_pending = false;
                let catalog = catalog.unwrap_or_else(|_| Catalog {
                    errors: vec!["Catalog loader stopped unexpectedly".to_string()],
                    ..Catalog::default()
                });
                app.catalog_loaded(catalog, Instant::now());
            }
            outcome = session.started(), if session.is_starting() => {
                if let Some(token) = starting.take() {
                    app.playback_outcome(token, outcome, Instant::now());
                }
            }
            event = tui.event_handler.next() => {
                let now = Instant::now();
                match event? {
                    Event::Key(key) => {
                        if let Some(Action::Quit) = app.handle_key_event(key, now) {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => app.handle_mouse_event(mouse, now),
                    Event::Resize(width, _) => app.resize(width, now),
                    Event::Tick => {
                        if session.state() == SessionState::Playing
                            && !session.check_alive().await
                        {
                            app.player_exited(now);
                        }
                    }
                }
                app.tick(now);
            }
        }

        perform_effects(tui, app, session, &mut starting).await?;
    }

    Ok(())
}

/// Carries out effects until the reducer stops producing new ones. Playback
/// starts are only queued here; their outcome arrives in the event loop and
/// is fed back as an intent tagged with its session token.
async fn perform_effects<P: BackendProvider>(
    tui: &mut Tui,
    app: &mut App,
    session: &mut SessionManager<P>,
    starting: &mut Option<SessionToken>,
) -> Result<()> {
    loop {
        let effects = app.take_effects();
        if effects.is_empty() {
            return Ok(());
        }

        let mut redraw = false;
        for effect in effects {
            match effect {
                Effect::Render => redraw = true,
                Effect::StartPlayback { token, channel } => {
                    debug!("Starting playback of {} ({})", channel.name, channel.url);
                    match session.request_start(&channel.url).await {
                        Ok(id) => {
                            debug!("Session {} opening for selection {}", id, token);
                            *starting = Some(token);
                        }
                        Err(e) => {
                            *starting = None;
                            app.playback_outcome(token, Err(e), Instant::now());
                        }
                    }
                }
                Effect::StopPlayback => {
                    *starting = None;
                    session.stop().await;
                }
                Effect::TogglePip { token } => {
                    let outcome = session.toggle_pip().await;
                    app.pip_outcome(token, outcome, Instant::now());
                }
            }
        }

        if redraw {
            tui.draw(app)?;
        }
    }
}
