// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod ffplay;
pub mod mpv;

use anyhow::Result;
use ffplay::FfplayBackend;
use mpv::MpvBackend;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::config::{PlayerConfig, PlayerPreference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// mpv drives adaptive streaming itself and is controlled over IPC
    Adaptive,
    /// ffplay opens the stream URL directly, no remote control
    Direct,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Adaptive => write!(f, "mpv"),
            BackendKind::Direct => write!(f, "ffplay"),
        }
    }
}

/// One playback attachment. A backend value lives exactly as long as the
/// session that created it.
#[allow(async_fn_in_trait)]
pub trait PlaybackBackend {
    fn kind(&self) -> BackendKind;

    /// Hands the stream source to the player.
    async fn attach(&mut self, source: &str) -> Result<()>;

    /// Waits until the player has opened the stream and playback is running.
    async fn play(&mut self) -> Result<()>;

    async fn set_pip(&mut self, enabled: bool) -> Result<()>;

    /// Stops loading and releases every resource held by the backend.
    async fn stop(&mut self) -> Result<()>;

    async fn is_alive(&mut self) -> bool;
}

/// Creates backends for new sessions.
pub trait BackendProvider {
    type Backend: PlaybackBackend + 'static;

    fn is_supported(&self) -> bool;

    /// `None` when no playback path is available on this host.
    fn create(&self) -> Option<Self::Backend>;
}

fn command_available(program: &str, version_flag: &str) -> bool {
    Command::new(program)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Backend chosen for a session on this host.
pub enum Engine {
    Mpv(MpvBackend),
    Ffplay(FfplayBackend),
}

impl PlaybackBackend for Engine {
    fn kind(&self) -> BackendKind {
        match self {
            Engine::Mpv(b) => b.kind(),
            Engine::Ffplay(b) => b.kind(),
        }
    }

    async fn attach(&mut self, source: &str) -> Result<()> {
        match self {
            Engine::Mpv(b) => b.attach(source).await,
            Engine::Ffplay(b) => b.attach(source).await,
        }
    }

    async fn play(&mut self) -> Result<()> {
        match self {
            Engine::Mpv(b) => b.play().await,
            Engine::Ffplay(b) => b.play().await,
        }
    }

    async fn set_pip(&mut self, enabled: bool) -> Result<()> {
        match self {
            Engine::Mpv(b) => b.set_pip(enabled).await,
            Engine::Ffplay(b) => b.set_pip(enabled).await,
        }
    }

    async fn stop(&mut self) -> Result<()> {
        match self {
            Engine::Mpv(b) => b.stop().await,
            Engine::Ffplay(b) => b.stop().await,
        }
    }

    async fn is_alive(&mut self) -> bool {
        match self {
            Engine::Mpv(b) => b.is_alive().await,
            Engine::Ffplay(b) => b.is_alive().await,
        }
    }
}

/// Capability detection for the players installed on this machine.
#[derive(Debug, Clone)]
pub struct HostPlayers {
    config: PlayerConfig,
    kind: Option<BackendKind>,
}

impl HostPlayers {
    pub fn detect(config: &PlayerConfig) -> Self {
        let mpv = || command_available("mpv", "--version");
        let ffplay = || command_available("ffplay", "-version");

        let kind = match config.preference {
            PlayerPreference::Mpv => mpv().then_some(BackendKind::Adaptive),
            PlayerPreference::Ffplay => ffplay().then_some(BackendKind::Direct),
            PlayerPreference::Auto => {
                if mpv() {
                    Some(BackendKind::Adaptive)
                } else if ffplay() {
                    Some(BackendKind::Direct)
                } else {
                    None
                }
            }
        };

        match kind {
            Some(kind) => debug!("{} detected and will be used for playback", kind),
            None => debug!("No supported player found (tried mpv and ffplay)"),
        }

        Self {
            config: config.clone(),
            kind,
        }
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.kind
    }
}

impl BackendProvider for HostPlayers {
    type Backend = Engine;

    fn is_supported(&self) -> bool {
        self.kind.is_some()
    }

    fn create(&self) -> Option<Engine> {
        match self.kind? {
            BackendKind::Adaptive => {
                Some(Engine::Mpv(MpvBackend::new(self.config.mpv_args.clone())))
            }
            BackendKind::Direct => Some(Engine::Ffplay(FfplayBackend::new())),
        }
    }
}
