// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Lifecycle of the single active playback session.
//!
//! `Idle -> Starting -> Playing -> Stopped -> Idle`. A start first tears down
//! the previous session, including a start that is still in flight, so two
//! backends never coexist. The in-flight start is owned here and polled
//! through [`SessionManager::started`], which lets the caller keep handling
//! input while the player opens the stream.

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::player::{BackendProvider, PlaybackBackend};

pub type SessionId = u64;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no playback backend is available on this host")]
    Unsupported,
    #[error("failed to play {url}: {reason}")]
    Start { url: String, reason: String },
    #[error("no active playback session")]
    NoSession,
    #[error("picture-in-picture failed: {0}")]
    Pip(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Playing,
    Stopped,
}

struct ActiveSession<B> {
    id: SessionId,
    source: String,
    backend: B,
    pip: bool,
}

/// Result of attaching and opening a source on a fresh backend. A failed
/// attempt has already released its backend.
struct StartOutcome<B> {
    id: SessionId,
    source: String,
    result: Result<B, String>,
}

async fn open_session<B: PlaybackBackend>(
    id: SessionId,
    source: String,
    mut backend: B,
) -> StartOutcome<B> {
    let opened = match backend.attach(&source).await {
        Ok(()) => backend.play().await,
        Err(e) => Err(e),
    };

    let result = match opened {
        Ok(()) => Ok(backend),
        Err(e) => {
            warn!("Session {} failed to start: {:#}", id, e);
            if let Err(stop_err) = backend.stop().await {
                warn!("Failed to release backend of session {}: {:#}", id, stop_err);
            }
            Err(format!("{:#}", e))
        }
    };
    StartOutcome { id, source, result }
}

pub struct SessionManager<P: BackendProvider> {
    provider: P,
    active: Option<ActiveSession<P::Backend>>,
    pending: Option<LocalBoxFuture<'static, StartOutcome<P::Backend>>>,
    state: SessionState,
    next_id: SessionId,
}

impl<P: BackendProvider> SessionManager<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            active: None,
            pending: None,
            state: SessionState::Idle,
            next_id: 1,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_starting(&self) -> bool {
        self.pending.is_some()
    }

    /// Tears down the current session, creates a fresh backend and queues
    /// the attach of `source` on it. The outcome arrives through
    /// [`started`](Self::started).
    pub async fn request_start(&mut self, source: &str) -> Result<SessionId, PlaybackError> {
        self.teardown().await;

        if !self.provider.is_supported() {
            debug!("Playback unsupported on this host, ignoring {}", source);
            return Err(PlaybackError::Unsupported);
        }
        let Some(backend) = self.provider.create() else {
            return Err(PlaybackError::Unsupported);
        };

        let id = self.next_id;
        self.next_id += 1;
        self.state = SessionState::Starting;
        debug!("Session {} starting on {} with {}", id, backend.kind(), source);

        self.pending = Some(open_session(id, source.to_string(), backend).boxed_local());
        Ok(id)
    }

    /// Resolves when the in-flight start finishes. Never resolves while no
    /// start is in flight. Dropping the returned future keeps the start
    /// queued.
    pub async fn started(&mut self) -> Result<SessionId, PlaybackError> {
        let Some(pending) = self.pending.as_mut() else {
            return std::future::pending().await;
        };
        let outcome = pending.await;
        self.pending = None;
        self.finish(outcome)
    }

    /// Starts `source` and waits until it plays or fails.
    pub async fn start(&mut self, source: &str) -> Result<SessionId, PlaybackError> {
        self.request_start(source).await?;
        self.started().await
    }

    fn finish(&mut self, outcome: StartOutcome<P::Backend>) -> Result<SessionId, PlaybackError> {
        let StartOutcome { id, source, result } = outcome;
        match result {
            Ok(backend) => {
                info!("Session {} playing {}", id, source);
                self.active = Some(ActiveSession {
                    id,
                    source,
                    backend,
                    pip: false,
                });
                self.state = SessionState::Playing;
                Ok(id)
            }
            Err(reason) => {
                self.state = SessionState::Idle;
                Err(PlaybackError::Start {
                    url: source,
                    reason,
                })
            }
        }
    }

    /// Returns whether a session was running or starting.
    pub async fn stop(&mut self) -> bool {
        let was_active = self.active.is_some() || self.pending.is_some();
        self.teardown().await;
        was_active
    }

    /// Flips picture-in-picture on the active session and returns the new mode.
    pub async fn toggle_pip(&mut self) -> Result<bool, PlaybackError> {
        let session = self.active.as_mut().ok_or(PlaybackError::NoSession)?;
        let enabled = !session.pip;
        session
            .backend
            .set_pip(enabled)
            .await
            .map_err(|e| PlaybackError::Pip(format!("{:#}", e)))?;
        session.pip = enabled;
        Ok(enabled)
    }

    /// Releases a session whose player went away on its own. Returns `false`
    /// in that case, `true` while the active session is still running.
    pub async fn check_alive(&mut self) -> bool {
        let Some(session) = self.active.as_mut() else {
            return false;
        };
        if session.backend.is_alive().await {
            return true;
        }
        info!("Player of session {} exited", session.id);
        self.teardown().await;
        false
    }

    pub async fn shutdown(&mut self) {
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        // Dropping the in-flight start drops its backend, which kills the player
        if self.pending.take().is_some() {
            debug!("Abandoning in-flight session start");
        }
        if let Some(mut session) = self.active.take() {
            self.state = SessionState::Stopped;
            debug!("Tearing down session {}", session.id);
            if let Err(e) = session.backend.stop().await {
                warn!("Failed to stop session {}: {:#}", session.id, e);
            }
        }
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::BackendKind;
    use anyhow::Result;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Ledger {
        events: Vec<String>,
        live: usize,
        created: usize,
        fail_on: Option<String>,
    }

    struct FakeBackend {
        n: usize,
        ledger: Arc<Mutex<Ledger>>,
        source: Option<String>,
        released: bool,
    }

    impl FakeBackend {
        fn log(&self, event: String) {
            self.ledger.lock().unwrap().events.push(event);
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.ledger.lock().unwrap().live -= 1;
            }
        }
    }

    impl PlaybackBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Adaptive
        }

        async fn attach(&mut self, source: &str) -> Result<()> {
            self.log(format!("attach#{} {}", self.n, source));
            if self.ledger.lock().unwrap().fail_on.as_deref() == Some(source) {
                anyhow::bail!("manifest 404");
            }
            self.source = Some(source.to_string());
            Ok(())
        }

        async fn play(&mut self) -> Result<()> {
            self.log(format!("play#{}", self.n));
            Ok(())
        }

        async fn set_pip(&mut self, enabled: bool) -> Result<()> {
            self.log(format!("pip#{} {}", self.n, enabled));
            Ok(())
        }

        async fn stop(&mut self) -> Result<()> {
            self.log(format!("stop#{}", self.n));
            self.source = None;
            self.release();
            Ok(())
        }

        async fn is_alive(&mut self) -> bool {
            !self.released
        }
    }

    impl Drop for FakeBackend {
        fn drop(&mut self) {
            self.release();
        }
    }

    struct FakeProvider {
        supported: bool,
        ledger: Arc<Mutex<Ledger>>,
    }

    impl BackendProvider for FakeProvider {
        type Backend = FakeBackend;

        fn is_supported(&self) -> bool {
            self.supported
        }

        fn create(&self) -> Option<FakeBackend> {
            let mut ledger = self.ledger.lock().unwrap();
            ledger.created += 1;
            ledger.live += 1;
            let n = ledger.created;
            ledger.events.push(format!("create#{}", n));
            Some(FakeBackend {
                n,
                ledger: Arc::clone(&self.ledger),
                source: None,
                released: false,
            })
        }
    }

    fn manager(supported: bool) -> (SessionManager<FakeProvider>, Arc<Mutex<Ledger>>) {
        let ledger = Arc::new(Mutex::new(Ledger::default()));
        let provider = FakeProvider {
            supported,
            ledger: Arc::clone(&ledger),
        };
        (SessionManager::new(provider), ledger)
    }

    fn active_id(sessions: &SessionManager<FakeProvider>) -> Option<SessionId> {
        sessions.active.as_ref().map(|s| s.id)
    }

    fn active_source(sessions: &SessionManager<FakeProvider>) -> Option<&str> {
        sessions.active.as_ref().map(|s| s.source.as_str())
    }

    #[tokio::test]
    async fn switching_channels_releases_previous_session_first() {
        let (mut sessions, ledger) = manager(true);

        sessions.start("http://x/a.m3u8").await.unwrap();
        sessions.start("http://x/b.m3u8").await.unwrap();

        assert_eq!(sessions.state(), SessionState::Playing);
        assert_eq!(active_source(&sessions), Some("http://x/b.m3u8"));
        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.live, 1);
        assert_eq!(
            ledger.events,
            vec![
                "create#1",
                "attach#1 http://x/a.m3u8",
                "play#1",
                "stop#1",
                "create#2",
                "attach#2 http://x/b.m3u8",
                "play#2",
            ]
        );
    }

    #[tokio::test]
    async fn stop_returns_to_idle_and_restart_behaves_like_cold_start() {
        let (mut sessions, ledger) = manager(true);

        sessions.start("http://x/a.m3u8").await.unwrap();
        assert!(sessions.stop().await);
        assert_eq!(sessions.state(), SessionState::Idle);
        assert_eq!(active_id(&sessions), None);
        assert_eq!(active_source(&sessions), None);
        assert_eq!(ledger.lock().unwrap().live, 0);

        sessions.start("http://x/a.m3u8").await.unwrap();
        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.live, 1);
        assert_eq!(
            ledger.events[3..],
            ["create#2", "attach#2 http://x/a.m3u8", "play#2"]
        );
    }

    #[tokio::test]
    async fn stopping_when_idle_is_a_no_op() {
        let (mut sessions, ledger) = manager(true);
        assert!(!sessions.stop().await);
        assert!(ledger.lock().unwrap().events.is_empty());
    }

    #[tokio::test]
    async fn failed_start_releases_backend() {
        let (mut sessions, ledger) = manager(true);
        ledger.lock().unwrap().fail_on = Some("http://x/broken.m3u8".to_string());

        sessions.start("http://x/a.m3u8").await.unwrap();
        let err = sessions.start("http://x/broken.m3u8").await.unwrap_err();

        assert!(matches!(err, PlaybackError::Start { .. }));
        assert_eq!(sessions.state(), SessionState::Idle);
        assert_eq!(active_id(&sessions), None);
        assert_eq!(ledger.lock().unwrap().live, 0);
    }

    #[tokio::test]
    async fn unsupported_host_never_creates_a_backend() {
        let (mut sessions, ledger) = manager(false);
        let err = sessions.start("http://x/a.m3u8").await.unwrap_err();
        assert!(matches!(err, PlaybackError::Unsupported));
        assert_eq!(sessions.state(), SessionState::Idle);
        assert_eq!(ledger.lock().unwrap().created, 0);
    }

    #[tokio::test]
    async fn pip_toggles_on_the_active_session() {
        let (mut sessions, _ledger) = manager(true);
        assert!(matches!(
            sessions.toggle_pip().await,
            Err(PlaybackError::NoSession)
        ));

        sessions.start("http://x/a.m3u8").await.unwrap();
        assert!(sessions.toggle_pip().await.unwrap());
        assert!(!sessions.toggle_pip().await.unwrap());
    }

    #[tokio::test]
    async fn exited_player_is_released_on_check() {
        let (mut sessions, ledger) = manager(true);
        sessions.start("http://x/a.m3u8").await.unwrap();
        assert!(sessions.check_alive().await);

        // Simulate the player window being closed by the user
        if let Some(session) = sessions.active.as_mut() {
            session.backend.release();
        }
        assert!(!sessions.check_alive().await);
        assert_eq!(sessions.state(), SessionState::Idle);
        assert_eq!(ledger.lock().unwrap().live, 0);
    }

    #[tokio::test]
    async fn new_request_abandons_an_unfinished_start() {
        let (mut sessions, ledger) = manager(true);

        let first = sessions.request_start("http://x/a.m3u8").await.unwrap();
        assert_eq!(sessions.state(), SessionState::Starting);
        let second = sessions.request_start("http://x/b.m3u8").await.unwrap();
        assert_ne!(first, second);
        {
            let ledger = ledger.lock().unwrap();
            assert_eq!(ledger.created, 2);
            assert_eq!(ledger.live, 1);
        }

        assert_eq!(sessions.started().await.unwrap(), second);
        assert_eq!(active_source(&sessions), Some("http://x/b.m3u8"));
        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.live, 1);
        assert!(!ledger.events.iter().any(|e| e.starts_with("attach#1")));
    }

    #[tokio::test]
    async fn stop_while_starting_discards_the_start() {
        let (mut sessions, ledger) = manager(true);

        sessions.request_start("http://x/a.m3u8").await.unwrap();
        assert!(sessions.is_starting());
        assert!(sessions.stop().await);

        assert!(!sessions.is_starting());
        assert_eq!(sessions.state(), SessionState::Idle);
        assert_eq!(ledger.lock().unwrap().live, 0);
        let waited = tokio::time::timeout(Duration::from_millis(50), sessions.started()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn dropped_wait_keeps_the_start_queued() {
        let (mut sessions, _ledger) = manager(true);

        let id = sessions.request_start("http://x/a.m3u8").await.unwrap();
        drop(sessions.started());
        assert!(sessions.is_starting());
        assert_eq!(sessions.started().await.unwrap(), id);
        assert_eq!(sessions.state(), SessionState::Playing);
    }
}
