// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::{BackendKind, PlaybackBackend};

/// Grace period after spawning before the stream is considered open.
const STARTUP_GRACE: Duration = Duration::from_millis(750);

/// Direct-source fallback: ffplay opens the URL itself and has no remote
/// control channel, so picture-in-picture is unavailable.
#[derive(Default)]
pub struct FfplayBackend {
    process: Option<Child>,
}

impl FfplayBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn kill(&mut self) {
        if let Some(mut process) = self.process.take() {
            debug!("Stopping ffplay process");
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

impl PlaybackBackend for FfplayBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    async fn attach(&mut self, source: &str) -> Result<()> {
        self.kill();

        debug!("Starting ffplay with URL: {}", source);
        let child = Command::new("ffplay")
            .arg(source)
            .arg("-window_title")
            .arg("tvgrid (ffplay)")
            .arg("-x")
            .arg("1280")
            .arg("-y")
            .arg("720")
            .arg("-autoexit")
            .arg("-infbuf")
            .arg("-loglevel")
            .arg("quiet")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .context("Failed to start ffplay")?;

        self.process = Some(child);
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        sleep(STARTUP_GRACE).await;
        if !self.is_alive().await {
            anyhow::bail!("ffplay exited before playback started");
        }
        Ok(())
    }

    async fn set_pip(&mut self, _enabled: bool) -> Result<()> {
        anyhow::bail!("Picture-in-picture is not supported by ffplay")
    }

    async fn stop(&mut self) -> Result<()> {
        self.kill();
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        match self.process.as_mut().map(|p| p.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                self.process = None;
                false
            }
            None => false,
        }
    }
}

impl Drop for FfplayBackend {
    fn drop(&mut self) {
        self.kill();
    }
}
