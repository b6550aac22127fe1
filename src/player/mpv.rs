// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use super::{BackendKind, PlaybackBackend};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);
static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

const SOCKET_POLL_ATTEMPTS: u32 = 20;
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(500);
const OPEN_POLL_ATTEMPTS: u32 = 60;
const OPEN_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PIP_WINDOW_SCALE: f64 = 0.4;
const IPC_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// A private mpv process driven over its JSON IPC socket. mpv (through
/// ffmpeg) takes care of manifest parsing, variant selection and buffering.
pub struct MpvBackend {
    socket_path: PathBuf,
    process: Option<Child>,
    extra_args: Vec<String>,
    last_exit_status: Option<ExitStatus>,
}

impl MpvBackend {
    pub fn new(extra_args: Vec<String>) -> Self {
        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        Self {
            socket_path: Self::socket_path(instance),
            process: None,
            extra_args,
            last_exit_status: None,
        }
    }

    /// Socket path that is user-, process- and session-specific.
    fn socket_path(instance: u64) -> PathBuf {
        let socket_name = format!("mpv-{}-{}.sock", std::process::id(), instance);

        let state_dir = std::env::var("XDG_STATE_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(dirs::state_dir)
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")));

        let Some(state_dir) = state_dir else {
            return Self::temp_socket_path(&socket_name);
        };

        let app_dir = state_dir.join("tvgrid");
        if !app_dir.exists() {
            if let Err(e) = fs::create_dir_all(&app_dir) {
                warn!("Failed to create state directory: {}", e);
                return Self::temp_socket_path(&socket_name);
            }
            if let Err(e) = fs::set_permissions(&app_dir, fs::Permissions::from_mode(0o700)) {
                warn!("Failed to set permissions on state directory: {}", e);
            }
        }

        app_dir.join(socket_name)
    }

    fn temp_socket_path(socket_name: &str) -> PathBuf {
        let uid = unsafe { libc::getuid() };
        std::env::temp_dir().join(format!("tvgrid-{}-{}", uid, socket_name))
    }

    async fn send_command(&self, command: &[Value]) -> Result<Value> {
        let mut socket = UnixStream::connect(&self.socket_path).await.with_context(|| {
            format!("Failed to connect to mpv socket at {:?}", self.socket_path)
        })?;
        let (reader, mut writer) = socket.split();

        let request_id = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        let request = json!({ "command": command, "request_id": request_id });
        let mut request_str = serde_json::to_string(&request)?;
        debug!("Sending mpv command: {}", request_str);
        request_str.push('\n');
        writer.write_all(request_str.as_bytes()).await?;

        // mpv interleaves event messages with replies on the same socket
        let mut reader = tokio::io::BufReader::new(reader);
        loop {
            let mut line = String::new();
            let read = timeout(IPC_REPLY_TIMEOUT, reader.read_line(&mut line))
                .await
                .context("Timed out waiting for mpv reply")??;
            if read == 0 {
                anyhow::bail!("mpv closed the IPC connection");
            }

            let parsed: Value = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse mpv response: {}", line))?;
            if parsed.get("request_id").and_then(Value::as_u64) != Some(request_id) {
                continue;
            }

            if let Some(error) = parsed.get("error").and_then(Value::as_str)
                && error != "success"
            {
                anyhow::bail!("mpv command failed: {}", error);
            }
            return Ok(parsed);
        }
    }

    async fn is_socket_ready(&self) -> bool {
        self.socket_path.exists()
            && self
                .send_command(&[json!("get_property"), json!("mpv-version")])
                .await
                .is_ok()
    }

    async fn launch(&mut self) -> Result<()> {
        if self.socket_path.exists() {
            let _ = fs::remove_file(&self.socket_path);
        }

        let mut cmd = Command::new("mpv");
        cmd.arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg("--no-terminal")
            .arg("--really-quiet")
            .arg("--osc=yes")
            .arg("--osd-bar=yes")
            .arg("--title=tvgrid")
            .arg("--geometry=1280x720")
            .arg("--autofit-larger=90%x90%")
            .args(&self.extra_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        debug!("mpv command: {:?}", cmd);
        let mut child = cmd
            .spawn()
            .context("Failed to start mpv. Is mpv installed?")?;

        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines().map_while(Result::ok) {
                    debug!("mpv stdout: {}", line);
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    if line.contains("error") || line.contains("ERROR") {
                        warn!("mpv stderr: {}", line);
                    } else {
                        debug!("mpv stderr: {}", line);
                    }
                }
            });
        }

        self.process = Some(child);

        for attempt in 1..=SOCKET_POLL_ATTEMPTS {
            sleep(SOCKET_POLL_INTERVAL).await;

            if let Some(process) = self.process.as_mut()
                && let Ok(Some(status)) = process.try_wait()
            {
                self.last_exit_status = Some(status);
                self.process = None;
                error!("mpv exited unexpectedly with status: {:?}", status);
                anyhow::bail!("mpv exited unexpectedly with status: {:?}", status);
            }

            if self.is_socket_ready().await {
                debug!("mpv IPC socket ready after {} attempts", attempt);
                return Ok(());
            }
        }

        anyhow::bail!(
            "mpv IPC socket not ready after {} seconds",
            (SOCKET_POLL_INTERVAL * SOCKET_POLL_ATTEMPTS).as_secs()
        )
    }

    pub fn last_exit_status(&self) -> Option<ExitStatus> {
        self.last_exit_status
    }

    fn release(&mut self) {
        if let Some(mut child) = self.process.take() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.last_exit_status = Some(status);
                }
                _ => {
                    debug!("Terminating mpv process");
                    let _ = child.kill();
                    if let Ok(status) = child.wait() {
                        self.last_exit_status = Some(status);
                    }
                }
            }
        }

        if self.socket_path.exists() {
            let _ = fs::remove_file(&self.socket_path);
        }
    }
}

impl PlaybackBackend for MpvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Adaptive
    }

    async fn attach(&mut self, source: &str) -> Result<()> {
        if self.process.is_none() || !self.is_socket_ready().await {
            self.launch().await?;
        }

        debug!("Attaching source to mpv: {}", source);
        self.send_command(&[json!("loadfile"), json!(source), json!("replace")])
            .await
            .with_context(|| format!("Failed to load {}", source))?;
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        for _ in 0..OPEN_POLL_ATTEMPTS {
            if !self.is_alive().await {
                anyhow::bail!("mpv exited before the stream opened");
            }

            // file-format becomes available once the demuxer has parsed the stream
            if self
                .send_command(&[json!("get_property"), json!("file-format")])
                .await
                .is_ok()
            {
                self.send_command(&[json!("set_property"), json!("pause"), json!(false)])
                    .await?;
                debug!("mpv opened the stream, playback running");
                return Ok(());
            }

            sleep(OPEN_POLL_INTERVAL).await;
        }

        anyhow::bail!(
            "Stream did not open within {} seconds",
            (OPEN_POLL_INTERVAL * OPEN_POLL_ATTEMPTS).as_secs()
        )
    }

    async fn set_pip(&mut self, enabled: bool) -> Result<()> {
        let scale = if enabled { PIP_WINDOW_SCALE } else { 1.0 };
        self.send_command(&[json!("set_property"), json!("ontop"), json!(enabled)])
            .await
            .context("Failed to change always-on-top state")?;
        self.send_command(&[json!("set_property"), json!("window-scale"), json!(scale)])
            .await
            .context("Failed to resize player window")?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        debug!("Stopping mpv session");

        if self.process.is_some() && self.socket_path.exists() {
            let _ = self.send_command(&[json!("stop")]).await;
            let _ = self.send_command(&[json!("playlist-clear")]).await;
            let _ = self.send_command(&[json!("quit")]).await;
        }

        self.release();
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        let Some(process) = self.process.as_mut() else {
            return false;
        };

        match process.try_wait() {
            Ok(Some(status)) => {
                debug!("mpv process has exited with status: {:?}", status);
                self.last_exit_status = Some(status);
                self.process = None;
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to check mpv process status: {}", e);
                false
            }
        }
    }
}

impl Drop for MpvBackend {
    fn drop(&mut self) {
        self.release();
    }
}
