//! Screen capture via an external tool
//!
//! Capture runs as a separate process (e.g. `wf-recorder`, `ffmpeg`). We
//! launch it on the user's `present start` and kill it when the
//! presentation ends. A missing command or a failed spawn is a local
//! capture error; nobody else is told.

use std::process::{Child, Command, Stdio};

use chrono::{DateTime, Utc};
use lectern_core::config::CaptureConfig;
use lectern_core::{Error, Result, ScreenCapture, UserGesture};

/// Status of the capture process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Never started or stopped by us
    Idle,
    /// Process is running
    Running,
    /// Process has exited on its own
    Exited,
}

/// External capture process
pub struct ExternalCapture {
    command: Option<String>,
    args: Vec<String>,
    child: Option<Child>,
    started_at: Option<DateTime<Utc>>,
}

impl ExternalCapture {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            child: None,
            started_at: None,
        }
    }

    /// Get current status (updates from process state)
    pub fn status(&mut self) -> CaptureStatus {
        let Some(child) = self.child.as_mut() else {
            return CaptureStatus::Idle;
        };
        match child.try_wait() {
            Ok(None) => CaptureStatus::Running,
            Ok(Some(_)) | Err(_) => {
                self.child = None;
                CaptureStatus::Exited
            }
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get a display-friendly summary
    pub fn display_command(&self) -> String {
        match &self.command {
            None => "(none)".to_string(),
            Some(command) if self.args.is_empty() => command.clone(),
            Some(command) => format!("{} {}", command, self.args.join(" ")),
        }
    }
}

impl ScreenCapture for ExternalCapture {
    fn start(&mut self, _gesture: &UserGesture) -> Result<()> {
        if self.status() == CaptureStatus::Running {
            return Ok(());
        }

        let command = self
            .command
            .as_deref()
            .ok_or_else(|| Error::Capture("No capture command configured".into()))?;

        let child = Command::new(command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                tracing::warn!(command = %command, error = %e, "Failed to launch capture tool");
                Error::Capture(format!("Failed to launch {}: {}", command, e))
            })?;

        tracing::info!(command = %command, pid = child.id(), "Screen capture started");
        self.child = Some(child);
        self.started_at = Some(Utc::now());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "Capture tool already gone");
            }
            let _ = child.wait();
            tracing::info!("Screen capture stopped");
        }
        self.started_at = None;
    }
}

impl Drop for ExternalCapture {
    fn drop(&mut self) {
        // capture must not outlive the session
        self.stop();
    }
}
