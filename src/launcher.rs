//! Running a built command somewhere the user can interact with it.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::TerminalKind;
use crate::error::{Error, Result};

const ITERM_APP: &str = "/Applications/iTerm.app";

/// Status ssh and scp exit with when they fail themselves
const SSH_FAILED: i32 = 255;
/// `sh` could not execute the command, or could not find it
const SHELL_CANNOT_EXEC: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

#[async_trait]
pub trait TerminalLauncher: Send + Sync {
    /// Execute `command`. Failures are reported once, never retried.
    async fn run(&self, command: &str) -> Result<()>;
}

/// Runs the command through `sh -c` in the current terminal.
///
/// Only an ssh/scp failure (255) or a command the shell cannot run counts as
/// a failed launch. Any other non-zero status is the remote side's and is
/// only logged.
#[derive(Debug, Default)]
pub struct InlineLauncher;

#[async_trait]
impl TerminalLauncher for InlineLauncher {
    async fn run(&self, command: &str) -> Result<()> {
        tracing::debug!("sh -c {}", command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await
            .map_err(|e| Error::external(format!("cannot start shell: {e}")))?;

        match status.code() {
            Some(0) => Ok(()),
            Some(SSH_FAILED | SHELL_CANNOT_EXEC | SHELL_NOT_FOUND) => {
                Err(Error::external(format!("`{command}` exited with {status}")))
            }
            _ => {
                tracing::info!("`{}` finished with {}", command, status);
                Ok(())
            }
        }
    }
}

/// Opens a new macOS terminal window through `osascript`
#[derive(Debug, Clone, Copy)]
pub struct AppleTerminalLauncher {
    kind: TerminalKind,
}

impl AppleTerminalLauncher {
    pub fn terminal() -> Self {
        Self {
            kind: TerminalKind::Terminal,
        }
    }

    pub fn iterm() -> Self {
        Self {
            kind: TerminalKind::Iterm,
        }
    }

    pub fn script(&self, command: &str) -> String {
        let command = applescript_string(command);
        match self.kind {
            TerminalKind::Iterm => format!(
                "tell application \"iTerm\"\n\
                 \tcreate window with default profile\n\
                 \ttell current session of current window\n\
                 \t\twrite text {command}\n\
                 \tend tell\n\
                 end tell"
            ),
            _ => format!(
                "tell application \"Terminal\"\n\
                 \tdo script {command}\n\
                 \tactivate\n\
                 end tell"
            ),
        }
    }
}

#[async_trait]
impl TerminalLauncher for AppleTerminalLauncher {
    async fn run(&self, command: &str) -> Result<()> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(self.script(command))
            .output()
            .await
            .map_err(|e| Error::external(format!("cannot run osascript: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::external(format!(
                "osascript failed ({}): {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

/// Quote `s` as an AppleScript string literal
fn applescript_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Pick a launcher: an explicit choice wins, otherwise iTerm when installed,
/// Terminal.app on other Macs and the current terminal everywhere else.
pub fn detect(preferred: Option<TerminalKind>) -> Box<dyn TerminalLauncher> {
    let kind = preferred.unwrap_or_else(default_kind);
    tracing::debug!("Using {} launcher", kind);
    match kind {
        TerminalKind::Inline => Box::new(InlineLauncher),
        TerminalKind::Terminal => Box::new(AppleTerminalLauncher::terminal()),
        TerminalKind::Iterm => Box::new(AppleTerminalLauncher::iterm()),
    }
}

fn default_kind() -> TerminalKind {
    if !cfg!(target_os = "macos") {
        TerminalKind::Inline
    } else if Path::new(ITERM_APP).exists() {
        TerminalKind::Iterm
    } else {
        TerminalKind::Terminal
    }
}
