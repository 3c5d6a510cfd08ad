use std::path::Path;

use crate::config::GlobalSettings;
use crate::error::Result;
use crate::launcher::TerminalLauncher;
use crate::session::{RecentSessions, Session};
use crate::ssh::{effective_x11, CommandBuilder, KeyResolver};

/// Turns a chosen session into a launched command
pub struct Dispatcher<'a> {
    settings: &'a GlobalSettings,
    launcher: &'a dyn TerminalLauncher,
    recent: &'a mut RecentSessions,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        settings: &'a GlobalSettings,
        launcher: &'a dyn TerminalLauncher,
        recent: &'a mut RecentSessions,
    ) -> Self {
        Self {
            settings,
            launcher,
            recent,
        }
    }

    /// The ssh command for `session`, with key permissions enforced
    pub fn preview_connect(&self, session: &Session, remote_command: Option<&str>) -> String {
        let key = KeyResolver::new(self.settings).resolve_and_secure(session);
        CommandBuilder::for_session(session, &key)
            .ssh(effective_x11(session, self.settings), remote_command)
    }

    pub fn preview_transfer(&self, session: &Session, local_path: &Path) -> String {
        let key = KeyResolver::new(self.settings).resolve_and_secure(session);
        CommandBuilder::for_session(session, &key).scp(local_path)
    }

    /// Launch ssh and record the session as most recently used. A launch
    /// failure leaves the recent list alone; a non-zero status from the
    /// remote shell is not a launch failure.
    pub async fn connect(&mut self, session: &Session, remote_command: Option<&str>) -> Result<String> {
        let command = self.preview_connect(session, remote_command);
        tracing::info!("Connecting to {}", session.friendlyname);
        self.launcher.run(&command).await?;

        if let Err(e) = self.recent.touch(session).await {
            tracing::warn!("Failed to update recent sessions: {}", e);
        }
        Ok(command)
    }

    /// Copy `local_path` into the remote home directory
    pub async fn transfer(&mut self, session: &Session, local_path: &Path) -> Result<String> {
        let command = self.preview_transfer(session, local_path);
        tracing::info!("Copying {} to {}", local_path.display(), session.friendlyname);
        self.launcher.run(&command).await?;
        Ok(command)
    }
}
