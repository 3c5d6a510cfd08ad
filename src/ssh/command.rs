use std::path::Path;

use crate::config::GlobalSettings;
use crate::session::Session;

/// X11 forwarding for a session: its own override, else the global default.
pub fn effective_x11(session: &Session, settings: &GlobalSettings) -> bool {
    session.x11_forward.unwrap_or(settings.x11_forward)
}

/// Renders the shell command for one target.
///
/// Values are inserted as typed; nothing is escaped except that a remote
/// command is wrapped in single quotes. The result is meant for a shell, so
/// callers must not feed it untrusted input.
#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder<'a> {
    target: &'a str,
    key_path: &'a str,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(target: &'a str, key_path: &'a str) -> Self {
        Self { target, key_path }
    }

    pub fn for_session(session: &'a Session, key_path: &'a str) -> Self {
        Self::new(&session.connection_string, key_path)
    }

    /// `ssh [-i KEY] [-X] TARGET ['REMOTE']`
    pub fn ssh(&self, x11: bool, remote_command: Option<&str>) -> String {
        let mut cmd = String::from("ssh");
        self.push_identity(&mut cmd);

        if x11 {
            cmd.push_str(" -X");
        }

        cmd.push(' ');
        cmd.push_str(self.target);

        if let Some(remote) = remote_command.filter(|r| !r.is_empty()) {
            cmd.push_str(&format!(" '{}'", remote));
        }

        cmd
    }

    /// `scp [-i KEY] LOCAL TARGET:~/`
    pub fn scp(&self, local_path: &Path) -> String {
        let mut cmd = String::from("scp");
        self.push_identity(&mut cmd);
        cmd.push_str(&format!(" {} {}:~/", local_path.display(), self.target));
        cmd
    }

    fn push_identity(&self, cmd: &mut String) {
        if !self.key_path.is_empty() {
            cmd.push_str(" -i ");
            cmd.push_str(self.key_path);
        }
    }
}
