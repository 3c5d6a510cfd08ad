//! Interactive input. Everything a mutation needs is gathered first; a
//! cancelled prompt aborts with [`Error::Cancelled`] before any state changes.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::config::GlobalSettings;
use crate::error::{Error, Result};
use crate::session::SessionUpdate;
use crate::ssh::KeyPolicy;

/// Typing this on its own cancels the current operation
pub const CANCEL_INPUT: &str = ".";

#[async_trait]
pub trait PromptService: Send + Sync {
    /// `None` means the user cancelled
    async fn ask(&self, message: &str, default: &str) -> Option<String>;
}

/// Asks on stderr, reads answers line by line from stdin
pub struct StdinPrompt {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptService for StdinPrompt {
    async fn ask(&self, message: &str, default: &str) -> Option<String> {
        let question = if default.is_empty() {
            format!("{message}: ")
        } else {
            format!("{message} [{default}]: ")
        };
        let mut stderr = tokio::io::stderr();
        let _ = stderr.write_all(question.as_bytes()).await;
        let _ = stderr.flush().await;

        let line = match self.lines.lock().await.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read answer: {}", e);
                return None;
            }
        };

        interpret_answer(&line, default)
    }
}

fn interpret_answer(line: &str, default: &str) -> Option<String> {
    let answer = line.trim();
    if answer == CANCEL_INPUT {
        None
    } else if answer.is_empty() {
        Some(default.to_string())
    } else {
        Some(answer.to_string())
    }
}

async fn ask(prompt: &dyn PromptService, message: &str, default: &str) -> Result<String> {
    prompt.ask(message, default).await.ok_or(Error::Cancelled)
}

async fn ask_bool(prompt: &dyn PromptService, message: &str, default: bool) -> Result<bool> {
    let default = if default { "y" } else { "n" };
    loop {
        let answer = ask(prompt, message, default).await?;
        match answer.to_lowercase().as_str() {
            "y" | "yes" | "true" => return Ok(true),
            "n" | "no" | "false" => return Ok(false),
            _ => tracing::warn!("Please answer y or n"),
        }
    }
}

/// Per-session X11 choice: `y`, `n`, or `default` to follow the global setting
async fn ask_x11_override(
    prompt: &dyn PromptService,
    current: Option<bool>,
) -> Result<Option<bool>> {
    let default = match current {
        Some(true) => "y",
        Some(false) => "n",
        None => "default",
    };
    loop {
        let answer = ask(prompt, "X11 forwarding (y/n/default)", default).await?;
        match answer.to_lowercase().as_str() {
            "y" | "yes" => return Ok(Some(true)),
            "n" | "no" => return Ok(Some(false)),
            "default" | "d" | "global" => return Ok(None),
            _ => tracing::warn!("Please answer y, n or default"),
        }
    }
}

/// Ask for every field of a new session, filling in whatever was not
/// already supplied.
pub async fn collect_new_session(
    prompt: &dyn PromptService,
    preset: PartialSession,
) -> Result<SessionUpdate> {
    let friendlyname = match preset.friendlyname {
        Some(v) => v,
        None => ask(prompt, "Enter Friendly Name", "").await?,
    };
    let connection_string = match preset.connection_string {
        Some(v) => v,
        None => ask(prompt, "Enter Connection String", "").await?,
    };
    let category = match preset.category {
        Some(v) => v,
        None => ask(prompt, "Enter Category", "").await?,
    };
    let ssh_key_path = match preset.ssh_key_path {
        Some(v) => v,
        None => ask(prompt, "Enter SSH Key Path (use 'none' for no key)", "none")
            .await?
            .into(),
    };

    Ok(SessionUpdate {
        friendlyname,
        connection_string,
        category,
        ssh_key_path,
        x11_forward: preset.x11_forward,
    })
}

/// Ask for every field of an existing session, defaulting to its current values
pub async fn collect_update(
    prompt: &dyn PromptService,
    current: &SessionUpdate,
) -> Result<SessionUpdate> {
    let friendlyname = ask(prompt, "Edit Friendly Name", &current.friendlyname).await?;
    let connection_string =
        ask(prompt, "Edit Connection String", &current.connection_string).await?;
    let category = ask(prompt, "Edit Category", &current.category).await?;
    let key = ask(
        prompt,
        "Edit SSH Key Path (use 'none' for no key)",
        current.ssh_key_path.as_str(),
    )
    .await?;
    let x11_forward = ask_x11_override(prompt, current.x11_forward).await?;

    Ok(SessionUpdate {
        friendlyname,
        connection_string,
        category,
        ssh_key_path: KeyPolicy::parse(&key),
        x11_forward,
    })
}

/// Ask for the global key and X11 default
pub async fn collect_settings(
    prompt: &dyn PromptService,
    current: &GlobalSettings,
) -> Result<GlobalSettings> {
    let ssh_key = ask(prompt, "Enter the path to your SSH key", &current.ssh_key).await?;
    let x11_forward = ask_bool(prompt, "Enable X11 Forwarding? (y/n)", current.x11_forward).await?;

    Ok(GlobalSettings {
        ssh_key,
        x11_forward,
        terminal: current.terminal,
    })
}

/// Session fields already known before prompting
#[derive(Debug, Clone, Default)]
pub struct PartialSession {
    pub friendlyname: Option<String>,
    pub connection_string: Option<String>,
    pub category: Option<String>,
    pub ssh_key_path: Option<KeyPolicy>,
    pub x11_forward: Option<bool>,
}

impl PartialSession {
    pub fn has_any_field(&self) -> bool {
        self.friendlyname.is_some()
            || self.connection_string.is_some()
            || self.category.is_some()
            || self.ssh_key_path.is_some()
            || self.x11_forward.is_some()
    }

    /// Overlay the given fields on `base`
    pub fn merged_onto(self, base: &SessionUpdate) -> SessionUpdate {
        SessionUpdate {
            friendlyname: self
                .friendlyname
                .unwrap_or_else(|| base.friendlyname.clone()),
            connection_string: self
                .connection_string
                .unwrap_or_else(|| base.connection_string.clone()),
            category: self.category.unwrap_or_else(|| base.category.clone()),
            ssh_key_path: self
                .ssh_key_path
                .unwrap_or_else(|| base.ssh_key_path.clone()),
            x11_forward: self.x11_forward.or(base.x11_forward),
        }
    }
}

/// Chooses the local file for a transfer
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// `Ok(None)` when the user backs out
    async fn choose(&self) -> Result<Option<PathBuf>>;
}

/// Asks for a path through a [`PromptService`]
pub struct PromptFilePicker<'a> {
    prompt: &'a dyn PromptService,
}

impl<'a> PromptFilePicker<'a> {
    pub fn new(prompt: &'a dyn PromptService) -> Self {
        Self { prompt }
    }
}

#[async_trait]
impl<'a> FilePicker for PromptFilePicker<'a> {
    async fn choose(&self) -> Result<Option<PathBuf>> {
        let Some(answer) = self.prompt.ask("File to upload", "").await else {
            return Ok(None);
        };
        if answer.trim().is_empty() {
            return Ok(None);
        }

        let path = PathBuf::from(answer.trim());
        if !path.is_file() {
            return Err(Error::validation(format!(
                "Not a file: {}",
                path.display()
            )));
        }
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;

    /// Replays canned answers; `None` entries simulate a cancelled dialog.
    struct ScriptedPrompt {
        answers: SyncMutex<VecDeque<Option<String>>>,
        asked: SyncMutex<Vec<(String, String)>>,
    }

    impl ScriptedPrompt {
        fn new(answers: &[Option<&str>]) -> Self {
            Self {
                answers: SyncMutex::new(
                    answers.iter().map(|a| a.map(|s| s.to_string())).collect(),
                ),
                asked: SyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PromptService for ScriptedPrompt {
        async fn ask(&self, message: &str, default: &str) -> Option<String> {
            self.asked
                .lock()
                .push((message.to_string(), default.to_string()));
            self.answers.lock().pop_front().flatten()
        }
    }

    #[test]
    fn test_interpret_answer() {
        assert_eq!(interpret_answer("  web ", "x"), Some("web".to_string()));
        assert_eq!(interpret_answer("", "x"), Some("x".to_string()));
        assert_eq!(interpret_answer(".", "x"), None);
    }

    #[tokio::test]
    async fn test_collect_new_session() {
        let prompt = ScriptedPrompt::new(&[
            Some("db1"),
            Some("user@10.0.0.5"),
            Some("infra"),
            Some("global"),
        ]);
        let new = collect_new_session(&prompt, PartialSession::default())
            .await
            .unwrap();

        assert_eq!(new.friendlyname, "db1");
        assert_eq!(new.connection_string, "user@10.0.0.5");
        assert_eq!(new.category, "infra");
        assert_eq!(new.ssh_key_path, KeyPolicy::UseGlobal);
    }

    #[tokio::test]
    async fn test_collect_skips_preset_fields() {
        let prompt = ScriptedPrompt::new(&[Some("infra"), Some("")]);
        let preset = PartialSession {
            friendlyname: Some("db1".to_string()),
            connection_string: Some("user@db".to_string()),
            ..Default::default()
        };
        let new = collect_new_session(&prompt, preset).await.unwrap();

        assert_eq!(prompt.asked.lock().len(), 2);
        assert_eq!(new.category, "infra");
        // Empty key answer means "no key".
        assert_eq!(new.ssh_key_path, KeyPolicy::NoKey);
    }

    #[tokio::test]
    async fn test_cancel_aborts() {
        let prompt = ScriptedPrompt::new(&[Some("db1"), None]);
        let err = collect_new_session(&prompt, PartialSession::default())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(prompt.asked.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_update_uses_defaults() {
        let current = SessionUpdate::new("web", "root@web", "prod").with_key("/k/id");
        let prompt = ScriptedPrompt::new(&[
            Some("web"),
            Some("admin@web"),
            Some("prod"),
            Some("/k/id"),
            Some("y"),
        ]);

        let update = collect_update(&prompt, &current).await.unwrap();
        assert_eq!(update.connection_string, "admin@web");
        assert_eq!(update.ssh_key_path, KeyPolicy::Explicit("/k/id".to_string()));
        assert_eq!(update.x11_forward, Some(true));

        let asked = prompt.asked.lock();
        assert_eq!(asked[1], ("Edit Connection String".to_string(), "root@web".to_string()));
        assert_eq!(asked[4].1, "default");
    }

    #[tokio::test]
    async fn test_collect_settings_retries_bad_answer() {
        let prompt = ScriptedPrompt::new(&[Some("/home/u/.ssh/id_rsa"), Some("maybe"), Some("yes")]);
        let settings = collect_settings(&prompt, &GlobalSettings::default())
            .await
            .unwrap();
        assert_eq!(settings.ssh_key, "/home/u/.ssh/id_rsa");
        assert!(settings.x11_forward);
    }

    #[test]
    fn test_merged_onto() {
        let base = SessionUpdate::new("a", "b", "c").with_x11(Some(true));
        let partial = PartialSession {
            category: Some("d".to_string()),
            ..Default::default()
        };
        assert!(partial.has_any_field());

        let merged = partial.merged_onto(&base);
        assert_eq!(merged.category, "d");
        assert_eq!(merged.friendlyname, "a");
        assert_eq!(merged.x11_forward, Some(true));
    }

    #[tokio::test]
    async fn test_file_picker() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "x").unwrap();

        let prompt = ScriptedPrompt::new(&[Some(file.to_str().unwrap()), None]);
        let picker = PromptFilePicker::new(&prompt);
        assert_eq!(picker.choose().await.unwrap(), Some(file));
        assert_eq!(picker.choose().await.unwrap(), None);

        let prompt = ScriptedPrompt::new(&[Some(dir.path().to_str().unwrap())]);
        let picker = PromptFilePicker::new(&prompt);
        assert!(picker.choose().await.is_err());
    }
}
