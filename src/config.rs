use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::{load_json, save_json, Backend, StoreId};

/// Where connection commands are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    /// Run in the current terminal
    Inline,
    /// macOS Terminal.app
    Terminal,
    /// iTerm2
    Iterm,
}

impl TerminalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalKind::Inline => "inline",
            TerminalKind::Terminal => "terminal",
            TerminalKind::Iterm => "iterm",
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "inline" => Ok(TerminalKind::Inline),
            "terminal" | "terminal.app" => Ok(TerminalKind::Terminal),
            "iterm" | "iterm2" => Ok(TerminalKind::Iterm),
            other => Err(Error::config(format!(
                "Unknown terminal '{other}' (expected inline, terminal or iterm)"
            ))),
        }
    }
}

/// Process-wide defaults, persisted in the settings store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Key used by sessions whose key policy is "global"
    #[serde(default)]
    pub ssh_key: String,
    #[serde(default)]
    pub x11_forward: bool,
    /// Unset means detect from the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalKind>,
}

impl GlobalSettings {
    pub async fn load(backend: &dyn Backend) -> Self {
        load_json(backend, StoreId::Settings).await
    }

    pub async fn save(&self, backend: &dyn Backend) -> Result<()> {
        save_json(backend, StoreId::Settings, self).await
    }
}
