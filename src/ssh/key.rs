use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::GlobalSettings;
use crate::error::{Error, Result};
use crate::session::Session;

const NO_KEY: &str = "none";
const GLOBAL_KEY: &str = "global";

/// Which private key a session authenticates with.
///
/// Persisted as a plain string so older session files keep loading:
/// `"none"` (any case) or an empty string means no key, anything containing
/// `"global"` (any case) defers to the global key, everything else is a path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyPolicy {
    Explicit(String),
    #[default]
    NoKey,
    UseGlobal,
}

impl KeyPolicy {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_KEY) {
            KeyPolicy::NoKey
        } else if trimmed.to_lowercase().contains(GLOBAL_KEY) {
            KeyPolicy::UseGlobal
        } else {
            KeyPolicy::Explicit(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            KeyPolicy::Explicit(path) => path,
            KeyPolicy::NoKey => NO_KEY,
            KeyPolicy::UseGlobal => GLOBAL_KEY,
        }
    }
}

impl From<&str> for KeyPolicy {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for KeyPolicy {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<KeyPolicy> for String {
    fn from(policy: KeyPolicy) -> Self {
        policy.as_str().to_string()
    }
}

impl FromStr for KeyPolicy {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for KeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective key path for a policy. Empty means "pass no `-i` flag".
pub fn resolve(policy: &KeyPolicy, global_key: &str) -> String {
    match policy {
        KeyPolicy::NoKey => String::new(),
        KeyPolicy::UseGlobal => global_key.to_string(),
        KeyPolicy::Explicit(path) => path.clone(),
    }
}

/// Tighten a private key to owner read/write (0600).
///
/// Returns `Ok(true)` when the mode was changed and `Ok(false)` when the file
/// is missing or already correct. A leading `~/` is expanded for the check;
/// the path handed to ssh is left untouched.
pub fn ensure_private_permissions(path: &str) -> Result<bool> {
    let path = expand_home(path);
    if !path.is_file() {
        return Ok(false);
    }
    set_owner_only(&path)
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let adjust = |source| Error::PermissionAdjust {
        path: path.to_path_buf(),
        source,
    };

    let mut perm = std::fs::metadata(path).map_err(adjust)?.permissions();
    if perm.mode() & 0o777 == 0o600 {
        return Ok(false);
    }
    perm.set_mode(0o600);
    std::fs::set_permissions(path, perm).map_err(adjust)?;
    Ok(true)
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<bool> {
    Ok(false)
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Resolves a session's key policy against the global settings.
pub struct KeyResolver<'a> {
    settings: &'a GlobalSettings,
}

impl<'a> KeyResolver<'a> {
    pub fn new(settings: &'a GlobalSettings) -> Self {
        Self { settings }
    }

    pub fn resolve(&self, session: &Session) -> String {
        resolve(&session.ssh_key_path, &self.settings.ssh_key)
    }

    /// Resolve and fix the key file's permissions. Permission failures are
    /// logged and never stop the connection.
    pub fn resolve_and_secure(&self, session: &Session) -> String {
        let key = self.resolve(session);
        if key.is_empty() {
            return key;
        }

        match ensure_private_permissions(&key) {
            Ok(true) => tracing::info!("Set permissions of {} to 0600", key),
            Ok(false) => {}
            Err(e) => tracing::warn!("{}", e),
        }
        key
    }
}
