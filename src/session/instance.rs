use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ssh::KeyPolicy;

/// A saved connection target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable identity; legacy records without one get an id on load.
    #[serde(default)]
    pub id: String,
    pub friendlyname: String,
    pub connection_string: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub ssh_key_path: KeyPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x11_forward: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new session with no key and no X11 override
    pub fn new(
        friendlyname: impl Into<String>,
        connection_string: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            friendlyname: friendlyname.into(),
            connection_string: connection_string.into(),
            category: category.into(),
            ssh_key_path: KeyPolicy::NoKey,
            x11_forward: None,
            created_at: Some(Utc::now()),
        }
    }

    /// Does the friendly name contain `query` (case-insensitive)?
    pub fn matches(&self, query: &str) -> bool {
        self.friendlyname
            .to_lowercase()
            .contains(&query.to_lowercase())
    }

    pub fn same_name(&self, name: &str) -> bool {
        self.friendlyname.to_lowercase() == name.trim().to_lowercase()
    }

    pub(crate) fn ensure_id(&mut self) -> bool {
        if self.id.is_empty() {
            self.id = generate_id();
            true
        } else {
            false
        }
    }

    pub(crate) fn apply(&mut self, update: SessionUpdate) {
        self.friendlyname = update.friendlyname;
        self.connection_string = update.connection_string;
        self.category = update.category;
        self.ssh_key_path = update.ssh_key_path;
        self.x11_forward = update.x11_forward;
    }
}

/// Every mutable field of a session; used for both add and edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub friendlyname: String,
    pub connection_string: String,
    pub category: String,
    pub ssh_key_path: KeyPolicy,
    pub x11_forward: Option<bool>,
}

pub type NewSession = SessionUpdate;

impl SessionUpdate {
    pub fn new(
        friendlyname: impl Into<String>,
        connection_string: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            friendlyname: friendlyname.into(),
            connection_string: connection_string.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, policy: impl Into<KeyPolicy>) -> Self {
        self.ssh_key_path = policy.into();
        self
    }

    pub fn with_x11(mut self, x11_forward: Option<bool>) -> Self {
        self.x11_forward = x11_forward;
        self
    }

    /// Current values of an existing session, for pre-filling an edit
    pub fn from_session(session: &Session) -> Self {
        Self {
            friendlyname: session.friendlyname.clone(),
            connection_string: session.connection_string.clone(),
            category: session.category.clone(),
            ssh_key_path: session.ssh_key_path.clone(),
            x11_forward: session.x11_forward,
        }
    }

    /// Name, target and category are required.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("friendly name", &self.friendlyname),
            ("connection string", &self.connection_string),
            ("category", &self.category),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(label, _)| label)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Friendly name, connection string, and category are required (missing: {})",
                missing.join(", ")
            )))
        }
    }

    pub(crate) fn into_session(self) -> Session {
        let mut session = Session::new(String::new(), String::new(), String::new());
        session.apply(self);
        session
    }
}

/// Generate a unique session ID
fn generate_id() -> String {
    // Use first 12 chars of UUID for shorter IDs
    Uuid::new_v4().to_string()[..12].to_string()
}
