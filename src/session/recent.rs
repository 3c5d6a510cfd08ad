use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::storage::{load_json, save_json, Backend, StoreId};
use super::Session;
use crate::error::{Error, Result};

/// Maximum number of entries in the recent list
pub const MAX_RECENT: usize = 10;

/// Snapshot of a session taken when it was connected to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEntry {
    #[serde(flatten)]
    pub session: Session,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

/// Most-recently-used sessions, newest first, unique by friendly name
/// (ignoring case)
pub struct RecentSessions {
    backend: Arc<dyn Backend>,
    entries: Vec<RecentEntry>,
}

impl RecentSessions {
    pub async fn load(backend: Arc<dyn Backend>) -> Self {
        let mut entries: Vec<RecentEntry> = load_json(backend.as_ref(), StoreId::Recent).await;
        normalize(&mut entries);
        Self { backend, entries }
    }

    /// Record `session` as the most recent one and persist the list.
    /// Starts from the stored list, which may have changed while a
    /// connection was open, and holds the store lock until it is saved.
    pub async fn touch(&mut self, session: &Session) -> Result<()> {
        let _lock = self.backend.lock()?;
        self.entries = load_json(self.backend.as_ref(), StoreId::Recent).await;
        normalize(&mut self.entries);
        self.record(session.clone(), Utc::now());
        save_json(self.backend.as_ref(), StoreId::Recent, &self.entries).await
    }

    fn record(&mut self, session: Session, at: DateTime<Utc>) {
        self.entries
            .retain(|e| !e.session.same_name(&session.friendlyname));
        self.entries.insert(
            0,
            RecentEntry {
                session,
                connected_at: Some(at),
            },
        );
        self.entries.truncate(MAX_RECENT);
    }

    pub fn list(&self) -> &[RecentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up by 1-based position or by friendly name (case-insensitive)
    pub fn find(&self, ident: &str) -> Result<&Session> {
        if let Ok(pos) = ident.parse::<usize>() {
            if let Some(entry) = pos.checked_sub(1).and_then(|i| self.entries.get(i)) {
                return Ok(&entry.session);
            }
        }

        self.entries
            .iter()
            .map(|e| &e.session)
            .find(|s| s.same_name(ident))
            .ok_or_else(|| Error::SessionNotFound(ident.to_string()))
    }
}

/// Enforce the list invariants on data read from disk
fn normalize(entries: &mut Vec<RecentEntry>) {
    let mut seen = std::collections::HashSet::new();
    entries.retain(|e| seen.insert(e.session.friendlyname.trim().to_lowercase()));
    entries.truncate(MAX_RECENT);
}
