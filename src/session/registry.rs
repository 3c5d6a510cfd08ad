use std::sync::Arc;

use super::groups::CategoryIndex;
use super::storage::{load_json, save_json, Backend, StoreId};
use super::{Session, SessionUpdate};
use crate::error::{Error, Result};

/// Shortest id prefix accepted by [`SessionRegistry::find`]
const MIN_ID_PREFIX: usize = 4;

/// Owns the saved sessions. Every mutation is written through to the backend.
pub struct SessionRegistry {
    backend: Arc<dyn Backend>,
    sessions: Vec<Session>,
}

impl SessionRegistry {
    /// Load the sessions store. Records saved without an id get one, and the
    /// store is rewritten so the ids stay stable.
    pub async fn open(backend: Arc<dyn Backend>) -> Result<Self> {
        let mut sessions: Vec<Session> = load_json(backend.as_ref(), StoreId::Sessions).await;

        let mut assigned = 0;
        for session in &mut sessions {
            if session.ensure_id() {
                assigned += 1;
            }
        }

        let registry = Self { backend, sessions };
        if assigned > 0 {
            tracing::info!("Assigned ids to {} legacy sessions", assigned);
            registry.persist().await?;
        }
        Ok(registry)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Look up by exact id, friendly name (case-insensitive), or a unique id
    /// prefix of at least four characters
    pub fn find(&self, ident: &str) -> Result<&Session> {
        let ident = ident.trim();
        if ident.is_empty() {
            return Err(Error::SessionNotFound(String::new()));
        }

        if let Some(session) = self.get(ident) {
            return Ok(session);
        }

        if let Some(session) = self.sessions.iter().find(|s| s.same_name(ident)) {
            return Ok(session);
        }

        if ident.len() < MIN_ID_PREFIX {
            return Err(Error::SessionNotFound(ident.to_string()));
        }

        let by_prefix: Vec<&Session> = self
            .sessions
            .iter()
            .filter(|s| s.id.starts_with(ident))
            .collect();
        match by_prefix.as_slice() {
            [only] => Ok(*only),
            _ => Err(Error::SessionNotFound(ident.to_string())),
        }
    }

    /// Append a new session
    pub async fn add(&mut self, new: SessionUpdate) -> Result<&Session> {
        new.validate()?;
        self.check_unique(&new.friendlyname, None)?;

        let session = new.into_session();
        tracing::info!("Adding session {} ({})", session.friendlyname, session.id);
        self.sessions.push(session);
        self.persist().await?;

        Ok(&self.sessions[self.sessions.len() - 1])
    }

    /// Replace every mutable field of the session with `id`
    pub async fn edit(&mut self, id: &str, update: SessionUpdate) -> Result<&Session> {
        let idx = self.index_of(id)?;
        update.validate()?;
        self.check_unique(&update.friendlyname, Some(id))?;

        self.sessions[idx].apply(update);
        tracing::info!("Edited session {}", id);
        self.persist().await?;

        Ok(&self.sessions[idx])
    }

    pub async fn remove(&mut self, id: &str) -> Result<Session> {
        let idx = self.index_of(id)?;
        let removed = self.sessions.remove(idx);
        tracing::info!("Removed session {} ({})", removed.friendlyname, removed.id);
        self.persist().await?;
        Ok(removed)
    }

    /// Sessions whose friendly name contains `query`, ignoring case.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&Session> {
        let query = query.trim();
        self.sessions.iter().filter(|s| s.matches(query)).collect()
    }

    pub fn categorize(&self) -> CategoryIndex<'_> {
        CategoryIndex::build(&self.sessions)
    }

    /// Group only the sessions matching `query`
    pub fn categorize_matching(&self, query: &str) -> CategoryIndex<'_> {
        CategoryIndex::build(self.search(query))
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    fn check_unique(&self, name: &str, except_id: Option<&str>) -> Result<()> {
        let clash = self
            .sessions
            .iter()
            .filter(|s| Some(s.id.as_str()) != except_id)
            .any(|s| s.same_name(name));
        if clash {
            Err(Error::DuplicateName(name.trim().to_string()))
        } else {
            Ok(())
        }
    }

    async fn persist(&self) -> Result<()> {
        save_json(self.backend.as_ref(), StoreId::Sessions, &self.sessions).await
    }
}
