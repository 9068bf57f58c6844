//! crates/medscan_core/src/store/sessions.rs
//!
//! The Session Store: an ordered collection of chat sessions keyed by id,
//! plus the pointer to the session the user last worked in.
//!
//! Every write rewrites the whole collection, so a save costs O(n) in the
//! number of stored sessions. A store can be narrowed to one owner with
//! [`SessionStore::scoped`]; scoped stores share the parent's write lock.

use super::{read_json, scoped_key};
use crate::domain::{ChatMessage, ChatSession};
use crate::ports::{KeyValueStore, PortError, PortResult};
use chrono::{DateTime, Days, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

pub const SESSIONS_KEY: &str = "medscan_chat_sessions";
pub const ACTIVE_SESSION_KEY: &str = "medscan_active_session_id";

/// Sidebar buckets for the consultation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBucket {
    Today,
    Yesterday,
    Earlier,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionGroup {
    pub bucket: HistoryBucket,
    pub sessions: Vec<ChatSession>,
}

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    scope: Option<String>,
    // Serialises read-modify-write cycles on the session list.
    write_lock: Arc<Mutex<()>>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            scope: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A view of the same storage whose keys are suffixed with `owner`.
    pub fn scoped(&self, owner: &str) -> Self {
        Self {
            kv: self.kv.clone(),
            scope: Some(owner.to_string()),
            write_lock: self.write_lock.clone(),
        }
    }

    fn sessions_key(&self) -> String {
        scoped_key(SESSIONS_KEY, self.scope.as_deref())
    }

    fn active_key(&self) -> String {
        scoped_key(ACTIVE_SESSION_KEY, self.scope.as_deref())
    }

    /// Returns a fresh session. Nothing is persisted until it is saved.
    pub fn create_session(&self) -> ChatSession {
        ChatSession::new()
    }

    /// All stored sessions, most recently updated first.
    pub fn list_sessions(&self) -> Vec<ChatSession> {
        let mut sessions: Vec<ChatSession> =
            read_json(self.kv.as_ref(), &self.sessions_key()).unwrap_or_default();
        sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        sessions
    }

    pub fn get_session(&self, id: Uuid) -> Option<ChatSession> {
        self.list_sessions().into_iter().find(|s| s.id == id)
    }

    /// Inserts or replaces the session and marks it as the active one.
    pub fn save_session(&self, session: &ChatSession) -> PortResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut sessions = self.list_sessions();
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }

        self.write_all(&sessions)?;
        self.kv.set(&self.active_key(), &session.id.to_string())?;
        debug!("Saved session {} ({} stored)", session.id, sessions.len());
        Ok(())
    }

    /// Applies `edit` to the stored session, or to a fresh one under `id` when
    /// none is stored, then saves it and marks it active.
    pub fn update_or_create(
        &self,
        id: Uuid,
        edit: impl FnOnce(&mut ChatSession),
    ) -> PortResult<ChatSession> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut sessions = self.list_sessions();
        let index = match sessions.iter().position(|s| s.id == id) {
            Some(index) => index,
            None => {
                let mut fresh = self.create_session();
                fresh.id = id;
                sessions.push(fresh);
                sessions.len() - 1
            }
        };
        edit(&mut sessions[index]);
        let updated = sessions[index].clone();

        self.write_all(&sessions)?;
        self.kv.set(&self.active_key(), &id.to_string())?;
        Ok(updated)
    }

    /// Appends to the session as it is currently stored and marks it active.
    /// Returns `None` without writing anything when the session no longer exists.
    pub fn append_messages(
        &self,
        id: Uuid,
        messages: Vec<ChatMessage>,
    ) -> PortResult<Option<ChatSession>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut sessions = self.list_sessions();
        let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
            debug!("Session {} is gone, dropping {} message(s)", id, messages.len());
            return Ok(None);
        };
        for message in messages {
            session.push_message(message);
        }
        let updated = session.clone();

        self.write_all(&sessions)?;
        self.kv.set(&self.active_key(), &id.to_string())?;
        Ok(Some(updated))
    }

    /// Removes the session. Clears the active pointer when it pointed at it.
    pub fn delete_session(&self, id: Uuid) -> PortResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let sessions: Vec<ChatSession> = self
            .list_sessions()
            .into_iter()
            .filter(|s| s.id != id)
            .collect();
        self.write_all(&sessions)?;

        if self.active_session_id() == Some(id) {
            self.kv.remove(&self.active_key())?;
        }
        info!("Deleted session {}", id);
        Ok(())
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        let raw = self.kv.get(&self.active_key()).ok().flatten()?;
        Uuid::parse_str(raw.trim()).ok()
    }

    /// The active session, else the most recently updated one, else a new unsaved session.
    pub fn last_active_or_new(&self) -> ChatSession {
        let sessions = self.list_sessions();
        if let Some(active_id) = self.active_session_id() {
            if let Some(active) = sessions.iter().find(|s| s.id == active_id) {
                return active.clone();
            }
        }
        sessions
            .into_iter()
            .next()
            .unwrap_or_else(|| self.create_session())
    }

    /// Groups stored sessions into Today / Yesterday / Earlier relative to `now` (UTC days).
    /// Empty buckets are omitted.
    pub fn group_by_date(&self, now: DateTime<Utc>) -> Vec<SessionGroup> {
        let today = now.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1));

        let mut groups: Vec<SessionGroup> = [
            HistoryBucket::Today,
            HistoryBucket::Yesterday,
            HistoryBucket::Earlier,
        ]
        .into_iter()
        .map(|bucket| SessionGroup {
            bucket,
            sessions: Vec::new(),
        })
        .collect();

        for session in self.list_sessions() {
            let day = session.last_updated.date_naive();
            let index = if day >= today {
                0
            } else if Some(day) == yesterday {
                1
            } else {
                2
            };
            groups[index].sessions.push(session);
        }

        groups.retain(|g| !g.sessions.is_empty());
        groups
    }

    fn write_all(&self, sessions: &[ChatSession]) -> PortResult<()> {
        let raw =
            serde_json::to_string(sessions).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(&self.sessions_key(), &raw)
    }
}
