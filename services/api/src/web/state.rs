//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::gateway::AiGateway;
use crate::profile::{Identity, ProfileService};
use medscan_core::ports::{KeyValueStore, ProfileRepository};
use medscan_core::store::{ContactBook, SessionStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The stores share one key-value backend; the gateway holds no state between calls.
/// `sessions` and `contacts` are the guest's; use [`AppState::sessions_for`] and
/// [`AppState::contacts_for`] to reach a caller's own data.
pub struct AppState {
    pub sessions: SessionStore,
    pub contacts: ContactBook,
    pub profiles: ProfileService,
    pub gateway: AiGateway,
}

impl AppState {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        profile_repository: Option<Arc<dyn ProfileRepository>>,
        gateway: AiGateway,
    ) -> Self {
        Self {
            sessions: SessionStore::new(kv.clone()),
            contacts: ContactBook::new(kv.clone()),
            profiles: ProfileService::new(kv, profile_repository),
            gateway,
        }
    }

    pub fn sessions_for(&self, identity: Identity) -> SessionStore {
        match identity.storage_owner() {
            Some(owner) => self.sessions.scoped(&owner),
            None => self.sessions.clone(),
        }
    }

    pub fn contacts_for(&self, identity: Identity) -> ContactBook {
        match identity.storage_owner() {
            Some(owner) => self.contacts.scoped(&owner),
            None => self.contacts.clone(),
        }
    }
}
