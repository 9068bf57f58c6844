//! crates/medscan_core/src/store/contacts.rs
//!
//! The user's family-alert contacts. Stored locally only, never synced.

use super::{read_json, scoped_key};
use crate::domain::Contact;
use crate::ports::{KeyValueStore, PortError, PortResult};
use crate::validation::{normalize_contact, ValidationError};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const CONTACTS_KEY: &str = "medscan_contacts";

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] PortError),
}

#[derive(Clone)]
pub struct ContactBook {
    kv: Arc<dyn KeyValueStore>,
    scope: Option<String>,
    write_lock: Arc<Mutex<()>>,
}

impl ContactBook {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            scope: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The contact book belonging to `owner`, on the same storage.
    pub fn scoped(&self, owner: &str) -> Self {
        Self {
            kv: self.kv.clone(),
            scope: Some(owner.to_string()),
            write_lock: self.write_lock.clone(),
        }
    }

    fn key(&self) -> String {
        scoped_key(CONTACTS_KEY, self.scope.as_deref())
    }

    /// Contacts in insertion order. Unreadable storage yields an empty list.
    pub fn list(&self) -> Vec<Contact> {
        read_json(self.kv.as_ref(), &self.key()).unwrap_or_default()
    }

    pub fn get(&self, id: Uuid) -> Option<Contact> {
        self.list().into_iter().find(|c| c.id == id)
    }

    /// Validates and upserts a contact, returning the stored version.
    pub fn save(&self, contact: Contact) -> Result<Contact, ContactError> {
        let contact = normalize_contact(contact)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut contacts = self.list();
        match contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(existing) => *existing = contact.clone(),
            None => contacts.push(contact.clone()),
        }
        self.write_all(&contacts)?;
        Ok(contact)
    }

    pub fn delete(&self, id: Uuid) -> PortResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let contacts: Vec<Contact> = self.list().into_iter().filter(|c| c.id != id).collect();
        self.write_all(&contacts)
    }

    fn write_all(&self, contacts: &[Contact]) -> PortResult<()> {
        let raw =
            serde_json::to_string(contacts).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(&self.key(), &raw)
    }
}
