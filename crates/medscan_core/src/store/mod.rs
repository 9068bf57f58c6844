//! Storage logic built on top of the `KeyValueStore` port.

pub mod contacts;
pub mod memory;
pub mod sessions;

pub use contacts::ContactBook;
pub use memory::InMemoryStore;
pub use sessions::{HistoryBucket, SessionGroup, SessionStore};

use crate::ports::KeyValueStore;
use serde::de::DeserializeOwned;
use tracing::warn;

/// `base` for the unscoped store, `base_<owner>` otherwise.
pub(crate) fn scoped_key(base: &str, owner: Option<&str>) -> String {
    match owner {
        Some(owner) => format!("{}_{}", base, owner),
        None => base.to_string(),
    }
}

/// Reads and decodes a JSON value. Missing keys, storage failures and corrupt
/// JSON all read as `None`.
pub(crate) fn read_json<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read '{}' from storage: {}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Discarding unreadable value under '{}': {}", key, e);
            None
        }
    }
}
