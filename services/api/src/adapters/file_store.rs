//! services/api/src/adapters/file_store.rs
//!
//! A `KeyValueStore` backed by a single JSON object on disk. The whole file is
//! rewritten on every change, through a temporary file and a rename so a crash
//! never leaves a half-written store behind.

use medscan_core::ports::{KeyValueStore, PortError, PortResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

pub const STORE_FILE_NAME: &str = "medscan_store.json";

pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens (or lazily creates) the store file inside `data_dir`.
    ///
    /// An unreadable or corrupt file is treated as an empty store.
    pub fn open(data_dir: &Path) -> PortResult<Self> {
        fs::create_dir_all(data_dir).map_err(|e| {
            PortError::Unexpected(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        let path = data_dir.join(STORE_FILE_NAME);

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring corrupt store file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read store file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        info!("Opened key-value store at {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> PortResult<()> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, raw)
            .and_then(|_| fs::rename(&tmp_path, &self.path))
            .map_err(|e| {
                PortError::Unexpected(format!(
                    "Failed to write store file {}: {}",
                    self.path.display(),
                    e
                ))
            })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}
