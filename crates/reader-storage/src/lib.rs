use directories::ProjectDirs;
use reader_core::{KeyValueStore, ReaderSettings, StoreError};
use reader_model::ReaderPreferences;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, warn};

const STATE_SCHEMA_VERSION: u32 = 1;
const STATE_FILE: &str = "reader-state.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<StorageError> for StoreError {
    fn from(error: StorageError) -> Self {
        StoreError::Backend(error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Pageflow", "Pageflow").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reader settings whose atoms write through to the state file.
    pub fn settings(&self) -> Result<ReaderSettings, StorageError> {
        let file = KeyValueFile::open(self.state_path())?;
        Ok(ReaderSettings::load(Rc::new(file) as Rc<dyn KeyValueStore>))
    }

    /// Current preferences; defaults for anything never stored.
    pub fn load_preferences(&self) -> Result<ReaderPreferences, StorageError> {
        Ok(self.settings()?.snapshot())
    }

    fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateEnvelope {
    version: u32,
    entries: BTreeMap<String, String>,
}

/// JSON-encoded values by key, in a versioned envelope rewritten on every store.
#[derive(Debug)]
pub struct KeyValueFile {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl KeyValueFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = if path.exists() {
            let bytes = fs::read(&path)?;
            let envelope: StateEnvelope = serde_json::from_slice(&bytes)?;
            if envelope.version != STATE_SCHEMA_VERSION {
                warn!(version = envelope.version, "reader state written by a different schema version");
            }
            envelope.entries
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "opened reader state");
        Ok(Self { path, entries: RefCell::new(entries) })
    }

    fn flush(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope =
            StateEnvelope { version: STATE_SCHEMA_VERSION, entries: self.entries.borrow().clone() };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl KeyValueStore for KeyValueFile {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.to_owned(), value.to_owned());
        self.flush().map_err(StoreError::from)
    }
}
