//! Client-local persistence of the user's [`ProviderConfig`].
//!
//! The store holds exactly one record under the fixed key
//! [`STORAGE_KEY`]. Saving overwrites it wholesale; loading returns the last
//! saved value or `None`. Read failures (missing file, corrupt JSON, I/O
//! errors) are logged and reported as not-configured, never as errors.

use crate::config::ProviderConfig;
use crate::error::AssistantError;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Key under which the provider config is stored.
pub const STORAGE_KEY: &str = "apiConfig";

/// Injectable storage backend for the provider config.
pub trait ConfigStore: Send + Sync {
    /// Persist `config`, replacing any previous value.
    fn save(&self, config: &ProviderConfig) -> Result<(), AssistantError>;

    /// The last saved config, or `None` when nothing usable is stored.
    fn load(&self) -> Option<ProviderConfig>;
}

/// In-process store, used in tests and when persistence is not wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn save(&self, config: &ProviderConfig) -> Result<(), AssistantError> {
        // Stored JSON-encoded, like the file backend, so both see identical values.
        let encoded = serde_json::to_string(config)
            .map_err(|e| AssistantError::Internal(format!("encode settings: {e}")))?;
        let mut slot = self
            .slot
            .write()
            .map_err(|_| AssistantError::Internal("settings lock poisoned".into()))?;
        *slot = Some(encoded);
        Ok(())
    }

    fn load(&self) -> Option<ProviderConfig> {
        let slot = self.slot.read().ok()?;
        let encoded = slot.as_deref()?;
        serde_json::from_str(encoded)
            .map_err(|e| warn!("Stored settings are unreadable: {}", e))
            .ok()
    }
}

/// JSON key-value file on local disk.
///
/// The file is an object so unrelated keys written by other tools survive a
/// save. Writes go to a temp file in the same directory and are renamed into
/// place, so a crash never leaves a half-written file behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/paper-review-assistant/storage.json`, if the platform
    /// has a config directory.
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("paper-review-assistant").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.to_string()),
        };
        match serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string())? {
            Value::Object(map) => Ok(map),
            _ => Err("storage file is not a JSON object".into()),
        }
    }

    fn storage_err(&self, reason: impl ToString) -> AssistantError {
        AssistantError::Storage {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ConfigStore for FileStore {
    fn save(&self, config: &ProviderConfig) -> Result<(), AssistantError> {
        // A corrupt file is replaced rather than blocking every future save.
        let mut map = self.read_map().unwrap_or_else(|e| {
            warn!("Replacing unreadable storage file {}: {}", self.path.display(), e);
            Map::new()
        });
        let encoded = serde_json::to_value(config).map_err(|e| self.storage_err(e))?;
        map.insert(STORAGE_KEY.to_string(), encoded);

        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.storage_err(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.storage_err(e))?;
        let json = serde_json::to_vec_pretty(&Value::Object(map)).map_err(|e| self.storage_err(e))?;
        tmp.write_all(&json).map_err(|e| self.storage_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.storage_err(e.error))?;

        debug!("Saved {} settings to {}", config.provider, self.path.display());
        Ok(())
    }

    fn load(&self) -> Option<ProviderConfig> {
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                warn!("Settings unavailable at {}: {}", self.path.display(), e);
                return None;
            }
        };
        let value = map.remove(STORAGE_KEY)?;
        serde_json::from_value(value)
            .map_err(|e| warn!("Stored settings are unreadable: {}", e))
            .ok()
    }
}
