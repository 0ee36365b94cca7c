//! Registration State Store - typed access to the persisted push keys
//!
//! The store sits on top of a [`KeyValueStore`]. Two backends ship with the
//! SDK: [`MemoryStore`] for tests and ephemeral clients, and [`JsonFileStore`]
//! which keeps every key in one JSON file so state survives restarts.

use crate::error::{BaasError, Result};
use baas_core::{RegistrationState, TagSet};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key of the server-assigned device id
pub const DEVICE_ID_KEY: &str = "baas_registered_device_uuid_for_push";
/// Key of the username the device was registered for
pub const USERNAME_KEY: &str = "baas_registered_username_for_push";
/// Key of the tags confirmed by the server (comma-joined)
pub const REGISTERED_TAGS_KEY: &str = "baas_registered_tag_for_push";
/// Key of the tags the application asked for (comma-joined)
pub const PENDING_TAGS_KEY: &str = "baas_need_register_tag_for_push";
/// Key of the latest push token supplied by the application
pub const DEVICE_TOKEN_KEY: &str = "baas_device_token_for_push";
/// Key of the push token the server confirmed
pub const REGISTERED_TOKEN_KEY: &str = "baas_registered_device_token_for_push";

/// File permissions for the state file on Unix (owner read/write only)
#[cfg(unix)]
const STATE_FILE_MODE: u32 = 0o600;

/// String key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several keys. Backends that can should make this atomic.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// In-memory key-value store. Data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored entries
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.values.read().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.write();
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Key-value store persisted as a JSON object in a single file.
///
/// The file is rewritten on every change: first to a temporary sibling, then
/// renamed over the original.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// A file that exists but is not a JSON object of strings is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                BaasError::Storage(format!("corrupt state file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(BaasError::Storage(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    BaasError::Storage(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, json.as_bytes())
            .map_err(|e| BaasError::Storage(format!("cannot write {}: {e}", tmp.display())))?;

        fs::rename(&tmp, &self.path).map_err(|e| {
            BaasError::Storage(format!("cannot replace {}: {e}", self.path.display()))
        })
    }
}

/// Write `contents` to a file readable by its owner only, from creation on.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(STATE_FILE_MODE);
    }
    let mut file = options.open(path)?;

    // A leftover temp file keeps its old mode
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(STATE_FILE_MODE))?;
    }

    file.write_all(contents)?;
    file.sync_all()
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_all(&[(key, value)])
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.write();
        let mut updated = values.clone();
        for (key, value) in entries {
            updated.insert(key.to_string(), value.to_string());
        }
        // Memory only changes once the file has been written
        self.persist(&updated)?;
        *values = updated;
        Ok(())
    }
}

/// Typed view of the registration keys.
#[derive(Clone)]
pub struct RegistrationStore {
    kv: Arc<dyn KeyValueStore>,
}

impl RegistrationStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store backed by a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn read(&self, key: &str) -> Result<String> {
        Ok(self.kv.get(key)?.unwrap_or_default())
    }

    /// Load the full state. Missing keys read as empty.
    pub fn load(&self) -> Result<RegistrationState> {
        Ok(RegistrationState {
            device_token: self.read(DEVICE_TOKEN_KEY)?,
            registered_token: self.read(REGISTERED_TOKEN_KEY)?,
            registered_username: self.read(USERNAME_KEY)?,
            registered_tags: TagSet::parse(&self.read(REGISTERED_TAGS_KEY)?),
            pending_tags: TagSet::parse(&self.read(PENDING_TAGS_KEY)?),
            device_id: self.read(DEVICE_ID_KEY)?,
        })
    }

    pub fn device_id(&self) -> Result<String> {
        self.read(DEVICE_ID_KEY)
    }

    pub fn device_token(&self) -> Result<String> {
        self.read(DEVICE_TOKEN_KEY)
    }

    pub fn pending_tags(&self) -> Result<TagSet> {
        Ok(TagSet::parse(&self.read(PENDING_TAGS_KEY)?))
    }

    /// Record the tags the application wants
    pub fn set_pending_tags(&self, tags: &TagSet) -> Result<()> {
        self.kv.set(PENDING_TAGS_KEY, &tags.encode())
    }

    /// Record a fresh push token
    pub fn set_device_token(&self, token: &str) -> Result<()> {
        self.kv.set(DEVICE_TOKEN_KEY, token)
    }

    /// Persist a registration confirmed by the server, token included.
    pub fn record_registration(
        &self,
        username: &str,
        tags: &TagSet,
        device_token: &str,
        device_id: &str,
    ) -> Result<()> {
        let tags = tags.encode();
        self.kv.set_all(&[
            (USERNAME_KEY, username),
            (REGISTERED_TAGS_KEY, tags.as_str()),
            (DEVICE_TOKEN_KEY, device_token),
            (REGISTERED_TOKEN_KEY, device_token),
            (DEVICE_ID_KEY, device_id),
        ])
    }

    /// Forget the server record after a confirmed delete. Tags are kept.
    pub fn clear_registration(&self) -> Result<()> {
        self.kv.set_all(&[(USERNAME_KEY, ""), (DEVICE_ID_KEY, "")])
    }
}

impl std::fmt::Debug for RegistrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationStore").finish_non_exhaustive()
    }
}
