//! Local persistence adapter.
//!
//! Storage is a key-value interface over opaque JSON strings: one
//! well-known key per logical table. The declaration collection is stored
//! as a single versioned blob holding every user's declarations, so users
//! sharing a device keep separate drafts under their own entry. All
//! (de)serialization lives here; callers only see typed collections.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::declaration::Declaration;
use crate::errors::PersistError;

/// Key for the per-user declaration collection blob.
pub const USER_DATA_KEY: &str = "USER_DATA";
/// Key for the persisted user-details blob written by the auth layer.
pub const USER_DETAILS_KEY: &str = "USER_DETAILS";

const BLOB_VERSION: u32 = 1;

/// Key-value store over string-serialized JSON.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, PersistError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError>;
}

/// One user's slice of the collection blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub user_id: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

/// The on-disk shape of `USER_DATA`. Versioned so the internal
/// representation can migrate independently of stored blobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDataBlob {
    pub version: u32,
    #[serde(default)]
    pub users: Vec<UserData>,
}

impl Default for UserDataBlob {
    fn default() -> Self {
        Self {
            version: BLOB_VERSION,
            users: Vec::new(),
        }
    }
}

async fn read_blob(store: &dyn LocalStore) -> Result<UserDataBlob, PersistError> {
    match store.get_item(USER_DATA_KEY).await? {
        Some(raw) => serde_json::from_str(&raw).map_err(|source| PersistError::CorruptBlob {
            key: USER_DATA_KEY.to_string(),
            source,
        }),
        None => Ok(UserDataBlob::default()),
    }
}

/// Load one user's persisted declarations. Missing blob or missing user
/// entry both come back as an empty list.
pub async fn load_user_declarations(
    store: &dyn LocalStore,
    user_id: &str,
) -> Result<Vec<Declaration>, PersistError> {
    let blob = read_blob(store).await?;
    Ok(blob
        .users
        .into_iter()
        .find(|u| u.user_id == user_id)
        .map(|u| u.declarations)
        .unwrap_or_default())
}

/// Replace one user's declarations in the blob and write the whole
/// collection back. Other users' entries are preserved untouched.
pub async fn write_user_declarations(
    store: &dyn LocalStore,
    user_id: &str,
    declarations: &[Declaration],
) -> Result<(), PersistError> {
    let mut blob = read_blob(store).await?;
    match blob.users.iter_mut().find(|u| u.user_id == user_id) {
        Some(entry) => entry.declarations = declarations.to_vec(),
        None => blob.users.push(UserData {
            user_id: user_id.to_string(),
            declarations: declarations.to_vec(),
        }),
    }
    let raw = serde_json::to_string(&blob).map_err(PersistError::Serialize)?;
    store.set_item(USER_DATA_KEY, &raw).await
}

/// Resolve the current user's stable id from the persisted user-details
/// blob. Returns an empty string when no details are stored.
pub async fn current_user_id(store: &dyn LocalStore) -> Result<String, PersistError> {
    let Some(raw) = store.get_item(USER_DETAILS_KEY).await? else {
        return Ok(String::new());
    };
    let details: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| PersistError::CorruptBlob {
            key: USER_DETAILS_KEY.to_string(),
            source,
        })?;
    Ok(details
        .get("userMgntUserID")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

/// File-backed store: one JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::ReadFailed {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create store root {}", self.root.display()))?;
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|source| PersistError::WriteFailed {
                key: key.to_string(),
                source,
            })
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        let items = self.items.lock().map_err(|_| PersistError::LockPoisoned)?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let mut items = self.items.lock().map_err(|_| PersistError::LockPoisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
