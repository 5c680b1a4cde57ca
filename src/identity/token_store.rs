//! Durable storage for the session token and the cached user profile.
//!
//! Both entries are written and removed together: a reader sees the old pair, the new
//! pair, or nothing, never a token without its user.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::profile::UserProfile;
use crate::error::ClientError;
use crate::tprintln;

/// Opaque bearer credential minted by the server.
pub type SessionToken = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: SessionToken,
    pub user: UserProfile,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store io error at {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("token store encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        let code = match &err {
            StoreError::Io { .. } => "store_io",
            StoreError::Encode(_) => "store_encode",
        };
        ClientError::Storage { code: code.into(), message: err.to_string() }
    }
}

pub trait TokenStore: Send + Sync {
    fn save(&self, token: &str, user: &UserProfile) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
    fn load(&self) -> Option<StoredSession>;

    fn token(&self) -> Option<SessionToken> { self.load().map(|s| s.token) }
}

/// Process-local store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<StoredSession>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self { Self::default() }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &str, user: &UserProfile) -> Result<(), StoreError> {
        *self.slot.write() = Some(StoredSession { token: token.to_string(), user: user.clone() });
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.write() = None;
        Ok(())
    }

    fn load(&self) -> Option<StoredSession> { self.slot.read().clone() }
}

// On-disk shape. Both keys are optional so a damaged file can be detected and ignored.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDoc {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// JSON file holding both entries. Saves go through a temp file + rename.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // serializes writers inside this process; rename covers readers in others
    write_lock: parking_lot::Mutex<()>,
}

impl FileTokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), write_lock: parking_lot::Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, token: &str, user: &UserProfile) -> Result<(), StoreError> {
        let _g = self.write_lock.lock();
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let doc = SessionDoc { token: Some(token.to_string()), user: Some(user.clone()) };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, bytes).map_err(|e| self.io_err(e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_err(e));
        }
        debug!(target: "token_store", "saved session for user_id={} at {:?}", user.id, self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _g = self.write_lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(target: "token_store", "cleared session at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn load(&self) -> Option<StoredSession> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(target: "token_store", "cannot read {:?}: {}", self.path, e);
                return None;
            }
        };
        let doc: SessionDoc = match serde_json::from_slice(&bytes) {
            Ok(d) => d,
            Err(e) => {
                warn!(target: "token_store", "ignoring unreadable session file {:?}: {}", self.path, e);
                return None;
            }
        };
        match (doc.token, doc.user) {
            (Some(token), Some(user)) if !token.is_empty() => Some(StoredSession { token, user }),
            (None, None) => None,
            _ => {
                tprintln!("token_store.load half-populated document at {:?}", self.path);
                warn!(target: "token_store", "session file {:?} has a token without a user (or vice versa); ignoring", self.path);
                None
            }
        }
    }
}
