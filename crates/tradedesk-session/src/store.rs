//! Session storage.
//!
//! The [`SessionStore`] holds the bearer token and display name for the
//! current client. It is the single source of truth for the token: the
//! session manager and the authorized client read it on every use and never
//! keep a copy of their own.
//!
//! Writers are not coordinated beyond a short per-call lock, so a login that
//! completes while a 401 invalidation fires resolves last-writer-wins.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;

/// The keys a session store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Opaque bearer token issued by the auth backend.
    Token,
    /// Display name of the signed-in user.
    Username,
}

impl SessionKey {
    /// Every key, in persistence order.
    pub const ALL: [Self; 2] = [Self::Token, Self::Username];

    /// The persisted storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Username => "username",
        }
    }
}

/// Process-wide key/value holder for session credentials.
pub trait SessionStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: SessionKey) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: SessionKey, value: &str);

    /// Remove every value.
    fn clear(&self);

    /// The current token, treating an empty string as absent.
    fn token(&self) -> Option<String> {
        self.get(SessionKey::Token).filter(|t| !t.is_empty())
    }

    /// Store a token and username together.
    fn set_credentials(&self, token: &str, username: &str) {
        self.set(SessionKey::Token, token);
        self.set(SessionKey::Username, username);
    }
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: RwLock<HashMap<SessionKey, String>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        self.values.read().get(&key).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) {
        self.values.write().insert(key, value.to_string());
    }

    fn clear(&self) {
        self.values.write().clear();
    }
}

/// Store persisted as a small JSON object on disk.
///
/// Values are kept in memory and the whole object is rewritten on every
/// mutation. A failed write is logged and the in-memory value still wins,
/// so the running process stays consistent even if the disk does not.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    values: RwLock<HashMap<SessionKey, String>>,
}

impl FileSessionStore {
    /// Open a store at `path`, loading any values already persisted there.
    ///
    /// A missing file is an empty session. An unreadable or malformed file
    /// is logged and also treated as empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load(&path);
        tracing::debug!(path = %path.display(), keys = values.len(), "Session store opened");
        Self {
            path,
            values: RwLock::new(values),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &HashMap<SessionKey, String>) {
        let object: serde_json::Map<String, serde_json::Value> = SessionKey::ALL
            .iter()
            .filter_map(|key| {
                values
                    .get(key)
                    .map(|v| (key.as_str().to_string(), serde_json::Value::String(v.clone())))
            })
            .collect();

        let result = serde_json::to_vec_pretty(&object)
            .map_err(io::Error::other)
            .and_then(|bytes| self.replace_file(&bytes));

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist session");
        }
    }

    /// Write `bytes` to a sibling temp file and rename it over the target.
    ///
    /// The temp file is created owner-only (0600 on unix), so the token is
    /// never readable by other users, and a crash mid-write leaves the
    /// previous file intact.
    fn replace_file(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        file.persist(&self.path)?;
        Ok(())
    }
}

fn load(path: &Path) -> HashMap<SessionKey, String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read session file");
            return HashMap::new();
        }
    };

    let object: serde_json::Map<String, serde_json::Value> = match serde_json::from_slice(&bytes)
    {
        Ok(object) => object,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed session file");
            return HashMap::new();
        }
    };

    SessionKey::ALL
        .iter()
        .filter_map(|key| {
            object
                .get(key.as_str())
                .and_then(serde_json::Value::as_str)
                .map(|v| (*key, v.to_string()))
        })
        .collect()
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        self.values.read().get(&key).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) {
        let mut values = self.values.write();
        values.insert(key, value.to_string());
        self.persist(&values);
    }

    fn clear(&self) {
        let mut values = self.values.write();
        values.clear();
        self.persist(&values);
    }
}
