//! Token store persisted as a small JSON document so a session survives restarts.
//! The file is rewritten through a temporary sibling and renamed into place; on
//! Unix it is created owner-readable only.

use super::{TokenKind, TokenStore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::{debug, warn};

#[derive(Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

#[derive(Default)]
struct Slots {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

impl Slots {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<SecretString> {
        match kind {
            TokenKind::Access => &mut self.access,
            TokenKind::Refresh => &mut self.refresh,
        }
    }

    fn to_stored(&self) -> StoredTokens {
        StoredTokens {
            access_token: self.access.as_ref().map(|t| t.expose_secret().to_string()),
            refresh_token: self.refresh.as_ref().map(|t| t.expose_secret().to_string()),
        }
    }
}

impl From<StoredTokens> for Slots {
    fn from(stored: StoredTokens) -> Self {
        Self {
            access: stored.access_token.map(SecretString::from),
            refresh: stored.refresh_token.map(SecretString::from),
        }
    }
}

/// File-backed [`TokenStore`]. Reads happen once at open; every write is persisted immediately.
pub struct FileTokenStore {
    path: PathBuf,
    slots: Mutex<Slots>,
}

impl FileTokenStore {
    /// Opens the store at `path`. A missing file is an empty store; an unreadable
    /// or corrupt one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let slots = match load(&path) {
            Ok(Some(stored)) => Slots::from(stored),
            Ok(None) => Slots::default(),
            Err(err) => {
                warn!(path = %path.display(), "Ignoring unreadable token file: {err}");
                Slots::default()
            }
        };

        Self {
            path,
            slots: Mutex::new(slots),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, slots: &Slots) {
        let stored = slots.to_stored();
        let result = if stored.access_token.is_none() && stored.refresh_token.is_none() {
            remove(&self.path)
        } else {
            write(&self.path, &stored)
        };

        if let Err(err) = result {
            warn!(path = %self.path.display(), "Failed to persist tokens: {err}");
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, kind: TokenKind) -> Option<SecretString> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slot(kind)
            .clone()
    }

    fn set(&self, kind: TokenKind, token: SecretString) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        *slots.slot(kind) = Some(token);
        self.persist(&slots);
        debug!(%kind, "Token stored");
    }

    fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        *slots = Slots::default();
        self.persist(&slots);
        debug!("Tokens cleared");
    }
}

/// Default location of the token file, `murmur/tokens.json` under the user's
/// config directory. `None` when the platform reports no such directory.
#[must_use]
pub fn default_token_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("murmur").join("tokens.json"))
}

fn load(path: &Path) -> io::Result<Option<StoredTokens>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn write(path: &Path, stored: &StoredTokens) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let payload = serde_json::to_vec_pretty(stored)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    let tmp = path.with_extension("tmp");
    let mut file = open_private(&tmp)?;
    file.write_all(&payload)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}

fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
