//! Bearer token storage.
//!
//! A [`Session`] is the access/refresh pair issued by the cluster's token
//! endpoint. Stores hand out whole sessions only: a pair with a missing half
//! is treated as no session at all.

use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Access/refresh token pair. Both halves are always non-empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    access_token: String,
    refresh_token: String,
}

impl Session {
    /// Builds a session, or `None` if either token is missing or empty.
    pub fn new(access: Option<String>, refresh: Option<String>) -> Option<Self> {
        match (access, refresh) {
            (Some(a), Some(r)) if !a.is_empty() && !r.is_empty() => Some(Self {
                access_token: a,
                refresh_token: r,
            }),
            _ => None,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Process-wide owner of the current [`Session`].
///
/// Implementations serialize reads and writes so a reader on the poller
/// task never observes a half-updated pair.
pub trait TokenStore: Send + Sync + fmt::Debug {
    fn load(&self) -> Option<Session>;

    fn save(&self, session: &Session) -> Result<()>;

    fn clear(&self) -> Result<()>;

    fn is_authenticated(&self) -> bool {
        self.load().is_some()
    }
}

/// Keeps the session in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: Mutex<Option<Session>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.session.lock() = None;
        Ok(())
    }
}

/// Persists the session as JSON, cached after the first read.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // `None` = not read yet, `Some(None)` = read and absent.
    cache: Mutex<Option<Option<Session>>>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Option<Session> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read token file {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str::<Session>(&content) {
            Ok(session) if session.is_complete() => Some(session),
            Ok(_) => {
                tracing::warn!("Ignoring incomplete token pair in {}", self.path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Failed to parse token file {}: {e}", self.path.display());
                None
            }
        }
    }

    fn write_file(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<Session> {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            return cached.clone();
        }
        let session = self.read_file();
        *cache = Some(session.clone());
        session
    }

    fn save(&self, session: &Session) -> Result<()> {
        let mut cache = self.cache.lock();
        self.write_file(session)?;
        *cache = Some(Some(session.clone()));
        tracing::info!("Tokens saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *cache = Some(None);
        tracing::info!("Tokens cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Session {
        Session::new(Some("acc".into()), Some("ref".into())).unwrap()
    }

    #[test]
    fn partial_pair_is_no_session() {
        assert!(Session::new(Some("acc".into()), None).is_none());
        assert!(Session::new(None, Some("ref".into())).is_none());
        assert!(Session::new(Some(String::new()), Some("ref".into())).is_none());
    }

    #[test]
    fn debug_redacts_tokens() {
        let session =
            Session::new(Some("sekret-access".into()), Some("sekret-refresh".into())).unwrap();
        let dbg = format!("{session:?}");
        assert!(!dbg.contains("sekret-access"));
        assert!(!dbg.contains("sekret-refresh"));
        assert!(dbg.contains("redacted"));
    }

    #[test]
    fn memory_store_save_and_clear() {
        let store = MemoryTokenStore::new();
        assert!(!store.is_authenticated());
        store.save(&pair()).unwrap();
        assert_eq!(store.load().unwrap().access_token(), "acc");
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let store = FileTokenStore::new(&path);
        store.save(&pair()).unwrap();

        let reopened = FileTokenStore::new(&path);
        let session = reopened.load().unwrap();
        assert_eq!(session.access_token(), "acc");
        assert_eq!(session.refresh_token(), "ref");
    }

    #[test]
    fn file_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileTokenStore::new(&path);
        store.save(&pair()).unwrap();
        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.load().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn file_store_ignores_half_written_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, r#"{"access_token":"acc","refresh_token":""}"#).unwrap();
        assert!(FileTokenStore::new(&path).load().is_none());
    }

    #[test]
    fn file_store_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileTokenStore::new(&path).load().is_none());
    }
}
