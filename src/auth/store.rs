use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::Credential;

/// Record of the last fetch whose output was fully written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCheckpoint {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub entries: usize,
    pub completed_at: DateTime<Utc>,
}

/// Process state carried between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetch: Option<FetchCheckpoint>,
}

/// Storage abstraction for persisted run state.
///
/// Credentials and fetch completion are committed separately: a credential is
/// saved as soon as it is obtained, the checkpoint only after output is written.
pub trait TokenStore: Send + Sync {
    fn load(&self, profile: &str) -> Result<StoredState, AuthError>;
    fn save_credential(&self, profile: &str, credential: &Credential) -> Result<(), AuthError>;
    fn record_fetch(&self, profile: &str, checkpoint: &FetchCheckpoint) -> Result<(), AuthError>;
    fn clear(&self, profile: &str) -> Result<(), AuthError>;
}

/// Configuration for file-backed state storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_state_dir()
    }
}

/// File-backed state store using one TOML file per profile.
///
/// # Example
/// ```no_run
/// use allegro_billing::auth::{Credential, FileTokenStore, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// store.save_credential("default", &Credential::new("access", "refresh"))?;
/// # Ok::<(), allegro_billing::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_state_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn state_path(&self, profile: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.state.toml", normalize_label(profile)))
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn write_state(&self, profile: &str, state: StoredState) -> Result<(), AuthError> {
        let path = self.state_path(profile);
        Self::ensure_parent(&path)?;
        let file = StateFile {
            version: 1,
            profile: profile.to_string(),
            saved_at: Utc::now(),
            state,
        };
        let serialized = toml::to_string(&file)?;

        // Replace via rename so a failed write never truncates the only
        // valid refresh token.
        let tmp = path.with_extension("toml.tmp");
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let written = options.open(&tmp).and_then(|mut out| {
            out.write_all(serialized.as_bytes())?;
            out.sync_all()
        });
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, profile: &str) -> Result<StoredState, AuthError> {
        let path = self.state_path(profile);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredState::default())
            }
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: StateFile = toml::from_str(&raw)?;
        Ok(file.state)
    }

    fn save_credential(&self, profile: &str, credential: &Credential) -> Result<(), AuthError> {
        let mut state = self.load(profile)?;
        state.credential = Some(credential.clone());
        self.write_state(profile, state)
    }

    fn record_fetch(&self, profile: &str, checkpoint: &FetchCheckpoint) -> Result<(), AuthError> {
        let mut state = self.load(profile)?;
        state.last_fetch = Some(checkpoint.clone());
        self.write_state(profile, state)
    }

    fn clear(&self, profile: &str) -> Result<(), AuthError> {
        let path = self.state_path(profile);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    profile: String,
    saved_at: DateTime<Utc>,
    state: StoredState,
}

fn default_state_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".allegro-billing"))
        .unwrap_or_else(|| PathBuf::from(".allegro-billing"))
}

/// File-name stem shared by a profile's state and lock files.
pub(crate) fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || lower == '-' {
            out.push(lower);
        } else {
            out.push('-');
        }
    }
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileTokenStore) {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(TokenStoreConfig::new(dir.path().to_path_buf()));
        (dir, store)
    }

    fn checkpoint() -> FetchCheckpoint {
        FetchCheckpoint {
            window_start: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            window_end: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            entries: 42,
            completed_at: Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap(),
        }
    }

    #[test]
    fn missing_file_loads_empty_state() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load("default").unwrap(), StoredState::default());
    }

    #[test]
    fn credential_round_trip_works() {
        let (_dir, store) = temp_store();
        store
            .save_credential("default", &Credential::new("access", "refresh"))
            .unwrap();
        let loaded = store.load("default").unwrap().credential.unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token, "refresh");
    }

    #[test]
    fn checkpoint_preserves_saved_credential() {
        let (_dir, store) = temp_store();
        store
            .save_credential("default", &Credential::new("access", "refresh"))
            .unwrap();
        store.record_fetch("default", &checkpoint()).unwrap();

        let state = store.load("default").unwrap();
        assert_eq!(state.credential.unwrap().refresh_token, "refresh");
        assert_eq!(state.last_fetch, Some(checkpoint()));
    }

    #[test]
    fn saving_credential_keeps_previous_checkpoint() {
        let (_dir, store) = temp_store();
        store.record_fetch("default", &checkpoint()).unwrap();
        store
            .save_credential("default", &Credential::new("a2", "r2"))
            .unwrap();
        assert_eq!(store.load("default").unwrap().last_fetch, Some(checkpoint()));
    }

    #[test]
    fn clear_removes_state() {
        let (_dir, store) = temp_store();
        store
            .save_credential("default", &Credential::new("access", "refresh"))
            .unwrap();
        store.clear("default").unwrap();
        assert!(store.load("default").unwrap().credential.is_none());
        store.clear("default").unwrap();
    }

    #[test]
    fn profiles_are_isolated() {
        let (_dir, store) = temp_store();
        store
            .save_credential("Shop A", &Credential::new("a", "ra"))
            .unwrap();
        assert!(store.load("shop-b").unwrap().credential.is_none());
        assert_eq!(
            store.load("shop-a").unwrap().credential.unwrap().access_token,
            "a"
        );
    }

    #[cfg(unix)]
    #[test]
    fn state_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = temp_store();
        store
            .save_credential("default", &Credential::new("access", "refresh"))
            .unwrap();
        let meta = fs::metadata(dir.path().join("default.state.toml")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_replaces_existing_file_and_stays_private() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = temp_store();
        let path = dir.path().join("default.state.toml");
        store
            .save_credential("default", &Credential::new("a1", "r1"))
            .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        store
            .save_credential("default", &Credential::new("a2", "r2"))
            .unwrap();

        assert_eq!(
            store.load("default").unwrap().credential.unwrap().refresh_token,
            "r2"
        );
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
        assert!(!dir.path().join("default.state.toml.tmp").exists());
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
