use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

use super::DEFAULT_PROFILE;

const MAX_BACKUP_GENERATIONS: usize = 3;

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "SSH_HAND_HOME";

/// The three independent stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreId {
    Sessions,
    Recent,
    Settings,
}

impl StoreId {
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreId::Sessions => "sessions.json",
            StoreId::Recent => "recent_sessions.json",
            StoreId::Settings => "settings.json",
        }
    }
}

/// Get-by-key / set-by-key byte storage
#[async_trait]
pub trait Backend: Send + Sync {
    /// `Ok(None)` when the store has never been written
    async fn load(&self, store: StoreId) -> Result<Option<Vec<u8>>>;

    async fn save(&self, store: StoreId, bytes: &[u8]) -> Result<()>;

    /// Exclusive hold over every store, released when the guard drops.
    /// Load-mutate-save sequences run under it.
    fn lock(&self) -> Result<StoreLock> {
        Ok(StoreLock::default())
    }
}

/// Decode a store, falling back to the default when it is absent, unreadable
/// or malformed.
pub async fn load_json<T>(backend: &dyn Backend, store: StoreId) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match backend.load(store).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!("Cannot read {}: {}", store.file_name(), e);
            return T::default();
        }
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return T::default();
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", store.file_name(), e);
            T::default()
        }
    }
}

pub async fn save_json<T>(backend: &dyn Backend, store: StoreId, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec_pretty(value)?;
    backend.save(store, &json).await
}

/// Stores kept as JSON files in a profile directory
pub struct FileBackend {
    dir: PathBuf,
    profile: String,
}

impl FileBackend {
    /// Open (and create) the directory of a profile
    pub async fn new(profile: &str) -> Result<Self> {
        let dir = Self::profile_dir(profile)?;
        Self::at(dir, profile).await
    }

    /// Use an explicit directory
    pub async fn at(dir: impl Into<PathBuf>, profile: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            profile: profile.to_string(),
        })
    }

    /// Base data directory: `$SSH_HAND_HOME`, else `<config dir>/ssh-hand`
    pub fn base_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let config =
            dirs::config_dir().ok_or_else(|| Error::config("Cannot determine config directory"))?;
        Ok(config.join("ssh-hand"))
    }

    fn profile_dir(profile: &str) -> Result<PathBuf> {
        validate_profile_name(profile)?;
        Ok(Self::base_dir()?.join("profiles").join(profile))
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    fn path(&self, store: StoreId) -> PathBuf {
        self.dir.join(store.file_name())
    }

    /// Create rolling backup
    async fn create_backup(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        // Roll backups: .bak.2 -> .bak.3, .bak -> .bak.2
        for i in (1..MAX_BACKUP_GENERATIONS).rev() {
            let from = if i == 1 {
                path.with_extension("bak")
            } else {
                path.with_extension(format!("bak.{}", i))
            };
            let to = path.with_extension(format!("bak.{}", i + 1));

            if from.exists() {
                // Remove target if exists (fs::rename doesn't overwrite on all platforms)
                if to.exists() {
                    let _ = fs::remove_file(&to).await;
                }
                fs::rename(&from, &to).await?;
            }
        }

        let bak = path.with_extension("bak");
        if bak.exists() {
            let _ = fs::remove_file(&bak).await;
        }
        fs::copy(path, &bak).await?;

        Ok(())
    }

    /// List all profiles
    pub async fn list_profiles() -> Result<Vec<String>> {
        let profiles_dir = Self::base_dir()?.join("profiles");

        if !profiles_dir.exists() {
            return Ok(vec![DEFAULT_PROFILE.to_string()]);
        }

        let mut entries = fs::read_dir(&profiles_dir).await?;
        let mut profiles = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    profiles.push(name.to_string());
                }
            }
        }

        if profiles.is_empty() {
            profiles.push(DEFAULT_PROFILE.to_string());
        }

        profiles.sort();
        Ok(profiles)
    }

    /// Create a new profile
    pub async fn create_profile(name: &str) -> Result<()> {
        let profile_dir = Self::profile_dir(name)?;

        if profile_dir.exists() {
            return Err(Error::profile(format!("Profile '{}' already exists", name)));
        }

        fs::create_dir_all(&profile_dir).await?;
        Ok(())
    }

    /// Delete a profile
    pub async fn delete_profile(name: &str) -> Result<()> {
        if name == DEFAULT_PROFILE {
            return Err(Error::profile("Cannot delete default profile"));
        }

        let profile_dir = Self::profile_dir(name)?;

        if !profile_dir.exists() {
            return Err(Error::profile(format!("Profile '{}' not found", name)));
        }

        fs::remove_dir_all(&profile_dir).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn load(&self, store: StoreId) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(store)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, store: StoreId, bytes: &[u8]) -> Result<()> {
        let path = self.path(store);

        if store == StoreId::Sessions {
            self.create_backup(&path).await?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    /// `flock` on `.lock` in the profile directory, so concurrent processes
    /// take turns.
    fn lock(&self) -> Result<StoreLock> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(".lock"))?;
        file.lock_exclusive()?;
        Ok(StoreLock { file: Some(file) })
    }
}

/// Guard returned by [`Backend::lock`]
#[derive(Default)]
pub struct StoreLock {
    file: Option<std::fs::File>,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            if let Err(e) = FileExt::unlock(file) {
                tracing::warn!("Failed to release profile lock: {}", e);
            }
        }
    }
}

/// Stores held in memory
#[derive(Default)]
pub struct MemoryBackend {
    stores: Mutex<HashMap<StoreId, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with raw content
    pub fn with_store(self, store: StoreId, content: impl Into<Vec<u8>>) -> Self {
        self.stores.lock().insert(store, content.into());
        self
    }

    pub fn raw(&self, store: StoreId) -> Option<Vec<u8>> {
        self.stores.lock().get(&store).cloned()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn load(&self, store: StoreId) -> Result<Option<Vec<u8>>> {
        Ok(self.stores.lock().get(&store).cloned())
    }

    async fn save(&self, store: StoreId, bytes: &[u8]) -> Result<()> {
        self.stores.lock().insert(store, bytes.to_vec());
        Ok(())
    }
}

fn validate_profile_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name != "."
        && name != "..";
    if ok {
        Ok(())
    } else {
        Err(Error::profile(format!("Invalid profile name: '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::at(dir.path().join("p"), "test").await.unwrap();

        let sessions = vec![Session::new("web", "root@web", "prod")];
        save_json(&backend, StoreId::Sessions, &sessions).await.unwrap();

        let loaded: Vec<Session> = load_json(&backend, StoreId::Sessions).await;
        assert_eq!(loaded, sessions);
        assert!(!dir.path().join("p").join("sessions.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_degrade_to_default() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::at(dir.path(), "test").await.unwrap();

        let loaded: Vec<Session> = load_json(&backend, StoreId::Sessions).await;
        assert!(loaded.is_empty());

        std::fs::write(dir.path().join("sessions.json"), "{not json").unwrap();
        let loaded: Vec<Session> = load_json(&backend, StoreId::Sessions).await;
        assert!(loaded.is_empty());

        std::fs::write(dir.path().join("sessions.json"), "  \n").unwrap();
        let loaded: Vec<Session> = load_json(&backend, StoreId::Sessions).await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_backups_roll() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::at(dir.path(), "test").await.unwrap();

        for i in 0..5 {
            backend
                .save(StoreId::Sessions, format!("[{}]", i).as_bytes())
                .await
                .unwrap();
        }

        let bak = std::fs::read_to_string(dir.path().join("sessions.bak")).unwrap();
        assert_eq!(bak, "[3]");
        assert!(dir.path().join("sessions.bak.3").exists());
        assert!(!dir.path().join("sessions.bak.4").exists());
    }

    #[tokio::test]
    async fn test_memory_backend() {
        let backend = MemoryBackend::new().with_store(StoreId::Recent, "garbage");
        let recent: Vec<Session> = load_json(&backend, StoreId::Recent).await;
        assert!(recent.is_empty());
        assert!(backend.load(StoreId::Settings).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_is_reentrant_after_drop() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::at(dir.path(), "test").await.unwrap();
        drop(backend.lock().unwrap());
        let _again = backend.lock().unwrap();
    }

    #[test]
    fn test_profile_names() {
        assert!(validate_profile_name("work").is_ok());
        assert!(validate_profile_name("home-lab_2").is_ok());
        assert!(validate_profile_name("").is_err());
        assert!(validate_profile_name("..").is_err());
        assert!(validate_profile_name("a/b").is_err());
    }
}
