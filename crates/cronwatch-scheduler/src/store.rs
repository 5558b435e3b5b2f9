//! Job table persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use cronwatch_protocols::{CronJob, StorageError};

/// Current on-disk format version.
pub const STORE_VERSION: u32 = 1;

/// Durable job table.
///
/// `save` replaces the whole persisted table; readers never observe a partial
/// write.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load every persisted job. An absent store is an empty table.
    async fn load(&self) -> Result<Vec<CronJob>, StorageError>;

    /// Atomically replace the persisted table.
    async fn save(&self, jobs: &[CronJob]) -> Result<(), StorageError>;

    /// Claim the store for this process until the store is dropped.
    ///
    /// Fails with [`StorageError::Locked`] while another owner holds it.
    /// Stores that cannot be shared between processes keep the default.
    async fn lock(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// On-disk envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub jobs: Vec<CronJob>,
}

fn default_version() -> u32 {
    STORE_VERSION
}

/// In-memory job store for testing.
pub struct MemoryJobStore {
    jobs: tokio::sync::RwLock<Vec<CronJob>>,
}

impl MemoryJobStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            jobs: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    /// Create a memory store pre-populated with `jobs`.
    pub fn with_jobs(jobs: Vec<CronJob>) -> Self {
        Self {
            jobs: tokio::sync::RwLock::new(jobs),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn load(&self) -> Result<Vec<CronJob>, StorageError> {
        Ok(self.jobs.read().await.clone())
    }

    async fn save(&self, jobs: &[CronJob]) -> Result<(), StorageError> {
        *self.jobs.write().await = jobs.to_vec();
        Ok(())
    }
}

/// Single-file JSON job store.
///
/// Writes go to a hidden temp file next to the target, are flushed to disk,
/// then renamed over the target, and the directory entry is flushed too.
/// [`JobStore::lock`] takes an advisory `flock` on a `<file>.lock` sidecar.
pub struct FileJobStore {
    path: PathBuf,
    lock: Mutex<Option<std::fs::File>>,
}

impl FileJobStore {
    /// Create a store backed by `path`. Nothing touches disk until the first
    /// load, save or lock.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "jobs.json".to_string())
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn tmp_path(&self) -> PathBuf {
        self.path
            .with_file_name(format!(".{}.{}.tmp", self.file_name(), std::process::id()))
    }

    fn lock_path(&self) -> PathBuf {
        self.path
            .with_file_name(format!("{}.lock", self.file_name()))
    }

    /// Flush the directory entry written by the last rename.
    #[cfg(unix)]
    async fn sync_parent_dir(&self) -> Result<(), StorageError> {
        let dir = self.parent_dir().unwrap_or_else(|| Path::new("."));
        let handle = fs::File::open(dir)
            .await
            .map_err(|e| StorageError::io(dir, e))?;
        handle
            .sync_all()
            .await
            .map_err(|e| StorageError::io(dir, e))
    }

    #[cfg(not(unix))]
    async fn sync_parent_dir(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor stays open for as long as `file` is borrowed.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn load(&self) -> Result<Vec<CronJob>, StorageError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no job store yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: StoreFile = serde_json::from_str(&content)?;
        debug!(
            path = %self.path.display(),
            version = file.version,
            jobs = file.jobs.len(),
            "loaded job store"
        );
        Ok(file.jobs)
    }

    async fn save(&self, jobs: &[CronJob]) -> Result<(), StorageError> {
        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        let file = StoreFile {
            version: STORE_VERSION,
            jobs: jobs.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        let tmp_path = self.tmp_path();
        let write = async {
            let mut tmp = fs::File::create(&tmp_path).await?;
            tmp.write_all(&content).await?;
            tmp.sync_all().await?;
            Ok::<_, std::io::Error>(())
        };
        if let Err(e) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(&tmp_path, e));
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(&self.path, e));
        }
        self.sync_parent_dir().await?;

        debug!(path = %self.path.display(), jobs = jobs.len(), "saved job store");
        Ok(())
    }

    async fn lock(&self) -> Result<(), StorageError> {
        let mut held = self.lock.lock();
        if held.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.parent_dir() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let lock_path = self.lock_path();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StorageError::io(&lock_path, e))?;

        try_lock_exclusive(&file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                StorageError::Locked {
                    path: self.path.clone(),
                }
            } else {
                StorageError::io(&lock_path, e)
            }
        })?;

        debug!(path = %lock_path.display(), "locked job store");
        *held = Some(file);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
