/// Cross-process locking for the durable credential file
use crate::error::Result;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Advisory lock guarding one credential file
///
/// Uses a sibling `.lock` file so that several processes sharing the same
/// profile never observe a half-written credential file, and never interleave
/// two writers.
#[derive(Debug, Clone)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    /// Lock guarding `target`
    pub fn for_file(target: &Path) -> Self {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        Self {
            path: target.with_file_name(name),
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire an exclusive lock, blocking until available
    ///
    /// Released when the returned guard is dropped.
    pub fn exclusive(&self) -> Result<StoreLockGuard> {
        let file = self.open()?;
        FileExt::lock_exclusive(&file)?;
        Ok(StoreLockGuard { file: Some(file) })
    }

    /// Acquire a shared lock, blocking while a writer holds it
    pub fn shared(&self) -> Result<StoreLockGuard> {
        let file = self.open()?;
        FileExt::lock_shared(&file)?;
        Ok(StoreLockGuard { file: Some(file) })
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?)
    }
}

/// RAII guard for a held [`StoreLock`]
pub struct StoreLockGuard {
    file: Option<File>,
}

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        // The lock file itself stays; removing it would race with waiters
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}
