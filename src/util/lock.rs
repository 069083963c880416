//! Exclusive per-profile run lock.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::auth::store::normalize_label;
use crate::error::BillingError;

/// Holds an exclusive lock on `<dir>/<profile>.lock` until dropped.
///
/// The profile is normalized the same way as its state file name.
///
/// A second acquire for the same profile fails with
/// [`BillingError::RunLocked`] instead of waiting.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(dir: &Path, profile: &str) -> Result<Self, BillingError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.lock", normalize_label(profile)));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
        }
        if let Err(err) = FileExt::try_lock_exclusive(&file) {
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(BillingError::RunLocked(path));
            }
            return Err(BillingError::Io(err));
        }
        tracing::debug!(path = %path.display(), "Run lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        tracing::debug!(path = %self.path.display(), "Run lock released");
    }
}
