//! Advisory lock serializing syncs per destination repository.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::utils::{pid_alive, short_hash};

/// Held for the duration of a sync cycle; released on drop. Two
/// processes targeting different repositories never contend.
#[derive(Debug)]
pub(crate) struct DestinationLock {
    path: PathBuf,
}

impl DestinationLock {
    /// Acquires the lock for `destination`, taking over a lock left
    /// behind by a process that is no longer running.
    pub(crate) fn acquire(locks_root: &Path, destination: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(locks_root)
            .map_err(|e| AppError::io(format!("creating {}", locks_root.display()), e))?;
        let path = locks_root.join(format!(
            "dest-{}.lock",
            short_hash(&destination.display().to_string())
        ));

        match Self::try_create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .and_then(|raw| raw.trim().parse::<u32>().ok());
                if let Some(pid) = holder
                    && pid_alive(pid)
                {
                    return Err(AppError::TransientSync {
                        reason: format!(
                            "another sync for {} is running (pid {pid})",
                            destination.display()
                        ),
                    });
                }
                // Holder is gone (or the file is garbage): reclaim.
                fs::remove_file(&path)
                    .map_err(|e| AppError::io(format!("removing stale {}", path.display()), e))?;
                Self::try_create(&path)
                    .map(|lock| {
                        tracing::debug!("took over stale lock {}", lock.path.display());
                        lock
                    })
                    .map_err(|e| AppError::io(format!("creating {}", path.display()), e))
            }
            Err(e) => Err(AppError::io(format!("creating {}", path.display()), e)),
        }
    }

    fn try_create(path: &Path) -> Result<Self, std::io::Error> {
        // create_new is atomic: exactly one of two racing processes
        // gets the file.
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        write!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("failed to release lock {}: {e}", self.path.display());
        }
    }
}
