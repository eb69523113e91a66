//! Calibration Lock File
//!
//! Serializes calibration runs and profile application against one data
//! directory. Two calibrations racing on the same profile version would
//! both propose from a stale base, so the second one must fail fast.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::StoreError;
use crate::config::defaults::CALIBRATION_LOCK_FILE;

/// A lock file without a readable PID is only reclaimed once it is this old.
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(60);

/// Advisory lock held for the duration of `calibrate` or `apply`.
///
/// The lock file holds the owner's PID and is published with a hard link,
/// so it never exists without one. A lock left behind by a process that no
/// longer exists is reclaimed. Released on drop.
#[derive(Debug)]
pub struct CalibrationLock {
    lock_path: PathBuf,
    owned: bool,
}

impl CalibrationLock {
    /// Acquire the lock in `data_dir`, creating the directory if needed.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(|source| StoreError::LockIo {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let lock_path = data_dir.join(CALIBRATION_LOCK_FILE);

        // One retry after reclaiming a stale lock.
        for _ in 0..2 {
            match Self::create_exclusive(&lock_path) {
                Ok(()) => {
                    tracing::debug!(path = %lock_path.display(), pid = std::process::id(), "Acquired calibration lock");
                    return Ok(Self {
                        lock_path,
                        owned: true,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    match Self::holder(&lock_path) {
                        Some(pid) if Self::is_process_running(pid) => {
                            return Err(StoreError::LockHeld {
                                pid,
                                path: lock_path,
                            });
                        }
                        None if !Self::unreadable_is_stale(&lock_path) => {
                            return Err(StoreError::LockUnreadable { path: lock_path });
                        }
                        _ => {
                            tracing::info!(path = %lock_path.display(), "Removing stale calibration lock");
                            match fs::remove_file(&lock_path) {
                                Ok(()) => {}
                                // Released by its owner in the meantime
                                Err(e) if e.kind() == ErrorKind::NotFound => {}
                                Err(source) => {
                                    return Err(StoreError::LockIo {
                                        path: lock_path,
                                        source,
                                    })
                                }
                            }
                        }
                    }
                }
                Err(source) => {
                    return Err(StoreError::LockIo {
                        path: lock_path,
                        source,
                    })
                }
            }
        }

        Err(StoreError::LockIo {
            path: lock_path,
            source: std::io::Error::new(ErrorKind::AlreadyExists, "lock re-created concurrently"),
        })
    }

    /// Write the PID to a private staging file, then link it into place.
    /// `hard_link` fails with `AlreadyExists` when the lock is taken.
    fn create_exclusive(path: &Path) -> std::io::Result<()> {
        let pid = std::process::id();
        let staging = path.with_extension(format!("{pid}.tmp"));
        fs::write(&staging, format!("{pid}\n"))?;
        let linked = fs::hard_link(&staging, path);
        if let Err(e) = fs::remove_file(&staging) {
            tracing::warn!(path = %staging.display(), error = %e, "Failed to remove lock staging file");
        }
        linked
    }

    /// PID recorded in an existing lock file.
    fn holder(path: &Path) -> Option<u32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    /// Empty or garbled lock files count as stale only after the grace
    /// period, measured from their last modification. A file that is gone
    /// already counts as stale.
    fn unreadable_is_stale(path: &Path) -> bool {
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .is_ok_and(|age| age >= UNREADABLE_LOCK_GRACE),
            Err(e) => e.kind() == ErrorKind::NotFound,
        }
    }

    #[cfg(target_os = "linux")]
    fn is_process_running(pid: u32) -> bool {
        Path::new(&format!("/proc/{pid}")).exists()
    }

    #[cfg(not(target_os = "linux"))]
    fn is_process_running(_pid: u32) -> bool {
        // No cheap liveness probe; assume held.
        true
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Release the lock (called automatically on drop)
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove calibration lock");
            } else {
                tracing::debug!(path = %self.lock_path.display(), "Released calibration lock");
            }
            self.owned = false;
        }
    }
}

impl Drop for CalibrationLock {
    fn drop(&mut self) {
        self.release();
    }
}
