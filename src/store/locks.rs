//! Per-device serialization.
//!
//! Two layers: an in-process table of mutexes keyed by device id, and, when
//! enabled, an exclusive advisory `flock()` on `<data_dir>/<device>.lock` so that
//! separate processes operating on the same data directory serialize as well.
//! Guards release both layers on drop.

use std::collections::HashMap;
#[cfg(unix)]
use std::fs::{self, File, OpenOptions};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use crate::core::errors::{RdsError, Result};
use crate::store::record::DeviceId;

/// Lock table shared by all operations of one engine.
#[derive(Debug, Default)]
pub struct DeviceLocks {
    table: Mutex<HashMap<DeviceId, Arc<Mutex<()>>>>,
    lock_files: bool,
}

/// Held for the duration of one device operation.
pub struct DeviceGuard {
    // Field order matters: the file lock is released before the in-process one.
    #[cfg(unix)]
    _file: Option<nix::fcntl::Flock<File>>,
    _local: ArcMutexGuard<RawMutex, ()>,
}

impl std::fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGuard").finish_non_exhaustive()
    }
}

impl DeviceLocks {
    /// `lock_files` enables the cross-process layer.
    #[must_use]
    pub fn new(lock_files: bool) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            lock_files,
        }
    }

    /// Block until `device` is exclusively held by the caller, for a write.
    ///
    /// `lock_path` is only touched when file locks are enabled; it and its parent
    /// directory are created if needed. Failing to create either is a storage
    /// failure.
    pub fn acquire(&self, device: &DeviceId, lock_path: &Path) -> Result<DeviceGuard> {
        let local = self.local(device);

        #[cfg(unix)]
        let file = if self.lock_files {
            Some(lock_file(device, lock_path, LockAccess::Create)?)
        } else {
            None
        };
        #[cfg(not(unix))]
        let _ = lock_path;

        Ok(DeviceGuard {
            #[cfg(unix)]
            _file: file,
            _local: local,
        })
    }

    /// Like [`Self::acquire`], but never creates anything on disk.
    ///
    /// Writers create the lock file before their first document, so when it is
    /// absent there is nothing another process could be writing and the
    /// in-process lock alone is taken.
    pub fn acquire_existing(&self, device: &DeviceId, lock_path: &Path) -> Result<DeviceGuard> {
        let local = self.local(device);

        #[cfg(unix)]
        let file = if self.lock_files {
            match lock_file(device, lock_path, LockAccess::Existing) {
                Ok(file) => Some(file),
                Err(RdsError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            None
        };
        #[cfg(not(unix))]
        let _ = lock_path;

        Ok(DeviceGuard {
            #[cfg(unix)]
            _file: file,
            _local: local,
        })
    }

    fn local(&self, device: &DeviceId) -> ArcMutexGuard<RawMutex, ()> {
        let slot = {
            let mut table = self.table.lock();
            // Idle slots are referenced by the table alone.
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(table.entry(device.clone()).or_default())
        };
        slot.lock_arc()
    }

    #[cfg(test)]
    fn tracked_devices(&self) -> usize {
        self.table.lock().len()
    }
}

#[cfg(unix)]
#[derive(Clone, Copy, PartialEq, Eq)]
enum LockAccess {
    Create,
    Existing,
}

#[cfg(unix)]
fn lock_file(
    device: &DeviceId,
    lock_path: &Path,
    access: LockAccess,
) -> Result<nix::fcntl::Flock<File>> {
    let create = access == LockAccess::Create;
    if create {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| RdsError::storage(parent, e))?;
        }
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(false)
        .mode(0o600)
        .open(lock_path)
        .map_err(|e| {
            if create {
                RdsError::storage(lock_path, e)
            } else {
                RdsError::io(lock_path, e)
            }
        })?;

    nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive).map_err(|(_file, e)| {
        RdsError::LockFailed {
            device: device.to_string(),
            details: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn id(raw: &str) -> DeviceId {
        DeviceId::parse(raw).unwrap()
    }

    #[test]
    fn same_device_is_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let locks = Arc::new(DeviceLocks::new(true));
        let inside = Arc::new(AtomicUsize::new(0));
        let lock_path = dir.path().join("radio1.lock");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let lock_path = lock_path.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = locks.acquire(&id("radio1"), &lock_path).unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::sleep(Duration::from_micros(200));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(locks.tracked_devices(), 1);
    }

    #[test]
    fn different_devices_do_not_block_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let locks = DeviceLocks::new(true);
        let _a = locks
            .acquire(&id("radio1"), &dir.path().join("radio1.lock"))
            .unwrap();
        let _b = locks
            .acquire(&id("radio2"), &dir.path().join("radio2.lock"))
            .unwrap();
        assert_eq!(locks.tracked_devices(), 2);
    }

    #[test]
    fn without_lock_files_nothing_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("radio1.lock");
        let locks = DeviceLocks::new(false);
        let _guard = locks.acquire(&id("radio1"), &lock_path).unwrap();
        assert!(!lock_path.exists());
    }

    #[test]
    fn idle_devices_are_pruned_from_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let locks = DeviceLocks::new(false);
        drop(locks.acquire(&id("radio1"), &dir.path().join("radio1.lock")).unwrap());
        let _held = locks
            .acquire(&id("radio2"), &dir.path().join("radio2.lock"))
            .unwrap();
        assert_eq!(locks.tracked_devices(), 1);
    }

    #[test]
    fn read_lock_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("devices");
        let lock_path = data_dir.join("radio1.lock");
        let locks = DeviceLocks::new(true);
        let _guard = locks.acquire_existing(&id("radio1"), &lock_path).unwrap();
        assert!(!data_dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn read_lock_uses_an_existing_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("radio1.lock");
        let locks = DeviceLocks::new(true);
        drop(locks.acquire(&id("radio1"), &lock_path).unwrap());
        assert!(lock_path.exists());
        let guard = locks.acquire_existing(&id("radio1"), &lock_path).unwrap();
        assert!(guard._file.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_lock_directory_is_a_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let locks = DeviceLocks::new(true);
        let err = locks
            .acquire(&id("radio1"), &blocker.join("devices").join("radio1.lock"))
            .unwrap_err();
        assert!(err.is_storage_failure(), "{err}");
        assert!(!err.is_retryable());
    }
}
