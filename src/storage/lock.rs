//! Cooperative lock around the workbook's read-modify-write cycle.
//!
//! Overlapping scheduled runs must not interleave their updates. The lock is
//! a file created with `create_new` holding an owner token. A guard only
//! removes the file while it still carries its own token, so a run whose lock
//! was taken over never releases the new owner's lock.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::StorageError;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: DateTime<Utc>,
    /// Empty for locks written without an owner token
    #[serde(default)]
    token: String,
}

/// Held lock on the workbook. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    token: String,
}

impl StoreLock {
    /// Take the lock, replacing a leftover lock older than `stale_after`.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Self, StorageError> {
        match Self::try_create(path) {
            Ok(lock) => return Ok(lock),
            Err(StorageError::Locked(_)) => {}
            Err(e) => return Err(e),
        }

        let observed = match fs::read_to_string(path) {
            Ok(contents) => contents,
            // Released between our attempts
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::try_create(path),
            Err(e) => return Err(e.into()),
        };

        match lock_age(path, &observed) {
            Some(age) if age > stale_after => {
                warn!(
                    "Taking over stale workbook lock {:?} ({}s old)",
                    path,
                    age.as_secs()
                );
                set_aside(path, &observed)?;
                Self::try_create(path)
            }
            _ => Err(StorageError::Locked(path.to_path_buf())),
        }
    }

    fn try_create(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::Locked(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let acquired_at = Utc::now();
        let info = LockInfo {
            pid: std::process::id(),
            acquired_at,
            token: new_token(acquired_at),
        };
        file.write_all(serde_json::to_string(&info)?.as_bytes())?;
        file.sync_all()?;

        debug!("Acquired workbook lock {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            token: info.token,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock file still carries this guard's token.
    pub fn is_held(&self) -> bool {
        read_info(&self.path).is_some_and(|info| info.token == self.token)
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if !self.is_held() {
            warn!(
                "Workbook lock {:?} was taken over by another run, leaving it in place",
                self.path
            );
            return;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released workbook lock {:?}", self.path),
            Err(e) => warn!("Failed to release workbook lock {:?}: {}", self.path, e),
        }
    }
}

/// pid, acquisition time and a process-local counter.
fn new_token(acquired_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        std::process::id(),
        acquired_at.timestamp_nanos_opt().unwrap_or_default(),
        NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
    )
}

fn read_info(path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Move the stale lock whose contents were `observed` out of the way.
///
/// The rename is atomic, so of several runs racing for the same stale lock
/// only one moves it. If the moved file is not the one judged stale, a fresh
/// lock slipped in first: it is linked back (never over an existing file)
/// and the caller stays locked out.
fn set_aside(path: &Path, observed: &str) -> Result<(), StorageError> {
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(".stale-{}", new_token(Utc::now())));
    let aside = PathBuf::from(aside);

    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let moved = fs::read_to_string(&aside).unwrap_or_default();
    if moved != observed {
        match fs::hard_link(&aside, path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => warn!("Failed to restore workbook lock {:?}: {}", path, e),
        }
        let _ = fs::remove_file(&aside);
        return Err(StorageError::Locked(path.to_path_buf()));
    }

    fs::remove_file(&aside)?;
    Ok(())
}

/// Age of an existing lock, from its recorded timestamp or file mtime.
fn lock_age(path: &Path, contents: &str) -> Option<Duration> {
    let recorded = serde_json::from_str::<LockInfo>(contents)
        .ok()
        .map(|info| info.acquired_at);

    let acquired = match recorded {
        Some(at) => at,
        None => {
            let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
            DateTime::<Utc>::from(modified)
        }
    };

    (Utc::now() - acquired).to_std().ok()
}
