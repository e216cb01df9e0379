//! Named mutual-exclusion lock with bounded waiting.
//!
//! One [`NamedLock`] guards a whole storage backend. Inside a process the
//! lock is a tokio mutex; when a lock file is configured an advisory file
//! lock is taken as well, so separate server processes sharing a data
//! directory are serialized too. Both are released when the [`LockGuard`]
//! is dropped.

use crate::error::{FormspoolError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Default time a request waits for the ledger lock.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);

const FILE_LOCK_POLL: Duration = Duration::from_millis(25);

#[derive(Clone)]
pub struct NamedLock {
    name: String,
    inner: Arc<Mutex<()>>,
    lock_file: Option<Arc<File>>,
}

impl NamedLock {
    /// A lock that only serializes tasks within this process.
    pub fn in_process(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(())),
            lock_file: None,
        }
    }

    /// A lock that also takes an advisory lock on `path`. The file is
    /// created and opened here, once.
    pub fn with_lock_file(name: &str, path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        Ok(Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(())),
            lock_file: Some(Arc::new(file)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while some guard for this lock is alive in this process.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Wait up to `wait` for the lock.
    ///
    /// # Errors
    ///
    /// [`FormspoolError::LockTimeout`] if the lock is still held when the
    /// wait expires. Nothing is left locked in that case.
    pub async fn acquire(&self, wait: Duration) -> Result<LockGuard> {
        let started = Instant::now();
        let deadline = started + wait;

        let guard = tokio::time::timeout(wait, Arc::clone(&self.inner).lock_owned())
            .await
            .map_err(|_| self.timeout_error(wait))?;

        let file = match &self.lock_file {
            Some(file) => match lock_file_until(file, deadline).await? {
                Some(file) => Some(file),
                None => return Err(self.timeout_error(wait)),
            },
            None => None,
        };

        tracing::debug!(
            "[LOCK {}] acquired after {}ms",
            self.name,
            started.elapsed().as_millis()
        );

        Ok(LockGuard {
            name: self.name.clone(),
            file,
            acquired_at: Instant::now(),
            _guard: guard,
        })
    }

    fn timeout_error(&self, wait: Duration) -> FormspoolError {
        tracing::warn!(
            "[LOCK {}] not acquired within {}ms",
            self.name,
            wait.as_millis()
        );
        FormspoolError::LockTimeout {
            lock: self.name.clone(),
            waited_ms: wait.as_millis() as u64,
        }
    }
}

/// Poll for an exclusive advisory lock until `deadline`. `None` means the
/// deadline passed while another process held the file.
async fn lock_file_until(file: &Arc<File>, deadline: Instant) -> Result<Option<Arc<File>>> {
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(Some(Arc::clone(file))),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                tokio::time::sleep(FILE_LOCK_POLL).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Holds the lock until dropped.
pub struct LockGuard {
    name: String,
    file: Option<Arc<File>>,
    acquired_at: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(file.as_ref()) {
                tracing::warn!("[LOCK {}] failed to unlock lock file: {}", self.name, e);
            }
        }
        tracing::debug!(
            "[LOCK {}] released after {}ms",
            self.name,
            self.acquired_at.elapsed().as_millis()
        );
    }
}
