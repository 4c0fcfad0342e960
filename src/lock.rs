use crate::errors::{AppError, AppResult};
use crate::store::LOCK_EXT;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    AlreadyHeld,
    HeldByOther(String),
}

/// External mutual-exclusion primitive gating single-writer access per job.
///
/// The grant is advisory: it constrains cooperating callers only, and is
/// never reclaimed automatically if a holder terminates abnormally. There
/// is no lease, timeout, or staleness recovery anywhere behind this trait.
pub trait LockService {
    fn acquire(&self, owner_id: &str, resource: &str) -> AppResult<AcquireOutcome>;
    fn release(&self, owner_id: &str, resource: &str) -> AppResult<()>;
    fn current_owner(&self, resource: &str) -> AppResult<Option<String>>;
}

/// Protocol used by the store's callers: acquiring and already-holding are
/// both success (reentrant by identity); any other holder means `InUse`.
pub fn acquire_or_in_use(
    locks: &dyn LockService,
    owner_id: &str,
    resource: &str,
) -> AppResult<()> {
    match locks.acquire(owner_id, resource)? {
        AcquireOutcome::Acquired | AcquireOutcome::AlreadyHeld => Ok(()),
        AcquireOutcome::HeldByOther(owner) => Err(AppError::InUse(owner)),
    }
}

/// Default lock service over the store's `{job_id}.lock` marker files: an
/// empty or absent marker is free, a claimed marker holds the owner's name.
#[derive(Debug, Clone)]
pub struct MarkerFileLock {
    dir: PathBuf,
}

impl MarkerFileLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn marker_path(&self, resource: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", resource, LOCK_EXT))
    }

    fn read_owner(&self, resource: &str) -> AppResult<Option<String>> {
        match fs::read_to_string(self.marker_path(resource)) {
            Ok(content) => {
                let owner = content.trim();
                if owner.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(owner.to_string()))
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(AppError::Io(error.to_string())),
        }
    }
}

impl LockService for MarkerFileLock {
    fn acquire(&self, owner_id: &str, resource: &str) -> AppResult<AcquireOutcome> {
        match self.read_owner(resource)? {
            Some(owner) if owner == owner_id => Ok(AcquireOutcome::AlreadyHeld),
            Some(owner) => Ok(AcquireOutcome::HeldByOther(owner)),
            None => {
                fs::write(self.marker_path(resource), owner_id)
                    .map_err(|error| AppError::Io(error.to_string()))?;
                tracing::debug!(resource, owner_id, "lock marker claimed");
                Ok(AcquireOutcome::Acquired)
            }
        }
    }

    fn release(&self, owner_id: &str, resource: &str) -> AppResult<()> {
        match self.read_owner(resource)? {
            Some(owner) if owner == owner_id => {
                fs::write(self.marker_path(resource), b"")
                    .map_err(|error| AppError::Io(error.to_string()))?;
                tracing::debug!(resource, owner_id, "lock marker released");
                Ok(())
            }
            Some(owner) => Err(AppError::Security(format!(
                "lock on {} belongs to user '{}'",
                resource, owner
            ))),
            None => Ok(()),
        }
    }

    fn current_owner(&self, resource: &str) -> AppResult<Option<String>> {
        self.read_owner(resource)
    }
}
