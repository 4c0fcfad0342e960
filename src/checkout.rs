use crate::errors::{AppError, AppResult};
use crate::lock::{acquire_or_in_use, LockService};
use crate::models::{Job, ProjectStatus};
use crate::routing::WorkspaceValidator;
use crate::store::JobStore;
use std::path::PathBuf;

/// A job record checked out for editing under the lock service's grant.
/// Modifications to the job must only be persisted while the grant is held.
#[derive(Debug)]
pub struct JobCheckout {
    owner_id: String,
    job_id: String,
    pub job: Job,
    holds_grant: bool,
}

/// Open a job for editing. Both a fresh grant and one already held by the
/// same identity count as ownership; any other holder surfaces as `InUse`.
pub fn checkout(
    store: &JobStore,
    locks: &dyn LockService,
    owner_id: &str,
    job_id: &str,
) -> AppResult<JobCheckout> {
    if !store.exists(job_id)? {
        return Err(AppError::NotFound(format!("no backing files for job {}", job_id)));
    }
    acquire_or_in_use(locks, owner_id, job_id)?;
    let job = store.load(job_id)?;
    tracing::debug!(job_id, owner_id, "job checked out");
    Ok(JobCheckout {
        owner_id: owner_id.to_string(),
        job_id: job_id.to_string(),
        job,
        holds_grant: true,
    })
}

impl JobCheckout {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn holds_grant(&self) -> bool {
        self.holds_grant
    }

    /// Persist the record. The grant check and the write are two separate
    /// steps; the store itself never verifies ownership.
    pub fn save(&self, store: &JobStore) -> AppResult<()> {
        if !self.holds_grant {
            return Err(AppError::Security(format!(
                "rights to save job {} are not held by '{}'",
                self.job_id, self.owner_id
            )));
        }
        store.save(&self.job_id, &self.job)?;
        tracing::info!(job_id = %self.job_id, owner_id = %self.owner_id, "job saved");
        Ok(())
    }

    pub fn release(&mut self, locks: &dyn LockService) -> AppResult<()> {
        if self.holds_grant {
            locks.release(&self.owner_id, &self.job_id)?;
            self.holds_grant = false;
        }
        Ok(())
    }

    pub fn save_and_release(&mut self, store: &JobStore, locks: &dyn LockService) -> AppResult<()> {
        self.save(store)?;
        self.release(locks)
    }
}

/// Fix up a checked-out job whose recorded workspace is unset or not
/// reachable from this machine.
pub fn ensure_workspace(job: &mut Job, validator: &dyn WorkspaceValidator) -> AppResult<()> {
    let recorded = job.workspace.clone();
    if recorded.as_deref().is_some_and(|path| path.is_dir()) {
        return Ok(());
    }
    let resolved = validator.resolve(job.job_id(), recorded.as_deref())?;
    tracing::info!(job_id = %job.job_id(), workspace = %resolved.display(), "workspace revalidated");
    job.workspace = Some(resolved);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ProjectSeed {
    pub key: String,
    pub work_instructions: String,
    pub owner: String,
    pub due_date: String,
}

/// Admit one job into the system: create its backing files, seed its
/// projects under the lock, save, and release. Bulk admission repeats this
/// per job, one lock at a time.
pub fn admit_job(
    store: &JobStore,
    locks: &dyn LockService,
    owner_id: &str,
    job_id: &str,
    workspace: Option<PathBuf>,
    seeds: &[ProjectSeed],
) -> AppResult<()> {
    store.create(job_id, workspace)?;
    let mut session = checkout(store, locks, owner_id, job_id)?;
    for seed in seeds {
        session.job.add_project(
            &seed.key,
            &seed.work_instructions,
            &seed.owner,
            &seed.due_date,
            ProjectStatus::Unassigned,
        )?;
    }
    session.save(store)?;
    session.release(locks)?;
    tracing::info!(job_id, projects = seeds.len(), "job admitted");
    Ok(())
}
