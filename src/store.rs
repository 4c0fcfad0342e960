use crate::errors::{AppError, AppResult};
use crate::models::{is_job_id, Job};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub const RECORD_EXT: &str = "job";
pub const LOCK_EXT: &str = "lock";

const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordEnvelopeRef<'a> {
    schema_version: u32,
    #[serde(flatten)]
    job: &'a Job,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordEnvelope {
    schema_version: u32,
    #[serde(flatten)]
    job: Job,
}

pub(crate) fn decode_record(job_id: &str, bytes: &[u8]) -> AppResult<Job> {
    if bytes.is_empty() {
        return Err(AppError::Corrupt(format!("record for job {} is empty", job_id)));
    }
    let envelope: RecordEnvelope = serde_json::from_slice(bytes).map_err(|error| {
        AppError::Corrupt(format!("record for job {} is unreadable: {}", job_id, error))
    })?;
    if envelope.schema_version != SCHEMA_VERSION {
        return Err(AppError::Corrupt(format!(
            "record for job {} has schema version {}, expected {}",
            job_id, envelope.schema_version, SCHEMA_VERSION
        )));
    }
    Ok(envelope.job)
}

/// Flat-file store for job records on the shared network directory.
///
/// Each job owns two backing files named by its 6-digit id: `{id}.lock`
/// (advisory lock marker) and `{id}.job` (versioned JSON record). A
/// separate temp area holds the snapshot aggregator's short-lived copies.
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs_dir: PathBuf,
    temp_dir: PathBuf,
}

impl JobStore {
    pub fn connect(root: &Path) -> AppResult<Self> {
        let jobs_dir = root.join("jobs");
        let temp_dir = root.join("temp");
        fs::create_dir_all(&jobs_dir).map_err(|error| AppError::Io(error.to_string()))?;
        fs::create_dir_all(&temp_dir).map_err(|error| AppError::Io(error.to_string()))?;
        fs::read_dir(&jobs_dir).map_err(|error| AppError::Io(error.to_string()))?;
        Ok(Self { jobs_dir, temp_dir })
    }

    /// Host bootstrap policy: a bounded fixed-delay retry applied only at
    /// first connection. No other store operation retries.
    pub fn connect_with_retry(root: &Path, attempts: u32, delay: Duration) -> AppResult<Self> {
        let attempts = attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match Self::connect(root) {
                Ok(store) => return Ok(store),
                Err(error) => {
                    tracing::warn!(attempt, %error, "storage connection failed");
                    last_error = Some(error);
                    if attempt < attempts {
                        thread::sleep(delay);
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::Io("storage unreachable".to_string())))
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn record_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{}.{}", job_id, RECORD_EXT))
    }

    pub fn lock_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{}.{}", job_id, LOCK_EXT))
    }

    pub fn exists(&self, job_id: &str) -> AppResult<bool> {
        for entry in fs::read_dir(&self.jobs_dir).map_err(|error| AppError::Io(error.to_string()))? {
            let entry = entry.map_err(|error| AppError::Io(error.to_string()))?;
            if entry.file_name().to_string_lossy().starts_with(job_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn create(&self, job_id: &str, workspace: Option<PathBuf>) -> AppResult<Job> {
        if self.exists(job_id)? {
            return Err(AppError::AlreadyExists(format!(
                "job {} already has backing files",
                job_id
            )));
        }
        fs::write(self.lock_path(job_id), b"").map_err(|error| AppError::Io(error.to_string()))?;
        let job = Job::new(job_id, workspace);
        self.save(job_id, &job)?;
        tracing::info!(job_id, "created job record");
        Ok(job)
    }

    pub fn load(&self, job_id: &str) -> AppResult<Job> {
        let path = self.record_path(job_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("no record for job {}", job_id)));
            }
            Err(error) => return Err(AppError::Io(error.to_string())),
        };
        decode_record(job_id, &bytes)
    }

    /// Overwrite the backing record in place. The write is not atomic: an
    /// interrupted save leaves a truncated record, which `load` surfaces as
    /// `Corrupt`. Callers must hold the job's lock grant; the store trusts
    /// them (ownership is checked one layer up, in the checkout).
    pub fn save(&self, job_id: &str, job: &Job) -> AppResult<()> {
        let envelope = RecordEnvelopeRef {
            schema_version: SCHEMA_VERSION,
            job,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.record_path(job_id), bytes).map_err(|error| AppError::Io(error.to_string()))?;
        tracing::debug!(job_id, "saved job record");
        Ok(())
    }

    /// Job ids derived from the first six characters of backing filenames.
    pub fn list_active(&self) -> AppResult<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for entry in fs::read_dir(&self.jobs_dir).map_err(|error| AppError::Io(error.to_string()))? {
            let entry = entry.map_err(|error| AppError::Io(error.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(prefix) = name.get(..6) else {
                continue;
            };
            if is_job_id(prefix) {
                ids.insert(prefix.to_string());
            }
        }
        Ok(ids)
    }

    /// Delete every backing file for a job (administrative close).
    pub fn remove(&self, job_id: &str) -> AppResult<()> {
        let mut removed = 0usize;
        for entry in fs::read_dir(&self.jobs_dir).map_err(|error| AppError::Io(error.to_string()))? {
            let entry = entry.map_err(|error| AppError::Io(error.to_string()))?;
            if entry.file_name().to_string_lossy().starts_with(job_id) {
                fs::remove_file(entry.path()).map_err(|error| AppError::Io(error.to_string()))?;
                removed += 1;
            }
        }
        if removed == 0 {
            return Err(AppError::NotFound(format!("no backing files for job {}", job_id)));
        }
        tracing::info!(job_id, removed, "cleared job backing files");
        Ok(())
    }
}
