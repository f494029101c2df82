//! In-memory job tracking.
//!
//! One verification run is one [`Job`]. The store is injected into both the
//! submission path and the background run; the run's [`JobHandle`] is the
//! only writer for its job, while any number of pollers read snapshots.
//! Every update is applied as a single merge under the entry lock, so readers
//! see either the state before or after an update, never half of it.

use crate::error::VerifierError;
use crate::export::ExportArtifact;
use crate::normalize::Domain;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// State of one verification run.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Size of the domain set, fixed at creation
    pub total: usize,
    /// Lookups finished so far (never decreases, never exceeds `total`)
    pub processed: usize,
    /// Available domains in the order they were confirmed
    pub available_domains: Vec<Domain>,
    /// Lookups that ended in an error
    pub errors: usize,
    /// Domain most recently looked up (best effort)
    pub current_domain: Option<Domain>,
    /// Message of the fault that ended the run
    pub error: Option<String>,
    pub artifact: Option<ExportArtifact>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(id: String, total: usize) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            total,
            processed: 0,
            available_domains: Vec::new(),
            errors: 0,
            current_domain: None,
            error: None,
            artifact: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn available(&self) -> usize {
        self.available_domains.len()
    }

    /// Status as observers should see it.
    ///
    /// An explicit `error` always wins. Otherwise a job whose every domain
    /// has been processed counts as completed even before the run flips the
    /// stored status.
    pub fn effective_status(&self) -> JobStatus {
        match self.status {
            JobStatus::Error => JobStatus::Error,
            JobStatus::Completed => JobStatus::Completed,
            JobStatus::Processing if self.processed >= self.total => JobStatus::Completed,
            JobStatus::Processing => JobStatus::Processing,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.effective_status(),
            processed: self.processed,
            total: self.total,
            available: self.available(),
            available_domains: self
                .available_domains
                .iter()
                .map(|d| d.as_str().to_string())
                .collect(),
            current_domain: self
                .current_domain
                .as_ref()
                .map(|d| d.as_str().to_string())
                .unwrap_or_default(),
            errors: self.errors,
            error: self.error.clone(),
            output_file: self.artifact.as_ref().map(|a| a.filename.clone()),
            finished: self.status.is_terminal(),
        }
    }
}

/// Serializable progress view handed to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    pub available: usize,
    pub available_domains: Vec<String>,
    pub current_domain: String,
    pub errors: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_file: Option<String>,
    /// The run itself has ended (stored status is terminal)
    pub finished: bool,
}

/// Partial update merged into a job in one step.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    current_domain: Option<Domain>,
    processed: Option<usize>,
    available_domain: Option<Domain>,
    errors: Option<usize>,
    status: Option<JobStatus>,
    error: Option<String>,
    artifact: Option<ExportArtifact>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_domain(mut self, domain: Domain) -> Self {
        self.current_domain = Some(domain);
        self
    }

    pub fn processed(mut self, processed: usize) -> Self {
        self.processed = Some(processed);
        self
    }

    /// Append a newly confirmed available domain.
    pub fn available_domain(mut self, domain: Domain) -> Self {
        self.available_domain = Some(domain);
        self
    }

    pub fn errors(mut self, errors: usize) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn error<M: Into<String>>(mut self, message: M) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn artifact(mut self, artifact: ExportArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    fn apply(self, job: &mut Job) {
        if let Some(domain) = self.current_domain {
            job.current_domain = Some(domain);
        }
        if let Some(processed) = self.processed {
            job.processed = job.processed.max(processed).min(job.total);
        }
        if let Some(domain) = self.available_domain {
            job.available_domains.push(domain);
        }
        if let Some(errors) = self.errors {
            job.errors = job.errors.max(errors);
        }
        if let Some(artifact) = self.artifact {
            job.artifact = Some(artifact);
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
        if let Some(status) = self.status {
            job.status = status;
            if status.is_terminal() {
                job.finished_at = Some(Utc::now());
            }
        }
    }
}

struct JobEntry {
    job: Job,
    cancel: Arc<AtomicBool>,
    started: bool,
    finished: Option<Instant>,
}

/// Process-wide map from job id to job state.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<String, JobEntry>>,
    sequence: Arc<AtomicU64>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new job in `processing` state and return its id.
    pub fn create(&self, total: usize) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{}-{}", Utc::now().timestamp_millis(), seq);

        self.jobs.insert(
            id.clone(),
            JobEntry {
                job: Job::new(id.clone(), total),
                cancel: Arc::new(AtomicBool::new(false)),
                started: false,
                finished: None,
            },
        );
        debug!(job_id = %id, total, "job created");
        id
    }

    /// Merge a partial update into a job.
    ///
    /// Finished jobs are immutable; updating one is an error.
    pub fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), VerifierError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| VerifierError::job_not_found(job_id))?;

        if entry.job.status.is_terminal() {
            return Err(VerifierError::internal(format!(
                "job '{}' already finished",
                job_id
            )));
        }

        update.apply(&mut entry.job);
        if entry.job.status.is_terminal() {
            entry.finished = Some(Instant::now());
        }
        Ok(())
    }

    /// Copy of the current job state.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id).map(|entry| entry.job.clone())
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.get(job_id).map(|entry| entry.job.snapshot())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Take the single writer handle for a job.
    ///
    /// A job is verified exactly once: a second claim fails.
    pub fn claim(&self, job_id: &str) -> Result<JobHandle, VerifierError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| VerifierError::job_not_found(job_id))?;

        if entry.started {
            return Err(VerifierError::already_started(job_id));
        }
        entry.started = true;

        Ok(JobHandle {
            id: job_id.to_string(),
            total: entry.job.total,
            cancel: Arc::clone(&entry.cancel),
            store: self.clone(),
        })
    }

    /// Ask a running job to stop. Returns `false` if it had already finished.
    pub fn cancel(&self, job_id: &str) -> Result<bool, VerifierError> {
        let entry = self
            .jobs
            .get(job_id)
            .ok_or_else(|| VerifierError::job_not_found(job_id))?;

        if entry.job.status.is_terminal() {
            return Ok(false);
        }
        entry.cancel.store(true, Ordering::Relaxed);
        info!(%job_id, "cancellation requested");
        Ok(true)
    }

    /// Find the export artifact with the given file name.
    pub fn find_artifact(&self, filename: &str) -> Option<ExportArtifact> {
        self.jobs.iter().find_map(|entry| {
            entry
                .job
                .artifact
                .as_ref()
                .filter(|artifact| artifact.filename == filename)
                .cloned()
        })
    }

    /// Drop finished jobs older than `retention`. Returns how many were removed.
    pub fn evict_finished(&self, retention: Duration) -> usize {
        let mut removed = 0;
        self.jobs.retain(|_, entry| {
            let expired = entry
                .finished
                .map(|finished| finished.elapsed() >= retention)
                .unwrap_or(false);
            if expired {
                removed += 1;
            }
            !expired
        });
        if removed > 0 {
            info!(removed, "evicted finished jobs");
        }
        removed
    }
}

/// Writer handle for one job, held by its verification run.
#[derive(Clone)]
pub struct JobHandle {
    id: String,
    total: usize,
    cancel: Arc<AtomicBool>,
    store: JobStore,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn update(&self, update: JobUpdate) -> Result<(), VerifierError> {
        self.store.update(&self.id, update)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("total", &self.total)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
