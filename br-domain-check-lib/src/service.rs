//! The verification service: submission, background runs, progress and
//! downloads over one shared [`JobStore`].
//!
//! A submission normalizes and deduplicates the candidates, creates a job and
//! returns at once. The run itself happens on a spawned task; nothing flows
//! back to the submitter except through the store.

use crate::checker::{AvailabilityChecker, DomainChecker};
use crate::error::VerifierError;
use crate::export::{ExportArtifact, Exporter};
use crate::jobs::{JobHandle, JobSnapshot, JobStatus, JobStore, JobUpdate};
use crate::normalize::DomainSet;
use crate::types::VerifierConfig;
use crate::verifier::{BatchVerifier, RunSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Answer to an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub job_id: String,
    pub message: String,
    /// Unique domains that will be verified
    pub total: usize,
    /// Candidates dropped by normalization
    pub rejected: usize,
}

/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct VerificationService {
    store: JobStore,
    verifier: Arc<BatchVerifier>,
    exporter: Arc<Exporter>,
}

impl VerificationService {
    pub fn new(verifier: BatchVerifier, exporter: Exporter) -> Self {
        Self::with_store(JobStore::new(), verifier, exporter)
    }

    pub fn with_store(store: JobStore, verifier: BatchVerifier, exporter: Exporter) -> Self {
        Self {
            store,
            verifier: Arc::new(verifier),
            exporter: Arc::new(exporter),
        }
    }

    /// Service backed by the registry checker described by `config`.
    pub fn from_config(config: &VerifierConfig, exporter: Exporter) -> Result<Self, VerifierError> {
        let checker: Arc<dyn AvailabilityChecker> = Arc::new(DomainChecker::with_config(config)?);
        Ok(Self::new(BatchVerifier::new(checker, config.clone()), exporter))
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn config(&self) -> &VerifierConfig {
        self.verifier.config()
    }

    /// Normalize raw candidates and start a job for them.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit<I, S>(&self, candidates: I) -> Result<Submission, VerifierError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.submit_set(DomainSet::from_candidates(candidates))
    }

    /// Start a job for an already normalized domain set.
    pub fn submit_set(&self, domains: DomainSet) -> Result<Submission, VerifierError> {
        if domains.is_empty() {
            return Err(VerifierError::NoDomainsFound {
                candidates: domains.rejected(),
            });
        }

        let total = domains.len();
        let rejected = domains.rejected();
        let job_id = self.store.create(total);
        self.start(&job_id, domains)?;

        info!(%job_id, total, rejected, "job submitted");
        Ok(Submission {
            message: format!("Verification started for {} domain(s)", total),
            job_id,
            total,
            rejected,
        })
    }

    /// Spawn the background run for an existing job.
    ///
    /// A job runs at most once; a second start fails with `AlreadyStarted`.
    pub fn start(&self, job_id: &str, domains: DomainSet) -> Result<JoinHandle<()>, VerifierError> {
        let handle = self.store.claim(job_id)?;
        let verifier = Arc::clone(&self.verifier);
        let exporter = Arc::clone(&self.exporter);

        Ok(tokio::spawn(run_job(verifier, exporter, handle, domains)))
    }

    pub fn progress(&self, job_id: &str) -> Result<JobSnapshot, VerifierError> {
        self.store
            .snapshot(job_id)
            .ok_or_else(|| VerifierError::job_not_found(job_id))
    }

    pub fn download(&self, filename: &str) -> Result<ExportArtifact, VerifierError> {
        self.store
            .find_artifact(filename)
            .ok_or_else(|| VerifierError::artifact_not_found(filename))
    }

    /// Request cancellation. `Ok(false)` means the job had already finished.
    pub fn cancel(&self, job_id: &str) -> Result<bool, VerifierError> {
        self.store.cancel(job_id)
    }

    /// Periodically drop finished jobs older than `retention`.
    pub fn spawn_eviction(&self, retention: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.store.clone();
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                store.evict_finished(retention);
            }
        })
    }
}

async fn run_job(
    verifier: Arc<BatchVerifier>,
    exporter: Arc<Exporter>,
    handle: JobHandle,
    domains: DomainSet,
) {
    let job_id = handle.id().to_string();

    // The run gets its own task so a panic inside it still ends the job.
    let run = {
        let handle = handle.clone();
        tokio::spawn(async move { verifier.run(&domains, &handle).await })
    };

    let outcome = match run.await {
        Ok(Ok(summary)) => finish(&exporter, &handle, summary).await,
        Ok(Err(e)) => Err(e),
        Err(join_error) => Err(VerifierError::internal(format!(
            "verification task failed: {}",
            join_error
        ))),
    };

    let failure = match outcome {
        Ok(()) => return,
        Err(e) => e,
    };

    if matches!(failure, VerifierError::Cancelled { .. }) {
        info!(%job_id, "job cancelled");
    } else {
        error!(%job_id, error = %failure, "job failed");
    }

    let update = JobUpdate::new()
        .status(JobStatus::Error)
        .error(failure.to_string());
    if let Err(e) = handle.update(update) {
        warn!(%job_id, error = %e, "could not record job failure");
    }
}

async fn finish(
    exporter: &Exporter,
    handle: &JobHandle,
    summary: RunSummary,
) -> Result<(), VerifierError> {
    let mut update = JobUpdate::new().status(JobStatus::Completed);
    if let Some(artifact) = exporter.export(handle.id(), &summary.available).await? {
        info!(job_id = handle.id(), filename = %artifact.filename, "export ready");
        update = update.artifact(artifact);
    }

    handle.update(update)?;
    info!(
        job_id = handle.id(),
        available = summary.available.len(),
        errors = summary.errors,
        "job completed"
    );
    Ok(())
}
