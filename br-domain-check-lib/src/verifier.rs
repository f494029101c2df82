//! Batched, paced verification of a domain set.
//!
//! The verifier walks a [`DomainSet`] in fixed-size batches. Lookups inside a
//! batch run concurrently; the next batch starts only after the whole batch
//! has finished, a fixed pause has elapsed, and (when the registry looks
//! unhealthy) a longer cooldown has been served. The job is updated after
//! every single lookup.

use crate::checker::AvailabilityChecker;
use crate::error::VerifierError;
use crate::jobs::{JobHandle, JobUpdate};
use crate::normalize::{Domain, DomainSet};
use crate::types::{Availability, VerifierConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Totals of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    /// Available domains in discovery order
    pub available: Vec<Domain>,
    pub errors: usize,
    /// How many error cooldowns were served
    pub cooldowns: usize,
}

/// Drives an [`AvailabilityChecker`] over a domain set.
#[derive(Clone)]
pub struct BatchVerifier {
    checker: Arc<dyn AvailabilityChecker>,
    config: VerifierConfig,
}

impl BatchVerifier {
    pub fn new(checker: Arc<dyn AvailabilityChecker>, config: VerifierConfig) -> Self {
        Self { checker, config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify every domain in `domains`, reporting into `job`.
    ///
    /// Lookup errors are counted, never returned. The run ends early only if
    /// the job is cancelled or a job update fails. Setting the terminal
    /// status is left to the caller.
    pub async fn run(
        &self,
        domains: &DomainSet,
        job: &JobHandle,
    ) -> Result<RunSummary, VerifierError> {
        let batch_size = self.config.batch_size.max(1);
        let threshold = self.config.error_threshold.max(1);
        let mut summary = RunSummary::default();
        let mut consecutive_errors: u32 = 0;

        info!(
            job_id = job.id(),
            total = domains.len(),
            batch_size,
            "verification started"
        );

        for (index, batch) in domains.as_slice().chunks(batch_size).enumerate() {
            if index > 0 && !self.config.batch_pause.is_zero() {
                tokio::time::sleep(self.config.batch_pause).await;
            }

            if consecutive_errors >= threshold {
                warn!(
                    job_id = job.id(),
                    consecutive_errors,
                    cooldown = ?self.config.error_cooldown,
                    "too many consecutive lookup errors, cooling down"
                );
                tokio::time::sleep(self.config.error_cooldown).await;
                consecutive_errors = 0;
                summary.cooldowns += 1;
            }

            if job.is_cancelled() {
                info!(job_id = job.id(), processed = summary.processed, "verification cancelled");
                return Err(VerifierError::cancelled(job.id()));
            }

            let checker = &self.checker;
            let mut lookups: FuturesUnordered<_> = batch
                .iter()
                .map(|domain| async move { (domain, checker.check(domain).await) })
                .collect();

            // Results are folded in completion order, which is also the
            // discovery order of available domains.
            while let Some((domain, result)) = lookups.next().await {
                summary.processed += 1;
                let mut update = JobUpdate::new()
                    .current_domain(domain.clone())
                    .processed(summary.processed);

                match result {
                    Availability::Available => {
                        consecutive_errors = 0;
                        debug!(%domain, "available");
                        summary.available.push(domain.clone());
                        update = update.available_domain(domain.clone());
                    }
                    Availability::Unavailable => {
                        consecutive_errors = 0;
                        debug!(%domain, "unavailable");
                    }
                    Availability::Error { reason } => {
                        consecutive_errors += 1;
                        summary.errors += 1;
                        warn!(%domain, %reason, consecutive_errors, "lookup failed");
                        update = update.errors(summary.errors);
                    }
                }

                job.update(update)?;
            }
        }

        info!(
            job_id = job.id(),
            processed = summary.processed,
            available = summary.available.len(),
            errors = summary.errors,
            "verification finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobStatus, JobStore};
    use crate::test_support::{fail, ScriptedChecker};
    use std::time::Duration;
    use tokio::time::Instant;

    fn config(batch_size: usize) -> VerifierConfig {
        VerifierConfig::default()
            .with_batch_size(batch_size)
            .with_batch_pause(Duration::from_millis(500))
            .with_error_threshold(3)
            .with_error_cooldown(Duration::from_secs(5))
    }

    fn setup(
        checker: ScriptedChecker,
        config: VerifierConfig,
        domains: &[&str],
    ) -> (Arc<ScriptedChecker>, BatchVerifier, DomainSet, JobStore, JobHandle) {
        let checker = Arc::new(checker);
        let verifier = BatchVerifier::new(checker.clone(), config);
        let set = DomainSet::from_candidates(domains);
        let store = JobStore::new();
        let id = store.create(set.len());
        let handle = store.claim(&id).unwrap();
        (checker, verifier, set, store, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_every_outcome() {
        let checker = ScriptedChecker::default()
            .answer("a.br", Availability::Available)
            .answer("c.br", fail());
        let (_, verifier, set, store, handle) =
            setup(checker, config(2), &["a.br", "b.br", "c.br", "d.br"]);

        let summary = verifier.run(&set, &handle).await.unwrap();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.available.len(), 1);

        let snapshot = store.snapshot(handle.id()).unwrap();
        assert_eq!(snapshot.processed, 4);
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.available, 1);
        assert_eq!(snapshot.available_domains, vec!["a.br"]);
        assert_eq!(snapshot.status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_paced() {
        let (checker, verifier, set, _store, handle) = setup(
            ScriptedChecker::default(),
            config(2),
            &["a.br", "b.br", "c.br", "d.br", "e.br"],
        );
        let start = Instant::now();

        verifier.run(&set, &handle).await.unwrap();

        let offsets: Vec<Duration> = checker
            .calls()
            .iter()
            .map(|(_, at)| *at - start)
            .collect();
        let pause = Duration::from_millis(500);
        assert_eq!(
            offsets,
            vec![Duration::ZERO, Duration::ZERO, pause, pause, pause * 2]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_batch_waits_for_slowest_lookup() {
        let checker = ScriptedChecker::default().delay("a.br", Duration::from_secs(2));
        let (checker, verifier, set, _store, handle) =
            setup(checker, config(2), &["a.br", "b.br", "c.br"]);
        let start = Instant::now();

        verifier.run(&set, &handle).await.unwrap();

        let calls = checker.calls();
        assert_eq!(calls[2].0, "c.br");
        assert_eq!(calls[2].1 - start, Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_errors_trigger_one_cooldown() {
        let checker = ScriptedChecker::default()
            .answer("e1.br", fail())
            .answer("e2.br", fail())
            .answer("e3.br", fail());
        let (checker, verifier, set, _store, handle) =
            setup(checker, config(1), &["e1.br", "e2.br", "e3.br", "ok.br", "ok2.br"]);

        let summary = verifier.run(&set, &handle).await.unwrap();
        assert_eq!(summary.cooldowns, 1);
        assert_eq!(summary.errors, 3);

        let calls = checker.calls();
        let gap = |i: usize| calls[i].1 - calls[i - 1].1;
        assert_eq!(gap(1), Duration::from_millis(500));
        assert_eq!(gap(2), Duration::from_millis(500));
        // pause plus cooldown before the 4th lookup
        assert_eq!(gap(3), Duration::from_millis(5500));
        assert_eq!(gap(4), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_error_streak() {
        let checker = ScriptedChecker::default()
            .answer("e1.br", fail())
            .answer("e2.br", fail())
            .answer("e4.br", fail())
            .answer("e5.br", fail());
        let (_, verifier, set, _store, handle) = setup(
            checker,
            config(1),
            &["e1.br", "e2.br", "ok.br", "e4.br", "e5.br", "last.br"],
        );

        let summary = verifier.run(&set, &handle).await.unwrap();
        assert_eq!(summary.errors, 4);
        assert_eq!(summary.cooldowns, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_streak_spans_batches() {
        let checker = ScriptedChecker::default()
            .answer("e1.br", fail())
            .answer("e2.br", fail())
            .answer("e3.br", fail());
        let (_, verifier, set, _store, handle) =
            setup(checker, config(2), &["e1.br", "e2.br", "ok.br", "e3.br", "x.br"]);

        // e1,e2 | ok,e3 | x : ok.br breaks the streak inside the second batch
        let summary = verifier.run(&set, &handle).await.unwrap();
        assert_eq!(summary.cooldowns, 0);

        let checker = ScriptedChecker::default()
            .answer("e1.br", fail())
            .answer("e2.br", fail())
            .answer("e3.br", fail())
            .answer("e4.br", fail());
        let (_, verifier, set, _store, handle) =
            setup(checker, config(2), &["e1.br", "e2.br", "e3.br", "e4.br", "x.br"]);
        let summary = verifier.run(&set, &handle).await.unwrap();
        assert_eq!(summary.cooldowns, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_available_list_in_discovery_order() {
        let checker = ScriptedChecker::default()
            .answer("slow.br", Availability::Available)
            .answer("fast.br", Availability::Available)
            .delay("slow.br", Duration::from_millis(300));
        let (_, verifier, set, store, handle) =
            setup(checker, config(2), &["slow.br", "fast.br"]);

        verifier.run(&set, &handle).await.unwrap();

        let snapshot = store.snapshot(handle.id()).unwrap();
        assert_eq!(snapshot.available_domains, vec!["fast.br", "slow.br"]);
        assert_eq!(snapshot.current_domain, "slow.br");
    }

    #[tokio::test(start_paused = true)]
    async fn test_processed_never_decreases() {
        let (_, verifier, set, store, handle) = setup(
            ScriptedChecker::default(),
            config(3),
            &["a.br", "b.br", "c.br", "d.br", "e.br", "f.br", "g.br"],
        );
        let id = handle.id().to_string();

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                loop {
                    let snapshot = store.snapshot(&id).unwrap();
                    assert!(snapshot.processed <= snapshot.total);
                    assert_eq!(snapshot.available, snapshot.available_domains.len());
                    seen.push(snapshot.processed);
                    if snapshot.processed == snapshot.total {
                        return seen;
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            })
        };

        verifier.run(&set, &handle).await.unwrap();
        let seen = reader.await.unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_before_next_batch() {
        let (checker, verifier, set, store, handle) = setup(
            ScriptedChecker::default(),
            config(1),
            &["a.br", "b.br", "c.br"],
        );
        let id = handle.id().to_string();

        let run = {
            let handle = handle.clone();
            tokio::spawn(async move { verifier.run(&set, &handle).await })
        };
        // first lookup runs at t=0, the second only after the 500ms pause
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.cancel(&id).unwrap());

        let result = run.await.unwrap();
        assert!(matches!(result, Err(VerifierError::Cancelled { .. })));
        assert!(checker.calls().len() < 3);
    }

    #[tokio::test]
    async fn test_empty_set_is_noop() {
        let (checker, verifier, set, _store, handle) =
            setup(ScriptedChecker::default(), config(3), &[]);

        let summary = verifier.run(&set, &handle).await.unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(checker.calls().is_empty());
    }
}
