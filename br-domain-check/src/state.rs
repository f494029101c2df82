//! Shared state injected into every handler.

use br_domain_check_lib::{ExtractionPipeline, VerificationService};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub service: VerificationService,
    pub pipeline: Arc<ExtractionPipeline>,
    /// Interval between streamed progress events
    pub progress_interval: Duration,
}

impl AppState {
    pub fn new(service: VerificationService, progress_interval: Duration) -> Self {
        Self {
            service,
            pipeline: Arc::new(ExtractionPipeline::default()),
            progress_interval,
        }
    }
}
