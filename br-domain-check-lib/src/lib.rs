//! # br-domain-check library
//!
//! Finds registrable `.br` / `.com.br` domains in link reports and verifies
//! their availability against the registro.br RDAP and WHOIS services.
//!
//! A verification run normalizes and deduplicates the candidates, checks them
//! in small paced batches (backing off when the registry keeps failing), and
//! reports progress through an in-memory job store that any number of
//! observers may poll while the run continues in the background.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use br_domain_check_lib::{Exporter, VerificationService, VerifierConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = VerificationService::from_config(&VerifierConfig::default(), Exporter::new())?;
//!     let submission = service.submit(["https://www.exemplo.com.br/pagina", "outro.br"])?;
//!
//!     loop {
//!         let progress = service.progress(&submission.job_id)?;
//!         println!("{}/{}", progress.processed, progress.total);
//!         if progress.finished {
//!             println!("available: {:?}", progress.available_domains);
//!             break;
//!         }
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!     }
//!     Ok(())
//! }
//! ```

// Re-export main public API types and functions
pub use checker::{AvailabilityChecker, DomainChecker};
pub use config::{
    load_env_config, parse_duration_string, ConfigManager, EnvConfig, FileConfig, ServerSettings,
    Settings, DEFAULT_LISTEN,
};
pub use error::VerifierError;
pub use export::{ExportArtifact, ExportFormat, Exporter, CSV_CONTENT_TYPE, XLSX_CONTENT_TYPE};
pub use extract::{
    DomainColumn, Extraction, ExtractionPipeline, ExtractionStrategy, SourceTargetColumns, Table,
    UrlLikeColumns,
};
pub use jobs::{Job, JobHandle, JobSnapshot, JobStatus, JobStore, JobUpdate};
pub use normalize::{normalize, Domain, DomainSet};
pub use protocols::{RdapClient, WhoisClient, WHOIS_PORT};
pub use service::{Submission, VerificationService};
pub use types::{Availability, CheckMethod, VerifierConfig};
pub use verifier::{BatchVerifier, RunSummary};

mod checker;
mod config;
mod error;
mod export;
mod extract;
mod jobs;
mod normalize;
mod protocols;
mod service;
mod types;
mod verifier;

#[cfg(test)]
mod test_support;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VerifierError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
