//! Error handling for extraction, verification and job bookkeeping.
//!
//! Per-domain lookup failures are deliberately *not* represented here: a
//! checker folds them into [`Availability::Error`](crate::Availability) so a
//! single flaky response can never abort a run. `VerifierError` covers
//! everything else: rejected input, configuration problems, unknown jobs and
//! faults that end a run.

use std::fmt;
use std::time::Duration;

/// Main error type for the library.
#[derive(Debug, Clone)]
pub enum VerifierError {
    /// Candidate string could not be normalized into a `.br` domain
    InvalidDomain { input: String, reason: String },

    /// Uploaded table could not be read
    InvalidUpload { message: String },

    /// Nothing in the submission survived normalization
    NoDomainsFound { candidates: usize },

    /// Network-related errors (connection, TLS, client construction)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// RDAP protocol specific errors
    RdapError {
        domain: String,
        message: String,
        status_code: Option<u16>,
    },

    /// WHOIS protocol specific errors
    WhoisError { domain: String, message: String },

    /// Operation exceeded its time budget
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Configuration errors (invalid settings, unparsable files)
    ConfigError { message: String },

    /// File I/O errors when reading configuration or writing exports
    FileError { path: String, message: String },

    /// No job with this identifier is tracked
    JobNotFound { job_id: String },

    /// No job produced an export with this file name
    ArtifactNotFound { filename: String },

    /// A verification run was already started for this job
    AlreadyStarted { job_id: String },

    /// The run was stopped by a client request
    Cancelled { job_id: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl VerifierError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<I: Into<String>, R: Into<String>>(input: I, reason: R) -> Self {
        Self::InvalidDomain {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid upload error.
    pub fn invalid_upload<M: Into<String>>(message: M) -> Self {
        Self::InvalidUpload {
            message: message.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new RDAP error.
    pub fn rdap<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new RDAP error with HTTP status code.
    pub fn rdap_with_status<D: Into<String>, M: Into<String>>(
        domain: D,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new WHOIS error.
    pub fn whois<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::WhoisError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn job_not_found<J: Into<String>>(job_id: J) -> Self {
        Self::JobNotFound {
            job_id: job_id.into(),
        }
    }

    pub fn artifact_not_found<F: Into<String>>(filename: F) -> Self {
        Self::ArtifactNotFound {
            filename: filename.into(),
        }
    }

    pub fn already_started<J: Into<String>>(job_id: J) -> Self {
        Self::AlreadyStarted {
            job_id: job_id.into(),
        }
    }

    pub fn cancelled<J: Into<String>>(job_id: J) -> Self {
        Self::Cancelled {
            job_id: job_id.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller sent something unusable (bad upload, no `.br` domains).
    ///
    /// These are reported to the submitter immediately and never create a job.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUpload { .. } | Self::NoDomainsFound { .. } | Self::InvalidDomain { .. }
        )
    }

    /// Whether the error refers to an unknown job or export file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::JobNotFound { .. } | Self::ArtifactNotFound { .. }
        )
    }

    /// Check if this error suggests the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. }
                | Self::Timeout { .. }
                | Self::RdapError {
                    status_code: Some(429 | 500..=599),
                    ..
                }
        )
    }
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { input, reason } => {
                write!(f, "Invalid domain '{}': {}", input, reason)
            }
            Self::InvalidUpload { message } => write!(f, "Invalid upload: {}", message),
            Self::NoDomainsFound { candidates } => write!(
                f,
                "No .br/.com.br domains found among {} candidate value(s)",
                candidates
            ),
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::RdapError {
                domain,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "RDAP error for '{}' (HTTP {}): {}", domain, code, message)
                } else {
                    write!(f, "RDAP error for '{}': {}", domain, message)
                }
            }
            Self::WhoisError { domain, message } => {
                write!(f, "WHOIS error for '{}': {}", domain, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::ConfigError { message } => write!(f, "Configuration error: {}", message),
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::JobNotFound { job_id } => write!(f, "Job '{}' not found", job_id),
            Self::ArtifactNotFound { filename } => write!(f, "File '{}' not found", filename),
            Self::AlreadyStarted { job_id } => {
                write!(f, "Verification for job '{}' was already started", job_id)
            }
            Self::Cancelled { .. } => write!(f, "cancelled"),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for VerifierError {}

impl From<reqwest::Error> for VerifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<std::io::Error> for VerifierError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
