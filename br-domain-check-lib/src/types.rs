//! Core data types for availability verification.
//!
//! This module defines the per-lookup outcome, the lookup method selector and
//! the tunable knobs of a verification run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default RDAP base URL for the `.br` registry; the domain is appended.
pub const DEFAULT_RDAP_ENDPOINT: &str = "https://rdap.registro.br/domain/";

/// Default WHOIS server for the `.br` registry.
pub const DEFAULT_WHOIS_SERVER: &str = "whois.registro.br";

/// Outcome of one availability lookup.
///
/// Lookup faults (timeouts, transport errors, unexpected responses) are values
/// of this type, never `Err`s, so callers can count them without aborting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Availability {
    /// The registry holds no record for the domain
    Available,
    /// The domain is registered
    Unavailable,
    /// The lookup failed; availability is unknown
    Error { reason: String },
}

impl Availability {
    pub fn error<R: Into<String>>(reason: R) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Availability::Unavailable)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Availability::Error { .. })
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Unavailable => write!(f, "unavailable"),
            Availability::Error { reason } => write!(f, "error ({})", reason),
        }
    }
}

/// Primary protocol used to query the registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    /// HTTP RDAP endpoint keyed by domain
    #[default]
    Rdap,
    /// WHOIS protocol over TCP port 43
    Whois,
}

impl fmt::Display for CheckMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckMethod::Rdap => write!(f, "RDAP"),
            CheckMethod::Whois => write!(f, "WHOIS"),
        }
    }
}

impl std::str::FromStr for CheckMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rdap" => Ok(CheckMethod::Rdap),
            "whois" => Ok(CheckMethod::Whois),
            other => Err(format!("unknown check method '{}', use rdap or whois", other)),
        }
    }
}

/// Configuration of a verification run.
///
/// The pacing values exist to keep the sustained request rate against the
/// registry low; they vary between deployments, so all of them are tunable.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierConfig {
    /// Domains checked concurrently per batch.
    /// Default: 3, Range: 1-20
    pub batch_size: usize,

    /// Fixed pause between consecutive batches.
    /// Default: 500ms
    pub batch_pause: Duration,

    /// Consecutive lookup errors that trigger a cooldown.
    /// Default: 3
    pub error_threshold: u32,

    /// Length of the cooldown after `error_threshold` consecutive errors.
    /// Default: 5 seconds
    pub error_cooldown: Duration,

    /// Upper bound for one lookup (per protocol attempt).
    /// Default: 10 seconds
    pub lookup_timeout: Duration,

    /// Primary lookup protocol.
    /// Default: RDAP
    pub method: CheckMethod,

    /// Whether a failed RDAP lookup is retried over WHOIS.
    /// Default: true
    pub whois_fallback: bool,

    /// RDAP base URL; the domain name is appended.
    pub rdap_endpoint: String,

    /// WHOIS server host name (port 43).
    pub whois_server: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_pause: Duration::from_millis(500),
            error_threshold: 3,
            error_cooldown: Duration::from_secs(5),
            lookup_timeout: Duration::from_secs(10),
            method: CheckMethod::Rdap,
            whois_fallback: true,
            rdap_endpoint: DEFAULT_RDAP_ENDPOINT.to_string(),
            whois_server: DEFAULT_WHOIS_SERVER.to_string(),
        }
    }
}

impl VerifierConfig {
    /// Set the batch size, clamped to 1-20 to stay polite to the registry.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, 20);
        self
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    /// Set the consecutive-error threshold (at least 1).
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold.max(1);
        self
    }

    pub fn with_error_cooldown(mut self, cooldown: Duration) -> Self {
        self.error_cooldown = cooldown;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_method(mut self, method: CheckMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_whois_fallback(mut self, enabled: bool) -> Self {
        self.whois_fallback = enabled;
        self
    }

    pub fn with_rdap_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.rdap_endpoint = endpoint.into();
        self
    }

    pub fn with_whois_server<S: Into<String>>(mut self, server: S) -> Self {
        self.whois_server = server.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VerifierConfig::default();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.batch_pause, Duration::from_millis(500));
        assert_eq!(config.error_threshold, 3);
        assert_eq!(config.error_cooldown, Duration::from_secs(5));
        assert_eq!(config.method, CheckMethod::Rdap);
        assert!(config.whois_fallback);
    }

    #[test]
    fn test_builder_clamps() {
        let config = VerifierConfig::default()
            .with_batch_size(0)
            .with_error_threshold(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.error_threshold, 1);

        let config = VerifierConfig::default().with_batch_size(500);
        assert_eq!(config.batch_size, 20);
    }

    #[test]
    fn test_check_method_parse() {
        assert_eq!("RDAP".parse::<CheckMethod>(), Ok(CheckMethod::Rdap));
        assert_eq!(" whois ".parse::<CheckMethod>(), Ok(CheckMethod::Whois));
        assert!("dns".parse::<CheckMethod>().is_err());
    }

    #[test]
    fn test_availability_serialization() {
        let json = serde_json::to_value(Availability::error("timeout")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["reason"], "timeout");

        let json = serde_json::to_value(Availability::Available).unwrap();
        assert_eq!(json["status"], "available");
    }
}
