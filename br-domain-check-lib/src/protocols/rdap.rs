//! RDAP (Registration Data Access Protocol) implementation.
//!
//! registro.br answers `GET <endpoint>/<domain>` with 404 when no
//! registration exists and 200 with the registration record otherwise. Only
//! the status line matters for availability.

use crate::error::VerifierError;
use crate::types::{Availability, DEFAULT_RDAP_ENDPOINT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Pause before the single retry after an HTTP 429.
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// RDAP client for checking domain availability.
#[derive(Clone)]
pub struct RdapClient {
    /// HTTP client for making RDAP requests
    http_client: reqwest::Client,
    /// Base URL, the domain is appended
    endpoint: String,
    /// Upper bound for one lookup, including the rate-limit retry
    timeout: Duration,
}

impl RdapClient {
    /// Create a new RDAP client against the registro.br endpoint.
    pub fn new() -> Result<Self, VerifierError> {
        Self::with_config(DEFAULT_RDAP_ENDPOINT, Duration::from_secs(10))
    }

    /// Create a new RDAP client with a custom endpoint and timeout.
    pub fn with_config<E: Into<String>>(
        endpoint: E,
        timeout: Duration,
    ) -> Result<Self, VerifierError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(2)) // Add buffer for HTTP timeout
            .user_agent(concat!("br-domain-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                VerifierError::network_with_source(
                    "Failed to create RDAP HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// Full lookup URL for a domain.
    pub fn lookup_url(&self, domain: &str) -> String {
        if self.endpoint.ends_with('/') {
            format!("{}{}", self.endpoint, domain)
        } else {
            format!("{}/{}", self.endpoint, domain)
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check domain availability using RDAP.
    ///
    /// Every failure mode (transport error, unexpected status, timeout) comes
    /// back as [`Availability::Error`].
    pub async fn check_domain(&self, domain: &str) -> Availability {
        let rdap_url = self.lookup_url(domain);
        debug!(%domain, url = %rdap_url, "RDAP lookup");

        let result =
            tokio::time::timeout(self.timeout, self.make_rdap_request(&rdap_url, domain)).await;

        match result {
            Ok(Ok(availability)) => availability,
            Ok(Err(e)) => {
                debug!(%domain, error = %e, "RDAP lookup failed");
                Availability::error(e.to_string())
            }
            Err(_) => Availability::error(
                VerifierError::timeout("RDAP request", self.timeout).to_string(),
            ),
        }
    }

    async fn make_rdap_request(
        &self,
        rdap_url: &str,
        domain: &str,
    ) -> Result<Availability, VerifierError> {
        let status = self.fetch_status(rdap_url, domain).await?;

        if status != StatusCode::TOO_MANY_REQUESTS {
            return interpret_status(domain, status);
        }

        // Rate limited, try once more after a short delay
        debug!(%domain, "RDAP rate limited, retrying after {:?}", RATE_LIMIT_RETRY_DELAY);
        tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;

        let retry_status = self.fetch_status(rdap_url, domain).await?;
        if retry_status == StatusCode::TOO_MANY_REQUESTS {
            return Err(VerifierError::rdap_with_status(
                domain,
                "rate limited after retry",
                retry_status.as_u16(),
            ));
        }
        interpret_status(domain, retry_status)
    }

    async fn fetch_status(
        &self,
        rdap_url: &str,
        domain: &str,
    ) -> Result<StatusCode, VerifierError> {
        let response = self
            .http_client
            .get(rdap_url)
            .header("Accept", "application/rdap+json, application/json")
            .send()
            .await
            .map_err(|e| VerifierError::rdap(domain, format!("Request failed: {}", e)))?;

        Ok(response.status())
    }
}

/// Map an RDAP HTTP status to an availability verdict.
fn interpret_status(domain: &str, status: StatusCode) -> Result<Availability, VerifierError> {
    match status {
        StatusCode::NOT_FOUND => Ok(Availability::Available),
        StatusCode::OK => Ok(Availability::Unavailable),
        code => Err(VerifierError::rdap_with_status(
            domain,
            format!("RDAP server returned {}", code),
            code.as_u16(),
        )),
    }
}
