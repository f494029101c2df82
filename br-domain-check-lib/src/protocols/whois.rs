//! WHOIS protocol implementation for domain availability checking.
//!
//! Queries the registry's WHOIS server directly over TCP port 43 and reads
//! the free-text answer. registro.br replies `% No match for domain "..."`
//! when there is no registration record.

use crate::error::VerifierError;
use crate::types::{Availability, DEFAULT_WHOIS_SERVER};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

pub const WHOIS_PORT: u16 = 43;

/// Pause before the single retry after a rate-limit notice.
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// WHOIS client speaking the plain TCP protocol.
#[derive(Clone)]
pub struct WhoisClient {
    server: String,
    port: u16,
    /// Upper bound for one lookup, including the rate-limit retry
    timeout: Duration,
}

impl WhoisClient {
    /// Create a new WHOIS client against whois.registro.br.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_WHOIS_SERVER, Duration::from_secs(10))
    }

    /// Create a new WHOIS client with custom server and timeout.
    pub fn with_config<S: Into<String>>(server: S, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            port: WHOIS_PORT,
            timeout,
        }
    }

    /// Use a non-standard port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Check domain availability using WHOIS.
    ///
    /// Every failure mode comes back as [`Availability::Error`].
    pub async fn check_domain(&self, domain: &str) -> Availability {
        debug!(%domain, server = %self.server, "WHOIS lookup");

        let result = tokio::time::timeout(self.timeout, self.lookup(domain)).await;

        match result {
            Ok(Ok(true)) => Availability::Available,
            Ok(Ok(false)) => Availability::Unavailable,
            Ok(Err(e)) => {
                debug!(%domain, error = %e, "WHOIS lookup failed");
                Availability::error(e.to_string())
            }
            Err(_) => Availability::error(
                VerifierError::timeout("WHOIS query", self.timeout).to_string(),
            ),
        }
    }

    async fn lookup(&self, domain: &str) -> Result<bool, VerifierError> {
        let output = self.query(domain).await?;

        if !is_rate_limited(&output) {
            return parse_whois_availability(domain, &output);
        }

        // Wait and retry once
        tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;
        let retry_output = self.query(domain).await?;
        if is_rate_limited(&retry_output) {
            return Err(VerifierError::whois(domain, "rate limited after retry"));
        }
        parse_whois_availability(domain, &retry_output)
    }

    /// Send one query and read the full response.
    async fn query(&self, domain: &str) -> Result<String, VerifierError> {
        let mut stream = TcpStream::connect((self.server.as_str(), self.port))
            .await
            .map_err(|e| {
                VerifierError::whois(
                    domain,
                    format!("Failed to connect to {}:{}: {}", self.server, self.port, e),
                )
            })?;

        stream
            .write_all(format!("{}\r\n", domain).as_bytes())
            .await
            .map_err(|e| VerifierError::whois(domain, format!("Failed to send query: {}", e)))?;

        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .await
            .map_err(|e| VerifierError::whois(domain, format!("Failed to read response: {}", e)))?;

        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decide availability from a WHOIS response. `Ok(true)` means available.
///
/// Available only when the registry explicitly reports no record; a response
/// with registration fields is taken; anything else is an error rather than a
/// guess.
fn parse_whois_availability(domain: &str, whois_output: &str) -> Result<bool, VerifierError> {
    let output_lower = whois_output.to_lowercase();

    if output_lower.trim().is_empty() {
        return Err(VerifierError::whois(domain, "empty WHOIS response"));
    }

    let available_patterns = [
        "no match for",
        "no match",
        "not found",
        "no entries found",
        "no data found",
        "object does not exist",
        "domain not found",
    ];

    let taken_patterns = [
        "domain:",
        "owner:",
        "owner-c:",
        "nserver:",
        "created:",
        "expires:",
        "changed:",
    ];

    if available_patterns
        .iter()
        .any(|pattern| output_lower.contains(pattern))
    {
        return Ok(true);
    }

    let taken_pattern_count = taken_patterns
        .iter()
        .filter(|pattern| output_lower.contains(*pattern))
        .count();

    if taken_pattern_count >= 2 {
        return Ok(false);
    }

    Err(VerifierError::whois(
        domain,
        "Unable to determine domain status from WHOIS response",
    ))
}

/// Check if the WHOIS output indicates rate limiting.
fn is_rate_limited(output: &str) -> bool {
    let output_lower = output.to_lowercase();
    let rate_limit_patterns = [
        "rate limit exceeded",
        "query rate limit",
        "too many requests",
        "try again later",
        "quota exceeded",
        "limit exceeded",
    ];

    rate_limit_patterns
        .iter()
        .any(|pattern| output_lower.contains(pattern))
}
