//! Availability checking for a single domain.
//!
//! [`AvailabilityChecker`] is the seam the batch verifier drives. The
//! production implementation is [`DomainChecker`], which queries RDAP first
//! and falls back to WHOIS; tests plug in scripted checkers instead.

use crate::error::VerifierError;
use crate::normalize::Domain;
use crate::protocols::{RdapClient, WhoisClient};
use crate::types::{Availability, CheckMethod, VerifierConfig};
use async_trait::async_trait;
use tracing::debug;

/// One availability lookup for one domain.
///
/// Implementations must not let faults escape: transport errors, timeouts and
/// unparseable responses are reported as [`Availability::Error`].
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn check(&self, domain: &Domain) -> Availability;
}

#[async_trait]
impl AvailabilityChecker for RdapClient {
    async fn check(&self, domain: &Domain) -> Availability {
        self.check_domain(domain.as_str()).await
    }
}

#[async_trait]
impl AvailabilityChecker for WhoisClient {
    async fn check(&self, domain: &Domain) -> Availability {
        self.check_domain(domain.as_str()).await
    }
}

/// Registry checker that coordinates the RDAP and WHOIS clients.
///
/// # Example
///
/// ```rust,no_run
/// use br_domain_check_lib::{normalize, AvailabilityChecker, DomainChecker};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = DomainChecker::new()?;
///     let domain = normalize("https://www.exemplo.com.br/")?;
///     println!("{}: {}", domain, checker.check(&domain).await);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DomainChecker {
    method: CheckMethod,
    whois_fallback: bool,
    rdap_client: RdapClient,
    whois_client: WhoisClient,
}

impl DomainChecker {
    /// Create a checker with default settings (RDAP, WHOIS fallback enabled).
    pub fn new() -> Result<Self, VerifierError> {
        Self::with_config(&VerifierConfig::default())
    }

    /// Create a checker from a verifier configuration.
    pub fn with_config(config: &VerifierConfig) -> Result<Self, VerifierError> {
        let rdap_client = RdapClient::with_config(&config.rdap_endpoint, config.lookup_timeout)?;
        let whois_client = WhoisClient::with_config(&config.whois_server, config.lookup_timeout);

        Ok(Self {
            method: config.method,
            whois_fallback: config.whois_fallback,
            rdap_client,
            whois_client,
        })
    }

    /// Replace the WHOIS client (custom port, test servers).
    pub fn with_whois_client(mut self, whois_client: WhoisClient) -> Self {
        self.whois_client = whois_client;
        self
    }

    pub fn method(&self) -> CheckMethod {
        self.method
    }

    /// Check availability of a single domain.
    ///
    /// 1. Queries the primary method
    /// 2. If that is RDAP, it failed, and fallback is enabled, queries WHOIS
    /// 3. If both fail, reports the RDAP error as it's usually more informative
    pub async fn check_domain(&self, domain: &str) -> Availability {
        match self.method {
            CheckMethod::Whois => self.whois_client.check_domain(domain).await,
            CheckMethod::Rdap => {
                let rdap_result = self.rdap_client.check_domain(domain).await;
                if !rdap_result.is_error() || !self.whois_fallback {
                    return rdap_result;
                }

                debug!(%domain, "RDAP failed, falling back to WHOIS");
                let whois_result = self.whois_client.check_domain(domain).await;
                if whois_result.is_error() {
                    rdap_result
                } else {
                    whois_result
                }
            }
        }
    }
}

#[async_trait]
impl AvailabilityChecker for DomainChecker {
    async fn check(&self, domain: &Domain) -> Availability {
        self.check_domain(domain.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn whois_answering(response: &'static str) -> WhoisClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        WhoisClient::with_config("127.0.0.1", Duration::from_secs(2)).with_port(port)
    }

    async fn rdap_returning(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    fn config_for(server: &MockServer) -> VerifierConfig {
        VerifierConfig::default()
            .with_rdap_endpoint(format!("{}/domain/", server.uri()))
            .with_lookup_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_rdap_success_skips_whois() {
        let server = rdap_returning(404).await;
        let checker = DomainChecker::with_config(&config_for(&server)).unwrap();
        assert_eq!(checker.check_domain("livre.br").await, Availability::Available);
    }

    #[tokio::test]
    async fn test_falls_back_to_whois_on_rdap_error() {
        let server = rdap_returning(503).await;
        let checker = DomainChecker::with_config(&config_for(&server))
            .unwrap()
            .with_whois_client(whois_answering("% No match for domain \"livre.br\"\n").await);

        assert_eq!(checker.check_domain("livre.br").await, Availability::Available);
    }

    #[tokio::test]
    async fn test_reports_rdap_error_when_both_fail() {
        let server = rdap_returning(503).await;
        let checker = DomainChecker::with_config(&config_for(&server))
            .unwrap()
            .with_whois_client(whois_answering("").await);

        match checker.check_domain("x.br").await {
            Availability::Error { reason } => assert!(reason.contains("503"), "{}", reason),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_fallback_when_disabled() {
        let server = rdap_returning(503).await;
        let config = config_for(&server).with_whois_fallback(false);
        let checker = DomainChecker::with_config(&config)
            .unwrap()
            .with_whois_client(whois_answering("% No match for domain \"x.br\"\n").await);

        assert!(checker.check_domain("x.br").await.is_error());
    }

    #[tokio::test]
    async fn test_whois_primary_method() {
        let config = VerifierConfig::default().with_method(CheckMethod::Whois);
        let checker = DomainChecker::with_config(&config)
            .unwrap()
            .with_whois_client(
                whois_answering("domain: x.br\nowner: Someone\nnserver: a.dns.br\n").await,
            );

        let domain = crate::normalize("x.br").unwrap();
        assert_eq!(checker.check(&domain).await, Availability::Unavailable);
    }
}
