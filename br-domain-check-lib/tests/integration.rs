// br-domain-check-lib/tests/integration.rs

//! Integration tests for br-domain-check-lib exports and the full pipeline:
//! upload bytes -> extraction -> normalization -> verification -> export.

use async_trait::async_trait;
use br_domain_check_lib::{
    normalize, Availability, AvailabilityChecker, BatchVerifier, Domain, DomainSet, Exporter,
    ExtractionPipeline, JobStatus, JobSnapshot, VerificationService, VerifierConfig, WHOIS_PORT,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Reports the listed domains as available, everything else as taken.
struct FixedChecker {
    available: HashSet<String>,
}

impl FixedChecker {
    fn new(available: &[&str]) -> Self {
        Self {
            available: available.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[async_trait]
impl AvailabilityChecker for FixedChecker {
    async fn check(&self, domain: &Domain) -> Availability {
        if self.available.contains(domain.as_str()) {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }
}

fn fast_config() -> VerifierConfig {
    VerifierConfig::default()
        .with_batch_size(3)
        .with_batch_pause(Duration::from_millis(10))
        .with_error_cooldown(Duration::from_millis(50))
        .with_lookup_timeout(Duration::from_secs(2))
}

fn service_with(checker: FixedChecker) -> VerificationService {
    VerificationService::new(
        BatchVerifier::new(Arc::new(checker), fast_config()),
        Exporter::new(),
    )
}

async fn wait_finished(service: &VerificationService, job_id: &str) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = service.progress(job_id).unwrap();
        if snapshot.finished {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} did not finish", job_id);
}

#[test]
fn test_library_exports_work() {
    let domain = normalize("https://www.Loja.com.br/produto").unwrap();
    assert_eq!(domain.as_str(), "loja.com.br");

    let set = DomainSet::from_candidates(["a.br", "A.BR", "x.a.br", "nope.com"]);
    assert_eq!(set.len(), 1);
    assert_eq!(set.rejected(), 1);

    let pipeline = ExtractionPipeline::default();
    assert_eq!(
        pipeline.strategy_names(),
        vec!["domain-column", "source-target-columns", "url-like-columns"]
    );

    assert_eq!(WHOIS_PORT, 43);
}

#[tokio::test]
async fn test_backlink_report_end_to_end() {
    let csv = "Source url,Target url,Anchor\r\n\
               https://www.blog.livre.com.br/post,https://meusite.com.br,link\r\n\
               http://forum.ocupado.br/t/1,https://meusite.com.br/sobre,ver\r\n\
               https://example.com/x,https://meusite.com.br,aqui\r\n";

    let extraction = ExtractionPipeline::default()
        .extract_csv(csv.as_bytes())
        .unwrap();
    assert_eq!(extraction.strategy, "source-target-columns");

    let service = service_with(FixedChecker::new(&["livre.com.br"]));
    let submission = service.submit(&extraction.candidates).unwrap();
    assert_eq!(submission.total, 3); // livre.com.br, ocupado.br, meusite.com.br
    assert_eq!(submission.rejected, 1); // example.com

    let snapshot = wait_finished(&service, &submission.job_id).await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.processed, 3);
    assert_eq!(snapshot.available_domains, vec!["livre.com.br"]);

    let artifact = service
        .download(snapshot.output_file.as_deref().unwrap())
        .unwrap();
    assert_eq!(&artifact.bytes[..], b"Domain\nlivre.com.br\n");
}

#[tokio::test]
async fn test_all_taken_produces_no_export() {
    let service = service_with(FixedChecker::new(&[]));
    let submission = service
        .submit(["http://www.Foo.com.br/page", "bar.br", "not-a-domain", "foo.com.br"])
        .unwrap();
    assert_eq!(submission.total, 2);

    let snapshot = wait_finished(&service, &submission.job_id).await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.available, 0);
    assert!(snapshot.available_domains.is_empty());
    assert!(snapshot.output_file.is_none());
}

#[tokio::test]
async fn test_rdap_backed_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/domain/livre.com.br"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/domain/ocupado.br"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/domain/quebrado.br"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = fast_config()
        .with_rdap_endpoint(format!("{}/domain/", server.uri()))
        .with_whois_fallback(false);
    let service = VerificationService::from_config(&config, Exporter::new()).unwrap();

    let submission = service
        .submit(["livre.com.br", "ocupado.br", "quebrado.br"])
        .unwrap();
    let snapshot = wait_finished(&service, &submission.job_id).await;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.available_domains, vec!["livre.com.br"]);
    assert_eq!(snapshot.errors, 1);
}

#[tokio::test]
async fn test_export_written_to_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let service = VerificationService::new(
        BatchVerifier::new(Arc::new(FixedChecker::new(&["a.br"])), fast_config()),
        Exporter::new().with_output_dir(dir.path()),
    );

    let submission = service.submit(["a.br"]).unwrap();
    let snapshot = wait_finished(&service, &submission.job_id).await;

    let filename = snapshot.output_file.unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join(&filename)).unwrap();
    assert_eq!(on_disk, "Domain\na.br\n");
}
