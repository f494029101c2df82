// br-domain-check/tests/cli_integration.rs
//
// Every case here fails before any registry lookup, so no network is needed.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{NamedTempFile, TempDir};

/// Command isolated from the user's config files and `BDC_*` environment.
fn cli(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("br-domain-check").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    for (name, _) in std::env::vars() {
        if name.starts_with("BDC_") {
            cmd.env_remove(name);
        }
    }
    cmd
}

/// Helper to create a report file
fn create_report(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    fs::write(file.path(), content).expect("Failed to write to temp file");
    file
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_check_help_shows_verification_flags() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--error-cooldown"))
        .stdout(predicate::str::contains("--output-dir"));
}

#[test]
fn test_unknown_export_format() {
    let home = TempDir::new().unwrap();
    let report = create_report("Domain\nexemplo.com.br\n");

    cli(&home)
        .arg("check")
        .arg(report.path())
        .args(["--export-format", "pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown export format 'pdf'"));
}

#[test]
fn test_corrupt_workbook_report() {
    let home = TempDir::new().unwrap();
    let report = NamedTempFile::new().unwrap();
    fs::write(report.path(), b"PK\x03\x04 truncated").unwrap();

    cli(&home)
        .arg("check")
        .arg(report.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unreadable spreadsheet"));
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_check_missing_file() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .args(["check", "/nonexistent/report.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_batch_size_out_of_range() {
    let home = TempDir::new().unwrap();
    let report = create_report("Domain\nexemplo.com.br\n");

    cli(&home)
        .arg("check")
        .arg(report.path())
        .args(["--batch-size", "50"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--batch-size must be between 1 and 20"));
}

#[test]
fn test_invalid_duration_flag() {
    let home = TempDir::new().unwrap();
    let report = create_report("Domain\nexemplo.com.br\n");

    cli(&home)
        .arg("check")
        .arg(report.path())
        .args(["--batch-pause", "later"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--batch-pause"));
}

#[test]
fn test_report_without_domain_column() {
    let home = TempDir::new().unwrap();
    let report = create_report("Name,Count\nalice,3\nbob,5\n");

    cli(&home)
        .arg("check")
        .arg(report.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no column with domains or URLs found"));
}

#[test]
fn test_report_without_br_domains() {
    let home = TempDir::new().unwrap();
    let report = create_report("Domain\nexample.com\nhttps://exemplo.org/page\n");

    cli(&home)
        .arg("check")
        .arg(report.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No .br/.com.br domains found"));
}

#[test]
fn test_invalid_config_file() {
    let home = TempDir::new().unwrap();
    let config = create_report("[verifier]\nbatch_size = 99\n");
    let report = create_report("Domain\nexemplo.com.br\n");

    cli(&home)
        .arg("--config")
        .arg(config.path())
        .arg("check")
        .arg(report.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size must be between 1 and 20"));
}

#[test]
fn test_serve_rejects_bad_listen_address() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .args(["serve", "--listen", "not-an-address"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid listen address"));
}
