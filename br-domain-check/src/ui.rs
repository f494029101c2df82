//! Terminal output for the `check` command.
//!
//! Progress goes to stderr on a single rewritten line so stdout only carries
//! the final list of available domains. Uses only the `console` crate.

use br_domain_check_lib::{JobSnapshot, JobStatus, Submission, VerifierConfig};
use console::{pad_str, style, Alignment, Term};
use std::path::Path;
use std::time::Duration;

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header once the report has been read.
pub fn print_header(file: &str, submission: &Submission, strategy: &str, config: &VerifierConfig) {
    eprintln!(
        "{} {} {}",
        style("br-domain-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Checking {} domain{} from {}",
            submission.total,
            plural(submission.total),
            file
        ))
        .dim(),
    );

    let meta_parts = [
        format!("Columns: {}", strategy),
        format!("Skipped: {}", submission.rejected),
        format!("Batch: {}", config.batch_size),
        format!("Pause: {}ms", config.batch_pause.as_millis()),
        format!("Method: {}", config.method),
    ];
    eprintln!("{}", style(meta_parts.join(" | ")).dim());
    eprintln!();
}

// ── Progress line ────────────────────────────────────────────────────────────

/// Render one progress line: `[processed/total] domain  N available  M errors`.
pub fn format_progress(snapshot: &JobSnapshot) -> String {
    let domain = pad_str(&snapshot.current_domain, 30, Alignment::Left, Some(".."));
    format!(
        "{} {}  {}  {}",
        style(format!("[{}/{}]", snapshot.processed, snapshot.total)).dim(),
        style(domain).white(),
        style(format!("{} available", snapshot.available)).green(),
        style(format!("{} errors", snapshot.errors)).yellow(),
    )
}

/// Overwrite the current stderr line with the latest progress.
pub fn print_progress(term: &Term, snapshot: &JobSnapshot) {
    let _ = term.clear_line();
    let _ = term.write_str(&format!("  {}", format_progress(snapshot)));
}

/// Clear the progress line.
pub fn finish_progress(term: &Term) {
    let _ = term.clear_line();
}

// ── Results ──────────────────────────────────────────────────────────────────

/// Print available domains to stdout, one per line.
pub fn print_available(snapshot: &JobSnapshot) {
    for domain in &snapshot.available_domains {
        println!("{}", domain);
    }
}

/// Print the final summary bar with colored counts.
pub fn print_summary(snapshot: &JobSnapshot, duration: Duration, output_dir: Option<&Path>) {
    let taken = snapshot
        .processed
        .saturating_sub(snapshot.available + snapshot.errors);

    eprintln!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    eprintln!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(snapshot.processed).bold(),
        plural(snapshot.processed),
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", snapshot.available)).green(),
        style("|").dim(),
        style(format!("{} taken", taken)).red(),
        style("|").dim(),
        style(format!("{} errors", snapshot.errors)).yellow(),
    );

    match snapshot.status {
        JobStatus::Error => eprintln!(
            "  {} {}",
            style("Stopped:").red().bold(),
            snapshot.error.as_deref().unwrap_or("unknown error")
        ),
        _ => match (&snapshot.output_file, output_dir) {
            (Some(file), Some(dir)) => eprintln!(
                "  {} {}",
                style("Saved:").green().bold(),
                dir.join(file).display()
            ),
            (Some(file), None) => eprintln!("  {} {}", style("Export:").green().bold(), file),
            (None, _) => eprintln!("  {}", style("No available domains found").dim()),
        },
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(processed: usize, total: usize, available: &[&str], errors: usize) -> JobSnapshot {
        JobSnapshot {
            job_id: "1-1".to_string(),
            status: JobStatus::Processing,
            processed,
            total,
            available: available.len(),
            available_domains: available.iter().map(|d| d.to_string()).collect(),
            current_domain: "exemplo.com.br".to_string(),
            errors,
            error: None,
            output_file: None,
            finished: false,
        }
    }

    #[test]
    fn test_format_progress_counts() {
        console::set_colors_enabled(false);
        let line = format_progress(&snapshot(3, 8, &["livre.br"], 1));

        assert!(line.starts_with("[3/8] exemplo.com.br"));
        assert!(line.contains("1 available"));
        assert!(line.contains("1 errors"));
    }

    #[test]
    fn test_format_progress_truncates_long_domains() {
        console::set_colors_enabled(false);
        let mut s = snapshot(1, 1, &[], 0);
        s.current_domain = "um-dominio-extremamente-comprido-demais.com.br".to_string();

        let line = format_progress(&s);
        assert!(line.contains(".."));
        assert!(!line.contains("demais.com.br"));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1), "");
        assert_eq!(plural(0), "s");
        assert_eq!(plural(2), "s");
    }
}
