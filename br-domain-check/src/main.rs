//! br-domain-check application
//!
//! Runs the HTTP service (`serve`) or checks a single backlink / outbound-link
//! report from the terminal (`check`). Both drive br-domain-check-lib.

mod error;
mod routes;
mod server;
mod state;
mod ui;

use br_domain_check_lib::{
    load_env_config, parse_duration_string, CheckMethod, ConfigManager, DomainSet, ExportFormat,
    Exporter, ExtractionPipeline, JobSnapshot, Settings, VerificationService,
};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args as ClapArgs, Parser, Subcommand};
use console::Term;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// How often `check` refreshes its progress line.
const CHECK_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// CLI arguments for br-domain-check
#[derive(Parser, Debug)]
#[command(name = "br-domain-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find available .br domains in backlink and outbound-link reports")]
#[command(
    long_about = "Find available .br domains in backlink and outbound-link reports.\n\nExtracts candidate domains from an uploaded CSV or Excel report, checks them against the .br registry in small paced batches, and exports the available ones."
)]
#[command(styles = STYLES)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Use a specific config file instead of discovered ones
    #[arg(
        long = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Configuration"
    )]
    pub config: Option<String>,

    /// Show debug logs
    #[arg(short = 'v', long = "verbose", global = true, help_heading = "Configuration")]
    pub verbose: bool,

    /// Export format for available domains: csv or xlsx
    #[arg(long = "export-format", value_name = "FORMAT", global = true, help_heading = "Output")]
    pub export_format: Option<ExportFormat>,

    #[command(flatten)]
    pub verifier: VerifierArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service
    Serve {
        /// Address to listen on (default: 127.0.0.1:8000)
        #[arg(short = 'l', long = "listen", value_name = "ADDR")]
        listen: Option<String>,

        /// Also write exports to this directory
        #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Check one CSV or Excel report and export the available domains
    Check {
        /// Backlink or outbound-link report (CSV, XLSX, XLS or ODS)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory for the export (default: current directory)
        #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
}

/// Verification tuning shared by both commands.
#[derive(ClapArgs, Debug, Default)]
pub struct VerifierArgs {
    /// Domains checked concurrently per batch (1-20)
    #[arg(
        short = 'b',
        long = "batch-size",
        value_name = "N",
        global = true,
        help_heading = "Verification"
    )]
    pub batch_size: Option<usize>,

    /// Pause between batches (e.g. 500ms, 2s)
    #[arg(long = "batch-pause", value_name = "DURATION", global = true, help_heading = "Verification")]
    pub batch_pause: Option<String>,

    /// Consecutive lookup errors before cooling down
    #[arg(long = "error-threshold", value_name = "N", global = true, help_heading = "Verification")]
    pub error_threshold: Option<u32>,

    /// Cooldown after too many consecutive errors (e.g. 5s)
    #[arg(long = "error-cooldown", value_name = "DURATION", global = true, help_heading = "Verification")]
    pub error_cooldown: Option<String>,

    /// Per-lookup timeout (e.g. 10s)
    #[arg(long = "timeout", value_name = "DURATION", global = true, help_heading = "Verification")]
    pub timeout: Option<String>,

    /// Lookup protocol: rdap or whois
    #[arg(long = "method", value_name = "METHOD", global = true, help_heading = "Verification")]
    pub method: Option<CheckMethod>,

    /// Disable the WHOIS fallback for RDAP errors
    #[arg(long = "no-whois", global = true, help_heading = "Verification")]
    pub no_whois: bool,

    /// RDAP endpoint prefix (domain is appended)
    #[arg(long = "rdap-endpoint", value_name = "URL", global = true, help_heading = "Verification")]
    pub rdap_endpoint: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_tracing(&args);

    let settings = match build_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    debug!(?settings, "effective settings");

    let result = match args.command {
        Command::Serve { .. } => server::run(settings).await,
        Command::Check {
            ref file,
            ref output_dir,
        } => run_check(file, output_dir.as_deref(), settings).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise the service logs at info and `check` stays
/// quiet so the progress line is readable.
fn init_tracing(args: &Args) {
    let default_level = match (&args.command, args.verbose) {
        (_, true) => "debug",
        (Command::Serve { .. }, false) => "info",
        (Command::Check { .. }, false) => "warn",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    let v = &args.verifier;

    if let Some(batch_size) = v.batch_size {
        if batch_size == 0 || batch_size > 20 {
            return Err("--batch-size must be between 1 and 20".to_string());
        }
    }

    if v.error_threshold == Some(0) {
        return Err("--error-threshold must be at least 1".to_string());
    }

    let durations = [
        ("--batch-pause", &v.batch_pause),
        ("--error-cooldown", &v.error_cooldown),
        ("--timeout", &v.timeout),
    ];
    for (flag, value) in durations {
        if let Some(raw) = value {
            if parse_duration_string(raw).is_none() {
                return Err(format!(
                    "Invalid {} '{}'. Use a format like '500ms', '5s', '2m'",
                    flag, raw
                ));
            }
        }
    }

    if let Command::Check { file, .. } = &args.command {
        if !file.exists() {
            return Err(format!("File '{}' not found", file.display()));
        }
    }

    Ok(())
}

/// Layer the configuration: defaults, config file, `BDC_*` env, CLI flags.
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let manager = ConfigManager::new(args.verbose);

    let file_config = match args.config.as_ref().or(env_config.config.as_ref()) {
        Some(path) => manager.load_file(path)?,
        None => manager.discover_and_load()?,
    };

    let mut settings = Settings::default();
    settings.apply_file(&file_config)?;
    settings.apply_env(&env_config);
    apply_cli_args(&mut settings, args);

    Ok(settings)
}

/// CLI arguments always win over environment and config.
fn apply_cli_args(settings: &mut Settings, args: &Args) {
    let v = &args.verifier;
    let config = &mut settings.verifier;

    if let Some(batch_size) = v.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(pause) = v.batch_pause.as_deref().and_then(parse_duration_string) {
        config.batch_pause = pause;
    }
    if let Some(threshold) = v.error_threshold {
        config.error_threshold = threshold;
    }
    if let Some(cooldown) = v.error_cooldown.as_deref().and_then(parse_duration_string) {
        config.error_cooldown = cooldown;
    }
    if let Some(timeout) = v.timeout.as_deref().and_then(parse_duration_string) {
        config.lookup_timeout = timeout;
    }
    if let Some(method) = v.method {
        config.method = method;
    }
    // Only disables; without the flag config/env values are kept.
    if v.no_whois {
        config.whois_fallback = false;
    }
    if let Some(endpoint) = &v.rdap_endpoint {
        config.rdap_endpoint = endpoint.clone();
    }

    if let Some(format) = args.export_format {
        settings.server.export_format = format;
    }

    if let Command::Serve { listen, output_dir } = &args.command {
        if let Some(listen) = listen {
            settings.server.listen = listen.clone();
        }
        if let Some(dir) = output_dir {
            settings.server.output_dir = Some(dir.clone());
        }
    }
}

/// Check one report locally, printing progress until the job finishes.
///
/// Ctrl-C cancels the job; the partial summary is still printed.
async fn run_check(
    file: &Path,
    output_dir: Option<&Path>,
    settings: Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .or(settings.server.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| format!("Cannot read '{}': {}", file.display(), e))?;

    let pipeline = ExtractionPipeline::default();
    let extraction = pipeline.extract_upload(&bytes)?;
    info!(
        strategy = extraction.strategy,
        candidates = extraction.candidates.len(),
        "candidates extracted"
    );

    let exporter = Exporter::new()
        .with_output_dir(&output_dir)
        .with_format(settings.server.export_format);
    let service = VerificationService::from_config(&settings.verifier, exporter)?;
    let submission = service.submit_set(DomainSet::from_candidates(&extraction.candidates))?;

    ui::print_header(
        &file.display().to_string(),
        &submission,
        extraction.strategy,
        service.config(),
    );

    let started = Instant::now();
    let term = Term::stderr();
    let snapshot = watch_job(&service, &submission.job_id, &term).await?;
    ui::finish_progress(&term);

    ui::print_available(&snapshot);
    ui::print_summary(&snapshot, started.elapsed(), Some(output_dir.as_path()));

    match snapshot.error {
        Some(error) => Err(format!("verification stopped: {}", error).into()),
        None => Ok(()),
    }
}

/// Poll the job until its run has ended, cancelling it on Ctrl-C.
async fn watch_job(
    service: &VerificationService,
    job_id: &str,
    term: &Term,
) -> Result<JobSnapshot, Box<dyn std::error::Error>> {
    let mut ticker = tokio::time::interval(CHECK_POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                ui::finish_progress(term);
                eprintln!("Cancelling after the current batch...");
                service.cancel(job_id)?;
            }
        }

        let snapshot = service.progress(job_id)?;
        if snapshot.finished {
            return Ok(snapshot);
        }
        ui::print_progress(term, &snapshot);
    }
}
