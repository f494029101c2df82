//! Configuration file parsing and management.
//!
//! Settings are layered, lowest precedence first: built-in defaults, TOML
//! files, `BDC_*` environment variables, and finally whatever the caller
//! applies on top (command-line flags).

use crate::error::VerifierError;
use crate::export::ExportFormat;
use crate::types::{CheckMethod, VerifierConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default address of the HTTP service.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Pacing and lookup settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier: Option<VerifierSection>,

    /// HTTP service settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,
}

/// `[verifier]` table. Durations are strings such as `"500ms"` or `"5s"`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VerifierSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_pause: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_cooldown: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_timeout: Option<String>,

    /// `rdap` or `whois`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_fallback: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap_endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_server: Option<String>,
}

/// `[server]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Directory where export files are also written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// How long finished jobs are kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval: Option<String>,

    /// Interval between streamed progress events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_interval: Option<String>,

    /// `csv` or `xlsx`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_format: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log every file that was considered
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, VerifierError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(VerifierError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            VerifierError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            VerifierError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config, then `~/.br-domain-check.toml`, then
    /// `./br-domain-check.toml`; later files win field by field. Files that
    /// exist but fail to load are reported and skipped.
    pub fn discover_and_load(&self) -> Result<FileConfig, VerifierError> {
        let mut merged_config = FileConfig::default();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    if self.verbose {
                        debug!(path = %path.display(), "loaded config file");
                    }
                    merged_config = self.merge_configs(merged_config, config);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring config file"),
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./br-domain-check.toml", "./.br-domain-check.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        let candidates = [".br-domain-check.toml", "br-domain-check.toml"];

        candidates
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("br-domain-check").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            verifier: match (lower.verifier, higher.verifier) {
                (Some(lower), Some(higher)) => Some(VerifierSection {
                    batch_size: higher.batch_size.or(lower.batch_size),
                    batch_pause: higher.batch_pause.or(lower.batch_pause),
                    error_threshold: higher.error_threshold.or(lower.error_threshold),
                    error_cooldown: higher.error_cooldown.or(lower.error_cooldown),
                    lookup_timeout: higher.lookup_timeout.or(lower.lookup_timeout),
                    method: higher.method.or(lower.method),
                    whois_fallback: higher.whois_fallback.or(lower.whois_fallback),
                    rdap_endpoint: higher.rdap_endpoint.or(lower.rdap_endpoint),
                    whois_server: higher.whois_server.or(lower.whois_server),
                }),
                (lower, higher) => higher.or(lower),
            },
            server: match (lower.server, higher.server) {
                (Some(lower), Some(higher)) => Some(ServerSection {
                    listen: higher.listen.or(lower.listen),
                    output_dir: higher.output_dir.or(lower.output_dir),
                    retention: higher.retention.or(lower.retention),
                    sweep_interval: higher.sweep_interval.or(lower.sweep_interval),
                    progress_interval: higher.progress_interval.or(lower.progress_interval),
                    export_format: higher.export_format.or(lower.export_format),
                }),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), VerifierError> {
        if let Some(verifier) = &config.verifier {
            if let Some(batch_size) = verifier.batch_size {
                if batch_size == 0 || batch_size > 20 {
                    return Err(VerifierError::config("batch_size must be between 1 and 20"));
                }
            }

            if verifier.error_threshold == Some(0) {
                return Err(VerifierError::config("error_threshold must be at least 1"));
            }

            if let Some(method) = &verifier.method {
                method.parse::<CheckMethod>().map_err(VerifierError::config)?;
            }

            validate_duration("batch_pause", verifier.batch_pause.as_deref())?;
            validate_duration("error_cooldown", verifier.error_cooldown.as_deref())?;
            validate_duration("lookup_timeout", verifier.lookup_timeout.as_deref())?;
        }

        if let Some(server) = &config.server {
            validate_duration("retention", server.retention.as_deref())?;
            validate_duration("sweep_interval", server.sweep_interval.as_deref())?;
            validate_duration("progress_interval", server.progress_interval.as_deref())?;

            if let Some(format) = &server.export_format {
                format.parse::<ExportFormat>().map_err(VerifierError::config)?;
            }
        }

        Ok(())
    }
}

fn validate_duration(field: &str, value: Option<&str>) -> Result<(), VerifierError> {
    match value {
        Some(value) if parse_duration_string(value).is_none() => Err(VerifierError::config(format!(
            "Invalid {} '{}'. Use a format like '500ms', '5s', '2m'",
            field, value
        ))),
        _ => Ok(()),
    }
}

/// Values read from `BDC_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub batch_size: Option<usize>,
    pub batch_pause: Option<Duration>,
    pub error_threshold: Option<u32>,
    pub error_cooldown: Option<Duration>,
    pub lookup_timeout: Option<Duration>,
    pub method: Option<CheckMethod>,
    pub whois_fallback: Option<bool>,
    pub listen: Option<String>,
    pub output_dir: Option<String>,
    pub retention: Option<Duration>,
    pub export_format: Option<ExportFormat>,
    pub config: Option<String>,
}

impl EnvConfig {
    /// Read variables through `lookup`. Invalid values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env_config = EnvConfig::default();

        if let Some(val) = lookup("BDC_BATCH_SIZE") {
            match val.trim().parse::<usize>() {
                Ok(size) if (1..=20).contains(&size) => env_config.batch_size = Some(size),
                _ => warn!("Invalid BDC_BATCH_SIZE='{}', must be 1-20", val),
            }
        }

        env_config.batch_pause = env_duration(&lookup, "BDC_BATCH_PAUSE");

        if let Some(val) = lookup("BDC_ERROR_THRESHOLD") {
            match val.trim().parse::<u32>() {
                Ok(threshold) if threshold >= 1 => env_config.error_threshold = Some(threshold),
                _ => warn!("Invalid BDC_ERROR_THRESHOLD='{}', must be at least 1", val),
            }
        }

        env_config.error_cooldown = env_duration(&lookup, "BDC_ERROR_COOLDOWN");
        env_config.lookup_timeout = env_duration(&lookup, "BDC_LOOKUP_TIMEOUT");

        if let Some(val) = lookup("BDC_METHOD") {
            match val.parse::<CheckMethod>() {
                Ok(method) => env_config.method = Some(method),
                Err(e) => warn!("Invalid BDC_METHOD: {}", e),
            }
        }

        if let Some(val) = lookup("BDC_WHOIS_FALLBACK") {
            match parse_bool(&val) {
                Some(enabled) => env_config.whois_fallback = Some(enabled),
                None => warn!("Invalid BDC_WHOIS_FALLBACK='{}', use true/false", val),
            }
        }

        env_config.listen = env_string(&lookup, "BDC_LISTEN");
        env_config.output_dir = env_string(&lookup, "BDC_OUTPUT_DIR");
        env_config.retention = env_duration(&lookup, "BDC_RETENTION");

        if let Some(val) = lookup("BDC_EXPORT_FORMAT") {
            match val.parse::<ExportFormat>() {
                Ok(format) => env_config.export_format = Some(format),
                Err(e) => warn!("Invalid BDC_EXPORT_FORMAT: {}", e),
            }
        }
        env_config.config = env_string(&lookup, "BDC_CONFIG");

        env_config
    }
}

/// Load configuration from the process environment.
pub fn load_env_config() -> EnvConfig {
    EnvConfig::from_lookup(|name| env::var(name).ok())
}

fn env_string<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<String> {
    lookup(name).filter(|val| !val.trim().is_empty())
}

fn env_duration<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<Duration> {
    let val = lookup(name)?;
    let parsed = parse_duration_string(&val);
    if parsed.is_none() {
        warn!("Invalid {}='{}', use a format like '500ms', '5s', '2m'", name, val);
    }
    parsed
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// HTTP service settings after all layers are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub listen: String,
    pub output_dir: Option<PathBuf>,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub progress_interval: Duration,
    pub export_format: ExportFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            output_dir: None,
            retention: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
            progress_interval: Duration::from_secs(1),
            export_format: ExportFormat::Csv,
        }
    }
}

/// Effective configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub verifier: VerifierConfig,
    pub server: ServerSettings,
}

impl Settings {
    /// Apply a (validated) file configuration on top of the current values.
    pub fn apply_file(&mut self, file: &FileConfig) -> Result<(), VerifierError> {
        if let Some(section) = &file.verifier {
            let v = &mut self.verifier;
            if let Some(batch_size) = section.batch_size {
                v.batch_size = batch_size;
            }
            if let Some(pause) = file_duration("batch_pause", &section.batch_pause)? {
                v.batch_pause = pause;
            }
            if let Some(threshold) = section.error_threshold {
                v.error_threshold = threshold;
            }
            if let Some(cooldown) = file_duration("error_cooldown", &section.error_cooldown)? {
                v.error_cooldown = cooldown;
            }
            if let Some(timeout) = file_duration("lookup_timeout", &section.lookup_timeout)? {
                v.lookup_timeout = timeout;
            }
            if let Some(method) = &section.method {
                v.method = method.parse().map_err(VerifierError::config)?;
            }
            if let Some(enabled) = section.whois_fallback {
                v.whois_fallback = enabled;
            }
            if let Some(endpoint) = &section.rdap_endpoint {
                v.rdap_endpoint = endpoint.clone();
            }
            if let Some(server) = &section.whois_server {
                v.whois_server = server.clone();
            }
        }

        if let Some(section) = &file.server {
            let s = &mut self.server;
            if let Some(listen) = &section.listen {
                s.listen = listen.clone();
            }
            if let Some(dir) = &section.output_dir {
                s.output_dir = Some(PathBuf::from(dir));
            }
            if let Some(retention) = file_duration("retention", &section.retention)? {
                s.retention = retention;
            }
            if let Some(interval) = file_duration("sweep_interval", &section.sweep_interval)? {
                s.sweep_interval = interval;
            }
            if let Some(interval) = file_duration("progress_interval", &section.progress_interval)? {
                s.progress_interval = interval;
            }
            if let Some(format) = &section.export_format {
                s.export_format = format.parse().map_err(VerifierError::config)?;
            }
        }

        Ok(())
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env(&mut self, env: &EnvConfig) {
        let v = &mut self.verifier;
        if let Some(batch_size) = env.batch_size {
            v.batch_size = batch_size;
        }
        if let Some(pause) = env.batch_pause {
            v.batch_pause = pause;
        }
        if let Some(threshold) = env.error_threshold {
            v.error_threshold = threshold;
        }
        if let Some(cooldown) = env.error_cooldown {
            v.error_cooldown = cooldown;
        }
        if let Some(timeout) = env.lookup_timeout {
            v.lookup_timeout = timeout;
        }
        if let Some(method) = env.method {
            v.method = method;
        }
        if let Some(enabled) = env.whois_fallback {
            v.whois_fallback = enabled;
        }

        let s = &mut self.server;
        if let Some(listen) = &env.listen {
            s.listen = listen.clone();
        }
        if let Some(dir) = &env.output_dir {
            s.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(retention) = env.retention {
            s.retention = retention;
        }
        if let Some(format) = env.export_format {
            s.export_format = format;
        }
    }
}

fn file_duration(field: &str, value: &Option<String>) -> Result<Option<Duration>, VerifierError> {
    match value {
        Some(raw) => parse_duration_string(raw)
            .map(Some)
            .ok_or_else(|| VerifierError::config(format!("Invalid {} '{}'", field, raw))),
        None => Ok(None),
    }
}

/// Parse a duration string like "500ms", "5s", "2m" or "1h".
///
/// A bare number means seconds.
pub fn parse_duration_string(duration_str: &str) -> Option<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    if let Some(ms) = duration_str.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = duration_str.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = duration_str.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = duration_str.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .map(|h| Duration::from_secs(h * 60 * 60))
    } else {
        duration_str.parse::<u64>().ok().map(Duration::from_secs)
    }
}
