//! Export of the available-domain list as a downloadable CSV or Excel file.

use crate::error::VerifierError;
use crate::normalize::Domain;
use chrono::Utc;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Content type served with CSV downloads.
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Content type served with Excel downloads.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Header of the single exported column.
pub const EXPORT_HEADER: &str = "Domain";

/// File format of export artifacts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    /// Office Open XML workbook with one sheet
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_CONTENT_TYPE,
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format '{}', use csv or xlsx", other)),
        }
    }
}

/// A rendered export file, kept in memory for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub format: ExportFormat,
    pub bytes: Arc<[u8]>,
}

impl ExportArtifact {
    pub fn new<F: Into<String>>(filename: F, format: ExportFormat, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            format,
            bytes: Arc::from(bytes),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Writes available-domain lists as CSV or Excel artifacts.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    output_dir: Option<PathBuf>,
    format: ExportFormat,
}

impl Exporter {
    /// Exporter that keeps artifacts in memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write every artifact into `dir`.
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Render `domains` for `job_id`.
    ///
    /// Returns `Ok(None)` when there is nothing to export.
    pub async fn export(
        &self,
        job_id: &str,
        domains: &[Domain],
    ) -> Result<Option<ExportArtifact>, VerifierError> {
        if domains.is_empty() {
            return Ok(None);
        }

        let bytes = match self.format {
            ExportFormat::Csv => render_csv(domains),
            ExportFormat::Xlsx => render_xlsx(domains)
                .map_err(|e| VerifierError::internal(format!("xlsx export failed: {}", e)))?,
        };
        let artifact =
            ExportArtifact::new(export_filename(job_id, self.format), self.format, bytes);

        if let Some(dir) = &self.output_dir {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                VerifierError::file_error(dir.display().to_string(), e.to_string())
            })?;

            let path = dir.join(&artifact.filename);
            tokio::fs::write(&path, &artifact.bytes[..])
                .await
                .map_err(|e| VerifierError::file_error(path.display().to_string(), e.to_string()))?;
            info!(path = %path.display(), rows = domains.len(), "export written");
        }

        Ok(Some(artifact))
    }
}

/// `available_domains_<YYYYmmdd_HHMMSS>_<job id>.<csv|xlsx>`
fn export_filename(job_id: &str, format: ExportFormat) -> String {
    let suffix: String = job_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    format!(
        "available_domains_{}_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        suffix,
        format.extension()
    )
}

fn render_csv(domains: &[Domain]) -> Vec<u8> {
    let mut out = String::with_capacity(EXPORT_HEADER.len() + 1 + domains.len() * 16);
    out.push_str(EXPORT_HEADER);
    out.push('\n');
    for domain in domains {
        out.push_str(domain.as_str());
        out.push('\n');
    }
    out.into_bytes()
}

fn render_xlsx(domains: &[Domain]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, EXPORT_HEADER)?;
    for (index, domain) in domains.iter().enumerate() {
        sheet.write_string(index as u32 + 1, 0, domain.as_str())?;
    }
    workbook.save_to_buffer()
}
