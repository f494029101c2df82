//! Candidate extraction from uploaded link reports.
//!
//! Backlink and outbound-link exports name their URL columns differently
//! depending on the tool that produced them. A [`Table`] is read from an
//! Excel workbook or a CSV file and handed to an [`ExtractionPipeline`], which
//! tries its strategies in order and returns the raw candidate strings of the
//! first one that applies. Candidates are not normalized here.

use crate::error::VerifierError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::{debug, info};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// A parsed report table: one header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parse an uploaded report, picking the reader from the file signature.
    ///
    /// Zip containers (`.xlsx`, `.ods`) and OLE files (`.xls`) are read as
    /// workbooks; anything else is treated as CSV text.
    pub fn from_upload(bytes: &[u8]) -> Result<Self, VerifierError> {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            Self::from_spreadsheet_bytes(bytes)
        } else {
            Self::from_csv_bytes(bytes)
        }
    }

    /// Read the first worksheet of a workbook.
    pub fn from_spreadsheet_bytes(bytes: &[u8]) -> Result<Self, VerifierError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
            VerifierError::invalid_upload(format!("unreadable spreadsheet: {}", e))
        })?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(|e| {
                VerifierError::invalid_upload(format!("unreadable worksheet: {}", e))
            })?,
            None => return Err(VerifierError::invalid_upload("the workbook has no worksheets")),
        };

        let records = range
            .rows()
            .map(|row| row.iter().map(Data::to_string).collect::<Vec<_>>())
            .collect();
        Self::from_records(records)
    }

    /// Parse CSV bytes. Invalid UTF-8 is replaced rather than rejected.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, VerifierError> {
        Self::from_csv(&String::from_utf8_lossy(bytes))
    }

    /// Parse CSV text.
    ///
    /// Handles quoted fields (with `""` escapes and embedded newlines), CRLF
    /// line endings, a leading byte order mark, and either `,` or `;` as the
    /// delimiter (whichever occurs more often in the first non-blank line).
    pub fn from_csv(text: &str) -> Result<Self, VerifierError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let header_line = text
            .lines()
            .find(|line| {
                line.chars()
                    .any(|c| !c.is_whitespace() && c != ',' && c != ';')
            })
            .unwrap_or("");
        let delimiter = detect_delimiter(header_line);

        Self::from_records(parse_records(text, delimiter)?)
    }

    /// First non-blank record is the header; blank records are dropped.
    fn from_records(records: Vec<Vec<String>>) -> Result<Self, VerifierError> {
        let mut records = records
            .into_iter()
            .filter(|record| record.iter().any(|field| !field.trim().is_empty()));

        let headers: Vec<String> = match records.next() {
            Some(header) => header.into_iter().map(|h| h.trim().to_string()).collect(),
            None => return Err(VerifierError::invalid_upload("the uploaded table is empty")),
        };

        let rows = records.collect();
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the column with exactly this header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Non-empty trimmed cells of column `index`.
    pub fn column_values(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// First cell of column `index`, if the table has any rows.
    pub fn first_value(&self, index: usize) -> Option<&str> {
        self.rows
            .first()
            .and_then(|row| row.get(index))
            .map(|cell| cell.trim())
    }

    fn first_present(&self, names: &[&str]) -> Option<(usize, String)> {
        names
            .iter()
            .find_map(|name| self.column_index(name).map(|i| (i, name.to_string())))
    }
}

fn detect_delimiter(header_line: &str) -> char {
    let mut commas = 0;
    let mut semicolons = 0;
    let mut in_quotes = false;
    for c in header_line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => commas += 1,
            ';' if !in_quotes => semicolons += 1,
            _ => {}
        }
    }
    if semicolons > commas {
        ';'
    } else {
        ','
    }
}

fn parse_records(text: &str, delimiter: char) -> Result<Vec<Vec<String>>, VerifierError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(VerifierError::invalid_upload(
            "unterminated quoted field in CSV",
        ));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// One way of locating candidate URLs/domains in a table.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// `None` when the table doesn't have the shape this strategy expects.
    fn extract(&self, table: &Table) -> Option<Vec<String>>;
}

/// A single column holding domains or URLs.
#[derive(Debug, Clone)]
pub struct DomainColumn {
    names: Vec<&'static str>,
}

impl Default for DomainColumn {
    fn default() -> Self {
        Self {
            names: vec!["Domain", "Domain ascore", "URL", "Url"],
        }
    }
}

impl ExtractionStrategy for DomainColumn {
    fn name(&self) -> &'static str {
        "domain-column"
    }

    fn extract(&self, table: &Table) -> Option<Vec<String>> {
        let (index, column) = table.first_present(&self.names)?;
        debug!(%column, "using domain column");
        Some(table.column_values(index))
    }
}

/// Backlink reports: a source URL column and a target URL column, both used.
#[derive(Debug, Clone)]
pub struct SourceTargetColumns {
    source_names: Vec<&'static str>,
    target_names: Vec<&'static str>,
}

impl Default for SourceTargetColumns {
    fn default() -> Self {
        Self {
            source_names: vec![
                "Source url",
                "Source URL",
                "Source URL (from)",
                "Source URL (to)",
                "Source",
            ],
            target_names: vec![
                "Target url",
                "Target URL",
                "Target URL (from)",
                "Target URL (to)",
                "Target",
            ],
        }
    }
}

impl ExtractionStrategy for SourceTargetColumns {
    fn name(&self) -> &'static str {
        "source-target-columns"
    }

    fn extract(&self, table: &Table) -> Option<Vec<String>> {
        let (source, source_column) = table.first_present(&self.source_names)?;
        let (target, target_column) = table.first_present(&self.target_names)?;
        debug!(%source_column, %target_column, "using source and target columns");

        let mut values = table.column_values(source);
        values.extend(table.column_values(target));
        Some(values)
    }
}

/// Fallback: every column whose first value looks like a URL or host.
#[derive(Debug, Clone, Default)]
pub struct UrlLikeColumns;

impl ExtractionStrategy for UrlLikeColumns {
    fn name(&self) -> &'static str {
        "url-like-columns"
    }

    fn extract(&self, table: &Table) -> Option<Vec<String>> {
        let columns: Vec<usize> = (0..table.headers().len())
            .filter(|&i| {
                table
                    .first_value(i)
                    .map(|sample| sample.to_lowercase().contains("http") || sample.contains('.'))
                    .unwrap_or(false)
            })
            .collect();

        if columns.is_empty() {
            return None;
        }
        debug!(columns = columns.len(), "using URL-like columns");
        Some(columns.into_iter().flat_map(|i| table.column_values(i)).collect())
    }
}

/// Candidates pulled from a table, with the strategy that found them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub strategy: &'static str,
    pub candidates: Vec<String>,
}

/// Ordered list of strategies; the first that applies wins.
pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::empty()
            .with_strategy(DomainColumn::default())
            .with_strategy(SourceTargetColumns::default())
            .with_strategy(UrlLikeColumns)
    }
}

impl ExtractionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy after the existing ones.
    pub fn with_strategy<S: ExtractionStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, table: &Table) -> Result<Extraction, VerifierError> {
        debug!(headers = ?table.headers(), "extracting candidates");

        for strategy in &self.strategies {
            if let Some(candidates) = strategy.extract(table) {
                info!(
                    strategy = strategy.name(),
                    candidates = candidates.len(),
                    "candidates extracted"
                );
                return Ok(Extraction {
                    strategy: strategy.name(),
                    candidates,
                });
            }
        }

        Err(VerifierError::invalid_upload(format!(
            "no column with domains or URLs found (columns: {})",
            table.headers().join(", ")
        )))
    }

    /// Parse CSV bytes and extract candidates in one step.
    pub fn extract_csv(&self, bytes: &[u8]) -> Result<Extraction, VerifierError> {
        let table = Table::from_csv_bytes(bytes)?;
        self.extract(&table)
    }

    /// Parse an uploaded workbook or CSV file and extract candidates.
    pub fn extract_upload(&self, bytes: &[u8]) -> Result<Extraction, VerifierError> {
        let table = Table::from_upload(bytes)?;
        self.extract(&table)
    }
}
