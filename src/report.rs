//! Report accumulation and the final CSV/JSON artifact.
//!
//! [`Report`] collects one [`ResumeRow`] per discovered PDF in the order the
//! orchestrator hands them over, keeps the run's token and cost totals, and
//! writes the single output file at the end of the run.
//!
//! ## Columns
//!
//! `filename, status, pages_processed, input_tokens, output_tokens, cost_usd`,
//! then one column per configured field in question order, then `error`.
//! The same keys, in the same order, are used for JSON objects.

use crate::config::Pricing;
use crate::error::{ResumeError, Stage, TokenUsage, TrawlError};
use crate::job::{JobConfig, OutputFormat};
use crate::pipeline::sanitize::FieldValue;
use chrono::{DateTime, Local};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Columns that precede the configured fields.
pub const LEADING_COLUMNS: [&str; 6] = [
    "filename",
    "status",
    "pages_processed",
    "input_tokens",
    "output_tokens",
    "cost_usd",
];

/// Column that follows the configured fields.
pub const ERROR_COLUMN: &str = "error";

/// Timestamp layout used in report file names; sorts chronologically.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Outcome of one resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Success,
    Error,
}

impl RowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RowStatus::Success => "success",
            RowStatus::Error => "error",
        }
    }
}

/// One resume's line in the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeRow {
    pub filename: String,
    pub status: RowStatus,
    pub pages_processed: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub cost_usd: f64,
    /// Sanitised answers keyed by field name. Empty for error rows.
    pub fields: BTreeMap<String, FieldValue>,
    pub error: Option<String>,
    /// Stage that failed, for error rows. Not a report column.
    pub failed_stage: Option<Stage>,
    /// Configured fields the model left out. Not a report column.
    pub missing_fields: Vec<String>,
}

impl ResumeRow {
    /// A fully processed resume.
    pub fn success(
        filename: impl Into<String>,
        pages_processed: usize,
        usage: TokenUsage,
        pricing: &Pricing,
        fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        Self {
            filename: filename.into(),
            status: RowStatus::Success,
            pages_processed,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd: pricing.cost(usage.input_tokens, usage.output_tokens),
            fields,
            error: None,
            failed_stage: None,
            missing_fields: Vec::new(),
        }
    }

    pub fn with_missing_fields(mut self, missing: Vec<String>) -> Self {
        self.missing_fields = missing;
        self
    }

    /// A resume that failed at some stage.
    ///
    /// Tokens are zero unless the model was billed before the failure.
    pub fn failure(
        filename: impl Into<String>,
        pages_processed: usize,
        error: &ResumeError,
        pricing: &Pricing,
    ) -> Self {
        let usage = error.billed_usage();
        Self {
            filename: filename.into(),
            status: RowStatus::Error,
            pages_processed,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd: pricing.cost(usage.input_tokens, usage.output_tokens),
            fields: BTreeMap::new(),
            error: Some(error.to_string()),
            failed_stage: Some(error.stage()),
            missing_fields: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RowStatus::Success
    }

    /// Number of answers that failed type coercion.
    pub fn invalid_fields(&self) -> usize {
        self.fields.values().filter(|v| v.is_invalid()).count()
    }
}

/// The accumulated rows of one run.
#[derive(Debug, Clone)]
pub struct Report {
    fields: Vec<String>,
    rows: Vec<ResumeRow>,
    started_at: DateTime<Local>,
}

impl Report {
    /// Start an empty report for `job`; `started_at` names the output file.
    pub fn new(job: &JobConfig, started_at: DateTime<Local>) -> Self {
        Self {
            fields: job.field_names().map(str::to_string).collect(),
            rows: Vec::new(),
            started_at,
        }
    }

    /// Append `row`. Rows keep insertion order.
    pub fn add(&mut self, row: ResumeRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ResumeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.rows.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Error rows whose failure came from `stage`.
    pub fn failed_at(&self, stage: Stage) -> usize {
        self.rows
            .iter()
            .filter(|r| r.failed_stage == Some(stage))
            .count()
    }

    /// Unanswered fields across all rows.
    pub fn missing_answers(&self) -> usize {
        self.rows.iter().map(|r| r.missing_fields.len()).sum()
    }

    pub fn total_input_tokens(&self) -> usize {
        self.rows.iter().map(|r| r.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> usize {
        self.rows.iter().map(|r| r.output_tokens).sum()
    }

    /// Sum of every row's cost, error rows included.
    pub fn total_cost_usd(&self) -> f64 {
        self.rows.iter().map(|r| r.cost_usd).sum()
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Header row: leading columns, configured fields, `error`.
    pub fn columns(&self) -> Vec<String> {
        LEADING_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.fields.iter().cloned())
            .chain(std::iter::once(ERROR_COLUMN.to_string()))
            .collect()
    }

    /// `resume_trawl_{count}_resumes_{timestamp}.{ext}`.
    pub fn filename(&self, format: OutputFormat) -> String {
        format!(
            "resume_trawl_{}_resumes_{}.{}",
            self.len(),
            self.started_at.format(TIMESTAMP_FORMAT),
            format.extension()
        )
    }

    /// Render as CSV. Empty answers and error rows' fields are empty cells.
    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(self.columns())?;

        for row in &self.rows {
            let mut record = vec![
                row.filename.clone(),
                row.status.as_str().to_string(),
                row.pages_processed.to_string(),
                row.input_tokens.to_string(),
                row.output_tokens.to_string(),
                row.cost_usd.to_string(),
            ];
            record.extend(
                self.fields
                    .iter()
                    .map(|f| row.fields.get(f).map(FieldValue::to_cell).unwrap_or_default()),
            );
            record.push(row.error.clone().unwrap_or_default());
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        wtr.into_inner()
            .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))
    }

    /// Render as a pretty-printed JSON array, one object per row.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let views: Vec<RowView<'_>> = self
            .rows
            .iter()
            .map(|row| RowView {
                row,
                fields: &self.fields,
            })
            .collect();
        serde_json::to_string_pretty(&views)
    }

    /// Write the report into `dir` and return its path.
    ///
    /// The content goes to `<name>.tmp` first and is renamed into place, so
    /// a half-written report never carries the final name.
    pub fn finalize(&self, format: OutputFormat, dir: &Path) -> Result<PathBuf, TrawlError> {
        let path = dir.join(self.filename(format));
        let write_err = |source: std::io::Error| TrawlError::ReportWrite {
            path: path.clone(),
            source,
        };

        let bytes = match format {
            OutputFormat::Csv => self.to_csv().map_err(|e| write_err(e.into()))?,
            OutputFormat::Json => self
                .to_json()
                .map_err(|e| write_err(e.into()))?
                .into_bytes(),
        };

        std::fs::create_dir_all(dir).map_err(write_err)?;
        let tmp = dir.join(format!("{}.tmp", self.filename(format)));
        std::fs::write(&tmp, &bytes).map_err(write_err)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(write_err(e));
        }

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        info!("Report saved: {}", path.display());
        Ok(path)
    }
}

/// One row serialised with the report's column order.
struct RowView<'a> {
    row: &'a ResumeRow,
    fields: &'a [String],
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let row = self.row;
        let mut map = serializer.serialize_map(Some(LEADING_COLUMNS.len() + self.fields.len() + 1))?;
        map.serialize_entry("filename", &row.filename)?;
        map.serialize_entry("status", &row.status)?;
        map.serialize_entry("pages_processed", &row.pages_processed)?;
        map.serialize_entry("input_tokens", &row.input_tokens)?;
        map.serialize_entry("output_tokens", &row.output_tokens)?;
        map.serialize_entry("cost_usd", &row.cost_usd)?;
        for field in self.fields {
            map.serialize_entry(field, row.fields.get(field).unwrap_or(&FieldValue::Null))?;
        }
        map.serialize_entry(ERROR_COLUMN, &row.error)?;
        map.end()
    }
}
