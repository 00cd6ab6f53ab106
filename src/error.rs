//! Error types for the resume-trawler library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`ConfigError`]: the folder's `config.json` is missing, is not JSON, or
//!   fails validation. Always fatal: no resume is touched.
//!
//! * [`TrawlError`]: **Fatal**: the run cannot proceed or its only durable
//!   output cannot be written (missing folder, bad job configuration, no
//!   rasterizer, provider not configured, report not writable).
//!
//! * [`ResumeError`]: **Non-fatal**: one resume failed to rasterise or
//!   extract. It is rendered into that resume's report row and the run moves
//!   on to the next file.
//!
//! Field-level coercion failures are not errors at all; they become
//! [`crate::pipeline::sanitize::FieldValue::Invalid`] inside an otherwise
//! successful row.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Problems with a folder's job configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `config.json` does not exist in the input folder.
    #[error("Configuration file not found: '{path}'\nRun `resume-trawler create-example <folder>` to scaffold one.")]
    NotFound { path: PathBuf },

    /// The file exists but is not well-formed JSON.
    #[error("Invalid JSON in '{path}': {detail}")]
    Parse { path: PathBuf, detail: String },

    /// The JSON is well-formed but does not describe a valid job.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// All fatal errors returned by the resume-trawler library.
///
/// Per-resume failures use [`ResumeError`] and are stored in
/// [`crate::report::ResumeRow`] rather than propagated here.
#[derive(Debug, Error)]
pub enum TrawlError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input folder does not exist.
    #[error("Input folder does not exist: '{path}'")]
    FolderNotFound { path: PathBuf },

    /// The input path exists but is not a directory.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Could not list the input folder.
    #[error("Failed to read input folder '{path}': {source}")]
    FolderUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Missing or invalid job configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `config.json` already exists and overwriting was not requested.
    #[error("Configuration already exists: '{path}'\nPass --force to overwrite it.")]
    ExampleExists { path: PathBuf },

    /// Runtime settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidConfig(String),

    // ── Tooling errors ────────────────────────────────────────────────────
    /// The external rasterizer could not be found anywhere.
    #[error("{0}")]
    RasterizerNotFound(#[from] poppler_locate::LocateError),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the report file.
    #[error("Failed to write report '{path}': {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the example folder or its `config.json`.
    #[error("Failed to write example configuration '{path}': {source}")]
    ScaffoldWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Token counts reported by the provider for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Which pipeline stage a [`ResumeError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rasterization,
    Extraction,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Rasterization => "rasterization",
            Stage::Extraction => "extraction",
        })
    }
}

/// A non-fatal error for a single resume.
///
/// Stored in the resume's report row; the run continues with the next file.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ResumeError {
    // ── Rasterization ─────────────────────────────────────────────────────
    /// The PDF vanished between discovery and processing.
    #[error("PDF file not found: {path}")]
    PdfNotFound { path: PathBuf },

    /// The PDF has zero bytes.
    #[error("PDF file is empty (0 bytes)")]
    EmptyPdf,

    /// The rasterizer failed; `detail` carries its diagnostics.
    #[error("PDF conversion failed: {detail}")]
    PdfConversion { detail: String },

    /// The rasterizer succeeded but produced no page images.
    #[error("PDF conversion produced no page images")]
    NoPages,

    /// A page image could not be re-encoded for upload.
    #[error("Page {page}: image encoding failed: {detail}")]
    ImageEncoding { page: usize, detail: String },

    // ── Extraction ────────────────────────────────────────────────────────
    /// Transport or non-retryable API failure.
    #[error("API error: {detail}")]
    Api { detail: String },

    /// Provider answered HTTP 429.
    #[error("API rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// Provider rejected the credentials (401/403).
    #[error("API authentication failed: {detail}")]
    Auth { detail: String },

    /// No answer within the configured timeout.
    #[error("API call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The model answered but its output is not a JSON object.
    ///
    /// `usage` records the tokens that were billed for the answer anyway.
    #[error("Could not parse model response: {detail}")]
    ResponseParse { detail: String, usage: TokenUsage },
}

impl ResumeError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            ResumeError::PdfNotFound { .. }
            | ResumeError::EmptyPdf
            | ResumeError::PdfConversion { .. }
            | ResumeError::NoPages
            | ResumeError::ImageEncoding { .. } => Stage::Rasterization,
            ResumeError::Api { .. }
            | ResumeError::RateLimited { .. }
            | ResumeError::Auth { .. }
            | ResumeError::Timeout { .. }
            | ResumeError::ResponseParse { .. } => Stage::Extraction,
        }
    }

    /// Tokens billed before the failure (non-zero only for parse failures).
    pub fn billed_usage(&self) -> TokenUsage {
        match self {
            ResumeError::ResponseParse { usage, .. } => *usage,
            _ => TokenUsage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_display_mentions_scaffold() {
        let e = ConfigError::NotFound {
            path: PathBuf::from("jobs/pm/config.json"),
        };
        let msg = e.to_string();
        assert!(msg.contains("jobs/pm/config.json"), "got: {msg}");
        assert!(msg.contains("create-example"), "got: {msg}");
    }

    #[test]
    fn config_error_is_transparent_inside_trawl_error() {
        let e: TrawlError = ConfigError::Validation("'questions' list cannot be empty".into()).into();
        assert_eq!(
            e.to_string(),
            "Invalid configuration: 'questions' list cannot be empty"
        );
    }

    #[test]
    fn timeout_display() {
        let e = ResumeError::Timeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
        assert_eq!(e.stage(), Stage::Extraction);
    }

    #[test]
    fn conversion_error_carries_tool_diagnostics() {
        let e = ResumeError::PdfConversion {
            detail: "Syntax Error: Couldn't find trailer dictionary".into(),
        };
        assert!(e.to_string().contains("trailer dictionary"));
        assert_eq!(e.stage(), Stage::Rasterization);
    }

    #[test]
    fn only_parse_failures_bill_tokens() {
        let usage = TokenUsage {
            input_tokens: 1200,
            output_tokens: 80,
        };
        let parse = ResumeError::ResponseParse {
            detail: "expected value at line 1 column 1".into(),
            usage,
        };
        assert_eq!(parse.billed_usage(), usage);
        assert_eq!(
            ResumeError::Api { detail: "502".into() }.billed_usage(),
            TokenUsage::default()
        );
    }
}
