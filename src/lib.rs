//! # resume-trawler
//!
//! Batch-screen PDF resumes with a vision language model (VLM).
//!
//! Point it at a folder holding resumes and a `config.json` questionnaire.
//! Every PDF is rasterised with poppler's `pdftoppm`, all of its pages go to
//! the model in one request together with a prompt built from the questions,
//! and the answers come back as one typed row per resume in a CSV or JSON
//! report, with token usage and dollar cost per row.
//!
//! ## Pipeline Overview
//!
//! ```text
//! folder
//!  │
//!  ├─ 1. Config     load and validate config.json (fatal on error)
//!  ├─ 2. Discover   *.pdf at the folder's top level, sorted
//!  ├─ 3. Rasterize  pdftoppm → ordered page PNGs in a scoped temp dir
//!  ├─ 4. Extract    one multimodal request per resume, bounded by a timeout
//!  ├─ 5. Sanitize   coerce answers to their declared types, clean text
//!  └─ 6. Report     resume_trawl_{N}_resumes_{timestamp}.{csv|json}
//! ```
//!
//! A failure in steps 3–5 only affects that resume: it gets an error row and
//! the run moves on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_trawler::{run, TrawlConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider resolved from ANTHROPIC_API_KEY / EDGEQUAKE_LLM_PROVIDER / …
//!     let config = TrawlConfig::default();
//!     let summary = run("./candidates", &config).await?;
//!     eprintln!(
//!         "{} resumes ({} failed), ${:.4}",
//!         summary.total, summary.failed, summary.total_cost_usd
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-trawler` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod trawl;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Pricing, TrawlConfig, TrawlConfigBuilder, DEFAULT_MODEL};
pub use error::{ConfigError, ResumeError, Stage, TokenUsage, TrawlError};
pub use job::{load_job_config, FieldType, JobConfig, OutputFormat, Question};
pub use pipeline::extract::{Extract, ExtractionResult, VisionExtractor};
pub use pipeline::rasterize::{PageImage, PdfRasterizer, Rasterize};
pub use pipeline::sanitize::FieldValue;
pub use progress::{NoopProgressCallback, ProgressCallback, TrawlProgressCallback};
pub use report::{Report, ResumeRow, RowStatus};
pub use trawl::{create_example, run, TrawlSummary, Trawler};
