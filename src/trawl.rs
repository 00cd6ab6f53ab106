//! Run entry points: screen every resume in a folder and write the report.
//!
//! Each resume moves through
//! `Discovered → Rasterizing → Extracting → Sanitizing → Recorded`. A failure
//! at any stage records an error row and the next resume proceeds; nothing
//! is retried. Only setup problems (folder, configuration, rasterizer,
//! provider) and the final report write are fatal.

use crate::config::{Pricing, TrawlConfig};
use crate::error::{Stage, TrawlError};
use crate::job::{load_job_config, write_example_config, JobConfig};
use crate::pipeline::discover::{check_folder, discover_pdfs};
use crate::pipeline::extract::{Extract, VisionExtractor};
use crate::pipeline::rasterize::{PdfRasterizer, Rasterize};
use crate::pipeline::sanitize::sanitize_answers;
use crate::progress::ProgressCallback;
use crate::report::{Report, ResumeRow};
use chrono::Local;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Job role written by `create-example` when none is given.
pub const DEFAULT_JOB_ROLE: &str = "Software Engineer";

/// Outcome of a run, as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrawlSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures before the model was called (bad or unreadable PDFs).
    pub rasterization_failures: usize,
    /// Failures from the model call or its answer.
    pub extraction_failures: usize,
    /// Configured fields the model left out, summed over successful rows.
    pub missing_answers: usize,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub total_cost_usd: f64,
    /// `total_cost_usd / total`, or 0 when the folder had no PDFs.
    pub avg_cost_usd: f64,
    /// `None` when there was nothing to report.
    pub output_path: Option<PathBuf>,
}

impl TrawlSummary {
    fn from_report(report: &Report, output_path: Option<PathBuf>) -> Self {
        let total = report.len();
        let total_cost_usd = report.total_cost_usd();
        Self {
            total,
            succeeded: report.succeeded(),
            failed: report.failed(),
            rasterization_failures: report.failed_at(Stage::Rasterization),
            extraction_failures: report.failed_at(Stage::Extraction),
            missing_answers: report.missing_answers(),
            total_input_tokens: report.total_input_tokens(),
            total_output_tokens: report.total_output_tokens(),
            total_cost_usd,
            avg_cost_usd: if total > 0 {
                total_cost_usd / total as f64
            } else {
                0.0
            },
            output_path,
        }
    }
}

/// Screens resumes with a rasterizer and an extractor.
pub struct Trawler {
    rasterizer: Arc<dyn Rasterize>,
    extractor: Arc<dyn Extract>,
    pricing: Pricing,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Trawler {
    /// A sequential trawler with default pricing and no progress events.
    pub fn new(rasterizer: Arc<dyn Rasterize>, extractor: Arc<dyn Extract>) -> Self {
        Self {
            rasterizer,
            extractor,
            pricing: Pricing::default(),
            concurrency: 1,
            progress: None,
        }
    }

    /// Locate `pdftoppm` and resolve the LLM provider for `config`.
    pub async fn from_config(config: &TrawlConfig) -> Result<Self, TrawlError> {
        let rasterizer = PdfRasterizer::locate(config)?;
        info!(
            "Using pdftoppm at {} ({} DPI)",
            rasterizer.binary().display(),
            rasterizer.dpi()
        );
        let provider = resolve_provider(config).await?;
        info!(
            "Using provider: {}, model: {}",
            provider.name(),
            provider.model()
        );

        let mut trawler = Self::new(
            Arc::new(rasterizer),
            Arc::new(VisionExtractor::new(provider, config)),
        )
        .with_pricing(config.pricing)
        .with_concurrency(config.concurrency);
        trawler.progress = config.progress_callback.clone();
        Ok(trawler)
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Values below 1 are treated as 1.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Screen one resume. Never fails: problems become an error row.
    pub async fn process_resume(&self, pdf: &Path, job: &JobConfig) -> ResumeRow {
        let filename = display_name(pdf);
        let start = Instant::now();

        debug!("{}: rasterizing", filename);
        let pages = match self.rasterizer.rasterize(pdf).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("✗ {} ({}): {}", filename, e.stage(), e);
                return ResumeRow::failure(filename, 0, &e, &self.pricing);
            }
        };

        debug!("{}: extracting from {} pages", filename, pages.len());
        let extraction = match self.extractor.extract(job, &pages).await {
            Ok(x) => x,
            Err(e) => {
                warn!("✗ {} ({}): {}", filename, e.stage(), e);
                return ResumeRow::failure(filename, pages.len(), &e, &self.pricing);
            }
        };

        let fields = sanitize_answers(job, &extraction.answers);
        let row = ResumeRow::success(filename, pages.len(), extraction.usage, &self.pricing, fields)
            .with_missing_fields(extraction.missing_fields);
        info!(
            "✓ {}: {} pages, {} in / {} out tokens, ${:.4}, {} unanswered ({:?})",
            row.filename,
            row.pages_processed,
            row.input_tokens,
            row.output_tokens,
            row.cost_usd,
            row.missing_fields.len(),
            start.elapsed()
        );
        row
    }

    /// Screen `pdfs`, returning one row per file in the same order.
    ///
    /// Up to `concurrency` resumes are in flight at once; results are
    /// yielded in input order regardless of completion order.
    pub async fn process_all(&self, pdfs: &[PathBuf], job: &JobConfig) -> Vec<ResumeRow> {
        let total = pdfs.len();
        stream::iter(pdfs.iter().enumerate().map(|(i, pdf)| async move {
            let index = i + 1;
            if let Some(ref cb) = self.progress {
                cb.on_resume_start(index, total, &display_name(pdf));
            }
            let row = self.process_resume(pdf, job).await;
            if let Some(ref cb) = self.progress {
                cb.on_resume_complete(index, total, &row);
            }
            row
        }))
        .buffered(self.concurrency)
        .collect()
        .await
    }

    /// Load `<folder>/config.json`, then screen the folder.
    pub async fn trawl(&self, folder: &Path, output_dir: &Path) -> Result<TrawlSummary, TrawlError> {
        check_folder(folder)?;
        let job = load_job_config(folder)?;
        self.trawl_job(folder, &job, output_dir).await
    }

    /// Screen every PDF in `folder` against `job` and write the report into
    /// `output_dir`.
    pub async fn trawl_job(
        &self,
        folder: &Path,
        job: &JobConfig,
        output_dir: &Path,
    ) -> Result<TrawlSummary, TrawlError> {
        let started_at = Local::now();
        let mut report = Report::new(job, started_at);

        let pdfs = discover_pdfs(folder)?;
        if pdfs.is_empty() {
            warn!("No PDF files found in {}; no report written", folder.display());
            return Ok(TrawlSummary::from_report(&report, None));
        }
        info!("Found {} resumes in {}", pdfs.len(), folder.display());

        if let Some(ref cb) = self.progress {
            cb.on_run_start(pdfs.len());
        }

        for row in self.process_all(&pdfs, job).await {
            report.add(row);
        }

        if let Some(ref cb) = self.progress {
            cb.on_run_complete(report.len(), report.succeeded());
        }

        let path = report.finalize(job.output_format, output_dir)?;
        let summary = TrawlSummary::from_report(&report, Some(path));
        info!(
            "Trawl complete: {}/{} succeeded, {} in / {} out tokens, ${:.4} total",
            summary.succeeded,
            summary.total,
            summary.total_input_tokens,
            summary.total_output_tokens,
            summary.total_cost_usd
        );
        Ok(summary)
    }
}

/// Screen every resume in `folder` and write the report.
///
/// The folder and its `config.json` are validated before the rasterizer or
/// the provider is touched, so a bad configuration fails fast.
///
/// # Example
/// ```rust,no_run
/// use resume_trawler::{run, TrawlConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let summary = run("./candidates", &TrawlConfig::default()).await?;
/// println!("{} resumes, ${:.2}", summary.total, summary.total_cost_usd);
/// # Ok(())
/// # }
/// ```
pub async fn run(folder: impl AsRef<Path>, config: &TrawlConfig) -> Result<TrawlSummary, TrawlError> {
    let folder = folder.as_ref();
    info!("Starting trawl: {}", folder.display());

    check_folder(folder)?;
    let job = load_job_config(folder)?;
    let trawler = Trawler::from_config(config).await?;
    trawler.trawl_job(folder, &job, &config.output_dir).await
}

/// Scaffold `folder` with an example `config.json`.
pub fn create_example(
    folder: impl AsRef<Path>,
    job_role: Option<&str>,
    overwrite: bool,
) -> Result<PathBuf, TrawlError> {
    write_example_config(folder.as_ref(), job_role.unwrap_or(DEFAULT_JOB_ROLE), overwrite)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn display_name(pdf: &Path) -> String {
    pdf.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| pdf.display().to_string())
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, TrawlError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TrawlError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most to least specific:
///
/// 1. the pre-built `config.provider`
/// 2. `config.provider_name` with the configured model
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set and
///    no model was given explicitly
/// 4. `anthropic` with the configured model, when `ANTHROPIC_API_KEY` is set
/// 5. whatever [`ProviderFactory::from_env`] detects
async fn resolve_provider(config: &TrawlConfig) -> Result<Arc<dyn LLMProvider>, TrawlError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let Some((prov, model)) = env_provider_pair(config, |key| std::env::var(key).ok()) {
        return create_provider(&prov, &model);
    }

    if std::env::var("ANTHROPIC_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("anthropic", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TrawlError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be detected from the environment.\n\
                 Set ANTHROPIC_API_KEY (or another provider's key), or pass --provider.\n\
                 Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

/// The `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` pair, unless an explicit
/// model is configured.
fn env_provider_pair(
    config: &TrawlConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Option<(String, String)> {
    let prov = var("EDGEQUAKE_LLM_PROVIDER").filter(|p| !p.is_empty())?;
    let model = var("EDGEQUAKE_MODEL").filter(|m| !m.is_empty())?;
    if let Some(ref explicit) = config.model {
        warn!(
            "Ignoring EDGEQUAKE_LLM_PROVIDER={prov} / EDGEQUAKE_MODEL={model}: \
             model '{explicit}' was set explicitly"
        );
        return None;
    }
    Some((prov, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_the_file_name() {
        assert_eq!(display_name(Path::new("/tmp/in/Jane Doe.pdf")), "Jane Doe.pdf");
    }

    #[test]
    fn summary_of_empty_report_has_zero_average() {
        let job = JobConfig::example("Designer");
        let report = Report::new(&job, Local::now());
        let s = TrawlSummary::from_report(&report, None);
        assert_eq!(s.total, 0);
        assert_eq!(s.avg_cost_usd, 0.0);
        assert!(s.output_path.is_none());
    }

    #[test]
    fn create_example_uses_default_role() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_example(dir.path().join("new"), None, false).unwrap();
        let job = load_job_config(path.parent().unwrap()).unwrap();
        assert_eq!(job.job_role, DEFAULT_JOB_ROLE);
    }

    #[tokio::test]
    async fn unknown_named_provider_is_not_configured() {
        let config = TrawlConfig::builder()
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        match resolve_provider(&config).await {
            Err(TrawlError::ProviderNotConfigured { provider, .. }) => {
                assert_eq!(provider, "definitely-not-a-provider")
            }
            Err(e) => panic!("expected ProviderNotConfigured, got {e}"),
            Ok(_) => panic!("expected ProviderNotConfigured, got a provider"),
        }
    }

    fn edgequake_env(key: &str) -> Option<String> {
        match key {
            "EDGEQUAKE_LLM_PROVIDER" => Some("openai".into()),
            "EDGEQUAKE_MODEL" => Some("gpt-4.1".into()),
            _ => None,
        }
    }

    #[test]
    fn env_pair_applies_without_explicit_model() {
        let config = TrawlConfig::default();
        assert_eq!(
            env_provider_pair(&config, edgequake_env),
            Some(("openai".to_string(), "gpt-4.1".to_string()))
        );
    }

    #[test]
    fn explicit_model_beats_env_pair() {
        let config = TrawlConfig::builder()
            .model("claude-opus-4-1")
            .build()
            .unwrap();
        assert_eq!(env_provider_pair(&config, edgequake_env), None);
    }

    #[test]
    fn env_pair_needs_both_variables() {
        let only_provider = |key: &str| (key == "EDGEQUAKE_LLM_PROVIDER").then(|| "openai".to_string());
        assert_eq!(env_provider_pair(&TrawlConfig::default(), only_provider), None);
    }
}
