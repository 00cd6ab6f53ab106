//! Runtime settings for a trawl run.
//!
//! Everything that is *not* part of a folder's questionnaire lives in
//! [`TrawlConfig`]: which model to call, how to rasterise, how long to wait,
//! what tokens cost and where the report goes. The binary fills it once from
//! CLI flags and environment variables; pipeline code never consults the
//! environment afterwards.

use crate::error::TrawlError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Published per-token prices, in USD per million tokens.
///
/// Fixed for the whole run; there is no dynamic price lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for Pricing {
    /// Claude Sonnet 4.5 list price: $3 in / $15 out.
    fn default() -> Self {
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

impl Pricing {
    /// USD per input token.
    pub fn rate_in(&self) -> f64 {
        self.input_per_million / 1_000_000.0
    }

    /// USD per output token.
    pub fn rate_out(&self) -> f64 {
        self.output_per_million / 1_000_000.0
    }

    /// `input_tokens * rate_in + output_tokens * rate_out`.
    pub fn cost(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        input_tokens as f64 * self.rate_in() + output_tokens as f64 * self.rate_out()
    }
}

/// Configuration for a trawl run.
///
/// Built via [`TrawlConfig::builder()`] or using [`TrawlConfig::default()`].
///
/// # Example
/// ```rust
/// use resume_trawler::TrawlConfig;
///
/// let config = TrawlConfig::builder()
///     .dpi(150)
///     .model("claude-sonnet-4-5-20250929")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TrawlConfig {
    /// Rasterisation DPI passed to `pdftoppm -r`. Range: 72–400. Default: 200.
    ///
    /// Resumes are mostly small print on letter/A4 pages; 200 DPI keeps
    /// footnotes and contact details legible without blowing past upload
    /// limits on three- and four-page CVs.
    pub dpi: u32,

    /// LLM model identifier. `None` lets the environment pick the model
    /// (`EDGEQUAKE_MODEL`), falling back to [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "anthropic", "openai").
    /// If None along with `provider`, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the LLM completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per resume. Default: 4096.
    pub max_tokens: usize,

    /// Per-resume extraction timeout in seconds. Default: 120.
    ///
    /// A timed-out resume is recorded as an error row; the run continues.
    pub api_timeout_secs: u64,

    /// Explicit location of `pdftoppm` (the binary or its directory).
    pub rasterizer_path: Option<PathBuf>,

    /// Executable search path consulted last when locating `pdftoppm`.
    pub search_path: Option<std::ffi::OsString>,

    /// Token prices used for cost accounting.
    pub pricing: Pricing,

    /// Resumes processed at once. Default: 1 (strictly sequential).
    ///
    /// Rows are always reported in discovery order regardless.
    pub concurrency: usize,

    /// Directory the report file is written to. Default: the working directory.
    pub output_dir: PathBuf,

    /// Optional per-resume progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TrawlConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 120,
            rasterizer_path: None,
            search_path: None,
            pricing: Pricing::default(),
            concurrency: 1,
            output_dir: PathBuf::from("."),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TrawlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrawlConfig")
            .field("dpi", &self.dpi)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("rasterizer_path", &self.rasterizer_path)
            .field("pricing", &self.pricing)
            .field("concurrency", &self.concurrency)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl TrawlConfig {
    /// The explicit model, or [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Create a new builder for `TrawlConfig`.
    pub fn builder() -> TrawlConfigBuilder {
        TrawlConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TrawlConfig`].
#[derive(Debug)]
pub struct TrawlConfigBuilder {
    config: TrawlConfig,
}

impl TrawlConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn rasterizer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rasterizer_path = Some(path.into());
        self
    }

    pub fn search_path(mut self, path: impl Into<std::ffi::OsString>) -> Self {
        self.config.search_path = Some(path.into());
        self
    }

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.config.pricing = pricing;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TrawlConfig, TrawlError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(TrawlError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(TrawlError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(TrawlError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(TrawlError::InvalidConfig("Model must not be empty".into()));
        }
        let p = &c.pricing;
        if !(p.input_per_million.is_finite() && p.input_per_million >= 0.0)
            || !(p.output_per_million.is_finite() && p.output_per_million >= 0.0)
        {
            return Err(TrawlError::InvalidConfig(format!(
                "Prices must be non-negative, got {p:?}"
            )));
        }
        Ok(self.config)
    }
}
