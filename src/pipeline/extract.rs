//! Vision extraction: one model request per resume.
//!
//! All of a resume's pages travel in a single user message together with the
//! folder's extraction prompt. The call is bounded by the configured timeout
//! and never retried: a failure becomes that resume's error row and the run
//! moves on.

use crate::config::TrawlConfig;
use crate::error::{ResumeError, TokenUsage};
use crate::job::JobConfig;
use crate::pipeline::encode::encode_pages;
use crate::pipeline::rasterize::PageImage;
use crate::pipeline::response::parse_object;
use crate::prompts::build_extraction_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The model's parsed answer for one resume, before sanitisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    /// The top-level JSON object, keyed by field name.
    pub answers: Map<String, Value>,
    pub usage: TokenUsage,
    /// Configured fields absent from `answers`, in question order.
    pub missing_fields: Vec<String>,
}

impl ExtractionResult {
    /// Parse the model's text for `job`.
    ///
    /// A configured field missing from the object is not an error: it is
    /// logged, listed in `missing_fields`, and later reported as empty.
    pub fn from_response(content: &str, usage: TokenUsage, job: &JobConfig) -> Result<Self, ResumeError> {
        let answers =
            parse_object(content).map_err(|detail| ResumeError::ResponseParse { detail, usage })?;

        let missing_fields: Vec<String> = job
            .field_names()
            .filter(|f| !answers.contains_key(*f))
            .map(str::to_string)
            .collect();
        if !missing_fields.is_empty() {
            warn!(
                "Model response is missing {} field(s): {}",
                missing_fields.len(),
                missing_fields.join(", ")
            );
        }

        Ok(Self {
            answers,
            usage,
            missing_fields,
        })
    }
}

/// Turns a resume's page images into an [`ExtractionResult`].
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, job: &JobConfig, pages: &[PageImage]) -> Result<ExtractionResult, ResumeError>;
}

/// [`Extract`] backed by a hosted vision model.
pub struct VisionExtractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl VisionExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &TrawlConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Extract for VisionExtractor {
    async fn extract(&self, job: &JobConfig, pages: &[PageImage]) -> Result<ExtractionResult, ResumeError> {
        let images = encode_pages(pages)?;
        let prompt = build_extraction_prompt(job);
        let messages = vec![ChatMessage::user_with_images(prompt.as_str(), images)];
        let options = self.options();

        let start = Instant::now();
        let call = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| ResumeError::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| classify_api_error(e.to_string()))?;

        let usage = TokenUsage {
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        };
        debug!(
            "{} pages: {} input tokens, {} output tokens, {:?}",
            pages.len(),
            usage.input_tokens,
            usage.output_tokens,
            start.elapsed()
        );

        ExtractionResult::from_response(&response.content, usage, job)
    }
}

/// Map a provider error message onto the per-resume error kinds.
fn classify_api_error(detail: String) -> ResumeError {
    let lower = detail.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
        ResumeError::RateLimited { detail }
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("api key")
    {
        ResumeError::Auth { detail }
    } else {
        ResumeError::Api { detail }
    }
}
