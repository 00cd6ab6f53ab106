//! Job configuration: the per-folder `config.json` questionnaire.
//!
//! A job names the role being screened for, the report format, and an ordered
//! list of typed questions. Each question's `field` becomes a report column.
//!
//! ```json
//! {
//!   "job_role": "Product Manager",
//!   "output_format": "csv",
//!   "questions": [
//!     { "field": "candidate_name", "question": "What is the candidate's full name?", "type": "string" },
//!     { "field": "number_of_jobs", "question": "How many positions has the candidate held?", "type": "int" }
//!   ]
//! }
//! ```
//!
//! Loading is two-phase so the three failure modes stay distinguishable:
//! the bytes must parse as JSON ([`ConfigError::Parse`]), then the document
//! must describe a valid job ([`ConfigError::Validation`]).

use crate::error::{ConfigError, TrawlError};
use crate::report::{ERROR_COLUMN, LEADING_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the job configuration inside an input folder.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Declared type of a question's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Int,
    Float,
    Bool,
}

impl FieldType {
    pub const ALL: [FieldType; 4] = [
        FieldType::String,
        FieldType::Int,
        FieldType::Float,
        FieldType::Bool,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    /// File extension for reports in this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// One question to put to the model about every resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Report column name and key in the model's JSON answer.
    pub field: String,
    /// Natural-language prompt fragment.
    pub question: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl Question {
    pub fn new(field: impl Into<String>, question: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field: field.into(),
            question: question.into(),
            field_type,
        }
    }
}

/// A validated job configuration.
///
/// Invariants: `questions` is non-empty, every `field` is unique, and no
/// `field` reuses a fixed report column name.
/// Deserialising through serde applies the same validation as
/// [`load_job_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawJobConfig")]
pub struct JobConfig {
    pub job_role: String,
    pub output_format: OutputFormat,
    pub questions: Vec<Question>,
}

impl JobConfig {
    /// Parse and validate a configuration document.
    ///
    /// `path` is only used to label parse errors.
    pub fn from_json_str(json: &str, path: &Path) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        let raw: RawJobConfig = serde_json::from_value(value)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        raw.try_into()
    }

    /// Report column names, in question order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(|q| q.field.as_str())
    }

    /// The scaffold written by `create-example`: one question per field type
    /// at least.
    pub fn example(job_role: impl Into<String>) -> Self {
        let job_role = job_role.into();
        let questions = vec![
            Question::new("candidate_name", "What is the candidate's full name?", FieldType::String),
            Question::new("email", "What is the candidate's email address?", FieldType::String),
            Question::new("phone", "What is the candidate's phone number?", FieldType::String),
            Question::new(
                "total_years_experience",
                "How many total years of professional experience does the candidate have?",
                FieldType::Float,
            ),
            Question::new(
                "number_of_jobs",
                "How many different jobs/positions has the candidate held?",
                FieldType::Int,
            ),
            Question::new(
                "average_tenure_years",
                "What is the average tenure (in years) at each company the candidate has worked at?",
                FieldType::Float,
            ),
            Question::new(
                "highest_education",
                "What is the candidate's highest level of education (e.g., Bachelor's, Master's, PhD)?",
                FieldType::String,
            ),
            Question::new(
                "has_role_experience",
                format!("Does the candidate have direct {job_role} experience?"),
                FieldType::Bool,
            ),
            Question::new(
                "years_role_experience",
                format!("How many years of {job_role} experience does the candidate have?"),
                FieldType::Float,
            ),
            Question::new(
                "technical_skills",
                "List the key technical skills mentioned (comma-separated)",
                FieldType::String,
            ),
            Question::new(
                "leadership_experience",
                "Does the resume demonstrate leadership experience? Provide a brief summary.",
                FieldType::String,
            ),
            Question::new(
                "role_fit_score",
                format!(
                    "On a scale of 1-10, how well does this candidate fit the {job_role} role based on their experience and skills?"
                ),
                FieldType::Int,
            ),
            Question::new(
                "key_strengths",
                format!("What are the top 3 strengths of this candidate for a {job_role} role?"),
                FieldType::String,
            ),
            Question::new(
                "potential_concerns",
                format!("What are potential concerns or gaps for this {job_role} role?"),
                FieldType::String,
            ),
        ];

        Self {
            job_role,
            output_format: OutputFormat::Csv,
            questions,
        }
    }
}

/// Read and validate `<folder>/config.json`.
pub fn load_job_config(folder: &Path) -> Result<JobConfig, ConfigError> {
    let path = folder.join(CONFIG_FILE_NAME);
    info!("Loading configuration from {}", path.display());

    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound { path });
        }
        Err(e) => {
            return Err(ConfigError::Parse {
                path,
                detail: e.to_string(),
            })
        }
    };

    let config = JobConfig::from_json_str(&text, &path)?;
    info!(
        "Configuration loaded: role '{}', {} questions, {} output",
        config.job_role,
        config.questions.len(),
        config.output_format.extension()
    );
    Ok(config)
}

/// Write [`JobConfig::example`] to `<folder>/config.json`, creating the folder.
///
/// Refuses to replace an existing file unless `overwrite` is set.
pub fn write_example_config(
    folder: &Path,
    job_role: &str,
    overwrite: bool,
) -> Result<PathBuf, TrawlError> {
    let path = folder.join(CONFIG_FILE_NAME);
    if path.exists() && !overwrite {
        return Err(TrawlError::ExampleExists { path });
    }

    std::fs::create_dir_all(folder).map_err(|e| TrawlError::ScaffoldWrite {
        path: folder.to_path_buf(),
        source: e,
    })?;

    let json = serde_json::to_string_pretty(&JobConfig::example(job_role))
        .map_err(|e| TrawlError::Internal(format!("serialise example config: {e}")))?;

    std::fs::write(&path, json + "\n").map_err(|e| TrawlError::ScaffoldWrite {
        path: path.clone(),
        source: e,
    })?;

    info!("Example configuration created: {}", path.display());
    Ok(path)
}

// ── Validation ───────────────────────────────────────────────────────────

/// Loosely-typed mirror of the document, so that missing keys and bad enum
/// values surface as validation messages naming the offending question.
#[derive(Debug, Deserialize)]
struct RawJobConfig {
    job_role: Option<String>,
    output_format: Option<String>,
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    field: Option<String>,
    question: Option<String>,
    #[serde(rename = "type")]
    field_type: Option<String>,
}

impl TryFrom<RawJobConfig> for JobConfig {
    type Error = ConfigError;

    fn try_from(raw: RawJobConfig) -> Result<Self, Self::Error> {
        let invalid = |msg: String| ConfigError::Validation(msg);

        let job_role = raw
            .job_role
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| invalid("missing required field: job_role".into()))?;

        let output_format = match raw.output_format.as_deref().map(str::to_lowercase) {
            None => OutputFormat::default(),
            Some(f) if f == "csv" => OutputFormat::Csv,
            Some(f) if f == "json" => OutputFormat::Json,
            Some(f) => {
                return Err(invalid(format!(
                    "invalid output_format '{f}': must be 'csv' or 'json'"
                )))
            }
        };

        let raw_questions = raw
            .questions
            .ok_or_else(|| invalid("missing required field: questions".into()))?;
        if raw_questions.is_empty() {
            return Err(invalid("'questions' list cannot be empty".into()));
        }

        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(raw_questions.len());
        for (idx, q) in raw_questions.into_iter().enumerate() {
            let field = q
                .field
                .filter(|f| !f.trim().is_empty())
                .ok_or_else(|| invalid(format!("question {idx} missing required field: field")))?;
            let question = q
                .question
                .ok_or_else(|| invalid(format!("question {idx} missing required field: question")))?;

            if LEADING_COLUMNS.contains(&field.as_str()) || field == ERROR_COLUMN {
                return Err(invalid(format!(
                    "field '{field}' collides with a report column"
                )));
            }
            if !seen.insert(field.clone()) {
                return Err(invalid(format!("duplicate field name: {field}")));
            }

            let field_type = match q.field_type.as_deref() {
                None => FieldType::default(),
                Some(t) => FieldType::parse(t).ok_or_else(|| {
                    invalid(format!(
                        "invalid type '{t}' for field '{field}': must be one of string, int, float, bool"
                    ))
                })?,
            };

            questions.push(Question {
                field,
                question,
                field_type,
            });
        }

        Ok(JobConfig {
            job_role,
            output_format,
            questions,
        })
    }
}
