//! Extraction prompt for the vision model.
//!
//! One prompt is built per folder from its [`JobConfig`] and sent, unchanged,
//! with every resume in that folder. Keeping the text here means prompt
//! wording can be reviewed and tested without a live model.

use crate::job::{FieldType, JobConfig};
use std::fmt::Write as _;

/// Output rules appended after the field list.
pub const RESPONSE_RULES: &str = r#"Response rules:
1. Reply with a single JSON object and nothing else: no prose, no code fences.
2. Use exactly the field names listed above as the object's keys, one key per field.
3. int and float fields take JSON numbers, never quoted strings.
4. bool fields take JSON true or false.
5. string fields take short plain-text answers.
6. If the resume does not contain the information, use null for that field.
7. Write plain ASCII: no bullet symbols, no smart quotes, no special dashes. Use "-" for dashes and "1. 2. 3." for lists."#;

/// Build the extraction prompt for `job`.
///
/// Every question contributes one line naming its field, its declared type
/// and its question text, in configuration order.
pub fn build_extraction_prompt(job: &JobConfig) -> String {
    let mut prompt = format!(
        "You are screening a resume for the role of: {}\n\n\
         The attached images are every page of one candidate's resume, in order. \
         Read all of them, then answer the questions below.\n\n\
         Answer with ONLY a valid JSON object.\n\n\
         Fields to extract:\n",
        job.job_role
    );

    for q in &job.questions {
        // Writing to a String cannot fail.
        let _ = writeln!(prompt, "- {} ({}): {}", q.field, q.field_type, q.question);
    }

    prompt.push('\n');
    prompt.push_str(RESPONSE_RULES);
    prompt.push_str("\n\nExpected shape:\n");
    prompt.push_str(&shape_hint(job));
    prompt
}

/// A sample object with one placeholder per field, e.g. `{"years": <int>}`.
fn shape_hint(job: &JobConfig) -> String {
    let body: Vec<String> = job
        .questions
        .iter()
        .map(|q| format!("  \"{}\": {}", q.field, placeholder(q.field_type)))
        .collect();
    format!("{{\n{}\n}}", body.join(",\n"))
}

fn placeholder(t: FieldType) -> &'static str {
    match t {
        FieldType::String => "\"<text or null>\"",
        FieldType::Int => "<integer or null>",
        FieldType::Float => "<number or null>",
        FieldType::Bool => "<true, false or null>",
    }
}
