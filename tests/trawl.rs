//! Orchestrator tests with in-process stand-ins for `pdftoppm` and the model.
//!
//! Each fake PDF is a small text file read by [`FakeRasterizer`]:
//!
//! ```text
//! pages=2 delay=30 reply=ok
//! ```
//!
//! * `pages` : number of page images produced (0 = conversion failure)
//! * `delay` : milliseconds [`FakeExtractor`] waits before answering
//! * `reply` : `ok`, `partial` (one field left out) or `garbage` (not JSON)

use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse};
use image::DynamicImage;
use resume_trawler::{
    create_example, ConfigError, Extract, ExtractionResult, FieldType, JobConfig, PageImage,
    Pricing, ProgressCallback, Rasterize, ResumeError, ResumeRow, TokenUsage, TrawlConfig,
    TrawlError, TrawlProgressCallback, Trawler, VisionExtractor,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeRasterizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Rasterize for FakeRasterizer {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, ResumeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let directives = std::fs::read_to_string(pdf_path).map_err(|_| ResumeError::PdfNotFound {
            path: pdf_path.to_path_buf(),
        })?;
        let pages: usize = directive(&directives, "pages").parse().unwrap_or(0);
        if pages == 0 {
            return Err(ResumeError::PdfConversion {
                detail: "Syntax Error: Couldn't find trailer dictionary".into(),
            });
        }
        let delay: u32 = directive(&directives, "delay").parse().unwrap_or(0);
        let reply = match directive(&directives, "reply") {
            "garbage" => 2,
            "partial" => 1,
            _ => 0,
        };

        // Width carries the extractor's delay, height its reply kind.
        Ok((1..=pages)
            .map(|page_num| PageImage {
                page_num,
                image: DynamicImage::new_rgb8(delay + 1, reply + 1),
            })
            .collect())
    }
}

struct FakeExtractor {
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Extract for FakeExtractor {
    async fn extract(&self, job: &JobConfig, pages: &[PageImage]) -> Result<ExtractionResult, ResumeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = &pages[0].image;
        tokio::time::sleep(Duration::from_millis(u64::from(first.width() - 1))).await;

        let usage = TokenUsage {
            input_tokens: 1500 * pages.len(),
            output_tokens: 200,
        };
        let content = match first.height() - 1 {
            2 => "I could not read this document.".to_string(),
            1 => r#"{"candidate_name": "Grace Hopper"}"#.to_string(),
            _ => format!(
                "```json\n{{\"candidate_name\": \"Ada \u{201C}Countess\u{201D} Lovelace\", \
                 \"years_experience\": \"{}\", \"has_degree\": \"yes\"}}\n```",
                pages.len() * 3
            ),
        };
        ExtractionResult::from_response(&content, usage, job)
    }
}

/// Hosted-model stand-in that stalls on multi-page resumes.
struct StallingProvider;

#[async_trait]
impl LLMProvider for StallingProvider {
    fn name(&self) -> &str {
        "stalling"
    }

    fn model(&self) -> &str {
        "stalling-vision"
    }

    fn max_context_length(&self) -> usize {
        200_000
    }

    async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
        self.chat(&[ChatMessage::user(prompt)], None).await
    }

    async fn complete_with_options(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.chat(&[ChatMessage::user(prompt)], Some(options)).await
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> edgequake_llm::Result<LLMResponse> {
        let images: usize = messages
            .iter()
            .map(|m| m.images.as_ref().map_or(0, Vec::len))
            .sum();
        if images > 1 {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        Ok(LLMResponse::new(
            r#"{"candidate_name": "Linus", "years_experience": 30, "has_degree": true}"#,
            "stalling-vision",
        )
        .with_usage(900, 40))
    }
}

#[derive(Default)]
struct RecordingProgress {
    started: Mutex<Option<usize>>,
    completed: Mutex<Vec<(usize, String)>>,
    finished: Mutex<Option<(usize, usize)>>,
}

impl TrawlProgressCallback for RecordingProgress {
    fn on_run_start(&self, total: usize) {
        *self.started.lock().unwrap() = Some(total);
    }

    fn on_resume_complete(&self, index: usize, _total: usize, row: &ResumeRow) {
        self.completed.lock().unwrap().push((index, row.filename.clone()));
    }

    fn on_run_complete(&self, total: usize, succeeded: usize) {
        *self.finished.lock().unwrap() = Some((total, succeeded));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn directive<'a>(directives: &'a str, key: &str) -> &'a str {
    directives.split_whitespace()
        .find_map(|kv| kv.strip_prefix(key)?.strip_prefix('='))
        .unwrap_or("")
}

const CONFIG: &str = r#"{
  "job_role": "Backend Engineer",
  "output_format": "csv",
  "questions": [
    {"field": "candidate_name", "question": "Full name?", "type": "string"},
    {"field": "years_experience", "question": "Years of experience?", "type": "int"},
    {"field": "has_degree", "question": "Has a degree?", "type": "bool"}
  ]
}"#;

struct Fixture {
    _root: tempfile::TempDir,
    folder: PathBuf,
    out: PathBuf,
}

fn fixture(config: &str, pdfs: &[(&str, &str)]) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let folder = root.path().join("candidates");
    let out = root.path().join("reports");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("config.json"), config).unwrap();
    for (name, directives) in pdfs {
        std::fs::write(folder.join(name), directives).unwrap();
    }
    Fixture {
        _root: root,
        folder,
        out,
    }
}

fn trawler() -> (Trawler, Arc<FakeRasterizer>, Arc<FakeExtractor>) {
    let rasterizer = Arc::new(FakeRasterizer::default());
    let extractor = Arc::new(FakeExtractor::new());
    let t = Trawler::new(rasterizer.clone(), extractor.clone());
    (t, rasterizer, extractor)
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let header = rdr.headers().unwrap().iter().map(str::to_string).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

fn report_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

// ── Partial-failure isolation ────────────────────────────────────────────────

#[tokio::test]
async fn corrupted_resume_becomes_an_error_row() {
    let fx = fixture(
        CONFIG,
        &[
            ("alice.pdf", "pages=2 reply=ok"),
            ("bob.pdf", "pages=0"),
            ("carol.pdf", "pages=1 reply=ok"),
        ],
    );
    let (t, _, extractor) = trawler();

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rasterization_failures, 1);
    assert_eq!(summary.extraction_failures, 0);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);

    let path = summary.output_path.clone().unwrap();
    let (header, rows) = read_csv(&path);
    assert_eq!(
        header,
        vec![
            "filename",
            "status",
            "pages_processed",
            "input_tokens",
            "output_tokens",
            "cost_usd",
            "candidate_name",
            "years_experience",
            "has_degree",
            "error"
        ]
    );
    assert_eq!(rows.len(), 3);

    let names: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["alice.pdf", "bob.pdf", "carol.pdf"]);

    let bob = &rows[1];
    assert_eq!(bob[1], "error");
    assert_eq!(bob[3], "0");
    assert_eq!(bob[4], "0");
    assert_eq!(bob[6], "");
    assert!(bob[9].contains("trailer dictionary"), "error cell: {}", bob[9]);

    let alice = &rows[0];
    assert_eq!(alice[1], "success");
    assert_eq!(alice[2], "2");
    assert_eq!(alice[6], "Ada \"Countess\" Lovelace");
    assert_eq!(alice[7], "6");
    assert_eq!(alice[8], "true");
    assert_eq!(alice[9], "");

    // Total cost is exactly the sum of the two successful resumes.
    let p = Pricing::default();
    let expected = p.cost(3000, 200) + p.cost(1500, 200);
    assert!((summary.total_cost_usd - expected).abs() < 1e-12);
    assert!((summary.avg_cost_usd - expected / 3.0).abs() < 1e-12);
}

#[tokio::test]
async fn row_count_matches_discovered_pdfs() {
    let pdfs: Vec<(String, String)> = (0..7)
        .map(|i| {
            let directives = if i % 3 == 0 { "pages=0" } else { "pages=1 reply=ok" };
            (format!("cv_{i:02}.pdf"), directives.to_string())
        })
        .collect();
    let refs: Vec<(&str, &str)> = pdfs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let fx = fixture(CONFIG, &refs);
    std::fs::write(fx.folder.join("cover_letter.docx"), "x").unwrap();
    let (t, rasterizer, _) = trawler();

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    assert_eq!(summary.total, 7);
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 7);

    let path = summary.output_path.unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap().split('_').nth(2),
        Some("7")
    );
    assert_eq!(read_csv(&path).1.len(), 7);
}

#[tokio::test]
async fn unparseable_answer_is_billed_on_its_error_row() {
    let fx = fixture(CONFIG, &[("garbled.pdf", "pages=2 reply=garbage")]);
    let (t, _, _) = trawler();

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_input_tokens, 3000);
    assert!(summary.total_cost_usd > 0.0);

    let (_, rows) = read_csv(&summary.output_path.unwrap());
    assert_eq!(rows[0][1], "error");
    assert!(rows[0][9].contains("Could not parse model response"));
}

#[tokio::test]
async fn missing_field_is_an_empty_cell_on_a_successful_row() {
    let fx = fixture(CONFIG, &[("grace.pdf", "pages=1 reply=partial")]);
    let (t, _, _) = trawler();

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.missing_answers, 2);

    let (_, rows) = read_csv(&summary.output_path.unwrap());
    assert_eq!(rows[0][1], "success");
    assert_eq!(rows[0][6], "Grace Hopper");
    assert_eq!(rows[0][7], "");
    assert_eq!(rows[0][8], "");
}

#[tokio::test]
async fn timed_out_resume_is_an_error_row_and_the_next_one_proceeds() {
    let fx = fixture(
        CONFIG,
        &[("a_long.pdf", "pages=3 reply=ok"), ("b_short.pdf", "pages=1 reply=ok")],
    );
    let config = TrawlConfig::builder().api_timeout_secs(1).build().unwrap();
    let extractor = Arc::new(VisionExtractor::new(Arc::new(StallingProvider), &config));
    let t = Trawler::new(Arc::new(FakeRasterizer::default()), extractor);

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.extraction_failures, 1);
    assert_eq!(summary.total_input_tokens, 900);

    let (_, rows) = read_csv(&summary.output_path.unwrap());
    assert_eq!(rows[0][0], "a_long.pdf");
    assert_eq!(rows[0][1], "error");
    assert_eq!(rows[0][2], "3");
    assert!(rows[0][9].contains("timed out after 1s"), "error cell: {}", rows[0][9]);

    assert_eq!(rows[1][1], "success");
    assert_eq!(rows[1][3], "900");
    assert_eq!(rows[1][4], "40");
    assert_eq!(rows[1][6], "Linus");
    assert_eq!(rows[1][7], "30");
}

// ── Fatal setup errors ───────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_question_type_fails_before_any_resume() {
    let config = CONFIG.replace(r#""type": "bool""#, r#""type": "date""#);
    let fx = fixture(&config, &[("alice.pdf", "pages=1 reply=ok")]);
    let (t, rasterizer, extractor) = trawler();

    match t.trawl(&fx.folder, &fx.out).await {
        Err(TrawlError::Config(ConfigError::Validation(msg))) => {
            assert!(msg.contains("date"), "message: {msg}")
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(report_files(&fx.out).is_empty());
}

#[tokio::test]
async fn field_named_like_a_report_column_fails_before_any_resume() {
    let config = CONFIG.replace(r#""field": "has_degree""#, r#""field": "status""#);
    let fx = fixture(&config, &[("alice.pdf", "pages=1 reply=ok")]);
    let (t, rasterizer, extractor) = trawler();

    match t.trawl(&fx.folder, &fx.out).await {
        Err(TrawlError::Config(ConfigError::Validation(msg))) => {
            assert_eq!(msg, "field 'status' collides with a report column")
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(report_files(&fx.out).is_empty());
}

#[tokio::test]
async fn missing_config_is_fatal() {
    let fx = fixture(CONFIG, &[("alice.pdf", "pages=1 reply=ok")]);
    std::fs::remove_file(fx.folder.join("config.json")).unwrap();
    let (t, rasterizer, _) = trawler();

    let err = t.trawl(&fx.folder, &fx.out).await.unwrap_err();
    assert!(matches!(err, TrawlError::Config(ConfigError::NotFound { .. })));
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_folder_is_fatal() {
    let (t, _, _) = trawler();
    let root = tempfile::tempdir().unwrap();
    let err = t
        .trawl(&root.path().join("nowhere"), root.path())
        .await
        .unwrap_err();
    assert!(matches!(err, TrawlError::FolderNotFound { .. }));
}

#[tokio::test]
async fn empty_folder_writes_no_report() {
    let fx = fixture(CONFIG, &[]);
    let (t, _, _) = trawler();

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    assert_eq!(summary.total, 0);
    assert!(summary.output_path.is_none());
    assert!(report_files(&fx.out).is_empty());
}

// ── Ordering and concurrency ─────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_processing_keeps_discovery_order() {
    // Earlier files answer slower, so completion order is reversed.
    let fx = fixture(
        CONFIG,
        &[
            ("a.pdf", "pages=1 delay=120 reply=ok"),
            ("b.pdf", "pages=1 delay=80 reply=ok"),
            ("c.pdf", "pages=1 delay=40 reply=ok"),
            ("d.pdf", "pages=1 delay=0 reply=ok"),
        ],
    );
    let (t, _, _) = trawler();
    let progress = Arc::new(RecordingProgress::default());
    let t = t
        .with_concurrency(4)
        .with_progress(progress.clone() as ProgressCallback);

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    let (_, rows) = read_csv(&summary.output_path.unwrap());
    let names: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);

    assert_eq!(*progress.started.lock().unwrap(), Some(4));
    assert_eq!(*progress.finished.lock().unwrap(), Some((4, 4)));
    let completed = progress.completed.lock().unwrap();
    assert_eq!(completed.len(), 4);
    assert!(completed.contains(&(1, "a.pdf".to_string())));
}

// ── Output formats ───────────────────────────────────────────────────────────

#[tokio::test]
async fn json_report_has_one_object_per_resume() {
    let config = CONFIG.replace(r#""output_format": "csv""#, r#""output_format": "JSON""#);
    let fx = fixture(
        &config,
        &[("x.pdf", "pages=1 reply=ok"), ("y.pdf", "pages=0")],
    );
    let (t, _, _) = trawler();

    let summary = t.trawl(&fx.folder, &fx.out).await.unwrap();
    let path = summary.output_path.unwrap();
    assert_eq!(path.extension().unwrap(), "json");

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["years_experience"], serde_json::json!(3));
    assert_eq!(arr[0]["has_degree"], serde_json::json!(true));
    assert_eq!(arr[1]["status"], serde_json::json!("error"));
    assert!(arr[1]["candidate_name"].is_null());
}

// ── Scaffolding ──────────────────────────────────────────────────────────────

#[test]
fn example_config_covers_every_type_and_loads() {
    let root = tempfile::tempdir().unwrap();
    let folder = root.path().join("new_role");
    let path = create_example(&folder, Some("Site Reliability Engineer"), false).unwrap();
    assert!(path.ends_with("config.json"));

    let job = resume_trawler::load_job_config(&folder).unwrap();
    assert_eq!(job.job_role, "Site Reliability Engineer");
    for t in FieldType::ALL {
        assert!(
            job.questions.iter().any(|q| q.field_type == t),
            "example lacks a {t} question"
        );
    }

    let again = create_example(&folder, None, false).unwrap_err();
    assert!(matches!(again, TrawlError::ExampleExists { .. }));
    assert!(create_example(&folder, None, true).is_ok());
}
