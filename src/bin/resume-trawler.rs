//! CLI binary for resume-trawler.
//!
//! A thin shim over the library crate that maps CLI flags to `TrawlConfig`,
//! drives a progress bar and prints the run summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use resume_trawler::{
    create_example, run, Pricing, ProgressCallback, ResumeRow, TrawlConfig, TrawlProgressCallback,
    TrawlSummary,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the run plus a log line per
/// resume. Works when resumes finish out of order (`--concurrency > 1`).
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-resume wall-clock start times, keyed by 1-based index.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading configuration…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Clear the bar if the run ended before `on_run_complete`.
    fn clear_if_running(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TrawlProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} resumes  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Screening");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Screening {total} resumes…"))
        ));
    }

    fn on_resume_start(&self, index: usize, _total: usize, filename: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(filename.to_string());
    }

    fn on_resume_complete(&self, index: usize, total: usize, row: &ResumeRow) {
        let secs = self.elapsed_secs(index);

        if row.is_success() {
            let invalid = row.invalid_fields();
            let missing = row.missing_fields.len();
            let mut note = String::new();
            if invalid > 0 {
                note.push_str(&format!("  {}", cyan(&format!("{invalid} invalid field(s)"))));
            }
            if missing > 0 {
                note.push_str(&format!("  {}", cyan(&format!("{missing} unanswered"))));
            }
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}  {}  {}{}",
                green("✓"),
                index,
                total,
                row.filename,
                dim(&format!("${:.4}", row.cost_usd)),
                dim(&format!("{secs:.1}s")),
                note,
            ));
        } else {
            self.errors.fetch_add(1, Ordering::SeqCst);
            let error = match row.failed_stage {
                Some(stage) => format!("[{stage}] {}", row.error.as_deref().unwrap_or_default()),
                None => row.error.clone().unwrap_or_default(),
            };
            let msg = match error.char_indices().nth(80) {
                Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
                None => error,
            };
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}  {}  {}",
                red("✗"),
                index,
                total,
                row.filename,
                red(&msg),
                dim(&format!("{secs:.1}s")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} resumes screened successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} resumes screened  ({} failed)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scaffold a folder with an example config.json
  resume-trawler create-example ./candidates --job-role "Data Engineer"

  # Screen every PDF in the folder (report lands in the working directory)
  resume-trawler run ./candidates

  # Two resumes at a time, report into ./reports
  resume-trawler run ./candidates --concurrency 2 --output-dir ./reports

  # Check that pdftoppm can be found
  resume-trawler check

CONFIG.JSON:
  {
    "job_role": "Data Engineer",
    "output_format": "csv",            (csv | json)
    "questions": [
      { "field": "candidate_name", "question": "Full name?", "type": "string" },
      { "field": "years_exp", "question": "Years of experience?", "type": "float" }
    ]
  }
  Types: string, int, float, bool.

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY            Anthropic API key (default provider)
  ANTHROPIC_MODEL              Model ID (default: claude-sonnet-4-5-20250929)
  RESUME_TRAWLER_PROVIDER      Provider name (anthropic, openai, gemini, …)
  EDGEQUAKE_LLM_PROVIDER       Provider override, used together with EDGEQUAKE_MODEL
  EDGEQUAKE_MODEL              Model override, used together with EDGEQUAKE_LLM_PROVIDER
  POPPLER_PATH                 Directory containing pdftoppm (or the binary itself)
  RUST_LOG                     Log filter, e.g. resume_trawler=debug

  Variables may also be placed in a .env file in the working directory.

SETUP:
  1. Install poppler:  brew install poppler  |  apt install poppler-utils
  2. Set API key:      export ANTHROPIC_API_KEY=sk-ant-...
  3. Screen:           resume-trawler run ./candidates
"#;

/// Batch-screen PDF resumes with a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "resume-trawler",
    version,
    about = "Batch-screen PDF resumes with a vision LLM",
    long_about = "Screen every PDF resume in a folder against the questions in its config.json \
using a vision language model, and write a CSV or JSON report with one row per resume, \
including token usage and API cost.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RESUME_TRAWLER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RESUME_TRAWLER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Screen every PDF resume in FOLDER and write the report.
    Run(RunArgs),

    /// Write an example config.json into FOLDER (created if missing).
    CreateExample {
        /// Folder to scaffold.
        folder: PathBuf,

        /// Job role used in the example questions.
        #[arg(long)]
        job_role: Option<String>,

        /// Overwrite an existing config.json.
        #[arg(long)]
        force: bool,
    },

    /// Locate pdftoppm and print its version.
    Check {
        /// Directory containing pdftoppm, or the binary itself.
        #[arg(long, env = "POPPLER_PATH")]
        poppler_path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Folder containing the PDF resumes and config.json.
    folder: PathBuf,

    /// LLM model ID [default: claude-sonnet-4-5-20250929].
    #[arg(long, env = "ANTHROPIC_MODEL")]
    model: Option<String>,

    /// LLM provider: anthropic, openai, gemini, ollama, azure.
    #[arg(
        long,
        env = "RESUME_TRAWLER_PROVIDER",
        long_help = "LLM provider. Resolved from the environment if not set \
          (EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL, then ANTHROPIC_API_KEY, then any configured key)."
    )]
    provider: Option<String>,

    /// Rasterisation DPI (72–400).
    #[arg(long, env = "RESUME_TRAWLER_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Per-resume LLM call timeout in seconds.
    #[arg(long, env = "RESUME_TRAWLER_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Max LLM output tokens per resume.
    #[arg(long, env = "RESUME_TRAWLER_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "RESUME_TRAWLER_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Resumes processed at once. Report order is unaffected.
    #[arg(short, long, env = "RESUME_TRAWLER_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Directory containing pdftoppm, or the binary itself.
    #[arg(long, env = "POPPLER_PATH")]
    poppler_path: Option<PathBuf>,

    /// Directory the report is written to.
    #[arg(short, long, env = "RESUME_TRAWLER_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Input token price in USD per million tokens.
    #[arg(long, env = "RESUME_TRAWLER_INPUT_PRICE", default_value_t = 3.0)]
    input_price: f64,

    /// Output token price in USD per million tokens.
    #[arg(long, env = "RESUME_TRAWLER_OUTPUT_PRICE", default_value_t = 15.0)]
    output_price: f64,

    /// Disable progress bar.
    #[arg(long, env = "RESUME_TRAWLER_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are dropped while the progress bar is active; the
    // bar prints its own per-resume lines.
    let show_progress = matches!(&cli.command, Command::Run(args) if !args.no_progress) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run(ref args) => run_command(args, show_progress, cli.quiet).await,
        Command::CreateExample {
            ref folder,
            ref job_role,
            force,
        } => {
            let path = create_example(folder, job_role.as_deref(), force)
                .context("Failed to create example configuration")?;
            if !cli.quiet {
                eprintln!("{} Created {}", green("✔"), bold(&path.display().to_string()));
                eprintln!(
                    "   Edit the questions, add PDF resumes, then run: resume-trawler run {}",
                    folder.display()
                );
            }
            Ok(())
        }
        Command::Check { ref poppler_path } => {
            let path_var = std::env::var_os("PATH");
            let bin = poppler_locate::locate_pdftoppm(poppler_path.as_deref(), path_var.as_deref())
                .context("pdftoppm is not available")?;
            let version = poppler_locate::probe_version(&bin).context("pdftoppm did not run")?;
            println!("{} {}", green("✔"), bin.display());
            println!("   {}", dim(&version));
            Ok(())
        }
    }
}

async fn run_command(args: &RunArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn TrawlProgressCallback>);

    let config = build_config(args, progress)?;
    let result = run(&args.folder, &config).await;
    // Setup errors and empty folders end the run before `on_run_complete`.
    if let Some(ref cb) = cli_progress {
        cb.clear_if_running();
    }
    let summary =
        result.with_context(|| format!("Trawl of '{}' failed", args.folder.display()))?;

    if !quiet {
        print_summary(&summary);
    }
    Ok(())
}

/// Map CLI args to `TrawlConfig`.
fn build_config(args: &RunArgs, progress: Option<ProgressCallback>) -> Result<TrawlConfig> {
    let mut builder = TrawlConfig::builder()
        .dpi(args.dpi)
        .api_timeout_secs(args.api_timeout)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .concurrency(args.concurrency)
        .output_dir(args.output_dir.clone())
        .pricing(Pricing {
            input_per_million: args.input_price,
            output_per_million: args.output_price,
        });

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref name) = args.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref path) = args.poppler_path {
        builder = builder.rasterizer_path(path.clone());
    }
    if let Some(path_var) = std::env::var_os("PATH") {
        builder = builder.search_path(path_var);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(s: &TrawlSummary) {
    let Some(ref path) = s.output_path else {
        eprintln!("{} No PDF resumes found; nothing to report.", cyan("⚠"));
        return;
    };

    eprintln!();
    eprintln!("{}", bold("Summary"));
    eprintln!("   Resumes:        {}", s.total);
    eprintln!("   Successful:     {}", green(&s.succeeded.to_string()));
    if s.failed > 0 {
        eprintln!(
            "   Failed:         {}  {}",
            red(&s.failed.to_string()),
            dim(&format!(
                "({} rasterization, {} extraction)",
                s.rasterization_failures, s.extraction_failures
            ))
        );
    } else {
        eprintln!("   Failed:         0");
    }
    eprintln!(
        "   Tokens:         {} in  /  {} out",
        s.total_input_tokens, s.total_output_tokens
    );
    if s.missing_answers > 0 {
        eprintln!("   Unanswered:     {}", cyan(&s.missing_answers.to_string()));
    }
    eprintln!("   Total cost:     ${:.4}", s.total_cost_usd);
    eprintln!("   Avg per resume: ${:.4}", s.avg_cost_usd);
    eprintln!("{}  {}", green("→"), bold(&path.display().to_string()));
}
