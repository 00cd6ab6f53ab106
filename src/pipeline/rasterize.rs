//! PDF rasterisation: run `pdftoppm` once per resume and load its pages.
//!
//! The tool writes one PNG per page into a private [`TempDir`]; the directory
//! is removed when it goes out of scope, on success and failure alike.
//!
//! `pdftoppm` names its output `page-1.png … page-9.png` for short documents
//! and zero-pads for long ones (`page-01.png`). Pages are ordered by the
//! parsed number, never lexically, so page 10 always follows page 9.

use crate::config::TrawlConfig;
use crate::error::{ResumeError, TrawlError};
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// File-name prefix handed to `pdftoppm` for its page images.
const PAGE_PREFIX: &str = "page";

/// One rendered page, 1-indexed.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_num: usize,
    pub image: DynamicImage,
}

/// Turns a PDF into its ordered page images.
#[async_trait]
pub trait Rasterize: Send + Sync {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, ResumeError>;
}

/// [`Rasterize`] backed by poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    binary: PathBuf,
    dpi: u32,
}

impl PdfRasterizer {
    pub fn new(binary: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            dpi,
        }
    }

    /// Find `pdftoppm` using the configured override, the platform install
    /// locations and the configured search path, in that order.
    pub fn locate(config: &TrawlConfig) -> Result<Self, TrawlError> {
        let binary = poppler_locate::locate_pdftoppm(
            config.rasterizer_path.as_deref(),
            config.search_path.as_deref(),
        )?;
        info!("Using rasterizer: {}", binary.display());
        Ok(Self::new(binary, config.dpi))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

#[async_trait]
impl Rasterize for PdfRasterizer {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, ResumeError> {
        check_pdf(pdf_path)?;

        let temp_dir = tempfile::Builder::new()
            .prefix("resume-trawler-")
            .tempdir()
            .map_err(|e| ResumeError::PdfConversion {
                detail: format!("could not create temp directory: {e}"),
            })?;

        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf_path)
            .arg(temp_dir.path().join(PAGE_PREFIX))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResumeError::PdfConversion {
                detail: format!("failed to run {}: {e}", self.binary.display()),
            })?;

        if !output.status.success() {
            return Err(ResumeError::PdfConversion {
                detail: describe_failure(output.status.code(), &output.stderr),
            });
        }

        let pages = load_pages(temp_dir).await?;
        debug!("{}: rasterised {} pages", pdf_path.display(), pages.len());
        Ok(pages)
    }
}

/// Cheap pre-flight checks so obviously bad inputs never reach the tool.
fn check_pdf(pdf_path: &Path) -> Result<(), ResumeError> {
    match std::fs::metadata(pdf_path) {
        Ok(m) if m.len() == 0 => Err(ResumeError::EmptyPdf),
        Ok(_) => Ok(()),
        Err(_) => Err(ResumeError::PdfNotFound {
            path: pdf_path.to_path_buf(),
        }),
    }
}

/// Decode every page image in `temp_dir`, in page order.
///
/// Decoding is CPU-bound, so it runs on the blocking pool. The `TempDir`
/// moves into the task and is removed when the task finishes.
async fn load_pages(temp_dir: TempDir) -> Result<Vec<PageImage>, ResumeError> {
    tokio::task::spawn_blocking(move || {
        let files = collect_page_files(temp_dir.path())?;
        if files.is_empty() {
            return Err(ResumeError::NoPages);
        }

        files
            .into_iter()
            .map(|(page_num, path)| {
                let image = image::open(&path).map_err(|e| ResumeError::PdfConversion {
                    detail: format!("page {page_num}: unreadable image: {e}"),
                })?;
                debug!(
                    "Page {} → {}x{} px",
                    page_num,
                    image.width(),
                    image.height()
                );
                Ok(PageImage { page_num, image })
            })
            .collect()
    })
    .await
    .map_err(|e| ResumeError::PdfConversion {
        detail: format!("page loading task panicked: {e}"),
    })?
}

/// List `page-N.png` files in `dir`, sorted by `N`.
fn collect_page_files(dir: &Path) -> Result<Vec<(usize, PathBuf)>, ResumeError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ResumeError::PdfConversion {
        detail: format!("could not list rendered pages: {e}"),
    })?;

    let mut pages: Vec<(usize, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            page_number(name.to_str()?).map(|n| (n, e.path()))
        })
        .collect();

    pages.sort_by_key(|(n, _)| *n);
    Ok(pages)
}

/// `"page-07.png"` → `Some(7)`.
fn page_number(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Human-readable failure text from the tool's exit code and stderr.
fn describe_failure(code: Option<i32>, stderr: &[u8]) -> String {
    let diag = String::from_utf8_lossy(stderr).trim().to_string();
    let exit = match code {
        Some(c) => format!("pdftoppm exited with status {c}"),
        None => "pdftoppm was terminated by a signal".to_string(),
    };

    if diag.to_lowercase().contains("password") {
        format!("PDF is password-protected ({exit}): {diag}")
    } else if diag.is_empty() {
        exit
    } else {
        format!("{exit}: {diag}")
    }
}
