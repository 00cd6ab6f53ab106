//! PDF discovery: the resumes to process in one input folder.
//!
//! Only the folder's top level is scanned. A file counts as a resume when its
//! extension is `pdf` in any letter case; the result is sorted by path so
//! every run over the same folder visits resumes in the same order.

use crate::error::TrawlError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check that `folder` exists and is a directory.
pub fn check_folder(folder: &Path) -> Result<(), TrawlError> {
    if !folder.exists() {
        return Err(TrawlError::FolderNotFound {
            path: folder.to_path_buf(),
        });
    }
    if !folder.is_dir() {
        return Err(TrawlError::NotADirectory {
            path: folder.to_path_buf(),
        });
    }
    Ok(())
}

/// List the PDF files directly inside `folder`, sorted and de-duplicated.
pub fn discover_pdfs(folder: &Path) -> Result<Vec<PathBuf>, TrawlError> {
    check_folder(folder)?;

    let entries = std::fs::read_dir(folder).map_err(|e| TrawlError::FolderUnreadable {
        path: folder.to_path_buf(),
        source: e,
    })?;

    let mut pdfs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TrawlError::FolderUnreadable {
            path: folder.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() && is_pdf(&path) {
            pdfs.push(path);
        }
    }

    pdfs.sort();
    pdfs.dedup();
    debug!("Discovered {} PDFs in {}", pdfs.len(), folder.display());
    Ok(pdfs)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
