//! Image encoding: [`PageImage`] → base64 PNG wrapped in `ImageData`.
//!
//! Hosted vision models take images as base64 payloads inside the JSON
//! request body. Pages are re-encoded as PNG so small print on a resume stays
//! crisp; `detail: "high"` asks the provider for its full tile budget.

use crate::error::ResumeError;
use crate::pipeline::rasterize::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use tracing::debug;

/// Encode one rasterised page for the extraction request.
pub fn encode_page(page: &PageImage) -> Result<ImageData, ResumeError> {
    let mut buf = Vec::new();
    page.image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ResumeError::ImageEncoding {
            page: page.page_num,
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Page {}: encoded → {} bytes base64", page.page_num, b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode every page, stopping at the first failure.
pub fn encode_pages(pages: &[PageImage]) -> Result<Vec<ImageData>, ResumeError> {
    pages.iter().map(encode_page).collect()
}
