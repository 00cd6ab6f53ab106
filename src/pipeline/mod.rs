//! Pipeline stages for screening one folder of resumes.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the two external dependencies (the rasterizer binary and the
//! hosted model) sit behind the [`rasterize::Rasterize`] and
//! [`extract::Extract`] traits.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ rasterize ──▶ encode ──▶ extract ──▶ response ──▶ sanitize
//! (folder)     (pdftoppm)    (base64)   (VLM)       (JSON)       (typed)
//! ```
//!
//! 1. [`discover`] : list the PDFs at the top level of the input folder
//! 2. [`rasterize`]: one `pdftoppm` run per PDF into a scoped temp directory
//! 3. [`encode`]   : PNG-encode and base64-wrap each page for the request body
//! 4. [`extract`]  : one multimodal request per resume, bounded by a timeout;
//!    the only stage with network I/O
//! 5. [`response`] : pull the JSON object out of the model's text
//! 6. [`sanitize`] : coerce each answer to its declared type and clean text

pub mod discover;
pub mod encode;
pub mod extract;
pub mod rasterize;
pub mod response;
pub mod sanitize;
