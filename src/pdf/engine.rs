//! Document engine boundary
//!
//! The viewer does not decode document internals itself. An engine turns an
//! already-validated byte buffer into a handle exposing page count, natural
//! page sizes, and paint-at-scale. The crate ships a MuPDF-backed engine
//! behind the `pdf` feature; hosts may supply their own.
//!
//! Byte validation (minimum size, signature) happens here, in front of the
//! engine, so malformed input never reaches the backend and always produces
//! a distinct cause string.

use crate::error::ViewerError;

use super::types::PagePixels;

/// Minimum viable document size in bytes. A real document header plus
/// cross-reference table cannot fit below this.
pub const MIN_DOCUMENT_BYTES: usize = 1024;

/// Leading signature every supported document must carry.
pub const DOCUMENT_MAGIC: &[u8; 5] = b"%PDF-";

/// Errors from engine backends. The detail string is retained verbatim for
/// diagnostics.
#[derive(Debug, thiserror::Error)]
#[error("{detail}")]
pub struct EngineError {
    detail: String,
}

impl EngineError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<mupdf::error::Error> for EngineError {
    fn from(err: mupdf::error::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Validate raw bytes before they reach an engine.
///
/// Size is checked before the signature so a truncated buffer reports
/// "too small" rather than a misleading header complaint.
pub fn validate_bytes(bytes: &[u8]) -> Result<(), ViewerError> {
    if bytes.len() < MIN_DOCUMENT_BYTES {
        return Err(ViewerError::TooSmall { len: bytes.len() });
    }
    if !bytes.starts_with(DOCUMENT_MAGIC) {
        return Err(ViewerError::InvalidHeader);
    }
    Ok(())
}

/// Factory for engine document handles. Shared across render workers, so it
/// must be thread-safe; the handles it produces stay on the opening thread.
pub trait DocumentEngine: Send + Sync {
    /// Open a document from validated bytes, or reject it with the
    /// underlying decoder message.
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn EngineDocument>, EngineError>;
}

/// A decoded document: page count plus per-page size and paint capability.
///
/// Pages are 1-based throughout the viewer.
pub trait EngineDocument {
    fn page_count(&self) -> u32;

    /// Natural (unscaled) page size in points.
    fn page_size(&self, page: u32) -> Result<(f32, f32), EngineError>;

    /// Rasterize a page at the given scale into an RGBA buffer.
    fn paint(&self, page: u32, scale: f32) -> Result<PagePixels, EngineError>;
}

#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfEngine;

#[cfg(feature = "pdf")]
mod mupdf_backend {
    use mupdf::{Colorspace, Document, Matrix};

    use super::{DocumentEngine, EngineDocument, EngineError};
    use crate::pdf::types::PagePixels;

    /// MuPDF-backed document engine.
    pub struct MupdfEngine;

    impl DocumentEngine for MupdfEngine {
        fn open(&self, bytes: &[u8]) -> Result<Box<dyn EngineDocument>, EngineError> {
            let doc = Document::from_bytes(bytes, "pdf")?;
            let pages = doc.page_count()?;
            if pages < 1 {
                return Err(EngineError::new("Document has no pages"));
            }
            Ok(Box::new(MupdfDocument {
                doc,
                pages: pages as u32,
            }))
        }
    }

    struct MupdfDocument {
        doc: Document,
        pages: u32,
    }

    impl EngineDocument for MupdfDocument {
        fn page_count(&self) -> u32 {
            self.pages
        }

        fn page_size(&self, page: u32) -> Result<(f32, f32), EngineError> {
            let page = self.doc.load_page(page as i32 - 1)?;
            let bounds = page.bounds()?;
            Ok((bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
        }

        fn paint(&self, page: u32, scale: f32) -> Result<PagePixels, EngineError> {
            let page = self.doc.load_page(page as i32 - 1)?;
            let transform = Matrix::new_scale(scale, scale);
            let rgb = Colorspace::device_rgb();
            let pixmap = page.to_pixmap(&transform, &rgb, false, false)?;
            pixmap_to_rgba(&pixmap)
        }
    }

    /// Re-pack pixmap samples into tightly-rowed RGBA.
    fn pixmap_to_rgba(pixmap: &mupdf::Pixmap) -> Result<PagePixels, EngineError> {
        let n = pixmap.n() as usize;
        if n < 3 {
            return Err(EngineError::new(format!(
                "Unsupported pixmap format: {n} channels"
            )));
        }

        let width = pixmap.width() as usize;
        let height = pixmap.height() as usize;
        let stride = pixmap.stride() as usize;
        let samples = pixmap.samples();
        let row_bytes = width * n;
        if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
            return Err(EngineError::new("Pixmap buffer size mismatch"));
        }

        let mut data = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            let row = &samples[y * stride..y * stride + row_bytes];
            for px in row.chunks_exact(n) {
                data.extend_from_slice(&px[..3]);
                data.push(0xFF);
            }
        }

        Ok(PagePixels {
            data,
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }
}
