//! Viewer error taxonomy
//!
//! Every failure that can surface to the user carries a distinct cause
//! string. `Display` output is the user-visible message; `Debug` plus the
//! structured fields feed the diagnostics log.

/// Errors surfaced by the viewer core.
///
/// `Fetch`, `TooSmall`, `InvalidHeader` and `Decode` are terminal for a load
/// attempt and move the controller to the `Error` phase. `Render` escalates
/// to `Error` as well (document-fatal policy). `Playback` is never fatal to
/// document viewing and only downgrades the audio transport.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    /// The byte source could not produce the document bytes.
    #[error("Failed to fetch document: {detail}")]
    Fetch { detail: String },

    /// The byte stream is below the minimum viable document size.
    #[error("Document too small ({len} bytes)")]
    TooSmall { len: usize },

    /// The leading bytes are not a valid document signature.
    #[error("Invalid header")]
    InvalidHeader,

    /// The engine rejected otherwise plausible bytes. The underlying
    /// message is retained for diagnostics.
    #[error("Failed to decode document: {detail}")]
    Decode { detail: String },

    /// A page failed to rasterize.
    #[error("Failed to render page {page}: {detail}")]
    Render { page: u32, detail: String },

    /// Audio URL resolution or decoding failed. Non-fatal.
    #[error("Audio unavailable: {detail}")]
    Playback { detail: String },
}

impl ViewerError {
    pub fn fetch(detail: impl Into<String>) -> Self {
        Self::Fetch {
            detail: detail.into(),
        }
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::Decode {
            detail: detail.into(),
        }
    }

    pub fn render(page: u32, detail: impl Into<String>) -> Self {
        Self::Render {
            page,
            detail: detail.into(),
        }
    }

    pub fn playback(detail: impl Into<String>) -> Self {
        Self::Playback {
            detail: detail.into(),
        }
    }

    /// True for errors that leave the document unusable until retry.
    #[must_use]
    pub fn is_document_fatal(&self) -> bool {
        !matches!(self, Self::Playback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_cause_string() {
        assert_eq!(ViewerError::InvalidHeader.to_string(), "Invalid header");
    }

    #[test]
    fn too_small_reports_byte_length() {
        let err = ViewerError::TooSmall { len: 12 };
        assert_eq!(err.to_string(), "Document too small (12 bytes)");
    }

    #[test]
    fn playback_is_not_document_fatal() {
        assert!(!ViewerError::playback("no url").is_document_fatal());
        assert!(ViewerError::InvalidHeader.is_document_fatal());
    }
}
