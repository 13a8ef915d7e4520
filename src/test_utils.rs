//! Test doubles for the viewer
//!
//! Fake engines, byte sources, URL resolvers and probes used by the
//! integration tests. Compiled only with the `test-utils` feature.

use std::collections::HashSet;
use std::time::Duration;

use crate::audio::{AudioTrack, SignedUrlProvider};
use crate::diagnostics::{DiagnosticsProbe, ProbeReport};
use crate::pdf::{
    DocumentEngine, EngineDocument, EngineError, MIN_DOCUMENT_BYTES, PagePixels,
};

/// Offset inside `sample_document_bytes` where the content marker lives.
/// The fake engine paints the marker into every pixel so tests can assert
/// which document's content ended up visible.
pub const MARKER_OFFSET: usize = 16;

/// A buffer that passes validation: correct signature, minimum size, and a
/// recognizable content marker.
#[must_use]
pub fn sample_document_bytes(marker: u8) -> Vec<u8> {
    let mut bytes = vec![0u8; MIN_DOCUMENT_BYTES];
    bytes[..5].copy_from_slice(b"%PDF-");
    bytes[MARKER_OFFSET] = marker;
    bytes
}

/// Configurable in-memory document engine.
#[derive(Clone)]
pub struct FakeEngine {
    pages: u32,
    page_size: (f32, f32),
    fail_pages: HashSet<u32>,
    paint_delay: Duration,
}

impl FakeEngine {
    #[must_use]
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            page_size: (595.0, 842.0),
            fail_pages: HashSet::new(),
            paint_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
        self.page_size = (width, height);
        self
    }

    /// Make one page fail to paint, as a corrupt page would.
    #[must_use]
    pub fn with_failing_page(mut self, page: u32) -> Self {
        self.fail_pages.insert(page);
        self
    }

    /// Artificially slow down every paint. Used to race a stale render
    /// against a newer request.
    #[must_use]
    pub fn with_paint_delay(mut self, delay: Duration) -> Self {
        self.paint_delay = delay;
        self
    }
}

impl DocumentEngine for FakeEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn EngineDocument>, EngineError> {
        let marker = bytes.get(MARKER_OFFSET).copied().unwrap_or(0);
        Ok(Box::new(FakeDocument {
            config: self.clone(),
            marker,
        }))
    }
}

struct FakeDocument {
    config: FakeEngine,
    marker: u8,
}

impl EngineDocument for FakeDocument {
    fn page_count(&self) -> u32 {
        self.config.pages
    }

    fn page_size(&self, _page: u32) -> Result<(f32, f32), EngineError> {
        Ok(self.config.page_size)
    }

    fn paint(&self, page: u32, scale: f32) -> Result<PagePixels, EngineError> {
        if self.config.fail_pages.contains(&page) {
            return Err(EngineError::new(format!(
                "corrupt content stream on page {page}"
            )));
        }
        if !self.config.paint_delay.is_zero() {
            std::thread::sleep(self.config.paint_delay);
        }

        let width = (self.config.page_size.0 * scale).round().max(1.0) as u32;
        let height = (self.config.page_size.1 * scale).round().max(1.0) as u32;
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&[self.marker, page as u8, 0x40, 0xFF]);
        }
        Ok(PagePixels {
            data,
            width,
            height,
        })
    }
}

/// The content marker a painted page carries in its first pixel.
#[must_use]
pub fn visible_marker(pixels: &PagePixels) -> u8 {
    pixels.data[0]
}

/// Resolver that signs every path immediately.
pub struct StaticResolver;

impl SignedUrlProvider for StaticResolver {
    fn signed_url(&self, storage_path: &str) -> anyhow::Result<String> {
        Ok(format!("https://signed.example/{storage_path}?token=abc123"))
    }
}

/// Resolver whose signing service is down.
pub struct FailingResolver;

impl SignedUrlProvider for FailingResolver {
    fn signed_url(&self, _storage_path: &str) -> anyhow::Result<String> {
        anyhow::bail!("signing service unavailable")
    }
}

/// Probe returning a fixed report.
pub struct StaticProbe(pub ProbeReport);

impl DiagnosticsProbe for StaticProbe {
    fn probe(&self, _storage_path: &str) -> anyhow::Result<ProbeReport> {
        Ok(self.0.clone())
    }
}

/// A track bound to one page.
#[must_use]
pub fn page_track(id: &str, page: u32, duration: f32) -> AudioTrack {
    AudioTrack {
        id: id.into(),
        title: format!("Backing track {id}"),
        storage_path: format!("audio/{id}.mp3"),
        page_number: page,
        duration,
    }
}

/// Initialize logging once for test runs.
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = simplelog::SimpleLogger::init(
            log::LevelFilter::Debug,
            simplelog::Config::default(),
        );
    });
}
