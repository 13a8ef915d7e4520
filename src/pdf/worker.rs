//! Page render worker - runs in separate thread(s)
//!
//! Each worker opens its own engine document from the shared byte buffer and
//! drains the shared request queue until shutdown.

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::debug;

use super::cache::{CacheKey, PageCache};
use super::engine::{DocumentEngine, EngineDocument};
use super::request::{RenderParams, RenderRequest, RenderResponse, RequestId, WorkerFault};
use super::types::{PageData, ViewportBox};

/// Hard cap on the fit-to-box base scale. Prevents oversized rasterization
/// of small pages on large viewports.
pub const BASE_SCALE_CAP: f32 = 1.5;

/// Pre-computed rasterization parameters for a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterSpec {
    /// Final scale: fit-to-box base (capped) times user zoom
    pub scale: f32,
    pub output_width: u32,
    pub output_height: u32,
}

impl RasterSpec {
    /// Compute the paint scale for a page of `natural` size inside
    /// `viewport`, compounded with the user `zoom`.
    pub fn compute(
        natural: (f32, f32),
        viewport: ViewportBox,
        zoom: f32,
    ) -> Result<Self, WorkerFault> {
        let (natural_width, natural_height) = natural;
        if natural_width <= 0.0 || natural_height <= 0.0 {
            return Err(WorkerFault::generic(format!(
                "Degenerate page size {natural_width}x{natural_height}"
            )));
        }
        if viewport.is_degenerate() {
            return Err(WorkerFault::generic("Viewport has no usable area"));
        }

        let scale_x = viewport.width as f32 / natural_width;
        let scale_y = viewport.height as f32 / natural_height;
        let base = scale_x.min(scale_y).min(BASE_SCALE_CAP);
        let scale = base * zoom;

        Ok(Self {
            scale,
            output_width: (natural_width * scale).round().max(1.0) as u32,
            output_height: (natural_height * scale).round().max(1.0) as u32,
        })
    }
}

/// Main worker function - runs in a dedicated thread
pub fn render_worker(
    engine: &Arc<dyn DocumentEngine>,
    bytes: &Arc<[u8]>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<PageCache>>,
) {
    let doc = match engine.open(bytes) {
        Ok(d) => d,
        Err(e) => {
            let _ = responses.send(RenderResponse::Error {
                id: RequestId::new(0),
                page: 0,
                error: WorkerFault::Engine(e),
            });
            return;
        }
    };

    for request in requests {
        match request {
            RenderRequest::Page { id, page, params } => {
                handle_page_request(doc.as_ref(), id, page, &params, &cache, &responses);
            }

            RenderRequest::Shutdown => break,
        }
    }
}

fn handle_page_request(
    doc: &dyn EngineDocument,
    id: RequestId,
    page: u32,
    params: &RenderParams,
    cache: &Arc<Mutex<PageCache>>,
    responses: &Sender<RenderResponse>,
) {
    let key = CacheKey::from_params(page, params);

    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(cached) = cached {
        debug!("page {page} served from cache");
        let _ = responses.send(RenderResponse::Page {
            id,
            page,
            data: Arc::clone(&cached),
        });
        return;
    }

    match render_page(doc, page, params) {
        Ok(data) => {
            let cached = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, data);
            let _ = responses.send(RenderResponse::Page {
                id,
                page,
                data: Arc::clone(&cached),
            });
        }
        Err(error) => {
            let _ = responses.send(RenderResponse::Error { id, page, error });
        }
    }
}

/// Render a single page
pub fn render_page(
    doc: &dyn EngineDocument,
    page: u32,
    params: &RenderParams,
) -> Result<PageData, WorkerFault> {
    let (natural_width, natural_height) = doc.page_size(page)?;
    let spec = RasterSpec::compute((natural_width, natural_height), params.viewport, params.zoom)?;

    let pixels = doc.paint(page, spec.scale)?;

    Ok(PageData {
        pixels,
        page,
        scale: spec.scale,
        natural_width,
        natural_height,
    })
}
