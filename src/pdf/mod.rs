//! Page rendering infrastructure

mod cache;
mod engine;
mod request;
mod service;
mod state;
mod types;
mod worker;
mod zoom;

pub use cache::{CacheKey, PageCache};
pub use engine::{
    DOCUMENT_MAGIC, DocumentEngine, EngineDocument, EngineError, MIN_DOCUMENT_BYTES,
    validate_bytes,
};
#[cfg(feature = "pdf")]
pub use engine::MupdfEngine;
pub use request::{RenderParams, RenderRequest, RenderResponse, RequestId, WorkerFault};
pub use service::RenderService;
pub use state::{Command, Effect, ViewerPhase, ViewerState};
pub use types::{PageData, PagePixels, ViewportBox};
pub use worker::{BASE_SCALE_CAP, RasterSpec, render_page, render_worker};
pub use zoom::Zoom;

/// Default number of render worker threads
pub const DEFAULT_WORKERS: usize = 2;

/// Default rendered-page cache capacity
pub const DEFAULT_CACHE_SIZE: usize = 16;
