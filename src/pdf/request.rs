//! Render request and response types

use std::sync::Arc;

use super::engine::EngineError;
use super::types::{PageData, ViewportBox};

/// Unique identifier for render requests.
///
/// Ids increase monotonically per service; the controller applies only the
/// response matching its newest outstanding id, so a slow stale render can
/// never overwrite a faster newer one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Parameters for rendering a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// Viewport box in device pixels
    pub viewport: ViewportBox,
    /// User zoom factor (already clamped and snapped)
    pub zoom: f32,
}

/// Request sent to render workers
#[derive(Debug)]
pub enum RenderRequest {
    /// Render a page
    Page {
        id: RequestId,
        page: u32,
        params: RenderParams,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from render workers
#[derive(Debug, thiserror::Error)]
pub enum WorkerFault {
    #[error("Engine: {0}")]
    Engine(#[from] EngineError),

    #[error("{detail}")]
    Generic { detail: String },
}

impl WorkerFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    /// Rendered page data
    Page {
        id: RequestId,
        page: u32,
        data: Arc<PageData>,
    },

    /// Error during rendering
    Error {
        id: RequestId,
        page: u32,
        error: WorkerFault,
    },
}
