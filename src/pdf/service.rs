//! Render service - manages the worker pool and cache for one document
//!
//! A service is created per open document and dropped wholesale when the
//! document closes or is replaced; dropping the channels guarantees no
//! callback from a superseded document can reach the controller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::debug;

use super::cache::{CacheKey, PageCache};
use super::engine::DocumentEngine;
use super::request::{RenderParams, RenderRequest, RenderResponse, RequestId};
use super::worker::render_worker;

/// Manages page rendering with worker threads and caching
pub struct RenderService {
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    pending_requests: HashMap<RequestId, u32>,
    cache: Arc<Mutex<PageCache>>,
    num_workers: usize,
}

impl RenderService {
    /// Spawn the worker pool for one document.
    ///
    /// Each worker opens its own engine handle from the shared bytes; the
    /// handles never cross threads.
    #[must_use]
    pub fn new(
        engine: Arc<dyn DocumentEngine>,
        bytes: Arc<[u8]>,
        num_workers: usize,
        cache_size: usize,
    ) -> Self {
        let cache = Arc::new(Mutex::new(PageCache::new(cache_size)));

        // Flume gives us MPMC channels: multiple workers pull from one
        // shared request queue, which std/tokio mpsc receivers cannot do.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = num_workers.max(1);
        for _ in 0..num_workers {
            let engine = Arc::clone(&engine);
            let bytes = Arc::clone(&bytes);
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let cache_clone = Arc::clone(&cache);

            std::thread::spawn(move || {
                render_worker(&engine, &bytes, rx, tx, cache_clone);
            });
        }

        Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            pending_requests: HashMap::new(),
            cache,
            num_workers,
        }
    }

    /// Request a page to be rendered
    pub fn request_page(&mut self, page: u32, params: RenderParams) -> RequestId {
        let id = self.next_id();
        debug!("render request {id:?} for page {page}");

        let _ = self
            .request_tx
            .send(RenderRequest::Page { id, page, params });
        self.pending_requests.insert(id, page);

        id
    }

    /// Request a page only if it is not cached or already in flight.
    pub fn request_page_if_needed(
        &mut self,
        page: u32,
        params: RenderParams,
    ) -> Option<RequestId> {
        if self.is_page_cached(page, &params) || self.is_page_in_flight(page) {
            return None;
        }
        Some(self.request_page(page, params))
    }

    fn is_page_in_flight(&self, page: u32) -> bool {
        self.pending_requests.values().any(|&p| p == page)
    }

    /// Poll for completed render responses
    pub fn poll_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            match &response {
                RenderResponse::Page { id, .. } | RenderResponse::Error { id, .. } => {
                    self.pending_requests.remove(id);
                }
            }
            responses.push(response);
        }

        responses
    }

    /// Block until at least one response is available, then drain.
    ///
    /// Test-oriented convenience; production hosts poll from their frame
    /// loop.
    pub fn wait_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = vec![];
        if let Ok(response) = self.response_rx.recv() {
            match &response {
                RenderResponse::Page { id, .. } | RenderResponse::Error { id, .. } => {
                    self.pending_requests.remove(id);
                }
            }
            responses.push(response);
        }
        responses.extend(self.poll_responses());
        responses
    }

    /// Check if a page is cached for the given parameters
    #[must_use]
    pub fn is_page_cached(&self, page: u32, params: &RenderParams) -> bool {
        let key = CacheKey::from_params(page, params);
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(&key)
    }

    /// Get a cached page if available
    #[must_use]
    pub fn get_cached_page(
        &self,
        page: u32,
        params: &RenderParams,
    ) -> Option<Arc<super::types::PageData>> {
        let key = CacheKey::from_params(page, params);
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
