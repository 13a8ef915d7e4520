//! Viewer controller
//!
//! The root of the viewer. Owns the phase state machine, the byte source,
//! the per-document render service, the annotation overlay, the audio
//! transport and the notification queue, and executes the effects the state
//! machine emits. All state lives on the controller's thread; worker results
//! arrive through `poll` and are discarded unless their request id is the
//! newest one outstanding.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::annotation::AnnotationLayer;
use crate::audio::{AudioTrack, AudioTransport, SignedUrlProvider};
use crate::diagnostics::{DiagnosticsProbe, ProbeReport, run_probe};
use crate::error::ViewerError;
use crate::notification::NotificationManager;
use crate::pdf::{
    Command, DocumentEngine, Effect, PageData, RenderParams, RenderResponse, RenderService,
    RequestId, ViewerPhase, ViewerState, ViewportBox, validate_bytes,
};
use crate::settings::ViewerSettings;

/// Already-resolved byte buffer for a document. Fetching, retry-with-backoff
/// and on-device caching of these bytes are external responsibilities.
pub trait ByteSource: Send {
    fn fetch(&self) -> anyhow::Result<Arc<[u8]>>;

    /// Storage path for diagnostics probing, when known.
    fn storage_path(&self) -> Option<&str> {
        None
    }
}

/// Byte source over an in-memory buffer.
pub struct MemorySource {
    bytes: Arc<[u8]>,
}

impl MemorySource {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(bytes.into_boxed_slice()),
        }
    }
}

impl ByteSource for MemorySource {
    fn fetch(&self) -> anyhow::Result<Arc<[u8]>> {
        Ok(Arc::clone(&self.bytes))
    }
}

/// Host-agnostic keyboard input for the viewer's shortcuts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput {
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Home,
    End,
    Plus,
    Minus,
    Zero,
    Space,
    KeyU,
}

/// Orchestrates load, render, navigation, annotation and audio for one
/// document at a time.
pub struct ViewerController {
    state: ViewerState,
    engine: Arc<dyn DocumentEngine>,
    settings: ViewerSettings,
    source: Option<Box<dyn ByteSource>>,
    service: Option<RenderService>,
    /// Newest outstanding render; responses for any other id are stale
    active_render: Option<RequestId>,
    document_id: Option<String>,
    current_page_data: Option<Arc<PageData>>,
    annotations: AnnotationLayer,
    audio: AudioTransport,
    resolver: Option<Arc<dyn SignedUrlProvider>>,
    notifications: NotificationManager,
}

impl ViewerController {
    #[must_use]
    pub fn new(engine: Arc<dyn DocumentEngine>) -> Self {
        Self::with_settings(engine, ViewerSettings::default())
    }

    #[must_use]
    pub fn with_settings(engine: Arc<dyn DocumentEngine>, settings: ViewerSettings) -> Self {
        let mut audio = AudioTransport::new();
        audio.set_speed(settings.default_speed_percent);
        Self {
            state: ViewerState::default(),
            engine,
            notifications: NotificationManager::with_default_duration(
                settings.notification_duration(),
            ),
            settings,
            source: None,
            service: None,
            active_render: None,
            document_id: None,
            current_page_data: None,
            annotations: AnnotationLayer::new(),
            audio,
            resolver: None,
        }
    }

    /// Install the signed-URL service used for audio tracks.
    pub fn set_url_resolver(&mut self, resolver: Arc<dyn SignedUrlProvider>) {
        self.resolver = Some(resolver);
    }

    /// Supply the audio tracks the host fetched for this document.
    pub fn set_tracks(&mut self, tracks: Vec<AudioTrack>) {
        self.audio.set_tracks(tracks);
        if self.state.page_count > 0 {
            self.audio.bind_page(self.state.page);
        }
    }

    // --- public contract ---------------------------------------------------

    /// Load a document from a byte source. Failures surface as the `Error`
    /// phase, never as panics or a controller stuck in `Loading`.
    pub fn load_document(&mut self, source: Box<dyn ByteSource>) {
        self.source = Some(source);
        self.dispatch(Command::Load);
    }

    /// Convenience for in-memory bytes.
    pub fn load_bytes(&mut self, bytes: Vec<u8>) {
        self.load_document(Box::new(MemorySource::new(bytes)));
    }

    /// Explicit user retry from the error surface. Fully resets decoder,
    /// page and annotation state before re-attempting the byte source.
    pub fn retry(&mut self) {
        self.dispatch(Command::Retry);
    }

    /// Release the document and all resources.
    pub fn close(&mut self) {
        self.source = None;
        self.dispatch(Command::Close);
    }

    /// Navigate to a page. Out-of-range and current-page requests are
    /// no-ops.
    pub fn go_to_page(&mut self, page: u32) {
        self.dispatch(Command::GoToPage(page));
    }

    pub fn next_page(&mut self) {
        self.go_to_page(self.state.page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        if self.state.page > 1 {
            self.go_to_page(self.state.page - 1);
        }
    }

    pub fn set_zoom(&mut self, factor: f32) {
        self.dispatch(Command::SetZoom(factor));
    }

    pub fn zoom_in(&mut self) {
        self.dispatch(Command::ZoomIn);
    }

    pub fn zoom_out(&mut self) {
        self.dispatch(Command::ZoomOut);
    }

    /// Report a new layout box for the drawing region.
    pub fn set_viewport(&mut self, viewport: ViewportBox) {
        self.dispatch(Command::SetViewport(viewport));
    }

    /// Keyboard shortcuts owned by the viewer.
    pub fn handle_key(&mut self, key: KeyInput) {
        match key {
            KeyInput::ArrowLeft | KeyInput::PageUp => self.prev_page(),
            KeyInput::ArrowRight | KeyInput::PageDown => self.next_page(),
            KeyInput::Home => self.go_to_page(1),
            KeyInput::End => self.go_to_page(self.state.page_count),
            KeyInput::Plus => self.zoom_in(),
            KeyInput::Minus => self.zoom_out(),
            KeyInput::Zero => self.set_zoom(crate::pdf::Zoom::DEFAULT),
            KeyInput::Space => {
                self.audio.toggle_play();
            }
            KeyInput::KeyU => {
                self.annotations.undo();
            }
        }
    }

    /// Drain worker responses and audio resolution tickets. Hosts call this
    /// from their frame loop; results belonging to superseded requests are
    /// discarded here.
    pub fn poll(&mut self) {
        self.resolve_pending_audio();
        self.notifications.update();

        let responses = match self.service.as_mut() {
            Some(service) => service.poll_responses(),
            None => Vec::new(),
        };

        for response in responses {
            match response {
                RenderResponse::Page { id, page, data } => {
                    if Some(id) != self.active_render {
                        debug!("discarding stale render {id:?} for page {page}");
                        continue;
                    }
                    self.active_render = None;
                    self.annotations
                        .sync_to_page(page, data.pixels.width, data.pixels.height);
                    self.current_page_data = Some(data);
                    self.dispatch(Command::PagePainted);
                }

                RenderResponse::Error { id, page, error } => {
                    if id == RequestId::new(0) {
                        // A worker could not open the document at all.
                        self.dispatch(Command::Fail(ViewerError::decode(error.to_string())));
                        continue;
                    }
                    if Some(id) != self.active_render {
                        debug!("discarding stale render error {id:?}");
                        continue;
                    }
                    self.active_render = None;
                    self.dispatch(Command::Fail(ViewerError::render(page, error.to_string())));
                }
            }
        }
    }

    /// Drive `poll` until the controller leaves `Loading`/`Rendering` or the
    /// timeout expires. Returns true when it settled. Test-oriented; real
    /// hosts poll from their frame loop.
    pub fn pump_until_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            match self.state.phase {
                ViewerPhase::Loading | ViewerPhase::Rendering => {}
                _ => return true,
            }
            if self.state.layout_retry_pending {
                // Waiting on the host's layout pass, not on a worker.
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Run the external diagnostics probe for the current source, if it
    /// knows its storage path.
    pub fn run_diagnostics(
        &self,
        probe: &dyn DiagnosticsProbe,
    ) -> Option<anyhow::Result<ProbeReport>> {
        let path = self.source.as_ref()?.storage_path()?;
        Some(run_probe(probe, path))
    }

    // --- observers ---------------------------------------------------------

    #[must_use]
    pub fn phase(&self) -> &ViewerPhase {
        &self.state.phase
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.state.page
    }

    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.state.page_count
    }

    #[must_use]
    pub fn zoom_factor(&self) -> f32 {
        self.state.zoom.factor()
    }

    /// The most recently painted page (the primary surface content).
    #[must_use]
    pub fn current_page_data(&self) -> Option<&Arc<PageData>> {
        self.current_page_data.as_ref()
    }

    /// Identity of the open document (digest of its bytes); keys caches and
    /// annotation storage on the host side.
    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    #[must_use]
    pub fn annotations(&self) -> &AnnotationLayer {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut AnnotationLayer {
        &mut self.annotations
    }

    #[must_use]
    pub fn audio(&self) -> &AudioTransport {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioTransport {
        &mut self.audio
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    // --- effect execution --------------------------------------------------

    fn dispatch(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::ResetSession => {
                // Dropping the service drops its channels; nothing from the
                // previous document can reach us anymore.
                self.service = None;
                self.active_render = None;
                self.current_page_data = None;
                self.document_id = None;
                self.annotations.reset();
                self.audio.reset();
                self.audio.set_speed(self.settings.default_speed_percent);
            }

            Effect::BeginLoad => self.begin_load(),

            Effect::RenderCurrentPage => {
                let Some(service) = self.service.as_mut() else {
                    return;
                };
                let params = RenderParams {
                    viewport: self.state.viewport,
                    zoom: self.state.zoom.factor(),
                };
                let id = service.request_page(self.state.page, params);
                self.active_render = Some(id);
            }

            Effect::RebindAudio => {
                self.audio.bind_page(self.state.page);
            }

            Effect::NotifyError => {
                if let ViewerPhase::Error(err) = &self.state.phase {
                    error!("viewer error: {err}");
                    let message = err.to_string();
                    self.notifications.error(message);
                }
            }
        }
    }

    /// Fetch, validate and decode the byte source, then spawn the render
    /// service. Every failure converts to an `Error` transition; nothing
    /// escapes this boundary.
    fn begin_load(&mut self) {
        let Some(source) = self.source.as_ref() else {
            self.dispatch(Command::Fail(ViewerError::fetch("no byte source")));
            return;
        };

        let bytes = match source.fetch() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("byte source failed: {err:#}");
                self.dispatch(Command::Fail(ViewerError::fetch(format!("{err:#}"))));
                return;
            }
        };

        if let Err(err) = validate_bytes(&bytes) {
            let header = &bytes[..bytes.len().min(8)];
            error!(
                "document rejected: {err} (len={}, header={header:02x?})",
                bytes.len()
            );
            self.dispatch(Command::Fail(err));
            return;
        }

        // Open once on this thread for the page count; workers open their
        // own handles from the shared bytes.
        let page_count = match self.engine.open(&bytes) {
            Ok(doc) => doc.page_count(),
            Err(err) => {
                error!("decode failed: {err} (len={})", bytes.len());
                self.dispatch(Command::Fail(ViewerError::decode(err.to_string())));
                return;
            }
        };
        if page_count == 0 {
            self.dispatch(Command::Fail(ViewerError::decode("Document has no pages")));
            return;
        }

        self.document_id = Some(format!("{:x}", md5::compute(&bytes)));
        self.service = Some(RenderService::new(
            Arc::clone(&self.engine),
            bytes,
            self.settings.render_workers,
            self.settings.cache_pages,
        ));

        info!(
            "document {} decoded: {page_count} pages",
            self.document_id.as_deref().unwrap_or_default()
        );
        self.dispatch(Command::DocumentDecoded { page_count });
    }

    fn resolve_pending_audio(&mut self) {
        let Some(resolver) = self.resolver.clone() else {
            return;
        };
        let Some(ticket) = self.audio.pending_ticket().cloned() else {
            return;
        };
        let result = resolver.signed_url(&ticket.storage_path);
        self.audio.complete_resolution(ticket.id, result);
    }
}

impl Drop for ViewerController {
    fn drop(&mut self) {
        if let Some(service) = &self.service {
            service.shutdown();
        }
    }
}
