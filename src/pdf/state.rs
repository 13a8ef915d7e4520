//! Viewer phase state machine
//!
//! Pure command/effect reducer: the controller feeds it commands and
//! executes the returned effects (spawning loads, requesting renders,
//! rebinding audio). Keeping the transitions side-effect free makes every
//! phase observable and unit-testable.

use crate::error::ViewerError;

use super::types::ViewportBox;
use super::zoom::Zoom;

/// Render phase of the viewer. Exactly one is active at a time.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerPhase {
    /// No document source supplied yet
    Idle,
    /// Fetching/validating/decoding the byte source
    Loading,
    /// A page paint is outstanding
    Rendering,
    /// Current page painted, overlay sized and restored
    Ready,
    /// Recoverable failure; retry or a new document leaves it
    Error(ViewerError),
}

impl ViewerPhase {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Rendering => "rendering",
            Self::Ready => "ready",
            Self::Error(_) => "error",
        }
    }
}

/// Current viewer state
#[derive(Debug)]
pub struct ViewerState {
    pub phase: ViewerPhase,
    /// Current page (1-based); meaningful once `page_count > 0`
    pub page: u32,
    /// Total page count; 0 until a document is decoded
    pub page_count: u32,
    pub zoom: Zoom,
    pub viewport: ViewportBox,
    /// Set when a render was deferred because the container had no layout
    /// yet; the next valid viewport triggers exactly one retry.
    pub layout_retry_pending: bool,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            phase: ViewerPhase::Idle,
            page: 1,
            page_count: 0,
            zoom: Zoom::default(),
            viewport: ViewportBox::default(),
            layout_retry_pending: false,
        }
    }
}

/// Commands that drive the state machine
#[derive(Clone, Debug)]
pub enum Command {
    /// A new byte source was supplied
    Load,
    /// The decoder produced a document handle
    DocumentDecoded { page_count: u32 },
    /// A load/render failure
    Fail(ViewerError),
    /// The current page finished painting and the overlay was restored
    PagePainted,
    /// Navigate to a page (clamped; out-of-range is a no-op)
    GoToPage(u32),
    /// Set the zoom factor (clamped and snapped)
    SetZoom(f32),
    ZoomIn,
    ZoomOut,
    /// The host reported a new viewport box
    SetViewport(ViewportBox),
    /// Explicit user retry from the error surface
    Retry,
    /// Release the document and return to idle
    Close,
}

/// Effects produced by state transitions, executed by the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Fetch, validate and decode the byte source, then spawn the service
    BeginLoad,
    /// Request a render of the current page
    RenderCurrentPage,
    /// Re-bind audio tracks to the current page
    RebindAudio,
    /// Drop service, document, overlay history and audio selection
    ResetSession,
    /// Surface the error to the user
    NotifyError,
}

impl ViewerState {
    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Load => {
                self.page = 1;
                self.page_count = 0;
                self.layout_retry_pending = false;
                self.phase = ViewerPhase::Loading;
                vec![Effect::ResetSession, Effect::BeginLoad]
            }

            Command::DocumentDecoded { page_count } => {
                if self.phase != ViewerPhase::Loading {
                    return vec![];
                }
                self.page_count = page_count;
                self.page = 1;
                self.phase = ViewerPhase::Rendering;
                if self.viewport.is_degenerate() {
                    // Container not laid out yet: defer the first paint.
                    self.layout_retry_pending = true;
                    vec![Effect::RebindAudio]
                } else {
                    vec![Effect::RenderCurrentPage, Effect::RebindAudio]
                }
            }

            Command::Fail(err) => {
                self.phase = ViewerPhase::Error(err);
                vec![Effect::NotifyError]
            }

            Command::PagePainted => {
                if self.phase == ViewerPhase::Rendering {
                    self.phase = ViewerPhase::Ready;
                }
                vec![]
            }

            Command::GoToPage(page) => {
                if self.page_count == 0 || !self.is_interactive() {
                    return vec![];
                }
                let clamped = page.clamp(1, self.page_count);
                if clamped != page || clamped == self.page {
                    // Out-of-range requests are no-ops, as is the current page.
                    return vec![];
                }
                self.page = clamped;
                self.phase = ViewerPhase::Rendering;
                vec![Effect::RenderCurrentPage, Effect::RebindAudio]
            }

            Command::SetZoom(factor) => {
                let changed = self.zoom.set(factor);
                self.after_zoom_change(changed)
            }

            Command::ZoomIn => {
                let changed = self.zoom.step_in();
                self.after_zoom_change(changed)
            }

            Command::ZoomOut => {
                let changed = self.zoom.step_out();
                self.after_zoom_change(changed)
            }

            Command::SetViewport(viewport) => {
                if viewport.is_degenerate() {
                    // No painting at scale 0; wait for the layout pass.
                    self.layout_retry_pending = self.page_count > 0;
                    return vec![];
                }
                let changed = self.viewport != viewport;
                let retry = std::mem::take(&mut self.layout_retry_pending);
                self.viewport = viewport;
                if (changed || retry) && self.page_count > 0 && self.is_interactive() {
                    self.phase = ViewerPhase::Rendering;
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::Retry => {
                if !matches!(self.phase, ViewerPhase::Error(_)) {
                    return vec![];
                }
                self.page = 1;
                self.page_count = 0;
                self.layout_retry_pending = false;
                self.phase = ViewerPhase::Loading;
                vec![Effect::ResetSession, Effect::BeginLoad]
            }

            Command::Close => {
                self.page = 1;
                self.page_count = 0;
                self.layout_retry_pending = false;
                self.phase = ViewerPhase::Idle;
                vec![Effect::ResetSession]
            }
        }
    }

    fn after_zoom_change(&mut self, changed: bool) -> Vec<Effect> {
        if changed && self.page_count > 0 && self.is_interactive() {
            self.phase = ViewerPhase::Rendering;
            vec![Effect::RenderCurrentPage]
        } else {
            vec![]
        }
    }

    /// True when navigation/zoom commands may schedule renders.
    fn is_interactive(&self) -> bool {
        matches!(self.phase, ViewerPhase::Ready | ViewerPhase::Rendering)
    }
}
