//! Audio-page transport
//!
//! Binds backing tracks to the page being viewed and models the playback
//! controls. Playable URLs come from an external signed-URL service; the
//! transport issues resolution tickets and ignores completions whose ticket
//! is stale, so a slow resolution for a page the user already left can never
//! clobber the current selection. Audio failures are never fatal to
//! document viewing.

use log::{debug, warn};

/// External signed-URL issuer. Given a storage path, returns a time-limited
/// playable URL.
pub trait SignedUrlProvider: Send + Sync {
    fn signed_url(&self, storage_path: &str) -> anyhow::Result<String>;
}

/// A backing track attached to one page. Immutable once fetched.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    pub id: String,
    pub title: String,
    /// Storage path, exchanged for a playable URL on demand
    pub storage_path: String,
    /// Page this track belongs to (1-based)
    pub page_number: u32,
    /// Duration in seconds
    pub duration: f32,
}

/// Token identifying one URL resolution request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolveId(pub u64);

/// An outstanding URL resolution the host must complete.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolveTicket {
    pub id: ResolveId,
    pub storage_path: String,
}

/// Playback transport bound to the current page.
pub struct AudioTransport {
    tracks: Vec<AudioTrack>,
    /// Indices into `tracks` belonging to the bound page, in fetch order
    bound: Vec<usize>,
    /// Index into `bound` of the selected track
    selected: Option<usize>,
    playing: bool,
    position: f32,
    speed_percent: u16,
    resolved_url: Option<String>,
    pending: Option<ResolveTicket>,
    next_ticket: u64,
}

impl Default for AudioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioTransport {
    /// Minimum playback speed in percent
    pub const SPEED_MIN: u16 = 50;
    /// Maximum playback speed in percent
    pub const SPEED_MAX: u16 = 150;
    /// Default playback speed in percent
    pub const SPEED_DEFAULT: u16 = 100;

    #[must_use]
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            bound: Vec::new(),
            selected: None,
            playing: false,
            position: 0.0,
            speed_percent: Self::SPEED_DEFAULT,
            resolved_url: None,
            pending: None,
            next_ticket: 1,
        }
    }

    /// Replace the track set (fetched by the host alongside the document).
    /// Clears any binding; call `bind_page` afterwards.
    pub fn set_tracks(&mut self, tracks: Vec<AudioTrack>) {
        self.tracks = tracks;
        self.bound.clear();
        self.selected = None;
        self.playing = false;
        self.position = 0.0;
        self.resolved_url = None;
        self.pending = None;
    }

    /// Bind to a page: select the first track targeting it, or clear the
    /// selection and stop playback when the page has none. Returns the
    /// resolution ticket for the newly selected track, if any.
    pub fn bind_page(&mut self, page: u32) -> Option<ResolveTicket> {
        self.bound = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.page_number == page)
            .map(|(i, _)| i)
            .collect();

        self.playing = false;
        self.position = 0.0;
        self.resolved_url = None;
        self.pending = None;

        if self.bound.is_empty() {
            self.selected = None;
            debug!("page {page} has no audio tracks");
            return None;
        }

        self.selected = Some(0);
        Some(self.issue_ticket())
    }

    /// Switch to the nth track of the bound page. Resets progress to zero
    /// and re-resolves the URL. Selecting the current track is a no-op.
    pub fn select_track(&mut self, nth: usize) -> Option<ResolveTicket> {
        if nth >= self.bound.len() || self.selected == Some(nth) {
            return None;
        }
        self.selected = Some(nth);
        self.playing = false;
        self.position = 0.0;
        self.resolved_url = None;
        Some(self.issue_ticket())
    }

    fn issue_ticket(&mut self) -> ResolveTicket {
        let track = self.selected_track().expect("ticket requires a selection");
        let ticket = ResolveTicket {
            id: ResolveId(self.next_ticket),
            storage_path: track.storage_path.clone(),
        };
        self.next_ticket += 1;
        self.pending = Some(ticket.clone());
        ticket
    }

    /// Apply a completed URL resolution. Completions for superseded tickets
    /// are discarded. Failure leaves the page without playable audio; that
    /// is non-fatal.
    pub fn complete_resolution(&mut self, id: ResolveId, result: anyhow::Result<String>) -> bool {
        match &self.pending {
            Some(ticket) if ticket.id == id => {}
            _ => {
                debug!("discarding stale audio resolution {id:?}");
                return false;
            }
        }
        self.pending = None;

        match result {
            Ok(url) => {
                self.resolved_url = Some(url);
            }
            Err(err) => {
                warn!("audio URL resolution failed: {err:#}");
                self.resolved_url = None;
                self.playing = false;
            }
        }
        true
    }

    /// Toggle play/pause. Playback requires a resolved URL.
    pub fn toggle_play(&mut self) -> bool {
        if self.resolved_url.is_none() {
            self.playing = false;
        } else {
            self.playing = !self.playing;
        }
        self.playing
    }

    /// Seek to an absolute position, clamped to `[0, duration]`.
    pub fn seek(&mut self, seconds: f32) {
        let Some(track) = self.selected_track() else {
            return;
        };
        let duration = track.duration.max(0.0);
        self.position = seconds.clamp(0.0, duration);
    }

    /// Relative seek, clamped.
    pub fn skip(&mut self, delta: f32) {
        self.seek(self.position + delta);
    }

    /// Set playback speed in percent, clamped to `[50, 150]`. Persists
    /// across track switches.
    pub fn set_speed(&mut self, percent: u16) {
        self.speed_percent = percent.clamp(Self::SPEED_MIN, Self::SPEED_MAX);
    }

    /// Playback rate multiplier for the host's audio element.
    #[must_use]
    pub fn playback_rate(&self) -> f32 {
        f32::from(self.speed_percent) / 100.0
    }

    #[must_use]
    pub fn speed_percent(&self) -> u16 {
        self.speed_percent
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[must_use]
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Tracks bound to the current page, in display order.
    pub fn page_tracks(&self) -> impl Iterator<Item = &AudioTrack> {
        self.bound.iter().map(|&i| &self.tracks[i])
    }

    #[must_use]
    pub fn selected_track(&self) -> Option<&AudioTrack> {
        self.selected.map(|nth| &self.tracks[self.bound[nth]])
    }

    /// The playable URL, absent until resolution completes. Its absence is
    /// the track-loading condition the UI shows.
    #[must_use]
    pub fn playable_url(&self) -> Option<&str> {
        self.resolved_url.as_deref()
    }

    #[must_use]
    pub fn pending_ticket(&self) -> Option<&ResolveTicket> {
        self.pending.as_ref()
    }

    /// Drop selection, resolved URLs and speed. Called on document change
    /// and on close.
    pub fn reset(&mut self) {
        self.set_tracks(Vec::new());
        self.speed_percent = Self::SPEED_DEFAULT;
    }
}
