//! Viewer settings
//!
//! Host-tunable knobs with serde defaults, persisted as YAML. Unknown or
//! unparsable files fall back to defaults rather than failing the viewer.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::audio::AudioTransport;
use crate::pdf::{DEFAULT_CACHE_SIZE, DEFAULT_WORKERS};

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Render worker threads per open document
    #[serde(default = "default_workers")]
    pub render_workers: usize,

    /// Rendered-page cache capacity
    #[serde(default = "default_cache_pages")]
    pub cache_pages: usize,

    /// How long toasts stay on screen, in seconds
    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,

    /// Initial playback speed in percent
    #[serde(default = "default_speed")]
    pub default_speed_percent: u16,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_cache_pages() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_notification_secs() -> u64 {
    5
}

fn default_speed() -> u16 {
    AudioTransport::SPEED_DEFAULT
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            render_workers: default_workers(),
            cache_pages: default_cache_pages(),
            notification_secs: default_notification_secs(),
            default_speed_percent: default_speed(),
        }
    }
}

impl ViewerSettings {
    /// Load from a YAML file, falling back to defaults when the file is
    /// missing or malformed.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_yaml::from_str::<Self>(&contents) {
            Ok(settings) => settings.sanitized(),
            Err(err) => {
                warn!("ignoring malformed settings at {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Clamp values into usable ranges.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.render_workers = self.render_workers.max(1);
        self.cache_pages = self.cache_pages.max(1);
        self.notification_secs = self.notification_secs.max(1);
        self.default_speed_percent = self
            .default_speed_percent
            .clamp(AudioTransport::SPEED_MIN, AudioTransport::SPEED_MAX);
        self
    }

    #[must_use]
    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }
}
