//! Document diagnostics
//!
//! When a load fails, the host can run an external probe against the stored
//! document (HTTP status, content type, size, signature, worker
//! reachability) and show the result next to the error surface. The core
//! invokes the probe, logs the structured report, and renders it as lines;
//! it computes nothing itself.

use log::info;
use serde::{Deserialize, Serialize};

/// External troubleshooting routine for a stored document.
pub trait DiagnosticsProbe: Send + Sync {
    fn probe(&self, storage_path: &str) -> anyhow::Result<ProbeReport>;
}

/// Structured result of a diagnostics probe. Fields the probe could not
/// determine stay `None` and render as "unknown".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub signature_ok: Option<bool>,
    pub worker_reachable: Option<bool>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ProbeReport {
    /// Human-readable lines for the error surface.
    #[must_use]
    pub fn render_lines(&self) -> Vec<String> {
        fn fmt<T: std::fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "unknown".to_string(), ToString::to_string)
        }
        fn fmt_flag(value: Option<bool>) -> String {
            match value {
                Some(true) => "ok".to_string(),
                Some(false) => "FAILED".to_string(),
                None => "unknown".to_string(),
            }
        }

        let mut lines = vec![
            format!("HTTP status: {}", fmt(&self.http_status)),
            format!("Content type: {}", fmt(&self.content_type)),
            format!("Content length: {}", fmt(&self.content_length)),
            format!("Signature: {}", fmt_flag(self.signature_ok)),
            format!("Render worker: {}", fmt_flag(self.worker_reachable)),
        ];
        lines.extend(self.notes.iter().cloned());
        lines
    }
}

/// Invoke the probe and log its report as JSON for support tooling.
pub fn run_probe(probe: &dyn DiagnosticsProbe, storage_path: &str) -> anyhow::Result<ProbeReport> {
    let report = probe.probe(storage_path)?;
    if let Ok(json) = serde_json::to_string(&report) {
        info!("diagnostics for {storage_path}: {json}");
    }
    Ok(report)
}
