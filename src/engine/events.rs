//! Lifecycle events emitted to the host

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub screenshot_count: usize,
    pub message_count: usize,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub session_id: String,
    pub output_path: PathBuf,
    pub log_path: PathBuf,
    pub message_count: usize,
    pub screenshot_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CaptureEvent {
    Progress(Progress),
    Ready,
    Complete(CaptureSummary),
    Error { message: String },
}

/// Receives engine lifecycle callbacks.
///
/// `on_progress` may fire many times per run; `on_ready`, `on_complete` and
/// `on_error` fire at most once per setup or capture call.
pub trait CaptureEvents: Send + Sync {
    fn on_progress(&self, progress: Progress);
    fn on_ready(&self);
    fn on_complete(&self, summary: CaptureSummary);
    fn on_error(&self, message: String);
}

/// Writes every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl CaptureEvents for LogEvents {
    fn on_progress(&self, progress: Progress) {
        log::info!(
            "{} [{} messages, {} screenshots]",
            progress.status,
            progress.message_count,
            progress.screenshot_count
        );
    }

    fn on_ready(&self) {
        log::info!("Capture ready");
    }

    fn on_complete(&self, summary: CaptureSummary) {
        log::info!(
            "Capture {} complete: {} messages, {} screenshots in {}",
            summary.session_id,
            summary.message_count,
            summary.screenshot_count,
            summary.output_path.display()
        );
    }

    fn on_error(&self, message: String) {
        log::error!("Capture error: {}", message);
    }
}

/// Forwards events into a channel; a dropped receiver silently discards them
impl CaptureEvents for UnboundedSender<CaptureEvent> {
    fn on_progress(&self, progress: Progress) {
        let _ = self.send(CaptureEvent::Progress(progress));
    }

    fn on_ready(&self) {
        let _ = self.send(CaptureEvent::Ready);
    }

    fn on_complete(&self, summary: CaptureSummary) {
        let _ = self.send(CaptureEvent::Complete(summary));
    }

    fn on_error(&self, message: String) {
        let _ = self.send(CaptureEvent::Error { message });
    }
}
