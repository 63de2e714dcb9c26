use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureState {
    #[default]
    Idle,
    SettingUp,
    /// Chat view found; waiting for the user to begin recording
    Ready,
    Recording,
    Finished,
    Error,
}

impl CaptureState {
    /// A browser session is being prepared, is waiting, or is recording
    pub fn is_active(self) -> bool {
        matches!(
            self,
            CaptureState::SettingUp | CaptureState::Ready | CaptureState::Recording
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::Idle => "idle",
            CaptureState::SettingUp => "setting-up",
            CaptureState::Ready => "ready",
            CaptureState::Recording => "recording",
            CaptureState::Finished => "finished",
            CaptureState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Cooperative cancellation flag shared with whoever may stop a capture.
///
/// The harvest loop checks it once per iteration, so the step in flight
/// always completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }
}
