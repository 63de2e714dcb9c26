use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No compatible browser found: {0}")]
    BrowserNotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Capture already in progress")]
    AlreadyRunning,

    #[error("Browser not ready: {0}")]
    NotReady(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Attachment fetch failed for {url}: {reason}")]
    AttachmentFetch { url: String, reason: String },

    #[error("Failed to persist capture: {0}")]
    Persistence(String),

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

impl CaptureError {
    /// Per-item failures inside the harvest and resolution loops are logged and
    /// skipped; everything else aborts the enclosing operation.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CaptureError::Screenshot(_) | CaptureError::AttachmentFetch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
